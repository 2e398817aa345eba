use super::Tool;
use crate::{
    config::Config,
    document::{DocumentHandle, ImageLayout, JpegImage, LopdfDocument},
    packager::NamingRule,
    primitives::hex_to_rgb,
    session::{AcceptPolicy, FileUnit},
};
use anyhow::{Context, Result};

/// Wraps each JPEG in a one-page PDF sized to the image plus margins.
pub struct ImageTool {
    layout: ImageLayout,
    policy: AcceptPolicy,
    archive_name: String,
}

impl ImageTool {
    pub fn new(cfg: &Config) -> Self {
        let bg = cfg.tools.img2pdf.background.trim();
        Self {
            layout: ImageLayout {
                margin: cfg.tools.img2pdf.margin_points,
                background: (!bg.is_empty()).then(|| hex_to_rgb(bg)),
            },
            policy: AcceptPolicy::new(&["jpg", "jpeg"]).with_max_file_bytes(cfg.intake.max_file_bytes),
            archive_name: cfg.tools.img2pdf.archive_name.clone(),
        }
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }
}

impl Tool for ImageTool {
    fn id(&self) -> &str {
        "img2pdf"
    }

    fn accept_policy(&self) -> &AcceptPolicy {
        &self.policy
    }

    fn naming(&self) -> NamingRule {
        NamingRule::ReplaceExtension("pdf".to_string())
    }

    fn archive_name(&self) -> &str {
        &self.archive_name
    }

    fn transform(&self, unit: &FileUnit) -> Result<Vec<u8>> {
        let image = JpegImage::parse(unit.bytes.clone())
            .with_context(|| format!("reading image {}", unit.name))?;
        let mut doc = LopdfDocument::new();
        doc.embed_image(&image, &self.layout)?;
        doc.serialize()
    }
}
