use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub intake: Intake,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub archive: Archive,
    #[serde(default)]
    pub tools: Tools,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".docbatch-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intake {
    pub max_file_bytes: u64,
    pub max_files: usize,
}
impl Default for Intake {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024 * 1024,
            max_files: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub qpdf_exe: String,
    pub input_path: String,
    pub output_path: String,
    pub repair_args: Vec<String>,
    pub call_timeout_seconds: u64,
    pub version_timeout_seconds: u64,
    /// Re-open repaired output before counting it as a success.
    pub verify_output: bool,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            qpdf_exe: "auto".into(),
            input_path: "/input.pdf".into(),
            output_path: "/output.pdf".into(),
            repair_args: vec!["--decrypt".into(), "{input}".into(), "{output}".into()],
            call_timeout_seconds: 300,
            version_timeout_seconds: 10,
            verify_output: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    /// `deflated` or `stored`.
    pub compression: String,
}
impl Default for Archive {
    fn default() -> Self {
        Self {
            compression: "deflated".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tools {
    #[serde(default)]
    pub repair: RepairTool,
    #[serde(default)]
    pub extract: ExtractTool,
    #[serde(default)]
    pub img2pdf: ImageTool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairTool {
    pub output_prefix: String,
    pub archive_name: String,
}
impl Default for RepairTool {
    fn default() -> Self {
        Self {
            output_prefix: "repaired_".into(),
            archive_name: "repaired_pdfs.zip".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractTool {
    pub output_prefix: String,
    pub archive_name: String,
}
impl Default for ExtractTool {
    fn default() -> Self {
        Self {
            output_prefix: "extracted_".into(),
            archive_name: "extracted_pdfs.zip".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTool {
    pub archive_name: String,
    pub margin_points: f32,
    pub background: String,
}
impl Default for ImageTool {
    fn default() -> Self {
        Self {
            archive_name: "converted_images.zip".into(),
            margin_points: 0.0,
            background: "#ffffff".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            report_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}
