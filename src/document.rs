//! Minimal document capability the tools rely on, plus its `lopdf` backing.

use crate::primitives::Rgb;
use anyhow::{anyhow, bail, Context, Result};
use lopdf::{
    content::{Content, Operation},
    Dictionary, Document, Object, ObjectId, Stream,
};
use std::collections::BTreeSet;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

pub trait DocumentHandle {
    fn load(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;

    fn page_count(&self) -> u32;

    /// Width and height in points of the zero-based page, rotation applied.
    fn page_size(&self, index: u32) -> Option<(f64, f64)>;

    /// Appends the zero-based page `index` of `source` to this document.
    fn copy_page(&mut self, source: &Self, index: u32) -> Result<()>
    where
        Self: Sized;

    /// Appends a page showing `image`.
    fn embed_image(&mut self, image: &JpegImage, layout: &ImageLayout) -> Result<()>;

    fn serialize(&mut self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct JpegImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

impl JpegImage {
    /// Reads dimensions from the first start-of-frame segment. The data is
    /// embedded as-is, so no decoding happens.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            bail!("not a JPEG stream");
        }
        let mut i = 2;
        while i + 3 < data.len() {
            if data[i] != 0xFF {
                bail!("corrupt JPEG marker at offset {i}");
            }
            let marker = data[i + 1];
            if marker == 0xFF {
                i += 1;
                continue;
            }
            if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
                i += 2;
                continue;
            }
            let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
            if is_sof {
                if i + 9 >= data.len() {
                    bail!("truncated JPEG frame header");
                }
                let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
                let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
                let components = data[i + 9];
                if width == 0 || height == 0 {
                    bail!("JPEG has zero dimensions");
                }
                return Ok(Self {
                    data,
                    width,
                    height,
                    components,
                });
            }
            if marker == 0xDA {
                break;
            }
            i += 2 + len;
        }
        bail!("no JPEG frame header found")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageLayout {
    pub margin: f32,
    pub background: Option<Rgb>,
}

pub struct LopdfDocument {
    doc: Document,
    pages_id: ObjectId,
}

impl Default for LopdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(Vec::new())),
                ("Count", Object::Integer(0)),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        Self { doc, pages_id }
    }

    /// New document holding the given zero-based pages, in order.
    pub fn extract_pages(&self, indices: &[u32]) -> Result<Self> {
        let mut out = Self::new();
        for &index in indices {
            out.copy_page(self, index)?;
        }
        Ok(out)
    }

    fn page_id(&self, index: u32) -> Result<ObjectId> {
        let pages = self.doc.get_pages();
        pages
            .get(&(index + 1))
            .copied()
            .ok_or_else(|| anyhow!("page {} out of range ({} pages)", index + 1, pages.len()))
    }

    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let dict = self.doc.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(self.resolve(value).clone());
            }
            current = dict.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    fn append_kid(&mut self, page_id: ObjectId) -> Result<()> {
        let pages = self
            .doc
            .get_object_mut(self.pages_id)
            .and_then(Object::as_dict_mut)
            .context("page tree root")?;
        let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0) + 1;
        pages
            .get_mut(b"Kids")
            .and_then(Object::as_array_mut)
            .context("page tree kids")?
            .push(Object::Reference(page_id));
        pages.set("Count", Object::Integer(count));
        Ok(())
    }
}

impl DocumentHandle for LopdfDocument {
    fn load(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).context("parsing PDF")?;
        let catalog_id = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .context("document has no catalog")?;
        let pages_id = doc
            .get_object(catalog_id)
            .and_then(Object::as_dict)
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .context("document has no page tree")?;
        Ok(Self { doc, pages_id })
    }

    fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    fn page_size(&self, index: u32) -> Option<(f64, f64)> {
        let page_id = self.page_id(index).ok()?;
        let media_box = self.inherited(page_id, b"MediaBox")?;
        let coords = media_box
            .as_array()
            .ok()?
            .iter()
            .map(|o| number(self.resolve(o)))
            .collect::<Option<Vec<_>>>()?;
        if coords.len() != 4 {
            return None;
        }
        let width = (coords[2] - coords[0]).abs();
        let height = (coords[3] - coords[1]).abs();
        let rotate = self
            .inherited(page_id, b"Rotate")
            .and_then(|r| r.as_i64().ok())
            .unwrap_or(0);
        if rotate.rem_euclid(180) == 90 {
            Some((height, width))
        } else {
            Some((width, height))
        }
    }

    fn copy_page(&mut self, source: &Self, index: u32) -> Result<()> {
        let page_id = source.page_id(index)?;
        let mut page = source.doc.get_object(page_id)?.as_dict()?.clone();
        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = source.inherited(page_id, key) {
                    page.set(key, value);
                }
            }
        }
        page.remove(b"Parent");

        let mut reachable = BTreeSet::new();
        let mut pending = Vec::new();
        for (_, value) in page.iter() {
            collect_refs(value, &mut pending);
        }
        while let Some(id) = pending.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Ok(obj) = source.doc.get_object(id) {
                collect_refs(obj, &mut pending);
            }
        }

        let offset = self.doc.max_id;
        for &id in &reachable {
            if let Ok(obj) = source.doc.get_object(id) {
                let copied = remap(obj.clone(), offset, &reachable);
                self.doc.objects.insert((id.0 + offset, id.1), copied);
            }
        }
        self.doc.max_id = offset + source.doc.max_id;

        remap_dict(&mut page, offset, &reachable);
        page.set("Parent", Object::Reference(self.pages_id));
        let new_id = self.doc.add_object(page);
        self.append_kid(new_id)
    }

    fn embed_image(&mut self, image: &JpegImage, layout: &ImageLayout) -> Result<()> {
        let margin = layout.margin.max(0.0);
        let (w, h) = (image.width as f32, image.height as f32);
        let (page_w, page_h) = (w + 2.0 * margin, h + 2.0 * margin);
        let color_space: &[u8] = match image.components {
            1 => b"DeviceGray",
            4 => b"DeviceCMYK",
            _ => b"DeviceRGB",
        };

        let xobject = Stream::new(
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(image.width as i64)),
                ("Height", Object::Integer(image.height as i64)),
                ("ColorSpace", Object::Name(color_space.to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
                ("Filter", Object::Name(b"DCTDecode".to_vec())),
            ]),
            image.data.clone(),
        );
        let image_id = self.doc.add_object(xobject);

        let mut operations = Vec::new();
        if let Some(bg) = layout.background {
            operations.push(Operation::new("rg", vec![bg.r.into(), bg.g.into(), bg.b.into()]));
            operations.push(Operation::new(
                "re",
                vec![Object::Integer(0), Object::Integer(0), page_w.into(), page_h.into()],
            ));
            operations.push(Operation::new("f", vec![]));
        }
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new(
            "cm",
            vec![
                w.into(),
                Object::Integer(0),
                Object::Integer(0),
                h.into(),
                margin.into(),
                margin.into(),
            ],
        ));
        operations.push(Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]));
        operations.push(Operation::new("Q", vec![]));
        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));

        let resources = Dictionary::from_iter(vec![(
            "XObject",
            Object::Dictionary(Dictionary::from_iter(vec![("Im0", Object::Reference(image_id))])),
        )]);
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    page_w.into(),
                    page_h.into(),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources)),
        ]);
        let page_id = self.doc.add_object(page);
        self.append_kid(page_id)
    }

    fn serialize(&mut self) -> Result<Vec<u8>> {
        self.doc.prune_objects();
        self.doc.compress();
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).context("saving PDF")?;
        Ok(buffer)
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Pushes every referenced object id, not following back-links to parents.
fn collect_refs(obj: &Object, out: &mut Vec<ObjectId>) {
    match obj {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|o| collect_refs(o, out)),
        Object::Dictionary(dict) => collect_dict_refs(dict, out),
        Object::Stream(stream) => collect_dict_refs(&stream.dict, out),
        _ => {}
    }
}

fn collect_dict_refs(dict: &Dictionary, out: &mut Vec<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() == b"Parent" || key.as_slice() == b"P" {
            continue;
        }
        collect_refs(value, out);
    }
}

/// Shifts references into the destination id space; references to objects
/// that were not copied become null.
fn remap(obj: Object, offset: u32, kept: &BTreeSet<ObjectId>) -> Object {
    match obj {
        Object::Reference(id) if kept.contains(&id) => Object::Reference((id.0 + offset, id.1)),
        Object::Reference(_) => Object::Null,
        Object::Array(items) => {
            Object::Array(items.into_iter().map(|o| remap(o, offset, kept)).collect())
        }
        Object::Dictionary(mut dict) => {
            remap_dict(&mut dict, offset, kept);
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            remap_dict(&mut stream.dict, offset, kept);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(dict: &mut Dictionary, offset: u32, kept: &BTreeSet<ObjectId>) {
    for (_, value) in dict.iter_mut() {
        let taken = std::mem::replace(value, Object::Null);
        *value = remap(taken, offset, kept);
    }
}
