//! Embedded image extraction and section association.
//!
//! Images are pulled straight from the PDF object graph: every image
//! XObject reachable from a page's resources, deduplicated by object
//! reference, quality-filtered, and re-encoded to PNG so callers see a
//! single consistent format regardless of the source encoding.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use paper_model::{ExtractedImage, Section};

use crate::annotate::{section_for_page, sections_by_start_page};
use crate::SegmentError;

/// Quality thresholds rejecting icons, rules, and thumbnails.
#[derive(Debug, Clone, Copy)]
pub struct ImageFilter {
    /// Smaller dimension must exceed this many pixels.
    pub min_dimension: u32,
    /// Encoded output must exceed this many bytes.
    pub min_bytes: usize,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self { min_dimension: 50, min_bytes: 1000 }
    }
}

/// Extracts qualifying embedded images from the document at `path` and
/// associates each with the section active at its page. At most one
/// record is produced per distinct image resource, even when the same
/// resource is referenced from several pages.
pub fn extract_images(
    path: &Path,
    sections: &[Section],
    filter: &ImageFilter,
) -> Result<Vec<ExtractedImage>, SegmentError> {
    let doc = Document::load(path).map_err(|e| SegmentError::Pdf(e.to_string()))?;
    Ok(extract_from_document(&doc, sections, filter))
}

pub(crate) fn extract_from_document(
    doc: &Document,
    sections: &[Section],
    filter: &ImageFilter,
) -> Vec<ExtractedImage> {
    let sorted = sections_by_start_page(sections);

    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut out: Vec<ExtractedImage> = Vec::new();

    for (page_num, page_id) in doc.get_pages() {
        for object_id in page_image_ids(doc, page_id) {
            if !seen.insert(object_id) {
                continue;
            }
            let image = match recover_image(doc, object_id, filter) {
                Some(img) => img,
                None => continue,
            };
            let section_id = section_for_page(&sorted, page_num).map(Section::section_id);
            out.push(ExtractedImage {
                xref: object_id.0,
                page_num,
                width: image.width,
                height: image.height,
                image_bytes: image.bytes,
                extension: "png".into(),
                section_id,
            });
        }
    }

    tracing::debug!(images = out.len(), "extracted images");
    out
}

struct RecoveredImage {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

/// Object ids of every image XObject referenced by a page's resources.
fn page_image_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut ids = Vec::new();
    if let Some(resources) = page_resources(doc, page_id) {
        collect_xobject_ids(doc, resources, &mut ids);
    }
    ids
}

/// A page's resource dictionary, following the Parent chain for
/// inherited entries. The walk is bounded against malformed cycles.
fn page_resources<'a>(doc: &'a Document, page_id: ObjectId) -> Option<&'a Dictionary> {
    let mut current = page_id;
    for _ in 0..16 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(Object::Dictionary(resources)) = dict.get(b"Resources").map(|o| resolved(doc, o))
        {
            return Some(resources);
        }
        match dict.get(b"Parent").and_then(|o| o.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => return None,
        }
    }
    None
}

fn collect_xobject_ids(doc: &Document, resources: &Dictionary, ids: &mut Vec<ObjectId>) {
    let xobjects = match resources.get(b"XObject").map(|o| resolved(doc, o)) {
        Ok(Object::Dictionary(dict)) => dict,
        _ => return,
    };
    for (_name, entry) in xobjects.iter() {
        if let Ok(id) = entry.as_reference() {
            ids.push(id);
        }
    }
}

/// Follows a reference one hop; non-references pass through.
fn resolved<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Decodes an image XObject into PNG bytes, compositing any soft mask
/// as an alpha channel. Returns `None` for non-images, sub-threshold
/// images, and encodings this extractor does not handle.
fn recover_image(doc: &Document, object_id: ObjectId, filter: &ImageFilter) -> Option<RecoveredImage> {
    let stream = doc.get_object(object_id).ok()?.as_stream().ok()?;
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image".as_slice() {
        return None;
    }
    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    if width.min(height) <= filter.min_dimension {
        return None;
    }

    let base = decode_raster(doc, stream)?;

    // Soft mask becomes the alpha channel when dimensions line up.
    let composed = match soft_mask(doc, dict) {
        Some(mask) if mask.width() == base.width() && mask.height() == base.height() => {
            let mut rgba = base.to_rgba8();
            for (pixel, alpha) in rgba.pixels_mut().zip(mask.pixels()) {
                pixel.0[3] = alpha.0[0];
            }
            DynamicImage::ImageRgba8(rgba)
        }
        _ => base,
    };

    let mut bytes = Vec::new();
    composed
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .ok()?;
    if bytes.len() <= filter.min_bytes {
        return None;
    }
    Some(RecoveredImage { width, height, bytes })
}

/// Raster decode for the encodings academic PDFs actually use: DCT
/// (JPEG) streams and 8-bit flate/raw gray or RGB samples. Anything
/// else (CCITT, JBIG2, JPX, indexed palettes, 1-bit art) is skipped.
fn decode_raster(doc: &Document, stream: &lopdf::Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

    if has_filter(doc, dict, b"DCTDecode") {
        return image::load_from_memory(&stream.content).ok();
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let data = stream.decompressed_content().ok()?;
    let pixels = (width as usize).checked_mul(height as usize)?;
    match color_components(doc, dict) {
        Some(1) if data.len() >= pixels => {
            GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8)
        }
        Some(3) if data.len() >= pixels * 3 => {
            RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        _ => None,
    }
}

/// Whether the stream's filter chain names `target`.
fn has_filter(doc: &Document, dict: &Dictionary, target: &[u8]) -> bool {
    let filter = match dict.get(b"Filter").map(|o| resolved(doc, o)) {
        Ok(object) => object,
        Err(_) => return false,
    };
    match filter {
        Object::Name(name) => name.as_slice() == target,
        Object::Array(entries) => entries
            .iter()
            .any(|entry| matches!(entry, Object::Name(name) if name.as_slice() == target)),
        _ => false,
    }
}

/// Component count for the supported color spaces.
fn color_components(doc: &Document, dict: &Dictionary) -> Option<u8> {
    let space = dict.get(b"ColorSpace").map(|o| resolved(doc, o)).ok()?;
    match space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            _ => None,
        },
        _ => None,
    }
}

/// Decodes an attached soft mask to an 8-bit gray alpha raster.
fn soft_mask(doc: &Document, dict: &Dictionary) -> Option<GrayImage> {
    let mask_obj = dict.get(b"SMask").map(|o| resolved(doc, o)).ok()?;
    let stream = mask_obj.as_stream().ok()?;
    let decoded = decode_raster(doc, stream)?;
    Some(decoded.to_luma8())
}
