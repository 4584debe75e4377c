//! Page raster access for the OCR path.
//!
//! Scanned lab reports are PDFs whose pages each carry one big image XObject
//! (JPEG, TIFF or raw pixels). Pulling that image out of the page is cheaper
//! and sharper than re-rendering, so the `dpi` knob only applies when a page
//! has no embedded scan to reuse (in which case there is nothing to OCR and
//! the page is reported as unreadable).

use image::GrayImage;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use super::types::PageImageSource;
use super::ExtractionError;

/// Extracts each page's largest embedded image as its grayscale raster.
pub struct EmbeddedScanSource;

impl PageImageSource for EmbeddedScanSource {
    fn page_image(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        _dpi: u32,
    ) -> Result<GrayImage, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(format!("failed to parse PDF: {e}")))?;

        // 1-based, matching `TextBlock::page_number`.
        let page_ids: Vec<ObjectId> = doc.page_iter().collect();
        let &page_id = page_number
            .checked_sub(1)
            .and_then(|i| page_ids.get(i))
            .ok_or_else(|| {
                ExtractionError::PdfParsing(format!(
                    "page {} not found (PDF has {} pages)",
                    page_number,
                    page_ids.len()
                ))
            })?;

        let image_bytes = largest_page_image(&doc, page_id)?;

        let img = image::load_from_memory(&image_bytes).map_err(|e| {
            ExtractionError::ImageProcessing(format!("failed to decode page scan: {e}"))
        })?;
        let gray = img.to_luma8();

        debug!(
            page = page_number,
            raw_size = image_bytes.len(),
            dims = format!("{}x{}", gray.width(), gray.height()),
            "Embedded page scan extracted"
        );
        Ok(gray)
    }
}

/// Largest image XObject on a page: page dict → /Resources → /XObject →
/// /Subtype /Image entries, keeping the biggest (the main page scan).
fn largest_page_image(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, ExtractionError> {
    let page_obj = doc
        .get_object(page_id)
        .map_err(|e| ExtractionError::PdfParsing(format!("page object error: {e}")))?;
    let page_dict = page_obj
        .as_dict()
        .map_err(|_| ExtractionError::PdfParsing("page is not a dictionary".into()))?;

    let resources = resolve_dict_entry(doc, page_dict, b"Resources")?;
    let xobjects = resolve_dict_entry(doc, resources, b"XObject")?;

    let mut largest: Option<Vec<u8>> = None;

    for (_name, obj_ref) in xobjects.iter() {
        let xobj = match obj_ref {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(obj) => obj,
                Err(_) => continue,
            },
            other => other,
        };

        let stream = match xobj {
            Object::Stream(ref s) => s,
            _ => continue,
        };

        if !is_image_subtype(&stream.dict) {
            continue;
        }

        let bytes = image_stream_bytes(stream)?;
        if largest.as_ref().map_or(true, |prev| bytes.len() > prev.len()) {
            largest = Some(bytes);
        }
    }

    largest.ok_or_else(|| {
        ExtractionError::PdfParsing("no image XObjects found on this page".into())
    })
}

fn is_image_subtype(dict: &lopdf::Dictionary) -> bool {
    dict.get(b"Subtype")
        .map(|obj| matches!(obj, Object::Name(ref n) if n == b"Image"))
        .unwrap_or(false)
}

/// Image bytes from a stream, handling the common filters.
///
/// DCTDecode streams ARE the JPEG file; everything else is decompressed and
/// handed to the image decoder (covers embedded TIFF/PNG payloads).
fn image_stream_bytes(stream: &lopdf::Stream) -> Result<Vec<u8>, ExtractionError> {
    let filter = stream.dict.get(b"Filter").ok();
    let is_dct = filter
        .map(|f| match f {
            Object::Name(n) => n == b"DCTDecode",
            Object::Array(arr) => arr
                .iter()
                .any(|o| matches!(o, Object::Name(ref n) if n == b"DCTDecode")),
            _ => false,
        })
        .unwrap_or(false);

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    if is_dct || image::load_from_memory(&content).is_ok() {
        return Ok(content);
    }

    // Raw pixel data: reconstruct from /Width, /Height, /BitsPerComponent.
    reconstruct_raw_image(&stream.dict, &content)
}

fn reconstruct_raw_image(
    dict: &lopdf::Dictionary,
    raw_pixels: &[u8],
) -> Result<Vec<u8>, ExtractionError> {
    let width = get_int(dict, b"Width")? as u32;
    let height = get_int(dict, b"Height")? as u32;
    let bpc = get_int(dict, b"BitsPerComponent").unwrap_or(8) as u32;

    let channels = match dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) if n == b"DeviceGray" => 1u32,
        Ok(Object::Name(n)) if n == b"DeviceCMYK" => 4,
        _ => 3,
    };
    let expected = (width * height * channels * bpc / 8) as usize;
    if raw_pixels.len() < expected {
        return Err(ExtractionError::ImageProcessing(format!(
            "raw pixel buffer too small: {} bytes, expected {expected} ({width}x{height}x{channels}x{bpc}/8)",
            raw_pixels.len()
        )));
    }

    let img = match channels {
        1 => image::GrayImage::from_raw(width, height, raw_pixels[..expected].to_vec())
            .map(image::DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(width, height, raw_pixels[..expected].to_vec())
            .map(image::DynamicImage::ImageRgb8),
        _ => image::RgbaImage::from_raw(width, height, raw_pixels[..expected].to_vec())
            .map(image::DynamicImage::ImageRgba8),
    }
    .ok_or_else(|| ExtractionError::ImageProcessing("failed to assemble raw image".into()))?;

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encode failed: {e}")))?;
    Ok(buf.into_inner())
}

fn resolve_dict_entry<'a>(
    doc: &'a Document,
    dict: &'a lopdf::Dictionary,
    key: &[u8],
) -> Result<&'a lopdf::Dictionary, ExtractionError> {
    let obj = dict.get(key).map_err(|_| {
        ExtractionError::PdfParsing(format!(
            "missing /{} in dictionary",
            String::from_utf8_lossy(key)
        ))
    })?;
    let resolved = match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    };
    resolved.as_dict().map_err(|_| {
        ExtractionError::PdfParsing(format!(
            "/{} is not a dictionary",
            String::from_utf8_lossy(key)
        ))
    })
}

fn get_int(dict: &lopdf::Dictionary, key: &[u8]) -> Result<i64, ExtractionError> {
    dict.get(key)
        .and_then(|obj| obj.as_i64())
        .map_err(|_| {
            ExtractionError::PdfParsing(format!(
                "missing or non-integer /{}",
                String::from_utf8_lossy(key)
            ))
        })
}
