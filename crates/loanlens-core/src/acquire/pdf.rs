//! PDF text layer and page image extraction using lopdf and pdf-extract.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::PdfError;

/// A loaded PDF document.
pub struct PdfExtractor {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Load a PDF from bytes.
    ///
    /// Documents encrypted with an empty user password are decrypted; any
    /// other encryption is rejected.
    pub fn load(data: &[u8]) -> Result<Self, PdfError> {
        let mut document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let raw_data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract reads the decrypted bytes
            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        Ok(Self { document, raw_data })
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Text layer of every page, in page order. Pages without text are empty.
    pub fn page_texts(&self) -> Result<Vec<String>, PdfError> {
        // pdf-extract panics on some malformed content streams
        let data = self.raw_data.as_slice();
        let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data))
        .map_err(|_| PdfError::TextExtraction("pdf-extract panicked".to_string()))?;

        extracted.map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    /// The largest decodable image on a page (1-indexed), if any.
    ///
    /// Scanned agreements carry one full-page image per page; smaller images
    /// are logos or stamps.
    pub fn page_image(&self, page: u32) -> Result<Option<DynamicImage>, PdfError> {
        let doc = &self.document;
        let pages = doc.get_pages();
        let page_id = pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let mut best: Option<DynamicImage> = None;

        if let Some(resources) = self.get_page_resources(*page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        let Ok((_, obj)) = doc.dereference(obj_ref) else {
                            continue;
                        };
                        if let Some(img) = self.try_extract_image_from_object(obj) {
                            let area = |i: &DynamicImage| u64::from(i.width()) * u64::from(i.height());
                            if best.as_ref().is_none_or(|b| area(&img) > area(b)) {
                                best = Some(img);
                            }
                        }
                    }
                }
            }
        }

        match &best {
            Some(img) => debug!("Page {} image: {}x{}", page, img.width(), img.height()),
            None => debug!("No decodable image on page {}", page),
        }
        Ok(best)
    }

    fn try_extract_image_from_object(&self, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        // Check if it's an image XObject
        let subtype = dict.get(b"Subtype").ok()?;
        if subtype.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        trace!("Found image object: {}x{}", width, height);

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) if !arr.is_empty() => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    // JPEG data - use raw stream content (already compressed)
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Unsupported image filter");
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => self.document.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8) as u8;

        create_image_from_raw(&data, width, height, color_space, bits)
    }

    /// Get resources dictionary for a page, handling inheritance
    fn get_page_resources(&self, node_id: ObjectId) -> Option<lopdf::Dictionary> {
        let doc = &self.document;
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        // Continue up the page tree
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.get_page_resources(*parent_id),
            _ => None,
        }
    }
}

fn create_image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => {
            trace!("Unsupported color space: {}", String::from_utf8_lossy(color_space));
            return None;
        }
    };

    let samples = match (bits_per_component, channels) {
        (8, _) => None,
        (1 | 2 | 4, 1) => Some(unpack_gray(data, width, height, bits_per_component)?),
        _ => {
            trace!("Unsupported bits per component: {}", bits_per_component);
            return None;
        }
    };
    let data = samples.as_deref().unwrap_or(data);

    let pixels = (width as usize).checked_mul(height as usize)?;
    let expected = pixels.checked_mul(channels)?;
    if data.len() < expected {
        trace!("Short image data: {} < {}", data.len(), expected);
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for chunk in data[..expected].chunks(channels) {
        match chunk {
            [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
            [gray] => rgba.extend_from_slice(&[*gray, *gray, *gray, 255]),
            _ => return None,
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

/// Expand packed 1, 2 or 4 bit gray samples to one byte per pixel.
///
/// Rows start on byte boundaries. Samples are scaled so the maximum value is
/// white, as with `/Decode [0 1]`.
fn unpack_gray(data: &[u8], width: u32, height: u32, bits: u8) -> Option<Vec<u8>> {
    if width == 0 || height == 0 {
        return None;
    }
    let width = width as usize;
    let row_bytes = width.checked_mul(bits as usize)?.div_ceil(8);
    let needed = row_bytes.checked_mul(height as usize)?;
    if data.len() < needed {
        trace!("Short packed image data: {} < {}", data.len(), needed);
        return None;
    }

    let max = (1u16 << bits) - 1;
    let per_byte = 8 / bits as usize;
    let mut out = Vec::with_capacity(width * height as usize);
    for row in data[..needed].chunks(row_bytes) {
        for x in 0..width {
            let byte = row[x / per_byte];
            let shift = 8 - bits as usize * (x % per_byte + 1);
            let sample = u16::from(byte >> shift) & max;
            out.push((sample * 255 / max) as u8);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::Stream;

    /// One-page PDF whose page shows a single raw 8-bit grayscale image.
    fn scanned_pdf(width: i64, height: i64) -> Vec<u8> {
        image_pdf(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![128u8; (width * height) as usize],
        )
    }

    /// One-page PDF whose only XObject is an image stream with `dict`.
    fn image_pdf(dict: lopdf::Dictionary, content: Vec<u8>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(dict, content));

        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        // Resources live on the page tree node and are inherited by the page
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            PdfExtractor::load(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_page_image_follows_inherited_resources() {
        let pdf = PdfExtractor::load(&scanned_pdf(4, 3)).unwrap();
        assert_eq!(pdf.page_count(), 1);

        let image = pdf.page_image(1).unwrap().unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
        assert!(matches!(pdf.page_image(2), Err(PdfError::InvalidPage(2))));
    }

    #[test]
    fn test_raw_image_decoding() {
        let rgb = create_image_from_raw(&[255, 0, 0, 0, 255, 0], 2, 1, b"DeviceRGB", 8).unwrap();
        assert_eq!(rgb.to_rgba8().get_pixel(1, 0).0, [0, 255, 0, 255]);

        assert!(create_image_from_raw(&[0; 3], 2, 2, b"DeviceGray", 8).is_none());
        assert!(create_image_from_raw(&[0; 4], 2, 2, b"DeviceCMYK", 8).is_none());
        assert!(create_image_from_raw(&[0; 6], 2, 1, b"DeviceRGB", 1).is_none());
        assert!(create_image_from_raw(&[0; 4], 2, 2, b"DeviceGray", 16).is_none());
    }

    #[test]
    fn test_packed_gray_decoding() {
        // 10 pixels per row: two bytes, the last six bits are padding
        let bilevel = create_image_from_raw(&[0b1010_0000, 0b0100_0000, 0xFF, 0xC0], 10, 2, b"DeviceGray", 1)
            .unwrap()
            .to_luma8();
        let first_row: Vec<u8> = (0..10).map(|x| bilevel.get_pixel(x, 0).0[0]).collect();
        assert_eq!(first_row, vec![255, 0, 255, 0, 0, 0, 0, 0, 0, 255]);
        assert!((0..10).all(|x| bilevel.get_pixel(x, 1).0[0] == 255));

        let two_bit = create_image_from_raw(&[0b00_01_10_11], 4, 1, b"G", 2).unwrap().to_luma8();
        let values: Vec<u8> = (0..4).map(|x| two_bit.get_pixel(x, 0).0[0]).collect();
        assert_eq!(values, vec![0, 85, 170, 255]);

        let four_bit = create_image_from_raw(&[0xF0], 2, 1, b"DeviceGray", 4).unwrap().to_luma8();
        assert_eq!(four_bit.get_pixel(0, 0).0[0], 255);
        assert_eq!(four_bit.get_pixel(1, 0).0[0], 0);

        assert!(create_image_from_raw(&[0xFF], 10, 1, b"DeviceGray", 1).is_none());
    }

    #[test]
    fn test_page_image_decodes_bilevel_scan() {
        // 16x2 bilevel scan: two bytes per row
        let pdf = PdfExtractor::load(&image_pdf(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 16,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
            },
            vec![0xFF, 0x00, 0x0F, 0xF0],
        ))
        .unwrap();

        let image = pdf.page_image(1).unwrap().unwrap().to_luma8();
        assert_eq!(image.dimensions(), (16, 2));
        assert_eq!(image.get_pixel(0, 0).0[0], 255);
        assert_eq!(image.get_pixel(8, 0).0[0], 0);
        assert_eq!(image.get_pixel(0, 1).0[0], 0);
        assert_eq!(image.get_pixel(4, 1).0[0], 255);
    }

    #[test]
    fn test_page_image_skips_fax_encoded_scan() {
        let pdf = PdfExtractor::load(&image_pdf(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 16,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
                "Filter" => "CCITTFaxDecode",
            },
            vec![0u8; 8],
        ))
        .unwrap();

        assert!(pdf.page_image(1).unwrap().is_none());
    }
}
