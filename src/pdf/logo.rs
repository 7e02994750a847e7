//! Footer logo loading and embedding

use std::path::Path;
use lopdf::{dictionary, Document, ObjectId, Stream};
use tracing::debug;
use crate::error::{Error, Result};

/// Supported logo image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoFormat {
    Png,
    Jpeg,
}

impl LogoFormat {
    /// Format from a declared MIME type
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(LogoFormat::Png),
            "image/jpeg" | "image/jpg" => Ok(LogoFormat::Jpeg),
            other => Err(Error::UnsupportedImage(format!(
                "{} (only PNG and JPEG logos are allowed)",
                other
            ))),
        }
    }

    /// Format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("png") => Ok(LogoFormat::Png),
            Some("jpg") | Some("jpeg") => Ok(LogoFormat::Jpeg),
            _ => Err(Error::UnsupportedImage(format!(
                "{} (expected a .png, .jpg or .jpeg file)",
                path.display()
            ))),
        }
    }

    /// Detect the format from magic bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(LogoFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8]) {
            Some(LogoFormat::Jpeg)
        } else {
            None
        }
    }
}

/// A logo image as supplied by the caller
#[derive(Debug, Clone)]
pub struct Logo {
    pub format: LogoFormat,
    pub data: Vec<u8>,
}

impl Logo {
    /// Accept image bytes with a declared MIME type
    ///
    /// The bytes must actually be of the declared format.
    pub fn from_bytes(data: Vec<u8>, mime: &str) -> Result<Self> {
        let format = LogoFormat::from_mime(mime)?;
        if LogoFormat::sniff(&data) != Some(format) {
            return Err(Error::UnsupportedImage(format!(
                "data is not a valid {:?} image",
                format
            )));
        }
        Ok(Self { format, data })
    }

    /// Load a logo from disk, typed by its extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let format = LogoFormat::from_path(path)?;
        let data = std::fs::read(path)?;
        if LogoFormat::sniff(&data) != Some(format) {
            return Err(Error::UnsupportedImage(format!(
                "{} is not a valid {:?} image",
                path.display(),
                format
            )));
        }

        Ok(Self { format, data })
    }
}

/// A logo added to a document as an image XObject
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddedLogo {
    pub id: ObjectId,
    /// Natural width in pixels
    pub width: f64,
    /// Natural height in pixels
    pub height: f64,
}

/// Add the logo to the document once; every page references the same object
///
/// A PNG with an alpha channel keeps its transparency through a soft mask.
pub fn embed_logo(doc: &mut Document, logo: &Logo) -> Result<EmbeddedLogo> {
    let mut stream = lopdf::xobject::image_from(logo.data.clone())?;

    let width = stream.dict.get(b"Width").and_then(|w| w.as_i64())?;
    let height = stream.dict.get(b"Height").and_then(|h| h.as_i64())?;
    if width <= 0 || height <= 0 {
        return Err(Error::UnsupportedImage(format!(
            "logo has invalid dimensions {}x{}",
            width, height
        )));
    }

    if logo.format == LogoFormat::Png {
        if let Some(mask) = alpha_mask(&logo.data)? {
            let mask_id = doc.add_object(mask);
            stream.dict.set("SMask", mask_id);
        }
    }

    let id = doc.add_object(stream);
    debug!("Embedded {:?} logo {}x{} as {:?}", logo.format, width, height, id);

    Ok(EmbeddedLogo {
        id,
        width: width as f64,
        height: height as f64,
    })
}

/// Alpha channel of a PNG as a DeviceGray soft mask, if the image has one
fn alpha_mask(data: &[u8]) -> Result<Option<Stream>> {
    let image = image::load_from_memory_with_format(data, image::ImageFormat::Png)?;
    if !image.color().has_alpha() {
        return Ok(None);
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let alpha: Vec<u8> = rgba.pixels().map(|pixel| pixel[3]).collect();

    let mut mask = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    );
    mask.compress()?;

    Ok(Some(mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_PNG: &[u8] = include_bytes!("../../tests/fixtures/red-4x2.png");

    fn encode_png(image: image::DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(LogoFormat::from_mime("image/png").unwrap(), LogoFormat::Png);
        assert_eq!(LogoFormat::from_mime("image/jpeg").unwrap(), LogoFormat::Jpeg);
        assert_eq!(LogoFormat::from_mime("IMAGE/JPG").unwrap(), LogoFormat::Jpeg);
        assert!(matches!(
            LogoFormat::from_mime("image/gif"),
            Err(Error::UnsupportedImage(_))
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(LogoFormat::from_path(Path::new("logo.PNG")).unwrap(), LogoFormat::Png);
        assert_eq!(LogoFormat::from_path(Path::new("a/b.jpeg")).unwrap(), LogoFormat::Jpeg);
        assert!(LogoFormat::from_path(Path::new("logo.svg")).is_err());
        assert!(LogoFormat::from_path(Path::new("logo")).is_err());
    }

    #[test]
    fn test_declared_type_must_match_data() {
        assert!(Logo::from_bytes(RED_PNG.to_vec(), "image/png").is_ok());
        assert!(matches!(
            Logo::from_bytes(RED_PNG.to_vec(), "image/jpeg"),
            Err(Error::UnsupportedImage(_))
        ));
        assert!(Logo::from_bytes(vec![1, 2, 3], "image/png").is_err());
    }

    #[test]
    fn test_load_nonexistent_logo() {
        let result = Logo::load(Path::new("missing-logo.png"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_embed_reads_natural_size() {
        let mut doc = Document::with_version("1.5");
        let logo = Logo::from_bytes(RED_PNG.to_vec(), "image/png").unwrap();

        let embedded = embed_logo(&mut doc, &logo).expect("PNG should embed");
        assert_eq!((embedded.width, embedded.height), (4.0, 2.0));
        assert!(doc.get_object(embedded.id).is_ok());
    }

    #[test]
    fn test_opaque_png_has_no_soft_mask() {
        let mut doc = Document::with_version("1.5");
        let logo = Logo::from_bytes(RED_PNG.to_vec(), "image/png").unwrap();

        let embedded = embed_logo(&mut doc, &logo).unwrap();
        let image = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert!(!image.dict.has(b"SMask"));
    }

    #[test]
    fn test_transparent_png_keeps_alpha() {
        let pixels = image::RgbaImage::from_fn(4, 4, |x, _| image::Rgba([255, 0, 0, (x * 60) as u8]));
        let data = encode_png(image::DynamicImage::ImageRgba8(pixels));

        let mut doc = Document::with_version("1.5");
        let logo = Logo::from_bytes(data, "image/png").unwrap();
        let embedded = embed_logo(&mut doc, &logo).unwrap();
        assert_eq!((embedded.width, embedded.height), (4.0, 4.0));

        let image = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        let mask_id = image.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let mask = doc.get_object(mask_id).unwrap().as_stream().unwrap();

        assert_eq!(mask.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
        assert_eq!(mask.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert_eq!(mask.dict.get(b"Height").unwrap().as_i64().unwrap(), 4);

        let alpha = mask.decompressed_content().unwrap_or_else(|_| mask.content.clone());
        assert_eq!(alpha.len(), 16);
        assert_eq!(&alpha[..4], &[0, 60, 120, 180]);
    }

    #[test]
    fn test_gray_alpha_png_gets_soft_mask() {
        let pixels = image::GrayAlphaImage::from_pixel(3, 2, image::LumaA([0, 0]));
        let data = encode_png(image::DynamicImage::ImageLumaA8(pixels));

        let mut doc = Document::with_version("1.5");
        let logo = Logo::from_bytes(data, "image/png").unwrap();
        let embedded = embed_logo(&mut doc, &logo).unwrap();

        let image = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert!(image.dict.has(b"SMask"));
    }
}
