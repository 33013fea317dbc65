use image::ImageFormat;
use serde::Serialize;
use site_builder_core::config::UploadSettings;
use site_builder_core::{Error, Result};

/// Image formats accepted as site assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
    Webp,
    Svg,
}

impl ImageType {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        Some(match media_type {
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/png" => Self::Png,
            "image/gif" => Self::Gif,
            "image/webp" => Self::Webp,
            "image/svg+xml" => Self::Svg,
            _ => return None,
        })
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Svg => "svg",
        }
    }

    fn raster_format(&self) -> Option<ImageFormat> {
        match self {
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Png => Some(ImageFormat::Png),
            Self::Gif => Some(ImageFormat::Gif),
            Self::Webp => Some(ImageFormat::WebP),
            Self::Svg => None,
        }
    }
}

/// Check an upload before it is stored.
///
/// The declared media type must be allowed, the payload must fit the size
/// limit and its content must match the declared format.
pub fn validate_upload(
    media_type: &str,
    bytes: &[u8],
    settings: &UploadSettings,
) -> Result<ImageType> {
    let media_type = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let image_type = ImageType::from_media_type(&media_type)
        .filter(|t| settings.allowed_types.iter().any(|a| a == t.media_type()))
        .ok_or_else(|| {
            Error::Validation(format!(
                "Media type '{}' is not allowed, expected one of: {}",
                media_type,
                settings.allowed_types.join(", ")
            ))
        })?;

    if bytes.is_empty() {
        return Err(Error::Validation("Upload is empty".to_string()));
    }

    if bytes.len() as u64 > settings.max_bytes {
        return Err(Error::Validation(format!(
            "Upload of {} bytes exceeds the {} byte limit",
            bytes.len(),
            settings.max_bytes
        )));
    }

    match image_type.raster_format() {
        Some(expected) => match image::guess_format(bytes) {
            Ok(actual) if actual == expected => {}
            _ => {
                return Err(Error::Validation(format!(
                    "Upload content is not a valid {} image",
                    image_type.media_type()
                )));
            }
        },
        None => check_svg(bytes)?,
    }

    tracing::debug!(media_type = image_type.media_type(), size = bytes.len(), "upload accepted");
    Ok(image_type)
}

fn check_svg(bytes: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(bytes).to_lowercase();
    if !text.contains("<svg") {
        return Err(Error::Validation(
            "Upload content is not a valid image/svg+xml image".to_string(),
        ));
    }
    if text.contains("<script") || text.contains("javascript:") {
        return Err(Error::Validation(
            "SVG uploads must not contain scripts".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_of_size(len: usize) -> Vec<u8> {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.resize(len, 0);
        bytes
    }

    #[test]
    fn test_rejects_pdf() {
        let settings = UploadSettings::default();
        let err = validate_upload("application/pdf", b"%PDF-1.7", &settings).unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_rejects_oversized_image() {
        let settings = UploadSettings::default();
        let bytes = png_of_size(6 * 1024 * 1024);
        let err = validate_upload("image/png", &bytes, &settings).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_accepts_png_under_limit() {
        let settings = UploadSettings::default();
        let bytes = png_of_size(2 * 1024 * 1024);
        let image_type = validate_upload("image/png", &bytes, &settings).unwrap();
        assert_eq!(image_type, ImageType::Png);
        assert_eq!(image_type.extension(), "png");
    }

    #[test]
    fn test_rejects_mismatched_content() {
        let settings = UploadSettings::default();
        let bytes = png_of_size(64);
        let err = validate_upload("image/jpeg", &bytes, &settings).unwrap_err();
        assert!(err.to_string().contains("not a valid image/jpeg"));
    }

    #[test]
    fn test_media_type_parameters_and_case() {
        let settings = UploadSettings::default();
        let bytes = png_of_size(64);
        assert!(validate_upload("Image/PNG; charset=binary", &bytes, &settings).is_ok());
    }

    #[test]
    fn test_respects_configured_allow_list() {
        let settings = UploadSettings {
            allowed_types: vec!["image/jpeg".to_string()],
            ..UploadSettings::default()
        };
        let bytes = png_of_size(64);
        assert!(validate_upload("image/png", &bytes, &settings).is_err());
    }

    #[test]
    fn test_svg() {
        let settings = UploadSettings::default();
        let svg = br#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"></svg>"#;
        assert_eq!(
            validate_upload("image/svg+xml", svg, &settings).unwrap(),
            ImageType::Svg
        );

        let evil = br#"<svg><script>alert(1)</script></svg>"#;
        assert!(validate_upload("image/svg+xml", evil, &settings).is_err());
    }

    #[test]
    fn test_rejects_empty() {
        let settings = UploadSettings::default();
        assert!(validate_upload("image/png", &[], &settings).is_err());
    }
}
