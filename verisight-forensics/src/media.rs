/// An uploaded file, classified by its declared content type.
///
/// Lives only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaInput {
    Image { bytes: Vec<u8>, mime: String },
    Video { bytes: Vec<u8>, mime: String },
}

impl MediaInput {
    /// `video/*` becomes [`MediaInput::Video`]; anything else is treated as an image.
    ///
    /// ```
    /// use verisight_forensics::MediaInput;
    ///
    /// let clip = MediaInput::from_upload(vec![0, 1], Some("video/mp4"));
    /// assert!(clip.is_video());
    /// let still = MediaInput::from_upload(vec![0, 1], None);
    /// assert_eq!(still.mime(), "image/jpeg");
    /// ```
    pub fn from_upload(bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        let mime = content_type
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty());
        match mime {
            Some(mime) if mime.starts_with("video") => MediaInput::Video { bytes, mime },
            Some(mime) if mime.starts_with("image") => MediaInput::Image { bytes, mime },
            // Unknown uploads go to the classifier as JPEG.
            _ => MediaInput::Image {
                bytes,
                mime: "image/jpeg".to_string(),
            },
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaInput::Video { .. })
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            MediaInput::Image { bytes, .. } | MediaInput::Video { bytes, .. } => bytes,
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            MediaInput::Image { mime, .. } | MediaInput::Video { mime, .. } => mime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_selects_variant() {
        assert!(MediaInput::from_upload(vec![], Some("video/quicktime")).is_video());
        assert!(!MediaInput::from_upload(vec![], Some("image/png")).is_video());
        assert_eq!(
            MediaInput::from_upload(vec![], Some("Image/PNG")).mime(),
            "image/png"
        );
    }

    #[test]
    fn unknown_types_default_to_jpeg_image() {
        let input = MediaInput::from_upload(vec![7], Some("application/octet-stream"));
        assert_eq!(input.mime(), "image/jpeg");
        assert_eq!(input.bytes(), &[7]);
    }
}
