use std::fmt::{Debug, Formatter, Result as FmtResult};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Cover image bytes read out of the e-book.
#[derive(Clone, PartialEq, Eq)]
pub struct Cover {
    /// Media type declared in the package manifest
    pub media_type: String,
    pub data: Vec<u8>,
}
impl Cover {
    /// Whether the image can be stored as-is as a library `cover.jpg`.
    ///
    /// Manifests are not always truthful, so the magic bytes are checked too.
    pub fn is_jpeg(&self) -> bool {
        let declared = matches!(self.media_type.to_ascii_lowercase().as_str(), "image/jpeg" | "image/jpg");
        declared && self.data.starts_with(JPEG_MAGIC)
    }
}

impl Debug for Cover {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Cover")
            .field("media_type", &self.media_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0], true)]
    #[case("IMAGE/JPEG", &[0xFF, 0xD8, 0xFF, 0xDB], true)]
    #[case("image/png", &[0xFF, 0xD8, 0xFF, 0xE0], false)]
    #[case("image/jpeg", &[0x89, b'P', b'N', b'G'], false)]
    fn test_is_jpeg(#[case] media_type: &str, #[case] data: &[u8], #[case] expected: bool) {
        let cover = Cover { media_type: media_type.to_string(), data: data.to_vec() };
        assert_eq!(cover.is_jpeg(), expected);
    }
}
