use std::io::Write;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use tempfile::NamedTempFile;

use crate::error::Result;

/// Downloaded image bytes parked in a uniquely named temporary file.
///
/// The file belongs to a single invocation and is removed on drop.
pub struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    pub fn write(bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("classify-")
            .suffix(".img")
            .tempfile()?;

        file.write_all(bytes)?;
        file.flush()?;

        Ok(StagedImage { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Decode the staged file, sniffing the format from its content
    pub fn open(&self) -> Result<DynamicImage> {
        let image = ImageReader::open(self.path())?
            .with_guessed_format()?
            .decode()?;

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifyError;
    use crate::test_support::png;

    #[test]
    fn staged_png_decodes() {
        let staged = StagedImage::write(&png([1, 2, 3])).unwrap();
        let img = staged.open().unwrap();

        assert_eq!((img.width(), img.height()), (8, 8));
        assert_eq!(img.to_rgb8().get_pixel(3, 3).0, [1, 2, 3]);
    }

    #[test]
    fn html_fails_to_decode() {
        let staged = StagedImage::write(b"<html>nope</html>").unwrap();
        let err = staged.open().unwrap_err();

        assert!(matches!(err, ClassifyError::DecodeFailed(_)));
        assert_eq!(err.status(), 422);
    }

    #[test]
    fn every_invocation_gets_its_own_file() {
        let a = StagedImage::write(b"a").unwrap();
        let b = StagedImage::write(b"b").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn file_is_removed_on_drop() {
        let staged = StagedImage::write(b"bytes").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }
}
