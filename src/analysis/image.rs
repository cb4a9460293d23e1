//! Image intake and artifact files.

use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use image::{ImageFormat, ImageReader};

/// Extensions the capture page accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

const THUMBNAIL_WIDTH: u32 = 200;
const THUMBNAIL_HEIGHT: u32 = 150;

#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Where the image lives on disk, if it came from a file.
    pub source_path: Option<PathBuf>,
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub dimensions: Option<(u32, u32)>,
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        _ => None,
    }
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

impl ImageUpload {
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .with_context(|| format!("invalid image path {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let Some(mime) = mime_for_extension(&extension) else {
            bail!(
                "unsupported image format '{}' (accepted: {})",
                filename,
                ACCEPTED_EXTENSIONS.join(", ")
            );
        };

        let bytes =
            fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
        if bytes.is_empty() {
            bail!("image {} is empty", path.display());
        }

        Ok(Self {
            source_path: Some(path.to_path_buf()),
            filename,
            mime,
            dimensions: probe_dimensions(&bytes),
            bytes,
        })
    }

    /// A camera frame encoded as JPEG, named `capture_<unix millis>.jpg`.
    pub fn from_capture(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            bail!("captured frame is empty");
        }
        Ok(Self {
            source_path: None,
            filename: format!("capture_{}.jpg", Utc::now().timestamp_millis()),
            mime: "image/jpeg",
            dimensions: probe_dimensions(&bytes),
            bytes,
        })
    }

    pub fn pixel_count(&self) -> Option<u64> {
        self.dimensions
            .map(|(width, height)| u64::from(width) * u64::from(height))
    }
}

/// Writes analysis artifacts under `<root>/<analysis id>/`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, analysis_id: &str) -> Result<PathBuf> {
        let dir = self.root.join(analysis_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Delete everything stored for `analysis_id`. Missing dirs are fine.
    pub fn remove(&self, analysis_id: &str) -> Result<()> {
        let dir = self.root.join(analysis_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", dir.display())),
        }
    }

    /// Keep a copy of a captured frame that has no file on disk yet.
    pub fn save_source(&self, analysis_id: &str, upload: &ImageUpload) -> Result<PathBuf> {
        let path = self.dir_for(analysis_id)?.join(&upload.filename);
        fs::write(&path, &upload.bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// 200x150 bounded thumbnail, PNG encoded.
    pub fn save_thumbnail(&self, analysis_id: &str, source: &[u8]) -> Result<PathBuf> {
        let image = image::load_from_memory(source).context("failed to decode source image")?;
        let thumbnail = image.thumbnail(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT);
        let path = self.dir_for(analysis_id)?.join("thumbnail.png");
        thumbnail
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("failed to write thumbnail {}", path.display()))?;
        Ok(path)
    }

    /// Store an image returned by the service, keeping its encoded bytes.
    pub fn save_reply_image(&self, analysis_id: &str, stem: &str, bytes: &[u8]) -> Result<PathBuf> {
        let format = image::guess_format(bytes)
            .with_context(|| format!("{stem} image is not a recognised format"))?;
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let path = self
            .dir_for(analysis_id)?
            .join(format!("{stem}.{extension}"));
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbImage::new(width, height);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = if x % 2 == 0 {
                Rgb([150, 60, 20])
            } else {
                Rgb([20, 20, 20])
            };
        }
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn reads_dimensions_from_png_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bolt_01.PNG");
        fs::write(&path, sample_png(40, 30)).unwrap();

        let upload = ImageUpload::from_path(&path).unwrap();
        assert_eq!(upload.filename, "Bolt_01.PNG");
        assert_eq!(upload.mime, "image/png");
        assert_eq!(upload.dimensions, Some((40, 30)));
        assert_eq!(upload.pixel_count(), Some(1200));
    }

    #[test]
    fn rejects_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.gif");
        fs::write(&path, b"GIF89a").unwrap();
        assert!(ImageUpload::from_path(&path).is_err());
    }

    #[test]
    fn captures_get_generated_names() {
        let upload = ImageUpload::from_capture(sample_png(8, 8)).unwrap();
        assert!(upload.filename.starts_with("capture_"));
        assert!(upload.filename.ends_with(".jpg"));
        assert!(ImageUpload::from_capture(Vec::new()).is_err());
    }

    #[test]
    fn writes_bounded_thumbnail_and_reply_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());

        let thumb = store
            .save_thumbnail("analysis-1", &sample_png(800, 600))
            .unwrap();
        let (w, h) = image::image_dimensions(&thumb).unwrap();
        assert!(w <= 200 && h <= 150);

        let overlay = store
            .save_reply_image("analysis-1", "overlay", &sample_png(4, 4))
            .unwrap();
        assert!(overlay.ends_with("overlay.png"));
        assert!(store
            .save_reply_image("analysis-1", "isolated", b"not an image")
            .is_err());
    }

    #[test]
    fn removing_artifacts_clears_the_record_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        let thumb = store.save_thumbnail("analysis-7", &sample_png(8, 8)).unwrap();

        store.remove("analysis-7").unwrap();
        assert!(!thumb.exists());
        assert!(!dir.path().join("analysis-7").exists());
        store.remove("analysis-7").unwrap();
    }
}
