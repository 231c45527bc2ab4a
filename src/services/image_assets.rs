use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, info, warn};

use crate::errors::UploadError;
use crate::models::{HexColor, ImageAsset, Rgba};

/// Larger uploads are downscaled before they are embedded in a certificate.
pub const MAX_ASSET_DIMENSION: u32 = 4096;

const COLOR_SAMPLE_DIMENSION: u32 = 64;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Any `image/*` type.
    Images,
    /// `text/csv`, or any file named `*.csv`.
    Csv,
}

impl Accept {
    fn matches(&self, name: &str, mime: &str) -> bool {
        match self {
            Accept::Images => mime.starts_with("image/"),
            Accept::Csv => mime == "text/csv" || name.to_lowercase().ends_with(".csv"),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Accept::Images => "image/*",
            Accept::Csv => ".csv",
        }
    }
}

/// Precondition checks applied before a file reaches the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadPolicy {
    pub accept: Accept,
    pub max_size_mb: Option<f64>,
}

impl UploadPolicy {
    pub fn logo() -> Self {
        Self {
            accept: Accept::Images,
            max_size_mb: Some(5.0),
        }
    }

    pub fn background() -> Self {
        Self {
            accept: Accept::Images,
            max_size_mb: Some(10.0),
        }
    }

    pub fn csv() -> Self {
        Self {
            accept: Accept::Csv,
            max_size_mb: None,
        }
    }

    pub fn check(&self, name: &str, mime: &str, size_bytes: u64) -> Result<(), UploadError> {
        if let Some(max_mb) = self.max_size_mb {
            let size_mb = size_bytes as f64 / BYTES_PER_MB;
            if size_mb > max_mb {
                return Err(UploadError::TooLarge {
                    name: name.to_string(),
                    size_mb,
                    max_mb,
                });
            }
        }

        if !self.accept.matches(name, mime) {
            return Err(UploadError::UnsupportedType {
                name: name.to_string(),
                mime: mime.to_string(),
                accept: self.accept.describe().to_string(),
            });
        }

        Ok(())
    }

    /// Reads a file after checking it against the policy. The MIME type is
    /// guessed from the extension.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, UploadError> {
        let io_err = |source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let meta = std::fs::metadata(path).map_err(io_err)?;
        let name = file_name(path);
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        self.check(&name, mime.essence_str(), meta.len())?;
        std::fs::read(path).map_err(io_err)
    }
}

pub fn load_image_asset(path: &Path, policy: &UploadPolicy) -> Result<ImageAsset, UploadError> {
    let bytes = policy.read(path)?;
    let asset = image_asset_from_bytes(&file_name(path), bytes)?;
    info!(
        "Loaded image {} ({}x{}, {})",
        asset.name, asset.width, asset.height, asset.mime
    );
    Ok(asset)
}

/// Decodes an upload and keeps it as PNG or JPEG so it can be embedded as-is.
/// Other formats, and anything larger than [`MAX_ASSET_DIMENSION`], are
/// re-encoded as PNG.
pub fn image_asset_from_bytes(name: &str, bytes: Vec<u8>) -> Result<ImageAsset, UploadError> {
    let decode_err = |source| UploadError::Decode {
        name: name.to_string(),
        source,
    };
    let format = image::guess_format(&bytes).map_err(decode_err)?;
    let mut decoded = image::load_from_memory_with_format(&bytes, format).map_err(decode_err)?;
    let (width, height) = decoded.dimensions();

    let oversized = width.max(height) > MAX_ASSET_DIMENSION;
    if oversized {
        debug!(
            "Downscaling {} from {}x{} to fit {}",
            name, width, height, MAX_ASSET_DIMENSION
        );
        decoded = decoded.resize(
            MAX_ASSET_DIMENSION,
            MAX_ASSET_DIMENSION,
            image::imageops::FilterType::Triangle,
        );
    }

    let (width, height) = decoded.dimensions();
    let (mime, bytes) = match format {
        ImageFormat::Png if !oversized => ("image/png", bytes),
        ImageFormat::Jpeg if !oversized => ("image/jpeg", bytes),
        _ => ("image/png", encode_png(&decoded).map_err(decode_err)?),
    };

    Ok(ImageAsset {
        name: name.to_string(),
        mime: mime.to_string(),
        width,
        height,
        bytes,
    })
}

/// Average color of the visible pixels of a logo. Falls back to the default
/// background color when the logo cannot be decoded or is fully transparent.
pub fn extract_dominant_color(asset: &ImageAsset) -> HexColor {
    let decoded = match image::load_from_memory(&asset.bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!("Color extraction failed for {}: {}", asset.name, err);
            return HexColor::default();
        }
    };

    let (width, height) = decoded.dimensions();
    let sample = if width.max(height) > COLOR_SAMPLE_DIMENSION {
        decoded.thumbnail(COLOR_SAMPLE_DIMENSION, COLOR_SAMPLE_DIMENSION)
    } else {
        decoded
    }
    .to_rgba8();
    let mut totals = [0u64; 3];
    let mut count = 0u64;
    for pixel in sample.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < 128 {
            continue;
        }
        totals[0] += r as u64;
        totals[1] += g as u64;
        totals[2] += b as u64;
        count += 1;
    }

    if count == 0 {
        warn!("Logo {} has no opaque pixels, using default color", asset.name);
        return HexColor::default();
    }

    let average = |total: u64| (total as f64 / count as f64).round() as u8;
    HexColor::from(Rgba::rgb(
        average(totals[0]),
        average(totals[1]),
        average(totals[2]),
    ))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba as Pixel};
    use std::io::Write;

    pub(crate) fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, Pixel(color));
        encode_png(&DynamicImage::ImageRgba8(buffer)).unwrap()
    }

    #[test]
    fn policy_rejects_large_files() {
        let err = UploadPolicy::logo()
            .check("logo.png", "image/png", 6 * 1024 * 1024)
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { max_mb, .. } if max_mb == 5.0));
        assert!(UploadPolicy::background()
            .check("bg.png", "image/png", 6 * 1024 * 1024)
            .is_ok());
    }

    #[test]
    fn policy_checks_type() {
        assert!(matches!(
            UploadPolicy::logo().check("notes.txt", "text/plain", 10),
            Err(UploadError::UnsupportedType { .. })
        ));
        assert!(UploadPolicy::csv().check("runners.CSV", "application/octet-stream", 10).is_ok());
        assert!(UploadPolicy::csv().check("export", "text/csv", u64::MAX).is_ok());
        assert!(UploadPolicy::csv().check("runners.txt", "text/plain", 10).is_err());
    }

    #[test]
    fn read_guesses_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&png_bytes(4, 4, [255, 0, 0, 255]))
            .unwrap();

        let asset = load_image_asset(&path, &UploadPolicy::logo()).unwrap();
        assert_eq!((asset.width, asset.height), (4, 4));
        assert_eq!(asset.mime, "image/png");

        let text_path = dir.path().join("logo.txt");
        std::fs::write(&text_path, b"hello").unwrap();
        assert!(matches!(
            load_image_asset(&text_path, &UploadPolicy::logo()),
            Err(UploadError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn undecodable_bytes_are_rejected() {
        assert!(matches!(
            image_asset_from_bytes("broken.png", b"not an image".to_vec()),
            Err(UploadError::Decode { .. })
        ));
    }

    #[test]
    fn oversized_images_are_downscaled() {
        let bytes = png_bytes(MAX_ASSET_DIMENSION * 2, 8, [0, 0, 0, 255]);
        let asset = image_asset_from_bytes("wide.png", bytes).unwrap();
        assert_eq!(asset.width, MAX_ASSET_DIMENSION);
        assert!(asset.height <= 8);
    }

    #[test]
    fn extracts_average_of_opaque_pixels() {
        let mut buffer = ImageBuffer::from_pixel(2, 1, Pixel([255, 0, 0, 255]));
        buffer.put_pixel(1, 0, Pixel([0, 0, 255, 0]));
        let bytes = encode_png(&DynamicImage::ImageRgba8(buffer)).unwrap();
        let asset = image_asset_from_bytes("logo.png", bytes).unwrap();
        assert_eq!(extract_dominant_color(&asset).to_string(), "#ff0000");
    }

    #[test]
    fn transparent_logo_falls_back_to_default() {
        let asset = image_asset_from_bytes("clear.png", png_bytes(3, 3, [10, 20, 30, 0])).unwrap();
        assert_eq!(extract_dominant_color(&asset), HexColor::default());
    }
}
