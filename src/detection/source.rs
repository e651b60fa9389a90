use std::path::Path;

use image::{DynamicImage, ImageReader, RgbaImage};

use crate::error::ScanError;

/// Decode a scan from disk into an RGBA raster.
pub fn load_scan<P: AsRef<Path>>(path: P) -> Result<RgbaImage, ScanError> {
    let img = ImageReader::open(path.as_ref())?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ScanError::Decode(format!("{}: {}", path.as_ref().display(), e)))?;
    from_dynamic(img)
}

/// Decode an encoded scan (PNG, JPEG, ...) held in memory.
pub fn decode_scan(bytes: &[u8]) -> Result<RgbaImage, ScanError> {
    let img = image::load_from_memory(bytes).map_err(|e| ScanError::Decode(e.to_string()))?;
    from_dynamic(img)
}

/// Convert an already-decoded image, rejecting zero-sized rasters.
pub fn from_dynamic(img: DynamicImage) -> Result<RgbaImage, ScanError> {
    let rgba = img.into_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(ScanError::EmptyImage { width, height });
    }
    Ok(rgba)
}
