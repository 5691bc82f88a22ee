// ============================================================================
// SFE DOCUMENT FORMAT + IMAGE I/O
// ============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use egui::{Rect, pos2, vec2};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::canvas::CanvasState;
use crate::ops::sticker::{StickerState, StickerView};
use crate::ops::transform::OriginAngle;

/// Magic header for the sticker document format (v1).
const SFE_MAGIC_V1: &str = "SFE1";

// ---------------------------------------------------------------------------
//  Serializable structures
// ---------------------------------------------------------------------------

/// Raw RGBA pixels with dimensions.
#[derive(Serialize, Deserialize)]
struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageData {
    fn from_image(img: &RgbaImage) -> Self {
        ImageData {
            width: img.width(),
            height: img.height(),
            pixels: img.as_raw().clone(),
        }
    }

    fn into_image(self) -> Result<RgbaImage, SfeError> {
        RgbaImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| SfeError::InvalidFormat("pixel buffer does not match dimensions".into()))
    }
}

/// One sticker's snapshot: the image plus every placement quantity needed to
/// reconstruct it identically.
#[derive(Serialize, Deserialize)]
struct StickerData {
    image: ImageData,
    origin_scale: f32,
    origin_angle: OriginAngle,
    /// min x, min y, width, height.
    origin_frame: [f32; 4],
    ges_scale: f32,
    ges_rotation: f32,
    total_translation: [f32; 2],
}

impl StickerData {
    fn from_state(state: &StickerState) -> Self {
        StickerData {
            image: ImageData::from_image(&state.image),
            origin_scale: state.origin_scale,
            origin_angle: state.origin_angle,
            origin_frame: [
                state.origin_frame.min.x,
                state.origin_frame.min.y,
                state.origin_frame.width(),
                state.origin_frame.height(),
            ],
            ges_scale: state.ges_scale,
            ges_rotation: state.ges_rotation,
            total_translation: [state.total_translation.x, state.total_translation.y],
        }
    }

    fn into_state(self) -> Result<StickerState, SfeError> {
        let [x, y, w, h] = self.origin_frame;
        Ok(StickerState {
            image: self.image.into_image()?,
            origin_scale: self.origin_scale,
            origin_angle: self.origin_angle,
            origin_frame: Rect::from_min_size(pos2(x, y), vec2(w, h)),
            ges_scale: self.ges_scale,
            ges_rotation: self.ges_rotation,
            total_translation: vec2(self.total_translation[0], self.total_translation[1]),
        })
    }
}

/// V1 serializable document: the photo plus the sticker stack in z-order.
#[derive(Serialize, Deserialize)]
struct DocumentFileV1 {
    magic: String,
    width: u32,
    height: u32,
    photo: ImageData,
    stickers: Vec<StickerData>,
}

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Error type for document file operations.
#[derive(Debug)]
pub enum SfeError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
    Image(String),
}

impl std::fmt::Display for SfeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SfeError::Io(e) => write!(f, "I/O error: {}", e),
            SfeError::Serialize(e) => write!(f, "Serialization error: {}", e),
            SfeError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
            SfeError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for SfeError {}

impl From<std::io::Error> for SfeError {
    fn from(e: std::io::Error) -> Self {
        SfeError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SfeError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SfeError::Serialize(e.to_string())
    }
}

impl From<image::ImageError> for SfeError {
    fn from(e: image::ImageError) -> Self {
        SfeError::Image(e.to_string())
    }
}

// ---------------------------------------------------------------------------
//  Save / load
// ---------------------------------------------------------------------------

/// Save a canvas as a .sfe document.
pub fn save_sfe(state: &CanvasState, path: &Path) -> Result<(), SfeError> {
    let doc = DocumentFileV1 {
        magic: SFE_MAGIC_V1.to_string(),
        width: state.width,
        height: state.height,
        photo: ImageData::from_image(&state.photo),
        stickers: state
            .stickers
            .iter()
            .map(|s| StickerData::from_state(&s.state()))
            .collect(),
    };

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &doc)?;
    Ok(())
}

/// Load a .sfe document back into a canvas. Every sticker is reconstructed
/// from its snapshot with the chrome hidden and no countdown running.
pub fn load_sfe(path: &Path) -> Result<CanvasState, SfeError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let doc: DocumentFileV1 = bincode::deserialize_from(reader)?;

    if doc.magic != SFE_MAGIC_V1 {
        return Err(SfeError::InvalidFormat(format!(
            "unknown document header '{}'",
            doc.magic
        )));
    }

    let photo = doc.photo.into_image()?;
    if photo.dimensions() != (doc.width, doc.height) {
        return Err(SfeError::InvalidFormat(
            "photo dimensions disagree with document header".into(),
        ));
    }

    let mut state = CanvasState::new(photo);
    for sticker in doc.stickers {
        state
            .stickers
            .push(StickerView::from_state(sticker.into_state()?));
    }
    Ok(state)
}

// ---------------------------------------------------------------------------
//  Photo loading + flat export
// ---------------------------------------------------------------------------

/// Decode a photo from disk into RGBA.
pub fn load_photo(path: &Path) -> Result<RgbaImage, SfeError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Decode a sticker image from disk into RGBA.
pub fn load_sticker_image(path: &Path) -> Result<RgbaImage, SfeError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Output formats for the flattened export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    /// Infer the format from a file extension, defaulting to PNG.
    pub fn from_path(path: &Path) -> ExportFormat {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "jpg" | "jpeg" => ExportFormat::Jpeg,
            _ => ExportFormat::Png,
        }
    }
}

/// Encode and write a flattened image.
pub fn export_image(
    img: &RgbaImage,
    path: &Path,
    format: ExportFormat,
    quality: u8,
) -> Result<(), SfeError> {
    match format {
        ExportFormat::Png => {
            img.save_with_format(path, image::ImageFormat::Png)?;
        }
        ExportFormat::Jpeg => {
            // JPEG has no alpha channel; flatten onto opaque first.
            let rgb = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::time::Instant;
    use uuid::Uuid;

    fn temp_path(ext: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("stickerfe_test_{}.{}", Uuid::new_v4(), ext))
    }

    #[test]
    fn test_sfe_round_trip() {
        let photo = RgbaImage::from_pixel(320, 240, Rgba([5, 6, 7, 255]));
        let mut state = CanvasState::new(photo);
        let sticker_img = RgbaImage::from_pixel(64, 32, Rgba([250, 1, 2, 255]));
        state.add_sticker(sticker_img, 1.0, OriginAngle::Deg90, Instant::now());

        let path = temp_path("sfe");
        save_sfe(&state, &path).expect("save succeeds");
        let loaded = load_sfe(&path).expect("load succeeds");
        let _ = std::fs::remove_file(&path);

        assert_eq!((loaded.width, loaded.height), (320, 240));
        assert_eq!(loaded.stickers.len(), 1);

        let original = state.stickers[0].state();
        let restored = loaded.stickers[0].state();
        assert_eq!(restored.origin_angle, OriginAngle::Deg90);
        assert!((restored.origin_scale - original.origin_scale).abs() < 1e-6);
        assert_eq!(restored.origin_frame, original.origin_frame);
        assert_eq!(restored.image.dimensions(), (64, 32));
        assert!(!loaded.stickers[0].chrome_visible());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let path = temp_path("sfe");
        std::fs::write(&path, b"not a document").unwrap();
        let result = load_sfe(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_export_format_inference() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out.JPG")),
            ExportFormat::Jpeg
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("out.png")),
            ExportFormat::Png
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("out")),
            ExportFormat::Png
        );
    }

    #[test]
    fn test_export_png_writes_file() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 255]));
        let path = temp_path("png");
        export_image(&img, &path, ExportFormat::Png, 90).expect("export succeeds");
        let reloaded = load_photo(&path).expect("reload succeeds");
        let _ = std::fs::remove_file(&path);
        assert_eq!(reloaded.dimensions(), (16, 16));
    }
}
