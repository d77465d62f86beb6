use std::io::Cursor;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, RgbImage};

pub const JPEG_MIME: &str = "image/jpeg";
pub const WEBM_MIME: &str = "video/webm";

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Largest centered square of the frame.
pub fn crop_square(frame: &DynamicImage) -> DynamicImage {
    let (width, height) = (frame.width(), frame.height());
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    frame.crop_imm(x, y, side, side)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb: RgbImage = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut bytes), quality.clamp(1, 100))
        .encode_image(&rgb)
        .context("failed to encode jpeg")?;
    Ok(bytes)
}

/// Turns raw frames into self-contained media payloads.
#[derive(Debug, Clone, Copy)]
pub struct CapturePipeline {
    pub jpeg_quality: u8,
}

impl CapturePipeline {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    /// Square-cropped JPEG data URI. Frames that are not ready are refused.
    pub fn photo_payload(&self, frame: Option<DynamicImage>) -> Result<String> {
        let Some(frame) = frame else {
            bail!("frame source is not ready");
        };
        if frame.width() == 0 || frame.height() == 0 {
            bail!("frame has zero dimension");
        }

        let square = crop_square(&frame);
        let bytes = encode_jpeg(&square, self.jpeg_quality)?;
        Ok(to_data_uri(JPEG_MIME, &bytes))
    }

    pub fn video_payload(&self, clip: &[u8]) -> Result<String> {
        if clip.is_empty() {
            bail!("recorder produced an empty clip");
        }
        Ok(to_data_uri(WEBM_MIME, clip))
    }
}
