use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

/// JPEG quality used for lossy re-encoding (0.6 on a 0..1 scale).
pub const QUALITY: u8 = 60;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("compression task was cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Formats this build can decode and re-encode.
const REENCODED: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Re-encode an uploaded image to shrink it before it leaves the server.
///
/// JPEGs are re-encoded lossily at [`QUALITY`]; other formats are re-encoded
/// in their own format. If the result is not smaller than the input the
/// original bytes are kept. Image types outside [`REENCODED`] (SVG, BMP,
/// TIFF, HEIC, ...) pass through untouched. Bytes declared as a re-encoded
/// format that fail to decode are an error.
pub fn compress_image(bytes: &[u8], content_type: &str) -> Result<Compressed, CompressError> {
    let unchanged = || Compressed {
        bytes: bytes.to_vec(),
        content_type: content_type.to_owned(),
    };

    match ImageFormat::from_mime_type(content_type) {
        Some(declared) if REENCODED.contains(&declared) => {}
        _ => return Ok(unchanged()),
    }

    let format = image::guess_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?;

    let mut out = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, QUALITY);
            DynamicImage::ImageRgb8(decoded.to_rgb8()).write_with_encoder(encoder)?;
        }
        other => decoded.write_to(&mut Cursor::new(&mut out), other)?,
    }

    if out.len() >= bytes.len() {
        return Ok(unchanged());
    }

    Ok(Compressed {
        bytes: out,
        content_type: format.to_mime_type().to_owned(),
    })
}
