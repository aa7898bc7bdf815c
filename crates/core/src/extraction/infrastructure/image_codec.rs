use std::io::{Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::codecs::png::PngEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageError, ImageReader,
};
use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_DPI, DEFAULT_JPEG_QUALITY};
use crate::shared::error::CaptureError;

/// Metadata carried from the source still onto every crop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncoderHints {
    pub icc_profile: Option<Vec<u8>>,
    /// Horizontal pixel density in dots per inch.
    pub dpi: Option<u16>,
}

/// A fully decoded still: BGRA8, straight alpha, original resolution.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows.
    pub stride: usize,
    pub hints: EncoderHints,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum CropEncoding {
    Jpeg { quality: u8 },
    Png,
}

impl CropEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            CropEncoding::Jpeg { .. } => ".jpg",
            CropEncoding::Png => ".png",
        }
    }
}

impl Default for CropEncoding {
    fn default() -> Self {
        CropEncoding::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Decodes an encoded still into BGRA8 with straight alpha.
///
/// EXIF orientation is not applied: pixel rows stay in stored order so
/// bounding boxes computed on the raw frame still line up.
pub fn decode_bgra(bytes: &[u8], path: &Path) -> Result<DecodedImage, CaptureError> {
    let decode_err = |source| CaptureError::DecodeFailure {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CaptureError::io(path, e))?;
    let mut decoder = reader.into_decoder().map_err(decode_err)?;
    let icc_profile = decoder.icc_profile().unwrap_or_default();
    let image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    Ok(DecodedImage {
        data,
        width,
        height,
        stride: width as usize * 4,
        hints: EncoderHints {
            icc_profile,
            dpi: read_dpi(bytes),
        },
    })
}

/// Encodes a tightly packed premultiplied BGRA8 buffer.
///
/// The pixel data is written as is; `scale` only lowers the declared
/// physical size by raising the stored density to `source_dpi / scale`.
pub fn encode_bgra(
    writer: &mut dyn Write,
    pixels: &[u8],
    width: u32,
    height: u32,
    encoding: CropEncoding,
    hints: &EncoderHints,
    scale: f64,
) -> Result<(), CaptureError> {
    if pixels.len() != width as usize * height as usize * 4 {
        return Err(CaptureError::EncodeFailure(ImageError::Parameter(
            ParameterError::from_kind(ParameterErrorKind::DimensionMismatch),
        )));
    }

    match encoding {
        CropEncoding::Jpeg { quality } => {
            // Premultiplied colour is already composited over black.
            let rgb: Vec<u8> = pixels
                .chunks_exact(4)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect();

            let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            encoder.set_pixel_density(PixelDensity::dpi(scaled_dpi(hints.dpi, scale)));
            attach_icc(&mut encoder, hints);
            encoder
                .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                .map_err(CaptureError::EncodeFailure)
        }
        CropEncoding::Png => {
            let mut rgba = pixels.to_vec();
            unpremultiply_alpha(&mut rgba);
            for px in rgba.chunks_exact_mut(4) {
                px.swap(0, 2);
            }

            let mut encoder = PngEncoder::new(writer);
            attach_icc(&mut encoder, hints);
            encoder
                .write_image(&rgba, width, height, ExtendedColorType::Rgba8)
                .map_err(CaptureError::EncodeFailure)
        }
    }
}

fn attach_icc(encoder: &mut impl ImageEncoder, hints: &EncoderHints) {
    if let Some(icc) = &hints.icc_profile {
        if let Err(e) = encoder.set_icc_profile(icc.clone()) {
            log::debug!("ICC profile dropped: {e}");
        }
    }
}

fn scaled_dpi(source_dpi: Option<u16>, scale: f64) -> u16 {
    let dpi = source_dpi.unwrap_or(DEFAULT_DPI) as f64 / scale;
    dpi.round().clamp(1.0, u16::MAX as f64) as u16
}

/// Premultiplied to straight alpha for PNG output; fully transparent pixels
/// become black.
fn unpremultiply_alpha(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = if a == 0 {
                0
            } else {
                ((*c as u32 * 255 + a / 2) / a).min(255) as u8
            };
        }
    }
}

/// Horizontal density of a JPEG (JFIF APP0) or PNG (pHYs) in dots per inch.
pub fn read_dpi(bytes: &[u8]) -> Option<u16> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        jfif_dpi(bytes)
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        png_dpi(bytes)
    } else {
        None
    }
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn jfif_dpi(bytes: &[u8]) -> Option<u16> {
    let mut i = 2;
    while bytes.get(i) == Some(&0xFF) {
        let marker = *bytes.get(i + 1)?;
        // Start of scan: no more metadata segments.
        if marker == 0xDA {
            return None;
        }
        let len = be_u16(bytes, i + 2)? as usize;
        let body = bytes.get(i + 4..i + 2 + len)?;
        if marker == 0xE0 && body.starts_with(b"JFIF\0") && body.len() >= 12 {
            let units = body[7];
            let x_density = be_u16(body, 8)?;
            return match units {
                1 => Some(x_density),
                2 => Some((x_density as f64 * 2.54).round() as u16),
                _ => None,
            };
        }
        i += 2 + len;
    }
    None
}

fn png_dpi(bytes: &[u8]) -> Option<u16> {
    let mut i = 8;
    while i + 8 <= bytes.len() {
        let len = be_u32(bytes, i)? as usize;
        let kind = bytes.get(i + 4..i + 8)?;
        if kind == b"IDAT" {
            return None;
        }
        if kind == b"pHYs" {
            let body = bytes.get(i + 8..i + 8 + len)?;
            let per_unit = be_u32(body, 0)?;
            // Unit 1 is metres.
            return (body.get(8) == Some(&1))
                .then(|| (per_unit as f64 * 0.0254).round() as u16);
        }
        i += 12 + len;
    }
    None
}
