use crate::capture::domain::frame_source::ImageHandle;
use crate::shared::bounding_box::{BoundingBox, Padding};
use crate::shared::error::CaptureError;

/// A request to cut one padded face out of a still.
#[derive(Clone, Debug, PartialEq)]
pub struct CropRequest {
    pub image: ImageHandle,
    pub bounding_box: BoundingBox,
    pub padding: Padding,
    /// Declared output size factor in `(0, 1]`. Pixel data is not resampled.
    pub scale: f64,
}

impl CropRequest {
    pub fn new(image: ImageHandle, bounding_box: BoundingBox, padding: Padding) -> Self {
        Self {
            image,
            bounding_box,
            padding,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

/// The padded face rectangle after clamping to the image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Pads `bounding_box` and intersects it with the image bounds.
    ///
    /// The result starts inside the image and never extends past its right
    /// or bottom edge. Fails with `InvalidRegion` when nothing is left.
    pub fn resolve(
        bounding_box: &BoundingBox,
        padding: &Padding,
        image_width: u32,
        image_height: u32,
    ) -> Result<Self, CaptureError> {
        let x = bounding_box.x as i64 - padding.left as i64;
        let y = bounding_box.y as i64 - padding.top as i64;
        let width = bounding_box.width as i64 + padding.left as i64 + padding.right as i64;
        let height = bounding_box.height as i64 + padding.top as i64 + padding.bottom as i64;

        let left = x.max(0);
        let top = y.max(0);
        let right = (x + width).min(image_width as i64);
        let bottom = (y + height).min(image_height as i64);

        if right - left <= 0 || bottom - top <= 0 {
            return Err(CaptureError::InvalidRegion {
                x,
                y,
                width,
                height,
                image_width,
                image_height,
            });
        }

        Ok(Self {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    /// Output dimensions declared to the encoder for `scale`.
    pub fn declared_size(&self, scale: f64) -> (u32, u32) {
        let w = (self.width as f64 * scale).floor() as u32;
        let h = (self.height as f64 * scale).floor() as u32;
        (w.max(1), h.max(1))
    }
}

pub fn validate_scale(scale: f64) -> Result<f64, CaptureError> {
    if scale.is_finite() && scale > 0.0 && scale <= 1.0 {
        Ok(scale)
    } else {
        Err(CaptureError::InvalidScale(scale))
    }
}

/// Copies `region` out of a row-major buffer whose rows are `stride` bytes
/// apart, one row at a time.
///
/// The result is tightly packed: `width * height * bytes_per_pixel` bytes.
pub fn extract_region(
    buffer: &[u8],
    stride: usize,
    bytes_per_pixel: usize,
    region: &CropRegion,
) -> Result<Vec<u8>, CaptureError> {
    let row_len = region.width as usize * bytes_per_pixel;
    let row_offset = region.x as usize * bytes_per_pixel;
    let rows = region.height as usize;
    let fits = rows > 0
        && row_len > 0
        && row_offset + row_len <= stride
        && (region.y as usize + rows - 1) * stride + row_offset + row_len <= buffer.len();

    if !fits {
        return Err(CaptureError::InvalidRegion {
            x: region.x as i64,
            y: region.y as i64,
            width: region.width as i64,
            height: region.height as i64,
            image_width: (stride / bytes_per_pixel.max(1)) as u32,
            image_height: (buffer.len() / stride.max(1)) as u32,
        });
    }

    let mut out = Vec::with_capacity(row_len * region.height as usize);
    for row in region.y as usize..(region.y + region.height) as usize {
        let start = row * stride + row_offset;
        out.extend_from_slice(&buffer[start..start + row_len]);
    }
    Ok(out)
}

/// Straight to premultiplied alpha, in place, for 4-channel pixels with
/// alpha last.
pub fn premultiply_alpha(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * a + 127) / 255) as u8;
        }
    }
}
