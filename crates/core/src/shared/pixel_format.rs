use serde::{Deserialize, Serialize};

/// Pixel layouts understood by sources and analyzers.
///
/// All formats are 8 bits per channel and tightly packed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Bgra8,
    Rgba8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub const ALL: &[PixelFormat] = &[
        PixelFormat::Bgra8,
        PixelFormat::Rgba8,
        PixelFormat::Rgb8,
        PixelFormat::Gray8,
    ];

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Converts a tightly packed buffer from `self` to `target`.
    ///
    /// Gray output uses BT.601 luma. Channels that do not exist in the
    /// source (alpha) are filled opaque.
    pub fn convert(self, data: &[u8], target: PixelFormat) -> Vec<u8> {
        if self == target {
            return data.to_vec();
        }
        let src_bpp = self.bytes_per_pixel();
        let dst_bpp = target.bytes_per_pixel();
        let pixels = data.len() / src_bpp;
        let mut out = Vec::with_capacity(pixels * dst_bpp);
        for px in data.chunks_exact(src_bpp) {
            let [r, g, b, a] = self.to_rgba(px);
            match target {
                PixelFormat::Bgra8 => out.extend_from_slice(&[b, g, r, a]),
                PixelFormat::Rgba8 => out.extend_from_slice(&[r, g, b, a]),
                PixelFormat::Rgb8 => out.extend_from_slice(&[r, g, b]),
                PixelFormat::Gray8 => out.push(luma(r, g, b)),
            }
        }
        out
    }

    fn to_rgba(self, px: &[u8]) -> [u8; 4] {
        match self {
            PixelFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
            PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
            PixelFormat::Rgb8 => [px[0], px[1], px[2], 255],
            PixelFormat::Gray8 => [px[0], px[0], px[0], 255],
        }
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((y + 500) / 1000) as u8
}
