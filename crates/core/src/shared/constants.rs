/// Cosmetic margin added to overlay boxes before scaling. Unrelated to crop
/// padding.
pub const OVERLAY_PADDING: u32 = 50;

/// Overlay outline colour (RGBA) and stroke thickness in display pixels.
pub const OVERLAY_STROKE_RGBA: [u8; 4] = [255, 255, 0, 255];
pub const OVERLAY_STROKE_WIDTH: u32 = 5;

pub const DEFAULT_CROP_PADDING: u32 = 20;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Pixel density assumed when the source carries none.
pub const DEFAULT_DPI: u16 = 96;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
