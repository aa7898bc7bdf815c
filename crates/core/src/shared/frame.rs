use crate::shared::pixel_format::PixelFormat;

/// One sample from a live stream: tightly packed pixels in row-major order.
///
/// `index` is the position in arrival order and stands in for the capture
/// timestamp.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * format.bytes_per_pixel(),
            "data length must equal width * height * bytes_per_pixel"
        );
        Self {
            data,
            width,
            height,
            format,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Returns the frame in `target` format, consuming `self`.
    pub fn into_format(self, target: PixelFormat) -> Frame {
        if self.format == target {
            return self;
        }
        let data = self.format.convert(&self.data, target);
        Frame::new(data, self.width, self.height, target, self.index)
    }
}
