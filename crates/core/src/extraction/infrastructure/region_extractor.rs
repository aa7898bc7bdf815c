use std::io::Write;
use std::sync::Arc;

use crate::capture::domain::frame_source::ImageHandle;
use crate::extraction::domain::crop_region::{
    extract_region, premultiply_alpha, validate_scale, CropRegion, CropRequest,
};
use crate::extraction::domain::crop_storage::CropStorage;
use crate::extraction::infrastructure::image_codec::{
    decode_bgra, encode_bgra, CropEncoding, DecodedImage,
};
use crate::shared::error::CaptureError;

/// A crop written to storage.
#[derive(Clone, Debug, PartialEq)]
pub struct CropResult {
    pub handle: ImageHandle,
    /// Pixel dimensions of the encoded data.
    pub width: u32,
    pub height: u32,
    /// Dimensions after applying the requested scale.
    pub declared_width: u32,
    pub declared_height: u32,
    pub encoding: CropEncoding,
}

/// Cuts padded face regions out of stills and re-encodes them.
///
/// Holds no mutable state; one instance can serve several threads.
pub struct RegionExtractor {
    storage: Arc<dyn CropStorage>,
    encoding: CropEncoding,
}

impl RegionExtractor {
    pub fn new(storage: Arc<dyn CropStorage>) -> Self {
        Self {
            storage,
            encoding: CropEncoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: CropEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn encoding(&self) -> CropEncoding {
        self.encoding
    }

    pub fn decode(&self, image: &ImageHandle) -> Result<DecodedImage, CaptureError> {
        let bytes = std::fs::read(image.path()).map_err(|e| CaptureError::io(image.path(), e))?;
        decode_bgra(&bytes, image.path())
    }

    /// Decodes `request.image` and extracts one crop from it.
    pub fn extract(&self, request: &CropRequest) -> Result<CropResult, CaptureError> {
        validate_scale(request.scale)?;
        let decoded = self.decode(&request.image)?;
        self.extract_decoded(&decoded, request)
    }

    /// Extracts one crop from an already decoded still. `decoded` is only read.
    pub fn extract_decoded(
        &self,
        decoded: &DecodedImage,
        request: &CropRequest,
    ) -> Result<CropResult, CaptureError> {
        let scale = validate_scale(request.scale)?;
        let region = CropRegion::resolve(
            &request.bounding_box,
            &request.padding,
            decoded.width,
            decoded.height,
        )?;

        let mut pixels = extract_region(&decoded.data, decoded.stride, 4, &region)?;
        premultiply_alpha(&mut pixels);

        let handle = self.storage.create_unique(self.encoding.extension())?;
        if let Err(e) = self.write(&handle, &pixels, &region, decoded, scale) {
            if let Err(cleanup) = self.storage.remove(&handle) {
                log::warn!("Failed to discard partial crop {}: {cleanup}", handle.name());
            }
            return Err(e);
        }

        let (declared_width, declared_height) = region.declared_size(scale);
        log::debug!(
            "Cropped {}x{} at ({}, {}) -> {}",
            region.width,
            region.height,
            region.x,
            region.y,
            handle.name()
        );

        Ok(CropResult {
            handle,
            width: region.width,
            height: region.height,
            declared_width,
            declared_height,
            encoding: self.encoding,
        })
    }

    fn write(
        &self,
        handle: &ImageHandle,
        pixels: &[u8],
        region: &CropRegion,
        decoded: &DecodedImage,
        scale: f64,
    ) -> Result<(), CaptureError> {
        let mut out = self.storage.open_write(handle)?;
        encode_bgra(
            &mut out,
            pixels,
            region.width,
            region.height,
            self.encoding,
            &decoded.hints,
            scale,
        )?;
        out.flush().map_err(|e| CaptureError::io(handle.path(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::infrastructure::image_codec::read_dpi;
    use crate::extraction::infrastructure::temp_dir_storage::TempDirStorage;
    use crate::shared::bounding_box::{BoundingBox, Padding};
    use image::{Rgba, RgbaImage};
    use rstest::rstest;
    use std::path::Path;

    // ── Helpers ──────────────────────────────────────────────────────

    /// Every pixel encodes its own coordinates: `(x, y, 77, 255)`.
    fn write_marker_png(dir: &Path, width: u32, height: u32) -> ImageHandle {
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 77, 255]));
        let path = dir.join("still.png");
        img.save(&path).unwrap();
        ImageHandle::new(path)
    }

    fn extractor(dir: &Path, encoding: CropEncoding) -> RegionExtractor {
        let storage = TempDirStorage::new(dir.join("crops")).unwrap();
        RegionExtractor::new(Arc::new(storage)).with_encoding(encoding)
    }

    fn request(image: &ImageHandle, b: BoundingBox, pad: u32) -> CropRequest {
        CropRequest::new(image.clone(), b, Padding::uniform(pad))
    }

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_padded_face_yields_exact_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let still = write_marker_png(dir.path(), 200, 200);
        let extractor = extractor(dir.path(), CropEncoding::Png);

        let result = extractor
            .extract(&request(&still, BoundingBox::new(50, 50, 40, 40), 20))
            .unwrap();

        assert_eq!((result.width, result.height), (80, 80));
        assert_eq!((result.declared_width, result.declared_height), (80, 80));

        let crop = image::open(result.handle.path()).unwrap().to_rgba8();
        assert_eq!(crop.dimensions(), (80, 80));
        assert_eq!(crop.get_pixel(0, 0).0, [30, 30, 77, 255]);
        assert_eq!(crop.get_pixel(79, 79).0, [109, 109, 77, 255]);
        assert_eq!(crop.get_pixel(10, 3).0, [40, 33, 77, 255]);
    }

    #[test]
    fn test_corner_face_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let still = write_marker_png(dir.path(), 200, 200);
        let extractor = extractor(dir.path(), CropEncoding::Png);

        let result = extractor
            .extract(&request(&still, BoundingBox::new(0, 0, 10, 10), 20))
            .unwrap();

        assert_eq!((result.width, result.height), (30, 30));
        let crop = image::open(result.handle.path()).unwrap().to_rgba8();
        assert_eq!(crop.get_pixel(0, 0).0, [0, 0, 77, 255]);
    }

    #[rstest]
    #[case(BoundingBox::new(210, 10, 20, 20))]
    #[case(BoundingBox::new(10, 250, 20, 20))]
    fn test_face_outside_still_is_invalid(#[case] b: BoundingBox) {
        let dir = tempfile::tempdir().unwrap();
        let still = write_marker_png(dir.path(), 200, 200);
        let extractor = extractor(dir.path(), CropEncoding::Png);

        let err = extractor.extract(&request(&still, b, 0)).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidRegion { .. }));
        // Nothing was allocated in storage.
        assert_eq!(std::fs::read_dir(dir.path().join("crops")).unwrap().count(), 0);
    }

    // ── Scale ────────────────────────────────────────────────────────

    #[test]
    fn test_scale_changes_declared_size_and_density_only() {
        let dir = tempfile::tempdir().unwrap();
        let still = write_marker_png(dir.path(), 200, 200);
        let extractor = extractor(dir.path(), CropEncoding::default());

        let req = request(&still, BoundingBox::new(50, 50, 40, 40), 20).with_scale(0.5);
        let result = extractor.extract(&req).unwrap();

        assert_eq!((result.width, result.height), (80, 80));
        assert_eq!((result.declared_width, result.declared_height), (40, 40));

        let bytes = std::fs::read(result.handle.path()).unwrap();
        assert_eq!(read_dpi(&bytes), Some(192));
        let crop = image::load_from_memory(&bytes).unwrap();
        assert_eq!((crop.width(), crop.height()), (80, 80));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn test_invalid_scale_fails_before_decoding(#[case] scale: f64) {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), CropEncoding::Png);
        let missing = ImageHandle::new(dir.path().join("missing.png"));

        let req = request(&missing, BoundingBox::new(0, 0, 10, 10), 0).with_scale(scale);
        assert!(matches!(
            extractor.extract(&req),
            Err(CaptureError::InvalidScale(_))
        ));
    }

    // ── Source handling ──────────────────────────────────────────────

    #[test]
    fn test_source_is_not_mutated() {
        let dir = tempfile::tempdir().unwrap();
        let still = write_marker_png(dir.path(), 64, 48);
        let before = std::fs::read(still.path()).unwrap();
        let extractor = extractor(dir.path(), CropEncoding::default());

        let decoded = extractor.decode(&still).unwrap();
        let snapshot = decoded.data.clone();
        for i in 0..3 {
            extractor
                .extract_decoded(&decoded, &request(&still, BoundingBox::new(i * 10, 5, 12, 12), 4))
                .unwrap();
        }

        assert_eq!(decoded.data, snapshot);
        assert_eq!(std::fs::read(still.path()).unwrap(), before);
    }

    #[test]
    fn test_each_crop_gets_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let still = write_marker_png(dir.path(), 100, 100);
        let extractor = extractor(dir.path(), CropEncoding::default());
        let decoded = extractor.decode(&still).unwrap();

        let a = extractor
            .extract_decoded(&decoded, &request(&still, BoundingBox::new(10, 10, 20, 20), 0))
            .unwrap();
        let b = extractor
            .extract_decoded(&decoded, &request(&still, BoundingBox::new(10, 10, 20, 20), 0))
            .unwrap();

        assert_ne!(a.handle, b.handle);
        assert!(a.handle.name().ends_with(".jpg"));
    }

    #[test]
    fn test_strided_decode_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), CropEncoding::Png);

        // 4x2 image stored with 8 bytes of row padding.
        let stride = 4 * 4 + 8;
        let mut data = vec![0xEE; stride * 2];
        for y in 0..2 {
            for x in 0..4 {
                let i = y * stride + x * 4;
                data[i..i + 4].copy_from_slice(&[x as u8, y as u8, 9, 255]);
            }
        }
        let decoded = DecodedImage {
            data,
            width: 4,
            height: 2,
            stride,
            hints: Default::default(),
        };

        let still = ImageHandle::new(dir.path().join("unused.png"));
        let result = extractor
            .extract_decoded(&decoded, &request(&still, BoundingBox::new(1, 0, 2, 2), 0))
            .unwrap();

        let crop = image::open(result.handle.path()).unwrap().to_rgba8();
        assert_eq!(crop.dimensions(), (2, 2));
        // BGRA source, so the red channel holds the third byte.
        assert_eq!(crop.get_pixel(0, 0).0, [9, 0, 1, 255]);
        assert_eq!(crop.get_pixel(1, 1).0, [9, 1, 2, 255]);
    }

    #[test]
    fn test_decode_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), CropEncoding::Png);
        let err = extractor
            .decode(&ImageHandle::new(dir.path().join("nope.png")))
            .unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }));
    }

    #[test]
    fn test_extractor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RegionExtractor>();
    }
}
