//! Image loading and conversion to CNN input tensors.
//!
//! The networks were exported from Keras, so inputs are NHWC
//! `[1, 224, 224, 3]` float tensors. Resizing matches Keras' `load_img`
//! default (nearest neighbour, aspect ratio not preserved).

use std::path::Path;

use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{DynamicImage, GrayImage, Luma};

use crate::error::VisionResult;

/// Spatial input size shared by ResNet50 and the Xception extractor.
pub const INPUT_SIZE: u32 = 224;

/// ImageNet channel means in BGR order, as used by Keras `caffe` preprocessing.
pub const IMAGENET_BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

/// Keras `preprocess_input` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocess {
    /// RGB -> BGR, subtract ImageNet means, no scaling (ResNet50).
    Caffe,
    /// Scale to [-1, 1] (Xception).
    Tf,
}

/// A dense NHWC tensor ready to hand to ONNX Runtime.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

/// Decode an image file. The format is sniffed from the content, so a PNG
/// saved as `.jpg` still decodes; the extension is only a fallback.
pub fn load_image(path: &Path) -> VisionResult<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image)
}

/// Convert an image to a `[1, size, size, 3]` tensor.
pub fn to_tensor(img: &DynamicImage, size: u32, mode: Preprocess) -> ImageTensor {
    let resized = img.resize_exact(size, size, FilterType::Nearest).to_rgb8();
    let (w, h) = (size as usize, size as usize);

    let mut data = Vec::with_capacity(h * w * 3);
    for pixel in resized.pixels() {
        let [r, g, b] = pixel.0;
        match mode {
            Preprocess::Caffe => {
                data.push(b as f32 - IMAGENET_BGR_MEAN[0]);
                data.push(g as f32 - IMAGENET_BGR_MEAN[1]);
                data.push(r as f32 - IMAGENET_BGR_MEAN[2]);
            }
            Preprocess::Tf => {
                data.push(r as f32 / 127.5 - 1.0);
                data.push(g as f32 / 127.5 - 1.0);
                data.push(b as f32 / 127.5 - 1.0);
            }
        }
    }

    ImageTensor {
        shape: [1, h, w, 3],
        data,
    }
}

/// Grayscale with the BT.601 weights OpenCV's `COLOR_BGR2GRAY` applies.
///
/// `DynamicImage::to_luma8` uses Rec. 709 weights, which shifts cascade
/// responses enough to change borderline detections.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let v = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        gray.put_pixel(x, y, Luma([v.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}

/// Index of the largest value. NaNs never win.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([r, g, b])))
    }

    #[test]
    fn test_tensor_shape() {
        let t = to_tensor(&solid(0, 0, 0), INPUT_SIZE, Preprocess::Tf);
        assert_eq!(t.shape, [1, 224, 224, 3]);
        assert_eq!(t.data.len(), 224 * 224 * 3);
    }

    #[test]
    fn test_caffe_mode_swaps_channels_and_centers() {
        let t = to_tensor(&solid(200, 100, 50), 4, Preprocess::Caffe);
        assert!((t.data[0] - (50.0 - 103.939)).abs() < 1e-4);
        assert!((t.data[1] - (100.0 - 116.779)).abs() < 1e-4);
        assert!((t.data[2] - (200.0 - 123.68)).abs() < 1e-4);
    }

    #[test]
    fn test_tf_mode_scales_to_unit_range() {
        let t = to_tensor(&solid(0, 255, 0), 2, Preprocess::Tf);
        assert_eq!(&t.data[..3], &[-1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_grayscale_uses_bt601_weights() {
        let gray = to_grayscale(&solid(255, 0, 0));
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        let gray = to_grayscale(&solid(0, 255, 0));
        assert_eq!(gray.get_pixel(0, 0).0[0], 150);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.5]), Some(1));
        assert_eq!(argmax(&[0.3, 0.3]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_load_image_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(err.is_bad_input());
    }

    #[test]
    fn test_load_image_ignores_misleading_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001-photo.jpg");
        let mut png = Vec::new();
        solid(10, 200, 30)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();
        std::fs::write(&path, png).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!((img.width(), img.height()), (40, 30));
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [10, 200, 30]);
    }
}
