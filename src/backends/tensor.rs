//! Tensor conversion shared by inference backends
//!
//! Input: stretch to the model's square side and normalise into NCHW.
//! Output: first spatial plane of the raw prediction turned into an 8-bit mask.

use crate::catalog::{MaskActivation, PreprocessingConfig};
use crate::error::{BgRemovalError, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use ndarray::{Array4, ArrayViewD};

/// Convert an RGB image into a normalised `[1, 3, S, S]` tensor
#[allow(clippy::indexing_slicing)]
#[must_use]
pub fn to_input_tensor(image: &RgbImage, preprocessing: &PreprocessingConfig) -> Array4<f32> {
    let side = preprocessing.input_size;
    let resized = imageops::resize(image, side, side, FilterType::Triangle);
    let side = side as usize;
    let mean = preprocessing.normalization_mean;
    let std = preprocessing.normalization_std;

    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    // Safe: tensor dimensions pre-allocated to match the resized image
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for channel in 0..3 {
            tensor[[0, channel, y, x]] =
                (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel];
        }
    }
    tensor
}

/// Turn raw model output into a mask of the output's spatial size
///
/// # Errors
/// - Output with fewer than two dimensions or an empty spatial plane
pub fn mask_from_output(output: &ArrayViewD<'_, f32>, activation: MaskActivation) -> Result<GrayImage> {
    let shape = output.shape();
    let (height, width) = match shape {
        [.., h, w] if *h > 0 && *w > 0 => (*h, *w),
        _ => {
            return Err(BgRemovalError::inference(format!(
                "Expected a mask output with spatial dimensions, got shape {shape:?}"
            )))
        },
    };

    let plane: Vec<f32> = output.iter().take(height * width).copied().collect();
    let values: Vec<f32> = match activation {
        MaskActivation::Sigmoid => plane.iter().map(|v| 1.0 / (1.0 + (-v).exp())).collect(),
        MaskActivation::MinMax => {
            let min = plane.iter().copied().fold(f32::INFINITY, f32::min);
            let max = plane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let range = max - min;
            if range > f32::EPSILON {
                plane.iter().map(|v| (v - min) / range).collect()
            } else {
                plane.iter().map(|v| v.clamp(0.0, 1.0)).collect()
            }
        },
    };

    let bytes: Vec<u8> = values
        .iter()
        .map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    GrayImage::from_raw(width as u32, height as u32, bytes)
        .ok_or_else(|| BgRemovalError::inference("Mask buffer does not match output dimensions"))
}

/// Resize `mask` to the image and attach it as the alpha channel
#[must_use]
pub fn attach_mask(image: &RgbImage, mask: &GrayImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let mask = if mask.dimensions() == (width, height) {
        mask.clone()
    } else {
        imageops::resize(mask, width, height, FilterType::Lanczos3)
    };

    RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let Luma([alpha]) = *mask.get_pixel(x, y);
        Rgba([r, g, b, alpha])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelDescriptor;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_input_tensor_shape_and_normalisation() {
        let descriptor = ModelDescriptor::local("tiny-model", 1, "tiny-model");
        let image = RgbImage::from_pixel(40, 10, image::Rgb([255, 0, 128]));
        let tensor = to_input_tensor(&image, &descriptor.preprocessing);

        assert_eq!(tensor.dim(), (1, 3, 320, 320));
        let expected_r = (1.0 - 0.485) / 0.229;
        let expected_g = (0.0 - 0.456) / 0.224;
        assert!((tensor[[0, 0, 5, 5]] - expected_r).abs() < 1e-4);
        assert!((tensor[[0, 1, 300, 17]] - expected_g).abs() < 1e-4);
    }

    #[test]
    fn test_mask_min_max() {
        let output = ArrayD::from_shape_vec(IxDyn(&[1, 1, 2, 2]), vec![-2.0, 0.0, 2.0, 6.0]).unwrap();
        let mask = mask_from_output(&output.view(), MaskActivation::MinMax).unwrap();
        assert_eq!(mask.dimensions(), (2, 2));
        assert_eq!(mask.as_raw(), &vec![0, 64, 128, 255]);
    }

    #[test]
    fn test_mask_sigmoid() {
        let output = ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![0.0, 20.0]).unwrap();
        let mask = mask_from_output(&output.view(), MaskActivation::Sigmoid).unwrap();
        assert_eq!(mask.as_raw(), &vec![128, 255]);
    }

    #[test]
    fn test_mask_flat_output_and_bad_shape() {
        let flat = ArrayD::from_elem(IxDyn(&[1, 1, 3, 3]), 1.0_f32);
        let mask = mask_from_output(&flat.view(), MaskActivation::MinMax).unwrap();
        assert!(mask.pixels().all(|p| p.0 == [255]));

        let vector = ArrayD::from_elem(IxDyn(&[4]), 1.0_f32);
        assert!(mask_from_output(&vector.view(), MaskActivation::MinMax).is_err());
    }

    #[test]
    fn test_attach_mask_resizes_to_image() {
        let image = RgbImage::from_pixel(8, 6, image::Rgb([10, 20, 30]));
        let mask = GrayImage::from_pixel(2, 2, Luma([200]));
        let rgba = attach_mask(&image, &mask);
        assert_eq!(rgba.dimensions(), (8, 6));
        assert!(rgba.pixels().all(|p| p.0[..3] == [10, 20, 30]));
        assert!(rgba.pixels().all(|p| p.0[3] == 200));
    }
}
