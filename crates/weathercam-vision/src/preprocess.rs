//! Turn a saved photo into the classifier's fixed input tensor.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;
use weathercam_core::InferenceError;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;
const CHANNELS: usize = 3;

/// `[batch, x, y, channel]`
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, CHANNELS];

/// Flattened `[1, 224, 224, 3]` float tensor with values in `[0, 1]`.
///
/// The second axis is the pixel column and the third the pixel row, so
/// element `[0][x][y][c]` holds channel `c` (0 red, 1 green, 2 blue) of the
/// pixel at `(x, y)`. The classifier was trained on this layout.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        INPUT_SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value of channel `c` at pixel `(x, y)`, `None` outside the tensor.
    pub fn get(&self, x: usize, y: usize, c: usize) -> Option<f32> {
        if x >= INPUT_SHAPE[1] || y >= INPUT_SHAPE[2] || c >= CHANNELS {
            return None;
        }
        self.data.get((x * INPUT_SHAPE[2] + y) * CHANNELS + c).copied()
    }

    /// Mean of one channel over the whole image.
    pub fn channel_mean(&self, c: usize) -> Option<f64> {
        if c >= CHANNELS {
            return None;
        }
        let sum: f64 = self
            .data
            .iter()
            .skip(c)
            .step_by(CHANNELS)
            .map(|v| f64::from(*v))
            .sum();
        Some(sum / (self.data.len() / CHANNELS) as f64)
    }
}

/// Decode the image at `path` and build the model input.
pub fn preprocess(path: &Path) -> Result<InputTensor, InferenceError> {
    let img = image::open(path)
        .map_err(|e| InferenceError::InvalidImage(format!("{}: {}", path.display(), e)))?;
    Ok(preprocess_image(&img))
}

/// Resize with bilinear filtering to 224x224 and scale each channel by 1/255.
pub fn preprocess_image(img: &DynamicImage) -> InputTensor {
    let resized = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let mut data = Vec::with_capacity(INPUT_SHAPE.iter().product());
    for x in 0..INPUT_SIZE {
        for y in 0..INPUT_SIZE {
            let pixel = resized.get_pixel(x, y);
            for channel in pixel.0 {
                data.push(f32::from(channel) / 255.0);
            }
        }
    }

    InputTensor { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) % 256) as u8,
            ])
        }))
    }

    #[test]
    fn test_shape_is_fixed() {
        let tensor = preprocess_image(&gradient(640, 480));
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
        assert_eq!(tensor.as_slice().len(), 224 * 224 * 3);
    }

    #[test]
    fn test_values_within_unit_range() {
        for img in [gradient(224, 224), gradient(1000, 300), solid(10, 10, [255, 255, 255])] {
            let tensor = preprocess_image(&img);
            assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_solid_blue_channel_means() {
        let tensor = preprocess_image(&solid(224, 224, [0, 0, 255]));
        assert!(tensor.channel_mean(0).unwrap() < 0.01);
        assert!(tensor.channel_mean(1).unwrap() < 0.01);
        assert!(tensor.channel_mean(2).unwrap() > 0.99);
    }

    #[test]
    fn test_channel_order_is_rgb() {
        let tensor = preprocess_image(&solid(50, 50, [255, 128, 0]));
        assert!((tensor.get(10, 20, 0).unwrap() - 1.0).abs() < 1e-6);
        assert!((tensor.get(10, 20, 1).unwrap() - 128.0 / 255.0).abs() < 1e-6);
        assert!(tensor.get(10, 20, 2).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_column_major_layout() {
        // left half black, right half white at native size: no resampling blur
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(224, 224, |x, _| {
            if x < 112 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let tensor = preprocess_image(&img);
        assert_eq!(tensor.get(0, 200, 0).unwrap(), 0.0);
        assert_eq!(tensor.get(223, 5, 0).unwrap(), 1.0);
        // first 224 pixels of the buffer are column x = 0
        assert!(tensor.as_slice()[..224 * 3].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_out_of_range_access_is_none() {
        let tensor = preprocess_image(&solid(224, 224, [10, 20, 30]));
        assert!(tensor.get(223, 223, 2).is_some());
        assert_eq!(tensor.get(224, 0, 0), None);
        assert_eq!(tensor.get(0, 224, 0), None);
        assert_eq!(tensor.get(0, 0, 3), None);
        assert_eq!(tensor.channel_mean(3), None);
    }

    #[test]
    fn test_preprocessing_is_deterministic() {
        let img = gradient(800, 600);
        let first = preprocess_image(&img);
        let second = preprocess_image(&img);
        let bits = |t: &InputTensor| t.as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_preprocess_from_jpeg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240101120000.jpg");
        solid(320, 240, [0, 0, 255]).save(&path).unwrap();

        let first = preprocess(&path).unwrap();
        let second = preprocess(&path).unwrap();
        assert_eq!(first, second);
        // JPEG chroma loss keeps blue dominant but not exact
        assert!(first.channel_mean(2).unwrap() > 0.9);
        assert!(first.channel_mean(0).unwrap() < 0.1);
    }

    #[test]
    fn test_preprocess_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        assert!(matches!(
            preprocess(&path),
            Err(InferenceError::InvalidImage(_))
        ));
    }
}
