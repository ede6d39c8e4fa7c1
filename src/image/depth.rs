use std::path::Path;

use image::{ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::Array2;

use crate::error::{Error, Result};

/// Single channel depth image in raw sensor units.
///
/// Indexed by `(i, j)` in the same pixel space as `camera::coord_from_index`.
/// Zero, negative, or non-finite values mean "no data".
#[derive(Clone, Debug, PartialEq)]
pub struct DepthFrame {
    /// Depth values with shape `(height, width)`.
    pub data: Array2<f32>,
}

impl DepthFrame {
    /// Creates an empty frame, every pixel marked as no data.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Creates a frame from a row-major buffer.
    ///
    /// # Arguments
    ///
    /// * `width` - Number of columns.
    /// * `height` - Number of rows.
    /// * `values` - `width * height` depth samples.
    pub fn from_vec(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        let data = Array2::from_shape_vec((height, width), values).map_err(|err| {
            Error::invalid_input_frame(format!("Depth buffer does not match {width}x{height}: {err}"))
        })?;
        Ok(Self { data })
    }

    /// Converts a 16 bits depth image, as written by most RGB-D sensors.
    pub fn from_luma16(image: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        Self {
            data: Array2::from_shape_fn((height, width), |(j, i)| {
                image.get_pixel(i as u32, j as u32)[0] as f32
            }),
        }
    }

    /// Loads a 16 bits depth PNG.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path)?.into_luma16();
        Ok(Self::from_luma16(&image))
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Raw value at pixel `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[[j, i]]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        self.data[[j, i]] = value;
    }

    /// Whether the sample at `(i, j)` holds depth.
    pub fn is_valid(&self, i: usize, j: usize) -> bool {
        let value = self.get(i, j);
        value > 0.0 && value.is_finite()
    }

    /// Number of pixels with valid depth.
    pub fn valid_count(&self) -> usize {
        self.data
            .iter()
            .filter(|value| **value > 0.0 && value.is_finite())
            .count()
    }

    /// Debug view of the frame: red fades from 255 at `near` to 0 at `far`,
    /// pixels without depth are black.
    pub fn to_rgb_image(&self, near: f32, far: f32) -> RgbImage {
        let range = (far - near).max(f32::EPSILON);
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let (i, j) = (x as usize, y as usize);
            if !self.is_valid(i, j) {
                return Rgb([0, 0, 0]);
            }
            let scaled = ((self.get(i, j) - near) / range).clamp(0.0, 1.0);
            Rgb([255 - (scaled * 255.0).round() as u8, 0, 0])
        })
    }

    /// Fails with `InvalidInputFrame` if the frame is not `width x height`.
    pub fn check_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if self.width() != width || self.height() != height {
            return Err(Error::invalid_input_frame(format!(
                "Expected a {}x{} depth frame, got {}x{}",
                width,
                height,
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }
}
