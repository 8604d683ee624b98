//! Raster data types

/// Decoded single-band sensor frame
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// Raw sensor counts, row-major
    pub data: Vec<u16>,
    /// Bits per sample of the TIFF container
    pub bits_per_sample: u32,
}

impl RawFrame {
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.width + x]
    }
}

/// Single-band floating point raster (radiance, reflectance, temperature)
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { width, height, data }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self::new(width, height, vec![0.0; width * height])
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Multiplies every pixel by `factor`, in place.
    pub fn scale(&mut self, factor: f64) {
        for value in &mut self.data {
            *value = (*value as f64 * factor) as f32;
        }
    }
}
