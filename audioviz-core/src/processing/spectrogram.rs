use std::sync::Arc;

/// Bytes per pixel (RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

/// Gradient stops at intensity 0, 0.25, 0.5, 0.75 and 1.0.
const GRADIENT: [[f32; 3]; 5] = [
    [12.0, 4.0, 32.0],    // near-black purple
    [40.0, 22.0, 140.0],  // deep blue
    [24.0, 110.0, 240.0], // blue
    [20.0, 210.0, 150.0], // cyan-green
    [255.0, 250.0, 160.0], // bright yellow/white
];

/// Map an intensity in `[0, 1]` to an opaque RGBA color.
///
/// Each quartile of intensity interpolates linearly between two stops.
pub fn intensity_color(intensity: f32) -> [u8; 4] {
    let t = if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 1.0) };
    let scaled = t * 4.0;
    let segment = (scaled as usize).min(3);
    let fraction = scaled - segment as f32;

    let from = GRADIENT[segment];
    let to = GRADIENT[segment + 1];
    let channel = |c: usize| (from[c] + (to[c] - from[c]) * fraction).round() as u8;

    [channel(0), channel(1), channel(2), 255]
}

/// Immutable copy of the spectrogram after a completed render.
///
/// Row-major RGBA, row 0 is the highest frequency, the rightmost column is
/// the most recent frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrogramImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Arc<Vec<u8>>,
}

impl SpectrogramImage {
    pub fn stride(&self) -> usize {
        self.width * BYTES_PER_PIXEL
    }

    /// RGBA of the pixel at column `x`, row `y`, or None when out of bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y * self.stride() + x * BYTES_PER_PIXEL;
        let p = &self.pixels[offset..offset + BYTES_PER_PIXEL];
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// Scrolling spectrogram: each [`render`](Self::render) shifts the image one
/// column left and paints the newest spectrum into the rightmost column.
///
/// The pixel grid is allocated on the first non-empty render and reused
/// afterwards; it is only reallocated when [`resize`](Self::resize) changes
/// the dimensions. Snapshots share the grid. A render copies it only while
/// an earlier snapshot is still held.
#[derive(Debug)]
pub struct SpectrogramRenderer {
    width: usize,
    height: usize,
    pixels: Arc<Vec<u8>>,
}

impl SpectrogramRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: Arc::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_allocated(&self) -> bool {
        !self.pixels.is_empty()
    }

    /// Change the image size. Existing content is discarded only when the
    /// size actually changes.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = Arc::default();
    }

    /// Release the pixel grid; the next render starts from a blank image.
    pub fn clear(&mut self) {
        self.pixels = Arc::default();
    }

    /// Grid length in bytes, or None if it does not fit in memory.
    fn byte_len(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(BYTES_PER_PIXEL)
            .filter(|&len| len <= isize::MAX as usize)
    }

    pub fn render(&mut self, intensities: &[f32]) {
        if intensities.is_empty() || self.width == 0 || self.height == 0 {
            return;
        }

        let Some(len) = self.byte_len() else {
            log::warn!("spectrogram {}x{} is too large to render", self.width, self.height);
            return;
        };
        let stride = self.width * BYTES_PER_PIXEL;
        if self.pixels.len() != len {
            self.pixels = Arc::new(vec![0; len]);
        }

        let height = self.height;
        let last = intensities.len() - 1;
        let pixels = Arc::make_mut(&mut self.pixels);
        for (row_index, row) in pixels.chunks_exact_mut(stride).enumerate() {
            row.copy_within(BYTES_PER_PIXEL.., 0);

            let index = Self::bin_for_row(row_index, height, last);
            let color = intensity_color(intensities[index]);
            row[stride - BYTES_PER_PIXEL..].copy_from_slice(&color);
        }
    }

    /// The current image; blank (all zero) before the first render.
    pub fn snapshot(&self) -> SpectrogramImage {
        let pixels = if self.is_allocated() {
            Arc::clone(&self.pixels)
        } else {
            Arc::new(vec![0u8; self.byte_len().unwrap_or(0)])
        };
        SpectrogramImage {
            width: self.width,
            height: self.height,
            pixels,
        }
    }

    /// Row 0 shows the highest bin, the bottom row the lowest.
    fn bin_for_row(row: usize, height: usize, last: usize) -> usize {
        let ratio = if height > 1 {
            1.0 - row as f32 / (height - 1) as f32
        } else {
            0.0
        };
        ((ratio * last as f32).round() as usize).min(last)
    }
}
