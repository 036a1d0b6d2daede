use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Primitive};
use ndarray::Array2;
use std::ops::Deref;

pub const FOREGROUND: u8 = 1;
pub const BACKGROUND: u8 = 0;

/// A strict {0, 1} region indicator on the pixel grid of its source image.
///
/// Stored row-major as `(height, width)`, so `mask[[y, x]] == 1` iff pixel `(x, y)`
/// belongs to the region of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    data: Array2<u8>,
}

fn first_channel_nonzero<P, C>(buffer: &ImageBuffer<P, C>) -> Array2<u8>
where
    P: Pixel,
    C: Deref<Target = [P::Subpixel]>,
{
    let (width, height) = buffer.dimensions();
    let zero = <P::Subpixel as Primitive>::DEFAULT_MIN_VALUE;
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let value = buffer.get_pixel(x as u32, y as u32).channels()[0];
        if value > zero {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}

impl BinaryMask {
    /// Binarize a decoded mask: the first channel decides, any value above zero is foreground.
    /// No resampling is done, the output has the input's exact width and height.
    pub fn from_image(image: &DynamicImage) -> Self {
        let data = match image {
            DynamicImage::ImageLuma8(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageLumaA8(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageRgb8(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageRgba8(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageLuma16(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageLumaA16(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageRgb16(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageRgba16(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageRgb32F(buffer) => first_channel_nonzero(buffer),
            DynamicImage::ImageRgba32F(buffer) => first_channel_nonzero(buffer),
            other => first_channel_nonzero(&other.to_rgba32f()),
        };
        Self { data }
    }

    /// Binarize an already decoded array, using the same `> 0` rule.
    pub fn from_array(values: &Array2<u8>) -> Self {
        Self {
            data: values.mapv(|v| if v > 0 { FOREGROUND } else { BACKGROUND }),
        }
    }

    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn as_array(&self) -> &Array2<u8> {
        &self.data
    }

    pub fn is_foreground(&self, x: usize, y: usize) -> bool {
        self.data[[y, x]] == FOREGROUND
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == FOREGROUND).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v == FOREGROUND)
    }

    /// Single-channel image holding the raw {0, 1} labels.
    pub fn to_label_image(&self) -> GrayImage {
        self.to_image_with_label(FOREGROUND)
    }

    /// Single-channel image with `label` on the region and 0 elsewhere.
    pub fn to_image_with_label(&self, label: u8) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            if self.data[[y as usize, x as usize]] == FOREGROUND {
                Luma([label])
            } else {
                Luma([BACKGROUND])
            }
        })
    }
}
