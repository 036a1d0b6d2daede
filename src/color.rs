use image::{DynamicImage, GrayImage, Luma, Pixel, Primitive};
use ndarray::Array2;

// ITU-R 709 luma weights for linear RGB.
const LUMA_R: f64 = 0.2125;
const LUMA_G: f64 = 0.7154;
const LUMA_B: f64 = 0.0721;

/// Scale a subpixel into [0, 1] using the maximum of its type.
fn unit_scale<T: Primitive>(value: T) -> f64 {
    let max = T::DEFAULT_MAX_VALUE.to_f64().unwrap_or(1.0);
    value.to_f64().unwrap_or(0.0) / max
}

fn unit_to_u8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * u8::MAX as f64).round_ties_even() as u8
}

fn luma_of<P>(pixel: &P) -> f64
where
    P: Pixel,
{
    let channels = pixel.channels();
    match channels.len() {
        // Gray or gray + alpha
        1 | 2 => unit_scale(channels[0]),
        // RGB, alpha ignored
        _ => {
            LUMA_R * unit_scale(channels[0])
                + LUMA_G * unit_scale(channels[1])
                + LUMA_B * unit_scale(channels[2])
        }
    }
}

fn gray_from_buffer<P, C>(buffer: &image::ImageBuffer<P, C>) -> GrayImage
where
    P: Pixel,
    C: std::ops::Deref<Target = [P::Subpixel]>,
{
    let (width, height) = buffer.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([unit_to_u8(luma_of(buffer.get_pixel(x, y)))])
    })
}

/// Convert any decoded image into an 8-bit grayscale image.
///
/// Color images are reduced with luma weights on the unit-scaled channels, then every
/// image is rescaled to the full `u8` range and rounded half to even. 8-bit gray images
/// pass through unchanged.
pub fn to_gray8(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(buffer) => buffer.clone(),
        DynamicImage::ImageLumaA8(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageRgb8(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageRgba8(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageLuma16(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageLumaA16(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageRgb16(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageRgba16(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageRgb32F(buffer) => gray_from_buffer(buffer),
        DynamicImage::ImageRgba32F(buffer) => gray_from_buffer(buffer),
        other => gray_from_buffer(&other.to_rgb32f()),
    }
}

/// Gray intensities as a row-major `(height, width)` array.
///
/// 16-bit grayscale keeps its native range, everything else goes through [`to_gray8`].
pub fn to_intensity(image: &DynamicImage) -> Array2<f64> {
    match image {
        DynamicImage::ImageLuma16(buffer) => {
            let (width, height) = buffer.dimensions();
            Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
                buffer.get_pixel(x as u32, y as u32)[0] as f64
            })
        }
        _ => gray_to_array(&to_gray8(image)).mapv(|v| v as f64),
    }
}

/// Copy a gray image into a row-major `(height, width)` array.
pub fn gray_to_array(image: &GrayImage) -> Array2<u8> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        image.get_pixel(x as u32, y as u32)[0]
    })
}
