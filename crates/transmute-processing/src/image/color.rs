//! Dominant color extraction

use image::DynamicImage;

const LEVELS: usize = 16;
const BIN_WIDTH: u32 = 256 / LEVELS as u32;

/// Most frequent color of the image, quantized to 16 levels per channel, as `#rrggbb`.
///
/// Fully transparent pixels are ignored unless the whole image is transparent.
pub fn dominant_color(img: &DynamicImage) -> String {
    let rgba = img.to_rgba8();
    let mut histogram = vec![0u64; LEVELS * LEVELS * LEVELS];
    let mut opaque_seen = false;

    for pixel in rgba.pixels() {
        if pixel[3] == 0 {
            continue;
        }
        opaque_seen = true;
        histogram[bin(pixel[0], pixel[1], pixel[2])] += 1;
    }

    if !opaque_seen {
        for pixel in rgba.pixels() {
            histogram[bin(pixel[0], pixel[1], pixel[2])] += 1;
        }
    }

    // First maximum wins so ties resolve deterministically
    let mut best = 0;
    for (index, count) in histogram.iter().enumerate() {
        if *count > histogram[best] {
            best = index;
        }
    }

    let r = center(best / (LEVELS * LEVELS));
    let g = center((best / LEVELS) % LEVELS);
    let b = center(best % LEVELS);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

fn bin(r: u8, g: u8, b: u8) -> usize {
    let level = |c: u8| c as usize / BIN_WIDTH as usize;
    level(r) * LEVELS * LEVELS + level(g) * LEVELS + level(b)
}

fn center(level: usize) -> u32 {
    level as u32 * BIN_WIDTH + BIN_WIDTH / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_majority_color_wins() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([250, 10, 10, 255]));
        for x in 0..10 {
            for y in 0..3 {
                img.put_pixel(x, y, Rgba([0, 0, 250, 255]));
            }
        }
        assert_eq!(dominant_color(&DynamicImage::ImageRgba8(img)), "#f80808");
    }

    #[test]
    fn test_transparent_pixels_ignored() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 0]));
        img.put_pixel(0, 0, Rgba([0, 128, 0, 255]));
        assert_eq!(dominant_color(&DynamicImage::ImageRgba8(img)), "#088808");
    }

    #[test]
    fn test_fully_transparent_image_still_reports() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        assert_eq!(dominant_color(&DynamicImage::ImageRgba8(img)), "#080808");
    }
}
