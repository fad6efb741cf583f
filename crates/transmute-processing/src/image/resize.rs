use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use transmute_core::{AppError, MAX_DIMENSION};

/// Ceiling on what the decoder may allocate for one image
pub const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

/// Resampling keeps float intermediates of up to 16 bytes per pixel, so the output
/// budget is the decode ceiling divided by that
pub const MAX_OUTPUT_PIXELS: u64 = MAX_DECODE_ALLOC / 16;

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Calculate target dimensions; a missing side follows the original aspect ratio
    pub fn calculate_dimensions(
        orig_width: u32,
        orig_height: u32,
        width: Option<u32>,
        height: Option<u32>,
    ) -> (u32, u32) {
        match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => {
                let aspect_ratio = orig_height as f64 / orig_width as f64;
                let h = (w as f64 * aspect_ratio).round() as u32;
                (w, h.max(1))
            }
            (None, Some(h)) => {
                let aspect_ratio = orig_width as f64 / orig_height as f64;
                let w = (h as f64 * aspect_ratio).round() as u32;
                (w.max(1), h)
            }
            (None, None) => (orig_width, orig_height),
        }
    }

    /// Target dimensions, rejected when either side or the pixel count is out of budget.
    ///
    /// An aspect-derived side can exceed the bound each requested side was checked against.
    pub fn checked_dimensions(
        orig_width: u32,
        orig_height: u32,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<(u32, u32), AppError> {
        let (new_width, new_height) =
            Self::calculate_dimensions(orig_width, orig_height, width, height);

        if i64::from(new_width) > MAX_DIMENSION || i64::from(new_height) > MAX_DIMENSION {
            return Err(AppError::ValidationFailure(format!(
                "Resized image {}x{} exceeds the maximum side of {} pixels",
                new_width, new_height, MAX_DIMENSION
            )));
        }
        if u64::from(new_width) * u64::from(new_height) > MAX_OUTPUT_PIXELS {
            return Err(AppError::ValidationFailure(format!(
                "Resized image {}x{} exceeds the limit of {} pixels",
                new_width, new_height, MAX_OUTPUT_PIXELS
            )));
        }
        Ok((new_width, new_height))
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    pub fn resize(
        img: &DynamicImage,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<DynamicImage, AppError> {
        let (orig_width, orig_height) = img.dimensions();
        let (new_width, new_height) =
            Self::checked_dimensions(orig_width, orig_height, width, height)?;
        let filter = Self::select_filter(orig_width, orig_height, new_width, new_height);
        Ok(img.resize_exact(new_width, new_height, filter))
    }
}
