//! Display and target geometry.

use super::types::{Dimensions, Rotation};

/// On-screen size of a `raw_width` x `raw_height` frame once `rotation` is applied.
pub fn display_dimensions(raw_width: u32, raw_height: u32, rotation: Rotation) -> (u32, u32) {
    if rotation.swaps_axes() {
        (raw_height, raw_width)
    } else {
        (raw_width, raw_height)
    }
}

/// Encode dimensions for a display size bounded by `max_width` x `max_height`.
///
/// Never upscales. When scaling down, the limiting side is chosen by comparing
/// aspect ratios and the other side is floored. Both components are then
/// floored to even, which can cost a pixel even when the input already fit.
pub fn target_dimensions(
    display_width: u32,
    display_height: u32,
    max_width: u32,
    max_height: u32,
) -> Dimensions {
    let (width, height) = if display_width == 0 || display_height == 0 {
        (display_width, display_height)
    } else if display_width <= max_width && display_height <= max_height {
        (display_width, display_height)
    } else {
        let aspect = f64::from(display_width) / f64::from(display_height);
        let max_aspect = f64::from(max_width) / f64::from(max_height.max(1));

        if aspect > max_aspect {
            let height = (f64::from(max_width) / aspect).floor() as u32;
            (max_width, height.min(max_height))
        } else {
            let width = (f64::from(max_height) * aspect).floor() as u32;
            (width.min(max_width), max_height)
        }
    };

    Dimensions::new(floor_even(width), floor_even(height))
}

/// Largest even number not above `value`, never below 2.
fn floor_even(value: u32) -> u32 {
    (value - value % 2).max(2)
}
