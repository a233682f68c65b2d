//! Touch-to-region geometry for focus and metering.
//!
//! Capture devices describe focus and metering regions in a fixed
//! device-normalized coordinate system, [-1000, 1000] on each axis,
//! independent of the sensor resolution. This module maps a touch point in
//! UI space into that system. It is pure math: no device, no side effects.

use crate::capabilities::Resolution;

/// Lower bound of the device-normalized coordinate range.
pub const DEVICE_COORD_MIN: i32 = -1000;
/// Upper bound of the device-normalized coordinate range.
pub const DEVICE_COORD_MAX: i32 = 1000;

/// A focus or metering rectangle in device-normalized coordinates.
///
/// Invariant: `left < right` and `top < bottom`, all within
/// [`DEVICE_COORD_MIN`, `DEVICE_COORD_MAX`], with `weight` in 1..=1000.
/// Regions are ephemeral: computed per request, submitted, discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeteringRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub weight: u32,
}

impl MeteringRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }
}

/// Compute a device-normalized focus/metering rectangle for a touch point.
///
/// `(center_x, center_y)` is the touch point and `(region_width,
/// region_height)` the size of the touch indicator, both in UI-space
/// pixels of `viewport`. `scale` enlarges the region relative to the
/// indicator; metering regions typically use a larger multiplier than
/// focus regions so they cover more context.
///
/// Every edge is clamped to the device range. If clamping collapses an
/// axis the rectangle is expanded to one unit wide on that axis instead of
/// producing a degenerate region the device would reject.
pub fn compute_metering_area(
    scale: f32,
    center_x: f32,
    center_y: f32,
    region_width: f32,
    region_height: f32,
    viewport: Resolution,
    weight: u32,
) -> MeteringRect {
    let half_width = region_width * scale / 2.0;
    let half_height = region_height * scale / 2.0;

    let mut left = to_device_axis(center_x - half_width, viewport.width as f32);
    let mut right = to_device_axis(center_x + half_width, viewport.width as f32);
    let mut top = to_device_axis(center_y - half_height, viewport.height as f32);
    let mut bottom = to_device_axis(center_y + half_height, viewport.height as f32);

    expand_if_collapsed(&mut left, &mut right);
    expand_if_collapsed(&mut top, &mut bottom);

    MeteringRect {
        left,
        top,
        right,
        bottom,
        weight: weight.clamp(1, 1000),
    }
}

/// Map a UI-space coordinate onto one device-normalized axis, clamped.
fn to_device_axis(value: f32, extent: f32) -> i32 {
    let normalized = value / extent * 2000.0 - 1000.0;
    (normalized.round() as i32).clamp(DEVICE_COORD_MIN, DEVICE_COORD_MAX)
}

/// Restore `low < high` after clamping by growing the interval one unit
/// into whichever direction still has room.
fn expand_if_collapsed(low: &mut i32, high: &mut i32) {
    if *low < *high {
        return;
    }
    if *high < DEVICE_COORD_MAX {
        *high = *low + 1;
    } else {
        *low = DEVICE_COORD_MAX - 1;
        *high = DEVICE_COORD_MAX;
    }
}
