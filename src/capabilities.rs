//! Capture capability snapshot and preview configuration negotiation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::NegotiationError;

/// A preview resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Read-only capability facts fetched from the device at configure time.
///
/// Immutable per session; the session controller re-fetches a fresh
/// snapshot on every reconfiguration instead of querying the device on
/// each control call.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureCapabilities {
    /// Preview resolutions the device can deliver
    pub preview_resolutions: Vec<Resolution>,
    /// Zoom range is 0..=max_zoom in integer steps
    pub max_zoom: u32,
    pub zoom_supported: bool,
    /// Maximum number of focus regions the device accepts (0 = unsupported)
    pub max_focus_areas: u32,
    /// Maximum number of metering regions the device accepts (0 = unsupported)
    pub max_metering_areas: u32,
    pub flash_supported: bool,
}

impl CaptureCapabilities {
    pub fn can_set_focus_area(&self) -> bool {
        self.max_focus_areas > 0
    }

    pub fn can_set_metering_area(&self) -> bool {
        self.max_metering_areas > 0
    }
}

/// Outcome of capability negotiation: the selected preview resolution plus
/// the capability snapshot it was selected from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChosenConfiguration {
    pub resolution: Resolution,
    pub capabilities: CaptureCapabilities,
}

/// Select the best preview resolution for a viewport.
///
/// Picks the supported resolution whose aspect ratio is closest to the
/// viewport's, breaking ties by maximal area. An empty capability list is
/// an error the caller must treat as "abort configuration", not a panic.
pub fn negotiate(
    capabilities: &CaptureCapabilities,
    viewport: Resolution,
) -> Result<ChosenConfiguration, NegotiationError> {
    let desired_aspect = viewport.aspect_ratio();

    let best = capabilities
        .preview_resolutions
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (a.aspect_ratio() - desired_aspect).abs();
            let db = (b.aspect_ratio() - desired_aspect).abs();
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Closest aspect wins; among equals prefer the larger area
                .then_with(|| b.area().cmp(&a.area()))
        })
        .ok_or(NegotiationError::NoSupportedResolution)?;

    if best.aspect_ratio() != desired_aspect {
        debug!(
            "No exact aspect match for viewport {}: selected {}",
            viewport, best
        );
    }

    info!(
        "Negotiated preview resolution {} for viewport {} ({} candidates)",
        best,
        viewport,
        capabilities.preview_resolutions.len()
    );

    Ok(ChosenConfiguration {
        resolution: best,
        capabilities: capabilities.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(resolutions: &[(u32, u32)]) -> CaptureCapabilities {
        CaptureCapabilities {
            preview_resolutions: resolutions
                .iter()
                .map(|&(w, h)| Resolution::new(w, h))
                .collect(),
            max_zoom: 5,
            zoom_supported: true,
            max_focus_areas: 1,
            max_metering_areas: 1,
            flash_supported: true,
        }
    }

    #[test]
    fn test_prefers_closest_aspect_ratio() {
        let caps = caps(&[(640, 480), (1280, 720), (800, 600)]);
        let chosen = negotiate(&caps, Resolution::new(1920, 1080)).unwrap();
        assert_eq!(chosen.resolution, Resolution::new(1280, 720));
    }

    #[test]
    fn test_prefers_larger_area_among_aspect_ties() {
        let caps = caps(&[(640, 480), (1600, 1200), (800, 600)]);
        let chosen = negotiate(&caps, Resolution::new(1024, 768)).unwrap();
        assert_eq!(chosen.resolution, Resolution::new(1600, 1200));
    }

    #[test]
    fn test_empty_capability_list_fails() {
        let caps = caps(&[]);
        let err = negotiate(&caps, Resolution::new(1920, 1080)).unwrap_err();
        assert_eq!(err, NegotiationError::NoSupportedResolution);
    }

    #[test]
    fn test_capability_snapshot_is_carried() {
        let caps = caps(&[(1280, 720)]);
        let chosen = negotiate(&caps, Resolution::new(1280, 720)).unwrap();
        assert_eq!(chosen.capabilities.max_zoom, 5);
        assert!(chosen.capabilities.can_set_focus_area());
        assert!(chosen.capabilities.can_set_metering_area());
        assert!(chosen.capabilities.flash_supported);
    }
}
