use crate::device::PreviewTarget;

/// Lifecycle signals delivered by the external surface adapter.
///
/// These arrive on the surface owner's schedule, not the session
/// controller's; the controller reacts by transitioning its own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface exists and can be drawn into
    Created,
    /// The surface geometry changed; `target` is absent if it is no longer
    /// drawable
    Changed {
        width: u32,
        height: u32,
        target: Option<PreviewTarget>,
    },
    /// The surface is gone
    Destroyed,
}

impl SurfaceEvent {
    /// Get the event type as a string for filtering and logs
    pub fn event_type(&self) -> &'static str {
        match self {
            SurfaceEvent::Created => "surface_created",
            SurfaceEvent::Changed { .. } => "surface_changed",
            SurfaceEvent::Destroyed => "surface_destroyed",
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SurfaceEvent::Created => "Surface created".to_string(),
            SurfaceEvent::Changed {
                width,
                height,
                target,
            } => format!(
                "Surface changed to {}x{} ({})",
                width,
                height,
                if target.is_some() {
                    "drawable"
                } else {
                    "no target"
                }
            ),
            SurfaceEvent::Destroyed => "Surface destroyed".to_string(),
        }
    }
}

/// Terminal outcome of a one-shot autofocus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    Success,
    Failure,
    /// The dead-man timer fired before the device reported back
    TimedOut,
}

impl FocusOutcome {
    pub fn event_type(&self) -> &'static str {
        match self {
            FocusOutcome::Success => "focus_success",
            FocusOutcome::Failure => "focus_failure",
            FocusOutcome::TimedOut => "focus_timeout",
        }
    }
}
