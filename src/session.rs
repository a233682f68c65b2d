//! The camera session state machine.
//!
//! Owns the open device handle and orchestrates preview lifecycle,
//! continuous-autofocus maintenance, one-shot focus/metering requests,
//! zoom, and flashlight control. Control calls come from one logical
//! owner; autofocus completions arrive from whatever context the device
//! backend chooses and are funneled through a single generation-guarded
//! re-arm path.
//!
//! Nothing here surfaces a device failure to the caller. Every operation
//! catches errors at its own boundary, logs them, and leaves the session
//! in its most recent well-defined state; outcomes are observable through
//! `state()`, `is_previewing()`, and `camera_resolution()`.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::capabilities::{negotiate, ChosenConfiguration, Resolution};
use crate::config::ScancamConfig;
use crate::device::{CaptureDevice, FlashMode, FocusCallback, FocusMode, PreviewSurface};
use crate::error::{DeviceError, Result};
use crate::events::{FocusOutcome, SurfaceEvent};
use crate::geometry::compute_metering_area;

/// Session lifecycle state.
///
/// ```text
/// Closed → Configured → PreviewRunning ↔ Stopped → Closed
/// ```
///
/// Exactly one device handle is associated while the state is not
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Configured,
    PreviewRunning,
    Stopped,
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured)
    }

    pub fn is_preview_running(&self) -> bool {
        matches!(self, Self::PreviewRunning)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

struct SessionInner<D: CaptureDevice, S: PreviewSurface> {
    config: ScancamConfig,
    device: Option<D>,
    surface: Option<S>,
    state: SessionState,
    chosen: Option<ChosenConfiguration>,
    zoom: u32,
    previewing: bool,
    surface_ready: bool,
    /// Bumped on every focus request and on stop/release so late
    /// completions from a previous validity window are discarded
    focus_generation: u64,
    pending_focus: Option<u64>,
}

/// Camera session controller.
///
/// Cheap to clone; clones share the same session.
pub struct SessionController<D: CaptureDevice, S: PreviewSurface> {
    inner: Arc<Mutex<SessionInner<D, S>>>,
}

impl<D: CaptureDevice, S: PreviewSurface> Clone for SessionController<D, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: CaptureDevice, S: PreviewSurface> SessionController<D, S> {
    pub fn new(config: ScancamConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                config,
                device: None,
                surface: None,
                state: SessionState::Closed,
                chosen: None,
                zoom: 0,
                previewing: false,
                surface_ready: false,
                focus_generation: 0,
                pending_focus: None,
            })),
        }
    }

    /// Take ownership of an open device and its surface: Closed → Configured.
    ///
    /// A missing device is a recoverable "not yet available" condition and
    /// is a logged no-op, as is a device with no usable preview resolution.
    pub fn attach(&self, device: Option<D>, surface: S) {
        let Some(device) = device else {
            debug!("attach called without a device; session stays closed");
            return;
        };
        self.inner.lock().attach(device, surface);
    }

    /// React to a surface lifecycle signal from the external adapter.
    pub fn handle_surface_event(&self, event: SurfaceEvent) {
        debug!("Surface event: {}", event.description());
        let mut inner = self.inner.lock();
        match event {
            SurfaceEvent::Created => {
                inner.surface_ready = true;
            }
            SurfaceEvent::Changed { target: None, .. } => {
                debug!("Surface changed without a drawable target; ignoring");
            }
            SurfaceEvent::Changed {
                width,
                height,
                target: Some(_),
            } => {
                // Resolution or orientation may have changed; a full
                // restart renegotiates against the new viewport
                info!("Surface changed to {}x{}, restarting preview", width, height);
                inner.surface_ready = true;
                inner.stop_preview();
                inner.start_preview();
            }
            SurfaceEvent::Destroyed => {
                inner.surface_ready = false;
                inner.stop_preview();
            }
        }
    }

    /// Start the preview: Configured/Stopped → PreviewRunning.
    pub fn start_preview(&self) {
        self.inner.lock().start_preview();
    }

    /// Stop the preview, best-effort and idempotent.
    pub fn stop_preview(&self) {
        self.inner.lock().stop_preview();
    }

    /// One-shot focus+metering request at a UI touch point.
    ///
    /// Only meaningful while previewing. Focus and metering regions are
    /// computed and applied independently, each gated on its own device
    /// capability; with neither supported this is a no-op.
    pub fn request_focus_at(
        &self,
        center_x: f32,
        center_y: f32,
        region_width: f32,
        region_height: f32,
    ) {
        let weak = Arc::downgrade(&self.inner);
        let mut inner = self.inner.lock();

        if inner.device.is_none() || !inner.previewing {
            debug!("Focus request ignored; preview not running");
            return;
        }

        let generation = inner.focus_generation.wrapping_add(1);
        inner.focus_generation = generation;

        let completion_weak = Weak::clone(&weak);
        let on_complete: FocusCallback = Box::new(move |success| {
            let outcome = if success {
                FocusOutcome::Success
            } else {
                FocusOutcome::Failure
            };
            Self::deliver_focus_completion(completion_weak, generation, outcome);
        });

        let issued =
            inner.request_focus_at(center_x, center_y, region_width, region_height, generation, on_complete);

        if issued {
            let timeout = Duration::from_millis(inner.config.session.focus_timeout_ms);
            drop(inner);
            Self::arm_focus_watchdog(weak, generation, timeout);
        }
    }

    pub fn zoom_in(&self) {
        self.inner.lock().adjust_zoom(true);
    }

    pub fn zoom_out(&self) {
        self.inner.lock().adjust_zoom(false);
    }

    pub fn open_flashlight(&self) {
        self.inner.lock().set_flashlight(true);
    }

    pub fn close_flashlight(&self) {
        self.inner.lock().set_flashlight(false);
    }

    /// Last negotiated preview resolution; stable for the session,
    /// recomputed at reconfiguration.
    pub fn camera_resolution(&self) -> Option<Resolution> {
        self.inner.lock().chosen.as_ref().map(|c| c.resolution)
    }

    pub fn is_previewing(&self) -> bool {
        self.inner.lock().is_previewing()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn zoom_level(&self) -> u32 {
        self.inner.lock().zoom
    }

    /// Tear down the session and drop the device handle: → Closed.
    ///
    /// Every later operation is a logged no-op; a late autofocus
    /// completion is discarded, never acted upon.
    pub fn release(&self) {
        self.inner.lock().release();
    }

    fn deliver_focus_completion(
        weak: Weak<Mutex<SessionInner<D, S>>>,
        generation: u64,
        outcome: FocusOutcome,
    ) {
        let Some(inner) = weak.upgrade() else {
            debug!("Focus completion after controller dropped; discarding");
            return;
        };
        inner.lock().complete_focus(generation, outcome);
    }

    /// Arm the dead-man timer for a hung autofocus request. Without a
    /// runtime the library still works; the request simply has no timeout.
    fn arm_focus_watchdog(weak: Weak<Mutex<SessionInner<D, S>>>, generation: u64, timeout: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime available; focus watchdog disabled");
            return;
        };
        handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            Self::deliver_focus_completion(weak, generation, FocusOutcome::TimedOut);
        });
    }
}

impl<D: CaptureDevice, S: PreviewSurface> SessionInner<D, S> {
    fn is_previewing(&self) -> bool {
        self.device.is_some() && self.previewing && self.surface_ready
    }

    fn attach(&mut self, device: D, surface: S) {
        if !self.state.is_closed() {
            warn!("attach called on a session that is not closed; ignoring");
            return;
        }

        let params = match device.current_parameters() {
            Ok(params) => params,
            Err(e) => {
                warn!("Could not read device parameters, aborting configuration: {}", e);
                return;
            }
        };

        let chosen = match negotiate(&params.capabilities, surface.viewport()) {
            Ok(chosen) => chosen,
            Err(e) => {
                warn!("Aborting configuration: {}", e);
                return;
            }
        };

        self.zoom = params.zoom.min(params.capabilities.max_zoom);
        self.chosen = Some(chosen);
        self.device = Some(device);
        self.surface = Some(surface);
        self.state = SessionState::Configured;
        info!("Session configured");
    }

    fn start_preview(&mut self) {
        if self.device.is_none() {
            debug!("start_preview with no device; ignoring");
            return;
        }
        if self.surface.is_none() {
            debug!("start_preview with no surface; ignoring");
            return;
        }

        self.previewing = true;
        match self.try_start_preview() {
            Ok(()) => {
                self.state = SessionState::PreviewRunning;
                self.rearm_continuous_focus();
                info!(
                    "Preview running at {}",
                    self.chosen
                        .as_ref()
                        .map(|c| c.resolution.to_string())
                        .unwrap_or_else(|| "unknown resolution".to_string())
                );
            }
            Err(e) => {
                self.previewing = false;
                warn!("Failed to start preview, session unchanged: {}", e);
            }
        }
    }

    fn try_start_preview(&mut self) -> Result<()> {
        let keep_display_active = self.config.session.keep_display_active;
        let (Some(device), Some(surface)) = (self.device.as_mut(), self.surface.as_mut()) else {
            return Err(DeviceError::Disconnected.into());
        };

        if keep_display_active {
            surface.set_keep_display_active(true);
        }

        device.reconnect()?;

        if surface.is_under_construction() {
            if let Some(target) = surface.drawable_target() {
                device.bind_preview_target(target)?;
            }
        }

        // Capabilities are re-fetched and the resolution renegotiated on
        // every start so a surface change picks up new viewport geometry
        let mut params = device.current_parameters()?;
        let chosen = negotiate(&params.capabilities, surface.viewport())?;

        self.zoom = self.zoom.min(params.capabilities.max_zoom);
        params.resolution = Some(chosen.resolution);
        params.zoom = self.zoom;
        device.apply_parameters(params)?;
        device.start_capture()?;

        self.chosen = Some(chosen);
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.invalidate_pending_focus();
        self.previewing = false;

        let under_construction = self
            .surface
            .as_ref()
            .map(|s| s.is_under_construction())
            .unwrap_or(false);

        let Some(device) = self.device.as_mut() else {
            debug!("stop_preview with no device; ignoring");
            return;
        };

        // Best-effort teardown: every failure here is swallowed so
        // stopping never blocks the caller
        if under_construction {
            if let Err(e) = device.cancel_auto_focus() {
                warn!("Failed to cancel autofocus while stopping: {}", e);
            }
        }
        if let Err(e) = device.stop_capture() {
            warn!("Failed to stop capture: {}", e);
        }
        if let Err(e) = device.set_one_shot_frame_callback(None) {
            warn!("Failed to clear frame callback: {}", e);
        }

        if self.state.is_preview_running() {
            self.state = SessionState::Stopped;
        }
        debug!("Preview stopped");
    }

    fn request_focus_at(
        &mut self,
        center_x: f32,
        center_y: f32,
        region_width: f32,
        region_height: f32,
        generation: u64,
        on_complete: FocusCallback,
    ) -> bool {
        let Some(capabilities) = self.chosen.as_ref().map(|c| c.capabilities.clone()) else {
            return false;
        };
        let Some(viewport) = self.surface.as_ref().map(|s| s.viewport()) else {
            return false;
        };
        let weight = self.config.focus.region_weight;
        let metering_scale = self.config.focus.metering_scale;
        let Some(device) = self.device.as_mut() else {
            return false;
        };

        let mut params = match device.current_parameters() {
            Ok(params) => params,
            Err(e) => {
                warn!("Could not read device parameters for focus request: {}", e);
                return false;
            }
        };

        let mut needs_update = false;

        if capabilities.can_set_focus_area() {
            let rect = compute_metering_area(
                1.0,
                center_x,
                center_y,
                region_width,
                region_height,
                viewport,
                weight,
            );
            debug!("Focus region: {:?}", rect);
            params.focus_areas = vec![rect];
            params.focus_mode = FocusMode::Macro;
            needs_update = true;
        } else {
            debug!("Device does not support focus areas");
        }

        if capabilities.can_set_metering_area() {
            let rect = compute_metering_area(
                metering_scale,
                center_x,
                center_y,
                region_width,
                region_height,
                viewport,
                weight,
            );
            debug!("Metering region: {:?}", rect);
            params.metering_areas = vec![rect];
            needs_update = true;
        } else {
            debug!("Device does not support metering areas");
        }

        if !needs_update {
            debug!("Focus request is a no-op; neither region type supported");
            return false;
        }

        if let Err(e) = device.cancel_auto_focus() {
            warn!("Failed to cancel pending autofocus: {}", e);
        }
        if let Err(e) = device.apply_parameters(params) {
            // Assume the device silently rejected the regions; scanning
            // continues in whatever mode was last applied
            warn!("Device rejected focus/metering parameters: {}", e);
            return false;
        }
        match device.request_auto_focus(on_complete) {
            Ok(()) => {
                self.pending_focus = Some(generation);
                true
            }
            Err(e) => {
                warn!("Autofocus request failed: {}", e);
                false
            }
        }
    }

    /// Terminal path for a one-shot focus request, shared by the device
    /// callback and the watchdog; safe under stale or duplicate delivery.
    fn complete_focus(&mut self, generation: u64, outcome: FocusOutcome) {
        if self.pending_focus != Some(generation) {
            debug!("Discarding stale focus completion ({})", outcome.event_type());
            return;
        }
        self.pending_focus = None;

        if self.device.is_none() || !self.previewing {
            debug!("Focus completed after preview ended; not re-arming");
            return;
        }

        match outcome {
            FocusOutcome::Success => debug!("One-shot focus/metering succeeded"),
            FocusOutcome::Failure => debug!("One-shot focus/metering failed"),
            FocusOutcome::TimedOut => {
                warn!("Autofocus did not complete within the watchdog window")
            }
        }

        self.rearm_continuous_focus();
    }

    /// Put the device back into continuous-picture focus so scanning
    /// resumes without per-shot requests. Failure degrades scanning but
    /// never escalates.
    fn rearm_continuous_focus(&mut self) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        match Self::try_arm_continuous(device) {
            Ok(()) => debug!("Continuous autofocus armed"),
            Err(e) => warn!("Failed to arm continuous autofocus: {}", e),
        }
    }

    fn try_arm_continuous(device: &mut D) -> crate::error::DeviceResult<()> {
        let mut params = device.current_parameters()?;
        params.focus_mode = FocusMode::ContinuousPicture;
        device.apply_parameters(params)?;
        // Some devices never resume continuous scanning without this cancel
        device.cancel_auto_focus()
    }

    fn adjust_zoom(&mut self, zoom_in: bool) {
        let Some(capabilities) = self.chosen.as_ref().map(|c| c.capabilities.clone()) else {
            debug!("Zoom ignored; session not configured");
            return;
        };
        if !capabilities.zoom_supported {
            debug!("Zoom not supported by device");
            return;
        }

        let next = if zoom_in {
            if self.zoom >= capabilities.max_zoom {
                debug!("Zoom already at maximum ({})", capabilities.max_zoom);
                return;
            }
            self.zoom + 1
        } else {
            if self.zoom == 0 {
                debug!("Zoom already at minimum");
                return;
            }
            self.zoom - 1
        };

        let Some(device) = self.device.as_mut() else {
            debug!("Zoom ignored; no device");
            return;
        };

        let mut params = match device.current_parameters() {
            Ok(params) => params,
            Err(e) => {
                warn!("Could not read device parameters for zoom: {}", e);
                return;
            }
        };
        params.zoom = next;

        match device.apply_parameters(params) {
            Ok(()) => {
                debug!("Zoom {} -> {}", self.zoom, next);
                self.zoom = next;
            }
            Err(e) => warn!("Device rejected zoom level {}: {}", next, e),
        }
    }

    fn set_flashlight(&mut self, on: bool) {
        if !self.is_previewing() {
            debug!("Flashlight request ignored; preview not running");
            return;
        }
        let flash_supported = self
            .chosen
            .as_ref()
            .map(|c| c.capabilities.flash_supported)
            .unwrap_or(false);
        if !flash_supported {
            debug!("Flash not supported by device");
            return;
        }

        let Some(device) = self.device.as_mut() else {
            return;
        };
        let mut params = match device.current_parameters() {
            Ok(params) => params,
            Err(e) => {
                warn!("Could not read device parameters for flashlight: {}", e);
                return;
            }
        };
        params.flash = if on { FlashMode::Torch } else { FlashMode::Off };

        match device.apply_parameters(params) {
            Ok(()) => info!("Flashlight {}", if on { "on" } else { "off" }),
            Err(e) => warn!("Failed to toggle flashlight: {}", e),
        }
    }

    fn invalidate_pending_focus(&mut self) {
        self.focus_generation = self.focus_generation.wrapping_add(1);
        self.pending_focus = None;
    }

    fn release(&mut self) {
        self.stop_preview();
        if self.device.take().is_some() {
            info!("Device released");
        }
        self.surface = None;
        self.chosen = None;
        self.zoom = 0;
        self.surface_ready = false;
        self.state = SessionState::Closed;
    }
}

/// Session controller builder, validating the configuration up front.
pub struct SessionControllerBuilder {
    config: Option<ScancamConfig>,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: ScancamConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build<D: CaptureDevice, S: PreviewSurface>(self) -> Result<SessionController<D, S>> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(SessionController::new(config))
    }
}

impl Default for SessionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CaptureCapabilities;
    use crate::device::PreviewTarget;
    use crate::sim::{SimulatedDevice, SimulatedSurface};

    fn test_caps() -> CaptureCapabilities {
        CaptureCapabilities {
            preview_resolutions: vec![
                Resolution::new(640, 480),
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
            ],
            max_zoom: 5,
            zoom_supported: true,
            max_focus_areas: 1,
            max_metering_areas: 1,
            flash_supported: true,
        }
    }

    fn controller_with(
        caps: CaptureCapabilities,
    ) -> (
        SessionController<SimulatedDevice, SimulatedSurface>,
        SimulatedDevice,
        SimulatedSurface,
    ) {
        let device = SimulatedDevice::new(caps);
        let surface = SimulatedSurface::new(Resolution::new(1280, 720));
        let controller = SessionControllerBuilder::new()
            .build()
            .expect("default config is valid");
        controller.attach(Some(device.clone()), surface.clone());
        (controller, device, surface)
    }

    fn running_controller() -> (
        SessionController<SimulatedDevice, SimulatedSurface>,
        SimulatedDevice,
        SimulatedSurface,
    ) {
        let (controller, device, surface) = controller_with(test_caps());
        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();
        (controller, device, surface)
    }

    #[test]
    fn test_attach_without_device_is_noop() {
        let surface = SimulatedSurface::new(Resolution::new(1280, 720));
        let controller: SessionController<SimulatedDevice, SimulatedSurface> =
            SessionControllerBuilder::new().build().unwrap();
        controller.attach(None, surface);
        assert!(controller.state().is_closed());
        assert!(!controller.is_previewing());
    }

    #[test]
    fn test_attach_negotiates_resolution() {
        let (controller, _device, _surface) = controller_with(test_caps());
        assert!(controller.state().is_configured());
        // 16:9 viewport ties 1280x720 and 1920x1080 on aspect; larger wins
        assert_eq!(
            controller.camera_resolution(),
            Some(Resolution::new(1920, 1080))
        );
    }

    #[test]
    fn test_attach_with_no_resolutions_stays_closed() {
        let mut caps = test_caps();
        caps.preview_resolutions.clear();
        let (controller, _device, _surface) = controller_with(caps);
        assert!(controller.state().is_closed());
        assert_eq!(controller.camera_resolution(), None);
    }

    #[test]
    fn test_start_preview_runs_and_arms_continuous_focus() {
        let (controller, device, surface) = running_controller();
        assert!(controller.state().is_preview_running());
        assert!(controller.is_previewing());
        assert!(device.is_capturing());
        assert_eq!(device.focus_mode(), FocusMode::ContinuousPicture);
        assert!(device.counts().cancel_auto_focus >= 1);
        assert!(surface.keep_display_active());
    }

    #[test]
    fn test_start_preview_failure_rolls_back() {
        let (controller, device, _surface) = controller_with(test_caps());
        controller.handle_surface_event(SurfaceEvent::Created);
        device.set_fail_start_capture(true);

        controller.start_preview();

        assert!(controller.state().is_configured());
        assert!(!controller.is_previewing());
        assert!(!device.is_capturing());
    }

    #[test]
    fn test_stop_preview_is_idempotent() {
        let (controller, device, _surface) = running_controller();
        controller.stop_preview();
        controller.stop_preview();
        assert!(controller.state().is_stopped());
        assert!(!controller.is_previewing());
        assert!(!device.is_capturing());
    }

    #[test]
    fn test_surface_changed_restarts_exactly_once() {
        let (controller, device, _surface) = running_controller();
        let before = device.counts();

        controller.handle_surface_event(SurfaceEvent::Changed {
            width: 1280,
            height: 720,
            target: Some(PreviewTarget(1)),
        });

        let after = device.counts();
        assert_eq!(after.stop_capture, before.stop_capture + 1);
        assert_eq!(after.start_capture, before.start_capture + 1);
        assert!(controller.state().is_preview_running());
        assert!(controller.is_previewing());
    }

    #[test]
    fn test_surface_changed_without_target_is_ignored() {
        let (controller, device, _surface) = running_controller();
        let before = device.counts();

        controller.handle_surface_event(SurfaceEvent::Changed {
            width: 1280,
            height: 720,
            target: None,
        });

        assert_eq!(device.counts().stop_capture, before.stop_capture);
        assert!(controller.is_previewing());
    }

    #[test]
    fn test_surface_destroyed_stops_preview() {
        let (controller, device, _surface) = running_controller();
        controller.handle_surface_event(SurfaceEvent::Destroyed);
        assert!(!controller.is_previewing());
        assert!(controller.state().is_stopped());
        assert!(!device.is_capturing());
    }

    #[test]
    fn test_restart_renegotiates_for_new_viewport() {
        let (controller, _device, surface) = running_controller();
        assert_eq!(
            controller.camera_resolution(),
            Some(Resolution::new(1920, 1080))
        );

        surface.set_viewport(Resolution::new(640, 480));
        controller.handle_surface_event(SurfaceEvent::Changed {
            width: 640,
            height: 480,
            target: Some(PreviewTarget(1)),
        });

        assert_eq!(
            controller.camera_resolution(),
            Some(Resolution::new(640, 480))
        );
    }

    #[test]
    fn test_zoom_clamps_at_maximum() {
        let (controller, device, _surface) = running_controller();
        for _ in 0..10 {
            controller.zoom_in();
        }
        assert_eq!(controller.zoom_level(), 5);
        assert_eq!(device.current_zoom(), 5);
    }

    #[test]
    fn test_zoom_clamps_at_minimum() {
        let (controller, device, _surface) = running_controller();
        controller.zoom_in();
        for _ in 0..10 {
            controller.zoom_out();
        }
        assert_eq!(controller.zoom_level(), 0);
        assert_eq!(device.current_zoom(), 0);
    }

    #[test]
    fn test_zoom_persists_across_preview_restart() {
        let (controller, device, _surface) = running_controller();
        controller.zoom_in();
        controller.zoom_in();

        controller.stop_preview();
        controller.start_preview();

        assert_eq!(controller.zoom_level(), 2);
        assert_eq!(device.current_zoom(), 2);
    }

    #[test]
    fn test_zoom_unsupported_is_silent_noop() {
        let mut caps = test_caps();
        caps.zoom_supported = false;
        let (controller, device, _surface) = controller_with(caps);
        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();
        let before = device.counts().apply_parameters;

        controller.zoom_in();
        controller.zoom_out();

        assert_eq!(device.counts().apply_parameters, before);
        assert_eq!(controller.zoom_level(), 0);
    }

    #[test]
    fn test_focus_request_applies_both_regions() {
        let (controller, device, _surface) = running_controller();

        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        assert!(device.has_pending_focus());
        let params = device.last_applied().expect("parameters were applied");
        assert_eq!(params.focus_mode, FocusMode::Macro);
        assert_eq!(params.focus_areas.len(), 1);
        assert_eq!(params.metering_areas.len(), 1);
        assert!(params.metering_areas[0].area() >= params.focus_areas[0].area());
    }

    #[test]
    fn test_focus_completion_rearms_continuous_focus() {
        let (controller, device, _surface) = running_controller();
        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);
        assert_eq!(device.focus_mode(), FocusMode::Macro);

        device.complete_focus(true);

        assert!(!device.has_pending_focus());
        assert_eq!(device.focus_mode(), FocusMode::ContinuousPicture);
    }

    #[test]
    fn test_focus_failure_also_rearms() {
        let (controller, device, _surface) = running_controller();
        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        device.complete_focus(false);

        assert_eq!(device.focus_mode(), FocusMode::ContinuousPicture);
    }

    #[test]
    fn test_focus_gated_when_neither_region_supported() {
        let mut caps = test_caps();
        caps.max_focus_areas = 0;
        caps.max_metering_areas = 0;
        let (controller, device, _surface) = controller_with(caps);
        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();
        let before = device.counts();

        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        let after = device.counts();
        assert_eq!(after.apply_parameters, before.apply_parameters);
        assert_eq!(after.request_auto_focus, 0);
        assert!(!device.has_pending_focus());
    }

    #[test]
    fn test_focus_with_only_focus_areas_supported() {
        let mut caps = test_caps();
        caps.max_metering_areas = 0;
        let (controller, device, _surface) = controller_with(caps);
        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();

        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        assert!(device.has_pending_focus());
        let params = device.last_applied().unwrap();
        assert_eq!(params.focus_areas.len(), 1);
        assert!(params.metering_areas.is_empty());
    }

    #[test]
    fn test_focus_ignored_when_not_previewing() {
        let (controller, device, _surface) = controller_with(test_caps());
        let before = device.counts();

        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        assert_eq!(device.counts().request_auto_focus, before.request_auto_focus);
        assert!(!device.has_pending_focus());
    }

    #[test]
    fn test_stale_completion_after_release_is_discarded() {
        let (controller, device, _surface) = running_controller();
        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        controller.release();
        let before = device.counts().apply_parameters;

        // Late device completion must not resurrect state or re-arm focus
        device.complete_focus(true);

        assert!(controller.state().is_closed());
        assert!(!controller.is_previewing());
        assert_eq!(device.counts().apply_parameters, before);
    }

    #[test]
    fn test_stale_completion_after_stop_is_discarded() {
        let (controller, device, _surface) = running_controller();
        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        controller.stop_preview();
        let before = device.counts().apply_parameters;

        device.complete_focus(true);

        assert!(controller.state().is_stopped());
        assert_eq!(device.counts().apply_parameters, before);
    }

    #[test]
    fn test_operations_after_release_are_noops() {
        let (controller, _device, _surface) = running_controller();
        controller.release();

        controller.start_preview();
        controller.zoom_in();
        controller.open_flashlight();
        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);

        assert!(controller.state().is_closed());
        assert!(!controller.is_previewing());
        assert_eq!(controller.zoom_level(), 0);
    }

    #[test]
    fn test_release_resets_zoom() {
        let (controller, _device, _surface) = running_controller();
        controller.zoom_in();
        controller.zoom_in();
        assert_eq!(controller.zoom_level(), 2);

        controller.release();

        assert_eq!(controller.zoom_level(), 0);
    }

    #[test]
    fn test_flashlight_gated_on_preview_and_capability() {
        let (controller, device, _surface) = controller_with(test_caps());
        controller.open_flashlight();
        assert_eq!(device.current_flash(), FlashMode::Off);

        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();

        controller.open_flashlight();
        assert_eq!(device.current_flash(), FlashMode::Torch);
        controller.close_flashlight();
        assert_eq!(device.current_flash(), FlashMode::Off);
    }

    #[test]
    fn test_flashlight_unsupported_is_silent_noop() {
        let mut caps = test_caps();
        caps.flash_supported = false;
        let (controller, device, _surface) = controller_with(caps);
        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();
        let before = device.counts().apply_parameters;

        controller.open_flashlight();

        assert_eq!(device.counts().apply_parameters, before);
        assert_eq!(device.current_flash(), FlashMode::Off);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = ScancamConfig::default();
        config.focus.metering_scale = 0.2;
        let result: Result<SessionController<SimulatedDevice, SimulatedSurface>> =
            SessionControllerBuilder::new().config(config).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_watchdog_recovers_hung_autofocus() {
        let mut config = ScancamConfig::default();
        config.session.focus_timeout_ms = 20;
        let device = SimulatedDevice::new(test_caps());
        let surface = SimulatedSurface::new(Resolution::new(1280, 720));
        let controller: SessionController<SimulatedDevice, SimulatedSurface> =
            SessionControllerBuilder::new().config(config).build().unwrap();
        controller.attach(Some(device.clone()), surface.clone());
        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();

        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);
        assert_eq!(device.focus_mode(), FocusMode::Macro);

        // Device never reports back; the dead-man timer must re-arm
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(device.focus_mode(), FocusMode::ContinuousPicture);
        assert!(controller.is_previewing());
    }

    #[tokio::test]
    async fn test_watchdog_after_real_completion_is_harmless() {
        let mut config = ScancamConfig::default();
        config.session.focus_timeout_ms = 20;
        let device = SimulatedDevice::new(test_caps());
        let surface = SimulatedSurface::new(Resolution::new(1280, 720));
        let controller: SessionController<SimulatedDevice, SimulatedSurface> =
            SessionControllerBuilder::new().config(config).build().unwrap();
        controller.attach(Some(device.clone()), surface.clone());
        controller.handle_surface_event(SurfaceEvent::Created);
        controller.start_preview();

        controller.request_focus_at(640.0, 360.0, 120.0, 120.0);
        device.complete_focus(true);
        let rearmed = device.counts().apply_parameters;

        tokio::time::sleep(Duration::from_millis(100)).await;

        // The late timeout hit the stale-completion path, not a second re-arm
        assert_eq!(device.counts().apply_parameters, rearmed);
        assert_eq!(device.focus_mode(), FocusMode::ContinuousPicture);
    }
}
