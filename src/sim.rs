//! In-memory capture device and surface for tests and hardware-less runs.
//!
//! Both types are cheap shared handles over their state, so a test can
//! keep a probe into the device after handing a clone to the session
//! controller: applied-parameter history, call counters, injectable
//! failures, and manual focus-completion delivery.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::capabilities::{CaptureCapabilities, Resolution};
use crate::device::{
    CaptureDevice, DeviceParameters, FlashMode, FocusCallback, FocusMode, FrameCallback,
    PreviewSurface, PreviewTarget,
};
use crate::error::{DeviceError, DeviceResult};

/// Per-operation call counters exposed to tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub reconnect: u32,
    pub bind_preview_target: u32,
    pub apply_parameters: u32,
    pub start_capture: u32,
    pub stop_capture: u32,
    pub clear_frame_callback: u32,
    pub request_auto_focus: u32,
    pub cancel_auto_focus: u32,
}

struct SimDeviceState {
    params: DeviceParameters,
    released: bool,
    capturing: bool,
    pending_focus: Option<FocusCallback>,
    applied: Vec<DeviceParameters>,
    counts: CallCounts,
    fail_start_capture: bool,
    fail_apply_parameters: bool,
    fail_request_auto_focus: bool,
}

/// Simulated capture device.
#[derive(Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimDeviceState>>,
}

impl SimulatedDevice {
    pub fn new(capabilities: CaptureCapabilities) -> Self {
        let zoom = 0;
        Self {
            state: Arc::new(Mutex::new(SimDeviceState {
                params: DeviceParameters {
                    capabilities,
                    resolution: None,
                    focus_mode: FocusMode::Auto,
                    zoom,
                    flash: FlashMode::Off,
                    focus_areas: Vec::new(),
                    metering_areas: Vec::new(),
                },
                released: false,
                capturing: false,
                pending_focus: None,
                applied: Vec::new(),
                counts: CallCounts::default(),
                fail_start_capture: false,
                fail_apply_parameters: false,
                fail_request_auto_focus: false,
            })),
        }
    }

    /// A device profile typical of a phone camera used for scanning.
    pub fn barcode_reference() -> Self {
        Self::new(CaptureCapabilities {
            preview_resolutions: vec![
                Resolution::new(640, 480),
                Resolution::new(800, 600),
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
            ],
            max_zoom: 5,
            zoom_supported: true,
            max_focus_areas: 1,
            max_metering_areas: 1,
            flash_supported: true,
        })
    }

    /// Deliver the stored autofocus completion, as the device would from
    /// its own callback context. No-op if none is pending.
    pub fn complete_focus(&self, success: bool) {
        // The callback re-enters the session controller; the device lock
        // must not be held across it
        let callback = self.state.lock().pending_focus.take();
        match callback {
            Some(callback) => callback(success),
            None => debug!("complete_focus with no pending request"),
        }
    }

    /// Mark the device invalid; every subsequent operation fails with
    /// `Disconnected` instead of panicking.
    pub fn invalidate(&self) {
        self.state.lock().released = true;
    }

    pub fn set_fail_start_capture(&self, fail: bool) {
        self.state.lock().fail_start_capture = fail;
    }

    pub fn set_fail_apply_parameters(&self, fail: bool) {
        self.state.lock().fail_apply_parameters = fail;
    }

    pub fn set_fail_request_auto_focus(&self, fail: bool) {
        self.state.lock().fail_request_auto_focus = fail;
    }

    pub fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    pub fn has_pending_focus(&self) -> bool {
        self.state.lock().pending_focus.is_some()
    }

    pub fn counts(&self) -> CallCounts {
        self.state.lock().counts
    }

    pub fn last_applied(&self) -> Option<DeviceParameters> {
        self.state.lock().applied.last().cloned()
    }

    pub fn applied_history(&self) -> Vec<DeviceParameters> {
        self.state.lock().applied.clone()
    }

    pub fn current_zoom(&self) -> u32 {
        self.state.lock().params.zoom
    }

    pub fn current_flash(&self) -> FlashMode {
        self.state.lock().params.flash
    }

    pub fn focus_mode(&self) -> FocusMode {
        self.state.lock().params.focus_mode
    }

    pub fn current_resolution(&self) -> Option<Resolution> {
        self.state.lock().params.resolution
    }

    fn guard(state: &SimDeviceState) -> DeviceResult<()> {
        if state.released {
            Err(DeviceError::Disconnected)
        } else {
            Ok(())
        }
    }
}

impl CaptureDevice for SimulatedDevice {
    fn current_parameters(&self) -> DeviceResult<DeviceParameters> {
        let state = self.state.lock();
        Self::guard(&state)?;
        Ok(state.params.clone())
    }

    fn apply_parameters(&mut self, params: DeviceParameters) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        state.counts.apply_parameters += 1;
        if state.fail_apply_parameters {
            return Err(DeviceError::rejected("injected parameter failure"));
        }
        state.params = params.clone();
        state.applied.push(params);
        Ok(())
    }

    fn bind_preview_target(&mut self, _target: PreviewTarget) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        state.counts.bind_preview_target += 1;
        Ok(())
    }

    fn start_capture(&mut self) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        state.counts.start_capture += 1;
        if state.fail_start_capture {
            return Err(DeviceError::io("injected capture failure"));
        }
        state.capturing = true;
        Ok(())
    }

    fn stop_capture(&mut self) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        state.counts.stop_capture += 1;
        state.capturing = false;
        Ok(())
    }

    fn set_one_shot_frame_callback(&mut self, callback: Option<FrameCallback>) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        if callback.is_none() {
            state.counts.clear_frame_callback += 1;
        }
        Ok(())
    }

    fn request_auto_focus(&mut self, on_complete: FocusCallback) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        state.counts.request_auto_focus += 1;
        if state.fail_request_auto_focus {
            return Err(DeviceError::io("injected autofocus failure"));
        }
        // A new request supersedes any outstanding one
        state.pending_focus = Some(on_complete);
        Ok(())
    }

    fn cancel_auto_focus(&mut self) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        state.counts.cancel_auto_focus += 1;
        state.pending_focus = None;
        Ok(())
    }

    fn reconnect(&mut self) -> DeviceResult<()> {
        let mut state = self.state.lock();
        Self::guard(&state)?;
        state.counts.reconnect += 1;
        Ok(())
    }
}

struct SimSurfaceState {
    under_construction: bool,
    target: Option<PreviewTarget>,
    viewport: Resolution,
    keep_display_active: bool,
}

/// Simulated preview surface.
#[derive(Clone)]
pub struct SimulatedSurface {
    state: Arc<Mutex<SimSurfaceState>>,
}

impl SimulatedSurface {
    pub fn new(viewport: Resolution) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimSurfaceState {
                under_construction: true,
                target: Some(PreviewTarget(1)),
                viewport,
                keep_display_active: false,
            })),
        }
    }

    /// Leave the "under construction" substate, as the surface owner does
    /// once layout settles.
    pub fn finish_construction(&self) {
        self.state.lock().under_construction = false;
    }

    pub fn set_viewport(&self, viewport: Resolution) {
        self.state.lock().viewport = viewport;
    }

    pub fn set_target(&self, target: Option<PreviewTarget>) {
        self.state.lock().target = target;
    }

    pub fn keep_display_active(&self) -> bool {
        self.state.lock().keep_display_active
    }
}

impl PreviewSurface for SimulatedSurface {
    fn is_under_construction(&self) -> bool {
        self.state.lock().under_construction
    }

    fn drawable_target(&self) -> Option<PreviewTarget> {
        self.state.lock().target
    }

    fn viewport(&self) -> Resolution {
        self.state.lock().viewport
    }

    fn set_keep_display_active(&mut self, active: bool) {
        self.state.lock().keep_display_active = active;
    }
}
