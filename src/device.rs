//! The device seam: traits implemented by capture backends and preview
//! surfaces, plus the parameter snapshot exchanged across it.

use crate::capabilities::{CaptureCapabilities, Resolution};
use crate::error::DeviceResult;
use crate::geometry::MeteringRect;

/// Focus mode requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Auto,
    /// Single close-range region, used while a one-shot focus request is
    /// outstanding
    Macro,
    /// Device keeps re-focusing on its own; the mode scanning runs in
    ContinuousPicture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    Off,
    Torch,
}

/// Opaque handle to a drawable preview output supplied by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewTarget(pub u64);

/// Snapshot of the device's current parameters together with its
/// capability facts, mirroring how capture hardware reports both through
/// one query.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceParameters {
    pub capabilities: CaptureCapabilities,
    /// Active preview resolution, if one has been applied
    pub resolution: Option<Resolution>,
    pub focus_mode: FocusMode,
    pub zoom: u32,
    pub flash: FlashMode,
    pub focus_areas: Vec<MeteringRect>,
    pub metering_areas: Vec<MeteringRect>,
}

/// Completion callback for an asynchronous autofocus request. The `bool`
/// carries the device's success/failure verdict; both outcomes are
/// terminal and never retried.
pub type FocusCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Callback invoked with the next preview frame, then cleared.
pub type FrameCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// An open capture device.
///
/// Control calls arrive from one logical owner and are expected to be
/// near-immediate. The autofocus completion passed to
/// [`request_auto_focus`](CaptureDevice::request_auto_focus) must be
/// delivered on a separate execution context, never from inside the call
/// itself, and may race with later control calls.
pub trait CaptureDevice: Send + 'static {
    fn current_parameters(&self) -> DeviceResult<DeviceParameters>;

    fn apply_parameters(&mut self, params: DeviceParameters) -> DeviceResult<()>;

    /// Direct preview output at the surface's drawable target
    fn bind_preview_target(&mut self, target: PreviewTarget) -> DeviceResult<()>;

    fn start_capture(&mut self) -> DeviceResult<()>;

    fn stop_capture(&mut self) -> DeviceResult<()>;

    /// Register a callback for the next frame only; `None` clears it
    fn set_one_shot_frame_callback(&mut self, callback: Option<FrameCallback>) -> DeviceResult<()>;

    fn request_auto_focus(&mut self, on_complete: FocusCallback) -> DeviceResult<()>;

    fn cancel_auto_focus(&mut self) -> DeviceResult<()>;

    /// Re-establish the capture path after the owner regained the device
    fn reconnect(&mut self) -> DeviceResult<()>;
}

/// The externally-owned rendering surface the preview draws into. Its
/// lifecycle is driven by the surrounding application; the session
/// controller only reacts to it.
pub trait PreviewSurface: Send + 'static {
    /// True while the surface is still being constructed
    fn is_under_construction(&self) -> bool;

    /// Drawable output for the device, absent once the surface is gone
    fn drawable_target(&self) -> Option<PreviewTarget>;

    /// UI viewport size, the working area touch coordinates live in
    fn viewport(&self) -> Resolution;

    /// Hint that the display should not sleep while previewing
    fn set_keep_display_active(&mut self, active: bool);
}
