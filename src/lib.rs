pub mod capabilities;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod geometry;
pub mod session;
pub mod sim;

pub use capabilities::{negotiate, CaptureCapabilities, ChosenConfiguration, Resolution};
pub use config::{FocusConfig, ScancamConfig, SessionConfig};
pub use device::{
    CaptureDevice, DeviceParameters, FlashMode, FocusCallback, FocusMode, FrameCallback,
    PreviewSurface, PreviewTarget,
};
pub use error::{DeviceError, DeviceResult, NegotiationError, Result, ScancamError};
pub use events::{FocusOutcome, SurfaceEvent};
pub use geometry::{compute_metering_area, MeteringRect, DEVICE_COORD_MAX, DEVICE_COORD_MIN};
pub use session::{SessionController, SessionControllerBuilder, SessionState};
pub use sim::{CallCounts, SimulatedDevice, SimulatedSurface};
