use thiserror::Error;

/// Failures reported by a capture device backend.
///
/// These never propagate out of the session controller; every control
/// operation catches them at its own boundary and logs the outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Device is disconnected or released")]
    Disconnected,

    #[error("Device I/O failure: {details}")]
    Io { details: String },

    #[error("Device rejected parameters: {details}")]
    Rejected { details: String },
}

impl DeviceError {
    pub fn io<S: Into<String>>(details: S) -> Self {
        Self::Io {
            details: details.into(),
        }
    }

    pub fn rejected<S: Into<String>>(details: S) -> Self {
        Self::Rejected {
            details: details.into(),
        }
    }
}

/// Failures while negotiating a capture configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NegotiationError {
    #[error("Device reports no supported preview resolutions")]
    NoSupportedResolution,
}

#[derive(Error, Debug)]
pub enum ScancamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("System error: {message}")]
    System { message: String },
}

impl ScancamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScancamError>;

/// Result alias for operations on the device seam.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;
