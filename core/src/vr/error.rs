use thiserror::Error;

/// Runtime session init failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VrInitError {
    #[error("no HMD found")]
    HmdNotFound,

    #[error("VR runtime is not installed or not running")]
    RuntimeNotRunning,

    #[error("VR runtime init failed (code {code})")]
    Other { code: i32 },
}

/// Compositor overlay error codes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("overlay key '{0}' is already in use")]
    KeyInUse(String),

    #[error("invalid overlay handle")]
    InvalidHandle,

    #[error("unknown overlay")]
    UnknownOverlay,

    #[error("overlay request failed")]
    RequestFailed,

    #[error("overlay subsystem not initialised")]
    NotInitialized,

    #[error("invalid overlay parameter")]
    InvalidParameter,
}
