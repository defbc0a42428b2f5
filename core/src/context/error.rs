//! Error types for context operations

use std::path::PathBuf;
use thiserror::Error;

use crate::vr::{OverlayError, VrInitError};

/// Errors during configuration persistence
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize configuration")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write configuration {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not locate the executable directory")]
    ExecutableDir(#[source] std::io::Error),
}

/// Fatal startup failures. Each carries a code, a message and a remedy for
/// the ERROR lifecycle event.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("SteamVR not running / No HMD.")]
    NoHmd,

    #[error("OpenVR overlay app failed / No HMD.")]
    RuntimeInit(#[source] VrInitError),

    #[error("Overlays error / Running twice.")]
    OverlayCreate {
        key: String,
        #[source]
        source: OverlayError,
    },

    #[error("GPU context could not be initialised.")]
    Renderer(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StartupError {
    pub fn code(&self) -> &'static str {
        match self {
            StartupError::NoHmd => "[E:0]",
            StartupError::RuntimeInit(_) => "[E:1]",
            StartupError::OverlayCreate { .. } => "[E:2]",
            StartupError::Renderer(_) => "[E:3]",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn solution(&self) -> &'static str {
        match self {
            StartupError::NoHmd => {
                "Ensure SteamVR is working with an HMD connected, then restart this app."
            }
            StartupError::RuntimeInit(_) => {
                "Ensure an HMD is connected and restart SteamVR, then restart this app."
            }
            StartupError::OverlayCreate { .. } => {
                "Close this instance of the app. / Restart SteamVR then, restart this app."
            }
            StartupError::Renderer(_) => "Update the graphics driver, then restart this app.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_messages() {
        let no_hmd = StartupError::NoHmd;
        assert_eq!(no_hmd.code(), "[E:0]");
        assert!(no_hmd.message().contains("No HMD"));

        let overlay = StartupError::OverlayCreate {
            key: "albrt.overlay.eye.left".into(),
            source: OverlayError::KeyInUse("albrt.overlay.eye.left".into()),
        };
        assert_eq!(overlay.code(), "[E:2]");
        assert!(overlay.solution().contains("Close this instance"));
    }
}
