//! Error Types
//!
//! `DeviceError` is what a backend reports; `PresentError` is what the
//! presentation engine reports to its host.

use thiserror::Error;

use crate::device::Extent;
use crate::surface::SurfaceState;

/// Failure reported by a graphics backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The graphics API or driver could not be loaded
    #[error("graphics API unavailable: {0}")]
    Unavailable(String),

    /// The requested adapter does not exist
    #[error("adapter {index} not present ({count} available)")]
    InvalidAdapter { index: u32, count: usize },

    /// The device went away (driver reset, mode switch, removal)
    #[error("device lost")]
    Lost,

    /// The device cannot produce buffers of this size
    #[error("unsupported back buffer size {0}")]
    Unsupported(Extent),

    /// Any other driver call failure
    #[error("driver call failed: {0}")]
    Driver(String),
}

/// Failure reported by the presentation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresentError {
    /// Session could not be created; the surface is unusable until re-initialized
    #[error("device creation failed: {0}")]
    DeviceCreation(#[source] DeviceError),

    /// Present reported device loss; the surface needs a reset
    #[error("device lost")]
    DeviceLost,

    /// The producer handed over a malformed frame
    #[error("invalid frame {width}x{height} (stride {stride}, {len} pixels): {reason}")]
    InvalidFrame {
        width: u32,
        height: u32,
        stride: usize,
        len: usize,
        reason: &'static str,
    },

    /// Back buffers could not be resized; the previous size is kept
    #[error("resize to {requested} failed, keeping {kept}")]
    ResizeFailure { requested: Extent, kept: Extent },

    /// The operation needs a ready session
    #[error("surface not ready ({0:?})")]
    NotReady(SurfaceState),
}

impl PresentError {
    /// Whether the error means the session is gone.
    pub fn is_device_loss(&self) -> bool {
        matches!(self, PresentError::DeviceLost)
    }
}

impl From<DeviceError> for PresentError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Lost => PresentError::DeviceLost,
            other => PresentError::DeviceCreation(other),
        }
    }
}
