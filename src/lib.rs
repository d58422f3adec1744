//! Blitter
//!
//! Frame presentation engine for emulator video output. The host hands over
//! decoded frames with `blit`, asks for a composite on repaint with `draw`,
//! and paces itself to the display with `sync`:
//!
//! 1. `PresentationSurface` owns the device session and rebuilds it on
//!    resize, mode switch and device loss
//! 2. `FrameTexture` keeps the latest frame on the GPU
//! 3. `Compositor` fits the frame into the back buffer and draws it
//! 4. `FrameTimeEstimator` tracks the display's real refresh period
//! 5. `PresentationScheduler` ties them together for the host

pub mod clock;
pub mod compositor;
pub mod config;
#[cfg(windows)]
pub mod d3d11;
pub mod device;
pub mod error;
pub mod estimator;
pub mod headless;
pub mod scheduler;
pub mod surface;
pub mod texture;

pub use clock::{Clock, SystemClock};
pub use compositor::{fit, Composition, Compositor};
pub use config::{
    BufferingMode, Config, FilterMode, PresentParams, ScalingMethod, MAX_PRESENT_INTERVAL,
};
pub use device::{
    AdapterInfo, Device, DeviceFactory, DisplayMode, DrawPass, Extent, Frame, Quad, Rect, Vertex,
};
pub use error::{DeviceError, PresentError};
pub use estimator::{period_from_dhz, FrameTimeEstimator};
pub use headless::{HeadlessDevice, HeadlessFactory};
pub use scheduler::{HostEvents, PresentationScheduler};
pub use surface::{PresentationSurface, SurfaceState, MAX_RESET_ATTEMPTS};
pub use texture::FrameTexture;
