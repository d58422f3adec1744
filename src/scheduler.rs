//! Presentation Scheduler
//!
//! Host-facing engine: uploads frames, composites them on repaint and paces
//! presents to the display. All calls happen on the host's thread; `sync`
//! is the only one that blocks, and never for more than twice the
//! estimated refresh period.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, MAX_PRESENT_INTERVAL};
use crate::device::{AdapterInfo, DeviceFactory, Extent, Frame};
use crate::error::PresentError;
use crate::estimator::FrameTimeEstimator;
use crate::surface::{PresentationSurface, SurfaceState};

/// Longest pacing wait, in multiples of the estimated period
pub const MAX_WAIT_PERIODS: u64 = MAX_PRESENT_INTERVAL as u64;

/// Events a host window forwards to the engine
pub trait HostEvents {
    /// The window needs repainting.
    fn on_repaint_requested(&mut self);

    /// The client area changed size.
    fn on_resized(&mut self, width: u32, height: u32);

    /// The user toggled exclusive fullscreen.
    fn on_exclusive_toggled(&mut self, exclusive: bool);

    /// The emulated machine changed its refresh rate (deci-Hertz).
    fn on_rate_changed(&mut self, dhz: u32);
}

/// Drives blit, draw and sync for one presentation surface
pub struct PresentationScheduler<F: DeviceFactory, C: Clock = SystemClock> {
    surface: PresentationSurface<F>,
    estimator: FrameTimeEstimator,
    clock: C,
    /// A frame arrived (or the surface was rebuilt) since the last composite
    dirty: bool,
    /// A composite happened since the last present
    drawn: bool,
    last_sync: Option<u64>,
    dropped_frames: u64,
    abandoned_waits: u64,
}

impl<F: DeviceFactory> PresentationScheduler<F> {
    /// Scheduler pacing against the system clock.
    pub fn new(factory: F) -> Self {
        Self::with_clock(factory, SystemClock::new())
    }
}

impl<F: DeviceFactory, C: Clock> PresentationScheduler<F, C> {
    pub fn with_clock(factory: F, clock: C) -> Self {
        let config = Config::default();
        Self {
            estimator: FrameTimeEstimator::new(config.refresh_rate_dhz),
            surface: PresentationSurface::new(factory),
            clock,
            dirty: false,
            drawn: false,
            last_sync: None,
            dropped_frames: 0,
            abandoned_waits: 0,
        }
    }

    /// Create the device session for `config`.
    ///
    /// A failure leaves the scheduler unusable; every other call keeps
    /// working as a no-op.
    pub fn init(&mut self, config: Config) -> Result<(), PresentError> {
        let result = self.surface.init(config);
        self.dirty = false;
        self.drawn = false;
        self.last_sync = None;
        self.rearm_estimator();
        result
    }

    /// Release the device session.
    pub fn uninit(&mut self) {
        self.surface.uninit();
        self.dirty = false;
        self.drawn = false;
        self.last_sync = None;
    }

    /// Replace the configuration ("accept settings").
    pub fn reconfigure(&mut self, config: Config) -> Result<(), PresentError> {
        let current = self.surface.config();
        let rearm = current.requires_rebuild(&config)
            || current.refresh_rate_dhz != config.refresh_rate_dhz;
        let result = self.surface.reconfigure(config);
        if rearm {
            self.rearm_estimator();
        }
        self.invalidate();
        result
    }

    /// Upload a tightly packed xRGB frame.
    ///
    /// Malformed frames are dropped and the previous frame stays on screen.
    pub fn blit(&mut self, pixels: &[u32], width: u32, height: u32) {
        match Frame::packed(pixels, width, height) {
            Ok(frame) => self.blit_frame(&frame),
            Err(err) => self.drop_frame(err),
        }
    }

    /// Upload a frame with arbitrary row stride.
    pub fn blit_frame(&mut self, frame: &Frame<'_>) {
        match self.surface.upload(frame) {
            Ok(()) => {
                trace!("Frame {} uploaded", frame.extent());
                self.dirty = true;
            }
            Err(err @ PresentError::InvalidFrame { .. }) => self.drop_frame(err),
            Err(PresentError::DeviceLost) => {
                warn!("Device lost during frame upload");
            }
            Err(err) => trace!("Frame upload skipped: {}", err),
        }
    }

    /// Composite the pending frame. Returns whether a composite happened.
    pub fn draw(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        match self.surface.draw() {
            Ok(()) => {
                self.dirty = false;
                self.drawn = true;
                true
            }
            Err(PresentError::DeviceLost) => {
                warn!("Device lost during draw");
                false
            }
            Err(err) => {
                trace!("Draw skipped: {}", err);
                false
            }
        }
    }

    /// Present the composited frame, pacing to the display where needed.
    ///
    /// Returns microseconds elapsed since the previous call (0 on the first).
    pub fn sync(&mut self) -> u64 {
        if self.surface.state() == SurfaceState::Lost {
            self.recover();
        }

        if self.drawn && self.surface.state() == SurfaceState::Ready {
            let (paced, blocking) = self
                .surface
                .params()
                .map_or((false, false), |p| (p.paced_blits, p.blocks_on_present()));

            if paced {
                self.wait_for_vblank();
            }

            match self.surface.present() {
                Ok(()) => {
                    self.drawn = false;
                    if paced || blocking {
                        self.estimator.update(self.clock.now_micros());
                    }
                }
                Err(PresentError::DeviceLost) => {
                    self.drawn = false;
                    self.recover();
                }
                Err(err) => warn!("Present failed: {}", err),
            }
        }

        let now = self.clock.now_micros();
        let elapsed = self.last_sync.map_or(0, |last| now.saturating_sub(last));
        self.last_sync = Some(now);
        elapsed
    }

    /// Estimated display refresh period in microseconds (0 if unknown).
    pub fn frame_time_est(&self) -> u64 {
        self.estimator.estimate()
    }

    /// Re-arm the estimator for a new nominal rate in deci-Hertz.
    pub fn rate_change(&mut self, dhz: u32) {
        if dhz == 0 {
            debug!("Ignoring empty refresh rate hint");
            return;
        }
        info!("Refresh rate hint changed to {} dHz", dhz);
        let config = self.surface.config().clone().with_refresh_rate(dhz);
        if let Err(err) = self.surface.reconfigure(config) {
            warn!("Could not apply rate hint: {}", err);
        }
        if self.exclusive_rate().is_some() {
            // The exclusive display mode fixes the rate
            return;
        }
        self.estimator.reset(dhz);
    }

    /// Follow a host window size change.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), PresentError> {
        let before = self.surface.rebuild_count();
        let result = self.surface.resize(Extent::new(width, height));
        if self.surface.rebuild_count() != before {
            self.invalidate();
        }
        result
    }

    /// Switch between windowed and exclusive presentation.
    pub fn set_exclusive(&mut self, exclusive: bool) -> Result<(), PresentError> {
        if exclusive == self.surface.is_exclusive() {
            return Ok(());
        }
        let result = self.surface.set_exclusive(exclusive);
        self.rearm_estimator();
        self.invalidate();
        result
    }

    /// Change the swap interval (0 = immediate).
    pub fn set_swap_interval(&mut self, interval: u32) -> Result<(), PresentError> {
        if interval == self.surface.config().swap_interval {
            return Ok(());
        }
        let result = self.surface.set_swap_interval(interval);
        self.rearm_estimator();
        self.invalidate();
        result
    }

    /// True when nothing will be presented until the next `init`.
    pub fn is_unusable(&self) -> bool {
        self.surface.is_unusable()
    }

    pub fn adapters(&self) -> Vec<AdapterInfo> {
        self.surface.adapters()
    }

    pub fn surface(&self) -> &PresentationSurface<F> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut PresentationSurface<F> {
        &mut self.surface
    }

    pub fn estimator(&self) -> &FrameTimeEstimator {
        &self.estimator
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Frames rejected as malformed.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Pacing waits abandoned for exceeding the bound.
    pub fn abandoned_waits(&self) -> u64 {
        self.abandoned_waits
    }

    /// Whether a frame is waiting to be composited.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn drop_frame(&mut self, err: PresentError) {
        self.dropped_frames += 1;
        warn!("Dropping frame: {}", err);
    }

    /// Back buffers were recreated; the next draw must repaint them.
    fn invalidate(&mut self) {
        self.dirty = true;
        self.drawn = false;
    }

    fn exclusive_rate(&self) -> Option<u32> {
        let config = self.surface.config();
        (self.surface.is_exclusive() && config.fullscreen.rate_dhz != 0)
            .then_some(config.fullscreen.rate_dhz)
    }

    fn rearm_estimator(&mut self) {
        let rate = self
            .exclusive_rate()
            .unwrap_or(self.surface.config().refresh_rate_dhz);
        self.estimator.reset(rate);
    }

    fn recover(&mut self) {
        if self.surface.try_recover() {
            info!("Presentation restored after device loss");
            self.rearm_estimator();
            self.invalidate();
        } else if self.surface.is_unusable() {
            debug!("Surface unusable, skipping present");
        }
    }

    /// Sleep until the estimated next refresh boundary, within the bound.
    fn wait_for_vblank(&mut self) {
        let now = self.clock.now_micros();
        let Some(boundary) = self.estimator.next_boundary(now) else {
            return;
        };
        let wait = boundary.saturating_sub(now);
        let limit = self.estimator.estimate() * MAX_WAIT_PERIODS;
        if wait > limit {
            self.abandoned_waits += 1;
            warn!(
                "Abandoning vblank wait of {} us (limit {} us)",
                wait, limit
            );
            return;
        }
        trace!("Waiting {} us for vblank", wait);
        self.clock.sleep(Duration::from_micros(wait));
    }
}

impl<F: DeviceFactory, C: Clock> HostEvents for PresentationScheduler<F, C> {
    fn on_repaint_requested(&mut self) {
        self.draw();
    }

    fn on_resized(&mut self, width: u32, height: u32) {
        if let Err(err) = self.resize(width, height) {
            warn!("Resize to {}x{} not applied: {}", width, height, err);
        }
    }

    fn on_exclusive_toggled(&mut self, exclusive: bool) {
        if let Err(err) = self.set_exclusive(exclusive) {
            warn!("Mode switch not applied: {}", err);
        }
    }

    fn on_rate_changed(&mut self, dhz: u32) {
        self.rate_change(dhz);
    }
}
