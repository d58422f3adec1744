//! Presentation Surface
//!
//! Owns the device session (device, swap chain, frame texture, quad buffer)
//! and rebuilds it when window geometry, exclusive mode or buffering
//! configuration change. Device loss is discovered on present and recovered
//! by recreating the session with identical parameters. The last uploaded
//! frame is replayed into every rebuilt session.

use tracing::{debug, error, info, warn};

use crate::compositor::{Composition, Compositor};
use crate::config::{Config, PresentParams};
use crate::device::{AdapterInfo, Device, DeviceFactory, Extent, Frame};
use crate::error::{DeviceError, PresentError};
use crate::texture::FrameTexture;

/// Automatic reset attempts per loss before the surface gives up
pub const MAX_RESET_ATTEMPTS: u32 = 3;

/// Lifecycle state of the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// No session; `init` has not run or `uninit` was called
    Uninitialized,
    /// A session is live and accepts draws and presents
    Ready,
    /// The device was lost; only `reset_device` is accepted
    Lost,
}

/// One live device session.
///
/// Fields drop in declaration order: quad buffer, frame texture, then the
/// device (which releases its swap chain before itself).
pub(crate) struct Session<D: Device> {
    pub(crate) compositor: Compositor<D::VertexBuffer>,
    pub(crate) texture: FrameTexture<D::Texture>,
    pub(crate) device: D,
    pub(crate) params: PresentParams,
}

impl<D: Device> Session<D> {
    fn create<F>(factory: &mut F, adapter: u32, params: PresentParams) -> Result<Self, DeviceError>
    where
        F: DeviceFactory<Device = D>,
    {
        let mut device = factory.create_device(adapter, &params)?;
        // On error `device` drops here, releasing whatever was created
        let buffer = device.create_vertex_buffer()?;
        Ok(Self {
            compositor: Compositor::new(buffer, params.buffering.buffer_count()),
            texture: FrameTexture::new(),
            device,
            params,
        })
    }
}

/// The device session and everything needed to rebuild it
pub struct PresentationSurface<F: DeviceFactory> {
    factory: F,
    config: Config,
    state: SurfaceState,
    session: Option<Session<F::Device>>,
    windowed_extent: Extent,
    exclusive_extent: Extent,
    exclusive: bool,
    reset_failures: u32,
    unusable: bool,
    rebuilds: u32,
    /// Packed copy of the last uploaded frame
    last_frame: Option<(Vec<u32>, Extent)>,
}

impl<F: DeviceFactory> PresentationSurface<F> {
    pub fn new(factory: F) -> Self {
        let config = Config::default();
        Self {
            factory,
            windowed_extent: config.window.extent(),
            exclusive_extent: config.fullscreen.extent(),
            exclusive: config.exclusive,
            config,
            state: SurfaceState::Uninitialized,
            session: None,
            reset_failures: 0,
            unusable: false,
            rebuilds: 0,
            last_frame: None,
        }
    }

    /// Select the adapter and create the session.
    ///
    /// On failure the surface reports itself unusable until the next `init`.
    pub fn init(&mut self, config: Config) -> Result<(), PresentError> {
        self.windowed_extent = config.window.extent();
        self.last_frame = None;
        self.start(config)
    }

    /// `init` that keeps the current windowed size.
    fn start(&mut self, config: Config) -> Result<(), PresentError> {
        if self.session.is_some() {
            self.uninit();
        }

        info!(
            "Initializing presentation surface: adapter {} {:?} swap interval {}",
            config.adapter_index, config.buffering, config.swap_interval
        );

        self.exclusive_extent = config.fullscreen.extent();
        self.exclusive = config.exclusive;
        self.config = config;
        self.reset_failures = 0;
        self.unusable = false;

        let adapters = self.factory.adapters();
        if adapters.is_empty() {
            error!("No graphics adapters available");
            self.unusable = true;
            return Err(PresentError::DeviceCreation(DeviceError::Unavailable(
                "no adapters".to_string(),
            )));
        }
        if self.config.adapter_index as usize >= adapters.len() {
            error!(
                "Adapter {} not present ({} available)",
                self.config.adapter_index,
                adapters.len()
            );
            self.unusable = true;
            return Err(PresentError::DeviceCreation(DeviceError::InvalidAdapter {
                index: self.config.adapter_index,
                count: adapters.len(),
            }));
        }

        let params = self.target_params();
        match self.build(params) {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("Device creation failed: {}", err);
                self.unusable = true;
                Err(PresentError::DeviceCreation(err))
            }
        }
    }

    /// Tear the session down in reverse creation order.
    pub fn uninit(&mut self) {
        if self.session.take().is_some() {
            info!("Presentation surface released");
        }
        self.last_frame = None;
        self.state = SurfaceState::Uninitialized;
        self.reset_failures = 0;
    }

    /// Follow a window size change. No-op if the size is unchanged.
    pub fn resize(&mut self, extent: Extent) -> Result<(), PresentError> {
        let current = if self.exclusive {
            self.exclusive_extent
        } else {
            self.windowed_extent
        };
        if extent == current {
            return Ok(());
        }
        if extent.is_empty() {
            warn!("Ignoring resize to {}, keeping {}", extent, current);
            return Err(PresentError::ResizeFailure {
                requested: extent,
                kept: current,
            });
        }

        if self.state != SurfaceState::Ready {
            // Applied when the session is next built
            self.set_target_extent(extent);
            return Ok(());
        }

        debug!("Resizing presentation surface {} -> {}", current, extent);

        if self.exclusive {
            // Exclusive sessions cannot resize in place
            self.set_target_extent(extent);
            return self.rebuild_or_restore(current);
        }

        let state = self.state;
        let Some(session) = self.session.as_mut() else {
            return Err(PresentError::NotReady(state));
        };
        match session.device.resize_buffers(extent) {
            Ok(()) => {
                session.params.extent = extent;
                self.windowed_extent = extent;
                self.rebuilds += 1;
                Ok(())
            }
            Err(DeviceError::Lost) => {
                self.mark_lost();
                Err(PresentError::DeviceLost)
            }
            Err(err) => {
                warn!("Resize to {} failed: {}, keeping {}", extent, err, current);
                Err(PresentError::ResizeFailure {
                    requested: extent,
                    kept: current,
                })
            }
        }
    }

    /// Switch between windowed and exclusive presentation.
    ///
    /// Always rebuilds the whole device; the windowed size is remembered so
    /// leaving exclusive mode restores it.
    pub fn set_exclusive(&mut self, exclusive: bool) -> Result<(), PresentError> {
        if exclusive == self.exclusive {
            return Ok(());
        }
        info!(
            "Switching to {} presentation",
            if exclusive { "exclusive" } else { "windowed" }
        );

        let previous = self.exclusive;
        self.exclusive = exclusive;
        self.config.exclusive = exclusive;

        if self.state != SurfaceState::Ready {
            return Ok(());
        }

        let result = self.rebuild(self.target_params());
        if let Err(err) = result {
            warn!("Mode switch failed: {}, reverting", err);
            self.exclusive = previous;
            self.config.exclusive = previous;
            return self.rebuild_current().and(Err(PresentError::DeviceCreation(err)));
        }
        Ok(())
    }

    /// Change the swap interval, rebuilding the session.
    pub fn set_swap_interval(&mut self, interval: u32) -> Result<(), PresentError> {
        let config = self.config.clone().with_swap_interval(interval);
        self.reconfigure(config)
    }

    /// Replace the configuration, rebuilding only if the swap chain changes.
    pub fn reconfigure(&mut self, config: Config) -> Result<(), PresentError> {
        let rebuild = self.config.requires_rebuild(&config);
        let exclusive_changed = config.exclusive != self.exclusive;
        let adapter_changed = config.adapter_index != self.config.adapter_index;
        let previous_extent = self.exclusive_extent;
        let previous = std::mem::replace(&mut self.config, config);
        self.exclusive = self.config.exclusive;
        // A host-requested exclusive size survives unrelated setting changes
        if exclusive_changed || self.config.fullscreen != previous.fullscreen {
            self.exclusive_extent = self.config.fullscreen.extent();
        }

        if adapter_changed {
            let config = self.config.clone();
            return self.start(config);
        }

        if !rebuild || self.state != SurfaceState::Ready {
            if let Some(session) = self.session.as_mut() {
                session.params.clear_on_present = self.config.clear_on_present;
            }
            return Ok(());
        }

        debug!("Configuration change requires a new session");
        if let Err(err) = self.rebuild(self.target_params()) {
            warn!("Reconfiguration failed: {}, restoring previous settings", err);
            self.config = previous;
            self.exclusive = self.config.exclusive;
            self.exclusive_extent = previous_extent;
            return self.rebuild_current().and(Err(PresentError::DeviceCreation(err)));
        }
        Ok(())
    }

    /// Hand the back buffer to the display.
    pub fn present(&mut self) -> Result<(), PresentError> {
        let state = self.state;
        let Some(session) = self.ready_session() else {
            return Err(PresentError::NotReady(state));
        };
        let interval = session.params.present_interval();
        match session.device.present(interval) {
            Ok(()) => Ok(()),
            Err(DeviceError::Lost) => {
                self.mark_lost();
                Err(PresentError::DeviceLost)
            }
            Err(err) => {
                warn!("Present failed: {}", err);
                Err(PresentError::DeviceCreation(err))
            }
        }
    }

    /// Recreate a lost session with identical parameters.
    pub fn reset_device(&mut self) -> Result<(), PresentError> {
        match self.state {
            SurfaceState::Ready => return Ok(()),
            SurfaceState::Uninitialized => {
                return Err(PresentError::NotReady(SurfaceState::Uninitialized))
            }
            SurfaceState::Lost => {}
        }

        let params = self.target_params();
        match self.build(params) {
            Ok(()) => {
                info!(
                    "Device reset after {} failed attempt(s)",
                    self.reset_failures
                );
                self.reset_failures = 0;
                self.unusable = false;
                Ok(())
            }
            Err(err) => {
                self.state = SurfaceState::Lost;
                self.reset_failures += 1;
                warn!(
                    "Device reset attempt {} failed: {}",
                    self.reset_failures, err
                );
                if self.reset_failures >= MAX_RESET_ATTEMPTS && !self.unusable {
                    error!(
                        "Device could not be reset after {} attempts, surface disabled",
                        self.reset_failures
                    );
                    self.unusable = true;
                }
                Err(PresentError::DeviceLost)
            }
        }
    }

    /// Reset automatically while attempts remain. Returns whether the surface
    /// is ready afterwards.
    pub fn try_recover(&mut self) -> bool {
        match self.state {
            SurfaceState::Ready => true,
            SurfaceState::Lost if !self.unusable => self.reset_device().is_ok(),
            _ => false,
        }
    }

    /// Upload a frame into the session's texture.
    pub fn upload(&mut self, frame: &Frame<'_>) -> Result<(), PresentError> {
        let state = self.state;
        let Some(session) = self.ready_session() else {
            return Err(PresentError::NotReady(state));
        };
        let result = session.texture.upload(&mut session.device, frame);
        self.absorb_loss(result)?;
        self.keep_frame(frame);
        Ok(())
    }

    /// Composite the frame into the current back buffer.
    pub fn draw(&mut self) -> Result<(), PresentError> {
        let composition = Composition {
            scaling: self.config.scaling,
            filter: self.config.filter,
            clear_on_present: self.config.clear_on_present,
            flip_model: self.config.buffering.is_flip_model(),
        };
        let state = self.state;
        let Some(session) = self.ready_session() else {
            return Err(PresentError::NotReady(state));
        };
        let dest = session.params.extent;
        let result =
            session
                .compositor
                .draw(&mut session.device, &session.texture, dest, composition);
        self.absorb_loss(result)
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// True when the surface cannot present and will not recover on its own.
    pub fn is_unusable(&self) -> bool {
        self.unusable
    }

    /// Whether the surface is in exclusive mode (or will be once built).
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parameters of the live session.
    pub fn params(&self) -> Option<&PresentParams> {
        self.session.as_ref().map(|s| &s.params)
    }

    /// Back buffer size of the live session.
    pub fn back_buffer_extent(&self) -> Option<Extent> {
        self.session.as_ref().map(|s| s.device.back_buffer_extent())
    }

    /// Remembered windowed back buffer size.
    pub fn windowed_extent(&self) -> Extent {
        self.windowed_extent
    }

    /// Number of times back buffers were recreated (resizes and rebuilds).
    pub fn rebuild_count(&self) -> u32 {
        self.rebuilds
    }

    /// Consecutive failed reset attempts since the last loss.
    pub fn reset_failures(&self) -> u32 {
        self.reset_failures
    }

    pub fn adapters(&self) -> Vec<AdapterInfo> {
        self.factory.adapters()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// The live device, if ready.
    pub fn device(&self) -> Option<&F::Device> {
        self.session.as_ref().map(|s| &s.device)
    }

    /// Composite draws issued by the live session.
    pub fn composite_count(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.compositor.draws())
    }

    fn ready_session(&mut self) -> Option<&mut Session<F::Device>> {
        if self.state == SurfaceState::Ready {
            self.session.as_mut()
        } else {
            None
        }
    }

    fn absorb_loss(&mut self, result: Result<(), PresentError>) -> Result<(), PresentError> {
        if let Err(err) = &result {
            if err.is_device_loss() {
                self.mark_lost();
                return Err(PresentError::DeviceLost);
            }
        }
        result
    }

    fn mark_lost(&mut self) {
        warn!("Graphics device lost, releasing session");
        self.session = None;
        self.state = SurfaceState::Lost;
    }

    fn keep_frame(&mut self, frame: &Frame<'_>) {
        let (pixels, extent) = self.last_frame.get_or_insert_with(Default::default);
        pixels.clear();
        for row in frame.rows() {
            pixels.extend_from_slice(row);
        }
        *extent = frame.extent();
    }

    fn set_target_extent(&mut self, extent: Extent) {
        if self.exclusive {
            self.exclusive_extent = extent;
        } else {
            self.windowed_extent = extent;
        }
    }

    fn target_params(&self) -> PresentParams {
        if self.exclusive {
            PresentParams::exclusive(&self.config, self.exclusive_extent)
        } else {
            PresentParams::windowed(&self.config, self.windowed_extent)
        }
    }

    /// Release the current session, then create one for `params`.
    fn build(&mut self, params: PresentParams) -> Result<(), DeviceError> {
        // Exclusive devices can't coexist with their predecessor
        self.session = None;
        self.state = SurfaceState::Uninitialized;

        let mut session = Session::create(&mut self.factory, self.config.adapter_index, params)?;
        if let Some((pixels, extent)) = &self.last_frame {
            let replay = Frame::packed(pixels, extent.width, extent.height)
                .and_then(|frame| session.texture.upload(&mut session.device, &frame));
            if let Err(err) = replay {
                warn!("Could not restore last frame: {}", err);
            }
        }
        debug!(
            "Session built: {} {} {:?} interval {}",
            params.extent,
            if params.exclusive { "exclusive" } else { "windowed" },
            params.buffering,
            params.swap_interval
        );
        self.session = Some(session);
        self.state = SurfaceState::Ready;
        self.rebuilds += 1;
        Ok(())
    }

    fn rebuild(&mut self, params: PresentParams) -> Result<(), DeviceError> {
        self.build(params).inspect_err(|_| {
            self.state = SurfaceState::Lost;
        })
    }

    /// Rebuild with the current target, going unusable if that fails too.
    fn rebuild_current(&mut self) -> Result<(), PresentError> {
        match self.rebuild(self.target_params()) {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("Could not restore previous session: {}", err);
                self.unusable = true;
                Err(PresentError::DeviceCreation(err))
            }
        }
    }

    /// Rebuild for a new extent; on failure restore `kept`.
    fn rebuild_or_restore(&mut self, kept: Extent) -> Result<(), PresentError> {
        let requested = self.target_params().extent;
        match self.rebuild(self.target_params()) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("Session rebuild at {} failed: {}, keeping {}", requested, err, kept);
                self.set_target_extent(kept);
                self.rebuild_current()?;
                Err(PresentError::ResizeFailure { requested, kept })
            }
        }
    }
}
