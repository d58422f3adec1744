//! Headless Backend
//!
//! Software device that composites into CPU-side back buffers. It follows
//! the same buffering rules as a GPU swap chain and can emulate vertical
//! blank blocking at a nominal refresh rate, which makes it usable for the
//! demo binary and for tests that need real pixels.

use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use tracing::debug;

use crate::config::{BufferingMode, FilterMode, PresentParams};
use crate::device::{
    AdapterInfo, Device, DeviceFactory, DisplayMode, DrawPass, Extent, Frame, Quad,
};
use crate::error::DeviceError;
use crate::estimator::period_from_dhz;

/// Largest texture edge the software device accepts
pub const MAX_TEXTURE_SIZE: u32 = 4096;

/// Largest back buffer edge the software device accepts
pub const MAX_BACK_BUFFER_SIZE: u32 = 8192;

/// Creates software devices
#[derive(Debug, Clone)]
pub struct HeadlessFactory {
    modes: Vec<DisplayMode>,
    refresh_dhz: u32,
    emulate_vsync: bool,
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessFactory {
    /// A 60 Hz software display with vertical blank emulation.
    pub fn new() -> Self {
        let modes = [(640, 480), (1280, 720), (1920, 1080)]
            .into_iter()
            .map(|(width, height)| DisplayMode {
                width,
                height,
                rate_dhz: 600,
            })
            .collect();
        Self {
            modes,
            refresh_dhz: 600,
            emulate_vsync: true,
        }
    }

    /// Present immediately regardless of swap interval.
    pub fn without_vsync(mut self) -> Self {
        self.emulate_vsync = false;
        self
    }

    /// Emulated display refresh rate in deci-Hertz.
    pub fn with_refresh_rate(mut self, dhz: u32) -> Self {
        self.refresh_dhz = dhz.max(1);
        self
    }
}

impl DeviceFactory for HeadlessFactory {
    type Device = HeadlessDevice;

    fn adapters(&self) -> Vec<AdapterInfo> {
        vec![AdapterInfo {
            index: 0,
            name: "Software Rasterizer".to_string(),
            modes: self.modes.clone(),
        }]
    }

    fn create_device(
        &mut self,
        adapter: u32,
        params: &PresentParams,
    ) -> Result<HeadlessDevice, DeviceError> {
        if adapter != 0 {
            return Err(DeviceError::InvalidAdapter {
                index: adapter,
                count: 1,
            });
        }
        check_extent(params.extent)?;
        if params.exclusive
            && !self
                .modes
                .iter()
                .any(|m| m.width == params.extent.width && m.height == params.extent.height)
        {
            return Err(DeviceError::Unsupported(params.extent));
        }

        let rate = if params.exclusive && params.rate_dhz != 0 {
            params.rate_dhz
        } else {
            self.refresh_dhz
        };
        debug!(
            "Creating software device {} {:?} at {} dHz",
            params.extent, params.buffering, rate
        );

        let count = params.buffering.buffer_count() as usize;
        Ok(HeadlessDevice {
            buffers: vec![vec![0; params.extent.area()]; count],
            back: 0,
            front: vec![0; params.extent.area()],
            extent: params.extent,
            buffering: params.buffering,
            period: Duration::from_micros(period_from_dhz(rate)),
            vblank_origin: Instant::now(),
            emulate_vsync: self.emulate_vsync,
            sleeper: SpinSleeper::default(),
            presents: 0,
        })
    }
}

fn check_extent(extent: Extent) -> Result<(), DeviceError> {
    if extent.is_empty() || extent.width > MAX_BACK_BUFFER_SIZE || extent.height > MAX_BACK_BUFFER_SIZE
    {
        return Err(DeviceError::Unsupported(extent));
    }
    Ok(())
}

/// A frame texture in system memory
#[derive(Debug, Clone)]
pub struct HeadlessTexture {
    extent: Extent,
    pixels: Vec<u32>,
}

impl HeadlessTexture {
    fn texel(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.extent.width as usize + x as usize]
    }
}

/// The quad as the software rasterizer sees it
#[derive(Debug, Clone, Default)]
pub struct HeadlessQuad {
    quad: Quad,
}

/// Software device session
#[derive(Debug)]
pub struct HeadlessDevice {
    buffers: Vec<Vec<u32>>,
    back: usize,
    front: Vec<u32>,
    extent: Extent,
    buffering: BufferingMode,
    period: Duration,
    vblank_origin: Instant,
    emulate_vsync: bool,
    sleeper: SpinSleeper,
    presents: u64,
}

impl HeadlessDevice {
    /// What the emulated display currently shows.
    pub fn front_buffer(&self) -> &[u32] {
        &self.front
    }

    /// Number of completed presents.
    pub fn presents(&self) -> u64 {
        self.presents
    }

    fn wait_for_vblank(&self, interval: u32) {
        let period = self.period.as_micros() as u64;
        if period == 0 {
            return;
        }
        let elapsed = self.vblank_origin.elapsed().as_micros() as u64;
        let next = (elapsed / period + u64::from(interval)) * period;
        self.sleeper
            .sleep(Duration::from_micros(next.saturating_sub(elapsed)));
    }
}

impl Device for HeadlessDevice {
    type Texture = HeadlessTexture;
    type VertexBuffer = HeadlessQuad;

    fn max_texture_size(&self) -> u32 {
        MAX_TEXTURE_SIZE
    }

    fn back_buffer_extent(&self) -> Extent {
        self.extent
    }

    fn resize_buffers(&mut self, extent: Extent) -> Result<(), DeviceError> {
        check_extent(extent)?;
        for buffer in &mut self.buffers {
            *buffer = vec![0; extent.area()];
        }
        self.front = vec![0; extent.area()];
        self.back = 0;
        self.extent = extent;
        Ok(())
    }

    fn create_texture(&mut self, extent: Extent) -> Result<HeadlessTexture, DeviceError> {
        if extent.width > MAX_TEXTURE_SIZE || extent.height > MAX_TEXTURE_SIZE {
            return Err(DeviceError::Unsupported(extent));
        }
        Ok(HeadlessTexture {
            extent,
            pixels: vec![0; extent.area()],
        })
    }

    fn upload(&mut self, texture: &mut HeadlessTexture, frame: &Frame<'_>) -> Result<(), DeviceError> {
        if !texture.extent.contains(frame.extent()) {
            return Err(DeviceError::Unsupported(frame.extent()));
        }
        let pitch = texture.extent.width as usize;
        for (y, row) in frame.rows().enumerate() {
            let start = y * pitch;
            texture.pixels[start..start + row.len()].copy_from_slice(row);
        }
        Ok(())
    }

    fn create_vertex_buffer(&mut self) -> Result<HeadlessQuad, DeviceError> {
        Ok(HeadlessQuad::default())
    }

    fn write_quad(&mut self, buffer: &mut HeadlessQuad, quad: &Quad) -> Result<(), DeviceError> {
        buffer.quad = *quad;
        Ok(())
    }

    fn draw(
        &mut self,
        texture: Option<&HeadlessTexture>,
        buffer: &HeadlessQuad,
        pass: DrawPass,
    ) -> Result<(), DeviceError> {
        let width = self.extent.width as usize;
        let target = &mut self.buffers[self.back];
        if pass.clear {
            target.fill(0);
        }
        let Some(texture) = texture else {
            return Ok(());
        };

        let quad = &buffer.quad;
        let place = quad.placement;
        if place.width == 0 || place.height == 0 {
            return Ok(());
        }
        let src_w = quad.uv_max[0] * texture.extent.width as f32;
        let src_h = quad.uv_max[1] * texture.extent.height as f32;
        let max_x = (src_w.ceil() as u32).max(1) - 1;
        let max_y = (src_h.ceil() as u32).max(1) - 1;
        let step_x = src_w / place.width as f32;
        let step_y = src_h / place.height as f32;

        let bottom = (place.y + place.height).min(self.extent.height);
        let right = (place.x + place.width).min(self.extent.width);
        for py in place.y..bottom {
            let sy = (py - place.y) as f32 * step_y + step_y * 0.5;
            let row = py as usize * width;
            for px in place.x..right {
                let sx = (px - place.x) as f32 * step_x + step_x * 0.5;
                target[row + px as usize] = match pass.filter {
                    FilterMode::Nearest => {
                        texture.texel((sx as u32).min(max_x), (sy as u32).min(max_y))
                    }
                    FilterMode::Linear => bilinear(texture, sx - 0.5, sy - 0.5, max_x, max_y),
                };
            }
        }
        Ok(())
    }

    fn present(&mut self, interval: u32) -> Result<(), DeviceError> {
        if self.emulate_vsync && interval > 0 {
            self.wait_for_vblank(interval);
        }
        self.front.copy_from_slice(&self.buffers[self.back]);
        if self.buffering.is_flip_model() {
            self.back = (self.back + 1) % self.buffers.len();
        }
        self.presents += 1;
        Ok(())
    }
}

fn bilinear(texture: &HeadlessTexture, x: f32, y: f32, max_x: u32, max_y: u32) -> u32 {
    let x = x.max(0.0);
    let y = y.max(0.0);
    let x0 = (x as u32).min(max_x);
    let y0 = (y as u32).min(max_y);
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let lerp = |a: u32, b: u32, t: f32| -> u32 {
        let mut out = 0;
        for shift in [0, 8, 16] {
            let ca = ((a >> shift) & 0xff) as f32;
            let cb = ((b >> shift) & 0xff) as f32;
            let c = (ca + (cb - ca) * t).round().clamp(0.0, 255.0) as u32;
            out |= c << shift;
        }
        out
    };

    let top = lerp(texture.texel(x0, y0), texture.texel(x1, y0), fx);
    let bottom = lerp(texture.texel(x0, y1), texture.texel(x1, y1), fx);
    lerp(top, bottom, fy)
}
