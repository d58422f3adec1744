//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use blitter::{
    AdapterInfo, Clock, Config, Device, DeviceError, DeviceFactory, DisplayMode, DrawPass, Extent,
    Frame, PresentParams, PresentationScheduler, Quad,
};

/// Everything the fake backend observed, plus injected faults
#[derive(Debug, Default)]
pub struct FakeLog {
    pub create_attempts: u32,
    pub devices_created: u32,
    pub resizes: u32,
    pub textures_created: u32,
    pub uploads: u32,
    pub draws: u32,
    pub clears: u32,
    pub present_intervals: Vec<u32>,
    pub last_quad: Option<Quad>,
    pub last_params: Option<PresentParams>,
    /// Allocation size of the texture sampled by the last draw
    pub drawn_texture: Option<Extent>,
    /// Resources in the order they were released
    pub releases: Vec<&'static str>,

    /// Fail this many upcoming device creations
    pub fail_creates: u32,
    /// Fail this many upcoming uploads with a driver error
    pub fail_uploads: u32,
    /// Report device loss on the next present
    pub lose_next_present: bool,
    /// Back buffer sizes the device refuses
    pub unsupported: Vec<Extent>,
}

pub type SharedLog = Rc<RefCell<FakeLog>>;

pub struct FakeFactory {
    log: SharedLog,
    adapter_count: u32,
}

impl FakeFactory {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        (
            Self {
                log: log.clone(),
                adapter_count: 1,
            },
            log,
        )
    }

    pub fn with_adapters(count: u32) -> (Self, SharedLog) {
        let (mut factory, log) = Self::new();
        factory.adapter_count = count;
        (factory, log)
    }
}

impl DeviceFactory for FakeFactory {
    type Device = FakeDevice;

    fn adapters(&self) -> Vec<AdapterInfo> {
        (0..self.adapter_count)
            .map(|index| AdapterInfo {
                index,
                name: format!("Fake Adapter {}", index),
                modes: vec![
                    DisplayMode {
                        width: 1920,
                        height: 1080,
                        rate_dhz: 600,
                    },
                    DisplayMode {
                        width: 1280,
                        height: 720,
                        rate_dhz: 500,
                    },
                ],
            })
            .collect()
    }

    fn create_device(
        &mut self,
        adapter: u32,
        params: &PresentParams,
    ) -> Result<FakeDevice, DeviceError> {
        let mut log = self.log.borrow_mut();
        log.create_attempts += 1;
        if log.fail_creates > 0 {
            log.fail_creates -= 1;
            return Err(DeviceError::Unavailable("injected failure".to_string()));
        }
        if adapter >= self.adapter_count {
            return Err(DeviceError::InvalidAdapter {
                index: adapter,
                count: self.adapter_count as usize,
            });
        }
        if log.unsupported.contains(&params.extent) {
            return Err(DeviceError::Unsupported(params.extent));
        }
        log.devices_created += 1;
        log.last_params = Some(*params);
        Ok(FakeDevice {
            log: self.log.clone(),
            extent: params.extent,
        })
    }
}

pub struct FakeDevice {
    log: SharedLog,
    extent: Extent,
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        let mut log = self.log.borrow_mut();
        log.releases.push("swap chain");
        log.releases.push("device");
    }
}

pub struct FakeTexture {
    log: SharedLog,
    extent: Extent,
}

impl Drop for FakeTexture {
    fn drop(&mut self) {
        self.log.borrow_mut().releases.push("texture");
    }
}

pub struct FakeVertexBuffer {
    log: SharedLog,
}

impl Drop for FakeVertexBuffer {
    fn drop(&mut self) {
        self.log.borrow_mut().releases.push("vertex buffer");
    }
}

impl Device for FakeDevice {
    type Texture = FakeTexture;
    type VertexBuffer = FakeVertexBuffer;

    fn max_texture_size(&self) -> u32 {
        2048
    }

    fn back_buffer_extent(&self) -> Extent {
        self.extent
    }

    fn resize_buffers(&mut self, extent: Extent) -> Result<(), DeviceError> {
        let mut log = self.log.borrow_mut();
        if log.unsupported.contains(&extent) {
            return Err(DeviceError::Unsupported(extent));
        }
        log.resizes += 1;
        self.extent = extent;
        Ok(())
    }

    fn create_texture(&mut self, extent: Extent) -> Result<FakeTexture, DeviceError> {
        self.log.borrow_mut().textures_created += 1;
        Ok(FakeTexture {
            log: self.log.clone(),
            extent,
        })
    }

    fn upload(&mut self, texture: &mut FakeTexture, frame: &Frame<'_>) -> Result<(), DeviceError> {
        assert!(texture.extent.contains(frame.extent()));
        let mut log = self.log.borrow_mut();
        if log.fail_uploads > 0 {
            log.fail_uploads -= 1;
            return Err(DeviceError::Driver("injected upload failure".to_string()));
        }
        log.uploads += 1;
        Ok(())
    }

    fn create_vertex_buffer(&mut self) -> Result<FakeVertexBuffer, DeviceError> {
        Ok(FakeVertexBuffer {
            log: self.log.clone(),
        })
    }

    fn write_quad(&mut self, _buffer: &mut FakeVertexBuffer, quad: &Quad) -> Result<(), DeviceError> {
        self.log.borrow_mut().last_quad = Some(*quad);
        Ok(())
    }

    fn draw(
        &mut self,
        texture: Option<&FakeTexture>,
        _buffer: &FakeVertexBuffer,
        pass: DrawPass,
    ) -> Result<(), DeviceError> {
        let mut log = self.log.borrow_mut();
        log.draws += 1;
        log.drawn_texture = texture.map(|t| t.extent);
        if pass.clear {
            log.clears += 1;
        }
        Ok(())
    }

    fn present(&mut self, interval: u32) -> Result<(), DeviceError> {
        let mut log = self.log.borrow_mut();
        if log.lose_next_present {
            log.lose_next_present = false;
            return Err(DeviceError::Lost);
        }
        log.present_intervals.push(interval);
        Ok(())
    }
}

/// Clock that only moves when told to, or when slept on
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    sleeps: Rc<RefCell<Vec<u64>>>,
}

impl ManualClock {
    pub fn starting_at(micros: u64) -> Self {
        let clock = Self::default();
        clock.set(micros);
        clock
    }

    pub fn advance(&self, micros: u64) {
        self.now.set(self.now.get() + micros);
    }

    pub fn set(&self, micros: u64) {
        self.now.set(micros);
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Durations slept so far, in microseconds.
    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        self.sleeps.borrow_mut().push(micros);
        self.advance(micros);
    }
}

pub type FakeScheduler = PresentationScheduler<FakeFactory, ManualClock>;

/// An initialized scheduler on the fake backend.
pub fn scheduler(config: Config) -> (FakeScheduler, SharedLog, ManualClock) {
    let (factory, log) = FakeFactory::new();
    let clock = ManualClock::starting_at(1_000_000);
    let mut scheduler = PresentationScheduler::with_clock(factory, clock.clone());
    scheduler.init(config).expect("fake device creation");
    (scheduler, log, clock)
}

/// A solid frame of the default source size.
pub fn frame() -> Vec<u32> {
    vec![0x0080_8080; 160 * 144]
}
