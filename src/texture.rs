//! Frame Texture
//!
//! GPU copy of the latest decoded frame. The allocation is rounded up to
//! power-of-two edges and only grows; the valid sub-rectangle is tracked
//! separately so the compositor samples nothing outside it.

use tracing::{debug, warn};

use crate::device::{Device, Extent, Frame};
use crate::error::PresentError;

/// Texture edge for a requested edge: next power of two.
pub fn allocation_edge(requested: u32) -> u32 {
    requested.max(1).next_power_of_two()
}

/// The decoded frame on the GPU
pub struct FrameTexture<T> {
    texture: Option<T>,
    allocated: Extent,
    used: Extent,
    allocations: u32,
}

impl<T> Default for FrameTexture<T> {
    fn default() -> Self {
        Self {
            texture: None,
            allocated: Extent::default(),
            used: Extent::default(),
            allocations: 0,
        }
    }
}

impl<T> FrameTexture<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `frame` to the GPU, growing the allocation if it no longer fits.
    ///
    /// On error the previous content and sizes are left untouched.
    pub fn upload<D>(&mut self, device: &mut D, frame: &Frame<'_>) -> Result<(), PresentError>
    where
        D: Device<Texture = T>,
    {
        let size = frame.extent();
        let max = device.max_texture_size();
        if size.width > max || size.height > max {
            return Err(PresentError::InvalidFrame {
                width: size.width,
                height: size.height,
                stride: frame.stride(),
                len: size.area(),
                reason: "frame exceeds device texture limit",
            });
        }

        if self.texture.is_none() || !self.allocated.contains(size) {
            let allocated = Extent::new(
                allocation_edge(size.width).min(max),
                allocation_edge(size.height).min(max),
            );
            debug!(
                "Allocating frame texture {} for {} source",
                allocated, size
            );
            let mut texture = device
                .create_texture(allocated)
                .map_err(device_failure)?;
            device.upload(&mut texture, frame).map_err(device_failure)?;
            // Replacing drops the old texture
            self.texture = Some(texture);
            self.allocated = allocated;
            self.used = size;
            self.allocations += 1;
            return Ok(());
        }

        let Some(texture) = self.texture.as_mut() else {
            return Ok(());
        };
        device.upload(texture, frame).map_err(device_failure)?;
        self.used = size;
        Ok(())
    }

    /// The texture, if a frame has been uploaded.
    pub fn texture(&self) -> Option<&T> {
        if self.used.is_empty() {
            None
        } else {
            self.texture.as_ref()
        }
    }

    /// Size of the valid region.
    pub fn used(&self) -> Extent {
        self.used
    }

    /// Size of the GPU allocation.
    pub fn allocated(&self) -> Extent {
        self.allocated
    }

    /// Texture coordinates of the bottom-right corner of the valid region.
    pub fn uv_max(&self) -> [f32; 2] {
        if self.allocated.is_empty() {
            return [0.0, 0.0];
        }
        [
            self.used.width as f32 / self.allocated.width as f32,
            self.used.height as f32 / self.allocated.height as f32,
        ]
    }

    /// How many times the texture has been (re)allocated.
    pub fn allocations(&self) -> u32 {
        self.allocations
    }
}

fn device_failure(err: crate::error::DeviceError) -> PresentError {
    warn!("Frame texture update failed: {}", err);
    PresentError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PresentParams};
    use crate::device::DeviceFactory;
    use crate::headless::HeadlessFactory;

    fn device() -> crate::headless::HeadlessDevice {
        let config = Config::default();
        let params = PresentParams::windowed(&config, Extent::new(320, 288));
        HeadlessFactory::new().create_device(0, &params).unwrap()
    }

    #[test]
    fn test_allocation_edge() {
        assert_eq!(allocation_edge(160), 256);
        assert_eq!(allocation_edge(256), 256);
        assert_eq!(allocation_edge(257), 512);
        assert_eq!(allocation_edge(0), 1);
    }

    #[test]
    fn test_upload_tracks_used_and_allocated() {
        let mut device = device();
        let mut texture = FrameTexture::new();
        assert!(texture.texture().is_none());

        let pixels = vec![0x00ff_0000; 160 * 144];
        let frame = Frame::packed(&pixels, 160, 144).unwrap();
        texture.upload(&mut device, &frame).unwrap();

        assert_eq!(texture.used(), Extent::new(160, 144));
        assert_eq!(texture.allocated(), Extent::new(256, 256));
        assert_eq!(texture.uv_max(), [0.625, 0.5625]);
        assert!(texture.texture().is_some());
    }

    #[test]
    fn test_reuses_allocation_when_frame_fits() {
        let mut device = device();
        let mut texture = FrameTexture::new();

        let big = vec![0; 256 * 224];
        texture
            .upload(&mut device, &Frame::packed(&big, 256, 224).unwrap())
            .unwrap();
        let small = vec![0; 160 * 144];
        texture
            .upload(&mut device, &Frame::packed(&small, 160, 144).unwrap())
            .unwrap();
        assert_eq!(texture.allocations(), 1);
        assert_eq!(texture.used(), Extent::new(160, 144));

        let wide = vec![0; 320 * 144];
        texture
            .upload(&mut device, &Frame::packed(&wide, 320, 144).unwrap())
            .unwrap();
        assert_eq!(texture.allocations(), 2);
        assert_eq!(texture.allocated(), Extent::new(512, 256));
    }

    #[test]
    fn test_oversized_frame_keeps_previous_content() {
        let mut device = device();
        let mut texture = FrameTexture::new();
        let pixels = vec![0; 160 * 144];
        texture
            .upload(&mut device, &Frame::packed(&pixels, 160, 144).unwrap())
            .unwrap();

        let edge = device.max_texture_size() + 1;
        let huge = vec![0; edge as usize];
        let err = texture
            .upload(&mut device, &Frame::packed(&huge, edge, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, PresentError::InvalidFrame { .. }));
        assert_eq!(texture.used(), Extent::new(160, 144));
        assert_eq!(texture.allocations(), 1);
    }
}
