//! Device Abstraction
//!
//! The narrow capability set the presentation engine needs from a graphics
//! API. A `DeviceFactory` is resolved once at startup and handed to the
//! surface; swapping it for a fake is how the engine is tested.

use std::fmt;

use crate::config::{FilterMode, PresentParams};
use crate::error::{DeviceError, PresentError};

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` fits inside `self` on both axes.
    pub fn contains(&self, other: Extent) -> bool {
        other.width <= self.width && other.height <= self.height
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in back buffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    /// Whether the rectangle leaves no margin inside `outer`.
    pub fn covers(&self, outer: Extent) -> bool {
        self.x == 0 && self.y == 0 && self.width >= outer.width && self.height >= outer.height
    }
}

/// One corner of the textured quad
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Vertex {
    /// Clip-space position
    pub position: [f32; 2],
    /// Texture coordinate
    pub uv: [f32; 2],
}

/// The single quad drawn each frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quad {
    /// Where the frame lands in the back buffer
    pub placement: Rect,
    /// Back buffer size the placement refers to
    pub target: Extent,
    /// Right/bottom texture coordinate of the valid region
    pub uv_max: [f32; 2],
}

impl Quad {
    /// Triangle-strip vertices in clip space (top-left, top-right,
    /// bottom-left, bottom-right).
    pub fn vertices(&self) -> [Vertex; 4] {
        if self.target.is_empty() {
            return [Vertex::default(); 4];
        }
        let w = self.target.width as f32;
        let h = self.target.height as f32;
        let left = self.placement.x as f32 / w * 2.0 - 1.0;
        let right = (self.placement.x + self.placement.width) as f32 / w * 2.0 - 1.0;
        let top = 1.0 - self.placement.y as f32 / h * 2.0;
        let bottom = 1.0 - (self.placement.y + self.placement.height) as f32 / h * 2.0;
        let [u, v] = self.uv_max;

        [
            Vertex {
                position: [left, top],
                uv: [0.0, 0.0],
            },
            Vertex {
                position: [right, top],
                uv: [u, 0.0],
            },
            Vertex {
                position: [left, bottom],
                uv: [0.0, v],
            },
            Vertex {
                position: [right, bottom],
                uv: [u, v],
            },
        ]
    }
}

/// A borrowed frame of 32-bit xRGB pixels (`0x00RRGGBB`)
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pixels: &'a [u32],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> Frame<'a> {
    /// Wrap a pixel buffer whose rows are `stride` pixels apart.
    pub fn new(
        pixels: &'a [u32],
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<Self, PresentError> {
        let invalid = |reason| PresentError::InvalidFrame {
            width,
            height,
            stride,
            len: pixels.len(),
            reason,
        };

        if width == 0 || height == 0 {
            return Err(invalid("empty frame"));
        }
        if stride < width as usize {
            return Err(invalid("stride shorter than a row"));
        }
        let needed = stride
            .checked_mul(height as usize - 1)
            .and_then(|n| n.checked_add(width as usize))
            .ok_or_else(|| invalid("frame size overflows"))?;
        if pixels.len() < needed {
            return Err(invalid("buffer smaller than frame"));
        }

        Ok(Self {
            pixels,
            width,
            height,
            stride,
        })
    }

    /// Wrap a tightly packed pixel buffer.
    pub fn packed(pixels: &'a [u32], width: u32, height: u32) -> Result<Self, PresentError> {
        Self::new(pixels, width, height, width as usize)
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixels of row `y`, without stride padding.
    pub fn row(&self, y: u32) -> &'a [u32] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [u32]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }
}

/// Exclusive display mode an adapter's output supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    /// Refresh rate in deci-Hertz
    pub rate_dhz: u32,
}

/// An adapter the factory can create devices on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub index: u32,
    pub name: String,
    pub modes: Vec<DisplayMode>,
}

/// Everything one draw call needs besides the resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawPass {
    /// Clear the back buffer to black first
    pub clear: bool,
    pub filter: FilterMode,
}

/// Creates device sessions. Resolved once and owned by the surface.
pub trait DeviceFactory {
    type Device: Device;

    /// Adapters available for device creation. Empty if the API is missing.
    fn adapters(&self) -> Vec<AdapterInfo>;

    /// Create a device and swap chain for `params` on adapter `adapter`.
    fn create_device(
        &mut self,
        adapter: u32,
        params: &PresentParams,
    ) -> Result<Self::Device, DeviceError>;
}

/// A live device with its swap chain and render targets.
///
/// Dropping the device releases the swap chain before the device itself.
/// Textures and vertex buffers created from it must be dropped first.
pub trait Device {
    /// GPU texture holding a decoded frame
    type Texture;
    /// GPU buffer holding the quad's vertices
    type VertexBuffer;

    /// Largest texture edge the device supports.
    fn max_texture_size(&self) -> u32;

    /// Current back buffer size.
    fn back_buffer_extent(&self) -> Extent;

    /// Recreate the back buffers at `extent`, keeping everything else.
    fn resize_buffers(&mut self, extent: Extent) -> Result<(), DeviceError>;

    /// Allocate a frame texture of exactly `extent`.
    fn create_texture(&mut self, extent: Extent) -> Result<Self::Texture, DeviceError>;

    /// Copy `frame` into the top-left corner of `texture`.
    fn upload(&mut self, texture: &mut Self::Texture, frame: &Frame<'_>)
        -> Result<(), DeviceError>;

    /// Allocate the quad vertex buffer.
    fn create_vertex_buffer(&mut self) -> Result<Self::VertexBuffer, DeviceError>;

    /// Write `quad` into `buffer`.
    fn write_quad(&mut self, buffer: &mut Self::VertexBuffer, quad: &Quad)
        -> Result<(), DeviceError>;

    /// Draw the quad into the current back buffer. With no texture only the
    /// clear (if requested) happens.
    fn draw(
        &mut self,
        texture: Option<&Self::Texture>,
        buffer: &Self::VertexBuffer,
        pass: DrawPass,
    ) -> Result<(), DeviceError>;

    /// Hand the back buffer to the display.
    fn present(&mut self, interval: u32) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_validation() {
        let pixels = vec![0u32; 160 * 144];
        assert!(Frame::packed(&pixels, 160, 144).is_ok());
        assert!(Frame::packed(&pixels, 160, 145).is_err());
        assert!(Frame::packed(&pixels, 0, 144).is_err());
        assert!(Frame::new(&pixels, 160, 144, 100).is_err());
    }

    #[test]
    fn test_frame_rows_skip_stride_padding() {
        let pixels: Vec<u32> = (0..12).collect();
        // 3 pixels per row, 4 pixel stride, last row may be short
        let frame = Frame::new(&pixels[..11], 3, 3, 4).unwrap();
        assert_eq!(frame.row(0), &[0, 1, 2]);
        assert_eq!(frame.row(2), &[8, 9, 10]);
        assert_eq!(frame.rows().count(), 3);
    }

    #[test]
    fn test_full_quad_vertices() {
        let quad = Quad {
            placement: Rect {
                x: 0,
                y: 0,
                width: 640,
                height: 576,
            },
            target: Extent::new(640, 576),
            uv_max: [0.625, 0.5625],
        };
        let v = quad.vertices();
        assert_eq!(v[0].position, [-1.0, 1.0]);
        assert_eq!(v[3].position, [1.0, -1.0]);
        assert_eq!(v[3].uv, [0.625, 0.5625]);
    }

    #[test]
    fn test_rect_covers() {
        let full = Rect {
            x: 0,
            y: 0,
            width: 100,
            height: 50,
        };
        assert!(full.covers(Extent::new(100, 50)));
        let inset = Rect { x: 2, ..full };
        assert!(!inset.covers(Extent::new(100, 50)));
    }
}
