//! Compositor
//!
//! Fits the frame into the back buffer and issues the single quad draw.
//! Geometry is rebuilt only when the back buffer size, the source size or
//! the scaling method changes.

use tracing::debug;

use crate::config::{FilterMode, ScalingMethod};
use crate::device::{Device, DrawPass, Extent, Quad, Rect};
use crate::error::PresentError;
use crate::texture::FrameTexture;

/// Placement of a `source`-sized frame inside a `dest`-sized back buffer.
pub fn fit(source: Extent, dest: Extent, method: ScalingMethod) -> Rect {
    if source.is_empty() || dest.is_empty() {
        return Rect {
            x: 0,
            y: 0,
            width: dest.width,
            height: dest.height,
        };
    }

    let (width, height) = match method {
        ScalingMethod::Unrestricted => (dest.width, dest.height),
        ScalingMethod::Integer => {
            let scale = (dest.width / source.width).min(dest.height / source.height);
            if scale == 0 {
                keep_ratio(source, dest)
            } else {
                (source.width * scale, source.height * scale)
            }
        }
        ScalingMethod::KeepRatio => keep_ratio(source, dest),
    };

    Rect {
        x: (dest.width - width) / 2,
        y: (dest.height - height) / 2,
        width,
        height,
    }
}

fn keep_ratio(source: Extent, dest: Extent) -> (u32, u32) {
    let sw = u64::from(source.width);
    let sh = u64::from(source.height);
    let dw = u64::from(dest.width);
    let dh = u64::from(dest.height);

    // Compare dw/sw against dh/sh without rounding
    if dw * sh <= dh * sw {
        let height = ((dw * sh + sw / 2) / sw).clamp(1, dh);
        (dest.width, height as u32)
    } else {
        let width = ((dh * sw + sh / 2) / sh).clamp(1, dw);
        (width as u32, dest.height)
    }
}

/// Per-draw settings taken from the active configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composition {
    pub scaling: ScalingMethod,
    pub filter: FilterMode,
    pub clear_on_present: bool,
    /// Back buffer contents are undefined after a present
    pub flip_model: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GeometryKey {
    dest: Extent,
    source: Extent,
    allocated: Extent,
    method: ScalingMethod,
}

/// Owns the quad vertex buffer and its cached geometry
pub struct Compositor<V> {
    buffer: V,
    key: Option<GeometryKey>,
    quad: Quad,
    buffer_count: u32,
    pending_clears: u32,
    geometry_builds: u32,
    draws: u64,
}

impl<V> Compositor<V> {
    /// Wrap a freshly created vertex buffer for a chain of `buffer_count`
    /// back buffers.
    pub fn new(buffer: V, buffer_count: u32) -> Self {
        Self {
            buffer,
            key: None,
            quad: Quad::default(),
            buffer_count: buffer_count.max(1),
            pending_clears: 0,
            geometry_builds: 0,
            draws: 0,
        }
    }

    /// Recompute the quad if any input changed. Returns whether it did.
    pub fn build_geometry<D>(
        &mut self,
        device: &mut D,
        source: Extent,
        allocated: Extent,
        dest: Extent,
        method: ScalingMethod,
    ) -> Result<bool, PresentError>
    where
        D: Device<VertexBuffer = V>,
    {
        let key = GeometryKey {
            dest,
            source,
            allocated,
            method,
        };
        if self.key == Some(key) {
            return Ok(false);
        }

        let placement = fit(source, dest, method);
        let uv_max = if allocated.is_empty() {
            [0.0, 0.0]
        } else {
            [
                source.width as f32 / allocated.width as f32,
                source.height as f32 / allocated.height as f32,
            ]
        };
        let quad = Quad {
            placement,
            target: dest,
            uv_max,
        };

        device
            .write_quad(&mut self.buffer, &quad)
            .map_err(PresentError::from)?;

        debug!(
            "Quad geometry: {} source -> {:?} in {} ({:?})",
            source, placement, dest, method
        );
        self.quad = quad;
        self.key = Some(key);
        self.pending_clears = self.buffer_count;
        self.geometry_builds += 1;
        Ok(true)
    }

    /// Draw the frame into the current back buffer.
    pub fn draw<D>(
        &mut self,
        device: &mut D,
        texture: &FrameTexture<D::Texture>,
        dest: Extent,
        composition: Composition,
    ) -> Result<(), PresentError>
    where
        D: Device<VertexBuffer = V>,
    {
        self.build_geometry(
            device,
            texture.used(),
            texture.allocated(),
            dest,
            composition.scaling,
        )?;

        let margins = !self.quad.placement.covers(dest) || texture.texture().is_none();
        let clear = composition.clear_on_present
            || (margins && (composition.flip_model || self.pending_clears > 0));

        let pass = DrawPass {
            clear,
            filter: composition.filter,
        };
        device
            .draw(texture.texture(), &self.buffer, pass)
            .map_err(PresentError::from)?;

        self.pending_clears = self.pending_clears.saturating_sub(1);
        self.draws += 1;
        Ok(())
    }

    /// The quad as last written to the vertex buffer.
    pub fn quad(&self) -> &Quad {
        &self.quad
    }

    /// How many times geometry has been rebuilt.
    pub fn geometry_builds(&self) -> u32 {
        self.geometry_builds
    }

    /// How many composite draws have been issued.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u32, y: u32, width: u32, height: u32) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn test_integer_exact_fit() {
        let placed = fit(
            Extent::new(160, 144),
            Extent::new(640, 576),
            ScalingMethod::Integer,
        );
        assert_eq!(placed, rect(0, 0, 640, 576));
    }

    #[test]
    fn test_integer_with_margins() {
        let placed = fit(
            Extent::new(160, 144),
            Extent::new(700, 600),
            ScalingMethod::Integer,
        );
        assert_eq!(placed, rect(30, 12, 640, 576));
    }

    #[test]
    fn test_integer_falls_back_when_source_is_larger() {
        let placed = fit(
            Extent::new(320, 240),
            Extent::new(160, 240),
            ScalingMethod::Integer,
        );
        assert_eq!(placed, rect(0, 60, 160, 120));
    }

    #[test]
    fn test_keep_ratio_pillarbox_and_letterbox() {
        let source = Extent::new(160, 144);
        assert_eq!(
            fit(source, Extent::new(800, 576), ScalingMethod::KeepRatio),
            rect(80, 0, 640, 576)
        );
        assert_eq!(
            fit(source, Extent::new(640, 700), ScalingMethod::KeepRatio),
            rect(0, 62, 640, 576)
        );
    }

    #[test]
    fn test_unrestricted_fills() {
        let placed = fit(
            Extent::new(160, 144),
            Extent::new(1000, 300),
            ScalingMethod::Unrestricted,
        );
        assert_eq!(placed, rect(0, 0, 1000, 300));
    }

    #[test]
    fn test_empty_source_covers_destination() {
        let placed = fit(Extent::default(), Extent::new(64, 32), ScalingMethod::Integer);
        assert_eq!(placed, rect(0, 0, 64, 32));
    }
}
