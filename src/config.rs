//! Configuration Module
//!
//! Video settings supplied by the host's settings dialog. A `Config` is an
//! immutable value: reconfiguring means handing the engine a new one.

use std::path::Path;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::device::Extent;

/// Highest swap interval accepted from configuration
pub const MAX_SWAP_INTERVAL: u32 = 4;

/// Most vblanks a single present may wait for
pub const MAX_PRESENT_INTERVAL: u32 = 2;

/// How the swap chain buffers frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferingMode {
    /// One buffer, no extra buffering; may tear
    Single,
    /// Flip-model chain with two buffers
    #[default]
    DoubleFlip,
    /// Flip-model chain with one extra back buffer
    TripleBuffer,
    /// Copy the back buffer to the screen; works on any driver
    BlitCopy,
}

impl BufferingMode {
    /// Number of buffers in the swap chain.
    pub fn buffer_count(self) -> u32 {
        match self {
            BufferingMode::Single | BufferingMode::BlitCopy => 1,
            BufferingMode::DoubleFlip => 2,
            BufferingMode::TripleBuffer => 3,
        }
    }

    /// Whether buffers are handed to the display instead of copied.
    pub fn is_flip_model(self) -> bool {
        matches!(self, BufferingMode::DoubleFlip | BufferingMode::TripleBuffer)
    }
}

/// How the source frame is fitted into the back buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingMethod {
    /// Stretch to fill, ignoring aspect ratio
    Unrestricted,
    /// Uniform scale, centered, letterboxed or pillarboxed
    #[default]
    KeepRatio,
    /// Largest integer multiple that fits, centered
    Integer,
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// A width/height pair as stored in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeConfig {
    pub width: u32,
    pub height: u32,
}

impl SizeConfig {
    pub fn extent(self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

/// Display mode used while in exclusive fullscreen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullscreenConfig {
    pub width: u32,
    pub height: u32,
    /// Refresh rate in deci-Hertz (0 = keep the current rate)
    #[serde(default)]
    pub rate_dhz: u32,
}

impl FullscreenConfig {
    pub fn extent(self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

/// Presentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GPU adapter index (0 = default)
    pub adapter_index: u32,

    /// Swap chain buffering strategy
    pub buffering: BufferingMode,

    /// 0 = present immediately, n >= 1 = wait for n vertical blanks
    pub swap_interval: u32,

    /// Pace blit-copy presents to the estimated vertical blank
    pub vblank_blit: bool,

    /// Start in exclusive fullscreen
    pub exclusive: bool,

    /// Source-to-screen fitting
    pub scaling: ScalingMethod,

    /// Texture sampling filter
    pub filter: FilterMode,

    /// Clear the back buffer before every draw
    pub clear_on_present: bool,

    /// Nominal display refresh rate in deci-Hertz (600 = 60.0 Hz)
    pub refresh_rate_dhz: u32,

    /// Source frame resolution produced by the emulator
    pub source: SizeConfig,

    /// Initial windowed back buffer size
    pub window: SizeConfig,

    /// Exclusive fullscreen display mode
    pub fullscreen: FullscreenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            buffering: BufferingMode::default(),
            swap_interval: 1,
            vblank_blit: false,
            exclusive: false,
            scaling: ScalingMethod::default(),
            filter: FilterMode::default(),
            clear_on_present: false,
            refresh_rate_dhz: 600,
            source: SizeConfig {
                width: 160,
                height: 144,
            },
            window: SizeConfig {
                width: 480,
                height: 432,
            },
            fullscreen: FullscreenConfig {
                width: 1920,
                height: 1080,
                rate_dhz: 0,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no session can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.swap_interval > MAX_SWAP_INTERVAL {
            bail!(
                "swap interval {} exceeds maximum {}",
                self.swap_interval,
                MAX_SWAP_INTERVAL
            );
        }
        if self.refresh_rate_dhz == 0 {
            bail!("refresh rate hint must be non-zero");
        }
        for (name, extent) in [
            ("source", self.source.extent()),
            ("window", self.window.extent()),
            ("fullscreen", self.fullscreen.extent()),
        ] {
            if extent.is_empty() {
                bail!("{} size {} is empty", name, extent);
            }
        }
        Ok(())
    }

    pub fn with_adapter(mut self, index: u32) -> Self {
        self.adapter_index = index;
        self
    }

    pub fn with_buffering(mut self, buffering: BufferingMode) -> Self {
        self.buffering = buffering;
        self
    }

    pub fn with_swap_interval(mut self, interval: u32) -> Self {
        self.swap_interval = interval.min(MAX_SWAP_INTERVAL);
        self
    }

    pub fn with_vblank_blit(mut self, enabled: bool) -> Self {
        self.vblank_blit = enabled;
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_scaling(mut self, scaling: ScalingMethod) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_clear_on_present(mut self, clear: bool) -> Self {
        self.clear_on_present = clear;
        self
    }

    pub fn with_refresh_rate(mut self, dhz: u32) -> Self {
        self.refresh_rate_dhz = dhz;
        self
    }

    pub fn with_source(mut self, width: u32, height: u32) -> Self {
        self.source = SizeConfig { width, height };
        self
    }

    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window = SizeConfig { width, height };
        self
    }

    pub fn with_fullscreen(mut self, width: u32, height: u32, rate_dhz: u32) -> Self {
        self.fullscreen = FullscreenConfig {
            width,
            height,
            rate_dhz,
        };
        self
    }

    /// Whether switching from `self` to `other` needs a new session.
    ///
    /// Scaling, filtering, clearing and the rate hint apply to the live
    /// session; everything that shapes the swap chain does not.
    pub fn requires_rebuild(&self, other: &Config) -> bool {
        self.adapter_index != other.adapter_index
            || self.buffering != other.buffering
            || self.swap_interval != other.swap_interval
            || self.vblank_blit != other.vblank_blit
            || self.exclusive != other.exclusive
            || self.fullscreen != other.fullscreen
    }

    /// Whether presents are paced by the vblank estimate instead of the driver.
    pub fn paces_blits(&self) -> bool {
        self.vblank_blit && self.buffering == BufferingMode::BlitCopy
    }
}

/// Parameters of one device session. Changing any of them means a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentParams {
    /// Back buffer size
    pub extent: Extent,
    /// Exclusive fullscreen instead of windowed
    pub exclusive: bool,
    /// Swap interval requested by the host
    pub swap_interval: u32,
    /// Swap chain buffering strategy
    pub buffering: BufferingMode,
    /// Clear before every draw
    pub clear_on_present: bool,
    /// Exclusive display refresh rate in deci-Hertz (0 = don't care)
    pub rate_dhz: u32,
    /// Presents are paced by the vblank estimate
    pub paced_blits: bool,
}

impl PresentParams {
    /// Parameters for a windowed session at `extent`.
    pub fn windowed(config: &Config, extent: Extent) -> Self {
        Self {
            extent,
            exclusive: false,
            swap_interval: config.swap_interval,
            buffering: config.buffering,
            clear_on_present: config.clear_on_present,
            rate_dhz: 0,
            paced_blits: config.paces_blits(),
        }
    }

    /// Parameters for an exclusive session at `extent`.
    pub fn exclusive(config: &Config, extent: Extent) -> Self {
        Self {
            extent,
            exclusive: true,
            swap_interval: config.swap_interval,
            buffering: config.buffering,
            clear_on_present: config.clear_on_present,
            rate_dhz: config.fullscreen.rate_dhz,
            paced_blits: config.paces_blits(),
        }
    }

    /// Interval handed to the driver's present call.
    ///
    /// Paced blits do their own waiting, so the driver must not wait again.
    /// Longer swap intervals are capped at `MAX_PRESENT_INTERVAL` vblanks.
    pub fn present_interval(&self) -> u32 {
        if self.paced_blits {
            0
        } else {
            self.swap_interval.min(MAX_PRESENT_INTERVAL)
        }
    }

    /// Whether a present call blocks until the display takes the frame.
    pub fn blocks_on_present(&self) -> bool {
        self.present_interval() >= 1 && self.buffering != BufferingMode::Single
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffering, BufferingMode::DoubleFlip);
        assert_eq!(config.refresh_rate_dhz, 600);
    }

    #[test]
    fn test_toml_round_trip_with_partial_file() {
        let text = r#"
            buffering = "blit-copy"
            vblank_blit = true
            scaling = "integer"

            [source]
            width = 256
            height = 240
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.buffering, BufferingMode::BlitCopy);
        assert_eq!(config.scaling, ScalingMethod::Integer);
        assert_eq!(config.source.extent(), Extent::new(256, 240));
        assert_eq!(config.window, Config::default().window);
        assert!(config.paces_blits());

        let saved = toml::to_string_pretty(&config).unwrap();
        let reloaded: Config = toml::from_str(&saved).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::default().with_refresh_rate(0).validate().is_err());
        assert!(Config::default().with_window(0, 100).validate().is_err());

        let mut config = Config::default();
        config.swap_interval = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_swap_interval_builder_clamps() {
        let config = Config::default().with_swap_interval(10);
        assert_eq!(config.swap_interval, MAX_SWAP_INTERVAL);
    }

    #[test]
    fn test_requires_rebuild() {
        let base = Config::default();
        assert!(!base.requires_rebuild(&base.clone().with_scaling(ScalingMethod::Integer)));
        assert!(!base.requires_rebuild(&base.clone().with_filter(FilterMode::Linear)));
        assert!(!base.requires_rebuild(&base.clone().with_refresh_rate(500)));
        assert!(base.requires_rebuild(&base.clone().with_swap_interval(0)));
        assert!(base.requires_rebuild(&base.clone().with_buffering(BufferingMode::TripleBuffer)));
        assert!(base.requires_rebuild(&base.clone().with_fullscreen(800, 600, 600)));
    }

    #[test]
    fn test_present_interval() {
        let config = Config::default()
            .with_buffering(BufferingMode::BlitCopy)
            .with_vblank_blit(true);
        let params = PresentParams::windowed(&config, Extent::new(320, 288));
        assert_eq!(params.present_interval(), 0);
        assert!(!params.blocks_on_present());

        let config = Config::default().with_buffering(BufferingMode::TripleBuffer);
        let params = PresentParams::windowed(&config, Extent::new(320, 288));
        assert_eq!(params.present_interval(), 1);
        assert!(params.blocks_on_present());

        let params = PresentParams::windowed(&config.with_swap_interval(4), Extent::new(320, 288));
        assert_eq!(params.swap_interval, 4);
        assert_eq!(params.present_interval(), MAX_PRESENT_INTERVAL);
    }

    #[test]
    fn test_buffer_counts() {
        assert_eq!(BufferingMode::Single.buffer_count(), 1);
        assert_eq!(BufferingMode::DoubleFlip.buffer_count(), 2);
        assert_eq!(BufferingMode::TripleBuffer.buffer_count(), 3);
        assert!(!BufferingMode::BlitCopy.is_flip_model());
    }
}
