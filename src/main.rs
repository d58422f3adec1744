//! Blitter Demo
//!
//! Runs the presentation engine against the software backend:
//! 1. Loads `blitter.toml` (or the path given as first argument)
//! 2. Creates the device session
//! 3. Produces a scrolling test pattern at the emulated machine's rate
//! 4. Blits, draws and syncs every frame, logging the refresh estimate

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use blitter::{
    period_from_dhz, Config, HeadlessFactory, HostEvents, PresentationScheduler,
};

/// Demo host state
struct DemoHost {
    config: Config,
    scheduler: PresentationScheduler<HeadlessFactory>,
    shutdown: Arc<AtomicBool>,
    frame: Vec<u32>,
    frame_count: u64,
}

impl DemoHost {
    fn new(config: Config) -> Self {
        let factory = HeadlessFactory::new().with_refresh_rate(config.refresh_rate_dhz);
        let frame = vec![0; config.source.extent().area()];
        Self {
            config,
            scheduler: PresentationScheduler::new(factory),
            shutdown: Arc::new(AtomicBool::new(false)),
            frame,
            frame_count: 0,
        }
    }

    fn init(&mut self) -> Result<()> {
        for adapter in self.scheduler.adapters() {
            info!(
                "Adapter {}: {} ({} display modes)",
                adapter.index,
                adapter.name,
                adapter.modes.len()
            );
        }
        self.scheduler
            .init(self.config.clone())
            .context("Failed to create presentation session")
    }

    /// Color bars scrolling one pixel per frame.
    fn render_test_pattern(&mut self) {
        const BARS: [u32; 8] = [
            0x00ff_ffff,
            0x00ff_ff00,
            0x0000_ffff,
            0x0000_ff00,
            0x00ff_00ff,
            0x00ff_0000,
            0x0000_00ff,
            0x0000_0000,
        ];
        let width = self.config.source.width as usize;
        let bar_width = (width / BARS.len()).max(1);
        let shift = self.frame_count as usize;
        for (y, row) in self.frame.chunks_exact_mut(width).enumerate() {
            for (x, pixel) in row.iter_mut().enumerate() {
                let bar = ((x + shift) / bar_width) % BARS.len();
                // Darken every eighth line so vertical motion is visible
                *pixel = if (y + shift) % 8 == 0 {
                    (BARS[bar] >> 1) & 0x007f_7f7f
                } else {
                    BARS[bar]
                };
            }
        }
    }

    fn run_loop(&mut self) -> Result<()> {
        info!("Entering presentation loop...");
        let machine_period = Duration::from_micros(period_from_dhz(self.config.refresh_rate_dhz));
        let source = self.config.source;
        let mut report = Instant::now();
        let mut synced_frames = 0u64;
        let mut elapsed_total = 0u64;

        while !self.shutdown.load(Ordering::Relaxed) {
            if self.scheduler.is_unusable() {
                warn!("Presentation surface unusable, stopping");
                break;
            }

            let started = Instant::now();
            self.render_test_pattern();
            self.scheduler
                .blit(&self.frame, source.width, source.height);
            self.scheduler.on_repaint_requested();
            elapsed_total += self.scheduler.sync();
            synced_frames += 1;
            self.frame_count += 1;

            // Throttle to the machine rate when presents don't block
            let spent = started.elapsed();
            if spent < machine_period {
                spin_sleep::sleep(machine_period - spent);
            }

            if report.elapsed() >= Duration::from_secs(1) {
                info!(
                    "Frame time estimate {} us, average sync interval {} us over {} frames",
                    self.scheduler.frame_time_est(),
                    elapsed_total / synced_frames.max(1),
                    synced_frames
                );
                report = Instant::now();
                synced_frames = 0;
                elapsed_total = 0;
            }
        }

        Ok(())
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let config = Config::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    } else {
        info!("{} not found, using defaults", path.display());
        Ok(Config::default())
    }
}

fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Blitter demo starting...");

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("blitter.toml"));
    let config = load_config(&path)?;
    info!("Configuration: {:?}", config);

    let mut host = DemoHost::new(config);

    // Setup Ctrl+C handler
    let shutdown = host.shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        shutdown.store(true, Ordering::Relaxed);
    })
    .context("Error setting Ctrl+C handler")?;

    host.init()?;
    let result = host.run_loop();

    host.scheduler.uninit();
    info!(
        "Blitter demo shutting down after {} frames ({} dropped)",
        host.frame_count,
        host.scheduler.dropped_frames()
    );

    result
}
