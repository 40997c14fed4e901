use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlideshowConfig {
    /// Image URLs shown on wide viewports (and on narrow ones without `mobile-images`).
    pub images: Vec<String>,
    /// Alternate image URLs for viewports narrower than `mobile-breakpoint`.
    pub mobile_images: Option<Vec<String>>,
    /// Time between automatic advances.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Cross-fade duration; the pointer pair commits once it elapses.
    #[serde(with = "humantime_serde")]
    pub transition: Duration,
    /// Render manual prev/next controls (only when more than one image is active).
    pub show_controls: bool,
    /// Suspend auto-advance while the pointer hovers the slideshow.
    pub pause_on_hover: bool,
    /// Slow continuous zoom on every frame.
    pub enable_ken_burns: bool,
    /// Viewport widths strictly below this many logical pixels select `mobile-images`.
    pub mobile_breakpoint: u32,
    /// Viewport width assumed at startup.
    pub viewport_width: u32,
    /// Maximum number of image fetches in flight.
    pub loader_max_concurrent_fetches: usize,
    /// Give up on a fetch after this long and treat the slot as failed.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Option<Duration>,
    pub ken_burns: KenBurnsOptions,
}

impl SlideshowConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.images.is_empty(), "images must list at least one url");
        if let Some(mobile) = self.mobile_images.as_ref() {
            ensure!(
                !mobile.is_empty(),
                "mobile-images must list at least one url when present"
            );
        }
        ensure!(!self.interval.is_zero(), "interval must be greater than zero");
        ensure!(
            !self.transition.is_zero(),
            "transition must be greater than zero"
        );
        ensure!(
            self.mobile_breakpoint > 0,
            "mobile-breakpoint must be greater than zero"
        );
        ensure!(
            self.loader_max_concurrent_fetches > 0,
            "loader-max-concurrent-fetches must be greater than zero"
        );
        if let Some(timeout) = self.fetch_timeout {
            ensure!(!timeout.is_zero(), "fetch-timeout must be greater than zero");
        }
        self.ken_burns.validate()?;
        Ok(self)
    }

    /// How long one Ken Burns zoom runs before it settles.
    pub fn ken_burns_duration(&self) -> Duration {
        self.ken_burns
            .duration
            .unwrap_or(self.interval + self.transition)
    }
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            mobile_images: None,
            interval: Duration::from_millis(5000),
            transition: Duration::from_millis(2000),
            show_controls: false,
            pause_on_hover: false,
            enable_ken_burns: false,
            mobile_breakpoint: 768,
            viewport_width: 1280,
            loader_max_concurrent_fetches: 4,
            fetch_timeout: None,
            ken_burns: KenBurnsOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KenBurnsOptions {
    /// Scale a frame enters at.
    pub start_scale: f32,
    /// Scale a frame settles at.
    pub end_scale: f32,
    /// Zoom duration; defaults to one interval plus one transition.
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
}

impl KenBurnsOptions {
    const fn default_start_scale() -> f32 {
        1.1
    }

    const fn default_end_scale() -> f32 {
        1.0
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.start_scale > 0.0,
            "ken-burns.start-scale must be positive"
        );
        ensure!(self.end_scale > 0.0, "ken-burns.end-scale must be positive");
        if let Some(duration) = self.duration {
            ensure!(
                !duration.is_zero(),
                "ken-burns.duration must be greater than zero"
            );
        }
        Ok(())
    }
}

impl Default for KenBurnsOptions {
    fn default() -> Self {
        Self {
            start_scale: Self::default_start_scale(),
            end_scale: Self::default_end_scale(),
            duration: None,
        }
    }
}
