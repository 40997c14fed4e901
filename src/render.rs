//! What the presenter should draw for a given scheduler state.
//!
//! The scheduler never hands out a frame whose image has not settled: until the first
//! image of the active set settles the plan is a loading placeholder, and the incoming
//! frame is only layered in once its own slot has settled.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SlideshowConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    /// Indeterminate placeholder while the first image is still loading.
    Loading,
    Slides {
        base: Layer,
        /// Incoming frame layered on top; present only once its image has settled.
        overlay: Option<Layer>,
        /// A cross-fade is running; the overlay's opacity is heading to 1.
        transitioning: bool,
        controls: bool,
    },
}

impl RenderPlan {
    pub fn base(&self) -> Option<&Layer> {
        match self {
            Self::Loading => None,
            Self::Slides { base, .. } => Some(base),
        }
    }

    pub fn overlay(&self) -> Option<&Layer> {
        match self {
            Self::Loading => None,
            Self::Slides { overlay, .. } => overlay.as_ref(),
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            Self::Slides {
                transitioning: true,
                ..
            }
        )
    }

    pub fn controls_visible(&self) -> bool {
        matches!(self, Self::Slides { controls: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub index: usize,
    pub url: Arc<str>,
    pub opacity: f32,
    pub scale: f32,
}

/// Zoom parameters resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KenBurns {
    pub start_scale: f32,
    pub end_scale: f32,
    pub duration: Duration,
}

impl KenBurns {
    pub fn from_config(cfg: &SlideshowConfig) -> Option<Self> {
        cfg.enable_ken_burns.then(|| Self {
            start_scale: cfg.ken_burns.start_scale,
            end_scale: cfg.ken_burns.end_scale,
            duration: cfg.ken_burns_duration(),
        })
    }

    /// Scale of a frame that started appearing `elapsed` ago.
    pub fn scale_at(&self, elapsed: Duration) -> f32 {
        let t = ease_out_cubic(progress(elapsed, self.duration));
        self.start_scale + (self.end_scale - self.start_scale) * t
    }
}

/// Opacity of the incoming frame `elapsed` into a cross-fade lasting `duration`.
pub fn crossfade_opacity(elapsed: Duration, duration: Duration) -> f32 {
    progress(elapsed, duration)
}

fn progress(elapsed: Duration, duration: Duration) -> f32 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / duration.as_secs_f32()).clamp(0.0, 1.0)
}

fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossfade_clamps() {
        let d = Duration::from_millis(2000);
        assert_eq!(crossfade_opacity(Duration::ZERO, d), 0.0);
        assert!((crossfade_opacity(Duration::from_millis(1000), d) - 0.5).abs() < 1e-6);
        assert_eq!(crossfade_opacity(Duration::from_millis(9000), d), 1.0);
        assert_eq!(crossfade_opacity(Duration::ZERO, Duration::ZERO), 1.0);
    }

    #[test]
    fn ken_burns_enters_large_and_settles() {
        let kb = KenBurns {
            start_scale: 1.1,
            end_scale: 1.0,
            duration: Duration::from_secs(7),
        };
        assert!((kb.scale_at(Duration::ZERO) - 1.1).abs() < 1e-6);
        let mid = kb.scale_at(Duration::from_millis(3500));
        assert!(mid < 1.1 && mid > 1.0);
        assert!((kb.scale_at(Duration::from_secs(60)) - 1.0).abs() < 1e-6);
    }
}
