use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::tween::Easing;

/// Slide show/hide timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SlideAnimation {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub ease: Easing,
    /// Scale the image zooms out from when entering and into when leaving.
    pub scale: f32,
}

impl Default for SlideAnimation {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(1200),
            ease: Easing::ExpoInOut,
            scale: 1.1,
        }
    }
}

/// Detail box reveal timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DetailsAnimation {
    /// Delay added per box position.
    #[serde(with = "humantime_serde")]
    pub stagger: Duration,
    /// How many boxes get the slower accent timing: the last ones when
    /// opening, only the first one when closing.
    pub accent_count: usize,
    #[serde(with = "humantime_serde")]
    pub accent_duration: Duration,
    pub accent_ease: Easing,
    #[serde(with = "humantime_serde")]
    pub base_duration: Duration,
    pub base_ease: Easing,
}

impl Default for DetailsAnimation {
    fn default() -> Self {
        Self {
            stagger: Duration::from_millis(80),
            accent_count: 3,
            accent_duration: Duration::from_millis(700),
            accent_ease: Easing::ExpoOut,
            base_duration: Duration::from_millis(200),
            base_ease: Easing::Power2InOut,
        }
    }
}

/// Pagination label swap timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct NavigationAnimation {
    #[serde(with = "humantime_serde")]
    pub out_duration: Duration,
    pub out_ease: Easing,
    #[serde(with = "humantime_serde")]
    pub in_duration: Duration,
    pub in_ease: Easing,
}

impl Default for NavigationAnimation {
    fn default() -> Self {
        Self {
            out_duration: Duration::from_millis(400),
            out_ease: Easing::BackIn,
            in_duration: Duration::from_millis(800),
            in_ease: Easing::ExpoOut,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct AnimatorSettings {
    /// Interval between interpolation steps.
    #[serde(with = "humantime_serde")]
    pub frame_interval: Duration,
}

impl Default for AnimatorSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PreloadSettings {
    /// Maximum number of image probes running at once.
    pub max_concurrent: usize,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Slide enter/leave animation.
    pub slide: SlideAnimation,
    /// Detail box reveal animation.
    pub details: DetailsAnimation,
    /// Current-page label animation.
    pub navigation: NavigationAnimation,
    /// Tween engine settings.
    pub animator: AnimatorSettings,
    /// Startup image preloading.
    pub preload: PreloadSettings,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.slide.duration.is_zero(),
            "slide.duration must be greater than zero"
        );
        ensure!(
            self.slide.scale.is_finite() && self.slide.scale > 0.0,
            "slide.scale must be positive"
        );
        ensure!(
            !self.details.accent_duration.is_zero() && !self.details.base_duration.is_zero(),
            "details durations must be greater than zero"
        );
        ensure!(
            !self.navigation.out_duration.is_zero() && !self.navigation.in_duration.is_zero(),
            "navigation durations must be greater than zero"
        );
        ensure!(
            !self.animator.frame_interval.is_zero(),
            "animator.frame-interval must be greater than zero"
        );
        ensure!(
            self.preload.max_concurrent > 0,
            "preload.max-concurrent must be greater than zero"
        );
        Ok(self)
    }

    /// Loads and validates in one step; a missing path yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(path) => Self::from_yaml_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => Self::default(),
        };
        cfg.validated().context("invalid configuration values")
    }
}
