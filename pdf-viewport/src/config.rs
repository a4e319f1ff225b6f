use crate::document::RenderFlags;
use crate::error::ConfigError;
use crate::layout::{DisplayMode, ZoomMode};
use crate::zoom::ZoomState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings a [`Viewport`](crate::Viewport) starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Multiplier applied by one zoom-in step.
    pub zoom_factor: f64,
    pub zoom: f64,
    pub zoom_mode: ZoomMode,
    pub display_mode: DisplayMode,
    pub dpi: f32,
    /// Width kept free for the vertical scrollbar in fit-width layout.
    pub scrollbar_reserve: f64,
    /// Padding around each page frame, applied on every side.
    pub frame_space: f64,
    pub render_flags: RenderFlags,
    pub right_to_left: bool,
    pub render_workers: usize,
    pub kinetic: KineticConfig,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_min: ZoomState::DEFAULT_MIN,
            zoom_max: ZoomState::DEFAULT_MAX,
            zoom_factor: ZoomState::DEFAULT_FACTOR,
            zoom: 1.0,
            zoom_mode: ZoomMode::FitHeight,
            display_mode: DisplayMode::Single,
            dpi: 96.0,
            scrollbar_reserve: 50.0,
            frame_space: 5.0,
            render_flags: RenderFlags::default(),
            right_to_left: false,
            render_workers: 2,
            kinetic: KineticConfig::default(),
        }
    }
}

impl ViewportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.zoom_min, self.zoom_max);
        if !(min > 0.0 && max > 0.0) {
            return Err(ConfigError::NonPositiveZoom { min, max });
        }
        if min > max {
            return Err(ConfigError::InvertedZoomBounds { min, max });
        }
        if !(self.zoom_factor > 1.0) {
            return Err(ConfigError::ZoomFactor(self.zoom_factor));
        }
        if !(self.dpi > 0.0) {
            return Err(ConfigError::Dpi(self.dpi));
        }
        self.kinetic.validate()
    }

    pub(crate) fn zoom_state(&self) -> ZoomState {
        ZoomState::new(
            self.zoom,
            self.zoom_min,
            self.zoom_max,
            self.zoom_factor,
            self.zoom_mode,
        )
    }
}

/// Drag-to-scroll and inertia tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KineticConfig {
    pub enabled: bool,
    /// Velocity multiplier applied after every inertia tick.
    pub friction: f64,
    pub tick_interval_ms: u64,
    pub max_animation_ms: u64,
}

impl Default for KineticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            friction: 0.90,
            tick_interval_ms: 20,
            max_animation_ms: 3000,
        }
    }
}

impl KineticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.friction > 0.0 && self.friction < 1.0) {
            return Err(ConfigError::Friction(self.friction));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::TickInterval);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Upper bound on inertia ticks after one release.
    pub fn max_ticks(&self) -> u32 {
        (self.max_animation_ms / self.tick_interval_ms.max(1)).min(u32::MAX as u64) as u32
    }
}
