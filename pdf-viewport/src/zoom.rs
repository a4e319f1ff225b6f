use crate::layout::ZoomMode;

/// Zoom factor, its bounds, and how it is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomState {
    value: f64,
    min: f64,
    max: f64,
    factor: f64,
    mode: ZoomMode,
}

impl ZoomState {
    pub const DEFAULT_MIN: f64 = 0.1;
    pub const DEFAULT_MAX: f64 = 5.0;
    pub const DEFAULT_FACTOR: f64 = 1.2;

    pub fn new(value: f64, min: f64, max: f64, factor: f64, mode: ZoomMode) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
            factor,
            mode,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mode(&self) -> ZoomMode {
        self.mode
    }

    /// Store a clamped explicit zoom. Returns whether the stored state changed.
    pub fn set(&mut self, zoom: f64) -> bool {
        let clamped = if zoom.is_nan() {
            self.value
        } else {
            zoom.clamp(self.min, self.max)
        };
        let changed = clamped != self.value || self.mode != ZoomMode::Explicit;
        self.value = clamped;
        self.mode = ZoomMode::Explicit;
        changed
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set(self.value * self.factor)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set(self.value / self.factor)
    }

    pub fn set_mode(&mut self, mode: ZoomMode) {
        self.mode = mode;
    }

    /// Record the zoom a fit mode implied during layout.
    pub fn apply_fit(&mut self, zoom: f64) {
        if self.mode != ZoomMode::Explicit && !zoom.is_nan() {
            self.value = zoom.clamp(self.min, self.max);
        }
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new(
            1.0,
            Self::DEFAULT_MIN,
            Self::DEFAULT_MAX,
            Self::DEFAULT_FACTOR,
            ZoomMode::FitHeight,
        )
    }
}
