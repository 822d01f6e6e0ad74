//! Volume control
//!
//! Volume is a linear level in [0, 1]. Out-of-range input is clamped, never
//! rejected; remote devices take it as a whole percentage.

/// Volume controller
#[derive(Debug, Clone)]
pub struct Volume {
    /// Volume level (0.0-1.0)
    level: f32,
}

impl Volume {
    /// Create new volume controller, clamping `level` into range
    pub fn new(level: f32) -> Self {
        Self {
            level: clamp_volume(level),
        }
    }

    /// Set volume level, returning the clamped value that was stored
    pub fn set_level(&mut self, level: f32) -> f32 {
        self.level = clamp_volume(level);
        self.level
    }

    /// Get current volume level (0.0-1.0)
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Level as a whole percentage (0-100)
    pub fn percent(&self) -> u8 {
        to_percent(self.level)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Clamp into [0, 1]; NaN becomes silence
pub fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Convert a level to a whole percentage (0-100)
pub fn to_percent(level: f32) -> u8 {
    (clamp_volume(level) * 100.0).round() as u8
}
