//! Colour tokens for terminal rendering and the bucket colour ramp.

#![allow(missing_docs)]

use std::env;

use serde::Serialize;

/// Colour output mode, honouring `NO_COLOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Enabled,
    Disabled,
}

impl ColorMode {
    #[must_use]
    pub const fn from_no_color_flag(no_color: bool) -> Self {
        if no_color { Self::Disabled } else { Self::Enabled }
    }

    #[must_use]
    pub fn from_environment() -> Self {
        Self::from_no_color_flag(env::var_os("NO_COLOR").is_some())
    }

    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Stops of the bucket ramp: white, amber, violet.
pub const BUCKET_RAMP: [Rgb; 3] = [
    Rgb::new(0xff, 0xff, 0xff),
    Rgb::new(0xfc, 0xd3, 0x4d),
    Rgb::new(0x5b, 0x21, 0xb6),
];

/// Colour at `t` in `[0, 1]` along [`BUCKET_RAMP`].
#[must_use]
pub fn ramp(t: f64) -> Rgb {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let segments = (BUCKET_RAMP.len() - 1) as f64;
    let scaled = t * segments;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let segment = (scaled.floor() as usize).min(BUCKET_RAMP.len() - 2);
    let local = scaled - segment as f64;
    let (from, to) = (BUCKET_RAMP[segment], BUCKET_RAMP[segment + 1]);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * local).round() as u8;
    Rgb::new(mix(from.r, to.r), mix(from.g, to.g), mix(from.b, to.b))
}

/// Colour of position `i` among `n` buckets.
#[must_use]
pub fn bucket_colour(i: usize, n: usize) -> Rgb {
    if n == 0 {
        return BUCKET_RAMP[0];
    }
    ramp(i as f64 / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_endpoints() {
        assert_eq!(ramp(0.0), BUCKET_RAMP[0]);
        assert_eq!(ramp(0.5), BUCKET_RAMP[1]);
        assert_eq!(ramp(1.0), BUCKET_RAMP[2]);
        assert_eq!(ramp(f64::NAN), BUCKET_RAMP[0]);
    }

    #[test]
    fn first_bucket_is_white() {
        assert_eq!(bucket_colour(0, 4).hex(), "#ffffff");
        assert_ne!(bucket_colour(3, 4), bucket_colour(2, 4));
    }

    #[test]
    fn no_color_flag_disables() {
        assert!(!ColorMode::from_no_color_flag(true).enabled());
        assert!(ColorMode::from_no_color_flag(false).enabled());
    }
}
