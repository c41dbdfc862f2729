//! RGB colors for the knob LED.
//!
//! Colors are plain 8-bit RGB triples. The interaction machine blends two
//! endpoint colors to show where the draft angle sits inside the allowed
//! range; see [`Color::blend`].
//!
//! # Example
//!
//! ```rust
//! use rs_blinds::Color;
//!
//! let half = Color::BLUE.scale(0.5).saturating_add(Color::GREEN.scale(0.5));
//! assert_eq!(half, Color::rgb(0, 127, 127));
//! ```

/// An 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// LED off.
    pub const OFF: Color = Color::rgb(0, 0, 0);
    /// Full red.
    pub const RED: Color = Color::rgb(255, 0, 0);
    /// Full green.
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    /// Full blue.
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    /// All channels full.
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    /// Green + blue.
    pub const CYAN: Color = Color::rgb(0, 255, 255);
    /// Red + green.
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    /// Red + blue.
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);

    /// Creates a color from its channels.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `factor`.
    ///
    /// The factor is clamped to `0.0..=1.0` and channels are truncated, so
    /// `scale(1.0)` is the identity and `scale(0.0)` is [`Color::OFF`].
    pub fn scale(self, factor: f32) -> Self {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        let ch = |c: u8| (c as f32 * factor) as u8;
        Self::rgb(ch(self.r), ch(self.g), ch(self.b))
    }

    /// Adds two colors channel-wise, saturating at 255.
    pub fn saturating_add(self, other: Color) -> Self {
        Self::rgb(
            self.r.saturating_add(other.r),
            self.g.saturating_add(other.g),
            self.b.saturating_add(other.b),
        )
    }

    /// Linear blend between `low` (at `ratio == 0`) and `high` (at `ratio == 1`).
    ///
    /// Each endpoint is scaled by its own weight and the results are summed.
    pub fn blend(low: Color, high: Color, ratio: f32) -> Self {
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        low.scale(1.0 - ratio).saturating_add(high.scale(ratio))
    }

    /// Returns true if every channel is zero.
    #[inline]
    pub const fn is_off(&self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_bounds() {
        assert_eq!(Color::WHITE.scale(1.0), Color::WHITE);
        assert_eq!(Color::WHITE.scale(0.0), Color::OFF);
        assert_eq!(Color::WHITE.scale(2.0), Color::WHITE);
        assert_eq!(Color::WHITE.scale(-1.0), Color::OFF);
        assert_eq!(Color::WHITE.scale(f32::NAN), Color::OFF);
    }

    #[test]
    fn add_saturates() {
        let c = Color::rgb(200, 10, 0).saturating_add(Color::rgb(100, 10, 0));
        assert_eq!(c, Color::rgb(255, 20, 0));
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(Color::blend(Color::BLUE, Color::GREEN, 0.0), Color::BLUE);
        assert_eq!(Color::blend(Color::BLUE, Color::GREEN, 1.0), Color::GREEN);

        let mid = Color::blend(Color::BLUE, Color::GREEN, 0.5);
        assert_eq!(mid, Color::rgb(0, 127, 127));
    }

    #[test]
    fn off_detection() {
        assert!(Color::OFF.is_off());
        assert!(Color::default().is_off());
        assert!(!Color::RED.is_off());
    }
}
