//! Watermark style resolution
//!
//! Turns the raw, possibly missing or malformed, request fields into a fully
//! populated [`StyleConfig`]. Resolution never fails: every field has a
//! documented fallback.

use tracing::debug;

/// Text used when the caller supplies none
pub const DEFAULT_TEXT: &str = "WATERMARK";

/// Text opacity used when the caller supplies none
pub const DEFAULT_OPACITY: f64 = 0.3;

/// Logo opacity used when the caller supplies none
pub const DEFAULT_LOGO_OPACITY: f64 = 1.0;

/// Font size hint reported when the caller supplies none
pub const DEFAULT_FONT_SIZE_HINT: i32 = 50;

/// Rotation hint reported when the caller supplies none
pub const DEFAULT_ROTATION_HINT: i32 = -45;

/// RGB color with each component in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    /// Mid-gray, the fallback for missing or malformed colors
    pub const MID_GRAY: Color = Color { r: 0.5, g: 0.5, b: 0.5 };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::MID_GRAY
    }
}

/// Parse a `#rrggbb` / `rrggbb` hex color (case-insensitive)
///
/// Anything that is not exactly six hex digits, with an optional leading
/// `#`, falls back to [`Color::MID_GRAY`].
pub fn hex_to_rgb_color(hex: &str) -> Color {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Color::MID_GRAY;
    }

    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|v| f64::from(v) / 255.0)
            .unwrap_or(0.5)
    };

    Color::rgb(channel(0), channel(2), channel(4))
}

/// Where the watermark is anchored on the page
///
/// Only one placement exists today; the value is accepted so callers can
/// keep sending it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
}

impl Position {
    /// Parse a position name. Unknown names resolve to center.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" | "" => Position::Center,
            other => {
                debug!("Unknown watermark position '{}', using center", other);
                Position::Center
            }
        }
    }
}

/// Layout values the caller asked for
///
/// These are accepted at the boundary and reported back, but the layout
/// engine derives font size from the page diagonal and always rotates by
/// its own fixed angle. Nothing in [`crate::layout`] reads them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutHints {
    pub font_size: i32,
    pub rotation: i32,
    pub position: Position,
}

impl Default for LayoutHints {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE_HINT,
            rotation: DEFAULT_ROTATION_HINT,
            position: Position::Center,
        }
    }
}

/// Raw style fields as they arrive from the request boundary
#[derive(Debug, Clone, Default)]
pub struct RawStyle {
    pub watermark_text: Option<String>,
    pub opacity: Option<String>,
    pub font_size: Option<String>,
    pub rotation: Option<String>,
    pub color: Option<String>,
    pub position: Option<String>,
    pub logo_opacity: Option<String>,
}

/// Normalized watermark style, resolved once per request
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    /// Watermark text, never empty
    pub text: String,
    /// Text opacity, never zero; out-of-range input is passed through unchanged
    pub opacity: f64,
    /// Text color
    pub color: Color,
    /// Logo opacity, only used when a logo is supplied
    pub logo_opacity: f64,
    /// Caller hints that the layout engine does not apply
    pub hints: LayoutHints,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT.to_string(),
            opacity: DEFAULT_OPACITY,
            color: Color::MID_GRAY,
            logo_opacity: DEFAULT_LOGO_OPACITY,
            hints: LayoutHints::default(),
        }
    }
}

/// Resolve raw request fields into a [`StyleConfig`]
pub fn resolve_style(raw: &RawStyle) -> StyleConfig {
    let text = match raw.watermark_text.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_TEXT.to_string(),
    };

    let color = raw
        .color
        .as_deref()
        .map(hex_to_rgb_color)
        .unwrap_or(Color::MID_GRAY);

    let hints = LayoutHints {
        font_size: parse_int_or(raw.font_size.as_deref(), DEFAULT_FONT_SIZE_HINT),
        rotation: parse_int_or(raw.rotation.as_deref(), DEFAULT_ROTATION_HINT),
        position: raw.position.as_deref().map(Position::parse).unwrap_or_default(),
    };

    let style = StyleConfig {
        text,
        opacity: parse_float_or(raw.opacity.as_deref(), DEFAULT_OPACITY),
        color,
        logo_opacity: parse_float_or(raw.logo_opacity.as_deref(), DEFAULT_LOGO_OPACITY),
        hints,
    };

    debug!(
        "Resolved style: text={:?} opacity={} color=({:.3}, {:.3}, {:.3}) logo_opacity={}",
        style.text, style.opacity, style.color.r, style.color.g, style.color.b, style.logo_opacity
    );

    style
}

/// Parse an opacity the lenient way request fields are read: the leading
/// number counts and trailing junk is ignored. Zero, absent, unreadable and
/// non-finite input all fall back to `default`.
fn parse_float_or(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(leading_float)
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(default)
}

/// Parse an integer hint from its leading digits; zero counts as absent
fn parse_int_or(raw: Option<&str>, default: i32) -> i32 {
    raw.and_then(leading_int)
        .filter(|v| *v != 0)
        .unwrap_or(default)
}

/// Longest numeric prefix of `s` after leading whitespace
///
/// `"0.5abc"` reads as 0.5 and `"Infinity"` as infinity. Returns `None`
/// when no digits lead the string.
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].parse().ok();
    }

    let int_start = end;
    end = skip_digits(bytes, end);
    let mut mantissa_digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = skip_digits(bytes, end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return None;
    }

    // An exponent only counts when digits follow it
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = skip_digits(bytes, end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// Leading optionally signed decimal integer of `s` after leading whitespace
fn leading_int(s: &str) -> Option<i32> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let end = skip_digits(bytes, sign);

    if end == sign {
        return None;
    }
    s[..end].parse().ok()
}

fn skip_digits(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_with_hash() {
        let c = hex_to_rgb_color("#FF8000");
        assert!((c.r - 1.0).abs() < 1e-9);
        assert!((c.g - 0.502).abs() < 0.001);
        assert_eq!(c.b, 0.0);
    }

    #[test]
    fn test_hex_color_without_hash_lowercase() {
        let c = hex_to_rgb_color("00ff00");
        assert_eq!(c, Color::rgb(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_hex_color_malformed_falls_back_to_gray() {
        assert_eq!(hex_to_rgb_color("not-a-color"), Color::MID_GRAY);
        assert_eq!(hex_to_rgb_color("#FFF"), Color::MID_GRAY);
        assert_eq!(hex_to_rgb_color("#FF80001"), Color::MID_GRAY);
        assert_eq!(hex_to_rgb_color("##FF8000"), Color::MID_GRAY);
        assert_eq!(hex_to_rgb_color("+f+f+f"), Color::MID_GRAY);
        assert_eq!(hex_to_rgb_color(""), Color::MID_GRAY);
    }

    #[test]
    fn test_defaults_when_everything_missing() {
        let style = resolve_style(&RawStyle::default());
        assert_eq!(style.text, "WATERMARK");
        assert_eq!(style.opacity, 0.3);
        assert_eq!(style.color, Color::rgb(0.5, 0.5, 0.5));
        assert_eq!(style.logo_opacity, 1.0);
        assert_eq!(style, StyleConfig::default());
    }

    #[test]
    fn test_empty_text_uses_default() {
        let raw = RawStyle {
            watermark_text: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(resolve_style(&raw).text, "WATERMARK");
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        let raw = RawStyle {
            watermark_text: Some("  Draft copy ".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_style(&raw).text, "  Draft copy ");
    }

    #[test]
    fn test_malformed_opacity_falls_back() {
        let raw = RawStyle {
            opacity: Some("abc".to_string()),
            logo_opacity: Some("NaN".to_string()),
            ..Default::default()
        };
        let style = resolve_style(&raw);
        assert_eq!(style.opacity, 0.3);
        assert_eq!(style.logo_opacity, 1.0);
    }

    #[test]
    fn test_out_of_range_opacity_passes_through() {
        let raw = RawStyle {
            opacity: Some("1.7".to_string()),
            logo_opacity: Some(" 0.25 ".to_string()),
            ..Default::default()
        };
        let style = resolve_style(&raw);
        assert_eq!(style.opacity, 1.7);
        assert_eq!(style.logo_opacity, 0.25);
    }

    #[test]
    fn test_zero_opacity_counts_as_absent() {
        let raw = RawStyle {
            opacity: Some("0".to_string()),
            logo_opacity: Some("0.0".to_string()),
            ..Default::default()
        };
        let style = resolve_style(&raw);
        assert_eq!(style.opacity, 0.3);
        assert_eq!(style.logo_opacity, 1.0);
    }

    #[test]
    fn test_opacity_reads_leading_number() {
        let raw = RawStyle {
            opacity: Some("0.5abc".to_string()),
            logo_opacity: Some("  .75 percent".to_string()),
            ..Default::default()
        };
        let style = resolve_style(&raw);
        assert_eq!(style.opacity, 0.5);
        assert_eq!(style.logo_opacity, 0.75);
    }

    #[test]
    fn test_infinite_opacity_falls_back() {
        let raw = RawStyle {
            opacity: Some("Infinity".to_string()),
            logo_opacity: Some("-Infinity".to_string()),
            ..Default::default()
        };
        let style = resolve_style(&raw);
        assert_eq!(style.opacity, 0.3);
        assert_eq!(style.logo_opacity, 1.0);
    }

    #[test]
    fn test_leading_float_prefixes() {
        assert_eq!(leading_float("1e-1x"), Some(0.1));
        assert_eq!(leading_float("2e"), Some(2.0));
        assert_eq!(leading_float("-3.5."), Some(-3.5));
        assert_eq!(leading_float("5."), Some(5.0));
        assert_eq!(leading_float("Infinity"), Some(f64::INFINITY));
        assert_eq!(leading_float("."), None);
        assert_eq!(leading_float("-"), None);
        assert_eq!(leading_float("abc1"), None);
        assert_eq!(leading_float("inf"), None);
    }

    #[test]
    fn test_leading_int_prefixes() {
        assert_eq!(leading_int("72.9"), Some(72));
        assert_eq!(leading_int(" -45deg"), Some(-45));
        assert_eq!(leading_int("1e3"), Some(1));
        assert_eq!(leading_int("+"), None);
        assert_eq!(leading_int("x12"), None);
        assert_eq!(leading_int("99999999999"), None);
    }

    #[test]
    fn test_hints_are_parsed_with_defaults() {
        let raw = RawStyle {
            font_size: Some("72".to_string()),
            rotation: Some("junk".to_string()),
            position: Some("top-left".to_string()),
            ..Default::default()
        };
        let hints = resolve_style(&raw).hints;
        assert_eq!(hints.font_size, 72);
        assert_eq!(hints.rotation, -45);
        assert_eq!(hints.position, Position::Center);

        let zero = RawStyle {
            font_size: Some("0".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_style(&zero).hints.font_size, 50);
    }
}
