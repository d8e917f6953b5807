//! Colour assignment for categories and labels.
//!
//! Colours are `#rrggbb` strings. New categories take the first unused entry
//! of a curated 30-colour palette; once the palette is exhausted, random
//! colours are sampled in a readable saturation/lightness band and kept only
//! if they are perceptually distinct from every colour already in use.

use rand::Rng;

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Curated palette, ordered so that neighbouring entries contrast well.
pub const DEFAULT_COLORS: [&str; 30] = [
    "#2563eb", "#dc2626", "#059669", "#d97706", "#7c3aed", "#0891b2", "#be123c", "#65a30d",
    "#c2410c", "#4338ca", "#be185d", "#166534", "#b91c1c", "#1d4ed8", "#92400e", "#5b21b6",
    "#0f766e", "#a21caf", "#365314", "#7e22ce", "#0c4a6e", "#991b1b", "#1e40af", "#b45309",
    "#581c87", "#134e4a", "#9333ea", "#0369a1", "#ca8a04", "#86198f",
];

/// Neutral gray used for new categories and uncategorised labels.
pub const NEUTRAL_GRAY: &str = "#6c757d";

/// Minimum weighted HSL distance for two colours to count as distinct.
pub const DEFAULT_DISTINCT_THRESHOLD: f64 = 30.0;

/// Attempts made by [`generate_random_color`] before falling back.
pub const MAX_RANDOM_ATTEMPTS: usize = 50;

const SATURATION_RANGE: (f64, f64) = (0.6, 0.9);
const LIGHTNESS_RANGE: (f64, f64) = (0.3, 0.6);

pub const BLACK_TEXT: &str = "#000000";
pub const WHITE_TEXT: &str = "#ffffff";

/* --------------------------------------------------------------------------
Conversions
-------------------------------------------------------------------------- */

/// A colour in hue/saturation/lightness space. Hue is in degrees `[0, 360)`,
/// saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

/// Parse `#rrggbb` (the leading `#` is optional) into RGB channels.
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Convert a hex colour to HSL.
pub fn hex_to_hsl(hex: &str) -> Option<Hsl> {
    let (r, g, b) = hex_to_rgb(hex)?;
    Some(rgb_to_hsl(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    ))
}

/// Convert HSL back to a lowercase `#rrggbb` string.
///
/// Channels are truncated, not rounded, so `hsl_to_hex(hex_to_hsl(c))` may
/// drift by one unit per channel.
pub fn hsl_to_hex(hsl: Hsl) -> String {
    let (r, g, b) = hsl_to_rgb(hsl.hue / 360.0, hsl.saturation, hsl.lightness);
    format!("#{:02x}{:02x}{:02x}", to_byte(r), to_byte(g), to_byte(b))
}

fn to_byte(channel: f64) -> u8 {
    (channel * 255.0) as u8
}

fn rgb_to_hsl(r: f64, g: f64, b: f64) -> Hsl {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;

    if max == min {
        return Hsl {
            hue: 0.0,
            saturation: 0.0,
            lightness,
        };
    }

    let span = max - min;
    let saturation = if lightness <= 0.5 {
        span / (max + min)
    } else {
        span / (2.0 - max - min)
    };

    let rc = (max - r) / span;
    let gc = (max - g) / span;
    let bc = (max - b) / span;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    Hsl {
        hue: (h / 6.0).rem_euclid(1.0) * 360.0,
        saturation,
        lightness,
    }
}

/// `hue` is a fraction of a full turn here, not degrees.
fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (f64, f64, f64) {
    if saturation == 0.0 {
        return (lightness, lightness, lightness);
    }
    let m2 = if lightness <= 0.5 {
        lightness * (1.0 + saturation)
    } else {
        lightness + saturation - lightness * saturation
    };
    let m1 = 2.0 * lightness - m2;
    (
        hue_channel(m1, m2, hue + 1.0 / 3.0),
        hue_channel(m1, m2, hue),
        hue_channel(m1, m2, hue - 1.0 / 3.0),
    )
}

fn hue_channel(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/* --------------------------------------------------------------------------
Palette operations
-------------------------------------------------------------------------- */

/// The `index`-th palette colour, cycling once the palette is exhausted.
pub fn get_color_by_index(index: usize) -> &'static str {
    DEFAULT_COLORS[index % DEFAULT_COLORS.len()]
}

/// First palette colour not present in `used`, or a random distinct colour
/// when all 30 are taken.
pub fn get_next_color<S: AsRef<str>>(used: &[S]) -> String {
    DEFAULT_COLORS
        .iter()
        .find(|candidate| {
            !used
                .iter()
                .any(|u| u.as_ref().eq_ignore_ascii_case(candidate))
        })
        .map(|c| (*c).to_string())
        .unwrap_or_else(|| generate_random_color(used))
}

/// Random readable colour distinct from everything in `avoid`, using the
/// thread-local RNG.
pub fn generate_random_color<S: AsRef<str>>(avoid: &[S]) -> String {
    generate_random_color_with(&mut rand::rng(), avoid)
}

/// Same as [`generate_random_color`] with a caller-supplied RNG.
pub fn generate_random_color_with<R: Rng, S: AsRef<str>>(
    rng: &mut R,
    avoid: &[S],
) -> String {
    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let candidate = hsl_to_hex(Hsl {
            hue: rng.random::<f64>() * 360.0,
            saturation: rng.random_range(SATURATION_RANGE.0..=SATURATION_RANGE.1),
            lightness: rng.random_range(LIGHTNESS_RANGE.0..=LIGHTNESS_RANGE.1),
        });
        if is_color_distinct(&candidate, avoid, DEFAULT_DISTINCT_THRESHOLD) {
            return candidate;
        }
    }
    DEFAULT_COLORS[0].to_string()
}

/// Weighted HSL distance between two colours.
///
/// Hue difference is taken on the shorter arc of the colour wheel.
pub fn color_distance(a: Hsl, b: Hsl) -> f64 {
    let raw = (a.hue - b.hue).abs();
    let hue_delta = raw.min(360.0 - raw);
    let sat_delta = (a.saturation - b.saturation).abs() * 100.0;
    let light_delta = (a.lightness - b.lightness).abs() * 100.0;
    hue_delta * 0.6 + sat_delta * 0.3 + light_delta * 0.1
}

/// Whether `candidate` is at least `threshold` away from every colour in
/// `existing`.
///
/// An empty `existing` list is always distinct. An unparseable candidate is
/// never distinct; unparseable entries in `existing` are ignored.
pub fn is_color_distinct<S: AsRef<str>>(candidate: &str, existing: &[S], threshold: f64) -> bool {
    if existing.is_empty() {
        return true;
    }
    let Some(target) = hex_to_hsl(candidate) else {
        return false;
    };
    existing
        .iter()
        .filter_map(|e| hex_to_hsl(e.as_ref()))
        .all(|other| color_distance(target, other) >= threshold)
}

/// Black or white text, whichever reads better on `background`.
pub fn get_contrasting_text_color(background: &str) -> Result<&'static str, CoreError> {
    let (r, g, b) = hex_to_rgb(background).ok_or_else(|| invalid_color(background))?;
    let luminance = (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0;
    Ok(if luminance > 0.5 { BLACK_TEXT } else { WHITE_TEXT })
}

/// Shift hue by `hue_shift` degrees and scale saturation and lightness.
///
/// Lightness is clamped to `[0.1, 0.9]` so the result stays legible.
pub fn adjust_color(
    hex: &str,
    hue_shift: f64,
    sat_factor: f64,
    light_factor: f64,
) -> Result<String, CoreError> {
    let hsl = hex_to_hsl(hex).ok_or_else(|| invalid_color(hex))?;
    Ok(hsl_to_hex(Hsl {
        hue: (hsl.hue + hue_shift).rem_euclid(360.0),
        saturation: (hsl.saturation * sat_factor).clamp(0.0, 1.0),
        lightness: (hsl.lightness * light_factor).clamp(0.1, 0.9),
    }))
}

/// `true` iff `s` is exactly `#` followed by six hex digits.
pub fn validate_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// [`validate_color`] as a `Result`, for use at write boundaries.
pub fn require_valid_color(s: &str) -> Result<(), CoreError> {
    if validate_color(s) {
        Ok(())
    } else {
        Err(invalid_color(s))
    }
}

fn invalid_color(s: &str) -> CoreError {
    CoreError::Validation(format!("Invalid color '{s}'. Must be in #RRGGBB hex format"))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn color_by_index_is_deterministic_and_cycles() {
        assert_eq!(get_color_by_index(0), "#2563eb");
        assert_eq!(get_color_by_index(29), "#86198f");
        assert_eq!(get_color_by_index(30), get_color_by_index(0));
        assert_eq!(get_color_by_index(47), get_color_by_index(47));
        assert_eq!(get_color_by_index(61), DEFAULT_COLORS[1]);
    }

    #[test]
    fn next_color_skips_used_entries() {
        let used = vec!["#2563eb".to_string(), "#DC2626".to_string()];
        assert_eq!(get_next_color(&used), "#059669");
    }

    #[test]
    fn next_color_with_nothing_used_is_first_entry() {
        let used: Vec<String> = Vec::new();
        assert_eq!(get_next_color(&used), DEFAULT_COLORS[0]);
    }

    #[test]
    fn next_color_falls_back_to_random_when_palette_exhausted() {
        let color = get_next_color(&DEFAULT_COLORS);
        assert!(validate_color(&color), "got {color}");
    }

    #[test]
    fn color_is_not_distinct_from_itself() {
        for color in DEFAULT_COLORS {
            assert!(!is_color_distinct(color, &[color], DEFAULT_DISTINCT_THRESHOLD));
        }
    }

    #[test]
    fn anything_is_distinct_from_empty_list() {
        let none: [&str; 0] = [];
        assert!(is_color_distinct("#123456", &none, DEFAULT_DISTINCT_THRESHOLD));
    }

    #[test]
    fn opposite_hues_are_distinct() {
        assert!(is_color_distinct(
            "#ff0000",
            &["#00ffff"],
            DEFAULT_DISTINCT_THRESHOLD
        ));
    }

    #[test]
    fn hue_distance_uses_shorter_arc() {
        let a = Hsl {
            hue: 350.0,
            saturation: 0.5,
            lightness: 0.5,
        };
        let b = Hsl { hue: 10.0, ..a };
        assert!((color_distance(a, b) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn seeded_random_color_is_valid_and_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let avoid = ["#2563eb", "#dc2626"];
        let color = generate_random_color_with(&mut rng, &avoid);
        assert!(validate_color(&color));
        if color != DEFAULT_COLORS[0] {
            assert!(is_color_distinct(&color, &avoid, DEFAULT_DISTINCT_THRESHOLD));
        }
    }

    #[test]
    fn random_color_falls_back_when_nothing_is_distinct() {
        // A threshold no colour can meet is simulated by avoiding a dense
        // ring of hues at every readable saturation and lightness.
        let mut avoid = Vec::new();
        for step in 0..72 {
            for s in [0.6, 0.75, 0.9] {
                for l in [0.3, 0.45, 0.6] {
                    avoid.push(hsl_to_hex(Hsl {
                        hue: f64::from(step) * 5.0,
                        saturation: s,
                        lightness: l,
                    }));
                }
            }
        }
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(generate_random_color_with(&mut rng, &avoid), DEFAULT_COLORS[0]);
    }

    #[test]
    fn contrast_picks_black_or_white() {
        assert_eq!(get_contrasting_text_color("#000000").unwrap(), "#ffffff");
        assert_eq!(get_contrasting_text_color("#ffffff").unwrap(), "#000000");
        assert_eq!(get_contrasting_text_color("#ca8a04").unwrap(), "#000000");
        assert_eq!(get_contrasting_text_color("#2563eb").unwrap(), "#ffffff");
        assert!(get_contrasting_text_color("blue").is_err());
    }

    #[test]
    fn validate_color_cases() {
        assert!(validate_color("#1a2b3c"));
        assert!(validate_color("#ABCDEF"));
        assert!(!validate_color("1a2b3c"));
        assert!(!validate_color("#1a2b3"));
        assert!(!validate_color(""));
        assert!(!validate_color("#1a2b3g"));
        assert!(!validate_color(" #1a2b3c"));
    }

    #[test]
    fn hsl_conversion_of_primaries() {
        let red = hex_to_hsl("#ff0000").unwrap();
        assert!((red.hue - 0.0).abs() < 1e-9);
        assert!((red.saturation - 1.0).abs() < 1e-9);
        assert!((red.lightness - 0.5).abs() < 1e-9);

        let blue = hex_to_hsl("#0000ff").unwrap();
        assert!((blue.hue - 240.0).abs() < 1e-9);

        assert_eq!(hsl_to_hex(red), "#ff0000");
        assert_eq!(hsl_to_hex(blue), "#0000ff");
    }

    #[test]
    fn gray_has_no_saturation() {
        let gray = hex_to_hsl(NEUTRAL_GRAY).unwrap();
        assert!(gray.saturation < 0.2);
    }

    #[test]
    fn adjust_color_clamps_lightness() {
        let lighter = adjust_color("#ffffff", 0.0, 1.0, 1.0).unwrap();
        let expected = hsl_to_hex(Hsl {
            hue: 0.0,
            saturation: 0.0,
            lightness: 0.9,
        });
        assert_eq!(lighter, expected);
        assert!(adjust_color("nope", 10.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn adjust_color_wraps_hue() {
        let shifted = adjust_color("#ff0000", 480.0, 1.0, 1.0).unwrap();
        let hsl = hex_to_hsl(&shifted).unwrap();
        assert!((hsl.hue - 120.0).abs() < 1.0, "hue was {}", hsl.hue);
    }
}
