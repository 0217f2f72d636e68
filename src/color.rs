// Occupant color softening: hex in, muted CSS `hsl()` out, so user colors sit
// comfortably on the dark map.

const SATURATION_RANGE: (f64, f64) = (40.0, 80.0);
const LIGHTNESS_RANGE: (f64, f64) = (50.0, 80.0);
const PULL_FACTOR: f64 = 0.7;
/// Below this saturation a color is treated as grey.
const GREY_SATURATION: f64 = 5.0;
const GREY_LIGHTNESS_RANGE: (f64, f64) = (45.0, 65.0);

/// Hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    pub fn to_css(self) -> String {
        format!(
            "hsl({}, {}%, {}%)",
            self.h.round(),
            self.s.round(),
            self.l.round()
        )
    }
}

/// Parse `#rrggbb` or `#rgb` (leading `#` optional) into RGB fractions.
pub fn parse_hex(hex: &str) -> Option<(f64, f64, f64)> {
    let digits = hex.trim().trim_start_matches('#');
    let value = u32::from_str_radix(digits, 16).ok()?;
    let (r, g, b) = match digits.len() {
        6 => ((value >> 16) & 0xff, (value >> 8) & 0xff, value & 0xff),
        3 => {
            let expand = |nibble: u32| nibble * 0x11;
            (
                expand((value >> 8) & 0xf),
                expand((value >> 4) & 0xf),
                expand(value & 0xf),
            )
        }
        _ => return None,
    };
    Some((
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    ))
}

pub fn rgb_to_hsl(r: f64, g: f64, b: f64) -> Hsl {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return Hsl {
            h: 0.0,
            s: 0.0,
            l: l * 100.0,
        };
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    Hsl {
        h: h * 60.0,
        s: s * 100.0,
        l: l * 100.0,
    }
}

/// Pull saturation and lightness toward the middle of their ranges, then clamp.
/// Near-greys lose all saturation and keep a mid lightness.
pub fn soften(color: Hsl) -> Hsl {
    if color.s < GREY_SATURATION {
        return Hsl {
            h: color.h,
            s: 0.0,
            l: color.l.clamp(GREY_LIGHTNESS_RANGE.0, GREY_LIGHTNESS_RANGE.1),
        };
    }
    let pull = |value: f64, (lo, hi): (f64, f64)| {
        let mid = (lo + hi) / 2.0;
        (mid + (value - mid) * PULL_FACTOR).clamp(lo, hi)
    };
    Hsl {
        h: color.h,
        s: pull(color.s, SATURATION_RANGE),
        l: pull(color.l, LIGHTNESS_RANGE),
    }
}

/// Softened CSS color for an occupant, or `None` if `hex` is malformed.
pub fn soften_hex(hex: &str) -> Option<String> {
    let (r, g, b) = parse_hex(hex)?;
    Some(soften(rgb_to_hsl(r, g, b)).to_css())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_red_is_muted() {
        // s 100 -> 60 + 40 * 0.7 = 88 -> 80; l 50 -> 65 - 15 * 0.7 = 54.5 -> 55
        assert_eq!(soften_hex("#ff0000").as_deref(), Some("hsl(0, 80%, 55%)"));
    }

    #[test]
    fn greys_lose_saturation() {
        assert_eq!(soften_hex("#000000").as_deref(), Some("hsl(0, 0%, 45%)"));
        assert_eq!(soften_hex("#ffffff").as_deref(), Some("hsl(0, 0%, 65%)"));
    }

    #[test]
    fn hue_follows_dominant_channel() {
        let hsl = rgb_to_hsl(0.0, 0.0, 1.0);
        assert_eq!(hsl.h, 240.0);
        let hsl = rgb_to_hsl(0.0, 1.0, 0.0);
        assert_eq!(hsl.h, 120.0);
    }

    #[test]
    fn shorthand_hex_expands() {
        assert_eq!(parse_hex("#f00"), Some((1.0, 0.0, 0.0)));
        assert_eq!(parse_hex("00ff00"), Some((0.0, 1.0, 0.0)));
    }

    #[test]
    fn malformed_colors_are_rejected() {
        assert_eq!(soften_hex("red"), None);
        assert_eq!(soften_hex("#12345"), None);
        assert_eq!(soften_hex(""), None);
    }

    #[test]
    fn softened_values_stay_in_range() {
        for hex in ["#123456", "#abcdef", "#ff8800", "#0a0a0a", "#7f7f80"] {
            let (r, g, b) = parse_hex(hex).unwrap();
            let out = soften(rgb_to_hsl(r, g, b));
            assert!(out.s == 0.0 || (40.0..=80.0).contains(&out.s), "{hex}: {out:?}");
            assert!((45.0..=80.0).contains(&out.l), "{hex}: {out:?}");
        }
    }
}
