// Engine configuration passed from JS as JSON. Every field has a default, so `{}`
// configures the stock 45x54 city map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::EasingType;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub gesture: GestureSettings,
    #[serde(default)]
    pub animation: AnimationSettings,
    #[serde(default)]
    pub fade: FadeSettings,
    #[serde(default)]
    pub style: StyleSettings,
    #[serde(default = "default_labels")]
    pub labels: Vec<LabelSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            grid: GridSettings::default(),
            gesture: GestureSettings::default(),
            animation: AnimationSettings::default(),
            fade: FadeSettings::default(),
            style: StyleSettings::default(),
            labels: default_labels(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.grid.columns == 0 || self.grid.rows == 0 {
            return Err(EngineError::InvalidConfig(
                "grid columns and rows must be non-zero".to_string(),
            ));
        }
        if !(self.grid.cell_px.is_finite() && self.grid.cell_px > 0.0) {
            return Err(EngineError::InvalidConfig(
                "cell_px must be positive".to_string(),
            ));
        }
        if self.gesture.double_tap_window_us == 0 {
            return Err(EngineError::InvalidConfig(
                "double_tap_window_us must be non-zero".to_string(),
            ));
        }
        if self.gesture.double_tap_zoom_factor <= 1.0 || self.gesture.wheel_zoom_factor <= 1.0 {
            return Err(EngineError::InvalidConfig(
                "zoom factors must be greater than 1".to_string(),
            ));
        }
        if self.gesture.hit_tolerance_cells < 0 {
            return Err(EngineError::InvalidConfig(
                "hit_tolerance_cells must not be negative".to_string(),
            ));
        }
        if self.fade.overlay_fade_start >= self.fade.overlay_fade_end {
            return Err(EngineError::InvalidConfig(format!(
                "overlay fade thresholds must increase ({} >= {})",
                self.fade.overlay_fade_start, self.fade.overlay_fade_end
            )));
        }
        Ok(())
    }
}

/// Logical grid dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_rows")]
    pub rows: u32,
    /// Size of one cell in CSS pixels at scale 1.
    #[serde(default = "default_cell_px")]
    pub cell_px: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            columns: default_columns(),
            rows: default_rows(),
            cell_px: default_cell_px(),
        }
    }
}

fn default_columns() -> u32 {
    45
}

fn default_rows() -> u32 {
    54
}

fn default_cell_px() -> f64 {
    10.0
}

/// Tap, drag and zoom gesture constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureSettings {
    /// Displacement beyond which a press becomes a drag (CSS px).
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold_px: f64,
    /// Maximum time between two presses of a double-tap (microseconds).
    #[serde(default = "default_double_tap_window")]
    pub double_tap_window_us: u64,
    /// Maximum distance between two presses of a double-tap (CSS px).
    #[serde(default = "default_double_tap_distance")]
    pub double_tap_distance_px: f64,
    #[serde(default = "default_double_tap_zoom_factor")]
    pub double_tap_zoom_factor: f64,
    /// Scale multiplier per wheel step.
    #[serde(default = "default_wheel_zoom_factor")]
    pub wheel_zoom_factor: f64,
    /// Occupant hit-test radius in cells. Zero is an exact-cell match.
    #[serde(default)]
    pub hit_tolerance_cells: i32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        GestureSettings {
            drag_threshold_px: default_drag_threshold(),
            double_tap_window_us: default_double_tap_window(),
            double_tap_distance_px: default_double_tap_distance(),
            double_tap_zoom_factor: default_double_tap_zoom_factor(),
            wheel_zoom_factor: default_wheel_zoom_factor(),
            hit_tolerance_cells: 0,
        }
    }
}

fn default_drag_threshold() -> f64 {
    5.0
}

fn default_double_tap_window() -> u64 {
    300_000 // 300ms
}

fn default_double_tap_distance() -> f64 {
    50.0
}

fn default_double_tap_zoom_factor() -> f64 {
    2.0
}

fn default_wheel_zoom_factor() -> f64 {
    1.03
}

/// Viewport transition durations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSettings {
    /// Double-tap / double-click zoom.
    #[serde(default = "default_zoom_duration")]
    pub zoom_duration_us: u64,
    /// Zoom from the current scale to max scale onto a tapped occupant.
    #[serde(default = "default_occupant_zoom_duration")]
    pub occupant_zoom_duration_us: u64,
    /// Re-centering on an occupant when already at max scale.
    #[serde(default = "default_recenter_duration")]
    pub recenter_duration_us: u64,
    #[serde(default)]
    pub easing: EasingType,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        AnimationSettings {
            zoom_duration_us: default_zoom_duration(),
            occupant_zoom_duration_us: default_occupant_zoom_duration(),
            recenter_duration_us: default_recenter_duration(),
            easing: EasingType::default(),
        }
    }
}

fn default_zoom_duration() -> u64 {
    300_000
}

fn default_occupant_zoom_duration() -> u64 {
    500_000
}

fn default_recenter_duration() -> u64 {
    300_000
}

/// Occupant fade-in and image overlay cross-fade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadeSettings {
    #[serde(default = "default_fade_duration")]
    pub fade_duration_us: u64,
    /// Upper bound of the random per-occupant start delay on first load.
    #[serde(default = "default_max_stagger")]
    pub max_stagger_us: u64,
    /// Overlay alpha is 0 at `min_scale * overlay_fade_start`...
    #[serde(default = "default_overlay_fade_start")]
    pub overlay_fade_start: f64,
    /// ...and 1 at `min_scale * overlay_fade_end`.
    #[serde(default = "default_overlay_fade_end")]
    pub overlay_fade_end: f64,
}

impl Default for FadeSettings {
    fn default() -> Self {
        FadeSettings {
            fade_duration_us: default_fade_duration(),
            max_stagger_us: default_max_stagger(),
            overlay_fade_start: default_overlay_fade_start(),
            overlay_fade_end: default_overlay_fade_end(),
        }
    }
}

fn default_fade_duration() -> u64 {
    300_000
}

fn default_max_stagger() -> u64 {
    1_000_000
}

fn default_overlay_fade_start() -> f64 {
    3.0
}

fn default_overlay_fade_end() -> f64 {
    5.0
}

/// Colors used by the renderer. Any CSS color string is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSettings {
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_grid_line")]
    pub grid_line: String,
    /// Cell code to fill color.
    #[serde(default = "default_palette")]
    pub palette: BTreeMap<char, String>,
    /// Color for codes missing from the palette and for malformed occupant colors.
    #[serde(default = "default_fallback_cell")]
    pub fallback_cell: String,
    /// Codes left unpainted so the background shows through.
    #[serde(default = "default_transparent_codes")]
    pub transparent_codes: Vec<char>,
    #[serde(default = "default_white")]
    pub selected_fill: String,
    #[serde(default = "default_white")]
    pub hover_stroke: String,
    #[serde(default = "default_hover_fill")]
    pub hover_fill: String,
    #[serde(default = "default_white")]
    pub label_color: String,
    #[serde(default = "default_label_font_family")]
    pub label_font_family: String,
}

impl Default for StyleSettings {
    fn default() -> Self {
        StyleSettings {
            background: default_background(),
            grid_line: default_grid_line(),
            palette: default_palette(),
            fallback_cell: default_fallback_cell(),
            transparent_codes: default_transparent_codes(),
            selected_fill: default_white(),
            hover_stroke: default_white(),
            hover_fill: default_hover_fill(),
            label_color: default_white(),
            label_font_family: default_label_font_family(),
        }
    }
}

fn default_background() -> String {
    "#1E1E1E".to_string()
}

fn default_grid_line() -> String {
    "rgba(255, 255, 255, 0.15)".to_string()
}

fn default_palette() -> BTreeMap<char, String> {
    BTreeMap::from([
        ('w', "#1E1E1E".to_string()), // water
        ('m', "#0A0A0A".to_string()), // Manhattan
        ('x', "#0A0A0A".to_string()), // Bronx
        ('b', "#0A0A0A".to_string()), // Brooklyn + Queens
    ])
}

fn default_fallback_cell() -> String {
    "#0A0A0A".to_string()
}

fn default_transparent_codes() -> Vec<char> {
    vec!['w']
}

fn default_white() -> String {
    "#ffffff".to_string()
}

fn default_hover_fill() -> String {
    "rgba(255, 255, 255, 0.15)".to_string()
}

fn default_label_font_family() -> String {
    "Tiny5, -apple-system, BlinkMacSystemFont, sans-serif".to_string()
}

/// Static map label anchored in grid space (cell units, fractional allowed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

fn default_labels() -> Vec<LabelSpec> {
    [
        ("MANHATTAN", 8.15, 24.0),
        ("THE BRONX", 17.0, 7.0),
        ("BROOKLYN", 27.0, 40.0),
        ("QUEENS", 31.0, 24.0),
    ]
    .into_iter()
    .map(|(text, x, y)| LabelSpec {
        text: text.to_string(),
        x,
        y,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config.grid.columns, 45);
        assert_eq!(config.grid.rows, 54);
        assert_eq!(config.gesture.double_tap_window_us, 300_000);
        assert_eq!(config.gesture.hit_tolerance_cells, 0);
        assert_eq!(config.labels.len(), 4);
        assert_eq!(config.style.palette.get(&'w').map(String::as_str), Some("#1E1E1E"));
    }

    #[test]
    fn partial_groups_keep_remaining_defaults() {
        let config =
            EngineConfig::from_json(r#"{"gesture":{"drag_threshold_px":8.0}}"#).unwrap();
        assert_eq!(config.gesture.drag_threshold_px, 8.0);
        assert_eq!(config.gesture.double_tap_distance_px, 50.0);
    }

    #[test]
    fn easing_defaults_to_ease_out_and_can_be_linear() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config.animation.easing, EasingType::EaseOut);
        let config = EngineConfig::from_json(r#"{"animation":{"easing":"Linear"}}"#).unwrap();
        assert_eq!(config.animation.easing, EasingType::Linear);
        assert_eq!(config.animation.zoom_duration_us, 300_000);
    }

    #[test]
    fn rejects_zero_sized_grid() {
        let err = EngineConfig::from_json(r#"{"grid":{"columns":0}}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_inverted_overlay_thresholds() {
        let err = EngineConfig::from_json(
            r#"{"fade":{"overlay_fade_start":5.0,"overlay_fade_end":3.0}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlay fade thresholds"));
    }

    #[test]
    fn palette_keys_are_single_characters() {
        let config =
            EngineConfig::from_json(r##"{"style":{"palette":{"p":"#00ff00"}}}"##).unwrap();
        assert_eq!(config.style.palette.get(&'p').map(String::as_str), Some("#00ff00"));
    }
}
