// Strong typing over raw numbers. Newtypes for timestamps and grid cells, plus the
// records exchanged with the host page.

use serde::{Deserialize, Serialize};

/// Timestamp in microseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1000))
    }

    /// Converts a host clock reading (`performance.now()`, rAF timestamp).
    /// Negative and non-finite readings map to zero.
    pub fn from_millis_f64(ms: f64) -> Self {
        if ms.is_finite() && ms > 0.0 {
            Timestamp((ms * 1000.0).round() as u64)
        } else {
            Timestamp(0)
        }
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_millis(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Microseconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn micros_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn add_micros(&self, us: u64) -> Self {
        Timestamp(self.0.saturating_add(us))
    }
}

/// Integer grid coordinate. Off-grid values are representable; range checks
/// happen against a `GridGeometry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        CellCoord { x, y }
    }
}

/// A user-submitted item bound to one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupant {
    #[serde(alias = "imageX")]
    pub cell_x: i32,
    #[serde(alias = "imageY")]
    pub cell_y: i32,
    /// `#rrggbb` display color.
    pub color: String,
    #[serde(default, alias = "imageLowRes")]
    pub low_res_image_ref: Option<String>,
    #[serde(default, alias = "imageHighRes")]
    pub high_res_image_ref: Option<String>,
}

impl Occupant {
    pub fn cell(&self) -> CellCoord {
        CellCoord::new(self.cell_x, self.cell_y)
    }
}

/// Easing function for viewport transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EasingType {
    Linear,
    /// Cubic ease-out, `1 - (1 - t)^3`.
    #[default]
    EaseOut,
}

impl EasingType {
    /// Map linear progress in `[0, 1]` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingType::Linear => t,
            EasingType::EaseOut => 1.0 - (1.0 - t).powi(3),
        }
    }
}

/// Cursor the host should show over the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CursorHint {
    #[default]
    Default,
    Grabbing,
    /// Pointer is over an occupant that a click would zoom to.
    ZoomIn,
    /// Selection mode: a click picks the cell.
    Pointer,
}

impl CursorHint {
    pub fn css(self) -> &'static str {
        match self {
            CursorHint::Default => "default",
            CursorHint::Grabbing => "grabbing",
            CursorHint::ZoomIn => "zoom-in",
            CursorHint::Pointer => "pointer",
        }
    }
}

/// Notifications for the host page, drained after each input or frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A cell was picked in selection mode.
    CellChosen { cell: CellCoord },
    /// The zoom-to-occupant delay elapsed; show the high-resolution image once it loads.
    /// `generation` goes stale on the next dismissal or mode switch.
    RevealDetail {
        cell: CellCoord,
        high_res_url: Option<String>,
        generation: u64,
    },
    /// A new gesture started; hide any open detail view.
    DismissDetail,
    CursorChanged { hint: CursorHint },
}

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
