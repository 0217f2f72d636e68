// Screen <-> grid coordinate math and clamping rules. Pure functions of the
// viewport state and surface size; no side effects.

use std::ops::Range;

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::GridSettings;
use crate::types::CellCoord;

/// Current zoom and pan: grid pixel `p` lands on screen at `offset + p * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl ViewportState {
    pub fn new(scale: f64, offset: Vec2) -> Self {
        ViewportState {
            scale,
            offset_x: offset.x,
            offset_y: offset.y,
        }
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.offset_x, self.offset_y)
    }

    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset_x = offset.x;
        self.offset_y = offset.y;
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        ViewportState {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Allowed zoom range for a given surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.min;
        }
        scale.clamp(self.min, self.max)
    }

    pub fn is_at_max(&self, scale: f64) -> bool {
        scale >= self.max - self.max * 1e-9
    }
}

/// Half-open range of cells intersecting the visible surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub columns: Range<i32>,
    pub rows: Range<i32>,
}

impl CellRange {
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.columns.contains(&cell.x) && self.rows.contains(&cell.y)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.rows
            .clone()
            .flat_map(move |y| self.columns.clone().map(move |x| CellCoord::new(x, y)))
    }
}

/// Fixed dimensions of the logical grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub columns: u32,
    pub rows: u32,
    pub cell_px: f64,
}

impl From<&GridSettings> for GridGeometry {
    fn from(settings: &GridSettings) -> Self {
        GridGeometry {
            columns: settings.columns,
            rows: settings.rows,
            cell_px: settings.cell_px,
        }
    }
}

impl GridGeometry {
    pub fn new(columns: u32, rows: u32, cell_px: f64) -> Self {
        GridGeometry {
            columns,
            rows,
            cell_px,
        }
    }

    /// Grid size in CSS pixels at scale 1.
    pub fn extent(&self) -> Size {
        Size::new(
            f64::from(self.columns) * self.cell_px,
            f64::from(self.rows) * self.cell_px,
        )
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as i64) < i64::from(self.columns)
            && (cell.y as i64) < i64::from(self.rows)
    }

    /// Cell under a screen point. The result may lie outside the grid, which
    /// callers treat as "no cell".
    pub fn screen_to_grid(&self, point: Point, view: &ViewportState) -> CellCoord {
        let tile = self.cell_px * view.scale;
        // `as` saturates, so degenerate tiles cannot wrap around.
        CellCoord::new(
            ((point.x - view.offset_x) / tile).floor() as i32,
            ((point.y - view.offset_y) / tile).floor() as i32,
        )
    }

    /// Like `screen_to_grid`, but `None` for points outside the grid.
    pub fn cell_at(&self, point: Point, view: &ViewportState) -> Option<CellCoord> {
        let cell = self.screen_to_grid(point, view);
        self.contains(cell).then_some(cell)
    }

    /// Screen position of a cell's top-left corner.
    pub fn grid_to_screen(&self, cell: CellCoord, view: &ViewportState) -> Point {
        let tile = self.cell_px * view.scale;
        Point::new(
            f64::from(cell.x) * tile + view.offset_x,
            f64::from(cell.y) * tile + view.offset_y,
        )
    }

    /// Screen point in continuous grid-pixel space (scale 1).
    pub fn screen_to_world(&self, point: Point, view: &ViewportState) -> Point {
        Point::new(
            (point.x - view.offset_x) / view.scale,
            (point.y - view.offset_y) / view.scale,
        )
    }

    /// Pixel-snapped screen rectangle of a cell: origin floored, size rounded up.
    pub fn cell_rect(&self, cell: CellCoord, view: &ViewportState) -> Rect {
        let origin = self.grid_to_screen(cell, view);
        let size = (self.cell_px * view.scale).ceil();
        Rect::from_origin_size((origin.x.floor(), origin.y.floor()), (size, size))
    }

    /// Clamp an offset so the scaled grid keeps covering the surface.
    ///
    /// Per axis: `min(0, max(offset, surface - extent * scale))`.
    pub fn clamp_offset(&self, offset: Vec2, scale: f64, surface: Size) -> Vec2 {
        let extent = self.extent();
        Vec2::new(
            clamp_axis(offset.x, surface.width - extent.width * scale),
            clamp_axis(offset.y, surface.height - extent.height * scale),
        )
    }

    /// `min`: the grid covers the whole surface. `max`: one cell fills the
    /// smaller surface dimension.
    pub fn scale_bounds(&self, surface: Size) -> ScaleBounds {
        let extent = self.extent();
        let min = (surface.width / extent.width).max(surface.height / extent.height);
        let max = surface.width.min(surface.height) / self.cell_px;
        let min = if min.is_finite() && min > 0.0 { min } else { 1.0 };
        let max = if max.is_finite() { max.max(min) } else { min };
        ScaleBounds { min, max }
    }

    /// Cells intersecting the surface rectangle `[0, w) x [0, h)`.
    pub fn visible_cells(&self, view: &ViewportState, surface: Size) -> CellRange {
        let tile = self.cell_px * view.scale;
        let axis = |offset: f64, span: f64, count: u32| {
            let count = i32::try_from(count).unwrap_or(i32::MAX);
            let start = ((-offset / tile).floor() as i32).clamp(0, count);
            let end = (((span - offset) / tile).ceil() as i32).min(count);
            start..end.max(start)
        };
        CellRange {
            columns: axis(view.offset_x, surface.width, self.columns),
            rows: axis(view.offset_y, surface.height, self.rows),
        }
    }

    /// Offset that keeps the grid point under `anchor` fixed when the scale
    /// changes from `view.scale` to `new_scale`. Not clamped.
    pub fn zoom_about(&self, anchor: Point, view: &ViewportState, new_scale: f64) -> Vec2 {
        let world = self.screen_to_world(anchor, view);
        anchor.to_vec2() - world.to_vec2() * new_scale
    }

    /// Offset that centers `cell` on the surface at `scale`. Not clamped.
    pub fn centering_offset(&self, cell: CellCoord, scale: f64, surface: Size) -> Vec2 {
        let tile = self.cell_px * scale;
        Vec2::new(
            surface.width / 2.0 - (f64::from(cell.x) + 0.5) * tile,
            surface.height / 2.0 - (f64::from(cell.y) + 0.5) * tile,
        )
    }
}

fn clamp_axis(offset: f64, lower: f64) -> f64 {
    if offset.is_nan() {
        return lower.min(0.0);
    }
    offset.max(lower).min(0.0)
}
