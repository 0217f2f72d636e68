// Frame composition. Turns a viewport scene into a display list of draw commands;
// the canvas backend executes it. Iteration is restricted to the visible cell range.

use std::collections::{HashMap, HashSet};

use kurbo::{Point, Rect, Size};

use crate::color;
use crate::config::{EngineConfig, LabelSpec, StyleSettings};
use crate::controller::Selection;
use crate::fade::PhotoFade;
use crate::grid::GridDataset;
use crate::transform::{CellRange, GridGeometry, ScaleBounds, ViewportState};
use crate::types::{CellCoord, Occupant, Timestamp};

const LABEL_BASE_PX: f64 = 20.0;
const LABEL_MAX_PX: f64 = 60.0;
const LABEL_SCALE_FACTOR: f64 = 0.5;
/// Labels are kept while their anchor is within this margin of the surface.
const LABEL_MARGIN: (f64, f64) = (100.0, 50.0);
const HOVER_LINE_WIDTH: f64 = 2.0;
const GRID_LINE_WIDTH: f64 = 1.0;

/// Everything needed to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub view: ViewportState,
    pub surface: Size,
    pub bounds: ScaleBounds,
    pub geometry: GridGeometry,
    /// `Some` in selection mode.
    pub selection: Option<Selection>,
    pub pointer_inside: bool,
    pub occupants: &'a [Occupant],
    pub fade: &'a PhotoFade,
    pub now: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Clear the surface and fill it with a solid color.
    Background { color: String },
    /// Crisp 1px lines spanning the surface at the given positions.
    GridLines {
        xs: Vec<f64>,
        ys: Vec<f64>,
        color: String,
        line_width: f64,
    },
    FillRect {
        rect: Rect,
        color: String,
        alpha: f64,
    },
    StrokeRect {
        rect: Rect,
        color: String,
        line_width: f64,
    },
    /// Drawn only if the image is already loaded.
    Image { url: String, rect: Rect, alpha: f64 },
    /// Centered text.
    Text {
        text: String,
        position: Point,
        font: String,
        color: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub surface: Size,
    pub commands: Vec<DrawCommand>,
    /// Image URLs this frame wants to draw.
    pub image_requests: Vec<String>,
}

#[derive(Debug)]
pub struct Renderer {
    style: StyleSettings,
    labels: Vec<LabelSpec>,
    overlay_fade_start: f64,
    overlay_fade_end: f64,
    /// Occupant hex color to softened CSS color.
    softened: HashMap<String, String>,
}

impl Renderer {
    pub fn new(config: &EngineConfig) -> Self {
        Renderer {
            style: config.style.clone(),
            labels: config.labels.clone(),
            overlay_fade_start: config.fade.overlay_fade_start,
            overlay_fade_end: config.fade.overlay_fade_end,
            softened: HashMap::new(),
        }
    }

    pub fn render(&mut self, scene: &Scene<'_>, grid: &GridDataset) -> Frame {
        let mut frame = Frame {
            surface: scene.surface,
            ..Frame::default()
        };
        let range = scene.geometry.visible_cells(&scene.view, scene.surface);

        frame.commands.push(DrawCommand::Background {
            color: self.style.background.clone(),
        });
        frame.commands.push(self.grid_lines(scene, &range));
        self.draw_cells(scene, grid, &range, &mut frame);

        match scene.selection {
            None => self.draw_occupants(scene, &range, &mut frame),
            Some(selection) => self.draw_selection(scene, selection, &mut frame),
        }

        self.draw_labels(scene, &mut frame);
        frame
    }

    /// Image overlay opacity: 0 at `min * start`, rising linearly to 1 at `min * end`.
    pub fn overlay_alpha(&self, scale: f64, min_scale: f64) -> f64 {
        let start = min_scale * self.overlay_fade_start;
        let end = min_scale * self.overlay_fade_end;
        if end <= start {
            return if scale >= end { 1.0 } else { 0.0 };
        }
        ((scale - start) / (end - start)).clamp(0.0, 1.0)
    }

    fn grid_lines(&self, scene: &Scene<'_>, range: &CellRange) -> DrawCommand {
        let tile = scene.geometry.cell_px * scene.view.scale;
        let line = |index: i32, offset: f64| (f64::from(index) * tile + offset).floor() + 0.5;
        DrawCommand::GridLines {
            xs: (range.columns.start..=range.columns.end)
                .map(|x| line(x, scene.view.offset_x))
                .collect(),
            ys: (range.rows.start..=range.rows.end)
                .map(|y| line(y, scene.view.offset_y))
                .collect(),
            color: self.style.grid_line.clone(),
            line_width: GRID_LINE_WIDTH,
        }
    }

    fn draw_cells(
        &self,
        scene: &Scene<'_>,
        grid: &GridDataset,
        range: &CellRange,
        frame: &mut Frame,
    ) {
        for cell in range.cells() {
            let Some(code) = grid.code_at(cell) else {
                continue;
            };
            if self.style.transparent_codes.contains(&code) {
                continue;
            }
            let color = self
                .style
                .palette
                .get(&code)
                .unwrap_or(&self.style.fallback_cell);
            frame.commands.push(DrawCommand::FillRect {
                rect: scene.geometry.cell_rect(cell, &scene.view),
                color: color.clone(),
                alpha: 1.0,
            });
        }
    }

    fn draw_occupants(&mut self, scene: &Scene<'_>, range: &CellRange, frame: &mut Frame) {
        let overlay = self.overlay_alpha(scene.view.scale, scene.bounds.min);
        let mut drawn: HashSet<CellCoord> = HashSet::new();
        for occupant in scene.occupants {
            let cell = occupant.cell();
            if !range.contains(cell) || !drawn.insert(cell) {
                continue;
            }
            let rect = scene.geometry.cell_rect(cell, &scene.view);
            let alpha = scene.fade.alpha(cell, scene.now);
            let color = self.softened_color(&occupant.color);
            frame.commands.push(DrawCommand::FillRect { rect, color, alpha });

            if overlay > 0.0 && alpha > 0.0 {
                if let Some(url) = &occupant.low_res_image_ref {
                    frame.image_requests.push(url.clone());
                    frame.commands.push(DrawCommand::Image {
                        url: url.clone(),
                        rect,
                        alpha: overlay * alpha,
                    });
                }
            }
        }
    }

    fn draw_selection(&self, scene: &Scene<'_>, selection: Selection, frame: &mut Frame) {
        if let Some(cell) = selection.selected {
            frame.commands.push(DrawCommand::FillRect {
                rect: scene.geometry.cell_rect(cell, &scene.view),
                color: self.style.selected_fill.clone(),
                alpha: 1.0,
            });
        }
        // Hover goes on top of the selected highlight.
        if let (Some(cell), true) = (selection.hovered, scene.pointer_inside) {
            let rect = scene.geometry.cell_rect(cell, &scene.view);
            frame.commands.push(DrawCommand::StrokeRect {
                rect: Rect::new(rect.x0 + 1.0, rect.y0 + 1.0, rect.x1 - 1.0, rect.y1 - 1.0),
                color: self.style.hover_stroke.clone(),
                line_width: HOVER_LINE_WIDTH,
            });
            frame.commands.push(DrawCommand::FillRect {
                rect,
                color: self.style.hover_fill.clone(),
                alpha: 1.0,
            });
        }
    }

    fn draw_labels(&self, scene: &Scene<'_>, frame: &mut Frame) {
        let font_px = label_font_px(scene.view.scale);
        let font = format!("400 {}px {}", font_px, self.style.label_font_family);
        let tile = scene.geometry.cell_px * scene.view.scale;
        for label in &self.labels {
            let position = Point::new(
                label.x * tile + scene.view.offset_x,
                label.y * tile + scene.view.offset_y,
            );
            let visible = position.x >= -LABEL_MARGIN.0
                && position.x <= scene.surface.width + LABEL_MARGIN.0
                && position.y >= -LABEL_MARGIN.1
                && position.y <= scene.surface.height + LABEL_MARGIN.1;
            if visible {
                frame.commands.push(DrawCommand::Text {
                    text: label.text.clone(),
                    position,
                    font: font.clone(),
                    color: self.style.label_color.clone(),
                });
            }
        }
    }

    fn softened_color(&mut self, hex: &str) -> String {
        if let Some(css) = self.softened.get(hex) {
            return css.clone();
        }
        let css = color::soften_hex(hex).unwrap_or_else(|| {
            log::debug!("Ignoring malformed occupant color {hex:?}");
            self.style.fallback_cell.clone()
        });
        self.softened.insert(hex.to_string(), css.clone());
        css
    }
}

/// Label font size for a scale: half the scale times the base size, within
/// `[20, 60]` px.
pub fn label_font_px(scale: f64) -> f64 {
    (LABEL_BASE_PX * scale * LABEL_SCALE_FACTOR).clamp(LABEL_BASE_PX, LABEL_MAX_PX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FadeSettings;
    use kurbo::Vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn city() -> GridGeometry {
        GridGeometry::new(45, 54, 10.0)
    }

    fn occupant(x: i32, y: i32, color: &str) -> Occupant {
        Occupant {
            cell_x: x,
            cell_y: y,
            color: color.to_string(),
            low_res_image_ref: Some(format!("low/{x}_{y}.jpg")),
            high_res_image_ref: None,
        }
    }

    fn scene<'a>(
        view: ViewportState,
        occupants: &'a [Occupant],
        fade: &'a PhotoFade,
        selection: Option<Selection>,
    ) -> Scene<'a> {
        let surface = Size::new(900.0, 900.0);
        Scene {
            view,
            surface,
            bounds: city().scale_bounds(surface),
            geometry: city(),
            selection,
            pointer_inside: true,
            occupants,
            fade,
            now: Timestamp::from_millis(0),
        }
    }

    fn fills(frame: &Frame) -> Vec<(&Rect, &str)> {
        frame
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillRect { rect, color, .. } => Some((rect, color.as_str())),
                _ => None,
            })
            .collect()
    }

    fn min_view() -> ViewportState {
        ViewportState::new(2.0, Vec2::new(0.0, -90.0))
    }

    #[test]
    fn draw_order_is_background_grid_cells_occupants_labels() {
        let grid = GridDataset::uniform(&city(), 'm');
        let fade = PhotoFade::new(&FadeSettings::default());
        let occupants = [occupant(3, 30, "#ff0000")];
        let mut renderer = Renderer::new(&EngineConfig::default());
        let frame = renderer.render(&scene(min_view(), &occupants, &fade, None), &grid);

        assert!(matches!(frame.commands[0], DrawCommand::Background { .. }));
        assert!(matches!(frame.commands[1], DrawCommand::GridLines { .. }));
        let last_fill = frame
            .commands
            .iter()
            .rposition(|c| matches!(c, DrawCommand::FillRect { .. }))
            .unwrap();
        assert!(matches!(frame.commands.last(), Some(DrawCommand::Text { .. })));
        assert_eq!(fills(&frame)[fills(&frame).len() - 1].1, "hsl(0, 80%, 55%)");
        assert!(last_fill < frame.commands.len() - 1);
    }

    #[test]
    fn only_visible_cells_are_drawn() {
        let grid = GridDataset::uniform(&city(), 'm');
        let fade = PhotoFade::new(&FadeSettings::default());
        let mut renderer = Renderer::new(&EngineConfig::default());
        let view = ViewportState::new(90.0, Vec2::new(-9000.0, -9000.0));
        let frame = renderer.render(&scene(view, &[], &fade, None), &grid);
        assert_eq!(fills(&frame).len(), 1);
        assert_eq!(fills(&frame)[0].0, &Rect::new(0.0, 0.0, 900.0, 900.0));
        match &frame.commands[1] {
            DrawCommand::GridLines { xs, ys, .. } => {
                assert_eq!(xs, &vec![0.5, 900.5]);
                assert_eq!(ys.len(), 2);
            }
            other => panic!("expected grid lines, got {other:?}"),
        }
    }

    #[test]
    fn transparent_codes_are_skipped_and_unknown_codes_use_fallback() {
        let grid = GridDataset::from_rows(
            (0..54)
                .map(|y| (0..45).map(|x| if (x + y) % 2 == 0 { 'w' } else { 'q' }).collect())
                .collect(),
            &city(),
        )
        .unwrap();
        let fade = PhotoFade::new(&FadeSettings::default());
        let mut renderer = Renderer::new(&EngineConfig::default());
        let view = ViewportState::new(90.0, Vec2::new(-9000.0, -9000.0));
        // Cell (10, 10) is water.
        let frame = renderer.render(&scene(view, &[], &fade, None), &grid);
        assert!(fills(&frame).is_empty());
        let view = ViewportState::new(90.0, Vec2::new(-9900.0, -9000.0));
        let frame = renderer.render(&scene(view, &[], &fade, None), &grid);
        assert_eq!(fills(&frame)[0].1, "#0A0A0A");
    }

    #[test]
    fn selection_mode_hides_occupants_and_highlights_cells() {
        let grid = GridDataset::uniform(&city(), 'w');
        let fade = PhotoFade::new(&FadeSettings::default());
        let occupants = [occupant(1, 10, "#00ff00")];
        let selection = Selection {
            hovered: Some(CellCoord::new(2, 10)),
            selected: Some(CellCoord::new(1, 10)),
        };
        let mut renderer = Renderer::new(&EngineConfig::default());
        let frame = renderer.render(&scene(min_view(), &occupants, &fade, Some(selection)), &grid);

        let colors: Vec<&str> = fills(&frame).iter().map(|(_, c)| *c).collect();
        assert_eq!(colors, vec!["#ffffff", "rgba(255, 255, 255, 0.15)"]);
        assert!(frame.image_requests.is_empty());
        let stroke = frame
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::StrokeRect { .. }))
            .unwrap();
        let selected = frame
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::FillRect { color, .. } if color == "#ffffff"))
            .unwrap();
        assert!(stroke > selected);
    }

    #[test]
    fn hover_needs_pointer_inside() {
        let grid = GridDataset::uniform(&city(), 'w');
        let fade = PhotoFade::new(&FadeSettings::default());
        let selection = Selection {
            hovered: Some(CellCoord::new(2, 10)),
            selected: None,
        };
        let mut renderer = Renderer::new(&EngineConfig::default());
        let mut outside = scene(min_view(), &[], &fade, Some(selection));
        outside.pointer_inside = false;
        let frame = renderer.render(&outside, &grid);
        assert!(fills(&frame).is_empty());
    }

    #[test]
    fn overlay_ramps_between_thresholds() {
        let renderer = Renderer::new(&EngineConfig::default());
        assert_eq!(renderer.overlay_alpha(6.0, 2.0), 0.0);
        assert_eq!(renderer.overlay_alpha(8.0, 2.0), 0.5);
        assert_eq!(renderer.overlay_alpha(10.0, 2.0), 1.0);
        assert_eq!(renderer.overlay_alpha(90.0, 2.0), 1.0);
    }

    #[test]
    fn overlay_alpha_multiplies_fade_alpha() {
        let grid = GridDataset::uniform(&city(), 'w');
        let mut fade = PhotoFade::new(&FadeSettings {
            max_stagger_us: 0,
            ..FadeSettings::default()
        });
        let occupants = [occupant(10, 10, "#ff0000")];
        fade.seed_initial(
            [CellCoord::new(10, 10)],
            Timestamp::from_millis(0),
            &mut StdRng::seed_from_u64(1),
        );
        let mut renderer = Renderer::new(&EngineConfig::default());
        // Scale 8 on a min-scale-2 surface: overlay alpha 0.5.
        let view = ViewportState::new(8.0, Vec2::new(-500.0, -500.0));
        let mut at_half_fade = scene(view, &occupants, &fade, None);
        at_half_fade.now = Timestamp::from_millis(150);
        let frame = renderer.render(&at_half_fade, &grid);
        let image_alpha = frame
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Image { alpha, .. } => Some(*alpha),
                _ => None,
            })
            .unwrap();
        assert!((image_alpha - 0.5 * 0.875).abs() < 1e-12);
        assert_eq!(frame.image_requests, vec!["low/10_10.jpg".to_string()]);
    }

    #[test]
    fn no_overlay_at_min_zoom() {
        let grid = GridDataset::uniform(&city(), 'w');
        let fade = PhotoFade::new(&FadeSettings::default());
        let occupants = [occupant(10, 10, "#ff0000")];
        let mut renderer = Renderer::new(&EngineConfig::default());
        let frame = renderer.render(&scene(min_view(), &occupants, &fade, None), &grid);
        assert!(frame.image_requests.is_empty());
    }

    #[test]
    fn duplicate_occupants_draw_once() {
        let grid = GridDataset::uniform(&city(), 'w');
        let fade = PhotoFade::new(&FadeSettings::default());
        let occupants = [occupant(4, 10, "#ff0000"), occupant(4, 10, "#0000ff")];
        let mut renderer = Renderer::new(&EngineConfig::default());
        let frame = renderer.render(&scene(min_view(), &occupants, &fade, None), &grid);
        assert_eq!(fills(&frame).len(), 1);
        assert_eq!(fills(&frame)[0].1, "hsl(0, 80%, 55%)");
    }

    #[test]
    fn malformed_occupant_color_uses_fallback() {
        let grid = GridDataset::uniform(&city(), 'w');
        let fade = PhotoFade::new(&FadeSettings::default());
        let occupants = [occupant(4, 10, "chartreuse")];
        let mut renderer = Renderer::new(&EngineConfig::default());
        let frame = renderer.render(&scene(min_view(), &occupants, &fade, None), &grid);
        assert_eq!(fills(&frame)[0].1, "#0A0A0A");
    }

    #[test]
    fn label_font_is_bounded() {
        assert_eq!(label_font_px(1.0), 20.0);
        assert_eq!(label_font_px(4.0), 40.0);
        assert_eq!(label_font_px(90.0), 60.0);
    }

    #[test]
    fn offscreen_labels_are_culled() {
        let grid = GridDataset::uniform(&city(), 'w');
        let fade = PhotoFade::new(&FadeSettings::default());
        let mut renderer = Renderer::new(&EngineConfig::default());
        let frame = renderer.render(&scene(min_view(), &[], &fade, None), &grid);
        let labels = |frame: &Frame| {
            frame
                .commands
                .iter()
                .filter(|c| matches!(c, DrawCommand::Text { .. }))
                .count()
        };
        assert_eq!(labels(&frame), 4);
        let view = ViewportState::new(90.0, Vec2::new(-9000.0, -9000.0));
        let frame = renderer.render(&scene(view, &[], &fade, None), &grid);
        assert_eq!(labels(&frame), 0);
    }
}
