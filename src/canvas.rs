// Canvas 2D backend. Executes a `Frame` display list; holds no viewport state.

use kurbo::{Point, Size};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::error::EngineError;
use crate::image_cache::ImageCache;
use crate::render::{DrawCommand, Frame};
use crate::types::CursorHint;

fn canvas_err(context: &str, err: wasm_bindgen::JsValue) -> EngineError {
    EngineError::Canvas(format!("{context}: {err:?}"))
}

pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    css_size: Size,
    pixel_ratio: f64,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, EngineError> {
        let ctx = canvas
            .get_context("2d")
            .map_err(|e| canvas_err("get_context", e))?
            .ok_or_else(|| EngineError::Canvas("2d context unavailable".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| EngineError::Canvas("unexpected context type".to_string()))?;
        let rect = canvas.get_bounding_client_rect();
        Ok(CanvasSurface {
            canvas,
            ctx,
            css_size: Size::new(rect.width(), rect.height()),
            pixel_ratio: 1.0,
        })
    }

    pub fn css_size(&self) -> Size {
        self.css_size
    }

    /// Size the backing store by the device pixel ratio and draw in CSS pixels.
    pub fn resize(&mut self, css_size: Size, pixel_ratio: f64) -> Result<(), EngineError> {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        self.css_size = css_size;
        self.pixel_ratio = pixel_ratio;
        self.canvas
            .set_width((css_size.width * pixel_ratio).round() as u32);
        self.canvas
            .set_height((css_size.height * pixel_ratio).round() as u32);
        let style = self.canvas.style();
        style
            .set_property("width", &format!("{}px", css_size.width))
            .map_err(|e| canvas_err("style width", e))?;
        style
            .set_property("height", &format!("{}px", css_size.height))
            .map_err(|e| canvas_err("style height", e))?;
        // Resizing resets the context state.
        self.ctx
            .set_transform(pixel_ratio, 0.0, 0.0, pixel_ratio, 0.0, 0.0)
            .map_err(|e| canvas_err("set_transform", e))?;
        self.ctx.set_image_smoothing_enabled(false);
        Ok(())
    }

    /// Client coordinates to surface-local CSS pixels.
    pub fn to_local(&self, client_x: f64, client_y: f64) -> Point {
        let rect = self.canvas.get_bounding_client_rect();
        Point::new(client_x - rect.left(), client_y - rect.top())
    }

    pub fn set_cursor(&self, hint: CursorHint) {
        if let Err(e) = self.canvas.style().set_property("cursor", hint.css()) {
            log::warn!("Failed to set cursor: {e:?}");
        }
    }

    pub fn draw(
        &self,
        frame: &Frame,
        images: &ImageCache<HtmlImageElement>,
    ) -> Result<(), EngineError> {
        let ctx = &self.ctx;
        let Size { width, height } = frame.surface;
        for command in &frame.commands {
            match command {
                DrawCommand::Background { color } => {
                    ctx.clear_rect(0.0, 0.0, width, height);
                    ctx.set_fill_style_str(color);
                    ctx.fill_rect(0.0, 0.0, width, height);
                }
                DrawCommand::GridLines {
                    xs,
                    ys,
                    color,
                    line_width,
                } => {
                    ctx.set_stroke_style_str(color);
                    ctx.set_line_width(*line_width);
                    ctx.begin_path();
                    for x in xs {
                        ctx.move_to(*x, 0.0);
                        ctx.line_to(*x, height);
                    }
                    for y in ys {
                        ctx.move_to(0.0, *y);
                        ctx.line_to(width, *y);
                    }
                    ctx.stroke();
                }
                DrawCommand::FillRect { rect, color, alpha } => {
                    ctx.set_global_alpha(*alpha);
                    ctx.set_fill_style_str(color);
                    ctx.fill_rect(rect.x0, rect.y0, rect.width(), rect.height());
                    ctx.set_global_alpha(1.0);
                }
                DrawCommand::StrokeRect {
                    rect,
                    color,
                    line_width,
                } => {
                    ctx.set_stroke_style_str(color);
                    ctx.set_line_width(*line_width);
                    ctx.stroke_rect(rect.x0, rect.y0, rect.width(), rect.height());
                }
                DrawCommand::Image { url, rect, alpha } => {
                    let Some(image) = images.get(url) else {
                        continue;
                    };
                    if !image.complete() || image.natural_width() == 0 {
                        continue;
                    }
                    ctx.set_global_alpha(*alpha);
                    let drawn = ctx.draw_image_with_html_image_element_and_dw_and_dh(
                        image,
                        rect.x0,
                        rect.y0,
                        rect.width(),
                        rect.height(),
                    );
                    ctx.set_global_alpha(1.0);
                    drawn.map_err(|e| canvas_err("draw_image", e))?;
                }
                DrawCommand::Text {
                    text,
                    position,
                    font,
                    color,
                } => {
                    ctx.set_font(font);
                    ctx.set_text_align("center");
                    ctx.set_text_baseline("middle");
                    ctx.set_fill_style_str(color);
                    ctx.fill_text(text, position.x, position.y)
                        .map_err(|e| canvas_err("fill_text", e))?;
                }
            }
        }
        Ok(())
    }
}
