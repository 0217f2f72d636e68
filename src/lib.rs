// citymap_engine: Rust/WASM viewport & gesture engine for the city grid map.
// All viewport logic lives here; JS forwards DOM events and reacts to callbacks.

mod animator;
mod canvas;
mod color;
mod config;
mod controller;
mod error;
mod fade;
mod gesture;
mod grid;
mod image_cache;
mod render;
mod transform;
mod types;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use kurbo::{Point, Size};
use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlImageElement, MouseEvent, TouchEvent, TouchList, WheelEvent};

pub use animator::{AnimationRun, AnimationSample, Animator, Trajectory};
pub use color::soften_hex;
pub use config::{
    AnimationSettings, EngineConfig, FadeSettings, GestureSettings, GridSettings, LabelSpec,
    StyleSettings,
};
pub use controller::{Selection, ViewportController};
pub use error::EngineError;
pub use fade::PhotoFade;
pub use gesture::{GestureClassifier, GestureIntent, GesturePhase, TapTarget};
pub use grid::GridDataset;
pub use image_cache::{ImageCache, ImageEntry};
pub use render::{DrawCommand, Frame, Renderer, Scene};
pub use transform::{CellRange, GridGeometry, ScaleBounds, ViewportState};
pub use types::*;

use canvas::CanvasSurface;

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    #[cfg(target_arch = "wasm32")]
    console_log::init_with_level(log::Level::Info).ok();
}

/// Parse an occupant list from JSON.
pub fn parse_occupants(json: &str) -> Result<Vec<Occupant>, EngineError> {
    serde_json::from_str(json).map_err(|e| EngineError::InvalidOccupants(e.to_string()))
}

fn now() -> Timestamp {
    web_sys::window()
        .and_then(|window| window.performance())
        .map(|performance| Timestamp::from_millis_f64(performance.now()))
        .unwrap_or_default()
}

#[derive(Clone, Default)]
struct Callbacks {
    cell_chosen: Option<js_sys::Function>,
    reveal_detail: Option<js_sys::Function>,
    dismiss_detail: Option<js_sys::Function>,
    cursor_hint: Option<js_sys::Function>,
}

fn report(name: &str, result: Result<JsValue, JsValue>) {
    if let Err(e) = result {
        log::warn!("{name} callback failed: {e:?}");
    }
}

impl Callbacks {
    fn dispatch(&self, inner: &Weak<RefCell<EngineInner>>, event: EngineEvent) {
        match event {
            EngineEvent::CellChosen { cell } => {
                if let Some(f) = &self.cell_chosen {
                    report(
                        "cell_chosen",
                        f.call2(&JsValue::NULL, &cell.x.into(), &cell.y.into()),
                    );
                }
            }
            EngineEvent::RevealDetail {
                cell,
                high_res_url,
                generation,
            } => {
                if let Some(f) = &self.reveal_detail {
                    reveal_when_loaded(inner.clone(), f.clone(), cell, high_res_url, generation);
                }
            }
            EngineEvent::DismissDetail => {
                if let Some(f) = &self.dismiss_detail {
                    report("dismiss_detail", f.call0(&JsValue::NULL));
                }
            }
            EngineEvent::CursorChanged { hint } => {
                if let Some(f) = &self.cursor_hint {
                    report(
                        "cursor_hint",
                        f.call1(&JsValue::NULL, &JsValue::from_str(hint.css())),
                    );
                }
            }
        }
    }
}

/// Invoke the reveal callback once the high-resolution image has loaded, unless
/// the detail was dismissed in the meantime.
fn reveal_when_loaded(
    inner: Weak<RefCell<EngineInner>>,
    callback: js_sys::Function,
    cell: CellCoord,
    url: Option<String>,
    generation: u64,
) {
    let Some(url) = url else {
        report(
            "reveal_detail",
            callback.call3(&JsValue::NULL, &cell.x.into(), &cell.y.into(), &JsValue::NULL),
        );
        return;
    };
    let image = match HtmlImageElement::new() {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Failed to create image element: {e:?}");
            return;
        }
    };
    let loaded_url = url.clone();
    let onload = Closure::once_into_js(move || {
        let current = match inner.upgrade() {
            Some(inner) => {
                let state = inner.borrow();
                state.controller.reveal_is_current(generation)
            }
            None => false,
        };
        if !current {
            log::debug!("Dropped stale detail reveal for ({}, {})", cell.x, cell.y);
            return;
        }
        report(
            "reveal_detail",
            callback.call3(
                &JsValue::NULL,
                &cell.x.into(),
                &cell.y.into(),
                &JsValue::from_str(&loaded_url),
            ),
        );
    });
    let failed_url = url.clone();
    let onerror = Closure::once_into_js(move || {
        log::warn!("Failed to load high-res image: {failed_url}");
    });
    image.set_onload(Some(onload.unchecked_ref()));
    image.set_onerror(Some(onerror.unchecked_ref()));
    image.set_src(&url);
}

struct EngineInner {
    controller: ViewportController,
    renderer: Renderer,
    grid: GridDataset,
    surface: CanvasSurface,
    images: ImageCache<HtmlImageElement>,
    rng: StdRng,
    callbacks: Callbacks,
    frame_scheduled: bool,
}

impl EngineInner {
    /// Draw if anything changed. Returns image URLs not yet requested.
    fn redraw(&mut self, now: Timestamp) -> Vec<String> {
        let cursor = self.controller.cursor();
        self.surface.set_cursor(cursor);
        if !self.controller.take_dirty() {
            return Vec::new();
        }
        let frame = self
            .renderer
            .render(&self.controller.scene(now), &self.grid);
        if let Err(e) = self.surface.draw(&frame, &self.images) {
            log::warn!("Frame draw failed: {e}");
        }
        frame
            .image_requests
            .into_iter()
            .filter(|url| self.images.request(url))
            .collect()
    }
}

/// Redraw, notify the host and keep the frame loop alive while needed.
/// Host callbacks run after the state borrow is released so they may call
/// back into the engine.
fn pump(inner: &Rc<RefCell<EngineInner>>, now: Timestamp) {
    let (events, callbacks, fetches) = {
        let mut state = inner.borrow_mut();
        let fetches = state.redraw(now);
        (
            state.controller.drain_events(),
            state.callbacks.clone(),
            fetches,
        )
    };
    for url in fetches {
        load_image(Rc::downgrade(inner), url);
    }
    let weak = Rc::downgrade(inner);
    for event in events {
        callbacks.dispatch(&weak, event);
    }
    schedule_frame(inner, now);
}

fn schedule_frame(inner: &Rc<RefCell<EngineInner>>, now: Timestamp) {
    {
        let mut state = inner.borrow_mut();
        if state.frame_scheduled || !state.controller.needs_frame(now) {
            return;
        }
        state.frame_scheduled = true;
    }
    let weak = Rc::downgrade(inner);
    let callback = Closure::once_into_js(move |time: f64| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let now = Timestamp::from_millis_f64(time);
        {
            let mut state = inner.borrow_mut();
            state.frame_scheduled = false;
            state.controller.tick(now);
        }
        pump(&inner, now);
    });
    let requested = web_sys::window()
        .ok_or_else(|| JsValue::from_str("no window"))
        .and_then(|window| window.request_animation_frame(callback.unchecked_ref()));
    if let Err(e) = requested {
        log::warn!("requestAnimationFrame failed: {e:?}");
        inner.borrow_mut().frame_scheduled = false;
    }
}

/// Fetch an occupant image; completion or failure triggers one redraw.
fn load_image(inner: Weak<RefCell<EngineInner>>, url: String) {
    let image = match HtmlImageElement::new() {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Failed to create image element: {e:?}");
            if let Some(inner) = inner.upgrade() {
                inner.borrow_mut().images.fail(&url);
            }
            return;
        }
    };
    let on_done =
        |inner: Weak<RefCell<EngineInner>>, url: String, image: Option<HtmlImageElement>| {
            move || {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                {
                    let mut state = inner.borrow_mut();
                    match image {
                        Some(image) => state.images.complete(&url, image),
                        None => state.images.fail(&url),
                    }
                    state.controller.mark_dirty();
                }
                pump(&inner, now());
            }
        };
    let onload = Closure::once_into_js(on_done(inner.clone(), url.clone(), Some(image.clone())));
    let onerror = Closure::once_into_js(on_done(inner, url.clone(), None));
    image.set_onload(Some(onload.unchecked_ref()));
    image.set_onerror(Some(onerror.unchecked_ref()));
    image.set_src(&url);
}

/// Main engine interface exposed to JavaScript.
#[wasm_bindgen]
pub struct MapEngine {
    inner: Rc<RefCell<EngineInner>>,
}

#[wasm_bindgen]
impl MapEngine {
    /// Attach to a canvas. `config_json` may be `{}`; `grid_json` is the
    /// row-major cell-code dataset.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlCanvasElement,
        config_json: &str,
        grid_json: &str,
    ) -> Result<MapEngine, JsValue> {
        let config = EngineConfig::from_json(config_json)?;
        let geometry = GridGeometry::from(&config.grid);
        let grid = GridDataset::from_json(grid_json, &geometry)?;
        let surface = CanvasSurface::new(canvas)?;
        log::info!(
            "Map engine ready: {}x{} cells at {}px",
            grid.columns(),
            grid.rows(),
            geometry.cell_px
        );

        let mut controller = ViewportController::new(&config);
        controller.resize(surface.css_size());
        let inner = EngineInner {
            controller,
            renderer: Renderer::new(&config),
            grid,
            surface,
            images: ImageCache::new(),
            rng: StdRng::from_entropy(),
            callbacks: Callbacks::default(),
            frame_scheduled: false,
        };
        let engine = MapEngine {
            inner: Rc::new(RefCell::new(inner)),
        };
        engine.update(|_, _| {});
        Ok(engine)
    }

    /// First occupant load; occupants fade in with a staggered delay.
    pub fn load_occupants(&self, occupants_json: &str) -> Result<(), JsValue> {
        let occupants = parse_occupants(occupants_json)?;
        self.update(move |state, now| {
            let EngineInner {
                controller, rng, ..
            } = state;
            controller.load_occupants(occupants, now, rng);
        });
        Ok(())
    }

    /// Replace the occupant list after a placement; new occupants appear at
    /// full opacity.
    pub fn refresh(&self, occupants_json: &str) -> Result<(), JsValue> {
        let occupants = parse_occupants(occupants_json)?;
        self.update(move |state, _| state.controller.refresh(occupants));
        Ok(())
    }

    pub fn enter_selection_mode(&self) {
        self.update(|state, _| state.controller.enter_selection_mode());
    }

    pub fn exit_selection_mode(&self) {
        self.update(|state, _| state.controller.exit_selection_mode());
    }

    /// Resize to the given CSS size at `device_pixel_ratio`.
    pub fn resize(
        &self,
        css_width: f64,
        css_height: f64,
        device_pixel_ratio: f64,
    ) -> Result<(), JsValue> {
        let size = Size::new(css_width, css_height);
        self.inner
            .borrow_mut()
            .surface
            .resize(size, device_pixel_ratio)?;
        self.update(move |state, _| state.controller.resize(size));
        Ok(())
    }

    pub fn touch_start(&self, event: TouchEvent) {
        event.prevent_default();
        self.update(|state, now| {
            let touches = local_points(&state.surface, &event.touches());
            state.controller.touch_start(&touches, now);
        });
    }

    pub fn touch_move(&self, event: TouchEvent) {
        event.prevent_default();
        self.update(|state, now| {
            let touches = local_points(&state.surface, &event.touches());
            state.controller.touch_move(&touches, now);
        });
    }

    /// Handles both `touchend` and `touchcancel`.
    pub fn touch_end(&self, event: TouchEvent) {
        event.prevent_default();
        self.update(|state, now| {
            let remaining = local_points(&state.surface, &event.touches());
            let lifted = event.changed_touches().length() as usize;
            state.controller.touch_end(&remaining, lifted, now);
        });
    }

    pub fn mouse_down(&self, event: MouseEvent) {
        self.update(|state, now| {
            let point = mouse_point(&state.surface, &event);
            state.controller.mouse_down(point, now);
        });
    }

    pub fn mouse_move(&self, event: MouseEvent) {
        self.update(|state, now| {
            let point = mouse_point(&state.surface, &event);
            state.controller.mouse_move(point, event.buttons() != 0, now);
        });
    }

    pub fn mouse_up(&self, event: MouseEvent) {
        self.update(|state, now| {
            let point = mouse_point(&state.surface, &event);
            state.controller.mouse_up(point, now);
        });
    }

    pub fn mouse_enter(&self) {
        self.update(|state, _| state.controller.pointer_enter());
    }

    pub fn mouse_leave(&self) {
        self.update(|state, _| state.controller.pointer_leave());
    }

    pub fn double_click(&self, event: MouseEvent) {
        event.prevent_default();
        self.update(|state, now| {
            let point = mouse_point(&state.surface, &event);
            state.controller.double_click(point, now);
        });
    }

    pub fn wheel(&self, event: WheelEvent) {
        event.prevent_default();
        self.update(|state, now| {
            let point = mouse_point(&state.surface, &event);
            state.controller.wheel(point, event.delta_y(), now);
        });
    }

    /// `f(x, y)` when a cell is picked in selection mode.
    pub fn on_cell_chosen(&self, f: js_sys::Function) {
        self.inner.borrow_mut().callbacks.cell_chosen = Some(f);
    }

    /// `f(x, y, highResUrl)` once the zoom-to-occupant delay has elapsed and the
    /// high-resolution image has loaded.
    pub fn on_reveal_detail(&self, f: js_sys::Function) {
        self.inner.borrow_mut().callbacks.reveal_detail = Some(f);
    }

    /// `f()` when a new gesture starts.
    pub fn on_dismiss_detail(&self, f: js_sys::Function) {
        self.inner.borrow_mut().callbacks.dismiss_detail = Some(f);
    }

    /// `f(cssCursor)` when the suggested cursor changes.
    pub fn on_cursor_hint(&self, f: js_sys::Function) {
        self.inner.borrow_mut().callbacks.cursor_hint = Some(f);
    }

    /// Current `{ scale, offset_x, offset_y }` as JSON.
    pub fn viewport_json(&self) -> Result<String, JsValue> {
        let view = self.inner.borrow().controller.view();
        serde_json::to_string(&view).map_err(|e| EngineError::from(e).into())
    }

    /// Force a full redraw.
    pub fn render(&self) {
        self.update(|state, _| state.controller.mark_dirty());
    }
}

impl MapEngine {
    /// Mutate engine state, then redraw and notify in the same callback.
    fn update(&self, f: impl FnOnce(&mut EngineInner, Timestamp)) {
        let now = now();
        f(&mut self.inner.borrow_mut(), now);
        pump(&self.inner, now);
    }
}

fn local_points(surface: &CanvasSurface, touches: &TouchList) -> Vec<Point> {
    (0..touches.length())
        .filter_map(|index| touches.item(index))
        .map(|touch| surface.to_local(f64::from(touch.client_x()), f64::from(touch.client_y())))
        .collect()
}

fn mouse_point(surface: &CanvasSurface, event: &MouseEvent) -> Point {
    surface.to_local(f64::from(event.client_x()), f64::from(event.client_y()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupant_json_parses() {
        let json = r##"[{"imageX":1,"imageY":2,"color":"#abcdef","imageLowRes":"a.jpg"}]"##;
        let occupants = parse_occupants(json).unwrap();
        assert_eq!(occupants[0].cell(), CellCoord::new(1, 2));
        assert_eq!(occupants[0].low_res_image_ref.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn malformed_occupants_are_rejected() {
        let err = parse_occupants(r#"{"photos":[]}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOccupants(_)));
    }
}
