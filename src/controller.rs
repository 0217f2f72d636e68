// Authoritative viewport state. Owns scale/offset, routes gesture intents, drives the
// animator and the detail-reveal timer, and queues host notifications.
//
// Every method takes the current time explicitly; nothing here reads a clock.

use kurbo::{Point, Size, Vec2};
use rand::Rng;

use crate::animator::{Animator, Trajectory};
use crate::config::{AnimationSettings, EngineConfig, GestureSettings};
use crate::fade::PhotoFade;
use crate::gesture::{GestureClassifier, GestureIntent, GesturePhase, TapTarget};
use crate::render::Scene;
use crate::transform::{GridGeometry, ScaleBounds, ViewportState};
use crate::types::{CellCoord, CursorHint, EngineEvent, Occupant, Timestamp};

/// Below this distance from 1 the zoom ratio has no usable fixed point.
const MIN_ZOOM_RATIO_GAP: f64 = 1e-6;

/// Cell-picking sub-state used while placing a new occupant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub hovered: Option<CellCoord>,
    pub selected: Option<CellCoord>,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingReveal {
    due: Timestamp,
    cell: CellCoord,
    high_res_url: Option<String>,
}

#[derive(Debug)]
pub struct ViewportController {
    geometry: GridGeometry,
    gesture_settings: GestureSettings,
    animation: AnimationSettings,
    surface: Size,
    bounds: ScaleBounds,
    view: ViewportState,
    placed: bool,
    gestures: GestureClassifier,
    animator: Animator,
    occupants: Vec<Occupant>,
    fade: PhotoFade,
    fade_seeded: bool,
    selection: Option<Selection>,
    pointer_inside: bool,
    pending_reveal: Option<PendingReveal>,
    reveal_generation: u64,
    cursor: CursorHint,
    events: Vec<EngineEvent>,
    dirty: bool,
}

impl ViewportController {
    pub fn new(config: &EngineConfig) -> Self {
        let geometry = GridGeometry::from(&config.grid);
        let surface = Size::ZERO;
        ViewportController {
            geometry,
            gesture_settings: config.gesture.clone(),
            animation: config.animation.clone(),
            surface,
            bounds: geometry.scale_bounds(surface),
            view: ViewportState::default(),
            placed: false,
            gestures: GestureClassifier::new(config.gesture.clone()),
            animator: Animator::new(),
            occupants: Vec::new(),
            fade: PhotoFade::new(&config.fade),
            fade_seeded: false,
            selection: None,
            pointer_inside: false,
            pending_reveal: None,
            reveal_generation: 0,
            cursor: CursorHint::Default,
            events: Vec::new(),
            dirty: true,
        }
    }

    pub fn view(&self) -> ViewportState {
        self.view
    }

    pub fn surface(&self) -> Size {
        self.surface
    }

    pub fn bounds(&self) -> ScaleBounds {
        self.bounds
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    /// `Some` while selection mode is active.
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_active()
    }

    pub fn gesture_phase(&self) -> GesturePhase {
        self.gestures.phase()
    }

    pub fn cursor(&self) -> CursorHint {
        self.cursor
    }

    // --- Viewport operations ---

    /// Recompute scale bounds for a new surface size. The first sizing places
    /// the grid at minimum scale, centered vertically.
    pub fn resize(&mut self, surface: Size) {
        self.surface = surface;
        self.bounds = self.geometry.scale_bounds(surface);
        if !self.placed && !surface.is_zero_area() {
            self.placed = true;
            let scale = self.bounds.min;
            let extent = self.geometry.extent();
            let offset = Vec2::new(0.0, (surface.height - extent.height * scale) / 2.0);
            self.view = ViewportState::new(scale, offset);
            log::info!(
                "Surface {}x{}: scale range {:.3}..{:.3}",
                surface.width,
                surface.height,
                self.bounds.min,
                self.bounds.max
            );
        } else {
            self.view.scale = self.bounds.clamp(self.view.scale);
        }
        self.reclamp();
        self.dirty = true;
    }

    /// Immediate pan by a screen-space delta, clamped.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.cancel_animation();
        self.view.set_offset(self.view.offset() + delta);
        self.reclamp();
        self.dirty = true;
    }

    /// Immediate zoom keeping the grid point under `anchor` fixed.
    pub fn zoom_to(&mut self, anchor: Point, target_scale: f64) {
        self.cancel_animation();
        let scale = self.bounds.clamp(target_scale);
        let offset = self.geometry.zoom_about(anchor, &self.view, scale);
        self.view = ViewportState::new(scale, offset);
        self.reclamp();
        self.dirty = true;
    }

    /// Animated zoom about `anchor`; the anchor's grid point is tracked at every
    /// intermediate scale.
    pub fn animate_zoom_to(
        &mut self,
        anchor: Point,
        target_scale: f64,
        duration_us: u64,
        now: Timestamp,
    ) {
        let to_scale = self.bounds.clamp(target_scale);
        let world = self.geometry.screen_to_world(anchor, &self.view);
        self.animator.start(
            now,
            duration_us,
            self.animation.easing,
            Trajectory::ZoomAbout {
                anchor,
                world,
                from_scale: self.view.scale,
                to_scale,
            },
        );
        self.dirty = true;
    }

    /// Zoom to max scale centered on `cell`, or re-center if already there, then
    /// schedule the detail reveal for when the transition's duration elapses.
    /// Returns the transition duration.
    pub fn zoom_to_occupant(&mut self, cell: CellCoord, now: Timestamp) -> u64 {
        let max = self.bounds.max;
        let target = self.geometry.centering_offset(cell, max, self.surface);
        let ratio = max / self.view.scale;
        let rescale = !self.bounds.is_at_max(self.view.scale)
            && (1.0 - ratio).abs() > MIN_ZOOM_RATIO_GAP;

        let (duration_us, trajectory) = if rescale {
            // Screen point that stays fixed while zooming from the current view
            // onto `target`.
            let offset = self.view.offset();
            let anchor = ((target - offset * ratio) / (1.0 - ratio)).to_point();
            let world = self.geometry.screen_to_world(anchor, &self.view);
            (
                self.animation.occupant_zoom_duration_us,
                Trajectory::ZoomAbout {
                    anchor,
                    world,
                    from_scale: self.view.scale,
                    to_scale: max,
                },
            )
        } else {
            (
                self.animation.recenter_duration_us,
                Trajectory::Offset {
                    scale: max,
                    from: self.view.offset(),
                    to: target,
                },
            )
        };
        self.animator
            .start(now, duration_us, self.animation.easing, trajectory);

        let high_res_url = self
            .occupant_at_cell(cell)
            .and_then(|occupant| occupant.high_res_image_ref.clone());
        self.pending_reveal = Some(PendingReveal {
            due: now.add_micros(duration_us),
            cell,
            high_res_url,
        });
        self.dirty = true;
        duration_us
    }

    pub fn enter_selection_mode(&mut self) {
        self.set_selection_mode(true);
    }

    pub fn exit_selection_mode(&mut self) {
        self.set_selection_mode(false);
    }

    fn set_selection_mode(&mut self, active: bool) {
        self.selection = active.then(Selection::default);
        self.reveal_generation += 1;
        if self.pending_reveal.take().is_some() {
            log::debug!("Pending detail reveal cancelled by mode switch");
        }
        self.gestures.cancel_pending_tap();
        self.update_cursor(None);
        self.dirty = true;
    }

    /// Apply one classified intent.
    pub fn handle_intent(&mut self, intent: GestureIntent, now: Timestamp) {
        match intent {
            GestureIntent::Pan { delta } => self.pan_by(delta),
            GestureIntent::ZoomTo { anchor, scale } => self.zoom_to(anchor, scale),
            GestureIntent::WheelZoom { anchor, factor } => {
                self.zoom_to(anchor, self.view.scale * factor)
            }
            GestureIntent::DoubleTapZoom { anchor } => {
                let occupant = match self.selection {
                    None => self.hit_test(anchor).map(Occupant::cell),
                    Some(_) => None,
                };
                match occupant {
                    Some(cell) => {
                        self.zoom_to_occupant(cell, now);
                    }
                    None => {
                        let target = self.view.scale * self.gesture_settings.double_tap_zoom_factor;
                        self.animate_zoom_to(anchor, target, self.animation.zoom_duration_us, now);
                    }
                }
            }
            GestureIntent::TapAt { target, .. } => match (target, self.selection.as_mut()) {
                (TapTarget::Occupant(cell), None) => {
                    self.zoom_to_occupant(cell, now);
                }
                (TapTarget::Cell(cell), Some(selection)) => {
                    selection.selected = Some(cell);
                    self.events.push(EngineEvent::CellChosen { cell });
                    self.dirty = true;
                }
                // The mode changed since the press.
                _ => {}
            },
            GestureIntent::DragThresholdExceeded => {}
        }
    }

    /// First occupant within the hit tolerance of the cell under `point`.
    /// Cells are scanned column by column.
    pub fn hit_test(&self, point: Point) -> Option<&Occupant> {
        let center = self.geometry.screen_to_grid(point, &self.view);
        let tolerance = self.gesture_settings.hit_tolerance_cells;
        for dx in -tolerance..=tolerance {
            for dy in -tolerance..=tolerance {
                let cell = CellCoord::new(center.x.saturating_add(dx), center.y.saturating_add(dy));
                if let Some(occupant) = self.occupant_at_cell(cell) {
                    return Some(occupant);
                }
            }
        }
        None
    }

    fn occupant_at_cell(&self, cell: CellCoord) -> Option<&Occupant> {
        self.occupants.iter().find(|occupant| occupant.cell() == cell)
    }

    fn tap_candidate(&self, point: Point) -> Option<TapTarget> {
        match self.selection {
            Some(_) => self.geometry.cell_at(point, &self.view).map(TapTarget::Cell),
            None => self
                .hit_test(point)
                .map(|occupant| TapTarget::Occupant(occupant.cell())),
        }
    }

    // --- Occupants ---

    /// Replace the occupant list. The first load staggers a fade-in across all
    /// occupants; later loads behave like `refresh`.
    pub fn load_occupants<R: Rng + ?Sized>(
        &mut self,
        occupants: Vec<Occupant>,
        now: Timestamp,
        rng: &mut R,
    ) {
        if self.fade_seeded {
            self.refresh(occupants);
            return;
        }
        self.fade_seeded = true;
        self.fade
            .seed_initial(occupants.iter().map(Occupant::cell), now, rng);
        log::info!("Loaded {} occupants", occupants.len());
        self.occupants = occupants;
        self.dirty = true;
    }

    /// Replace the occupant list; newly appeared occupants show at full opacity.
    pub fn refresh(&mut self, occupants: Vec<Occupant>) {
        self.fade.refresh(occupants.iter().map(Occupant::cell));
        log::info!("Refreshed occupants: {}", occupants.len());
        self.occupants = occupants;
        self.dirty = true;
    }

    /// Whether a reveal emitted with `generation` may still be shown.
    pub fn reveal_is_current(&self, generation: u64) -> bool {
        generation == self.reveal_generation
    }

    fn dismiss_detail(&mut self) {
        self.reveal_generation += 1;
        self.events.push(EngineEvent::DismissDetail);
    }

    // --- Input entry points ---

    pub fn touch_start(&mut self, touches: &[Point], now: Timestamp) {
        if self.gestures.phase() == GesturePhase::Idle {
            self.dismiss_detail();
        }
        let candidate = match touches {
            [point] => self.tap_candidate(*point),
            _ => None,
        };
        let intents = self
            .gestures
            .touch_start(touches, now, self.view.scale, candidate);
        self.apply(intents, now);
    }

    pub fn touch_move(&mut self, touches: &[Point], now: Timestamp) {
        let intents = self.gestures.touch_move(touches);
        self.apply(intents, now);
    }

    pub fn touch_end(&mut self, remaining: &[Point], lifted: usize, now: Timestamp) {
        let intents = self.gestures.touch_end(remaining, lifted, now);
        self.apply(intents, now);
    }

    pub fn mouse_down(&mut self, point: Point, now: Timestamp) {
        self.dismiss_detail();
        let candidate = self.tap_candidate(point);
        self.gestures.mouse_down(point, now, candidate);
        self.update_cursor(Some(point));
    }

    pub fn mouse_move(&mut self, point: Point, button_held: bool, now: Timestamp) {
        let intents = self.gestures.mouse_move(point, button_held);
        self.apply(intents, now);
        self.hover(point);
    }

    pub fn mouse_up(&mut self, point: Point, now: Timestamp) {
        let intents = self.gestures.mouse_up(point, now);
        self.apply(intents, now);
        self.update_cursor(Some(point));
    }

    pub fn double_click(&mut self, point: Point, now: Timestamp) {
        self.dismiss_detail();
        let intents = self.gestures.double_click(point);
        self.apply(intents, now);
    }

    pub fn wheel(&mut self, point: Point, delta_y: f64, now: Timestamp) {
        self.dismiss_detail();
        let intents = self.gestures.wheel(point, delta_y);
        self.apply(intents, now);
        self.hover(point);
    }

    pub fn pointer_enter(&mut self) {
        self.pointer_inside = true;
        self.dirty = true;
    }

    /// Leaving the surface ends any mouse drag and hides the hover highlight.
    pub fn pointer_leave(&mut self) {
        self.pointer_inside = false;
        self.gestures.mouse_leave();
        self.update_cursor(None);
        self.dirty = true;
    }

    fn apply(&mut self, intents: Vec<GestureIntent>, now: Timestamp) {
        for intent in intents {
            self.handle_intent(intent, now);
        }
    }

    fn hover(&mut self, point: Point) {
        let cell = self.geometry.cell_at(point, &self.view);
        if let Some(selection) = self.selection.as_mut() {
            if selection.hovered != cell {
                selection.hovered = cell;
                self.dirty = true;
            }
        }
        self.update_cursor(Some(point));
    }

    fn update_cursor(&mut self, point: Option<Point>) {
        let hint = if self.gestures.mouse_pressed() {
            CursorHint::Grabbing
        } else if self.selection.is_some() {
            CursorHint::Pointer
        } else if point.and_then(|p| self.hit_test(p)).is_some() {
            CursorHint::ZoomIn
        } else {
            CursorHint::Default
        };
        if hint != self.cursor {
            self.cursor = hint;
            self.events.push(EngineEvent::CursorChanged { hint });
        }
    }

    // --- Frame loop ---

    /// Advance time-driven state: commit due taps, step the animation, retire
    /// finished fades and fire the detail reveal.
    pub fn tick(&mut self, now: Timestamp) {
        if let Some(intent) = self.gestures.poll(now) {
            self.handle_intent(intent, now);
        }

        if let Some(sample) = self.animator.sample(now, &self.geometry, self.surface) {
            self.view = sample.view;
            self.dirty = true;
            if sample.finished {
                log::debug!("Animation {} finished", sample.id);
            }
        }

        if self.fade.is_animating(now) {
            self.dirty = true;
        }
        self.fade.tick(now);

        if self.pending_reveal.as_ref().is_some_and(|reveal| now >= reveal.due) {
            if let Some(reveal) = self.pending_reveal.take() {
                self.events.push(EngineEvent::RevealDetail {
                    cell: reveal.cell,
                    high_res_url: reveal.high_res_url,
                    generation: self.reveal_generation,
                });
            }
        }
    }

    /// Whether the host should keep its frame loop running.
    pub fn needs_frame(&self, now: Timestamp) -> bool {
        self.animator.is_active()
            || self.fade.is_animating(now)
            || self.gestures.has_pending_tap()
            || self.pending_reveal.is_some()
    }

    /// Returns `true` once per batch of state changes that need a redraw.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Snapshot of everything the renderer needs for one frame.
    pub fn scene(&self, now: Timestamp) -> Scene<'_> {
        Scene {
            view: self.view,
            surface: self.surface,
            bounds: self.bounds,
            geometry: self.geometry,
            selection: self.selection,
            pointer_inside: self.pointer_inside,
            occupants: &self.occupants,
            fade: &self.fade,
            now,
        }
    }

    fn cancel_animation(&mut self) {
        if let Some(id) = self.animator.cancel() {
            log::debug!("Animation {id} cancelled by direct manipulation");
        }
    }

    fn reclamp(&mut self) {
        let clamped = self
            .geometry
            .clamp_offset(self.view.offset(), self.view.scale, self.surface);
        self.view.set_offset(clamped);
    }
}
