// Gesture classification: raw touch/mouse input in, high-level intents out.
// Taps are suppressed after real drags or pinches, and a clean tap is only
// committed once the double-tap window has closed without a second press.

use kurbo::{Point, Vec2};

use crate::config::GestureSettings;
use crate::types::{CellCoord, Timestamp};

/// What a tap would act on, resolved by the caller at press time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapTarget {
    /// An occupant's cell (normal mode).
    Occupant(CellCoord),
    /// An in-bounds cell (selection mode).
    Cell(CellCoord),
}

/// High-level user intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureIntent {
    /// Pan by a screen-space delta since the previous move.
    Pan { delta: Vec2 },
    /// Set the absolute scale, keeping the grid point under `anchor` fixed.
    ZoomTo { anchor: Point, scale: f64 },
    TapAt { point: Point, target: TapTarget },
    DoubleTapZoom { anchor: Point },
    /// Relative zoom step from the mouse wheel.
    WheelZoom { anchor: Point, factor: f64 },
    /// The current press has become a drag; emitted once per gesture.
    DragThresholdExceeded,
}

/// Observable touch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Dragging,
    Pinching,
    /// Second press of a double-tap; moves and release are ignored.
    DoubleTapPress,
    /// A pinch lost a finger; waiting for all fingers to lift.
    Settling,
}

/// Movement tracking for one press: start position plus last seen position.
#[derive(Debug, Clone, Copy)]
struct DragTrack {
    origin: Point,
    last: Point,
    pressed_at: Timestamp,
}

impl DragTrack {
    fn start(pos: Point, now: Timestamp) -> Self {
        DragTrack {
            origin: pos,
            last: pos,
            pressed_at: now,
        }
    }

    /// Delta since the previous update.
    fn update(&mut self, pos: Point) -> Vec2 {
        let delta = pos - self.last;
        self.last = pos;
        delta
    }

    fn total_offset(&self, pos: Point) -> Vec2 {
        pos - self.origin
    }
}

#[derive(Debug, Clone, Copy)]
struct PinchBaseline {
    distance: f64,
    scale: f64,
}

#[derive(Debug, Clone, Copy)]
enum TouchPhase {
    Idle,
    Dragging(DragTrack),
    Pinching(PinchBaseline),
    DoubleTapPress,
    Settling,
}

#[derive(Debug, Clone, Copy)]
struct MousePress {
    track: DragTrack,
    candidate: Option<TapTarget>,
    drag_exceeded: bool,
}

/// A clean tap waiting for the double-tap window to close.
#[derive(Debug, Clone, Copy)]
struct ParkedTap {
    point: Point,
    target: TapTarget,
    pressed_at: Timestamp,
}

/// Touch and mouse gesture state machine.
#[derive(Debug)]
pub struct GestureClassifier {
    settings: GestureSettings,
    touch: TouchPhase,
    candidate: Option<TapTarget>,
    drag_exceeded: bool,
    multi_touch: bool,
    last_press: Option<(Timestamp, Point)>,
    parked: Option<ParkedTap>,
    mouse: Option<MousePress>,
}

impl GestureClassifier {
    pub fn new(settings: GestureSettings) -> Self {
        GestureClassifier {
            settings,
            touch: TouchPhase::Idle,
            candidate: None,
            drag_exceeded: false,
            multi_touch: false,
            last_press: None,
            parked: None,
            mouse: None,
        }
    }

    pub fn phase(&self) -> GesturePhase {
        match self.touch {
            TouchPhase::Idle => GesturePhase::Idle,
            TouchPhase::Dragging(_) => GesturePhase::Dragging,
            TouchPhase::Pinching(_) => GesturePhase::Pinching,
            TouchPhase::DoubleTapPress => GesturePhase::DoubleTapPress,
            TouchPhase::Settling => GesturePhase::Settling,
        }
    }

    /// True while a mouse button is held on the surface.
    pub fn mouse_pressed(&self) -> bool {
        self.mouse.is_some()
    }

    pub fn has_pending_tap(&self) -> bool {
        self.parked.is_some()
    }

    /// Drop any tap candidate or parked tap, e.g. on a mode switch.
    pub fn cancel_pending_tap(&mut self) {
        self.parked = None;
        self.candidate = None;
        if let Some(press) = self.mouse.as_mut() {
            press.candidate = None;
        }
    }

    /// `touches` holds every finger currently down, in surface coordinates.
    /// `candidate` is what a tap at `touches[0]` would hit.
    pub fn touch_start(
        &mut self,
        touches: &[Point],
        now: Timestamp,
        current_scale: f64,
        candidate: Option<TapTarget>,
    ) -> Vec<GestureIntent> {
        let mut intents = Vec::new();
        match (touches, self.touch) {
            ([], _) => {}
            ([point], TouchPhase::Idle) => {
                let point = *point;
                if self.is_double_press(now, point) {
                    self.last_press = None;
                    self.parked = None;
                    self.touch = TouchPhase::DoubleTapPress;
                    intents.push(GestureIntent::DoubleTapZoom { anchor: point });
                    return intents;
                }
                intents.extend(self.flush_parked());
                self.last_press = Some((now, point));
                self.touch = TouchPhase::Dragging(DragTrack::start(point, now));
                self.drag_exceeded = false;
                self.candidate = candidate;
            }
            ([_], _) => {}
            ([first, second, ..], _) => {
                self.multi_touch = true;
                self.candidate = None;
                self.parked = None;
                self.last_press = None;
                self.touch = TouchPhase::Pinching(PinchBaseline {
                    distance: first.distance(*second),
                    scale: current_scale,
                });
            }
        }
        intents
    }

    pub fn touch_move(&mut self, touches: &[Point]) -> Vec<GestureIntent> {
        let mut intents = Vec::new();
        match (&mut self.touch, touches) {
            (TouchPhase::Dragging(track), [point]) => {
                let point = *point;
                let total = track.total_offset(point);
                let delta = track.update(point);
                if !self.drag_exceeded && total.hypot() > self.settings.drag_threshold_px {
                    self.drag_exceeded = true;
                    self.candidate = None;
                    intents.push(GestureIntent::DragThresholdExceeded);
                }
                if delta != Vec2::ZERO {
                    intents.push(GestureIntent::Pan { delta });
                }
            }
            (TouchPhase::Pinching(baseline), [first, second, ..]) => {
                if baseline.distance > 0.0 {
                    let distance = first.distance(*second);
                    intents.push(GestureIntent::ZoomTo {
                        anchor: first.midpoint(*second),
                        scale: baseline.scale * (distance / baseline.distance),
                    });
                }
            }
            _ => {}
        }
        intents
    }

    /// `remaining` is every finger still down; `lifted` is how many fingers
    /// this event released.
    pub fn touch_end(
        &mut self,
        remaining: &[Point],
        lifted: usize,
        now: Timestamp,
    ) -> Vec<GestureIntent> {
        let mut intents = Vec::new();
        if !remaining.is_empty() {
            if let TouchPhase::Pinching(_) = self.touch {
                if remaining.len() < 2 {
                    self.touch = TouchPhase::Settling;
                }
            }
            return intents;
        }

        if let TouchPhase::Dragging(track) = self.touch {
            let clean = lifted == 1 && !self.drag_exceeded && !self.multi_touch;
            if clean {
                if let Some(target) = self.candidate.take() {
                    intents.extend(self.park(
                        ParkedTap {
                            point: track.origin,
                            target,
                            pressed_at: track.pressed_at,
                        },
                        now,
                    ));
                }
            }
        }

        self.touch = TouchPhase::Idle;
        self.candidate = None;
        self.drag_exceeded = false;
        self.multi_touch = false;
        intents
    }

    pub fn mouse_down(&mut self, point: Point, now: Timestamp, candidate: Option<TapTarget>) {
        self.mouse = Some(MousePress {
            track: DragTrack::start(point, now),
            candidate,
            drag_exceeded: false,
        });
    }

    /// Mouse movement over the surface. `button_held` mirrors `buttons != 0`.
    pub fn mouse_move(&mut self, point: Point, button_held: bool) -> Vec<GestureIntent> {
        let mut intents = Vec::new();
        if !button_held {
            // Released outside the surface.
            self.mouse = None;
            return intents;
        }
        if let Some(press) = self.mouse.as_mut() {
            let total = press.track.total_offset(point);
            let delta = press.track.update(point);
            if !press.drag_exceeded && total.hypot() > self.settings.drag_threshold_px {
                press.drag_exceeded = true;
                press.candidate = None;
                intents.push(GestureIntent::DragThresholdExceeded);
            }
            if delta != Vec2::ZERO {
                intents.push(GestureIntent::Pan { delta });
            }
        }
        intents
    }

    pub fn mouse_up(&mut self, point: Point, now: Timestamp) -> Vec<GestureIntent> {
        let mut intents = Vec::new();
        let Some(press) = self.mouse.take() else {
            return intents;
        };
        if press.drag_exceeded {
            return intents;
        }
        if let Some(parked) = self.parked {
            let within_window = press.track.pressed_at.micros_since(parked.pressed_at)
                < self.settings.double_tap_window_us;
            if within_window && parked.point.distance(point) < self.settings.double_tap_distance_px
            {
                // Second click of a double-click; the dblclick event zooms.
                self.parked = None;
                return intents;
            }
        }
        intents.extend(self.flush_parked());
        if let Some(target) = press.candidate {
            intents.extend(self.park(
                ParkedTap {
                    point: press.track.origin,
                    target,
                    pressed_at: press.track.pressed_at,
                },
                now,
            ));
        }
        intents
    }

    pub fn mouse_leave(&mut self) {
        self.mouse = None;
    }

    pub fn double_click(&mut self, point: Point) -> Vec<GestureIntent> {
        self.parked = None;
        self.mouse = None;
        vec![GestureIntent::DoubleTapZoom { anchor: point }]
    }

    pub fn wheel(&mut self, point: Point, delta_y: f64) -> Vec<GestureIntent> {
        if delta_y == 0.0 || delta_y.is_nan() {
            return Vec::new();
        }
        let step = self.settings.wheel_zoom_factor;
        let factor = if delta_y < 0.0 { step } else { 1.0 / step };
        vec![GestureIntent::WheelZoom {
            anchor: point,
            factor,
        }]
    }

    /// Commit a parked tap once its double-tap window has closed.
    pub fn poll(&mut self, now: Timestamp) -> Option<GestureIntent> {
        let parked = self.parked?;
        if now.micros_since(parked.pressed_at) >= self.settings.double_tap_window_us {
            self.parked = None;
            Some(GestureIntent::TapAt {
                point: parked.point,
                target: parked.target,
            })
        } else {
            None
        }
    }

    fn is_double_press(&self, now: Timestamp, point: Point) -> bool {
        match self.last_press {
            Some((at, previous)) => {
                now.micros_since(at) < self.settings.double_tap_window_us
                    && previous.distance(point) < self.settings.double_tap_distance_px
            }
            None => false,
        }
    }

    fn park(&mut self, tap: ParkedTap, now: Timestamp) -> Option<GestureIntent> {
        self.parked = Some(tap);
        self.poll(now)
    }

    fn flush_parked(&mut self) -> Option<GestureIntent> {
        self.parked.take().map(|parked| GestureIntent::TapAt {
            point: parked.point,
            target: parked.target,
        })
    }
}
