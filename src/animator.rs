// Time-based viewport transitions. At most one run is active; starting a new one
// replaces it. Samples are clamped against the current surface on every frame.

use kurbo::{Point, Size, Vec2};

use crate::transform::{GridGeometry, ViewportState};
use crate::types::{lerp, EasingType, Timestamp};

/// Path a transition follows between two viewport states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trajectory {
    /// Fixed scale, offset interpolated linearly.
    Offset { scale: f64, from: Vec2, to: Vec2 },
    /// Scale interpolated while `world` stays under the screen point `anchor`.
    ZoomAbout {
        anchor: Point,
        world: Point,
        from_scale: f64,
        to_scale: f64,
    },
}

impl Trajectory {
    fn at(&self, progress: f64) -> ViewportState {
        match *self {
            Trajectory::Offset { scale, from, to } => {
                ViewportState::new(scale, from.lerp(to, progress))
            }
            Trajectory::ZoomAbout {
                anchor,
                world,
                from_scale,
                to_scale,
            } => {
                let scale = lerp(from_scale, to_scale, progress);
                ViewportState::new(scale, anchor.to_vec2() - world.to_vec2() * scale)
            }
        }
    }

    pub fn end_state(&self) -> ViewportState {
        match *self {
            Trajectory::Offset { scale, to, .. } => ViewportState::new(scale, to),
            Trajectory::ZoomAbout {
                anchor,
                world,
                to_scale,
                ..
            } => ViewportState::new(to_scale, anchor.to_vec2() - world.to_vec2() * to_scale),
        }
    }
}

/// One scheduled transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationRun {
    pub id: u64,
    pub start: Timestamp,
    pub duration_us: u64,
    pub easing: EasingType,
    pub trajectory: Trajectory,
}

impl AnimationRun {
    pub fn progress(&self, now: Timestamp) -> f64 {
        if self.duration_us == 0 {
            return 1.0;
        }
        (now.micros_since(self.start) as f64 / self.duration_us as f64).min(1.0)
    }
}

/// Result of sampling the active run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSample {
    pub id: u64,
    pub view: ViewportState,
    pub finished: bool,
}

#[derive(Debug, Default)]
pub struct Animator {
    active: Option<AnimationRun>,
    next_id: u64,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any active run. Returns the new run's id.
    pub fn start(
        &mut self,
        now: Timestamp,
        duration_us: u64,
        easing: EasingType,
        trajectory: Trajectory,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        if let Some(previous) = self.active.take() {
            log::debug!("Animation {} replaced by {}", previous.id, id);
        }
        self.active = Some(AnimationRun {
            id,
            start: now,
            duration_us,
            easing,
            trajectory,
        });
        id
    }

    /// Stop the active run without snapping to its target.
    pub fn cancel(&mut self) -> Option<u64> {
        self.active.take().map(|run| run.id)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Viewport for `now`. The final sample lands exactly on the run's target
    /// and retires the run.
    pub fn sample(
        &mut self,
        now: Timestamp,
        geometry: &GridGeometry,
        surface: Size,
    ) -> Option<AnimationSample> {
        let run = self.active?;
        let progress = run.progress(now);
        let finished = progress >= 1.0;
        let mut view = if finished {
            run.trajectory.end_state()
        } else {
            run.trajectory.at(run.easing.apply(progress))
        };
        view.set_offset(geometry.clamp_offset(view.offset(), view.scale, surface));
        if finished {
            self.active = None;
        }
        Some(AnimationSample {
            id: run.id,
            view,
            finished,
        })
    }
}
