//! Drag-to-scroll with inertia after release.
//!
//! The scroller is a plain state machine. It never sleeps: the host calls
//! [`KineticScroller::tick`] once per [`InertiaStep::Continue::next_in`] and
//! applies the returned offset, so the interactive thread stays free between
//! ticks. Each release starts a new inertia loop identified by an
//! [`InertiaId`]; ticks carrying an older id are refused, so starting a new
//! drag cancels every loop already scheduled.

use crate::config::KineticConfig;
use std::ops::{Add, Mul, Sub};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Sub for Point {
    type Output = Vector;

    fn sub(self, rhs: Point) -> Vector {
        Vector {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    fn add(self, rhs: Vector) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        Vector {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KineticPhase {
    Idle,
    Dragging,
    Inertia,
}

/// Identifies one inertia loop from release until it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InertiaId(u64);

/// What the host should do after an inertia tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InertiaStep {
    /// Scroll to `target` and tick again after `next_in`.
    Continue { target: Point, next_in: Duration },
    Finished,
}

#[derive(Debug, Clone)]
pub struct KineticScroller {
    enabled: bool,
    friction: f64,
    tick_interval: Duration,
    max_ticks: u32,
    phase: KineticPhase,
    start_point: Point,
    start_offset: Point,
    previous_point: Point,
    scroll_target: Point,
    velocity: Vector,
    ticks: u32,
    generation: u64,
    last_wheel: Option<Instant>,
}

impl KineticScroller {
    pub fn new(config: &KineticConfig) -> Self {
        Self {
            enabled: config.enabled,
            friction: config.friction,
            tick_interval: config.tick_interval(),
            max_ticks: config.max_ticks(),
            phase: KineticPhase::Idle,
            start_point: Point::default(),
            start_offset: Point::default(),
            previous_point: Point::default(),
            scroll_target: Point::default(),
            velocity: Vector::default(),
            ticks: 0,
            generation: 0,
            last_wheel: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.generation = self.generation.wrapping_add(1);
            self.phase = KineticPhase::Idle;
        }
    }

    pub fn phase(&self) -> KineticPhase {
        self.phase
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == KineticPhase::Dragging
    }

    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Start a drag at `point` with the area scrolled to `offset`. Returns
    /// false when kinetic panning is off.
    pub fn begin_drag(&mut self, point: Point, offset: Point) -> bool {
        if !self.enabled {
            return false;
        }
        if self.phase == KineticPhase::Inertia {
            debug!(ticks = self.ticks, "inertia cancelled by new drag");
        }
        self.generation = self.generation.wrapping_add(1);
        self.phase = KineticPhase::Dragging;
        self.start_point = point;
        self.start_offset = offset;
        self.previous_point = point;
        self.scroll_target = offset;
        self.velocity = Vector::default();
        true
    }

    /// Track the pointer during a drag and return the offset to scroll to.
    pub fn drag_to(&mut self, point: Point, scrollable_height: f64) -> Option<Point> {
        if !self.is_dragging() {
            return None;
        }
        self.velocity = self.previous_point - point;
        self.previous_point = point;

        let mut target = self.start_offset + (self.start_point - point);
        target.y = target.y.clamp(0.0, scrollable_height.max(0.0));
        self.scroll_target = target;
        Some(target)
    }

    /// End the drag and hand over to inertia. Returns the loop to schedule
    /// ticks for, or `None` when no drag was in progress.
    pub fn release(&mut self) -> Option<InertiaId> {
        if !self.is_dragging() {
            return None;
        }
        self.phase = KineticPhase::Inertia;
        self.ticks = 0;
        debug!(vx = self.velocity.x, vy = self.velocity.y, "inertia started");
        Some(InertiaId(self.generation))
    }

    /// Record wheel input, which stops inertia on its next tick.
    pub fn note_wheel(&mut self, now: Instant) {
        self.last_wheel = Some(now);
    }

    fn wheel_recent(&self, now: Instant) -> bool {
        self.last_wheel
            .is_some_and(|at| now.saturating_duration_since(at) < self.tick_interval * 2)
    }

    /// Advance loop `id` by one tick. A tick for a superseded loop finishes
    /// without touching the current one.
    pub fn tick(&mut self, id: InertiaId, now: Instant) -> InertiaStep {
        if id.0 != self.generation {
            debug!("stale inertia tick dropped");
            return InertiaStep::Finished;
        }
        if self.phase != KineticPhase::Inertia {
            return InertiaStep::Finished;
        }
        if self.ticks >= self.max_ticks || self.velocity.length() <= 1.0 || self.wheel_recent(now)
        {
            debug!(ticks = self.ticks, "inertia finished");
            self.phase = KineticPhase::Idle;
            return InertiaStep::Finished;
        }

        let target = self.scroll_target;
        self.scroll_target = self.scroll_target + self.velocity;
        self.velocity = self.velocity * self.friction;
        self.ticks += 1;
        InertiaStep::Continue {
            target,
            next_in: self.tick_interval,
        }
    }
}
