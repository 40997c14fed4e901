use std::sync::Arc;
use std::time::{Duration, Instant};

use super::load_state::{LoadReport, LoadState, SettleResult};
use crate::events::{Generation, ImageSettled};
use crate::render::{KenBurns, Layer, RenderPlan, crossfade_opacity};
use crate::viewport::{ImageSet, ImageSets, ViewportClass};

#[derive(Debug, Clone)]
pub struct SlideshowOptions {
    pub transition: Duration,
    pub show_controls: bool,
    pub pause_on_hover: bool,
    pub ken_burns: Option<KenBurns>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Handle for the deferred commit of the transition that is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTicket {
    generation: Generation,
    seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingTransition {
    ticket: TransitionTicket,
    direction: Direction,
    /// Pointer pair to commit, computed when the transition started.
    current: usize,
    next: usize,
    started_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ImageSetChange {
    pub generation: Generation,
    pub class: ViewportClass,
    pub images: ImageSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub direction: Direction,
    pub current: usize,
    pub next: usize,
    pub url: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Started(TransitionTicket),
    /// The incoming image has not settled yet; pointers are left untouched.
    SkippedUnloaded,
    /// A transition is already in flight.
    Busy,
    /// Timer conditions do not hold (single image, paused, first images pending).
    Disarmed,
}

/// Slide pointer pair, load record and transition/pause flags for one slideshow.
///
/// Pure state: time is passed in, timers are owned by the caller.
#[derive(Debug)]
pub struct SlideshowState {
    sets: ImageSets,
    options: SlideshowOptions,
    class: ViewportClass,
    active: ImageSet,
    load: LoadState,
    current: usize,
    next: usize,
    transition: Option<PendingTransition>,
    paused: bool,
    /// When the current frame started appearing.
    current_since: Instant,
    transition_seq: u64,
    /// Bumped whenever the repeating timer has to be torn down and recreated.
    timer_epoch: u64,
}

impl SlideshowState {
    pub fn new(sets: ImageSets, options: SlideshowOptions, width: u32, now: Instant) -> Self {
        let class = sets.classify(width);
        let active = sets.select(class).clone();
        let generation = Generation::default();
        let load = LoadState::new(generation, active.len());
        Self {
            sets,
            options,
            class,
            next: initial_next(active.len()),
            active,
            load,
            current: 0,
            transition: None,
            paused: false,
            current_since: now,
            transition_seq: 0,
            timer_epoch: 0,
        }
    }

    pub fn active(&self) -> &ImageSet {
        &self.active
    }

    pub fn image_set(&self) -> ImageSetChange {
        ImageSetChange {
            generation: self.load.generation(),
            class: self.class,
            images: self.active.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn generation(&self) -> Generation {
        self.load.generation()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.load.is_loaded(index)
    }

    pub fn initial_images_loaded(&self) -> bool {
        self.load.is_loaded(0) && (self.len() == 1 || self.load.is_loaded(1))
    }

    pub fn all_images_loaded(&self) -> bool {
        self.load.all_loaded()
    }

    pub fn load_report(&self) -> LoadReport {
        self.load.report()
    }

    pub fn controls_visible(&self) -> bool {
        self.options.show_controls && self.len() > 1
    }

    /// Whether the repeating advance timer should be running.
    pub fn timer_armed(&self) -> bool {
        self.len() > 1 && !self.paused && self.initial_images_loaded()
    }

    /// Re-evaluates the viewport class; a different image set resets everything.
    pub fn on_resize(&mut self, width: u32, now: Instant) -> Option<ImageSetChange> {
        let class = self.sets.classify(width);
        self.class = class;
        let selected = self.sets.select(class);
        if Arc::ptr_eq(selected, &self.active) {
            return None;
        }
        self.active = selected.clone();
        self.load = LoadState::new(self.load.generation().next(), self.active.len());
        self.current = 0;
        self.next = initial_next(self.active.len());
        self.transition = None;
        self.paused = false;
        self.current_since = now;
        self.timer_epoch += 1;
        Some(self.image_set())
    }

    pub fn on_image_settled(&mut self, settled: ImageSettled) -> SettleResult {
        let result = self
            .load
            .settle(settled.generation, settled.index, settled.outcome);
        if result == SettleResult::Recorded {
            self.timer_epoch += 1;
        }
        result
    }

    /// One firing of the repeating advance timer.
    pub fn on_timer(&mut self, now: Instant) -> TimerOutcome {
        if !self.timer_armed() {
            return TimerOutcome::Disarmed;
        }
        if self.transition.is_some() {
            return TimerOutcome::Busy;
        }
        if !self.load.is_loaded(self.next) {
            return TimerOutcome::SkippedUnloaded;
        }
        TimerOutcome::Started(self.begin(Direction::Forward, now))
    }

    pub fn go_to_next(&mut self, now: Instant) -> Option<TransitionTicket> {
        if self.transition.is_some() || self.len() <= 1 || !self.load.is_loaded(self.next) {
            return None;
        }
        Some(self.begin(Direction::Forward, now))
    }

    pub fn go_to_prev(&mut self, now: Instant) -> Option<TransitionTicket> {
        if self.transition.is_some() || self.len() <= 1 {
            return None;
        }
        if !self.load.is_loaded(self.prev_index()) {
            return None;
        }
        Some(self.begin(Direction::Backward, now))
    }

    /// Applies the deferred commit for `ticket`; stale tickets are ignored.
    pub fn commit(&mut self, ticket: TransitionTicket) -> Option<Committed> {
        let pending = self.transition.filter(|p| p.ticket == ticket)?;
        self.transition = None;
        self.current = pending.current;
        self.next = pending.next;
        self.current_since = pending.started_at;
        self.timer_epoch += 1;
        Some(Committed {
            direction: pending.direction,
            current: self.current,
            next: self.next,
            url: self.active[self.current].clone(),
        })
    }

    /// Returns true when the pause flag changed.
    pub fn hover_enter(&mut self) -> bool {
        self.set_paused(true)
    }

    pub fn hover_leave(&mut self) -> bool {
        self.set_paused(false)
    }

    /// Whether the render plan sampled at `now` still changes over time.
    pub fn is_animating(&self, now: Instant) -> bool {
        if !self.load.is_loaded(0) {
            return false;
        }
        self.transition.is_some()
            || self
                .options
                .ken_burns
                .is_some_and(|kb| now.saturating_duration_since(self.current_since) < kb.duration)
    }

    pub fn render_plan(&self, now: Instant) -> RenderPlan {
        if !self.load.is_loaded(0) {
            return RenderPlan::Loading;
        }
        let scale_since = |since: Instant| {
            self.options
                .ken_burns
                .map_or(1.0, |kb| kb.scale_at(now.saturating_duration_since(since)))
        };
        let base = Layer {
            index: self.current,
            url: self.active[self.current].clone(),
            opacity: 1.0,
            scale: scale_since(self.current_since),
        };
        // While a transition runs the incoming frame is its commit target, which for a
        // backward step is not `next`.
        let overlay = match self.transition {
            Some(pending) => Some(Layer {
                index: pending.current,
                url: self.active[pending.current].clone(),
                opacity: crossfade_opacity(
                    now.saturating_duration_since(pending.started_at),
                    self.options.transition,
                ),
                scale: scale_since(pending.started_at),
            }),
            None if self.len() > 1 && self.load.is_loaded(self.next) => Some(Layer {
                index: self.next,
                url: self.active[self.next].clone(),
                opacity: 0.0,
                scale: self.options.ken_burns.map_or(1.0, |kb| kb.start_scale),
            }),
            None => None,
        };
        RenderPlan::Slides {
            base,
            overlay,
            transitioning: self.transition.is_some(),
            controls: self.controls_visible(),
        }
    }

    fn prev_index(&self) -> usize {
        (self.current + self.len() - 1) % self.len()
    }

    fn begin(&mut self, direction: Direction, now: Instant) -> TransitionTicket {
        let (current, next) = match direction {
            Direction::Forward => (self.next, (self.next + 1) % self.len()),
            Direction::Backward => (self.prev_index(), self.current),
        };
        self.transition_seq += 1;
        let ticket = TransitionTicket {
            generation: self.load.generation(),
            seq: self.transition_seq,
        };
        self.transition = Some(PendingTransition {
            ticket,
            direction,
            current,
            next,
            started_at: now,
        });
        ticket
    }

    fn set_paused(&mut self, paused: bool) -> bool {
        if !self.options.pause_on_hover || self.paused == paused {
            return false;
        }
        self.paused = paused;
        self.timer_epoch += 1;
        true
    }
}

fn initial_next(len: usize) -> usize {
    if len > 1 { 1 } else { 0 }
}
