pub mod load_state;
pub mod state;

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::select;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::SlideshowConfig;
use crate::events::{
    Displayed, Generation, ImageSettled, LoadOutcome, PreloadRequest, SlideshowCommand,
};
use crate::render::{KenBurns, RenderPlan};
use crate::viewport::{ImageSets, ViewportClass};
use load_state::SettleResult;
use state::{
    ImageSetChange, SlideshowOptions, SlideshowState, TimerOutcome, TransitionTicket,
};

/// Republish cadence while a crossfade or Ken Burns zoom is running.
const FRAME_PERIOD: Duration = Duration::from_millis(33);

impl SlideshowOptions {
    pub fn from_config(cfg: &SlideshowConfig) -> Self {
        Self {
            transition: cfg.transition,
            show_controls: cfg.show_controls,
            pause_on_hover: cfg.pause_on_hover,
            ken_burns: KenBurns::from_config(cfg),
        }
    }
}

pub fn initial_state(cfg: &SlideshowConfig) -> SlideshowState {
    SlideshowState::new(
        ImageSets::from_config(cfg),
        SlideshowOptions::from_config(cfg),
        cfg.viewport_width,
        Instant::now().into_std(),
    )
}

/// Drives the slideshow state machine in real time.
///
/// Rules:
/// - The repeating advance timer exists only while `timer_armed()` holds and is recreated
///   (first tick one full interval later) whenever the state's timer epoch moves.
/// - Each started transition schedules exactly one deferred commit `transition` later.
/// - An image set change drops the pending commit and asks the loader for the new set.
/// - Every state change republishes the render plan, and while a frame is animating the
///   plan is also republished every `FRAME_PERIOD`.
///
/// The configuration is validated first; a zero interval or transition is an error.
pub async fn run(
    cfg: SlideshowConfig,
    mut commands: Receiver<SlideshowCommand>,
    mut settled_rx: Receiver<ImageSettled>,
    preload_tx: watch::Sender<Option<PreloadRequest>>,
    plans: watch::Sender<RenderPlan>,
    displayed_tx: Sender<Displayed>,
    cancel: CancellationToken,
) -> Result<()> {
    let cfg = cfg
        .validated()
        .context("invalid slideshow configuration")?;
    let period = cfg.interval;
    let transition = cfg.transition;
    let mut state = initial_state(&cfg);
    let mut timer: Option<Interval> = None;
    let mut frames: Option<Interval> = None;
    let mut timer_epoch: Option<u64> = None;
    let mut commit: Option<(TransitionTicket, Instant)> = None;
    let mut reported: Option<Generation> = None;
    let mut commands_open = true;
    let mut settled_open = true;

    announce(&state.image_set(), &preload_tx);

    loop {
        let now = Instant::now().into_std();
        plans.send_replace(state.render_plan(now));

        if state.is_animating(now) != frames.is_some() {
            frames = state.is_animating(now).then(|| repeating(FRAME_PERIOD));
        }

        if timer_epoch != Some(state.timer_epoch()) {
            timer_epoch = Some(state.timer_epoch());
            // Dropping the old interval is its teardown.
            timer = state.timer_armed().then(|| repeating(period));
        }

        select! {
            _ = cancel.cancelled() => break,

            _ = next_tick(&mut frames) => {}

            _ = next_tick(&mut timer) => {
                match state.on_timer(Instant::now().into_std()) {
                    TimerOutcome::Started(ticket) => {
                        debug!(
                            from = state.current_index(),
                            to = state.next_index(),
                            "auto-advance transition started"
                        );
                        commit = Some((ticket, Instant::now() + transition));
                    }
                    TimerOutcome::SkippedUnloaded => trace!(
                        next = state.next_index(),
                        "next image still loading; skipping advance"
                    ),
                    TimerOutcome::Busy => trace!("transition in flight; skipping advance"),
                    TimerOutcome::Disarmed => {}
                }
            }

            ticket = commit_due(commit) => {
                commit = None;
                if let Some(done) = state.commit(ticket) {
                    debug!(
                        direction = ?done.direction,
                        current = done.current,
                        next = done.next,
                        url = %done.url,
                        "transition committed"
                    );
                    let shown = Displayed {
                        index: done.current,
                        url: done.url,
                    };
                    match displayed_tx.try_send(shown) {
                        Ok(()) => {}
                        Err(TrySendError::Full(shown)) => debug!(
                            index = shown.index,
                            "viewer is behind; dropping displayed notice"
                        ),
                        Err(TrySendError::Closed(_)) => debug!("viewer closed"),
                    }
                }
            }

            cmd = commands.recv(), if commands_open => {
                let Some(cmd) = cmd else {
                    debug!("command channel closed");
                    commands_open = false;
                    continue;
                };
                let now = Instant::now();
                match cmd {
                    SlideshowCommand::Next => {
                        if let Some(ticket) = state.go_to_next(now.into_std()) {
                            debug!("manual next transition started");
                            commit = Some((ticket, now + transition));
                        }
                    }
                    SlideshowCommand::Prev => {
                        if let Some(ticket) = state.go_to_prev(now.into_std()) {
                            debug!("manual previous transition started");
                            commit = Some((ticket, now + transition));
                        }
                    }
                    SlideshowCommand::HoverEnter => {
                        if state.hover_enter() {
                            debug!("hover: auto-advance paused");
                        }
                    }
                    SlideshowCommand::HoverLeave => {
                        if state.hover_leave() {
                            debug!("hover ended: auto-advance resumed");
                        }
                    }
                    SlideshowCommand::Resize(width) => {
                        if let Some(change) = state.on_resize(width, now.into_std()) {
                            commit = None;
                            announce(&change, &preload_tx);
                        }
                    }
                }
            }

            settled = settled_rx.recv(), if settled_open => {
                let Some(settled) = settled else {
                    debug!("loader channel closed");
                    settled_open = false;
                    continue;
                };
                match state.on_image_settled(settled) {
                    SettleResult::Recorded => trace!(
                        index = settled.index,
                        outcome = ?settled.outcome,
                        "load state updated"
                    ),
                    SettleResult::Stale => debug!(
                        generation = settled.generation.0,
                        index = settled.index,
                        "discarding completion from replaced image set"
                    ),
                    SettleResult::Ignored => {}
                }
                if state.all_images_loaded() && reported != Some(state.generation()) {
                    reported = Some(state.generation());
                    let report = state.load_report();
                    info!(
                        generation = report.generation.0,
                        total = report.total,
                        loaded = report.loaded,
                        failed = report.failed,
                        "all images settled"
                    );
                }
            }
        }
    }

    Ok(())
}

fn announce(change: &ImageSetChange, preload_tx: &watch::Sender<Option<PreloadRequest>>) {
    info!(
        generation = change.generation.0,
        viewport = match change.class {
            ViewportClass::Narrow => "narrow",
            ViewportClass::Wide => "wide",
        },
        images = change.images.len(),
        "image set selected"
    );
    preload_tx.send_replace(Some(PreloadRequest {
        generation: change.generation,
        images: change.images.clone(),
    }));
}

fn repeating(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}

async fn commit_due(pending_commit: Option<(TransitionTicket, Instant)>) -> TransitionTicket {
    match pending_commit {
        Some((ticket, at)) => {
            sleep_until(at).await;
            ticket
        }
        None => pending().await,
    }
}

/// Frame order the slideshow would show with every image loading instantly.
pub fn simulate_schedule(cfg: &SlideshowConfig, width: u32, frames: usize) -> Vec<Arc<str>> {
    let mut state = initial_state(cfg);
    state.on_resize(width, Instant::now().into_std());
    let generation = state.generation();
    for index in 0..state.len() {
        state.on_image_settled(ImageSettled {
            generation,
            index,
            outcome: LoadOutcome::Loaded,
        });
    }

    let mut plan = Vec::with_capacity(frames);
    if state.is_empty() || frames == 0 {
        return plan;
    }
    plan.push(state.active()[0].clone());
    while plan.len() < frames {
        let now = Instant::now().into_std();
        let TimerOutcome::Started(ticket) = state.on_timer(now) else {
            break;
        };
        match state.commit(ticket) {
            Some(done) => plan.push(done.url),
            None => break,
        }
    }
    plan
}
