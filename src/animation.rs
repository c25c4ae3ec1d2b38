//! # Animation Module
//!
//! Easing curves and the cancellable effect scheduler.
//!
//! ## Responsibilities
//! - **Easing**: Interpolation curves backed by the `keyframe` crate.
//! - **Timed Effects**: Fade and delay tasks driven by a cooperative tick.
//! - **Cancellation**: Token-based cancel that suppresses pending callbacks.
//! - **Pause Gate**: A paused scheduler advances no task.
//!
//! ## Key Types
//! - `EasingType`: Linear / EaseIn / EaseOut / EaseInOut curves.
//! - `Scheduler`: Owns all in-flight tasks, ticked once per host frame.
//! - `CancelToken`: Handle to stop one task before it completes.

use keyframe::EasingFunction;
use serde::{Deserialize, Serialize};

/// Supported easing functions for timed effects.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingType {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl EasingFunction for EasingType {
    fn y(&self, x: f64) -> f64 {
        match self {
            EasingType::Linear => keyframe::functions::Linear.y(x),
            EasingType::EaseIn => keyframe::functions::EaseIn.y(x),
            EasingType::EaseOut => keyframe::functions::EaseOut.y(x),
            EasingType::EaseInOut => keyframe::functions::EaseInOut.y(x),
        }
    }
}

impl EasingType {
    /// Evaluates the easing curve at a specific point `x` (0.0 to 1.0).
    pub fn eval(&self, x: f32) -> f32 {
        self.y(x as f64) as f32
    }
}

/// Handle to an in-flight scheduler task.
///
/// Cancelling a token removes its task synchronously: no further tick or
/// completion callback for that task will run, even within the same frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CancelToken(u64);

/// Per-tick value callback for fade tasks.
pub type TickFn = Box<dyn FnMut(f32)>;
/// One-shot completion callback.
pub type DoneFn = Box<dyn FnOnce()>;

enum TaskKind {
    Fade {
        from: f32,
        to: f32,
        easing: EasingType,
        on_tick: TickFn,
        on_complete: Option<DoneFn>,
    },
    Delay {
        on_elapsed: Option<DoneFn>,
    },
}

struct EffectTask {
    id: u64,
    elapsed: f64,
    duration: f64,
    kind: TaskKind,
}

/// Cooperative scheduler for timed presentation effects.
///
/// All tasks advance on `tick`, which the host calls once per frame on a
/// single logical thread. Tasks never run in parallel with each other; each
/// task mutates only the state its caller handed to it, so concurrent tasks
/// cannot interfere.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<EffectTask>,
    next_id: u64,
    paused: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fade from `from` to `to` over `duration` seconds.
    ///
    /// `on_tick` receives the interpolated value every tick (eased by
    /// `easing`); `on_complete`, if any, fires exactly once when the fade
    /// finishes, and never after the token has been cancelled.
    pub fn run_fade(
        &mut self,
        from: f32,
        to: f32,
        duration: f64,
        easing: EasingType,
        on_tick: impl FnMut(f32) + 'static,
        on_complete: Option<DoneFn>,
    ) -> CancelToken {
        self.push(
            duration,
            TaskKind::Fade {
                from,
                to,
                easing,
                on_tick: Box::new(on_tick),
                on_complete,
            },
        )
    }

    /// Starts a timer that invokes `on_elapsed` once after `duration` seconds.
    pub fn run_delay(&mut self, duration: f64, on_elapsed: impl FnOnce() + 'static) -> CancelToken {
        self.push(
            duration,
            TaskKind::Delay {
                on_elapsed: Some(Box::new(on_elapsed)),
            },
        )
    }

    /// Cancels an in-flight task. Safe to call on already-finished tokens.
    pub fn cancel(&mut self, token: CancelToken) {
        self.tasks.retain(|t| t.id != token.0);
    }

    /// Returns true while the task behind `token` has neither completed nor
    /// been cancelled.
    pub fn is_live(&self, token: CancelToken) -> bool {
        self.tasks.iter().any(|t| t.id == token.0)
    }

    /// Gates the shared clock. A paused scheduler advances no task; elapsed
    /// fractions are preserved across resume.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advances every live task by `dt` seconds and fires due callbacks.
    ///
    /// Zero or negative durations complete on their first tick with the
    /// target value. Completion callbacks run after the task has been
    /// removed, so `is_live` is already false when they fire.
    pub fn tick(&mut self, dt: f64) {
        if self.paused || dt <= 0.0 {
            return;
        }

        let mut finished = Vec::new();
        for task in self.tasks.iter_mut() {
            task.elapsed += dt;
            let fraction = if task.duration <= 0.0 {
                1.0
            } else {
                (task.elapsed / task.duration).min(1.0)
            };

            if let TaskKind::Fade {
                from,
                to,
                easing,
                on_tick,
                ..
            } = &mut task.kind
            {
                let value = *from + (*to - *from) * easing.eval(fraction as f32);
                on_tick(value);
            }

            if fraction >= 1.0 {
                finished.push(task.id);
            }
        }

        for id in finished {
            // Callbacks hold no scheduler access, so the task is still here;
            // guard the lookup anyway.
            if let Some(pos) = self.tasks.iter().position(|t| t.id == id) {
                let task = self.tasks.remove(pos);
                match task.kind {
                    TaskKind::Fade { on_complete, .. } => {
                        if let Some(f) = on_complete {
                            f();
                        }
                    }
                    TaskKind::Delay { on_elapsed } => {
                        if let Some(f) = on_elapsed {
                            f();
                        }
                    }
                }
            }
        }
    }

    fn push(&mut self, duration: f64, kind: TaskKind) -> CancelToken {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push(EffectTask {
            id,
            elapsed: 0.0,
            duration,
            kind,
        });
        CancelToken(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn fade_interpolates_linearly_and_completes_once() {
        let mut sched = Scheduler::new();
        let value = Rc::new(Cell::new(-1.0f32));
        let completions = Rc::new(Cell::new(0u32));

        let v = value.clone();
        let c = completions.clone();
        sched.run_fade(
            0.0,
            1.0,
            1.0,
            EasingType::Linear,
            move |x| v.set(x),
            Some(Box::new(move || c.set(c.get() + 1))),
        );

        sched.tick(0.5);
        assert!((value.get() - 0.5).abs() < 1e-5);
        assert_eq!(completions.get(), 0);

        sched.tick(0.5);
        assert!((value.get() - 1.0).abs() < 1e-5);
        assert_eq!(completions.get(), 1);

        // Task is gone; further ticks never re-fire completion.
        sched.tick(1.0);
        assert_eq!(completions.get(), 1);
        assert!(sched.is_empty());
    }

    #[test]
    fn cancel_suppresses_tick_and_completion() {
        let mut sched = Scheduler::new();
        let ticks = Rc::new(Cell::new(0u32));
        let done = Rc::new(Cell::new(false));

        let t = ticks.clone();
        let d = done.clone();
        let token = sched.run_fade(
            1.0,
            0.0,
            1.0,
            EasingType::EaseInOut,
            move |_| t.set(t.get() + 1),
            Some(Box::new(move || d.set(true))),
        );

        sched.tick(0.25);
        assert_eq!(ticks.get(), 1);

        sched.cancel(token);
        assert!(!sched.is_live(token));

        sched.tick(2.0);
        assert_eq!(ticks.get(), 1);
        assert!(!done.get());
    }

    #[test]
    fn delay_fires_exactly_once_after_duration() {
        let mut sched = Scheduler::new();
        let fired = Rc::new(Cell::new(0u32));

        let f = fired.clone();
        let token = sched.run_delay(2.0, move || f.set(f.get() + 1));

        sched.tick(1.9);
        assert_eq!(fired.get(), 0);
        assert!(sched.is_live(token));

        sched.tick(0.2);
        assert_eq!(fired.get(), 1);
        assert!(!sched.is_live(token));
    }

    #[test]
    fn pause_freezes_progress_and_resume_lands_on_target() {
        let mut sched = Scheduler::new();
        let value = Rc::new(Cell::new(0.0f32));

        let v = value.clone();
        sched.run_fade(0.0, 1.0, 1.0, EasingType::Linear, move |x| v.set(x), None);

        sched.tick(0.5);
        let mid = value.get();

        sched.set_paused(true);
        sched.tick(10.0);
        assert!(
            (value.get() - mid).abs() < 1e-6,
            "paused fade must not advance"
        );

        sched.set_paused(false);
        sched.tick(0.25);
        assert!(
            (value.get() - 0.75).abs() < 1e-5,
            "fade resumes from its fraction"
        );

        sched.tick(0.25);
        assert!((value.get() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_duration_completes_on_first_tick_with_target() {
        let mut sched = Scheduler::new();
        let value = Rc::new(Cell::new(0.5f32));

        let v = value.clone();
        sched.run_fade(0.5, 0.0, 0.0, EasingType::Linear, move |x| v.set(x), None);

        sched.tick(0.016);
        assert_eq!(value.get(), 0.0);
        assert!(sched.is_empty());
    }

    #[test]
    fn concurrent_tasks_do_not_interfere() {
        let mut sched = Scheduler::new();
        let a = Rc::new(Cell::new(0.0f32));
        let b = Rc::new(Cell::new(0.0f32));

        let av = a.clone();
        let bv = b.clone();
        let token_a = sched.run_fade(0.0, 1.0, 1.0, EasingType::Linear, move |x| av.set(x), None);
        sched.run_fade(0.0, 2.0, 2.0, EasingType::Linear, move |x| bv.set(x), None);

        sched.tick(0.5);
        assert!((a.get() - 0.5).abs() < 1e-5);
        assert!((b.get() - 0.5).abs() < 1e-5);

        sched.cancel(token_a);
        sched.tick(0.5);
        assert!(
            (a.get() - 0.5).abs() < 1e-5,
            "cancelled fade holds its last value"
        );
        assert!((b.get() - 1.0).abs() < 1e-5);
    }
}
