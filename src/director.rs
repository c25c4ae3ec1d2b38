//! # Director Module
//!
//! The playback state machine: owns the current scene, drives the media
//! player and audio layer, and schedules the choice reveal/hide effects.
//!
//! ## Responsibilities
//! - **Scene Transitions**: `play_scene` in its fixed contractual order.
//! - **Choice Lifecycle**: delayed reveal, fade-out hide, activation events.
//! - **Cancellation Discipline**: at most one reveal task and one hide task
//!   are ever live; starting a new one cancels its predecessor first.
//! - **Pause**: one gate over the effect clock and media playback.
//!
//! ## Key Types
//! - `StoryDirector`: the orchestrator, ticked once per host frame.
//! - `Status`: Idle → Playing → AwaitingChoice → (Playing | Ended).
//! - `ChoiceChannel`: the single funnel for choice selections, shared by
//!   widget callbacks and external components like the mini-game.

use crate::animation::{CancelToken, EasingType, Scheduler};
use crate::audio::AudioDirector;
use crate::errors::StoryError;
use crate::host::{HostHandle, MediaHandle, MiniGameHandle, WidgetHandle};
use crate::scene::{Choice, Scene, SceneGraph, SceneId};
use crate::ResumeStore;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{error, info, warn};

/// Duration of the fade that hides outgoing choice buttons.
pub const HIDE_FADE_SECS: f64 = 0.5;
/// Duration of the fade that reveals choice buttons after their delay.
pub const REVEAL_FADE_SECS: f64 = 1.0;

/// Lifecycle state of the narrative session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No scene has been played yet.
    Idle,
    /// A scene's media is playing; choices hidden or pending reveal.
    Playing,
    /// Choice buttons are visible and interactive.
    AwaitingChoice,
    /// Terminal. The outer application has been handed control.
    Ended,
}

/// A selection flowing into the state machine.
///
/// Events originating from widgets revealed by the engine carry the epoch of
/// the scene that bound them; events with a stale epoch are dropped, which
/// is what keeps a late button callback from scene A from steering the
/// narrative after scene B has already begun. External selections (the
/// mini-game) carry no epoch and are always accepted.
#[derive(Debug, Clone)]
pub struct ChoiceEvent {
    pub target: SceneId,
    pub epoch: Option<u64>,
}

/// Shared single-threaded queue of choice selections.
///
/// Clone it freely; all clones feed the same director. This is the channel
/// the mini-game reports through.
#[derive(Clone, Default)]
pub struct ChoiceChannel {
    events: Rc<RefCell<VecDeque<ChoiceEvent>>>,
}

impl ChoiceChannel {
    /// Pushes an external selection (no epoch guard).
    pub fn select(&self, target: impl Into<SceneId>) {
        self.events.borrow_mut().push_back(ChoiceEvent {
            target: target.into(),
            epoch: None,
        });
    }

    fn select_tagged(&self, target: SceneId, epoch: u64) {
        self.events.borrow_mut().push_back(ChoiceEvent {
            target,
            epoch: Some(epoch),
        });
    }

    fn drain(&self) -> Vec<ChoiceEvent> {
        self.events.borrow_mut().drain(..).collect()
    }
}

/// Reveal runs in two phases: the configured delay, then the fade-in.
enum RevealPhase {
    Waiting,
    Fading,
}

struct RevealTask {
    token: CancelToken,
    phase: RevealPhase,
}

/// Mutable playback state, owned exclusively by the director.
struct PlaybackState {
    current: Option<SceneId>,
    status: Status,
    paused: bool,
    /// Bumped on every successful scene transition; stale-epoch choice
    /// events are discarded.
    epoch: u64,
    hide: Option<CancelToken>,
    reveal: Option<RevealTask>,
    /// Scene to play once the in-flight hide fade finishes.
    pending: Option<SceneId>,
}

impl PlaybackState {
    fn new() -> Self {
        Self {
            current: None,
            status: Status::Idle,
            paused: false,
            epoch: 0,
            hide: None,
            reveal: None,
            pending: None,
        }
    }
}

/// The central orchestrator of the narrative playback engine.
///
/// Everything runs on one logical thread: the host calls [`tick`] once per
/// frame, and all effect callbacks, state transitions, and choice events
/// execute interleaved on that tick. Correctness rests on cancel-before-
/// replace ordering, not on locks.
///
/// [`tick`]: StoryDirector::tick
pub struct StoryDirector {
    graph: SceneGraph,
    audio: AudioDirector,
    effects: Scheduler,
    media: MediaHandle,
    host: HostHandle,
    resume: Box<dyn ResumeStore>,
    minigame: Option<(SceneId, MiniGameHandle)>,
    pause_overlay: Option<WidgetHandle>,
    start_scene: SceneId,
    channel: ChoiceChannel,
    state: PlaybackState,
}

impl StoryDirector {
    pub fn new(
        graph: SceneGraph,
        audio: AudioDirector,
        media: MediaHandle,
        host: HostHandle,
        resume: Box<dyn ResumeStore>,
        start_scene: impl Into<SceneId>,
    ) -> Self {
        Self {
            graph,
            audio,
            effects: Scheduler::new(),
            media,
            host,
            resume,
            minigame: None,
            pause_overlay: None,
            start_scene: start_scene.into(),
            channel: ChoiceChannel::default(),
            state: PlaybackState::new(),
        }
    }

    /// Binds the external mini-game: it is started whenever `trigger_scene`
    /// activates and reports its outcome through the choice channel.
    pub fn set_minigame(&mut self, trigger_scene: impl Into<SceneId>, game: MiniGameHandle) {
        self.minigame = Some((trigger_scene.into(), game));
    }

    /// Widget shown while playback is paused.
    pub fn set_pause_overlay(&mut self, overlay: WidgetHandle) {
        self.pause_overlay = Some(overlay);
    }

    /// The channel widget callbacks and external components select through.
    pub fn choice_channel(&self) -> ChoiceChannel {
        self.channel.clone()
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.state.current.as_deref()
    }

    pub fn status(&self) -> Status {
        self.state.status
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    /// Begins the session: hides every choice widget, then plays the
    /// persisted last scene if it still exists, or the configured start
    /// scene otherwise.
    pub fn start(&mut self) -> Result<(), StoryError> {
        self.hide_all_choice_widgets();

        let first = match self.resume.load() {
            Some(saved) if self.graph.contains(&saved) => saved,
            Some(saved) => {
                warn!(scene = saved.as_str(), "persisted scene no longer exists");
                self.start_scene.clone()
            }
            None => self.start_scene.clone(),
        };
        self.play_scene(&first)
    }

    /// Transitions to the scene `id`.
    ///
    /// The step order below is contractual: audio, mini-game trigger, media
    /// start, entry hook, hide-task restart, reveal-task restart. An unknown
    /// id aborts the transition with one error report and leaves the current
    /// scene playing.
    pub fn play_scene(&mut self, id: &str) -> Result<(), StoryError> {
        let scene = match self.graph.get(id) {
            Some(scene) => scene.clone(),
            None => {
                error!(scene = id, "scene lookup failed; keeping current scene");
                return Err(StoryError::UnknownScene(id.to_string()));
            }
        };
        info!(scene = id, "scene transition");

        self.audio.on_scene_activated(&mut self.effects, &scene.id);
        self.audio.play_one_shot_if_bound(&scene.id);

        if let Some((trigger, game)) = &self.minigame {
            if *trigger == scene.id {
                game.borrow_mut().start();
            }
        }

        // Snapshot the outgoing scene's widgets before switching: those are
        // the buttons that may still be visible and must fade away.
        let outgoing = self.current_choice_widgets();

        self.state.current = Some(scene.id.clone());
        self.state.epoch += 1;
        self.state.status = Status::Playing;
        self.state.pending = None;
        {
            let mut media = self.media.borrow_mut();
            media.load(&scene.media);
            media.set_looping(scene.looping);
            media.play();
        }

        if let Some(hook) = &scene.on_enter {
            hook();
        }

        self.restart_hide_task(outgoing);

        if scene.waits_for_choices && !scene.choices.is_empty() {
            self.restart_reveal_task(&scene);
        } else if let Some(task) = self.state.reveal.take() {
            self.effects.cancel(task.token);
        }

        Ok(())
    }

    /// Media end event from the host player.
    ///
    /// Ending scenes hand control to the outer application exactly once;
    /// non-waiting scenes auto-advance if a target is configured; scenes
    /// waiting for choices are unaffected.
    pub fn handle_media_ended(&mut self) {
        let Some(current) = self.state.current.clone() else {
            return;
        };
        let Some(scene) = self.graph.get(&current) else {
            return;
        };
        let (is_ending, waits, auto_next) =
            (scene.is_ending, scene.waits_for_choices, scene.auto_next.clone());

        if is_ending {
            if self.state.status == Status::Ended {
                return;
            }
            info!(scene = current.as_str(), "ending scene finished");
            self.state.status = Status::Ended;
            self.host.borrow_mut().on_story_ended(&current);
            return;
        }

        if !waits {
            if let Some(next) = auto_next {
                let _ = self.play_scene(&next);
            }
        }
    }

    /// Resolves a selection: cancels the in-flight reveal, restarts the hide
    /// fade over the current choices, and plays the target once that fade
    /// completes. Running the hide to completion first keeps the next
    /// scene's media from appearing behind still-fading buttons.
    pub fn select_choice(&mut self, target: impl Into<SceneId>) {
        if self.state.status == Status::Ended {
            return;
        }
        if let Some(task) = self.state.reveal.take() {
            self.effects.cancel(task.token);
        }
        let widgets = self.current_choice_widgets();
        self.restart_hide_task(widgets);
        self.state.pending = Some(target.into());
    }

    /// Flips the global pause gate: freezes the effect clock, pauses or
    /// resumes media, toggles the overlay. In-flight fades keep their
    /// progress.
    pub fn toggle_pause(&mut self) {
        self.state.paused = !self.state.paused;
        self.effects.set_paused(self.state.paused);
        {
            let mut media = self.media.borrow_mut();
            if self.state.paused {
                media.pause();
            } else {
                media.play();
            }
        }
        if let Some(overlay) = &self.pause_overlay {
            overlay.borrow_mut().set_visible(self.state.paused);
        }
    }

    /// Persists the current scene for resume-on-reentry and notifies the
    /// outer application.
    pub fn return_to_menu(&mut self) {
        let last = self
            .state
            .current
            .clone()
            .unwrap_or_else(|| self.start_scene.clone());
        if let Err(err) = self.resume.save(&last) {
            warn!(error = %err, "failed to persist last scene");
        }
        self.media.borrow_mut().stop();
        self.host.borrow_mut().on_return_to_menu(&last);
    }

    /// Per-frame drive. Advances all timed effects, then resolves anything
    /// they unblocked: an elapsed reveal delay becomes the fade-in, a
    /// finished hide fade releases the pending transition, and queued choice
    /// events are applied.
    pub fn tick(&mut self, dt: f64) {
        self.effects.tick(dt);
        self.advance_reveal();
        self.advance_pending();
        self.drain_choices();
    }

    fn advance_reveal(&mut self) {
        let (token, waiting) = match &self.state.reveal {
            Some(task) => (task.token, matches!(task.phase, RevealPhase::Waiting)),
            None => return,
        };
        if self.effects.is_live(token) {
            return;
        }

        if waiting {
            self.begin_reveal_fade();
        } else {
            self.state.reveal = None;
        }
    }

    /// The reveal delay elapsed: prepare each choice button (label, epoch-
    /// tagged activation binding, interactive) and fade them in together.
    fn begin_reveal_fade(&mut self) {
        let choices: Vec<Choice> = match self
            .state
            .current
            .as_ref()
            .and_then(|id| self.graph.get(id))
        {
            Some(scene) => scene.choices.clone(),
            None => {
                self.state.reveal = None;
                return;
            }
        };

        let epoch = self.state.epoch;
        for choice in &choices {
            let mut widget = choice.widget.borrow_mut();
            widget.set_opacity(0.0);
            widget.set_label(&choice.label);
            widget.set_visible(true);
            widget.set_interactive(true);

            let channel = self.channel.clone();
            let target = choice.next_scene.clone();
            widget.on_activated(Box::new(move || {
                channel.select_tagged(target.clone(), epoch);
            }));
        }

        let widgets: Vec<WidgetHandle> = choices.iter().map(|c| c.widget.clone()).collect();
        let token = self.effects.run_fade(
            0.0,
            1.0,
            REVEAL_FADE_SECS,
            EasingType::EaseInOut,
            move |alpha| {
                for widget in &widgets {
                    widget.borrow_mut().set_opacity(alpha);
                }
            },
            None,
        );
        self.state.reveal = Some(RevealTask {
            token,
            phase: RevealPhase::Fading,
        });
        self.state.status = Status::AwaitingChoice;
    }

    fn advance_pending(&mut self) {
        if self.state.pending.is_none() {
            return;
        }
        if let Some(token) = self.state.hide {
            if self.effects.is_live(token) {
                return;
            }
        }
        if let Some(target) = self.state.pending.take() {
            // play_scene already reported the error if the target is unknown
            let _ = self.play_scene(&target);
        }
    }

    fn drain_choices(&mut self) {
        for event in self.channel.drain() {
            if let Some(epoch) = event.epoch {
                if epoch != self.state.epoch {
                    warn!(
                        target_scene = event.target.as_str(),
                        "dropping stale choice event"
                    );
                    continue;
                }
            }
            self.select_choice(event.target);
        }
    }

    /// Starts a fresh hide fade over `widgets`, cancelling any previous hide
    /// task. Runs unconditionally on every transition so no stale button
    /// stays interactive; interactivity is revoked immediately, visibility
    /// once the fade lands.
    fn restart_hide_task(&mut self, widgets: Vec<WidgetHandle>) {
        if let Some(token) = self.state.hide.take() {
            self.effects.cancel(token);
        }

        for widget in &widgets {
            widget.borrow_mut().set_interactive(false);
        }

        let fade_widgets = widgets.clone();
        let token = self.effects.run_fade(
            1.0,
            0.0,
            HIDE_FADE_SECS,
            EasingType::EaseInOut,
            move |alpha| {
                for widget in &fade_widgets {
                    widget.borrow_mut().set_opacity(alpha);
                }
            },
            Some(Box::new(move || {
                for widget in &widgets {
                    let mut widget = widget.borrow_mut();
                    widget.set_opacity(0.0);
                    widget.set_visible(false);
                }
            })),
        );
        self.state.hide = Some(token);
    }

    fn restart_reveal_task(&mut self, scene: &Scene) {
        if let Some(task) = self.state.reveal.take() {
            self.effects.cancel(task.token);
        }
        let token = self.effects.run_delay(scene.choice_delay, || {});
        self.state.reveal = Some(RevealTask {
            token,
            phase: RevealPhase::Waiting,
        });
    }

    fn current_choice_widgets(&self) -> Vec<WidgetHandle> {
        self.state
            .current
            .as_ref()
            .and_then(|id| self.graph.get(id))
            .map(|scene| scene.choices.iter().map(|c| c.widget.clone()).collect())
            .unwrap_or_default()
    }

    fn hide_all_choice_widgets(&self) {
        for scene in self.graph.scenes() {
            for choice in &scene.choices {
                let mut widget = choice.widget.borrow_mut();
                widget.set_opacity(0.0);
                widget.set_visible(false);
                widget.set_interactive(false);
            }
        }
    }
}
