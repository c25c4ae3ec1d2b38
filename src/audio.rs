//! # Audio Module
//!
//! Background-music crossfades and one-shot cue dispatch, keyed by scene.
//!
//! ## Responsibilities
//! - **Bindings**: Static scene-to-track tables, validated at load time.
//! - **Crossfade**: Concurrent fade-out/fade-in across two music voices.
//! - **Grace Fade**: Scenes with no bound track fade the music out slowly
//!   instead of cutting it, which avoids audible pops.
//! - **Cues**: At most one one-shot per scene activation, on its own channel.
//!
//! ## Key Types
//! - `AudioBindings`: scene → music track and scene → cue maps.
//! - `AudioDirector`: drives the host's audio sinks through the scheduler.

use crate::animation::{CancelToken, DoneFn, EasingType, Scheduler};
use crate::errors::StoryError;
use crate::host::SinkHandle;
use crate::scene::SceneId;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Identifier of a host-owned audio track.
pub type TrackId = String;

/// Music crossfade duration in seconds.
pub const CROSSFADE_SECS: f64 = 1.5;
/// Grace fade-out for scenes that intentionally carry no music.
pub const UNBOUND_FADE_SECS: f64 = 10.0;

/// One background-music track and the scenes it plays under.
#[derive(Debug, Clone)]
pub struct MusicGroup {
    pub track: TrackId,
    pub scenes: Vec<SceneId>,
}

/// Static scene-to-audio configuration.
///
/// Built once at startup. A scene listed in two music groups, or bound to
/// two cues, is a configuration error rather than a silent first-match.
#[derive(Debug, Default)]
pub struct AudioBindings {
    music: HashMap<SceneId, TrackId>,
    cues: HashMap<SceneId, TrackId>,
}

impl AudioBindings {
    /// Flattens music groups and cue pairs into lookup maps, rejecting any
    /// scene that would be ambiguously bound.
    pub fn build(
        groups: Vec<MusicGroup>,
        cues: Vec<(SceneId, TrackId)>,
    ) -> Result<Self, StoryError> {
        let mut music = HashMap::new();
        for group in groups {
            for scene in group.scenes {
                if music.insert(scene.clone(), group.track.clone()).is_some() {
                    return Err(StoryError::AmbiguousAudioBinding { scene });
                }
            }
        }

        let mut cue_map = HashMap::new();
        for (scene, track) in cues {
            if cue_map.insert(scene.clone(), track).is_some() {
                return Err(StoryError::AmbiguousCueBinding { scene });
            }
        }

        Ok(Self {
            music,
            cues: cue_map,
        })
    }

    pub fn music_for(&self, scene: &str) -> Option<&TrackId> {
        self.music.get(scene)
    }

    pub fn cue_for(&self, scene: &str) -> Option<&TrackId> {
        self.cues.get(scene)
    }
}

/// One music output channel plus the engine-side state its fade callbacks
/// share: the last volume applied and whether the sink is still playing.
///
/// Fades read `level` as their starting point, so an interrupted fade
/// resumes from wherever it actually left the voice rather than snapping
/// back to full volume.
struct Voice {
    sink: SinkHandle,
    level: Rc<Cell<f32>>,
    live: Rc<Cell<bool>>,
    fade: Option<CancelToken>,
}

impl Voice {
    fn new(sink: SinkHandle) -> Self {
        Self {
            sink,
            level: Rc::new(Cell::new(0.0)),
            live: Rc::new(Cell::new(false)),
            fade: None,
        }
    }

    fn is_live(&self) -> bool {
        self.live.get()
    }

    fn cancel_fade(&mut self, effects: &mut Scheduler) {
        if let Some(token) = self.fade.take() {
            effects.cancel(token);
        }
    }

    /// Starts `track` on this voice at zero volume, ready to fade in.
    fn begin(&mut self, track: &TrackId) {
        self.level.set(0.0);
        self.live.set(true);
        let mut sink = self.sink.borrow_mut();
        sink.set_volume(0.0);
        sink.start(track);
    }

    /// Fades from the voice's current volume to `target`. With
    /// `stop_when_done` the sink is stopped and marked silent on completion.
    fn fade_to(
        &mut self,
        effects: &mut Scheduler,
        target: f32,
        duration: f64,
        easing: EasingType,
        stop_when_done: bool,
    ) {
        let on_complete: Option<DoneFn> = if stop_when_done {
            let sink = self.sink.clone();
            let live = self.live.clone();
            Some(Box::new(move || {
                sink.borrow_mut().stop();
                live.set(false);
            }))
        } else {
            None
        };

        let sink = self.sink.clone();
        let level = self.level.clone();
        self.fade = Some(effects.run_fade(
            self.level.get(),
            target,
            duration,
            easing,
            move |v| {
                level.set(v);
                sink.borrow_mut().set_volume(v);
            },
            on_complete,
        ));
    }
}

/// Drives background music and one-shot cues for scene activations.
///
/// Owns two music voices so an outgoing track can fade to silence while the
/// incoming one fades in. Starting a new transition always cancels both
/// voices' in-flight fades first, and every voice still audible afterwards
/// gets a fresh fade-out, so an interrupted crossfade can never strand a
/// voice playing at a frozen volume.
pub struct AudioDirector {
    bindings: AudioBindings,
    voices: [Voice; 2],
    /// Index into `voices` of the voice carrying the current track.
    active: usize,
    cue_channel: SinkHandle,
    current_track: Option<TrackId>,
    music_level: f32,
}

impl AudioDirector {
    pub fn new(
        bindings: AudioBindings,
        voice_a: SinkHandle,
        voice_b: SinkHandle,
        cue_channel: SinkHandle,
    ) -> Self {
        Self {
            bindings,
            voices: [Voice::new(voice_a), Voice::new(voice_b)],
            active: 0,
            cue_channel,
            current_track: None,
            music_level: 1.0,
        }
    }

    /// Sets the full music level targeted by fade-ins (0.0 to 1.0).
    pub fn set_music_level(&mut self, level: f32) {
        self.music_level = level.clamp(0.0, 1.0);
    }

    /// The track currently playing (or crossfading in), if any.
    pub fn current_track(&self) -> Option<&TrackId> {
        self.current_track.as_ref()
    }

    /// Updates background music for `scene`.
    ///
    /// The same bound track as the current one is a no-op. A different track
    /// triggers a crossfade; an unbound scene triggers the long grace
    /// fade-out. Either path first cancels both voices' in-flight fades.
    pub fn on_scene_activated(&mut self, effects: &mut Scheduler, scene: &str) {
        let next = self.bindings.music_for(scene).cloned();
        if next == self.current_track {
            return;
        }

        for voice in &mut self.voices {
            voice.cancel_fade(effects);
        }

        match next {
            Some(track) => {
                debug!(scene, track = track.as_str(), "starting music crossfade");
                // Swap voices only when something is actually playing; the
                // first track can use the active voice directly.
                let incoming = if self.current_track.is_some() {
                    1 - self.active
                } else {
                    self.active
                };
                let outgoing = 1 - incoming;

                if self.voices[outgoing].is_live() {
                    self.voices[outgoing].fade_to(
                        effects,
                        0.0,
                        CROSSFADE_SECS,
                        EasingType::Linear,
                        true,
                    );
                }

                self.voices[incoming].begin(&track);
                self.voices[incoming].fade_to(
                    effects,
                    self.music_level,
                    CROSSFADE_SECS,
                    EasingType::Linear,
                    false,
                );

                self.active = incoming;
                self.current_track = Some(track);
            }
            None => {
                if self.voices.iter().any(Voice::is_live) {
                    debug!(scene, "no bound track; grace fade-out");
                    for voice in &mut self.voices {
                        if voice.is_live() {
                            voice.fade_to(
                                effects,
                                0.0,
                                UNBOUND_FADE_SECS,
                                EasingType::EaseInOut,
                                true,
                            );
                        }
                    }
                }
                self.current_track = None;
            }
        }
    }

    /// Plays the scene's bound one-shot cue, if any, on the cue channel.
    ///
    /// Called once per scene activation; the cue channel is separate from
    /// both music voices, so cues and music fades never truncate each other.
    pub fn play_one_shot_if_bound(&mut self, scene: &str) {
        if let Some(track) = self.bindings.cue_for(scene) {
            debug!(scene, track = track.as_str(), "playing one-shot cue");
            self.cue_channel.borrow_mut().start(track);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::AudioSink;
    use std::cell::RefCell;

    /// Records every call so tests can assert on ordering and volumes.
    #[derive(Default)]
    struct RecordingSink {
        pub events: Vec<String>,
        pub volume: f32,
        pub playing: Option<TrackId>,
    }

    impl AudioSink for RecordingSink {
        fn start(&mut self, track: &TrackId) {
            self.events.push(format!("start:{track}"));
            self.playing = Some(track.clone());
        }

        fn stop(&mut self) {
            self.events.push("stop".into());
            self.playing = None;
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }
    }

    type SharedSink = Rc<RefCell<RecordingSink>>;

    fn director(bindings: AudioBindings) -> (AudioDirector, SharedSink, SharedSink, SharedSink) {
        let a: SharedSink = Rc::new(RefCell::new(RecordingSink::default()));
        let b: SharedSink = Rc::new(RefCell::new(RecordingSink::default()));
        let cue: SharedSink = Rc::new(RefCell::new(RecordingSink::default()));
        let dir = AudioDirector::new(bindings, a.clone(), b.clone(), cue.clone());
        (dir, a, b, cue)
    }

    fn bindings() -> AudioBindings {
        AudioBindings::build(
            vec![
                MusicGroup {
                    track: "theme".into(),
                    scenes: vec!["Intro".into(), "Chapter1".into()],
                },
                MusicGroup {
                    track: "tense".into(),
                    scenes: vec!["Fork".into()],
                },
            ],
            vec![("Fork".into(), "sting".into())],
        )
        .unwrap()
    }

    #[test]
    fn build_rejects_ambiguous_music_binding() {
        let err = AudioBindings::build(
            vec![
                MusicGroup {
                    track: "a".into(),
                    scenes: vec!["Intro".into()],
                },
                MusicGroup {
                    track: "b".into(),
                    scenes: vec!["Intro".into()],
                },
            ],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoryError::AmbiguousAudioBinding { scene } if scene == "Intro"
        ));
    }

    #[test]
    fn crossfade_is_idempotent_for_the_same_track() {
        let mut effects = Scheduler::new();
        let (mut dir, a, _b, _cue) = director(bindings());

        dir.on_scene_activated(&mut effects, "Intro");
        assert_eq!(a.borrow().events, vec!["start:theme"]);
        assert_eq!(effects.len(), 1, "first activation fades the track in");

        effects.tick(CROSSFADE_SECS);
        assert!(effects.is_empty());

        // Same track bound to a different scene: no new fade, no restart.
        dir.on_scene_activated(&mut effects, "Chapter1");
        assert_eq!(a.borrow().events, vec!["start:theme"]);
        assert!(effects.is_empty());
    }

    #[test]
    fn switching_tracks_crossfades_and_stops_the_old_voice() {
        let mut effects = Scheduler::new();
        let (mut dir, a, b, _cue) = director(bindings());

        dir.on_scene_activated(&mut effects, "Intro");
        effects.tick(CROSSFADE_SECS);

        dir.on_scene_activated(&mut effects, "Fork");
        assert_eq!(b.borrow().events, vec!["start:tense"]);
        assert_eq!(effects.len(), 2, "fade-out and fade-in run concurrently");

        effects.tick(CROSSFADE_SECS / 2.0);
        assert!(a.borrow().volume < 1.0);
        assert!(b.borrow().volume > 0.0);

        effects.tick(CROSSFADE_SECS);
        assert_eq!(a.borrow().events.last().unwrap(), "stop");
        assert!((b.borrow().volume - 1.0).abs() < 1e-5);
        assert_eq!(dir.current_track(), Some(&"tense".to_string()));
    }

    #[test]
    fn restarting_a_crossfade_cancels_the_previous_one() {
        let mut effects = Scheduler::new();
        let (mut dir, a, _b, _cue) = director(bindings());

        dir.on_scene_activated(&mut effects, "Intro");
        effects.tick(CROSSFADE_SECS);

        // Mid-crossfade to "tense", bounce straight back to "theme".
        dir.on_scene_activated(&mut effects, "Fork");
        effects.tick(CROSSFADE_SECS / 4.0);
        dir.on_scene_activated(&mut effects, "Intro");

        // The superseded fade-out's stop callback must never fire against
        // the voice that is now fading back in.
        let stops = a.borrow().events.iter().filter(|e| *e == "stop").count();
        effects.tick(CROSSFADE_SECS * 2.0);
        assert_eq!(
            a.borrow().events.iter().filter(|e| *e == "stop").count(),
            stops,
            "cancelled fade-out must not stop the reused voice"
        );
        assert_eq!(dir.current_track(), Some(&"theme".to_string()));
    }

    #[test]
    fn unbound_scene_fades_out_over_grace_duration() {
        let mut effects = Scheduler::new();
        let (mut dir, a, _b, _cue) = director(bindings());

        dir.on_scene_activated(&mut effects, "Intro");
        effects.tick(CROSSFADE_SECS);

        dir.on_scene_activated(&mut effects, "Silent");
        assert_eq!(dir.current_track(), None);

        effects.tick(UNBOUND_FADE_SECS / 2.0);
        assert!(a.borrow().volume > 0.0, "grace fade is still audible");
        assert!(a.borrow().playing.is_some());

        effects.tick(UNBOUND_FADE_SECS);
        assert!(a.borrow().volume.abs() < 1e-4);
        assert!(a.borrow().playing.is_none());
    }

    #[test]
    fn unbound_scene_silences_both_voices_of_an_interrupted_crossfade() {
        let mut effects = Scheduler::new();
        let (mut dir, a, b, _cue) = director(bindings());

        dir.on_scene_activated(&mut effects, "Intro");
        effects.tick(CROSSFADE_SECS);

        // Interrupt the theme→tense crossfade with an unbound scene while
        // both voices are audible.
        dir.on_scene_activated(&mut effects, "Fork");
        effects.tick(CROSSFADE_SECS / 4.0);
        dir.on_scene_activated(&mut effects, "Silent");

        effects.tick(UNBOUND_FADE_SECS * 2.0);
        assert!(a.borrow().playing.is_none(), "outgoing voice must not leak");
        assert!(b.borrow().playing.is_none(), "incoming voice must not leak");
        assert!(a.borrow().volume.abs() < 1e-4);
        assert!(b.borrow().volume.abs() < 1e-4);
    }

    #[test]
    fn interrupted_fade_resumes_from_its_current_volume() {
        let mut effects = Scheduler::new();
        let (mut dir, a, _b, _cue) = director(bindings());

        dir.on_scene_activated(&mut effects, "Intro");
        effects.tick(CROSSFADE_SECS);

        dir.on_scene_activated(&mut effects, "Fork");
        effects.tick(CROSSFADE_SECS / 4.0);
        let mid = a.borrow().volume;
        assert!(mid < 1.0);

        // The replacement fade-out picks up where the cancelled one left
        // the voice instead of snapping back to full volume.
        dir.on_scene_activated(&mut effects, "Silent");
        effects.tick(1.0 / 60.0);
        assert!(
            a.borrow().volume <= mid + 1e-4,
            "fade-out must not jump above its interrupted volume"
        );
    }

    #[test]
    fn one_shot_plays_on_the_cue_channel_only() {
        let mut effects = Scheduler::new();
        let (mut dir, a, b, cue) = director(bindings());

        dir.play_one_shot_if_bound("Fork");
        assert_eq!(cue.borrow().events, vec!["start:sting"]);
        assert!(a.borrow().events.is_empty());
        assert!(b.borrow().events.is_empty());

        dir.play_one_shot_if_bound("Intro");
        assert_eq!(cue.borrow().events.len(), 1, "no cue bound for Intro");

        // Cue dispatch schedules nothing; it cannot race the music fades.
        assert!(effects.is_empty());
        dir.on_scene_activated(&mut effects, "Fork");
        assert_eq!(cue.borrow().events.len(), 1);
    }
}
