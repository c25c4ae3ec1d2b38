//! # Story Engine
//!
//! `story-engine` is the playback core for interactive, video-based
//! branching narratives: a graph of video scenes, timed choice buttons that
//! pick the next scene, background-music crossfades, one-shot cues, and a
//! pausable playback clock.
//!
//! The engine owns no rendering, decoding, or widget layout. Those arrive as
//! host capabilities (see [`host`]); the engine's job is the part with real
//! state and ordering hazards: the scene transition order, and the
//! cancellable timed effects that must never race each other across rapid
//! transitions.
//!
//! ## Core Features
//!
//! *   **Scene Graph**: Static, validated at load time; dangling references
//!     refuse to start the engine instead of failing mid-playback.
//! *   **Effect Scheduler**: Cooperative fade/delay tasks with synchronous,
//!     token-based cancellation.
//! *   **Audio Layer**: Per-scene music bindings with crossfades and a
//!     separate one-shot cue channel.
//! *   **State Machine**: `Idle → Playing → AwaitingChoice → Ended`, driven
//!     by media-end and choice-selection events.
//! *   **Pause**: One gate that freezes effects and media without losing
//!     fade progress.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use story_engine::{AudioBindings, AudioDirector, Scene, SceneGraph, StoryDirector};
//! # use std::{cell::RefCell, rc::Rc};
//! # use story_engine::{AudioSink, MediaPlayer, ResumeStore, StoryHost, TrackId};
//! # struct Stub;
//! # impl MediaPlayer for Stub {
//! #     fn load(&mut self, _: &String) {} fn set_looping(&mut self, _: bool) {}
//! #     fn play(&mut self) {} fn pause(&mut self) {} fn stop(&mut self) {}
//! # }
//! # impl AudioSink for Stub {
//! #     fn start(&mut self, _: &TrackId) {} fn stop(&mut self) {}
//! #     fn set_volume(&mut self, _: f32) {}
//! # }
//! # impl StoryHost for Stub {
//! #     fn on_story_ended(&mut self, _: &str) {} fn on_return_to_menu(&mut self, _: &str) {}
//! # }
//! # impl ResumeStore for Stub {
//! #     fn load(&self) -> Option<String> { None }
//! #     fn save(&mut self, _: &str) -> anyhow::Result<()> { Ok(()) }
//! # }
//!
//! let graph = SceneGraph::build(vec![Scene::new("Intro", "intro.mp4")]).unwrap();
//! let audio = AudioDirector::new(
//!     AudioBindings::default(),
//!     Rc::new(RefCell::new(Stub)),
//!     Rc::new(RefCell::new(Stub)),
//!     Rc::new(RefCell::new(Stub)),
//! );
//! let mut director = StoryDirector::new(
//!     graph,
//!     audio,
//!     Rc::new(RefCell::new(Stub)),
//!     Rc::new(RefCell::new(Stub)),
//!     Box::new(Stub),
//!     "Intro",
//! );
//! director.start().unwrap();
//! loop {
//!     director.tick(1.0 / 60.0);
//! }
//! ```

/// The static scene graph: scenes, choices, load-time validation.
pub mod scene;

/// Easing curves and the cancellable effect scheduler.
pub mod animation;

/// Background-music crossfades and one-shot cue dispatch.
pub mod audio;

/// Boundary traits for host collaborators (media, widgets, audio output).
pub mod host;

/// The playback state machine and pause controller.
pub mod director;

/// Serde-backed story manifest loading.
pub mod manifest;

pub mod errors;

pub use animation::{CancelToken, EasingType, Scheduler};
pub use audio::{AudioBindings, AudioDirector, MusicGroup, TrackId};
pub use director::{ChoiceChannel, ChoiceEvent, Status, StoryDirector};
pub use errors::StoryError;
pub use host::{
    AudioSink, HostHandle, MediaHandle, MediaPlayer, MiniGame, MiniGameHandle, SinkHandle,
    StoryHost, Widget, WidgetHandle,
};
pub use manifest::StoryManifest;
pub use scene::{Choice, MediaRef, Scene, SceneGraph, SceneId};

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Persistence of the single "last scene" value that survives sessions.
///
/// Read once at engine start to resume where the viewer left off; written on
/// return-to-menu. Implementations may be backed by anything; failures to
/// save are reported but never interrupt playback.
pub trait ResumeStore {
    /// The persisted last scene identifier, if one exists.
    fn load(&self) -> Option<SceneId>;

    /// Persists `scene` as the last scene identifier.
    fn save(&mut self, scene: &str) -> Result<()>;
}

/// File-backed [`ResumeStore`]: the scene id as the whole file content.
pub struct FsResumeStore {
    path: PathBuf,
}

impl FsResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResumeStore for FsResumeStore {
    fn load(&self) -> Option<SceneId> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        let id = text.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    fn save(&mut self, scene: &str) -> Result<()> {
        std::fs::write(&self.path, scene)
            .with_context(|| format!("failed to write resume file {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_resume_store_round_trips_and_handles_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_scene");

        let mut store = FsResumeStore::new(&path);
        assert_eq!(store.load(), None);

        store.save("Chapter1").unwrap();
        assert_eq!(store.load(), Some("Chapter1".to_string()));

        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(store.load(), None, "blank file counts as unset");
    }
}
