//! # Host Module
//!
//! Boundary traits for the collaborators the engine consumes but does not
//! implement: media decoding/rendering, UI widgets, audio output, the
//! mini-game component, and the outer application.
//!
//! All handles are `Rc<RefCell<_>>` because the engine runs on a single
//! logical thread; the host shares the same tick.

use crate::audio::TrackId;
use crate::scene::MediaRef;
use std::cell::RefCell;
use std::rc::Rc;

/// Opaque video playback capability.
///
/// The engine drives it and never inspects frames. Non-looping playback must
/// report its end to the engine (via [`crate::StoryDirector::handle_media_ended`])
/// exactly once; looping playback never reports an end.
pub trait MediaPlayer {
    fn load(&mut self, media: &MediaRef);
    fn set_looping(&mut self, looping: bool);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
}

/// A UI widget the engine toggles but never owns or destroys.
///
/// Used for choice buttons and for the pause overlay.
pub trait Widget {
    fn set_visible(&mut self, visible: bool);
    fn set_interactive(&mut self, interactive: bool);
    fn set_opacity(&mut self, opacity: f32);
    fn set_label(&mut self, label: &str);
    /// Binds the activation handler, replacing any previous binding.
    fn on_activated(&mut self, callback: Box<dyn Fn()>);
}

/// One output channel of the host audio system.
///
/// The engine owns no samples; it only starts, stops, and fades named tracks.
/// `start` begins playback of `track` at the channel's current volume.
pub trait AudioSink {
    fn start(&mut self, track: &TrackId);
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
}

/// External mini-game component.
///
/// The engine only starts it; the component reports its outcome by pushing a
/// target scene onto the engine's choice channel, exactly like a normal
/// choice button.
pub trait MiniGame {
    fn start(&mut self);
}

/// The outer application, informed of terminal transitions.
pub trait StoryHost {
    /// An ending scene finished playing. Invoked at most once per session.
    fn on_story_ended(&mut self, last_scene: &str);
    /// The viewer asked to leave the narrative; `last_scene` has been
    /// persisted for resume-on-reentry.
    fn on_return_to_menu(&mut self, last_scene: &str);
}

/// Shared handle to a host widget.
pub type WidgetHandle = Rc<RefCell<dyn Widget>>;
/// Shared handle to a host audio channel.
pub type SinkHandle = Rc<RefCell<dyn AudioSink>>;
/// Shared handle to the host media player.
pub type MediaHandle = Rc<RefCell<dyn MediaPlayer>>;
/// Shared handle to the mini-game component.
pub type MiniGameHandle = Rc<RefCell<dyn MiniGame>>;
/// Shared handle to the outer application.
pub type HostHandle = Rc<RefCell<dyn StoryHost>>;
