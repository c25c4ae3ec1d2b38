//! # Scene Module
//!
//! The static scene graph: scenes, their choices, and load-time validation.
//!
//! The graph is built once at startup and never mutated afterwards. Every
//! scene reference (`auto_next`, `Choice::next_scene`) is checked at build
//! time; a dangling reference refuses to start the engine rather than
//! surfacing mid-playback.

use crate::errors::StoryError;
use crate::host::WidgetHandle;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Unique string key identifying a scene.
pub type SceneId = String;
/// Opaque media handle, resolved by the host media player.
pub type MediaRef = String;

/// A labeled, clickable option leading to a specific next scene.
///
/// The widget is owned by the UI layer; the engine only toggles its
/// visibility, opacity, and interactivity.
#[derive(Clone)]
pub struct Choice {
    pub label: String,
    pub next_scene: SceneId,
    pub widget: WidgetHandle,
}

impl fmt::Debug for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Choice")
            .field("label", &self.label)
            .field("next_scene", &self.next_scene)
            .finish()
    }
}

/// One narrative unit: a piece of media plus optional branching.
#[derive(Clone)]
pub struct Scene {
    pub id: SceneId,
    pub media: MediaRef,
    pub looping: bool,
    /// When true the scene holds (or loops) until a choice is selected.
    pub waits_for_choices: bool,
    /// Seconds before the choice buttons begin revealing.
    pub choice_delay: f64,
    pub choices: Vec<Choice>,
    /// Scene to advance to when non-waiting media ends.
    pub auto_next: Option<SceneId>,
    /// Side-effect hook invoked exactly once per activation, right after
    /// playback has been requested.
    pub on_enter: Option<Rc<dyn Fn()>>,
    /// Terminal scene: media end hands control back to the outer application.
    pub is_ending: bool,
}

impl Scene {
    /// Creates a plain scene with no choices, no auto-advance, and defaults
    /// everywhere else. Fields are public; set what the scene needs.
    pub fn new(id: impl Into<SceneId>, media: impl Into<MediaRef>) -> Self {
        Self {
            id: id.into(),
            media: media.into(),
            looping: false,
            waits_for_choices: false,
            choice_delay: 0.0,
            choices: Vec::new(),
            auto_next: None,
            on_enter: None,
            is_ending: false,
        }
    }
}

// Manual Debug because `on_enter` is an opaque closure.
impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("media", &self.media)
            .field("looping", &self.looping)
            .field("waits_for_choices", &self.waits_for_choices)
            .field("choice_delay", &self.choice_delay)
            .field("choices", &self.choices)
            .field("auto_next", &self.auto_next)
            .field("is_ending", &self.is_ending)
            .finish()
    }
}

/// Immutable mapping from scene identifier to [`Scene`], with O(1) lookup.
#[derive(Debug)]
pub struct SceneGraph {
    scenes: HashMap<SceneId, Scene>,
}

impl SceneGraph {
    /// Builds and validates the graph.
    ///
    /// Fails fast on duplicate ids, empty media references, and links
    /// (`auto_next`, `Choice::next_scene`) to scenes that do not exist.
    pub fn build(scenes: Vec<Scene>) -> Result<Self, StoryError> {
        let mut map: HashMap<SceneId, Scene> = HashMap::with_capacity(scenes.len());

        for scene in scenes {
            if scene.media.is_empty() {
                return Err(StoryError::MissingMedia(scene.id));
            }
            if map.contains_key(&scene.id) {
                return Err(StoryError::DuplicateScene(scene.id));
            }
            map.insert(scene.id.clone(), scene);
        }

        for scene in map.values() {
            if let Some(target) = &scene.auto_next {
                if !map.contains_key(target) {
                    return Err(StoryError::UnknownSceneReference {
                        scene: scene.id.clone(),
                        target: target.clone(),
                    });
                }
            }
            for choice in &scene.choices {
                if !map.contains_key(&choice.next_scene) {
                    return Err(StoryError::UnknownSceneReference {
                        scene: scene.id.clone(),
                        target: choice.next_scene.clone(),
                    });
                }
            }
        }

        Ok(Self { scenes: map })
    }

    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
