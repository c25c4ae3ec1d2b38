//! # Manifest Module
//!
//! Serde-backed definition of a story: the scene list, the audio binding
//! tables, and the starting scene. The manifest is the static data the
//! engine is assumed to be supplied with; `build` turns it into a validated
//! [`SceneGraph`] and [`AudioBindings`], attaching the host's UI widgets to
//! each choice on the way. All configuration errors surface here, before
//! any scene plays.

use crate::audio::{AudioBindings, MusicGroup};
use crate::errors::StoryError;
use crate::host::WidgetHandle;
use crate::scene::{Choice, Scene, SceneGraph};
use serde::{Deserialize, Serialize};

/// Top-level story definition, usually loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryManifest {
    pub start_scene: String,
    pub scenes: Vec<SceneDef>,
    #[serde(default)]
    pub music_groups: Vec<MusicGroupDef>,
    #[serde(default)]
    pub cues: Vec<CueDef>,
    /// Scene whose activation starts the external mini-game, if any.
    #[serde(default)]
    pub minigame_scene: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDef {
    pub name: String,
    pub media: String,
    #[serde(default)]
    pub looping: bool,
    #[serde(default)]
    pub wait_for_choices: bool,
    #[serde(default)]
    pub choice_delay: f64,
    #[serde(default)]
    pub choices: Vec<ChoiceDef>,
    #[serde(default)]
    pub auto_next: Option<String>,
    #[serde(default)]
    pub is_ending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceDef {
    pub label: String,
    pub next: String,
}

/// One music track and the scenes that play under it, mirroring the
/// [`MusicGroup`] table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicGroupDef {
    pub track: String,
    pub scenes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueDef {
    pub scene: String,
    pub track: String,
}

impl StoryManifest {
    pub fn from_json(text: &str) -> Result<Self, StoryError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the validated graph and audio bindings.
    ///
    /// `widgets` supplies the UI handle for each (scene, choice) pair; the
    /// UI layer keeps ownership of the widgets themselves.
    pub fn build(
        self,
        mut widgets: impl FnMut(&SceneDef, &ChoiceDef) -> WidgetHandle,
    ) -> Result<(SceneGraph, AudioBindings), StoryError> {
        let StoryManifest {
            start_scene,
            scenes,
            music_groups,
            cues,
            minigame_scene,
        } = self;

        let bindings = AudioBindings::build(
            music_groups
                .into_iter()
                .map(|g| MusicGroup {
                    track: g.track,
                    scenes: g.scenes,
                })
                .collect(),
            cues.into_iter().map(|c| (c.scene, c.track)).collect(),
        )?;

        let built: Vec<Scene> = scenes
            .iter()
            .map(|def| Scene {
                id: def.name.clone(),
                media: def.media.clone(),
                looping: def.looping,
                waits_for_choices: def.wait_for_choices,
                choice_delay: def.choice_delay,
                choices: def
                    .choices
                    .iter()
                    .map(|c| Choice {
                        label: c.label.clone(),
                        next_scene: c.next.clone(),
                        widget: widgets(def, c),
                    })
                    .collect(),
                auto_next: def.auto_next.clone(),
                on_enter: None,
                is_ending: def.is_ending,
            })
            .collect();

        let graph = SceneGraph::build(built)?;

        if !graph.contains(&start_scene) {
            return Err(StoryError::UnknownScene(start_scene));
        }
        if let Some(trigger) = &minigame_scene {
            if !graph.contains(trigger) {
                return Err(StoryError::UnknownScene(trigger.clone()));
            }
        }

        Ok((graph, bindings))
    }
}
