use crate::scene::SceneId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Unknown scene: {0}")]
    UnknownScene(SceneId),
    #[error("Scene '{scene}' references unknown scene '{target}'")]
    UnknownSceneReference { scene: SceneId, target: SceneId },
    #[error("Duplicate scene id: {0}")]
    DuplicateScene(SceneId),
    #[error("Scene '{0}' has no media reference")]
    MissingMedia(SceneId),
    #[error("Scene '{scene}' is bound to more than one music track")]
    AmbiguousAudioBinding { scene: SceneId },
    #[error("Scene '{scene}' is bound to more than one cue")]
    AmbiguousCueBinding { scene: SceneId },
    #[error("Malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
