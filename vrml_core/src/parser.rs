use crate::{Node, Scene, SceneError, Scope};
use std::collections::BTreeMap;
use std::sync::Arc;
use vrml_io::ResourceStream;

/// What a parser produced from one stream.
#[derive(Default)]
pub struct ParsedScene {
    pub nodes: Vec<Arc<Node>>,
    pub meta: BTreeMap<String, String>,
    pub scope: Option<Arc<Scope>>,
}

/// Turns a stream into nodes. Nodes are created through the scene's browser
/// and left uninitialized; routes between them may already be added.
pub trait SceneParser: Send + Sync {
    fn parse(
        &self,
        stream: &mut dyn ResourceStream,
        url: &str,
        media_type: &str,
        scene: &Arc<Scene>,
    ) -> Result<ParsedScene, SceneError>;
}

/// Parser installed when none is configured. Rejects every stream.
#[derive(Default)]
pub struct NullParser;

impl SceneParser for NullParser {
    fn parse(
        &self,
        _stream: &mut dyn ResourceStream,
        url: &str,
        media_type: &str,
        _scene: &Arc<Scene>,
    ) -> Result<ParsedScene, SceneError> {
        log::warn!("no parser installed; cannot read {url}");
        Err(SceneError::BadMediaType(media_type.to_string()))
    }
}
