//! Script nodes and the engines that run them. Engines are registered per
//! media type and per URI scheme; they may live in separately built modules
//! found on the script search path.

mod context;
mod node;
mod registry;

pub use context::*;
pub use node::*;
pub use registry::*;

use crate::{InterfaceSet, ScriptError};
use std::sync::Arc;
use vrml_field::FieldValue;
use vrml_ids::NodeID;
use vrml_io::ResourceStream;

/// What a factory learns about the node it is building a script for.
#[derive(Clone, Debug)]
pub struct ScriptNodeInfo {
    pub node: NodeID,
    pub interfaces: InterfaceSet,
}

/// One running script. Every hook may read and write the node's fields and
/// eventOuts through the context.
pub trait Script: Send {
    fn initialize(&mut self, _ctx: &mut ScriptContext<'_>, _timestamp: f64) -> Result<(), ScriptError> {
        Ok(())
    }

    fn process_event(
        &mut self,
        ctx: &mut ScriptContext<'_>,
        event_in: &str,
        value: &FieldValue,
        timestamp: f64,
    ) -> Result<(), ScriptError>;

    fn events_processed(&mut self, _ctx: &mut ScriptContext<'_>, _timestamp: f64) -> Result<(), ScriptError> {
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut ScriptContext<'_>, _timestamp: f64) {}
}

/// A script engine's entry point.
pub trait ScriptFactory: Send + Sync {
    /// Build a script from `source`: the fetched resource for a URL, or the
    /// text after the scheme for an inline `scheme:code` URL.
    fn create_script(
        &self,
        node: &ScriptNodeInfo,
        source: Box<dyn ResourceStream>,
    ) -> Result<Box<dyn Script>, ScriptError>;
}

pub type SharedScriptFactory = Arc<dyn ScriptFactory>;
