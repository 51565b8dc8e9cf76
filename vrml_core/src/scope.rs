use crate::sync::{read, write};
use ahash::AHashMap;
use std::sync::{Arc, RwLock};
use vrml_ids::NodeID;

/// Names given to nodes with `DEF`. A scope falls back to its parent when a
/// name is not defined locally.
#[derive(Debug)]
pub struct Scope {
    id: String,
    parent: Option<Arc<Scope>>,
    names: RwLock<AHashMap<String, NodeID>>,
}

impl Scope {
    pub fn new(id: impl Into<String>, parent: Option<Arc<Scope>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            parent,
            names: RwLock::new(AHashMap::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    /// Bind `name` to `node`, returning the node it previously named here.
    pub fn define(&self, name: impl Into<String>, node: NodeID) -> Option<NodeID> {
        write(&self.names).insert(name.into(), node)
    }

    pub fn undefine(&self, name: &str) -> Option<NodeID> {
        write(&self.names).remove(name)
    }

    pub fn find_node(&self, name: &str) -> Option<NodeID> {
        if let Some(id) = read(&self.names).get(name) {
            return Some(*id);
        }
        self.parent.as_ref().and_then(|p| p.find_node(name))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.names).keys().cloned().collect();
        names.sort();
        names
    }
}
