use serde::{Deserialize, Serialize};

use crate::config::ConfigurationRecord;
use crate::world::Transform;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PrefabNode {
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub children: Vec<PrefabNode>,
}

fn default_active() -> bool {
    true
}

impl PrefabNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::IDENTITY,
            active: true,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_children(mut self, children: Vec<PrefabNode>) -> Self {
        self.children = children;
        self
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(PrefabNode::node_count)
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PrefabAsset {
    pub name: String,
    #[serde(default)]
    pub replicable: bool,
    pub root: PrefabNode,
    #[serde(default)]
    pub configuration: Option<ConfigurationRecord>,
}

impl PrefabAsset {
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}
