use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::world::{NodeId, WorldGraph};

pub(crate) const DEFAULT_PROPERTY_CODE: &str = "manor";
pub(crate) const DEFAULT_PRICE: f32 = 100_000.0;
pub(crate) const DEFAULT_EMPLOYEE_CAPACITY: i32 = 10;

/// How a collection in the record combines with the one already on the property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    Replace,
    Combine,
    CombineDistinct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectionPolicies {
    pub loading_docks: MergePolicy,
    pub switches: MergePolicy,
    pub toggleables: MergePolicy,
    pub idle_points: MergePolicy,
}

impl Default for CollectionPolicies {
    fn default() -> Self {
        Self {
            loading_docks: MergePolicy::Combine,
            switches: MergePolicy::Combine,
            toggleables: MergePolicy::Combine,
            idle_points: MergePolicy::Replace,
        }
    }
}

/// Author-time property settings carried inside a prefab.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigurationRecord {
    pub property_code: String,
    pub price: f32,
    pub employee_capacity: i32,
    pub npc_spawn_point: Option<String>,
    pub loading_docks: Vec<String>,
    pub switches: Vec<String>,
    pub toggleables: Vec<String>,
    pub idle_points: Vec<String>,
    pub listing_poster: Option<String>,
    pub entry_gate: Option<String>,
    pub policies: CollectionPolicies,
}

impl Default for ConfigurationRecord {
    fn default() -> Self {
        Self {
            property_code: DEFAULT_PROPERTY_CODE.to_string(),
            price: DEFAULT_PRICE,
            employee_capacity: DEFAULT_EMPLOYEE_CAPACITY,
            npc_spawn_point: None,
            loading_docks: Vec::new(),
            switches: Vec::new(),
            toggleables: Vec::new(),
            idle_points: Vec::new(),
            listing_poster: None,
            entry_gate: None,
            policies: CollectionPolicies::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundConfiguration {
    pub property_code: String,
    pub price: f32,
    pub employee_capacity: i32,
    pub npc_spawn_point: Option<NodeId>,
    pub loading_docks: Vec<NodeId>,
    pub switches: Vec<NodeId>,
    pub toggleables: Vec<NodeId>,
    pub idle_points: Vec<NodeId>,
    pub listing_poster: Option<NodeId>,
    pub entry_gate: Option<NodeId>,
    pub policies: CollectionPolicies,
    pub unresolved: Vec<String>,
}

impl BoundConfiguration {
    pub fn referenced_nodes(&self) -> HashSet<NodeId> {
        self.loading_docks
            .iter()
            .chain(&self.switches)
            .chain(&self.toggleables)
            .chain(&self.idle_points)
            .chain(&self.npc_spawn_point)
            .chain(&self.listing_poster)
            .chain(&self.entry_gate)
            .copied()
            .collect()
    }
}

impl ConfigurationRecord {
    pub fn bind(&self, world: &dyn WorldGraph, root: NodeId) -> BoundConfiguration {
        let mut unresolved = Vec::new();
        let mut resolve = |name: &str| -> Option<NodeId> {
            let found = world.find_descendant_by_name(root, name);
            if found.is_none() {
                warn!(
                    property_code = %self.property_code,
                    reference = name,
                    root = root.0,
                    "configuration_reference_unresolved"
                );
                unresolved.push(name.to_string());
            }
            found
        };

        let npc_spawn_point = self.npc_spawn_point.as_deref().and_then(&mut resolve);
        let loading_docks = self.loading_docks.iter().filter_map(|n| resolve(n)).collect();
        let switches = self.switches.iter().filter_map(|n| resolve(n)).collect();
        let toggleables = self.toggleables.iter().filter_map(|n| resolve(n)).collect();
        let idle_points = self.idle_points.iter().filter_map(|n| resolve(n)).collect();
        let listing_poster = self.listing_poster.as_deref().and_then(&mut resolve);
        let entry_gate = self.entry_gate.as_deref().and_then(&mut resolve);

        BoundConfiguration {
            property_code: self.property_code.clone(),
            price: self.price,
            employee_capacity: self.employee_capacity,
            npc_spawn_point,
            loading_docks,
            switches,
            toggleables,
            idle_points,
            listing_poster,
            entry_gate,
            policies: self.policies,
            unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PrefabAsset, PrefabNode};
    use crate::world::SceneGraph;

    #[test]
    fn missing_fields_take_defaults() {
        let record: ConfigurationRecord =
            serde_json::from_str(r#"{ "price": 250000 }"#).expect("parse");
        assert_eq!(record.property_code, "manor");
        assert_eq!(record.price, 250_000.0);
        assert_eq!(record.employee_capacity, 10);
        assert_eq!(record.policies.idle_points, MergePolicy::Replace);
        assert_eq!(record.policies.loading_docks, MergePolicy::Combine);
    }

    #[test]
    fn policies_use_snake_case_names() {
        let policies: CollectionPolicies =
            serde_json::from_str(r#"{ "switches": "combine_distinct" }"#).expect("parse");
        assert_eq!(policies.switches, MergePolicy::CombineDistinct);
        assert_eq!(policies.toggleables, MergePolicy::Combine);
    }

    #[test]
    fn bind_resolves_names_below_the_root_and_reports_the_rest() {
        let prefab = PrefabAsset {
            name: "Setup".to_string(),
            replicable: false,
            root: PrefabNode::new("Setup").with_children(vec![
                PrefabNode::new("Dock A"),
                PrefabNode::new("Idle").with_children(vec![PrefabNode::new("Idle 1")]),
            ]),
            configuration: None,
        };
        let mut world = SceneGraph::default();
        let root = world.instantiate(&prefab).expect("instantiate");

        let record = ConfigurationRecord {
            loading_docks: vec!["Dock A".to_string(), "Dock B".to_string()],
            idle_points: vec!["Idle 1".to_string()],
            listing_poster: Some("Poster".to_string()),
            ..ConfigurationRecord::default()
        };
        let bound = record.bind(&world, root);

        assert_eq!(bound.loading_docks.len(), 1);
        assert_eq!(world.name(bound.idle_points[0]), Some("Idle 1"));
        assert_eq!(bound.listing_poster, None);
        assert_eq!(bound.unresolved, vec!["Dock B".to_string(), "Poster".to_string()]);
        assert_eq!(bound.referenced_nodes().len(), 2);
    }
}
