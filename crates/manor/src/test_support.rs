use crate::config::ConfigurationRecord;
use crate::content::{encode_bundle, PrefabAsset, PrefabNode};
use crate::property::{Property, PropertyStore};
use crate::world::{NodeId, SceneGraph, Transform, Vec3, WorldGraph, WorldGraphError};

pub(crate) const BUNDLE_NAME: &str = "chloemanorsetup";
pub(crate) const PREFAB_NAME: &str = "ManorSetup-Chloe";
pub(crate) const POSTER_NAME: &str = "PropertyListing Hilltop Manor";
pub(crate) const WHITEBOARD_PATH: &str = "/Map/Container/RE Office/Interior/Whiteboard";
pub(crate) const PROPERTY_PATH: &str = "@Properties/Manor";
pub(crate) const ORIGINAL_DOOR_PATH: &str = "@Properties/Manor/House/MansionDoor";

pub(crate) fn at(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_position(Vec3::new(x, y, z))
}

pub(crate) fn manor_record() -> ConfigurationRecord {
    ConfigurationRecord {
        price: 250_000.0,
        employee_capacity: 3,
        npc_spawn_point: Some("NPC Spawn".to_string()),
        loading_docks: vec!["Dock 1".to_string(), "Dock 2".to_string()],
        switches: vec!["Light Switch".to_string()],
        toggleables: vec!["Garage Door".to_string()],
        idle_points: vec![
            "Idle 1".to_string(),
            "Idle 2".to_string(),
            "Idle 3".to_string(),
        ],
        listing_poster: Some(POSTER_NAME.to_string()),
        entry_gate: Some("Manor Gate".to_string()),
        ..ConfigurationRecord::default()
    }
}

pub(crate) fn manor_prefab() -> PrefabAsset {
    PrefabAsset {
        name: PREFAB_NAME.to_string(),
        replicable: true,
        root: PrefabNode::new(PREFAB_NAME).with_children(vec![
            PrefabNode::new("NPC Spawn").with_transform(at(0.0, 0.0, 4.0)),
            PrefabNode::new("Docks").with_children(vec![
                PrefabNode::new("Dock 1").with_transform(at(10.0, 0.0, 0.0)),
                PrefabNode::new("Dock 2").with_transform(at(12.0, 0.0, 0.0)),
            ]),
            PrefabNode::new("Light Switch"),
            PrefabNode::new("Garage Door"),
            PrefabNode::new("Idle").with_children(vec![
                PrefabNode::new("Idle 1"),
                PrefabNode::new("Idle 2"),
                PrefabNode::new("Idle 3"),
            ]),
            PrefabNode::new("Manor Gate"),
            PrefabNode::new(POSTER_NAME)
                .with_transform(at(2.0, 1.5, 0.0))
                .with_active(false),
        ]),
        configuration: Some(manor_record()),
    }
}

pub(crate) fn manor_bundle_bytes() -> Vec<u8> {
    encode_bundle(BUNDLE_NAME, &[manor_prefab()]).expect("encode manor bundle")
}

/// A host world with the real-estate whiteboard, the manor property node and one original
/// door that the mod replaces.
pub(crate) fn host_world() -> (SceneGraph, NodeId) {
    let mut world = SceneGraph::default();
    let whiteboard = world.ensure_path(WHITEBOARD_PATH).expect("whiteboard");
    world.set_local_transform(whiteboard, at(-30.0, 2.0, 8.0));
    let property = world.ensure_path(PROPERTY_PATH).expect("property node");
    world.set_local_transform(property, at(100.0, 0.0, 100.0));
    world.ensure_path(ORIGINAL_DOOR_PATH).expect("door");
    (world, property)
}

pub(crate) fn manor_store(node: Option<NodeId>) -> PropertyStore {
    let mut property = Property::new("manor", "Hilltop Manor");
    property.node = node;
    let mut store = PropertyStore::new();
    store.insert(property);
    store
}

/// Wraps a [`SceneGraph`] and misbehaves on request.
#[derive(Debug, Default)]
pub(crate) struct ScriptedWorld {
    inner: SceneGraph,
    strip_identity: bool,
    instantiate_failure: Option<String>,
}

impl ScriptedWorld {
    /// Instances come out without a replication identity even if the prefab declares one.
    pub(crate) fn strip_replication_identity(mut self) -> Self {
        self.strip_identity = true;
        self
    }

    pub(crate) fn fail_instantiation(mut self, reason: &str) -> Self {
        self.instantiate_failure = Some(reason.to_string());
        self
    }

    pub(crate) fn inner(&self) -> &SceneGraph {
        &self.inner
    }
}

impl WorldGraph for ScriptedWorld {
    fn instantiate(&mut self, prefab: &PrefabAsset) -> Result<NodeId, WorldGraphError> {
        if let Some(reason) = &self.instantiate_failure {
            return Err(WorldGraphError::InstantiateRejected {
                prefab: prefab.name.clone(),
                reason: reason.clone(),
            });
        }
        let root = self.inner.instantiate(prefab)?;
        if self.strip_identity {
            self.inner.set_replication_identity(root, false);
        }
        Ok(root)
    }

    fn destroy(&mut self, node: NodeId) -> bool {
        self.inner.destroy(node)
    }

    fn contains(&self, node: NodeId) -> bool {
        self.inner.contains(node)
    }

    fn name(&self, node: NodeId) -> Option<&str> {
        self.inner.name(node)
    }

    fn rename(&mut self, node: NodeId, name: &str) -> bool {
        self.inner.rename(node, name)
    }

    fn has_replication_identity(&self, node: NodeId) -> bool {
        self.inner.has_replication_identity(node)
    }

    fn find_node_by_path(&self, path: &str) -> Option<NodeId> {
        self.inner.find_node_by_path(path)
    }

    fn find_descendant_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.inner.find_descendant_by_name(root, name)
    }

    fn reparent(
        &mut self,
        node: NodeId,
        new_parent: Option<NodeId>,
        keep_world_transform: bool,
    ) -> Result<(), WorldGraphError> {
        self.inner.reparent(node, new_parent, keep_world_transform)
    }

    fn set_active(&mut self, node: NodeId, active: bool) -> bool {
        self.inner.set_active(node, active)
    }

    fn is_active(&self, node: NodeId) -> Option<bool> {
        self.inner.is_active(node)
    }

    fn world_transform(&self, node: NodeId) -> Option<Transform> {
        self.inner.world_transform(node)
    }
}
