use std::collections::HashMap;

use crate::content::{PrefabAsset, PrefabNode};

use super::{NodeId, Transform, WorldGraph, WorldGraphError};

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local: Transform,
    pub active: bool,
    pub replication_identity: bool,
}

#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// In-memory [`WorldGraph`] used by the demo host and tests.
#[derive(Debug, Default)]
pub struct SceneGraph {
    allocator: NodeIdAllocator,
    nodes: HashMap<NodeId, SceneNode>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn spawn_root(&mut self, name: &str, local: Transform) -> NodeId {
        let id = self.insert_node(name, None, local);
        self.roots.push(id);
        id
    }

    pub fn spawn_child(
        &mut self,
        parent: NodeId,
        name: &str,
        local: Transform,
    ) -> Result<NodeId, WorldGraphError> {
        if !self.nodes.contains_key(&parent) {
            return Err(WorldGraphError::UnknownNode(parent));
        }
        let id = self.insert_node(name, Some(parent), local);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    /// Resolves `path`, creating every missing segment at the identity transform.
    pub fn ensure_path(&mut self, path: &str) -> Option<NodeId> {
        let mut current: Option<NodeId> = None;
        for segment in split_path(path) {
            let existing = match current {
                None => self.root_named(segment),
                Some(parent) => self.child_named(parent, segment),
            };
            let next = match (existing, current) {
                (Some(id), _) => id,
                (None, None) => self.spawn_root(segment, Transform::IDENTITY),
                (None, Some(parent)) => {
                    self.spawn_child(parent, segment, Transform::IDENTITY).ok()?
                }
            };
            current = Some(next);
        }
        current
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(&node_id)?;
            segments.push(node.name.as_str());
            current = node.parent;
        }
        segments.reverse();
        Some(format!("/{}", segments.join("/")))
    }

    pub fn local_transform(&self, id: NodeId) -> Option<Transform> {
        self.nodes.get(&id).map(|node| node.local)
    }

    pub fn set_local_transform(&mut self, id: NodeId, local: Transform) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.local = local;
                true
            }
            None => false,
        }
    }

    pub fn set_replication_identity(&mut self, id: NodeId, present: bool) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.replication_identity = present;
                true
            }
            None => false,
        }
    }

    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get(&node_id) {
                Some(node) if node.active => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    fn insert_node(&mut self, name: &str, parent: Option<NodeId>, local: Transform) -> NodeId {
        let id = self.allocator.allocate();
        self.nodes.insert(
            id,
            SceneNode {
                id,
                name: name.to_string(),
                parent,
                children: Vec::new(),
                local,
                active: true,
                replication_identity: false,
            },
        );
        id
    }

    fn instantiate_node(&mut self, template: &PrefabNode, parent: Option<NodeId>) -> NodeId {
        let id = self.insert_node(&template.name, parent, template.transform);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.active = template.active;
        }
        for child in &template.children {
            let child_id = self.instantiate_node(child, Some(id));
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(child_id);
            }
        }
        id
    }

    fn root_named(&self, name: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).is_some_and(|node| node.name == name))
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).is_some_and(|node| node.name == name))
    }

    fn resolve_segments(&self, from: NodeId, segments: &[&str]) -> Option<NodeId> {
        let Some((first, rest)) = segments.split_first() else {
            return Some(from);
        };
        self.children(from)
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).is_some_and(|node| node.name == *first))
            .find_map(|id| self.resolve_segments(id, rest))
    }

    fn is_same_or_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.parent(node_id);
        }
        false
    }

    fn detach(&mut self, id: NodeId) {
        match self.parent(id) {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for child in self.children(id) {
            self.collect_subtree(*child, out);
        }
    }
}

impl WorldGraph for SceneGraph {
    fn instantiate(&mut self, prefab: &PrefabAsset) -> Result<NodeId, WorldGraphError> {
        let root = self.instantiate_node(&prefab.root, None);
        if let Some(node) = self.nodes.get_mut(&root) {
            node.local = Transform::IDENTITY;
            node.replication_identity = prefab.replicable;
        }
        self.roots.push(root);
        Ok(root)
    }

    fn destroy(&mut self, node: NodeId) -> bool {
        if !self.nodes.contains_key(&node) {
            return false;
        }
        self.detach(node);
        let mut doomed = Vec::new();
        self.collect_subtree(node, &mut doomed);
        for id in doomed {
            self.nodes.remove(&id);
        }
        true
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|node| node.name.as_str())
    }

    fn rename(&mut self, node: NodeId, name: &str) -> bool {
        match self.nodes.get_mut(&node) {
            Some(node) => {
                node.name = name.to_string();
                true
            }
            None => false,
        }
    }

    fn has_replication_identity(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|node| node.replication_identity)
    }

    fn find_node_by_path(&self, path: &str) -> Option<NodeId> {
        let segments = split_path(path).collect::<Vec<_>>();
        let (first, rest) = segments.split_first()?;
        self.roots
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).is_some_and(|node| node.name == *first))
            .find_map(|id| self.resolve_segments(id, rest))
    }

    fn find_descendant_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.nodes.get(&id)?;
            if node.name == name {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    fn reparent(
        &mut self,
        node: NodeId,
        new_parent: Option<NodeId>,
        keep_world_transform: bool,
    ) -> Result<(), WorldGraphError> {
        if !self.nodes.contains_key(&node) {
            return Err(WorldGraphError::UnknownNode(node));
        }
        if let Some(parent) = new_parent {
            if !self.nodes.contains_key(&parent) {
                return Err(WorldGraphError::UnknownNode(parent));
            }
            if self.is_same_or_descendant(parent, node) {
                return Err(WorldGraphError::WouldCreateCycle { node, parent });
            }
        }

        let world_before = self.world_transform(node);
        self.detach(node);
        match new_parent {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.push(node);
                }
            }
            None => self.roots.push(node),
        }

        let parent_world = new_parent
            .and_then(|parent| self.world_transform(parent))
            .unwrap_or(Transform::IDENTITY);
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.parent = new_parent;
            if keep_world_transform {
                if let Some(world) = world_before {
                    entry.local = world.relative_to(&parent_world);
                }
            }
        }
        Ok(())
    }

    fn set_active(&mut self, node: NodeId, active: bool) -> bool {
        match self.nodes.get_mut(&node) {
            Some(node) => {
                node.active = active;
                true
            }
            None => false,
        }
    }

    fn is_active(&self, node: NodeId) -> Option<bool> {
        self.nodes.get(&node).map(|node| node.active)
    }

    fn world_transform(&self, node: NodeId) -> Option<Transform> {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let entry = self.nodes.get(&id)?;
            chain.push(entry.local);
            current = entry.parent;
        }
        Some(
            chain
                .iter()
                .rev()
                .fold(Transform::IDENTITY, |world, local| world.then(local)),
        )
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Vec3;

    fn at(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_position(Vec3::new(x, y, z))
    }

    fn prefab_with_listing() -> PrefabAsset {
        PrefabAsset {
            name: "ManorSetup".to_string(),
            replicable: true,
            root: PrefabNode::new("ManorSetup").with_children(vec![
                PrefabNode::new("Furniture").with_children(vec![PrefabNode::new("Listing")
                    .with_transform(at(1.0, 0.0, 0.0))]),
                PrefabNode::new("Listing").with_transform(at(5.0, 0.0, 0.0)),
            ]),
            configuration: None,
        }
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = NodeIdAllocator::default();
        assert_eq!(allocator.allocate(), NodeId(0));
        assert_eq!(allocator.allocate(), NodeId(1));
        assert_eq!(allocator.allocate(), NodeId(2));
    }

    #[test]
    fn ensure_path_reuses_existing_segments() {
        let mut graph = SceneGraph::default();
        let board = graph
            .ensure_path("/Map/Container/RE Office/Interior/Whiteboard")
            .expect("board");
        let again = graph
            .ensure_path("Map/Container/RE Office/Interior/Whiteboard")
            .expect("again");
        assert_eq!(board, again);
        assert_eq!(graph.node_count(), 5);
        assert_eq!(
            graph.path_of(board).as_deref(),
            Some("/Map/Container/RE Office/Interior/Whiteboard")
        );
    }

    #[test]
    fn find_by_path_searches_through_duplicate_sibling_names() {
        let mut graph = SceneGraph::default();
        let map = graph.spawn_root("Map", Transform::IDENTITY);
        let _empty = graph.spawn_child(map, "Room", Transform::IDENTITY).expect("a");
        let full = graph.spawn_child(map, "Room", Transform::IDENTITY).expect("b");
        let lamp = graph.spawn_child(full, "Lamp", Transform::IDENTITY).expect("lamp");

        assert_eq!(graph.find_node_by_path("/Map/Room/Lamp"), Some(lamp));
        assert_eq!(graph.find_node_by_path("/Map/Nope"), None);
        assert_eq!(graph.find_node_by_path(""), None);
    }

    #[test]
    fn instantiate_creates_unparented_root_at_identity() {
        let mut graph = SceneGraph::default();
        let mut prefab = prefab_with_listing();
        prefab.root.transform = at(40.0, 0.0, 40.0);

        let root = graph.instantiate(&prefab).expect("instantiate");
        assert_eq!(graph.parent(root), None);
        assert_eq!(graph.local_transform(root), Some(Transform::IDENTITY));
        assert!(graph.has_replication_identity(root));
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn descendant_search_is_depth_first_preorder() {
        let mut graph = SceneGraph::default();
        let root = graph.instantiate(&prefab_with_listing()).expect("instantiate");
        let found = graph
            .find_descendant_by_name(root, "Listing")
            .expect("listing");
        let parent = graph.parent(found).expect("parent");
        assert_eq!(graph.name(parent), Some("Furniture"));
        assert_eq!(graph.find_descendant_by_name(root, "ManorSetup"), None);
    }

    #[test]
    fn reparent_keeping_world_transform_preserves_placement() {
        let mut graph = SceneGraph::default();
        let a = graph.spawn_root("A", at(3.0, 0.0, 0.0));
        let b = graph.spawn_root(
            "B",
            Transform {
                position: Vec3::new(-2.0, 1.0, 7.0),
                yaw_radians: 1.0,
            },
        );
        let child = graph.spawn_child(a, "Child", at(1.0, 2.0, 3.0)).expect("child");
        let before = graph.world_transform(child).expect("world");

        graph.reparent(child, Some(b), true).expect("reparent");
        let after = graph.world_transform(child).expect("world");
        assert!(before.approx_eq(&after, 0.0001), "{before:?} vs {after:?}");
        assert_eq!(graph.parent(child), Some(b));
        assert!(graph.children(a).is_empty());
    }

    #[test]
    fn reparent_without_keeping_world_transform_keeps_local() {
        let mut graph = SceneGraph::default();
        let a = graph.spawn_root("A", Transform::IDENTITY);
        let b = graph.spawn_root("B", at(10.0, 0.0, 0.0));
        let child = graph.spawn_child(a, "Child", at(1.0, 0.0, 0.0)).expect("child");

        graph.reparent(child, Some(b), false).expect("reparent");
        assert_eq!(graph.local_transform(child), Some(at(1.0, 0.0, 0.0)));
        assert!(graph
            .world_transform(child)
            .expect("world")
            .approx_eq(&at(11.0, 0.0, 0.0), 0.0001));
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut graph = SceneGraph::default();
        let a = graph.spawn_root("A", Transform::IDENTITY);
        let b = graph.spawn_child(a, "B", Transform::IDENTITY).expect("b");
        let err = graph.reparent(a, Some(b), true).expect_err("cycle");
        assert_eq!(err, WorldGraphError::WouldCreateCycle { node: a, parent: b });
    }

    #[test]
    fn destroy_removes_whole_subtree() {
        let mut graph = SceneGraph::default();
        let keep = graph.spawn_root("Keep", Transform::IDENTITY);
        let root = graph.instantiate(&prefab_with_listing()).expect("instantiate");
        assert!(graph.destroy(root));
        assert!(!graph.destroy(root));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.roots(), &[keep]);
    }

    #[test]
    fn inactive_ancestor_hides_descendants() {
        let mut graph = SceneGraph::default();
        let a = graph.spawn_root("A", Transform::IDENTITY);
        let b = graph.spawn_child(a, "B", Transform::IDENTITY).expect("b");
        assert!(graph.is_active_in_hierarchy(b));
        graph.set_active(a, false);
        assert!(!graph.is_active_in_hierarchy(b));
        assert_eq!(graph.is_active(b), Some(true));
    }
}
