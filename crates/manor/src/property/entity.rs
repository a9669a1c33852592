use std::collections::HashSet;

use crate::world::NodeId;

use super::elements::{EntryGate, InteractableToggleable, LoadingDock, ModularSwitch};
use super::notify::{ChangeFlag, ListenerKey};

#[derive(Debug, Clone)]
pub struct Property {
    pub code: String,
    pub name: String,
    pub price: f32,
    pub employee_capacity: i32,
    pub is_owned: bool,
    pub npc_spawn_point: Option<NodeId>,
    pub loading_docks: Vec<LoadingDock>,
    pub switches: Vec<ModularSwitch>,
    pub toggleables: Vec<InteractableToggleable>,
    pub employee_idle_points: Vec<NodeId>,
    pub listing_poster: Option<NodeId>,
    pub entry_gate: Option<EntryGate>,
    pub node: Option<NodeId>,
    changes: ChangeFlag,
}

impl Property {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            price: 0.0,
            employee_capacity: 0,
            is_owned: false,
            npc_spawn_point: None,
            loading_docks: Vec::new(),
            switches: Vec::new(),
            toggleables: Vec::new(),
            employee_idle_points: Vec::new(),
            listing_poster: None,
            entry_gate: None,
            node: None,
            changes: ChangeFlag::default(),
        }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn listener_key(&self) -> ListenerKey {
        ListenerKey(self.code.clone())
    }

    pub fn change_flag(&self) -> &ChangeFlag {
        &self.changes
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.changes.is_marked()
    }

    pub fn mark_saved(&self) -> bool {
        self.changes.take()
    }

    /// Transfers ownership to the player. Opens the entry gate.
    pub fn acquire(&mut self) {
        if self.is_owned {
            return;
        }
        self.is_owned = true;
        if let Some(gate) = self.entry_gate.as_mut() {
            gate.enterable = true;
        }
        self.changes.mark();
    }

    pub fn set_switch(&mut self, node: NodeId, on: bool) -> usize {
        let mut touched = 0;
        for switch in self.switches.iter_mut().filter(|s| s.node == node) {
            switch.set_on(on);
            touched += 1;
        }
        touched
    }

    /// Drops every reference to `nodes`, listeners on removed switches and toggleables with
    /// them. Returns the number of references dropped.
    pub fn release_nodes(&mut self, nodes: &HashSet<NodeId>) -> usize {
        let before = self.collection_len();
        self.loading_docks.retain(|dock| !nodes.contains(&dock.node));
        self.switches.retain(|switch| !nodes.contains(&switch.node));
        self.toggleables.retain(|toggleable| !nodes.contains(&toggleable.node));
        self.employee_idle_points.retain(|node| !nodes.contains(node));
        let mut released = before - self.collection_len();

        for slot in [&mut self.npc_spawn_point, &mut self.listing_poster] {
            if slot.is_some_and(|node| nodes.contains(&node)) {
                *slot = None;
                released += 1;
            }
        }
        if self
            .entry_gate
            .as_ref()
            .is_some_and(|gate| nodes.contains(&gate.node))
        {
            self.entry_gate = None;
            released += 1;
        }
        released
    }

    fn collection_len(&self) -> usize {
        self.loading_docks.len()
            + self.switches.len()
            + self.toggleables.len()
            + self.employee_idle_points.len()
    }

    pub fn toggle(&mut self, node: NodeId) -> usize {
        let mut touched = 0;
        for toggleable in self.toggleables.iter_mut().filter(|t| t.node == node) {
            toggleable.toggle();
            touched += 1;
        }
        touched
    }
}
