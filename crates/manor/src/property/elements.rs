use crate::world::NodeId;

use super::notify::StateNotifier;

/// A delivery dock. `owner` points back at the code of the property it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingDock {
    pub node: NodeId,
    pub owner: Option<String>,
}

impl LoadingDock {
    pub fn new(node: NodeId) -> Self {
        Self { node, owner: None }
    }
}

#[derive(Debug, Clone)]
pub struct ModularSwitch {
    pub node: NodeId,
    is_on: bool,
    pub notifier: StateNotifier,
}

impl ModularSwitch {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            is_on: false,
            notifier: StateNotifier::default(),
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn set_on(&mut self, on: bool) {
        if self.is_on != on {
            self.is_on = on;
            self.notifier.notify();
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractableToggleable {
    pub node: NodeId,
    is_toggled: bool,
    pub notifier: StateNotifier,
}

impl InteractableToggleable {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            is_toggled: false,
            notifier: StateNotifier::default(),
        }
    }

    pub fn is_toggled(&self) -> bool {
        self.is_toggled
    }

    /// Every interaction fires, matching how the host treats toggleables.
    pub fn toggle(&mut self) {
        self.is_toggled = !self.is_toggled;
        self.notifier.notify();
    }
}

/// The gate in front of a property. Closed until the property is owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryGate {
    pub node: NodeId,
    pub enterable: bool,
}

impl EntryGate {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            enterable: false,
        }
    }
}
