use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::PipelineErrorKind;
use crate::property::{
    ChangeListener, EntityRegistry, EntryGate, InteractableToggleable, LoadingDock, ModularSwitch,
    Property,
};
use crate::world::NodeId;

use super::record::{BoundConfiguration, MergePolicy};

/// Set once a configuration has been merged for the current world session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AppliedFlag(bool);

impl AppliedFlag {
    pub fn is_set(&self) -> bool {
        self.0
    }

    pub fn set(&mut self) {
        self.0 = true;
    }

    pub fn clear(&mut self) {
        self.0 = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyApplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("no property with code '{code}' is registered")]
    EntityNotResolved { code: String },
}

impl MergeError {
    pub fn kind(&self) -> PipelineErrorKind {
        PipelineErrorKind::EntityNotResolved
    }
}

pub fn apply_to_registry(
    config: &BoundConfiguration,
    flag: &mut AppliedFlag,
    registry: &mut dyn EntityRegistry,
) -> Result<MergeOutcome, MergeError> {
    if flag.is_set() {
        debug!(property_code = %config.property_code, "configuration_skipped_already_applied");
        return Ok(MergeOutcome::Skipped(SkipReason::AlreadyApplied));
    }
    let Some(property) = registry.lookup_mut(&config.property_code) else {
        return Err(MergeError::EntityNotResolved {
            code: config.property_code.clone(),
        });
    };
    Ok(apply_configuration(config, flag, property))
}

/// Removes what a merge of `config` pointed at on the property, then clears `flag`. Scalars
/// stay; the next merge overwrites them.
pub fn release_configuration(
    config: &BoundConfiguration,
    flag: &mut AppliedFlag,
    registry: &mut dyn EntityRegistry,
) -> usize {
    if !flag.is_set() {
        return 0;
    }
    flag.clear();
    let Some(property) = registry.lookup_mut(&config.property_code) else {
        warn!(property_code = %config.property_code, "configuration_release_property_gone");
        return 0;
    };
    let released = property.release_nodes(&config.referenced_nodes());
    debug!(property_code = %property.code, released, "configuration_released");
    released
}

pub fn apply_configuration(
    config: &BoundConfiguration,
    flag: &mut AppliedFlag,
    property: &mut Property,
) -> MergeOutcome {
    if flag.is_set() {
        debug!(property_code = %property.code, "configuration_skipped_already_applied");
        return MergeOutcome::Skipped(SkipReason::AlreadyApplied);
    }

    property.price = config.price;
    property.employee_capacity = config.employee_capacity;
    property.npc_spawn_point = config.npc_spawn_point;
    if config.listing_poster.is_some() {
        property.listing_poster = config.listing_poster;
    }

    merge_loading_docks(config, property);

    let incoming = config
        .switches
        .iter()
        .map(|node| ModularSwitch::new(*node))
        .collect();
    merge_by_node(
        &mut property.switches,
        incoming,
        config.policies.switches,
        |switch| switch.node,
    );
    let incoming = config
        .toggleables
        .iter()
        .map(|node| InteractableToggleable::new(*node))
        .collect();
    merge_by_node(
        &mut property.toggleables,
        incoming,
        config.policies.toggleables,
        |toggleable| toggleable.node,
    );
    attach_change_listeners(config, property);

    merge_by_node(
        &mut property.employee_idle_points,
        config.idle_points.clone(),
        config.policies.idle_points,
        |node| *node,
    );

    if let Some(node) = config.entry_gate {
        property.entry_gate = Some(EntryGate::new(node));
    }
    if let Some(gate) = property.entry_gate.as_mut() {
        gate.enterable = property.is_owned;
    }

    let idle_points = property.employee_idle_points.len();
    if usize::try_from(property.employee_capacity).unwrap_or(0) > idle_points {
        warn!(
            property_code = %property.code,
            employee_capacity = property.employee_capacity,
            idle_points,
            "employee_capacity_exceeds_idle_points"
        );
    }

    flag.set();
    info!(
        property_code = %property.code,
        price = property.price,
        employee_capacity = property.employee_capacity,
        loading_docks = property.loading_docks.len(),
        switches = property.switches.len(),
        toggleables = property.toggleables.len(),
        idle_points,
        "configuration_applied"
    );
    MergeOutcome::Applied
}

fn merge_loading_docks(config: &BoundConfiguration, property: &mut Property) {
    let owner = property.code.clone();
    let configured = config.loading_docks.iter().copied().collect::<HashSet<_>>();
    let incoming = config
        .loading_docks
        .iter()
        .map(|node| LoadingDock {
            node: *node,
            owner: Some(owner.clone()),
        })
        .collect();
    merge_by_node(
        &mut property.loading_docks,
        incoming,
        config.policies.loading_docks,
        |dock| dock.node,
    );
    // Entries kept by CombineDistinct predate the merge but belong to this property now.
    for dock in property
        .loading_docks
        .iter_mut()
        .filter(|dock| configured.contains(&dock.node))
    {
        dock.owner = Some(owner.clone());
    }
}

fn attach_change_listeners(config: &BoundConfiguration, property: &mut Property) {
    let key = property.listener_key();
    let flag = property.change_flag().clone();
    let switches = config.switches.iter().copied().collect::<HashSet<_>>();
    let toggleables = config.toggleables.iter().copied().collect::<HashSet<_>>();

    for switch in property
        .switches
        .iter_mut()
        .filter(|switch| switches.contains(&switch.node))
    {
        switch
            .notifier
            .replace_listener(ChangeListener::new(key.clone(), flag.clone()));
    }
    for toggleable in property
        .toggleables
        .iter_mut()
        .filter(|toggleable| toggleables.contains(&toggleable.node))
    {
        toggleable
            .notifier
            .replace_listener(ChangeListener::new(key.clone(), flag.clone()));
    }
}

fn merge_by_node<T>(
    target: &mut Vec<T>,
    incoming: Vec<T>,
    policy: MergePolicy,
    node_of: impl Fn(&T) -> NodeId,
) {
    match policy {
        MergePolicy::Replace => *target = incoming,
        MergePolicy::Combine => target.extend(incoming),
        MergePolicy::CombineDistinct => {
            let mut present = target.iter().map(&node_of).collect::<HashSet<_>>();
            for item in incoming {
                if present.insert(node_of(&item)) {
                    target.push(item);
                }
            }
        }
    }
}
