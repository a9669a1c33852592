use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use futures_lite::future;
use tracing::{debug, error, info, warn};

use crate::config::{
    apply_to_registry, release_configuration, AppliedFlag, BoundConfiguration, ConfigurationRecord,
};
use crate::content::{AssetProvisioner, BundleSource, LoadMode, PendingBundle, PrefabAsset};
use crate::error::PipelineErrorKind;
use crate::net::NetworkCapability;
use crate::property::EntityRegistry;
use crate::relocate::{relocate, Relocated};
use crate::settings::ModSettings;
use crate::spawn::{SpawnOrchestrator, SpawnedInstance};
use crate::world::{NodeId, WorldGraph};

use super::events::{channel, LifecycleEvent, LifecycleEvents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Loading,
    Spawning,
    Configuring,
    Relocating,
    Ready,
    TornDown,
}

pub struct HostContext<'a> {
    pub world: &'a mut dyn WorldGraph,
    pub network: &'a mut dyn NetworkCapability,
    pub registry: &'a mut dyn EntityRegistry,
}

impl<'a> HostContext<'a> {
    pub fn new(
        world: &'a mut dyn WorldGraph,
        network: &'a mut dyn NetworkCapability,
        registry: &'a mut dyn EntityRegistry,
    ) -> Self {
        Self {
            world,
            network,
            registry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub state: LifecycleState,
    pub bundle_loaded: bool,
    pub instance: Option<SpawnedInstance>,
    pub configuration_applied: bool,
    pub relocated: Option<NodeId>,
    pub disabled_originals: usize,
    pub completed_runs: u32,
    pub last_error: Option<PipelineErrorKind>,
}

#[derive(Debug)]
struct WorldSession {
    context: String,
    settled: bool,
}

enum LoadProgress {
    Resident,
    Waiting,
    Failed(PipelineErrorKind),
}

/// Drives provisioning, spawning, configuration and relocation from host ticks.
///
/// Between two suspension points (the settle tick after a world load, and a pending async
/// bundle load) every step runs to completion inside one [`LifecycleController::tick`].
pub struct LifecycleController {
    settings: ModSettings,
    source: BundleSource,
    provisioner: AssetProvisioner,
    events: LifecycleEvents,
    receiver: Receiver<LifecycleEvent>,
    state: LifecycleState,
    pending: Option<PendingBundle>,
    session: Option<WorldSession>,
    prefab: Option<Arc<PrefabAsset>>,
    spawner: SpawnOrchestrator,
    applied: AppliedFlag,
    bound: Option<BoundConfiguration>,
    disabled_originals: Vec<NodeId>,
    relocated: Option<Relocated>,
    completed_runs: u32,
    last_error: Option<PipelineErrorKind>,
    quit: bool,
}

impl LifecycleController {
    pub fn new(
        settings: ModSettings,
        source: BundleSource,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        let (events, receiver) = channel();
        Self {
            settings,
            source,
            provisioner: AssetProvisioner::new(install_root),
            events,
            receiver,
            state: LifecycleState::Idle,
            pending: None,
            session: None,
            prefab: None,
            spawner: SpawnOrchestrator::new(),
            applied: AppliedFlag::default(),
            bound: None,
            disabled_originals: Vec::new(),
            relocated: None,
            completed_runs: 0,
            last_error: None,
            quit: false,
        }
    }

    pub fn events(&self) -> LifecycleEvents {
        self.events.clone()
    }

    pub fn settings(&self) -> &ModSettings {
        &self.settings
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn provisioner(&self) -> &AssetProvisioner {
        &self.provisioner
    }

    pub fn instance(&self) -> Option<&SpawnedInstance> {
        self.spawner.current()
    }

    pub fn bound_configuration(&self) -> Option<&BoundConfiguration> {
        self.bound.as_ref()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn report(&self) -> LifecycleReport {
        LifecycleReport {
            state: self.state,
            bundle_loaded: self.provisioner.is_loaded(),
            instance: self.spawner.current().cloned(),
            configuration_applied: self.applied.is_set(),
            relocated: self.relocated.map(|relocated| relocated.node),
            disabled_originals: self.disabled_originals.len(),
            completed_runs: self.completed_runs,
            last_error: self.last_error,
        }
    }

    /// Starts loading the bundle ahead of the first world load.
    pub fn initialize(&mut self) -> LifecycleState {
        if self.state != LifecycleState::Idle || self.provisioner.is_loaded() {
            debug!(state = ?self.state, "initialize_ignored");
            return self.state;
        }
        self.transition(LifecycleState::Loading);
        match self.progress_load() {
            LoadProgress::Resident => self.transition(LifecycleState::Idle),
            LoadProgress::Waiting => {}
            LoadProgress::Failed(kind) => self.abort(kind),
        }
        self.state
    }

    /// One host frame: settle the previous world load, drain lifecycle events, then advance
    /// until the next suspension point.
    pub fn tick(&mut self, host: &mut HostContext<'_>) -> LifecycleState {
        if self.state == LifecycleState::TornDown {
            self.transition(LifecycleState::Idle);
        }
        if let Some(session) = self.session.as_mut() {
            session.settled = true;
        }

        let events = self.receiver.try_iter().collect::<Vec<_>>();
        for event in events {
            self.handle_event(event, host);
        }

        self.advance(host);
        self.state
    }

    fn handle_event(&mut self, event: LifecycleEvent, host: &mut HostContext<'_>) {
        if self.quit {
            debug!(event = ?event, "lifecycle_event_after_quit_ignored");
            return;
        }
        match event {
            LifecycleEvent::WorldLoaded(context) if context == self.settings.target_context => {
                if self.run_in_progress() {
                    self.teardown(host, "world_reloaded");
                }
                info!(context = %context, "world_loaded");
                self.last_error = None;
                self.session = Some(WorldSession {
                    context,
                    settled: false,
                });
            }
            LifecycleEvent::WorldLoaded(context) => {
                debug!(context = %context, "world_loaded_other_context");
                self.teardown(host, "world_context_changed");
            }
            LifecycleEvent::WorldUnloaded => self.teardown(host, "world_unloaded"),
            LifecycleEvent::ApplicationQuit => {
                self.teardown(host, "application_quit");
                self.quit = true;
            }
        }
    }

    fn advance(&mut self, host: &mut HostContext<'_>) {
        loop {
            match self.state {
                LifecycleState::Idle => {
                    if !self.session_settled() {
                        return;
                    }
                    self.transition(LifecycleState::Loading);
                }
                LifecycleState::Loading => match self.progress_load() {
                    LoadProgress::Waiting => return,
                    LoadProgress::Failed(kind) => {
                        self.abort(kind);
                        return;
                    }
                    LoadProgress::Resident => {
                        if self.session.is_none() {
                            self.transition(LifecycleState::Idle);
                            return;
                        }
                        if !self.session_settled() {
                            return;
                        }
                        if !self.resolve_property(host) {
                            return;
                        }
                        self.transition(LifecycleState::Spawning);
                    }
                },
                LifecycleState::Spawning => {
                    if !self.spawn_instance(host) {
                        return;
                    }
                    self.transition(LifecycleState::Configuring);
                }
                LifecycleState::Configuring => {
                    self.configure(host);
                    self.transition(LifecycleState::Relocating);
                }
                LifecycleState::Relocating => {
                    self.relocate_listing(host);
                    self.completed_runs = self.completed_runs.saturating_add(1);
                    let context = self.session.take().map(|session| session.context);
                    info!(
                        context = context.as_deref().unwrap_or_default(),
                        completed_runs = self.completed_runs,
                        "pipeline_ready"
                    );
                    self.transition(LifecycleState::Ready);
                }
                LifecycleState::Ready | LifecycleState::TornDown => return,
            }
        }
    }

    fn progress_load(&mut self) -> LoadProgress {
        if self.provisioner.is_loaded() {
            return LoadProgress::Resident;
        }

        if let Some(pending) = self.pending.as_mut() {
            let Some(result) = future::block_on(future::poll_once(&mut *pending)) else {
                return LoadProgress::Waiting;
            };
            let origin = pending.origin().to_string();
            self.pending = None;
            return match self.provisioner.finish_load(&origin, result) {
                Ok(_) => LoadProgress::Resident,
                Err(err) => LoadProgress::Failed(err.kind()),
            };
        }

        match self.settings.load_mode {
            LoadMode::Sync => match self.provisioner.load(&self.source) {
                Ok(_) => LoadProgress::Resident,
                Err(err) => LoadProgress::Failed(err.kind()),
            },
            LoadMode::Async => {
                info!(origin = %self.source.describe(), "bundle_load_started");
                let mut pending = self.provisioner.begin_load(&self.source);
                match future::block_on(future::poll_once(&mut pending)) {
                    None => {
                        self.pending = Some(pending);
                        LoadProgress::Waiting
                    }
                    Some(result) => match self.provisioner.finish_load(pending.origin(), result) {
                        Ok(_) => LoadProgress::Resident,
                        Err(err) => LoadProgress::Failed(err.kind()),
                    },
                }
            }
        }
    }

    fn resolve_property(&mut self, host: &mut HostContext<'_>) -> bool {
        let code = &self.settings.property_code;
        if host.registry.lookup(code).is_some() {
            return true;
        }
        error!(
            property_code = %code,
            kind = %PipelineErrorKind::EntityNotResolved,
            "target_property_not_found"
        );
        self.abort(PipelineErrorKind::EntityNotResolved);
        false
    }

    fn spawn_instance(&mut self, host: &mut HostContext<'_>) -> bool {
        let prefab = match self.provisioner.extract(&self.settings.prefab_name) {
            Ok(prefab) => prefab,
            Err(err) => {
                self.abort(err.kind());
                return false;
            }
        };
        match self
            .spawner
            .spawn(&prefab, &mut *host.world, &mut *host.network)
        {
            Ok(_) => {
                self.prefab = Some(prefab);
                true
            }
            Err(err) => {
                error!(kind = %err.kind(), error = %err, "spawn_failed");
                self.abort(err.kind());
                false
            }
        }
    }

    fn configure(&mut self, host: &mut HostContext<'_>) {
        let Some(root) = self.spawner.current().map(|instance| instance.root) else {
            warn!("configure_without_instance");
            return;
        };

        self.disable_originals(host);

        if self.settings.attach_to_property {
            let property_node = host
                .registry
                .lookup(&self.settings.property_code)
                .and_then(|property| property.node);
            match property_node {
                Some(parent) => match host.world.reparent(root, Some(parent), true) {
                    Ok(()) => {
                        host.world.set_active(root, true);
                        debug!(root = root.0, parent = parent.0, "instance_attached_to_property");
                    }
                    Err(err) => warn!(error = %err, "instance_attach_failed"),
                },
                None => debug!(
                    property_code = %self.settings.property_code,
                    "property_has_no_node_instance_left_at_root"
                ),
            }
        }

        let record = match self.prefab.as_ref().and_then(|prefab| prefab.configuration.clone()) {
            Some(record) => record,
            None => {
                debug!(
                    prefab = %self.settings.prefab_name,
                    "prefab_has_no_configuration_using_defaults"
                );
                ConfigurationRecord {
                    property_code: self.settings.property_code.clone(),
                    ..ConfigurationRecord::default()
                }
            }
        };
        if record.property_code != self.settings.property_code {
            warn!(
                record_code = %record.property_code,
                settings_code = %self.settings.property_code,
                "configuration_targets_other_property"
            );
        }

        let bound = record.bind(&*host.world, root);
        match apply_to_registry(&bound, &mut self.applied, &mut *host.registry) {
            Ok(outcome) => debug!(outcome = ?outcome, "configuration_merge_finished"),
            Err(err) => {
                error!(kind = %err.kind(), error = %err, "configuration_merge_failed");
                self.last_error = Some(err.kind());
            }
        }
        self.bound = Some(bound);
    }

    fn disable_originals(&mut self, host: &mut HostContext<'_>) {
        for path in &self.settings.disable_originals {
            let Some(node) = host.world.find_node_by_path(path) else {
                warn!(path = %path, "original_object_not_found");
                continue;
            };
            if host.world.is_active(node) == Some(true) {
                host.world.set_active(node, false);
                self.disabled_originals.push(node);
                debug!(path = %path, node = node.0, "original_object_disabled");
            }
        }
    }

    fn relocate_listing(&mut self, host: &mut HostContext<'_>) {
        let Some(root) = self.spawner.current().map(|instance| instance.root) else {
            return;
        };
        match relocate(
            &mut *host.world,
            root,
            &self.settings.listing_poster_name,
            &self.settings.whiteboard_path,
        ) {
            Ok(relocated) => self.relocated = Some(relocated),
            Err(err) => warn!(kind = %err.kind(), error = %err, "relocation_skipped"),
        }
    }

    /// Undoes everything the pipeline put into the world and releases the bundle.
    fn teardown(&mut self, host: &mut HostContext<'_>, reason: &'static str) {
        let had_work = self.state != LifecycleState::Idle
            || self.provisioner.is_loaded()
            || self.pending.is_some()
            || self.session.is_some()
            || self.spawner.current().is_some();
        if !had_work {
            debug!(reason, "teardown_nothing_to_do");
            return;
        }

        self.pending = None;
        self.session = None;
        self.prefab = None;

        let despawned = self
            .spawner
            .despawn(&mut *host.world, &mut *host.network)
            .is_some();
        if let Some(relocated) = self.relocated.take() {
            // Relocated objects left the instance subtree.
            if host.world.contains(relocated.node) {
                host.world.destroy(relocated.node);
            }
        }
        let reactivated = self.disabled_originals.len();
        for node in self.disabled_originals.drain(..) {
            if host.world.contains(node) {
                host.world.set_active(node, true);
            }
        }

        let released = match self.bound.take() {
            Some(bound) => release_configuration(&bound, &mut self.applied, &mut *host.registry),
            None => 0,
        };
        self.applied.clear();
        let unloaded = self.provisioner.unload();

        info!(
            reason,
            despawned,
            reactivated,
            released,
            unloaded,
            "teardown_complete"
        );
        self.transition(LifecycleState::TornDown);
    }

    fn abort(&mut self, kind: PipelineErrorKind) {
        warn!(kind = %kind, state = ?self.state, "pipeline_aborted");
        self.last_error = Some(kind);
        self.pending = None;
        self.session = None;
        self.prefab = None;
        self.transition(LifecycleState::Idle);
    }

    fn run_in_progress(&self) -> bool {
        self.spawner.current().is_some()
            || matches!(
                self.state,
                LifecycleState::Spawning
                    | LifecycleState::Configuring
                    | LifecycleState::Relocating
                    | LifecycleState::Ready
            )
    }

    fn session_settled(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.settled)
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "lifecycle_transition");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::net::{LocalServer, OfflineNetwork};
    use crate::property::{Property, PropertyStore};
    use crate::settings::BundleSourceKind;
    use crate::spawn::SpawnMode;
    use crate::test_support::{
        host_world, manor_bundle_bytes, manor_store, BUNDLE_NAME, ORIGINAL_DOOR_PATH,
        POSTER_NAME, WHITEBOARD_PATH,
    };
    use crate::world::SceneGraph;

    fn embedded_controller() -> LifecycleController {
        LifecycleController::new(
            ModSettings::default(),
            BundleSource::embedded(BUNDLE_NAME, manor_bundle_bytes()),
            "/unused",
        )
    }

    fn tick(
        controller: &mut LifecycleController,
        world: &mut SceneGraph,
        net: &mut dyn NetworkCapability,
        store: &mut PropertyStore,
    ) -> LifecycleState {
        controller.tick(&mut HostContext::new(world, net, store))
    }

    #[test]
    fn world_load_runs_the_whole_pipeline_after_one_settle_tick() {
        let (mut world, property_node) = host_world();
        let mut net = LocalServer::started();
        let mut store = manor_store(Some(property_node));
        let mut controller = embedded_controller();

        assert_eq!(controller.initialize(), LifecycleState::Idle);
        assert!(controller.provisioner().is_loaded());

        controller.events().world_loaded("Main");
        assert_eq!(
            tick(&mut controller, &mut world, &mut net, &mut store),
            LifecycleState::Idle
        );
        assert!(controller.instance().is_none());

        assert_eq!(
            tick(&mut controller, &mut world, &mut net, &mut store),
            LifecycleState::Ready
        );
        let instance = controller.instance().expect("instance").clone();
        assert_eq!(instance.mode, SpawnMode::Networked);
        assert!(instance.replication.is_some());
        assert_eq!(world.parent(instance.root), Some(property_node));

        let property = store.lookup("manor").expect("manor");
        assert_eq!(property.price, 250_000.0);
        assert_eq!(property.employee_capacity, 3);
        assert_eq!(property.employee_idle_points.len(), 3);
        assert_eq!(property.loading_docks.len(), 2);
        assert!(property.npc_spawn_point.is_some());
        assert_eq!(property.entry_gate.as_ref().map(|g| g.enterable), Some(false));

        let whiteboard = world.find_node_by_path(WHITEBOARD_PATH).expect("whiteboard");
        let poster = world
            .find_descendant_by_name(whiteboard, POSTER_NAME)
            .expect("poster on whiteboard");
        assert_eq!(world.is_active(poster), Some(true));

        let door = world.find_node_by_path(ORIGINAL_DOOR_PATH).expect("door");
        assert_eq!(world.is_active(door), Some(false));

        let report = controller.report();
        assert!(report.configuration_applied);
        assert_eq!(report.relocated, Some(poster));
        assert_eq!(report.disabled_originals, 1);
        assert_eq!(report.completed_runs, 1);
        assert_eq!(report.last_error, None);
    }

    #[test]
    fn world_load_without_initialize_loads_on_demand() {
        let (mut world, property_node) = host_world();
        let mut store = manor_store(Some(property_node));
        let mut controller = embedded_controller();

        controller.events().world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert!(!controller.provisioner().is_loaded());

        assert_eq!(
            tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store),
            LifecycleState::Ready
        );
        let instance = controller.instance().expect("instance");
        assert_eq!(instance.mode, SpawnMode::Local);
        assert_eq!(instance.replication, None);
        assert_eq!(instance.name, "ManorSetup-Chloe_LocalInstance");
    }

    #[test]
    fn unresolved_property_aborts_without_touching_the_world() {
        let (mut world, _) = host_world();
        let nodes = world.node_count();
        let mut store = PropertyStore::new();
        let mut controller = embedded_controller();
        controller.initialize();

        controller.events().world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert_eq!(
            tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store),
            LifecycleState::Idle
        );

        assert!(controller.instance().is_none());
        assert_eq!(world.node_count(), nodes);
        assert!(store.is_empty());
        let report = controller.report();
        assert_eq!(report.last_error, Some(PipelineErrorKind::EntityNotResolved));
        assert!(report.bundle_loaded);
        assert!(!report.configuration_applied);

        // No retry until the next world load.
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert_eq!(controller.state(), LifecycleState::Idle);
    }

    #[test]
    fn corrupt_bundle_aborts_to_idle() {
        let (mut world, property_node) = host_world();
        let nodes = world.node_count();
        let mut store = manor_store(Some(property_node));
        let mut controller = LifecycleController::new(
            ModSettings::default(),
            BundleSource::embedded(BUNDLE_NAME, b"MNRB but not really".to_vec()),
            "/unused",
        );

        assert_eq!(controller.initialize(), LifecycleState::Idle);
        assert_eq!(
            controller.report().last_error,
            Some(PipelineErrorKind::AssetCorrupt)
        );

        controller.events().world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert_eq!(world.node_count(), nodes);
    }

    #[test]
    fn missing_prefab_keeps_the_package_for_the_next_attempt() {
        let (mut world, property_node) = host_world();
        let mut store = manor_store(Some(property_node));
        let settings = ModSettings {
            prefab_name: "ManorSetup-Nobody".to_string(),
            ..ModSettings::default()
        };
        let mut controller = LifecycleController::new(
            settings,
            BundleSource::embedded(BUNDLE_NAME, manor_bundle_bytes()),
            "/unused",
        );

        controller.events().world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);

        let report = controller.report();
        assert_eq!(report.state, LifecycleState::Idle);
        assert_eq!(report.last_error, Some(PipelineErrorKind::AssetMissing));
        assert!(report.bundle_loaded);
        assert!(report.instance.is_none());
    }

    #[test]
    fn world_unload_tears_everything_down_then_idles() {
        let (mut world, property_node) = host_world();
        let nodes = world.node_count();
        let mut net = LocalServer::started();
        let mut store = manor_store(Some(property_node));
        let mut controller = embedded_controller();

        controller.events().world_loaded("Main");
        tick(&mut controller, &mut world, &mut net, &mut store);
        tick(&mut controller, &mut world, &mut net, &mut store);
        assert_eq!(net.spawned_count(), 1);

        controller.events().world_unloaded();
        assert_eq!(
            tick(&mut controller, &mut world, &mut net, &mut store),
            LifecycleState::TornDown
        );
        let report = controller.report();
        assert!(report.instance.is_none());
        assert!(!report.bundle_loaded);
        assert!(!report.configuration_applied);
        assert_eq!(report.relocated, None);
        assert_eq!(report.disabled_originals, 0);
        assert!(controller.bound_configuration().is_none());
        assert_eq!(net.spawned_count(), 0);
        assert_eq!(world.node_count(), nodes);

        let door = world.find_node_by_path(ORIGINAL_DOOR_PATH).expect("door");
        assert_eq!(world.is_active(door), Some(true));

        assert_eq!(
            tick(&mut controller, &mut world, &mut net, &mut store),
            LifecycleState::Idle
        );
    }

    #[test]
    fn second_world_load_produces_exactly_one_instance() {
        let (mut world, property_node) = host_world();
        let roots = world.roots().len();
        let mut store = manor_store(Some(property_node));
        let mut controller = embedded_controller();
        let events = controller.events();

        events.world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        events.world_unloaded();
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);

        // A reloaded world comes with freshly loaded properties.
        let mut store = manor_store(Some(property_node));
        events.world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert_eq!(
            tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store),
            LifecycleState::Ready
        );

        assert_eq!(controller.report().completed_runs, 2);
        assert_eq!(world.roots().len(), roots);
        let property = store.lookup("manor").expect("manor");
        assert_eq!(property.loading_docks.len(), 2);
        let whiteboard = world.find_node_by_path(WHITEBOARD_PATH).expect("whiteboard");
        assert_eq!(world.children(whiteboard).len(), 1);
    }

    fn referenced_nodes(property: &Property) -> Vec<NodeId> {
        let mut nodes = property
            .loading_docks
            .iter()
            .map(|dock| dock.node)
            .chain(property.switches.iter().map(|switch| switch.node))
            .chain(property.toggleables.iter().map(|toggleable| toggleable.node))
            .chain(property.employee_idle_points.iter().copied())
            .chain(property.npc_spawn_point)
            .chain(property.listing_poster)
            .chain(property.entry_gate.as_ref().map(|gate| gate.node))
            .collect::<Vec<_>>();
        nodes.sort();
        nodes
    }

    fn shape(property: &Property) -> [usize; 7] {
        [
            property.loading_docks.len(),
            property.switches.len(),
            property.toggleables.len(),
            property.employee_idle_points.len(),
            usize::from(property.npc_spawn_point.is_some()),
            usize::from(property.listing_poster.is_some()),
            usize::from(property.entry_gate.is_some()),
        ]
    }

    #[test]
    fn repeated_target_load_rebuilds_instead_of_duplicating() {
        let (mut world, property_node) = host_world();
        let mut store = manor_store(Some(property_node));
        let mut controller = embedded_controller();
        let events = controller.events();

        events.world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        let first = controller.instance().expect("first").root;
        let first_property = store.lookup("manor").expect("manor").clone();
        let first_nodes = referenced_nodes(&first_property);
        assert_eq!(shape(&first_property), [2, 1, 1, 3, 1, 1, 1]);

        events.world_loaded("Main");
        assert_eq!(
            tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store),
            LifecycleState::TornDown
        );
        assert!(!world.contains(first));
        let released = store.lookup("manor").expect("manor");
        assert!(referenced_nodes(released).is_empty());

        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert_eq!(controller.state(), LifecycleState::Ready);
        assert_eq!(world.children(property_node).len(), 2);

        let second = store.lookup("manor").expect("manor");
        assert_eq!(shape(second), shape(&first_property));
        assert_eq!(second.price, first_property.price);
        assert_eq!(second.employee_capacity, first_property.employee_capacity);
        let second_nodes = referenced_nodes(second);
        assert!(second_nodes.iter().all(|node| world.contains(*node)));
        assert!(second_nodes.iter().all(|node| !first_nodes.contains(node)));
        let key = second.listener_key();
        assert_eq!(second.switches[0].notifier.count_for(&key), 1);
        assert_eq!(second.toggleables[0].notifier.count_for(&key), 1);
    }

    #[test]
    fn successful_run_after_an_abort_reports_no_error() {
        let (mut world, property_node) = host_world();
        let mut controller = embedded_controller();
        let events = controller.events();

        let mut empty = PropertyStore::new();
        events.world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut empty);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut empty);
        assert_eq!(
            controller.report().last_error,
            Some(PipelineErrorKind::EntityNotResolved)
        );

        let mut store = manor_store(Some(property_node));
        events.world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert_eq!(controller.report().last_error, None);
        assert_eq!(
            tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store),
            LifecycleState::Ready
        );
        let report = controller.report();
        assert_eq!(report.last_error, None);
        assert_eq!(report.completed_runs, 1);
    }

    #[test]
    fn other_context_tears_down_and_never_spawns() {
        let (mut world, property_node) = host_world();
        let mut store = manor_store(Some(property_node));
        let mut controller = embedded_controller();
        controller.initialize();

        controller.events().world_loaded("Menu");
        assert_eq!(
            tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store),
            LifecycleState::TornDown
        );
        assert!(!controller.provisioner().is_loaded());
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert!(controller.instance().is_none());
    }

    #[test]
    fn application_quit_tears_down_and_ignores_later_events() {
        let (mut world, property_node) = host_world();
        let mut store = manor_store(Some(property_node));
        let mut controller = embedded_controller();
        let events = controller.events();

        events.world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        events.application_quit();
        events.world_loaded("Main");
        assert_eq!(
            tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store),
            LifecycleState::TornDown
        );
        assert!(controller.quit_requested());
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        assert!(controller.instance().is_none());
    }

    #[test]
    fn async_file_load_suspends_until_the_worker_delivers() {
        let temp = TempDir::new().expect("temp");
        let settings = ModSettings {
            bundle_source: BundleSourceKind::File,
            load_mode: LoadMode::Async,
            ..ModSettings::default()
        };
        let bundle_path = temp.path().join(&settings.bundle_file);
        fs::create_dir_all(bundle_path.parent().expect("parent")).expect("mkdir");
        fs::write(&bundle_path, manor_bundle_bytes()).expect("write bundle");

        let source = settings.bundle_source(&[]);
        let mut controller = LifecycleController::new(settings, source, temp.path());
        let (mut world, property_node) = host_world();
        let mut store = manor_store(Some(property_node));

        controller.initialize();
        controller.events().world_loaded("Main");
        let mut state = controller.state();
        for _ in 0..500 {
            state = tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
            if state == LifecycleState::Ready {
                break;
            }
            assert_eq!(controller.report().last_error, None);
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(state, LifecycleState::Ready);
        assert!(controller.instance().is_some());
    }

    #[test]
    fn prefab_without_record_merges_defaults() {
        let prefab = PrefabAsset {
            configuration: None,
            ..crate::test_support::manor_prefab()
        };
        let bytes = crate::content::encode_bundle(BUNDLE_NAME, &[prefab]).expect("encode");
        let mut controller = LifecycleController::new(
            ModSettings::default(),
            BundleSource::embedded(BUNDLE_NAME, bytes),
            "/unused",
        );
        let (mut world, property_node) = host_world();
        let mut store = manor_store(Some(property_node));

        controller.events().world_loaded("Main");
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);
        tick(&mut controller, &mut world, &mut OfflineNetwork, &mut store);

        let property = store.lookup("manor").expect("manor");
        assert_eq!(property.price, 100_000.0);
        assert_eq!(property.employee_capacity, 10);
        assert!(controller.report().configuration_applied);
        // The poster still moves; relocation does not depend on the record.
        assert!(controller.report().relocated.is_some());
    }
}
