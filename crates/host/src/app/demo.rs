use manor::{
    encode_bundle, BundleError, ConfigurationRecord, LocalServer, MergePolicy, ModSettings,
    NetworkCapability, OfflineNetwork, PrefabAsset, PrefabNode, Property, PropertyStore,
    SceneGraph, Transform, Vec3,
};
use tracing::debug;

use super::bootstrap::NetworkMode;

const PROPERTY_NODE_PATH: &str = "@Properties/Manor";
const PROPERTY_DISPLAY_NAME: &str = "Hilltop Manor";

/// The stand-in world the host drives the pipeline against.
pub(crate) struct DemoHost {
    pub(crate) world: SceneGraph,
    pub(crate) registry: PropertyStore,
    pub(crate) network: Box<dyn NetworkCapability>,
}

impl DemoHost {
    pub(crate) fn new(settings: &ModSettings, mode: NetworkMode) -> Self {
        let mut world = SceneGraph::default();
        let mut property = Property::new(&settings.property_code, PROPERTY_DISPLAY_NAME);
        property.price = 50_000.0;
        property.employee_capacity = 4;

        if let Some(whiteboard) = world.ensure_path(&settings.whiteboard_path) {
            world.set_local_transform(whiteboard, at(-32.0, 1.8, 14.0));
        }
        if let Some(node) = world.ensure_path(PROPERTY_NODE_PATH) {
            world.set_local_transform(node, at(140.0, 4.0, -60.0));
            property.node = Some(node);
            // Stock idle spots that the bundle's Replace policy swaps out.
            for index in 0..4 {
                let path = format!("{PROPERTY_NODE_PATH}/Idle/Stock {index}");
                if let Some(spot) = world.ensure_path(&path) {
                    property.employee_idle_points.push(spot);
                }
            }
        }
        for path in &settings.disable_originals {
            world.ensure_path(path);
        }

        let mut registry = PropertyStore::new();
        registry.insert(property);

        let network: Box<dyn NetworkCapability> = match mode {
            NetworkMode::Offline => Box::new(OfflineNetwork),
            NetworkMode::Server => Box::new(LocalServer::started()),
            NetworkMode::Client => Box::new(LocalServer::client()),
        };
        debug!(nodes = world.node_count(), network_mode = ?mode, "demo_world_built");

        Self {
            world,
            registry,
            network,
        }
    }
}

/// The bundle compiled into the host: one manor setup prefab and its property record.
pub(crate) fn embedded_bundle(settings: &ModSettings) -> Result<Vec<u8>, BundleError> {
    encode_bundle(&settings.bundle_name, &[manor_setup_prefab(settings)])
}

fn manor_setup_prefab(settings: &ModSettings) -> PrefabAsset {
    let mut record = ConfigurationRecord {
        property_code: settings.property_code.clone(),
        price: 175_000.0,
        employee_capacity: 6,
        npc_spawn_point: Some("NPC Spawn".to_string()),
        loading_docks: vec!["Loading Dock East".to_string(), "Loading Dock West".to_string()],
        switches: vec!["Hall Lights".to_string(), "Garage Lights".to_string()],
        toggleables: vec!["Garage Door".to_string()],
        idle_points: (1..=6).map(|index| format!("Idle Point {index}")).collect(),
        listing_poster: Some(settings.listing_poster_name.clone()),
        entry_gate: Some("Manor Gate".to_string()),
        ..ConfigurationRecord::default()
    };
    record.policies.idle_points = MergePolicy::Replace;

    PrefabAsset {
        name: settings.prefab_name.clone(),
        replicable: true,
        root: PrefabNode::new(&settings.prefab_name).with_children(vec![
            PrefabNode::new("NPC Spawn").with_transform(at(0.0, 0.0, 6.0)),
            PrefabNode::new("Docks").with_children(vec![
                PrefabNode::new("Loading Dock East").with_transform(at(18.0, 0.0, 2.0)),
                PrefabNode::new("Loading Dock West").with_transform(at(-18.0, 0.0, 2.0)),
            ]),
            PrefabNode::new("Interior").with_children(vec![
                PrefabNode::new("Hall Lights"),
                PrefabNode::new("Garage Lights"),
                PrefabNode::new("Garage Door"),
            ]),
            PrefabNode::new("Idle Points").with_children(
                (1..=6)
                    .map(|index| {
                        PrefabNode::new(&format!("Idle Point {index}"))
                            .with_transform(at(index as f32, 0.0, -3.0))
                    })
                    .collect(),
            ),
            PrefabNode::new("Manor Gate").with_transform(at(0.0, 0.0, 24.0)),
            PrefabNode::new(&settings.listing_poster_name)
                .with_transform(at(0.5, 1.6, 0.0))
                .with_active(false),
        ]),
        configuration: Some(record),
    }
}

fn at(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_position(Vec3::new(x, y, z))
}
