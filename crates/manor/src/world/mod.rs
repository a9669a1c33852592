mod graph;
mod scene_graph;
mod transform;

pub use graph::{NodeId, WorldGraph, WorldGraphError};
pub use scene_graph::{NodeIdAllocator, SceneGraph, SceneNode};
pub use transform::{Transform, Vec3};
