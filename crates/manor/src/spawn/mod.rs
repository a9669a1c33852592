mod orchestrator;

pub use orchestrator::{SpawnError, SpawnMode, SpawnOrchestrator, SpawnedInstance};
