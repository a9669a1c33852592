mod controller;
mod events;

pub use controller::{HostContext, LifecycleController, LifecycleReport, LifecycleState};
pub use events::{LifecycleEvent, LifecycleEvents};
