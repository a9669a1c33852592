mod elements;
mod entity;
mod notify;
mod registry;

pub use elements::{EntryGate, InteractableToggleable, LoadingDock, ModularSwitch};
pub use entity::Property;
pub use notify::{ChangeFlag, ChangeListener, ListenerKey, StateNotifier};
pub use registry::{EntityRegistry, PropertyStore};
