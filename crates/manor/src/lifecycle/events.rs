use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A world context finished loading. Carries the context name, e.g. `"Main"`.
    WorldLoaded(String),
    WorldUnloaded,
    ApplicationQuit,
}

/// Cloneable, `Send` handle the host uses to feed lifecycle callbacks to the controller.
#[derive(Debug, Clone)]
pub struct LifecycleEvents {
    sender: Sender<LifecycleEvent>,
}

impl LifecycleEvents {
    /// Returns `false` once the controller is gone.
    pub fn send(&self, event: LifecycleEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(event)) | Err(TrySendError::Full(event)) => {
                debug!(event = ?event, "lifecycle_event_dropped");
                false
            }
        }
    }

    pub fn world_loaded(&self, context: &str) -> bool {
        self.send(LifecycleEvent::WorldLoaded(context.to_string()))
    }

    pub fn world_unloaded(&self) -> bool {
        self.send(LifecycleEvent::WorldUnloaded)
    }

    pub fn application_quit(&self) -> bool {
        self.send(LifecycleEvent::ApplicationQuit)
    }
}

pub(crate) fn channel() -> (LifecycleEvents, Receiver<LifecycleEvent>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (LifecycleEvents { sender }, receiver)
}
