use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ChangeFlag(Arc<AtomicBool>);

impl ChangeFlag {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_marked(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn same_as(&self, other: &ChangeFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey(pub String);

#[derive(Debug, Clone)]
pub struct ChangeListener {
    pub key: ListenerKey,
    flag: ChangeFlag,
}

impl ChangeListener {
    pub fn new(key: ListenerKey, flag: ChangeFlag) -> Self {
        Self { key, flag }
    }

    fn fire(&self) {
        self.flag.mark();
    }
}

#[derive(Debug, Clone, Default)]
pub struct StateNotifier {
    listeners: Vec<ChangeListener>,
}

impl StateNotifier {
    /// Detaches every listener with the same key, then attaches `listener`.
    pub fn replace_listener(&mut self, listener: ChangeListener) {
        self.listeners.retain(|existing| existing.key != listener.key);
        self.listeners.push(listener);
    }

    pub fn detach(&mut self, key: &ListenerKey) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|existing| &existing.key != key);
        before - self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn count_for(&self, key: &ListenerKey) -> usize {
        self.listeners
            .iter()
            .filter(|listener| &listener.key == key)
            .count()
    }

    pub fn notify(&self) {
        for listener in &self.listeners {
            listener.fire();
        }
    }
}
