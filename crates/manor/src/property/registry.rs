use std::collections::HashMap;

use super::entity::Property;

/// Host-side lookup of properties by code.
pub trait EntityRegistry {
    fn lookup(&self, code: &str) -> Option<&Property>;
    fn lookup_mut(&mut self, code: &str) -> Option<&mut Property>;
}

#[derive(Debug, Default)]
pub struct PropertyStore {
    by_code: HashMap<String, Property>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the property under its code.
    pub fn insert(&mut self, property: Property) -> Option<Property> {
        self.by_code.insert(property.code.clone(), property)
    }

    pub fn remove(&mut self, code: &str) -> Option<Property> {
        self.by_code.remove(code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    pub fn codes(&self) -> Vec<&str> {
        let mut codes = self.by_code.keys().map(String::as_str).collect::<Vec<_>>();
        codes.sort_unstable();
        codes
    }
}

impl EntityRegistry for PropertyStore {
    fn lookup(&self, code: &str) -> Option<&Property> {
        self.by_code.get(code)
    }

    fn lookup_mut(&mut self, code: &str) -> Option<&mut Property> {
        self.by_code.get_mut(code)
    }
}
