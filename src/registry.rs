use std::collections::BTreeMap;

use crate::engine::QueryEngine;

/// Caller-owned map from driver name to an open session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<String, QueryEngine>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its driver's name, returning any session it replaces.
    pub fn register(&mut self, engine: QueryEngine) -> Option<QueryEngine> {
        self.register_as(engine.driver_name(), engine)
    }

    /// Register a session under an explicit name.
    pub fn register_as(&mut self, name: impl Into<String>, engine: QueryEngine) -> Option<QueryEngine> {
        self.sessions.insert(name.into(), engine)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&QueryEngine> {
        self.sessions.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut QueryEngine> {
        self.sessions.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<QueryEngine> {
        self.sessions.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    #[test]
    fn sessions_are_keyed_by_driver_name() -> Result<(), Box<dyn std::error::Error>> {
        let mut registry = SessionRegistry::new();
        let engine = QueryEngine::open(&SessionConfig::sqlite(":memory:"))?;
        assert!(registry.register(engine).is_none());
        assert!(registry.get("sqlite").is_some());

        let second = QueryEngine::open(&SessionConfig::sqlite(":memory:"))?;
        assert!(registry.register(second).is_some());
        assert_eq!(registry.len(), 1);

        let other = QueryEngine::open(&SessionConfig::sqlite(":memory:"))?;
        registry.register_as("reporting", other);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["reporting", "sqlite"]);
        assert!(registry.remove("sqlite").is_some());
        assert!(registry.get_mut("sqlite").is_none());
        Ok(())
    }
}
