//! Presence probes and the immutable registry the tick runner iterates.

use std::{collections::HashSet, fmt, sync::Arc};

use async_trait::async_trait;

use crate::error::{ProbeError, RegistryError};

/// Performs one presence check for one target.
///
/// `Ok(true)` means the target is reachable, `Ok(false)` that it was checked
/// and did not answer. An `Err` means the check itself could not be
/// completed. Different probers run concurrently; one prober instance is
/// never called by two ticks at once.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn check(&self) -> Result<bool, ProbeError>;
}

/// A named probe together with the kind label used for failure accounting.
#[derive(Clone)]
pub struct ProbeEntry {
    name: Arc<str>,
    kind: Arc<str>,
    prober: Arc<dyn Prober>,
}

impl ProbeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn prober(&self) -> &Arc<dyn Prober> {
        &self.prober
    }
}

impl fmt::Debug for ProbeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeEntry").field("name", &self.name).field("kind", &self.kind).finish()
    }
}

/// Fixed set of probes, built once at startup.
///
/// Names are unique. Entries keep their registration order, which only
/// matters for logging since a tick gives no ordering guarantee.
#[derive(Debug, Clone, Default)]
pub struct ProbeRegistry {
    entries: Vec<ProbeEntry>,
}

impl ProbeRegistry {
    /// Create a new registry builder
    pub fn builder() -> ProbeRegistryBuilder {
        ProbeRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeEntry> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ProbeEntry> {
        self.entries.iter().find(|entry| &*entry.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name())
    }
}

/// Builder for [`ProbeRegistry`]
#[derive(Default)]
pub struct ProbeRegistryBuilder {
    entries: Vec<ProbeEntry>,
    names: HashSet<Arc<str>>,
}

impl ProbeRegistryBuilder {
    /// Register `prober` under `name`, rejecting empty or duplicate names.
    pub fn register(
        self,
        name: impl Into<String>,
        kind: impl Into<String>,
        prober: impl Prober + 'static,
    ) -> Result<Self, RegistryError> {
        self.register_shared(name, kind, Arc::new(prober))
    }

    /// Same as [`register`](Self::register) for an already shared prober.
    pub fn register_shared(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        prober: Arc<dyn Prober>,
    ) -> Result<Self, RegistryError> {
        let name: Arc<str> = Arc::from(name.into());
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !self.names.insert(Arc::clone(&name)) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        self.entries.push(ProbeEntry { name, kind: Arc::from(kind.into()), prober });
        Ok(self)
    }

    pub fn build(self) -> ProbeRegistry {
        ProbeRegistry { entries: self.entries }
    }
}
