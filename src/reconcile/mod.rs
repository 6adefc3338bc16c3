pub mod catalog;
pub mod equipment;
pub mod signature;
pub mod trade;

use std::collections::HashMap;
use tracing::warn;

use crate::persistence::store::{StoreError, WorldStore};
use signature::Signature;

/// A composite entity that is stored once per distinct content.
pub trait Composite {
    fn signature(&self) -> Signature;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub preloaded: u64,
    pub reused: u64,
    pub created: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Reused(String),
    Created(String),
}

impl Resolution {
    pub fn template_id(&self) -> &str {
        match self {
            Resolution::Reused(id) | Resolution::Created(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

/// Signature -> template id for every template known in this pass, stored or new.
#[derive(Debug, Default)]
pub struct TemplateCache {
    kind: &'static str,
    by_signature: HashMap<Signature, String>,
    stats: ReconcileStats,
}

impl TemplateCache {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            by_signature: HashMap::new(),
            stats: ReconcileStats::default(),
        }
    }

    /// Seeds the cache from stored templates. When two stored templates share
    /// content the first one is kept.
    pub fn preload(&mut self, entries: impl IntoIterator<Item = (String, Signature)>) {
        for (template_id, signature) in entries {
            if let Some(existing) = self.by_signature.get(&signature) {
                warn!(
                    kind = self.kind,
                    kept = %existing,
                    ignored = %template_id,
                    "stored templates share a signature"
                );
                continue;
            }
            self.by_signature.insert(signature, template_id);
            self.stats.preloaded += 1;
        }
    }

    pub fn get(&self, signature: &Signature) -> Option<&str> {
        self.by_signature.get(signature).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Links `composite` to a known template, or persists it through `persist`
    /// under a new id derived from its signature and caches it.
    pub fn reconcile<S, C, F>(
        &mut self,
        store: &mut S,
        composite: &C,
        persist: F,
    ) -> Result<Resolution, StoreError>
    where
        S: WorldStore,
        C: Composite,
        F: FnOnce(&mut S, &str) -> Result<(), StoreError>,
    {
        let signature = composite.signature();
        if let Some(template_id) = self.by_signature.get(&signature) {
            self.stats.reused += 1;
            return Ok(Resolution::Reused(template_id.clone()));
        }
        let template_id = signature.to_id();
        persist(store, &template_id)?;
        self.by_signature.insert(signature, template_id.clone());
        self.stats.created += 1;
        Ok(Resolution::Created(template_id))
    }
}
