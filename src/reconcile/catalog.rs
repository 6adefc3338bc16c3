use lru::LruCache;
use std::num::NonZeroUsize;

use crate::entities::item::{CatalogKey, ItemTemplate};
use crate::persistence::store::{StoreError, WorldStore};

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64)
        }
    }
}

/// Item template lookups by catalog key, fronted by an LRU of key -> id_nb.
pub struct ItemCatalog {
    cache: LruCache<CatalogKey, String>,
    stats: CacheStats,
}

impl ItemCatalog {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn find<S: WorldStore>(
        &mut self,
        store: &S,
        key: &CatalogKey,
    ) -> Result<Option<ItemTemplate>, StoreError> {
        if let Some(id_nb) = self.cache.get(key) {
            if let Some(template) = store.get::<ItemTemplate>(id_nb)? {
                self.stats.hits += 1;
                return Ok(Some(template));
            }
            self.cache.pop(key);
        }
        self.stats.misses += 1;
        let found = store.find(|t: &ItemTemplate| {
            t.name == key.name
                && t.realm == key.realm
                && t.level == key.level
                && t.object_type == key.object_type
                && t.model == key.model
                && t.price == key.price
        })?;
        if let Some(template) = &found {
            self.remember(key.clone(), &template.id_nb);
        }
        Ok(found)
    }

    pub fn remember(&mut self, key: CatalogKey, id_nb: &str) {
        if !self.cache.contains(&key) && self.cache.len() == self.cache.cap().get() {
            self.stats.evictions += 1;
        }
        self.cache.put(key, id_nb.to_string());
    }

    /// Template id from the item name: spaces become underscores and a numeric
    /// suffix starting at 2 is appended while the id is taken.
    pub fn unique_id<S: WorldStore>(store: &S, name: &str) -> Result<String, StoreError> {
        let base = name.replace(' ', "_");
        if !store.exists::<ItemTemplate>(&base)? {
            return Ok(base);
        }
        let mut number = 2u32;
        loop {
            let candidate = format!("{}{}", base, number);
            if !store.exists::<ItemTemplate>(&candidate)? {
                return Ok(candidate);
            }
            number += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Realm;
    use crate::persistence::memory::MemoryStore;

    fn template(id_nb: &str, name: &str, price: i64) -> ItemTemplate {
        ItemTemplate {
            id_nb: id_nb.to_string(),
            name: name.to_string(),
            realm: Realm::Albion,
            level: 5,
            model: 12,
            price,
            ..ItemTemplate::default()
        }
    }

    #[test]
    fn unique_id_suffixes_on_collision() {
        let mut store = MemoryStore::new();
        assert_eq!(ItemCatalog::unique_id(&store, "Short Sword").unwrap(), "Short_Sword");
        store.insert(template("Short_Sword", "Short Sword", 10)).unwrap();
        assert_eq!(ItemCatalog::unique_id(&store, "Short Sword").unwrap(), "Short_Sword2");
        store.insert(template("Short_Sword2", "Short Sword", 11)).unwrap();
        assert_eq!(ItemCatalog::unique_id(&store, "Short Sword").unwrap(), "Short_Sword3");
    }

    #[test]
    fn find_matches_every_key_field_and_caches() {
        let mut store = MemoryStore::new();
        store.insert(template("Dirk", "Dirk", 100)).unwrap();
        let mut catalog = ItemCatalog::new(8);

        let mut key = template("", "Dirk", 100).catalog_key();
        assert_eq!(catalog.find(&store, &key).unwrap().unwrap().id_nb, "Dirk");
        assert_eq!(catalog.find(&store, &key).unwrap().unwrap().id_nb, "Dirk");
        assert_eq!(catalog.stats().hits, 1);
        assert_eq!(catalog.stats().misses, 1);
        assert_eq!(catalog.stats().hit_rate(), 0.5);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        key.price = 101;
        assert!(catalog.find(&store, &key).unwrap().is_none());
    }

    #[test]
    fn stale_cache_entry_falls_back_to_store() {
        let mut store = MemoryStore::new();
        store.insert(template("Dirk", "Dirk", 100)).unwrap();
        let mut catalog = ItemCatalog::new(8);
        let key = template("", "Dirk", 100).catalog_key();
        catalog.find(&store, &key).unwrap();
        store.delete::<ItemTemplate>("Dirk").unwrap();
        assert!(catalog.find(&store, &key).unwrap().is_none());
    }
}
