use std::collections::BTreeMap;
use tracing::warn;

use crate::entities::npc::NpcEquipment;
use crate::persistence::store::{StoreError, WorldStore};
use crate::reconcile::signature::{Signature, SignatureBuilder};
use crate::reconcile::{Composite, TemplateCache};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EquipmentItem {
    pub slot: u8,
    pub model: u16,
    pub color: u16,
    pub effect: u16,
}

/// Worn items of one creature, one per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentSet {
    items: BTreeMap<u8, EquipmentItem>,
}

impl EquipmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false and keeps the existing item when the slot is taken.
    pub fn add(&mut self, item: EquipmentItem) -> bool {
        if let Some(existing) = self.items.get(&item.slot) {
            warn!(
                slot = item.slot,
                kept_model = existing.model,
                dropped_model = item.model,
                "equipment slot listed twice"
            );
            return false;
        }
        self.items.insert(item.slot, item);
        true
    }

    pub fn items(&self) -> impl Iterator<Item = &EquipmentItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn rows(&self, template_id: &str) -> Vec<NpcEquipment> {
        self.items
            .values()
            .map(|item| NpcEquipment {
                id: format!("{}-{}", template_id, item.slot),
                template_id: template_id.to_string(),
                slot: item.slot,
                model: item.model,
                color: item.color,
                effect: item.effect,
            })
            .collect()
    }
}

impl Composite for EquipmentSet {
    fn signature(&self) -> Signature {
        let mut builder = SignatureBuilder::new("equipment");
        for item in self.items.values() {
            builder
                .u8(item.slot)
                .u16(item.model)
                .u16(item.color)
                .u16(item.effect);
        }
        builder.finish()
    }
}

pub fn equipment_cache<S: WorldStore>(store: &S) -> Result<TemplateCache, StoreError> {
    let mut grouped: BTreeMap<String, EquipmentSet> = BTreeMap::new();
    for row in store.all::<NpcEquipment>()? {
        grouped.entry(row.template_id.clone()).or_default().add(EquipmentItem {
            slot: row.slot,
            model: row.model,
            color: row.color,
            effect: row.effect,
        });
    }
    let mut cache = TemplateCache::new("equipment");
    cache.preload(grouped.into_iter().map(|(id, set)| (id, set.signature())));
    Ok(cache)
}

/// Writes the per-slot rows of a new template.
pub fn persist_equipment<S: WorldStore>(
    store: &mut S,
    set: &EquipmentSet,
    template_id: &str,
) -> Result<(), StoreError> {
    for row in set.rows(template_id) {
        store.insert(row)?;
    }
    Ok(())
}
