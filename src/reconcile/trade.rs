use std::collections::BTreeMap;
use tracing::warn;

use crate::entities::item::MerchantItem;
use crate::persistence::store::{StoreError, WorldStore};
use crate::reconcile::signature::{Signature, SignatureBuilder};
use crate::reconcile::{Composite, TemplateCache};

pub const MAX_ITEMS_PER_PAGE: u32 = 30;

/// A merchant's wares: window position (page * 30 + slot) -> item template id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeItemList {
    entries: BTreeMap<u32, String>,
}

impl TradeItemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(page: u8, slot: u8) -> u32 {
        page as u32 * MAX_ITEMS_PER_PAGE + slot as u32
    }

    /// Returns false and keeps the existing entry when the position is taken.
    pub fn add(&mut self, item_id: &str, page: u8, slot: u8) -> bool {
        let position = Self::position(page, slot);
        if let Some(existing) = self.entries.get(&position) {
            warn!(
                page,
                slot,
                kept = %existing,
                dropped = item_id,
                "trade window position listed twice"
            );
            return false;
        }
        self.entries.insert(position, item_id.to_string());
        true
    }

    /// (item id, page, slot) in window order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u8, u8)> {
        self.entries.iter().map(|(position, item)| {
            (
                item.as_str(),
                (position / MAX_ITEMS_PER_PAGE) as u8,
                (position % MAX_ITEMS_PER_PAGE) as u8,
            )
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rows(&self, list_id: &str) -> Vec<MerchantItem> {
        self.entries()
            .map(|(item, page, slot)| MerchantItem {
                id: format!("{}-{}-{}", list_id, page, slot),
                list_id: list_id.to_string(),
                item_template: item.to_string(),
                page,
                slot,
            })
            .collect()
    }
}

impl Composite for TradeItemList {
    fn signature(&self) -> Signature {
        let mut builder = SignatureBuilder::new("trade-list");
        for (item, page, slot) in self.entries() {
            builder.str(item).u8(page).u8(slot);
        }
        builder.finish()
    }
}

pub fn trade_list_cache<S: WorldStore>(store: &S) -> Result<TemplateCache, StoreError> {
    let mut grouped: BTreeMap<String, TradeItemList> = BTreeMap::new();
    for row in store.all::<MerchantItem>()? {
        grouped
            .entry(row.list_id.clone())
            .or_default()
            .add(&row.item_template, row.page, row.slot);
    }
    let mut cache = TemplateCache::new("trade list");
    cache.preload(grouped.into_iter().map(|(id, list)| (id, list.signature())));
    Ok(cache)
}

pub fn persist_trade_list<S: WorldStore>(
    store: &mut S,
    list: &TradeItemList,
    list_id: &str,
) -> Result<(), StoreError> {
    for row in list.rows(list_id) {
        store.insert(row)?;
    }
    Ok(())
}
