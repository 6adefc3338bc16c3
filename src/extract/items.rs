//! Item templates built from merchant window listings.

use crate::entities::item::{item_slot, object_type, CatalogKey, ItemTemplate};
use crate::entities::Realm;
use crate::lang::LanguageTable;
use crate::persistence::store::{StoreError, WorldStore};
use crate::protocol::MerchantListing;
use crate::reconcile::catalog::ItemCatalog;
use crate::tables;

const STACK_CRAFT_MATERIAL: u16 = 200;
const STACK_AMMUNITION: u16 = 200;
const STACK_THROWN: u16 = 100;
const STACK_POISON: u16 = 100;
const PACK_THROWN: u16 = 20;
const INSTRUMENT_MIN_DPS: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingResolution {
    Found(String),
    Created(String),
}

impl ListingResolution {
    pub fn id_nb(&self) -> &str {
        match self {
            ListingResolution::Found(id) | ListingResolution::Created(id) => id,
        }
    }
}

/// Object type the listing is stored under. Poison vials are listed as
/// generic or magical items.
pub fn effective_object_type(listing: &MerchantListing) -> u8 {
    if tables::models().is_poison(listing.model) {
        object_type::POISON
    } else {
        listing.object_type
    }
}

pub fn catalog_key(listing: &MerchantListing, realm: Realm) -> CatalogKey {
    CatalogKey {
        name: listing.name.clone(),
        realm,
        level: listing.level,
        object_type: effective_object_type(listing),
        model: listing.model,
        price: listing.price as i64,
    }
}

/// Fresh template for a listing, without an id.
pub fn new_template(listing: &MerchantListing, realm: Realm, lang: &LanguageTable) -> ItemTemplate {
    let models = tables::models();
    let value1 = listing.value1 as i32;
    let mut template = ItemTemplate {
        name: listing.name.clone(),
        realm,
        level: listing.level,
        object_type: effective_object_type(listing),
        model: listing.model,
        price: listing.price as i64,
        weight: listing.weight,
        spd_abs: listing.spd_abs as i32,
        damage_type: listing.damage_type,
        hand: listing.hand,
        ..ItemTemplate::default()
    };

    use object_type::*;
    match template.object_type {
        ARROW | BOLT => {
            template.pack_size = listing.value1 as u16;
            template.item_type = item_slot::GENERIC;
            template.max_count = STACK_AMMUNITION;
        }
        THROWN => {
            template.dps_af = value1;
            template.item_type = item_slot::DISTANCE;
            template.max_count = STACK_THROWN;
            template.pack_size = PACK_THROWN;
        }
        GENERIC_ITEM => {
            template.pack_size = listing.value1 as u16;
            template.item_type = models.item_slot(listing.model);
            if models.is_craft_material(listing.model) {
                template.max_count = STACK_CRAFT_MATERIAL;
            }
            if models.is_dye(listing.model) {
                template.color = tables::labels().dye_color(lang, &listing.name);
            }
        }
        SHIELD => {
            template.damage_type = listing.value1;
            template.item_type = item_slot::LEFT_HAND;
        }
        CRUSHING_WEAPON | SLASHING_WEAPON | THRUST_WEAPON | SWORD | HAMMER | AXE | BLADES
        | BLUNT | PIERCING | FLEXIBLE | HAND_TO_HAND => {
            template.dps_af = value1;
            template.item_type = match listing.hand {
                0 => item_slot::RIGHT_HAND,
                1 => item_slot::TWO_HANDED,
                _ => item_slot::LEFT_HAND,
            };
        }
        FIRED | LONGBOW | CROSSBOW | COMPOSITE_BOW | RECURVED_BOW => {
            template.dps_af = value1;
            template.item_type = item_slot::DISTANCE;
        }
        TWO_HANDED_WEAPON | POLEARM_WEAPON | STAFF | SPEAR | LARGE_WEAPONS | CELTIC_SPEAR
        | SCYTHE => {
            template.dps_af = value1;
            template.item_type = item_slot::TWO_HANDED;
        }
        INSTRUMENT => {
            template.dps_af = if value1 == 0 { INSTRUMENT_MIN_DPS } else { value1 };
            template.item_type = item_slot::TWO_HANDED;
        }
        GENERIC_ARMOR..=SCALE => {
            template.dps_af = value1;
            template.item_type = models.armor_slot(listing.model);
        }
        MAGICAL => {
            template.dps_af = value1;
            template.item_type = models.item_slot(listing.model);
        }
        POISON => {
            template.pack_size = listing.value1 as u16;
            template.item_type = item_slot::GENERIC;
            template.max_count = STACK_POISON;
        }
        _ => {}
    }

    if template.pack_size == 0 {
        template.pack_size = 1;
    }
    template.weight /= template.pack_size;
    if template.weight == 0 {
        template.weight = 1;
    }
    template
}

/// Reuses the stored template a listing describes, or stores a new one.
pub fn resolve_listing<S: WorldStore>(
    store: &mut S,
    catalog: &mut ItemCatalog,
    listing: &MerchantListing,
    realm: Realm,
    lang: &LanguageTable,
) -> Result<ListingResolution, StoreError> {
    let key = catalog_key(listing, realm);
    if let Some(found) = catalog.find(store, &key)? {
        return Ok(ListingResolution::Found(found.id_nb));
    }
    let mut template = new_template(listing, realm, lang);
    template.id_nb = ItemCatalog::unique_id(store, &listing.name)?;
    let id_nb = template.id_nb.clone();
    catalog.remember(template.catalog_key(), &id_nb);
    store.insert(template)?;
    Ok(ListingResolution::Created(id_nb))
}
