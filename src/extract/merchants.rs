//! Merchants, their trade lists and the item templates those lists reference.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use tracing::{debug, info, warn};

use crate::entities::item::ItemTemplate;
use crate::entities::npc::{Mob, NpcClass};
use crate::error::{ExtractError, FormatError};
use crate::extract::delve::{DelveDecoder, DelveError};
use crate::extract::items::{resolve_listing, ListingResolution};
use crate::extract::report::MissingSpellReport;
use crate::extract::{Pass, PhaseContext};
use crate::net::record::{Direction, RawRecord};
use crate::persistence::store::WorldStore;
use crate::protocol::{DelveInfo, Event, MerchantPage, NpcSpawn, OPCODE_DELVE, OPCODE_MERCHANT_PAGE};
use crate::reconcile::catalog::ItemCatalog;
use crate::reconcile::trade::{persist_trade_list, trade_list_cache, TradeItemList};
use crate::reconcile::TemplateCache;

pub const MERCHANTS: &str = "merchants";
pub const LISTS: &str = "trade_lists";
pub const LISTS_CREATED: &str = "trade_lists_created";
pub const LISTS_REUSED: &str = "trade_lists_reused";
pub const ITEMS: &str = "items";
pub const ITEMS_FOUND: &str = "items_found";
pub const ITEMS_CREATED: &str = "items_created";
pub const DELVES: &str = "delves";
pub const SPELLS_MATCHED: &str = "spells_matched";
pub const REPORT_ENTRIES: &str = "report_entries";

/// Per-pass merchant bookkeeping.
#[derive(Default)]
struct MerchantState {
    /// region -> object id -> stored mob id
    known: HashMap<u16, HashMap<u16, String>>,
    /// Item name -> template id of the list read last. Tooltips are resolved
    /// against it.
    current_list: Option<HashMap<String, String>>,
}

impl MerchantState {
    fn merchant(&self, region: u16, oid: u16) -> Option<&str> {
        self.known.get(&region)?.get(&oid).map(String::as_str)
    }
}

/// Truncates the report file, then runs the phase writing into it.
pub fn run<R: BufRead, S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
) -> Result<(), ExtractError> {
    let path = ctx.config.report_file.clone();
    let file = File::create(&path).map_err(|err| ExtractError::io(&path, err))?;
    let mut report = MissingSpellReport::new(BufWriter::new(file));
    let result = run_into(ctx, pass, &mut report);
    let flushed = report.flush().map_err(|err| ExtractError::io(&path, err));
    if report.entries() > 0 {
        info!(entries = report.entries(), path = %path.display(), "missing spell report written");
    }
    result.and(flushed)
}

pub fn run_into<R: BufRead, S: WorldStore, W: Write>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
    report: &mut MissingSpellReport<W>,
) -> Result<(), ExtractError> {
    let mut state = MerchantState::default();
    let mut lists = trade_list_cache(&*ctx.store)?;
    let mut catalog = ItemCatalog::new(ctx.config.item_cache_capacity);

    while let Some((record, event)) = pass.next_event()? {
        match event {
            Event::RealmSelected(Some(realm)) => ctx.session.select_realm(realm),
            Event::PlayerPosition(position) => ctx.session.observe_position(&position),
            Event::NpcSpawned(spawn) => note_merchant(ctx, &mut state, &spawn)?,
            Event::Interact { npc_oid } => {
                if state.merchant(ctx.session.region_or_default(), npc_oid).is_some() {
                    ctx.session.arm_interaction(npc_oid);
                }
            }
            Event::MerchantPage(page) => {
                read_trade_list(ctx, pass, &mut state, &mut lists, &mut catalog, page)?;
            }
            Event::Delve(info) => apply_delve(ctx, &state, report, &record, info)?,
            _ => {}
        }
    }

    ctx.stats.set(REPORT_ENTRIES, report.entries());
    let cache = catalog.stats();
    debug!(
        hits = cache.hits,
        misses = cache.misses,
        evictions = cache.evictions,
        hit_rate = cache.hit_rate(),
        "item catalog"
    );
    Ok(())
}

/// Merchants are recognised by their guild label and must already be stored.
fn note_merchant<S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    state: &mut MerchantState,
    spawn: &NpcSpawn,
) -> Result<(), ExtractError> {
    let is_merchant = ctx.lang.found_in("merchant_string", &spawn.guild)
        || ctx.lang.found_in("stable_master_string", &spawn.guild);
    if !is_merchant {
        return Ok(());
    }
    let region = ctx.session.region_or_default();
    if state.merchant(region, spawn.oid).is_some() {
        return Ok(());
    }
    let stored = ctx.store.find(|mob: &Mob| {
        mob.name == spawn.name
            && mob.region == region
            && mob.realm == spawn.realm
            && mob.x == spawn.x
            && mob.y == spawn.y
            && mob.z == spawn.z
    })?;
    let Some(mut mob) = stored else {
        debug!(oid = spawn.oid, name = %spawn.name, "merchant not stored, ignored");
        return Ok(());
    };
    mob.guild = spawn.guild.clone();
    let mob_id = mob.id.clone();
    ctx.store.update(mob)?;
    state
        .known
        .entry(region)
        .or_default()
        .insert(spawn.oid, mob_id);
    ctx.stats.bump(MERCHANTS);
    Ok(())
}

/// Reads every page of the opened merchant's window, then links the merchant
/// to one stored list with that content.
fn read_trade_list<R: BufRead, S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
    state: &mut MerchantState,
    lists: &mut TemplateCache,
    catalog: &mut ItemCatalog,
    first: MerchantPage,
) -> Result<(), ExtractError> {
    let region = ctx.session.region_or_default();
    let merchant = ctx
        .session
        .interaction()
        .and_then(|oid| state.merchant(region, oid))
        .map(str::to_string);
    let Some(merchant_id) = merchant else {
        debug!(page = first.page, "item list without an opened merchant");
        return Ok(());
    };
    let Some(mut mob) = ctx.store.get::<Mob>(&merchant_id)? else {
        warn!(id = %merchant_id, "merchant vanished from the store");
        ctx.session.disarm_interaction();
        return Ok(());
    };

    // items are catalogued under the realm of the character doing the shopping
    let realm = ctx.session.realm();
    let mut list = TradeItemList::new();
    let mut names = HashMap::new();
    let mut page = Some(first);
    while let Some(current) = page.take() {
        for listing in &current.items {
            ctx.stats.bump(ITEMS);
            let resolution = resolve_listing(&mut *ctx.store, catalog, listing, realm, ctx.lang)?;
            match &resolution {
                ListingResolution::Found(_) => ctx.stats.bump(ITEMS_FOUND),
                ListingResolution::Created(id) => {
                    debug!(id = %id, name = %listing.name, "item template created");
                    ctx.stats.bump(ITEMS_CREATED);
                }
            }
            let id_nb = resolution.id_nb().to_string();
            list.add(&id_nb, current.page, listing.slot);
            names.entry(listing.name.clone()).or_insert(id_nb);
        }
        page = match pass.next_if(Direction::Incoming, OPCODE_MERCHANT_PAGE)? {
            Some(Event::MerchantPage(next)) => Some(next),
            _ => None,
        };
    }

    ctx.stats.bump(LISTS);
    let resolution = lists.reconcile(&mut *ctx.store, &list, |store, id| {
        persist_trade_list(store, &list, id)
    })?;
    if resolution.is_created() {
        ctx.stats.bump(LISTS_CREATED);
    } else {
        ctx.stats.bump(LISTS_REUSED);
    }

    mob.class = if ctx.lang.found_in("stable_master_string", &mob.guild) {
        NpcClass::StableMaster
    } else {
        NpcClass::Merchant
    };
    mob.items_list_template = Some(resolution.template_id().to_string());
    debug!(merchant = %mob.name, list = resolution.template_id(), items = list.len(), "trade list linked");
    ctx.store.update(mob)?;

    ctx.session.disarm_interaction();
    state.current_list = Some(names);
    Ok(())
}

fn apply_delve<S: WorldStore, W: Write>(
    ctx: &mut PhaseContext<'_, S>,
    state: &MerchantState,
    report: &mut MissingSpellReport<W>,
    record: &RawRecord,
    info: DelveInfo,
) -> Result<(), ExtractError> {
    let Some(id_nb) = state
        .current_list
        .as_ref()
        .and_then(|names| names.get(&info.item_name))
    else {
        return Ok(());
    };
    let Some(mut item) = ctx.store.get::<ItemTemplate>(id_nb)? else {
        warn!(id = %id_nb, "listed item template missing");
        return Ok(());
    };

    let outcome = DelveDecoder::new(ctx.lang, &*ctx.store, report)
        .apply(&mut item, &info.text)
        .map_err(|err| match err {
            DelveError::Read(err) => {
                ExtractError::from(FormatError::truncated_record(record.line, OPCODE_DELVE, err))
            }
            DelveError::Report(err) => ExtractError::io(&ctx.config.report_file, err),
            DelveError::Store(err) => ExtractError::from(err),
        })?;
    ctx.stats.bump(DELVES);
    if outcome.spell_id.is_some() {
        ctx.stats.bump(SPELLS_MATCHED);
    }
    ctx.store.update(item)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::entities::item::{object_type, MerchantItem};
    use crate::entities::spell::{LineSpell, Spell};
    use crate::entities::Realm;
    use crate::extract::fixture::{Listing, LogBuilder, Spawn};
    use crate::extract::{creatures, Phase, PhaseStats};
    use crate::lang::LanguageTable;
    use crate::net::record::RecordReader;
    use crate::persistence::memory::MemoryStore;
    use crate::protocol::delve::fixture::DelveBuilder;
    use crate::protocol::DecoderTable;
    use std::io::Cursor;
    use std::path::Path;

    fn lang() -> LanguageTable {
        LanguageTable::from_pairs([
            ("merchant_string", "Merchant"),
            ("stable_master_string", "Stable Master"),
            ("magical_bonuses_string", "Magical Bonuses:"),
            ("strength_string", "Strength"),
            ("level_requirement_string", "Level Requirement:"),
            ("magical_ability_string", "Magical Ability:"),
            ("function_string", "Function:"),
            ("disease_string", "disease"),
            ("duration_string", "Duration:"),
        ])
    }

    fn run_phase(store: &mut MemoryStore, phase: Phase, text: &str) -> (PhaseStats, String) {
        let config = AppConfig::default();
        let lang = lang();
        let decoders = DecoderTable::standard();
        let profile = config.protocol_table().unwrap().profile_for(176);
        let reader = RecordReader::new(Cursor::new(text.as_bytes().to_vec()));
        let mut pass = Pass::new(Path::new("mem.log"), reader, &decoders, profile, phase).unwrap();
        let mut ctx = PhaseContext::new(store, &config, &lang, phase);
        let mut report = MissingSpellReport::new(Vec::new());
        match phase {
            Phase::Creatures => creatures::run(&mut ctx, &mut pass).unwrap(),
            _ => run_into(&mut ctx, &mut pass, &mut report).unwrap(),
        }
        (ctx.stats, String::from_utf8(report.into_inner()).unwrap())
    }

    fn extract(store: &mut MemoryStore, text: &str) -> (PhaseStats, String) {
        run_phase(store, Phase::Creatures, text);
        run_phase(store, Phase::Merchants, text)
    }

    fn merchant(oid: u16, x: u32, guild: &'static str) -> Spawn {
        Spawn {
            oid,
            x,
            y: 2_000,
            z: 10,
            model: 30,
            level: 40,
            realm: 1,
            name: "Ulf",
            guild,
            ..Spawn::default()
        }
    }

    fn sword(slot: u8) -> Listing {
        Listing {
            slot,
            level: 20,
            value1: 30,
            spd_abs: 37,
            object_type: object_type::SWORD,
            weight: 30,
            price: 5_000,
            model: 4,
            name: "short sword",
            ..Listing::default()
        }
    }

    fn arrows(slot: u8) -> Listing {
        Listing {
            slot,
            level: 1,
            value1: 20,
            object_type: object_type::ARROW,
            weight: 20,
            price: 40,
            model: 1,
            name: "arrows",
            ..Listing::default()
        }
    }

    #[test]
    fn pages_are_joined_into_one_list() {
        let text = LogBuilder::new()
            .character_select("hero-S")
            .position(5, 27, 1_000, 2_000, 10, 0)
            .npc(&merchant(20, 1_000, "Weapon Merchant"))
            .interact(20)
            .merchant_page(0, &[sword(0), arrows(1)])
            .merchant_page(1, &[arrows(0)])
            .emote(5, 1)
            .finish();
        let mut store = MemoryStore::new();
        let (stats, _) = extract(&mut store, &text);

        assert_eq!(stats.get(MERCHANTS), 1);
        assert_eq!(stats.get(LISTS), 1);
        assert_eq!(stats.get(ITEMS), 3);
        assert_eq!(stats.get(ITEMS_CREATED), 2);
        assert_eq!(stats.get(ITEMS_FOUND), 1);
        assert_eq!(store.count::<ItemTemplate>(), 2);
        assert_eq!(store.count::<MerchantItem>(), 3);

        let mob = store.all::<Mob>().unwrap().remove(0);
        assert_eq!(mob.class, NpcClass::Merchant);
        assert!(mob.items_list_template.is_some());
    }

    #[test]
    fn equal_lists_share_one_template() {
        let text = LogBuilder::new()
            .character_select("hero-S")
            .position(5, 27, 1_000, 2_000, 10, 0)
            .npc(&merchant(20, 1_000, "Weapon Merchant"))
            .npc(&merchant(21, 3_000, "Stable Master"))
            .interact(20)
            .merchant_page(0, &[sword(0), arrows(1)])
            .interact(21)
            .merchant_page(0, &[sword(0), arrows(1)])
            .finish();
        let mut store = MemoryStore::new();
        let (stats, _) = extract(&mut store, &text);
        assert_eq!(stats.get(LISTS_CREATED), 1);
        assert_eq!(stats.get(LISTS_REUSED), 1);
        assert_eq!(store.count::<MerchantItem>(), 2);

        let mobs = store.all::<Mob>().unwrap();
        assert_eq!(mobs[0].items_list_template, mobs[1].items_list_template);
        assert!(mobs.iter().any(|mob| mob.class == NpcClass::StableMaster));
    }

    #[test]
    fn list_without_interaction_is_ignored() {
        let text = LogBuilder::new()
            .character_select("hero-S")
            .position(5, 27, 1_000, 2_000, 10, 0)
            .npc(&merchant(20, 1_000, "Weapon Merchant"))
            .merchant_page(0, &[sword(0)])
            .interact(99)
            .merchant_page(0, &[sword(0)])
            .finish();
        let mut store = MemoryStore::new();
        let (stats, _) = extract(&mut store, &text);
        assert_eq!(stats.get(LISTS), 0);
        assert_eq!(store.count::<ItemTemplate>(), 0);
    }

    #[test]
    fn clicking_another_npc_keeps_the_merchant_open() {
        let text = LogBuilder::new()
            .character_select("hero-S")
            .position(5, 27, 1_000, 2_000, 10, 0)
            .npc(&merchant(20, 1_000, "Weapon Merchant"))
            .interact(20)
            .interact(77)
            .merchant_page(0, &[sword(0)])
            .finish();
        let mut store = MemoryStore::new();
        let (stats, _) = extract(&mut store, &text);
        assert_eq!(stats.get(LISTS), 1);
        let mob = store.all::<Mob>().unwrap().remove(0);
        assert!(mob.items_list_template.is_some());
    }

    #[test]
    fn items_take_the_selected_character_realm() {
        let neutral = Spawn {
            realm: 0,
            ..merchant(20, 1_000, "Weapon Merchant")
        };
        let text = LogBuilder::new()
            .character_select("hero-S")
            .position(5, 27, 1_000, 2_000, 10, 0)
            .character_select("hero")
            .npc(&neutral)
            .interact(20)
            .merchant_page(0, &[sword(0)])
            .finish();
        let mut store = MemoryStore::new();
        let (stats, _) = extract(&mut store, &text);
        assert_eq!(stats.get(ITEMS_CREATED), 1);
        let item = store.get::<ItemTemplate>("short_sword").unwrap().unwrap();
        assert_eq!(item.realm, Realm::Albion);
    }

    #[test]
    fn tooltip_updates_listed_item() {
        let tooltip = DelveBuilder::new()
            .entry("Magical Bonuses:")
            .block(&["- Strength: 6 pts"])
            .entry("Level Requirement:")
            .block(&["- 20 Item"])
            .line("Magical Ability:")
            .block(&["- Function: disease"])
            .block(&["Inflicts a disease."])
            .block(&["Duration: 30 sec"])
            .finish();
        let text = LogBuilder::new()
            .character_select("hero-S")
            .position(5, 27, 1_000, 2_000, 10, 0)
            .npc(&merchant(20, 1_000, "Weapon Merchant"))
            .interact(20)
            .merchant_page(0, &[sword(0)])
            .delve("short sword", &tooltip)
            .delve("unlisted axe", &tooltip)
            .finish();

        let mut store = MemoryStore::new();
        store
            .insert(Spell {
                spell_id: 5_000,
                spell_type: "Disease".to_string(),
                damage_type: 10,
                duration: 30,
                ..Spell::default()
            })
            .unwrap();
        store
            .insert(LineSpell {
                id: "5000-20".to_string(),
                line_id: 9,
                spell_id: 5_000,
                level: 20,
            })
            .unwrap();

        let (stats, report) = extract(&mut store, &text);
        assert_eq!(stats.get(DELVES), 1);
        assert_eq!(stats.get(SPELLS_MATCHED), 1);
        assert!(report.is_empty(), "{report}");

        let item = store.get::<ItemTemplate>("short_sword").unwrap().unwrap();
        assert_eq!(item.bonuses[0].property, 1);
        assert_eq!(item.bonuses[0].value, 6);
        assert_eq!(item.proc_spell_id, 5_000);
    }

    #[test]
    fn missing_spell_is_reported() {
        let tooltip = DelveBuilder::new()
            .entry("Level Requirement:")
            .block(&["- 35 Item"])
            .line("Magical Ability:")
            .block(&["- Function: disease"])
            .block(&["Inflicts a disease."])
            .block(&["Duration: 2:00 min"])
            .finish();
        let text = LogBuilder::new()
            .character_select("hero-S")
            .position(5, 27, 1_000, 2_000, 10, 0)
            .npc(&merchant(20, 1_000, "Weapon Merchant"))
            .interact(20)
            .merchant_page(0, &[sword(0)])
            .delve("short sword", &tooltip)
            .finish();
        let mut store = MemoryStore::new();
        let (stats, report) = extract(&mut store, &text);
        assert_eq!(stats.get(REPORT_ENTRIES), 1);
        assert!(report.contains("Item = short sword"));
        assert!(report.contains("Duration = 120"));
    }
}
