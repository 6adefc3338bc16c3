//! Item tooltip ("delve") decoding: bonuses, quality, weapon speed and the
//! spell an item casts, matched against the stored spell tables.

use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, warn};

use crate::entities::item::{object_type, ItemBonus, ItemTemplate, BONUS_SLOTS};
use crate::entities::spell::{LineSpell, Spell, SpellCandidate};
use crate::extract::report::MissingSpellReport;
use crate::lang::LanguageTable;
use crate::net::packet::ReadError;
use crate::persistence::store::{StoreError, WorldStore};
use crate::protocol::delve::DelveText;
use crate::tables;

#[derive(Debug, Error)]
pub enum DelveError {
    #[error("tooltip text ends early: {0}")]
    Read(#[from] ReadError),
    #[error("missing spell report write failed: {0}")]
    Report(#[from] io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one tooltip contributed to its item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelveOutcome {
    pub bonuses: usize,
    pub spell_id: Option<u32>,
    pub misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpellKind {
    DamageOverTime,
    Disease,
    SpeedDecrease { unbreakable: bool },
    StrengthDebuff,
    StrengthConstitutionDebuff,
    DirectDamage,
}

impl SpellKind {
    /// Maps the tooltip's function line to a spell kind.
    fn from_function(lang: &LanguageTable, function: &str, item_object_type: u8) -> Option<Self> {
        if lang.equals("damage_over_time_string", function) {
            Some(SpellKind::DamageOverTime)
        } else if lang.equals("disease_string", function) {
            Some(SpellKind::Disease)
        } else if lang.equals("speed_decrease_string", function) {
            Some(SpellKind::SpeedDecrease {
                unbreakable: item_object_type == object_type::POISON,
            })
        } else if lang.equals("stat_decrease_string", function) {
            Some(SpellKind::StrengthDebuff)
        } else if lang.equals("str_con_decrease_string", function) {
            Some(SpellKind::StrengthConstitutionDebuff)
        } else if lang.equals("direct_damage_string", function) {
            Some(SpellKind::DirectDamage)
        } else {
            None
        }
    }

    fn type_key(self) -> &'static str {
        match self {
            SpellKind::DamageOverTime => "DamageOverTime",
            SpellKind::Disease => "Disease",
            SpellKind::SpeedDecrease { unbreakable: false } => "SpeedDecrease",
            SpellKind::SpeedDecrease { unbreakable: true } => "UnbreakableSpeedDecrease",
            SpellKind::StrengthDebuff => "StrengthDebuff",
            SpellKind::StrengthConstitutionDebuff => "StrengthConstitutionDebuff",
            SpellKind::DirectDamage => "DirectDamage",
        }
    }

    /// Spell type name as stored, overridable through the language file.
    fn store_type(self, lang: &LanguageTable) -> String {
        let key = self.type_key();
        match lang.lookup(key) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => key.to_string(),
        }
    }
}

/// Decodes tooltips onto item templates, reporting what it cannot resolve.
pub struct DelveDecoder<'a, S, W: Write> {
    lang: &'a LanguageTable,
    store: &'a S,
    report: &'a mut MissingSpellReport<W>,
}

impl<'a, S: WorldStore, W: Write> DelveDecoder<'a, S, W> {
    pub fn new(lang: &'a LanguageTable, store: &'a S, report: &'a mut MissingSpellReport<W>) -> Self {
        Self {
            lang,
            store,
            report,
        }
    }

    /// Applies one tooltip to `item`. Bonuses are assigned to slots in the
    /// order they appear.
    pub fn apply(&mut self, item: &mut ItemTemplate, text: &[u8]) -> Result<DelveOutcome, DelveError> {
        let mut delve = DelveText::new(text);
        let mut outcome = DelveOutcome::default();
        let lang = self.lang;

        while let Some(line) = delve.next_entry()? {
            if line == crate::protocol::delve::BLOCK_END {
                continue;
            }
            if lang.found_in("usable_by_string", &line) {
                delve.skip_block()?;
            } else if lang.found_in("shield_delve_string", &line) {
                for entry in delve.block()? {
                    if item.object_type == object_type::SHIELD {
                        self.shield_line(item, &entry, &mut outcome)?;
                    }
                }
            } else if lang.found_in("focus_bonuses_string", &line) {
                for entry in delve.block()? {
                    self.focus_line(item, &entry, &mut outcome)?;
                }
            } else if lang.found_in("magical_bonuses_string", &line) {
                for entry in delve.block()? {
                    self.magical_line(item, &entry, &mut outcome)?;
                }
            } else if lang.found_in("quality_string", &line) {
                let value = strip_bullet(&line);
                match parse_int(before(value, "%")) {
                    Some(quality) => item.quality = quality,
                    None => self.unparsable(item, &line, &mut outcome)?,
                }
            } else if lang.found_in("weapon_speed_string", &line) {
                if item.object_type == object_type::THROWN {
                    match parse_tenths(first_word(strip_bullet(&line))) {
                        Some(speed) => item.spd_abs = speed,
                        None => self.unparsable(item, &line, &mut outcome)?,
                    }
                }
            } else if lang.found_in("level_requirement_string", &line) {
                self.spell(item, &mut delve, &mut outcome)?;
            }
            // sold, trade and siege ammunition lines carry flags that are not stored
        }
        Ok(outcome)
    }

    fn shield_line(
        &mut self,
        item: &mut ItemTemplate,
        line: &str,
        outcome: &mut DelveOutcome,
    ) -> Result<(), DelveError> {
        let text = strip_bullet(line);
        let Some(value) = parse_tenths(first_word(text)) else {
            return self.unparsable(item, line, outcome);
        };
        if self.lang.found_in("shield_dps_string", text) {
            item.dps_af = value;
        } else if self.lang.found_in("shield_spd_string", text) {
            item.spd_abs = value;
        }
        Ok(())
    }

    /// `- Name: N lvls ...`
    fn focus_line(
        &mut self,
        item: &mut ItemTemplate,
        line: &str,
        outcome: &mut DelveOutcome,
    ) -> Result<(), DelveError> {
        let text = strip_bullet(line);
        let (name, rest) = split_label(text);
        let lvls = self.lang.get("lvls_string");
        let amount = if lvls.is_empty() {
            first_word(rest)
        } else {
            before(rest, lvls)
        };
        let property = tables::labels().focus(self.lang, name);
        self.bonus(item, line, property, parse_int(amount), outcome)
    }

    /// `- Name: N pts` for stats and skills, `- Name: N%` for resists.
    fn magical_line(
        &mut self,
        item: &mut ItemTemplate,
        line: &str,
        outcome: &mut DelveOutcome,
    ) -> Result<(), DelveError> {
        let text = strip_bullet(line);
        let (name, rest) = split_label(text);
        let labels = tables::labels();
        let (property, amount) = if rest.contains("pts") {
            (labels.stat(self.lang, name), before(rest, "pts"))
        } else {
            (labels.resist(self.lang, name), before(rest, "%"))
        };
        self.bonus(item, line, property, parse_int(amount), outcome)
    }

    fn bonus(
        &mut self,
        item: &mut ItemTemplate,
        line: &str,
        property: Option<u16>,
        value: Option<i32>,
        outcome: &mut DelveOutcome,
    ) -> Result<(), DelveError> {
        let Some(value) = value else {
            return self.unparsable(item, line, outcome);
        };
        let Some(property) = property else {
            outcome.misses += 1;
            self.report.unknown_bonus(&item.name, line)?;
            return Ok(());
        };
        if outcome.bonuses >= BONUS_SLOTS {
            warn!(item = %item.name, line, "no free bonus slot");
            return Ok(());
        }
        item.bonuses[outcome.bonuses] = ItemBonus { property, value };
        outcome.bonuses += 1;
        Ok(())
    }

    fn spell(
        &mut self,
        item: &mut ItemTemplate,
        delve: &mut DelveText<'_>,
        outcome: &mut DelveOutcome,
    ) -> Result<(), DelveError> {
        let lang = self.lang;
        let mut level = 0;
        for line in delve.block()? {
            match parse_int(first_word(strip_bullet(&line))) {
                Some(value) => level = value,
                None => self.unparsable(item, &line, outcome)?,
            }
        }

        let header = delve.next_non_blank()?;
        let mut function = None;
        let charged = lang.found_in("poison_string", &header)
            || lang.found_in("charged_magic_string", &header)
            || lang.found_in("poison_magic_string", &header);
        if charged {
            if lang.found_in("poison_string", &header) {
                let proc_label = lang.get("poison_magic_string");
                if !proc_label.is_empty() {
                    delve.skip_past(proc_label)?;
                }
            }
            for line in delve.block()? {
                if lang.found_in("max_charge_string", &line) {
                    match parse_int(first_word(strip_bullet(&line))) {
                        Some(value) => item.max_charges = value,
                        None => self.unparsable(item, &line, outcome)?,
                    }
                } else if lang.found_in("charge_string", &line) {
                    match parse_int(first_word(strip_bullet(&line))) {
                        Some(value) => item.charges = value,
                        None => self.unparsable(item, &line, outcome)?,
                    }
                } else if lang.found_in("function_string", &line) {
                    function = Some(after_label(&line).to_string());
                }
            }
        } else if lang.found_in("magical_ability_string", &header) {
            for line in delve.block()? {
                if lang.found_in("function_string", &line) {
                    function = Some(after_label(&line).to_string());
                }
            }
        }

        let function = function.unwrap_or_default();
        let Some(kind) = SpellKind::from_function(lang, &function, item.object_type) else {
            outcome.misses += 1;
            warn!(item = %item.name, function = %function, "spell type not found");
            self.report.spell_type_not_found(&item.name, &function)?;
            return Ok(());
        };

        // description
        delve.skip_block()?;

        let mut candidate = SpellCandidate::new(kind.store_type(lang));
        candidate.level = level;
        for line in delve.block()? {
            self.spell_line(item, kind, &line, &mut candidate, outcome)?;
        }

        match self.find_spell(&candidate)? {
            Some(spell_id) => {
                debug!(item = %item.name, spell_id, charged, "spell matched");
                if charged {
                    item.spell_id = spell_id;
                } else {
                    item.proc_spell_id = spell_id;
                }
                outcome.spell_id = Some(spell_id);
            }
            None => {
                outcome.misses += 1;
                warn!(item = %item.name, "spell not found");
                self.report.spell_not_found(&item.name, &candidate)?;
            }
        }
        Ok(())
    }

    fn spell_line(
        &mut self,
        item: &ItemTemplate,
        kind: SpellKind,
        line: &str,
        candidate: &mut SpellCandidate,
        outcome: &mut DelveOutcome,
    ) -> Result<(), DelveError> {
        let lang = self.lang;
        let value = after_label(line);
        let parsed = match kind {
            SpellKind::DamageOverTime if lang.found_in("damage_per_tick_string", line) => {
                parse_int(value).map(|damage| candidate.damage = damage)
            }
            SpellKind::SpeedDecrease { .. } if lang.found_in("value_string", line) => {
                parse_int(before(value, "%")).map(|amount| candidate.value = amount)
            }
            SpellKind::StrengthDebuff if lang.found_in("strength_penalty_string", line) => {
                parse_int(value).map(|amount| candidate.value = amount)
            }
            SpellKind::StrengthConstitutionDebuff if lang.found_in("str_con_penalty_string", line) => {
                parse_int(value).map(|amount| candidate.value = amount)
            }
            SpellKind::DirectDamage if lang.found_in("radius_string", line) => {
                parse_int(value).map(|radius| candidate.radius = radius)
            }
            SpellKind::DirectDamage if lang.found_in("damage_type_string", line) => {
                match tables::labels().damage_type(lang, value) {
                    Some(damage_type) => {
                        candidate.damage_type = damage_type as i32;
                        Some(())
                    }
                    None => {
                        candidate.damage_type = 0;
                        parse_int(value).map(|damage| candidate.damage = damage)
                    }
                }
            }
            SpellKind::DirectDamage => Some(()),
            _ if lang.found_in("duration_string", line) => {
                parse_duration(value).map(|seconds| candidate.duration = seconds)
            }
            _ if lang.found_in("damage_type_string", line) => {
                candidate.damage_type = tables::labels()
                    .damage_type(lang, value)
                    .map_or(0, i32::from);
                Some(())
            }
            _ => Some(()),
        };
        if parsed.is_none() {
            self.unparsable(item, line, outcome)?;
        }
        Ok(())
    }

    /// First stored spell with the candidate's effect that sits on a spell
    /// line at the candidate's level.
    fn find_spell(&self, candidate: &SpellCandidate) -> Result<Option<u32>, StoreError> {
        for spell in self.store.find_all(|spell: &Spell| candidate.matches(spell))? {
            let on_line = self.store.find(|line: &LineSpell| {
                line.spell_id == spell.spell_id && line.level == candidate.level
            })?;
            if on_line.is_some() {
                return Ok(Some(spell.spell_id));
            }
        }
        Ok(None)
    }

    fn unparsable(
        &mut self,
        item: &ItemTemplate,
        line: &str,
        outcome: &mut DelveOutcome,
    ) -> Result<(), DelveError> {
        outcome.misses += 1;
        warn!(item = %item.name, line, "tooltip number unreadable");
        self.report.unparsable(&item.name, line)?;
        Ok(())
    }
}

fn strip_bullet(line: &str) -> &str {
    line.strip_prefix("- ").unwrap_or(line).trim()
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

/// Text before `marker`, or all of it when the marker is absent.
fn before<'t>(text: &'t str, marker: &str) -> &'t str {
    text.find(marker).map_or(text, |idx| &text[..idx]).trim()
}

/// Splits `Name: rest` at the first colon.
fn split_label(text: &str) -> (&str, &str) {
    match text.find(':') {
        Some(idx) => (text[..idx].trim(), text[idx + 1..].trim()),
        None => (text.trim(), ""),
    }
}

fn after_label(line: &str) -> &str {
    split_label(line).1
}

fn parse_int(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

/// Decimal with either separator, scaled by ten.
fn parse_tenths(text: &str) -> Option<i32> {
    let value: f64 = text.trim().replace(',', ".").parse().ok()?;
    Some((value * 10.0).round() as i32)
}

/// `m:ss min` or `N sec`, in seconds.
fn parse_duration(text: &str) -> Option<i32> {
    if text.contains("min") {
        let (minutes, seconds) = before(text, "min").split_once(':')?;
        Some(parse_int(minutes)? * 60 + parse_int(seconds)?)
    } else {
        parse_int(before(text, "sec"))
    }
}
