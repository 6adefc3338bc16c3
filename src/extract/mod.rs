//! Phase orchestration. Every phase re-reads the packet log from its anchor
//! record and persists what it learns into the world store.

pub mod bind_points;
pub mod cleanup;
pub mod creatures;
pub mod delve;
pub mod items;
pub mod merchants;
pub mod report;
pub mod version;
pub mod world_objects;
pub mod zone_points;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn};

use crate::config::{AppConfig, ConfigError};
use crate::error::ExtractError;
use crate::lang::LanguageTable;
use crate::net::record::{Direction, RawRecord, ReaderError, RecordFilter, RecordReader};
use crate::persistence::store::WorldStore;
use crate::protocol::version::{ProtocolProfile, ProtocolTable};
use crate::protocol::{
    DecoderTable, Event, OPCODE_CHARACTER_SELECT, OPCODE_CLIENT_VERSION, OPCODE_PLAYER_POSITION,
};
use crate::session::ParseSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Version,
    Creatures,
    Merchants,
    WorldObjects,
    ZonePoints,
    BindPoints,
    Cleanup,
}

impl Phase {
    /// Phases that run once the client version is known, in order.
    pub const PASSES: [Phase; 6] = [
        Phase::Creatures,
        Phase::Merchants,
        Phase::WorldObjects,
        Phase::ZonePoints,
        Phase::BindPoints,
        Phase::Cleanup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Version => "version",
            Phase::Creatures => "creatures",
            Phase::Merchants => "merchants",
            Phase::WorldObjects => "world objects",
            Phase::ZonePoints => "zone points",
            Phase::BindPoints => "bind points",
            Phase::Cleanup => "cleanup",
        }
    }

    /// First record the phase looks at.
    fn anchor(self) -> RecordFilter {
        match self {
            Phase::Version => RecordFilter::outgoing().with_opcode(OPCODE_CLIENT_VERSION),
            Phase::Creatures | Phase::WorldObjects | Phase::Cleanup => {
                RecordFilter::incoming().with_opcode(OPCODE_PLAYER_POSITION)
            }
            Phase::Merchants | Phase::ZonePoints | Phase::BindPoints => {
                RecordFilter::outgoing().with_opcode(OPCODE_CHARACTER_SELECT)
            }
        }
    }

    /// Records the phase consumes after its anchor.
    fn scope(self) -> RecordFilter {
        match self {
            Phase::Version => RecordFilter::outgoing(),
            Phase::Creatures | Phase::WorldObjects | Phase::Cleanup => RecordFilter::incoming(),
            Phase::Merchants | Phase::ZonePoints | Phase::BindPoints => RecordFilter::ANY,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named counters a phase accumulates while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStats {
    pub phase: Phase,
    counters: BTreeMap<&'static str, u64>,
}

impl PhaseStats {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            counters: BTreeMap::new(),
        }
    }

    pub fn bump(&mut self, counter: &'static str) {
        self.add(counter, 1);
    }

    pub fn add(&mut self, counter: &'static str, amount: u64) {
        *self.counters.entry(counter).or_default() += amount;
    }

    pub fn set(&mut self, counter: &'static str, value: u64) {
        self.counters.insert(counter, value);
    }

    /// Zero for counters that were never touched.
    pub fn get(&self, counter: &str) -> u64 {
        self.counters.get(counter).copied().unwrap_or(0)
    }

    pub fn counters(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counters.iter().map(|(name, value)| (*name, *value))
    }
}

impl fmt::Display for PhaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.counters {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Completed,
    Failed,
    /// Not run because an earlier phase could not read the log.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub stats: PhaseStats,
    pub status: PhaseStatus,
    pub error: Option<String>,
}

/// Completion status and counters of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub log: PathBuf,
    pub version: Option<u16>,
    pub phases: Vec<PhaseOutcome>,
}

impl RunReport {
    fn new(log: &Path) -> Self {
        Self {
            log: log.to_path_buf(),
            version: None,
            phases: Vec::new(),
        }
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|outcome| outcome.stats.phase == phase)
    }

    pub fn succeeded(&self) -> bool {
        !self.phases.is_empty()
            && self
                .phases
                .iter()
                .all(|outcome| outcome.status == PhaseStatus::Completed)
    }

    fn record(&mut self, stats: PhaseStats, result: Result<(), ExtractError>) -> bool {
        let stops = match &result {
            Ok(()) => false,
            Err(err) => err.stops_run(),
        };
        let (status, error) = match result {
            Ok(()) => (PhaseStatus::Completed, None),
            Err(err) => (PhaseStatus::Failed, Some(err.to_string())),
        };
        self.phases.push(PhaseOutcome {
            stats,
            status,
            error,
        });
        stops
    }

    fn skip(&mut self, phase: Phase) {
        self.phases.push(PhaseOutcome {
            stats: PhaseStats::new(phase),
            status: PhaseStatus::Skipped,
            error: None,
        });
    }
}

/// One read of the log, positioned at a phase's anchor.
pub struct Pass<'d, R: BufRead> {
    path: PathBuf,
    reader: RecordReader<R>,
    decoders: &'d DecoderTable,
    profile: ProtocolProfile,
    scope: RecordFilter,
}

impl<'d> Pass<'d, BufReader<File>> {
    pub fn open(
        path: &Path,
        decoders: &'d DecoderTable,
        profile: ProtocolProfile,
        phase: Phase,
    ) -> Result<Self, ExtractError> {
        let reader = RecordReader::open(path).map_err(|err| ExtractError::io(path, err))?;
        Self::new(path, reader, decoders, profile, phase)
    }
}

impl<'d, R: BufRead> Pass<'d, R> {
    /// Skips to the anchor record and hands it back so the phase sees it first.
    /// A log without the anchor yields an empty pass.
    pub fn new(
        path: &Path,
        mut reader: RecordReader<R>,
        decoders: &'d DecoderTable,
        profile: ProtocolProfile,
        phase: Phase,
    ) -> Result<Self, ExtractError> {
        match reader.next_matching(&phase.anchor()) {
            Ok(Some(anchor)) => reader.push_back(anchor),
            Ok(None) => warn!(phase = phase.name(), "anchor record not found in log"),
            Err(err) => return Err(lift(path, err)),
        }
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            decoders,
            profile,
            scope: phase.scope(),
        })
    }

    /// Next record in the phase's scope that has a decoder.
    pub fn next_event(&mut self) -> Result<Option<(RawRecord, Event)>, ExtractError> {
        loop {
            let record = self
                .reader
                .next_matching(&self.scope)
                .map_err(|err| lift(&self.path, err))?;
            let Some(record) = record else {
                return Ok(None);
            };
            if let Some(event) = self.decoders.decode(&record, &self.profile)? {
                return Ok(Some((record, event)));
            }
        }
    }

    /// Next record of either direction, undecoded.
    pub fn next_record(&mut self) -> Result<Option<RawRecord>, ExtractError> {
        self.reader
            .next_record()
            .map_err(|err| lift(&self.path, err))
    }

    pub fn decode(&self, record: &RawRecord) -> Result<Option<Event>, ExtractError> {
        Ok(self.decoders.decode(record, &self.profile)?)
    }

    /// Decodes the next record if it is `opcode` in `direction`; anything else
    /// is handed back to the reader.
    pub fn next_if(
        &mut self,
        direction: Direction,
        opcode: u8,
    ) -> Result<Option<Event>, ExtractError> {
        let Some(record) = self.next_record()? else {
            return Ok(None);
        };
        if !record.is(direction, opcode) {
            self.reader.push_back(record);
            return Ok(None);
        }
        self.decode(&record)
    }

    pub fn push_back(&mut self, record: RawRecord) {
        self.reader.push_back(record);
    }

    pub fn records_read(&self) -> u64 {
        self.reader.records_read()
    }
}

fn lift(path: &Path, err: ReaderError) -> ExtractError {
    match err {
        ReaderError::Format(err) => ExtractError::Format(err),
        ReaderError::Io(err) => ExtractError::io(path, err),
    }
}

/// What a phase works against: the store, configuration, labels, and a
/// session built fresh for the pass.
pub struct PhaseContext<'a, S> {
    pub store: &'a mut S,
    pub config: &'a AppConfig,
    pub lang: &'a LanguageTable,
    pub session: ParseSession,
    pub stats: PhaseStats,
}

impl<'a, S: WorldStore> PhaseContext<'a, S> {
    pub fn new(
        store: &'a mut S,
        config: &'a AppConfig,
        lang: &'a LanguageTable,
        phase: Phase,
    ) -> Self {
        Self {
            store,
            config,
            lang,
            session: ParseSession::new(),
            stats: PhaseStats::new(phase),
        }
    }
}

/// Runs every phase over one log against one store.
pub struct Extractor<S> {
    config: AppConfig,
    lang: LanguageTable,
    store: S,
    decoders: DecoderTable,
    protocols: ProtocolTable,
}

impl<S: WorldStore> Extractor<S> {
    pub fn new(config: AppConfig, lang: LanguageTable, store: S) -> Result<Self, ConfigError> {
        let protocols = config.protocol_table()?;
        Ok(Self {
            config,
            lang,
            store,
            decoders: DecoderTable::standard(),
            protocols,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run(&mut self, log: &Path) -> RunReport {
        let span = info_span!("extract", log = %log.display());
        let _guard = span.enter();
        let mut report = RunReport::new(log);

        let mut stats = PhaseStats::new(Phase::Version);
        let detected = self.detect_version(log, &mut stats);
        let version = match detected {
            Ok(version) => version,
            Err(err) => {
                error!(error = %err, "client version check failed, nothing extracted");
                report.record(stats, Err(err));
                for phase in Phase::PASSES {
                    report.skip(phase);
                }
                return report;
            }
        };
        info!(version, "client version accepted");
        report.version = Some(version);
        report.record(stats, Ok(()));

        let profile = self.protocols.profile_for(version);
        let mut stopped = false;
        for phase in Phase::PASSES {
            if stopped {
                report.skip(phase);
                continue;
            }
            let (stats, result) = self.run_phase(phase, log, profile);
            match &result {
                Ok(()) => info!(phase = phase.name(), counters = %stats, "phase finished"),
                Err(err) => error!(
                    phase = phase.name(),
                    counters = %stats,
                    error = %err,
                    "phase failed"
                ),
            }
            stopped = report.record(stats, result);
        }
        report
    }

    fn detect_version(&self, log: &Path, stats: &mut PhaseStats) -> Result<u16, ExtractError> {
        let profile = self.protocols.profile_for(self.config.minimum_version);
        let mut pass = Pass::open(log, &self.decoders, profile, Phase::Version)?;
        let version = version::detect(&mut pass, self.config.minimum_version)?;
        stats.set(version::CLIENT_VERSION, version as u64);
        Ok(version)
    }

    fn run_phase(
        &mut self,
        phase: Phase,
        log: &Path,
        profile: ProtocolProfile,
    ) -> (PhaseStats, Result<(), ExtractError>) {
        let span = info_span!("phase", name = phase.name());
        let _guard = span.enter();
        let mut ctx = PhaseContext::new(&mut self.store, &self.config, &self.lang, phase);
        let result = Pass::open(log, &self.decoders, profile, phase).and_then(|mut pass| {
            let result = match phase {
                Phase::Version => Ok(()),
                Phase::Creatures => creatures::run(&mut ctx, &mut pass),
                Phase::Merchants => merchants::run(&mut ctx, &mut pass),
                Phase::WorldObjects => world_objects::run(&mut ctx, &mut pass),
                Phase::ZonePoints => zone_points::run(&mut ctx, &mut pass),
                Phase::BindPoints => bind_points::run(&mut ctx, &mut pass),
                Phase::Cleanup => cleanup::run(&mut ctx, &mut pass),
            };
            ctx.stats.set("records", pass.records_read());
            result
        });
        let flushed = ctx.store.flush().map_err(ExtractError::from);
        (ctx.stats, result.and(flushed))
    }
}

/// Builds packet logs record by record for phase tests.
#[cfg(test)]
pub(crate) mod fixture {
    use crate::net::packet::PacketWriter;
    use crate::net::record::{format_record, Direction};
    use crate::protocol::*;

    /// Spawn fields a test cares about; everything else is zero.
    #[derive(Debug, Clone, Default)]
    pub struct Spawn {
        pub oid: u16,
        pub speed: u16,
        pub heading: u16,
        pub x: u32,
        pub y: u32,
        pub z: u16,
        pub model: u16,
        pub level: u8,
        pub size: u8,
        pub realm: u8,
        pub has_equipment: bool,
        pub name: &'static str,
        pub guild: &'static str,
    }

    #[derive(Debug, Clone, Default)]
    pub struct Object {
        pub heading: u16,
        pub x: u32,
        pub y: u32,
        pub z: u16,
        pub model: u16,
        pub object_type: u16,
        pub name: &'static str,
        pub flag: u8,
    }

    #[derive(Debug, Clone, Default)]
    pub struct Listing {
        pub slot: u8,
        pub level: u8,
        pub value1: u8,
        pub spd_abs: u8,
        pub hand: u8,
        pub damage_type: u8,
        pub object_type: u8,
        pub weight: u16,
        pub price: u32,
        pub model: u16,
        pub name: &'static str,
    }

    #[derive(Debug, Default)]
    pub struct LogBuilder {
        text: String,
    }

    impl LogBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn record(mut self, direction: Direction, opcode: u8, body: &[u8]) -> Self {
            self.text.push_str(&format_record(direction, opcode, body));
            self
        }

        pub fn note(mut self, line: &str) -> Self {
            self.text.push_str(line);
            self.text.push('\n');
            self
        }

        pub fn client_version(self, major: u8, minor: u8, build: u8) -> Self {
            let mut w = PacketWriter::new();
            w.write_zeros(2)
                .write_u8(major)
                .write_u8(minor)
                .write_u8(build)
                .write_zeros(90);
            self.record(Direction::Outgoing, OPCODE_CLIENT_VERSION, w.as_slice())
        }

        pub fn character_select(self, account: &str) -> Self {
            let mut w = PacketWriter::new();
            w.write_fixed_string(account, 24);
            self.record(Direction::Outgoing, OPCODE_CHARACTER_SELECT, w.as_slice())
        }

        pub fn player_move(self, zone: u8, x: u16, y: u16, z: u16) -> Self {
            let mut w = PacketWriter::new();
            w.write_zeros(4).write_u16(z).write_u16(x).write_u16(y).write_u8(zone);
            self.record(Direction::Outgoing, OPCODE_PLAYER_MOVE, w.as_slice())
        }

        pub fn zone_jump(self, zone_point_id: u16) -> Self {
            let mut w = PacketWriter::new();
            w.write_u16(zone_point_id).write_zeros(2);
            self.record(Direction::Outgoing, OPCODE_ZONE_JUMP, w.as_slice())
        }

        pub fn interact(self, npc_oid: u16) -> Self {
            let mut w = PacketWriter::new();
            w.write_zeros(10).write_u16(npc_oid);
            self.record(Direction::Outgoing, OPCODE_INTERACT, w.as_slice())
        }

        pub fn position(self, oid: u16, region: u16, x: u32, y: u32, z: u16, heading: u16) -> Self {
            let mut w = PacketWriter::new();
            w.write_u16(oid)
                .write_u16(z)
                .write_u32(x)
                .write_u32(y)
                .write_u16(heading)
                .write_zeros(6)
                .write_u16(region)
                .write_zeros(2);
            self.record(Direction::Incoming, OPCODE_PLAYER_POSITION, w.as_slice())
        }

        pub fn npc(self, spawn: &Spawn) -> Self {
            let mut flags = spawn.realm << 6;
            if spawn.has_equipment {
                flags |= 0x02;
            }
            let mut w = PacketWriter::new();
            w.write_u16(spawn.oid)
                .write_u16(spawn.speed)
                .write_u16(spawn.heading)
                .write_u16(spawn.z)
                .write_u32(spawn.x)
                .write_u32(spawn.y)
                .write_zeros(2)
                .write_u16(spawn.model)
                .write_u8(spawn.size)
                .write_u8(spawn.level)
                .write_u8(flags)
                .write_u8(0)
                .write_u8(0)
                .write_zeros(3)
                .write_pascal_string(spawn.name)
                .write_pascal_string(spawn.guild)
                .write_u8(0);
            self.record(Direction::Incoming, OPCODE_NPC_SPAWN, w.as_slice())
        }

        /// Weapon-slot items with plain models and no colour or effect.
        pub fn equipment(self, oid: u16, items: &[(u8, u16)]) -> Self {
            let mut w = PacketWriter::new();
            w.write_u16(oid)
                .write_u8(0)
                .write_zeros(2)
                .write_u8(0)
                .write_u8(items.len() as u8);
            for &(slot, model) in items {
                w.write_u8(slot).write_u16(model);
                if !(10..=13).contains(&slot) {
                    w.write_u8(0);
                }
            }
            self.record(Direction::Incoming, OPCODE_NPC_EQUIPMENT, w.as_slice())
        }

        pub fn object(self, object: &Object) -> Self {
            let mut w = PacketWriter::new();
            w.write_zeros(2)
                .write_u16(0)
                .write_u16(object.heading)
                .write_u16(object.z)
                .write_u32(object.x)
                .write_u32(object.y)
                .write_u16(object.model)
                .write_u16(object.object_type)
                .write_zeros(4)
                .write_pascal_string(object.name)
                .write_u8(object.flag);
            self.record(Direction::Incoming, OPCODE_OBJECT_SPAWN, w.as_slice())
        }

        pub fn emote(self, oid: u16, emote: u8) -> Self {
            let mut w = PacketWriter::new();
            w.write_u16(oid).write_u8(emote);
            self.record(Direction::Incoming, OPCODE_EMOTE, w.as_slice())
        }

        pub fn merchant_page(self, page: u8, listings: &[Listing]) -> Self {
            let mut w = PacketWriter::new();
            w.write_u8(listings.len() as u8)
                .write_u8(0)
                .write_u8(page)
                .write_u8(0);
            for listing in listings {
                w.write_u8(listing.slot)
                    .write_u8(listing.level)
                    .write_u8(listing.value1)
                    .write_u8(listing.spd_abs)
                    .write_u8(listing.hand << 6)
                    .write_u8((listing.damage_type << 6) | (listing.object_type & 0x3f))
                    .write_u8(0)
                    .write_u16(listing.weight)
                    .write_u32(listing.price)
                    .write_u16(listing.model)
                    .write_pascal_string(listing.name);
            }
            self.record(Direction::Incoming, OPCODE_MERCHANT_PAGE, w.as_slice())
        }

        pub fn delve(self, item_name: &str, text: &[u8]) -> Self {
            let mut w = PacketWriter::new();
            w.write_pascal_string(item_name).write_bytes(text);
            self.record(Direction::Incoming, OPCODE_DELVE, w.as_slice())
        }

        pub fn ride(self, steed_oid: u16, riding: bool) -> Self {
            let mut w = PacketWriter::new();
            w.write_zeros(2).write_u16(steed_oid).write_u8(riding as u8);
            self.record(Direction::Incoming, OPCODE_RIDE, w.as_slice())
        }

        pub fn finish(self) -> String {
            self.text
        }
    }

    /// Scratch directory for one test's log, report and snapshot files.
    pub fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("parselog-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
