use std::io::{self, Write};

use crate::entities::spell::SpellCandidate;

const SEPARATOR: &str = "-------------------";

/// Text report of tooltip lines that need manual follow-up.
pub struct MissingSpellReport<W: Write> {
    out: W,
    entries: u64,
}

impl<W: Write> MissingSpellReport<W> {
    pub fn new(out: W) -> Self {
        Self { out, entries: 0 }
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn spell_not_found(&mut self, item: &str, candidate: &SpellCandidate) -> io::Result<()> {
        self.entries += 1;
        write!(
            self.out,
            "{SEPARATOR}\nSpell not found\nItem = {item}\n{candidate}\n\n"
        )
    }

    pub fn spell_type_not_found(&mut self, item: &str, delve_type: &str) -> io::Result<()> {
        self.entries += 1;
        writeln!(self.out, "Spell type not found : {delve_type} (item {item})")
    }

    pub fn unknown_bonus(&mut self, item: &str, line: &str) -> io::Result<()> {
        self.entries += 1;
        writeln!(self.out, "Bonus not found : {line} (item {item})")
    }

    pub fn unparsable(&mut self, item: &str, line: &str) -> io::Result<()> {
        self.entries += 1;
        writeln!(self.out, "Unreadable number : {line} (item {item})")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
