use crate::net::packet::{PacketReader, ReadError};

/// Line that closes a tooltip block.
pub const BLOCK_END: &str = " ";

/// Reader over the tooltip line stream that follows the item name in a delve
/// record. Top-level entries carry a continuation byte (0 ends the stream);
/// lines inside a block carry one ignored prefix byte each.
pub struct DelveText<'a> {
    reader: PacketReader<'a>,
}

impl<'a> DelveText<'a> {
    pub fn new(text: &'a [u8]) -> Self {
        Self {
            reader: PacketReader::new(text),
        }
    }

    /// Next top-level line, `None` at the end marker or when the text runs out.
    pub fn next_entry(&mut self) -> Result<Option<String>, ReadError> {
        if self.reader.remaining() == 0 || self.reader.read_u8()? == 0 {
            return Ok(None);
        }
        self.reader.read_pascal_string().map(Some)
    }

    pub fn next_line(&mut self) -> Result<String, ReadError> {
        self.reader.skip(1)?;
        self.reader.read_pascal_string()
    }

    /// Lines up to, not including, the closing blank line.
    pub fn block(&mut self) -> Result<Vec<String>, ReadError> {
        let mut lines = Vec::new();
        loop {
            let line = self.next_line()?;
            if line == BLOCK_END {
                return Ok(lines);
            }
            lines.push(line);
        }
    }

    pub fn skip_block(&mut self) -> Result<(), ReadError> {
        self.block().map(|_| ())
    }

    /// First line that is not a blank separator.
    pub fn next_non_blank(&mut self) -> Result<String, ReadError> {
        loop {
            let line = self.next_line()?;
            if line != BLOCK_END {
                return Ok(line);
            }
        }
    }

    /// Skips lines until one equal to `label` has been read.
    pub fn skip_past(&mut self, label: &str) -> Result<(), ReadError> {
        while self.next_line()? != label {}
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }
}

/// Builds delve line streams the way the server sends them.
#[cfg(test)]
pub(crate) mod fixture {
    use super::BLOCK_END;
    use crate::net::packet::PacketWriter;

    #[derive(Default)]
    pub struct DelveBuilder {
        writer: PacketWriter,
    }

    impl DelveBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entry(mut self, line: &str) -> Self {
            self.writer.write_u8(1).write_pascal_string(line);
            self
        }

        pub fn line(mut self, line: &str) -> Self {
            self.writer.write_u8(0).write_pascal_string(line);
            self
        }

        pub fn block(mut self, lines: &[&str]) -> Self {
            for line in lines {
                self = self.line(line);
            }
            self.line(BLOCK_END)
        }

        pub fn finish(mut self) -> Vec<u8> {
            self.writer.write_u8(0);
            self.writer.into_vec()
        }
    }
}
