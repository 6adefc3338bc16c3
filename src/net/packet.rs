use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read of {wanted} bytes at offset {offset} overruns record ({available} left)")]
pub struct ReadError {
    pub offset: usize,
    pub wanted: usize,
    pub available: usize,
}

/// Sequential read head over one record body. Multi-byte integers are big-endian.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn ensure(&self, len: usize) -> Result<(), ReadError> {
        if self.remaining() < len {
            return Err(ReadError {
                offset: self.pos,
                wanted: len,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        self.ensure(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        self.ensure(2)?;
        let hi = self.data[self.pos] as u16;
        let lo = self.data[self.pos + 1] as u16;
        self.pos += 2;
        Ok((hi << 8) | lo)
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        self.ensure(4)?;
        let b0 = self.data[self.pos] as u32;
        let b1 = self.data[self.pos + 1] as u32;
        let b2 = self.data[self.pos + 2] as u32;
        let b3 = self.data[self.pos + 3] as u32;
        self.pos += 4;
        Ok((b0 << 24) | (b1 << 16) | (b2 << 8) | b3)
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        self.ensure(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }

    /// Reads `width` bytes and keeps the text up to the first NUL.
    pub fn read_fixed_string(&mut self, width: usize) -> Result<String, ReadError> {
        let bytes = self.read_bytes(width)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(decode_latin1(&bytes[..end]))
    }

    /// One length byte followed by that many bytes.
    pub fn read_pascal_string(&mut self) -> Result<String, ReadError> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(decode_latin1(bytes))
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let start = self.pos.min(self.data.len());
        self.pos = self.data.len();
        &self.data[start..]
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    data: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.data.push((value >> 8) as u8);
        self.data.push((value & 0xff) as u8);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.data.push((value >> 24) as u8);
        self.data.push(((value >> 16) & 0xff) as u8);
        self.data.push(((value >> 8) & 0xff) as u8);
        self.data.push((value & 0xff) as u8);
        self
    }

    pub fn write_zeros(&mut self, len: usize) -> &mut Self {
        self.data.extend(std::iter::repeat(0u8).take(len));
        self
    }

    pub fn write_fixed_string(&mut self, value: &str, width: usize) -> &mut Self {
        let bytes = value.as_bytes();
        let take = bytes.len().min(width);
        self.data.extend_from_slice(&bytes[..take]);
        self.write_zeros(width - take)
    }

    pub fn write_pascal_string(&mut self, value: &str) -> &mut Self {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u8::MAX as usize);
        self.data.push(len as u8);
        self.data.extend_from_slice(&bytes[..len]);
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }
}
