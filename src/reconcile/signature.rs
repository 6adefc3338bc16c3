use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_ENGINE;
use base64::Engine as _;
use sha1::{Digest, Sha1};
use std::fmt;

/// Content digest of a composite entity over a typed, length-delimited encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature([u8; 20]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_id(&self) -> String {
        BASE64_ENGINE.encode(self.0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_id())
    }
}

/// Feeds tagged fields into a SHA-1. Every field is written with a type tag and
/// fixed width (strings with a length prefix), so distinct field sequences never
/// produce the same byte stream.
pub struct SignatureBuilder {
    sha1: Sha1,
}

impl SignatureBuilder {
    pub fn new(kind: &str) -> Self {
        let mut builder = Self { sha1: Sha1::new() };
        builder.str(kind);
        builder
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.sha1.update([b'b', value]);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.sha1.update([b'w']);
        self.sha1.update(value.to_be_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.sha1.update([b'd']);
        self.sha1.update(value.to_be_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.sha1.update([b'q']);
        self.sha1.update(value.to_be_bytes());
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.sha1.update([b's']);
        self.sha1.update((value.len() as u32).to_be_bytes());
        self.sha1.update(value.as_bytes());
        self
    }

    pub fn finish(self) -> Signature {
        let digest = self.sha1.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Signature(bytes)
    }
}

/// Stable row id derived from a positional entity's structural key.
pub fn structural_id(kind: &str, fill: impl FnOnce(&mut SignatureBuilder)) -> String {
    let mut builder = SignatureBuilder::new(kind);
    fill(&mut builder);
    builder.finish().to_id()
}
