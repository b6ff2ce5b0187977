use std::io::{self, Read, Write};

use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;

use super::ArchiveError;

pub const SIGNATURE_LEN: usize = 32;

/// A set of shared keys an archive's `SIGN` chunk is checked against. Any
/// one match is sufficient — mirrors accepting a signature from any key in
/// a configured trust store.
#[derive(Clone, Default)]
pub struct TrustSet {
    keys: Vec<Vec<u8>>,
}

impl TrustSet {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `tag` is a valid HMAC-SHA256 over `data` under any trusted key.
    pub fn verify(&self, data: &[u8], tag: &[u8; SIGNATURE_LEN]) -> bool {
        self.keys
            .iter()
            .any(|key| constant_time_eq(&hmac_sha256(key, data), tag))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; SIGNATURE_LEN] {
    let pkey = PKey::hmac(key).expect("hmac key construction cannot fail for sha256");
    let mut signer =
        Signer::new(MessageDigest::sha256(), &pkey).expect("signer construction cannot fail");
    signer.update(data).expect("hmac update cannot fail");
    let mut tag = [0u8; SIGNATURE_LEN];
    signer.sign(&mut tag).expect("hmac finalize cannot fail");
    tag
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Wraps a volume's sink, mirroring every byte written into an in-memory
/// buffer so a trailing `SIGN` chunk can be computed over the whole volume.
/// Bounded by the volume size the caller configured, so this is a
/// deliberate simplification of the teacher's fully-streaming
/// `ChecksumWriter`/`Signer` pair in favor of a one-shot HMAC computed at
/// volume close.
pub struct SigningWriter<W: Write> {
    inner: W,
    key: Option<Vec<u8>>,
    buffer: Vec<u8>,
}

impl<W: Write> SigningWriter<W> {
    pub fn new(inner: W, key: Option<Vec<u8>>) -> Self {
        Self {
            inner,
            key,
            buffer: Vec::new(),
        }
    }

    pub fn finish(self) -> (W, Option<[u8; SIGNATURE_LEN]>) {
        let tag = self.key.as_deref().map(|key| hmac_sha256(key, &self.buffer));
        (self.inner, tag)
    }
}

impl<W: Write> Write for SigningWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if self.key.is_some() {
            self.buffer.extend_from_slice(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Read-side counterpart of [`SigningWriter`]: mirrors bytes read into a
/// buffer so the trust set can be checked once the volume's trailing `SIGN`
/// chunk is reached.
pub struct SigningReader<R: Read> {
    inner: R,
    capture: bool,
    buffer: Vec<u8>,
}

impl<R: Read> SigningReader<R> {
    pub fn new(inner: R, capture: bool) -> Self {
        Self {
            inner,
            capture,
            buffer: Vec::new(),
        }
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for SigningReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if self.capture && n > 0 {
            self.buffer.extend_from_slice(&buf[..n]);
        }
        Ok(n)
    }
}

pub fn parse_signature(body: &[u8]) -> Result<[u8; SIGNATURE_LEN], ArchiveError> {
    if body.len() != SIGNATURE_LEN {
        return Err(ArchiveError::Corrupt(format!(
            "signature chunk has {} bytes, expected {}",
            body.len(),
            SIGNATURE_LEN
        )));
    }
    let mut tag = [0u8; SIGNATURE_LEN];
    tag.copy_from_slice(body);
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_set_accepts_matching_key_and_rejects_others() {
        let trust = TrustSet::new().with_key(b"volume-signing-key".to_vec());
        let tag = hmac_sha256(b"volume-signing-key", b"some archive bytes");
        assert!(trust.verify(b"some archive bytes", &tag));
        assert!(!trust.verify(b"tampered archive bytes", &tag));

        let other_trust = TrustSet::new().with_key(b"a different key".to_vec());
        assert!(!other_trust.verify(b"some archive bytes", &tag));
    }

    #[test]
    fn signing_writer_captures_only_when_keyed() {
        let mut w = SigningWriter::new(Vec::new(), Some(b"key".to_vec()));
        w.write_all(b"hello").unwrap();
        let (sink, tag) = w.finish();
        assert_eq!(sink, b"hello");
        assert!(tag.is_some());

        let mut w = SigningWriter::new(Vec::new(), None);
        w.write_all(b"hello").unwrap();
        let (_, tag) = w.finish();
        assert!(tag.is_none());
    }
}
