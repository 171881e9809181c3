use sha1::{Digest, Sha1};

/// Content identifiers for one mod file, computed from in-memory bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Whitespace-normalized seeded hash, as the fingerprint registry keys it.
    pub content_hash: i32,
    /// SHA-1 over the raw bytes, lowercase hex.
    pub digest_hex: String,
}

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            content_hash: normalized_hash(bytes),
            digest_hex: content_digest(bytes),
        }
    }
}

/// Strip every CR, LF, TAB and SPACE byte, then hash the remainder with
/// MurmurHash3 x86/32 seeded with 1, reinterpreted as a signed 32-bit
/// integer. The registry indexes content independent of the whitespace
/// normalization some build tools apply.
pub fn normalized_hash(bytes: &[u8]) -> i32 {
    let stripped: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|b| !matches!(b, b'\r' | b'\n' | b'\t' | b' '))
        .collect();
    murmur3_32(&stripped, 1) as i32
}

/// SHA-1 hex digest over the raw, unmodified bytes.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// MurmurHash3 x86/32.
fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h = seed;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let mut k: u32 = 0;
    if tail.len() >= 3 {
        k ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        k ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        k ^= u32::from(tail[0]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors for MurmurHash3 x86/32.
    #[test]
    fn murmur3_known_answers() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e_28b7);
        assert_eq!(murmur3_32(b"hello", 0), 0x248b_fa47);
        assert_eq!(murmur3_32(b"hello, world", 0), 0x149b_bb7f);
        assert_eq!(
            murmur3_32(b"The quick brown fox jumps over the lazy dog", 0),
            0x2e4f_f723
        );
    }

    #[test]
    fn normalized_hash_ignores_whitespace_bytes() {
        let plain = b"example-mod-content";
        let padded = b"example-\r\n\tmod- content\n";
        assert_eq!(normalized_hash(plain), normalized_hash(padded));
        assert_eq!(normalized_hash(plain), murmur3_32(plain, 1) as i32);
    }

    #[test]
    fn signed_reinterpretation_round_trips() {
        // Inputs contain no whitespace bytes, so the stripped form is the
        // input itself and the signed value must mirror the unsigned hash.
        for input in [&b""[..], b"hello", b"gamma.jar-bytes", b"\xff\xfe\xfd\xfc"] {
            assert_eq!(normalized_hash(input) as u32, murmur3_32(input, 1));
        }
    }

    #[test]
    fn digest_matches_known_sha1() {
        assert_eq!(content_digest(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Fingerprint::of(b"some jar bytes");
        let b = Fingerprint::of(b"some jar bytes");
        assert_eq!(a, b);
    }
}
