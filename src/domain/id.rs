//! Fixed-bit-length identifiers and XOR distance.
//!
//! Reference: SPEC_FULL.md Section 3 (Id / XOR distance).

use crate::domain::errors::RoutingError;

/// A fixed-bit-length, big-endian identifier.
///
/// Unlike the teacher's `NodeId` (a fixed `[u8; 32]` tied to a 256-bit hash),
/// this `Id` carries its bit length alongside the bytes so the core can
/// support any `1 <= bit_length <= 8 * bytes.len()`, per the spec. Bits
/// beyond `bit_length` in the final byte are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    bytes: Vec<u8>,
    bit_length: u32,
}

impl Id {
    /// Construct an `Id` from big-endian bytes and an explicit bit length.
    ///
    /// `bytes.len()` must equal `ceil(bit_length / 8)`, and any padding bits
    /// in the final byte (beyond `bit_length`) must be zero.
    pub fn new(bytes: Vec<u8>, bit_length: u32) -> Result<Self, RoutingError> {
        if bit_length == 0 {
            return Err(RoutingError::InvalidId {
                reason: "bit length must be at least 1".to_string(),
            });
        }
        let expected_bytes = bit_length.div_ceil(8) as usize;
        if bytes.len() != expected_bytes {
            return Err(RoutingError::InvalidId {
                reason: format!(
                    "expected {expected_bytes} bytes for a {bit_length}-bit id, got {}",
                    bytes.len()
                ),
            });
        }
        let used_bits_in_last_byte = bit_length - (bit_length / 8) * 8;
        if used_bits_in_last_byte != 0 {
            let padding_mask = 0xFFu8 >> used_bits_in_last_byte;
            if let Some(&last) = bytes.last() {
                if last & padding_mask != 0 {
                    return Err(RoutingError::InvalidId {
                        reason: "non-zero padding bits beyond bit length".to_string(),
                    });
                }
            }
        }
        Ok(Self { bytes, bit_length })
    }

    /// Number of significant bits in this id.
    pub fn bit_length(&self) -> u32 {
        self.bit_length
    }

    /// The underlying big-endian byte representation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bit at position `i`, where `0` is the most significant bit.
    ///
    /// Panics if `i >= bit_length()`; this is a programmer error, the same
    /// way the teacher's `NodeId::as_bytes` indexing would panic on an
    /// out-of-range access.
    pub fn bit(&self, i: u32) -> bool {
        assert!(i < self.bit_length, "bit index out of range");
        let byte = self.bytes[(i / 8) as usize];
        let shift = 7 - (i % 8);
        (byte >> shift) & 1 == 1
    }

    /// Number of leading bits this id shares with `other`.
    ///
    /// Both ids must have the same bit length, per spec.md Section 3
    /// ("ordering operations are only defined between ids of equal
    /// length").
    pub fn shared_prefix_len(&self, other: &Id) -> Result<u32, RoutingError> {
        self.require_same_length(other)?;
        for i in 0..self.bit_length {
            if self.bit(i) != other.bit(i) {
                return Ok(i);
            }
        }
        Ok(self.bit_length)
    }

    /// XOR distance to `other`, as an unsigned big-endian value.
    pub fn xor_distance(&self, other: &Id) -> Result<Distance, RoutingError> {
        self.require_same_length(other)?;
        let xor: Vec<u8> = self
            .bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        Ok(Distance(xor))
    }

    fn require_same_length(&self, other: &Id) -> Result<(), RoutingError> {
        if self.bit_length != other.bit_length {
            return Err(RoutingError::InvalidId {
                reason: format!(
                    "bit length mismatch: {} vs {}",
                    self.bit_length, other.bit_length
                ),
            });
        }
        Ok(())
    }

    /// Parse an id from a string of `'0'`/`'1'` characters, most significant
    /// bit first (e.g. `"1010"`). Intended for tests and documentation
    /// examples, where spelling out a short id in binary is far more
    /// readable than constructing byte arrays.
    pub fn from_bit_str(bits: &str) -> Result<Self, RoutingError> {
        let bit_length = bits.len() as u32;
        if bit_length == 0 {
            return Err(RoutingError::InvalidId {
                reason: "empty bit string".to_string(),
            });
        }
        let mut bytes = vec![0u8; bit_length.div_ceil(8) as usize];
        for (i, c) in bits.chars().enumerate() {
            let bit = match c {
                '0' => false,
                '1' => true,
                _ => {
                    return Err(RoutingError::InvalidId {
                        reason: format!("unexpected character '{c}' in bit string"),
                    })
                }
            };
            if bit {
                let byte = i / 8;
                let shift = 7 - (i % 8);
                bytes[byte] |= 1 << shift;
            }
        }
        Self::new(bytes, bit_length)
    }
}

/// XOR distance between two [`Id`]s, ordered as an unsigned big-endian
/// integer (smaller is closer).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance(Vec<u8>);

impl Distance {
    /// The raw XOR bytes, most significant byte first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
