//! divelog/bits — 64 boolean flags packed into 8 bytes.
//!
//! Index order is the device's: bytes are read right to left, bits MSB first.
//!   flag 0  = byte[7] bit 7
//!   flag 7  = byte[7] bit 0
//!   flag 8  = byte[6] bit 7
//!   flag 63 = byte[0] bit 0

use serde::{Serialize, Serializer};

pub fn unpack_flags(bytes: &[u8; 8]) -> [bool; 64] {
    let mut out = [false; 64];
    for (i, flag) in out.iter_mut().enumerate() {
        let byte = bytes[7 - i / 8];
        *flag = byte & (0x80 >> (i % 8)) != 0;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags64([bool; 64]);

impl Flags64 {
    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        Self(unpack_flags(bytes))
    }

    /// Read 8 bytes at `off`; None if the slice is too short.
    pub fn read(buf: &[u8], off: usize) -> Option<Self> {
        let raw: [u8; 8] = buf.get(off..off + 8)?.try_into().ok()?;
        Some(Self::from_bytes(&raw))
    }

    pub fn get(&self, i: usize) -> bool {
        self.0.get(i).copied().unwrap_or(false)
    }

    pub fn set_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
            .collect()
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&b| b)
    }
}

/// Serialized as the list of set flag indices.
impl Serialize for Flags64 {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.set_indices().serialize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_order_is_right_to_left_msb_first() {
        let mut b = [0u8; 8];
        b[7] = 0x80;
        assert_eq!(Flags64::from_bytes(&b).set_indices(), vec![0]);

        b = [0u8; 8];
        b[7] = 0x01;
        assert_eq!(Flags64::from_bytes(&b).set_indices(), vec![7]);

        b = [0u8; 8];
        b[6] = 0x80;
        assert_eq!(Flags64::from_bytes(&b).set_indices(), vec![8]);

        b = [0u8; 8];
        b[0] = 0x01;
        assert_eq!(Flags64::from_bytes(&b).set_indices(), vec![63]);
    }

    #[test]
    fn mixed_pattern() {
        let b = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x81];
        let f = unpack_flags(&b);
        let on: Vec<usize> = (0..64).filter(|&i| f[i]).collect();
        assert_eq!(on, vec![0, 7, 9]);
    }

    #[test]
    fn read_short_slice() {
        assert!(Flags64::read(&[0u8; 7], 0).is_none());
        assert!(!Flags64::read(&[0u8; 8], 0).unwrap().any());
    }
}
