//! Byte-level helpers for the fixed-width record layout.
//!
//! Every concrete column footprint used by this crate is either 4 bytes
//! (`i32`/`u32`), 1 byte (`bool`) or a 4-byte length prefix followed by
//! inline payload bytes — there is no arbitrary n-byte packed integer as
//! in our teacher's on-disk format, so these helpers are plain fixed-width
//! little-endian accessors rather than a generic n-byte packer.

/// Read a little-endian `i32` at `off`.
pub fn get_i32(data: &[u8], off: usize) -> i32 {
    i32::from_le_bytes(data[off..off + 4].try_into().unwrap())
}

/// Write a little-endian `i32` at `off`.
pub fn set_i32(data: &mut [u8], off: usize, val: i32) {
    data[off..off + 4].copy_from_slice(&val.to_le_bytes());
}

/// Read a little-endian `u32` at `off`.
pub fn get_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(data[off..off + 4].try_into().unwrap())
}

/// Write a little-endian `u32` at `off`.
pub fn set_u32(data: &mut [u8], off: usize, val: u32) {
    data[off..off + 4].copy_from_slice(&val.to_le_bytes());
}

/// Read a `bool` at `off` (stored as a single byte, non-zero is true).
pub fn get_bool(data: &[u8], off: usize) -> bool {
    data[off] != 0
}

/// Write a `bool` at `off`.
pub fn set_bool(data: &mut [u8], off: usize, val: bool) {
    data[off] = u8::from(val);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_roundtrip() {
        let mut buf = [0u8; 4];
        set_i32(&mut buf, 0, -12345);
        assert_eq!(get_i32(&buf, 0), -12345);
    }

    #[test]
    fn u32_roundtrip() {
        let mut buf = [0u8; 8];
        set_u32(&mut buf, 4, 0xdead_beef);
        assert_eq!(get_u32(&buf, 4), 0xdead_beef);
    }

    #[test]
    fn bool_roundtrip() {
        let mut buf = [0u8; 1];
        set_bool(&mut buf, 0, true);
        assert!(get_bool(&buf, 0));
        set_bool(&mut buf, 0, false);
        assert!(!get_bool(&buf, 0));
    }
}
