//! CRC-32 (IEEE 802.3, reflected polynomial 0xEDB88320) used to identify texture data.

use crc32fast::Hasher;

/// Continue a running CRC over `buf`.  Start with 0; feeding the result of one call into the
/// next gives the same value as a single call over the concatenated data.
pub fn crc32(crc: u32, buf: &[u8]) -> u32 {
    let mut h = Hasher::new_with_initial(crc);
    h.update(buf);
    h.finalize()
}

pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
