pub fn unsigned_short(lsb: u8, msb: u8) -> u16 {
    (lsb as u16) | ((msb as u16) << 8)
}

pub fn signed_short(lsb: u8, msb: u8) -> i16 {
    unsigned_short(lsb, msb) as i16
}

/// Little-endian word at `offset` of a calibration block.
pub fn le_unsigned(block: &[u8], offset: usize) -> u16 {
    unsigned_short(block[offset], block[offset + 1])
}

pub fn le_signed(block: &[u8], offset: usize) -> i16 {
    le_unsigned(block, offset) as i16
}
