//! Packed source positions carried by the `dbg` instruction.
//!
//! Line occupies the high 16 bits, column the low 16 bits. Values that do
//! not fit in 16 bits saturate to `u16::MAX`.

const COLUMN_BITS: u32 = 16;
const COLUMN_MASK: u32 = (1 << COLUMN_BITS) - 1;

/// Pack a line/column pair into one `u32`.
pub fn pack(line: u32, column: u32) -> u32 {
    let line = line.min(COLUMN_MASK);
    let column = column.min(COLUMN_MASK);
    (line << COLUMN_BITS) | column
}

/// Inverse of [`pack`]: returns `(line, column)`.
pub fn unpack(packed: u32) -> (u32, u32) {
    (packed >> COLUMN_BITS, packed & COLUMN_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn layout() {
        assert_eq!(pack(1, 0), 0x0001_0000);
        assert_eq!(pack(3, 7), 0x0003_0007);
        assert_eq!(unpack(0x0003_0007), (3, 7));
    }

    #[test]
    fn oversized_values_saturate() {
        assert_eq!(unpack(pack(70_000, 1)), (0xFFFF, 1));
        assert_eq!(unpack(pack(1, 70_000)), (1, 0xFFFF));
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trip(line in 0u32..65536, column in 0u32..65536) {
            prop_assert_eq!(unpack(pack(line, column)), (line, column));
        }
    }
}
