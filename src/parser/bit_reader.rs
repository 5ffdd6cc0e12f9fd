/// Reads variable-width codes packed least significant bit first, the order
/// gif image data uses.
pub struct BitReader<'a> {
    buf: &'a [u8],
    // next byte to pull into the accumulator
    position: usize,
    bits: u32,
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            position: 0,
            bits: 0,
            bit_count: 0,
        }
    }

    /// Returns the next `count` bits, or `None` once fewer than `count` remain.
    pub fn next(&mut self, count: u32) -> Option<u16> {
        debug_assert!(count <= 16);

        while self.bit_count < count {
            let byte = *self.buf.get(self.position)?;
            self.bits |= (byte as u32) << self.bit_count;
            self.bit_count += 8;
            self.position += 1;
        }

        let value = self.bits & ((1 << count) - 1);
        self.bits >>= count;
        self.bit_count -= count;
        Some(value as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::BitReader;

    #[test]
    fn it_works() {
        let buffer = &[
            0b10000100,
            0b10001111,
            0b10101001,
            0b11001011,
            0b11101101,
            0b00001111,
            0b10100011
        ];
        let mut reader = BitReader::new(buffer);
        assert_eq!(reader.next(3), Some(0b100));
        assert_eq!(reader.next(3), Some(0b000));
        assert_eq!(reader.next(3), Some(0b110));
        assert_eq!(reader.next(3), Some(0b111));
        assert_eq!(reader.next(3), Some(0b000));
        assert_eq!(reader.next(3), Some(0b011));
        assert_eq!(reader.next(3), Some(0b010));
        assert_eq!(reader.next(3), Some(0b101));
    }

    #[test]
    fn codes_cross_byte_boundaries() {
        let mut reader = BitReader::new(&[0xff, 0x0f, 0xab]);
        assert_eq!(reader.next(12), Some(0xfff));
        assert_eq!(reader.next(12), Some(0xab0));
        assert_eq!(reader.next(1), None);
    }

    #[test]
    fn partial_code_is_not_returned() {
        let mut reader = BitReader::new(&[0x01]);
        assert_eq!(reader.next(9), None);
    }
}
