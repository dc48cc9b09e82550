use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16-IBM-3740 checksum function.
///
/// The CCITT polynomial 0x1021 with initial value 0xFFFF, no reflection,
/// transmitted big-endian over the frame body as required by UG101.
pub const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

#[cfg(test)]
mod tests {
    use super::CRC;

    #[test]
    fn test_rst_checksum() {
        assert_eq!(CRC.checksum(&[0xC0]), 0x38BC);
    }

    #[test]
    fn test_residue() {
        // A frame body followed by its own big-endian CRC checksums to zero.
        let body = [0x53, 0x42, 0xA1, 0xA8, 0x56, 0x28, 0x04, 0x82];
        let crc = CRC.checksum(&body);
        let mut framed = body.to_vec();
        framed.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(CRC.checksum(&framed), 0x0000);
    }
}
