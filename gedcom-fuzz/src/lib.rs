//! Fuzzing entry points for gedcom-core
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Call these from fuzz targets: cargo fuzz run fuzz_decode

pub fn fuzz_decode(data: &[u8]) {
    use gedcom_core::decode_from_bytes;

    // Try to decode - should never panic
    let _ = decode_from_bytes(data);
}

pub fn fuzz_scan(data: &[u8]) {
    use gedcom_core::scan_lines;

    let _ = scan_lines(data);
}

/// Decode, encode, decode again; the second encoding must match the first
pub fn fuzz_round_trip(data: &[u8]) {
    use gedcom_core::{decode_from_bytes, encode_to_bytes};

    let Ok(gedcom) = decode_from_bytes(data) else {
        return;
    };
    let Ok(first) = encode_to_bytes(&gedcom) else {
        return;
    };
    let again = decode_from_bytes(&first).expect("encoder output must decode");
    let second = encode_to_bytes(&again).expect("re-encoding must succeed");
    assert_eq!(first, second);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzz_decode_empty() {
        fuzz_decode(&[]);
    }

    #[test]
    fn test_fuzz_decode_random() {
        fuzz_decode(&[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_fuzz_scan_empty() {
        fuzz_scan(&[]);
    }

    #[test]
    fn test_fuzz_scan_garbage() {
        fuzz_scan(b"0 @@ \xff\xfe\r\r\n  7");
    }

    #[test]
    fn test_fuzz_round_trip_small_file() {
        fuzz_round_trip(b"0 HEAD\n0 @I1@ INDI\n1 NAME A /B/\n1 FAMS @F1@\n0 @F1@ FAM\n1 HUSB @I1@\n0 TRLR\n");
    }
}
