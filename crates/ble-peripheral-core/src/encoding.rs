//! Byte-valued integer sequence encoding

use crate::error::{PeripheralError, Result};

/// Convert a sequence of byte-valued integers into raw bytes
///
/// The output has the same length and order as the input. Every value must
/// fit in a single unsigned byte.
pub fn encode_bytes(values: &[i32]) -> Result<Vec<u8>> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            u8::try_from(value).map_err(|_| PeripheralError::ByteOutOfRange { index, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_preserves_order() {
        assert_eq!(encode_bytes(&[10, 255, 0]).unwrap(), vec![10, 255, 0]);
        assert!(encode_bytes(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        match encode_bytes(&[1, 2, 256]) {
            Err(PeripheralError::ByteOutOfRange { index, value }) => {
                assert_eq!(index, 2);
                assert_eq!(value, 256);
            }
            other => panic!("expected ByteOutOfRange, got {:?}", other),
        }
        assert!(encode_bytes(&[-1]).is_err());
    }

    proptest! {
        #[test]
        fn encode_keeps_length_and_values(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let values: Vec<i32> = bytes.iter().map(|&b| i32::from(b)).collect();
            let encoded = encode_bytes(&values).unwrap();
            prop_assert_eq!(encoded, bytes);
        }
    }
}
