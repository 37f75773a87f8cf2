//! Utility functions for Distinguished Encoding Rules.


use rasn::types::Oid;


/// Encode an ASN.1 DER length.
pub fn encode_length(output: &mut Vec<u8>, length: usize) {
    if length < 128 {
        // single-byte encoding
        output.push(length as u8);
    } else {
        // 0b1nnn_nnnn and then n additional bytes that actually specify the length
        // (big-endian)
        let length_bytes = length.to_be_bytes();
        let leading_zeroes = length_bytes.iter().take_while(|b| **b == 0x00).count();
        let trimmed = &length_bytes[leading_zeroes..];
        output.push(0b1000_0000 | trimmed.len() as u8);
        output.extend_from_slice(trimmed);
    }
}


/// Encode a complete tag-length-value data object.
///
/// The tag is given in its encoded form, so multi-byte tags such as `7F 49` are supported.
pub fn encode_tlv(output: &mut Vec<u8>, tag: &[u8], value: &[u8]) {
    output.extend_from_slice(tag);
    encode_length(output, value.len());
    output.extend_from_slice(value);
}


/// Encode an object identifier value into bytes using DER encoding rules.
///
/// No tag or length is encoded, only the actual value. Returns `None` if the object identifier has
/// fewer than two arcs or its first two arcs cannot be combined.
pub fn oid_to_der_bytes(oid: &Oid) -> Option<Vec<u8>> {
    if oid.len() < 2 || oid[0] > 2 || (oid[0] < 2 && oid[1] > 39) {
        return None;
    }

    fn encode_arc(output: &mut Vec<u8>, arc: u64) {
        // base 128, most significant group first, all but the last with the top bit set
        let group_count = ((64 - arc.leading_zeros()).max(1)).div_ceil(7);
        for group_index in (0..group_count).rev() {
            let group = ((arc >> (7 * group_index)) & 0b0111_1111) as u8;
            if group_index > 0 {
                output.push(group | 0b1000_0000);
            } else {
                output.push(group);
            }
        }
    }

    let mut ret = Vec::new();
    encode_arc(&mut ret, 40 * u64::from(oid[0]) + u64::from(oid[1]));
    for arc in oid.iter().skip(2) {
        encode_arc(&mut ret, u64::from(*arc));
    }
    Some(ret)
}


#[cfg(test)]
mod tests {
    use super::{encode_length, encode_tlv, oid_to_der_bytes};
    use hex_literal::hex;
    use rasn::types::Oid;

    #[test]
    fn test_encode_length() {
        let mut output = Vec::new();
        encode_length(&mut output, 0x4F);
        encode_length(&mut output, 0x80);
        encode_length(&mut output, 0x0183);
        assert_eq!(output, hex!("4F 81 80 82 01 83"));
    }

    #[test]
    fn test_encode_tlv() {
        let mut output = Vec::new();
        encode_tlv(&mut output, &hex!("7F 49"), &hex!("86 01 04"));
        assert_eq!(output, hex!("7F 49 03 86 01 04"));
    }

    #[test]
    fn test_oid_to_der_bytes() {
        let pace = Oid::const_new(&[0, 4, 0, 127, 0, 7, 2, 2, 4, 2, 2]);
        assert_eq!(oid_to_der_bytes(pace).unwrap(), hex!("04 00 7F 00 07 02 02 04 02 02"));

        let sha256 = Oid::const_new(&[2, 16, 840, 1, 101, 3, 4, 2, 1]);
        assert_eq!(oid_to_der_bytes(sha256).unwrap(), hex!("60 86 48 01 65 03 04 02 01"));
    }
}
