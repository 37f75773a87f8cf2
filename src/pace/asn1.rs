//! ASN.1 structures relevant to PACE.


use std::fmt;

use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use rasn::types::{Any, ObjectIdentifier, SetOf};
use tracing::debug;

use crate::pace::oids::is_pace_oid;


/// An item of PACE-related security information in the `EF.CardAccess` file on the travel document
/// chip.
///
/// Specified in ICAO Doc 9303 Part 11 § 9.2.1.
#[derive(AsnType, Clone, Debug, Decode, Encode, Eq, Hash, PartialEq)]
pub struct PaceInfo {
    pub protocol: ObjectIdentifier,
    pub version: u32,
    pub parameter_id: Option<u32>,
}
impl PaceInfo {
    pub fn new(protocol: ObjectIdentifier, version: u32, parameter_id: Option<u32>) -> Self {
        Self {
            protocol,
            version,
            parameter_id,
        }
    }
}


/// An error encountered while evaluating `EF.CardAccess`.
#[derive(Debug)]
pub enum CardAccessError {
    /// The file is not a DER-encoded SET OF.
    Decoding(rasn::error::DecodeError),

    /// An entry with a PACE protocol OID could not be decoded as a `PaceInfo`.
    EntryDecoding { entry_index: usize, error: rasn::error::DecodeError },

    /// No usable `PaceInfo` entry was found.
    NoPaceInfo,
}
impl fmt::Display for CardAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoding(e)
                => write!(f, "failed to decode EF.CardAccess: {}", e),
            Self::EntryDecoding { entry_index, error }
                => write!(f, "failed to decode EF.CardAccess entry {} as PaceInfo: {}", entry_index, error),
            Self::NoPaceInfo
                => write!(f, "EF.CardAccess contains no usable PaceInfo"),
        }
    }
}
impl std::error::Error for CardAccessError {
}


/// Extracts all `PaceInfo` entries from the DER-encoded content of `EF.CardAccess`.
///
/// `EF.CardAccess` is a SET OF security infos, each of which is a SEQUENCE starting with a protocol
/// OID. Entries whose OID is outside the PACE arc (e.g. Chip Authentication or PACE domain
/// parameter infos, which have a different shape) are skipped.
pub fn decode_pace_infos(card_access: &[u8]) -> Result<Vec<PaceInfo>, CardAccessError> {
    let security_infos: SetOf<Any> = rasn::der::decode(card_access)
        .map_err(CardAccessError::Decoding)?;

    let mut pace_infos = Vec::new();
    for (entry_index, security_info) in security_infos.to_vec().into_iter().enumerate() {
        let Ok(members) = rasn::der::decode::<Vec<Any>>(security_info.as_bytes()) else {
            debug!(entry_index, "skipping security info that is not a SEQUENCE");
            continue;
        };
        let Some(first_member) = members.first() else {
            continue;
        };
        let Ok(protocol) = rasn::der::decode::<ObjectIdentifier>(first_member.as_bytes()) else {
            continue;
        };
        if !is_pace_oid(&protocol) || members.get(1).is_some_and(is_domain_parameter_info) {
            continue;
        }

        let pace_info: PaceInfo = rasn::der::decode(security_info.as_bytes())
            .map_err(|error| CardAccessError::EntryDecoding { entry_index, error })?;
        pace_infos.push(pace_info);
    }
    Ok(pace_infos)
}


/// PaceDomainParameterInfo has an AlgorithmIdentifier (a SEQUENCE) where PaceInfo has its version.
fn is_domain_parameter_info(second_member: &Any) -> bool {
    second_member.as_bytes().first() == Some(&0x30)
}


#[cfg(test)]
mod tests {
    use super::{decode_pace_infos, CardAccessError};
    use crate::pace::oids::PACE_ECDH_GM_AES_CBC_CMAC_128;
    use hex_literal::hex;

    #[test]
    fn test_decode_single_pace_info() {
        // ICAO Doc 9303 Part 11 Appendix G.1
        let card_access = hex!("31 14 30 12 06 0A 04 00 7F 00 07 02 02 04 02 02 02 01 02 02 01 0D");
        let pace_infos = decode_pace_infos(&card_access).unwrap();
        assert_eq!(pace_infos.len(), 1);
        assert_eq!(&*pace_infos[0].protocol, PACE_ECDH_GM_AES_CBC_CMAC_128);
        assert_eq!(pace_infos[0].version, 2);
        assert_eq!(pace_infos[0].parameter_id, Some(13));
    }

    #[test]
    fn test_skips_other_security_infos() {
        let card_access = hex!("
            31 28
                30 12
                    06 0A 04 00 7F 00 07 02 02 03 02 02
                    02 01 01
                    02 01 0D
                30 12
                    06 0A 04 00 7F 00 07 02 02 04 02 02
                    02 01 02
                    02 01 0D
        ");
        let pace_infos = decode_pace_infos(&card_access).unwrap();
        assert_eq!(pace_infos.len(), 1);
        assert_eq!(&*pace_infos[0].protocol, PACE_ECDH_GM_AES_CBC_CMAC_128);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(decode_pace_infos(&hex!("04 02 00 00")), Err(CardAccessError::Decoding(_))));
    }
}
