//! Configuration of a PACE handshake.


use std::fmt;
use std::sync::Arc;

use rasn::types::Oid;
use tracing::debug;

use crate::crypt::{standardized_parameters, DomainParameters};
use crate::crypt::cipher_suite::CipherSuite;
use crate::pace::Error;
use crate::pace::asn1::{decode_pace_infos, CardAccessError};
use crate::pace::mapping::MappingStrategy;
use crate::pace::oids::{KeyAgreement, PaceProtocol};


/// The party performing the handshake.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Role {
    /// The inspection system (PCD).
    Terminal,

    /// The travel document chip (PICC).
    Chip,
}
impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal => f.write_str("terminal"),
            Self::Chip => f.write_str("chip"),
        }
    }
}


/// The revision of BSI TR-03110 whose authentication token encoding is used.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TrVersion {
    /// Version 2.01: the token covers the full domain parameters.
    V2_01,

    /// Version 2.02 and later: the token covers only the public key.
    #[default]
    V2_02,
}


/// The protocol, domain parameters and role of a PACE handshake.
#[derive(Clone, Debug)]
pub struct PaceConfig {
    protocol: PaceProtocol,
    parameters: Arc<DomainParameters>,
    parameter_id: Option<u32>,
    tr_version: TrVersion,
    role: Role,
}
impl PaceConfig {
    /// Creates a configuration for the given protocol and standardized domain parameters.
    pub fn new(protocol: &Oid, parameter_id: u32, role: Role) -> Result<Self, Error> {
        let parameters = standardized_parameters(parameter_id)
            .ok_or(Error::UnsupportedParameters { parameter_id: Some(parameter_id) })?;
        Self::assemble(protocol, parameters, Some(parameter_id), role)
    }

    /// Creates a configuration for the given protocol and custom domain parameters.
    pub fn with_parameters(protocol: &Oid, parameters: Arc<DomainParameters>, role: Role) -> Result<Self, Error> {
        Self::assemble(protocol, parameters, None, role)
    }

    /// Creates a configuration from the contents of `EF.CardAccess`.
    ///
    /// The first `PaceInfo` of version 2 with a supported protocol and standardized domain
    /// parameters is chosen.
    pub fn from_card_access(card_access: &[u8], role: Role) -> Result<Self, Error> {
        let pace_infos = decode_pace_infos(card_access)?;
        for pace_info in &pace_infos {
            if pace_info.version != 2 {
                debug!(version = pace_info.version, "skipping PaceInfo with unsupported version");
                continue;
            }
            let Some(parameter_id) = pace_info.parameter_id else {
                debug!("skipping PaceInfo with proprietary domain parameters");
                continue;
            };
            match Self::new(&pace_info.protocol, parameter_id, role) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    debug!(error = %e, parameter_id, "skipping unusable PaceInfo");
                },
            }
        }
        Err(CardAccessError::NoPaceInfo.into())
    }

    fn assemble(protocol: &Oid, parameters: Arc<DomainParameters>, parameter_id: Option<u32>, role: Role) -> Result<Self, Error> {
        let protocol = PaceProtocol::from_oid(protocol)?;
        match (protocol.key_agreement(), &*parameters) {
            (KeyAgreement::DiffieHellman, DomainParameters::DiffieHellman(_)) => {},
            (KeyAgreement::EllipticDiffieHellman, DomainParameters::Elliptic(_)) => {},
            _ => return Err(Error::ProtocolMismatch("domain parameters do not match the key agreement of the protocol")),
        }
        if protocol.mapping() == MappingStrategy::Integrated && protocol.cipher_suite() == CipherSuite::TripleDesCbcCbc {
            return Err(Error::ProtocolMismatch("integrated mapping is not defined for 3DES"));
        }
        Ok(Self {
            protocol,
            parameters,
            parameter_id,
            tr_version: TrVersion::default(),
            role,
        })
    }

    /// Sets the TR-03110 version that determines the authentication token encoding.
    pub fn with_tr_version(mut self, tr_version: TrVersion) -> Self {
        self.tr_version = tr_version;
        self
    }

    pub fn protocol(&self) -> &PaceProtocol { &self.protocol }
    pub fn parameters(&self) -> &Arc<DomainParameters> { &self.parameters }

    /// The standardized domain parameter ID, if standardized parameters are used.
    pub fn parameter_id(&self) -> Option<u32> { self.parameter_id }

    pub fn tr_version(&self) -> TrVersion { self.tr_version }
    pub fn role(&self) -> Role { self.role }
    pub fn cipher_suite(&self) -> CipherSuite { self.protocol.cipher_suite() }
    pub fn mapping(&self) -> MappingStrategy { self.protocol.mapping() }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pace::oids::{
        PACE_DH_GM_AES_CBC_CMAC_128, PACE_DH_IM_3DES_CBC_CBC, PACE_ECDH_GM_AES_CBC_CMAC_128,
        PACE_ECDH_IM_AES_CBC_CMAC_256,
    };
    use hex_literal::hex;

    #[test]
    fn test_new() {
        let config = PaceConfig::new(PACE_ECDH_IM_AES_CBC_CMAC_256, 17, Role::Chip).unwrap();
        assert_eq!(config.cipher_suite(), CipherSuite::Aes256CbcCmac);
        assert_eq!(config.mapping(), MappingStrategy::Integrated);
        assert_eq!(config.parameter_id(), Some(17));
        assert_eq!(config.tr_version(), TrVersion::V2_02);
        assert_eq!(config.role(), Role::Chip);

        let config = config.with_tr_version(TrVersion::V2_01);
        assert_eq!(config.tr_version(), TrVersion::V2_01);
    }

    #[test]
    fn test_new_rejects() {
        assert!(matches!(
            PaceConfig::new(PACE_ECDH_GM_AES_CBC_CMAC_128, 0, Role::Terminal),
            Err(Error::ProtocolMismatch(_)),
        ));
        assert!(matches!(
            PaceConfig::new(PACE_DH_GM_AES_CBC_CMAC_128, 13, Role::Terminal),
            Err(Error::ProtocolMismatch(_)),
        ));
        assert!(matches!(
            PaceConfig::new(PACE_DH_IM_3DES_CBC_CBC, 0, Role::Terminal),
            Err(Error::ProtocolMismatch(_)),
        ));
        assert!(matches!(
            PaceConfig::new(PACE_DH_GM_AES_CBC_CMAC_128, 2, Role::Terminal),
            Err(Error::UnsupportedParameters { parameter_id: Some(2) }),
        ));
    }

    #[test]
    fn test_from_card_access() {
        // ICAO Doc 9303 Part 11 Appendix G.1
        let card_access = hex!("31 14 30 12 06 0A 04 00 7F 00 07 02 02 04 02 02 02 01 02 02 01 0D");
        let config = PaceConfig::from_card_access(&card_access, Role::Terminal).unwrap();
        assert_eq!(config.protocol().oid(), PACE_ECDH_GM_AES_CBC_CMAC_128);
        assert_eq!(config.parameter_id(), Some(13));
    }

    #[test]
    fn test_from_card_access_skips_unusable() {
        let card_access = hex!("
            31 28
                30 12
                    06 0A 04 00 7F 00 07 02 02 04 01 02
                    02 01 02
                    02 01 02
                30 12
                    06 0A 04 00 7F 00 07 02 02 04 02 02
                    02 01 02
                    02 01 0C
        ");
        let config = PaceConfig::from_card_access(&card_access, Role::Terminal).unwrap();
        assert_eq!(config.protocol().oid(), PACE_ECDH_GM_AES_CBC_CMAC_128);
        assert_eq!(config.parameter_id(), Some(12));

        let only_unusable = hex!("31 14 30 12 06 0A 04 00 7F 00 07 02 02 04 02 02 02 01 02 02 01 02");
        assert!(matches!(
            PaceConfig::from_card_access(&only_unusable, Role::Terminal),
            Err(Error::CardAccess(CardAccessError::NoPaceInfo)),
        ));
    }
}
