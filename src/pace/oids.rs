//! Object identifiers relevant to PACE and the protocols they identify.


use rasn::types::Oid;

use crate::crypt::cipher_suite::CipherSuite;
use crate::pace::Error;
use crate::pace::mapping::MappingStrategy;


macro_rules! pace_oid {
    ($name:ident $(, $number:expr)* $(,)?) => {
        pub const $name: &'static Oid = Oid::const_new(&[0, 4, 0, 127, 0, 7, 2, 2, 4 $(, $number)*]);
    };
}

pace_oid!(PACE_OID_PREFIX);

pace_oid!(PACE_DH_GM_3DES_CBC_CBC,      1, 1);
pace_oid!(PACE_DH_GM_AES_CBC_CMAC_128,  1, 2);
pace_oid!(PACE_DH_GM_AES_CBC_CMAC_192,  1, 3);
pace_oid!(PACE_DH_GM_AES_CBC_CMAC_256,  1, 4);

pace_oid!(PACE_ECDH_GM_3DES_CBC_CBC,        2, 1);
pace_oid!(PACE_ECDH_GM_AES_CBC_CMAC_128,    2, 2);
pace_oid!(PACE_ECDH_GM_AES_CBC_CMAC_192,    2, 3);
pace_oid!(PACE_ECDH_GM_AES_CBC_CMAC_256,    2, 4);

pace_oid!(PACE_DH_IM_3DES_CBC_CBC,      3, 1);
pace_oid!(PACE_DH_IM_AES_CBC_CMAC_128,  3, 2);
pace_oid!(PACE_DH_IM_AES_CBC_CMAC_192,  3, 3);
pace_oid!(PACE_DH_IM_AES_CBC_CMAC_256,  3, 4);

pace_oid!(PACE_ECDH_IM_3DES_CBC_CBC,        4, 1);
pace_oid!(PACE_ECDH_IM_AES_CBC_CMAC_128,    4, 2);
pace_oid!(PACE_ECDH_IM_AES_CBC_CMAC_192,    4, 3);
pace_oid!(PACE_ECDH_IM_AES_CBC_CMAC_256,    4, 4);

pace_oid!(PACE_ECDH_CAM_AES_CBC_CMAC_128,   6, 2);
pace_oid!(PACE_ECDH_CAM_AES_CBC_CMAC_192,   6, 3);
pace_oid!(PACE_ECDH_CAM_AES_CBC_CMAC_256,   6, 4);


/// The kind of key agreement a protocol is based on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KeyAgreement {
    /// Diffie-Hellman in a prime field.
    DiffieHellman,

    /// Elliptic-curve Diffie-Hellman.
    EllipticDiffieHellman,
}


/// A PACE protocol variant, as identified by its object identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PaceProtocol {
    oid: &'static Oid,
    key_agreement: KeyAgreement,
    mapping: MappingStrategy,
    cipher_suite: CipherSuite,
}
impl PaceProtocol {
    const fn new(oid: &'static Oid, key_agreement: KeyAgreement, mapping: MappingStrategy, cipher_suite: CipherSuite) -> Self {
        Self { oid, key_agreement, mapping, cipher_suite }
    }

    pub fn oid(&self) -> &'static Oid { self.oid }
    pub fn key_agreement(&self) -> KeyAgreement { self.key_agreement }
    pub fn mapping(&self) -> MappingStrategy { self.mapping }
    pub fn cipher_suite(&self) -> CipherSuite { self.cipher_suite }

    /// Looks up the protocol identified by the given object identifier.
    ///
    /// Chip Authentication Mapping is recognized but rejected, as are all other object identifiers.
    pub fn from_oid(oid: &Oid) -> Result<Self, Error> {
        if let Some(protocol) = SUPPORTED_PROTOCOLS.iter().find(|p| p.oid == oid) {
            return Ok(*protocol);
        }
        if [PACE_ECDH_CAM_AES_CBC_CMAC_128, PACE_ECDH_CAM_AES_CBC_CMAC_192, PACE_ECDH_CAM_AES_CBC_CMAC_256].contains(&oid) {
            return Err(Error::ProtocolMismatch("chip authentication mapping is not supported"));
        }
        if is_pace_oid(oid) {
            Err(Error::ProtocolMismatch("unknown PACE protocol"))
        } else {
            Err(Error::ProtocolMismatch("not a PACE protocol"))
        }
    }
}


/// Whether the object identifier lies in the PACE arc.
pub fn is_pace_oid(oid: &Oid) -> bool {
    oid.len() > PACE_OID_PREFIX.len()
        && oid[..PACE_OID_PREFIX.len()] == PACE_OID_PREFIX[..]
}


/// All protocols that can be performed.
pub const SUPPORTED_PROTOCOLS: [PaceProtocol; 16] = {
    use CipherSuite::*;
    use KeyAgreement::*;
    use MappingStrategy::*;
    [
        PaceProtocol::new(PACE_DH_GM_3DES_CBC_CBC, DiffieHellman, Generic, TripleDesCbcCbc),
        PaceProtocol::new(PACE_DH_GM_AES_CBC_CMAC_128, DiffieHellman, Generic, Aes128CbcCmac),
        PaceProtocol::new(PACE_DH_GM_AES_CBC_CMAC_192, DiffieHellman, Generic, Aes192CbcCmac),
        PaceProtocol::new(PACE_DH_GM_AES_CBC_CMAC_256, DiffieHellman, Generic, Aes256CbcCmac),

        PaceProtocol::new(PACE_ECDH_GM_3DES_CBC_CBC, EllipticDiffieHellman, Generic, TripleDesCbcCbc),
        PaceProtocol::new(PACE_ECDH_GM_AES_CBC_CMAC_128, EllipticDiffieHellman, Generic, Aes128CbcCmac),
        PaceProtocol::new(PACE_ECDH_GM_AES_CBC_CMAC_192, EllipticDiffieHellman, Generic, Aes192CbcCmac),
        PaceProtocol::new(PACE_ECDH_GM_AES_CBC_CMAC_256, EllipticDiffieHellman, Generic, Aes256CbcCmac),

        PaceProtocol::new(PACE_DH_IM_3DES_CBC_CBC, DiffieHellman, Integrated, TripleDesCbcCbc),
        PaceProtocol::new(PACE_DH_IM_AES_CBC_CMAC_128, DiffieHellman, Integrated, Aes128CbcCmac),
        PaceProtocol::new(PACE_DH_IM_AES_CBC_CMAC_192, DiffieHellman, Integrated, Aes192CbcCmac),
        PaceProtocol::new(PACE_DH_IM_AES_CBC_CMAC_256, DiffieHellman, Integrated, Aes256CbcCmac),

        PaceProtocol::new(PACE_ECDH_IM_3DES_CBC_CBC, EllipticDiffieHellman, Integrated, TripleDesCbcCbc),
        PaceProtocol::new(PACE_ECDH_IM_AES_CBC_CMAC_128, EllipticDiffieHellman, Integrated, Aes128CbcCmac),
        PaceProtocol::new(PACE_ECDH_IM_AES_CBC_CMAC_192, EllipticDiffieHellman, Integrated, Aes192CbcCmac),
        PaceProtocol::new(PACE_ECDH_IM_AES_CBC_CMAC_256, EllipticDiffieHellman, Integrated, Aes256CbcCmac),
    ]
};
