//! Implementation of Password Authenticated Connection Establishment.
//!
//! PACE lets a terminal and a chip that share only a weak secret (MRZ, CAN, PIN or PUK) agree on
//! strong session keys. The handshake is driven one step at a time through [`PaceContext`]; the
//! exchange of the resulting byte strings between the parties is up to the caller.
//!
//! Specified in ICAO Doc 9303 Part 11 § 4.4 and BSI TR-03110 Part 2 § 3.2.


pub mod asn1;
pub mod config;
pub mod context;
pub mod kdf;
pub mod key_agreement;
pub mod mapping;
pub mod oids;
pub mod secret;
pub mod token;


use std::fmt;

use crate::crypt;
use crate::pace::asn1::CardAccessError;

pub use crate::pace::config::{PaceConfig, Role, TrVersion};
pub use crate::pace::context::PaceContext;
pub use crate::pace::kdf::SessionKeys;
pub use crate::pace::mapping::MappingStrategy;
pub use crate::pace::oids::{KeyAgreement, PaceProtocol};
pub use crate::pace::secret::{PaceSecret, SecretKind};


/// A step of the PACE handshake.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Step {
    EncryptNonce,
    DecryptNonce,
    GenerateMappingData,
    MapGenerator,
    GenerateEphemeralKey,
    ComputeSharedSecret,
    DeriveKeys,
    ComputeAuthenticationToken,
    VerifyAuthenticationToken,
    ObtainSessionKeys,
}
impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EncryptNonce => "STEP1 (encrypt nonce)",
            Self::DecryptNonce => "STEP2 (decrypt nonce)",
            Self::GenerateMappingData => "STEP3A (generate mapping data)",
            Self::MapGenerator => "STEP3A (map generator)",
            Self::GenerateEphemeralKey => "STEP3B (generate ephemeral key)",
            Self::ComputeSharedSecret => "STEP3B (compute shared secret)",
            Self::DeriveKeys => "STEP3C (derive keys)",
            Self::ComputeAuthenticationToken => "STEP3D (compute authentication token)",
            Self::VerifyAuthenticationToken => "STEP3D (verify authentication token)",
            Self::ObtainSessionKeys => "session key retrieval",
        };
        f.write_str(name)
    }
}


/// The state of a PACE handshake.
///
/// The states are passed through in declaration order.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum HandshakeState {
    #[default]
    Uninitialized,
    NonceEstablished,
    Mapped,
    KeysAgreed,
    SessionKeysDerived,
    TokenExchanged,
}
impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::NonceEstablished => "nonce established",
            Self::Mapped => "mapped",
            Self::KeysAgreed => "keys agreed",
            Self::SessionKeysDerived => "session keys derived",
            Self::TokenExchanged => "token exchanged",
        };
        f.write_str(name)
    }
}


/// An error that occurred while configuring or performing PACE.
#[derive(Debug)]
pub enum Error {
    /// An argument is malformed or missing.
    InvalidInput(&'static str),

    /// A step was invoked out of order.
    State { step: Step, state: HandshakeState },

    /// A key could not be derived or generated.
    KeyDerivation(crypt::Error),

    /// The nonce could not be encrypted.
    Encryption(crypt::Error),

    /// The nonce could not be decrypted.
    Decryption(crypt::Error),

    /// The peer's public value equals our own (`source` is `None`) or is not a valid element of
    /// the group.
    ReplayOrInvalidKey { source: Option<crypt::Error> },

    /// The authentication token or the data it covers is structurally invalid.
    TokenFormat(&'static str),

    /// The peer's authentication token does not match.
    TokenMismatch,

    /// The protocol is unknown, unsupported or conflicts with the data supplied.
    ProtocolMismatch(&'static str),

    /// The domain parameters are not supported.
    UnsupportedParameters { parameter_id: Option<u32> },

    /// `EF.CardAccess` could not be evaluated.
    CardAccess(CardAccessError),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(reason)
                => write!(f, "invalid input: {}", reason),
            Self::State { step, state }
                => write!(f, "{} cannot be performed in state {}", step, state),
            Self::KeyDerivation(e)
                => write!(f, "key derivation failed: {}", e),
            Self::Encryption(e)
                => write!(f, "nonce encryption failed: {}", e),
            Self::Decryption(e)
                => write!(f, "nonce decryption failed: {}", e),
            Self::ReplayOrInvalidKey { source: None }
                => write!(f, "peer public key equals our own public key"),
            Self::ReplayOrInvalidKey { source: Some(e) }
                => write!(f, "invalid peer public key: {}", e),
            Self::TokenFormat(reason)
                => write!(f, "invalid authentication token: {}", reason),
            Self::TokenMismatch
                => write!(f, "authentication token mismatch"),
            Self::ProtocolMismatch(reason)
                => write!(f, "protocol mismatch: {}", reason),
            Self::UnsupportedParameters { parameter_id: Some(parameter_id) }
                => write!(f, "domain parameters with ID {} are not supported", parameter_id),
            Self::UnsupportedParameters { parameter_id: None }
                => write!(f, "custom domain parameters are not supported"),
            Self::CardAccess(e)
                => write!(f, "failed to evaluate EF.CardAccess: {}", e),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::KeyDerivation(e) => Some(e),
            Self::Encryption(e) => Some(e),
            Self::Decryption(e) => Some(e),
            Self::ReplayOrInvalidKey { source } => source.as_ref().map(|e| e as &(dyn std::error::Error + 'static)),
            Self::CardAccess(e) => Some(e),
            Self::InvalidInput(_) => None,
            Self::State { .. } => None,
            Self::TokenFormat(_) => None,
            Self::TokenMismatch => None,
            Self::ProtocolMismatch(_) => None,
            Self::UnsupportedParameters { .. } => None,
        }
    }
}
impl From<CardAccessError> for Error {
    fn from(value: CardAccessError) -> Self { Self::CardAccess(value) }
}


#[cfg(test)]
mod tests {
    use super::{Error, HandshakeState, Step};

    #[test]
    fn test_state_error_display() {
        let error = Error::State { step: Step::DeriveKeys, state: HandshakeState::NonceEstablished };
        assert_eq!(error.to_string(), "STEP3C (derive keys) cannot be performed in state nonce established");
    }
}
