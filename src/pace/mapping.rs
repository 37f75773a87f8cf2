//! Mapping of the nonce onto new domain parameters.
//!
//! Both mappings replace the generator of the static domain parameters with one that depends on the
//! nonce exchanged in the first step:
//!
//! * Generic Mapping performs an additional anonymous key agreement. With `H` its shared secret and
//!   `s` the nonce, the new generator is `g^s * H` (Diffie-Hellman) or `s * G + H` (elliptic
//!   curves).
//! * Integrated Mapping feeds the nonce `s` and a random terminal nonce `t` into a pseudorandom
//!   function and maps its output directly onto the group. Only the terminal contributes data.
//!
//! Specified in ICAO Doc 9303 Part 11 § 4.4.3.3.


use crypto_bigint::BoxedUint;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::crypt::{self, boxed_uint_from_be_slice, DomainParameters};
use crate::crypt::cipher_suite::CipherSuite;
use crate::pace::Error;
use crate::pace::config::Role;


/// The algorithm mapping the nonce onto new domain parameters.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MappingStrategy {
    /// Generic Mapping, based on an anonymous key agreement.
    Generic,

    /// Integrated Mapping, based on a pseudorandom function.
    Integrated,
}


/// Data generated by one party for the mapping step.
///
/// The contribution is sent to the other party; the rest remains local.
#[derive(ZeroizeOnDrop)]
pub struct MappingData {
    private_key: Option<Zeroizing<BoxedUint>>,
    contribution: Zeroizing<Vec<u8>>,
}
impl MappingData {
    /// The data to send to the other party.
    pub fn contribution(&self) -> &[u8] { &self.contribution }
}


impl MappingStrategy {
    /// Generates fresh mapping data for the given role.
    ///
    /// For Generic Mapping, this is a new key pair whose public key is the contribution. For
    /// Integrated Mapping, the terminal draws a random nonce `t` as long as a cipher key while the
    /// chip contributes nothing.
    pub fn generate(
        self,
        role: Role,
        parameters: &DomainParameters,
        cipher_suite: CipherSuite,
    ) -> Result<MappingData, Error> {
        match (self, role) {
            (Self::Generic, _) => {
                let private_key = parameters.generate_private_key();
                self.generate_with_private_key(parameters, private_key)
            },
            (Self::Integrated, Role::Terminal) => {
                let mut terminal_nonce = Zeroizing::new(vec![0u8; cipher_suite.cipher_key_size()]);
                OsRng.fill_bytes(terminal_nonce.as_mut_slice());
                self.generate_with_terminal_nonce(cipher_suite, &terminal_nonce)
            },
            (Self::Integrated, Role::Chip) => Ok(MappingData {
                private_key: None,
                contribution: Zeroizing::new(Vec::new()),
            }),
        }
    }

    /// Generates Generic Mapping data from a known private key.
    ///
    /// Intended for reproducing recorded protocol runs.
    pub fn generate_with_private_key(
        self,
        parameters: &DomainParameters,
        private_key: Zeroizing<BoxedUint>,
    ) -> Result<MappingData, Error> {
        if self != Self::Generic {
            return Err(Error::ProtocolMismatch("a mapping private key is only used by generic mapping"));
        }
        let public_key = parameters.calculate_public_key(&private_key)
            .map_err(Error::KeyDerivation)?;
        Ok(MappingData {
            private_key: Some(private_key),
            contribution: public_key,
        })
    }

    /// Generates the terminal's Integrated Mapping data from a known terminal nonce `t`.
    ///
    /// Intended for reproducing recorded protocol runs.
    pub fn generate_with_terminal_nonce(
        self,
        cipher_suite: CipherSuite,
        terminal_nonce: &[u8],
    ) -> Result<MappingData, Error> {
        if self != Self::Integrated {
            return Err(Error::ProtocolMismatch("a terminal nonce is only used by integrated mapping"));
        }
        if terminal_nonce.len() != cipher_suite.cipher_key_size() {
            return Err(Error::InvalidInput("terminal nonce must be as long as a cipher key"));
        }
        Ok(MappingData {
            private_key: None,
            contribution: Zeroizing::new(terminal_nonce.to_vec()),
        })
    }

    /// Derives the mapped domain parameters.
    ///
    /// `own_data` is the mapping data generated by this party, `peer_contribution` the contribution
    /// received from the other party.
    pub fn map(
        self,
        role: Role,
        parameters: &DomainParameters,
        cipher_suite: CipherSuite,
        nonce: &[u8],
        own_data: &MappingData,
        peer_contribution: &[u8],
    ) -> Result<DomainParameters, Error> {
        match self {
            Self::Generic => {
                let Some(private_key) = own_data.private_key.as_ref() else {
                    return Err(Error::ProtocolMismatch("mapping data was not generated for generic mapping"));
                };
                if bool::from(peer_contribution.ct_eq(own_data.contribution())) {
                    warn!("peer returned our own mapping public key");
                    return Err(Error::ReplayOrInvalidKey { source: None });
                }
                if let Err(e) = parameters.validate_public_key(peer_contribution) {
                    warn!(error = %e, "peer mapping public key rejected");
                    return Err(Error::ReplayOrInvalidKey { source: Some(e) });
                }
                let nonce_num = Zeroizing::new(boxed_uint_from_be_slice(nonce));
                parameters.derive_generic_mapping(&nonce_num, private_key, peer_contribution)
                    .map_err(Error::KeyDerivation)
            },
            Self::Integrated => {
                let terminal_nonce = match role {
                    Role::Terminal => {
                        if !peer_contribution.is_empty() {
                            return Err(Error::ProtocolMismatch("the chip does not contribute to integrated mapping"));
                        }
                        own_data.contribution()
                    },
                    Role::Chip => {
                        if peer_contribution.len() != cipher_suite.cipher_key_size() {
                            return Err(Error::ProtocolMismatch("terminal nonce has the wrong length"));
                        }
                        peer_contribution
                    },
                };
                if terminal_nonce.len() != cipher_suite.cipher_key_size() {
                    return Err(Error::ProtocolMismatch("mapping data was not generated for integrated mapping"));
                }

                let pseudorandom = cipher_suite
                    .integrated_mapping_pseudorandom_function(nonce, terminal_nonce, parameters.prime())
                    .map_err(Error::KeyDerivation)?;
                parameters.derive_integrated_mapping(&pseudorandom)
                    .map_err(|e| match e {
                        crypt::Error::Unsupported(reason) => Error::ProtocolMismatch(reason),
                        other => Error::KeyDerivation(other),
                    })
            },
        }
    }
}
