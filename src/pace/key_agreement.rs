//! The ephemeral key agreement performed over the mapped domain parameters.


use std::fmt;

use crypto_bigint::BoxedUint;
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::crypt::DomainParameters;
use crate::crypt::cipher_suite::CipherSuite;
use crate::pace::Error;
use crate::pace::kdf::{derive_session_keys, SessionKeys};


/// An ephemeral key pair.
///
/// The private key never leaves this structure and is wiped when it is dropped.
#[derive(ZeroizeOnDrop)]
pub struct EphemeralKeyPair {
    private_key: Zeroizing<BoxedUint>,
    public_key: Zeroizing<Vec<u8>>,
}
impl EphemeralKeyPair {
    /// Generates a random key pair for the given domain parameters.
    pub fn generate(parameters: &DomainParameters) -> Result<Self, Error> {
        let private_key = parameters.generate_private_key();
        Self::from_private_key(parameters, private_key)
    }

    /// Creates the key pair belonging to the given private key.
    pub fn from_private_key(parameters: &DomainParameters, private_key: Zeroizing<BoxedUint>) -> Result<Self, Error> {
        if bool::from(private_key.is_zero()) {
            return Err(Error::InvalidInput("private key is zero"));
        }
        let public_key = parameters.calculate_public_key(&private_key)
            .map_err(Error::KeyDerivation)?;
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// The encoded public key.
    pub fn public_key(&self) -> &[u8] { &self.public_key }

    pub(crate) fn private_key(&self) -> &BoxedUint { &self.private_key }
}
impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public_key", &self.public_key.as_slice())
            .finish_non_exhaustive()
    }
}


/// Key agreement state over a set of (mapped) domain parameters.
///
/// Operations either succeed completely or leave the context untouched.
pub struct KeyAgreementContext {
    parameters: DomainParameters,
    key_pair: Option<EphemeralKeyPair>,
    peer_public_key: Option<Vec<u8>>,
    shared_secret: Option<Zeroizing<Vec<u8>>>,
}
impl KeyAgreementContext {
    pub fn new(parameters: DomainParameters) -> Self {
        Self {
            parameters,
            key_pair: None,
            peer_public_key: None,
            shared_secret: None,
        }
    }

    pub fn parameters(&self) -> &DomainParameters { &self.parameters }
    pub fn key_pair(&self) -> Option<&EphemeralKeyPair> { self.key_pair.as_ref() }
    pub fn peer_public_key(&self) -> Option<&[u8]> { self.peer_public_key.as_deref() }
    pub fn has_shared_secret(&self) -> bool { self.shared_secret.is_some() }

    /// Installs our ephemeral key pair, returning its public key.
    pub fn set_key_pair(&mut self, key_pair: EphemeralKeyPair) -> &[u8] {
        self.key_pair.insert(key_pair).public_key()
    }

    /// Computes the shared secret from our private key and the peer's public key.
    ///
    /// The peer's public key must differ from our own and be a valid element of the group.
    pub fn compute_shared_secret(&mut self, peer_public_key: &[u8]) -> Result<(), Error> {
        let Some(key_pair) = self.key_pair.as_ref() else {
            return Err(Error::InvalidInput("no ephemeral key pair has been generated"));
        };
        if bool::from(peer_public_key.ct_eq(key_pair.public_key())) {
            warn!("peer returned our own ephemeral public key");
            return Err(Error::ReplayOrInvalidKey { source: None });
        }
        let shared_secret = self.parameters.exchange_keys(key_pair.private_key(), peer_public_key)
            .map_err(|e| {
                warn!(error = %e, "peer ephemeral public key rejected");
                Error::ReplayOrInvalidKey { source: Some(e) }
            })?;

        self.shared_secret = Some(shared_secret);
        self.peer_public_key = Some(peer_public_key.to_vec());
        Ok(())
    }

    /// Derives the session keys from the shared secret, which is discarded afterwards.
    pub fn derive_session_keys(&mut self, cipher_suite: CipherSuite) -> Result<SessionKeys, Error> {
        let Some(shared_secret) = self.shared_secret.as_ref() else {
            return Err(Error::InvalidInput("no shared secret has been computed"));
        };
        let session_keys = derive_session_keys(cipher_suite, shared_secret, None)?;
        self.shared_secret = None;
        Ok(session_keys)
    }
}
