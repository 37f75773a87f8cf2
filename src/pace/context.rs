//! The PACE handshake state machine.
//!
//! Both parties drive a [`PaceContext`] through the same sequence of steps, exchanging the returned
//! byte strings in between:
//!
//! | step   | chip                              | terminal                          |
//! |--------|-----------------------------------|-----------------------------------|
//! | 1      | `encrypt_nonce` → z               |                                   |
//! | 2      |                                   | `decrypt_nonce(z)`                |
//! | 3A     | `generate_mapping_data` ↔ `map_generator` on both sides               |
//! | 3B     | `generate_ephemeral_key` ↔ `compute_shared_secret` on both sides      |
//! | 3C     | `derive_keys` on both sides                                           |
//! | 3D     | `compute_authentication_token` ↔ `verify_authentication_token`        |
//!
//! A step that fails leaves the context exactly as it was before the call.


use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use tracing::{debug, info, instrument, trace, warn};
use zeroize::Zeroizing;

use crate::crypt::{self, boxed_uint_from_be_slice};
use crate::pace::{Error, HandshakeState, Step};
use crate::pace::config::PaceConfig;
use crate::pace::kdf::{derive_password_key, SessionKeys};
use crate::pace::key_agreement::{EphemeralKeyPair, KeyAgreementContext};
use crate::pace::mapping::MappingData;
use crate::pace::secret::PaceSecret;
use crate::pace::token::{compute_token, verify_token};


/// One party's side of a PACE handshake.
pub struct PaceContext {
    config: PaceConfig,
    state: HandshakeState,
    nonce: Option<Zeroizing<Vec<u8>>>,
    mapping_data: Option<MappingData>,
    key_agreement: Option<KeyAgreementContext>,
    session_keys: Option<SessionKeys>,
}
impl PaceContext {
    pub fn new(config: PaceConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Uninitialized,
            nonce: None,
            mapping_data: None,
            key_agreement: None,
            session_keys: None,
        }
    }

    pub fn config(&self) -> &PaceConfig { &self.config }
    pub fn state(&self) -> HandshakeState { self.state }

    /// Our ephemeral public key, once it has been generated.
    pub fn ephemeral_public_key(&self) -> Option<&[u8]> {
        self.key_agreement.as_ref()
            .and_then(|ka| ka.key_pair())
            .map(|kp| kp.public_key())
    }

    fn require_state(&self, step: Step, allowed: &[HandshakeState]) -> Result<(), Error> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::State { step, state: self.state })
        }
    }

    fn transition(&mut self, step: Step, new_state: HandshakeState) {
        debug!(%step, from = %self.state, to = %new_state, role = %self.config.role(), "PACE step completed");
        self.state = new_state;
    }

    /// Discards all data derived from a previous nonce.
    fn reset_to_nonce(&mut self, step: Step, nonce: Zeroizing<Vec<u8>>) {
        self.nonce = Some(nonce);
        self.mapping_data = None;
        self.transition(step, HandshakeState::NonceEstablished);
    }

    /// STEP1: chooses a random nonce and returns it encrypted with the key derived from the secret.
    #[instrument(skip_all)]
    pub fn encrypt_nonce(&mut self, secret: &PaceSecret) -> Result<Vec<u8>, Error> {
        let step = Step::EncryptNonce;
        self.require_state(step, &[HandshakeState::Uninitialized, HandshakeState::NonceEstablished])?;

        let cipher_suite = self.config.cipher_suite();
        let password_key = derive_password_key(cipher_suite, secret)?;
        let mut nonce = Zeroizing::new(vec![0u8; cipher_suite.cipher_block_size()]);
        OsRng.fill_bytes(nonce.as_mut_slice());
        let encrypted_nonce = cipher_suite.encrypt_nonce(&password_key, &nonce)
            .map_err(|e| match e {
                crypt::Error::KeyLength { .. } => Error::InvalidInput("password key has the wrong length"),
                other => Error::Encryption(other),
            })?;

        self.reset_to_nonce(step, nonce);
        Ok(encrypted_nonce.to_vec())
    }

    /// STEP2: decrypts the nonce received from the other party using the key derived from the
    /// secret.
    #[instrument(skip_all)]
    pub fn decrypt_nonce(&mut self, secret: &PaceSecret, encrypted_nonce: &[u8]) -> Result<(), Error> {
        let step = Step::DecryptNonce;
        self.require_state(step, &[HandshakeState::Uninitialized, HandshakeState::NonceEstablished])?;

        let cipher_suite = self.config.cipher_suite();
        let password_key = derive_password_key(cipher_suite, secret)?;
        let nonce = cipher_suite.decrypt_nonce(&password_key, encrypted_nonce)
            .map_err(|e| match e {
                crypt::Error::KeyLength { .. } => Error::InvalidInput("password key has the wrong length"),
                other => Error::Decryption(other),
            })?;

        self.reset_to_nonce(step, nonce);
        Ok(())
    }

    /// STEP3A: generates the data this party contributes to the mapping.
    ///
    /// Calling this again replaces the previously generated data.
    #[instrument(skip_all)]
    pub fn generate_mapping_data(&mut self) -> Result<Vec<u8>, Error> {
        self.require_state(Step::GenerateMappingData, &[HandshakeState::NonceEstablished])?;
        let mapping_data = self.config.mapping().generate(
            self.config.role(),
            self.config.parameters(),
            self.config.cipher_suite(),
        )?;
        Ok(self.store_mapping_data(mapping_data))
    }

    /// STEP3A with a known Generic Mapping private key, for reproducing recorded protocol runs.
    pub fn generate_mapping_data_with_private_key(&mut self, private_key: &[u8]) -> Result<Vec<u8>, Error> {
        self.require_state(Step::GenerateMappingData, &[HandshakeState::NonceEstablished])?;
        let private_key = Zeroizing::new(boxed_uint_from_be_slice(private_key));
        let mapping_data = self.config.mapping()
            .generate_with_private_key(self.config.parameters(), private_key)?;
        Ok(self.store_mapping_data(mapping_data))
    }

    /// STEP3A with a known Integrated Mapping terminal nonce, for reproducing recorded protocol
    /// runs.
    pub fn generate_mapping_data_with_terminal_nonce(&mut self, terminal_nonce: &[u8]) -> Result<Vec<u8>, Error> {
        self.require_state(Step::GenerateMappingData, &[HandshakeState::NonceEstablished])?;
        let mapping_data = self.config.mapping()
            .generate_with_terminal_nonce(self.config.cipher_suite(), terminal_nonce)?;
        Ok(self.store_mapping_data(mapping_data))
    }

    fn store_mapping_data(&mut self, mapping_data: MappingData) -> Vec<u8> {
        trace!(length = mapping_data.contribution().len(), "generated mapping data");
        self.mapping_data.insert(mapping_data).contribution().to_vec()
    }

    /// STEP3A: maps the nonce onto new domain parameters using the other party's contribution.
    #[instrument(skip_all)]
    pub fn map_generator(&mut self, peer_contribution: &[u8]) -> Result<(), Error> {
        let step = Step::MapGenerator;
        self.require_state(step, &[HandshakeState::NonceEstablished])?;
        let (Some(nonce), Some(mapping_data)) = (self.nonce.as_ref(), self.mapping_data.as_ref()) else {
            return Err(Error::State { step, state: self.state });
        };

        let mapped = self.config.mapping().map(
            self.config.role(),
            self.config.parameters(),
            self.config.cipher_suite(),
            nonce,
            mapping_data,
            peer_contribution,
        )?;

        // the mapped parameters are bound to this nonce and must not be derived again
        self.key_agreement = Some(KeyAgreementContext::new(mapped));
        self.nonce = None;
        self.mapping_data = None;
        self.transition(step, HandshakeState::Mapped);
        Ok(())
    }

    /// STEP3B: generates the ephemeral key pair over the mapped domain parameters and returns the
    /// public key.
    #[instrument(skip_all)]
    pub fn generate_ephemeral_key(&mut self) -> Result<Vec<u8>, Error> {
        let key_agreement = self.key_agreement_for_key_generation()?;
        let key_pair = EphemeralKeyPair::generate(key_agreement.parameters())?;
        self.install_key_pair(key_pair)
    }

    /// STEP3B with a known private key, for reproducing recorded protocol runs.
    pub fn generate_ephemeral_key_with_private_key(&mut self, private_key: &[u8]) -> Result<Vec<u8>, Error> {
        let key_agreement = self.key_agreement_for_key_generation()?;
        let private_key = Zeroizing::new(boxed_uint_from_be_slice(private_key));
        let key_pair = EphemeralKeyPair::from_private_key(key_agreement.parameters(), private_key)?;
        self.install_key_pair(key_pair)
    }

    fn key_agreement_for_key_generation(&self) -> Result<&KeyAgreementContext, Error> {
        let step = Step::GenerateEphemeralKey;
        self.require_state(step, &[HandshakeState::Mapped])?;
        match self.key_agreement.as_ref() {
            Some(key_agreement) if key_agreement.key_pair().is_none() => Ok(key_agreement),
            _ => Err(Error::State { step, state: self.state }),
        }
    }

    fn install_key_pair(&mut self, key_pair: EphemeralKeyPair) -> Result<Vec<u8>, Error> {
        let state = self.state;
        let Some(key_agreement) = self.key_agreement.as_mut() else {
            return Err(Error::State { step: Step::GenerateEphemeralKey, state });
        };
        Ok(key_agreement.set_key_pair(key_pair).to_vec())
    }

    /// STEP3B: computes the shared secret from our ephemeral private key and the other party's
    /// ephemeral public key.
    ///
    /// The other party's public key must differ from ours.
    #[instrument(skip_all)]
    pub fn compute_shared_secret(&mut self, peer_public_key: &[u8]) -> Result<(), Error> {
        let step = Step::ComputeSharedSecret;
        self.require_state(step, &[HandshakeState::Mapped])?;
        let state = self.state;
        let key_agreement = match self.key_agreement.as_mut() {
            Some(key_agreement) if key_agreement.key_pair().is_some() => key_agreement,
            _ => return Err(Error::State { step, state }),
        };
        key_agreement.compute_shared_secret(peer_public_key)?;
        self.transition(step, HandshakeState::KeysAgreed);
        Ok(())
    }

    /// STEP3C: derives the session keys from the shared secret.
    #[instrument(skip_all)]
    pub fn derive_keys(&mut self) -> Result<(), Error> {
        let step = Step::DeriveKeys;
        self.require_state(step, &[HandshakeState::KeysAgreed])?;
        let state = self.state;
        let cipher_suite = self.config.cipher_suite();
        let Some(key_agreement) = self.key_agreement.as_mut() else {
            return Err(Error::State { step, state });
        };
        let session_keys = key_agreement.derive_session_keys(cipher_suite)?;
        self.session_keys = Some(session_keys);
        self.transition(step, HandshakeState::SessionKeysDerived);
        Ok(())
    }

    /// STEP3D: computes our authentication token over the other party's ephemeral public key.
    ///
    /// The public key must be the one passed to [`PaceContext::compute_shared_secret`].
    #[instrument(skip_all)]
    pub fn compute_authentication_token(&self, peer_public_key: &[u8]) -> Result<Vec<u8>, Error> {
        let step = Step::ComputeAuthenticationToken;
        self.require_state(step, &[HandshakeState::SessionKeysDerived, HandshakeState::TokenExchanged])?;
        let (Some(key_agreement), Some(session_keys)) = (self.key_agreement.as_ref(), self.session_keys.as_ref()) else {
            return Err(Error::State { step, state: self.state });
        };
        let Some(agreed_public_key) = key_agreement.peer_public_key() else {
            return Err(Error::State { step, state: self.state });
        };
        if !bool::from(agreed_public_key.ct_eq(peer_public_key)) {
            return Err(Error::InvalidInput("public key differs from the one used for key agreement"));
        }
        compute_token(
            self.config.cipher_suite(),
            session_keys.mac_key(),
            peer_public_key,
            key_agreement.parameters(),
            self.config.protocol().oid(),
            self.config.tr_version(),
        )
    }

    /// STEP3D: verifies the other party's authentication token over our ephemeral public key.
    ///
    /// Returns `Ok(false)` if the token does not match; the handshake is then not complete.
    #[instrument(skip_all)]
    pub fn verify_authentication_token(&mut self, token: &[u8]) -> Result<bool, Error> {
        let step = Step::VerifyAuthenticationToken;
        self.require_state(step, &[HandshakeState::SessionKeysDerived, HandshakeState::TokenExchanged])?;
        let (Some(key_agreement), Some(session_keys)) = (self.key_agreement.as_ref(), self.session_keys.as_ref()) else {
            return Err(Error::State { step, state: self.state });
        };
        let Some(own_key_pair) = key_agreement.key_pair() else {
            return Err(Error::State { step, state: self.state });
        };

        let matches = verify_token(
            self.config.cipher_suite(),
            session_keys.mac_key(),
            own_key_pair.public_key(),
            key_agreement.parameters(),
            self.config.protocol().oid(),
            self.config.tr_version(),
            token,
        )?;
        if matches {
            if self.state != HandshakeState::TokenExchanged {
                self.transition(step, HandshakeState::TokenExchanged);
                info!(role = %self.config.role(), "PACE handshake complete");
            }
        } else {
            warn!(role = %self.config.role(), "authentication token mismatch");
        }
        Ok(matches)
    }

    /// Verifies the other party's authentication token, failing with [`Error::TokenMismatch`] if it
    /// does not match.
    pub fn finish(&mut self, token: &[u8]) -> Result<(), Error> {
        if self.verify_authentication_token(token)? {
            Ok(())
        } else {
            Err(Error::TokenMismatch)
        }
    }

    /// The session keys, available once the other party's token has been verified.
    pub fn session_keys(&self) -> Result<&SessionKeys, Error> {
        self.require_state(Step::ObtainSessionKeys, &[HandshakeState::TokenExchanged])?;
        self.session_keys.as_ref()
            .ok_or(Error::State { step: Step::ObtainSessionKeys, state: self.state })
    }

    /// Consumes the context, returning the session keys once the other party's token has been
    /// verified.
    pub fn into_session_keys(mut self) -> Result<SessionKeys, Error> {
        self.require_state(Step::ObtainSessionKeys, &[HandshakeState::TokenExchanged])?;
        self.session_keys.take()
            .ok_or(Error::State { step: Step::ObtainSessionKeys, state: self.state })
    }
}
impl fmt::Debug for PaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaceContext")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("has_shared_secret", &self.key_agreement.as_ref().is_some_and(|ka| ka.has_shared_secret()))
            .finish_non_exhaustive()
    }
}
