//! Key derivation function for PACE.
//!
//! All keys are derived the same way:
//! ```plain
//! keydata = hash(seed || nonce || counter)[0..key_size]
//! ```
//! where `nonce` is optional, `counter` is a big-endian 32-bit integer and `hash` is SHA-1 for 3DES
//! and AES-128 or SHA-256 for AES-192 and AES-256.
//!
//! For 3DES, `keydata` is the two-key EDE key `K1 || K2`. Parity bits are not adjusted.
//!
//! Specified in ICAO Doc 9303 Part 11 § 9.7.1.


use std::fmt;

use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::crypt::cipher_suite::CipherSuite;
use crate::pace::Error;
use crate::pace::secret::PaceSecret;


/// Counter value for deriving an encryption key.
pub const COUNTER_ENCRYPTION: u32 = 1;

/// Counter value for deriving a MAC key.
pub const COUNTER_MAC: u32 = 2;

/// Counter value for deriving a key from a password.
pub const COUNTER_PASSWORD: u32 = 3;


/// Derives a key for the given cipher suite.
pub fn derive_key(cipher_suite: CipherSuite, seed: &[u8], nonce: Option<&[u8]>, counter: u32) -> Result<Zeroizing<Vec<u8>>, Error> {
    if seed.is_empty() {
        return Err(Error::InvalidInput("key derivation seed is empty"));
    }
    let counter_bytes = counter.to_be_bytes();
    let mut keydata = match nonce {
        Some(nonce) => cipher_suite.hash(&[seed, nonce, &counter_bytes]),
        None => cipher_suite.hash(&[seed, &counter_bytes]),
    };
    keydata.truncate(cipher_suite.cipher_key_size());
    Ok(keydata)
}


/// Derives the key `K_pi` used to encrypt the nonce from the shared secret.
pub fn derive_password_key(cipher_suite: CipherSuite, secret: &PaceSecret) -> Result<Zeroizing<Vec<u8>>, Error> {
    derive_key(cipher_suite, secret.encoded(), None, COUNTER_PASSWORD)
}


/// Derives the session keys from the shared secret of the ephemeral key agreement.
pub fn derive_session_keys(cipher_suite: CipherSuite, shared_secret: &[u8], nonce: Option<&[u8]>) -> Result<SessionKeys, Error> {
    let encryption = derive_key(cipher_suite, shared_secret, nonce, COUNTER_ENCRYPTION)?;
    let mac = derive_key(cipher_suite, shared_secret, nonce, COUNTER_MAC)?;
    Ok(SessionKeys {
        cipher_suite,
        encryption,
        mac,
    })
}


/// The keys protecting the session established by PACE.
#[derive(Clone, Eq, PartialEq, ZeroizeOnDrop)]
pub struct SessionKeys {
    #[zeroize(skip)]
    cipher_suite: CipherSuite,
    encryption: Zeroizing<Vec<u8>>,
    mac: Zeroizing<Vec<u8>>,
}
impl SessionKeys {
    /// The cipher suite these keys are intended for.
    pub fn cipher_suite(&self) -> CipherSuite { self.cipher_suite }

    /// The encryption key `K_enc`.
    pub fn encryption_key(&self) -> &[u8] { &self.encryption }

    /// The message authentication key `K_mac`.
    pub fn mac_key(&self) -> &[u8] { &self.mac }
}
impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("cipher_suite", &self.cipher_suite)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_icao_doc9303_part11_secg1_password_key() {
        let secret = PaceSecret::from_mrz_key(b"T22000129364081251010318").unwrap();
        let key = derive_password_key(CipherSuite::Aes128CbcCmac, &secret).unwrap();
        assert_eq!(key.as_slice(), &hex!("89DED1B2 6624EC1E 634C1989 302849DD"));
    }

    #[test]
    fn test_icao_doc9303_part11_secg1_session_keys() {
        let shared_secret = hex!("28768D20 701247DA E81804C9 E780EDE5 82A9996D B4A31502 0B273319 7DB84925");
        let keys = derive_session_keys(CipherSuite::Aes128CbcCmac, &shared_secret, None).unwrap();
        assert_eq!(keys.encryption_key(), &hex!("F5F0E35C 0D7161EE 6724EE51 3A0D9A7F"));
        assert_eq!(keys.mac_key(), &hex!("FE251C78 58B356B2 4514B3BD 5F4297D1"));
    }

    #[test]
    fn test_key_lengths() {
        let cases = [
            (CipherSuite::TripleDesCbcCbc, 16),
            (CipherSuite::Aes128CbcCmac, 16),
            (CipherSuite::Aes192CbcCmac, 24),
            (CipherSuite::Aes256CbcCmac, 32),
        ];
        for (suite, key_size) in cases {
            let first = derive_key(suite, b"seed", Some(b"nonce"), COUNTER_ENCRYPTION).unwrap();
            let second = derive_key(suite, b"seed", Some(b"nonce"), COUNTER_ENCRYPTION).unwrap();
            assert_eq!(first.len(), key_size);
            assert_eq!(first, second);

            let other_counter = derive_key(suite, b"seed", Some(b"nonce"), COUNTER_MAC).unwrap();
            assert_ne!(first, other_counter);
            let without_nonce = derive_key(suite, b"seed", None, COUNTER_ENCRYPTION).unwrap();
            assert_ne!(first, without_nonce);
        }
    }

    #[test]
    fn test_empty_seed() {
        assert!(matches!(
            derive_key(CipherSuite::Aes256CbcCmac, b"", None, COUNTER_PASSWORD),
            Err(Error::InvalidInput(_)),
        ));
    }
}
