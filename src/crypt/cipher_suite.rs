//! Cipher, MAC and hash combinations used by PACE.


use aes::{Aes128, Aes192, Aes256};
use cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use cipher::block_padding::NoPadding;
use cmac::{Cmac, Mac};
use crypto_bigint::BoxedUint;
use des::TdesEde2;
use digest::Digest;
use hex_literal::hex;
use retail_mac::RetailMac;
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypt::{boxed_uint_from_be_slice, reduce, Error};


const IM_C0_128: [u8; 16] = hex!("a668892a7c41e3ca739f40b057d85904");
const IM_C1_128: [u8; 16] = hex!("a4e136ac725f738b01c1f60217c188ad");
const IM_C0_256: [u8; 32] = hex!("d463d65234124ef7897054986dca0a174e28df758cbaa03f240616414d5a1676");
const IM_C1_256: [u8; 32] = hex!("54bd7255f0aaf831bec3423fcf39d69b6cbf066677d0faae5aadd99df8e53517");


/// The hash function used by the key derivation function.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KdfHash {
    Sha1,
    Sha256,
}


/// A combination of cipher, MAC and KDF (key derivation function).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CipherSuite {
    /// Two-key 3DES in CBC mode, retail MAC, SHA-1 KDF.
    ///
    /// 3DES is used in EDE two-key mode:
    /// ```plain
    /// encrypt((K1, K2), D) = encrypt(K1, decrypt(K2, encrypt(K1, D)))
    /// ```
    TripleDesCbcCbc,

    /// AES-128 in CBC mode, AES-CMAC, SHA-1 KDF.
    Aes128CbcCmac,

    /// AES-192 in CBC mode, AES-CMAC, SHA-256 KDF.
    Aes192CbcCmac,

    /// AES-256 in CBC mode, AES-CMAC, SHA-256 KDF.
    Aes256CbcCmac,
}
impl CipherSuite {
    /// Size of the cipher key in bytes.
    pub const fn cipher_key_size(self) -> usize {
        match self {
            Self::TripleDesCbcCbc => 16,
            Self::Aes128CbcCmac => 16,
            Self::Aes192CbcCmac => 24,
            Self::Aes256CbcCmac => 32,
        }
    }

    /// Block size of the cipher in bytes.
    pub const fn cipher_block_size(self) -> usize {
        match self {
            Self::TripleDesCbcCbc => 8,
            Self::Aes128CbcCmac|Self::Aes192CbcCmac|Self::Aes256CbcCmac => 16,
        }
    }

    /// Block size of the MAC input in bytes.
    ///
    /// The retail MAC requires its input to be padded to a multiple of this size. CMAC performs its
    /// own padding, which is signalled by a block size of 1.
    pub const fn mac_block_size(self) -> usize {
        match self {
            Self::TripleDesCbcCbc => 8,
            Self::Aes128CbcCmac|Self::Aes192CbcCmac|Self::Aes256CbcCmac => 1,
        }
    }

    /// The hash function of the key derivation function.
    pub const fn kdf_hash(self) -> KdfHash {
        match self {
            Self::TripleDesCbcCbc|Self::Aes128CbcCmac => KdfHash::Sha1,
            Self::Aes192CbcCmac|Self::Aes256CbcCmac => KdfHash::Sha256,
        }
    }

    /// Hashes the concatenation of the given parts with the KDF hash function.
    pub fn hash(self, parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        fn hash_with<D: Digest>(parts: &[&[u8]]) -> Zeroizing<Vec<u8>> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            Zeroizing::new(hasher.finalize().to_vec())
        }

        match self.kdf_hash() {
            KdfHash::Sha1 => hash_with::<Sha1>(parts),
            KdfHash::Sha256 => hash_with::<Sha256>(parts),
        }
    }

    fn check_key(self, key: &[u8]) -> Result<(), Error> {
        if key.len() != self.cipher_key_size() {
            return Err(Error::KeyLength { expected: self.cipher_key_size(), obtained: key.len() });
        }
        Ok(())
    }

    fn check_blocks(self, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() || data.len() % self.cipher_block_size() != 0 {
            return Err(Error::DataLength { block_size: self.cipher_block_size(), obtained: data.len() });
        }
        Ok(())
    }

    /// Encrypts block-aligned data in-place in CBC mode without padding.
    pub fn encrypt_blocks(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), Error> {
        self.check_key(key)?;
        self.check_blocks(data)?;
        match self {
            Self::TripleDesCbcCbc => cbc_encrypt::<TdesEde2>(key, iv, data),
            Self::Aes128CbcCmac => cbc_encrypt::<Aes128>(key, iv, data),
            Self::Aes192CbcCmac => cbc_encrypt::<Aes192>(key, iv, data),
            Self::Aes256CbcCmac => cbc_encrypt::<Aes256>(key, iv, data),
        }
    }

    /// Decrypts block-aligned data in-place in CBC mode without removing padding.
    pub fn decrypt_blocks(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), Error> {
        self.check_key(key)?;
        self.check_blocks(data)?;
        match self {
            Self::TripleDesCbcCbc => cbc_decrypt::<TdesEde2>(key, iv, data),
            Self::Aes128CbcCmac => cbc_decrypt::<Aes128>(key, iv, data),
            Self::Aes192CbcCmac => cbc_decrypt::<Aes192>(key, iv, data),
            Self::Aes256CbcCmac => cbc_decrypt::<Aes256>(key, iv, data),
        }
    }

    /// Encrypts a single-block nonce with a zero IV.
    pub fn encrypt_nonce(self, key: &[u8], nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        if nonce.len() != self.cipher_block_size() {
            return Err(Error::DataLength { block_size: self.cipher_block_size(), obtained: nonce.len() });
        }
        let zero_iv = vec![0u8; self.cipher_block_size()];
        let mut buf = Zeroizing::new(nonce.to_vec());
        self.encrypt_blocks(key, &zero_iv, &mut buf)?;
        Ok(buf)
    }

    /// Decrypts a single-block nonce with a zero IV.
    pub fn decrypt_nonce(self, key: &[u8], encrypted_nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        if encrypted_nonce.len() != self.cipher_block_size() {
            return Err(Error::DataLength { block_size: self.cipher_block_size(), obtained: encrypted_nonce.len() });
        }
        let zero_iv = vec![0u8; self.cipher_block_size()];
        let mut buf = Zeroizing::new(encrypted_nonce.to_vec());
        self.decrypt_blocks(key, &zero_iv, &mut buf)?;
        Ok(buf)
    }

    /// Generates an 8-byte MAC (message authentication code) for the given data.
    ///
    /// For 3DES, the data must already be padded to a multiple of [`CipherSuite::mac_block_size`].
    pub fn mac_padded_data(self, key: &[u8], data: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.check_key(key)?;
        match self {
            Self::TripleDesCbcCbc => retail_mac(key, data),
            Self::Aes128CbcCmac => cmac_truncated(
                <Cmac<Aes128> as Mac>::new_from_slice(key)
                    .map_err(|_| Error::KeyLength { expected: 16, obtained: key.len() })?,
                data,
            ),
            Self::Aes192CbcCmac => cmac_truncated(
                <Cmac<Aes192> as Mac>::new_from_slice(key)
                    .map_err(|_| Error::KeyLength { expected: 24, obtained: key.len() })?,
                data,
            ),
            Self::Aes256CbcCmac => cmac_truncated(
                <Cmac<Aes256> as Mac>::new_from_slice(key)
                    .map_err(|_| Error::KeyLength { expected: 32, obtained: key.len() })?,
                data,
            ),
        }
    }

    /// The pseudorandom function used by integrated mapping.
    ///
    /// `chip_nonce` (s) is a single cipher block, `terminal_nonce` (t) is as long as a cipher key.
    /// The result is reduced modulo `prime`.
    pub fn integrated_mapping_pseudorandom_function(
        self,
        chip_nonce: &[u8],
        terminal_nonce: &[u8],
        prime: &BoxedUint,
    ) -> Result<Zeroizing<BoxedUint>, Error> {
        let (c0, c1) = match self {
            Self::TripleDesCbcCbc => return Err(Error::Unsupported("integrated mapping is not defined for 3DES")),
            Self::Aes128CbcCmac => (&IM_C0_128[..], &IM_C1_128[..]),
            Self::Aes192CbcCmac|Self::Aes256CbcCmac => (&IM_C0_256[..], &IM_C1_256[..]),
        };
        self.check_key(terminal_nonce)?;
        if chip_nonce.len() != self.cipher_block_size() {
            return Err(Error::DataLength { block_size: self.cipher_block_size(), obtained: chip_nonce.len() });
        }

        let zero_iv = vec![0u8; self.cipher_block_size()];
        let key_size = self.cipher_key_size();

        // k0 = E(t, s)
        let mut key = Zeroizing::new(chip_nonce.to_vec());
        self.encrypt_blocks(terminal_nonce, &zero_iv, &mut key)?;

        let chip_nonce_bits = 8 * chip_nonce.len();
        let required_bits = usize::try_from(prime.bits()).unwrap_or(usize::MAX).saturating_add(64);
        let mut output = Zeroizing::new(Vec::new());
        let mut rounds = 0;
        while rounds * chip_nonce_bits < required_bits {
            // the first round key is shorter than the cipher key for AES-192 and AES-256
            let mut round_key = Zeroizing::new(key.to_vec());
            round_key.resize(key_size, 0x00);

            // k_{i+1} = E(k_i, c0)
            key = Zeroizing::new(c0.to_vec());
            self.encrypt_blocks(&round_key, &zero_iv, &mut key)?;

            // x_i = E(k_i, c1)
            let mut block = Zeroizing::new(c1.to_vec());
            self.encrypt_blocks(&round_key, &zero_iv, &mut block)?;
            output.extend_from_slice(&block);

            rounds += 1;
        }

        let output_num = Zeroizing::new(boxed_uint_from_be_slice(&output));
        let reduced = reduce(&output_num, prime)
            .ok_or(Error::InvalidParameters("prime is zero"))?;
        Ok(Zeroizing::new(reduced))
    }
}


fn cbc_encrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), Error>
where
    C: BlockCipher + BlockEncryptMut + KeyInit,
{
    let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| Error::KeyLength { expected: C::key_size(), obtained: key.len() })?;
    let data_len = data.len();
    encryptor.encrypt_padded_mut::<NoPadding>(data, data_len)
        .map_err(|_| Error::DataLength { block_size: C::block_size(), obtained: data_len })?;
    Ok(())
}


fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), Error>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| Error::KeyLength { expected: C::key_size(), obtained: key.len() })?;
    let data_len = data.len();
    decryptor.decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| Error::DataLength { block_size: C::block_size(), obtained: data_len })?;
    Ok(())
}


/// ISO/IEC 9797-1 MAC algorithm 3 with DES keyed with `K1 || K2`.
fn retail_mac(key: &[u8], padded_data: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
    if padded_data.is_empty() || padded_data.len() % 8 != 0 {
        return Err(Error::DataLength { block_size: 8, obtained: padded_data.len() });
    }
    use digest_retail::{KeyInit as RetailKeyInit, Mac as RetailMacTrait};
    let mut mac = <RetailMac<des_retail::Des> as RetailKeyInit>::new_from_slice(key)
        .map_err(|_| Error::KeyLength { expected: 16, obtained: key.len() })?;
    RetailMacTrait::update(&mut mac, padded_data);
    Ok(Zeroizing::new(RetailMacTrait::finalize(mac).into_bytes().to_vec()))
}


fn cmac_truncated<M: Mac>(mut mac: M, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
    mac.update(data);
    let full_mac = mac.finalize().into_bytes();
    Ok(Zeroizing::new(full_mac[..8].to_vec()))
}


#[cfg(test)]
mod tests {
    use super::CipherSuite;
    use crate::crypt::{boxed_uint_from_be_slice, uint_to_be_bytes};
    use crate::crypt::elliptic::curves::get_brainpool_p256r1;
    use hex_literal::hex;

    #[test]
    fn test_nonce_round_trip_lengths() {
        for suite in [CipherSuite::TripleDesCbcCbc, CipherSuite::Aes128CbcCmac, CipherSuite::Aes192CbcCmac, CipherSuite::Aes256CbcCmac] {
            let key = vec![0x5A; suite.cipher_key_size()];
            let nonce = vec![0xC3; suite.cipher_block_size()];
            let encrypted = suite.encrypt_nonce(&key, &nonce).unwrap();
            assert_eq!(encrypted.len(), suite.cipher_block_size());
            assert_ne!(encrypted.as_slice(), nonce.as_slice());
            let decrypted = suite.decrypt_nonce(&key, &encrypted).unwrap();
            assert_eq!(decrypted.as_slice(), nonce.as_slice());

            assert!(suite.encrypt_nonce(&key, &nonce[1..]).is_err());
            assert!(suite.decrypt_nonce(&key[1..], &encrypted).is_err());
        }
    }

    #[test]
    fn test_icao_doc9303_part11_secg1_nonce() {
        // K_pi derived from the MRZ in Appendix G.1
        let key = hex!("89DED1B2 6624EC1E 634C1989 302849DD");
        let decrypted = CipherSuite::Aes128CbcCmac.decrypt_nonce(&key, &hex!("95A3A016 522EE98D 01E76CB6 B98B42C3")).unwrap();
        assert_eq!(decrypted.as_slice(), &hex!("3F00C4D3 9D153F2B 2A214A07 8D899B22"));
    }

    #[test]
    fn test_retail_mac() {
        // ICAO Doc 9303 Part 11 Appendix D.3 (mutual authentication of BAC)
        let key = hex!("7962D9EC E03D1ACD 4C76089D CE131543");
        let padded_data = hex!("
            72C29C23 71CC9BDB 65B779B8 E8D37B29 ECC154AA 56A8799F AE2F498F 76ED92F2
            80000000 00000000
        ");
        let mac = CipherSuite::TripleDesCbcCbc.mac_padded_data(&key, &padded_data).unwrap();
        assert_eq!(mac.as_slice(), &hex!("5F1448EE A8AD90A7"));

        assert!(CipherSuite::TripleDesCbcCbc.mac_padded_data(&key, &padded_data[..30]).is_err());
    }

    #[test]
    fn test_icao_doc9303_part11_sech1_pseudorandom_function() {
        let curve = get_brainpool_p256r1().unwrap();
        let chip_nonce = hex!("2923BE84 E16CD6AE 529049F1 F1BBE9EB");
        let terminal_nonce = hex!("5DD4CBFC 96F5453B 130D890A 1CDBAE32");
        let result = CipherSuite::Aes128CbcCmac
            .integrated_mapping_pseudorandom_function(&chip_nonce, &terminal_nonce, curve.prime())
            .unwrap();
        assert_eq!(
            uint_to_be_bytes(&result, 32).as_slice(),
            &hex!("A2F8FF2D F50E52C6 599F386A DCB595D2 29F6A167 ADE2BE5F 2C3296AD D5B7430E"),
        );
    }

    #[test]
    fn test_pseudorandom_function_rejects_3des() {
        let prime = boxed_uint_from_be_slice(&hex!("FFFFFFFB"));
        assert!(CipherSuite::TripleDesCbcCbc
            .integrated_mapping_pseudorandom_function(&[0u8; 8], &[0u8; 16], &prime)
            .is_err());
    }
}
