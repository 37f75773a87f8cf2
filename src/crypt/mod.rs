//! Cryptographic functionality.
//!
//! Big-integer and group arithmetic is performed on top of `crypto-bigint`; block ciphers, MACs and
//! hashes come from the RustCrypto crates (see [`cipher_suite`]).


pub mod cipher_suite;
pub mod dh;
pub mod elliptic;


use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crypto_bigint::{BoxedUint, NonZero};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::error;
use zeroize::Zeroizing;

use crate::crypt::dh::DiffieHellmanGroup;
use crate::crypt::elliptic::PrimeWeierstrassCurve;


/// An error raised by a cryptographic primitive.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    /// A key has the wrong length for the selected primitive.
    KeyLength { expected: usize, obtained: usize },

    /// Data to be processed is not a whole number of blocks.
    DataLength { block_size: usize, obtained: usize },

    /// An encoded group element could not be decoded or is not a member of the group.
    InvalidGroupElement,

    /// A computation resulted in the neutral element of the group.
    NeutralElement,

    /// The domain parameters are unusable.
    InvalidParameters(&'static str),

    /// The operation is not available for this combination of parameters and cipher.
    Unsupported(&'static str),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyLength { expected, obtained }
                => write!(f, "key has length {}, expected {}", obtained, expected),
            Self::DataLength { block_size, obtained }
                => write!(f, "data length {} is not a multiple of the block size {}", obtained, block_size),
            Self::InvalidGroupElement
                => write!(f, "invalid group element"),
            Self::NeutralElement
                => write!(f, "computation resulted in the neutral element"),
            Self::InvalidParameters(reason)
                => write!(f, "invalid domain parameters: {}", reason),
            Self::Unsupported(reason)
                => write!(f, "unsupported operation: {}", reason),
        }
    }
}
impl std::error::Error for Error {
}


/// Domain parameters for a key agreement.
///
/// Private keys are unsigned integers. Public keys and group elements are serialized as follows:
///
/// For classic Diffie-Hellman, as an unsigned integer in big-endian byte order, left-padded with
/// zeroes to the byte length of the prime.
///
/// For elliptic-curve Diffie-Hellman, as the uncompressed point encoding:
/// 1. the byte `0x04`
/// 2. the x coordinate as an unsigned integer in big-endian byte order
/// 3. the y coordinate as an unsigned integer in big-endian byte order
/// Both coordinates are left-padded with zeroes to the byte length of the prime.
///
/// Shared secrets are encoded as field elements: the Diffie-Hellman value or the x coordinate of
/// the elliptic-curve point, left-padded to the byte length of the prime.
#[derive(Clone, Debug)]
pub enum DomainParameters {
    DiffieHellman(DiffieHellmanGroup),
    Elliptic(PrimeWeierstrassCurve),
}
impl DomainParameters {
    /// The number of bytes a field element occupies when encoded.
    pub fn field_len_bytes(&self) -> usize {
        match self {
            Self::DiffieHellman(group) => group.prime_len_bytes(),
            Self::Elliptic(curve) => curve.field_len_bytes(),
        }
    }

    /// The number of bytes of a private key.
    pub fn private_key_len_bytes(&self) -> usize {
        match self {
            Self::DiffieHellman(group) => group.subgroup_size_bytes(),
            Self::Elliptic(curve) => curve.order_len_bytes(),
        }
    }

    /// The prime of the field the group is defined over.
    pub fn prime(&self) -> &BoxedUint {
        match self {
            Self::DiffieHellman(group) => group.prime(),
            Self::Elliptic(curve) => curve.prime(),
        }
    }

    /// The order of the (sub)group generated by the generator.
    pub fn order(&self) -> &BoxedUint {
        match self {
            Self::DiffieHellman(group) => group.subgroup_order(),
            Self::Elliptic(curve) => curve.order(),
        }
    }

    /// The encoded generator.
    pub fn encoded_generator(&self) -> Zeroizing<Vec<u8>> {
        match self {
            Self::DiffieHellman(group) => group.encode_element(group.generator()),
            Self::Elliptic(curve) => curve.encode_point(curve.generator()),
        }
    }

    /// Generates a random private key in the range `[1, order)`.
    pub fn generate_private_key(&self) -> Zeroizing<BoxedUint> {
        let order = self.order();
        loop {
            // 64 extra bits keep the modulo bias negligible
            let mut private_key_bytes = Zeroizing::new(vec![0u8; self.private_key_len_bytes() + 8]);
            OsRng.fill_bytes(private_key_bytes.as_mut_slice());
            let candidate = Zeroizing::new(boxed_uint_from_be_slice(&private_key_bytes));
            if let Some(reduced) = reduce(&candidate, order) {
                let reduced = Zeroizing::new(reduced);
                if !bool::from(reduced.is_zero()) {
                    return reduced;
                }
            }
        }
    }

    /// Calculates the public key belonging to the given private key, returning it serialized.
    pub fn calculate_public_key(&self, private_key: &BoxedUint) -> Result<Zeroizing<Vec<u8>>, Error> {
        match self {
            Self::DiffieHellman(group) => {
                let public_key = Zeroizing::new(group.calculate_public_key(private_key));
                Ok(group.encode_element(&public_key))
            },
            Self::Elliptic(curve) => {
                let public_key = curve.calculate_public_key(private_key)?;
                Ok(curve.encode_point(&public_key))
            },
        }
    }

    /// Checks whether the given bytes encode a valid public key for these domain parameters.
    pub fn validate_public_key(&self, public_key: &[u8]) -> Result<(), Error> {
        match self {
            Self::DiffieHellman(group) => group.decode_element(public_key).map(|_| ()),
            Self::Elliptic(curve) => curve.decode_point(public_key).map(|_| ()),
        }
    }

    /// Performs the key exchange using the given private key and the other party's public key,
    /// returning the encoded shared secret.
    pub fn exchange_keys(&self, private_key: &BoxedUint, other_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        match self {
            Self::DiffieHellman(group) => {
                let other_public_key = group.decode_element(other_public_key)?;
                let shared_secret = Zeroizing::new(group.diffie_hellman(private_key, &other_public_key)?);
                Ok(group.encode_element(&shared_secret))
            },
            Self::Elliptic(curve) => {
                let other_public_key = curve.decode_point(other_public_key)?;
                let shared_secret = curve.diffie_hellman(private_key, &other_public_key)?;
                Ok(uint_to_be_bytes(shared_secret.x(), curve.field_len_bytes()))
            },
        }
    }

    /// Derives new domain parameters using generic mapping.
    ///
    /// The new generator is derived from the nonce and a shared secret agreed upon from the given
    /// private key and the other party's public key: `g^nonce * h` for Diffie-Hellman and
    /// `nonce * G + H` for elliptic curves.
    pub fn derive_generic_mapping(&self, nonce: &BoxedUint, private_key: &BoxedUint, other_public_key: &[u8]) -> Result<Self, Error> {
        match self {
            Self::DiffieHellman(group) => {
                let other_public_key = group.decode_element(other_public_key)?;
                let shared_secret = Zeroizing::new(group.diffie_hellman(private_key, &other_public_key)?);
                Ok(Self::DiffieHellman(group.derive_generic_mapping(nonce, &shared_secret)?))
            },
            Self::Elliptic(curve) => {
                let other_public_key = curve.decode_point(other_public_key)?;
                let shared_secret = curve.diffie_hellman(private_key, &other_public_key)?;
                Ok(Self::Elliptic(curve.derive_generic_mapping(nonce, &shared_secret)?))
            },
        }
    }

    /// Derives new domain parameters using integrated mapping from the output of the integrated
    /// mapping pseudorandom function.
    pub fn derive_integrated_mapping(&self, pseudorandom_result: &BoxedUint) -> Result<Self, Error> {
        match self {
            Self::DiffieHellman(group)
                => Ok(Self::DiffieHellman(group.derive_integrated_mapping(pseudorandom_result)?)),
            Self::Elliptic(curve)
                => Ok(Self::Elliptic(curve.derive_integrated_mapping(pseudorandom_result)?)),
        }
    }

    /// The tag of the public key data object carrying a public value of this kind.
    pub fn public_key_tag(&self) -> u8 {
        match self {
            Self::DiffieHellman(_) => 0x84, // Diffie-Hellman public value
            Self::Elliptic(_) => 0x86, // elliptic curve point
        }
    }
}


/// Returns the domain parameters with the given standardized parameter ID.
///
/// The IDs are listed in ICAO Doc 9303 Part 11 § 9.5.1. Returns `None` for IDs that are reserved
/// or not supported.
pub fn standardized_parameters(parameter_id: u32) -> Option<Arc<DomainParameters>> {
    static TABLE: LazyLock<BTreeMap<u32, Arc<DomainParameters>>> = LazyLock::new(|| {
        let constructors: [(u32, fn() -> Result<DomainParameters, Error>); 12] = [
            (0, || dh::params::get_1024_modp_160_po().map(DomainParameters::DiffieHellman)),
            (8, || elliptic::curves::get_nist_p192().map(DomainParameters::Elliptic)),
            (9, || elliptic::curves::get_brainpool_p192r1().map(DomainParameters::Elliptic)),
            (10, || elliptic::curves::get_nist_p224().map(DomainParameters::Elliptic)),
            (11, || elliptic::curves::get_brainpool_p224r1().map(DomainParameters::Elliptic)),
            (12, || elliptic::curves::get_nist_p256().map(DomainParameters::Elliptic)),
            (13, || elliptic::curves::get_brainpool_p256r1().map(DomainParameters::Elliptic)),
            (14, || elliptic::curves::get_brainpool_p320r1().map(DomainParameters::Elliptic)),
            (15, || elliptic::curves::get_nist_p384().map(DomainParameters::Elliptic)),
            (16, || elliptic::curves::get_brainpool_p384r1().map(DomainParameters::Elliptic)),
            (17, || elliptic::curves::get_brainpool_p512r1().map(DomainParameters::Elliptic)),
            (18, || elliptic::curves::get_nist_p521().map(DomainParameters::Elliptic)),
        ];

        let mut table = BTreeMap::new();
        for (parameter_id, constructor) in constructors {
            match constructor() {
                Ok(parameters) => {
                    table.insert(parameter_id, Arc::new(parameters));
                },
                Err(e) => {
                    error!(parameter_id, error = %e, "standardized domain parameters are invalid");
                },
            }
        }
        table
    });

    TABLE.get(&parameter_id).cloned()
}


/// Returns the number of bytes required to store the given number of bits.
pub(crate) fn bytes_for_bits(bits: u32) -> usize {
    usize::try_from(bits.div_ceil(8)).unwrap_or(usize::MAX)
}


/// Returns the precision (in bits) of a `BoxedUint` large enough to hold the given number of bytes.
pub(crate) fn precision_for_len(len_bytes: usize) -> u32 {
    let bits = u32::try_from(len_bytes.saturating_mul(8)).unwrap_or(u32::MAX);
    bits.max(64).div_ceil(64) * 64
}


/// Decodes a big-endian unsigned integer into a `BoxedUint` with the given precision.
///
/// Returns `None` if the value does not fit.
pub(crate) fn uint_from_be_bytes(bytes: &[u8], bits_precision: u32) -> Option<BoxedUint> {
    let first_non_zero = bytes.iter()
        .position(|b| *b != 0x00)
        .unwrap_or(bytes.len());
    let trimmed = &bytes[first_non_zero..];
    if trimmed.is_empty() {
        return Some(BoxedUint::zero_with_precision(bits_precision));
    }
    if precision_for_len(trimmed.len()) > bits_precision {
        return None;
    }
    BoxedUint::from_be_slice(trimmed, bits_precision).ok()
}


/// Decodes a big-endian unsigned integer into a `BoxedUint` just large enough to hold it.
pub fn boxed_uint_from_be_slice(slice: &[u8]) -> BoxedUint {
    let bits = precision_for_len(slice.len());
    uint_from_be_bytes(slice, bits)
        .expect("precision derived from the slice length always suffices")
}


/// Encodes an unsigned integer as a big-endian byte string of exactly the given length.
///
/// Excess leading zero bytes are dropped; the value must fit into `len` bytes.
pub(crate) fn uint_to_be_bytes(value: &BoxedUint, len: usize) -> Zeroizing<Vec<u8>> {
    let full = Zeroizing::new(value.to_be_bytes().into_vec());
    let mut ret = Zeroizing::new(Vec::with_capacity(len));
    if full.len() >= len {
        debug_assert!(full[..full.len() - len].iter().all(|b| *b == 0x00));
        ret.extend_from_slice(&full[full.len() - len..]);
    } else {
        ret.resize(len - full.len(), 0x00);
        ret.extend_from_slice(&full);
    }
    ret
}


/// Changes the precision of a `BoxedUint`, returning `None` if the value does not fit.
pub(crate) fn resize(value: &BoxedUint, bits_precision: u32) -> Option<BoxedUint> {
    if value.bits_precision() == bits_precision {
        Some(value.clone())
    } else if value.bits_precision() < bits_precision {
        Some(value.widen(bits_precision))
    } else {
        let bytes = Zeroizing::new(value.to_be_bytes().into_vec());
        uint_from_be_bytes(&bytes, bits_precision)
    }
}


/// Reduces `value` modulo `modulus`, returning the result with the precision of `modulus`.
pub(crate) fn reduce(value: &BoxedUint, modulus: &BoxedUint) -> Option<BoxedUint> {
    let bits_precision = value.bits_precision().max(modulus.bits_precision());
    let wide_value = Zeroizing::new(resize(value, bits_precision)?);
    let wide_modulus = NonZero::new(resize(modulus, bits_precision)?).into_option()?;
    let remainder = Zeroizing::new(wide_value.rem(&wide_modulus));
    resize(&remainder, modulus.bits_precision())
}
