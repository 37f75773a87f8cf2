//! Authentication tokens exchanged in the last step of PACE.
//!
//! A token is the MAC, keyed with `K_mac`, over a public key data object wrapping the other
//! party's ephemeral public key:
//! ```plain
//! 7F49 L {
//!     06 L <protocol OID>
//!     [TR-03110 v2.01 only: domain parameters]
//!     84/86 L <public key>
//! }
//! ```
//! Tokens are always eight bytes long. Specified in ICAO Doc 9303 Part 11 § 4.4.3.4 and
//! BSI TR-03110 Part 3 § D.3.


use block_padding::{Iso7816, RawPadding};
use crypto_bigint::BoxedUint;
use rasn::types::Oid;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::crypt::{self, DomainParameters};
use crate::crypt::cipher_suite::CipherSuite;
use crate::der_util::{encode_tlv, oid_to_der_bytes};
use crate::pace::Error;
use crate::pace::config::TrVersion;


/// The length of an authentication token in bytes.
pub const TOKEN_LENGTH: usize = 8;


/// Encodes the public key data object that an authentication token is computed over.
pub fn encode_public_key_data_object(
    protocol: &Oid,
    parameters: &DomainParameters,
    public_key: &[u8],
    tr_version: TrVersion,
) -> Result<Vec<u8>, Error> {
    if public_key.is_empty() {
        return Err(Error::TokenFormat("public key is empty"));
    }
    let oid_bytes = oid_to_der_bytes(protocol)
        .ok_or(Error::TokenFormat("protocol object identifier cannot be encoded"))?;

    let mut inner = Vec::new();
    encode_tlv(&mut inner, &[0x06], &oid_bytes);
    match (tr_version, parameters) {
        (TrVersion::V2_02, _) => {},
        (TrVersion::V2_01, DomainParameters::DiffieHellman(group)) => {
            encode_tlv(&mut inner, &[0x81], &unsigned_integer_bytes(group.prime()));
            encode_tlv(&mut inner, &[0x82], &unsigned_integer_bytes(group.subgroup_order()));
            encode_tlv(&mut inner, &[0x83], &unsigned_integer_bytes(group.generator()));
        },
        (TrVersion::V2_01, DomainParameters::Elliptic(curve)) => {
            encode_tlv(&mut inner, &[0x81], &unsigned_integer_bytes(curve.prime()));
            encode_tlv(&mut inner, &[0x82], &unsigned_integer_bytes(curve.coefficient_a()));
            encode_tlv(&mut inner, &[0x83], &unsigned_integer_bytes(curve.coefficient_b()));
            encode_tlv(&mut inner, &[0x84], &curve.encode_point(curve.generator()));
            encode_tlv(&mut inner, &[0x85], &unsigned_integer_bytes(curve.order()));
        },
    }
    encode_tlv(&mut inner, &[parameters.public_key_tag()], public_key);
    if let (TrVersion::V2_01, DomainParameters::Elliptic(curve)) = (tr_version, parameters) {
        encode_tlv(&mut inner, &[0x87], &[curve.cofactor()]);
    }

    let mut data_object = Vec::with_capacity(inner.len() + 4);
    encode_tlv(&mut data_object, &[0x7F, 0x49], &inner);
    Ok(data_object)
}


/// Computes the authentication token over the given public key.
///
/// The terminal computes its token over the chip's public key and vice versa.
pub fn compute_token(
    cipher_suite: CipherSuite,
    mac_key: &[u8],
    public_key: &[u8],
    parameters: &DomainParameters,
    protocol: &Oid,
    tr_version: TrVersion,
) -> Result<Vec<u8>, Error> {
    let mut data = Zeroizing::new(encode_public_key_data_object(protocol, parameters, public_key, tr_version)?);
    let block_size = cipher_suite.mac_block_size();
    if block_size > 1 {
        let unpadded_len = data.len();
        data.resize((unpadded_len / block_size + 1) * block_size, 0x00);
        Iso7816::raw_pad(data.as_mut_slice(), unpadded_len);
    }
    let mac = cipher_suite.mac_padded_data(mac_key, &data)
        .map_err(|e| match e {
            crypt::Error::KeyLength { .. } => Error::InvalidInput("MAC key has the wrong length"),
            _ => Error::TokenFormat("MAC could not be computed"),
        })?;
    Ok(mac[..TOKEN_LENGTH].to_vec())
}


/// Verifies an authentication token computed by the other party over our public key.
///
/// Returns `Ok(false)` if the token does not match. The comparison is constant-time.
pub fn verify_token(
    cipher_suite: CipherSuite,
    mac_key: &[u8],
    own_public_key: &[u8],
    parameters: &DomainParameters,
    protocol: &Oid,
    tr_version: TrVersion,
    token: &[u8],
) -> Result<bool, Error> {
    if token.len() != TOKEN_LENGTH {
        return Err(Error::TokenFormat("token has the wrong length"));
    }
    let expected = compute_token(cipher_suite, mac_key, own_public_key, parameters, protocol, tr_version)?;
    Ok(bool::from(expected.ct_eq(token)))
}


/// Big-endian bytes of an unsigned integer without leading zeroes.
fn unsigned_integer_bytes(value: &BoxedUint) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let leading_zeroes = bytes.iter().take_while(|b| **b == 0x00).count();
    if leading_zeroes == bytes.len() {
        vec![0x00]
    } else {
        bytes[leading_zeroes..].to_vec()
    }
}
