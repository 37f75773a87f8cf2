//! Classic Diffie-Hellman over a prime-order subgroup of the multiplicative group modulo a prime.


pub mod params;


use crypto_bigint::{BoxedUint, NonZero, Odd};
use crypto_bigint::modular::{BoxedMontyForm, BoxedMontyParams};
use zeroize::Zeroizing;

use crate::crypt::{bytes_for_bits, reduce, resize, uint_from_be_bytes, uint_to_be_bytes, Error};


/// A Diffie-Hellman group: a prime modulus, a generator and the order of the subgroup spanned by
/// the generator.
#[derive(Clone, Debug)]
pub struct DiffieHellmanGroup {
    prime: BoxedUint,
    generator: BoxedUint,
    subgroup_order: BoxedUint,
    monty_params: BoxedMontyParams,
}
impl DiffieHellmanGroup {
    /// Creates a new Diffie-Hellman group, checking its basic consistency.
    pub fn new(prime: BoxedUint, generator: BoxedUint, subgroup_order: BoxedUint) -> Result<Self, Error> {
        let odd_prime = Odd::new(prime.clone()).into_option()
            .ok_or(Error::InvalidParameters("prime is even"))?;
        let monty_params = BoxedMontyParams::new(odd_prime);
        let generator = resize(&generator, prime.bits_precision())
            .ok_or(Error::InvalidParameters("generator is larger than the prime"))?;
        if bool::from(subgroup_order.is_zero()) {
            return Err(Error::InvalidParameters("subgroup order is zero"));
        }

        let group = Self {
            prime,
            generator,
            subgroup_order,
            monty_params,
        };
        if !group.is_valid_element(&group.generator) {
            return Err(Error::InvalidParameters("generator is out of range"));
        }
        Ok(group)
    }

    /// Returns a copy of this group with a different generator.
    fn with_generator(&self, generator: BoxedUint) -> Result<Self, Error> {
        if !self.is_valid_element(&generator) {
            return Err(Error::NeutralElement);
        }
        Ok(Self {
            prime: self.prime.clone(),
            generator,
            subgroup_order: self.subgroup_order.clone(),
            monty_params: self.monty_params.clone(),
        })
    }

    pub fn prime(&self) -> &BoxedUint { &self.prime }
    pub fn generator(&self) -> &BoxedUint { &self.generator }
    pub fn subgroup_order(&self) -> &BoxedUint { &self.subgroup_order }

    /// The number of bytes of an encoded group element.
    pub fn prime_len_bytes(&self) -> usize {
        bytes_for_bits(self.prime.bits())
    }

    /// The number of bytes of a private key.
    pub fn subgroup_size_bytes(&self) -> usize {
        bytes_for_bits(self.subgroup_order.bits())
    }

    fn to_monty(&self, value: &BoxedUint) -> Option<BoxedMontyForm> {
        let value = resize(value, self.prime.bits_precision())?;
        Some(BoxedMontyForm::new(value, self.monty_params.clone()))
    }

    /// Calculates `base ** exponent mod prime`.
    fn pow(&self, base: &BoxedUint, exponent: &BoxedUint) -> Option<BoxedUint> {
        let base_monty = self.to_monty(base)?;
        Some(base_monty.pow(exponent).retrieve())
    }

    /// Whether the value lies within `(1, prime - 1)` and in the subgroup, i.e.
    /// `value ** subgroup_order = 1 mod prime`.
    ///
    /// This excludes the elements of order 1 and 2, elements of the other subgroups and values not
    /// reduced modulo the prime.
    pub fn is_valid_element(&self, value: &BoxedUint) -> bool {
        let Some(value) = resize(value, self.prime.bits_precision()) else {
            return false;
        };
        let one = BoxedUint::one_with_precision(self.prime.bits_precision());
        let prime_minus_one = self.prime.wrapping_sub(&one);
        if value <= one || value >= prime_minus_one {
            return false;
        }
        self.pow(&value, &self.subgroup_order)
            .is_some_and(|power| power == one)
    }

    /// Decodes an element of this group from its big-endian representation, verifying that it is
    /// in range.
    pub fn decode_element(&self, bytes: &[u8]) -> Result<BoxedUint, Error> {
        if bytes.len() != self.prime_len_bytes() {
            return Err(Error::InvalidGroupElement);
        }
        let value = uint_from_be_bytes(bytes, self.prime.bits_precision())
            .ok_or(Error::InvalidGroupElement)?;
        if !self.is_valid_element(&value) {
            return Err(Error::InvalidGroupElement);
        }
        Ok(value)
    }

    /// Encodes an element of this group as a big-endian byte string as long as the prime.
    pub fn encode_element(&self, value: &BoxedUint) -> Zeroizing<Vec<u8>> {
        uint_to_be_bytes(value, self.prime_len_bytes())
    }

    /// Calculates the public key `generator ** private_key mod prime`.
    pub fn calculate_public_key(&self, private_key: &BoxedUint) -> BoxedUint {
        self.pow(&self.generator, private_key)
            .expect("generator has the precision of the prime")
    }

    /// Calculates the shared secret `other_public_key ** private_key mod prime`.
    pub fn diffie_hellman(&self, private_key: &BoxedUint, other_public_key: &BoxedUint) -> Result<BoxedUint, Error> {
        if !self.is_valid_element(other_public_key) {
            return Err(Error::InvalidGroupElement);
        }
        let shared_secret = self.pow(other_public_key, private_key)
            .ok_or(Error::InvalidGroupElement)?;
        if !self.is_valid_element(&shared_secret) {
            return Err(Error::NeutralElement);
        }
        Ok(shared_secret)
    }

    /// Derives a group with the generator `generator ** nonce * shared_secret mod prime`.
    pub fn derive_generic_mapping(&self, nonce: &BoxedUint, shared_secret: &BoxedUint) -> Result<Self, Error> {
        let generator_monty = self.to_monty(&self.generator)
            .ok_or(Error::InvalidParameters("generator is larger than the prime"))?;
        let secret_monty = self.to_monty(shared_secret)
            .ok_or(Error::InvalidGroupElement)?;
        let new_generator = (&generator_monty.pow(nonce) * &secret_monty).retrieve();
        self.with_generator(new_generator)
    }

    /// Derives a group with the generator `pseudorandom ** ((prime - 1) / subgroup_order) mod prime`.
    pub fn derive_integrated_mapping(&self, pseudorandom: &BoxedUint) -> Result<Self, Error> {
        let precision = self.prime.bits_precision();
        let one = BoxedUint::one_with_precision(precision);
        let prime_minus_one = self.prime.wrapping_sub(&one);
        let order = resize(&self.subgroup_order, precision)
            .ok_or(Error::InvalidParameters("subgroup order is larger than the prime"))?;
        let order = NonZero::new(order).into_option()
            .ok_or(Error::InvalidParameters("subgroup order is zero"))?;
        let (cofactor, _) = prime_minus_one.div_rem(&order);

        let reduced = reduce(pseudorandom, &self.prime)
            .ok_or(Error::InvalidGroupElement)?;
        let new_generator = self.pow(&reduced, &cofactor)
            .ok_or(Error::InvalidGroupElement)?;
        self.with_generator(new_generator)
    }
}


#[cfg(test)]
mod tests {
    use super::DiffieHellmanGroup;
    use crate::crypt::boxed_uint_from_be_slice;
    use crate::crypt::dh::params::get_1024_modp_160_po;
    use hex_literal::hex;

    #[test]
    fn small_group_example() {
        // 4 generates the subgroup of order 11 modulo 23
        let group = DiffieHellmanGroup::new(
            boxed_uint_from_be_slice(&[23]),
            boxed_uint_from_be_slice(&[4]),
            boxed_uint_from_be_slice(&[11]),
        ).unwrap();

        let alice_private = boxed_uint_from_be_slice(&[3]);
        let bob_private = boxed_uint_from_be_slice(&[7]);
        let alice_public = group.calculate_public_key(&alice_private);
        let bob_public = group.calculate_public_key(&bob_private);
        assert_eq!(group.encode_element(&alice_public).as_slice(), &[18]); // 4**3 = 64 = 18
        assert_eq!(group.encode_element(&bob_public).as_slice(), &[8]); // 4**7 = 16384 = 8

        let alice_secret = group.diffie_hellman(&alice_private, &bob_public).unwrap();
        let bob_secret = group.diffie_hellman(&bob_private, &alice_public).unwrap();
        assert_eq!(alice_secret, bob_secret);
        assert_eq!(group.encode_element(&alice_secret).as_slice(), &[6]); // 4**21 = 6
    }

    #[test]
    fn rejects_elements_outside_subgroup() {
        let group = DiffieHellmanGroup::new(
            boxed_uint_from_be_slice(&[23]),
            boxed_uint_from_be_slice(&[4]),
            boxed_uint_from_be_slice(&[11]),
        ).unwrap();
        let private_key = boxed_uint_from_be_slice(&[3]);

        // 5 has order 22 modulo 23
        let outsider = boxed_uint_from_be_slice(&[5]);
        assert!(!group.is_valid_element(&outsider));
        assert!(group.decode_element(&[5]).is_err());
        assert!(group.diffie_hellman(&private_key, &outsider).is_err());

        // 9 = 4**4 is a member
        assert!(group.decode_element(&[9]).is_ok());

        // 5 does not generate the subgroup either
        assert!(DiffieHellmanGroup::new(
            boxed_uint_from_be_slice(&[23]),
            boxed_uint_from_be_slice(&[5]),
            boxed_uint_from_be_slice(&[11]),
        ).is_err());
    }

    #[test]
    fn rejects_degenerate_public_keys() {
        let group = get_1024_modp_160_po().unwrap();
        let private_key = boxed_uint_from_be_slice(&hex!("5265030F751F4AD18B08AC565FC7AC952E41618D"));

        let mut one = vec![0u8; 128];
        one[127] = 0x01;
        assert!(group.decode_element(&one).is_err());
        assert!(group.decode_element(&[0u8; 128]).is_err());
        assert!(group.decode_element(&group.encode_element(group.prime())).is_err());
        assert!(group.decode_element(&[0x02]).is_err());

        let prime_minus_one = boxed_uint_from_be_slice(&hex!("
            B10B8F96 A080E01D DE92DE5E AE5D54EC 52C99FBC FB06A3C6 9A6A9DCA 52D23B61
            6073E286 75A23D18 9838EF1E 2EE652C0 13ECB4AE A9061123 24975C3C D49B83BF
            ACCBDD7D 90C4BD70 98488E9C 219A7372 4EFFD6FA E5644738 FAA31A4F F55BCCC0
            A151AF5F 0DC8B4BD 45BF37DF 365C1A65 E68CFDA7 6D4DA708 DF1FB2BC 2E4A4370
        "));
        assert!(group.diffie_hellman(&private_key, &prime_minus_one).is_err());
    }

    #[test]
    fn icao_doc9303_part11_secg2_mapping() {
        let group = get_1024_modp_160_po().unwrap();

        let terminal_private = boxed_uint_from_be_slice(&hex!("5265030F751F4AD18B08AC565FC7AC952E41618D"));
        let chip_private = boxed_uint_from_be_slice(&hex!("66DDAFEAC1609CB5B963BB0CB3FF8B3E047F336C"));

        let terminal_public = group.calculate_public_key(&terminal_private);
        assert_eq!(
            group.encode_element(&terminal_public).as_slice(),
            &hex!("
                23FB3749 EA030D2A 25B278D2 A562047A DE3F01B7 4F17A154 02CB7352 CA7D2B3E
                B71C343D B13D1DEB CE9A3666 DBCFC920 B49174A6 02CB4796 5CAA73DC 702489A4
                4D41DB91 4DE9613D C5E98C94 160551C0 DF86274B 9359BC04 90D01B03 AD54022D
                CB4F57FA D6322497 D7A1E28D 46710F46 1AFE710F BBBC5F8B A166F431 1975EC6C
            "),
        );
        let chip_public = group.calculate_public_key(&chip_private);
        assert_eq!(
            group.encode_element(&chip_public).as_slice(),
            &hex!("
                78879F57 225AA808 0D52ED0F C890A4B2 5336F699 AA89A2D3 A189654A F70729E6
                23EA5738 B26381E4 DA19E004 706FACE7 B235C2DB F2F38748 312F3C98 C2DD4882
                A41947B3 24AA1259 AC22579D B93F7085 655AF308 89DBB845 D9E6783F E42C9F24
                49400306 254C8AE8 EE9DD812 A804C0B6 6E8CAFC1 4F84D825 8950A91B 44126EE6
            "),
        );

        let terminal_secret = group.diffie_hellman(&terminal_private, &chip_public).unwrap();
        let chip_secret = group.diffie_hellman(&chip_private, &terminal_public).unwrap();
        assert_eq!(terminal_secret, chip_secret);
        assert_eq!(
            group.encode_element(&terminal_secret).as_slice(),
            &hex!("
                5BABEBEF 5B74E5BA 94B5C063 FDA15F1F 1CDE9487 3EE0A5D3 A2FCAB49 F258D07F
                544F13CB 66658C3A FEE9E727 389BE3F6 CBBBD321 28A8C21D D6EEA3CF 7091CDDF
                B08B8D00 7D40318D CCA4FFBF 51208790 FB4BD111 E5A968ED 6B6F08B2 6CA87C41
                0B3CE0C3 10CE104E ABD16629 AA48620C 1279270C B0750C0D 37C57FFF E302AE7F
            "),
        );

        let nonce = boxed_uint_from_be_slice(&hex!("FA5B7E3E49753A0DB9178B7B9BD898C8"));
        let mapped = group.derive_generic_mapping(&nonce, &terminal_secret).unwrap();
        assert_ne!(mapped.generator(), group.generator());
        assert!(mapped.is_valid_element(mapped.generator()));
        assert_eq!(mapped.prime(), group.prime());
    }
}
