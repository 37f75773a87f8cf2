//! Elliptic-curve cryptography on short Weierstrass curves over prime fields.
//!
//! Arithmetic is performed in projective coordinates in Montgomery form using the complete addition
//! formulas from Renes, Costello and Batina, "Complete addition formulas for prime order elliptic
//! curves" (2015), Algorithm 1. Being complete, the same formula is also used for doubling.


pub mod curves;


use crypto_bigint::{BoxedUint, NonZero};
use crypto_bigint::modular::{BoxedMontyForm, BoxedMontyParams};
use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::crypt::{bytes_for_bits, reduce, resize, uint_from_be_bytes, uint_to_be_bytes, Error};


/// A point in affine coordinates.
#[derive(Clone, Debug, Eq, PartialEq, ZeroizeOnDrop)]
pub struct AffinePoint {
    x: BoxedUint,
    y: BoxedUint,
}
impl AffinePoint {
    pub const fn new(x: BoxedUint, y: BoxedUint) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> &BoxedUint { &self.x }
    pub fn y(&self) -> &BoxedUint { &self.y }
}


/// A point in projective coordinates with each coordinate in Montgomery form.
#[derive(Clone, Debug)]
struct ProjectivePoint {
    x: BoxedMontyForm,
    y: BoxedMontyForm,
    z: BoxedMontyForm,
}


/// Curve constants converted into Montgomery form.
#[derive(Clone, Debug)]
struct MontyConstants {
    params: BoxedMontyParams,
    a: BoxedMontyForm,
    b: BoxedMontyForm,
    b3: BoxedMontyForm,
}


/// An elliptic curve of the form `y**2 ≡ x**3 + ax + b` modulo a prime number.
#[derive(Clone, Debug)]
pub struct PrimeWeierstrassCurve {
    /// The prime (modulus) of the curve.
    prime: BoxedUint,

    /// Coefficient `a` in the curve's formula.
    coefficient_a: BoxedUint,

    /// Coefficient `b` in the curve's formula.
    coefficient_b: BoxedUint,

    /// The generator point of the group.
    generator: AffinePoint,

    /// The order of the group generated by the generator.
    order: BoxedUint,

    /// The cofactor of the curve.
    ///
    /// A cofactor n means that the number of points on the curve is n times the order of the
    /// group spanned by the generator.
    cofactor: u8,

    monty: MontyConstants,
}
impl PrimeWeierstrassCurve {
    /// Creates a new curve, verifying that the generator lies on it.
    pub fn new(
        prime: BoxedUint,
        coefficient_a: BoxedUint,
        coefficient_b: BoxedUint,
        generator: AffinePoint,
        order: BoxedUint,
        cofactor: u8,
    ) -> Result<Self, Error> {
        let odd_prime = crypto_bigint::Odd::new(prime.clone()).into_option()
            .ok_or(Error::InvalidParameters("prime is even"))?;
        let params = BoxedMontyParams::new(odd_prime);
        if cofactor == 0 {
            return Err(Error::InvalidParameters("cofactor is zero"));
        }
        if bool::from(order.is_zero()) {
            return Err(Error::InvalidParameters("order is zero"));
        }

        let precision = prime.bits_precision();
        let in_field = |value: &BoxedUint| resize(value, precision)
            .filter(|v| v < &prime);
        let coefficient_a = in_field(&coefficient_a)
            .ok_or(Error::InvalidParameters("coefficient a is not a field element"))?;
        let coefficient_b = in_field(&coefficient_b)
            .ok_or(Error::InvalidParameters("coefficient b is not a field element"))?;
        let generator = AffinePoint::new(
            in_field(generator.x())
                .ok_or(Error::InvalidParameters("generator x is not a field element"))?,
            in_field(generator.y())
                .ok_or(Error::InvalidParameters("generator y is not a field element"))?,
        );

        let a = BoxedMontyForm::new(coefficient_a.clone(), params.clone());
        let b = BoxedMontyForm::new(coefficient_b.clone(), params.clone());
        let b3 = &(&b + &b) + &b;
        let curve = Self {
            prime,
            coefficient_a,
            coefficient_b,
            generator,
            order,
            cofactor,
            monty: MontyConstants { params, a, b, b3 },
        };
        if !curve.is_on_curve(&curve.generator) {
            return Err(Error::InvalidParameters("generator is not on the curve"));
        }
        Ok(curve)
    }

    pub fn prime(&self) -> &BoxedUint { &self.prime }
    pub fn coefficient_a(&self) -> &BoxedUint { &self.coefficient_a }
    pub fn coefficient_b(&self) -> &BoxedUint { &self.coefficient_b }
    pub fn generator(&self) -> &AffinePoint { &self.generator }
    pub fn order(&self) -> &BoxedUint { &self.order }
    pub fn cofactor(&self) -> u8 { self.cofactor }

    /// The number of bytes of an encoded coordinate.
    pub fn field_len_bytes(&self) -> usize {
        bytes_for_bits(self.prime.bits())
    }

    /// The number of bytes of a private key.
    pub fn order_len_bytes(&self) -> usize {
        bytes_for_bits(self.order.bits())
    }

    fn with_generator(&self, generator: AffinePoint) -> Self {
        Self {
            prime: self.prime.clone(),
            coefficient_a: self.coefficient_a.clone(),
            coefficient_b: self.coefficient_b.clone(),
            generator,
            order: self.order.clone(),
            cofactor: self.cofactor,
            monty: self.monty.clone(),
        }
    }

    fn field_element(&self, value: &BoxedUint) -> Option<BoxedMontyForm> {
        let value = resize(value, self.prime.bits_precision())?;
        if value >= self.prime {
            return None;
        }
        Some(BoxedMontyForm::new(value, self.monty.params.clone()))
    }

    fn zero(&self) -> BoxedMontyForm {
        BoxedMontyForm::zero(self.monty.params.clone())
    }

    fn one(&self) -> BoxedMontyForm {
        BoxedMontyForm::one(self.monty.params.clone())
    }

    /// Whether the point fulfills the curve equation.
    pub fn is_on_curve(&self, point: &AffinePoint) -> bool {
        let (Some(x), Some(y)) = (self.field_element(point.x()), self.field_element(point.y())) else {
            return false;
        };
        let lhs = y.square();
        let rhs = &(&(&x.square() * &x) + &(&self.monty.a * &x)) + &self.monty.b;
        lhs == rhs
    }

    /// Decodes an uncompressed point (`0x04 ‖ x ‖ y`), verifying that it lies on the curve.
    pub fn decode_point(&self, bytes: &[u8]) -> Result<AffinePoint, Error> {
        let coordinate_len = self.field_len_bytes();
        if bytes.len() != 1 + 2*coordinate_len || bytes[0] != 0x04 {
            return Err(Error::InvalidGroupElement);
        }
        let precision = self.prime.bits_precision();
        let x = uint_from_be_bytes(&bytes[1..1+coordinate_len], precision)
            .ok_or(Error::InvalidGroupElement)?;
        let y = uint_from_be_bytes(&bytes[1+coordinate_len..], precision)
            .ok_or(Error::InvalidGroupElement)?;
        let point = AffinePoint::new(x, y);
        if !self.is_on_curve(&point) {
            return Err(Error::InvalidGroupElement);
        }
        Ok(point)
    }

    /// Encodes a point in uncompressed form (`0x04 ‖ x ‖ y`).
    pub fn encode_point(&self, point: &AffinePoint) -> Zeroizing<Vec<u8>> {
        let coordinate_len = self.field_len_bytes();
        let mut ret = Zeroizing::new(Vec::with_capacity(1 + 2*coordinate_len));
        ret.push(0x04);
        ret.extend_from_slice(&uint_to_be_bytes(point.x(), coordinate_len));
        ret.extend_from_slice(&uint_to_be_bytes(point.y(), coordinate_len));
        ret
    }

    fn to_projective(&self, point: &AffinePoint) -> Result<ProjectivePoint, Error> {
        let x = self.field_element(point.x()).ok_or(Error::InvalidGroupElement)?;
        let y = self.field_element(point.y()).ok_or(Error::InvalidGroupElement)?;
        Ok(ProjectivePoint { x, y, z: self.one() })
    }

    /// Converts back into affine coordinates; fails for the point at infinity.
    fn to_affine(&self, point: &ProjectivePoint) -> Result<AffinePoint, Error> {
        let z_inverse = point.z.invert().into_option()
            .ok_or(Error::NeutralElement)?;
        let x = (&point.x * &z_inverse).retrieve();
        let y = (&point.y * &z_inverse).retrieve();
        Ok(AffinePoint::new(x, y))
    }

    fn point_at_infinity(&self) -> ProjectivePoint {
        ProjectivePoint {
            x: self.zero(),
            y: self.one(),
            z: self.zero(),
        }
    }

    fn add(&self, lhs: &ProjectivePoint, rhs: &ProjectivePoint) -> ProjectivePoint {
        let a = &self.monty.a;
        let b3 = &self.monty.b3;

        let xx = &lhs.x * &rhs.x;
        let yy = &lhs.y * &rhs.y;
        let zz = &lhs.z * &rhs.z;
        let xy_cross = &(&(&lhs.x + &lhs.y) * &(&rhs.x + &rhs.y)) - &(&xx + &yy);
        let xz_cross = &(&(&lhs.x + &lhs.z) * &(&rhs.x + &rhs.z)) - &(&xx + &zz);
        let yz_cross = &(&(&lhs.y + &lhs.z) * &(&rhs.y + &rhs.z)) - &(&yy + &zz);

        let a_zz = a * &zz;
        let t = &(a * &xz_cross) + &(b3 * &zz);
        let yy_minus_t = &yy - &t;
        let yy_plus_t = &yy + &t;
        let three_xx_plus_a_zz = &(&(&xx + &xx) + &xx) + &a_zz;
        let u = &(b3 * &xz_cross) + &(a * &(&xx - &a_zz));

        ProjectivePoint {
            x: &(&xy_cross * &yy_minus_t) - &(&yz_cross * &u),
            y: &(&yy_minus_t * &yy_plus_t) + &(&three_xx_plus_a_zz * &u),
            z: &(&yz_cross * &yy_plus_t) + &(&xy_cross * &three_xx_plus_a_zz),
        }
    }

    /// Multiplies a point by a scalar using double-and-add, most significant bit first.
    fn multiply(&self, scalar: &BoxedUint, point: &ProjectivePoint) -> ProjectivePoint {
        let scalar_bytes = Zeroizing::new(scalar.to_be_bytes().into_vec());
        let mut result = self.point_at_infinity();
        for byte in scalar_bytes.iter() {
            for bit_index in (0..8).rev() {
                result = self.add(&result, &result);
                let sum = self.add(&result, point);
                if (byte >> bit_index) & 0x01 != 0 {
                    result = sum;
                }
            }
        }
        result
    }

    /// Calculates the public key `private_key * generator`.
    pub fn calculate_public_key(&self, private_key: &BoxedUint) -> Result<AffinePoint, Error> {
        let generator = self.to_projective(&self.generator)?;
        self.to_affine(&self.multiply(private_key, &generator))
    }

    /// Calculates the shared point `private_key * other_public_key`.
    pub fn diffie_hellman(&self, private_key: &BoxedUint, other_public_key: &AffinePoint) -> Result<AffinePoint, Error> {
        if !self.is_on_curve(other_public_key) {
            return Err(Error::InvalidGroupElement);
        }
        let other_public_key = self.to_projective(other_public_key)?;
        self.to_affine(&self.multiply(private_key, &other_public_key))
    }

    /// Derives a curve with the generator `nonce * generator + shared_secret`.
    pub fn derive_generic_mapping(&self, nonce: &BoxedUint, shared_secret: &AffinePoint) -> Result<Self, Error> {
        let generator = self.to_projective(&self.generator)?;
        let shared_secret = self.to_projective(shared_secret)?;
        let product = self.multiply(nonce, &generator);
        let new_generator = self.to_affine(&self.add(&product, &shared_secret))?;
        Ok(self.with_generator(new_generator))
    }

    /// Derives a curve whose generator is obtained by encoding the pseudorandom value onto the
    /// curve (ICAO Doc 9303 Part 11 § 4.4.3.3.2, point encoding for curves with `p ≡ 3 mod 4`).
    pub fn derive_integrated_mapping(&self, pseudorandom: &BoxedUint) -> Result<Self, Error> {
        let precision = self.prime.bits_precision();
        let uint = |value: u8| BoxedUint::from(value).widen(precision);
        let four = NonZero::new(uint(4)).into_option()
            .ok_or(Error::InvalidParameters("four is zero"))?;
        if self.prime.rem(&four) != uint(3) {
            return Err(Error::Unsupported("point encoding requires a prime congruent to 3 modulo 4"));
        }

        let t_reduced = reduce(pseudorandom, &self.prime)
            .ok_or(Error::InvalidGroupElement)?;
        let t = BoxedMontyForm::new(t_reduced, self.monty.params.clone());
        let one = self.one();
        let zero = self.zero();
        let a = &self.monty.a;
        let b = &self.monty.b;

        // alpha = -t**2
        let alpha = &zero - &t.square();
        let alpha_plus_alpha_squared = &alpha + &alpha.square();

        // X2 = -b * (1 + alpha + alpha**2) * (a * (alpha + alpha**2))**(p - 2)
        let denominator = a * &alpha_plus_alpha_squared;
        let prime_minus_two = self.prime.wrapping_sub(&uint(2));
        let numerator = &(&zero - b) * &(&one + &alpha_plus_alpha_squared);
        let x2 = &numerator * &denominator.pow(&prime_minus_two);

        // X3 = alpha * X2
        let x3 = &alpha * &x2;

        // h2 = X2**3 + a * X2 + b
        let h2 = &(&(&x2.square() * &x2) + &(a * &x2)) + b;

        // U = t**3 * h2
        let u = &(&t.square() * &t) * &h2;

        // A = h2**(p - 1 - (p + 1)/4)
        let (quarter, _) = self.prime.wrapping_add(&uint(1)).div_rem(&four);
        let exponent = self.prime.wrapping_sub(&uint(1)).wrapping_sub(&quarter);
        let a_value = h2.pow(&exponent);

        // A**2 * h2 == 1 means h2 is a square
        let point = if &a_value.square() * &h2 == one {
            ProjectivePoint { x: x2, y: &a_value * &h2, z: one }
        } else {
            ProjectivePoint { x: x3, y: &a_value * &u, z: one }
        };
        let point = if self.cofactor != 1 {
            self.multiply(&BoxedUint::from(self.cofactor), &point)
        } else {
            point
        };

        let new_generator = self.to_affine(&point)?;
        if !self.is_on_curve(&new_generator) {
            return Err(Error::InvalidGroupElement);
        }
        Ok(self.with_generator(new_generator))
    }
}
