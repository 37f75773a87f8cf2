//! The low-entropy secrets PACE can be performed with.
//!
//! For the MRZ, the secret is not the MRZ itself but the SHA-1 hash of the MRZ key: document
//! number, date of birth and date of expiry, each followed by its check digit. The layouts of the
//! three MRZ form factors are:
//! ```plain
//! TD1: TTSSSNNNNNNNNNCOOOOOOOOOOOOOOO    TD2: TTSSSIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII
//!      BBBBBBDXEEEEEEFAAAPPPPPPPPPPPG         NNNNNNNNNCAAABBBBBBDXEEEEEEFOOOOOOOG
//!      IIIIIIIIIIIIIIIIIIIIIIIIIIIIII
//!
//! TD3: TTSSSIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIIII
//!      NNNNNNNNNCAAABBBBBBDXEEEEEEFOOOOOOOOOOOOOOQG
//! ```
//! with `N` the document number, `C` its check digit, `B` the date of birth, `D` its check digit,
//! `E` the date of expiry and `F` its check digit. In TD1, a document number longer than nine
//! characters has `<` in place of `C` and continues in the optional data `O`, terminated by its
//! check digit.


use std::fmt;

use digest::Digest;
use sha1::Sha1;
use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::pace::Error;


/// The source of a PACE secret.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SecretKind {
    Mrz,
    Can,
    Pin,
    Puk,
}
impl SecretKind {
    /// The password reference used in MSE:Set AT (BSI TR-03110 Part 3 § D.2.1.1).
    pub const fn password_reference(self) -> u8 {
        match self {
            Self::Mrz => 0x01,
            Self::Can => 0x02,
            Self::Pin => 0x03,
            Self::Puk => 0x04,
        }
    }
}
impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mrz => f.write_str("MRZ"),
            Self::Can => f.write_str("CAN"),
            Self::Pin => f.write_str("PIN"),
            Self::Puk => f.write_str("PUK"),
        }
    }
}


/// A low-entropy secret shared by the terminal and the chip.
///
/// The encoded value is the input to the password key derivation. It is wiped when the secret is
/// dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct PaceSecret {
    #[zeroize(skip)]
    kind: SecretKind,
    encoded: Zeroizing<Vec<u8>>,
}
impl PaceSecret {
    /// Creates a secret from its already encoded value.
    pub fn new(kind: SecretKind, encoded: &[u8]) -> Result<Self, Error> {
        if encoded.is_empty() {
            return Err(Error::InvalidInput("secret is empty"));
        }
        Ok(Self {
            kind,
            encoded: Zeroizing::new(encoded.to_vec()),
        })
    }

    /// Creates a secret from a Card Access Number.
    pub fn from_can(can: &str) -> Result<Self, Error> {
        Self::new(SecretKind::Can, can.as_bytes())
    }

    /// Creates a secret from a Personal Identification Number.
    pub fn from_pin(pin: &str) -> Result<Self, Error> {
        Self::new(SecretKind::Pin, pin.as_bytes())
    }

    /// Creates a secret from a PIN Unblocking Key.
    pub fn from_puk(puk: &str) -> Result<Self, Error> {
        Self::new(SecretKind::Puk, puk.as_bytes())
    }

    /// Creates a secret from the MRZ key, i.e. document number, date of birth and date of expiry
    /// each followed by its check digit.
    pub fn from_mrz_key(mrz_key: &[u8]) -> Result<Self, Error> {
        if mrz_key.is_empty() {
            return Err(Error::InvalidInput("MRZ key is empty"));
        }
        let hash = Zeroizing::new(Sha1::digest(mrz_key).to_vec());
        Self::new(SecretKind::Mrz, &hash)
    }

    /// Creates a secret from the individual MRZ fields, computing the check digits.
    ///
    /// Dates are given as `YYMMDD`. Document numbers shorter than nine characters are padded with
    /// `<`.
    pub fn from_mrz_fields(document_number: &str, date_of_birth: &str, date_of_expiry: &str) -> Result<Self, Error> {
        if !is_mrz_text(document_number) || document_number.is_empty() {
            return Err(Error::InvalidInput("document number contains characters not allowed in an MRZ"));
        }
        if !is_mrz_date(date_of_birth) || !is_mrz_date(date_of_expiry) {
            return Err(Error::InvalidInput("MRZ dates must consist of six digits"));
        }

        let mut mrz_key = Zeroizing::new(Vec::with_capacity(22 + 1 + 6 + 1 + 6 + 1));
        mrz_key.extend_from_slice(document_number.as_bytes());
        while mrz_key.len() < 9 {
            mrz_key.push(b'<');
        }
        let document_number_check = check_digit(&mrz_key);
        mrz_key.push(document_number_check);
        for date in [date_of_birth, date_of_expiry] {
            mrz_key.extend_from_slice(date.as_bytes());
            mrz_key.push(check_digit(date.as_bytes()));
        }
        Self::from_mrz_key(&mrz_key)
    }

    /// Creates a secret from the full text of a TD1, TD2 or TD3 MRZ.
    ///
    /// Line breaks and surrounding whitespace are ignored. Check digits are verified.
    pub fn from_mrz_text(mrz: &str) -> Result<Self, Error> {
        let compact: Zeroizing<Vec<u8>> = Zeroizing::new(
            mrz.bytes().filter(|b| !b.is_ascii_whitespace()).collect()
        );
        if !compact.iter().all(|b| is_mrz_byte(*b)) {
            return Err(Error::InvalidInput("MRZ contains invalid characters"));
        }

        let (document_number, document_number_check, birth, expiry) = match compact.len() {
            90 => {
                // TD1
                let (number, check) = if compact[14] == b'<' {
                    // long document number continues in the optional data
                    let optional = &compact[15..30];
                    let end = optional.iter().position(|b| *b == b'<').unwrap_or(optional.len());
                    if end == 0 {
                        return Err(Error::InvalidInput("long document number is missing its check digit"));
                    }
                    let mut number = compact[5..14].to_vec();
                    number.extend_from_slice(&optional[..end-1]);
                    (number, optional[end-1])
                } else {
                    (compact[5..14].to_vec(), compact[14])
                };
                (number, check, &compact[30..37], &compact[38..45])
            },
            72 => {
                // TD2
                let line = &compact[36..];
                (line[0..9].to_vec(), line[9], &line[13..20], &line[21..28])
            },
            88 => {
                // TD3
                let line = &compact[44..];
                (line[0..9].to_vec(), line[9], &line[13..20], &line[21..28])
            },
            _ => return Err(Error::InvalidInput("MRZ has an unknown length")),
        };
        let document_number = Zeroizing::new(document_number);

        if check_digit(&document_number) != document_number_check
                || check_digit(&birth[0..6]) != birth[6]
                || check_digit(&expiry[0..6]) != expiry[6] {
            return Err(Error::InvalidInput("MRZ check digit mismatch"));
        }

        let mut mrz_key = Zeroizing::new(Vec::with_capacity(document_number.len() + 1 + 7 + 7));
        mrz_key.extend_from_slice(&document_number);
        mrz_key.push(document_number_check);
        mrz_key.extend_from_slice(birth);
        mrz_key.extend_from_slice(expiry);
        Self::from_mrz_key(&mrz_key)
    }

    pub fn kind(&self) -> SecretKind { self.kind }

    /// The encoded secret as used by the key derivation function.
    pub fn encoded(&self) -> &[u8] { &self.encoded }
}
impl fmt::Debug for PaceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaceSecret")
            .field("kind", &self.kind)
            .field("encoded", &"<redacted>")
            .finish()
    }
}


fn is_mrz_byte(b: u8) -> bool {
    b.is_ascii_digit() || b.is_ascii_uppercase() || b == b'<'
}

fn is_mrz_text(text: &str) -> bool {
    text.bytes().all(is_mrz_byte)
}

fn is_mrz_date(date: &str) -> bool {
    date.len() == 6 && date.bytes().all(|b| b.is_ascii_digit())
}


/// Computes the ICAO 9303 check digit (weights 7, 3, 1) as an ASCII digit.
fn check_digit(data: &[u8]) -> u8 {
    const WEIGHTS: [u32; 3] = [7, 3, 1];

    let sum: u32 = data.iter()
        .zip(WEIGHTS.iter().cycle())
        .map(|(b, weight)| {
            let value = match b {
                b'0'..=b'9' => u32::from(b - b'0'),
                b'A'..=b'Z' => u32::from(b - b'A') + 10,
                _ => 0, // filler
            };
            value * weight
        })
        .sum();
    // sum % 10 is a single digit
    b'0' + (sum % 10) as u8
}


#[cfg(test)]
mod tests {
    use super::{check_digit, PaceSecret, SecretKind};
    use hex_literal::hex;

    #[test]
    fn test_check_digit() {
        assert_eq!(check_digit(b"T22000129"), b'3');
        assert_eq!(check_digit(b"640812"), b'5');
        assert_eq!(check_digit(b"101031"), b'8');
        assert_eq!(check_digit(b"L898902C<"), b'3');
    }

    #[test]
    fn test_mrz_secret() {
        // ICAO Doc 9303 Part 11 Appendix G.1
        let expected = hex!("7E2D2A41 C74EA0B3 8CD36F86 3939BFA8 E9032AAD");
        let from_key = PaceSecret::from_mrz_key(b"T22000129364081251010318").unwrap();
        assert_eq!(from_key.kind(), SecretKind::Mrz);
        assert_eq!(from_key.encoded(), &expected);

        let from_fields = PaceSecret::from_mrz_fields("T22000129", "640812", "101031").unwrap();
        assert_eq!(from_fields.encoded(), &expected);
    }

    #[test]
    fn test_mrz_text() {
        // ICAO Doc 9303 Part 4 Appendix A specimen
        let first_line = format!("P<UTOERIKSSON<<ANNA<MARIA{}", "<".repeat(19));
        let second_line = "L898902C<3UTO6908061F9406236ZE184226B<<<<<14";
        let td3 = format!("{}\n{}\n", first_line, second_line);

        let from_text = PaceSecret::from_mrz_text(&td3).unwrap();
        let from_key = PaceSecret::from_mrz_key(b"L898902C<369080619406236").unwrap();
        assert_eq!(from_text.encoded(), from_key.encoded());
        let from_fields = PaceSecret::from_mrz_fields("L898902C", "690806", "940623").unwrap();
        assert_eq!(from_text.encoded(), from_fields.encoded());

        let broken = td3.replace("6908061", "6908071");
        assert!(PaceSecret::from_mrz_text(&broken).is_err());
        assert!(PaceSecret::from_mrz_text("P<UTO").is_err());
    }

    #[test]
    fn test_td1_long_document_number() {
        let td1 = concat!(
            "I<UTOD23145890<7349<<<<<<<<<<<",
            "3407127M9507122UTO<<<<<<<<<<<2",
            "STEVENSON<<PETER<JOHN<<<<<<<<<",
        );
        let from_text = PaceSecret::from_mrz_text(td1).unwrap();
        let from_fields = PaceSecret::from_mrz_fields("D23145890734", "340712", "950712").unwrap();
        assert_eq!(from_text.encoded(), from_fields.encoded());
    }

    #[test]
    fn test_simple_secrets() {
        let pin = PaceSecret::from_pin("500723").unwrap();
        assert_eq!(pin.kind(), SecretKind::Pin);
        assert_eq!(pin.kind().password_reference(), 0x03);
        assert_eq!(pin.encoded(), b"500723");
        assert!(PaceSecret::from_can("").is_err());
        assert!(!format!("{:?}", pin).contains("500723"));
    }
}
