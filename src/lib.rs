//! Password Authenticated Connection Establishment (PACE) for travel documents and identity cards.
//!
//! PACE is specified in ICAO Doc 9303 Part 11 and BSI TR-03110. The [`pace`] module contains the
//! handshake itself; [`crypt`] contains the group arithmetic and symmetric primitives it builds on.
//!
//! The crate performs no card I/O. The byte strings returned by each step are to be transported to
//! the other party by the caller, e.g. in GENERAL AUTHENTICATE commands.


pub mod crypt;
pub mod der_util;
pub mod pace;
