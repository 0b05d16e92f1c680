//! Decoding and verification of EU Digital COVID Certificates.
//!
//! A certificate arrives as a QR code payload: a prefixed, base45 encoded,
//! zlib compressed COSE_Sign1 structure whose payload is a CWT claims map
//! carrying the health certificate record. This crate covers the full path
//! from that opaque string to a verification outcome:
//!
//! - [`decoder::decode`] runs the layered decode chain and classifies the
//!   certificate type.
//! - [`verifier::CertificateVerifier::verify`] checks the COSE signature
//!   against a trust list, matches the certificate's UVCIs against the
//!   revocation list, and evaluates the national rule set (a [`certlogic`]
//!   expression per rule), then combines the three outcomes.
//!
//! Trust list content (signing keys, revoked identifiers, rules) is consumed
//! as an already fetched, in-memory snapshot; fetching, caching and storage
//! belong to the caller.

pub mod cbor;
pub mod certlogic;
pub mod cose;
pub mod data;
pub mod decoder;
pub mod definitions;
pub mod verifier;

pub use decoder::decode;
pub use definitions::{
    CertType, CertificateHolder, CheckNationalRulesState, CheckRevocationState,
    CheckSignatureState, DecodeState, HealthCert, Jwk, Jwks, LightCert, RevokedCertificates,
    Rule, RuleSet, StateError, TrustList, VerificationState,
};
pub use verifier::{CertificateVerifier, NationalRulesVerifier, ValidityRange};
