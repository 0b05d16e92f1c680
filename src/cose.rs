//! COSE_Sign1 envelope handling.
//!
//! Two operations share the wire format: [extract_payload] pulls the embedded
//! CWT bytes out without touching the signature (decode path), and
//! [verify_signature] validates the signature against trust list keys
//! (verification path).

use crate::definitions::trustlist::{Jwk, PublicKey};
use coset::{iana, CborSerializable, CoseSign1, RegisteredLabelWithPrivate, SignatureContext, TaggedCborSerializable};
use sha2::Sha256;
use signature::Verifier;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed COSE_Sign1 structure")]
    Malformed,
    #[error("COSE_Sign1 has no payload")]
    MissingPayload,
}

fn parse(bytes: &[u8]) -> Result<CoseSign1, Error> {
    // Certificates in the wild carry the COSE_Sign1 both with and without the
    // CBOR tag 18.
    CoseSign1::from_tagged_slice(bytes)
        .or_else(|_| CoseSign1::from_slice(bytes))
        .map_err(|_| Error::Malformed)
}

/// Parse the envelope and return the embedded payload bytes without checking
/// the signature. Never use this path for trust decisions.
pub fn extract_payload(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    parse(bytes)?.payload.ok_or(Error::MissingPayload)
}

/// Validate the COSE signature against every candidate key, in list order,
/// until one verifies. Malformed envelopes, unknown algorithms and key
/// material that does not match the algorithm all fail closed.
pub fn verify_signature(keys: &[Jwk], bytes: &[u8]) -> bool {
    let sign1 = match parse(bytes) {
        Ok(s) => s,
        Err(e) => {
            debug!("signature check failed to parse envelope: {e}");
            return false;
        }
    };

    let alg = match &sign1.protected.header.alg {
        Some(RegisteredLabelWithPrivate::Assigned(alg)) => *alg,
        _ => {
            debug!("COSE_Sign1 protected header carries no known algorithm");
            return false;
        }
    };

    let sig_data = coset::sig_structure_data(
        SignatureContext::CoseSign1,
        sign1.protected.clone(),
        None,
        &[],
        sign1.payload.as_deref().unwrap_or(&[]),
    );

    for key in keys {
        let Some(public_key) = key.public_key() else {
            continue;
        };
        if verify_with(&public_key, alg, &sig_data, &sign1.signature) {
            return true;
        }
        // Key did not verify the signature, try the next one.
    }

    false
}

fn verify_with(key: &PublicKey, alg: iana::Algorithm, data: &[u8], signature: &[u8]) -> bool {
    match (alg, key) {
        (iana::Algorithm::ES256, PublicKey::Ec(key)) => {
            p256::ecdsa::Signature::from_slice(signature)
                .map(|sig| key.verify(data, &sig).is_ok())
                .unwrap_or(false)
        }
        (iana::Algorithm::PS256, PublicKey::Rsa(key)) => {
            rsa::pss::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pss::VerifyingKey::<Sha256>::new(key.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
                .unwrap_or(false)
        }
        (iana::Algorithm::RS256, PublicKey::Rsa(key)) => {
            rsa::pkcs1v15::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
                .unwrap_or(false)
        }
        _ => false,
    }
}
