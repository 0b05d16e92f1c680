//! The decode chain: QR payload string to [CertificateHolder].
//!
//! `<prefix>` → base45 → zlib → COSE_Sign1 → CWT claims → typed record. Purely
//! syntactic: no validity or trust decision is made here, and no step is ever
//! retried. Each stage failure maps to its stable error code.

pub mod base45;
pub mod cert_type;
pub mod cwt;
pub mod decompress;
pub mod prefix;

use crate::data::error_codes;
use crate::definitions::state::{DecodeState, StateError};
use tracing::debug;

/// Decode the string scanned from a QR code into a certificate.
///
/// Does not do any validity checks; simply checks whether the data is
/// decodable. The returned holder keeps the COSE bytes for later signature
/// verification, and carries its classified type (or none, when the record
/// holds an invalid combination of entries).
pub fn decode(qr_code_data: &str) -> DecodeState {
    let encoded = match prefix::strip(qr_code_data) {
        Some(encoded) => encoded,
        None => return DecodeState::Error(StateError::new(error_codes::DECODE_PREFIX)),
    };

    let compressed = match base45::decode(encoded) {
        Ok(compressed) => compressed,
        Err(e) => {
            debug!("base45 decoding failed: {e}");
            return DecodeState::Error(StateError::new(error_codes::DECODE_BASE_45));
        }
    };

    let cose_bytes = match decompress::decode(&compressed) {
        Ok(cose_bytes) => cose_bytes,
        Err(e) => {
            debug!("decompression failed: {e}");
            return DecodeState::Error(StateError::new(error_codes::DECODE_Z_LIB));
        }
    };

    let payload = match crate::cose::extract_payload(&cose_bytes) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("COSE envelope parsing failed: {e}");
            return DecodeState::Error(StateError::new(error_codes::DECODE_COSE));
        }
    };

    let holder = match cwt::decode(&payload, qr_code_data, cose_bytes) {
        Ok(holder) => holder,
        Err(e) => {
            debug!("CWT mapping failed: {e}");
            return DecodeState::Error(StateError::new(error_codes::DECODE_CBOR));
        }
    };

    if let Some(cert_type) = cert_type::classify(&holder) {
        holder.set_cert_type(cert_type);
    }

    DecodeState::Success(holder)
}
