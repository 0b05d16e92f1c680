//! CWT claims mapping (RFC 8392).
//!
//! The COSE payload is a CBOR map keyed by integer claim identifiers. The
//! health certificate claim value is converted to JSON and deserialized from
//! there, which keeps the record types plain serde structs.

use crate::definitions::healthcert::HealthCert;
use crate::definitions::holder::CertificateHolder;
use crate::definitions::light::LightCert;
use ciborium::value::Value;
use thiserror::Error;
use time::OffsetDateTime;

const CLAIM_ISSUER: i64 = 1;
const CLAIM_EXPIRATION: i64 = 4;
const CLAIM_ISSUED_AT: i64 = 6;
const CLAIM_HCERT: i64 = -260;
const CLAIM_LIGHT: i64 = -250;

/// Key of the version 1 schema inside the hcert claim map.
const HCERT_V1: i64 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cbor(#[from] crate::cbor::CborError),
    #[error("CWT payload is not a CBOR map")]
    NotAMap,
    #[error("CWT contains neither a health certificate nor a light certificate claim")]
    MissingCertificateClaim,
    #[error("malformed {0} claim")]
    MalformedClaim(&'static str),
    #[error("unsupported CBOR value in certificate payload")]
    UnsupportedValue,
    #[error("certificate record does not match the expected schema: {0}")]
    Schema(#[from] serde_json::Error),
}

pub(crate) fn decode(
    payload: &[u8],
    qr_code_data: &str,
    cose_bytes: Vec<u8>,
) -> Result<CertificateHolder, Error> {
    let value: Value = crate::cbor::from_slice(payload)?;
    let Value::Map(entries) = value else {
        return Err(Error::NotAMap);
    };

    let expiration_time = claim(&entries, CLAIM_EXPIRATION)
        .map(claim_instant)
        .transpose()?;
    let issued_at = claim(&entries, CLAIM_ISSUED_AT)
        .map(claim_instant)
        .transpose()?;
    let issuer = claim(&entries, CLAIM_ISSUER)
        .map(|v| {
            v.as_text()
                .map(str::to_string)
                .ok_or(Error::MalformedClaim("iss"))
        })
        .transpose()?;

    if let Some(hcert) = claim(&entries, CLAIM_HCERT) {
        let Value::Map(versions) = hcert else {
            return Err(Error::MalformedClaim("hcert"));
        };
        let record = claim(versions, HCERT_V1).ok_or(Error::MissingCertificateClaim)?;
        let record: HealthCert = serde_json::from_value(json_from_cbor(record)?)?;
        Ok(CertificateHolder::from_hcert(
            qr_code_data.to_string(),
            cose_bytes,
            record,
            expiration_time,
            issued_at,
            issuer,
        ))
    } else if let Some(light) = claim(&entries, CLAIM_LIGHT) {
        let record: LightCert = serde_json::from_value(json_from_cbor(light)?)?;
        Ok(CertificateHolder::from_light(
            qr_code_data.to_string(),
            cose_bytes,
            record,
            expiration_time,
            issued_at,
            issuer,
        ))
    } else {
        Err(Error::MissingCertificateClaim)
    }
}

fn claim<'a>(entries: &'a [(Value, Value)], key: i64) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

/// Timestamp claims are Unix epoch seconds.
fn claim_instant(value: &Value) -> Result<OffsetDateTime, Error> {
    let Value::Integer(i) = value else {
        return Err(Error::MalformedClaim("timestamp"));
    };
    let seconds =
        i64::try_from(i128::from(*i)).map_err(|_| Error::MalformedClaim("timestamp"))?;
    OffsetDateTime::from_unix_timestamp(seconds).map_err(|_| Error::MalformedClaim("timestamp"))
}

fn json_from_cbor(value: &Value) -> Result<serde_json::Value, Error> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => {
            let i = i128::from(*i);
            if let Ok(n) = i64::try_from(i) {
                serde_json::Value::from(n)
            } else if let Ok(n) = u64::try_from(i) {
                serde_json::Value::from(n)
            } else {
                return Err(Error::UnsupportedValue);
            }
        }
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or(Error::UnsupportedValue)?,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(base64::encode(b)),
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(json_from_cbor).collect::<Result<_, _>>()?,
        ),
        Value::Map(entries) => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                let key = k.as_text().ok_or(Error::UnsupportedValue)?;
                map.insert(key.to_string(), json_from_cbor(v)?);
            }
            serde_json::Value::Object(map)
        }
        Value::Tag(_, inner) => json_from_cbor(inner)?,
        _ => return Err(Error::UnsupportedValue),
    })
}
