use crate::definitions::healthcert::PersonName;
use serde::{Deserialize, Serialize};

/// Minimal certificate variant: identity only, no medical entries.
///
/// Its validity window comes straight from the CWT `iat`/`exp` claims, so it
/// never goes through rule evaluation or revocation checks.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LightCert {
    #[serde(rename = "ver")]
    pub version: String,
    #[serde(rename = "nam")]
    pub person: PersonName,
    #[serde(rename = "dob")]
    pub date_of_birth: String,
}
