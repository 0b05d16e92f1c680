//! Trust list data: signing keys, revoked certificate identifiers and the
//! national rule set.
//!
//! All of this is fetched and refreshed by the caller; the verifier consumes a
//! fully resolved snapshot passed in by value.

use crate::definitions::healthcert::{RecoveryEntry, TestEntry, VaccinationEntry};
use crate::definitions::holder::CertType;
use p256::ecdsa::VerifyingKey;
use p256::EncodedPoint;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of the three independently refreshed trust collections. Usable
/// only when all three are present and unexpired; that precondition is checked
/// by the repository layer that produces the snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrustList {
    pub signatures: Jwks,
    #[serde(rename = "revokedCertificates")]
    pub revoked_certificates: RevokedCertificates,
    #[serde(rename = "ruleSet")]
    pub rule_set: RuleSet,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub certs: Vec<Jwk>,
}

const ALG_RSA_256: &str = "RS256";
const ALG_ES_256: &str = "ES256";

/// A single signing key. The `kid`, `x`, `y`, `n` and `e` fields are base64
/// encoded; the numeric parts are unsigned big-endian integers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    #[serde(rename = "keyId")]
    pub key_id: String,
    pub alg: String,
    /// Which certificate types this key is provisioned for, as a string of
    /// scope letters (`v`, `t`, `r`). Empty means all.
    #[serde(rename = "use")]
    pub use_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// Key material decoded from a [Jwk].
#[derive(Clone, Debug)]
pub enum PublicKey {
    Ec(VerifyingKey),
    Rsa(RsaPublicKey),
}

impl Jwk {
    pub fn from_ne(key_id: &str, n: &str, e: &str, use_: &str) -> Self {
        Self {
            key_id: key_id.to_string(),
            alg: ALG_RSA_256.to_string(),
            use_: use_.to_string(),
            crv: None,
            x: None,
            y: None,
            n: Some(n.to_string()),
            e: Some(e.to_string()),
        }
    }

    pub fn from_xy(key_id: &str, x: &str, y: &str, use_: &str) -> Self {
        Self {
            key_id: key_id.to_string(),
            alg: ALG_ES_256.to_string(),
            use_: use_.to_string(),
            crv: None,
            x: Some(x.to_string()),
            y: Some(y.to_string()),
            n: None,
            e: None,
        }
    }

    pub fn kid(&self) -> Option<Vec<u8>> {
        base64::decode(&self.key_id).ok()
    }

    /// Decode the key material. Returns `None` for unknown algorithms or
    /// malformed parameters (e.g. a point that is not on the curve), so a bad
    /// key is skipped rather than aborting verification.
    pub fn public_key(&self) -> Option<PublicKey> {
        match self.alg.as_str() {
            ALG_ES_256 => {
                let x: p256::FieldBytes = field_element(self.x.as_deref()?)?.into();
                let y: p256::FieldBytes = field_element(self.y.as_deref()?)?.into();
                let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
                let key = VerifyingKey::from_encoded_point(&point).ok()?;
                Some(PublicKey::Ec(key))
            }
            ALG_RSA_256 => {
                let n = base64::decode(self.n.as_deref()?).ok()?;
                let e = base64::decode(self.e.as_deref()?).ok()?;
                let key =
                    RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
                        .ok()?;
                Some(PublicKey::Rsa(key))
            }
            _ => None,
        }
    }

    /// Whether this key's declared scope covers the given certificate type.
    /// An empty scope is treated as valid for all types.
    ///
    /// Note that signature verification deliberately does not filter on this;
    /// any trust-list key that cryptographically validates is accepted.
    pub fn is_allowed_to_sign(&self, cert_type: CertType) -> bool {
        self.key_usage_types().contains(&cert_type) || self.use_.is_empty()
    }

    pub fn key_usage_types(&self) -> Vec<CertType> {
        [CertType::Vaccination, CertType::Recovery, CertType::Test]
            .into_iter()
            .filter(|t| self.use_.contains(t.use_code()))
            .collect()
    }
}

/// Decode an EC field element: unsigned big-endian, normalized to 32 bytes.
fn field_element(b64: &str) -> Option<[u8; 32]> {
    let bytes = base64::decode(b64).ok()?;
    let stripped: &[u8] = {
        let mut s = bytes.as_slice();
        while let [0, rest @ ..] = s {
            s = rest;
        }
        s
    };
    if stripped.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - stripped.len()..].copy_from_slice(stripped);
    Some(out)
}

/// Revoked UVCIs. Matching is exact and case-sensitive.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevokedCertificates {
    #[serde(rename = "revokedCerts")]
    pub revoked_certs: Vec<String>,
    #[serde(rename = "validDuration")]
    pub valid_duration: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    #[serde(rename = "valueSets")]
    pub value_sets: RuleValueSets,
    #[serde(rename = "validDuration")]
    pub valid_duration: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub id: String,
    #[serde(rename = "businessDescription", skip_serializing_if = "Option::is_none")]
    pub business_description: Option<String>,
    pub description: String,
    #[serde(rename = "inputParameter")]
    pub input_parameter: String,
    /// The CertLogic expression tree, exactly as delivered by the server.
    pub logic: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleValueSets {
    #[serde(rename = "disease-agent-targeted", skip_serializing_if = "Option::is_none")]
    pub disease_agents: Option<Vec<String>>,
    #[serde(rename = "covid-19-lab-test-type", skip_serializing_if = "Option::is_none")]
    pub test_types: Option<Vec<String>>,
    #[serde(
        rename = "covid-19-lab-test-manufacturer-and-name",
        skip_serializing_if = "Option::is_none"
    )]
    pub test_manufacturers: Option<Vec<String>>,
    #[serde(rename = "accepted-vaccines", skip_serializing_if = "Option::is_none")]
    pub accepted_vaccines: Option<Vec<String>>,
    #[serde(
        rename = "one-dose-vaccines-with-offset",
        skip_serializing_if = "Option::is_none"
    )]
    pub one_dose_vaccines_with_offset: Option<Vec<String>>,
    #[serde(rename = "two-dose-vaccines", skip_serializing_if = "Option::is_none")]
    pub two_dose_vaccines: Option<Vec<String>>,
    #[serde(rename = "acceptance-criteria")]
    pub acceptance_criteria: AcceptanceCriterias,
}

/// Numeric policy constants referenced both by the rule expressions and by the
/// validity range derivation. Day values unless noted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptanceCriterias {
    #[serde(rename = "single-vaccine-validity-offset")]
    pub single_vaccine_validity_offset: i64,
    #[serde(rename = "vaccine-immunity")]
    pub vaccine_immunity: i64,
    /// Hours.
    #[serde(rename = "rat-test-validity")]
    pub rat_test_validity: i64,
    /// Hours.
    #[serde(rename = "pcr-test-validity")]
    pub pcr_test_validity: i64,
    #[serde(rename = "recovery-offset-valid-from")]
    pub recovery_offset_valid_from: i64,
    #[serde(rename = "recovery-offset-valid-until")]
    pub recovery_offset_valid_until: i64,
}

/// Root of the CertLogic evaluation context.
#[derive(Debug, Serialize)]
pub struct CertLogicData<'a> {
    pub payload: CertLogicPayload<'a>,
    pub external: CertLogicExternalInfo<'a>,
}

#[derive(Debug, Serialize)]
pub struct CertLogicPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<&'a [RecoveryEntry]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<&'a [TestEntry]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<&'a [VaccinationEntry]>,
}

#[derive(Debug, Serialize)]
pub struct CertLogicExternalInfo<'a> {
    #[serde(rename = "valueSets")]
    pub value_sets: &'a RuleValueSets,
    /// ISO-8601 extended offset date-time.
    #[serde(rename = "validationClock")]
    pub validation_clock: String,
    /// Start of the current day, same format.
    #[serde(rename = "validationClockAtStartOfDay")]
    pub validation_clock_at_start_of_day: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ec_key_from_coordinates() {
        // Certificate light dev key; a valid P-256 point.
        let jwk = Jwk::from_xy(
            "AAABAQICAwM=",
            "ceBrQgj3RwWzoxkv8/vApqkB7yJGfpBC9TjeIiXUR0U=",
            "g9ufnhfjFLVIiQYeQWmQATN/CMiVbfAgFp/08+Qqv2s=",
            "",
        );
        assert!(matches!(jwk.public_key(), Some(PublicKey::Ec(_))));
        assert_eq!(jwk.kid().unwrap(), vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn ec_key_not_on_curve_is_rejected() {
        let jwk = Jwk::from_xy(
            "AAABAQICAwM=",
            "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=",
            "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=",
            "",
        );
        assert!(jwk.public_key().is_none());
    }

    #[test]
    fn rsa_key_from_modulus_and_exponent() {
        let n = base64::encode([0xC3u8; 256]);
        let jwk = Jwk::from_ne("kid", &n, "AQAB", "");
        assert!(matches!(jwk.public_key(), Some(PublicKey::Rsa(_))));
    }

    #[test]
    fn unknown_algorithm_yields_no_key() {
        let mut jwk = Jwk::from_ne("kid", "AQAB", "AQAB", "");
        jwk.alg = "HS256".to_string();
        assert!(jwk.public_key().is_none());
    }

    #[test]
    fn key_usage_scopes() {
        let jwk = Jwk::from_xy("kid", "AA==", "AA==", "vt");
        assert!(jwk.is_allowed_to_sign(CertType::Vaccination));
        assert!(jwk.is_allowed_to_sign(CertType::Test));
        assert!(!jwk.is_allowed_to_sign(CertType::Recovery));

        let unscoped = Jwk::from_xy("kid", "AA==", "AA==", "");
        assert!(unscoped.is_allowed_to_sign(CertType::Recovery));
        assert!(unscoped.key_usage_types().is_empty());
    }
}
