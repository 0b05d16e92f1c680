//! Certificate verification: signature, revocation and national rules.
//!
//! The three checks are independent, each reading only the decoded certificate
//! and its own slice of the trust list, so they run concurrently and their
//! outcomes are combined once all have finished.

pub mod national_rules;

pub use national_rules::{NationalRulesError, NationalRulesVerifier, ValidityRange};

use crate::cose;
use crate::data::error_codes;
use crate::definitions::holder::CertificateHolder;
use crate::definitions::state::{
    CheckNationalRulesState, CheckRevocationState, CheckSignatureState, StateError,
    VerificationState,
};
use crate::definitions::trustlist::{Jwks, RevokedCertificates, RuleSet, TrustList};
use std::collections::HashSet;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::warn;

pub struct CertificateVerifier {
    national_rules: NationalRulesVerifier,
    clock: Option<OffsetDateTime>,
}

impl CertificateVerifier {
    pub fn new(national_rules: NationalRulesVerifier) -> Self {
        Self {
            national_rules,
            clock: None,
        }
    }

    /// Pin the verification clock, for deterministic testing. The same instant
    /// drives the CWT timestamp check and the national rules validation clock.
    pub fn with_clock(mut self, clock: OffsetDateTime) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Verify the validity of a certificate: signature, revocation status and
    /// conformity with the national rules.
    ///
    /// The checks run concurrently; their results combine by this precedence:
    /// a check that failed unexpectedly wins (signature before revocation
    /// before national rules), then all-success, then any explicitly invalid
    /// outcome. Whatever validity range the national rules check produced is
    /// attached where it helps a UI. This function never panics and never
    /// returns a raw error; every failure is folded into the returned state.
    pub async fn verify(
        &self,
        holder: &CertificateHolder,
        trust_list: &TrustList,
    ) -> VerificationState {
        let now = self.clock.unwrap_or_else(OffsetDateTime::now_utc);

        let signature_task = tokio::task::spawn_blocking({
            let holder = holder.clone();
            let signatures = trust_list.signatures.clone();
            move || check_signature(&holder, &signatures, now)
        });
        let revocation_task = tokio::task::spawn_blocking({
            let holder = holder.clone();
            let revoked_certificates = trust_list.revoked_certificates.clone();
            move || check_revocation_status(&holder, &revoked_certificates)
        });
        let national_rules_task = tokio::task::spawn_blocking({
            let holder = holder.clone();
            let rule_set = trust_list.rule_set.clone();
            let national_rules = self.national_rules.clone();
            move || check_national_rules(&holder, &national_rules, &rule_set, now)
        });

        let (signature_state, revocation_state, national_rules_state) =
            tokio::join!(signature_task, revocation_task, national_rules_task);

        // A panicked check is an unexpected failure of that check, not of the
        // whole verification.
        let signature_state = signature_state.unwrap_or_else(|e| {
            CheckSignatureState::Error(
                StateError::new(error_codes::SIGNATURE_UNKNOWN)
                    .with_message(e.to_string())
                    .with_holder(holder),
            )
        });
        let revocation_state = revocation_state.unwrap_or_else(|e| {
            CheckRevocationState::Error(
                StateError::new(error_codes::REVOCATION_UNKNOWN)
                    .with_message(e.to_string())
                    .with_holder(holder),
            )
        });
        let national_rules_state = national_rules_state.unwrap_or_else(|e| {
            CheckNationalRulesState::Error(
                StateError::new(error_codes::RULESET_UNKNOWN)
                    .with_message(e.to_string())
                    .with_holder(holder),
            )
        });

        combine(signature_state, revocation_state, national_rules_state)
    }
}

fn combine(
    signature_state: CheckSignatureState,
    revocation_state: CheckRevocationState,
    national_rules_state: CheckNationalRulesState,
) -> VerificationState {
    if let CheckSignatureState::Error(error) = &signature_state {
        warn!(code = error.code, "signature check failed unexpectedly");
        return VerificationState::Error {
            error: error.clone(),
            validity_range: national_rules_state.validity_range().cloned(),
        };
    }
    if let CheckRevocationState::Error(error) = &revocation_state {
        warn!(code = error.code, "revocation check failed unexpectedly");
        return VerificationState::Error {
            error: error.clone(),
            validity_range: national_rules_state.validity_range().cloned(),
        };
    }
    if let CheckNationalRulesState::Error(error) = &national_rules_state {
        warn!(code = error.code, "national rules check failed unexpectedly");
        return VerificationState::Error {
            error: error.clone(),
            validity_range: None,
        };
    }

    if signature_state == CheckSignatureState::Success
        && revocation_state == CheckRevocationState::Success
    {
        if let CheckNationalRulesState::Success(validity_range) = &national_rules_state {
            return VerificationState::Success(validity_range.clone());
        }
    }

    if matches!(signature_state, CheckSignatureState::Invalid { .. })
        || matches!(revocation_state, CheckRevocationState::Invalid { .. })
        || matches!(
            national_rules_state,
            CheckNationalRulesState::Invalid { .. }
                | CheckNationalRulesState::NotYetValid { .. }
                | CheckNationalRulesState::NotValidAnymore { .. }
        )
    {
        let validity_range = national_rules_state.validity_range().cloned();
        return VerificationState::Invalid {
            signature_state,
            revocation_state,
            national_rules_state,
            validity_range,
        };
    }

    // The three checks only produce the states handled above; this is a
    // defensive fallback.
    VerificationState::Loading
}

/// Check that the COSE signature was produced by one of the trusted keys.
///
/// The certificate type and CWT timestamps are checked first: a type-less
/// certificate cannot be signature-checked, and stale timestamps give a more
/// specific error than a failed signature.
fn check_signature(
    holder: &CertificateHolder,
    signatures: &Jwks,
    now: OffsetDateTime,
) -> CheckSignatureState {
    if holder.cert_type().is_none() {
        return CheckSignatureState::Invalid {
            error_code: error_codes::SIGNATURE_TYPE_INVALID,
        };
    }

    if let Some(error_code) = check_timestamps(holder, now) {
        return CheckSignatureState::Invalid { error_code };
    }

    if cose::verify_signature(&signatures.certs, holder.cose_bytes()) {
        CheckSignatureState::Success
    } else {
        CheckSignatureState::Invalid {
            error_code: error_codes::SIGNATURE_COSE_INVALID,
        }
    }
}

/// Expiration wins over not-yet-valid when both hold.
fn check_timestamps(holder: &CertificateHolder, now: OffsetDateTime) -> Option<&'static str> {
    if let Some(expiration_time) = holder.expiration_time() {
        if expiration_time < now {
            return Some(error_codes::SIGNATURE_TIMESTAMP_EXPIRED);
        }
    }
    if let Some(issued_at) = holder.issued_at() {
        if issued_at > now {
            return Some(error_codes::SIGNATURE_TIMESTAMP_NOT_YET_VALID);
        }
    }
    None
}

/// Check every entry's UVCI against the revocation list. Exact string match
/// only. Light certificates carry no UVCI and can never be revoked.
fn check_revocation_status(
    holder: &CertificateHolder,
    revoked_certificates: &RevokedCertificates,
) -> CheckRevocationState {
    if holder.is_light_certificate() {
        return CheckRevocationState::Success;
    }
    let Some(hcert) = holder.hcert() else {
        return CheckRevocationState::Error(
            StateError::new(error_codes::REVOCATION_UNKNOWN)
                .with_message("certificate holder carries no record")
                .with_holder(holder),
        );
    };

    let revoked: HashSet<&str> = revoked_certificates
        .revoked_certs
        .iter()
        .map(String::as_str)
        .collect();
    let is_revoked = hcert
        .certificate_identifiers()
        .any(|identifier| revoked.contains(identifier));

    if is_revoked {
        CheckRevocationState::Invalid {
            error_code: error_codes::REVOCATION_REVOKED,
        }
    } else {
        CheckRevocationState::Success
    }
}

/// Run the rule engine, or derive the window directly from the CWT claims for
/// light certificates, which carry no medical data to evaluate.
fn check_national_rules(
    holder: &CertificateHolder,
    national_rules: &NationalRulesVerifier,
    rule_set: &RuleSet,
    now: OffsetDateTime,
) -> CheckNationalRulesState {
    if holder.is_light_certificate() {
        return CheckNationalRulesState::Success(ValidityRange {
            valid_from: holder.issued_at().map(to_local),
            valid_until: holder.expiration_time().map(to_local),
        });
    }
    let Some(hcert) = holder.hcert() else {
        return CheckNationalRulesState::Error(
            StateError::new(error_codes::RULESET_UNKNOWN)
                .with_message("certificate holder carries no record")
                .with_holder(holder),
        );
    };
    national_rules.verify_at(hcert, rule_set, now)
}

fn to_local(instant: OffsetDateTime) -> PrimitiveDateTime {
    let utc = instant.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::vaccine_provider::{AcceptedVaccines, VaccineProduct};
    use crate::decoder;
    use crate::definitions::state::DecodeState;
    use crate::definitions::trustlist::{
        AcceptanceCriterias, Jwk, RevokedCertificates, RuleSet, RuleValueSets,
    };
    use std::sync::Arc;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2023-06-30 12:00 UTC);
    const EXP: i64 = 1754558999; // 2025-08-07
    const IAT: i64 = 1621596599; // 2021-05-21

    fn provider() -> Arc<AcceptedVaccines> {
        Arc::new(AcceptedVaccines {
            entries: vec![VaccineProduct {
                name: "Spikevax (previously COVID-19 Vaccine Moderna)".to_string(),
                code: "EU/1/20/1507".to_string(),
                prophylaxis: "1119349007".to_string(),
                auth_holder: "ORG-100031184".to_string(),
                total_dosis_number: 2,
            }],
        })
    }

    fn verifier() -> CertificateVerifier {
        CertificateVerifier::new(NationalRulesVerifier::new(provider())).with_clock(NOW)
    }

    fn trust_list(signing_keys: Vec<Jwk>, revoked: Vec<&str>, rules: Vec<crate::definitions::trustlist::Rule>) -> TrustList {
        TrustList {
            signatures: Jwks { certs: signing_keys },
            revoked_certificates: RevokedCertificates {
                revoked_certs: revoked.into_iter().map(str::to_string).collect(),
                valid_duration: i64::MAX,
            },
            rule_set: RuleSet {
                rules,
                value_sets: RuleValueSets {
                    disease_agents: None,
                    test_types: None,
                    test_manufacturers: None,
                    accepted_vaccines: None,
                    one_dose_vaccines_with_offset: None,
                    two_dose_vaccines: None,
                    acceptance_criteria: AcceptanceCriterias {
                        single_vaccine_validity_offset: 21,
                        vaccine_immunity: 364,
                        rat_test_validity: 24,
                        pcr_test_validity: 72,
                        recovery_offset_valid_from: 10,
                        recovery_offset_valid_until: 179,
                    },
                },
                valid_duration: 172_800_000,
            },
        }
    }

    fn decoded(qr: &str) -> CertificateHolder {
        match decoder::decode(qr) {
            DecodeState::Success(holder) => holder,
            DecodeState::Error(e) => panic!("decode failed: {}", e.code),
        }
    }

    fn full_certificate() -> CertificateHolder {
        let qr = decoder::test::frame("HC1:", &decoder::cwt::test::hcert_claims(EXP, IAT));
        decoded(&qr)
    }

    fn light_certificate() -> CertificateHolder {
        let qr = decoder::test::frame("LT1:", &decoder::cwt::test::light_claims(EXP, IAT));
        decoded(&qr)
    }

    #[tokio::test]
    async fn invalid_signature_yields_invalid_with_substates() {
        // The fixture carries a dummy signature, so no key can verify it.
        let state = verifier()
            .verify(&full_certificate(), &trust_list(vec![], vec![], vec![]))
            .await;
        let VerificationState::Invalid {
            signature_state,
            revocation_state,
            national_rules_state,
            ..
        } = state
        else {
            panic!("expected invalid");
        };
        assert_eq!(
            signature_state,
            CheckSignatureState::Invalid {
                error_code: error_codes::SIGNATURE_COSE_INVALID
            }
        );
        assert_eq!(revocation_state, CheckRevocationState::Success);
        assert!(matches!(
            national_rules_state,
            CheckNationalRulesState::Success(_)
        ));
    }

    #[tokio::test]
    async fn revoked_certificate_is_reported_alongside_signature_state() {
        let state = verifier()
            .verify(
                &full_certificate(),
                &trust_list(
                    vec![],
                    vec!["urn:uvci:01:CH:F0FDABC1708A81BB1A843891"],
                    vec![],
                ),
            )
            .await;
        let VerificationState::Invalid {
            revocation_state, ..
        } = state
        else {
            panic!("expected invalid");
        };
        assert_eq!(
            revocation_state,
            CheckRevocationState::Invalid {
                error_code: error_codes::REVOCATION_REVOKED
            }
        );
    }

    #[tokio::test]
    async fn revocation_matching_is_exact_and_case_sensitive() {
        let holder = full_certificate();
        let near_misses = trust_list(
            vec![],
            vec![
                "urn:uvci:01:ch:f0fdabc1708a81bb1a843891",
                "urn:uvci:01:CH:F0FDABC1708A81BB1A84389",
            ],
            vec![],
        );
        let state = verifier().verify(&holder, &near_misses).await;
        let VerificationState::Invalid {
            revocation_state, ..
        } = state
        else {
            panic!("expected invalid (signature)");
        };
        assert_eq!(revocation_state, CheckRevocationState::Success);
    }

    #[tokio::test]
    async fn expired_certificate_reports_the_expiry_code() {
        let qr = decoder::test::frame(
            "HC1:",
            &decoder::cwt::test::hcert_claims(1577836800, IAT), // exp 2020-01-01
        );
        let state = verifier().verify(&decoded(&qr), &trust_list(vec![], vec![], vec![])).await;
        let VerificationState::Invalid {
            signature_state, ..
        } = state
        else {
            panic!("expected invalid");
        };
        assert_eq!(
            signature_state,
            CheckSignatureState::Invalid {
                error_code: error_codes::SIGNATURE_TIMESTAMP_EXPIRED
            }
        );
    }

    #[tokio::test]
    async fn expiry_takes_precedence_over_not_yet_valid() {
        // Expired in the past AND issued in the future: the expiry code wins.
        let qr = decoder::test::frame(
            "HC1:",
            &decoder::cwt::test::hcert_claims(1577836800, 1893456000), // iat 2030
        );
        let state = verifier().verify(&decoded(&qr), &trust_list(vec![], vec![], vec![])).await;
        let VerificationState::Invalid {
            signature_state, ..
        } = state
        else {
            panic!("expected invalid");
        };
        assert_eq!(
            signature_state,
            CheckSignatureState::Invalid {
                error_code: error_codes::SIGNATURE_TIMESTAMP_EXPIRED
            }
        );
    }

    #[tokio::test]
    async fn future_issued_at_reports_not_yet_valid() {
        let qr = decoder::test::frame(
            "HC1:",
            &decoder::cwt::test::hcert_claims(EXP, 1893456000), // iat 2030
        );
        let state = verifier().verify(&decoded(&qr), &trust_list(vec![], vec![], vec![])).await;
        let VerificationState::Invalid {
            signature_state, ..
        } = state
        else {
            panic!("expected invalid");
        };
        assert_eq!(
            signature_state,
            CheckSignatureState::Invalid {
                error_code: error_codes::SIGNATURE_TIMESTAMP_NOT_YET_VALID
            }
        );
    }

    #[tokio::test]
    async fn type_less_certificate_cannot_be_signature_checked() {
        use ciborium::value::Value;
        let record = serde_json::json!({
            "ver": "1.0.0",
            "nam": { "fnt": "MUELLER" },
            "dob": "1943-02-01"
        });
        let claims = decoder::cwt::test::claims_map(vec![
            (4, Value::Integer(EXP.into())),
            (6, Value::Integer(IAT.into())),
            (
                -260,
                decoder::cwt::test::claims_map(vec![(
                    1,
                    decoder::cwt::test::record_value(&record),
                )]),
            ),
        ]);
        let holder = decoded(&decoder::test::frame("HC1:", &claims));
        assert_eq!(holder.cert_type(), None);

        let state = verifier().verify(&holder, &trust_list(vec![], vec![], vec![])).await;
        let VerificationState::Invalid {
            signature_state, ..
        } = state
        else {
            panic!("expected invalid");
        };
        assert_eq!(
            signature_state,
            CheckSignatureState::Invalid {
                error_code: error_codes::SIGNATURE_TYPE_INVALID
            }
        );
    }

    #[tokio::test]
    async fn national_rules_failure_alone_makes_the_outcome_invalid() {
        // Signature cannot succeed here (dummy signature), so isolate the
        // national rules path via a failing window rule and check the combined
        // state carries it.
        let rules = vec![crate::definitions::trustlist::Rule {
            id: "VR-CH-0004".to_string(),
            business_description: None,
            description: "not yet valid".to_string(),
            input_parameter: "payload".to_string(),
            logic: serde_json::json!(false),
        }];
        let state = verifier()
            .verify(&full_certificate(), &trust_list(vec![], vec![], rules))
            .await;
        let VerificationState::Invalid {
            national_rules_state,
            validity_range,
            ..
        } = state
        else {
            panic!("expected invalid");
        };
        assert!(matches!(
            national_rules_state,
            CheckNationalRulesState::NotYetValid { .. }
        ));
        // The best available range is attached to the combined state.
        assert!(validity_range.is_some());
    }

    #[tokio::test]
    async fn light_certificate_window_comes_from_the_cwt_claims() {
        // Signature is invalid (dummy), but the national rules sub-state must
        // carry the CWT-derived window.
        let state = verifier()
            .verify(&light_certificate(), &trust_list(vec![], vec![], vec![]))
            .await;
        let VerificationState::Invalid {
            revocation_state,
            national_rules_state,
            ..
        } = state
        else {
            panic!("expected invalid");
        };
        // Light certificates are never revoked.
        assert_eq!(revocation_state, CheckRevocationState::Success);
        let CheckNationalRulesState::Success(range) = national_rules_state else {
            panic!("expected national rules success");
        };
        assert_eq!(range.valid_from, Some(datetime!(2021-05-21 11:29:59)));
        assert_eq!(range.valid_until, Some(datetime!(2025-08-07 09:29:59)));
    }
}
