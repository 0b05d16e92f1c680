//! Evaluation of the national rule set against a certificate.
//!
//! Rules run in list order and the first falsy rule decides the outcome; its
//! id maps to a semantic error category. When every rule passes, the
//! certificate's validity window is derived from its single entry.

use crate::certlogic;
use crate::data::error_codes;
use crate::data::vaccine_provider::AcceptedVaccineProvider;
use crate::definitions::healthcert::HealthCert;
use crate::definitions::state::{CheckNationalRulesState, StateError};
use crate::definitions::trustlist::{
    AcceptanceCriterias, CertLogicData, CertLogicExternalInfo, CertLogicPayload, Rule, RuleSet,
};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::warn;

/// The date window during which a certificate is valid. Either endpoint can be
/// missing when the underlying entry carries an unusable date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidityRange {
    pub valid_from: Option<PrimitiveDateTime>,
    pub valid_until: Option<PrimitiveDateTime>,
}

/// Semantic category of a failed rule, with a stable error code and a short
/// diagnostic message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NationalRulesError {
    NoValidDate,
    NoValidProduct,
    WrongDiseaseTarget,
    WrongTestType,
    PositiveResult,
    NotFullyProtected,
    TooManyVaccineEntries,
    TooManyTestEntries,
    TooManyRecoveryEntries,
    UnknownRuleFailed,
}

impl NationalRulesError {
    pub fn message(&self) -> &'static str {
        match self {
            NationalRulesError::NoValidDate => "Not a valid date format",
            NationalRulesError::NoValidProduct => "Product is not registered",
            NationalRulesError::WrongDiseaseTarget => "Only SarsCov2 is a valid disease target",
            NationalRulesError::WrongTestType => "Test type invalid",
            NationalRulesError::PositiveResult => "Test result was positive",
            NationalRulesError::NotFullyProtected => {
                "Missing vaccine shots, only partially protected"
            }
            NationalRulesError::TooManyVaccineEntries => {
                "Certificate contains more than one vaccine entry"
            }
            NationalRulesError::TooManyTestEntries => {
                "Certificate contains more than one test entry"
            }
            NationalRulesError::TooManyRecoveryEntries => {
                "Certificate contains more than one recovery entry"
            }
            NationalRulesError::UnknownRuleFailed => "An unknown rule failed to verify",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            NationalRulesError::NoValidDate => error_codes::NO_VALID_DATE,
            NationalRulesError::NoValidProduct => error_codes::NO_VALID_PRODUCT,
            NationalRulesError::WrongDiseaseTarget => error_codes::WRONG_DISEASE_TARGET,
            NationalRulesError::WrongTestType => error_codes::WRONG_TEST_TYPE,
            NationalRulesError::PositiveResult => error_codes::POSITIVE_RESULT,
            NationalRulesError::NotFullyProtected => error_codes::NOT_FULLY_PROTECTED,
            NationalRulesError::TooManyVaccineEntries => error_codes::TOO_MANY_VACCINE_ENTRIES,
            NationalRulesError::TooManyTestEntries => error_codes::TOO_MANY_TEST_ENTRIES,
            NationalRulesError::TooManyRecoveryEntries => error_codes::TOO_MANY_RECOVERY_ENTRIES,
            NationalRulesError::UnknownRuleFailed => error_codes::UNKNOWN_RULE_FAILED,
        }
    }
}

#[derive(Clone)]
pub struct NationalRulesVerifier {
    vaccine_provider: Arc<dyn AcceptedVaccineProvider + Send + Sync>,
    clock: Option<OffsetDateTime>,
}

impl NationalRulesVerifier {
    pub fn new(vaccine_provider: Arc<dyn AcceptedVaccineProvider + Send + Sync>) -> Self {
        Self {
            vaccine_provider,
            clock: None,
        }
    }

    /// Pin the validation clock, for deterministic evaluation.
    pub fn with_clock(mut self, clock: OffsetDateTime) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn verify(&self, hcert: &HealthCert, rule_set: &RuleSet) -> CheckNationalRulesState {
        self.verify_at(
            hcert,
            rule_set,
            self.clock.unwrap_or_else(OffsetDateTime::now_utc),
        )
    }

    pub fn verify_at(
        &self,
        hcert: &HealthCert,
        rule_set: &RuleSet,
        now: OffsetDateTime,
    ) -> CheckNationalRulesState {
        let data = match evaluation_context(hcert, rule_set, now) {
            Ok(data) => data,
            Err(message) => {
                return CheckNationalRulesState::Error(
                    StateError::new(error_codes::RULESET_UNKNOWN).with_message(message),
                )
            }
        };

        for rule in &rule_set.rules {
            match certlogic::evaluate(&rule.logic, &data) {
                Ok(result) if certlogic::is_truthy(&result) => continue,
                Ok(_) => return self.error_state_for_rule(rule, hcert, rule_set),
                Err(e) => {
                    // A malformed rule must not take down the whole check.
                    warn!(rule = %rule.id, "rule evaluation failed: {e}");
                    return CheckNationalRulesState::Invalid {
                        error: NationalRulesError::UnknownRuleFailed,
                        rule_id: Some(rule.id.clone()),
                    };
                }
            }
        }

        match self.validity_range(hcert, &rule_set.value_sets.acceptance_criteria) {
            Some(validity_range) => CheckNationalRulesState::Success(validity_range),
            None => CheckNationalRulesState::Invalid {
                error: NationalRulesError::NoValidDate,
                rule_id: None,
            },
        }
    }

    fn error_state_for_rule(
        &self,
        rule: &Rule,
        hcert: &HealthCert,
        rule_set: &RuleSet,
    ) -> CheckNationalRulesState {
        let rule_id = Some(rule.id.clone());
        let invalid = |error| CheckNationalRulesState::Invalid {
            error,
            rule_id: rule_id.clone(),
        };
        // Window rules degrade to "no valid date" when the range itself cannot
        // be computed.
        let not_yet_valid = || {
            self.validity_range(hcert, &rule_set.value_sets.acceptance_criteria)
                .map(|validity_range| CheckNationalRulesState::NotYetValid {
                    validity_range,
                    rule_id: rule_id.clone(),
                })
                .unwrap_or_else(|| invalid(NationalRulesError::NoValidDate))
        };
        let not_valid_anymore = || {
            self.validity_range(hcert, &rule_set.value_sets.acceptance_criteria)
                .map(|validity_range| CheckNationalRulesState::NotValidAnymore {
                    validity_range,
                    rule_id: rule_id.clone(),
                })
                .unwrap_or_else(|| invalid(NationalRulesError::NoValidDate))
        };

        match rule.id.as_str() {
            "GR-CH-0001" => invalid(NationalRulesError::WrongDiseaseTarget),
            "VR-CH-0000" => invalid(NationalRulesError::TooManyVaccineEntries),
            "VR-CH-0001" => invalid(NationalRulesError::NotFullyProtected),
            "VR-CH-0002" => invalid(NationalRulesError::NoValidProduct),
            "VR-CH-0003" => invalid(NationalRulesError::NoValidDate),
            "VR-CH-0004" => not_yet_valid(),
            "VR-CH-0005" => not_yet_valid(),
            "VR-CH-0006" => not_valid_anymore(),
            "TR-CH-0000" => invalid(NationalRulesError::TooManyTestEntries),
            "TR-CH-0001" => invalid(NationalRulesError::PositiveResult),
            "TR-CH-0002" => invalid(NationalRulesError::WrongTestType),
            "TR-CH-0003" => invalid(NationalRulesError::NoValidProduct),
            "TR-CH-0004" => invalid(NationalRulesError::NoValidDate),
            "TR-CH-0005" => not_yet_valid(),
            "TR-CH-0006" => not_valid_anymore(),
            "TR-CH-0007" => not_valid_anymore(),
            "RR-CH-0000" => invalid(NationalRulesError::TooManyRecoveryEntries),
            "RR-CH-0001" => invalid(NationalRulesError::NoValidDate),
            "RR-CH-0002" => not_yet_valid(),
            "RR-CH-0003" => not_valid_anymore(),
            _ => invalid(NationalRulesError::UnknownRuleFailed),
        }
    }

    /// Derive the validity window from the certificate's single entry. First
    /// matching category wins: vaccination, then test, then recovery.
    fn validity_range(
        &self,
        hcert: &HealthCert,
        criterias: &AcceptanceCriterias,
    ) -> Option<ValidityRange> {
        if let Some(vaccination) = hcert.vaccinations.as_deref().and_then(|entries| entries.first()) {
            let vaccine = self.vaccine_provider.vaccine_data_for(vaccination)?;
            return Some(ValidityRange {
                valid_from: vaccination.valid_from_date(&vaccine, criterias),
                valid_until: vaccination.valid_until_date(criterias),
            });
        }
        if let Some(test) = hcert.tests.as_deref().and_then(|entries| entries.first()) {
            return Some(ValidityRange {
                valid_from: test.valid_from_date(),
                valid_until: test.valid_until_date(criterias),
            });
        }
        if let Some(recovery) = hcert.past_infections.as_deref().and_then(|entries| entries.first()) {
            return Some(ValidityRange {
                valid_from: recovery.valid_from_date(criterias),
                valid_until: recovery.valid_until_date(criterias),
            });
        }
        None
    }
}

fn evaluation_context(
    hcert: &HealthCert,
    rule_set: &RuleSet,
    now: OffsetDateTime,
) -> Result<serde_json::Value, String> {
    let now = now.to_offset(UtcOffset::UTC);
    let validation_clock = now.format(&Rfc3339).map_err(|e| e.to_string())?;
    let validation_clock_at_start_of_day = now
        .replace_time(Time::MIDNIGHT)
        .format(&Rfc3339)
        .map_err(|e| e.to_string())?;

    let data = CertLogicData {
        payload: CertLogicPayload {
            r: hcert.past_infections.as_deref(),
            t: hcert.tests.as_deref(),
            v: hcert.vaccinations.as_deref(),
        },
        external: CertLogicExternalInfo {
            value_sets: &rule_set.value_sets,
            validation_clock,
            validation_clock_at_start_of_day,
        },
    };
    serde_json::to_value(&data).map_err(|e| e.to_string())
}
