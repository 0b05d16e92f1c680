//! The EU Digital COVID Certificate payload structure.
//!
//! Field names mirror the wire schema of the `hcert` claim: entries use the
//! two-letter keys defined by the EU schema (`tg`, `mp`, `ci`, ...), and a
//! certificate carries up to three independent entry sequences (`v`, `t`, `r`).

use crate::definitions::trustlist::AcceptanceCriterias;
use crate::data::vaccine_provider::VaccineProduct;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Disease agent code for SARS-CoV-2; the only accepted `tg` value.
pub const TARGET_DISEASE: &str = "840539006";
/// Test result code for "not detected".
pub const NEGATIVE_CODE: &str = "260415000";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCert {
    #[serde(rename = "ver")]
    pub version: String,
    #[serde(rename = "nam")]
    pub person: PersonName,
    #[serde(rename = "dob")]
    pub date_of_birth: String,
    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    pub vaccinations: Option<Vec<VaccinationEntry>>,
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestEntry>>,
    #[serde(rename = "r", skip_serializing_if = "Option::is_none")]
    pub past_infections: Option<Vec<RecoveryEntry>>,
}

impl HealthCert {
    /// All UVCIs contained in this certificate, across every entry category.
    pub fn certificate_identifiers(&self) -> impl Iterator<Item = &str> {
        let v = self.vaccinations.iter().flatten().map(|e| e.certificate_identifier.as_str());
        let t = self.tests.iter().flatten().map(|e| e.certificate_identifier.as_str());
        let r = self.past_infections.iter().flatten().map(|e| e.certificate_identifier.as_str());
        v.chain(t).chain(r)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonName {
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(rename = "fnt")]
    pub standardized_family_name: String,
    #[serde(rename = "gn", skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(rename = "gnt", skip_serializing_if = "Option::is_none")]
    pub standardized_given_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaccinationEntry {
    #[serde(rename = "tg")]
    pub disease: String,
    #[serde(rename = "vp")]
    pub vaccine: String,
    #[serde(rename = "mp")]
    pub medicinal_product: String,
    #[serde(rename = "ma")]
    pub marketing_authorization_holder: String,
    #[serde(rename = "dn")]
    pub dose_number: i32,
    #[serde(rename = "sd")]
    pub total_doses: i32,
    #[serde(rename = "dt")]
    pub vaccination_date: String,
    #[serde(rename = "co")]
    pub country: String,
    #[serde(rename = "is")]
    pub certificate_issuer: String,
    #[serde(rename = "ci")]
    pub certificate_identifier: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestEntry {
    #[serde(rename = "tg")]
    pub disease: String,
    #[serde(rename = "tt")]
    pub test_type: String,
    #[serde(rename = "nm", skip_serializing_if = "Option::is_none")]
    pub naa_test_name: Option<String>,
    #[serde(rename = "ma", skip_serializing_if = "Option::is_none")]
    pub rat_test_name_and_manufacturer: Option<String>,
    #[serde(rename = "sc")]
    pub timestamp_sample: String,
    #[serde(rename = "dr", skip_serializing_if = "Option::is_none")]
    pub timestamp_result: Option<String>,
    #[serde(rename = "tr")]
    pub result: String,
    #[serde(rename = "tc")]
    pub test_center: String,
    #[serde(rename = "co")]
    pub country: String,
    #[serde(rename = "is")]
    pub certificate_issuer: String,
    #[serde(rename = "ci")]
    pub certificate_identifier: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveryEntry {
    #[serde(rename = "tg")]
    pub disease: String,
    #[serde(rename = "fr")]
    pub date_first_positive_test: String,
    #[serde(rename = "co")]
    pub country_of_test: String,
    #[serde(rename = "is")]
    pub certificate_issuer: String,
    #[serde(rename = "df")]
    pub valid_from: String,
    #[serde(rename = "du")]
    pub valid_until: String,
    #[serde(rename = "ci")]
    pub certificate_identifier: String,
}

/// The two accepted test type codes from the `covid-19-lab-test-type` value set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum TestType {
    #[strum(serialize = "LP6464-4")]
    Pcr,
    #[strum(serialize = "LP217198-3")]
    Rat,
}

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

fn parse_date_at_start_of_day(date: &str) -> Option<PrimitiveDateTime> {
    Date::parse(date, DATE_FORMAT).map(Date::midnight).ok()
}

impl VaccinationEntry {
    pub fn is_target_disease_correct(&self) -> bool {
        self.disease == TARGET_DISEASE
    }

    /// A holder whose certificate requires fewer doses than the product normally
    /// needs was vaccinated after a past infection.
    pub fn had_past_infection(&self, vaccine: &VaccineProduct) -> bool {
        vaccine.total_dosis_number > self.total_doses
    }

    pub fn vaccination_date(&self) -> Option<PrimitiveDateTime> {
        parse_date_at_start_of_day(&self.vaccination_date)
    }

    /// Single-shot vaccines without a past infection only protect after an
    /// offset; in every other case protection starts on the vaccination date.
    pub fn valid_from_date(
        &self,
        vaccine: &VaccineProduct,
        criterias: &AcceptanceCriterias,
    ) -> Option<PrimitiveDateTime> {
        let date = self.vaccination_date()?;
        if !self.had_past_infection(vaccine) && vaccine.total_dosis_number == 1 {
            date.checked_add(Duration::days(criterias.single_vaccine_validity_offset))
        } else {
            Some(date)
        }
    }

    pub fn valid_until_date(&self, criterias: &AcceptanceCriterias) -> Option<PrimitiveDateTime> {
        self.vaccination_date()?
            .checked_add(Duration::days(criterias.vaccine_immunity))
    }
}

impl TestEntry {
    pub fn is_target_disease_correct(&self) -> bool {
        self.disease == TARGET_DISEASE
    }

    pub fn is_negative(&self) -> bool {
        self.result == NEGATIVE_CODE
    }

    pub fn sample_date(&self) -> Option<PrimitiveDateTime> {
        let instant = OffsetDateTime::parse(&self.timestamp_sample, &Rfc3339).ok()?;
        let utc = instant.to_offset(UtcOffset::UTC);
        Some(PrimitiveDateTime::new(utc.date(), utc.time()))
    }

    pub fn valid_from_date(&self) -> Option<PrimitiveDateTime> {
        self.sample_date()
    }

    /// Tests expire a fixed number of hours after the sample was taken; the
    /// window depends on the test type, and unknown types have no window.
    pub fn valid_until_date(&self, criterias: &AcceptanceCriterias) -> Option<PrimitiveDateTime> {
        let start = self.valid_from_date()?;
        let hours = match self.test_type.parse::<TestType>().ok()? {
            TestType::Pcr => criterias.pcr_test_validity,
            TestType::Rat => criterias.rat_test_validity,
        };
        start.checked_add(Duration::hours(hours))
    }
}

impl RecoveryEntry {
    pub fn is_target_disease_correct(&self) -> bool {
        self.disease == TARGET_DISEASE
    }

    pub fn first_positive_test_date(&self) -> Option<PrimitiveDateTime> {
        parse_date_at_start_of_day(&self.date_first_positive_test)
    }

    pub fn valid_from_date(&self, criterias: &AcceptanceCriterias) -> Option<PrimitiveDateTime> {
        self.first_positive_test_date()?
            .checked_add(Duration::days(criterias.recovery_offset_valid_from))
    }

    pub fn valid_until_date(&self, criterias: &AcceptanceCriterias) -> Option<PrimitiveDateTime> {
        self.first_positive_test_date()?
            .checked_add(Duration::days(criterias.recovery_offset_valid_until))
    }
}
