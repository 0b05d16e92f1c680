use crate::definitions::holder::{CertType, CertificateHolder};

/// Determine the certificate type from the decoded record.
///
/// A certificate must represent exactly one life event: across the three
/// medical entry sequences, the total entry count has to be exactly one.
/// Anything else (no entries, or e.g. a test entry next to a recovery entry)
/// has no type. Light certificates are always exactly one event.
pub(crate) fn classify(holder: &CertificateHolder) -> Option<CertType> {
    let mut cert_type = None;
    let mut contained_entries = 0;

    if holder.is_light_certificate() {
        contained_entries = 1;
        cert_type = Some(CertType::Light);
    } else if let Some(hcert) = holder.hcert() {
        if let Some(tests) = &hcert.tests {
            if !tests.is_empty() {
                contained_entries += tests.len();
                cert_type = Some(CertType::Test);
            }
        }
        if let Some(past_infections) = &hcert.past_infections {
            if !past_infections.is_empty() {
                contained_entries += past_infections.len();
                cert_type = Some(CertType::Recovery);
            }
        }
        if let Some(vaccinations) = &hcert.vaccinations {
            if !vaccinations.is_empty() {
                contained_entries += vaccinations.len();
                cert_type = Some(CertType::Vaccination);
            }
        }
    }

    if contained_entries == 1 {
        cert_type
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::healthcert::{
        HealthCert, PersonName, RecoveryEntry, TestEntry, VaccinationEntry, NEGATIVE_CODE,
        TARGET_DISEASE,
    };
    use crate::definitions::light::LightCert;

    fn person() -> PersonName {
        PersonName {
            family_name: Some("Müller".to_string()),
            standardized_family_name: "MUELLER".to_string(),
            given_name: Some("Céline".to_string()),
            standardized_given_name: Some("CELINE".to_string()),
        }
    }

    fn hcert(
        vaccinations: Option<Vec<VaccinationEntry>>,
        tests: Option<Vec<TestEntry>>,
        past_infections: Option<Vec<RecoveryEntry>>,
    ) -> CertificateHolder {
        let cert = HealthCert {
            version: "1.0.0".to_string(),
            person: person(),
            date_of_birth: "1943-02-01".to_string(),
            vaccinations,
            tests,
            past_infections,
        };
        CertificateHolder::from_hcert("HC1:...".to_string(), vec![], cert, None, None, None)
    }

    fn vaccination() -> VaccinationEntry {
        VaccinationEntry {
            disease: TARGET_DISEASE.to_string(),
            vaccine: "1119349007".to_string(),
            medicinal_product: "EU/1/20/1507".to_string(),
            marketing_authorization_holder: "ORG-100031184".to_string(),
            dose_number: 2,
            total_doses: 2,
            vaccination_date: "2021-04-30".to_string(),
            country: "CH".to_string(),
            certificate_issuer: "BAG".to_string(),
            certificate_identifier: "urn:uvci:01:CH:F0FDABC1708A81BB1A843891".to_string(),
        }
    }

    fn test_entry() -> TestEntry {
        TestEntry {
            disease: TARGET_DISEASE.to_string(),
            test_type: "LP6464-4".to_string(),
            naa_test_name: None,
            rat_test_name_and_manufacturer: None,
            timestamp_sample: "2021-06-04T10:30:00Z".to_string(),
            timestamp_result: None,
            result: NEGATIVE_CODE.to_string(),
            test_center: "Testcenter".to_string(),
            country: "CH".to_string(),
            certificate_issuer: "BAG".to_string(),
            certificate_identifier: "urn:uvci:01:CH:73A26BE77E3A5B5D8C8CFA1B".to_string(),
        }
    }

    fn recovery() -> RecoveryEntry {
        RecoveryEntry {
            disease: TARGET_DISEASE.to_string(),
            date_first_positive_test: "2021-03-01".to_string(),
            country_of_test: "CH".to_string(),
            certificate_issuer: "BAG".to_string(),
            valid_from: "2021-03-11".to_string(),
            valid_until: "2021-08-27".to_string(),
            certificate_identifier: "urn:uvci:01:CH:A4B1F8A69B3D6E7C8D9E0F1A".to_string(),
        }
    }

    #[test]
    fn single_entry_certificates_classify_to_their_category() {
        assert_eq!(
            classify(&hcert(Some(vec![vaccination()]), None, None)),
            Some(CertType::Vaccination)
        );
        assert_eq!(
            classify(&hcert(None, Some(vec![test_entry()]), None)),
            Some(CertType::Test)
        );
        assert_eq!(
            classify(&hcert(None, None, Some(vec![recovery()]))),
            Some(CertType::Recovery)
        );
    }

    #[test]
    fn light_certificate_is_always_light() {
        let light = LightCert {
            version: "1.0.0".to_string(),
            person: person(),
            date_of_birth: "1943-02-01".to_string(),
        };
        let holder =
            CertificateHolder::from_light("LT1:...".to_string(), vec![], light, None, None, None);
        assert_eq!(classify(&holder), Some(CertType::Light));
    }

    #[test]
    fn no_entries_has_no_type() {
        assert_eq!(classify(&hcert(None, None, None)), None);
        assert_eq!(classify(&hcert(Some(vec![]), Some(vec![]), Some(vec![]))), None);
    }

    #[test]
    fn multiple_entries_of_one_category_have_no_type() {
        assert_eq!(
            classify(&hcert(Some(vec![vaccination(), vaccination()]), None, None)),
            None
        );
    }

    #[test]
    fn entries_across_categories_have_no_type() {
        // One test plus one recovery: each alone would be valid, together they
        // are not.
        assert_eq!(
            classify(&hcert(None, Some(vec![test_entry()]), Some(vec![recovery()]))),
            None
        );
    }
}
