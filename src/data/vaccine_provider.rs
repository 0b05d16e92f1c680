use crate::definitions::healthcert::VaccinationEntry;
use serde::{Deserialize, Serialize};

/// Source of vaccine product metadata, keyed by the `mp` (medicinal product) code
/// of a vaccination entry.
///
/// The list itself is distributed out-of-band and refreshed by the caller; the
/// verifier only ever reads it through this trait.
pub trait AcceptedVaccineProvider {
    fn vaccine_data_for(&self, entry: &VaccinationEntry) -> Option<VaccineProduct>;

    fn vaccine_name(&self, entry: &VaccinationEntry) -> Option<String> {
        self.vaccine_data_for(entry).map(|v| v.name)
    }

    fn prophylaxis(&self, entry: &VaccinationEntry) -> Option<String> {
        self.vaccine_data_for(entry).map(|v| v.prophylaxis)
    }

    fn auth_holder(&self, entry: &VaccinationEntry) -> Option<String> {
        self.vaccine_data_for(entry).map(|v| v.auth_holder)
    }
}

/// List-backed implementation of [AcceptedVaccineProvider], matching the JSON
/// document shape the accepted-vaccines list is published in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptedVaccines {
    pub entries: Vec<VaccineProduct>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaccineProduct {
    pub name: String,
    pub code: String,
    pub prophylaxis: String,
    pub auth_holder: String,
    /// Number of doses this product requires for full protection. This may be
    /// larger than the `sd` field of a certificate entry, in which case the
    /// holder had a past infection and was vaccinated with a reduced schedule.
    pub total_dosis_number: i32,
}

impl AcceptedVaccineProvider for AcceptedVaccines {
    fn vaccine_data_for(&self, entry: &VaccinationEntry) -> Option<VaccineProduct> {
        self.entries
            .iter()
            .find(|v| v.code == entry.medicinal_product)
            .cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::healthcert::VaccinationEntry;

    fn vaccination(mp: &str) -> VaccinationEntry {
        VaccinationEntry {
            disease: "840539006".to_string(),
            vaccine: "1119349007".to_string(),
            medicinal_product: mp.to_string(),
            marketing_authorization_holder: "ORG-100031184".to_string(),
            dose_number: 2,
            total_doses: 2,
            vaccination_date: "2021-04-30".to_string(),
            country: "CH".to_string(),
            certificate_issuer: "BAG".to_string(),
            certificate_identifier: "urn:uvci:01:CH:F0FDABC1708A81BB1A843891".to_string(),
        }
    }

    fn provider() -> AcceptedVaccines {
        serde_json::from_value(serde_json::json!({
            "entries": [
                {
                    "name": "Spikevax (previously COVID-19 Vaccine Moderna)",
                    "code": "EU/1/20/1507",
                    "prophylaxis": "1119349007",
                    "auth_holder": "ORG-100031184",
                    "total_dosis_number": 2
                },
                {
                    "name": "COVID-19 Vaccine Janssen",
                    "code": "EU/1/20/1525",
                    "prophylaxis": "J07BX03",
                    "auth_holder": "ORG-100001417",
                    "total_dosis_number": 1
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn looks_up_by_product_code() {
        let provider = provider();
        let product = provider.vaccine_data_for(&vaccination("EU/1/20/1507")).unwrap();
        assert_eq!(product.total_dosis_number, 2);
        assert_eq!(provider.vaccine_name(&vaccination("EU/1/20/1525")).unwrap(), "COVID-19 Vaccine Janssen");
    }

    #[test]
    fn unknown_product_code() {
        assert!(provider().vaccine_data_for(&vaccination("EU/0/00/000")).is_none());
    }
}
