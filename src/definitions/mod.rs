pub mod healthcert;
pub mod holder;
pub mod light;
pub mod state;
pub mod trustlist;

pub use healthcert::{HealthCert, PersonName, RecoveryEntry, TestEntry, TestType, VaccinationEntry};
pub use holder::{CertType, CertificateHolder};
pub use light::LightCert;
pub use state::{
    CheckNationalRulesState, CheckRevocationState, CheckSignatureState, DecodeState, StateError,
    VerificationState,
};
pub use trustlist::{
    AcceptanceCriterias, CertLogicData, CertLogicExternalInfo, CertLogicPayload, Jwk, Jwks,
    RevokedCertificates, Rule, RuleSet, RuleValueSets, TrustList,
};
