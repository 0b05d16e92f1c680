//! Terminal outcome types for decoding and verification.
//!
//! Every entry point returns one of these fully typed states; no error type
//! ever escapes raw. The `Loading` variants exist so that a UI can hold the
//! combined state of an in-flight verification in the same type.

use crate::definitions::holder::CertificateHolder;
use crate::verifier::national_rules::{NationalRulesError, ValidityRange};

/// A tagged failure with one of the stable error codes from
/// [crate::data::error_codes], an optional diagnostic message, and the
/// offending certificate when one was available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateError {
    pub code: &'static str,
    pub message: Option<String>,
    pub holder: Option<CertificateHolder>,
}

impl StateError {
    pub fn new(code: &'static str) -> Self {
        Self {
            code,
            message: None,
            holder: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_holder(mut self, holder: &CertificateHolder) -> Self {
        self.holder = Some(holder.clone());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DecodeState {
    Success(CertificateHolder),
    Error(StateError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckSignatureState {
    Success,
    Invalid { error_code: &'static str },
    Loading,
    Error(StateError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckRevocationState {
    Success,
    Invalid { error_code: &'static str },
    Loading,
    Error(StateError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckNationalRulesState {
    Success(ValidityRange),
    NotYetValid {
        validity_range: ValidityRange,
        rule_id: Option<String>,
    },
    NotValidAnymore {
        validity_range: ValidityRange,
        rule_id: Option<String>,
    },
    Invalid {
        error: NationalRulesError,
        rule_id: Option<String>,
    },
    Loading,
    Error(StateError),
}

impl CheckNationalRulesState {
    pub fn validity_range(&self) -> Option<&ValidityRange> {
        match self {
            CheckNationalRulesState::Success(range) => Some(range),
            CheckNationalRulesState::NotYetValid { validity_range, .. } => Some(validity_range),
            CheckNationalRulesState::NotValidAnymore { validity_range, .. } => Some(validity_range),
            _ => None,
        }
    }
}

/// The combined outcome of the three verification checks, per the precedence
/// described on [crate::verifier::CertificateVerifier::verify].
#[derive(Clone, Debug, PartialEq)]
pub enum VerificationState {
    Success(ValidityRange),
    Invalid {
        signature_state: CheckSignatureState,
        revocation_state: CheckRevocationState,
        national_rules_state: CheckNationalRulesState,
        validity_range: Option<ValidityRange>,
    },
    Loading,
    Error {
        error: StateError,
        validity_range: Option<ValidityRange>,
    },
}
