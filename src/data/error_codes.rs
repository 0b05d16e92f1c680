//! Stable error code identifiers.
//!
//! These strings are part of the externally visible contract: verifier apps and
//! support tooling match on them verbatim, so they must never change.

/* Errors during decoding */
pub const DECODE_PREFIX: &str = "D|PRX";
pub const DECODE_BASE_45: &str = "D|B45";
pub const DECODE_Z_LIB: &str = "D|ZLB";
pub const DECODE_COSE: &str = "D|CSE";
pub const DECODE_CBOR: &str = "D|CBR";

/* Errors during signature verification */
pub const SIGNATURE_TIMESTAMP_NOT_YET_VALID: &str = "S|NYV";
pub const SIGNATURE_TIMESTAMP_EXPIRED: &str = "S|EXP";
pub const SIGNATURE_TYPE_INVALID: &str = "S|TIV";
pub const SIGNATURE_COSE_INVALID: &str = "S|CSI";
pub const SIGNATURE_UNKNOWN: &str = "S|UNK";

/* Errors during revocation verification */
pub const REVOCATION_REVOKED: &str = "R|REV";
pub const REVOCATION_UNKNOWN: &str = "R|UNK";

/* Errors during national rules verification */
pub const NO_VALID_DATE: &str = "N|NVD";
pub const NO_VALID_PRODUCT: &str = "N|NVP";
pub const WRONG_DISEASE_TARGET: &str = "N|WDT";
pub const WRONG_TEST_TYPE: &str = "N|WTT";
pub const POSITIVE_RESULT: &str = "N|PR";
pub const NOT_FULLY_PROTECTED: &str = "N|NFP";
pub const RULESET_UNKNOWN: &str = "N|UNK";
pub const TOO_MANY_VACCINE_ENTRIES: &str = "N|TMV";
pub const TOO_MANY_TEST_ENTRIES: &str = "N|TMT";
pub const TOO_MANY_RECOVERY_ENTRIES: &str = "N|TMR";
pub const UNKNOWN_RULE_FAILED: &str = "N|UNK";
