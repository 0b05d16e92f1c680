use crate::definitions::healthcert::HealthCert;
use crate::definitions::light::LightCert;
use std::sync::OnceLock;
use time::OffsetDateTime;

/// The category a decoded certificate belongs to.
///
/// A certificate is only usable when it represents exactly one life event in
/// exactly one category; see [crate::decoder::cert_type].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CertType {
    Light,
    Vaccination,
    Test,
    Recovery,
}

impl CertType {
    /// The scope letter used in a signing key's `use` field.
    pub fn use_code(&self) -> &'static str {
        match self {
            CertType::Light => "l",
            CertType::Vaccination => "v",
            CertType::Test => "t",
            CertType::Recovery => "r",
        }
    }
}

/// A successfully decoded certificate.
///
/// Holds the original QR payload and the raw COSE bytes recovered during
/// decoding, so that signature verification can work on the exact signed bytes
/// without re-running the decode chain. Exactly one of the full or light
/// record is present; the constructors enforce this.
///
/// The certificate type is assigned once by the classifier after construction
/// and is immutable afterwards.
#[derive(Debug, Clone)]
pub struct CertificateHolder {
    qr_code_data: String,
    cose_bytes: Vec<u8>,
    hcert: Option<HealthCert>,
    light: Option<LightCert>,
    expiration_time: Option<OffsetDateTime>,
    issued_at: Option<OffsetDateTime>,
    issuer: Option<String>,
    cert_type: OnceLock<CertType>,
}

impl CertificateHolder {
    pub(crate) fn from_hcert(
        qr_code_data: String,
        cose_bytes: Vec<u8>,
        hcert: HealthCert,
        expiration_time: Option<OffsetDateTime>,
        issued_at: Option<OffsetDateTime>,
        issuer: Option<String>,
    ) -> Self {
        Self {
            qr_code_data,
            cose_bytes,
            hcert: Some(hcert),
            light: None,
            expiration_time,
            issued_at,
            issuer,
            cert_type: OnceLock::new(),
        }
    }

    pub(crate) fn from_light(
        qr_code_data: String,
        cose_bytes: Vec<u8>,
        light: LightCert,
        expiration_time: Option<OffsetDateTime>,
        issued_at: Option<OffsetDateTime>,
        issuer: Option<String>,
    ) -> Self {
        Self {
            qr_code_data,
            cose_bytes,
            hcert: None,
            light: Some(light),
            expiration_time,
            issued_at,
            issuer,
            cert_type: OnceLock::new(),
        }
    }

    pub fn qr_code_data(&self) -> &str {
        &self.qr_code_data
    }

    /// The COSE_Sign1 bytes this certificate was decoded from.
    pub fn cose_bytes(&self) -> &[u8] {
        &self.cose_bytes
    }

    pub fn hcert(&self) -> Option<&HealthCert> {
        self.hcert.as_ref()
    }

    pub fn light(&self) -> Option<&LightCert> {
        self.light.as_ref()
    }

    pub fn expiration_time(&self) -> Option<OffsetDateTime> {
        self.expiration_time
    }

    pub fn issued_at(&self) -> Option<OffsetDateTime> {
        self.issued_at
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn is_full_certificate(&self) -> bool {
        self.hcert.is_some()
    }

    pub fn is_light_certificate(&self) -> bool {
        self.light.is_some()
    }

    /// The classified certificate type, or `None` if classification rejected
    /// the certificate (zero or multiple populated categories).
    pub fn cert_type(&self) -> Option<CertType> {
        self.cert_type.get().copied()
    }

    /// Write-once; a second assignment is ignored.
    pub(crate) fn set_cert_type(&self, cert_type: CertType) {
        let _ = self.cert_type.set(cert_type);
    }
}

impl PartialEq for CertificateHolder {
    fn eq(&self, other: &Self) -> bool {
        self.qr_code_data == other.qr_code_data
            && self.hcert == other.hcert
            && self.light == other.light
    }
}

impl Eq for CertificateHolder {}
