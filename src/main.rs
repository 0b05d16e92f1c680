use anyhow::{bail, Error};
use clap::Parser;
use clap_stdin::MaybeStdin;
use hcert::{DecodeState, HealthCert, LightCert};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Decode a scanned certificate and print it as JSON.
    Decode {
        /// The QR code payload, starting with "HC1:" or "LT1:".
        qr_code_data: MaybeStdin<String>,
    },
}

#[derive(Serialize)]
struct DecodedCertificate<'a> {
    cert_type: Option<&'static str>,
    issuer: Option<&'a str>,
    issued_at: Option<String>,
    expiration_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    certificate: Option<&'a HealthCert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    light_certificate: Option<&'a LightCert>,
}

fn main() -> Result<(), Error> {
    match Args::parse().action {
        Action::Decode { qr_code_data } => decode(qr_code_data.trim()),
    }
}

fn decode(qr_code_data: &str) -> Result<(), Error> {
    let holder = match hcert::decode(qr_code_data) {
        DecodeState::Success(holder) => holder,
        DecodeState::Error(error) => bail!("could not decode certificate: {}", error.code),
    };

    let decoded = DecodedCertificate {
        cert_type: holder.cert_type().map(|t| t.use_code()),
        issuer: holder.issuer(),
        issued_at: holder.issued_at().map(|t| t.to_string()),
        expiration_time: holder.expiration_time().map(|t| t.to_string()),
        certificate: holder.hcert(),
        light_certificate: holder.light(),
    };
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}
