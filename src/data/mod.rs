pub mod error_codes;
pub mod vaccine_provider;

pub use vaccine_provider::{AcceptedVaccineProvider, AcceptedVaccines, VaccineProduct};
