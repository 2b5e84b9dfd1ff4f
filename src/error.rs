use crate::{lead_time::LeadTimeError, telemetry::TelemetryError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `telemetry` module")]
    Telemetry(#[from] TelemetryError),
    #[error("Error in the `lead_time` module")]
    LeadTime(#[from] LeadTimeError),
    #[cfg(feature = "plot")]
    #[error("Error in the `report` module")]
    Report(#[from] crate::report::ReportError),
}
