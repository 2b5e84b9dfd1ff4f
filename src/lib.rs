//! # Smart factory monitors
//!
//! Loads the IoT telemetry of a fleet of machines and analyzes it:
//!  - the maintenance lead time, i.e. the time between a maintenance event
//!    and the most recent downtime-risk signal of the same machine,
//!  - sensor statistics and correlations,
//!  - machine risk ranking, remaining life tiers and the urgent inspection list.
//!
//! Charts are rendered with the `plot` feature and the telemetry can be turned into
//! a [polars](https://docs.rs/polars) data frame with the `polars` feature.
//!
//! ```no_run
//! use factory_monitors::{compute_lead_times, TelemetryLoader};
//!
//! let telemetry = TelemetryLoader::default().data_path("data").load()?;
//! let lead_times = compute_lead_times(&telemetry.events())?;
//! # Ok::<(), factory_monitors::Error>(())
//! ```

pub mod analysis;
pub mod error;
pub mod lead_time;
#[cfg(feature = "plot")]
pub mod report;
pub mod stats;
pub mod telemetry;

pub use analysis::{ExclusionReport, ExclusionRule, Factor, RiskTier, RiskTiers, Sensor};
pub use error::Error;
pub use lead_time::{
    compute_lead_times, lead_time_samples, EventRecord, LeadTimeError, LeadTimeSample,
};
pub use stats::{ecdf, pearson, Histogram, Quartiles, Stats};
pub use telemetry::{MachineStatus, Record, Telemetry, TelemetryError, TelemetryLoader};

/// Loads the telemetry and pairs every maintenance event with its lead time
pub fn load_lead_times(
    loader: TelemetryLoader,
) -> Result<(Telemetry, Vec<LeadTimeSample>), Error> {
    let telemetry = loader.load()?;
    let samples = lead_time_samples(&telemetry.events())?;
    Ok((telemetry, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_times_from_loader() -> Result<(), Error> {
        let (telemetry, samples) = load_lead_times(TelemetryLoader::default().data_path("data"))?;
        assert_eq!(telemetry.len(), 24);
        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.minutes > 0.));
        Ok(())
    }

    #[test]
    fn missing_file() {
        let loader = TelemetryLoader::default().path("data/missing.csv");
        assert!(matches!(
            load_lead_times(loader),
            Err(Error::Telemetry(TelemetryError::Io(..)))
        ));
    }
}
