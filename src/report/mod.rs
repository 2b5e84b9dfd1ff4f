//! Telemetry charts
//!
//! PNG charts of the telemetry aggregates and of the maintenance lead time distribution.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use strum_macros::EnumIter;

use crate::{compute_lead_times, LeadTimeError, RiskTiers, Sensor, Telemetry};

mod charts;

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("failed to create report folder: {1:?}")]
    Folder(#[source] std::io::Error, PathBuf),
    #[error("failed to draw chart: {0}")]
    Drawing(String),
    #[error("failed to compute the maintenance lead times")]
    LeadTime(#[from] LeadTimeError),
}
type Result<T> = std::result::Result<T, ReportError>;

pub(crate) fn drawing<E: fmt::Display>(e: E) -> ReportError {
    ReportError::Drawing(e.to_string())
}

/// Chart rendering options
#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub out_dir: PathBuf,
    /// image size in pixels
    pub size: (u32, u32),
    pub font: String,
    /// # of histogram bins
    pub bins: usize,
}
impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("charts"),
            size: (1024, 768),
            font: String::from("sans-serif"),
            bins: 30,
        }
    }
}
impl ChartConfig {
    pub fn out_dir<P: AsRef<Path>>(self, out_dir: P) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            ..self
        }
    }
    pub fn size(self, width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..self
        }
    }
    pub fn font<S: Into<String>>(self, font: S) -> Self {
        Self {
            font: font.into(),
            ..self
        }
    }
    pub fn bins(self, bins: usize) -> Self {
        Self {
            bins: bins.max(1),
            ..self
        }
    }
    /// Creates the output folder if it does not exist
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .map_err(|e| ReportError::Folder(e, self.out_dir.clone()))
    }
}

/// Available charts
#[derive(EnumIter, Debug, Clone, Copy, PartialEq)]
pub enum Chart {
    LeadTime,
    Correlation,
    RiskRanking,
    FailureShares,
    MaintenanceRates,
    StatusMaintenance,
    TemperatureByMaintenance,
    TemperatureByStatus,
    VibrationByTier,
    TopRiskTrend,
    SensorDistributions,
    EnvironmentDistributions,
}
impl Chart {
    pub fn filename(&self) -> &'static str {
        match self {
            Chart::LeadTime => "01_lead_time.png",
            Chart::Correlation => "02_correlation.png",
            Chart::RiskRanking => "03_risk_ranking.png",
            Chart::FailureShares => "04_failure_shares.png",
            Chart::MaintenanceRates => "05_maintenance_rates.png",
            Chart::StatusMaintenance => "06_status_maintenance.png",
            Chart::TemperatureByMaintenance => "07_temperature_by_maintenance.png",
            Chart::TemperatureByStatus => "08_temperature_by_status.png",
            Chart::VibrationByTier => "09_vibration_by_tier.png",
            Chart::TopRiskTrend => "10_top_risk_trend.png",
            Chart::SensorDistributions => "11_sensor_distributions.png",
            Chart::EnvironmentDistributions => "12_environment_distributions.png",
        }
    }
}
impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chart::LeadTime => write!(f, "Maintenance lead time"),
            Chart::Correlation => write!(f, "Sensor correlation"),
            Chart::RiskRanking => write!(f, "Machine downtime risk"),
            Chart::FailureShares => write!(f, "Failure types"),
            Chart::MaintenanceRates => write!(f, "Maintenance rates"),
            Chart::StatusMaintenance => write!(f, "Maintenance by machine status"),
            Chart::TemperatureByMaintenance => write!(f, "Temperature by maintenance"),
            Chart::TemperatureByStatus => write!(f, "Temperature by machine status"),
            Chart::VibrationByTier => write!(f, "Vibration by risk tier"),
            Chart::TopRiskTrend => write!(f, "Riskiest machines temperature"),
            Chart::SensorDistributions => write!(f, "Sensor distributions"),
            Chart::EnvironmentDistributions => write!(f, "Environment distributions"),
        }
    }
}

/// Telemetry report
pub struct Report<'a> {
    telemetry: &'a Telemetry,
    config: ChartConfig,
    tiers: RiskTiers,
    lead_times: Vec<f64>,
}
impl<'a> Report<'a> {
    /// Creates the output folder and computes the maintenance lead times
    pub fn new(telemetry: &'a Telemetry, config: ChartConfig, tiers: RiskTiers) -> Result<Self> {
        let lead_times = compute_lead_times(&telemetry.events())?;
        Self::with_lead_times(telemetry, config, tiers, lead_times)
    }
    /// Creates the output folder, reusing already computed lead times in minute
    pub fn with_lead_times(
        telemetry: &'a Telemetry,
        config: ChartConfig,
        tiers: RiskTiers,
        lead_times: Vec<f64>,
    ) -> Result<Self> {
        config.ensure_dir()?;
        Ok(Self {
            telemetry,
            config,
            tiers,
            lead_times,
        })
    }
    pub fn lead_times(&self) -> &[f64] {
        &self.lead_times
    }
    /// Renders a chart and returns the path to the image
    pub fn render(&self, chart: Chart) -> Result<PathBuf> {
        let path = self.config.out_dir.join(chart.filename());
        log::debug!("making figure: {:?}", path);
        let title = chart.to_string();
        let config = &self.config;
        let t = self.telemetry;
        match chart {
            Chart::LeadTime => charts::lead_time(&path, config, &title, &self.lead_times),
            Chart::Correlation => charts::correlation(&path, config, &title, t),
            Chart::RiskRanking => charts::risk_ranking(&path, config, &title, t),
            Chart::FailureShares => charts::failure_shares(&path, config, &title, t),
            Chart::MaintenanceRates => charts::maintenance_rates(&path, config, &title, t),
            Chart::StatusMaintenance => charts::status_maintenance(&path, config, &title, t),
            Chart::TemperatureByMaintenance => {
                charts::temperature_by_maintenance(&path, config, &title, t)
            }
            Chart::TemperatureByStatus => {
                charts::temperature_by_status(&path, config, &title, t)
            }
            Chart::VibrationByTier => {
                charts::vibration_by_tier(&path, config, &title, t, &self.tiers)
            }
            Chart::TopRiskTrend => charts::top_risk_trend(&path, config, &title, t),
            Chart::SensorDistributions => charts::distributions(
                &path,
                config,
                &title,
                t,
                &[
                    Sensor::Temperature,
                    Sensor::Vibration,
                    Sensor::PredictedRemainingLife,
                ],
            ),
            Chart::EnvironmentDistributions => charts::distributions(
                &path,
                config,
                &title,
                t,
                &[
                    Sensor::Humidity,
                    Sensor::Pressure,
                    Sensor::EnergyConsumption,
                ],
            ),
        }?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TelemetryLoader;
    use std::{env, error::Error};
    use strum::IntoEnumIterator;

    #[test]
    fn config_builder() {
        let config = ChartConfig::default()
            .out_dir("out")
            .size(640, 480)
            .font("serif")
            .bins(0);
        assert_eq!(config.out_dir, PathBuf::from("out"));
        assert_eq!(config.size, (640, 480));
        assert_eq!(config.font, "serif");
        assert_eq!(config.bins, 1);
    }

    #[test]
    fn chart_files_are_unique() {
        let mut names: Vec<_> = Chart::iter().map(|c| c.filename()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Chart::iter().count());
    }

    #[test]
    fn report_lead_times() -> std::result::Result<(), Box<dyn Error>> {
        let telemetry = TelemetryLoader::default().data_path("data").load()?;
        let out_dir = env::temp_dir().join("factory-monitors_report");
        let report = Report::new(
            &telemetry,
            ChartConfig::default().out_dir(&out_dir),
            RiskTiers::default(),
        )?;
        assert!(out_dir.is_dir());
        assert_eq!(report.lead_times().len(), 4);
        Ok(())
    }

    #[test]
    fn invalid_events() {
        let telemetry = Telemetry::from(vec![crate::Record::default()]);
        let out_dir = env::temp_dir().join("factory-monitors_invalid");
        let report = Report::new(
            &telemetry,
            ChartConfig::default().out_dir(out_dir),
            RiskTiers::default(),
        );
        assert!(matches!(report, Err(ReportError::LeadTime(_))));
    }

    fn render_all(telemetry: &Telemetry, folder: &str) -> std::result::Result<(), Box<dyn Error>> {
        let out_dir = env::temp_dir().join(folder);
        let config = ChartConfig::default().out_dir(&out_dir).size(640, 480);
        let report = Report::new(telemetry, config, RiskTiers::default())?;
        for chart in Chart::iter() {
            let path = report.render(chart)?;
            assert_eq!(path, out_dir.join(chart.filename()));
            assert!(path.is_file(), "{} not rendered", chart);
        }
        Ok(())
    }

    #[test]
    fn render_charts() -> std::result::Result<(), Box<dyn Error>> {
        let telemetry = TelemetryLoader::default().data_path("data").load()?;
        render_all(&telemetry, "factory-monitors_charts")
    }

    #[test]
    fn render_empty_telemetry() -> std::result::Result<(), Box<dyn Error>> {
        render_all(&Telemetry::default(), "factory-monitors_empty")
    }

    #[test]
    fn render_sparse_record() -> std::result::Result<(), Box<dyn Error>> {
        let record = crate::Record {
            machine_id: Some(String::from("7")),
            timestamp: chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            ..Default::default()
        };
        render_all(&Telemetry::from(vec![record]), "factory-monitors_sparse")
    }

    #[test]
    fn reused_lead_times() -> std::result::Result<(), Box<dyn Error>> {
        let telemetry = TelemetryLoader::default().data_path("data").load()?;
        let out_dir = env::temp_dir().join("factory-monitors_reused");
        let report = Report::with_lead_times(
            &telemetry,
            ChartConfig::default().out_dir(&out_dir),
            RiskTiers::default(),
            vec![5., 10.],
        )?;
        assert_eq!(report.lead_times(), &[5., 10.]);
        assert!(out_dir.is_dir());
        Ok(())
    }
}
