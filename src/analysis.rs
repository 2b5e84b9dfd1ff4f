//! Telemetry aggregates
//!
//! Correlations, per machine risk ranking, failure shares, maintenance rates,
//! risk tiers and the urgent inspection list.

use chrono::{NaiveDateTime, Timelike};
use std::{collections::BTreeMap, fmt};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::{pearson, Record, Telemetry};

/// Numeric telemetry columns
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sensor {
    Temperature,
    Vibration,
    Humidity,
    Pressure,
    EnergyConsumption,
    PredictedRemainingLife,
    MachineStatus,
    AnomalyFlag,
    DowntimeRisk,
    MaintenanceRequired,
}
impl Sensor {
    /// The physical measurements, without status codes and flags
    pub fn sensors() -> impl Iterator<Item = Sensor> {
        Sensor::iter().take(6)
    }
    pub fn value(&self, record: &Record) -> Option<f64> {
        let flag = |x: bool| Some(if x { 1f64 } else { 0f64 });
        match self {
            Sensor::Temperature => record.temperature,
            Sensor::Vibration => record.vibration,
            Sensor::Humidity => record.humidity,
            Sensor::Pressure => record.pressure,
            Sensor::EnergyConsumption => record.energy_consumption,
            Sensor::PredictedRemainingLife => record.predicted_remaining_life,
            Sensor::MachineStatus => record.machine_status.map(|x| x as f64),
            Sensor::AnomalyFlag => flag(record.anomaly_flag),
            Sensor::DowntimeRisk => flag(record.downtime_risk),
            Sensor::MaintenanceRequired => flag(record.maintenance_required),
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            Sensor::Temperature => "Temperature [C]",
            Sensor::Vibration => "Vibration [mm/s]",
            Sensor::Humidity => "Humidity [%]",
            Sensor::Pressure => "Pressure",
            Sensor::EnergyConsumption => "Energy",
            Sensor::PredictedRemainingLife => "Remaining life",
            Sensor::MachineStatus => "Machine status",
            Sensor::AnomalyFlag => "Anomaly",
            Sensor::DowntimeRisk => "Downtime risk",
            Sensor::MaintenanceRequired => "Maintenance",
        }
    }
}
impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sensor::Temperature => "temperature",
            Sensor::Vibration => "vibration",
            Sensor::Humidity => "humidity",
            Sensor::Pressure => "pressure",
            Sensor::EnergyConsumption => "energy_consumption",
            Sensor::PredictedRemainingLife => "predicted_remaining_life",
            Sensor::MachineStatus => "machine_status",
            Sensor::AnomalyFlag => "anomaly_flag",
            Sensor::DowntimeRisk => "downtime_risk",
            Sensor::MaintenanceRequired => "maintenance_required",
        };
        write!(f, "{}", name)
    }
}

/// Pairwise Pearson correlation of telemetry columns
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub sensors: Vec<Sensor>,
    /// row major, `None` where the correlation is undefined
    pub values: Vec<Option<f64>>,
}
impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values[i * self.sensors.len() + j]
    }
}

/// Categorical columns the maintenance rate is conditioned on
#[derive(EnumIter, Debug, Clone, Copy, PartialEq)]
pub enum Factor {
    MachineStatus,
    AnomalyFlag,
    DowntimeRisk,
}
impl Factor {
    fn code(&self, record: &Record) -> Option<i64> {
        match self {
            Factor::MachineStatus => record.machine_status,
            Factor::AnomalyFlag => Some(record.anomaly_flag as i64),
            Factor::DowntimeRisk => Some(record.downtime_risk as i64),
        }
    }
}
impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::MachineStatus => write!(f, "machine_status"),
            Factor::AnomalyFlag => write!(f, "anomaly_flag"),
            Factor::DowntimeRisk => write!(f, "downtime_risk"),
        }
    }
}

/// Remaining life tier
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskTier {
    Normal,
    Warning,
    Critical,
}
impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Normal => write!(f, "Normal"),
            RiskTier::Warning => write!(f, "Warning"),
            RiskTier::Critical => write!(f, "Critical"),
        }
    }
}

/// Remaining life thresholds of the risk tiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskTiers {
    /// remaining life at or below which a machine is critical
    pub critical: f64,
    /// remaining life at or below which a machine needs attention
    pub warning: f64,
}
impl Default for RiskTiers {
    fn default() -> Self {
        Self {
            critical: 15f64,
            warning: 45f64,
        }
    }
}
impl RiskTiers {
    pub fn new(critical: f64, warning: f64) -> Self {
        Self { critical, warning }
    }
    pub fn classify(&self, remaining_life: f64) -> RiskTier {
        if remaining_life <= self.critical {
            RiskTier::Critical
        } else if remaining_life <= self.warning {
            RiskTier::Warning
        } else {
            RiskTier::Normal
        }
    }
}

/// Rows removed before checking for unexplained maintenance requests
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionRule {
    /// machine status codes to exclude
    pub statuses: Vec<i64>,
    /// temperature at or above which a row is excluded
    pub temperature: f64,
    /// vibration at or above which a row is excluded
    pub vibration: f64,
    /// remaining life at or below which a row is excluded
    pub remaining_life: f64,
}
impl Default for ExclusionRule {
    fn default() -> Self {
        Self {
            statuses: vec![0, 1],
            temperature: 90f64,
            vibration: 80f64,
            remaining_life: 20f64,
        }
    }
}
impl ExclusionRule {
    pub fn excludes(&self, record: &Record) -> bool {
        record
            .machine_status
            .is_some_and(|s| self.statuses.contains(&s))
            || record.temperature.is_some_and(|t| t >= self.temperature)
            || record.vibration.is_some_and(|v| v >= self.vibration)
            || record
                .predicted_remaining_life
                .is_some_and(|l| l <= self.remaining_life)
    }
}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusionReport {
    pub total: usize,
    pub remaining: usize,
    /// # of remaining rows requiring maintenance
    pub maintenance_required: usize,
}
impl fmt::Display for ExclusionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |n: usize, d: usize| 1e2 * n as f64 / d.max(1) as f64;
        writeln!(f, " - rows: {}", self.total)?;
        writeln!(
            f,
            " - remaining rows: {} ({:.2}%)",
            self.remaining,
            pct(self.remaining, self.total)
        )?;
        write!(
            f,
            " - remaining rows requiring maintenance: {} ({:.2}%)",
            self.maintenance_required,
            pct(self.maintenance_required, self.remaining)
        )
    }
}

impl Telemetry {
    /// Sensor values, missing values are skipped
    pub fn values(&self, sensor: Sensor) -> Vec<f64> {
        self.iter().filter_map(|r| sensor.value(r)).collect()
    }
    /// Sensor column with missing values
    pub fn column(&self, sensor: Sensor) -> Vec<Option<f64>> {
        self.iter().map(|r| sensor.value(r)).collect()
    }
    pub fn correlation(&self, sensors: &[Sensor]) -> CorrelationMatrix {
        let columns: Vec<Vec<f64>> = sensors
            .iter()
            .map(|s| {
                self.column(*s)
                    .into_iter()
                    .map(|x| x.unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();
        let values = columns
            .iter()
            .flat_map(|x| columns.iter().map(move |y| pearson(x, y)))
            .collect();
        CorrelationMatrix {
            sensors: sensors.to_vec(),
            values,
        }
    }
    /// Mean downtime risk per machine, riskiest first
    pub fn risk_ranking(&self) -> Vec<(String, f64)> {
        let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for record in self.iter() {
            if let Some(id) = record.machine_id.as_deref() {
                let (n, risk) = groups.entry(id).or_default();
                *n += 1;
                *risk += record.downtime_risk as usize;
            }
        }
        let mut ranking: Vec<_> = groups
            .into_iter()
            .map(|(id, (n, risk))| (id.to_string(), risk as f64 / n as f64))
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking
    }
    /// Number of records per failure type, most frequent first
    pub fn failure_shares(&self, include_normal: bool) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        self.iter()
            .filter(|r| include_normal || r.has_failed())
            .filter_map(|r| r.failure_type.as_deref())
            .filter(|f| !f.is_empty())
            .for_each(|f| *counts.entry(f).or_default() += 1);
        let mut shares: Vec<_> = counts
            .into_iter()
            .map(|(f, n)| (f.to_string(), n))
            .collect();
        shares.sort_by(|a, b| b.1.cmp(&a.1));
        shares
    }
    /// Percentage of records requiring maintenance for each value of the factor
    pub fn maintenance_rate_by(&self, factor: Factor) -> BTreeMap<i64, f64> {
        let mut groups: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
        for record in self.iter() {
            if let Some(code) = factor.code(record) {
                let (n, m) = groups.entry(code).or_default();
                *n += 1;
                *m += record.maintenance_required as usize;
            }
        }
        groups
            .into_iter()
            .map(|(code, (n, m))| (code, 1e2 * m as f64 / n as f64))
            .collect()
    }
    /// Record counts per machine status and maintenance requirement
    pub fn status_maintenance_counts(&self) -> BTreeMap<(i64, bool), usize> {
        let mut counts = BTreeMap::new();
        for record in self.iter() {
            if let Some(status) = record.machine_status {
                *counts
                    .entry((status, record.maintenance_required))
                    .or_default() += 1;
            }
        }
        counts
    }
    /// Sensor values grouped by risk tier
    pub fn tier_groups(&self, tiers: &RiskTiers, sensor: Sensor) -> BTreeMap<RiskTier, Vec<f64>> {
        let mut groups: BTreeMap<RiskTier, Vec<f64>> = BTreeMap::new();
        for record in self.iter() {
            let life = record.predicted_remaining_life;
            if let (Some(life), Some(value)) = (life, sensor.value(record)) {
                groups.entry(tiers.classify(life)).or_default().push(value);
            }
        }
        groups
    }
    /// Number of records per risk tier
    pub fn tier_counts(&self, tiers: &RiskTiers) -> BTreeMap<RiskTier, usize> {
        self.tier_groups(tiers, Sensor::PredictedRemainingLife)
            .into_iter()
            .map(|(tier, values)| (tier, values.len()))
            .collect()
    }
    /// Sensor values grouped by maintenance requirement
    pub fn group_by_maintenance(&self, sensor: Sensor) -> BTreeMap<bool, Vec<f64>> {
        let mut groups: BTreeMap<bool, Vec<f64>> = BTreeMap::new();
        for record in self.iter() {
            if let Some(value) = sensor.value(record) {
                groups
                    .entry(record.maintenance_required)
                    .or_default()
                    .push(value);
            }
        }
        groups
    }
    /// Sensor values grouped by machine status
    pub fn group_by_status(&self, sensor: Sensor) -> BTreeMap<i64, Vec<f64>> {
        let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for record in self.iter() {
            if let (Some(status), Some(value)) = (record.machine_status, sensor.value(record)) {
                groups.entry(status).or_default().push(value);
            }
        }
        groups
    }
    /// Most recent record of each machine
    pub fn latest_by_machine(&self) -> Vec<&Record> {
        let mut latest: BTreeMap<&str, &Record> = BTreeMap::new();
        for record in self.iter() {
            if let (Some(id), Some(t)) = (record.machine_id.as_deref(), record.timestamp) {
                match latest.get(id).and_then(|r| r.timestamp) {
                    Some(last) if last > t => (),
                    _ => {
                        latest.insert(id, record);
                    }
                }
            }
        }
        latest.into_values().collect()
    }
    /// The `n` machines with the shortest remaining life at their latest record
    pub fn urgent_list(&self, n: usize) -> Vec<&Record> {
        let mut latest = self.latest_by_machine();
        latest.sort_by(|a, b| {
            match (a.predicted_remaining_life, b.predicted_remaining_life) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
        latest.truncate(n);
        latest
    }
    /// Production hours at risk over the `n` most urgent machines
    pub fn estimated_downtime_hours(&self, n: usize) -> f64 {
        24f64
            * self
                .urgent_list(n)
                .iter()
                .filter(|r| r.downtime_risk)
                .count() as f64
    }
    pub fn exclusion_check(&self, rule: &ExclusionRule) -> ExclusionReport {
        let remaining: Vec<_> = self.iter().filter(|r| !rule.excludes(r)).collect();
        ExclusionReport {
            total: self.len(),
            remaining: remaining.len(),
            maintenance_required: remaining.iter().filter(|r| r.maintenance_required).count(),
        }
    }
    /// Hourly mean of a sensor for one machine
    pub fn hourly_trend(&self, machine_id: &str, sensor: Sensor) -> Vec<(NaiveDateTime, f64)> {
        let mut hours: BTreeMap<NaiveDateTime, (usize, f64)> = BTreeMap::new();
        self.iter()
            .filter(|r| r.machine_id.as_deref() == Some(machine_id))
            .filter_map(|r| {
                let hour = r
                    .timestamp?
                    .with_minute(0)?
                    .with_second(0)?
                    .with_nanosecond(0)?;
                Some((hour, sensor.value(r)?))
            })
            .for_each(|(hour, value)| {
                let (n, sum) = hours.entry(hour).or_default();
                *n += 1;
                *sum += value;
            });
        hours
            .into_iter()
            .map(|(hour, (n, sum))| (hour, sum / n as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TelemetryLoader;
    use std::error::Error;

    type Result = std::result::Result<(), Box<dyn Error>>;

    fn telemetry() -> std::result::Result<Telemetry, Box<dyn Error>> {
        Ok(TelemetryLoader::default().data_path("data").load()?)
    }

    #[test]
    fn tiers() {
        let tiers = RiskTiers::default();
        assert_eq!(tiers.classify(15.), RiskTier::Critical);
        assert_eq!(tiers.classify(15.5), RiskTier::Warning);
        assert_eq!(tiers.classify(45.), RiskTier::Warning);
        assert_eq!(tiers.classify(46.), RiskTier::Normal);
        let tiers = RiskTiers::new(5., 10.);
        assert_eq!(tiers.classify(15.), RiskTier::Normal);
    }

    #[test]
    fn risk_ranking() -> Result {
        let ranking = telemetry()?.risk_ranking();
        let ids: Vec<_> = ranking.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(ranking[0].1, 0.375);
        assert_eq!(ranking[1].1, 0.25);
        Ok(())
    }

    #[test]
    fn failure_shares() -> Result {
        let t = telemetry()?;
        let shares = t.failure_shares(false);
        assert_eq!(shares[0], ("Overheating".to_string(), 3));
        assert!(shares.iter().all(|(f, _)| f != "Normal"));
        let all: usize = t.failure_shares(true).iter().map(|(_, n)| n).sum();
        assert_eq!(all, t.len());
        Ok(())
    }

    #[test]
    fn maintenance_rates() -> Result {
        let t = telemetry()?;
        let rates = t.maintenance_rate_by(Factor::DowntimeRisk);
        assert_eq!(rates.len(), 2);
        // 2 maintenance requests out of 6 risk rows
        assert!((rates[&1] - 1e2 / 3.).abs() < 1e-9);
        assert!((rates[&0] - 1e2 * 4. / 18.).abs() < 1e-9);
        let counts = t.status_maintenance_counts();
        assert_eq!(counts.values().sum::<usize>(), t.len());
        Ok(())
    }

    #[test]
    fn groups() -> Result {
        let t = telemetry()?;
        let by_status = t.group_by_status(Sensor::Temperature);
        assert_eq!(by_status.values().map(|v| v.len()).sum::<usize>(), t.len());
        let by_maintenance = t.group_by_maintenance(Sensor::Temperature);
        assert_eq!(by_maintenance[&true].len(), 6);
        let counts = t.tier_counts(&RiskTiers::default());
        assert_eq!(counts.values().sum::<usize>(), t.len());
        Ok(())
    }

    #[test]
    fn latest_and_urgent() -> Result {
        let t = telemetry()?;
        let latest = t.latest_by_machine();
        assert_eq!(latest.len(), 3);
        assert!(latest
            .iter()
            .all(|r| r.timestamp.map(|t| t.hour()) == Some(3)));
        let urgent = t.urgent_list(2);
        assert_eq!(urgent[0].machine_id.as_deref(), Some("3"));
        assert_eq!(urgent[1].machine_id.as_deref(), Some("1"));
        assert_eq!(t.estimated_downtime_hours(2), 24.);
        Ok(())
    }

    #[test]
    fn exclusion() {
        let record = |status, temperature| Record {
            machine_status: Some(status),
            temperature: Some(temperature),
            maintenance_required: true,
            ..Default::default()
        };
        let t = Telemetry::from(vec![record(0, 50.), record(2, 95.), record(2, 60.)]);
        let report = t.exclusion_check(&ExclusionRule::default());
        assert_eq!(
            report,
            ExclusionReport {
                total: 3,
                remaining: 1,
                maintenance_required: 1
            }
        );
    }

    #[test]
    fn hourly() -> Result {
        let trend = telemetry()?.hourly_trend("1", Sensor::Temperature);
        assert_eq!(trend.len(), 4);
        assert!(trend.windows(2).all(|w| w[0].0 < w[1].0));
        Ok(())
    }

    #[test]
    fn correlation() {
        let record = |temperature: f64| Record {
            temperature: Some(temperature),
            vibration: Some(2. * temperature),
            humidity: Some(50.),
            ..Default::default()
        };
        let t = Telemetry::from(vec![record(1.), record(2.), record(3.)]);
        let corr = t.correlation(&[Sensor::Temperature, Sensor::Vibration, Sensor::Humidity]);
        assert!((corr.get(0, 1).unwrap() - 1.).abs() < 1e-12);
        assert!((corr.get(1, 1).unwrap() - 1.).abs() < 1e-12);
        assert_eq!(corr.get(2, 0), None);
    }

    #[test]
    fn correlation_all_columns() -> Result {
        let sensors: Vec<Sensor> = Sensor::iter().collect();
        let corr = telemetry()?.correlation(&sensors);
        assert_eq!(corr.values.len(), sensors.len() * sensors.len());
        for i in 0..sensors.len() {
            if let Some(r) = corr.get(i, i) {
                assert!((r - 1.).abs() < 1e-12);
            }
            for j in 0..sensors.len() {
                assert_eq!(corr.get(i, j), corr.get(j, i));
            }
        }
        Ok(())
    }
}
