//! Maintenance lead time
//!
//! For every maintenance event, the time elapsed since the most recent
//! downtime-risk signal raised on the same machine.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LeadTimeError {
    #[error("event #{index} has no {field}")]
    InvalidInput { index: usize, field: &'static str },
}
type Result<T> = std::result::Result<T, LeadTimeError>;

/// A machine event with its risk and maintenance indicators
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventRecord {
    pub machine_id: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub is_risk_signal: bool,
    pub is_maintenance_event: bool,
}
impl EventRecord {
    pub fn new<S: Into<String>>(machine_id: S, timestamp: NaiveDateTime) -> Self {
        Self {
            machine_id: Some(machine_id.into()),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }
    pub fn risk(self) -> Self {
        Self {
            is_risk_signal: true,
            ..self
        }
    }
    pub fn maintenance(self) -> Self {
        Self {
            is_maintenance_event: true,
            ..self
        }
    }
}

/// A maintenance event paired with the risk signal that preceded it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeSample {
    pub machine_id: String,
    pub risk_at: NaiveDateTime,
    pub maintenance_at: NaiveDateTime,
    /// lead time [minute]
    pub minutes: f64,
}

// (timestamp, risk, maintenance) of one machine in input order
type Timeline = Vec<(NaiveDateTime, bool, bool)>;

fn partition(events: &[EventRecord]) -> Result<BTreeMap<&str, Timeline>> {
    let mut machines: BTreeMap<&str, Timeline> = BTreeMap::new();
    for (index, event) in events.iter().enumerate() {
        let machine_id = event
            .machine_id
            .as_deref()
            .ok_or(LeadTimeError::InvalidInput {
                index,
                field: "machine identifier",
            })?;
        let timestamp = event.timestamp.ok_or(LeadTimeError::InvalidInput {
            index,
            field: "timestamp",
        })?;
        machines.entry(machine_id).or_default().push((
            timestamp,
            event.is_risk_signal,
            event.is_maintenance_event,
        ));
    }
    Ok(machines)
}

fn sweep(machine_id: &str, mut timeline: Timeline) -> Vec<LeadTimeSample> {
    // stable: equal timestamps keep their input order
    timeline.sort_by_key(|(t, _, _)| *t);
    let risks: Vec<_> = timeline.iter().filter(|e| e.1).map(|e| e.0).collect();
    let mut k = 0;
    timeline
        .iter()
        .filter(|e| e.2)
        .filter_map(|&(maintenance_at, _, _)| {
            while k < risks.len() && risks[k] < maintenance_at {
                k += 1;
            }
            let risk_at = *risks[..k].last()?;
            Some(LeadTimeSample {
                machine_id: machine_id.to_string(),
                risk_at,
                maintenance_at,
                minutes: (maintenance_at - risk_at).num_milliseconds() as f64 / 60_000f64,
            })
        })
        .collect()
}

/// Pairs every maintenance event with the latest risk signal strictly before it on the same machine
///
/// Machines are visited in identifier order.
/// The call fails if any event misses its machine identifier or its timestamp.
pub fn lead_time_samples(events: &[EventRecord]) -> Result<Vec<LeadTimeSample>> {
    let machines = partition(events)?;
    let samples: Vec<_> = machines
        .into_iter()
        .flat_map(|(machine_id, timeline)| sweep(machine_id, timeline))
        .collect();
    log::debug!(
        "{} lead time samples from {} events",
        samples.len(),
        events.len()
    );
    Ok(samples)
}

/// Returns the maintenance lead times [minute]
pub fn compute_lead_times(events: &[EventRecord]) -> Result<Vec<f64>> {
    Ok(lead_time_samples(events)?
        .into_iter()
        .map(|sample| sample.minutes)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn at(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(minutes)
    }
    fn risk(machine: &str, t: i64) -> EventRecord {
        EventRecord::new(machine, at(t)).risk()
    }
    fn maintenance(machine: &str, t: i64) -> EventRecord {
        EventRecord::new(machine, at(t)).maintenance()
    }

    #[test]
    fn single_pair() {
        let events = vec![risk("M1", 0), maintenance("M1", 30)];
        assert_eq!(compute_lead_times(&events).unwrap(), vec![30.]);
    }

    #[test]
    fn tightest_precedent() {
        let events = vec![risk("M1", 0), risk("M1", 20), maintenance("M1", 30)];
        assert_eq!(compute_lead_times(&events).unwrap(), vec![10.]);
    }

    #[test]
    fn maintenance_without_prior_risk() {
        let events = vec![maintenance("M1", 10), risk("M1", 20)];
        assert!(compute_lead_times(&events).unwrap().is_empty());
    }

    #[test]
    fn machines_are_isolated() {
        let events = vec![risk("M1", 0), maintenance("M2", 5)];
        assert!(compute_lead_times(&events).unwrap().is_empty());
    }

    #[test]
    fn same_instant_is_not_preceding() {
        let events = vec![risk("M1", 50), maintenance("M1", 50)];
        assert!(compute_lead_times(&events).unwrap().is_empty());
        let events = vec![
            EventRecord::new("M1", at(50)).risk().maintenance(),
            maintenance("M1", 60),
        ];
        assert_eq!(compute_lead_times(&events).unwrap(), vec![10.]);
    }

    #[test]
    fn empty_input() {
        assert!(compute_lead_times(&[]).unwrap().is_empty());
    }

    #[test]
    fn risk_only_machine() {
        let events = vec![risk("M1", 0), risk("M1", 10)];
        assert!(compute_lead_times(&events).unwrap().is_empty());
    }

    #[test]
    fn unsorted_input() {
        let events = vec![
            maintenance("M1", 90),
            risk("M2", 5),
            risk("M1", 60),
            maintenance("M1", 40),
            risk("M1", 10),
            maintenance("M2", 7),
        ];
        let samples = lead_time_samples(&events).unwrap();
        let minutes: Vec<_> = samples.iter().map(|s| s.minutes).collect();
        assert_eq!(minutes, vec![30., 30., 2.]);
        assert_eq!(samples[2].machine_id, "M2");
    }

    #[test]
    fn one_sample_per_maintenance() {
        let events = vec![
            risk("M1", 0),
            maintenance("M1", 15),
            maintenance("M1", 45),
        ];
        assert_eq!(compute_lead_times(&events).unwrap(), vec![15., 45.]);
    }

    #[test]
    fn sub_minute_resolution() {
        let mut maint = maintenance("M1", 0);
        maint.timestamp = Some(at(1) + Duration::seconds(30));
        let events = vec![risk("M1", 0), maint];
        assert_eq!(compute_lead_times(&events).unwrap(), vec![1.5]);
    }

    #[test]
    fn missing_machine_id() {
        let events = vec![
            risk("M1", 0),
            EventRecord {
                machine_id: None,
                timestamp: Some(at(3)),
                is_maintenance_event: true,
                ..Default::default()
            },
        ];
        assert_eq!(
            compute_lead_times(&events),
            Err(LeadTimeError::InvalidInput {
                index: 1,
                field: "machine identifier"
            })
        );
    }

    #[test]
    fn missing_timestamp() {
        let events = vec![EventRecord {
            machine_id: Some("M1".into()),
            ..Default::default()
        }];
        assert!(matches!(
            compute_lead_times(&events),
            Err(LeadTimeError::InvalidInput {
                index: 0,
                field: "timestamp"
            })
        ));
    }

    // brute force predecessor search
    fn reference(events: &[EventRecord]) -> Vec<(String, NaiveDateTime, NaiveDateTime)> {
        let mut pairs = vec![];
        for m in events.iter().filter(|e| e.is_maintenance_event) {
            let mt = m.timestamp.unwrap();
            if let Some(rt) = events
                .iter()
                .filter(|e| e.is_risk_signal && e.machine_id == m.machine_id)
                .filter_map(|e| e.timestamp)
                .filter(|&t| t < mt)
                .max()
            {
                pairs.push((m.machine_id.clone().unwrap(), rt, mt));
            }
        }
        pairs.sort();
        pairs
    }

    #[test]
    fn random_tables() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let events: Vec<_> = (0..rng.gen_range(0..200))
                .map(|_| EventRecord {
                    machine_id: Some(format!("M{}", rng.gen_range(0..5))),
                    timestamp: Some(at(rng.gen_range(0..500))),
                    is_risk_signal: rng.gen_bool(0.3),
                    is_maintenance_event: rng.gen_bool(0.2),
                })
                .collect();
            let samples = lead_time_samples(&events).unwrap();
            for s in &samples {
                assert!(s.risk_at < s.maintenance_at);
                assert!(s.minutes >= 0.);
                assert!(!events.iter().any(|e| e.is_risk_signal
                    && e.machine_id.as_deref() == Some(s.machine_id.as_str())
                    && e.timestamp.unwrap() > s.risk_at
                    && e.timestamp.unwrap() < s.maintenance_at));
            }
            let mut pairs: Vec<_> = samples
                .iter()
                .map(|s| (s.machine_id.clone(), s.risk_at, s.maintenance_at))
                .collect();
            pairs.sort();
            assert_eq!(pairs, reference(&events));
            assert_eq!(samples, lead_time_samples(&events).unwrap());
        }
    }
}
