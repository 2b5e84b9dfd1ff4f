use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp formats found in the telemetry exports
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.format(super::TIMESTAMP_FORMATS[0]).to_string()),
            None => serializer.serialize_none(),
        }
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) if !value.trim().is_empty() => super::parse_timestamp(&value)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {value:?}"))),
            _ => Ok(None),
        }
    }
}

mod flag {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*value as u8)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let Some(value) = Option::<String>::deserialize(deserializer)? else {
            return Ok(false);
        };
        match value.trim().to_lowercase().as_str() {
            "" | "0" | "0.0" | "false" => Ok(false),
            "1" | "1.0" | "true" => Ok(true),
            other => Err(de::Error::custom(format!("invalid flag: {other:?}"))),
        }
    }
}

/// Machine operating state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MachineStatus {
    Idle,
    Running,
    Failure,
}
impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineStatus::Idle => write!(f, "Idle"),
            MachineStatus::Running => write!(f, "Running"),
            MachineStatus::Failure => write!(f, "Failure"),
        }
    }
}
impl TryFrom<i64> for MachineStatus {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(MachineStatus::Idle),
            1 => Ok(MachineStatus::Running),
            2 => Ok(MachineStatus::Failure),
            other => Err(other),
        }
    }
}

/// One row of the telemetry table
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Record {
    #[serde(default, with = "timestamp")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default)]
    pub machine_id: Option<String>,
    /// temperature [C]
    #[serde(default)]
    pub temperature: Option<f64>,
    /// vibration [mm/s]
    #[serde(default)]
    pub vibration: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub energy_consumption: Option<f64>,
    /// 0: idle, 1: running, 2: failure
    #[serde(default)]
    pub machine_status: Option<i64>,
    #[serde(default, with = "flag")]
    pub anomaly_flag: bool,
    #[serde(default)]
    pub predicted_remaining_life: Option<f64>,
    #[serde(default)]
    pub failure_type: Option<String>,
    #[serde(default, with = "flag")]
    pub downtime_risk: bool,
    #[serde(default, with = "flag")]
    pub maintenance_required: bool,
}
impl Record {
    pub fn status(&self) -> Option<MachineStatus> {
        self.machine_status
            .and_then(|code| MachineStatus::try_from(code).ok())
    }
    /// `true` if the failure type is set to anything other than "Normal"
    pub fn has_failed(&self) -> bool {
        self.failure_type
            .as_deref()
            .is_some_and(|f| !f.is_empty() && f != "Normal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "timestamp,machine_id,temperature,vibration,humidity,pressure,energy_consumption,machine_status,anomaly_flag,predicted_remaining_life,failure_type,downtime_risk,maintenance_required";

    fn read(row: &str) -> Result<Vec<Record>, csv::Error> {
        let contents = format!("{HEADER}\n{row}\n");
        csv::Reader::from_reader(contents.as_bytes())
            .deserialize()
            .collect()
    }

    #[test]
    fn full_row() {
        let records =
            read("2025-01-01 00:05:00,7,71.2,40.5,55.1,3.2,1.9,1,0,112.0,Normal,1,0").unwrap();
        let r = &records[0];
        assert_eq!(r.machine_id.as_deref(), Some("7"));
        assert_eq!(r.timestamp, parse_timestamp("2025-01-01T00:05:00"));
        assert_eq!(r.status(), Some(MachineStatus::Running));
        assert!(r.downtime_risk);
        assert!(!r.maintenance_required);
        assert!(!r.has_failed());
    }

    #[test]
    fn empty_fields() {
        let records = read(",,,,,,,,,,,,").unwrap();
        assert_eq!(records[0], Record::default());
    }

    #[test]
    fn boolean_flags() {
        let records =
            read("2025-01-01 00:05:00,7,71.2,40.5,55.1,3.2,1.9,2,True,12.0,Overheating,1.0,true")
                .unwrap();
        let r = &records[0];
        assert!(r.anomaly_flag && r.downtime_risk && r.maintenance_required);
        assert!(r.has_failed());
    }

    #[test]
    fn bad_timestamp() {
        assert!(read("yesterday,7,71.2,40.5,55.1,3.2,1.9,1,0,112.0,Normal,1,0").is_err());
    }

    #[test]
    fn fractional_seconds() {
        assert!(parse_timestamp("2025-01-01 00:05:00.250").is_some());
    }
}
