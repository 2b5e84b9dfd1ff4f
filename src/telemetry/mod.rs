//! Smart factory IoT telemetry
//!
//! Loads the machine telemetry table from a CSV file (optionally gzip or bzip2 compressed).

use bzip2::bufread::BzDecoder;
use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use regex::Regex;
use std::{
    collections::BTreeSet,
    env,
    fs::File,
    io::{BufReader, Read},
    ops::Deref,
    path::{Path, PathBuf},
    time::Instant,
};

use crate::{lead_time::EventRecord, Sensor, Stats};

mod record;
pub use record::{MachineStatus, Record};

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("failed to read {1:?}")]
    Io(#[source] std::io::Error, PathBuf),
    #[error("failed to (de)serialize the CSV file")]
    Csv(#[from] csv::Error),
    #[error("invalid data file pattern")]
    Pattern(#[from] glob::PatternError),
    #[error("no CSV file found in {0:?}")]
    NotFound(PathBuf),
    #[error("invalid machine filter")]
    Regex(#[from] regex::Error),
    #[error(r#""FACTORY_DATA" is not set"#)]
    Env(#[from] env::VarError),
}
type Result<T> = std::result::Result<T, TelemetryError>;

/// Telemetry file extensions, in order of preference
const EXTENSIONS: [&str; 3] = ["csv", "csv.gz", "csv.bz2"];

/// Telemetry loader
///
/// Either a data file or a directory is given; in the latter case the first
/// CSV file (by name) in the directory is loaded.
pub struct TelemetryLoader {
    path: PathBuf,
    time_range: (Option<NaiveDateTime>, Option<NaiveDateTime>),
    machine_regex: String,
    exclude_regex: Option<String>,
}
impl Default for TelemetryLoader {
    fn default() -> Self {
        Self {
            path: PathBuf::from("smart_manufacturing_data.csv"),
            time_range: (None, None),
            machine_regex: String::from(r".*"),
            exclude_regex: None,
        }
    }
}
impl TelemetryLoader {
    /// Loader for the directory given by the "FACTORY_DATA" environment variable
    pub fn from_env() -> Result<Self> {
        let data_path = env::var("FACTORY_DATA")?;
        Ok(Self::default().data_path(data_path))
    }
    /// Directory with the telemetry file
    pub fn data_path<P: AsRef<Path>>(self, data_path: P) -> Self {
        Self {
            path: data_path.as_ref().to_path_buf(),
            ..self
        }
    }
    /// Telemetry file
    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        self.data_path(path)
    }
    pub fn start_time(self, time: NaiveDateTime) -> Self {
        Self {
            time_range: (Some(time), self.time_range.1),
            ..self
        }
    }
    pub fn end_time(self, time: NaiveDateTime) -> Self {
        Self {
            time_range: (self.time_range.0, Some(time)),
            ..self
        }
    }
    /// Keeps only the machines matching the regular expression
    pub fn machine_filter<S: Into<String>>(self, machine_regex: S) -> Self {
        Self {
            machine_regex: machine_regex.into(),
            ..self
        }
    }
    /// Discards the machines matching the regular expression
    pub fn exclude_filter<S: Into<String>>(self, exclude_regex: S) -> Self {
        Self {
            exclude_regex: Some(exclude_regex.into()),
            ..self
        }
    }
    fn resolve(&self) -> Result<PathBuf> {
        if !self.path.is_dir() {
            return Ok(self.path.clone());
        }
        for ext in EXTENSIONS {
            let pattern = self.path.join(format!("*.{ext}"));
            let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
                .filter_map(|entry| entry.ok())
                .collect();
            files.sort();
            if let Some(file) = files.into_iter().next() {
                return Ok(file);
            }
        }
        Err(TelemetryError::NotFound(self.path.clone()))
    }
    fn decompress(path: &Path) -> Result<String> {
        let file = File::open(path).map_err(|e| TelemetryError::Io(e, path.to_path_buf()))?;
        let mut buf = BufReader::new(file);
        let name = path.to_string_lossy();
        let mut contents = String::new();
        let read = if name.ends_with(".gz") {
            GzDecoder::new(buf).read_to_string(&mut contents)
        } else if name.ends_with(".bz2") {
            BzDecoder::new(buf).read_to_string(&mut contents)
        } else {
            buf.read_to_string(&mut contents)
        };
        read.map_err(|e| TelemetryError::Io(e, path.to_path_buf()))?;
        Ok(contents)
    }
    fn in_time_range(&self, record: &Record) -> bool {
        match (record.timestamp, self.time_range) {
            (Some(t), (Some(start), _)) if t < start => false,
            (Some(t), (_, Some(end))) if t > end => false,
            _ => true,
        }
    }
    pub fn load(self) -> Result<Telemetry> {
        let path = self.resolve()?;
        log::info!("Loading {:?}...", path);
        let now = Instant::now();
        let contents = Self::decompress(&path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(contents.as_bytes());

        let re_machine = Regex::new(&self.machine_regex)?;
        let re_x_machine = self
            .exclude_regex
            .as_deref()
            .map(Regex::new)
            .transpose()?;

        let mut records = vec![];
        for result in rdr.deserialize() {
            let record: Record = result?;
            if !self.in_time_range(&record) {
                continue;
            }
            // rows without machine id are kept for the lead time validation
            if let Some(id) = record.machine_id.as_deref() {
                let excluded = re_x_machine.as_ref().is_some_and(|re| re.is_match(id));
                if !re_machine.is_match(id) || excluded {
                    continue;
                }
            }
            records.push(record);
        }
        log::info!(
            "... loaded {} records in {:}ms",
            records.len(),
            now.elapsed().as_millis()
        );
        Ok(Telemetry(records))
    }
}

/// Telemetry table
#[derive(Debug, Default, Clone)]
pub struct Telemetry(Vec<Record>);
impl Deref for Telemetry {
    type Target = Vec<Record>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl From<Vec<Record>> for Telemetry {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}
impl Telemetry {
    /// Sorted machine identifiers
    pub fn machines(&self) -> BTreeSet<&str> {
        self.iter()
            .filter_map(|r| r.machine_id.as_deref())
            .collect()
    }
    /// Downtime risk and maintenance events
    pub fn events(&self) -> Vec<EventRecord> {
        self.iter()
            .map(|r| EventRecord {
                machine_id: r.machine_id.clone(),
                timestamp: r.timestamp,
                is_risk_signal: r.downtime_risk,
                is_maintenance_event: r.maintenance_required,
            })
            .collect()
    }
    /// Time span of the records
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = self.iter().filter_map(|r| r.timestamp).min()?;
        let end = self.iter().filter_map(|r| r.timestamp).max()?;
        Some((start, end))
    }
    pub fn summary(&self) {
        println!("SUMMARY:");
        println!(" - # of records: {}", self.len());
        println!(" - # of machines: {}", self.machines().len());
        if let Some((start, end)) = self.time_range() {
            println!(" - time range: [{} - {}]", start, end);
        }
        println!(
            "    {:^24}: {:^12} {:^12} {:^12} {:^12}",
            "SENSOR", "MEAN", "STD", "MIN", "MAX"
        );
        for sensor in Sensor::sensors() {
            match Stats::new(&self.values(sensor)) {
                Some(stats) => println!("  - {:24}: {}", sensor.to_string(), stats),
                None => println!("  - {:24}: no data", sensor.to_string()),
            }
        }
        let count = |f: fn(&Record) -> bool| self.iter().filter(|r| f(r)).count();
        println!(" - # of anomalies: {}", count(|r| r.anomaly_flag));
        println!(" - # of downtime risks: {}", count(|r| r.downtime_risk));
        println!(
            " - # of maintenance requests: {}",
            count(|r| r.maintenance_required)
        );
    }
    /// Writes the records to a CSV file
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_csv(path, self.iter())
    }
}

/// Writes records to a CSV file with the telemetry header
pub fn write_csv<'a, P, I>(path: P, records: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Record>,
{
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()
        .map_err(|e| TelemetryError::Io(e, path.to_path_buf()))?;
    Ok(())
}

#[cfg(feature = "polars")]
impl Telemetry {
    /// Converts the numeric columns into a polars [DataFrame](polars::prelude::DataFrame)
    pub fn to_dataframe(&self) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use polars::prelude::*;
        let machine_id: Vec<Option<&str>> =
            self.iter().map(|r| r.machine_id.as_deref()).collect();
        let flag = |f: fn(&Record) -> bool| self.iter().map(|r| f(r) as i32).collect::<Vec<_>>();
        df!(
            "machine_id" => machine_id,
            "temperature" => self.column(Sensor::Temperature),
            "vibration" => self.column(Sensor::Vibration),
            "humidity" => self.column(Sensor::Humidity),
            "pressure" => self.column(Sensor::Pressure),
            "energy_consumption" => self.column(Sensor::EnergyConsumption),
            "predicted_remaining_life" => self.column(Sensor::PredictedRemainingLife),
            "machine_status" => self.column(Sensor::MachineStatus),
            "anomaly_flag" => flag(|r| r.anomaly_flag),
            "downtime_risk" => flag(|r| r.downtime_risk),
            "maintenance_required" => flag(|r| r.maintenance_required)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead_time::compute_lead_times;
    use std::error::Error;

    #[test]
    fn load_data_directory() -> std::result::Result<(), Box<dyn Error>> {
        let telemetry = TelemetryLoader::default().data_path("data").load()?;
        assert_eq!(telemetry.len(), 24);
        assert_eq!(telemetry.machines().len(), 3);
        telemetry.summary();
        Ok(())
    }

    #[test]
    fn machine_filters() -> std::result::Result<(), Box<dyn Error>> {
        let telemetry = TelemetryLoader::default()
            .data_path("data")
            .machine_filter("^(1|2)$")
            .exclude_filter("2")
            .load()?;
        assert_eq!(telemetry.machines().into_iter().collect::<Vec<_>>(), vec!["1"]);
        Ok(())
    }

    #[test]
    fn time_window() -> std::result::Result<(), Box<dyn Error>> {
        let start = record::parse_timestamp("2025-01-01 01:00:00").unwrap();
        let end = record::parse_timestamp("2025-01-01 02:00:00").unwrap();
        let telemetry = TelemetryLoader::default()
            .data_path("data")
            .start_time(start)
            .end_time(end)
            .load()?;
        assert!(!telemetry.is_empty());
        let (first, last) = telemetry.time_range().unwrap();
        assert!(first >= start && last <= end);
        Ok(())
    }

    #[test]
    fn lead_times_from_file() -> std::result::Result<(), Box<dyn Error>> {
        let telemetry = TelemetryLoader::default().data_path("data").load()?;
        let mut minutes = compute_lead_times(&telemetry.events())?;
        minutes.sort_by(f64::total_cmp);
        assert_eq!(minutes, vec![30., 60., 60., 90.]);
        Ok(())
    }

    #[test]
    fn missing_directory_file() {
        let loader = TelemetryLoader::default().data_path("src/telemetry");
        assert!(matches!(loader.load(), Err(TelemetryError::NotFound(_))));
    }

    #[test]
    fn csv_round_trip() -> std::result::Result<(), Box<dyn Error>> {
        let telemetry = TelemetryLoader::default().data_path("data").load()?;
        let path = env::temp_dir().join("factory-monitors_round-trip.csv");
        telemetry.to_csv(&path)?;
        let reloaded = TelemetryLoader::default().path(&path).load()?;
        assert_eq!(reloaded.as_slice(), telemetry.as_slice());
        Ok(())
    }

    fn compressed_copy<W, F>(folder: &str, filename: &str, encode: F) -> std::io::Result<PathBuf>
    where
        W: std::io::Write,
        F: FnOnce(File) -> W,
    {
        use std::io::Write;
        let data = std::fs::read("data/smart_manufacturing_data.csv")?;
        let dir = env::temp_dir().join(folder);
        std::fs::create_dir_all(&dir)?;
        let mut encoder = encode(File::create(dir.join(filename))?);
        encoder.write_all(&data)?;
        encoder.flush()?;
        Ok(dir)
    }

    #[test]
    fn load_gzip() -> std::result::Result<(), Box<dyn Error>> {
        let dir = compressed_copy("factory-monitors_gz", "telemetry.csv.gz", |file| {
            flate2::write::GzEncoder::new(file, flate2::Compression::default())
        })?;
        let telemetry = TelemetryLoader::default().data_path(dir).load()?;
        assert_eq!(telemetry.len(), 24);
        assert_eq!(compute_lead_times(&telemetry.events())?.len(), 4);
        Ok(())
    }

    #[test]
    fn load_bzip2() -> std::result::Result<(), Box<dyn Error>> {
        let dir = compressed_copy("factory-monitors_bz2", "telemetry.csv.bz2", |file| {
            bzip2::write::BzEncoder::new(file, bzip2::Compression::default())
        })?;
        let telemetry = TelemetryLoader::default().data_path(dir).load()?;
        assert_eq!(telemetry.len(), 24);
        assert_eq!(telemetry.machines().len(), 3);
        Ok(())
    }

    #[test]
    fn data_path_from_env() -> std::result::Result<(), Box<dyn Error>> {
        env::remove_var("FACTORY_DATA");
        assert!(matches!(
            TelemetryLoader::from_env(),
            Err(TelemetryError::Env(_))
        ));
        env::set_var("FACTORY_DATA", "data");
        let telemetry = TelemetryLoader::from_env()?.load()?;
        assert_eq!(telemetry.len(), 24);
        Ok(())
    }
}
