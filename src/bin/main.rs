use factory_monitors::{
    lead_time_samples,
    report::{Chart, ChartConfig, Report},
    telemetry::write_csv,
    ExclusionRule, Factor, RiskTiers, Stats, TelemetryLoader,
};
use indicatif::{ParallelProgressIterator, ProgressBar};
use itertools::Itertools;
use rayon::prelude::*;
use strum::IntoEnumIterator;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "factory-monitors",
    about = "Smart factory telemetry analysis and charts"
)]
struct Opt {
    /// Path to the telemetry file or to its folder (default: "FACTORY_DATA" environment variable)
    path: Option<String>,
    /// Machines regular expression filter
    #[structopt(short, long)]
    machine: Option<String>,
    /// Machines exclude regular expression filter
    #[structopt(short = "x", long)]
    exclude: Option<String>,
    /// Telemetry start time, e.g. 2025-01-01T00:00:00
    #[structopt(short, long)]
    start: Option<chrono::NaiveDateTime>,
    /// Telemetry end time
    #[structopt(short, long)]
    end: Option<chrono::NaiveDateTime>,
    /// Remaining life at or below which a machine is critical
    #[structopt(long, default_value = "15")]
    critical: f64,
    /// Remaining life at or below which a machine needs attention
    #[structopt(long, default_value = "45")]
    warning: f64,
    /// Number of machines in the urgent inspection list
    #[structopt(long, default_value = "10")]
    urgent: usize,
    /// Number of most urgent machines the downtime estimate is based on
    #[structopt(long, default_value = "5")]
    downtime: usize,
    /// Save the urgent inspection list to CSV file
    #[structopt(long)]
    csv: Option<String>,
    /// Render the charts
    #[structopt(short, long)]
    plot: bool,
    /// Charts folder
    #[structopt(long, default_value = "charts")]
    out_dir: String,
    /// Number of histogram bins
    #[structopt(long, default_value = "30")]
    bins: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut loader = match &opt.path {
        Some(path) => TelemetryLoader::default().data_path(path),
        None => TelemetryLoader::from_env()?,
    };
    if let Some(arg) = opt.machine {
        loader = loader.machine_filter(arg);
    }
    if let Some(arg) = opt.exclude {
        loader = loader.exclude_filter(arg);
    }
    if let Some(arg) = opt.start {
        loader = loader.start_time(arg);
    }
    if let Some(arg) = opt.end {
        loader = loader.end_time(arg);
    }

    let telemetry = loader.load()?;
    telemetry.summary();

    let tiers = RiskTiers::new(opt.critical, opt.warning);
    println!("RISK TIERS:");
    for (tier, n) in telemetry.tier_counts(&tiers) {
        println!(" - {:8}: {}", tier.to_string(), n);
    }

    println!("MAINTENANCE RATES [%]:");
    for factor in Factor::iter() {
        let rates = telemetry
            .maintenance_rate_by(factor)
            .into_iter()
            .map(|(code, rate)| format!("{}: {:.1}", code, rate))
            .join(", ");
        println!(" - {:20}: {}", factor.to_string(), rates);
    }

    println!("EXCLUSION CHECK:");
    println!("{}", telemetry.exclusion_check(&ExclusionRule::default()));

    let urgent = telemetry.urgent_list(opt.urgent);
    println!("URGENT INSPECTION:");
    for record in urgent.iter() {
        let life = record.predicted_remaining_life;
        println!(
            " - machine {:>8}: remaining life {:>8}, {}",
            record.machine_id.as_deref().unwrap_or("?"),
            life.map_or_else(|| String::from("n/a"), |x| format!("{:.1}", x)),
            life.map_or_else(|| String::from("n/a"), |x| tiers.classify(x).to_string())
        );
    }
    println!(
        " - estimated downtime: {} hours",
        telemetry.estimated_downtime_hours(opt.downtime)
    );
    if let Some(filename) = opt.csv {
        write_csv(&filename, urgent.iter().copied())?;
        log::info!("urgent inspection list written to {}", filename);
    }

    let samples = lead_time_samples(&telemetry.events())?;
    let minutes: Vec<f64> = samples.iter().map(|s| s.minutes).collect();
    println!("MAINTENANCE LEAD TIME [minute]:");
    println!(" - # of samples: {}", samples.len());
    if let Some(stats) = Stats::new(&minutes) {
        println!(
            "    {:^12} {:^12} {:^12} {:^12}",
            "MEAN", "STD", "MIN", "MAX"
        );
        println!("{}", stats);
    }

    if opt.plot {
        let config = ChartConfig::default()
            .out_dir(&opt.out_dir)
            .bins(opt.bins);
        let report = Report::with_lead_times(&telemetry, config, tiers, minutes)?;
        let charts: Vec<Chart> = Chart::iter().collect();
        let pb = ProgressBar::new(charts.len() as u64);
        let paths = charts
            .par_iter()
            .progress_with(pb)
            .map(|chart| report.render(*chart))
            .collect::<Result<Vec<_>, _>>()?;
        for path in paths {
            log::info!("chart: {:?}", path);
        }
    }

    Ok(())
}
