use factory_monitors::{load_lead_times, Quartiles, Stats, TelemetryLoader};
use std::collections::BTreeMap;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "lead-time",
    about = "Time between maintenance events and the preceding downtime-risk signal"
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
    /// Save the lead time samples to CSV file
    #[structopt(long)]
    csv: Option<String>,
    /// Print every lead time sample
    #[structopt(short, long)]
    verbose: bool,
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

    let (telemetry, samples) = load_lead_times(loader)?;
    let n_maintenance = telemetry.iter().filter(|r| r.maintenance_required).count();
    println!("MAINTENANCE LEAD TIME:");
    println!(" - # of maintenance events: {}", n_maintenance);
    println!(" - # of lead time samples: {}", samples.len());

    let minutes: Vec<f64> = samples.iter().map(|s| s.minutes).collect();
    match (Stats::new(&minutes), Quartiles::new(&minutes)) {
        (Some(stats), Some(q)) => {
            println!(
                " - mean: {:.1}, std: {:.1}, min: {:.1}, max: {:.1} [minute]",
                stats.mean, stats.std, stats.min, stats.max
            );
            println!(
                " - quartiles: {:.1} / {:.1} / {:.1} [minute]",
                q.q1, q.median, q.q3
            );
        }
        _ => println!(" - no maintenance event follows a downtime-risk signal"),
    }

    let mut per_machine: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for sample in samples.iter() {
        per_machine
            .entry(sample.machine_id.as_str())
            .or_default()
            .push(sample.minutes);
    }
    if !per_machine.is_empty() {
        println!(
            "    {:^12}: {:>6} {:>12} {:>12} {:>12} {:>12}",
            "MACHINE", "#", "MEAN", "STD", "MIN", "MAX"
        );
        for (id, minutes) in per_machine.iter() {
            if let Some(stats) = Stats::new(minutes) {
                println!("  - {:12}: {:>6} {}", id, stats.n, stats);
            }
        }
    }

    if opt.verbose {
        for s in samples.iter() {
            println!(
                "{:>8} {} -> {} : {:>10.2}",
                s.machine_id, s.risk_at, s.maintenance_at, s.minutes
            );
        }
    }

    if let Some(filename) = opt.csv {
        let mut wtr = csv::Writer::from_path(&filename)?;
        for sample in samples.iter() {
            wtr.serialize(sample)?;
        }
        wtr.flush()?;
        log::info!("lead time samples written to {}", filename);
    }

    Ok(())
}
