use factory_monitors::TelemetryLoader;
use polars::prelude::*;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    // Setting the path to the directory with the data file: "smart_manufacturing_data.csv"
    let path_to_data = Path::new("data");
    let telemetry = TelemetryLoader::default().data_path(path_to_data).load()?;

    println!("# of records: {}", telemetry.len());
    println!("# of machines: {}", telemetry.machines().len());

    // For statiscal analysis, it may be a better option to import the data in a polars (https://pola-rs.github.io/polars-book/user-guide/index.html) dataframe
    let df: DataFrame = telemetry.to_dataframe()?;
    println!("{:?}", df.shape());
    println!("{}", df.head(Some(10)));

    Ok(())
}
