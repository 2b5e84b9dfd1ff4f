use plotters::{coord::Shift, data::Quartiles as BoxQuartiles, element::Pie, prelude::*};
use std::{ops::Range, path::Path};
use strum::IntoEnumIterator;

use super::{drawing, ChartConfig, Result};
use crate::{
    analysis::{Factor, RiskTier},
    ecdf, Histogram, MachineStatus, RiskTiers, Sensor, Telemetry,
};

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn rgb(color: colorous::Color) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

fn canvas<'a>(path: &'a Path, config: &ChartConfig) -> Result<Canvas<'a>> {
    let root = BitMapBackend::new(path, config.size).into_drawing_area();
    root.fill(&WHITE).map_err(drawing)?;
    Ok(root)
}

/// Range of the values with 5% padding on both ends
fn padded<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|x| x.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    if lo > hi {
        0f64..1f64
    } else if lo == hi {
        lo - 0.5..hi + 0.5
    } else {
        let pad = 5e-2 * (hi - lo);
        lo - pad..hi + pad
    }
}

fn status_name(code: i64) -> String {
    MachineStatus::try_from(code).map_or_else(|code| format!("status {}", code), |s| s.to_string())
}

fn maintenance_name(maintenance: bool) -> String {
    format!("maintenance_required ({})", maintenance as u8)
}

/// Chart frame without series, for telemetry without the charted data
fn empty_chart(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    x_desc: &str,
    y_desc: &str,
) -> Result<()> {
    log::warn!("no data, {:?} has empty axes", path);
    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (config.font.as_str(), 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)
        .map_err(drawing)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(drawing)?;
    root.present().map_err(drawing)?;
    Ok(())
}

/// Overlaid histograms sharing the same bin edges
fn histogram_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    font: &str,
    x_desc: &str,
    series: &[(String, Histogram, RGBColor)],
) -> Result<()> {
    let x_range = match series.first() {
        Some((_, h, _)) => h.edges[0]..h.edges[h.len()],
        None => 0f64..1f64,
    };
    let y_max = series
        .iter()
        .map(|(_, h, _)| h.max_count())
        .max()
        .unwrap_or_default()
        .max(1);
    let mut chart = ChartBuilder::on(area)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(x_range, 0f64..1.1 * y_max as f64)
        .map_err(drawing)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Frequency")
        .axis_desc_style((font, 14))
        .draw()
        .map_err(drawing)?;
    let alpha = if series.len() > 1 { 0.45 } else { 0.8 };
    for (label, hist, color) in series {
        let color = *color;
        chart
            .draw_series(hist.bins().map(|(a, b, n)| {
                Rectangle::new([(a, 0f64), (b, n as f64)], color.mix(alpha).filled())
            }))
            .map_err(drawing)?
            .label(label)
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.mix(alpha).filled())
            });
    }
    if series.len() > 1 {
        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.8))
            .position(SeriesLabelPosition::UpperRight)
            .label_font((font, 12))
            .draw()
            .map_err(drawing)?;
    }
    Ok(())
}

/// Histogram of the lead times, empty axes if there are none
pub fn lead_time(path: &Path, config: &ChartConfig, title: &str, minutes: &[f64]) -> Result<()> {
    let root = canvas(path, config)?;
    let root = root
        .titled(title, (config.font.as_str(), 24))
        .map_err(drawing)?;
    let series: Vec<_> = Histogram::with_bins(minutes, config.bins)
        .map(|hist| (String::from("lead time"), hist, rgb(colorous::TABLEAU10[0])))
        .into_iter()
        .collect();
    if series.is_empty() {
        log::warn!("no maintenance lead time, {:?} has empty axes", path);
    }
    histogram_panel(&root, &config.font, "Lead time [minute]", &series)?;
    root.present().map_err(drawing)?;
    Ok(())
}

/// Pearson correlation of every numeric column
pub fn correlation(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    let sensors: Vec<Sensor> = Sensor::iter().collect();
    let matrix = telemetry.correlation(&sensors);
    let names: Vec<&str> = sensors.iter().map(|s| s.label()).collect();
    let n = sensors.len() as i32;

    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (config.font.as_str(), 24))
        .set_label_area_size(LabelAreaPosition::Left, 120)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(0i32..n, n..0i32)
        .map_err(drawing)?;
    let label = |i: &i32| names.get(*i as usize).map(|s| s.to_string()).unwrap_or_default();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(names.len())
        .y_labels(names.len())
        .x_label_formatter(&label)
        .y_label_formatter(&label)
        .label_style((config.font.as_str(), 11))
        .draw()
        .map_err(drawing)?;

    let cells: Vec<(i32, i32, Option<f64>)> = (0..sensors.len())
        .flat_map(|i| (0..sensors.len()).map(move |j| (i, j)))
        .map(|(i, j)| (j as i32, i as i32, matrix.get(i, j)))
        .collect();
    chart
        .draw_series(cells.iter().map(|&(x, y, r)| {
            let color = match r {
                Some(r) => rgb(colorous::RED_YELLOW_GREEN.eval_continuous(0.5 * (r + 1.))),
                None => RGBColor(220, 220, 220),
            };
            Rectangle::new([(x, y), (x + 1, y + 1)], color.filled())
        }))
        .map_err(drawing)?;
    chart
        .draw_series(cells.iter().map(|&(x, y, r)| {
            let text = r.map_or_else(|| String::from("n/a"), |r| format!("{:.2}", r));
            EmptyElement::at((x, y))
                + Text::new(text, (8, 8), (config.font.as_str(), 12).into_font())
        }))
        .map_err(drawing)?;
    root.present().map_err(drawing)?;
    Ok(())
}

/// Mean downtime risk per machine, the 10 riskiest highlighted
pub fn risk_ranking(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    let ranking = telemetry.risk_ranking();
    if ranking.is_empty() {
        return empty_chart(path, config, title, "Machine", "Mean downtime risk");
    }
    let m = ranking.len() as i32;

    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (config.font.as_str(), 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(0i32..m, 0f64..1f64)
        .map_err(drawing)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(ranking.len().min(50))
        .x_label_formatter(&|i| {
            ranking
                .get(*i as usize)
                .map(|(id, _)| id.clone())
                .unwrap_or_default()
        })
        .x_desc("Machine")
        .y_desc("Mean downtime risk")
        .draw()
        .map_err(drawing)?;
    let (top, rest) = (RED, RGBColor(240, 128, 128));
    chart
        .draw_series(ranking.iter().enumerate().map(|(i, (_, risk))| {
            let color = if i < 10 { top } else { rest };
            let i = i as i32;
            Rectangle::new([(i, 0f64), (i + 1, *risk)], color.filled())
        }))
        .map_err(drawing)?;
    root.present().map_err(drawing)?;
    Ok(())
}

/// Pie chart of the failure types, "Normal" rows excluded
pub fn failure_shares(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    let shares = telemetry.failure_shares(false);
    let root = canvas(path, config)?;
    let root = root
        .titled(title, (config.font.as_str(), 24))
        .map_err(drawing)?;
    if shares.is_empty() {
        log::warn!("no failure recorded, {:?} has no pie", path);
        root.draw(&Text::new(
            "no failure",
            (20, 20),
            (config.font.as_str(), 20).into_font(),
        ))
        .map_err(drawing)?;
    } else {
        let (width, height) = root.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let radius = 0.35 * width.min(height) as f64;
        let sizes: Vec<f64> = shares.iter().map(|(_, n)| *n as f64).collect();
        let labels: Vec<&str> = shares.iter().map(|(f, _)| f.as_str()).collect();
        let colors: Vec<RGBColor> = colorous::PASTEL1
            .iter()
            .cycle()
            .take(shares.len())
            .map(|c| rgb(*c))
            .collect();
        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.start_angle(140.);
        pie.label_style((config.font.as_str(), 18).into_font().color(&BLACK));
        pie.percentages((config.font.as_str(), radius * 0.08).into_font().color(&BLACK));
        root.draw(&pie).map_err(drawing)?;
    }
    root.present().map_err(drawing)?;
    Ok(())
}

/// Maintenance rates by machine status, anomaly flag and downtime risk
pub fn maintenance_rates(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    if telemetry.is_empty() {
        log::warn!("no record, {:?} has empty axes", path);
    }
    let root = canvas(path, config)?;
    let root = root
        .titled(title, (config.font.as_str(), 24))
        .map_err(drawing)?;
    let panels = root.split_evenly((1, Factor::iter().count()));
    for ((factor, panel), color) in Factor::iter()
        .zip(panels.iter())
        .zip(colorous::TABLEAU10.iter().cycle())
    {
        let rates: Vec<(i64, f64)> = telemetry.maintenance_rate_by(factor).into_iter().collect();
        let k = rates.len().max(1);
        let mut chart = ChartBuilder::on(panel)
            .set_label_area_size(LabelAreaPosition::Left, 50)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .margin(10)
            .build_cartesian_2d(0i32..k as i32, 0f64..100f64)
            .map_err(drawing)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(k)
            .x_label_formatter(&|i| {
                rates
                    .get(*i as usize)
                    .map(|(code, _)| code.to_string())
                    .unwrap_or_default()
            })
            .x_desc(factor.to_string())
            .y_desc("Maintenance rate [%]")
            .draw()
            .map_err(drawing)?;
        let color = rgb(*color);
        chart
            .draw_series(rates.iter().enumerate().map(|(i, (_, rate))| {
                let i = i as i32;
                Rectangle::new([(i, 0f64), (i + 1, *rate)], color.filled())
            }))
            .map_err(drawing)?;
    }
    root.present().map_err(drawing)?;
    Ok(())
}

/// Record counts per machine status, one bar per maintenance requirement
pub fn status_maintenance(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    let counts = telemetry.status_maintenance_counts();
    let mut statuses: Vec<i64> = counts.keys().map(|(status, _)| *status).collect();
    statuses.dedup();
    if statuses.is_empty() {
        return empty_chart(path, config, title, "Machine status", "# of records");
    }
    let y_max = counts.values().cloned().max().unwrap_or_default().max(1);
    // 3 slots per status: 2 bars and a gap
    let n_slots = 3 * statuses.len();

    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (config.font.as_str(), 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(0i32..n_slots as i32, 0f64..1.1 * y_max as f64)
        .map_err(drawing)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_slots)
        .x_label_formatter(&|i| match (*i % 3, statuses.get(*i as usize / 3)) {
            (1, Some(code)) => status_name(*code),
            _ => String::new(),
        })
        .x_desc("Machine status")
        .y_desc("# of records")
        .draw()
        .map_err(drawing)?;
    for (maintenance, color) in [false, true].into_iter().zip(colorous::TABLEAU10.iter()) {
        let color = rgb(*color);
        let offset = maintenance as i32;
        chart
            .draw_series(statuses.iter().enumerate().map(|(i, code)| {
                let n = counts.get(&(*code, maintenance)).cloned().unwrap_or_default();
                let x = 3 * i as i32 + offset;
                Rectangle::new([(x, 0f64), (x + 1, n as f64)], color.filled())
            }))
            .map_err(drawing)?
            .label(maintenance_name(maintenance))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }
    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(drawing)?;
    root.present().map_err(drawing)?;
    Ok(())
}

fn box_plot(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    y_desc: &str,
    groups: Vec<(String, Vec<f64>)>,
) -> Result<()> {
    let groups: Vec<_> = groups.into_iter().filter(|(_, v)| !v.is_empty()).collect();
    if groups.is_empty() {
        return empty_chart(path, config, title, "", y_desc);
    }
    let names: Vec<&str> = groups.iter().map(|(name, _)| name.as_str()).collect();
    let y_range = padded(groups.iter().flat_map(|(_, v)| v.iter().cloned()));

    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (config.font.as_str(), 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(
            names[..].into_segmented(),
            y_range.start as f32..y_range.end as f32,
        )
        .map_err(drawing)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .draw()
        .map_err(drawing)?;
    chart
        .draw_series(
            names
                .iter()
                .zip(groups.iter())
                .zip(colorous::TABLEAU10.iter().cycle())
                .map(|((name, (_, values)), color)| {
                    Boxplot::new_vertical(SegmentValue::CenterOf(name), &BoxQuartiles::new(values))
                        .width(40)
                        .style(rgb(*color))
                }),
        )
        .map_err(drawing)?;
    root.present().map_err(drawing)?;
    Ok(())
}

pub fn temperature_by_maintenance(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    let groups = telemetry
        .group_by_maintenance(Sensor::Temperature)
        .into_iter()
        .map(|(maintenance, values)| (maintenance_name(maintenance), values))
        .collect();
    box_plot(path, config, title, Sensor::Temperature.label(), groups)
}

pub fn temperature_by_status(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    let groups = telemetry
        .group_by_status(Sensor::Temperature)
        .into_iter()
        .map(|(status, values)| (status_name(status), values))
        .collect();
    box_plot(path, config, title, Sensor::Temperature.label(), groups)
}

pub fn vibration_by_tier(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
    tiers: &RiskTiers,
) -> Result<()> {
    let mut groups = telemetry.tier_groups(tiers, Sensor::Vibration);
    let groups = RiskTier::iter()
        .map(|tier| (tier.to_string(), groups.remove(&tier).unwrap_or_default()))
        .collect();
    box_plot(path, config, title, Sensor::Vibration.label(), groups)
}

/// Hourly mean temperature of the 5 machines with the highest downtime risk
pub fn top_risk_trend(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
) -> Result<()> {
    let trends: Vec<_> = telemetry
        .risk_ranking()
        .into_iter()
        .take(5)
        .map(|(id, _)| {
            let trend = telemetry.hourly_trend(&id, Sensor::Temperature);
            (id, trend)
        })
        .filter(|(_, trend)| !trend.is_empty())
        .collect();
    let Some(start) = trends
        .iter()
        .flat_map(|(_, trend)| trend.iter().map(|(t, _)| *t))
        .min()
    else {
        return empty_chart(path, config, title, "Time [hour]", Sensor::Temperature.label());
    };
    let hours = |t: &chrono::NaiveDateTime| (*t - start).num_minutes() as f64 / 60.;
    let x_range = padded(
        trends
            .iter()
            .flat_map(|(_, trend)| trend.iter().map(|(t, _)| hours(t))),
    );
    let y_range = padded(
        trends
            .iter()
            .flat_map(|(_, trend)| trend.iter().map(|(_, v)| *v)),
    );

    let root = canvas(path, config)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (config.font.as_str(), 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .margin(10)
        .build_cartesian_2d(x_range, y_range)
        .map_err(drawing)?;
    chart
        .configure_mesh()
        .x_desc(format!("Time since {} [hour]", start))
        .y_desc(Sensor::Temperature.label())
        .draw()
        .map_err(drawing)?;

    for ((id, trend), color) in trends.iter().zip(colorous::TABLEAU10.iter().cycle()) {
        let rgb = rgb(*color);
        chart
            .draw_series(LineSeries::new(
                trend.iter().map(|(t, v)| (hours(t), *v)),
                &rgb,
            ))
            .map_err(drawing)?
            .label(format!("machine {}", id))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &rgb));
    }
    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(drawing)?;
    root.present().map_err(drawing)?;
    Ok(())
}

/// Histograms (top row) and empirical CDFs (bottom row) of the sensors,
/// one series per maintenance requirement
pub fn distributions(
    path: &Path,
    config: &ChartConfig,
    title: &str,
    telemetry: &Telemetry,
    sensors: &[Sensor],
) -> Result<()> {
    let root = canvas(path, config)?;
    let root = root
        .titled(title, (config.font.as_str(), 24))
        .map_err(drawing)?;
    let panels = root.split_evenly((2, sensors.len()));
    let (hist_panels, ecdf_panels) = panels.split_at(sensors.len());
    let colors: Vec<RGBColor> = colorous::TABLEAU10.iter().map(|c| rgb(*c)).collect();
    for ((sensor, hist_panel), ecdf_panel) in sensors.iter().zip(hist_panels).zip(ecdf_panels) {
        let groups = telemetry.group_by_maintenance(*sensor);
        if groups.is_empty() {
            log::warn!("no {} value, {:?} has empty panels", sensor, path);
        }
        let values = telemetry.values(*sensor);
        // remaining life is binned by 10 units
        let edges = match sensor {
            Sensor::PredictedRemainingLife => Histogram::with_width(&values, 10.),
            _ => Histogram::with_bins(&values, config.bins),
        }
        .map(|hist| hist.edges)
        .unwrap_or_default();
        let series: Vec<_> = groups
            .iter()
            .zip(colors.iter().cycle())
            .filter_map(|((maintenance, values), color)| {
                let hist = Histogram::with_edges(values, &edges)?;
                Some((maintenance_name(*maintenance), hist, *color))
            })
            .collect();
        histogram_panel(hist_panel, &config.font, sensor.label(), &series)?;

        let mut chart = ChartBuilder::on(ecdf_panel)
            .set_label_area_size(LabelAreaPosition::Left, 50)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .margin(10)
            .build_cartesian_2d(padded(values.iter().cloned()), 0f64..1f64)
            .map_err(drawing)?;
        chart
            .configure_mesh()
            .x_desc(sensor.label())
            .y_desc("ECDF")
            .axis_desc_style((config.font.as_str(), 14))
            .draw()
            .map_err(drawing)?;
        for ((maintenance, values), color) in groups.iter().zip(colors.iter().cycle()) {
            let color = *color;
            chart
                .draw_series(LineSeries::new(ecdf(values), &color))
                .map_err(drawing)?
                .label(maintenance_name(*maintenance))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        if groups.len() > 1 {
            chart
                .configure_series_labels()
                .border_style(&BLACK)
                .background_style(&WHITE.mix(0.8))
                .position(SeriesLabelPosition::LowerRight)
                .label_font((config.font.as_str(), 12))
                .draw()
                .map_err(drawing)?;
        }
    }
    root.present().map_err(drawing)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding() {
        assert_eq!(padded(Vec::<f64>::new()), 0f64..1f64);
        assert_eq!(padded(vec![2.]), 1.5..2.5);
        let r = padded(vec![0., 10., f64::NAN]);
        assert_eq!(r, -0.5..10.5);
    }

    #[test]
    fn names() {
        assert_eq!(status_name(2), "Failure");
        assert_eq!(status_name(7), "status 7");
        assert_eq!(maintenance_name(true), "maintenance_required (1)");
    }
}
