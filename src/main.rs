use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, info, warn};
use structopt::StructOpt;

use covidprovinces::chart::LineChartSink;
use covidprovinces::cluster::{read_clusters, ClusterPalette};
use covidprovinces::metrics::{self, DerivedKind, DerivedTable};
use covidprovinces::normalize::normalize;
use covidprovinces::province::ProvinceNames;
use covidprovinces::sink::{CsvSink, LongFrame, Sink};
use covidprovinces::{transform, Config, Transformed, WideTable};

const DEFAULT_LOGGING_LEVEL: &str = "warn";

fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

fn parse_kind(s: &str) -> Result<DerivedKind, String> {
    match s {
        "mortality" => Ok(DerivedKind::MortalityRate),
        "reported" => Ok(DerivedKind::ReportedMortalityRate),
        "growth" => Ok(DerivedKind::GrowthRate),
        _ => Err(format!("unknown metric {s:?} (mortality, reported, growth)")),
    }
}

#[derive(Debug, StructOpt)]
struct Window {
    #[structopt(long, parse(try_from_str = parse_date), help = "First date (%Y-%m-%d format)")]
    from: Option<NaiveDate>,
    #[structopt(long, parse(try_from_str = parse_date), help = "Last date (%Y-%m-%d format)")]
    to: Option<NaiveDate>,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Extract per-province rows from a raw area dump
    Extract {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },
    /// Write derived metrics of a wide table as long CSV
    Derive {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        #[structopt(parse(from_os_str))]
        output: PathBuf,
        #[structopt(long, parse(try_from_str = parse_kind))]
        metric: Option<DerivedKind>,
        #[structopt(flatten)]
        window: Window,
    },
    /// Print the confirmed-case change between two dates
    Change {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        #[structopt(flatten)]
        window: Window,
    },
    /// Print each province's share of confirmed cases on a date
    Share {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        #[structopt(long, parse(try_from_str = parse_date))]
        date: Option<NaiveDate>,
        #[structopt(long, default_value = "10")]
        top: usize,
    },
    /// Plot a derived metric for the provinces with the highest peaks
    Chart {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        #[structopt(parse(from_os_str))]
        output: PathBuf,
        #[structopt(long, default_value = "mortality", parse(try_from_str = parse_kind))]
        metric: DerivedKind,
        #[structopt(long, default_value = "10")]
        top: usize,
        #[structopt(flatten)]
        window: Window,
    },
    /// Print the color assigned to each risk cluster
    Clusters {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(name = "covidprovinces", about = "Reshape and analyze province COVID-19 tables")]
struct Opt {
    #[structopt(long, parse(from_os_str), default_value = "covidprovinces.toml")]
    config: PathBuf,
    #[structopt(subcommand)]
    command: Command,
}

fn load_transformed(input: &Path, config: &Config, window: &Window) -> Result<Transformed> {
    let raw = WideTable::load(input).with_context(|| format!("loading {}", input.display()))?;
    let mut out = transform(&raw, config)?;
    for name in &out.normalize_report.unmapped {
        warn!("kept unmapped province {name:?}");
    }
    if window.from.is_some() || window.to.is_some() {
        let dates = out.long.dates();
        let first = window.from.or(dates.first().copied());
        let last = window.to.or(dates.last().copied());
        if let (Some(first), Some(last)) = (first, last) {
            debug!("restricting to {first}..={last}");
            let long = out.long.between(first, last);
            out.derived = metrics::mortality(&long)
                .merge(metrics::reported_mortality(&long))
                .merge(metrics::growth(&long));
            out.long = long;
        }
    }
    Ok(out)
}

fn only_kind(derived: &DerivedTable, kind: DerivedKind) -> DerivedTable {
    DerivedTable::new(derived.kind(kind).cloned().collect())
}

fn extract(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let raw = WideTable::load(input).with_context(|| format!("loading {}", input.display()))?;
    let out = normalize(&raw, &config.extract, &ProvinceNames::new())?;
    out.table
        .write_csv(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Kept {} of {} rows ({} outside region, {} duplicates).",
        out.table.len(),
        raw.len(),
        out.report.filtered_out,
        out.report.duplicates
    );
    Ok(())
}

fn derive(
    config: &Config,
    input: &Path,
    output: &Path,
    metric: Option<DerivedKind>,
    window: &Window,
) -> Result<()> {
    let out = load_transformed(input, config, window)?;
    let derived = match metric {
        Some(kind) => only_kind(&out.derived, kind),
        None => out.derived,
    };
    CsvSink::new(output).consume(&LongFrame::from(&derived))?;
    println!("Wrote {} values to {}", derived.len(), output.display());
    Ok(())
}

fn change(config: &Config, input: &Path, window: &Window) -> Result<()> {
    let out = load_transformed(input, config, window)?;
    let dates = out.long.dates();
    let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
        anyhow::bail!("no dated columns in {}", input.display());
    };
    println!("Change in confirmed cases from {first} to {last}:");
    println!();
    for c in metrics::window_change(&out.long, first, last) {
        println!("{}: {:.0} -> {:.0} ({:+.1}%)", c.entity, c.first, c.last, c.change);
    }
    Ok(())
}

fn share(config: &Config, input: &Path, date: Option<NaiveDate>, top: usize) -> Result<()> {
    let out = load_transformed(input, config, &Window { from: None, to: None })?;
    let Some(date) = date.or(out.long.dates().last().copied()) else {
        anyhow::bail!("no dated columns in {}", input.display());
    };
    let shares = metrics::share_of_total(&out.long, date, top, &config.others_label);
    let total: f64 = shares.iter().map(|(_, v)| v).sum();
    println!("Confirmed cases on {date}:");
    for (entity, value) in shares {
        let pct = if total == 0.0 { 0.0 } else { value / total * 100.0 };
        println!("{entity}: {value:.0} ({pct:.1}%)");
    }
    Ok(())
}

fn chart(
    config: &Config,
    input: &Path,
    output: &Path,
    kind: DerivedKind,
    top: usize,
    window: &Window,
) -> Result<()> {
    let out = load_transformed(input, config, window)?;
    let derived = only_kind(&out.derived, kind);
    let leaders = metrics::top_entities(&derived, kind, top);
    info!("plotting {}", leaders.join(", "));
    let frame = LongFrame::from(&derived).retain_entities(&leaders);
    LineChartSink::new(output, &format!("{kind} by province"))
        .consume(&frame)
        .with_context(|| format!("plotting {}", output.display()))?;
    Ok(())
}

fn clusters(input: &Path) -> Result<()> {
    let records = read_clusters(input).with_context(|| format!("loading {}", input.display()))?;
    let palette = ClusterPalette::new(records.iter().map(|r| r.cluster));
    for (label, color) in palette.entries() {
        let members: Vec<&str> = records
            .iter()
            .filter(|r| r.cluster == *label)
            .map(|r| r.province.as_str())
            .collect();
        println!(
            "Cluster {label} #{:02x}{:02x}{:02x}: {}",
            color.red,
            color.green,
            color.blue,
            members.join(" ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(DEFAULT_LOGGING_LEVEL),
    )
    .init();
    let opt = Opt::from_args();
    debug!("args: {opt:?}");
    let config = Config::load(&opt.config)
        .with_context(|| format!("reading config {}", opt.config.display()))?;
    debug!("config: {config:?}");

    match opt.command {
        Command::Extract { input, output } => extract(&config, &input, &output),
        Command::Derive {
            input,
            output,
            metric,
            window,
        } => derive(&config, &input, &output, metric, &window),
        Command::Change { input, window } => change(&config, &input, &window),
        Command::Share { input, date, top } => share(&config, &input, date, top),
        Command::Chart {
            input,
            output,
            metric,
            top,
            window,
        } => chart(&config, &input, &output, metric, top, &window),
        Command::Clusters { input } => clusters(&input),
    }
}
