//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and merges them over the environment
//! - runs the shared pipeline (source -> cache -> filter)
//! - calls the metric, forecast or correlation engine
//! - prints reports and writes optional exports

use std::time::Duration;

use clap::Parser;

use crate::cli::{Cli, Command, CorrelateArgs, ForecastArgs, KpiArgs, QualityArgs, RankArgs, SampleArgs, SourceArgs};
use crate::data::quality::check_dataset;
use crate::data::sample::{SampleConfig, generate_sample};
use crate::data::SourceConfig;
use crate::error::{AppError, AppResult};
use crate::forecast::ForecastOptions;
use crate::io::export::{write_forecast_csv, write_json, write_sample};
use crate::metrics::{channel_breakdown, forecast_cagr, rank_by};
use crate::report;

pub mod pipeline;

use pipeline::{Pipeline, correlate_view, forecast_view, group_yoy, kpi_report};

/// Entry point for the `lbi` binary.
pub fn run() -> AppResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    // `sample` never touches the configured sources.
    let pipeline = || source_config(&cli.source).map(Pipeline::new);

    match cli.command {
        Command::Kpi(args) => handle_kpi(&pipeline()?, args),
        Command::Rank(args) => handle_rank(&pipeline()?, args),
        Command::Forecast(args) => handle_forecast(&pipeline()?, args),
        Command::Correlate(args) => handle_correlate(&pipeline()?, args),
        Command::Quality(args) => handle_quality(&pipeline()?, args),
        Command::Sample(args) => handle_sample(&args),
    }
}

/// Environment first, then explicit flags on top.
pub fn source_config(args: &SourceArgs) -> AppResult<SourceConfig> {
    let mut config = SourceConfig::from_env()?;
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut SourceConfig, args: &SourceArgs) {
    if let Some(url) = &args.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(path) = &args.facts {
        config.facts_csv = Some(path.clone());
    }
    if let Some(path) = &args.brands_csv {
        config.brands_csv = Some(path.clone());
    }
    if let Some(path) = &args.countries_csv {
        config.countries_csv = Some(path.clone());
    }
    if let Some(path) = &args.signals {
        config.signals_csv = Some(path.clone());
    }
    config.force_fallback |= args.force_fallback;
}

fn handle_kpi(pipeline: &Pipeline, args: KpiArgs) -> AppResult<()> {
    let selected = pipeline.select(&args.filter.selection())?;
    let mut kpis = kpi_report(&selected);
    if let Some(granularity) = args.channels {
        kpis.channels = channel_breakdown(&selected.view, granularity);
    }

    println!("{}", report::format_selection(&selected.dataset, &selected.effective));
    if selected.view.is_empty() {
        println!("No rows match the selection.");
    }
    println!(
        "{}",
        report::format_kpis(&kpis.totals, kpis.year_to_date.as_ref(), &kpis.insights)
    );
    if !kpis.channels.is_empty() {
        println!("{}", report::format_channels(&kpis.channels));
    }

    if let Some(path) = &args.json {
        write_json(path, &kpis)?;
    }
    Ok(())
}

fn handle_rank(pipeline: &Pipeline, args: RankArgs) -> AppResult<()> {
    let selection = args.filter.selection();
    let selected = pipeline.select(&selection)?;
    let ranked = rank_by(&selected.view, args.by, Some(args.top));
    println!("{}", report::format_rankings(&ranked, args.by));

    let growth = args
        .yoy_year
        .map(|year| (year, group_yoy(&selected.dataset, &selection, args.by, year)));
    if let Some((year, rows)) = &growth {
        println!("{}", report::format_group_yoy(rows, args.by, *year));
    }

    if let Some(path) = &args.json {
        #[derive(serde::Serialize)]
        struct RankExport<'a> {
            ranking: &'a [crate::domain::RankRow],
            #[serde(skip_serializing_if = "Option::is_none")]
            yoy: Option<&'a [crate::domain::GroupYoy]>,
        }
        write_json(
            path,
            &RankExport {
                ranking: &ranked,
                yoy: growth.as_ref().map(|(_, rows)| rows.as_slice()),
            },
        )?;
    }
    Ok(())
}

fn handle_forecast(pipeline: &Pipeline, args: ForecastArgs) -> AppResult<()> {
    let selected = pipeline.select(&args.filter.selection())?;
    let options = ForecastOptions {
        horizon: args.horizon(),
        sensitivity: args.sensitivity,
        use_model: !args.no_model,
        fit_timeout: args.timeout_ms.map(Duration::from_millis),
        ma_window: args.ma_window,
    };

    let series = forecast_view(&selected.view, &options)?;

    println!("{}", report::format_forecast(&series, options.ma_window * 2));
    if let Some(cagr) = forecast_cagr(&series) {
        println!("Forecast CAGR: {}", report::fmt_pct(Some(cagr)));
    }

    if let Some(path) = &args.export {
        write_forecast_csv(path, &series)?;
    }
    if let Some(path) = &args.json {
        write_json(path, &series)?;
    }
    Ok(())
}

fn handle_correlate(pipeline: &Pipeline, args: CorrelateArgs) -> AppResult<()> {
    let selected = pipeline.select(&args.filter.selection())?;
    let signals = pipeline.signals()?;
    let results = correlate_view(&selected.view, &signals, !args.raw)?;
    println!("{}", report::format_correlations(&results));

    if let Some(path) = &args.json {
        write_json(path, &results)?;
    }
    Ok(())
}

fn handle_quality(pipeline: &Pipeline, args: QualityArgs) -> AppResult<()> {
    if !(args.tolerance.is_finite() && args.tolerance >= 0.0) {
        return Err(AppError::Config(format!("Invalid tolerance {}", args.tolerance)));
    }
    let dataset = pipeline.dataset()?;
    let quality = check_dataset(&dataset, args.tolerance);
    println!("{}", report::format_quality(&quality, args.limit));

    if let Some(path) = &args.json {
        write_json(path, &quality)?;
    }
    Ok(())
}

fn handle_sample(args: &SampleArgs) -> AppResult<()> {
    let mut config = SampleConfig {
        seed: args.seed,
        months: args.months,
        ..SampleConfig::default()
    };
    if let Some(start) = args.start {
        config.start = start;
    }

    let sample = generate_sample(&config)?;
    let files = write_sample(&args.out, &sample)?;
    println!(
        "Wrote {} fact rows to {}\n      brands: {}\n   countries: {}\n     signals: {}",
        sample.facts.len(),
        files.facts.display(),
        files.brands.display(),
        files.countries.display(),
        files.signals.display()
    );
    Ok(())
}

/// Rewrite argv so `lbi` defaults to `lbi kpi`.
///
/// Rules:
/// - `lbi`                      -> `lbi kpi`
/// - `lbi --brand Dior ...`     -> `lbi kpi --brand Dior ...`
/// - `lbi --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("kpi".to_string());
        return argv;
    };

    if matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help") {
        return argv;
    }
    if arg1.starts_with('-') && !argv.iter().skip(1).any(|a| is_subcommand(a)) {
        argv.insert(1, "kpi".to_string());
    }
    argv
}

fn is_subcommand(arg: &str) -> bool {
    matches!(arg, "kpi" | "rank" | "forecast" | "correlate" | "quality" | "sample")
}
