use churn_scorer::config::cli::{Command, PredictArgs, RowArgs};
use churn_scorer::config::OutputFormat;
use churn_scorer::core::charts::render_charts;
use churn_scorer::core::report::{self, ScoringReport};
use churn_scorer::utils::logger;
use churn_scorer::utils::monitor::ProcessMonitor;
use churn_scorer::{AppContext, CliConfig, Result, ScorerError, ScoringEngine, Settings};
use clap::Parser;

fn main() {
    let cli = CliConfig::parse();

    let settings = match Settings::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            logger::init_cli_logger(cli.verbose, cli.log_format.unwrap_or_default(), None);
            exit_with(e);
        }
    };

    logger::init_cli_logger(cli.verbose, settings.log_format, settings.log_level.as_deref());
    tracing::debug!("Resolved settings: {:?}", settings);

    if let Err(e) = run(&cli.command, &settings) {
        exit_with(e);
    }
}

fn exit_with(e: ScorerError) -> ! {
    tracing::error!(
        "churn-scorer failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("Error: {}", e.user_friendly_message());
    eprintln!("Hint: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

fn run(command: &Command, settings: &Settings) -> Result<()> {
    let mut monitor = ProcessMonitor::new(settings.monitor);
    if monitor.is_enabled() {
        tracing::info!("System monitoring enabled");
    }

    let context = AppContext::load(&settings.artifacts)?;
    monitor.log_stats("load");

    match command {
        Command::Predict(args) => predict(&context, args, settings, monitor),
        Command::Row(args) => row(&context, args, settings),
        Command::Schema => {
            print!("{}", report::format_schema(&context));
            Ok(())
        }
    }
}

fn predict(
    context: &AppContext,
    args: &PredictArgs,
    settings: &Settings,
    monitor: ProcessMonitor,
) -> Result<()> {
    let record = args.customer.to_record()?;
    let mut engine = ScoringEngine::from_context(context).with_monitor(monitor);
    let outcome = engine.score(&record)?;

    let mut scoring_report = ScoringReport::new(&outcome);

    if settings.render_charts {
        let charts = render_charts(
            &outcome.attribution,
            &settings.output_dir,
            &settings.summary_chart,
            &settings.contributions_chart,
            settings.chart_size,
        )?;
        tracing::info!("Charts written to {}", settings.output_dir.display());
        engine.monitor_mut().log_stats("render");
        scoring_report = scoring_report.with_charts(charts);
    }

    if settings.write_csv {
        let path = settings.contributions_csv_path();
        report::write_contributions_csv(&outcome.attribution.contributions(), &path)?;
        scoring_report = scoring_report.with_contributions_csv(path);
    }

    match settings.format {
        OutputFormat::Text => print!("{}", scoring_report.to_text()),
        OutputFormat::Json => println!("{}", scoring_report.to_json()?),
    }
    Ok(())
}

fn row(context: &AppContext, args: &RowArgs, settings: &Settings) -> Result<()> {
    let record = args.customer.to_record()?;
    let engine = ScoringEngine::from_context(context);
    let feature_row = engine.build_row(&record)?;

    match settings.format {
        OutputFormat::Text => print!("{}", report::format_row(&record, &feature_row)),
        OutputFormat::Json => println!("{}", report::row_json(&record, &feature_row)?),
    }
    Ok(())
}
