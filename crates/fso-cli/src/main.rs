//! Free-Space Optical Link Simulator Command-Line Interface
//!
//! This CLI provides tools for:
//! - Running the downlink scenario through the discrete-event network
//! - Printing the per-stage link budget
//! - Sweeping link distance
//! - Writing scenario configuration files

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fso_core::error_model::{RxOutcome, SamplingGranularity};
use fso_core::math::linear_to_db;
use fso_core::network::DeliveryRecord;
use fso_core::scenario::{BudgetStage, LinkBudget, Scenario, ScenarioConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fso")]
#[command(author, version, about = "Free-space optical link simulator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log filter directives, e.g. "fso::error_model=debug" (overrides -v)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Granularity {
    Packet,
    Symbol,
}

impl From<Granularity> for SamplingGranularity {
    fn from(g: Granularity) -> Self {
        match g {
            Granularity::Packet => SamplingGranularity::PerPacket,
            Granularity::Symbol => SamplingGranularity::PerSymbol,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the downlink scenario and print every delivery
    Run {
        /// Scenario file (JSON); defaults to the LEO downlink
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of packets to send
        #[arg(short = 'n', long)]
        packets: Option<usize>,

        /// Packet size in bytes
        #[arg(long)]
        size: Option<usize>,

        /// Error model seed
        #[arg(long)]
        seed: Option<u64>,

        /// Link distance in meters (transmitter straight above the receiver)
        #[arg(long)]
        distance: Option<f64>,

        /// Detection threshold (W/m²)
        #[arg(long)]
        threshold: Option<f64>,

        /// Irradiance draws per packet or per bit
        #[arg(long, value_enum)]
        granularity: Option<Granularity>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the link budget stage by stage
    Budget {
        /// Scenario file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Link distance in meters
        #[arg(long)]
        distance: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mean irradiance and scintillation versus link distance
    Sweep {
        /// Start distance (m)
        #[arg(long, default_value = "400000")]
        from: f64,

        /// End distance (m)
        #[arg(long, default_value = "1500000")]
        to: f64,

        /// Number of points
        #[arg(long, default_value = "12")]
        steps: usize,

        /// Scenario file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write the default scenario as JSON
    Config {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<ScenarioConfig> {
    match path {
        Some(path) => ScenarioConfig::from_json_file(path)
            .with_context(|| format!("Failed to load scenario from {}", path.display())),
        None => Ok(ScenarioConfig::leo_downlink()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn outcome_label(outcome: &RxOutcome) -> String {
    match outcome {
        RxOutcome::Delivered { .. } => "ok".to_string(),
        RxOutcome::Corrupted {
            bit_errors: Some(n), ..
        } => format!("CORRUPT ({} bit errors)", n),
        RxOutcome::Corrupted { .. } => "CORRUPT".to_string(),
        RxOutcome::Unchecked => "unchecked".to_string(),
    }
}

fn print_delivery(index: usize, d: &DeliveryRecord) {
    println!(
        "{:>4}  {:>10.6}  {:>4}  {:>12.4e}  {:>12}  {:>8}  {:>8}  {:>8}  {}",
        index,
        d.time.as_millis_f64(),
        d.rx.to_string(),
        d.params.power,
        d.outcome
            .irradiance()
            .map_or_else(|| "-".to_string(), |i| format!("{:.4e}", i)),
        fmt_opt(d.outcome.snr(), 3),
        fmt_opt(d.params.rytov_variance, 4),
        fmt_opt(d.params.scintillation_index, 4),
        outcome_label(&d.outcome),
    );
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    config: Option<PathBuf>,
    packets: Option<usize>,
    size: Option<usize>,
    seed: Option<u64>,
    distance: Option<f64>,
    threshold: Option<f64>,
    granularity: Option<Granularity>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(n) = packets {
        config = config.with_packets(n);
    }
    if let Some(size) = size {
        config = config.with_packet_size(size);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(d) = distance {
        config = config.with_distance(d);
    }
    if let Some(t) = threshold {
        config.error_model.detection_threshold = t;
    }
    if let Some(g) = granularity {
        config.error_model.granularity = g.into();
    }

    let mut scenario = Scenario::build(config).context("Invalid scenario")?;
    info!("Running scenario '{}'", scenario.config().name);
    let report = scenario.run().context("Simulation failed")?;

    if let OutputFormat::Json = format {
        return print_json(&report);
    }

    let config = scenario.config();
    println!("=== FSO Downlink Simulation ===");
    println!("Scenario: {}", config.name);
    println!(
        "Distance: {:.3} km, λ = {:.1} nm, {:.4} Mbit/s",
        config.distance() / 1e3,
        config.wavelength * 1e9,
        config.bit_rate / 1e6
    );
    println!(
        "Packets: {} × {} bytes, threshold {:.3e} W/m², seed {}",
        config.packet_count, config.packet_size, config.error_model.detection_threshold, config.error_model.seed
    );
    println!();
    println!(
        "{:>4}  {:>10}  {:>4}  {:>12}  {:>12}  {:>8}  {:>8}  {:>8}  {}",
        "#", "time (ms)", "rx", "<I> (W/m²)", "sample", "SNR", "σ_R²", "σ_I²", "outcome"
    );
    for (i, d) in report.deliveries.iter().enumerate() {
        print_delivery(i, d);
    }

    println!();
    println!("Summary:");
    println!("  Deliveries: {}", report.deliveries.len());
    println!("  Corrupted:  {}", report.corrupted);
    if report.bit_errors > 0 {
        println!("  Bit errors: {}", report.bit_errors);
    }
    println!("  PER:        {:.2}%", report.packet_error_rate() * 100.0);
    if let Some(mean) = report.mean_sampled_irradiance() {
        println!("  Mean sampled irradiance: {:.4e} W/m²", mean);
    }
    Ok(())
}

fn print_budget(budget: &LinkBudget) {
    println!("=== Link Budget ===");
    println!("Distance: {:.3} km", budget.distance / 1e3);
    println!("Delay:    {}", budget.delay);
    println!("Tx power: {:.4} W ({:.2} dBW)", budget.tx_power, linear_to_db(budget.tx_power));
    println!();
    for stage in &budget.stages {
        println!("[{}]", stage.model);
        if let Some(loss) = stage.path_loss_db {
            println!("  Free-space loss:     {:.2} dB", loss);
        }
        if let Some(rytov) = stage.rytov_variance {
            println!("  Rytov variance:      {:.4}", rytov);
        }
        if let Some(index) = stage.scintillation_index {
            println!("  Scintillation index: {:.4}", index);
        }
        if let Some(w) = stage.rx_beam_radius {
            println!("  Beam radius at rx:   {:.3} m", w);
        }
        println!("  Power:               {:.4e}", stage.power);
    }
    if let Some(irradiance) = budget.mean_irradiance() {
        println!();
        println!("Mean irradiance at receiver: {:.4e} W/m²", irradiance);
    }
}

fn cmd_budget(config: Option<PathBuf>, distance: Option<f64>, format: OutputFormat) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(d) = distance {
        config = config.with_distance(d);
    }
    let scenario = Scenario::build(config).context("Invalid scenario")?;
    let budget = scenario.link_budget().context("Link budget failed")?;

    match format {
        OutputFormat::Json => print_json(&budget),
        OutputFormat::Text => {
            print_budget(&budget);
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct SweepPoint {
    distance: f64,
    path_loss_db: Option<f64>,
    rytov_variance: Option<f64>,
    scintillation_index: Option<f64>,
    rx_beam_radius: Option<f64>,
    mean_irradiance: Option<f64>,
}

fn cmd_sweep(from: f64, to: f64, steps: usize, config: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    if !from.is_finite() || !to.is_finite() || from <= 0.0 || to < from {
        bail!("Invalid range: need 0 < from <= to (got {} .. {})", from, to);
    }
    if steps == 0 {
        bail!("Steps must be at least 1");
    }
    let base = load_config(config.as_deref())?;

    let mut points = Vec::with_capacity(steps);
    for i in 0..steps {
        let distance = if steps == 1 {
            from
        } else {
            from + (to - from) * i as f64 / (steps - 1) as f64
        };
        let scenario = Scenario::build(base.clone().with_distance(distance))
            .with_context(|| format!("Invalid scenario at {} m", distance))?;
        let budget = scenario
            .link_budget()
            .with_context(|| format!("Link budget failed at {} m", distance))?;

        let find = |f: fn(&BudgetStage) -> Option<f64>| budget.stages.iter().find_map(f);
        points.push(SweepPoint {
            distance,
            path_loss_db: find(|s| s.path_loss_db),
            rytov_variance: find(|s| s.rytov_variance),
            scintillation_index: find(|s| s.scintillation_index),
            rx_beam_radius: find(|s| s.rx_beam_radius),
            mean_irradiance: budget.mean_irradiance(),
        });
    }

    if let OutputFormat::Json = format {
        return print_json(&points);
    }

    println!("=== Distance Sweep ===");
    println!(
        "{:>10}  {:>10}  {:>8}  {:>8}  {:>8}  {:>12}",
        "d (km)", "FSL (dB)", "σ_R²", "σ_I²", "W (m)", "<I> (W/m²)"
    );
    for p in &points {
        println!(
            "{:>10.1}  {:>10}  {:>8}  {:>8}  {:>8}  {:>12}",
            p.distance / 1e3,
            fmt_opt(p.path_loss_db, 2),
            fmt_opt(p.rytov_variance, 4),
            fmt_opt(p.scintillation_index, 4),
            fmt_opt(p.rx_beam_radius, 3),
            p.mean_irradiance
                .map_or_else(|| "-".to_string(), |i| format!("{:.4e}", i)),
        );
    }
    Ok(())
}

fn cmd_config(output: Option<PathBuf>) -> Result<()> {
    let config = ScenarioConfig::default();
    match output {
        Some(path) => {
            config
                .save_json(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default scenario to {}", path.display());
        }
        None => println!("{}", config.to_json_pretty()?),
    }
    Ok(())
}

fn init_logging(verbose: u8, directives: Option<&str>) -> Result<()> {
    match directives {
        Some(directives) => {
            let filter = EnvFilter::try_new(directives)
                .with_context(|| format!("Invalid log directives '{}'", directives))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        None => {
            let log_level = match verbose {
                0 => tracing::Level::WARN,
                1 => tracing::Level::INFO,
                2 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            };
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log.as_deref())?;

    match cli.command {
        Commands::Run {
            config,
            packets,
            size,
            seed,
            distance,
            threshold,
            granularity,
            format,
        } => cmd_run(config, packets, size, seed, distance, threshold, granularity, format),

        Commands::Budget {
            config,
            distance,
            format,
        } => cmd_budget(config, distance, format),

        Commands::Sweep {
            from,
            to,
            steps,
            config,
            format,
        } => cmd_sweep(from, to, steps, config, format),

        Commands::Config { output } => cmd_config(output),
    }
}
