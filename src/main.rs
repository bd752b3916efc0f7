use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use settlement_density::{
    dataset::DatasetLoader,
    engine::{DensityEngine, DominantGroup},
    expeditions::{active_annotations, active_expeditions},
    influence::Era,
    markers::settlement_statuses,
    snapshot::{
        expeditions_geojson, grid_geojson, settlements_geojson, GridSnapshot, SnapshotWriter,
    },
    telemetry,
    web::{self, WebServerConfig},
    EngineConfig,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Historical settlement density grids for California")]
struct Cli {
    /// Path to the dataset YAML file
    #[arg(long, global = true, default_value = "datasets/california.yaml")]
    dataset: PathBuf,

    /// Optional engine configuration YAML (defaults are built in)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the density grid for one year
    Grid {
        #[arg(long, allow_negative_numbers = true)]
        year: i32,
        #[arg(long, value_enum, default_value_t = Format::Summary)]
        format: Format,
        /// Evaluate rows on the rayon thread pool
        #[arg(long)]
        parallel: bool,
    },
    /// List settlements with a non-zero population in one year
    Settlements {
        #[arg(long, allow_negative_numbers = true)]
        year: i32,
        #[arg(long, value_enum, default_value_t = Format::Summary)]
        format: Format,
    },
    /// List expedition routes shown in one year
    Expeditions {
        #[arg(long, allow_negative_numbers = true)]
        year: i32,
        #[arg(long, value_enum, default_value_t = Format::Summary)]
        format: Format,
    },
    /// Write one JSON snapshot per year in a range
    Export {
        #[arg(long, allow_negative_numbers = true)]
        from: i32,
        #[arg(long, allow_negative_numbers = true)]
        to: i32,
        #[arg(long, default_value_t = 1)]
        step: u32,
        #[arg(long, default_value = "snapshots")]
        out: PathBuf,
    },
    /// Serve grids over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Summary,
    Json,
    Geojson,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    telemetry::init(&config.logging.level);

    let dataset = DatasetLoader::new(".").load(&cli.dataset)?;

    match cli.command {
        Command::Grid {
            year,
            format,
            parallel,
        } => {
            let engine = DensityEngine::from_dataset(&dataset, config);
            let grid = if parallel {
                engine.build_grid_parallel(year)
            } else {
                engine.build_grid(year)
            };
            match format {
                Format::Summary => {
                    println!(
                        "{} {}: {} of {} cells above threshold, max density {:.2}/sq mi",
                        dataset.name,
                        year,
                        grid.len(),
                        engine.lat_lon_grid().cell_count(),
                        grid.max_density()
                    );
                    let era = Era::of(year, &engine.config().eras);
                    for group in [
                        DominantGroup::Native,
                        DominantGroup::Spanish,
                        DominantGroup::Mexican,
                        DominantGroup::American,
                        DominantGroup::Mixed,
                    ] {
                        println!("  {:<9} {}", group.label(), grid.count_by_group(group));
                    }
                    println!("  prior-colonial bucket shown as {}", era.prior_colonial_label());
                }
                Format::Json => {
                    let snapshot = GridSnapshot::new(
                        &dataset.name,
                        &grid,
                        settlement_statuses(&dataset, year),
                        &engine.config().encoding,
                    );
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                Format::Geojson => {
                    let geojson = grid_geojson(&grid, &engine.config().encoding);
                    println!("{}", serde_json::to_string_pretty(&geojson)?);
                }
            }
        }
        Command::Settlements { year, format } => {
            let statuses = settlement_statuses(&dataset, year);
            match format {
                Format::Summary => {
                    println!("{} active settlements in {}", statuses.len(), year);
                    for status in &statuses {
                        println!(
                            "  {:<40} {:<9} founded {} ~{}",
                            status.name,
                            status.category.label(),
                            status.founded,
                            status.population
                        );
                    }
                }
                Format::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
                Format::Geojson => {
                    println!("{}", serde_json::to_string_pretty(&settlements_geojson(&statuses))?)
                }
            }
        }
        Command::Expeditions { year, format } => {
            let expeditions = active_expeditions(&dataset, year);
            match format {
                Format::Summary => {
                    println!("{} expeditions under way in {}", expeditions.len(), year);
                    for expedition in &expeditions {
                        println!(
                            "  {:<45} {} {}-{}",
                            expedition.name,
                            expedition.leader,
                            expedition.start_year,
                            expedition.end_year.unwrap_or(expedition.start_year)
                        );
                    }
                    for note in active_annotations(&dataset, year) {
                        println!("  * {}: {}", note.expedition, note.annotation.title);
                    }
                }
                Format::Json => println!("{}", serde_json::to_string_pretty(&expeditions)?),
                Format::Geojson => println!(
                    "{}",
                    serde_json::to_string_pretty(&expeditions_geojson(&expeditions))?
                ),
            }
        }
        Command::Export {
            from,
            to,
            step,
            out,
        } => {
            anyhow::ensure!(from <= to, "--from ({from}) must not be after --to ({to})");
            let step = usize::try_from(step.max(1)).context("step out of range")?;
            let engine = DensityEngine::from_dataset(&dataset, config);
            let writer = SnapshotWriter::new(&out);
            let mut written = 0_usize;
            for year in (from..=to).step_by(step) {
                let grid = engine.build_grid(year);
                let snapshot = GridSnapshot::new(
                    &dataset.name,
                    &grid,
                    settlement_statuses(&dataset, year),
                    &engine.config().encoding,
                );
                writer.write(&snapshot)?;
                written += 1;
            }
            println!(
                "Wrote {} snapshots for '{}' to {}",
                written,
                dataset.name,
                out.join(&dataset.name).display()
            );
        }
        Command::Serve { host, port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(web::run(WebServerConfig {
                dataset,
                config,
                host,
                port,
            }))?;
        }
    }
    Ok(())
}
