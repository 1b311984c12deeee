mod report;

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use couponhub_core::IngestionMetrics;
use couponhub_ingest::IngestionService;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "couponhub")]
#[command(about = "Coupon ingestion command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run ingestion once, for one provider or every enabled provider
    Run {
        /// Provider name (exact match); omit to run all enabled providers
        #[arg(long)]
        provider: Option<String>,
    },
    /// List stored coupons
    Coupons {
        /// Only coupons from this vendor (exact provider name)
        #[arg(long)]
        vendor: Option<String>,

        /// Only coupons that have not expired
        #[arg(long)]
        active: bool,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show store counts and provider health
    Health {
        /// Run every enabled provider first so health reflects a fresh run
        #[arg(long)]
        run: bool,
    },
    /// Show ingestion metrics recorded by this invocation
    Metrics {
        #[arg(long)]
        provider: Option<String>,

        /// Most recent entries to show per provider
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Run ingestion (for `--provider`, or every enabled provider) first
        #[arg(long)]
        run: bool,
    },
    /// List configured providers
    Providers,
    /// Delete a single stored coupon by id
    Delete { id: String },
    /// Remove every stored coupon
    Clear {
        /// Required confirmation flag
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = couponhub_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("couponhub: no command given; see --help");
        return Ok(());
    };

    let providers = match &config.providers_path {
        Some(path) => couponhub_core::load_providers(path)?.providers,
        None => couponhub_core::default_providers(),
    };
    let service = IngestionService::from_app_config(&config, providers)?;
    service.initialize().await?;

    let result = run_command(&service, command).await;
    service.shutdown().await?;
    result
}

async fn run_command(service: &IngestionService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run { provider } => {
            tracing::info!(provider = ?provider, "cli: running ingestion");
            let results = service.run_ingestion_now(provider.as_deref()).await?;
            report::print_metrics(&results);
            let failed = results
                .iter()
                .filter(|m| m.status == couponhub_core::RunStatus::Failure)
                .count();
            if failed > 0 {
                anyhow::bail!("{failed} of {} ingestion run(s) failed", results.len());
            }
        }
        Commands::Coupons {
            vendor,
            active,
            json,
        } => {
            let mut coupons = match vendor.as_deref() {
                Some(v) => service.coupons_by_vendor(v).await,
                None => service.coupons().await,
            };
            if active {
                let now = chrono::Utc::now();
                coupons.retain(|c| c.is_active_at(now));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&coupons)?);
            } else {
                report::print_coupons(&coupons);
            }
        }
        Commands::Health { run } => {
            if run {
                service.run_ingestion_now(None).await?;
            }
            report::print_health(&service.health_status().await);
            if !run {
                println!("provider health reflects this invocation only; pass --run to ingest first");
            }
        }
        Commands::Metrics {
            provider,
            limit,
            run,
        } => {
            if let Some(name) = provider.as_deref() {
                if !service.has_provider(name) {
                    anyhow::bail!("provider not found: {name}");
                }
            }
            if run {
                service.run_ingestion_now(provider.as_deref()).await?;
            }
            let entries = match provider.as_deref() {
                Some(name) => service.metrics(name, limit),
                None => latest_per_provider(service.all_metrics(), limit),
            };
            if entries.is_empty() {
                println!("no metrics recorded; pass --run to ingest first");
            } else {
                report::print_metrics(&entries);
            }
        }
        Commands::Providers => report::print_providers(&service.providers()),
        Commands::Delete { id } => {
            if service.delete_coupon(&id).await? {
                println!("deleted coupon {id}");
            } else {
                anyhow::bail!("coupon not found: {id}");
            }
        }
        Commands::Clear { yes } => {
            if !yes {
                anyhow::bail!("refusing to clear the coupon store without --yes");
            }
            let total = service.coupons().await.len();
            service.clear_coupons().await?;
            println!("cleared {total} coupon(s)");
        }
    }
    Ok(())
}

/// Keeps the newest `limit` entries of each provider's oldest-first history.
fn latest_per_provider(
    all: BTreeMap<String, Vec<IngestionMetrics>>,
    limit: usize,
) -> Vec<IngestionMetrics> {
    all.into_values()
        .flat_map(|entries| {
            let skip = entries.len().saturating_sub(limit);
            entries.into_iter().skip(skip)
        })
        .collect()
}
