use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fleetwright_exec::{FakeExecutor, RemoteExecutor, RetryingExecutor, Target};
use fleetwright_provider::{FakeProvider, ProviderRegistry};
use fleetwright_types::{CloudProvider, ClusterManifest};
use tokio_util::sync::CancellationToken;

mod args;

use args::{ApplyArgs, Cli, Commands, EstimateArgs, HealthArgs, ValidateArgs};

#[tokio::main]
async fn main() -> Result<()> {
    fleetwright_common::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply(args) => run_apply(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Estimate(args) => run_estimate(args).await,
        Commands::Health(args) => run_health(args).await,
    }
}

fn load_manifest(path: &str) -> Result<ClusterManifest> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading manifest '{path}'"))?;
    if path.ends_with(".json") {
        serde_json::from_str(&raw).with_context(|| format!("parsing manifest '{path}' as JSON"))
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("parsing manifest '{path}' as YAML"))
    }
}

/// A provider registry covering every `CloudProvider` variant with the
/// in-memory reference driver. No real cloud SDK driver ships in this
/// crate graph, so `apply` reconciles against the same fleet the engine's
/// own test suite exercises.
fn reference_provider_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for kind in [
        CloudProvider::DigitalOcean,
        CloudProvider::Aws,
        CloudProvider::Gcp,
        CloudProvider::Azure,
        CloudProvider::Linode,
        CloudProvider::OnPrem,
    ] {
        registry.register(kind, Arc::new(move |_| Arc::new(FakeProvider::new(kind))));
    }
    registry
}

fn reference_executor() -> Arc<dyn RemoteExecutor> {
    Arc::new(RetryingExecutor::new(
        FakeExecutor::always_ok(),
        fleetwright_common::RetryConfig::default(),
        CancellationToken::new(),
    ))
}

async fn run_apply(args: ApplyArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let engine = fleetwright_engine::Engine::new(reference_provider_registry(), reference_executor())
        .with_concurrency(args.engine.task_ceiling)
        .with_event_buffer(args.engine.event_buffer);

    let mut events = engine.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(kind = %event.kind, source = %event.source, "event");
        }
    });

    let outcome = engine.reconcile(&manifest).await?;
    tracing::info!(
        revision = %outcome.record.version,
        ok = outcome.report.all_ok(),
        "reconcile finished"
    );
    if let Some(bootstrap) = &outcome.bootstrap {
        println!("cluster '{}' bootstrapped; first master: {}", manifest.name, bootstrap.first_master);
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    match fleetwright_engine::validate_manifest(&manifest) {
        Ok(()) => {
            println!("manifest '{}' is valid", args.manifest);
            Ok(())
        }
        Err(e) => {
            println!("manifest '{}' is invalid: {e}", args.manifest);
            Err(e.into())
        }
    }
}

async fn run_estimate(args: EstimateArgs) -> Result<()> {
    use fleetwright_common::EventEmitter;
    use fleetwright_cost::{estimate_cluster_cost_with_events, PriceCache, StaticPriceProvider};

    let manifest = load_manifest(&args.manifest)?;
    let provider = StaticPriceProvider::digital_ocean();
    let cache = PriceCache::new(Duration::from_secs(args.engine.price_cache_ttl_secs));
    let events = EventEmitter::with_buffer(args.engine.event_buffer);

    let mut subscriber = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = subscriber.recv().await {
            tracing::info!(kind = %event.kind, source = %event.source, "event");
        }
    });

    let estimate = estimate_cluster_cost_with_events(
        &manifest.node_pools,
        &provider,
        &cache,
        args.load_balancers,
        args.load_balancer_monthly,
        Some(&events),
    )
    .await?;

    println!(
        "cluster '{}': ${:.2}/month (${:.2}/year)",
        manifest.name, estimate.total.monthly, estimate.total.yearly
    );
    for node in &estimate.nodes {
        println!("  {} ({}): ${:.4}/hr", node.node_name, node.pool_name, node.estimate.hourly);
    }
    for rec in &estimate.recommendations {
        println!("  [{}] {}", rec.kind, rec.message);
    }
    Ok(())
}

async fn run_health(args: HealthArgs) -> Result<()> {
    use fleetwright_health::HealthChecker;

    let executor = FakeExecutor::always_ok();
    let target = Target::new(args.host.clone(), args.user.clone(), args.key_path.clone());
    let report = HealthChecker::new().parallel(args.parallel).run(&executor, &target).await;

    println!("overall: {:?}", report.overall);
    for check in &report.checks {
        println!("  {}: {:?} - {}", check.name, check.status, check.message);
    }
    for rec in &report.recommendations {
        println!("  recommendation: {rec}");
    }
    Ok(())
}
