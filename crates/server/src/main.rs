use federation_report::api::{AppState, start_webserver};
use federation_report::config::load_config;
use federation_report::federation::{DirectKeyFetcher, DnsDiscoverer, Ed25519KeyVerifier};
use federation_report::report::ReportGenerator;
use hickory_resolver::Resolver;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "federation_report=info,hyper=warn,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    initialize_tracing();

    let config = load_config()?;
    tracing::info!(
        bind_address = %config.bind_address,
        probe_timeout_secs = config.probe_timeout_secs,
        dns_timeout_secs = config.dns_timeout_secs,
        max_concurrent_probes = config.max_concurrent_probes,
        "configuration loaded"
    );

    let resolver = Arc::new(Resolver::builder_tokio()?.build());
    let generator = ReportGenerator::new(
        DnsDiscoverer::new(resolver, config.dns_timeout()),
        DirectKeyFetcher::new(config.report_options().probe_timeout),
        Ed25519KeyVerifier,
        config.report_options(),
    );

    start_webserver(AppState::new(generator), &config.bind_address).await?;
    Ok(())
}
