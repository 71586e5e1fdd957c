use signature_collector::config::Config;
use signature_collector::server::Server;
use signature_collector::telemetry;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    // Serve until Ctrl+C or SIGTERM, then drain pending callback deliveries
    let server = Server::new(&config).await?;
    server.run().await
}
