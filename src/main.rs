use anyhow::Context;
use formcoach::config::Config;
use formcoach::net::PoseServer;
use formcoach::pose::{PoseEstimator, SidecarEstimator};
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Config::command().get_matches();
    let config = Config::from_matches(&matches)?;

    // gracefully close every session when receiving SIGINT, SIGTERM, or SIGHUP
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        signal.cancel();
    })
    .context("Error setting Ctrl-C handler")?;

    let estimator: Arc<dyn PoseEstimator> = Arc::new(SidecarEstimator::spawn(&config.estimator_cmd));
    let server = PoseServer::bind(&config, estimator).await?;

    server.run(shutdown).await?;
    info!("{} {} stopped", formcoach::config::app_name(), formcoach::config::app_version());

    Ok(())
}
