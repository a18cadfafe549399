use sweeper_store::{build_rocket, config::StoreConfig};
use tracing::{error, info};

#[rocket::main]
async fn main() {
    tracing_subscriber::fmt::init();
    info!("🚀 Starting sweeper document store");

    let config = StoreConfig::from_env();
    info!(
        "Writes limited to {}/min per client, idle documents evicted after {}s",
        config.writes_per_minute,
        config.inactive_timeout.as_secs()
    );

    let rocket = match build_rocket(config) {
        Ok(rocket) => rocket,
        Err(e) => {
            error!("Invalid CORS configuration: {}", e);
            return;
        }
    };

    info!("📡 Endpoints: GET|PUT|POST|PATCH /documents/<collection>/<id>");
    info!("📡 Endpoints: POST /ids/<collection>, GET /subscribe");
    if let Err(e) = rocket.launch().await {
        error!("Store service stopped: {}", e);
    }
}
