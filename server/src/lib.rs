//! Document store service backing sweeper's turn-based online mode.
//!
//! Documents are JSON objects addressed by `collection/id`. Each accepted
//! write bumps the document's version and is pushed to every WebSocket
//! subscriber of that document.

use std::sync::Arc;

use dashmap::DashMap;
use rocket::{
    Build, Rocket,
    fairing::{Fairing, Info, Kind},
    routes,
};
use tracing::{info, warn};

use crate::{
    cleanup::start_cleanup_task, config::StoreConfig, cors::create_cors, documents::Documents,
    rate_limit::create_rate_limiter,
};

pub mod cleanup;
pub mod config;
pub mod cors;
pub mod documents;
pub mod rate_limit;
pub mod routes;

struct CleanupFairing;

#[rocket::async_trait]
impl Fairing for CleanupFairing {
    fn info(&self) -> Info {
        Info {
            name: "Cleanup Task",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        match (rocket.state::<Documents>(), rocket.state::<StoreConfig>()) {
            (Some(documents), Some(config)) => {
                info!("Starting cleanup task for document slots");
                tokio::spawn(start_cleanup_task(documents.clone(), config.clone()));
            }
            _ => warn!("Failed to get document state for cleanup task"),
        }
        Ok(rocket)
    }
}

/// Assembles the store service: state, fairings and routes.
pub fn build_rocket(config: StoreConfig) -> Result<Rocket<Build>, rocket_cors::Error> {
    let documents: Documents = Arc::new(DashMap::new());
    let rate_limiter = create_rate_limiter();
    let cors = create_cors(&config.cors_allowed_origins)?;

    info!("📊 Initialized document storage and rate limiter");

    Ok(rocket::build()
        .attach(cors)
        .attach(CleanupFairing)
        .manage(documents)
        .manage(rate_limiter)
        .manage(config)
        .mount(
            "/",
            routes![
                routes::get_document,
                routes::set_document,
                routes::create_document,
                routes::update_document,
                routes::create_id,
                routes::subscribe,
            ],
        ))
}
