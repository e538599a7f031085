//! Recurring background jobs.
//!
//! Call `spawn_all` once during startup.

use crate::services::SubscriptionService;
use std::time::Duration;

const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawn all background tasks. Detaches them via `tokio::spawn`; does not block.
pub fn spawn_all(subscription_service: SubscriptionService) {
    // hourly: flip lapsed subscriptions to Expired
    tokio::spawn(async move {
        loop {
            match subscription_service.expire_subscriptions().await {
                Ok(n) if n > 0 => log::info!("Expired subscriptions processed: {n}"),
                Ok(_) => {}
                Err(e) => log::error!("Failed to expire subscriptions: {e:?}"),
            }
            tokio::time::sleep(EXPIRY_SWEEP_INTERVAL).await;
        }
    });
}
