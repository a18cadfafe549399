use std::{sync::Arc, time::Duration};

use tokio::time;
use tracing::{debug, info};

use crate::{config::StoreConfig, documents::Documents};

pub async fn start_cleanup_task(documents: Documents, config: StoreConfig) {
    let mut interval = time::interval(config.cleanup_interval);

    info!(
        "Started document cleanup task: checking every {}s, inactive timeout: {}s",
        config.cleanup_interval.as_secs(),
        config.inactive_timeout.as_secs()
    );

    loop {
        interval.tick().await;
        cleanup_documents(&documents, config.inactive_timeout);
    }
}

/// Drops slots nobody watches that have been idle for `inactive_timeout`.
/// Returns how many were removed.
pub fn cleanup_documents(documents: &Documents, inactive_timeout: Duration) -> usize {
    let mut to_remove = Vec::new();

    for entry in documents.iter() {
        // A locked slot is in use.
        if let Ok(slot) = entry.value().try_lock()
            && slot.should_cleanup(inactive_timeout)
        {
            to_remove.push(entry.key().clone());
        }
    }

    // Re-checked under the shard lock. A slot someone still holds a handle
    // to is kept, even if they have not locked it yet.
    let mut removed_count = 0;
    for key in to_remove {
        let removed = documents.remove_if(&key, |_, slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .is_ok_and(|guard| guard.should_cleanup(inactive_timeout))
        });
        if removed.is_some() {
            removed_count += 1;
            debug!("Cleaned up document: {}", key);
        }
    }

    if removed_count > 0 {
        info!("Cleaned up {} inactive documents", removed_count);
    }
    removed_count
}
