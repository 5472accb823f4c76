use tracing::warn;

use crate::metrics::{Metrics, Timer};
use crate::store::{StoreConnector, StoreDriver, StoreError};

/// Raw `INFO` text from the store.
pub async fn server_info<C>(connector: &C) -> Result<String, StoreError>
where
    C: StoreConnector + ?Sized,
{
    let timer = Timer::new();
    let result = match connector.connect().await {
        Ok(driver) => driver.info().await,
        Err(e) => Err(e),
    };

    let metrics = Metrics::get();
    metrics.record_operation("info", timer.elapsed_seconds());
    if let Err(e) = &result {
        metrics.record_error(e.kind(), "info");
    }
    result
}

/// Number of logical databases the store is configured with, or 0 when it
/// cannot be determined.
pub async fn database_count<C>(connector: &C) -> u32
where
    C: StoreConnector + ?Sized,
{
    let timer = Timer::new();
    let result = match connector.connect().await {
        Ok(driver) => driver.config_get("databases").await,
        Err(e) => Err(e),
    };
    Metrics::get().record_operation("databases", timer.elapsed_seconds());

    match result {
        Ok(pairs) => pairs
            .iter()
            .find(|(name, _)| name == "databases")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(0),
        Err(e) => {
            Metrics::get().record_error(e.kind(), "databases");
            warn!("config get databases error: {}", e);
            0
        }
    }
}
