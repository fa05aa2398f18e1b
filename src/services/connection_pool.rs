use deadpool_postgres::{
    Config as PgConfig, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, SslMode,
};
use tokio_postgres::NoTls;

use crate::config::StoreConfig;
use crate::error::AppError;

/// Connections kept open against the store. Requests are sequential, so one
/// is in use at a time; the spare covers recycling after a broken connection.
const MAX_POOL_SIZE: usize = 2;

/// Build the connection pool for the backing store
///
/// No connection is opened here; the first `get()` connects.
pub fn create_pool(store: &StoreConfig) -> Result<Pool, AppError> {
    if !store.plaintext_allowed() {
        return Err(AppError::Connection(format!(
            "sslmode '{}' requires TLS, which this build does not support; use disable or prefer",
            store.sslmode
        )));
    }

    tracing::info!(
        "Creating connection pool for: {} (max_size: {})",
        mask_credentials(&connection_url(store)),
        MAX_POOL_SIZE
    );

    let mut cfg = PgConfig::new();
    cfg.host = Some(store.host.clone());
    cfg.port = Some(store.port);
    cfg.user = Some(store.user.clone());
    if !store.password.is_empty() {
        cfg.password = Some(store.password.clone());
    }
    cfg.dbname = Some(store.dbname.clone());
    cfg.ssl_mode = Some(if store.sslmode == "disable" {
        SslMode::Disable
    } else {
        SslMode::Prefer
    });
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(MAX_POOL_SIZE));

    cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
        tracing::error!("Failed to create connection pool: {}", e);
        AppError::Connection(format!("Failed to create connection pool: {}", e))
    })
}

/// Descriptor as a `postgresql://` URL, for logging
pub fn connection_url(store: &StoreConfig) -> String {
    let base = format!("postgresql://{}:{}/{}", store.host, store.port, store.dbname);
    match url::Url::parse(&base) {
        Ok(mut url) => {
            let _ = url.set_username(&store.user);
            if !store.password.is_empty() {
                let _ = url.set_password(Some(&store.password));
            }
            url.query_pairs_mut().append_pair("sslmode", &store.sslmode);
            url.to_string()
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}

/// Mask credentials in connection URL for safe logging
pub fn mask_credentials(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-url]".to_string()
    }
}
