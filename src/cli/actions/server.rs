use crate::{
    api,
    identity::{IdentityProvider, RemoteIdentityProvider},
    otp::{LogOtpSender, OtpConfig, OtpService, SystemClock},
    store::{MemoryStore, PgStore, RecordStore},
};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub identity_url: String,
    pub frontend_base_url: String,
    pub otp: OtpConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database or identity provider cannot be set up, or
/// the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let store: Arc<dyn RecordStore> = match &args.dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("No DSN configured, records are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let identity: Arc<dyn IdentityProvider> = Arc::new(
        RemoteIdentityProvider::new(&args.identity_url)
            .context("Failed to set up identity provider client")?,
    );

    debug!("OTP policy: {:?}", args.otp);

    let service = Arc::new(OtpService::new(
        store,
        Arc::new(SystemClock),
        Arc::new(LogOtpSender),
        args.otp,
    ));

    api::new(args.port, service, identity, &args.frontend_base_url).await
}
