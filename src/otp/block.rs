//! Block/backoff controller.
//!
//! The block lives on the pending registration (`blocked`, `blockedUntil`), so
//! it survives challenge deletion and cannot be shed by requesting a new code.

use super::{
    CAS_ATTEMPTS,
    clock::remaining_seconds,
    config::OtpConfig,
    contention,
    error::{BlockStatus, OtpError},
    models::{BlockFields, FIELD_BLOCKED, FIELD_BLOCKED_UNTIL, from_fields},
};
use crate::store::{Fields, OTP_CHALLENGES, PENDING_REGISTRATIONS, RecordStore, StoreError};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

/// Report whether `subject_id` is blocked at `now`.
///
/// An elapsed block (`now > blockedUntil`) is cleared on the spot, so only the
/// first call after expiry writes; later calls read `blocked == false`.
///
/// # Errors
/// [`OtpError::StoreUnavailable`] when the store fails or stays contended.
#[instrument(skip(store))]
pub async fn check_blocked(
    store: &dyn RecordStore,
    subject_id: &str,
    now: i64,
) -> Result<BlockStatus, OtpError> {
    for _ in 0..CAS_ATTEMPTS {
        let Some(record) = store.get(PENDING_REGISTRATIONS, subject_id).await? else {
            return Ok(BlockStatus::CLEAR);
        };

        let block: BlockFields = from_fields(&record.fields)?;
        if !block.blocked {
            return Ok(BlockStatus::CLEAR);
        }

        let blocked_until = block.blocked_until.unwrap_or_default();
        if now <= blocked_until {
            return Ok(BlockStatus {
                blocked: true,
                remaining_seconds: remaining_seconds(blocked_until, now),
            });
        }

        let mut clear = Fields::new();
        clear.insert(FIELD_BLOCKED.to_string(), Value::Bool(false));
        clear.insert(FIELD_BLOCKED_UNTIL.to_string(), Value::Null);
        match store
            .update(PENDING_REGISTRATIONS, subject_id, clear, Some(record.version))
            .await
        {
            Ok(_) => {
                info!("Block expired and cleared");
                return Ok(BlockStatus::CLEAR);
            }
            Err(StoreError::NotFound { .. }) => return Ok(BlockStatus::CLEAR),
            Err(err) if err.is_conflict() => {
                debug!("Pending registration changed while clearing block, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(contention(PENDING_REGISTRATIONS, subject_id))
}

/// Block `subject_id` for the configured duration starting at `now`.
///
/// Deletes any live challenge first, then flags the pending registration.
/// Returns the `blockedUntil` timestamp.
///
/// # Errors
/// [`OtpError::StoreUnavailable`] when the store fails.
#[instrument(skip(store, config))]
pub async fn block(
    store: &dyn RecordStore,
    subject_id: &str,
    now: i64,
    config: &OtpConfig,
) -> Result<i64, OtpError> {
    store.delete(OTP_CHALLENGES, subject_id, None).await?;

    let blocked_until = now.saturating_add(config.block_duration_millis());
    let mut fields = Fields::new();
    fields.insert(FIELD_BLOCKED.to_string(), Value::Bool(true));
    fields.insert(FIELD_BLOCKED_UNTIL.to_string(), json!(blocked_until));

    match store
        .update(PENDING_REGISTRATIONS, subject_id, fields, None)
        .await
    {
        Ok(_) => {
            warn!(blocked_until, "Subject blocked");
        }
        Err(StoreError::NotFound { .. }) => {
            warn!("Blocking a subject without a pending registration");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(blocked_until)
}
