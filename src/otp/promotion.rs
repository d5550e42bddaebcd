use super::{
    error::{OtpError, PromotionOutcome},
    models::{FIELD_BLOCKED, FIELD_BLOCKED_UNTIL, FIELD_VERIFIED_AT},
};
use crate::store::{PENDING_REGISTRATIONS, RecordStore, SetMode, USERS};
use serde_json::json;
use tracing::{info, instrument, warn};

/// Move `tempUsers/{id}` to `users/{id}`.
///
/// The user record is an overwrite, so a retry after a failed delete rewrites
/// the same account and then finishes the delete.
///
/// # Errors
/// [`OtpError::StoreUnavailable`] when the store fails.
#[instrument(skip(store))]
pub async fn promote(
    store: &dyn RecordStore,
    subject_id: &str,
    now: i64,
) -> Result<PromotionOutcome, OtpError> {
    let Some(pending) = store.get(PENDING_REGISTRATIONS, subject_id).await? else {
        warn!("Nothing to promote");
        return Ok(PromotionOutcome::NothingToPromote);
    };

    let mut fields = pending.fields;
    fields.remove(FIELD_BLOCKED);
    fields.remove(FIELD_BLOCKED_UNTIL);
    fields.insert(FIELD_VERIFIED_AT.to_string(), json!(now));

    store
        .set(USERS, subject_id, fields, SetMode::Overwrite)
        .await?;
    store.delete(PENDING_REGISTRATIONS, subject_id, None).await?;

    info!("Account promoted");
    Ok(PromotionOutcome::Promoted)
}
