use super::{
    block::check_blocked,
    challenge::ChallengeEngine,
    clock::{Clock, remaining_seconds},
    config::OtpConfig,
    error::{
        AccountState, BlockStatus, ChallengeOutcome, OtpError, ResendOutcome, SubmitOutcome,
    },
    locks::SubjectLocks,
    models::PendingRegistration,
    registration::{RegistrationError, RegistrationRequest, stage},
    sender::OtpSender,
};
use crate::{
    identity::Subject,
    store::{PENDING_REGISTRATIONS, RecordStore, USERS},
};
use std::sync::Arc;
use tracing::{error, instrument};

/// Caller-facing OTP operations.
///
/// Every operation runs under the subject's lock and folds the domain errors
/// into an outcome; only store failures come back as `Err`.
pub struct OtpService {
    engine: ChallengeEngine,
    locks: SubjectLocks,
}

impl OtpService {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn OtpSender>,
        config: OtpConfig,
    ) -> Self {
        Self {
            engine: ChallengeEngine::new(store, clock, sender, config),
            locks: SubjectLocks::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        self.engine.config()
    }

    /// Store connectivity for health checks.
    ///
    /// # Errors
    /// `StoreUnavailable` when the store does not answer.
    pub async fn ping(&self) -> Result<(), OtpError> {
        Ok(self.engine.store().ping().await?)
    }

    /// # Errors
    /// `StoreUnavailable`
    #[instrument(skip(self))]
    pub async fn start_challenge(&self, subject_id: &str) -> Result<ChallengeOutcome, OtpError> {
        let _guard = self.locks.acquire(subject_id).await;
        match self.engine.generate(subject_id).await {
            Ok(issued) => Ok(ChallengeOutcome::Issued {
                expires_in: remaining_seconds(issued.expires_at, self.engine.now()),
            }),
            Err(OtpError::AlreadyBlocked { remaining_seconds }) => {
                Ok(ChallengeOutcome::Blocked { remaining_seconds })
            }
            Err(OtpError::NotRegistered) => Ok(ChallengeOutcome::NotRegistered),
            Err(OtpError::Exhausted) => Ok(ChallengeOutcome::Blocked {
                remaining_seconds: self.config().block_duration_seconds(),
            }),
            Err(err) => Err(unexpected(err)),
        }
    }

    /// # Errors
    /// `StoreUnavailable`
    #[instrument(skip(self, code))]
    pub async fn submit_code(&self, subject_id: &str, code: &str) -> Result<SubmitOutcome, OtpError> {
        let _guard = self.locks.acquire(subject_id).await;
        match self.engine.verify(subject_id, code).await {
            Ok(()) => Ok(SubmitOutcome::Verified),
            Err(OtpError::InvalidCode) => Ok(SubmitOutcome::InvalidCode),
            Err(OtpError::Mismatch { remaining_attempts }) => {
                Ok(SubmitOutcome::WrongCode { remaining_attempts })
            }
            Err(OtpError::Expired | OtpError::NoChallenge) => Ok(SubmitOutcome::Expired),
            Err(OtpError::AlreadyBlocked { remaining_seconds }) => {
                Ok(SubmitOutcome::Blocked { remaining_seconds })
            }
            Err(OtpError::Exhausted) => Ok(SubmitOutcome::Blocked {
                remaining_seconds: self.config().block_duration_seconds(),
            }),
            Err(err) => Err(unexpected(err)),
        }
    }

    /// # Errors
    /// `StoreUnavailable`
    #[instrument(skip(self))]
    pub async fn request_resend(&self, subject_id: &str) -> Result<ResendOutcome, OtpError> {
        let _guard = self.locks.acquire(subject_id).await;
        match self.engine.resend(subject_id).await {
            Ok(issued) => Ok(ResendOutcome::Resent {
                remaining_resends: issued.remaining_resends,
                expires_in: remaining_seconds(issued.expires_at, self.engine.now()),
            }),
            Err(OtpError::NoChallenge) => Ok(ResendOutcome::SessionExpired),
            Err(OtpError::Cooldown { remaining_seconds }) => {
                Ok(ResendOutcome::Cooldown { remaining_seconds })
            }
            Err(OtpError::AlreadyBlocked { remaining_seconds }) => {
                Ok(ResendOutcome::Blocked { remaining_seconds })
            }
            Err(OtpError::Exhausted) => Ok(ResendOutcome::Blocked {
                remaining_seconds: self.config().block_duration_seconds(),
            }),
            Err(err) => Err(unexpected(err)),
        }
    }

    /// # Errors
    /// `StoreUnavailable`
    #[instrument(skip(self))]
    pub async fn get_block_status(&self, subject_id: &str) -> Result<BlockStatus, OtpError> {
        let _guard = self.locks.acquire(subject_id).await;
        check_blocked(self.engine.store(), subject_id, self.engine.now()).await
    }

    /// Validate and stage a registration for the authenticated subject.
    ///
    /// # Errors
    /// See [`RegistrationError`].
    #[instrument(skip(self, subject, request), fields(subject_id = %subject.subject_id))]
    pub async fn register(
        &self,
        subject: &Subject,
        request: RegistrationRequest,
    ) -> Result<PendingRegistration, RegistrationError> {
        let _guard = self.locks.acquire(&subject.subject_id).await;
        stage(self.engine.store(), subject, request, self.engine.now()).await
    }

    /// Where a freshly signed-in subject belongs.
    ///
    /// # Errors
    /// `StoreUnavailable`
    #[instrument(skip(self))]
    pub async fn account_state(&self, subject_id: &str) -> Result<AccountState, OtpError> {
        let store = self.engine.store();
        if store.get(USERS, subject_id).await?.is_some() {
            return Ok(AccountState::Active);
        }
        if store.get(PENDING_REGISTRATIONS, subject_id).await?.is_some() {
            return Ok(AccountState::PendingVerification);
        }
        Ok(AccountState::Unregistered)
    }
}

/// Anything but a store fault here is a broken invariant in the engine; it is
/// surfaced as a store fault so callers retry instead of reading a verdict.
fn unexpected(err: OtpError) -> OtpError {
    match err {
        OtpError::StoreUnavailable(_) => err,
        other => {
            error!("Unexpected OTP engine error: {other}");
            OtpError::StoreUnavailable(other.to_string())
        }
    }
}
