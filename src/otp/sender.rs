use anyhow::Result;
use tracing::info;

/// A freshly issued code on its way to the subject.
#[derive(Clone, Debug)]
pub struct OtpDelivery {
    pub subject_id: String,
    pub email: Option<String>,
    pub code: String,
    pub expires_at: i64,
}

pub trait OtpSender: Send + Sync {
    /// Deliver a code or return an error to mark the delivery as failed.
    fn send(&self, delivery: &OtpDelivery) -> Result<()>;
}

/// Local dev sender that logs the code instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogOtpSender;

impl OtpSender for LogOtpSender {
    fn send(&self, delivery: &OtpDelivery) -> Result<()> {
        info!(
            subject_id = %delivery.subject_id,
            email = delivery.email.as_deref().unwrap_or_default(),
            code = %delivery.code,
            expires_at = delivery.expires_at,
            "otp delivery stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_delivery() {
        let delivery = OtpDelivery {
            subject_id: "u1".to_string(),
            email: None,
            code: "123456".to_string(),
            expires_at: 60_000,
        };
        assert!(LogOtpSender.send(&delivery).is_ok());
    }
}
