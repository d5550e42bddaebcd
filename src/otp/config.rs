//! OTP policy configuration.

const DEFAULT_OTP_LENGTH: usize = 6;
const DEFAULT_OTP_EXPIRY_SECONDS: u64 = 60;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_ATTEMPTS_RESEND: u32 = 3;
const DEFAULT_BLOCK_DURATION_SECONDS: u64 = 5 * 60;

pub const MIN_OTP_LENGTH: usize = 4;
pub const MAX_OTP_LENGTH: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OtpConfig {
    otp_length: usize,
    otp_expiry_seconds: u64,
    max_attempts: u32,
    max_attempts_resend: u32,
    block_duration_seconds: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            otp_length: DEFAULT_OTP_LENGTH,
            otp_expiry_seconds: DEFAULT_OTP_EXPIRY_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_attempts_resend: DEFAULT_MAX_ATTEMPTS_RESEND,
            block_duration_seconds: DEFAULT_BLOCK_DURATION_SECONDS,
        }
    }

    /// Code length, clamped to `MIN_OTP_LENGTH..=MAX_OTP_LENGTH`.
    #[must_use]
    pub fn with_otp_length(mut self, length: usize) -> Self {
        self.otp_length = length.clamp(MIN_OTP_LENGTH, MAX_OTP_LENGTH);
        self
    }

    #[must_use]
    pub fn with_otp_expiry_seconds(mut self, seconds: u64) -> Self {
        self.otp_expiry_seconds = seconds;
        self
    }

    /// Failed verifications allowed per code; at least one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Resends allowed per challenge lifecycle; at least one.
    #[must_use]
    pub fn with_max_attempts_resend(mut self, attempts: u32) -> Self {
        self.max_attempts_resend = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_block_duration_seconds(mut self, seconds: u64) -> Self {
        self.block_duration_seconds = seconds;
        self
    }

    #[must_use]
    pub fn otp_length(&self) -> usize {
        self.otp_length
    }

    #[must_use]
    pub fn otp_expiry_seconds(&self) -> u64 {
        self.otp_expiry_seconds
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn max_attempts_resend(&self) -> u32 {
        self.max_attempts_resend
    }

    #[must_use]
    pub fn block_duration_seconds(&self) -> u64 {
        self.block_duration_seconds
    }

    pub(crate) fn otp_expiry_millis(&self) -> i64 {
        seconds_to_millis(self.otp_expiry_seconds)
    }

    pub(crate) fn block_duration_millis(&self) -> i64 {
        seconds_to_millis(self.block_duration_seconds)
    }
}

fn seconds_to_millis(seconds: u64) -> i64 {
    i64::try_from(seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_config_defaults_and_overrides() {
        let config = OtpConfig::new();
        assert_eq!(config.otp_length(), 6);
        assert_eq!(config.otp_expiry_seconds(), 60);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.max_attempts_resend(), 3);
        assert_eq!(config.block_duration_seconds(), 300);
        assert_eq!(config.otp_expiry_millis(), 60_000);
        assert_eq!(config.block_duration_millis(), 300_000);

        let config = config
            .with_otp_length(8)
            .with_otp_expiry_seconds(120)
            .with_max_attempts(5)
            .with_max_attempts_resend(2)
            .with_block_duration_seconds(900);

        assert_eq!(config.otp_length(), 8);
        assert_eq!(config.otp_expiry_seconds(), 120);
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.max_attempts_resend(), 2);
        assert_eq!(config.block_duration_seconds(), 900);
    }

    #[test]
    fn otp_config_clamps_degenerate_values() {
        let config = OtpConfig::new()
            .with_otp_length(1)
            .with_max_attempts(0)
            .with_max_attempts_resend(0);
        assert_eq!(config.otp_length(), MIN_OTP_LENGTH);
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.max_attempts_resend(), 1);

        let config = OtpConfig::new().with_otp_length(64);
        assert_eq!(config.otp_length(), MAX_OTP_LENGTH);
    }

    #[test]
    fn huge_durations_saturate() {
        let config = OtpConfig::new().with_block_duration_seconds(u64::MAX);
        assert_eq!(config.block_duration_millis(), i64::MAX);
    }
}
