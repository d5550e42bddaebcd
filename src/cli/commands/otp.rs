use crate::otp::OtpConfig;
use clap::{Arg, ArgMatches, Command};

pub const ARG_OTP_LENGTH: &str = "otp-length";
pub const ARG_OTP_EXPIRY_SECONDS: &str = "otp-expiry-seconds";
pub const ARG_OTP_MAX_ATTEMPTS: &str = "otp-max-attempts";
pub const ARG_OTP_MAX_RESEND: &str = "otp-max-resend";
pub const ARG_OTP_BLOCK_SECONDS: &str = "otp-block-seconds";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub length: usize,
    pub expiry_seconds: u64,
    pub max_attempts: u32,
    pub max_resend: u32,
    pub block_seconds: u64,
}

impl Options {
    /// Parse OTP policy arguments from matches.
    ///
    /// # Errors
    /// Returns an error if an argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        fn read<T: Clone + Send + Sync + 'static>(
            matches: &ArgMatches,
            id: &str,
        ) -> anyhow::Result<T> {
            matches
                .get_one::<T>(id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        }

        Ok(Self {
            length: read(matches, ARG_OTP_LENGTH)?,
            expiry_seconds: read(matches, ARG_OTP_EXPIRY_SECONDS)?,
            max_attempts: read(matches, ARG_OTP_MAX_ATTEMPTS)?,
            max_resend: read(matches, ARG_OTP_MAX_RESEND)?,
            block_seconds: read(matches, ARG_OTP_BLOCK_SECONDS)?,
        })
    }

    #[must_use]
    pub fn config(&self) -> OtpConfig {
        OtpConfig::new()
            .with_otp_length(self.length)
            .with_otp_expiry_seconds(self.expiry_seconds)
            .with_max_attempts(self.max_attempts)
            .with_max_attempts_resend(self.max_resend)
            .with_block_duration_seconds(self.block_seconds)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_LENGTH)
                .long(ARG_OTP_LENGTH)
                .help("Number of digits in a code (4-10)")
                .env("OTPGATE_OTP_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_OTP_EXPIRY_SECONDS)
                .long(ARG_OTP_EXPIRY_SECONDS)
                .help("Code validity; also the resend cooldown")
                .env("OTPGATE_OTP_EXPIRY_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_ATTEMPTS)
                .long(ARG_OTP_MAX_ATTEMPTS)
                .help("Wrong codes allowed before the subject is blocked")
                .env("OTPGATE_OTP_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_RESEND)
                .long(ARG_OTP_MAX_RESEND)
                .help("Resend count at which the subject is blocked")
                .env("OTPGATE_OTP_MAX_RESEND")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_BLOCK_SECONDS)
                .long(ARG_OTP_BLOCK_SECONDS)
                .help("Block duration in seconds")
                .env("OTPGATE_OTP_BLOCK_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
