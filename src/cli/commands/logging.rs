use crate::cli::telemetry::LogFormat;
use clap::{Arg, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("OTPGATE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Log output format")
                .env("OTPGATE_LOG_FORMAT")
                .global(true)
                .default_value("pretty")
                .value_parser(LogFormat::NAMES),
        )
}

/// Selected log format, `pretty` when absent.
#[must_use]
pub fn log_format(matches: &clap::ArgMatches) -> LogFormat {
    matches
        .get_one::<String>(ARG_LOG_FORMAT)
        .and_then(|name| LogFormat::from_name(name))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_counts_flags() {
        temp_env::with_var("OTPGATE_LOG_LEVEL", None::<&str>, || {
            let command = with_args(Command::new("otpgate"));
            let matches = command.get_matches_from(vec!["otpgate", "-vvv"]);
            assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
        });
    }

    #[test]
    fn log_format_from_flag_and_env() {
        temp_env::with_var("OTPGATE_LOG_FORMAT", None::<&str>, || {
            let matches = with_args(Command::new("otpgate")).get_matches_from(vec!["otpgate"]);
            assert_eq!(log_format(&matches), LogFormat::Pretty);

            let matches = with_args(Command::new("otpgate"))
                .get_matches_from(vec!["otpgate", "--log-format", "json"]);
            assert_eq!(log_format(&matches), LogFormat::Json);
        });
        temp_env::with_var("OTPGATE_LOG_FORMAT", Some("json"), || {
            let matches = with_args(Command::new("otpgate")).get_matches_from(vec!["otpgate"]);
            assert_eq!(log_format(&matches), LogFormat::Json);
        });
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        temp_env::with_var("OTPGATE_LOG_FORMAT", None::<&str>, || {
            let result = with_args(Command::new("otpgate"))
                .try_get_matches_from(vec!["otpgate", "--log-format", "xml"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn verbosity_defaults_to_zero() {
        temp_env::with_var("OTPGATE_LOG_LEVEL", None::<&str>, || {
            let command = with_args(Command::new("otpgate"));
            let matches = command.get_matches_from(vec!["otpgate"]);
            assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(0));
        });
    }
}
