use clap::{Arg, ArgMatches, Command};

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub identity_url: String,
    pub frontend_base_url: String,
}

impl Options {
    /// Parse identity provider and front-end arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            identity_url: read_required(ARG_IDENTITY_URL)?,
            frontend_base_url: read_required(ARG_FRONTEND_BASE_URL)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Identity provider base URL used to resolve bearer tokens")
                .env("OTPGATE_IDENTITY_URL"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL allowed by CORS")
                .env("OTPGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
}
