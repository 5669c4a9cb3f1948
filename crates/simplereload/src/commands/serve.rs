//! `simplereload serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use simplereload_config::{CliSettings, Config};
use simplereload_server::{run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover simplereload.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output (request and session logs).
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            live_reload_enabled: self.resolve_live_reload_enabled(),
            host: self.host,
            port: self.port,
            root: self.root,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.field(
            "Listening",
            format!("http://{}:{}", config.server.host, config.server.port),
        );
        output.field("Root", config.serve_resolved.root.display());
        if let Some(path) = &config.config_path {
            output.field("Config", path.display());
        }
        if config.live_reload.enabled {
            output.field(
                "Live reload",
                format!("enabled at {}", config.live_reload.route),
            );
        } else {
            output.field("Live reload", "disabled");
        }

        run_server(server_config_from_config(&config)).await?;

        Ok(())
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        let argv = std::iter::once("serve").chain(args.iter().copied());
        TestCli::parse_from(argv).serve
    }

    #[test]
    fn test_live_reload_flag_unset() {
        assert_eq!(parse(&[]).resolve_live_reload_enabled(), None);
    }

    #[test]
    fn test_no_live_reload_flag() {
        assert_eq!(
            parse(&["--no-live-reload"]).resolve_live_reload_enabled(),
            Some(false)
        );
    }

    #[test]
    fn test_explicit_live_reload_value() {
        assert_eq!(
            parse(&["--live-reload", "true"]).resolve_live_reload_enabled(),
            Some(true)
        );
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        let result =
            TestCli::try_parse_from(["serve", "--live-reload", "true", "--no-live-reload"]);
        assert!(result.is_err());
    }
}
