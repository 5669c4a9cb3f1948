//! `simplereload watch` command implementation.
//!
//! A terminal client of the heartbeat protocol: it keeps the heartbeat
//! stream open, reconnects with the same backoff as the browser script and
//! reports each time the server comes back after losing the connection.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use clap::Args;
use simplereload_server::HEARTBEAT_DATA;
use simplereload_server::reconnect::{OpenOutcome, Phase, ReconnectState, RetryPolicy};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the watch command.
#[derive(Args)]
pub(crate) struct WatchArgs {
    /// Heartbeat endpoint URL.
    #[arg(default_value = "http://127.0.0.1:7979/simplereload")]
    url: String,

    /// Exit after the first detected restart.
    #[arg(long)]
    once: bool,

    /// First reconnect delay in milliseconds.
    #[arg(long, default_value_t = 100)]
    retry_floor_ms: u64,

    /// Largest reconnect delay in milliseconds.
    #[arg(long, default_value_t = 1000)]
    retry_ceiling_ms: u64,
}

impl WatchArgs {
    /// Execute the watch command.
    ///
    /// Runs until interrupted, or until the first restart with `--once`.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry bounds are invalid.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let policy = self.retry_policy()?;
        let output = Output::new();
        let agent = ureq::Agent::new_with_defaults();
        let mut detector = RestartDetector::new(policy);

        output.info(&format!("Watching {}", self.url));

        loop {
            match open_stream(&agent, &self.url) {
                Ok(reader) => {
                    if detector.on_open() {
                        output.success("Server restarted");
                        if self.once {
                            return Ok(());
                        }
                    } else {
                        output.info("Connected");
                    }

                    let beats = count_heartbeats(reader);
                    tracing::debug!(beats, "Heartbeat stream ended");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Connection attempt failed");
                }
            }

            let (delay, was_open) = detector.on_error();
            if was_open {
                output.warning(&format!("Connection lost, retrying in {delay:?}"));
            }
            std::thread::sleep(delay);
            detector.on_retry();
        }
    }

    fn retry_policy(&self) -> Result<RetryPolicy, CliError> {
        if self.retry_floor_ms == 0 {
            return Err(CliError::Validation(
                "--retry-floor-ms must be greater than 0".to_owned(),
            ));
        }
        if self.retry_ceiling_ms < self.retry_floor_ms {
            return Err(CliError::Validation(
                "--retry-ceiling-ms cannot be lower than --retry-floor-ms".to_owned(),
            ));
        }
        Ok(RetryPolicy::new(
            Duration::from_millis(self.retry_floor_ms),
            Duration::from_millis(self.retry_ceiling_ms),
        ))
    }
}

/// Restart detection on top of [`ReconnectState`].
///
/// Unlike a page, which was served by the server it connects to, the watcher
/// may start before the server is up. Failures before the first connection
/// therefore never count as a restart.
struct RestartDetector {
    state: ReconnectState,
    connected_once: bool,
}

impl RestartDetector {
    fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ReconnectState::new(policy),
            connected_once: false,
        }
    }

    /// The stream opened. Returns `true` when it came back after a loss.
    fn on_open(&mut self) -> bool {
        let outcome = self.state.on_open();
        let restarted = self.connected_once && outcome == OpenOutcome::Reload;
        self.connected_once = true;
        restarted
    }

    /// Delay before the next attempt, and whether a stream was open.
    fn on_error(&mut self) -> (Duration, bool) {
        let was_open = self.state.phase() == Phase::Open;
        (self.state.on_error(), was_open)
    }

    fn on_retry(&mut self) {
        self.state.on_retry();
    }
}

/// Open the heartbeat stream.
fn open_stream(agent: &ureq::Agent, url: &str) -> Result<impl BufRead + use<>, ureq::Error> {
    let response = agent
        .get(url)
        .header("accept", "text/event-stream")
        .call()?;
    Ok(BufReader::new(response.into_body().into_reader()))
}

/// Read SSE lines until the stream ends or fails, counting heartbeats.
fn count_heartbeats(reader: impl BufRead) -> usize {
    reader
        .lines()
        .map_while(Result::ok)
        .filter(|line| is_heartbeat(line))
        .count()
}

fn is_heartbeat(line: &str) -> bool {
    line.strip_prefix("data:")
        .is_some_and(|data| data.trim_start() == HEARTBEAT_DATA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};

    #[test]
    fn test_is_heartbeat() {
        assert!(is_heartbeat("data: heartbeat"));
        assert!(is_heartbeat("data:heartbeat"));
        assert!(!is_heartbeat("data: reload"));
        assert!(!is_heartbeat(": comment"));
        assert!(!is_heartbeat(""));
    }

    #[test]
    fn test_count_heartbeats() {
        let stream = "data: heartbeat\n\ndata: heartbeat\n\n: keep-alive\n\ndata: heartbeat\n\n";
        assert_eq!(count_heartbeats(Cursor::new(stream)), 3);
    }

    /// Reader that yields some bytes and then fails, like a reset connection.
    struct Broken(Cursor<&'static [u8]>);

    impl Read for Broken {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_count_heartbeats_stops_on_error() {
        let reader = BufReader::new(Broken(Cursor::new(&b"data: heartbeat\n\n"[..])));
        assert_eq!(count_heartbeats(reader), 1);
    }

    fn fail_and_retry(detector: &mut RestartDetector) {
        detector.on_error();
        detector.on_retry();
    }

    #[test]
    fn test_server_coming_up_late_is_not_a_restart() {
        let mut detector = RestartDetector::new(RetryPolicy::default());
        for _ in 0..3 {
            fail_and_retry(&mut detector);
        }
        assert!(!detector.on_open());
    }

    #[test]
    fn test_restart_after_first_connection_is_reported_once() {
        let mut detector = RestartDetector::new(RetryPolicy::default());
        fail_and_retry(&mut detector);
        assert!(!detector.on_open());

        let (_, was_open) = detector.on_error();
        assert!(was_open);
        detector.on_retry();
        fail_and_retry(&mut detector);
        assert!(detector.on_open());

        assert!(!detector.on_open());
    }

    #[test]
    fn test_backoff_reported_after_failed_attempt() {
        let mut detector = RestartDetector::new(RetryPolicy::default());
        let (first, was_open) = detector.on_error();
        assert!(!was_open);
        detector.on_retry();
        let (second, _) = detector.on_error();
        assert_eq!((first, second), (Duration::from_millis(100), Duration::from_millis(200)));
    }

    fn args(floor: u64, ceiling: u64) -> WatchArgs {
        WatchArgs {
            url: "http://127.0.0.1:7979/simplereload".to_owned(),
            once: true,
            retry_floor_ms: floor,
            retry_ceiling_ms: ceiling,
        }
    }

    #[test]
    fn test_retry_policy_validation() {
        assert!(args(0, 100).retry_policy().is_err());
        assert!(args(500, 100).retry_policy().is_err());
        assert_eq!(
            args(100, 1000).retry_policy().unwrap(),
            RetryPolicy::default()
        );
    }
}
