// # beacond - visit beacon runner
//
// This binary is a THIN integration layer over beacon-core. All tracking
// decisions live in the library; this file only:
// 1. Reads configuration from environment variables
// 2. Initializes tracing and the runtime
// 3. Resolves the project bound to the access token
// 4. Feeds requests to the tracker, or prints the loader markup
//
// ## Commands
//
// - `beacond replay` (default): read one JSON `InboundRequest` per line from
//   stdin and run each through the tracker. Lines that are not UTF-8 or not a
//   request are skipped. Waits for in-flight beacons at EOF, bounded by
//   `BEACON_DRAIN_TIMEOUT_SECS`.
// - `beacond loader`: print the `<head>` loader markup, if analytics are on
// - `beacond project`: print the project bound to the access token as JSON
//
// ## Configuration
//
// - `BEACON_ACCESS_TOKEN`: Collector API key (tracking is off without it)
// - `BEACON_ANALYTICS_ENABLED`: `1`/`true` or `0`/`false` (default: true)
// - `BEACON_API_BASE_URL`: Collector host (default: https://api.smalk.ai)
// - `BEACON_MODE`: `dry-run` logs beacons instead of sending them
// - `BEACON_REQUEST_TIMEOUT_MS`: Outbound request timeout (default: 500)
// - `BEACON_CONNECT_TIMEOUT_MS`: Outbound connect timeout (default: 300)
// - `BEACON_DISPATCH_TIMEOUT_MS`: Detached send budget (default: 1000)
// - `BEACON_DRAIN_TIMEOUT_SECS`: Wait for in-flight beacons at EOF (default: 5)
// - `BEACON_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export BEACON_ACCESS_TOKEN=your_token
// echo '{"path":"/hello-world","method":"GET","headers":{"HTTP_USER_AGENT":"GPTBot/1.0"}}' \
//   | beacond replay
// ```

use anyhow::Result;
use beacon_collector_http::{HttpCollectorFactory, HttpProjectDirectory};
use beacon_core::config::mask_token;
use beacon_core::{
    BeaconConfig, BeaconSinkFactory, DispatchEvent, Error, InboundRequest, Project,
    ProjectDirectory, Tracker, TrackingSettings,
};
use clap::{Parser, Subcommand};
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::SplitStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum BeaconExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<BeaconExitCode> for ExitCode {
    fn from(code: BeaconExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "beacond")]
#[command(about = "Server-side visit beacon runner", version)]
struct Args {
    /// What to run; defaults to `replay`
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Track one JSON request per stdin line
    Replay,
    /// Print the loader markup for the page head
    Loader,
    /// Print the project bound to the access token as JSON
    Project,
}

/// Application configuration
struct Config {
    access_token: String,
    analytics_enabled: bool,
    api_base_url: Option<String>,
    dry_run: bool,
    request_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    dispatch_timeout_ms: Option<u64>,
    drain_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            access_token: env::var("BEACON_ACCESS_TOKEN").unwrap_or_default(),
            analytics_enabled: match env::var("BEACON_ANALYTICS_ENABLED") {
                Ok(value) => parse_flag("BEACON_ANALYTICS_ENABLED", &value)?,
                Err(_) => true,
            },
            api_base_url: env::var("BEACON_API_BASE_URL").ok(),
            dry_run: env::var("BEACON_MODE")
                .unwrap_or_default()
                .eq_ignore_ascii_case("dry-run"),
            request_timeout_ms: parse_number("BEACON_REQUEST_TIMEOUT_MS")?,
            connect_timeout_ms: parse_number("BEACON_CONNECT_TIMEOUT_MS")?,
            dispatch_timeout_ms: parse_number("BEACON_DISPATCH_TIMEOUT_MS")?,
            drain_timeout_secs: parse_number("BEACON_DRAIN_TIMEOUT_SECS")?.unwrap_or(5),
            log_level: env::var("BEACON_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.access_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "BEACON_ACCESS_TOKEN appears to be a placeholder. \
                Use the API key from your collector project settings."
            );
        }

        if let Some(timeout) = self.request_timeout_ms
            && !(50..=10_000).contains(&timeout)
        {
            anyhow::bail!(
                "BEACON_REQUEST_TIMEOUT_MS must be between 50 and 10000. Got: {}",
                timeout
            );
        }

        if let Some(timeout) = self.dispatch_timeout_ms
            && !(50..=30_000).contains(&timeout)
        {
            anyhow::bail!(
                "BEACON_DISPATCH_TIMEOUT_MS must be between 50 and 30000. Got: {}",
                timeout
            );
        }

        if self.drain_timeout_secs > 300 {
            anyhow::bail!(
                "BEACON_DRAIN_TIMEOUT_SECS must be at most 300. Got: {}",
                self.drain_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "BEACON_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.beacon_config().validate()?;

        Ok(())
    }

    /// Library configuration; `analytics_allowed` is resolved later
    fn beacon_config(&self) -> BeaconConfig {
        let mut config = BeaconConfig::new();

        config.settings = TrackingSettings::new(self.access_token.clone())
            .with_enabled(self.analytics_enabled)
            .with_allowed(false);

        if let Some(ref url) = self.api_base_url {
            config.collector.api_base_url = url.clone();
        }
        if let Some(ms) = self.request_timeout_ms {
            config.collector.request_timeout_ms = ms;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.collector.connect_timeout_ms = ms;
        }
        if let Some(ms) = self.dispatch_timeout_ms {
            config.dispatcher.dispatch_timeout_ms = ms;
        }
        config.collector.dry_run = self.dry_run;

        config
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{} must be a boolean (1/0, true/false). Got: {}", name, other),
    }
}

fn parse_number(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", name, value)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Replay);

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return BeaconExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return BeaconExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries command output.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return BeaconExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BeaconExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run(command, config).await {
            error!("beacond error: {}", e);
            BeaconExitCode::RuntimeError
        } else {
            BeaconExitCode::CleanShutdown
        }
    });

    result.into()
}

async fn run(command: Command, config: Config) -> Result<()> {
    let mut beacon_config = config.beacon_config();

    if beacon_config.settings.has_access_token() {
        info!(
            "Using access token {}",
            mask_token(&beacon_config.settings.access_token)
        );
    } else {
        warn!("BEACON_ACCESS_TOKEN is not set; no beacons will be sent");
    }

    let project = resolve_project(&beacon_config).await;
    beacon_config.settings.analytics_allowed = project.allowed;

    match command {
        Command::Project => {
            let project = project
                .project
                .ok_or_else(|| anyhow::anyhow!("No project is available for this access token"))?;
            println!("{}", serde_json::to_string_pretty(&project)?);
            Ok(())
        }
        Command::Loader => {
            let (tracker, _events) = build_tracker(&beacon_config)?;
            let project_id = project.project.map(|p| p.id).unwrap_or_default();
            match tracker.loader_markup(&beacon_config.settings, &project_id) {
                Some(markup) => print!("{}", markup),
                None => info!("Analytics are off for this site; no loader markup emitted"),
            }
            Ok(())
        }
        Command::Replay => replay(&beacon_config, Duration::from_secs(config.drain_timeout_secs)).await,
    }
}

/// Outcome of the account lookup
struct ProjectResolution {
    project: Option<Project>,
    allowed: bool,
}

/// Resolve the project bound to the access token
///
/// A rejected token or a token without a project disallows analytics. A
/// transient failure keeps analytics allowed but leaves the project unknown.
async fn resolve_project(config: &BeaconConfig) -> ProjectResolution {
    if !config.settings.has_access_token() {
        return ProjectResolution {
            project: None,
            allowed: false,
        };
    }

    let directory = match HttpProjectDirectory::new(&config.collector) {
        Ok(directory) => directory,
        Err(e) => {
            warn!("Project lookup unavailable: {}", e);
            return ProjectResolution {
                project: None,
                allowed: false,
            };
        }
    };

    match directory.current_project(&config.settings.access_token).await {
        Ok(project) => {
            info!("Tracking for project '{}' ({})", project.name, project.id);
            ProjectResolution {
                project: Some(project),
                allowed: true,
            }
        }
        Err(e @ (Error::Authentication(_) | Error::NotFound(_))) => {
            warn!("Analytics disallowed for this access token: {}", e);
            ProjectResolution {
                project: None,
                allowed: false,
            }
        }
        Err(e) => {
            warn!("Project lookup failed, continuing without project: {}", e);
            ProjectResolution {
                project: None,
                allowed: true,
            }
        }
    }
}

fn build_tracker(config: &BeaconConfig) -> Result<(Tracker, mpsc::Receiver<DispatchEvent>)> {
    let sink = HttpCollectorFactory.create(&config.collector)?;
    Ok(Tracker::new(sink, config)?)
}

/// Replay JSON-lines requests from stdin through the tracker
async fn replay(config: &BeaconConfig, drain_timeout: Duration) -> Result<()> {
    let stats = replay_from(BufReader::new(tokio::io::stdin()), config, drain_timeout).await?;
    info!(
        "Replay finished: {} malformed, {} skipped, {} dispatched, {} delivered, {} failed, {} timed out",
        stats.malformed,
        stats.skipped,
        stats.dispatched,
        stats.delivered,
        stats.failed,
        stats.timed_out
    );
    Ok(())
}

/// Track every request line of `reader`, then drain in-flight beacons
///
/// Lines are split on raw bytes so that one undecodable line is skipped
/// instead of ending the replay.
async fn replay_from<R>(reader: R, config: &BeaconConfig, drain_timeout: Duration) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let (tracker, mut events) = build_tracker(config)?;

    let monitor = tokio::spawn(async move {
        let mut stats = ReplayStats::default();
        while let Some(event) = events.recv().await {
            debug!(?event, "dispatch event");
            stats.record(&event);
        }
        stats
    });

    let mut lines = SplitStream::new(reader.split(b'\n'));
    let mut in_flight = Vec::new();
    let mut line_no = 0usize;
    let mut malformed = 0usize;

    while let Some(line) = lines.next().await {
        let line = line?;
        line_no += 1;

        let line = match String::from_utf8(line) {
            Ok(line) => line,
            Err(e) => {
                warn!("Skipping line {}: not valid UTF-8: {}", line_no, e);
                malformed += 1;
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: InboundRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Skipping line {}: not a request: {}", line_no, e);
                malformed += 1;
                continue;
            }
        };

        if let Some(handle) = tracker.track(&config.settings, &request) {
            in_flight.push(handle);
        }
    }

    info!("Read {} line(s), waiting for {} beacon(s)", line_no, in_flight.len());

    let drain = async {
        for handle in in_flight {
            // A panicked send task is as good as a dropped beacon.
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(drain_timeout, drain).await.is_err() {
        warn!("Drain timeout after {:?}; abandoning in-flight beacons", drain_timeout);
    }

    drop(tracker);
    let mut stats = monitor.await?;
    stats.malformed = malformed;

    Ok(stats)
}

/// Counters of a replay run
#[derive(Debug, Default)]
struct ReplayStats {
    malformed: usize,
    skipped: usize,
    dispatched: usize,
    delivered: usize,
    failed: usize,
    timed_out: usize,
}

impl ReplayStats {
    fn record(&mut self, event: &DispatchEvent) {
        match event {
            DispatchEvent::Skipped { .. } => self.skipped += 1,
            DispatchEvent::Dispatched { .. } => self.dispatched += 1,
            DispatchEvent::Delivered { .. } => self.delivered += 1,
            DispatchEvent::Failed { .. } => self.failed += 1,
            DispatchEvent::TimedOut { .. } => self.timed_out += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            access_token: "tok_123456".to_string(),
            analytics_enabled: true,
            api_base_url: None,
            dry_run: false,
            request_timeout_ms: None,
            connect_timeout_ms: None,
            dispatch_timeout_ms: None,
            drain_timeout_secs: 5,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn command_defaults_to_replay() {
        let args = Args::try_parse_from(["beacond"]).unwrap();
        assert_eq!(args.command.unwrap_or(Command::Replay), Command::Replay);

        let args = Args::try_parse_from(["beacond", "loader"]).unwrap();
        assert_eq!(args.command, Some(Command::Loader));
    }

    #[test]
    fn unknown_command_and_extra_arguments_are_rejected() {
        assert!(Args::try_parse_from(["beacond", "serve"]).is_err());
        assert!(Args::try_parse_from(["beacond", "replay", "extra"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn parse_flag_accepts_common_spellings() {
        assert!(parse_flag("X", "1").unwrap());
        assert!(parse_flag("X", "TRUE").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(parse_flag("X", "maybe").is_err());
    }

    #[test]
    fn placeholder_token_is_rejected() {
        let mut cfg = config();
        cfg.access_token = "YOUR_TOKEN".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_timeouts_are_rejected() {
        let mut cfg = config();
        cfg.request_timeout_ms = Some(10);
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.dispatch_timeout_ms = Some(60_000);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn beacon_config_starts_disallowed() {
        let beacon_config = config().beacon_config();
        assert!(beacon_config.settings.analytics_enabled);
        assert!(!beacon_config.settings.analytics_allowed);
        assert_eq!(beacon_config.collector.api_base_url, "https://api.smalk.ai");
    }

    #[test]
    fn beacon_config_applies_overrides() {
        let mut cfg = config();
        cfg.api_base_url = Some("https://api.smalk.me".to_string());
        cfg.dry_run = true;
        cfg.dispatch_timeout_ms = Some(250);

        let beacon_config = cfg.beacon_config();
        assert_eq!(beacon_config.collector.api_base_url, "https://api.smalk.me");
        assert!(beacon_config.collector.dry_run);
        assert_eq!(beacon_config.dispatcher.dispatch_timeout_ms, 250);
    }

    #[test]
    fn replay_stats_count_events() {
        let mut stats = ReplayStats::default();
        stats.record(&DispatchEvent::Delivered {
            unique_id: "a".to_string(),
        });
        stats.record(&DispatchEvent::TimedOut {
            unique_id: "b".to_string(),
        });
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn resolve_project_without_token_disallows() {
        let mut beacon_config = config().beacon_config();
        beacon_config.settings.access_token.clear();

        let resolution = resolve_project(&beacon_config).await;
        assert!(!resolution.allowed);
        assert!(resolution.project.is_none());
    }

    #[tokio::test]
    async fn replay_skips_undecodable_line_and_continues() {
        let mut cfg = config();
        cfg.dry_run = true;
        let mut beacon_config = cfg.beacon_config();
        beacon_config.settings.analytics_allowed = true;

        let mut input = Vec::new();
        input.extend_from_slice(b"{\"path\":\"/a\",\"method\":\"GET\"}\n");
        input.extend_from_slice(b"{\"path\":\"/b\",\"method\":\"GET\",\"headers\":{\"HTTP_USER_AGENT\":\"\xff\"}}\n");
        input.extend_from_slice(b"not json\n");
        input.extend_from_slice(b"{\"path\":\"/c\",\"method\":\"GET\"}\n");

        let stats = replay_from(input.as_slice(), &beacon_config, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failed, 0);
    }
}
