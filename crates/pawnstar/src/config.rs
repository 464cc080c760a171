//! Assistant configuration from environment variables and command-line flags

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chess_core::{ReplayMode, UserColor};
use clap::Parser;
use tracing::info;

use crate::error::AssistantError;
use crate::poller::PollerSettings;

/// Bounds for a single engine call, in seconds.
pub const MIN_ANALYSIS_SECS: f64 = 0.1;
pub const MAX_ANALYSIS_SECS: f64 = 10.0;

/// Budget for suggestions triggered by the poller.
pub const AUTO_SUGGEST_SECS: f64 = 1.5;

/// Consecutive scrape failures before the poller slows down.
pub const BACKOFF_THRESHOLD: u32 = 5;

/// Longest interval any timer setting may take, in seconds.
pub const MAX_INTERVAL_SECS: f64 = 3600.0;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_INTERVAL: Duration = Duration::from_secs(3600);

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
const DEFAULT_START_URL: &str = "https://www.chess.com/play/computer";

/// Command-line flags. Each one overrides the environment variable of the
/// same meaning.
#[derive(Parser, Debug, Default)]
#[command(name = "pawnstar", version, about = "Best-move suggestions for a live chess game", long_about = None)]
pub struct Cli {
    /// Stockfish binary [env: STOCKFISH_PATH]
    #[arg(long, value_name = "PATH")]
    pub stockfish: Option<PathBuf>,

    /// WebDriver endpoint [env: WEBDRIVER_URL]
    #[arg(long, value_name = "URL")]
    pub webdriver: Option<String>,

    /// Page to open [env: START_URL]
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Run the browser without a window [env: HEADLESS]
    #[arg(long)]
    pub headless: bool,

    /// Poll interval in seconds [env: POLL_INTERVAL_SECS]
    #[arg(long, value_name = "SECS", value_parser = parse_secs)]
    pub interval: Option<f64>,

    /// Analysis time in seconds, clamped to 0.1-10 [env: ANALYSIS_TIME_SECS]
    #[arg(long, value_name = "SECS", value_parser = parse_secs)]
    pub time: Option<f64>,

    /// Start auto-update at launch [env: AUTO_UPDATE]
    #[arg(long)]
    pub auto: bool,

    /// Suggest automatically on your turn [env: AUTO_SUGGEST]
    #[arg(long)]
    pub suggest: bool,

    /// The color you play: white or black [env: USER_COLOR]
    #[arg(long, value_name = "COLOR")]
    pub color: Option<UserColor>,

    /// strict or lenient [env: REPLAY_MODE]
    #[arg(long, value_name = "MODE")]
    pub replay: Option<ReplayMode>,
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Path to Stockfish binary
    pub path: PathBuf,
    pub threads: u32,
    pub hash_mb: u32,
    pub skill_level: u32,
}

#[derive(Clone, Debug)]
pub struct DriverSettings {
    /// WebDriver endpoint (chromedriver)
    pub webdriver_url: String,
    /// Page opened after the browser session starts
    pub start_url: String,
    pub headless: bool,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub engine: EngineSettings,
    pub driver: DriverSettings,

    /// How often the poller scrapes the move list
    pub poll_interval: Duration,

    /// Minimum spacing between two accepted board updates
    pub min_update_interval: Duration,

    /// Upper bound for the backed-off poll interval
    pub max_backoff: Duration,

    /// Start the poller as soon as the page is open
    pub auto_update: bool,

    /// Ask the engine whenever it becomes the user's turn
    pub auto_suggest: bool,

    pub user_color: Option<UserColor>,

    /// Budget for user-requested analysis
    pub analysis_time: Duration,

    pub replay_mode: ReplayMode,
}

impl AssistantConfig {
    /// Parse the process arguments (exiting on `--help` or bad flags) and
    /// merge them over the environment.
    pub fn load() -> Result<Self, AssistantError> {
        Self::from_cli(Cli::parse(), |key| env::var(key).ok())
    }

    /// Build a configuration from a variable lookup and command-line flags
    /// (without the program name).
    pub fn from_vars(
        var: impl Fn(&str) -> Option<String>,
        args: &[String],
    ) -> Result<Self, AssistantError> {
        let argv = std::iter::once("pawnstar").chain(args.iter().map(String::as_str));
        let cli = Cli::try_parse_from(argv).map_err(|e| AssistantError::Config(e.to_string()))?;
        Self::from_cli(cli, var)
    }

    pub fn from_cli(
        cli: Cli,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AssistantError> {
        let secs = |key: &str, default: f64| -> f64 {
            var(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let count = |key: &str, default: u32| -> u32 {
            var(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str| var(key).map(|v| parse_bool(&v)).unwrap_or(false);
        let text = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let user_color = match cli.color {
            Some(color) => Some(color),
            None => text("USER_COLOR").map(|v| v.parse::<UserColor>()).transpose()?,
        };
        let replay_mode = match cli.replay {
            Some(mode) => mode,
            None => text("REPLAY_MODE")
                .map(|v| v.parse::<ReplayMode>())
                .transpose()?
                .unwrap_or_default(),
        };

        let path = match cli.stockfish.or_else(|| text("STOCKFISH_PATH").map(PathBuf::from)) {
            Some(path) => path,
            None => find_stockfish().ok_or_else(|| {
                AssistantError::Config(
                    "Stockfish not found. Please install Stockfish or set STOCKFISH_PATH.".into(),
                )
            })?,
        };
        info!(path = %path.display(), "Using Stockfish");

        let mut config = Self {
            engine: EngineSettings {
                path,
                threads: count("ENGINE_THREADS", 1),
                hash_mb: count("ENGINE_HASH_MB", 64),
                skill_level: count("ENGINE_SKILL", 20),
            },
            driver: DriverSettings {
                webdriver_url: cli
                    .webdriver
                    .or_else(|| text("WEBDRIVER_URL"))
                    .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
                start_url: cli
                    .url
                    .or_else(|| text("START_URL"))
                    .unwrap_or_else(|| DEFAULT_START_URL.to_string()),
                headless: cli.headless || flag("HEADLESS"),
            },
            poll_interval: interval_from_secs(
                cli.interval
                    .unwrap_or_else(|| secs("POLL_INTERVAL_SECS", 2.0)),
            ),
            min_update_interval: interval_from_secs(secs("MIN_UPDATE_INTERVAL_SECS", 1.0)),
            max_backoff: interval_from_secs(secs("MAX_BACKOFF_SECS", 10.0)),
            auto_update: cli.auto || flag("AUTO_UPDATE"),
            auto_suggest: cli.suggest || flag("AUTO_SUGGEST"),
            user_color,
            analysis_time: clamp_analysis_time(
                cli.time
                    .unwrap_or_else(|| secs("ANALYSIS_TIME_SECS", 1.0)),
            ),
            replay_mode,
        };
        config.normalize();

        Ok(config)
    }

    /// Keep the intervals consistent with each other.
    fn normalize(&mut self) {
        self.poll_interval = self.poll_interval.clamp(MIN_POLL_INTERVAL, MAX_INTERVAL);
        self.min_update_interval = self.min_update_interval.min(self.poll_interval);
        if self.max_backoff <= self.poll_interval {
            self.max_backoff = self.poll_interval.saturating_mul(3);
        }
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
        self.normalize();
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            poll_interval: self.poll_interval,
            min_update_interval: self.min_update_interval,
            max_backoff: self.max_backoff,
            backoff_threshold: BACKOFF_THRESHOLD,
            auto_suggest: self.auto_suggest,
            user_color: self.user_color,
            suggest_budget: clamp_analysis_time(AUTO_SUGGEST_SECS),
            replay_mode: self.replay_mode,
        }
    }
}

fn parse_secs(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| format!("'{raw}' is not a positive number of seconds"))
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Timer setting from seconds, capped at [`MAX_INTERVAL_SECS`]. Zero,
/// negative and NaN inputs become zero.
pub fn interval_from_secs(secs: f64) -> Duration {
    if !(secs > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs.min(MAX_INTERVAL_SECS)).unwrap_or(Duration::ZERO)
}

/// Clamp an analysis budget to `[MIN_ANALYSIS_SECS, MAX_ANALYSIS_SECS]`.
pub fn clamp_analysis_time(secs: f64) -> Duration {
    let secs = if secs.is_nan() { MIN_ANALYSIS_SECS } else { secs };
    Duration::from_secs_f64(secs.clamp(MIN_ANALYSIS_SECS, MAX_ANALYSIS_SECS))
}

/// Look for a Stockfish executable on `PATH` and in common install locations.
pub fn find_stockfish() -> Option<PathBuf> {
    let on_path = env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(executable_name("stockfish")))
            .find(|candidate| is_executable(candidate))
    });
    if on_path.is_some() {
        return on_path;
    }

    [
        "./stockfish/stockfish",
        "/usr/local/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/bin/stockfish",
        "/snap/bin/stockfish",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|candidate| is_executable(candidate))
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)], args: &[&str]) -> Result<AssistantConfig, AssistantError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        AssistantConfig::from_vars(|key| vars.get(key).cloned(), &args)
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("STOCKFISH_PATH", "/bin/sf")], &[]).unwrap();
        assert_eq!(config.engine.path, PathBuf::from("/bin/sf"));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.min_update_interval, Duration::from_secs(1));
        assert_eq!(config.max_backoff, Duration::from_secs(10));
        assert_eq!(config.analysis_time, Duration::from_secs(1));
        assert_eq!(config.engine.hash_mb, 64);
        assert_eq!(config.replay_mode, ReplayMode::Strict);
        assert_eq!(config.user_color, None);
        assert!(!config.auto_suggest);
        assert_eq!(config.driver.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn test_flags_override_environment() {
        let config = load(
            &[
                ("STOCKFISH_PATH", "/bin/sf"),
                ("USER_COLOR", "white"),
                ("POLL_INTERVAL_SECS", "3"),
                ("WEBDRIVER_URL", "http://driver:4444"),
            ],
            &[
                "--color", "black", "--interval", "0.5", "--suggest", "--replay", "lenient",
                "--stockfish", "/opt/sf",
            ],
        )
        .unwrap();
        assert_eq!(config.user_color, Some(UserColor::Black));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.auto_suggest);
        assert_eq!(config.replay_mode, ReplayMode::Lenient);
        assert_eq!(config.engine.path, PathBuf::from("/opt/sf"));
        assert_eq!(config.driver.webdriver_url, "http://driver:4444");
    }

    #[test]
    fn test_environment_flags() {
        let config = load(
            &[
                ("STOCKFISH_PATH", "/bin/sf"),
                ("AUTO_UPDATE", "yes"),
                ("HEADLESS", "1"),
                ("REPLAY_MODE", "lenient"),
            ],
            &[],
        )
        .unwrap();
        assert!(config.auto_update);
        assert!(config.driver.headless);
        assert_eq!(config.replay_mode, ReplayMode::Lenient);
    }

    #[test]
    fn test_min_update_never_exceeds_poll_interval() {
        let config = load(
            &[("STOCKFISH_PATH", "/bin/sf"), ("MIN_UPDATE_INTERVAL_SECS", "5")],
            &["--interval", "2"],
        )
        .unwrap();
        assert_eq!(config.min_update_interval, config.poll_interval);
    }

    #[test]
    fn test_backoff_cap_stays_above_poll_interval() {
        let config = load(&[("STOCKFISH_PATH", "/bin/sf")], &["--interval", "12"]).unwrap();
        assert!(config.max_backoff > config.poll_interval);
    }

    #[test]
    fn test_huge_intervals_are_capped() {
        let config = load(
            &[("STOCKFISH_PATH", "/bin/sf"), ("POLL_INTERVAL_SECS", "1e20")],
            &[],
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(3600));
        assert!(config.max_backoff > config.poll_interval);

        let mut config = load(&[("STOCKFISH_PATH", "/bin/sf")], &["--interval", "1e300"]).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(3600));

        config.set_poll_interval(Duration::from_secs_f64(1e19));
        assert_eq!(config.poll_interval, Duration::from_secs(3600));
        assert_eq!(config.max_backoff, Duration::from_secs(3 * 3600));

        config.set_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_interval_from_secs() {
        assert_eq!(interval_from_secs(2.5), Duration::from_millis(2500));
        assert_eq!(interval_from_secs(1e20), Duration::from_secs(3600));
        assert_eq!(interval_from_secs(f64::INFINITY), Duration::from_secs(3600));
        assert_eq!(interval_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(interval_from_secs(-4.0), Duration::ZERO);
    }

    #[test]
    fn test_analysis_time_is_clamped() {
        assert_eq!(clamp_analysis_time(0.01), Duration::from_millis(100));
        assert_eq!(clamp_analysis_time(60.0), Duration::from_secs(10));
        assert_eq!(clamp_analysis_time(1.5), Duration::from_millis(1500));

        let config = load(&[("STOCKFISH_PATH", "/bin/sf")], &["--time", "30"]).unwrap();
        assert_eq!(config.analysis_time, Duration::from_secs(10));
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        let env = [("STOCKFISH_PATH", "/bin/sf")];
        assert!(load(&env, &["--color", "green"]).is_err());
        assert!(load(&env, &["--interval", "0"]).is_err());
        assert!(load(&env, &["--interval", "soon"]).is_err());
        assert!(load(&env, &["--interval"]).is_err());
        assert!(load(&env, &["--bogus"]).is_err());
        assert!(load(&[("STOCKFISH_PATH", "/bin/sf"), ("USER_COLOR", "red")], &[]).is_err());
    }
}
