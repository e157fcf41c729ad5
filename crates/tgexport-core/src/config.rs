use std::{
    collections::BTreeSet,
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use chrono::NaiveDate;

use crate::{
    domain::{ChannelRef, Credentials},
    errors::Error,
    naming, Result,
};

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".zip", ".tar", ".gz", ".7z", ".rar", ".xls", ".xlsx", ".csv", ".txt", ".doc", ".docx",
];
pub const DEFAULT_SIZE_LIMIT_MB: u64 = 3 * 1024;
pub const DEFAULT_MAX_MESSAGES: usize = 100;
pub const DEFAULT_SESSION_FILE: &str = "tgexport.session";
pub const DEFAULT_DELAY_MIN: Duration = Duration::from_secs(1);
pub const DEFAULT_DELAY_MAX: Duration = Duration::from_secs(3);

pub const API_ID_ENV: &str = "TELEGRAM_API_ID";
pub const API_HASH_ENV: &str = "TELEGRAM_API_HASH";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    List,
    Download,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "list" => Ok(Mode::List),
            "download" => Ok(Mode::Download),
            other => Err(Error::Config(format!(
                "unknown mode {other:?} (expected list or download)"
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::List => "list",
            Mode::Download => "download",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(Error::Config(format!(
                "unknown output format {other:?} (expected json or csv)"
            ))),
        }
    }
}

/// Bounds of the random pause inserted between messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_DELAY_MIN,
            max_delay: DEFAULT_DELAY_MAX,
        }
    }
}

/// Everything one export run needs. Built once, then passed by reference.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub credentials: Credentials,
    pub channel: ChannelRef,
    pub mode: Mode,
    pub max_messages: usize,
    pub size_limit_mb: u64,
    /// Lowercase, dot-prefixed.
    pub allowed_extensions: BTreeSet<String>,
    /// `None` when output is disabled.
    pub output: Option<OutputTarget>,
    pub download_dir: PathBuf,
    pub session_file: PathBuf,
    pub pacing: PacingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub format: OutputFormat,
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(Error::Config(
                "maximum message count must be greater than 0".to_string(),
            ));
        }
        if self.size_limit_mb == 0 {
            return Err(Error::Config(
                "size limit must be greater than 0 MB".to_string(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(Error::Config(
                "at least one allowed extension is required".to_string(),
            ));
        }
        if self.pacing.min_delay > self.pacing.max_delay {
            return Err(Error::Config(format!(
                "minimum delay ({:?}) exceeds maximum delay ({:?})",
                self.pacing.min_delay, self.pacing.max_delay
            )));
        }
        if self.credentials.api_hash.trim().is_empty() {
            return Err(Error::Config("api hash must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Raw, optional inputs as collected from the command line.
///
/// `resolve` applies defaults and environment fallbacks and produces a
/// validated [`ExportConfig`].
#[derive(Clone, Debug, Default)]
pub struct ConfigInputs {
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub channel: Option<String>,
    pub mode: Mode,
    pub max_messages: Option<usize>,
    pub size_limit_mb: Option<u64>,
    pub extensions: Option<Vec<String>>,
    pub output: bool,
    pub output_file: Option<PathBuf>,
    pub format: OutputFormat,
    pub download_dir: Option<PathBuf>,
    pub session_file: Option<PathBuf>,
    pub delay_min: Option<Duration>,
    pub delay_max: Option<Duration>,
}

impl ConfigInputs {
    /// Build the run configuration. `run_date` names the default output file.
    pub fn resolve(self, run_date: NaiveDate) -> Result<ExportConfig> {
        load_dotenv_if_present(Path::new(".env"));

        let api_id = self
            .api_id
            .and_then(non_empty)
            .or_else(|| env_str(API_ID_ENV).and_then(non_empty))
            .ok_or_else(|| {
                Error::Config(format!("--api-id (or {API_ID_ENV}) is required"))
            })?;
        let api_id = api_id
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::Config(format!("api id must be an integer, got {api_id:?}")))?;
        let api_hash = self
            .api_hash
            .and_then(non_empty)
            .or_else(|| env_str(API_HASH_ENV).and_then(non_empty))
            .ok_or_else(|| {
                Error::Config(format!("--api-hash (or {API_HASH_ENV}) is required"))
            })?;

        let channel_raw = self
            .channel
            .and_then(non_empty)
            .ok_or_else(|| Error::Config("-c/--channel is required".to_string()))?;
        let channel = channel_raw.parse::<ChannelRef>()?;

        let allowed_extensions = match self.extensions {
            Some(list) => parse_extensions(&list),
            None => DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let output = self.output.then(|| OutputTarget {
            path: self.output_file.unwrap_or_else(|| {
                PathBuf::from(naming::default_output_filename(
                    run_date,
                    channel_raw.trim(),
                    self.format.extension(),
                ))
            }),
            format: self.format,
        });

        let download_dir = match self.download_dir {
            Some(dir) => dir,
            None => env::current_dir()?,
        };

        let defaults = PacingConfig::default();
        let cfg = ExportConfig {
            credentials: Credentials { api_id, api_hash },
            channel,
            mode: self.mode,
            max_messages: self.max_messages.unwrap_or(DEFAULT_MAX_MESSAGES),
            size_limit_mb: self.size_limit_mb.unwrap_or(DEFAULT_SIZE_LIMIT_MB),
            allowed_extensions,
            output,
            download_dir,
            session_file: self
                .session_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE)),
            pacing: PacingConfig {
                min_delay: self.delay_min.unwrap_or(defaults.min_delay),
                max_delay: self.delay_max.unwrap_or(defaults.max_delay),
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Accepts `zip`, `.ZIP`, and space/comma separated lists inside one argument.
pub fn parse_extensions(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .flat_map(|v| v.split([',', ' ']))
        .filter_map(naming::normalize_extension)
        .collect()
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
