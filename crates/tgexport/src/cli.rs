use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Parser, ValueEnum};

use tgexport_core::{
    config::{ConfigInputs, Mode, OutputFormat},
    Error,
};

#[derive(Parser, Debug)]
#[command(name = "tgexport")]
#[command(about = "Export (or download) document files posted in a Telegram channel.")]
pub(crate) struct Cli {
    /// Telegram API ID (falls back to TELEGRAM_API_ID)
    #[arg(long)]
    pub(crate) api_id: Option<String>,

    /// Telegram API hash (falls back to TELEGRAM_API_HASH)
    #[arg(long)]
    pub(crate) api_hash: Option<String>,

    /// Channel username, t.me link or numeric ID
    #[arg(short, long)]
    pub(crate) channel: Option<String>,

    /// Write the output file (default: true)
    #[arg(
        short,
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub(crate) output: bool,

    /// Output file path (default: <YYYYMMDD>-<channel>.<format>)
    #[arg(long)]
    pub(crate) output_file: Option<PathBuf>,

    /// Output file format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Json)]
    pub(crate) format: FormatArg,

    /// Max number of channel messages to process
    #[arg(short, long, default_value_t = tgexport_core::config::DEFAULT_MAX_MESSAGES)]
    pub(crate) max: usize,

    /// List matching files, or also download them
    #[arg(long, value_enum, default_value_t = ModeArg::List)]
    pub(crate) mode: ModeArg,

    /// Directory to download files to (default: current dir)
    #[arg(long)]
    pub(crate) download_dir: Option<PathBuf>,

    /// Size limit in MB
    #[arg(long, default_value_t = tgexport_core::config::DEFAULT_SIZE_LIMIT_MB)]
    pub(crate) size_limit: u64,

    /// Allowed file extensions (e.g. --extensions .zip .rar pdf)
    #[arg(long, num_args = 1..)]
    pub(crate) extensions: Option<Vec<String>>,

    /// Telegram session file
    #[arg(long)]
    pub(crate) session_file: Option<PathBuf>,

    /// Minimum pause between messages, in seconds
    #[arg(long, default_value_t = 1.0)]
    pub(crate) delay_min: f64,

    /// Maximum pause between messages, in seconds
    #[arg(long, default_value_t = 3.0)]
    pub(crate) delay_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ModeArg {
    List,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FormatArg {
    Json,
    Csv,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::List => Mode::List,
            ModeArg::Download => Mode::Download,
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

impl Cli {
    pub(crate) fn into_inputs(self) -> tgexport_core::Result<ConfigInputs> {
        Ok(ConfigInputs {
            api_id: self.api_id,
            api_hash: self.api_hash,
            channel: self.channel,
            mode: self.mode.into(),
            max_messages: Some(self.max),
            size_limit_mb: Some(self.size_limit),
            extensions: self.extensions,
            output: self.output,
            output_file: self.output_file,
            format: self.format.into(),
            download_dir: self.download_dir,
            session_file: self.session_file,
            delay_min: Some(seconds("--delay-min", self.delay_min)?),
            delay_max: Some(seconds("--delay-max", self.delay_max)?),
        })
    }
}

fn seconds(flag: &str, v: f64) -> tgexport_core::Result<Duration> {
    Duration::try_from_secs_f64(v).map_err(|_| {
        Error::Config(format!("{flag} must be a non-negative number of seconds, got {v}"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tgexport_core::config::ExportConfig;

    use super::*;

    fn resolve(args: &[&str]) -> tgexport_core::Result<ExportConfig> {
        let cli = Cli::try_parse_from(args).unwrap();
        cli.into_inputs()?
            .resolve(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    }

    #[test]
    fn parses_full_flag_set() {
        let cfg = resolve(&[
            "tgexport",
            "--api-id",
            "42",
            "--api-hash",
            "h",
            "-c",
            "@chan",
            "-m",
            "5",
            "--mode",
            "download",
            "--download-dir",
            "/tmp/dl",
            "--size-limit",
            "10",
            "--extensions",
            ".zip",
            "PDF",
            "--format",
            "csv",
            "--delay-min",
            "0",
            "--delay-max",
            "0.5",
        ])
        .unwrap();

        assert_eq!(cfg.credentials.api_id, 42);
        assert_eq!(cfg.max_messages, 5);
        assert_eq!(cfg.mode, Mode::Download);
        assert_eq!(cfg.download_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(cfg.size_limit_mb, 10);
        assert_eq!(
            cfg.allowed_extensions.iter().cloned().collect::<Vec<_>>(),
            vec![".pdf".to_string(), ".zip".to_string()]
        );
        assert_eq!(cfg.pacing.max_delay, Duration::from_millis(500));
        let out = cfg.output.unwrap();
        assert_eq!(out.format, OutputFormat::Csv);
        assert_eq!(out.path, PathBuf::from("20240102-chan.csv"));
    }

    #[test]
    fn output_flag_takes_a_bool() {
        let cfg = resolve(&[
            "tgexport", "--api-id", "1", "--api-hash", "h", "-c", "chan", "-o", "false",
        ])
        .unwrap();
        assert!(cfg.output.is_none());
    }

    #[test]
    fn bare_output_flag_means_true() {
        let cfg = resolve(&["tgexport", "--api-id", "1", "--api-hash", "h", "-c", "chan", "-o"])
            .unwrap();
        assert!(cfg.output.is_some());
    }

    #[test]
    fn missing_channel_is_config_error() {
        let err = resolve(&["tgexport", "--api-id", "1", "--api-hash", "h"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_max_is_rejected() {
        let err = resolve(&[
            "tgexport", "--api-id", "1", "--api-hash", "h", "-c", "chan", "-m", "0",
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        assert!(Cli::try_parse_from(["tgexport", "--mode", "sync"]).is_err());
    }

    #[test]
    fn negative_or_nan_delay_is_config_error() {
        let cases = [("--delay-min", "--delay-min=-1"), ("--delay-max", "--delay-max=NaN")];
        for (flag, arg) in cases {
            let err = resolve(&[
                "tgexport", "--api-id", "1", "--api-hash", "h", "-c", "chan", arg,
            ])
            .unwrap_err();
            assert!(
                matches!(&err, Error::Config(msg) if msg.contains(flag)),
                "{arg}: {err}"
            );
        }
    }
}
