//! Per-message decision: does this message carry an attachment we export?

use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    config::{ExportConfig, Mode},
    domain::{ChannelHandle, Message, MessageRecord},
    errors::Error,
    naming, Result,
};

#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    NoAttachment,
    NoFilename,
    DisallowedExtension(String),
    OverSize { size_mb: f64, limit_mb: u64 },
}

impl RejectReason {
    /// Short stable label, used as a counter key in the run summary.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::NoAttachment => "no_attachment",
            RejectReason::NoFilename => "no_filename",
            RejectReason::DisallowedExtension(_) => "disallowed_extension",
            RejectReason::OverSize { .. } => "over_size",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoAttachment => f.write_str("no document attached"),
            RejectReason::NoFilename => f.write_str("document has no file name"),
            RejectReason::DisallowedExtension(ext) if ext.is_empty() => {
                f.write_str("file has no extension")
            }
            RejectReason::DisallowedExtension(ext) => write!(f, "extension {ext} not allowed"),
            RejectReason::OverSize { size_mb, limit_mb } => {
                write!(f, "{size_mb:.2} MB exceeds limit of {limit_mb} MB")
            }
        }
    }
}

/// Where a download-mode attachment goes, and whether it is already there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTarget {
    pub path: PathBuf,
    pub exists: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    pub record: MessageRecord,
    /// `Some` only in download mode.
    pub download: Option<DownloadTarget>,
}

impl Accepted {
    pub fn needs_fetch(&self) -> bool {
        self.download.as_ref().is_some_and(|t| !t.exists)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutcome {
    Pass(Accepted),
    Reject(RejectReason),
}

/// Extension + size rules, and the download location for accepted files.
#[derive(Clone, Debug)]
pub struct MessageFilter {
    allowed_extensions: BTreeSet<String>,
    size_limit_mb: u64,
    download_dir: Option<PathBuf>,
}

impl MessageFilter {
    pub fn new(
        allowed_extensions: BTreeSet<String>,
        size_limit_mb: u64,
        download_dir: Option<PathBuf>,
    ) -> Self {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();
        Self {
            allowed_extensions,
            size_limit_mb,
            download_dir,
        }
    }

    pub fn from_config(cfg: &ExportConfig) -> Self {
        let download_dir = match cfg.mode {
            Mode::Download => Some(cfg.download_dir.clone()),
            Mode::List => None,
        };
        Self::new(cfg.allowed_extensions.clone(), cfg.size_limit_mb, download_dir)
    }

    /// Decide on one message.
    ///
    /// `Err(Error::MessageProcessing)` means the attachment metadata is unusable;
    /// the caller treats it as a rejection and keeps going.
    pub fn evaluate(&self, channel: &ChannelHandle, message: &Message) -> Result<FilterOutcome> {
        let Some(doc) = message.document() else {
            return Ok(FilterOutcome::Reject(RejectReason::NoAttachment));
        };

        let Some(file_name) = doc.file_name() else {
            return Ok(FilterOutcome::Reject(RejectReason::NoFilename));
        };

        let ext = naming::extension_of(file_name);
        if !self.allowed_extensions.contains(&ext) {
            return Ok(FilterOutcome::Reject(RejectReason::DisallowedExtension(ext)));
        }

        let bytes = u64::try_from(doc.size).map_err(|_| Error::MessageProcessing {
            message_id: message.id,
            reason: format!("document {} declares negative size {}", doc.id, doc.size),
        })?;
        let size_mb = naming::size_in_mb(bytes);
        if size_mb > self.size_limit_mb as f64 {
            return Ok(FilterOutcome::Reject(RejectReason::OverSize {
                size_mb,
                limit_mb: self.size_limit_mb,
            }));
        }

        // Only a download turns the name into a path; listed names are kept verbatim.
        if self.download_dir.is_some() {
            check_file_name(message.id, file_name)?;
        }

        let record = MessageRecord::new(channel, message, doc, file_name);
        let download = self
            .download_dir
            .as_deref()
            .map(|dir| download_target(dir, &record.combined_name));

        Ok(FilterOutcome::Pass(Accepted { record, download }))
    }
}

fn download_target(dir: &Path, combined_name: &str) -> DownloadTarget {
    let path = dir.join(combined_name);
    let exists = path.exists();
    DownloadTarget { path, exists }
}

/// The name becomes a path component under the download directory.
fn check_file_name(message_id: i32, name: &str) -> Result<()> {
    if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        return Err(Error::MessageProcessing {
            message_id,
            reason: format!("unusable file name {name:?}"),
        });
    }
    Ok(())
}
