//! Record accumulation, attachment downloads and the final output file.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::{
    config::{OutputFormat, OutputTarget},
    domain::{Message, MessageRecord},
    filter::Accepted,
    ports::ProviderSession,
    Result,
};

pub const CSV_HEADER: [&str; 5] = [
    "File Name",
    "File ID",
    "Date Posted",
    "Combined Name",
    "Post URL",
];

/// What happened to an accepted attachment in this run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchResult {
    /// List mode: nothing to fetch.
    Listed,
    Downloaded { bytes: u64 },
    AlreadyExisted,
}

/// Ordered records of one run plus download counters.
#[derive(Debug, Default)]
pub struct RecordSink {
    records: Vec<MessageRecord>,
    downloaded: usize,
    already_existed: usize,
}

impl RecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    pub fn already_existed(&self) -> usize {
        self.already_existed
    }

    /// Record an accepted message, fetching its attachment first when needed.
    ///
    /// A failed download is fatal and the record is not kept.
    pub async fn accept(
        &mut self,
        session: &dyn ProviderSession,
        message: &Message,
        accepted: Accepted,
    ) -> Result<FetchResult> {
        let result = match &accepted.download {
            None => FetchResult::Listed,
            Some(target) if target.exists => {
                tracing::info!(path = %target.path.display(), "already downloaded, skipping");
                self.already_existed += 1;
                FetchResult::AlreadyExisted
            }
            Some(target) => {
                tracing::info!(path = %target.path.display(), "downloading file");
                let bytes = fetch_into(session, message, &target.path).await?;
                self.downloaded += 1;
                FetchResult::Downloaded { bytes }
            }
        };

        self.records.push(accepted.record);
        Ok(result)
    }

    /// Serialize every record; the JSON form is keyed by `channel_name`.
    pub fn render(&self, channel_name: &str, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Json => render_json(channel_name, &self.records),
            OutputFormat::Csv => render_csv(&self.records),
        }
    }

    /// Render in memory, then create/overwrite the output file in one write.
    pub async fn write_output(&self, channel_name: &str, target: &OutputTarget) -> Result<()> {
        let bytes = self.render(channel_name, target.format)?;
        if let Some(parent) = target.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target.path, bytes).await?;
        Ok(())
    }
}

fn render_json(channel_name: &str, records: &[MessageRecord]) -> Result<Vec<u8>> {
    let mut doc = BTreeMap::new();
    doc.insert(channel_name, records);

    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser)?;
    out.push(b'\n');
    Ok(out)
}

fn render_csv(records: &[MessageRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;
    for rec in records {
        wtr.serialize(rec)?;
    }
    wtr.into_inner()
        .map_err(|e| crate::errors::Error::Io(e.into_error()))
}

/// Download next to the target and rename on success, so an interrupted fetch
/// never leaves a file that looks complete.
async fn fetch_into(
    session: &dyn ProviderSession,
    message: &Message,
    target: &Path,
) -> Result<u64> {
    let partial = partial_path(target);
    match session.download_attachment(message, &partial).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, target).await?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        filter::DownloadTarget,
        test_support::{doc_msg, FakeProvider},
    };

    fn record(name: &str, id: i64) -> MessageRecord {
        MessageRecord {
            file_name: name.to_string(),
            file_id: id,
            date_posted: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            combined_name: format!("20240102-{name}"),
            post_url: format!("https://t.me/foo/{id}"),
        }
    }

    fn sink_with(records: Vec<MessageRecord>) -> RecordSink {
        RecordSink {
            records,
            ..Default::default()
        }
    }

    #[test]
    fn json_is_keyed_by_channel_and_ordered() {
        let sink = sink_with(vec![record("b.zip", 2), record("a.zip", 1)]);
        let bytes = sink.render("Foo Files", OutputFormat::Json).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\n    \"Foo Files\": ["));

        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        let arr = v["Foo Files"].as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["File Name"], "b.zip");
        assert_eq!(arr[1]["Date Posted"], "2024-01-02 03:04:05");
    }

    #[test]
    fn empty_json_still_has_channel_key() {
        let bytes = RecordSink::new().render("Empty", OutputFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["Empty"], serde_json::json!([]));
    }

    #[test]
    fn csv_has_fixed_header_and_quotes_commas() {
        let sink = sink_with(vec![record("a, b.zip", 7)]);
        let text = String::from_utf8(sink.render("x", OutputFormat::Csv).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("File Name,File ID,Date Posted,Combined Name,Post URL")
        );
        assert_eq!(
            lines.next(),
            Some("\"a, b.zip\",7,2024-01-02 03:04:05,\"20240102-a, b.zip\",https://t.me/foo/7")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_csv_is_header_only() {
        let text = String::from_utf8(RecordSink::new().render("x", OutputFormat::Csv).unwrap())
            .unwrap();
        assert_eq!(text, "File Name,File ID,Date Posted,Combined Name,Post URL\n");
    }

    #[tokio::test]
    async fn write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget {
            path: dir.path().join("nested/out.json"),
            format: OutputFormat::Json,
        };
        sink_with(vec![record("a.zip", 1)])
            .write_output("Foo", &target)
            .await
            .unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&target.path).unwrap()).unwrap();
        assert_eq!(v["Foo"][0]["File ID"], 1);
    }

    #[tokio::test]
    async fn unwritable_output_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be overwritten with file contents.
        let target = OutputTarget {
            path: dir.path().to_path_buf(),
            format: OutputFormat::Json,
        };
        let err = RecordSink::new().write_output("Foo", &target).await.unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/d/20240102-a.zip")),
            PathBuf::from("/d/20240102-a.zip.part")
        );
    }

    #[tokio::test]
    async fn failed_fetch_keeps_no_record_and_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let message = doc_msg(1, 2, "a.zip", 10);
        let target = dir.path().join("20240102-a.zip");
        let accepted = Accepted {
            record: record("a.zip", 1),
            download: Some(DownloadTarget {
                path: target.clone(),
                exists: false,
            }),
        };
        let (mut provider, _) = FakeProvider::new(vec![]);
        provider.fail_downloads = true;

        let mut sink = RecordSink::new();
        let err = sink
            .accept(&provider.session(), &message, accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
        assert!(sink.records().is_empty());
        assert_eq!(sink.downloaded(), 0);
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }
}
