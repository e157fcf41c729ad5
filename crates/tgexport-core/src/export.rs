//! The export run loop: session -> channel -> filtered history -> sink -> file.

use std::{collections::BTreeMap, path::PathBuf};

use crate::{
    config::{ExportConfig, Mode},
    domain::ChannelHandle,
    filter::{FilterOutcome, MessageFilter},
    pacing::Pacer,
    ports::{ChannelProvider, ProviderSession},
    sink::{FetchResult, RecordSink},
    Result,
};

/// Counters and outcome of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportSummary {
    pub channel_name: String,
    pub messages_processed: usize,
    pub records: usize,
    /// Keyed by [`crate::filter::RejectReason::label`].
    pub rejected: BTreeMap<&'static str, usize>,
    pub processing_errors: usize,
    pub downloaded: usize,
    pub already_existed: usize,
    pub output_path: Option<PathBuf>,
}

impl ExportSummary {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum::<usize>() + self.processing_errors
    }
}

/// Run one export end to end.
///
/// The session is closed on every path; a close failure is only reported when
/// the export itself succeeded.
pub async fn run_export(
    provider: &dyn ChannelProvider,
    cfg: &ExportConfig,
    pacer: &Pacer,
) -> Result<ExportSummary> {
    tracing::info!(channel = %cfg.channel, mode = %cfg.mode, "initializing telegram client");
    let session = provider.authenticate(&cfg.credentials).await?;

    let result = export_with_session(session.as_ref(), cfg, pacer).await;
    let closed = session.close().await;

    match (result, closed) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), close) => {
            if let Err(close_err) = close {
                tracing::warn!(error = %close_err, "session teardown failed");
            }
            Err(e)
        }
    }
}

async fn export_with_session(
    session: &dyn ProviderSession,
    cfg: &ExportConfig,
    pacer: &Pacer,
) -> Result<ExportSummary> {
    let channel = session.resolve_channel(&cfg.channel).await?;
    let channel_name = channel.display_name();
    tracing::info!(channel = %channel_name, id = channel.id, "channel found");

    if cfg.mode == Mode::Download {
        tokio::fs::create_dir_all(&cfg.download_dir).await?;
    }

    let filter = MessageFilter::from_config(cfg);
    let mut sink = RecordSink::new();
    let mut summary = ExportSummary {
        channel_name: channel_name.clone(),
        ..Default::default()
    };

    process_history(session, &channel, cfg, &filter, pacer, &mut sink, &mut summary).await?;

    summary.records = sink.records().len();
    summary.downloaded = sink.downloaded();
    summary.already_existed = sink.already_existed();

    if let Some(target) = &cfg.output {
        sink.write_output(&channel_name, target).await?;
        tracing::info!(
            path = %target.path.display(),
            records = summary.records,
            "export completed"
        );
        summary.output_path = Some(target.path.clone());
    }

    tracing::info!(
        processed = summary.messages_processed,
        records = summary.records,
        rejected = summary.rejected_total(),
        downloaded = summary.downloaded,
        already_existed = summary.already_existed,
        "run finished"
    );
    Ok(summary)
}

async fn process_history(
    session: &dyn ProviderSession,
    channel: &ChannelHandle,
    cfg: &ExportConfig,
    filter: &MessageFilter,
    pacer: &Pacer,
    sink: &mut RecordSink,
    summary: &mut ExportSummary,
) -> Result<()> {
    let mut stream = session.messages(channel, cfg.max_messages);

    while summary.messages_processed < cfg.max_messages {
        let Some(message) = stream.next().await? else {
            break;
        };
        // Pace between messages only; the end of history costs no delay.
        if summary.messages_processed > 0 {
            pacer.pause().await;
        }
        summary.messages_processed += 1;

        match filter.evaluate(channel, &message) {
            Ok(FilterOutcome::Pass(accepted)) => {
                let name = accepted.record.combined_name.clone();
                match sink.accept(session, &message, accepted).await? {
                    FetchResult::Downloaded { bytes } => {
                        tracing::debug!(message_id = message.id, file = %name, bytes, "fetched");
                    }
                    FetchResult::Listed | FetchResult::AlreadyExisted => {
                        tracing::debug!(message_id = message.id, file = %name, "recorded");
                    }
                }
            }
            Ok(FilterOutcome::Reject(reason)) => {
                tracing::debug!(message_id = message.id, %reason, "skipped");
                *summary.rejected.entry(reason.label()).or_default() += 1;
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "skipping message with malformed attachment");
                summary.processing_errors += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
