//! In-memory provider used by the run-loop and sink tests.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::{
    domain::{
        Attachment, ChannelHandle, ChannelRef, Credentials, Document, DocumentAttribute, Message,
    },
    errors::Error,
    ports::{ChannelProvider, MessageStream, ProviderSession},
    Result,
};

pub(crate) const MB: i64 = 1024 * 1024;

#[derive(Default)]
pub(crate) struct Calls {
    pub(crate) closed: AtomicBool,
    pub(crate) downloads: AtomicUsize,
    pub(crate) pulled: AtomicUsize,
}

pub(crate) struct FakeProvider {
    pub(crate) channel: Option<ChannelHandle>,
    pub(crate) history: Vec<Message>,
    pub(crate) fail_downloads: bool,
    pub(crate) calls: Arc<Calls>,
}

impl FakeProvider {
    pub(crate) fn new(history: Vec<Message>) -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let provider = Self {
            channel: Some(channel()),
            history,
            fail_downloads: false,
            calls: Arc::clone(&calls),
        };
        (provider, calls)
    }

    pub(crate) fn session(&self) -> FakeSession {
        FakeSession {
            channel: self.channel.clone(),
            history: self.history.clone(),
            fail_downloads: self.fail_downloads,
            calls: Arc::clone(&self.calls),
        }
    }
}

pub(crate) struct FakeSession {
    channel: Option<ChannelHandle>,
    history: Vec<Message>,
    fail_downloads: bool,
    calls: Arc<Calls>,
}

struct FakeStream<'a> {
    queue: VecDeque<Message>,
    calls: &'a Calls,
}

#[async_trait]
impl ChannelProvider for FakeProvider {
    async fn authenticate(&self, _: &Credentials) -> Result<Box<dyn ProviderSession>> {
        Ok(Box::new(self.session()))
    }
}

#[async_trait]
impl ProviderSession for FakeSession {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelHandle> {
        self.channel
            .clone()
            .ok_or_else(|| Error::Resolution(format!("no such channel: {channel}")))
    }

    fn messages<'a>(
        &'a self,
        _channel: &ChannelHandle,
        limit: usize,
    ) -> Box<dyn MessageStream + 'a> {
        Box::new(FakeStream {
            queue: self.history.iter().take(limit).cloned().collect(),
            calls: &self.calls,
        })
    }

    /// With `fail_downloads`, leaves half a file behind and then fails like a full disk.
    async fn download_attachment(&self, message: &Message, destination: &Path) -> Result<u64> {
        if message.document().is_none() {
            return Err(Error::External("no document".into()));
        }
        if self.fail_downloads {
            tokio::fs::write(destination, b"trunc").await?;
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no space left on device",
            )));
        }
        let bytes = vec![0u8; 16];
        tokio::fs::write(destination, &bytes).await?;
        self.calls.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(bytes.len() as u64)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.calls.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl MessageStream for FakeStream<'_> {
    async fn next(&mut self) -> Result<Option<Message>> {
        let next = self.queue.pop_front();
        if next.is_some() {
            self.calls.pulled.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }
}

pub(crate) fn channel() -> ChannelHandle {
    ChannelHandle {
        id: 1234,
        username: Some("foo".into()),
        title: "Foo Files".into(),
    }
}

pub(crate) fn doc_msg(id: i32, day: u32, name: &str, size: i64) -> Message {
    Message {
        id,
        date: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        attachment: Some(Attachment::Document(Document {
            id: 9000 + id as i64,
            size,
            attributes: vec![DocumentAttribute::Filename(name.into())],
        })),
    }
}

pub(crate) fn bare_msg(id: i32) -> Message {
    Message {
        id,
        date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        attachment: None,
    }
}
