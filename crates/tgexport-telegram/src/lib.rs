//! Telegram adapter (grammers, MTProto).
//!
//! This crate implements the `tgexport-core` provider ports over a user
//! account session, which is what reading channel history requires.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use grammers_client::{
    client::messages::MessageIter,
    types::{Chat, Downloadable, Media},
    Client, Config, InitParams, InvocationError,
};
use grammers_session::Session;

use tgexport_core::{
    domain::{ChannelHandle, ChannelRef, Credentials, Message},
    errors::Error,
    ports::{ChannelProvider, MessageStream, ProviderSession},
    Result,
};

pub mod convert;
pub mod login;

/// Opens grammers sessions backed by a session file on disk.
#[derive(Clone, Debug)]
pub struct TelegramProvider {
    session_file: PathBuf,
}

impl TelegramProvider {
    pub fn new(session_file: impl Into<PathBuf>) -> Self {
        Self {
            session_file: session_file.into(),
        }
    }
}

#[async_trait]
impl ChannelProvider for TelegramProvider {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Box<dyn ProviderSession>> {
        let session = Session::load_file_or_create(&self.session_file)?;
        let client = Client::connect(Config {
            session,
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| Error::External(format!("failed to connect to telegram: {e}")))?;

        let tg = TelegramSession {
            client,
            session_file: self.session_file.clone(),
            resolved: Mutex::new(None),
            current: Mutex::new(None),
        };

        if !tg.client.is_authorized().await.map_err(map_err)? {
            tracing::info!("session not authorized, starting interactive sign in");
            login::sign_in(&tg.client).await?;
            tg.save()?;
        }

        Ok(Box::new(tg))
    }
}

pub struct TelegramSession {
    client: Client,
    session_file: PathBuf,
    /// Packed chat of the last resolved channel; history is paged from it.
    resolved: Mutex<Option<Chat>>,
    /// Media of the message most recently yielded by the stream. Messages are
    /// processed one at a time, so this is the only one that can be downloaded.
    current: Mutex<Option<(i32, Media)>>,
}

impl TelegramSession {
    fn save(&self) -> Result<()> {
        self.client.session().save_to_file(&self.session_file)?;
        Ok(())
    }

    fn remember(&self, id: i32, media: Option<Media>) {
        if let Ok(mut slot) = self.current.lock() {
            *slot = media.map(|m| (id, m));
        }
    }

    async fn find_in_dialogs(&self, channel: &ChannelRef) -> Result<Option<Chat>> {
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(map_err)? {
            let chat = dialog.chat();
            if convert::matches_ref(chat, channel) {
                return Ok(Some(chat.clone()));
            }
        }
        Ok(None)
    }

    async fn lookup(&self, channel: &ChannelRef) -> Result<Option<Chat>> {
        match channel {
            ChannelRef::Username(name) => {
                let found = self
                    .client
                    .resolve_username(name)
                    .await
                    .map_err(|e| Error::Resolution(format!("{channel}: {e}")))?;
                match found {
                    Some(chat) => Ok(Some(chat)),
                    None => self.find_in_dialogs(channel).await,
                }
            }
            ChannelRef::Numeric(_) => self.find_in_dialogs(channel).await,
        }
    }
}

#[async_trait]
impl ProviderSession for TelegramSession {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelHandle> {
        let chat = self
            .lookup(channel)
            .await?
            .ok_or_else(|| Error::Resolution(format!("{channel} not found or not accessible")))?;
        let handle = convert::channel_handle(&chat);
        if let Ok(mut slot) = self.resolved.lock() {
            *slot = Some(chat);
        }
        Ok(handle)
    }

    fn messages<'a>(
        &'a self,
        channel: &ChannelHandle,
        limit: usize,
    ) -> Box<dyn MessageStream + 'a> {
        let chat = self
            .resolved
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .filter(|chat| chat.id() == channel.id);
        Box::new(TelegramStream {
            session: self,
            channel_id: channel.id,
            iter: chat.map(|chat| self.client.iter_messages(chat.pack()).limit(limit)),
        })
    }

    async fn download_attachment(&self, message: &Message, destination: &Path) -> Result<u64> {
        let media = {
            let slot = self
                .current
                .lock()
                .map_err(|_| Error::External("media slot poisoned".to_string()))?;
            match slot.as_ref() {
                Some((id, media)) if *id == message.id => media.clone(),
                _ => {
                    return Err(Error::External(format!(
                        "attachment of message {} is no longer available",
                        message.id
                    )))
                }
            }
        };

        self.client
            .download_media(&Downloadable::Media(media), destination)
            .await
            .map_err(|e| {
                Error::External(format!("download of message {} failed: {e}", message.id))
            })?;

        let written = tokio::fs::metadata(destination).await?.len();
        Ok(written)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.save()?;
        tracing::debug!(path = %self.session_file.display(), "session saved");
        Ok(())
    }
}

/// Pages through history of a channel resolved earlier in this session.
struct TelegramStream<'a> {
    session: &'a TelegramSession,
    channel_id: i64,
    iter: Option<MessageIter>,
}

#[async_trait]
impl MessageStream for TelegramStream<'_> {
    async fn next(&mut self) -> Result<Option<Message>> {
        let Some(iter) = self.iter.as_mut() else {
            return Err(Error::Resolution(format!(
                "channel {} was not resolved in this session",
                self.channel_id
            )));
        };

        let Some(raw) = iter.next().await.map_err(map_err)? else {
            return Ok(None);
        };
        let msg = convert::message(&raw);
        self.session.remember(msg.id, raw.media());
        Ok(Some(msg))
    }
}

fn map_err(e: InvocationError) -> Error {
    Error::External(format!("telegram error: {e}"))
}
