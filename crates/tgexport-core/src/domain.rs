use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::{errors::Error, naming, Result};

/// Telegram API credentials (`api_id` / `api_hash` pair from my.telegram.org).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

/// How the user named the channel on the command line.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Username(String),
    Numeric(i64),
}

impl FromStr for ChannelRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return Ok(ChannelRef::Numeric(id));
        }

        let stripped = ["https://t.me/", "http://t.me/", "t.me/"]
            .iter()
            .find_map(|p| raw.strip_prefix(p))
            .unwrap_or(raw);
        let name = stripped.trim_start_matches('@').trim_end_matches('/');

        if name.is_empty() {
            return Err(Error::Config(format!("invalid channel identifier: {s:?}")));
        }
        Ok(ChannelRef::Username(name.to_string()))
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Username(u) => write!(f, "@{u}"),
            ChannelRef::Numeric(id) => write!(f, "{id}"),
        }
    }
}

/// A resolved channel. Only used to build post URLs and the export's display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: i64,
    pub username: Option<String>,
    pub title: String,
}

impl ChannelHandle {
    pub fn post_url(&self, message_id: i32) -> String {
        naming::post_url(self.username.as_deref(), self.id, message_id)
    }

    /// Title, falling back to the username, falling back to the numeric id.
    pub fn display_name(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        match self.username.as_deref() {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// One attribute of a document, in provider order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentAttribute {
    Filename(String),
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub id: i64,
    /// Declared size in bytes, as reported by the provider.
    pub size: i64,
    pub attributes: Vec<DocumentAttribute>,
}

impl Document {
    /// First filename-bearing attribute, trimmed. A blank name counts as absent.
    pub fn file_name(&self) -> Option<&str> {
        let name = self.attributes.iter().find_map(|a| match a {
            DocumentAttribute::Filename(name) => Some(name.trim()),
            DocumentAttribute::Other(_) => None,
        })?;
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attachment {
    Document(Document),
    /// Photos, polls, web previews, ... anything that is not a document.
    Other { kind: String },
}

/// Provider-neutral view of a channel message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub attachment: Option<Attachment>,
}

impl Message {
    pub fn document(&self) -> Option<&Document> {
        match &self.attachment {
            Some(Attachment::Document(doc)) => Some(doc),
            _ => None,
        }
    }
}

/// One exported attachment. Field names are the column names of the output file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "File ID")]
    pub file_id: i64,
    #[serde(rename = "Date Posted", serialize_with = "serialize_posted")]
    pub date_posted: DateTime<Utc>,
    #[serde(rename = "Combined Name")]
    pub combined_name: String,
    #[serde(rename = "Post URL")]
    pub post_url: String,
}

pub const DATE_POSTED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn serialize_posted<S: Serializer>(
    date: &DateTime<Utc>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(&date.format(DATE_POSTED_FORMAT))
}

impl MessageRecord {
    pub fn new(
        channel: &ChannelHandle,
        message: &Message,
        doc: &Document,
        file_name: &str,
    ) -> Self {
        Self {
            file_name: file_name.to_string(),
            file_id: doc.id,
            date_posted: message.date,
            combined_name: naming::combined_name(&message.date, file_name),
            post_url: channel.post_url(message.id),
        }
    }
}
