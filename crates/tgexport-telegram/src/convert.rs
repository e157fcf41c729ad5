//! grammers types -> provider-neutral domain types.

use grammers_client::types::{Chat, Media, Message as TgMessage};

use tgexport_core::domain::{
    Attachment, ChannelHandle, ChannelRef, Document, DocumentAttribute, Message,
};

/// Telegram "marked" ids prefix channels with -100 (`-100<bare id>`).
const CHANNEL_MARK: i64 = 1_000_000_000_000;

/// Bare id as reported by `Chat::id()`, from whatever form the user typed.
pub fn bare_chat_id(id: i64) -> i64 {
    if id >= 0 {
        return id;
    }
    let abs = id.unsigned_abs() as i64;
    if abs > CHANNEL_MARK {
        abs - CHANNEL_MARK
    } else {
        abs
    }
}

pub fn matches_ref(chat: &Chat, channel: &ChannelRef) -> bool {
    match channel {
        ChannelRef::Numeric(id) => chat.id() == bare_chat_id(*id) || chat.id() == *id,
        ChannelRef::Username(name) => chat
            .username()
            .is_some_and(|u| u.eq_ignore_ascii_case(name)),
    }
}

pub fn channel_handle(chat: &Chat) -> ChannelHandle {
    ChannelHandle {
        id: chat.id(),
        username: chat.username().map(str::to_string),
        title: chat.name().to_string(),
    }
}

pub fn message(msg: &TgMessage) -> Message {
    Message {
        id: msg.id(),
        date: msg.date(),
        attachment: msg.media().as_ref().map(attachment),
    }
}

fn attachment(media: &Media) -> Attachment {
    match media {
        Media::Document(doc) => Attachment::Document(document(
            doc.id(),
            doc.name(),
            doc.size(),
            doc.mime_type(),
        )),
        Media::Photo(_) => Attachment::Other {
            kind: "photo".to_string(),
        },
        Media::Sticker(_) => Attachment::Other {
            kind: "sticker".to_string(),
        },
        _ => Attachment::Other {
            kind: "other".to_string(),
        },
    }
}

/// grammers reports a missing file name as `""`. The mime type only survives as
/// an opaque attribute.
pub fn document(id: i64, name: &str, size: i64, mime_type: Option<&str>) -> Document {
    let mut attributes = Vec::new();
    if !name.is_empty() {
        attributes.push(DocumentAttribute::Filename(name.to_string()));
    }
    if let Some(mime) = mime_type {
        attributes.push(DocumentAttribute::Other(format!("mime:{mime}")));
    }
    Document {
        id,
        size,
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ids() {
        assert_eq!(bare_chat_id(1234), 1234);
        assert_eq!(bare_chat_id(-1001234567890), 1234567890);
        assert_eq!(bare_chat_id(-4567), 4567);
    }

    #[test]
    fn empty_name_means_no_filename_attribute() {
        let doc = document(1, "", 10, Some("application/zip"));
        assert_eq!(doc.file_name(), None);
        assert_eq!(
            doc.attributes,
            vec![DocumentAttribute::Other("mime:application/zip".into())]
        );

        let doc = document(1, "a.zip", 10, None);
        assert_eq!(doc.file_name(), Some("a.zip"));
        assert_eq!(
            doc.attributes,
            vec![DocumentAttribute::Filename("a.zip".into())]
        );
    }
}
