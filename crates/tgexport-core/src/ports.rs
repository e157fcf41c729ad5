use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChannelHandle, ChannelRef, Credentials, Message},
    Result,
};

/// Hexagonal port for the messaging provider (Telegram today).
///
/// Authentication, entity resolution, pagination and media transport all live
/// behind this trait; the core never touches the network itself.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Open an authenticated session. The caller must `close()` it.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Box<dyn ProviderSession>>;
}

/// One authenticated connection.
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// `Error::Resolution` when the channel does not exist or is not accessible.
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelHandle>;

    /// Newest-first history, at most `limit` messages. Lazy and not restartable.
    fn messages<'a>(
        &'a self,
        channel: &ChannelHandle,
        limit: usize,
    ) -> Box<dyn MessageStream + 'a>;

    /// Fetch the attachment of `message` into `destination`. Returns bytes written.
    async fn download_attachment(&self, message: &Message, destination: &Path) -> Result<u64>;

    /// Teardown (flush session state, disconnect). Called on every exit path.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Pull-based message sequence; each `next()` may wait on a page fetch.
#[async_trait]
pub trait MessageStream: Send {
    async fn next(&mut self) -> Result<Option<Message>>;
}
