//! Server configuration and shared state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::aggregate::ConversationAggregator;
use crate::conversation::ConversationResolver;
use crate::directory::Directory;
use crate::presence::PresencePublisher;
use crate::registry::SessionRegistry;
use crate::router::MessageRouter;
use crate::store::MessageStore;

/// Configuration for the messaging server.
#[derive(Clone, Debug)]
pub struct ChatServerConfig {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Message database path.
    pub messages_db: PathBuf,
    /// User directory database path.
    pub users_db: PathBuf,
    /// Listen address.
    pub bind_addr: SocketAddr,
}

impl Default for ChatServerConfig {
    fn default() -> Self {
        let data_dir = std::env::var("CHAT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("chat_data"));
        let bind_addr = std::env::var("CHAT_BIND")
            .ok()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3001)));
        Self::with_base_dir(data_dir, bind_addr)
    }
}

impl ChatServerConfig {
    /// Create config rooted at a custom base directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>, bind_addr: SocketAddr) -> Self {
        let data_dir = base_dir.into();
        Self {
            messages_db: data_dir.join("messages.sqlite"),
            users_db: data_dir.join("users.sqlite"),
            data_dir,
            bind_addr,
        }
    }

    /// Ensure the data directory exists.
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }
}

/// App state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn SessionRegistry>,
    pub store: Arc<dyn MessageStore>,
    pub directory: Arc<dyn Directory>,
    pub resolver: Arc<ConversationResolver>,
    pub router: Arc<MessageRouter>,
    pub presence: Arc<PresencePublisher>,
    pub aggregator: Arc<ConversationAggregator>,
}
