//! CareLink Messaging Server Library
//!
//! Presence and conversation-routing engine: live session tracking, stable
//! pairwise conversation identity, durable message persistence with fan-out,
//! and per-user conversation summaries with unread tracking.

pub mod aggregate;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod store;

use std::sync::Arc;

use axum::{routing::get, Router};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use aggregate::ConversationAggregator;
use config::{AppState, ChatServerConfig};
use conversation::ConversationResolver;
use directory::{Directory, SqliteDirectory};
use handlers::{
    get_unread_count, get_user_conversations, health_check, list_chat_users, ws_handler,
};
use presence::PresencePublisher;
use registry::{InMemoryRegistry, SessionRegistry};
use router::MessageRouter;
use store::{MessageStore, SqliteMessageStore};

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    info!("=== CareLink Messaging Server ===");
    info!("Features: Presence | Conversation Routing | Durable Messages | Unread Tracking");

    let config = ChatServerConfig::default();
    config.ensure_dirs().await?;

    info!("Data directory: {:?}", config.data_dir);

    let store: Arc<dyn MessageStore> =
        Arc::new(SqliteMessageStore::new(&config.messages_db).await?);
    info!("Message store initialized");

    let directory: Arc<dyn Directory> = Arc::new(SqliteDirectory::new(&config.users_db).await?);
    info!("Directory client initialized");

    let registry: Arc<dyn SessionRegistry> = Arc::new(InMemoryRegistry::new());
    let resolver = Arc::new(ConversationResolver::new());
    let presence = Arc::new(PresencePublisher::new(registry.clone()));
    let router = Arc::new(MessageRouter::new(
        registry.clone(),
        store.clone(),
        resolver.clone(),
    ));
    let aggregator = Arc::new(ConversationAggregator::new(
        store.clone(),
        directory.clone(),
    ));
    info!("Routing core initialized");

    let app_state = AppState {
        registry,
        store,
        directory,
        resolver,
        router,
        presence,
        aggregator,
    };

    let app = Router::new()
        // Persistent per-session channel
        .route("/ws", get(ws_handler))
        // Directory and aggregation surface
        .route("/chat/users", get(list_chat_users))
        .route("/chat/conversations/{user_id}", get(get_user_conversations))
        .route("/chat/unread/{user_id}", get(get_unread_count))
        // Health check
        .route("/health", get(health_check))
        .with_state(app_state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = config.bind_addr;
    info!("");
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║  CareLink Messaging Server Running                         ║");
    info!("║  Address: http://{:<42}║", addr);
    info!("╚════════════════════════════════════════════════════════════╝");
    info!("");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
