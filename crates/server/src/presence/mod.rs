//! Presence broadcasts.
//!
//! A participant is online while any of their sessions is registered. The
//! publisher turns register/unregister transitions into `user-status-changed`
//! broadcasts to every connected session.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::models::{OnlineUser, PresenceStatus};
use crate::protocol::ServerEvent;
use crate::registry::{Session, SessionRegistry};

pub struct PresencePublisher {
    registry: Arc<dyn SessionRegistry>,
}

impl PresencePublisher {
    pub fn new(registry: Arc<dyn SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Broadcast an online transition for a freshly registered session.
    pub async fn user_online(&self, session: &Session) {
        info!(
            "participant {} online ({} as {})",
            session.participant_id, session.display_name, session.role
        );
        self.publish(session, PresenceStatus::Online).await;
    }

    /// Broadcast an offline transition. Only call when the participant has
    /// no live session left; the registry reports that on removal.
    pub async fn user_offline(&self, session: &Session) {
        info!("participant {} offline", session.participant_id);
        self.publish(session, PresenceStatus::Offline).await;
    }

    async fn publish(&self, session: &Session, status: PresenceStatus) {
        self.registry
            .broadcast_all(ServerEvent::UserStatusChanged {
                user_id: session.participant_id.clone(),
                user_name: session.display_name.clone(),
                role: session.role.clone(),
                status,
                timestamp: Utc::now(),
            })
            .await;
    }

    /// De-duplicated snapshot of registered participants.
    pub async fn online_users(&self) -> Vec<OnlineUser> {
        self.registry.online_users().await
    }
}
