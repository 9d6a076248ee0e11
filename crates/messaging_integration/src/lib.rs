use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{AccountId, GroupEntity, SessionToken, VoiceRoomId};
use shared::error::PlatformError;

/// Live handle plus the refreshed resumable token produced by a successful
/// connect.
#[derive(Clone)]
pub struct ConnectedClient {
    pub client: Arc<dyn MessengerClient>,
    pub session_token: SessionToken,
}

#[async_trait]
pub trait MessengerConnector: Send + Sync {
    async fn connect(
        &self,
        identity: &AccountId,
        token: Option<&SessionToken>,
    ) -> Result<ConnectedClient, PlatformError>;
}

/// High-level operations of one authenticated platform session. Join
/// operations are idempotent on the platform side: joining something the
/// account is already a member of reports success.
#[async_trait]
pub trait MessengerClient: Send + Sync {
    async fn join_by_reference(&self, reference: &str) -> Result<GroupEntity, PlatformError>;
    async fn import_invite(&self, invite_hash: &str) -> Result<GroupEntity, PlatformError>;
    async fn resolve_group(&self, reference: &str) -> Result<GroupEntity, PlatformError>;
    async fn active_voice_room(
        &self,
        group: &GroupEntity,
    ) -> Result<Option<VoiceRoomId>, PlatformError>;
    async fn join_voice_room(
        &self,
        group: &GroupEntity,
        voice_room: VoiceRoomId,
    ) -> Result<(), PlatformError>;
    async fn leave_dialog(&self, group: &GroupEntity) -> Result<(), PlatformError>;
    async fn disconnect(&self) -> Result<(), PlatformError>;
}
