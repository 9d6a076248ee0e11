use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use messaging_integration::{ConnectedClient, MessengerConnector};
use shared::domain::{
    AccountId, GroupRef, SessionToken, VoiceRoomId, VoiceRoomMembership, VoiceRoomTarget,
};
use shared::error::{FleetError, PlatformError};
use shared::report::{AccountsReport, ConnectSummary, PassSummary, VoiceRoomPassReport};
use storage::CredentialStore;
use tokio::sync::broadcast;

pub mod config;
pub mod orchestrator;
pub mod session_manager;
pub mod voice_tracker;

pub use config::{FleetConfig, Pacing, DEFAULT_AUTO_LEAVE};
pub use orchestrator::{Orchestrator, VoiceJoinMode};
pub use session_manager::{LiveSession, SessionManager};
pub use voice_tracker::VoiceRoomTracker;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Happenings outside any command call, surfaced for front ends.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    AutoLeaveCompleted {
        account: AccountId,
        group: GroupRef,
        voice_room: Option<VoiceRoomId>,
    },
    AutoLeaveCancelled {
        account: AccountId,
        group: GroupRef,
    },
}

/// Stand-in used until a real platform client library is wired in; every
/// connect reports an unconfigured backend.
pub struct MissingMessengerConnector;

#[async_trait]
impl MessengerConnector for MissingMessengerConnector {
    async fn connect(
        &self,
        _identity: &AccountId,
        _token: Option<&SessionToken>,
    ) -> Result<ConnectedClient, PlatformError> {
        Err(PlatformError::Generic(
            "messaging connector is not configured".into(),
        ))
    }
}

/// One engine instance: the session manager, orchestrator, and voice-room
/// tracker wired to a single credential store and event channel.
pub struct Fleet {
    sessions: Arc<SessionManager>,
    tracker: Arc<VoiceRoomTracker>,
    orchestrator: Orchestrator,
    events: broadcast::Sender<FleetEvent>,
}

impl Fleet {
    pub async fn open(
        store: CredentialStore,
        connector: Arc<dyn MessengerConnector>,
        config: FleetConfig,
    ) -> anyhow::Result<Arc<Self>> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sessions =
            SessionManager::initialize(store, connector, config.pacing.connect_delay).await?;
        let tracker = VoiceRoomTracker::new(config.auto_leave_delay, events.clone());
        let joined = sessions.joined_groups_union().await;
        let orchestrator = Orchestrator::new(
            Arc::clone(&sessions),
            Arc::clone(&tracker),
            config.pacing,
            joined,
        );
        Ok(Arc::new(Self {
            sessions,
            tracker,
            orchestrator,
            events,
        }))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }

    pub async fn register_account(
        &self,
        identity: AccountId,
        token: Option<SessionToken>,
    ) -> Result<(), FleetError> {
        self.sessions.register_account(identity, token).await
    }

    /// Removes the credential and everything hanging off it: the live
    /// handle, tracked memberships, and any outstanding auto-leave timer.
    pub async fn remove_account(&self, identity: &AccountId) -> Result<(), FleetError> {
        self.sessions.remove_account(identity).await?;
        self.tracker.forget_account(identity).await;
        Ok(())
    }

    pub async fn connect(&self, identity: &AccountId) -> Result<LiveSession, FleetError> {
        self.sessions.connect(identity).await
    }

    pub async fn connect_all(&self) -> ConnectSummary {
        self.sessions.connect_all().await
    }

    pub async fn disconnect(&self, identity: &AccountId) -> Result<(), FleetError> {
        self.sessions.disconnect(identity).await
    }

    pub async fn disconnect_all(&self) {
        self.sessions.disconnect_all().await
    }

    pub async fn live_sessions(&self) -> Vec<LiveSession> {
        self.sessions.live_sessions().await
    }

    pub async fn accounts_report(&self) -> AccountsReport {
        self.sessions.accounts_report().await
    }

    pub async fn join_group_with_all(
        &self,
        group: &GroupRef,
        voice_room: Option<VoiceRoomId>,
    ) -> Result<PassSummary, FleetError> {
        self.orchestrator.join_group_with_all(group, voice_room).await
    }

    pub async fn leave_group_with_all(
        &self,
        group: &GroupRef,
    ) -> Result<PassSummary, FleetError> {
        self.orchestrator.leave_group_with_all(group).await
    }

    pub async fn join_voice_rooms(
        &self,
        targets: &[VoiceRoomTarget],
    ) -> Result<Vec<VoiceRoomPassReport>, FleetError> {
        self.orchestrator.join_voice_rooms(targets).await
    }

    pub async fn joined_groups(&self) -> Vec<GroupRef> {
        self.orchestrator.joined_groups().await
    }

    pub async fn set_auto_leave_delay(&self, minutes: u64) {
        self.tracker.set_auto_leave_delay(minutes).await
    }

    pub async fn schedule_auto_leave(
        &self,
        session: LiveSession,
        group: GroupRef,
        voice_room: Option<VoiceRoomId>,
    ) {
        self.tracker.schedule_auto_leave(session, group, voice_room).await
    }

    pub async fn cancel_auto_leave(&self, identity: &AccountId, group: &GroupRef) -> bool {
        self.tracker.cancel_auto_leave(identity, group).await
    }

    pub async fn track_membership(
        &self,
        identity: &AccountId,
        group: GroupRef,
        voice_room: VoiceRoomId,
    ) {
        self.tracker.track_membership(identity, group, voice_room).await
    }

    pub async fn untrack_membership(
        &self,
        identity: &AccountId,
        group: &GroupRef,
        voice_room: VoiceRoomId,
    ) {
        self.tracker.untrack_membership(identity, group, voice_room).await
    }

    pub async fn memberships_for_account(
        &self,
        identity: &AccountId,
    ) -> Vec<VoiceRoomMembership> {
        self.tracker.memberships_for_account(identity).await
    }

    pub async fn all_memberships(&self) -> HashMap<AccountId, Vec<VoiceRoomMembership>> {
        self.tracker.all_memberships().await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
