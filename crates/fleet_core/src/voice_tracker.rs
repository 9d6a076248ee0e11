use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared::domain::{AccountId, GroupRef, VoiceRoomId, VoiceRoomMembership};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session_manager::LiveSession;
use crate::FleetEvent;

struct PendingAutoLeave {
    group: GroupRef,
    task: JoinHandle<()>,
}

struct TrackerState {
    auto_leave_delay: Duration,
    memberships: HashMap<AccountId, Vec<VoiceRoomMembership>>,
    pending: HashMap<AccountId, PendingAutoLeave>,
}

/// Records which account/group/voice-room triples are currently joined and
/// owns the deferred auto-leave tasks, at most one per account.
pub struct VoiceRoomTracker {
    state: Mutex<TrackerState>,
    events: broadcast::Sender<FleetEvent>,
}

impl VoiceRoomTracker {
    pub fn new(auto_leave_delay: Duration, events: broadcast::Sender<FleetEvent>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TrackerState {
                auto_leave_delay,
                memberships: HashMap::new(),
                pending: HashMap::new(),
            }),
            events,
        })
    }

    /// Applies to timers armed from now on; an already armed timer keeps the
    /// delay it was scheduled with.
    pub async fn set_auto_leave_delay(&self, minutes: u64) {
        let mut state = self.state.lock().await;
        state.auto_leave_delay = Duration::from_secs(minutes.saturating_mul(60));
        info!(minutes, "auto_leave: delay updated");
    }

    pub async fn auto_leave_delay(&self) -> Duration {
        self.state.lock().await.auto_leave_delay
    }

    /// Tracking the same triple twice is a no-op.
    pub async fn track_membership(
        &self,
        identity: &AccountId,
        group: GroupRef,
        voice_room: VoiceRoomId,
    ) {
        let mut state = self.state.lock().await;
        let records = state.memberships.entry(identity.clone()).or_default();
        if records
            .iter()
            .any(|record| record.group == group && record.voice_room == voice_room)
        {
            debug!(account = identity.as_str(), group = group.as_str(), "tracker: membership already tracked");
            return;
        }
        records.push(VoiceRoomMembership {
            group,
            voice_room,
            joined_at: Utc::now(),
        });
    }

    /// Removing an untracked triple is a no-op.
    pub async fn untrack_membership(
        &self,
        identity: &AccountId,
        group: &GroupRef,
        voice_room: VoiceRoomId,
    ) {
        let mut state = self.state.lock().await;
        let emptied = match state.memberships.get_mut(identity) {
            Some(records) => {
                records.retain(|record| {
                    !(record.group == *group && record.voice_room == voice_room)
                });
                records.is_empty()
            }
            None => false,
        };
        if emptied {
            state.memberships.remove(identity);
        }
    }

    pub async fn memberships_for_account(&self, identity: &AccountId) -> Vec<VoiceRoomMembership> {
        let state = self.state.lock().await;
        state.memberships.get(identity).cloned().unwrap_or_default()
    }

    pub async fn all_memberships(&self) -> HashMap<AccountId, Vec<VoiceRoomMembership>> {
        self.state.lock().await.memberships.clone()
    }

    /// Arms the auto-leave timer for the session's account, replacing any
    /// timer already armed for it. On expiry the task leaves the group
    /// best-effort, drops the tracked membership, and broadcasts completion.
    pub async fn schedule_auto_leave(
        self: &Arc<Self>,
        session: LiveSession,
        group: GroupRef,
        voice_room: Option<VoiceRoomId>,
    ) {
        let delay = {
            let state = self.state.lock().await;
            state.auto_leave_delay
        };
        if delay.is_zero() {
            debug!(account = session.account.as_str(), "auto_leave: disabled, nothing scheduled");
            return;
        }

        let tracker = Arc::clone(self);
        let identity = session.account.clone();
        let task_group = group.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let account = session.account.clone();
            info!(account = account.as_str(), group = task_group.as_str(), "auto_leave: timer fired");
            if let Err(error) = session.leave_group(&task_group).await {
                warn!(account = account.as_str(), group = task_group.as_str(), "auto_leave: leave failed, treating the group as already left: {error}");
            }
            tracker.finish_auto_leave(&account, &task_group, voice_room).await;
        });

        let previous = {
            let mut state = self.state.lock().await;
            state.pending.insert(
                identity.clone(),
                PendingAutoLeave {
                    group: group.clone(),
                    task,
                },
            )
        };
        if let Some(previous) = previous {
            previous.task.abort();
            debug!(account = identity.as_str(), "auto_leave: replaced previous timer");
        }
        info!(
            account = identity.as_str(),
            group = group.as_str(),
            delay_secs = delay.as_secs(),
            "auto_leave: scheduled"
        );
    }

    async fn finish_auto_leave(
        &self,
        identity: &AccountId,
        group: &GroupRef,
        voice_room: Option<VoiceRoomId>,
    ) {
        {
            let mut state = self.state.lock().await;
            state.pending.remove(identity);
        }
        if let Some(voice_room) = voice_room {
            self.untrack_membership(identity, group, voice_room).await;
        }
        let _ = self.events.send(FleetEvent::AutoLeaveCompleted {
            account: identity.clone(),
            group: group.clone(),
            voice_room,
        });
    }

    /// Aborts the account's outstanding timer when it targets the given
    /// group. Returns whether a timer was cancelled.
    pub async fn cancel_auto_leave(&self, identity: &AccountId, group: &GroupRef) -> bool {
        let removed = {
            let mut state = self.state.lock().await;
            let matches = state
                .pending
                .get(identity)
                .is_some_and(|pending| pending.group == *group);
            if matches {
                state.pending.remove(identity)
            } else {
                None
            }
        };
        match removed {
            Some(pending) => {
                pending.task.abort();
                info!(account = identity.as_str(), group = group.as_str(), "auto_leave: cancelled");
                let _ = self.events.send(FleetEvent::AutoLeaveCancelled {
                    account: identity.clone(),
                    group: group.clone(),
                });
                true
            }
            None => false,
        }
    }

    /// The group the account's outstanding timer targets, if any.
    pub async fn pending_auto_leave(&self, identity: &AccountId) -> Option<GroupRef> {
        let state = self.state.lock().await;
        state
            .pending
            .get(identity)
            .map(|pending| pending.group.clone())
    }

    /// Drops everything held for an account that left the pool.
    pub async fn forget_account(&self, identity: &AccountId) {
        let pending = {
            let mut state = self.state.lock().await;
            state.memberships.remove(identity);
            state.pending.remove(identity)
        };
        if let Some(pending) = pending {
            pending.task.abort();
        }
        debug!(account = identity.as_str(), "tracker: account state dropped");
    }
}
