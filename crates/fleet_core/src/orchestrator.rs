use std::collections::HashSet;
use std::sync::Arc;

use shared::domain::{GroupEntity, GroupRef, JoinTarget, VoiceRoomId, VoiceRoomTarget};
use shared::error::{FleetError, PlatformError};
use shared::report::{
    GroupJoinOutcome, PassSummary, SessionJoinReport, VoiceRoomOutcome, VoiceRoomPassReport,
};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Pacing;
use crate::session_manager::{LiveSession, SessionManager};
use crate::voice_tracker::VoiceRoomTracker;

/// How the voice-room leg of a join is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceJoinMode {
    /// Group only.
    Skip,
    /// Ask the group for its active voice room and join it when one exists.
    FindActive,
    /// Join this specific room after the configured pre-join delay.
    Room(VoiceRoomId),
}

/// Drives join and leave passes across the live pool, one session at a time.
pub struct Orchestrator {
    sessions: Arc<SessionManager>,
    tracker: Arc<VoiceRoomTracker>,
    pacing: Pacing,
    joined_groups: Mutex<HashSet<GroupRef>>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionManager>,
        tracker: Arc<VoiceRoomTracker>,
        pacing: Pacing,
        joined_groups: HashSet<GroupRef>,
    ) -> Self {
        Self {
            sessions,
            tracker,
            pacing,
            joined_groups: Mutex::new(joined_groups),
        }
    }

    /// Joins the group with one session, then handles the voice-room leg per
    /// `mode`. Rate limits suspend and retry the group join; admin-required
    /// and banned fail the session immediately. No bookkeeping happens here.
    pub async fn join_group(
        &self,
        session: &LiveSession,
        group: &GroupRef,
        mode: VoiceJoinMode,
    ) -> SessionJoinReport {
        let entity = match self.join_with_backoff(session, group).await {
            Ok(entity) => entity,
            Err(error) => {
                warn!(account = session.account.as_str(), group = group.as_str(), "join: group join failed: {error}");
                return SessionJoinReport {
                    account: session.account.clone(),
                    group: GroupJoinOutcome::Failed(error),
                    voice_room: None,
                };
            }
        };
        info!(
            account = session.account.as_str(),
            group = group.as_str(),
            title = entity.title.as_str(),
            "join: group joined"
        );

        let voice_room = match mode {
            VoiceJoinMode::Skip => None,
            VoiceJoinMode::FindActive => {
                Some(self.join_discovered_voice_room(session, &entity).await)
            }
            VoiceJoinMode::Room(room) => {
                sleep(self.pacing.voice_join_delay).await;
                Some(self.join_voice_room(session, &entity, room).await)
            }
        };

        SessionJoinReport {
            account: session.account.clone(),
            group: GroupJoinOutcome::Joined(entity),
            voice_room,
        }
    }

    /// Explicit loop rather than recursion: consecutive rate limits keep the
    /// stack flat and the attempt count visible in the logs.
    async fn join_with_backoff(
        &self,
        session: &LiveSession,
        group: &GroupRef,
    ) -> Result<GroupEntity, PlatformError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match group.join_target() {
                JoinTarget::Invite(hash) => session.client.import_invite(hash).await,
                JoinTarget::Reference(reference) => {
                    session.client.join_by_reference(reference).await
                }
            };
            match result {
                Err(PlatformError::RateLimited { retry_after }) => {
                    warn!(
                        account = session.account.as_str(),
                        group = group.as_str(),
                        attempt,
                        wait_secs = retry_after.as_secs(),
                        "join: rate limited, backing off"
                    );
                    sleep(retry_after).await;
                }
                other => return other,
            }
        }
    }

    /// Discovery failures degrade to "no voice room"; only an actual join
    /// attempt can produce a voice-room failure.
    async fn join_discovered_voice_room(
        &self,
        session: &LiveSession,
        entity: &GroupEntity,
    ) -> VoiceRoomOutcome {
        let room = match session.client.active_voice_room(entity).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                info!(account = session.account.as_str(), group_id = entity.id.0, "join: no active voice room");
                return VoiceRoomOutcome::NotFound;
            }
            Err(error) => {
                warn!(account = session.account.as_str(), group_id = entity.id.0, "join: voice room discovery failed: {error}");
                return VoiceRoomOutcome::NotFound;
            }
        };
        self.join_voice_room(session, entity, room).await
    }

    async fn join_voice_room(
        &self,
        session: &LiveSession,
        entity: &GroupEntity,
        room: VoiceRoomId,
    ) -> VoiceRoomOutcome {
        match session.client.join_voice_room(entity, room).await {
            Ok(()) => {
                info!(account = session.account.as_str(), voice_room = room.0, "join: voice room joined");
                VoiceRoomOutcome::Joined(room)
            }
            Err(error) => {
                warn!(account = session.account.as_str(), voice_room = room.0, "join: voice room join failed: {error}");
                VoiceRoomOutcome::Failed(error)
            }
        }
    }

    /// Joins the group with every live session. With an explicit `voice_room`
    /// each session joins that room; otherwise each session joins whatever
    /// active room the group reports. Fails fast when the pool is empty.
    pub async fn join_group_with_all(
        &self,
        group: &GroupRef,
        voice_room: Option<VoiceRoomId>,
    ) -> Result<PassSummary, FleetError> {
        let sessions = self.sessions.live_sessions().await;
        if sessions.is_empty() {
            return Err(FleetError::NoActiveSessions);
        }
        let mode = match voice_room {
            Some(room) => VoiceJoinMode::Room(room),
            None => VoiceJoinMode::FindActive,
        };
        info!(group = group.as_str(), sessions = sessions.len(), "join: starting pass");
        let summary = self.run_join_pass(&sessions, group, mode).await;
        if summary.any_succeeded() {
            self.joined_groups.lock().await.insert(group.clone());
        }
        info!(
            group = group.as_str(),
            successful = summary.successful,
            failed = summary.failed,
            "join: pass finished"
        );
        Ok(summary)
    }

    /// One sequential sweep over `sessions`. Every successful group join is
    /// recorded against the account and gets an auto-leave timer; a voice
    /// membership is tracked only when the voice leg actually joined.
    async fn run_join_pass(
        &self,
        sessions: &[LiveSession],
        group: &GroupRef,
        mode: VoiceJoinMode,
    ) -> PassSummary {
        let mut summary = PassSummary::default();
        for (index, session) in sessions.iter().enumerate() {
            let report = self.join_group(session, group, mode).await;
            if report.group_joined() {
                self.sessions.note_group_joined(&session.account, group).await;
                if let Some(room) = report.joined_voice_room() {
                    self.tracker
                        .track_membership(&session.account, group.clone(), room)
                        .await;
                }
                self.tracker
                    .schedule_auto_leave(session.clone(), group.clone(), report.joined_voice_room())
                    .await;
            }
            summary.record(report.group_joined());
            if index + 1 < sessions.len() {
                sleep(self.pacing.join_delay).await;
            }
        }
        summary
    }

    /// Leaves the group with every live session. The group is dropped from
    /// the joined set once the pass completes, whatever the per-session
    /// counts came out to.
    pub async fn leave_group_with_all(&self, group: &GroupRef) -> Result<PassSummary, FleetError> {
        let sessions = self.sessions.live_sessions().await;
        if sessions.is_empty() {
            return Err(FleetError::NoActiveSessions);
        }
        info!(group = group.as_str(), sessions = sessions.len(), "leave: starting pass");
        let mut summary = PassSummary::default();
        for (index, session) in sessions.iter().enumerate() {
            match session.leave_group(group).await {
                Ok(()) => {
                    self.sessions.note_group_left(&session.account, group).await;
                    summary.record(true);
                }
                Err(error) => {
                    warn!(account = session.account.as_str(), group = group.as_str(), "leave: failed: {error}");
                    summary.record(false);
                }
            }
            if index + 1 < sessions.len() {
                sleep(self.pacing.join_delay).await;
            }
        }
        self.joined_groups.lock().await.remove(group);
        info!(
            group = group.as_str(),
            successful = summary.successful,
            failed = summary.failed,
            "leave: pass finished"
        );
        Ok(summary)
    }

    /// Splits the live pool across several voice-room targets and runs one
    /// join pass per target. Shares are checked before any platform call, so
    /// an unsatisfiable request costs no network traffic.
    pub async fn join_voice_rooms(
        &self,
        targets: &[VoiceRoomTarget],
    ) -> Result<Vec<VoiceRoomPassReport>, FleetError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let sessions = self.sessions.live_sessions().await;
        if sessions.is_empty() {
            return Err(FleetError::NoActiveSessions);
        }
        let shares = partition_shares(sessions.len(), targets)?;

        let mut reports = Vec::with_capacity(targets.len());
        let mut cursor = 0usize;
        for (index, (target, share)) in targets.iter().zip(shares).enumerate() {
            let pool = &sessions[cursor..cursor + share];
            cursor += share;
            info!(
                group = target.group.as_str(),
                voice_room = target.voice_room.0,
                assigned = share,
                "join: voice room target starting"
            );
            let summary = self
                .run_join_pass(pool, &target.group, VoiceJoinMode::Room(target.voice_room))
                .await;
            if summary.any_succeeded() {
                self.joined_groups.lock().await.insert(target.group.clone());
            }
            reports.push(VoiceRoomPassReport {
                group: target.group.clone(),
                voice_room: target.voice_room,
                assigned: share,
                summary,
            });
            if index + 1 < targets.len() {
                sleep(self.pacing.room_switch_delay).await;
            }
        }
        Ok(reports)
    }

    pub async fn joined_groups(&self) -> Vec<GroupRef> {
        let joined = self.joined_groups.lock().await;
        let mut groups: Vec<GroupRef> = joined.iter().cloned().collect();
        groups.sort_unstable();
        groups
    }
}

/// Per-target session counts: the requested counts when the pool covers
/// them, otherwise a uniform `available / targets` share. Integer division,
/// so a share of zero means the request cannot be met at all.
fn partition_shares(available: usize, targets: &[VoiceRoomTarget]) -> Result<Vec<usize>, FleetError> {
    let requested: usize = targets.iter().map(|target| target.accounts).sum();
    if requested <= available {
        return Ok(targets.iter().map(|target| target.accounts).collect());
    }
    let share = available / targets.len();
    if share == 0 {
        return Err(FleetError::InsufficientSessions {
            available,
            targets: targets.len(),
        });
    }
    warn!(
        requested,
        available,
        share,
        "join: not enough sessions for every target, reducing shares"
    );
    Ok(vec![share; targets.len()])
}
