use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, GroupEntity, GroupRef, VoiceRoomId};
use crate::error::PlatformError;

#[derive(Debug, Clone)]
pub enum GroupJoinOutcome {
    Joined(GroupEntity),
    Failed(PlatformError),
}

#[derive(Debug, Clone)]
pub enum VoiceRoomOutcome {
    Joined(VoiceRoomId),
    NotFound,
    Failed(PlatformError),
}

/// Outcome of one session's join attempt. The group and voice-room legs are
/// reported independently: a failed voice-room join never invalidates a
/// successful group join.
#[derive(Debug, Clone)]
pub struct SessionJoinReport {
    pub account: AccountId,
    pub group: GroupJoinOutcome,
    pub voice_room: Option<VoiceRoomOutcome>,
}

impl SessionJoinReport {
    pub fn group_joined(&self) -> bool {
        matches!(self.group, GroupJoinOutcome::Joined(_))
    }

    pub fn joined_voice_room(&self) -> Option<VoiceRoomId> {
        match self.voice_room {
            Some(VoiceRoomOutcome::Joined(room)) => Some(room),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub successful: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn any_succeeded(&self) -> bool {
        self.successful > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectSummary {
    pub connected: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRoomPassReport {
    pub group: GroupRef,
    pub voice_room: VoiceRoomId,
    pub assigned: usize,
    pub summary: PassSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub identity: AccountId,
    pub active: bool,
    pub joined_groups: Vec<GroupRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsReport {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub accounts: Vec<AccountStatus>,
}
