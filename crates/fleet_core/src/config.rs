use std::time::Duration;

/// Default grace period before an auto-leave timer fires.
pub const DEFAULT_AUTO_LEAVE: Duration = Duration::from_secs(30 * 60);

/// Delays inserted between platform calls so the pool does not hammer the
/// backend. All passes are strictly sequential; these are the gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between consecutive sessions in a join or leave pass.
    pub join_delay: Duration,
    /// Between consecutive session bring-ups in `connect_all`.
    pub connect_delay: Duration,
    /// Before joining an explicitly named voice room.
    pub voice_join_delay: Duration,
    /// Between targets in a multi-room pass.
    pub room_switch_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            join_delay: Duration::from_secs(1),
            connect_delay: Duration::from_secs(1),
            voice_join_delay: Duration::from_secs(2),
            room_switch_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetConfig {
    pub pacing: Pacing,
    /// Grace period for auto-leave timers. Zero disables scheduling.
    pub auto_leave_delay: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            auto_leave_delay: DEFAULT_AUTO_LEAVE,
        }
    }
}
