use std::time::Duration;

use thiserror::Error;

use crate::domain::AccountId;

/// Error taxonomy of the platform client library, as surfaced at the
/// connection and group/voice-room operation boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("operation requires admin rights")]
    AdminRequired,
    #[error("account is banned from the target")]
    Banned,
    #[error("{0}")]
    Generic(String),
}

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("account {0} is already registered")]
    DuplicateAccount(AccountId),
    #[error("account {0} is not registered")]
    AccountNotFound(AccountId),
    #[error("no active sessions")]
    NoActiveSessions,
    #[error("{available} live sessions cannot cover {targets} voice room targets")]
    InsufficientSessions { available: usize, targets: usize },
    #[error("failed to connect {identity}: {source}")]
    ConnectFailed {
        identity: AccountId,
        source: PlatformError,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
