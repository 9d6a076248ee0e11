use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use messaging_integration::{MessengerClient, MessengerConnector};
use shared::domain::{AccountId, AccountRecord, GroupRef, SessionToken};
use shared::error::{FleetError, PlatformError};
use shared::report::{AccountStatus, AccountsReport, ConnectSummary};
use storage::CredentialStore;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A connected account handed out to callers. Cloning shares the underlying
/// client handle.
#[derive(Clone)]
pub struct LiveSession {
    pub account: AccountId,
    pub client: Arc<dyn MessengerClient>,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LiveSession({})", self.account)
    }
}

impl LiveSession {
    /// Leaves the dialog behind `group`, resolving the reference first since
    /// the platform wants an entity, not a link.
    pub async fn leave_group(&self, group: &GroupRef) -> Result<(), PlatformError> {
        let entity = self.client.resolve_group(group.as_str()).await?;
        self.client.leave_dialog(&entity).await?;
        info!(account = self.account.as_str(), group = group.as_str(), "session: left group");
        Ok(())
    }
}

struct ManagerState {
    records: Vec<AccountRecord>,
    live: HashMap<AccountId, Arc<dyn MessengerClient>>,
}

/// Owns the credential records and the live client handles. Records and the
/// live map sit behind one lock so `active` flags and handles never disagree.
pub struct SessionManager {
    store: CredentialStore,
    connector: Arc<dyn MessengerConnector>,
    connect_delay: Duration,
    state: Mutex<ManagerState>,
}

impl SessionManager {
    /// Loads the credential store and starts with an empty live set. Records
    /// persisted as active by a previous run are flagged back to inactive;
    /// no connection survives a restart.
    pub async fn initialize(
        store: CredentialStore,
        connector: Arc<dyn MessengerConnector>,
        connect_delay: Duration,
    ) -> anyhow::Result<Arc<Self>> {
        let mut records = store.load().await?;
        let stale = records.iter().filter(|record| record.active).count();
        if stale > 0 {
            for record in &mut records {
                record.active = false;
            }
            if let Err(error) = store.save(&records).await {
                warn!("session: could not persist cleared active flags: {error:#}");
            }
            info!(stale, "session: cleared active flags left by a previous run");
        }
        info!(accounts = records.len(), store = %store.path().display(), "session: pool loaded");
        Ok(Arc::new(Self {
            store,
            connector,
            connect_delay,
            state: Mutex::new(ManagerState {
                records,
                live: HashMap::new(),
            }),
        }))
    }

    /// Adds a credential to the pool without connecting it. A failed store
    /// write leaves the pool as it was.
    pub async fn register_account(
        &self,
        identity: AccountId,
        token: Option<SessionToken>,
    ) -> Result<(), FleetError> {
        let mut state = self.state.lock().await;
        if state.records.iter().any(|record| record.identity == identity) {
            return Err(FleetError::DuplicateAccount(identity));
        }
        state.records.push(AccountRecord::new(identity.clone(), token));
        if let Err(error) = self.store.save(&state.records).await {
            state.records.pop();
            return Err(error.into());
        }
        info!(account = identity.as_str(), "session: account registered");
        Ok(())
    }

    /// Drops the credential and tears down its live session if one exists.
    /// Teardown failures do not keep the record alive, but a failed store
    /// write does: the record and any live handle stay exactly as they were.
    pub async fn remove_account(&self, identity: &AccountId) -> Result<(), FleetError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(position) = state
            .records
            .iter()
            .position(|record| &record.identity == identity)
        else {
            return Err(FleetError::AccountNotFound(identity.clone()));
        };
        let removed = state.records.remove(position);
        if let Err(error) = self.store.save(&state.records).await {
            state.records.insert(position, removed);
            return Err(error.into());
        }
        if let Some(client) = state.live.remove(identity) {
            if let Err(error) = client.disconnect().await {
                warn!(account = identity.as_str(), "session: teardown during removal failed: {error}");
            }
        }
        info!(account = identity.as_str(), "session: account removed");
        Ok(())
    }

    /// Connects one account. On success the record goes active, the refreshed
    /// token is persisted, and the live handle replaces any previous one. On
    /// failure the record is flagged inactive.
    pub async fn connect(&self, identity: &AccountId) -> Result<LiveSession, FleetError> {
        let token = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(record) = state
                .records
                .iter_mut()
                .find(|record| &record.identity == identity)
            else {
                return Err(FleetError::AccountNotFound(identity.clone()));
            };
            let token = record.token.clone();
            // Reconnect path: the replaced handle and its active flag go
            // together, while the lock is still held.
            if let Some(previous) = state.live.remove(identity) {
                record.active = false;
                if let Err(error) = previous.disconnect().await {
                    warn!(account = identity.as_str(), "session: teardown of replaced handle failed: {error}");
                }
                if let Err(error) = self.store.save(&state.records).await {
                    warn!(account = identity.as_str(), "session: could not persist replaced handle state: {error:#}");
                }
            }
            token
        };

        match self.connector.connect(identity, token.as_ref()).await {
            Ok(connected) => {
                let mut guard = self.state.lock().await;
                let state = &mut *guard;
                let Some(record) = state
                    .records
                    .iter_mut()
                    .find(|record| &record.identity == identity)
                else {
                    // Removed while the connect was in flight.
                    if let Err(error) = connected.client.disconnect().await {
                        warn!(account = identity.as_str(), "session: teardown of orphaned connect failed: {error}");
                    }
                    return Err(FleetError::AccountNotFound(identity.clone()));
                };
                record.token = Some(connected.session_token.clone());
                record.active = true;
                state
                    .live
                    .insert(identity.clone(), Arc::clone(&connected.client));
                if let Err(error) = self.store.save(&state.records).await {
                    warn!(account = identity.as_str(), "session: could not persist refreshed token: {error:#}");
                }
                info!(account = identity.as_str(), "session: connected");
                Ok(LiveSession {
                    account: identity.clone(),
                    client: connected.client,
                })
            }
            Err(source) => {
                let mut guard = self.state.lock().await;
                let state = &mut *guard;
                if let Some(record) = state
                    .records
                    .iter_mut()
                    .find(|record| &record.identity == identity)
                {
                    record.active = false;
                    if let Err(error) = self.store.save(&state.records).await {
                        warn!(account = identity.as_str(), "session: could not persist state after failed connect: {error:#}");
                    }
                }
                warn!(account = identity.as_str(), "session: connect failed: {source}");
                Err(FleetError::ConnectFailed {
                    identity: identity.clone(),
                    source,
                })
            }
        }
    }

    /// Brings up every inactive account in stored order, one at a time with
    /// `connect_delay` between attempts. Failures are tallied, not fatal.
    pub async fn connect_all(&self) -> ConnectSummary {
        let idle: Vec<AccountId> = {
            let state = self.state.lock().await;
            state
                .records
                .iter()
                .filter(|record| !record.active)
                .map(|record| record.identity.clone())
                .collect()
        };
        if idle.is_empty() {
            info!("session: no inactive accounts to connect");
            return ConnectSummary::default();
        }

        let mut summary = ConnectSummary::default();
        for (index, identity) in idle.iter().enumerate() {
            match self.connect(identity).await {
                Ok(_) => summary.connected += 1,
                Err(error) => {
                    warn!(account = identity.as_str(), "session: bring-up failed: {error}");
                    summary.failed += 1;
                }
            }
            if index + 1 < idle.len() {
                tokio::time::sleep(self.connect_delay).await;
            }
        }
        info!(
            connected = summary.connected,
            failed = summary.failed,
            "session: connect pass finished"
        );
        summary
    }

    /// Tears down one live session and flags the record inactive. The record
    /// itself stays in the pool.
    pub async fn disconnect(&self, identity: &AccountId) -> Result<(), FleetError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if !state
            .records
            .iter()
            .any(|record| &record.identity == identity)
        {
            return Err(FleetError::AccountNotFound(identity.clone()));
        }
        if let Some(client) = state.live.remove(identity) {
            if let Err(error) = client.disconnect().await {
                warn!(account = identity.as_str(), "session: teardown failed: {error}");
            }
        }
        if let Some(record) = state
            .records
            .iter_mut()
            .find(|record| &record.identity == identity)
        {
            record.active = false;
        }
        if let Err(error) = self.store.save(&state.records).await {
            warn!(account = identity.as_str(), "session: could not persist disconnect: {error:#}");
        }
        info!(account = identity.as_str(), "session: disconnected");
        Ok(())
    }

    /// Tears down every live session. Teardown errors are logged and
    /// swallowed; the pool always ends fully inactive.
    pub async fn disconnect_all(&self) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let count = state.live.len();
        for (identity, client) in state.live.drain() {
            if let Err(error) = client.disconnect().await {
                warn!(account = identity.as_str(), "session: teardown failed: {error}");
            }
        }
        for record in &mut state.records {
            record.active = false;
        }
        if let Err(error) = self.store.save(&state.records).await {
            warn!("session: could not persist shutdown state: {error:#}");
        }
        info!(disconnected = count, "session: all sessions disconnected");
    }

    /// Snapshot of the live pool in stored-account order. Later connects and
    /// disconnects do not affect a snapshot already taken.
    pub async fn live_sessions(&self) -> Vec<LiveSession> {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .filter(|record| record.active)
            .filter_map(|record| {
                state.live.get(&record.identity).map(|client| LiveSession {
                    account: record.identity.clone(),
                    client: Arc::clone(client),
                })
            })
            .collect()
    }

    pub async fn accounts_report(&self) -> AccountsReport {
        let state = self.state.lock().await;
        let accounts: Vec<AccountStatus> = state
            .records
            .iter()
            .map(|record| AccountStatus {
                identity: record.identity.clone(),
                active: record.active,
                joined_groups: record.joined_groups.clone(),
            })
            .collect();
        let active = accounts.iter().filter(|status| status.active).count();
        AccountsReport {
            total: accounts.len(),
            active,
            inactive: accounts.len() - active,
            accounts,
        }
    }

    /// Every group any account believes it has joined, for seeding the
    /// orchestrator's joined set at startup.
    pub async fn joined_groups_union(&self) -> HashSet<GroupRef> {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .flat_map(|record| record.joined_groups.iter().cloned())
            .collect()
    }

    pub(crate) async fn note_group_joined(&self, identity: &AccountId, group: &GroupRef) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(record) = state
            .records
            .iter_mut()
            .find(|record| &record.identity == identity)
        else {
            return;
        };
        if record.joined_groups.iter().any(|joined| joined == group) {
            return;
        }
        record.joined_groups.push(group.clone());
        if let Err(error) = self.store.save(&state.records).await {
            warn!(account = identity.as_str(), "session: could not persist joined group: {error:#}");
        }
    }

    pub(crate) async fn note_group_left(&self, identity: &AccountId, group: &GroupRef) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(record) = state
            .records
            .iter_mut()
            .find(|record| &record.identity == identity)
        else {
            return;
        };
        record.joined_groups.retain(|joined| joined != group);
        if let Err(error) = self.store.save(&state.records).await {
            warn!(account = identity.as_str(), "session: could not persist left group: {error:#}");
        }
    }
}
