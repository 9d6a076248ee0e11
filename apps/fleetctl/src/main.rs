use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fleet_core::{Fleet, FleetEvent, MissingMessengerConnector};
use shared::domain::{AccountId, GroupRef, SessionToken, VoiceRoomId, VoiceRoomTarget};
use storage::CredentialStore;
use tracing::info;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Cli {
    /// Path to the TOML settings file; falls back to $FLEETCTL_CONFIG, then
    /// fleetctl.toml.
    #[arg(long)]
    config: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add an account credential to the pool.
    RegisterAccount {
        identity: String,
        /// Base64 session token to resume with.
        #[arg(long)]
        token: Option<String>,
    },
    /// Drop an account credential and everything held for it.
    RemoveAccount { identity: String },
    /// Show every account with its state and joined groups.
    Accounts,
    /// Bring up a session for every inactive account to refresh its token.
    ConnectAll,
    /// Join a group with every session in the pool.
    JoinGroup {
        group: String,
        /// Join this voice room instead of discovering the active one.
        #[arg(long)]
        voice_room: Option<i64>,
        /// Block until the auto-leave timers have fired.
        #[arg(long)]
        wait: bool,
    },
    /// Leave a group with every session in the pool.
    LeaveGroup { group: String },
    /// Split the pool across voice-room targets given as group:room:accounts.
    JoinVoiceRooms {
        targets: Vec<String>,
        /// Block until the auto-leave timers have fired.
        #[arg(long)]
        wait: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var("FLEETCTL_CONFIG").ok())
        .unwrap_or_else(|| "fleetctl.toml".to_string());
    let settings = load_settings(&config_path);
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.clone())
        .init();
    info!(accounts_file = settings.accounts_file.as_str(), "fleetctl starting");

    let fleet = Fleet::open(
        CredentialStore::new(&settings.accounts_file),
        Arc::new(MissingMessengerConnector),
        settings.fleet_config(),
    )
    .await?;

    match cli.command {
        Command::RegisterAccount { identity, token } => {
            let token = match token {
                Some(encoded) => Some(
                    SessionToken::from_encoded(&encoded)
                        .context("token is not valid base64")?,
                ),
                None => None,
            };
            fleet
                .register_account(AccountId::new(identity.clone()), token)
                .await?;
            println!("registered account {identity}");
        }
        Command::RemoveAccount { identity } => {
            fleet.remove_account(&AccountId::new(identity.clone())).await?;
            println!("removed account {identity}");
        }
        Command::Accounts => {
            let report = fleet.accounts_report().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::ConnectAll => {
            let summary = fleet.connect_all().await;
            println!("connected={} failed={}", summary.connected, summary.failed);
            fleet.disconnect_all().await;
        }
        Command::JoinGroup {
            group,
            voice_room,
            wait,
        } => {
            let summary = fleet.connect_all().await;
            println!("sessions connected={} failed={}", summary.connected, summary.failed);

            let summary = fleet
                .join_group_with_all(&GroupRef::new(group), voice_room.map(VoiceRoomId))
                .await?;
            println!("joined successful={} failed={}", summary.successful, summary.failed);

            if wait && settings.auto_leave_minutes > 0 {
                wait_for_auto_leaves(&fleet, summary.successful).await;
            }
            fleet.disconnect_all().await;
        }
        Command::LeaveGroup { group } => {
            let summary = fleet.connect_all().await;
            println!("sessions connected={} failed={}", summary.connected, summary.failed);

            let summary = fleet.leave_group_with_all(&GroupRef::new(group)).await?;
            println!("left successful={} failed={}", summary.successful, summary.failed);
            fleet.disconnect_all().await;
        }
        Command::JoinVoiceRooms { targets, wait } => {
            let targets = targets
                .iter()
                .map(|raw| parse_target(raw))
                .collect::<Result<Vec<_>>>()?;

            let summary = fleet.connect_all().await;
            println!("sessions connected={} failed={}", summary.connected, summary.failed);

            let reports = fleet.join_voice_rooms(&targets).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);

            if wait && settings.auto_leave_minutes > 0 {
                let expected = reports
                    .iter()
                    .map(|report| report.summary.successful)
                    .sum();
                wait_for_auto_leaves(&fleet, expected).await;
            }
            fleet.disconnect_all().await;
        }
    }

    Ok(())
}

async fn wait_for_auto_leaves(fleet: &Fleet, expected: usize) {
    if expected == 0 {
        return;
    }
    let mut events = fleet.subscribe_events();
    let mut fired = 0usize;
    while fired < expected {
        match events.recv().await {
            Ok(FleetEvent::AutoLeaveCompleted { account, group, .. }) => {
                println!("auto-leave completed account={account} group={group}");
                fired += 1;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

/// `group:room:accounts`, split from the right so group references may
/// themselves contain colons.
fn parse_target(raw: &str) -> Result<VoiceRoomTarget> {
    let mut parts = raw.rsplitn(3, ':');
    let accounts = parts
        .next()
        .context("target is missing an account count")?
        .parse::<usize>()
        .with_context(|| format!("bad account count in target '{raw}'"))?;
    let voice_room = parts
        .next()
        .context("target is missing a voice room id")?
        .parse::<i64>()
        .with_context(|| format!("bad voice room id in target '{raw}'"))?;
    let group = parts.next().unwrap_or_default();
    if group.is_empty() {
        bail!("target '{raw}' is missing a group reference");
    }
    Ok(VoiceRoomTarget {
        group: GroupRef::new(group),
        voice_room: VoiceRoomId(voice_room),
        accounts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_reference_target() {
        let target = parse_target("@listeners:77:3").expect("parse");
        assert_eq!(target.group, GroupRef::new("@listeners"));
        assert_eq!(target.voice_room, VoiceRoomId(77));
        assert_eq!(target.accounts, 3);
    }

    #[test]
    fn parses_an_invite_link_target_with_colons() {
        let target = parse_target("https://t.me/+AbC123:12:2").expect("parse");
        assert_eq!(target.group, GroupRef::new("https://t.me/+AbC123"));
        assert_eq!(target.voice_room, VoiceRoomId(12));
        assert_eq!(target.accounts, 2);
    }

    #[test]
    fn rejects_targets_without_all_three_parts() {
        assert!(parse_target("@listeners:77").is_err());
        assert!(parse_target("@listeners").is_err());
        assert!(parse_target(":77:3").is_err());
    }
}
