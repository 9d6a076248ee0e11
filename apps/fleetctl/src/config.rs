use std::{env, fs, time::Duration};

use fleet_core::{FleetConfig, Pacing};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub accounts_file: String,
    pub join_delay_secs: u64,
    pub connect_delay_secs: u64,
    pub voice_join_delay_secs: u64,
    pub room_switch_delay_secs: u64,
    pub auto_leave_minutes: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accounts_file: "accounts.json".into(),
            join_delay_secs: 1,
            connect_delay_secs: 1,
            voice_join_delay_secs: 2,
            room_switch_delay_secs: 2,
            auto_leave_minutes: 30,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            pacing: Pacing {
                join_delay: Duration::from_secs(self.join_delay_secs),
                connect_delay: Duration::from_secs(self.connect_delay_secs),
                voice_join_delay: Duration::from_secs(self.voice_join_delay_secs),
                room_switch_delay: Duration::from_secs(self.room_switch_delay_secs),
            },
            auto_leave_delay: Duration::from_secs(self.auto_leave_minutes.saturating_mul(60)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileSettings {
    accounts_file: Option<String>,
    join_delay_secs: Option<u64>,
    connect_delay_secs: Option<u64>,
    voice_join_delay_secs: Option<u64>,
    room_switch_delay_secs: Option<u64>,
    auto_leave_minutes: Option<u64>,
    log_filter: Option<String>,
}

pub fn load_settings(config_path: &str) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        if let Ok(file_cfg) = toml::from_str::<FileSettings>(&raw) {
            if let Some(v) = file_cfg.accounts_file {
                settings.accounts_file = v;
            }
            if let Some(v) = file_cfg.join_delay_secs {
                settings.join_delay_secs = v;
            }
            if let Some(v) = file_cfg.connect_delay_secs {
                settings.connect_delay_secs = v;
            }
            if let Some(v) = file_cfg.voice_join_delay_secs {
                settings.voice_join_delay_secs = v;
            }
            if let Some(v) = file_cfg.room_switch_delay_secs {
                settings.room_switch_delay_secs = v;
            }
            if let Some(v) = file_cfg.auto_leave_minutes {
                settings.auto_leave_minutes = v;
            }
            if let Some(v) = file_cfg.log_filter {
                settings.log_filter = v;
            }
        }
    }

    if let Ok(v) = env::var("FLEETCTL_ACCOUNTS_FILE") {
        settings.accounts_file = v;
    }
    if let Ok(v) = env::var("FLEETCTL_JOIN_DELAY_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.join_delay_secs = parsed;
        }
    }
    if let Ok(v) = env::var("FLEETCTL_CONNECT_DELAY_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.connect_delay_secs = parsed;
        }
    }
    if let Ok(v) = env::var("FLEETCTL_VOICE_JOIN_DELAY_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.voice_join_delay_secs = parsed;
        }
    }
    if let Ok(v) = env::var("FLEETCTL_ROOM_SWITCH_DELAY_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.room_switch_delay_secs = parsed;
        }
    }
    if let Ok(v) = env::var("FLEETCTL_AUTO_LEAVE_MINUTES") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.auto_leave_minutes = parsed;
        }
    }
    if let Ok(v) = env::var("FLEETCTL_LOG") {
        settings.log_filter = v;
    }

    settings
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    #[test]
    fn defaults_apply_when_the_file_is_missing() {
        let settings = load_settings("/nonexistent/fleetctl.toml");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("fleetctl_test_{suffix}.toml"));
        fs::write(
            &path,
            "accounts_file = \"pool.json\"\njoin_delay_secs = 3\nauto_leave_minutes = 5\n",
        )
        .expect("write config");

        let settings = load_settings(path.to_str().expect("utf8 path"));
        assert_eq!(settings.accounts_file, "pool.json");
        assert_eq!(settings.join_delay_secs, 3);
        assert_eq!(settings.auto_leave_minutes, 5);
        assert_eq!(settings.connect_delay_secs, 1);

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn fleet_config_converts_minutes_and_seconds() {
        let settings = Settings {
            auto_leave_minutes: 2,
            voice_join_delay_secs: 7,
            ..Settings::default()
        };
        let config = settings.fleet_config();
        assert_eq!(config.auto_leave_delay, Duration::from_secs(120));
        assert_eq!(config.pacing.voice_join_delay, Duration::from_secs(7));
    }

    #[test]
    fn an_absurd_auto_leave_setting_saturates_instead_of_overflowing() {
        let settings = Settings {
            auto_leave_minutes: u64::MAX,
            ..Settings::default()
        };
        let config = settings.fleet_config();
        assert_eq!(config.auto_leave_delay, Duration::from_secs(u64::MAX));
    }
}
