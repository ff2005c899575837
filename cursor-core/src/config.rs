//! Runtime configuration. Every knob has a `Default` matching the documented
//! spec defaults and can be overridden via the `CURSOR_*` environment
//! variables in [`crate::flags`], mirroring how `codex-core::Config` layers
//! explicit fields over `env_flags!`-sourced defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::flags::CURSOR_API_BASE;
use crate::flags::CURSOR_HEARTBEAT_IDLE_MS_NOPGRS;
use crate::flags::CURSOR_HEARTBEAT_IDLE_MS_PGRS;
use crate::flags::CURSOR_HEARTBEAT_MAX_BEATS_NOPGRS;
use crate::flags::CURSOR_HEARTBEAT_MAX_BEATS_PGRS;
use crate::flags::CURSOR_REQUEST_TIMEOUT_MS;
use crate::flags::CURSOR_SESSION_DEADLINE_MS;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub workspace_path: PathBuf,
    pub request_timeout: Duration,
    pub session_deadline: Duration,
    pub heartbeat_idle_ms_nopgrs: u64,
    pub heartbeat_max_beats_nopgrs: u64,
    pub heartbeat_idle_ms_pgrs: u64,
    pub heartbeat_max_beats_pgrs: u64,
    pub debug: bool,
    pub timing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: CURSOR_API_BASE.to_string(),
            workspace_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            request_timeout: *CURSOR_REQUEST_TIMEOUT_MS,
            session_deadline: Duration::from_millis(*CURSOR_SESSION_DEADLINE_MS),
            heartbeat_idle_ms_nopgrs: *CURSOR_HEARTBEAT_IDLE_MS_NOPGRS,
            heartbeat_max_beats_nopgrs: *CURSOR_HEARTBEAT_MAX_BEATS_NOPGRS,
            heartbeat_idle_ms_pgrs: *CURSOR_HEARTBEAT_IDLE_MS_PGRS,
            heartbeat_max_beats_pgrs: *CURSOR_HEARTBEAT_MAX_BEATS_PGRS,
            debug: false,
            timing: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let cfg = Config::default();
        assert_eq!(cfg.base_url, "https://api2.cursor.sh");
        assert_eq!(cfg.request_timeout, Duration::from_millis(120_000));
        assert_eq!(cfg.heartbeat_idle_ms_nopgrs, 180_000);
        assert_eq!(cfg.heartbeat_max_beats_nopgrs, 1_000);
        assert_eq!(cfg.heartbeat_idle_ms_pgrs, 120_000);
        assert_eq!(cfg.heartbeat_max_beats_pgrs, 1_000);
    }
}
