//! Environment-variable overrides for the numeric/duration knobs in
//! [`crate::config::Config`]'s defaults, in the same `env_flags!` style
//! `codex-core::flags` uses for `OPENAI_*`.

use std::time::Duration;

use env_flags::env_flags;

env_flags! {
    pub CURSOR_API_BASE: &str = "https://api2.cursor.sh";

    pub CURSOR_REQUEST_TIMEOUT_MS: Duration = Duration::from_millis(120_000), |value| {
        value.parse().map(Duration::from_millis)
    };
    pub CURSOR_REQUEST_MAX_RETRIES: u64 = 4;

    pub CURSOR_HEARTBEAT_IDLE_MS_NOPGRS: u64 = 180_000;
    pub CURSOR_HEARTBEAT_MAX_BEATS_NOPGRS: u64 = 1_000;
    pub CURSOR_HEARTBEAT_IDLE_MS_PGRS: u64 = 120_000;
    pub CURSOR_HEARTBEAT_MAX_BEATS_PGRS: u64 = 1_000;

    pub CURSOR_SESSION_DEADLINE_MS: u64 = 120_000;
}
