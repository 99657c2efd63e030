//! Legacy pseudo-command expansion
//!
//! Two client-side mnemonics predate the multicall helpers and are still
//! queued by callers:
//!
//! - `trk <hash>`: tracker summary, one `t.multicall` over nine getters
//! - `stg`: settings summary, `dht_statistics` followed by 48 global getters
//!
//! Expansion replaces each pseudo-command in place, so its position
//! relative to the other queued commands is preserved. All other commands
//! pass through untouched.

use crate::command::Command;
use crate::settings::{SettingsProvider, PROBE_COMMAND, VERSION_0_9_0};
use rtrpc_core::ParamKind;

/// Tracker-summary pseudo-command
pub const TRACKER_SUMMARY: &str = "trk";

/// Settings-summary pseudo-command
pub const SETTINGS_SUMMARY: &str = "stg";

/// Getters of the tracker summary, in response order
pub const TRACKER_FIELDS: [&str; 9] = [
    "t.get_url=",
    "t.get_type=",
    "t.is_enabled=",
    "t.get_group=",
    "t.get_scrape_complete=",
    "t.get_scrape_incomplete=",
    "t.get_scrape_downloaded=",
    "t.get_normal_interval=",
    "t.get_scrape_time_last=",
];

/// Getters of the settings summary, in response order
pub const SETTINGS_FIELDS: [&str; 48] = [
    "get_check_hash",
    "get_bind",
    "get_dht_port",
    "get_directory",
    "get_download_rate",
    "get_hash_interval",
    "get_hash_max_tries",
    "get_hash_read_ahead",
    "get_http_cacert",
    "get_http_capath",
    "get_http_proxy",
    "get_ip",
    "get_max_downloads_div",
    "get_max_downloads_global",
    "get_max_file_size",
    "get_max_memory_usage",
    "get_max_open_files",
    "get_max_open_http",
    "get_max_peers",
    "get_max_peers_seed",
    "get_max_uploads",
    "get_max_uploads_global",
    "get_min_peers_seed",
    "get_min_peers",
    "get_peer_exchange",
    "get_port_open",
    "get_upload_rate",
    "get_port_random",
    "get_port_range",
    "get_preload_min_size",
    "get_preload_required_rate",
    "get_preload_type",
    "get_proxy_address",
    "get_receive_buffer_size",
    "get_safe_sync",
    "get_scgi_dont_route",
    "get_send_buffer_size",
    "get_session",
    "get_session_lock",
    "get_session_on_completion",
    "get_split_file_size",
    "get_split_suffix",
    "get_timeout_safe_sync",
    "get_timeout_sync",
    "get_tracker_numwant",
    "get_use_udp_trackers",
    "get_max_uploads_div",
    "get_max_open_sockets",
];

/// Positions in [`SETTINGS_FIELDS`] of the hash getters removed in 0.9
pub const RETIRED_HASH_GETTERS: [usize; 3] = [5, 6, 7];

/// Whether a queued command is a pseudo-command
pub fn is_pseudo_command(command: &Command) -> bool {
    matches!(command.method(), TRACKER_SUMMARY | SETTINGS_SUMMARY)
}

/// Expand every pseudo-command in `commands`, keeping queue order
pub fn expand_legacy(settings: &dyn SettingsProvider, commands: Vec<Command>) -> Vec<Command> {
    if !commands.iter().any(is_pseudo_command) {
        return commands;
    }

    let mut expanded = Vec::with_capacity(commands.len() + SETTINGS_FIELDS.len());
    for command in commands {
        match command.method() {
            TRACKER_SUMMARY => expanded.push(expand_tracker_summary(settings, &command)),
            SETTINGS_SUMMARY => expanded.extend(expand_settings_summary(settings)),
            _ => expanded.push(command),
        }
    }
    expanded
}

/// `trk <hash>` as one tracker multicall
///
/// The hash is the first parameter of the pseudo-command, or the empty
/// string when none was given.
pub fn expand_tracker_summary(settings: &dyn SettingsProvider, command: &Command) -> Command {
    let hash = command
        .params()
        .first()
        .map(|param| param.rendered().to_string())
        .unwrap_or_default();

    let mut multicall = Command::resolved(settings, "t.multicall", std::iter::empty::<&str>());
    multicall.add_typed_parameter(ParamKind::String, hash);
    multicall.add_typed_parameter(ParamKind::String, "");
    for field in TRACKER_FIELDS {
        multicall.add_typed_parameter(ParamKind::String, settings.resolve(field));
    }
    multicall
}

/// `stg` as the DHT statistics call plus one command per settings getter
///
/// From 0.9 on, the three hash getters no longer exist and are replaced by
/// the probe command so the response keeps its shape.
pub fn expand_settings_summary(settings: &dyn SettingsProvider) -> Vec<Command> {
    let retire_hash_getters = settings.version() >= VERSION_0_9_0;

    let mut commands = Vec::with_capacity(SETTINGS_FIELDS.len() + 1);
    commands.push(Command::resolved(settings, "dht_statistics", std::iter::empty::<&str>()));
    for (index, field) in SETTINGS_FIELDS.iter().enumerate() {
        let name = if retire_hash_getters && RETIRED_HASH_GETTERS.contains(&index) {
            PROBE_COMMAND
        } else {
            *field
        };
        commands.push(Command::resolved(settings, name, std::iter::empty::<&str>()));
    }
    commands
}
