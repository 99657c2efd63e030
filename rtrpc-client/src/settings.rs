//! Daemon version and command-name compatibility
//!
//! rTorrent renamed most of its RPC surface in 0.9 (`d.get_name` became
//! `d.name`, `get_download_rate` became `throttle.global_down.max_rate`,
//! and so on) and later retired a few commands outright. Callers keep
//! writing the legacy mnemonics; a [`SettingsProvider`] translates them for
//! the daemon actually being talked to.
//!
//! The provider is passed explicitly to everything that needs it. There is
//! no global settings object.
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_client::{parse_version, RtorrentSettings, SettingsProvider};
//!
//! let settings = RtorrentSettings::new(parse_version("0.9.8").unwrap());
//! assert_eq!(settings.resolve("d.get_name"), "d.name");
//! assert_eq!(settings.resolve("t.get_url="), "t.url=");
//!
//! let legacy = RtorrentSettings::new(parse_version("0.8.9").unwrap());
//! assert_eq!(legacy.resolve("d.get_name"), "d.get_name");
//! ```

use crate::command::Command;
use rtrpc_core::Param;
use std::collections::HashMap;
use std::fmt;

/// Default upper bound of a multicall document, in bytes
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 512 * 1024;

/// Neutral probe command substituted for retired getters
pub const PROBE_COMMAND: &str = "cat";

/// First version with the 0.9 command names
pub const VERSION_0_9_0: u32 = 0x900;

/// Version from which the renamed command aliases are honoured
pub const VERSION_0_9_4: u32 = 0x904;

/// Version that requires `d.multicall2` and explicit load targets
pub const VERSION_0_9_7: u32 = 0x907;

/// Parse a dotted daemon version into its packed form
///
/// Every component occupies 8 bits, so `0.9.8` becomes `0x908` and
/// `0.16.2` becomes `0x1002`. Missing trailing components count as zero and
/// non-numeric suffixes such as `-rc1` are ignored.
pub fn parse_version(text: &str) -> Option<u32> {
    let parts: Vec<&str> = text.trim().split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut packed = 0u32;
    for index in 0..3 {
        let component = match parts.get(index) {
            Some(part) => {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                let value: u32 = digits.parse().ok()?;
                if value > 0xFF {
                    return None;
                }
                value
            }
            None => 0,
        };
        packed = (packed << 8) | component;
    }
    Some(packed)
}

/// Render a packed version as `major.minor.patch`
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        (version >> 16) & 0xFF,
        (version >> 8) & 0xFF,
        version & 0xFF
    )
}

/// Source of version-dependent command translation
///
/// Every method has a default so a test double only overrides what it
/// needs. Implementations must be read-only once shared.
pub trait SettingsProvider: Send + Sync + fmt::Debug {
    /// Packed daemon version (see [`parse_version`])
    fn version(&self) -> u32;

    /// API capability level reported by the daemon
    fn api_level(&self) -> u32 {
        0
    }

    /// Translate a method name into the name the daemon accepts
    fn resolve(&self, name: &str) -> String {
        name.to_string()
    }

    /// Adjust a freshly resolved command; `original` is the name the caller used
    fn patch_deprecated_command(&self, _command: &mut Command, _original: &str) {}

    /// Adjust a whole request queue before it is expanded and batched
    fn patch_deprecated_request(&self, _commands: &mut Vec<Command>) {}

    /// Upper bound of a multicall document, in bytes
    fn max_content_size(&self) -> usize {
        DEFAULT_MAX_CONTENT_SIZE
    }
}

/// A legacy name and the modern name that replaces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAlias {
    /// Name callers use
    pub legacy: String,
    /// Name sent to daemons at or above `since`
    pub modern: String,
    /// First version that requires the modern name
    pub since: u32,
}

impl CommandAlias {
    /// Create an alias
    pub fn new(legacy: impl Into<String>, modern: impl Into<String>, since: u32) -> Self {
        Self {
            legacy: legacy.into(),
            modern: modern.into(),
            since,
        }
    }
}

/// Renamed commands whose modern form takes an explicit empty target
const TARGET_PATCHES: &[(&str, u32)] = &[
    ("load.normal", VERSION_0_9_7),
    ("load.start", VERSION_0_9_7),
    ("load.verbose", VERSION_0_9_7),
    ("load.start_verbose", VERSION_0_9_7),
    ("load.raw", VERSION_0_9_7),
    ("load.raw_start", VERSION_0_9_7),
];

const RENAMED_0_9: &[(&str, &str)] = &[
    // downloads
    ("d.get_name", "d.name"),
    ("d.get_hash", "d.hash"),
    ("d.get_base_path", "d.base_path"),
    ("d.get_base_filename", "d.base_filename"),
    ("d.get_complete", "d.complete"),
    ("d.get_size_bytes", "d.size_bytes"),
    ("d.get_completed_bytes", "d.completed_bytes"),
    ("d.get_directory", "d.directory"),
    ("d.set_directory", "d.directory.set"),
    ("d.set_directory_base", "d.directory_base.set"),
    ("d.get_custom1", "d.custom1"),
    ("d.set_custom1", "d.custom1.set"),
    ("d.get_tied_to_file", "d.tied_to_file"),
    ("d.get_connection_seed", "d.connection_seed"),
    ("d.set_connection_seed", "d.connection_seed.set"),
    ("d.get_throttle_name", "d.throttle_name"),
    ("d.set_throttle_name", "d.throttle_name.set"),
    ("d.get_peer_exchange", "d.peer_exchange"),
    ("d.get_peers_max", "d.peers_max"),
    ("d.get_peers_min", "d.peers_min"),
    ("d.get_tracker_numwant", "d.tracker_numwant"),
    ("d.get_uploads_max", "d.uploads_max"),
    ("d.get_up_rate", "d.up.rate"),
    ("d.get_down_rate", "d.down.rate"),
    ("d.get_up_total", "d.up.total"),
    ("d.get_down_total", "d.down.total"),
    ("d.get_ratio", "d.ratio"),
    ("d.get_state", "d.state"),
    ("d.get_priority", "d.priority"),
    // trackers
    ("t.get_url", "t.url"),
    ("t.get_type", "t.type"),
    ("t.get_group", "t.group"),
    ("t.get_scrape_complete", "t.scrape_complete"),
    ("t.get_scrape_incomplete", "t.scrape_incomplete"),
    ("t.get_scrape_downloaded", "t.scrape_downloaded"),
    ("t.get_normal_interval", "t.normal_interval"),
    ("t.get_scrape_time_last", "t.scrape_time_last"),
    // files
    ("f.get_path", "f.path"),
    ("f.get_size_bytes", "f.size_bytes"),
    ("f.get_priority", "f.priority"),
    ("f.get_completed_chunks", "f.completed_chunks"),
    ("f.get_size_chunks", "f.size_chunks"),
    // peers
    ("p.get_id", "p.id"),
    ("p.get_address", "p.address"),
    ("p.get_port", "p.port"),
    ("p.get_client_version", "p.client_version"),
    ("p.get_completed_percent", "p.completed_percent"),
    ("p.get_down_rate", "p.down_rate"),
    ("p.get_up_rate", "p.up_rate"),
    ("p.get_down_total", "p.down_total"),
    ("p.get_up_total", "p.up_total"),
    ("p.get_peer_rate", "p.peer_rate"),
    ("p.get_peer_total", "p.peer_total"),
    // globals
    ("dht_statistics", "dht.statistics"),
    ("get_check_hash", "pieces.hash.on_completion"),
    ("get_bind", "network.bind_address"),
    ("get_dht_port", "dht.port"),
    ("get_directory", "directory.default"),
    ("get_download_rate", "throttle.global_down.max_rate"),
    ("get_upload_rate", "throttle.global_up.max_rate"),
    ("get_down_total", "throttle.global_down.total"),
    ("get_up_total", "throttle.global_up.total"),
    ("get_http_cacert", "network.http.cacert"),
    ("get_http_capath", "network.http.capath"),
    ("get_http_proxy", "network.http.proxy_address"),
    ("get_ip", "network.local_address"),
    ("get_max_downloads_div", "throttle.max_downloads.div"),
    ("get_max_downloads_global", "throttle.max_downloads.global"),
    ("get_max_file_size", "system.file.max_size"),
    ("get_max_memory_usage", "pieces.memory.max"),
    ("get_max_open_files", "network.max_open_files"),
    ("get_max_open_http", "network.http.max_open"),
    ("get_max_open_sockets", "network.max_open_sockets"),
    ("get_max_peers", "throttle.max_peers.normal"),
    ("get_max_peers_seed", "throttle.max_peers.seed"),
    ("get_max_uploads", "throttle.max_uploads"),
    ("get_max_uploads_div", "throttle.max_uploads.div"),
    ("get_max_uploads_global", "throttle.max_uploads.global"),
    ("get_min_peers", "throttle.min_peers.normal"),
    ("get_min_peers_seed", "throttle.min_peers.seed"),
    ("get_peer_exchange", "protocol.pex"),
    ("get_port_open", "network.port_open"),
    ("get_port_random", "network.port_random"),
    ("get_port_range", "network.port_range"),
    ("get_preload_min_size", "pieces.preload.min_size"),
    ("get_preload_required_rate", "pieces.preload.min_rate"),
    ("get_preload_type", "pieces.preload.type"),
    ("get_proxy_address", "network.proxy_address"),
    ("get_receive_buffer_size", "network.receive_buffer.size"),
    ("get_safe_sync", "pieces.sync.always_safe"),
    ("get_scgi_dont_route", "network.scgi.dont_route"),
    ("get_send_buffer_size", "network.send_buffer.size"),
    ("get_session", "session.path"),
    ("get_session_lock", "session.use_lock"),
    ("get_session_on_completion", "session.on_completion"),
    ("get_split_file_size", "system.file.split_size"),
    ("get_split_suffix", "system.file.split_suffix"),
    ("get_timeout_safe_sync", "pieces.sync.timeout_safe"),
    ("get_timeout_sync", "pieces.sync.timeout"),
    ("get_tracker_numwant", "trackers.numwant"),
    ("get_use_udp_trackers", "trackers.use_udp"),
];

const RENAMED_0_9_7: &[(&str, &str)] = &[
    ("d.multicall", "d.multicall2"),
    ("load", "load.normal"),
    ("load_start", "load.start"),
    ("load_verbose", "load.verbose"),
    ("load_start_verbose", "load.start_verbose"),
    ("load_raw", "load.raw"),
    ("load_raw_start", "load.raw_start"),
];

/// Built-in provider for rTorrent daemons
///
/// Holds the daemon version plus three data tables: command aliases, names
/// whose modern form needs an injected empty target, and retired commands
/// that are swapped for the neutral probe.
#[derive(Debug, Clone)]
pub struct RtorrentSettings {
    version: u32,
    api_level: u32,
    max_content_size: usize,
    aliases: HashMap<String, CommandAlias>,
    target_patches: HashMap<String, u32>,
    retired: HashMap<String, u32>,
}

impl RtorrentSettings {
    /// Settings for a daemon of the given packed version, with default tables
    pub fn new(version: u32) -> Self {
        let mut settings = Self {
            version,
            api_level: 0,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            aliases: HashMap::new(),
            target_patches: HashMap::new(),
            retired: HashMap::new(),
        };

        for (legacy, modern) in RENAMED_0_9 {
            settings.insert_alias(CommandAlias::new(*legacy, *modern, VERSION_0_9_4));
        }
        for (legacy, modern) in RENAMED_0_9_7 {
            settings.insert_alias(CommandAlias::new(*legacy, *modern, VERSION_0_9_7));
        }
        for (name, since) in TARGET_PATCHES {
            settings.target_patches.insert((*name).to_string(), *since);
        }
        settings
    }

    /// Settings with empty tables; names pass through untouched
    pub fn passthrough(version: u32) -> Self {
        Self {
            version,
            api_level: 0,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            aliases: HashMap::new(),
            target_patches: HashMap::new(),
            retired: HashMap::new(),
        }
    }

    /// Set the API capability level
    pub fn with_api_level(mut self, level: u32) -> Self {
        self.api_level = level;
        self
    }

    /// Override the multicall payload bound
    pub fn with_max_content_size(mut self, size: usize) -> Self {
        self.max_content_size = size;
        self
    }

    /// Add or replace a command alias
    pub fn with_alias(mut self, alias: CommandAlias) -> Self {
        self.insert_alias(alias);
        self
    }

    /// Mark a command as retired from the given version
    pub fn with_retired(mut self, name: impl Into<String>, since: u32) -> Self {
        self.retired.insert(name.into(), since);
        self
    }

    /// Copy of these settings for another daemon version
    pub fn for_version(&self, version: u32) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    fn insert_alias(&mut self, alias: CommandAlias) {
        self.aliases.insert(alias.legacy.clone(), alias);
    }

    fn is_retired(&self, name: &str) -> bool {
        let bare = name.strip_suffix('=').unwrap_or(name);
        self.retired
            .get(bare)
            .map_or(false, |since| self.version >= *since)
    }
}

impl Default for RtorrentSettings {
    /// Settings for 0.9.8 with default tables
    fn default() -> Self {
        Self::new(0x908)
    }
}

impl SettingsProvider for RtorrentSettings {
    fn version(&self) -> u32 {
        self.version
    }

    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn resolve(&self, name: &str) -> String {
        let (bare, suffix) = match name.strip_suffix('=') {
            Some(bare) => (bare, "="),
            None => (name, ""),
        };

        match self.aliases.get(bare) {
            Some(alias) if self.version >= alias.since => format!("{}{}", alias.modern, suffix),
            _ => name.to_string(),
        }
    }

    fn patch_deprecated_command(&self, command: &mut Command, original: &str) {
        if command.method() == original {
            return;
        }

        let needs_target = self
            .target_patches
            .get(command.method())
            .map_or(false, |since| self.version >= *since);
        let has_target = command
            .params()
            .first()
            .map_or(false, |first| first.is_string() && first.is_empty_value());

        if needs_target && !has_target {
            command.insert_parameter(0, Param::empty_target());
        }
    }

    fn patch_deprecated_request(&self, commands: &mut Vec<Command>) {
        if self.retired.is_empty() {
            return;
        }

        for command in commands.iter_mut() {
            if self.is_retired(command.method()) {
                tracing::debug!(method = %command.method(), "Replacing retired command with probe");
                *command = Command::probe();
            }
        }
    }

    fn max_content_size(&self) -> usize {
        self.max_content_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("0.9.8"), Some(0x908));
        assert_eq!(parse_version("0.16.2"), Some(0x1002));
        assert_eq!(parse_version("0.9"), Some(0x900));
        assert_eq!(parse_version(" 0.9.6-rc1 "), Some(0x906));
        assert_eq!(parse_version("0.9.256"), None);
        assert_eq!(parse_version("garbage"), None);
        assert_eq!(parse_version("1.2.3.4"), None);
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(0x908), "0.9.8");
        assert_eq!(format_version(0x1002), "0.16.2");
    }

    #[test]
    fn test_resolve_respects_version() {
        let modern = RtorrentSettings::new(0x906);
        assert_eq!(modern.resolve("d.get_name"), "d.name");
        assert_eq!(modern.resolve("get_download_rate"), "throttle.global_down.max_rate");
        // d.multicall2 only from 0.9.7
        assert_eq!(modern.resolve("d.multicall"), "d.multicall");

        let newest = RtorrentSettings::new(0x1002);
        assert_eq!(newest.resolve("d.multicall"), "d.multicall2");

        let legacy = RtorrentSettings::new(0x809);
        assert_eq!(legacy.resolve("get_download_rate"), "get_download_rate");
    }

    #[test]
    fn test_resolve_keeps_trailing_equals() {
        let settings = RtorrentSettings::default();
        assert_eq!(settings.resolve("t.get_scrape_time_last="), "t.scrape_time_last=");
        assert_eq!(settings.resolve("unknown.getter="), "unknown.getter=");
        assert_eq!(settings.resolve("cat"), "cat");
    }

    #[test]
    fn test_passthrough_has_no_aliases() {
        let settings = RtorrentSettings::passthrough(0x1002);
        assert_eq!(settings.resolve("d.get_name"), "d.get_name");
    }

    #[test]
    fn test_custom_alias_and_content_size() {
        let settings = RtorrentSettings::new(0x908)
            .with_alias(CommandAlias::new("get_name_alias", "d.name", 0x900))
            .with_max_content_size(4096)
            .with_api_level(11);
        assert_eq!(settings.resolve("get_name_alias"), "d.name");
        assert_eq!(settings.max_content_size(), 4096);
        assert_eq!(settings.api_level(), 11);
    }

    #[test]
    fn test_load_start_gets_empty_target() {
        let settings = RtorrentSettings::new(0x908);
        let command = Command::resolved(&settings, "load_start", ["http://x/a.torrent"]);
        assert_eq!(command.method(), "load.start");
        assert_eq!(command.params().len(), 2);
        assert!(command.params()[0].is_empty_value());
        assert_eq!(command.params()[1].rendered(), "http://x/a.torrent");
    }

    #[test]
    fn test_retired_commands_become_probe() {
        let settings = RtorrentSettings::new(0x908).with_retired("get_hash_interval", 0x900);
        let mut commands = vec![
            Command::new("get_hash_interval"),
            Command::new("system.client_version"),
        ];
        settings.patch_deprecated_request(&mut commands);
        assert_eq!(commands[0].method(), PROBE_COMMAND);
        assert_eq!(commands[1].method(), "system.client_version");
    }

    #[test]
    fn test_for_version_keeps_tables() {
        let settings = RtorrentSettings::new(0x809).with_max_content_size(1000);
        let upgraded = settings.for_version(0x908);
        assert_eq!(upgraded.version(), 0x908);
        assert_eq!(upgraded.max_content_size(), 1000);
        assert_eq!(upgraded.resolve("d.get_name"), "d.name");
    }
}
