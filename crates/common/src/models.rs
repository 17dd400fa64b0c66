use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An IP-catching script deployed on a server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Script {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub state_file: String,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
}

/// A host running one or more scripts. Credentials are never printed.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub scripts: Vec<Script>,
}

fn default_ssh_port() -> u16 {
    22
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("scripts", &self.scripts)
            .finish_non_exhaustive()
    }
}

/// Cached status of a single script, as stored under `status_cache`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScriptStatus {
    #[serde(default)]
    pub server_id: i64,
    #[serde(default)]
    pub script_id: i64,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub script_name: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub cycles: u64,
    #[serde(default)]
    pub success: u64,
    #[serde(default)]
    pub last_ip: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A floating IP reported by VK Cloud.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FloatingIp {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fixed_ip: Option<String>,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub attached: bool,
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Cloud-side view of one script's project, as stored under `cloud_cache`
/// and returned by `/api/cloud/{server_id}/{script_id}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProjectCache {
    #[serde(default)]
    pub ips: Vec<FloatingIp>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// VK Cloud credentials of one project, as stored under `projects`.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("auth_url", &self.auth_url)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

/// Floating IPs of a configured project, keyed by project name under `projects_cache`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProjectIps {
    #[serde(default)]
    pub ips: Vec<FloatingIp>,
    #[serde(default)]
    pub error: Option<String>,
    /// Real project name on the VK Cloud side, when it differs.
    #[serde(default)]
    pub os_project_name: Option<String>,
}

/// Last journal tail fetched for a script, keyed by cache key under `logs_cache`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CachedLog {
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub time: Option<String>,
}

/// A customer renting floating IPs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tenant {
    pub name: String,
    #[serde(default)]
    pub ips: Vec<String>,
}

/// Marks an account as for sale (`sales`) or a project as for rent (`rentals`).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Listing {
    #[serde(default)]
    pub updated: Option<String>,
}

/// Answer of `GET /api/status`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub status_cache: HashMap<String, ScriptStatus>,
    #[serde(default)]
    pub last_update: Option<String>,
}

impl StatusSnapshot {
    pub fn running_count(&self) -> usize {
        self.status_cache.values().filter(|s| s.running).count()
    }
}

/// Answer of `POST /api/refresh`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RefreshSummary {
    pub ok: bool,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Answer of `POST /api/cloud/refresh` and `POST /api/projects/refresh`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CloudRefreshSummary {
    pub ok: bool,
    #[serde(default)]
    pub total_ips: u64,
    #[serde(default)]
    pub attached: u64,
    #[serde(default)]
    pub free: u64,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Answer of `GET /api/status/{server_id}/{script_id}`, read live over SSH.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LiveScriptStatus {
    pub server_id: i64,
    pub script_id: i64,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub cycles: u64,
    #[serde(default)]
    pub success: u64,
    #[serde(default)]
    pub last_ip: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScriptAction {
    Start,
    Stop,
    Restart,
}

impl ScriptAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptAction::Start => "start",
            ScriptAction::Stop => "stop",
            ScriptAction::Restart => "restart",
        }
    }
}

impl fmt::Display for ScriptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ScriptAction::Start),
            "stop" => Ok(ScriptAction::Stop),
            "restart" => Ok(ScriptAction::Restart),
            other => Err(format!("Invalid action: {other}")),
        }
    }
}

/// Answer of `POST /servers/{server_id}/scripts/{script_id}/{action}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScriptActionOutcome {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub action: Option<ScriptAction>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Answer of `GET /api/logs/{server_id}/{script_id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScriptLogs {
    pub ok: bool,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub lines: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub server_id: i64,
    pub script_id: i64,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Answer of `POST /api/logs/all`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AllLogs {
    pub ok: bool,
    #[serde(default)]
    pub results: Vec<LogEntry>,
    #[serde(default)]
    pub lines: u32,
}

/// Generic `{"ok", "message", "error"}` answer of the panel's control endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PanelReply {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PanelReply {
    /// The text worth showing to the operator.
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}

/// Answer of `POST /api/scripts/{server_id}/{script_id}/change-project`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectChange {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectRef {
    pub name: String,
    pub username: String,
}

/// Answer of `POST /api/projects/add`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddedProject {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Answer of the sale and rent toggles; the backend names the flag
/// `for_sale` or `for_rent`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListingToggle {
    pub ok: bool,
    #[serde(default, alias = "for_sale", alias = "for_rent")]
    pub listed: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Answer of `POST /api/pricing`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PricingUpdate {
    pub ok: bool,
    #[serde(default)]
    pub sale_per_ip: i64,
    #[serde(default)]
    pub rent_per_ip: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub sale_per_ip: i64,
    pub rent_per_ip: i64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            sale_per_ip: 30000,
            rent_per_ip: 500,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Malformed cache key: {0}")]
pub struct CacheKeyError(pub String);

/// Key of the backend's per-script caches, written as `"{server_id}-{script_id}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub server_id: i64,
    pub script_id: i64,
}

impl CacheKey {
    pub fn new(server_id: i64, script_id: i64) -> Self {
        Self {
            server_id,
            script_id,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.server_id, self.script_id)
    }
}

impl FromStr for CacheKey {
    type Err = CacheKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (server, script) = s
            .split_once('-')
            .ok_or_else(|| CacheKeyError(s.to_string()))?;
        let server_id = server.parse().map_err(|_| CacheKeyError(s.to_string()))?;
        let script_id = script.parse().map_err(|_| CacheKeyError(s.to_string()))?;
        Ok(Self::new(server_id, script_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_format_and_parse() {
        let key = CacheKey::new(3, 17);
        assert_eq!(key.to_string(), "3-17");
        assert_eq!("3-17".parse::<CacheKey>(), Ok(key));
    }

    #[test]
    fn test_cache_key_rejects_garbage() {
        assert!("3".parse::<CacheKey>().is_err());
        assert!("a-1".parse::<CacheKey>().is_err());
        assert!("1-2-3".parse::<CacheKey>().is_err());
    }

    #[test]
    fn test_status_snapshot_tolerates_partial_entries() {
        let snapshot: StatusSnapshot = serde_json::from_value(json!({
            "status_cache": {
                "1-1": { "server_id": 1, "script_id": 1, "running": true, "cycles": 42 },
                "1-2": {}
            },
            "last_update": "2026-01-02T03:04:05Z"
        }))
        .unwrap();

        assert_eq!(snapshot.status_cache.len(), 2);
        assert_eq!(snapshot.running_count(), 1);
        assert_eq!(snapshot.status_cache["1-1"].cycles, 42);
        assert_eq!(snapshot.status_cache["1-2"], ScriptStatus::default());
    }

    #[test]
    fn test_script_action_parse() {
        assert_eq!("restart".parse::<ScriptAction>(), Ok(ScriptAction::Restart));
        assert!("reboot".parse::<ScriptAction>().is_err());
        assert_eq!(
            serde_json::to_value(ScriptAction::Stop).unwrap(),
            json!("stop")
        );
    }

    #[test]
    fn test_floating_ip_tolerates_null_fields() {
        let cache: ProjectCache = serde_json::from_value(json!({
            "ips": [
                { "ip": "1.1.1.1", "id": null },
                { "ip": null, "id": "fip-2", "attached": true }
            ]
        }))
        .unwrap();

        assert_eq!(cache.ips[0].ip.as_deref(), Some("1.1.1.1"));
        assert!(cache.ips[0].id.is_none());
        assert!(cache.ips[1].ip.is_none());
        assert!(cache.ips[1].attached);
    }

    #[test]
    fn test_listing_toggle_reads_either_flag() {
        let sale: ListingToggle = serde_json::from_value(json!({ "ok": true, "for_sale": true })).unwrap();
        let rent: ListingToggle = serde_json::from_value(json!({ "ok": true, "for_rent": false })).unwrap();
        assert!(sale.listed);
        assert!(!rent.listed);
    }

    #[test]
    fn test_panel_reply_text() {
        let ok: PanelReply = serde_json::from_value(json!({ "ok": true, "message": "done" })).unwrap();
        let failed: PanelReply =
            serde_json::from_value(json!({ "ok": false, "error": "Tenant not found" })).unwrap();
        assert_eq!(ok.text(), "done");
        assert_eq!(failed.text(), "Tenant not found");
    }

    #[test]
    fn test_project_debug_hides_password() {
        let project: Project = serde_json::from_value(json!({
            "name": "mcs1a2b3c4d",
            "username": "ops@example.com",
            "password": "hunter2",
            "project_id": "1a2b3c4d5e"
        }))
        .unwrap();
        assert!(!format!("{project:?}").contains("hunter2"));
    }

    #[test]
    fn test_server_debug_hides_credentials() {
        let server: Server = serde_json::from_value(json!({
            "id": 1,
            "name": "edge-1",
            "host": "10.0.0.1",
            "user": "root",
            "password": "hunter2"
        }))
        .unwrap();

        assert_eq!(server.port, 22);
        assert!(!format!("{server:?}").contains("hunter2"));
    }
}
