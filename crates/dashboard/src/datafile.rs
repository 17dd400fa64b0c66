use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use vkpanel_common::{
    CacheKey, CachedLog, Listing, Pricing, Project, ProjectCache, ProjectIps, Script, ScriptStatus,
    Server, Tenant,
};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PanelData {
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub status_cache: HashMap<String, ScriptStatus>,
    #[serde(default)]
    pub cloud_cache: HashMap<String, ProjectCache>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub cloud_last_update: Option<String>,
    #[serde(default)]
    pub projects_last_update: Option<String>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub projects_cache: HashMap<String, ProjectIps>,
    #[serde(default)]
    pub logs_cache: HashMap<String, CachedLog>,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub sales: HashMap<String, Listing>,
    #[serde(default)]
    pub rentals: HashMap<String, Listing>,
}

impl PanelData {
    /// Loads the data file. A missing or unreadable file yields empty data.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = ?path, "Data file not found, starting with empty data.");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                error!(path = ?path, error = %e, "Failed to read data file.");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(data) => data,
            Err(e) => {
                error!(path = ?path, error = %e, "Failed to parse data file.");
                Self::default()
            }
        }
    }

    pub fn server(&self, server_id: i64) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == server_id)
    }

    pub fn script<'a>(&self, server: &'a Server, script_id: i64) -> Option<&'a Script> {
        server.scripts.iter().find(|s| s.id == script_id)
    }

    pub fn cached_status(&self, server_id: i64, script_id: i64) -> Option<&ScriptStatus> {
        self.status_cache
            .get(&CacheKey::new(server_id, script_id).to_string())
    }

    pub fn cached_cloud(&self, server_id: i64, script_id: i64) -> Option<&ProjectCache> {
        self.cloud_cache
            .get(&CacheKey::new(server_id, script_id).to_string())
    }

    /// Stamp of the last status refresh, or of the last cloud refresh if statuses were never polled.
    pub fn last_update(&self) -> Option<&str> {
        self.last_update
            .as_deref()
            .or(self.cloud_last_update.as_deref())
    }

    pub fn pricing(&self) -> Pricing {
        self.pricing.unwrap_or_default()
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn project_ips(&self, name: &str) -> Option<&ProjectIps> {
        self.projects_cache.get(name)
    }

    pub fn cached_log(&self, server_id: i64, script_id: i64) -> Option<&CachedLog> {
        self.logs_cache
            .get(&CacheKey::new(server_id, script_id).to_string())
    }

    pub fn tenant(&self, name: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|t| t.name == name)
    }

    /// The tenant currently renting `ip`, if any.
    pub fn tenant_of(&self, ip: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|t| t.ips.iter().any(|i| i == ip))
    }

    pub fn is_for_sale(&self, username: &str) -> bool {
        self.sales.contains_key(username)
    }

    pub fn is_for_rent(&self, project: &str) -> bool {
        self.rentals.contains_key(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_data(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_yields_empty_data() {
        let dir = tempfile::tempdir().unwrap();
        let data = PanelData::load(dir.path().join("data.json"));
        assert!(data.servers.is_empty());
        assert!(data.last_update().is_none());
        assert_eq!(data.pricing(), Pricing::default());
    }

    #[test]
    fn test_malformed_file_yields_empty_data() {
        let file = write_data("{ not json");
        let data = PanelData::load(file.path());
        assert!(data.servers.is_empty());
        assert!(data.status_cache.is_empty());
    }

    #[test]
    fn test_lookups() {
        let file = write_data(
            r#"{
                "servers": [
                    {"id": 1, "name": "edge-1", "host": "10.0.0.1", "user": "root",
                     "scripts": [{"id": 2, "name": "catcher", "path": "/opt/fip.sh",
                                  "service_name": "vk-fip@catcher", "state_file": "/var/lib/fip"}]}
                ],
                "status_cache": {"1-2": {"running": true, "cycles": 12, "last_ip": "89.208.0.1"}},
                "cloud_cache": {"1-2": {"ips": [], "account": "ops", "project": "prod"}},
                "cloud_last_update": "2026-01-02T03:04:05Z",
                "sales": {}
            }"#,
        );
        let data = PanelData::load(file.path());

        let server = data.server(1).unwrap();
        assert_eq!(data.script(server, 2).unwrap().service_name, "vk-fip@catcher");
        assert!(data.script(server, 3).is_none());
        assert!(data.server(9).is_none());
        assert_eq!(data.cached_status(1, 2).unwrap().cycles, 12);
        assert_eq!(data.cached_cloud(1, 2).unwrap().project.as_deref(), Some("prod"));
        assert!(data.cached_status(2, 1).is_none());
        assert_eq!(data.last_update(), Some("2026-01-02T03:04:05Z"));
    }

    #[test]
    fn test_projects_tenants_and_listings() {
        let file = write_data(
            r#"{
                "projects": [{"name": "mcs1a2b3c4d", "username": "ops@example.com",
                              "password": "p", "auth_url": "https://infra.mail.ru:35357/v3/",
                              "project_id": "1a2b3c4d5e"}],
                "projects_cache": {"mcs1a2b3c4d": {"ips": [{"ip": "89.208.0.7", "id": null}],
                                                   "error": null, "os_project_name": "mcs-prod"}},
                "logs_cache": {"1-2": {"log": "caught 89.208.0.7", "time": "2026-01-02T03:04:05Z"}},
                "tenants": [{"name": "acme", "ips": ["89.208.0.7"]}, {"name": "empty"}],
                "sales": {"ops@example.com": {"updated": "2026-01-02T03:04:05"}},
                "rentals": {}
            }"#,
        );
        let data = PanelData::load(file.path());

        assert_eq!(data.project("mcs1a2b3c4d").unwrap().username, "ops@example.com");
        let ips = data.project_ips("mcs1a2b3c4d").unwrap();
        assert_eq!(ips.os_project_name.as_deref(), Some("mcs-prod"));
        assert!(ips.ips[0].id.is_none());
        assert_eq!(data.cached_log(1, 2).unwrap().log, "caught 89.208.0.7");
        assert_eq!(data.tenant_of("89.208.0.7").unwrap().name, "acme");
        assert!(data.tenant("empty").unwrap().ips.is_empty());
        assert!(data.is_for_sale("ops@example.com"));
        assert!(!data.is_for_rent("mcs1a2b3c4d"));
    }

    #[test]
    fn test_null_floating_ip_id_keeps_the_file() {
        let file = write_data(
            r#"{
                "servers": [{"id": 1, "name": "edge-1", "host": "h", "user": "u"}],
                "cloud_cache": {"1-1": {"ips": [{"ip": "1.1.1.1", "id": null}]}}
            }"#,
        );
        let data = PanelData::load(file.path());
        assert_eq!(data.servers.len(), 1);
        assert_eq!(data.cached_cloud(1, 1).unwrap().ips.len(), 1);
    }
}
