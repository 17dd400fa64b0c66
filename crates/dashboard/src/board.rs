use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt::Write;
use vkpanel_common::{CacheKey, FloatingIp, ScriptStatus, StatusSnapshot};

use crate::datafile::PanelData;
use crate::timeago;

#[derive(Debug, Clone, PartialEq)]
pub struct BoardRow {
    pub key: CacheKey,
    pub server: String,
    pub script: String,
    pub status: ScriptStatus,
    pub floating_ips: Vec<FloatingIp>,
    pub account: Option<String>,
    pub project: Option<String>,
    pub cloud_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub rows: Vec<BoardRow>,
    pub last_update: Option<String>,
}

impl Board {
    /// Builds the board from the API's status cache. Entries whose key is not
    /// `server-script` fall back to the ids inside the status itself.
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        let mut rows: Vec<BoardRow> = snapshot
            .status_cache
            .iter()
            .map(|(key, status)| {
                let key = key
                    .parse()
                    .unwrap_or_else(|_| CacheKey::new(status.server_id, status.script_id));
                BoardRow {
                    key,
                    server: status.server_name.clone(),
                    script: status.script_name.clone(),
                    status: status.clone(),
                    floating_ips: Vec::new(),
                    account: status.account.clone(),
                    project: status.project.clone(),
                    cloud_error: None,
                }
            })
            .collect();
        rows.sort_by_key(|r| r.key);

        Self {
            rows,
            last_update: snapshot.last_update.clone(),
        }
    }

    /// Builds the board from the backend's data file, one row per configured
    /// script. Account and project come from the status cache first, then from
    /// the cloud cache.
    pub fn from_data(data: &PanelData) -> Self {
        let mut rows = Vec::new();
        for server in &data.servers {
            for script in &server.scripts {
                let status = data
                    .cached_status(server.id, script.id)
                    .cloned()
                    .unwrap_or_default();
                let cloud = data.cached_cloud(server.id, script.id).cloned().unwrap_or_default();

                rows.push(BoardRow {
                    key: CacheKey::new(server.id, script.id),
                    server: server.name.clone(),
                    script: script.name.clone(),
                    account: status.account.clone().or(cloud.account),
                    project: status.project.clone().or(cloud.project),
                    floating_ips: cloud.ips,
                    cloud_error: cloud.error,
                    status,
                });
            }
        }

        Self {
            rows,
            last_update: data.last_update().map(str::to_string),
        }
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn running(&self) -> usize {
        self.rows.iter().filter(|r| r.status.running).count()
    }

    pub fn server_names(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.server.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Keeps only the rows of one server.
    pub fn filtered(&self, server: &str) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .filter(|r| r.server == server)
                .cloned()
                .collect(),
            last_update: self.last_update.clone(),
        }
    }

    pub fn render(&self, locale: &str, now: DateTime<Utc>) -> String {
        let updated = timeago::format_relative_at(self.last_update.as_deref(), now, locale);
        self.render_with_updated(locale, &updated)
    }

    /// Renders with an already formatted "updated" phrase, e.g. the text of a
    /// label kept current by the status refresher.
    pub fn render_with_updated(&self, locale: &str, updated: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} | {}: {}",
            t!("board.title", locale = locale),
            t!("board.updated", locale = locale),
            updated
        );
        let (running, total) = (self.running(), self.total());
        let _ = writeln!(
            out,
            "{}",
            t!("board.summary", locale = locale, running = running, total = total)
        );

        if self.rows.is_empty() {
            let _ = writeln!(out, "{}", t!("board.empty", locale = locale));
            return out;
        }

        out.push('\n');
        for row in &self.rows {
            out.push_str(&render_row(row, locale));
            out.push('\n');
        }
        out
    }
}

fn render_row(row: &BoardRow, locale: &str) -> String {
    let (marker, state) = if row.status.running {
        ("●", t!("board.running", locale = locale))
    } else {
        ("○", t!("board.stopped", locale = locale))
    };

    let mut line = format!(
        "{marker} {}/{} [{}] {state} cycles={} success={}",
        row.server, row.script, row.key, row.status.cycles, row.status.success
    );
    if let Some(ip) = &row.status.last_ip {
        let _ = write!(line, " ip={ip}");
    }
    match (&row.account, &row.project) {
        (Some(account), Some(project)) => {
            let _ = write!(line, " {account}/{project}");
        }
        (Some(only), None) | (None, Some(only)) => {
            let _ = write!(line, " {only}");
        }
        (None, None) => {}
    }
    if !row.floating_ips.is_empty() {
        let attached = row.floating_ips.iter().filter(|ip| ip.attached).count();
        let _ = write!(line, " fips={attached}/{}", row.floating_ips.len());
    }
    if let Some(error) = row.status.error.as_ref().or(row.cloud_error.as_ref()) {
        let _ = write!(line, " error={error}");
    }
    line
}
