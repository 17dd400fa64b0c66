use async_trait::async_trait;
use std::sync::Arc;
use vkpanel_common::{
    AddedProject, AllLogs, CloudRefreshSummary, ListingToggle, LiveScriptStatus, PanelReply,
    Pricing, PricingUpdate, ProjectCache, ProjectChange, RefreshSummary, ScriptAction,
    ScriptActionOutcome, ScriptLogs, StatusSnapshot,
};

use super::{PanelClient, RequestOptions};
use crate::error::ApiError;

/// The backend refuses to tail more than this many journal lines.
pub const MAX_LOG_LINES: u32 = 200;

/// Anything the live dashboard can pull a status snapshot from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError>;
}

impl PanelClient {
    /// Cached statuses of every script.
    pub async fn status(&self) -> Result<StatusSnapshot, ApiError> {
        self.request_json("/api/status", RequestOptions::default())
            .await
    }

    /// Asks the backend to poll every script over SSH and rebuild its cache.
    pub async fn refresh(&self) -> Result<RefreshSummary, ApiError> {
        self.request_json("/api/refresh", RequestOptions::post())
            .await
    }

    /// Live status of one script, bypassing the cache.
    pub async fn script_status(
        &self,
        server_id: i64,
        script_id: i64,
    ) -> Result<LiveScriptStatus, ApiError> {
        self.request_json(
            &format!("/api/status/{server_id}/{script_id}"),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn script_action(
        &self,
        server_id: i64,
        script_id: i64,
        action: ScriptAction,
    ) -> Result<ScriptActionOutcome, ApiError> {
        self.request_json(
            &format!("/servers/{server_id}/scripts/{script_id}/{action}"),
            RequestOptions::post(),
        )
        .await
    }

    pub async fn cloud_refresh(&self) -> Result<CloudRefreshSummary, ApiError> {
        self.request_json("/api/cloud/refresh", RequestOptions::post())
            .await
    }

    /// Floating IPs of the project a script is catching for.
    pub async fn cloud_ips(&self, server_id: i64, script_id: i64) -> Result<ProjectCache, ApiError> {
        self.request_json(
            &format!("/api/cloud/{server_id}/{script_id}"),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn projects_refresh(&self) -> Result<CloudRefreshSummary, ApiError> {
        self.request_json("/api/projects/refresh", RequestOptions::post())
            .await
    }

    pub async fn script_logs(
        &self,
        server_id: i64,
        script_id: i64,
        lines: u32,
    ) -> Result<ScriptLogs, ApiError> {
        let lines = lines.min(MAX_LOG_LINES);
        self.request_json(
            &format!("/api/logs/{server_id}/{script_id}?lines={lines}"),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn all_logs(&self, lines: u32) -> Result<AllLogs, ApiError> {
        let lines = lines.min(MAX_LOG_LINES).to_string();
        self.submit_form("/api/logs/all", &[("lines", lines.as_str())])
            .await
    }

    pub async fn pricing(&self) -> Result<Pricing, ApiError> {
        self.request_json("/api/pricing", RequestOptions::default())
            .await
    }

    /// Sets both prices. The backend clamps negatives to zero when storing.
    pub async fn update_pricing(&self, pricing: Pricing) -> Result<PricingUpdate, ApiError> {
        let sale = pricing.sale_per_ip.to_string();
        let rent = pricing.rent_per_ip.to_string();
        self.submit_form(
            "/api/pricing",
            &[("sale_per_ip", sale.as_str()), ("rent_per_ip", rent.as_str())],
        )
        .await
    }

    /// Points a script at another configured project and restarts it.
    pub async fn change_project(
        &self,
        server_id: i64,
        script_id: i64,
        project_name: &str,
    ) -> Result<ProjectChange, ApiError> {
        self.submit_form(
            &format!("/api/scripts/{server_id}/{script_id}/change-project"),
            &[("project_name", project_name)],
        )
        .await
    }

    /// Registers a project from an `openrc` script. An empty password lets
    /// the backend use its default.
    pub async fn add_project(
        &self,
        openrc: &str,
        password: Option<&str>,
    ) -> Result<AddedProject, ApiError> {
        self.submit_form(
            "/api/projects/add",
            &[("script", openrc), ("password", password.unwrap_or_default())],
        )
        .await
    }

    pub async fn delete_project(&self, name: &str) -> Result<PanelReply, ApiError> {
        let url = self.segments(&["api", "projects", name, "delete"])?;
        self.send_json(url, RequestOptions::post()).await
    }

    /// Deletes every project of a VK Cloud account.
    pub async fn delete_account(&self, username: &str) -> Result<PanelReply, ApiError> {
        let url = self.segments(&["api", "accounts", username, "delete"])?;
        self.send_json(url, RequestOptions::post()).await
    }

    pub async fn add_tenant(&self, name: &str) -> Result<PanelReply, ApiError> {
        self.submit_form("/api/tenants/add", &[("name", name)])
            .await
    }

    pub async fn delete_tenant(&self, name: &str) -> Result<PanelReply, ApiError> {
        let url = self.segments(&["api", "tenants", name, "delete"])?;
        self.send_json(url, RequestOptions::post()).await
    }

    pub async fn assign_ip(&self, tenant: &str, ip: &str) -> Result<PanelReply, ApiError> {
        let url = self.segments(&["api", "tenants", tenant, "assign-ip"])?;
        self.send_form(url, &[("ip", ip)]).await
    }

    pub async fn unassign_ip(&self, tenant: &str, ip: &str) -> Result<PanelReply, ApiError> {
        let url = self.segments(&["api", "tenants", tenant, "unassign-ip"])?;
        self.send_form(url, &[("ip", ip)]).await
    }

    /// Puts an account up for sale or takes it off.
    pub async fn set_for_sale(
        &self,
        username: &str,
        for_sale: bool,
    ) -> Result<ListingToggle, ApiError> {
        let url = self.segments(&["api", "sales", username, "toggle"])?;
        self.send_form(url, &[("for_sale", bool_field(for_sale))])
            .await
    }

    /// Offers a project for rent or withdraws it.
    pub async fn set_for_rent(
        &self,
        project: &str,
        for_rent: bool,
    ) -> Result<ListingToggle, ApiError> {
        let url = self.segments(&["api", "rentals", project, "toggle"])?;
        self.send_form(url, &[("for_rent", bool_field(for_rent))])
            .await
    }
}

fn bool_field(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[async_trait]
impl<T: StatusSource + ?Sized> StatusSource for Arc<T> {
    async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
        (**self).fetch_status().await
    }
}

#[async_trait]
impl StatusSource for PanelClient {
    async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
        self.status().await
    }
}
