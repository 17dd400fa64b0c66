use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use tokio::sync::watch;
use tracing::{error, info};
use vkpanel_common::{CloudRefreshSummary, PanelReply, Pricing, ScriptAction};

use vkpanel_dashboard::api::{PanelClient, PanelSession};
use vkpanel_dashboard::board::Board;
use vkpanel_dashboard::config::DashboardConfig;
use vkpanel_dashboard::dashboard::Dashboard;
use vkpanel_dashboard::datafile::PanelData;
use vkpanel_dashboard::error::ApiError;
use vkpanel_dashboard::logging::init_logging;
use vkpanel_dashboard::timeago;
use vkpanel_dashboard::toast::ToastKind;
use vkpanel_dashboard::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Terminal dashboard for VK IP Panel", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show cached script statuses
    Status {
        /// Only show scripts of this server
        #[arg(long)]
        server: Option<String>,
    },
    /// Poll every script and rebuild the status cache
    Refresh,
    /// Reload floating IPs of every script's project
    CloudRefresh,
    /// Reload floating IPs of every configured project
    ProjectsRefresh,
    /// Live status of one script
    Script { server_id: i64, script_id: i64 },
    /// Start, stop or restart a script
    Action {
        server_id: i64,
        script_id: i64,
        action: ScriptAction,
    },
    /// Floating IPs of a script's project
    Ips { server_id: i64, script_id: i64 },
    /// Tail journal logs of one script, or of all scripts with --all
    Logs {
        server_id: Option<i64>,
        script_id: Option<i64>,
        #[arg(long)]
        all: bool,
        #[arg(short = 'n', long, default_value_t = 10)]
        lines: u32,
    },
    /// Current IP prices
    Pricing,
    /// Render the board from the backend's data file without calling the API
    Offline {
        #[arg(long)]
        data_file: Option<String>,
        #[arg(long)]
        server: Option<String>,
    },
    /// Format a panel timestamp relative to now
    Ago { timestamp: Option<String> },
    /// Live dashboard, refreshed until Ctrl-C
    Watch {
        #[arg(long)]
        server: Option<String>,
    },
    /// Point a script at another configured project
    ChangeProject {
        server_id: i64,
        script_id: i64,
        project: String,
    },
    /// Update IP prices; omitted values keep their current setting
    SetPricing {
        #[arg(long)]
        sale: Option<i64>,
        #[arg(long)]
        rent: Option<i64>,
    },
    /// Manage configured VK Cloud projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Delete every project of a VK Cloud account
    DeleteAccount { username: String },
    /// Manage IP tenants
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Put an account up for sale, or take it off with --off
    Sale {
        username: String,
        #[arg(long)]
        off: bool,
    },
    /// Offer a project for rent, or withdraw it with --off
    Rent {
        project: String,
        #[arg(long)]
        off: bool,
    },
    /// End the panel session
    Logout,
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// Register a project from an openrc script ("-" reads stdin)
    Add {
        openrc: String,
        #[arg(long)]
        password: Option<String>,
    },
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum TenantCommand {
    Add { name: String },
    Delete { name: String },
    /// Rent an IP to a tenant
    Assign { name: String, ip: String },
    Unassign { name: String, ip: String },
}

async fn connect(config: &DashboardConfig) -> Result<PanelSession, ApiError> {
    let client = PanelClient::new(&config.panel_url, config.request_timeout())?;
    let session = PanelSession::new(client, config.credentials());
    if session.login().await? {
        info!(panel = %config.panel_url, "Logged in to panel.");
    }
    Ok(session)
}

fn read_openrc(source: &str) -> std::io::Result<String> {
    if source == "-" {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(source)
    }
}

fn report(kind: ToastKind, message: &str) {
    println!("{} {}", kind.icon(), message);
}

fn report_reply(reply: &PanelReply) {
    let kind = if reply.ok {
        ToastKind::Success
    } else {
        ToastKind::Error
    };
    report(kind, reply.text());
}

fn report_cloud_summary(summary: &CloudRefreshSummary) {
    if summary.ok {
        report(
            ToastKind::Success,
            &format!(
                "{} IPs: {} attached, {} free",
                summary.total_ips, summary.attached, summary.free
            ),
        );
    } else {
        report(
            ToastKind::Error,
            summary.error.as_deref().unwrap_or("refresh failed"),
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match DashboardConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load dashboard configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(version = VERSION, config = ?config, "Starting dashboard.");

    let locale = config.locale.clone();
    match args.command {
        Command::Ago { timestamp } => {
            println!("{}", timeago::format_relative(timestamp.as_deref(), &locale));
        }
        Command::Offline { data_file, server } => {
            let path = data_file.unwrap_or_else(|| config.data_file.clone());
            let board = Board::from_data(&PanelData::load(&path));
            let board = match server {
                Some(server) => board.filtered(&server),
                None => board,
            };
            print!("{}", board.render(&locale, Utc::now()));
        }
        Command::Status { server } => {
            let session = connect(&config).await?;
            let board = Board::from_snapshot(&session.client().status().await?);
            let board = match server {
                Some(server) => board.filtered(&server),
                None => board,
            };
            print!("{}", board.render(&locale, Utc::now()));
        }
        Command::Refresh => {
            let summary = connect(&config).await?.client().refresh().await?;
            report(
                ToastKind::Success,
                &format!(
                    "{} scripts updated, {} running ({})",
                    summary.updated,
                    summary.running,
                    timeago::format_relative(summary.last_update.as_deref(), &locale)
                ),
            );
        }
        Command::CloudRefresh => {
            report_cloud_summary(&connect(&config).await?.client().cloud_refresh().await?);
        }
        Command::ProjectsRefresh => {
            report_cloud_summary(&connect(&config).await?.client().projects_refresh().await?);
        }
        Command::Script {
            server_id,
            script_id,
        } => {
            let status = connect(&config)
                .await?
                .client()
                .script_status(server_id, script_id)
                .await?;
            let kind = if status.running {
                ToastKind::Success
            } else {
                ToastKind::Info
            };
            report(
                kind,
                &format!(
                    "{server_id}-{script_id} running={} cycles={} success={} last_ip={}",
                    status.running,
                    status.cycles,
                    status.success,
                    status.last_ip.as_deref().unwrap_or("-")
                ),
            );
            if let Some(e) = status.error {
                report(ToastKind::Error, &e);
            }
        }
        Command::Action {
            server_id,
            script_id,
            action,
        } => {
            let outcome = connect(&config)
                .await?
                .client()
                .script_action(server_id, script_id, action)
                .await?;
            let message = outcome
                .message
                .or(outcome.error)
                .unwrap_or_else(|| action.to_string());
            if outcome.ok {
                report(ToastKind::Success, &message);
            } else {
                report(ToastKind::Error, &message);
            }
        }
        Command::Ips {
            server_id,
            script_id,
        } => {
            let cloud = connect(&config)
                .await?
                .client()
                .cloud_ips(server_id, script_id)
                .await?;
            if let Some(e) = &cloud.error {
                report(ToastKind::Error, e);
            }
            println!(
                "{} / {}",
                cloud.account.as_deref().unwrap_or("-"),
                cloud.project.as_deref().unwrap_or("-")
            );
            for ip in &cloud.ips {
                let marker = if ip.attached { "●" } else { "○" };
                println!(
                    "{marker} {} {} {}",
                    ip.ip.as_deref().unwrap_or("-"),
                    ip.fixed_ip.as_deref().unwrap_or("-"),
                    ip.status.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Logs {
            server_id,
            script_id,
            all,
            lines,
        } => {
            let session = connect(&config).await?;
            let client = session.client();
            if all {
                let logs = client.all_logs(lines).await?;
                for entry in logs.results {
                    println!(
                        "== {}/{} [{}-{}]",
                        entry.server, entry.script, entry.server_id, entry.script_id
                    );
                    match entry.error {
                        Some(e) => report(ToastKind::Error, &e),
                        None => println!("{}", entry.log),
                    }
                }
            } else {
                let (Some(server_id), Some(script_id)) = (server_id, script_id) else {
                    return Err(
                        "Both SERVER_ID and SCRIPT_ID are required unless --all is given".into(),
                    );
                };
                let logs = client.script_logs(server_id, script_id, lines).await?;
                match logs.error {
                    Some(e) => report(ToastKind::Error, &e),
                    None => println!("{}", logs.log),
                }
            }
        }
        Command::Pricing => {
            let pricing = connect(&config).await?.client().pricing().await?;
            println!(
                "sale_per_ip={} rent_per_ip={}",
                pricing.sale_per_ip, pricing.rent_per_ip
            );
        }
        Command::Watch { server } => {
            let session = connect(&config).await?;
            let (shutdown_tx, shutdown_rx) = watch::channel(());
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for Ctrl-C.");
                    return;
                }
                let _ = shutdown_tx.send(());
            });

            Dashboard::new(session, &config)
                .with_server_filter(server)
                .run(shutdown_rx, |frame| {
                    let mut stdout = std::io::stdout().lock();
                    let _ = writeln!(stdout, "\x1b[2J\x1b[H{frame}");
                    let _ = stdout.flush();
                })
                .await;
        }
        Command::ChangeProject {
            server_id,
            script_id,
            project,
        } => {
            let change = connect(&config)
                .await?
                .client()
                .change_project(server_id, script_id, &project)
                .await?;
            let message = change.message.or(change.error).unwrap_or(project);
            if change.ok {
                report(ToastKind::Success, &message);
            } else {
                report(ToastKind::Error, &message);
            }
        }
        Command::SetPricing { sale, rent } => {
            let session = connect(&config).await?;
            let client = session.client();
            let current = if sale.is_none() || rent.is_none() {
                client.pricing().await?
            } else {
                Pricing::default()
            };
            let update = client
                .update_pricing(Pricing {
                    sale_per_ip: sale.unwrap_or(current.sale_per_ip),
                    rent_per_ip: rent.unwrap_or(current.rent_per_ip),
                })
                .await?;
            report(
                ToastKind::Success,
                &format!(
                    "sale_per_ip={} rent_per_ip={}",
                    update.sale_per_ip, update.rent_per_ip
                ),
            );
        }
        Command::Project { command } => {
            let session = connect(&config).await?;
            let client = session.client();
            match command {
                ProjectCommand::Add { openrc, password } => {
                    let script = read_openrc(&openrc)
                        .map_err(|e| format!("Failed to read openrc script {openrc}: {e}"))?;
                    let added = client.add_project(&script, password.as_deref()).await?;
                    match (&added.project, added.ok) {
                        (Some(project), true) => report(
                            ToastKind::Success,
                            &format!("{} ({})", project.name, project.username),
                        ),
                        _ => report(
                            ToastKind::Error,
                            added.error.as_deref().unwrap_or("project was not added"),
                        ),
                    }
                }
                ProjectCommand::Delete { name } => {
                    report_reply(&client.delete_project(&name).await?);
                }
            }
        }
        Command::DeleteAccount { username } => {
            let session = connect(&config).await?;
            report_reply(&session.client().delete_account(&username).await?);
        }
        Command::Tenant { command } => {
            let session = connect(&config).await?;
            let client = session.client();
            let reply = match command {
                TenantCommand::Add { name } => client.add_tenant(&name).await?,
                TenantCommand::Delete { name } => client.delete_tenant(&name).await?,
                TenantCommand::Assign { name, ip } => client.assign_ip(&name, &ip).await?,
                TenantCommand::Unassign { name, ip } => client.unassign_ip(&name, &ip).await?,
            };
            report_reply(&reply);
        }
        Command::Sale { username, off } => {
            let toggle = connect(&config)
                .await?
                .client()
                .set_for_sale(&username, !off)
                .await?;
            report(
                ToastKind::Success,
                &format!("{username}: for_sale={}", toggle.listed),
            );
        }
        Command::Rent { project, off } => {
            let toggle = connect(&config)
                .await?
                .client()
                .set_for_rent(&project, !off)
                .await?;
            report(
                ToastKind::Success,
                &format!("{project}: for_rent={}", toggle.listed),
            );
        }
        Command::Logout => {
            connect(&config).await?.client().logout().await?;
            report(ToastKind::Info, "Logged out");
        }
    }

    Ok(())
}
