use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::api::StatusSource;
use crate::board::Board;
use crate::config::DashboardConfig;
use crate::refresher::{
    StatusElement, StatusLabel, StatusRefresher, LAST_UPDATE_ELEMENT_ID, TIMESTAMP_ATTRIBUTE,
};
use crate::timeago;
use crate::toast::{ToastContainer, ToastKind, ToastPhase, ToastStack, Toaster};

const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

pub struct Dashboard<S> {
    source: S,
    label: Arc<StatusLabel>,
    toasts: Arc<ToastStack>,
    toaster: Toaster,
    refresher: StatusRefresher,
    locale: String,
    poll_interval: Duration,
    toast_duration: Duration,
    server_filter: Option<String>,
    board: Option<Board>,
}

impl<S: StatusSource> Dashboard<S> {
    pub fn new(source: S, config: &DashboardConfig) -> Self {
        let label = Arc::new(StatusLabel::new(LAST_UPDATE_ELEMENT_ID));
        label.set_text(timeago::format_relative(None, &config.locale));

        let toasts = Arc::new(ToastStack::new());
        let toaster = Toaster::new(Some(toasts.clone() as Arc<dyn ToastContainer>))
            .with_exit_animation(config.toast_exit());
        let refresher = StatusRefresher::new(
            Some(label.clone() as Arc<dyn StatusElement>),
            config.locale.clone(),
        )
        .with_interval(config.refresh_interval());

        Self {
            source,
            label,
            toasts,
            toaster,
            refresher,
            locale: config.locale.clone(),
            poll_interval: config.poll_interval(),
            toast_duration: config.toast_duration(),
            server_filter: None,
            board: None,
        }
    }

    pub fn with_server_filter(mut self, server: Option<String>) -> Self {
        self.server_filter = server;
        self
    }

    /// Fetches a fresh snapshot. On success the label gets the new timestamp
    /// and is rewritten at once; on failure the last board stays and an error
    /// toast is shown.
    pub async fn poll_once(&mut self) -> bool {
        let locale = self.locale.clone();
        match self.source.fetch_status().await {
            Ok(snapshot) => {
                let board = Board::from_snapshot(&snapshot);
                debug!(scripts = board.total(), running = board.running(), "Fetched panel status.");
                match &board.last_update {
                    Some(ts) => self.label.set_attribute(TIMESTAMP_ATTRIBUTE, ts.clone()),
                    None => self.label.remove_attribute(TIMESTAMP_ATTRIBUTE),
                }
                if !self.refresher.refresh_once() {
                    self.label.set_text(timeago::format_relative(None, &locale));
                }
                if self.board.is_none() {
                    self.toaster.show(
                        t!("toast.refreshed", locale = &locale),
                        ToastKind::Success,
                        Some(self.toast_duration),
                    );
                }
                self.board = Some(match &self.server_filter {
                    Some(server) => board.filtered(server),
                    None => board,
                });
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch panel status.");
                let error_text = e.to_string();
                self.toaster.show(
                    t!("toast.refresh_failed", locale = &locale, error = error_text),
                    ToastKind::Error,
                    Some(self.toast_duration),
                );
                false
            }
        }
    }

    /// The current screen: board, then visible toasts.
    pub fn frame(&self) -> String {
        let board = self.board.clone().unwrap_or_default();
        let mut out = board.render_with_updated(&self.locale, &self.label.text());
        for toast in self.toasts.snapshot() {
            if toast.phase == ToastPhase::Visible {
                let _ = write!(out, "\n{} {}", toast.icon(), toast.message);
            }
        }
        out
    }

    /// Runs until `shutdown_rx` fires, calling `draw` whenever the frame changes.
    pub async fn run<F>(mut self, mut shutdown_rx: watch::Receiver<()>, mut draw: F)
    where
        F: FnMut(&str),
    {
        self.refresher.start();
        let mut poll = tokio::time::interval(self.poll_interval);
        let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
        let mut last_frame = String::new();
        info!(
            poll_interval_seconds = self.poll_interval.as_secs(),
            "Dashboard started."
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping dashboard.");
                    break;
                }
                _ = poll.tick() => {
                    let interrupted = tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => true,
                        _ = self.poll_once() => false,
                    };
                    if interrupted {
                        info!("Shutdown signal received during poll, stopping dashboard.");
                        break;
                    }
                }
                _ = redraw.tick() => {}
            }

            let frame = self.frame();
            if frame != last_frame {
                draw(&frame);
                last_frame = frame;
            }
        }

        self.refresher.stop().await;
        info!("Dashboard gracefully shut down.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PanelClient, PanelSession};
    use crate::error::ApiError;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use vkpanel_common::{ScriptStatus, StatusSnapshot};

    /// Serves queued answers, then repeats the last one.
    struct ScriptedSource {
        answers: Mutex<Vec<Result<StatusSnapshot, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(answers: Vec<Result<StatusSnapshot, String>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            let answer = if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0].clone()
            };
            answer.map_err(ApiError::Decode)
        }
    }

    fn snapshot(minutes_ago: i64) -> StatusSnapshot {
        let mut status_cache = HashMap::new();
        status_cache.insert(
            "1-1".to_string(),
            ScriptStatus {
                server_id: 1,
                script_id: 1,
                server_name: "edge-1".to_string(),
                script_name: "catcher".to_string(),
                running: true,
                ..Default::default()
            },
        );
        status_cache.insert(
            "2-1".to_string(),
            ScriptStatus {
                server_id: 2,
                script_id: 1,
                server_name: "edge-2".to_string(),
                script_name: "catcher".to_string(),
                ..Default::default()
            },
        );
        let ts = Utc::now() - ChronoDuration::minutes(minutes_ago);
        StatusSnapshot {
            status_cache,
            last_update: Some(ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        }
    }

    fn config() -> DashboardConfig {
        DashboardConfig {
            locale: "en".to_string(),
            ..DashboardConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_updates_label_and_board() {
        let mut dashboard = Dashboard::new(ScriptedSource::new(vec![Ok(snapshot(5))]), &config());
        assert!(dashboard.frame().contains("never updated"));

        assert!(dashboard.poll_once().await);

        let frame = dashboard.frame();
        assert!(frame.starts_with("VK IP Panel | Updated: 5 minutes ago"));
        assert!(frame.contains("1 of 2 scripts running"));
        assert!(frame.contains("✓ Status updated"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_board_and_shows_error_toast() {
        let source = ScriptedSource::new(vec![Ok(snapshot(5)), Err("boom".to_string())]);
        let mut dashboard = Dashboard::new(source, &config());

        assert!(dashboard.poll_once().await);
        assert!(!dashboard.poll_once().await);

        let frame = dashboard.frame();
        assert!(frame.contains("1 of 2 scripts running"));
        assert!(frame.contains("✕ Status refresh failed: Failed to decode panel response: boom"));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!dashboard.frame().contains("✕"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_filter() {
        let mut dashboard = Dashboard::new(ScriptedSource::new(vec![Ok(snapshot(1))]), &config())
            .with_server_filter(Some("edge-2".to_string()));
        dashboard.poll_once().await;

        let frame = dashboard.frame();
        assert!(frame.contains("0 of 1 scripts running"));
        assert!(!frame.contains("edge-1/"));
    }

    /// Never answers, like a panel stuck behind a dead connection.
    struct StalledSource;

    #[async_trait]
    impl StatusSource for StalledSource {
        async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_pending_poll() {
        let dashboard = Dashboard::new(StalledSource, &config());
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(dashboard.run(shutdown_rx, |_| {}));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("dashboard kept waiting on the stalled poll")
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_recovers_on_next_poll() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/status")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/login")
            .with_status(303)
            .with_header("location", "/")
            .with_header("set-cookie", "session=renewed; Path=/")
            .create_async()
            .await;
        server
            .mock("GET", "/api/status")
            .match_header("cookie", "session=renewed")
            .with_status(200)
            .with_body(r#"{"status_cache": {"1-1": {"server_name": "edge-1", "script_name": "catcher", "running": true}}}"#)
            .create_async()
            .await;

        let client = PanelClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let session = PanelSession::new(client, Some(("admin", "secret")));
        let mut dashboard = Dashboard::new(session, &config());

        assert!(dashboard.poll_once().await);
        let frame = dashboard.frame();
        assert!(frame.contains("1 of 1 scripts running"));
        assert!(!frame.contains("Not logged in"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot(2))]));
        let dashboard = Dashboard::new(source.clone(), &config());
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let frames = Arc::new(Mutex::new(Vec::<String>::new()));
        let frames_clone = frames.clone();
        let handle = tokio::spawn(dashboard.run(shutdown_rx, move |frame| {
            frames_clone.lock().unwrap().push(frame.to_string());
        }));

        tokio::time::sleep(Duration::from_secs(121)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        let frames = frames.lock().unwrap();
        assert!(frames[0].contains("2 minutes ago"));
    }
}
