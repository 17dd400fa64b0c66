use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3000);
pub const DEFAULT_EXIT_ANIMATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Other(String),
}

impl ToastKind {
    pub fn icon(&self) -> &'static str {
        match self {
            ToastKind::Success => "✓",
            ToastKind::Error => "✕",
            ToastKind::Info => "ℹ",
            ToastKind::Other(_) => "",
        }
    }
}

impl From<&str> for ToastKind {
    fn from(value: &str) -> Self {
        match value {
            "success" => ToastKind::Success,
            "error" => ToastKind::Error,
            "info" => ToastKind::Info,
            other => ToastKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastPhase {
    Visible,
    Leaving,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
    pub phase: ToastPhase,
}

impl Toast {
    pub fn icon(&self) -> &'static str {
        self.kind.icon()
    }
}

/// Where toasts are rendered.
pub trait ToastContainer: Send + Sync {
    fn append(&self, toast: Toast);
    /// Starts the exit animation of a toast; it stays in the container until `remove`.
    fn begin_exit(&self, id: u64);
    fn remove(&self, id: u64);
}

/// In-memory container; the terminal dashboard draws whatever it holds.
#[derive(Default)]
pub struct ToastStack {
    toasts: Mutex<Vec<Toast>>,
}

impl ToastStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Toast> {
        self.toasts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl ToastContainer for ToastStack {
    fn append(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }

    fn begin_exit(&self, id: u64) {
        if let Ok(mut toasts) = self.toasts.lock() {
            if let Some(toast) = toasts.iter_mut().find(|t| t.id == id) {
                toast.phase = ToastPhase::Leaving;
            }
        }
    }

    fn remove(&self, id: u64) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.retain(|t| t.id != id);
        }
    }
}

/// Shows toasts in an optional container and schedules their dismissal.
pub struct Toaster {
    container: Option<Arc<dyn ToastContainer>>,
    exit_animation: Duration,
    next_id: AtomicU64,
}

impl Toaster {
    pub fn new(container: Option<Arc<dyn ToastContainer>>) -> Self {
        Self {
            container,
            exit_animation: DEFAULT_EXIT_ANIMATION,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_exit_animation(mut self, exit_animation: Duration) -> Self {
        self.exit_animation = exit_animation;
        self
    }

    /// Appends a toast and returns the dismissal task, or `None` when there is
    /// no container to show it in. `duration` defaults to three seconds.
    ///
    /// Must be called from within a tokio runtime.
    pub fn show(
        &self,
        message: impl Into<String>,
        kind: impl Into<ToastKind>,
        duration: Option<Duration>,
    ) -> Option<JoinHandle<()>> {
        let container = self.container.clone()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let toast = Toast {
            id,
            kind: kind.into(),
            message: message.into(),
            phase: ToastPhase::Visible,
        };
        debug!(toast_id = id, kind = ?toast.kind, "Showing toast.");
        container.append(toast);

        let duration = duration.unwrap_or(DEFAULT_TOAST_DURATION);
        let exit_animation = self.exit_animation;
        Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            container.begin_exit(id);
            tokio::time::sleep(exit_animation).await;
            container.remove(id);
            debug!(toast_id = id, "Toast removed.");
        }))
    }

    pub fn success(&self, message: impl Into<String>) -> Option<JoinHandle<()>> {
        self.show(message, ToastKind::Success, None)
    }

    pub fn error(&self, message: impl Into<String>) -> Option<JoinHandle<()>> {
        self.show(message, ToastKind::Error, None)
    }

    pub fn info(&self, message: impl Into<String>) -> Option<JoinHandle<()>> {
        self.show(message, ToastKind::Info, None)
    }
}
