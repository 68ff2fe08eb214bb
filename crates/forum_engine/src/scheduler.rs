use std::sync::Arc;
use std::time::Duration;

use forum_logging::{forum_debug, forum_warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::session::Session;
use crate::transport::{HttpRequest, Transport};
use crate::{FailureKind, FetchError, QueueClass, Task, TaskResult};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub base_url: String,
    pub core_delay: Duration,
    pub plugin_delay: Duration,
}

impl SchedulerSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            core_delay: QueueClass::Core.default_delay(),
            plugin_delay: QueueClass::Plugin.default_delay(),
        }
    }

    pub fn delay(&self, class: QueueClass) -> Duration {
        match class {
            QueueClass::Core => self.core_delay,
            QueueClass::Plugin => self.plugin_delay,
        }
    }
}

type Callback = Box<dyn FnOnce(TaskResult) + Send + 'static>;

enum Reply {
    Channel(oneshot::Sender<TaskResult>),
    Callback(Callback),
}

impl Reply {
    fn deliver(self, result: TaskResult) {
        match self {
            // The caller may have stopped waiting; the task still counts as run.
            Reply::Channel(tx) => {
                let _ = tx.send(result);
            }
            Reply::Callback(callback) => callback(result),
        }
    }
}

struct QueuedTask {
    task: Task,
    reply: Reply,
}

/// Two independent FIFO lanes, each executing one task at a time.
///
/// Cloning is cheap; clones feed the same workers and share one [`Session`].
/// The workers stop once every clone has been dropped.
#[derive(Clone)]
pub struct Scheduler {
    core: mpsc::UnboundedSender<QueuedTask>,
    plugin: mpsc::UnboundedSender<QueuedTask>,
    session: Arc<Session>,
}

impl Scheduler {
    /// Spawns one worker per queue class. Must be called from within a Tokio runtime.
    pub fn new(settings: SchedulerSettings, transport: Arc<dyn Transport>) -> Self {
        let session = Arc::new(Session::new());
        let base_url = Arc::new(settings.base_url.clone());
        let (core, core_rx) = mpsc::unbounded_channel();
        let (plugin, plugin_rx) = mpsc::unbounded_channel();

        for (class, rx) in [(QueueClass::Core, core_rx), (QueueClass::Plugin, plugin_rx)] {
            let worker = ClassWorker {
                class,
                delay: settings.delay(class),
                base_url: Arc::clone(&base_url),
                transport: Arc::clone(&transport),
                session: Arc::clone(&session),
            };
            tokio::spawn(worker.run(rx));
        }

        Self {
            core,
            plugin,
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Queues `task` and invokes `callback` on the class worker once it ran.
    pub fn enqueue_with<F>(&self, class: QueueClass, task: Task, callback: F)
    where
        F: FnOnce(TaskResult) + Send + 'static,
    {
        self.push(class, task, Reply::Callback(Box::new(callback)));
    }

    /// Queues `task` and waits for its outcome.
    pub async fn request(&self, class: QueueClass, task: Task) -> TaskResult {
        let (tx, rx) = oneshot::channel();
        self.push(class, task, Reply::Channel(tx));
        rx.await.unwrap_or_else(|_| Err(closed_error()))
    }

    fn push(&self, class: QueueClass, task: Task, reply: Reply) {
        let lane = match class {
            QueueClass::Core => &self.core,
            QueueClass::Plugin => &self.plugin,
        };
        if let Err(mpsc::error::SendError(queued)) = lane.send(QueuedTask { task, reply }) {
            forum_warn!("{} queue is closed; dropping {}", class, queued.task.locator);
            queued.reply.deliver(Err(closed_error()));
        }
    }
}

fn closed_error() -> FetchError {
    FetchError::new(FailureKind::SchedulerClosed, "queue worker stopped")
}

struct ClassWorker {
    class: QueueClass,
    delay: Duration,
    base_url: Arc<String>,
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
}

impl ClassWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<QueuedTask>) {
        while let Some(QueuedTask { task, reply }) = rx.recv().await {
            let result = self.execute(task).await;
            reply.deliver(result);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        forum_debug!("{} queue worker stopped", self.class);
    }

    async fn execute(&self, task: Task) -> TaskResult {
        let url = resolve_locator(&self.base_url, &task.locator)?;
        forum_debug!("[{}] {} {}", self.class, task.method, url);
        let request = HttpRequest {
            method: task.method,
            url,
            form: task.form,
            headers: self.session.headers(),
        };
        match self.transport.execute(request).await {
            Ok(bytes) => Ok(decode_body(&bytes)),
            Err(err) => {
                forum_warn!("[{}] {} failed: {}", self.class, task.locator, err);
                Err(err)
            }
        }
    }
}

/// Resolves `/`-prefixed locators against `base_url`, keeping any path prefix
/// the base carries. Other locators must be absolute URLs.
pub(crate) fn resolve_locator(base_url: &str, locator: &str) -> Result<Url, FetchError> {
    let absolute = if locator.starts_with('/') {
        format!("{}{locator}", base_url.trim_end_matches('/'))
    } else {
        locator.to_string()
    };
    Url::parse(&absolute).map_err(|err| {
        FetchError::new(FailureKind::InvalidUrl, format!("{absolute}: {err}"))
    })
}

fn decode_body(bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            if !bytes.is_empty() {
                forum_debug!("Response body is not JSON ({} bytes): {}", bytes.len(), err);
            }
            None
        }
    }
}
