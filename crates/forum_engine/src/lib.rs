//! Forum engine: rate-limited request scheduling, session lifecycle,
//! pagination drivers and command dispatch.
mod client;
mod config;
mod dispatch;
mod scheduler;
mod session;
mod transport;
mod types;

pub use client::{ClientError, ForumClient, PaginationSettings};
pub use config::{load_config, scheduler_settings, ConfigError};
pub use dispatch::{
    command_event, dispatch_command, CommandDispatcher, CommandHandler, CommandRegistry,
    DispatchError, DispatchOutcome, EventBus, COMMAND_EVENT_PREFIX, FALLBACK_EVENT,
};
pub use scheduler::{Scheduler, SchedulerSettings};
pub use session::{Session, SessionError, SessionManager, CSRF_HEADER};
pub use transport::{HttpRequest, ReqwestTransport, Transport, TransportSettings};
pub use types::{FailureKind, FetchError, Method, QueueClass, Task, TaskResult};
