use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Execution lane for a task. Each class runs one task at a time and waits
/// its delay after every task before starting the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueClass {
    /// Agent traffic: no post-task delay.
    Core,
    /// Plugin-originated traffic: 5 s between tasks.
    Plugin,
}

impl QueueClass {
    pub const ALL: [QueueClass; 2] = [QueueClass::Core, QueueClass::Plugin];

    pub fn default_delay(self) -> Duration {
        match self {
            QueueClass::Core => Duration::ZERO,
            QueueClass::Plugin => Duration::from_millis(5_000),
        }
    }
}

impl fmt::Display for QueueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueClass::Core => write!(f, "core"),
            QueueClass::Plugin => write!(f, "plugin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(reqwest::Method::from(*self).as_str())
    }
}

/// One HTTP-shaped unit of work. Locators starting with `/` are resolved
/// against the scheduler's base URL; anything else must be an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub method: Method,
    pub locator: String,
    pub form: Option<Vec<(String, String)>>,
}

impl Task {
    pub fn get(locator: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            locator: locator.into(),
            form: None,
        }
    }

    pub fn post(locator: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            locator: locator.into(),
            form: Some(form),
        }
    }
}

/// Outcome handed to a task's callback. `Ok(None)` means the response had no
/// decodable JSON body, which is not a failure of the transport.
pub type TaskResult = Result<Option<Value>, FetchError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    /// The class worker is gone, so the task never ran.
    SchedulerClosed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::SchedulerClosed => write!(f, "scheduler closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_constructors_pick_the_method() {
        let get = Task::get("/latest.json");
        assert_eq!(get.method, Method::Get);
        assert_eq!(get.form, None);

        let post = Task::post("/session", vec![("login".to_string(), "agent".to_string())]);
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.method.to_string(), "POST");
        assert_eq!(reqwest::Method::from(Method::Get), reqwest::Method::GET);
    }
}
