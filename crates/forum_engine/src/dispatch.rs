use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use forum_core::{CleanedPost, CommandParser, ParsedCommand};
use forum_logging::{forum_debug, forum_error, forum_warn};

/// Prefix of per-command events: `command#roll`.
pub const COMMAND_EVENT_PREFIX: &str = "command#";
/// Emitted when nothing handled a short-form command.
pub const FALLBACK_EVENT: &str = "command#ERROR";

pub fn command_event(name: &str) -> String {
    format!("{COMMAND_EVENT_PREFIX}{name}")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler for command `{command}` (input `{input}`)")]
    Unhandled { command: String, input: String },
}

/// Host-supplied event bus.
pub trait EventBus: Send + Sync {
    /// Emits a named event; returns whether any subscriber handled it.
    fn emit(&self, event: &str, command: &ParsedCommand) -> bool;
    /// Reports an error that has no caller to return to.
    fn raise(&self, error: DispatchError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Fallback,
    /// Unhandled mention command; these never fall back.
    Ignored,
    Raised,
}

/// Runs the handled / fallback / raise chain for one command.
pub fn dispatch_command(bus: &dyn EventBus, command: &ParsedCommand) -> DispatchOutcome {
    if bus.emit(&command_event(&command.command), command) {
        return DispatchOutcome::Handled;
    }
    if command.mention.is_some() {
        forum_debug!("Mention command `{}` has no handler", command.command);
        return DispatchOutcome::Ignored;
    }
    if bus.emit(FALLBACK_EVENT, command) {
        return DispatchOutcome::Fallback;
    }
    bus.raise(DispatchError::Unhandled {
        command: command.command.clone(),
        input: command.input.clone(),
    });
    DispatchOutcome::Raised
}

/// Parses posts and dispatches each command on its own spawned task.
pub struct CommandDispatcher {
    parser: CommandParser,
    bus: Arc<dyn EventBus>,
}

impl CommandDispatcher {
    pub fn new(parser: CommandParser, bus: Arc<dyn EventBus>) -> Self {
        Self { parser, bus }
    }

    /// Returns the parsed commands right away. Dispatch happens later on the
    /// Tokio runtime and its outcome never reaches the caller.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn handle_post(&self, post: CleanedPost) -> Vec<ParsedCommand> {
        let commands = self.parser.parse(Arc::new(post));
        for command in &commands {
            let bus = Arc::clone(&self.bus);
            let command = command.clone();
            tokio::spawn(async move {
                dispatch_command(bus.as_ref(), &command);
            });
        }
        commands
    }
}

pub type CommandHandler = Arc<dyn Fn(&ParsedCommand) -> anyhow::Result<()> + Send + Sync>;
type ErrorSink = Arc<dyn Fn(&DispatchError) + Send + Sync>;

/// In-process [`EventBus`]: named command handlers, one fallback slot and
/// one error sink. A command counts as handled when at least one of its
/// handlers returned `Ok`.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: RwLock<HashMap<String, Vec<CommandHandler>>>,
    fallback: RwLock<Option<CommandHandler>>,
    error_sink: RwLock<Option<ErrorSink>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `command#<name>`. Names are matched lowercased.
    pub fn on_command<H>(&self, name: &str, handler: H)
    where
        H: Fn(&ParsedCommand) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_lowercase())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Fills the fallback slot, replacing any previous fallback.
    pub fn on_unhandled<H>(&self, handler: H)
    where
        H: Fn(&ParsedCommand) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        *self.fallback.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    pub fn on_error<S>(&self, sink: S)
    where
        S: Fn(&DispatchError) + Send + Sync + 'static,
    {
        *self.error_sink.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(sink));
    }

    fn subscribers(&self, event: &str) -> Vec<CommandHandler> {
        if event == FALLBACK_EVENT {
            return self
                .fallback
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect();
        }
        let Some(name) = event.strip_prefix(COMMAND_EVENT_PREFIX) else {
            return Vec::new();
        };
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl EventBus for CommandRegistry {
    fn emit(&self, event: &str, command: &ParsedCommand) -> bool {
        let mut handled = false;
        for handler in self.subscribers(event) {
            match handler(command) {
                Ok(()) => handled = true,
                Err(err) => forum_warn!("Handler for {} failed on `{}`: {}", event, command.input, err),
            }
        }
        handled
    }

    fn raise(&self, error: DispatchError) {
        let sink = self
            .error_sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => sink(&error),
            None => forum_error!("{}", error),
        }
    }
}
