use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, warn};

use super::tokenizer::{tokenize_line, ParseError};

/// Boxed failure returned by a command handler; kept as the `source` of
/// [`CommandError::Execution`].
pub type CommandHandlerError = Box<dyn Error + Send + Sync + 'static>;

/// Longest command line `execute` accepts, in characters.
pub const MAX_COMMAND_CHARS: usize = 256;

type HandlerFn<C> = dyn Fn(&mut C, &[String]) -> Result<i32, CommandHandlerError> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("command name cannot be empty")]
    EmptyName,
    #[error("duplicate command registration: {name}")]
    Duplicate { name: String },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command line is {len} characters long; the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("could not parse command line")]
    Parse(#[from] ParseError),
    #[error("unknown command '{name}'. try: help")]
    Unknown { name: String },
    #[error("command '{command}' failed")]
    Execution {
        command: String,
        #[source]
        source: CommandHandlerError,
    },
}

#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
struct HandlerPanic {
    message: String,
}

pub struct CommandSpec<C> {
    name: String,
    help: String,
    arg_schema: String,
    handler: Box<HandlerFn<C>>,
}

impl<C> CommandSpec<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn arg_schema(&self) -> &str {
        &self.arg_schema
    }
}

/// Maps command names to handlers over a mutable context `C`.
///
/// Names match exactly (case-sensitive). Handlers receive the whole token
/// slice, with the command name at index 0, and return a status code: `0`
/// finishes the prompt, anything else asks for another line.
pub struct CommandDispatcher<C> {
    specs: Vec<CommandSpec<C>>,
    lookup_by_name: HashMap<String, usize>,
}

impl<C> Default for CommandDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandDispatcher<C> {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_name: HashMap::new(),
        }
    }

    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut C, &[String]) -> Result<i32, CommandHandlerError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.lookup_by_name.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }

        self.specs.push(CommandSpec {
            name: name.clone(),
            help: help.into(),
            arg_schema: arg_schema.into(),
            handler: Box::new(handler),
        });
        self.lookup_by_name.insert(name, self.specs.len() - 1);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandSpec<C>> {
        let index = self.lookup_by_name.get(name)?;
        self.specs.get(*index)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter_specs_in_order(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        // Help output order is registration order by contract.
        self.specs.iter().map(|spec| {
            (
                spec.name.as_str(),
                spec.help.as_str(),
                spec.arg_schema.as_str(),
            )
        })
    }

    /// Tokenizes `line`, resolves the command and runs its handler. Lines
    /// over [`MAX_COMMAND_CHARS`] are refused before tokenizing.
    pub fn execute(&self, ctx: &mut C, line: &str) -> Result<i32, CommandError> {
        let len = line.chars().count();
        if len > MAX_COMMAND_CHARS {
            return Err(CommandError::TooLong {
                len,
                max: MAX_COMMAND_CHARS,
            });
        }
        let tokens = tokenize_line(line)?;
        let Some(command_name) = tokens.first() else {
            return Err(CommandError::Unknown {
                name: String::new(),
            });
        };
        let Some(spec) = self.lookup(command_name) else {
            return Err(CommandError::Unknown {
                name: command_name.clone(),
            });
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (spec.handler)(ctx, &tokens)));
        match outcome {
            Ok(Ok(status)) => {
                debug!(command = %spec.name, status, "command_executed");
                Ok(status)
            }
            Ok(Err(source)) => Err(CommandError::Execution {
                command: spec.name.clone(),
                source,
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(command = %spec.name, message = %message, "command_handler_panicked");
                Err(CommandError::Execution {
                    command: spec.name.clone(),
                    source: Box::new(HandlerPanic { message }),
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Renders an error followed by one `Caused by:` line per source.
pub fn error_chain(error: &dyn Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, "\nCaused by: {cause}");
        source = cause.source();
    }
    rendered
}
