mod registry;
mod terminal;
mod tokenizer;

pub use registry::{
    error_chain, CommandDispatcher, CommandError, CommandHandlerError, CommandSpec,
    RegistryError, MAX_COMMAND_CHARS,
};
pub use terminal::{LineConsole, MAX_HISTORY_LINES};
pub use tokenizer::{tokenize_line, ParseError};
