mod environment;
mod layout;
mod paths;

pub use environment::{DEBUG_ENV, ROOT_ENV, SHIM_COMMAND_ENV, VERSION_ENV, is_truthy};
pub use layout::{BASE_COMMANDS, ScriptKind, ShimLayout};
pub use paths::{ToolPaths, ToolPathsError};
