//! Comment-command parsing and status-board rendering for the relay bot.
//! This crate holds the pure parts of a dispatch: the ordered command
//! registry, the comment parser, the run model, and the status comment
//! renderer consumed by the runtime crate.

pub mod author_association;
pub mod command_registry;
pub mod command_run;
pub mod comment_parser;
pub mod reserved_parameters;
pub mod status_board;
pub mod text_helpers;
pub mod version_bump;

pub use author_association::{AuthorAssociation, DEFAULT_ALLOWED_ROLES};
pub use command_registry::{CommandAlias, CommandDefinition, CommandRegistry, RegistryError};
pub use command_run::Run;
pub use comment_parser::{
    addressed_command_lines, parse_comment_commands, strip_bot_handle, CommandMatch,
    MatchedCommand,
};
pub use reserved_parameters::{
    merge_request_parameters, ReservedParameterError, ReservedParameters,
    RESERVED_PARAMETER_NAMES,
};
pub use status_board::{
    apply_run_updates, render_inline_code, render_run_status, render_status_board,
    result_placeholder, status_placeholder, StatusBoardRow,
};
pub use version_bump::{
    decode_manifest_version, next_release_version, ReleaseVersion, VersionBumpError,
};
