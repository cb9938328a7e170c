pub mod command;
pub mod command_header;
pub mod command_kind;
pub mod dispatcher;
pub mod error;
