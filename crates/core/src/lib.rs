pub mod command_line;
pub mod config;
pub mod domain;
pub mod errors;
pub mod health;
pub mod runner;

pub use command_line::{CommandLine, DirectoryDefaults};
pub use domain::operation::Operation;
pub use domain::request::{CommandRequest, Selection};
pub use domain::result::{CommandReport, CommandResult, FailureReason};
pub use errors::{RequestError, StructuredOutputError};
pub use health::{locate_program, HealthReport};
pub use runner::{CommandRunner, Timeouts};
