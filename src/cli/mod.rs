pub mod args;

pub use args::{Cli, CliCommand, JoinCliArgs, ServeCliArgs};
