use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meetbot")]
#[command(about = "Join a Google Meet call as a guest and record it", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: <config dir>/meetbot/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Join a meeting, record it, and leave when it ends
    Join(JoinCliArgs),
    /// Run the HTTP front end that queues bots and serves recordings
    Serve(ServeCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct JoinCliArgs {
    /// Google Meet link, e.g. https://meet.google.com/abc-defg-hij
    pub meetlink: String,
    /// Base folder for browser profiles
    #[arg(long)]
    pub profile_dir: Option<PathBuf>,
    /// Profile name under --profile-dir (used with --persist-profile)
    #[arg(long, default_value = "meetbot")]
    pub profile_name: String,
    /// Reuse <profile-dir>/<profile-name> instead of a throwaway profile
    #[arg(long)]
    pub persist_profile: bool,
    /// Run Chrome headless (not recommended when a login is needed)
    #[arg(long)]
    pub headless: bool,
    /// Leave the meeting if participants drop below this
    #[arg(long, default_value_t = 2)]
    pub min_members: u32,
    /// Minimum recording time before checking participants
    #[arg(long, default_value_t = 200)]
    pub min_record_seconds: u64,
    /// Display name for the guest join flow
    #[arg(long, default_value = "Recorder Bot")]
    pub bot_name: String,
    /// Give up if not admitted within this many seconds
    #[arg(long, default_value_t = 600)]
    pub admission_timeout: u64,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeCliArgs {
    /// Interface to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Directory recordings are written to and served from (overrides config)
    #[arg(long)]
    pub record_dir: Option<PathBuf>,
}
