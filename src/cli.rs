use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

use crate::brute::Protocol;

#[derive(Parser, Debug)]
#[clap(
    name = "rbrute",
    version,
    about = "Resumable credential brute forcing with automatic service detection.\n\
             For authorized testing of systems you control."
)]
pub struct Args {
    /// Target host (IP address or hostname)
    pub host: String,

    /// Password wordlist, one candidate per line
    pub wordlist: PathBuf,

    /// Username to test (repeatable)
    #[clap(short, long = "user")]
    pub users: Vec<String>,

    /// File with usernames, one per line; '#' comments and blank lines are
    /// ignored. Takes precedence over --user when non-empty.
    #[clap(long)]
    pub user_file: Option<PathBuf>,

    /// Protocol to attack; auto probes the host first
    #[clap(short, long, value_enum, default_value_t = ProtocolChoice::Auto)]
    pub protocol: ProtocolChoice,

    /// Port override for the selected protocol
    #[clap(long)]
    pub port: Option<u16>,

    /// Path for the JSON result document
    #[clap(short, long, default_value = "results/results.json")]
    pub output: PathBuf,

    /// Directory holding progress and success checkpoints
    #[clap(long, default_value = "state")]
    pub state_dir: PathBuf,

    /// Log file (default: stdout)
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Verbose output
    #[clap(short, long)]
    pub verbose: bool,

    /// Silent mode (errors only)
    #[clap(short, long)]
    pub silent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolChoice {
    Auto,
    Ssh,
    Ftp,
    Telnet,
    Mysql,
    Postgres,
}

impl ProtocolChoice {
    /// `None` means "auto": run service detection.
    pub fn to_protocol(self) -> Option<Protocol> {
        match self {
            ProtocolChoice::Auto => None,
            ProtocolChoice::Ssh => Some(Protocol::Ssh),
            ProtocolChoice::Ftp => Some(Protocol::Ftp),
            ProtocolChoice::Telnet => Some(Protocol::Telnet),
            ProtocolChoice::Mysql => Some(Protocol::Mysql),
            ProtocolChoice::Postgres => Some(Protocol::Postgres),
        }
    }
}

impl fmt::Display for ProtocolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolChoice::Auto => "auto",
            ProtocolChoice::Ssh => "ssh",
            ProtocolChoice::Ftp => "ftp",
            ProtocolChoice::Telnet => "telnet",
            ProtocolChoice::Mysql => "mysql",
            ProtocolChoice::Postgres => "postgres",
        };
        f.write_str(name)
    }
}
