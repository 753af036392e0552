pub mod ftp;
pub mod mysql;
pub mod postgres;
pub mod ssh;
pub mod telnet;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;

/// Runtime tag selecting a login backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ssh,
    Ftp,
    Telnet,
    Mysql,
    Postgres,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Ssh => "ssh",
            Protocol::Ftp => "ftp",
            Protocol::Telnet => "telnet",
            Protocol::Mysql => "mysql",
            Protocol::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(Protocol::Ssh),
            "ftp" => Ok(Protocol::Ftp),
            "telnet" => Ok(Protocol::Telnet),
            "mysql" => Ok(Protocol::Mysql),
            "postgres" | "postgresql" => Ok(Protocol::Postgres),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

/// Classification of one authentication attempt.
///
/// Only `Success` and `AuthFailure` steer the attempt loop; the other two are
/// logged and count as a failed attempt that still advances progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The server accepted the credentials.
    Success,
    /// The server explicitly rejected the credentials.
    AuthFailure,
    /// The attempt never reached a verdict (refused, timeout, DNS, I/O).
    /// Does not confirm the password is wrong.
    ConnectionError(String),
    /// A line-oriented server answered with text matching neither indicator
    /// set; carries a truncated snippet for manual inspection.
    UnknownResponse(String),
}

/// One protocol-specific credential tester.
///
/// An implementation performs exactly one handshake per call, bounds it with
/// `timeout`, maps its client library's failure modes onto [`AttemptOutcome`]
/// deliberately, and releases the connection on every exit path.
#[async_trait]
pub trait LoginAttempt: Send + Sync {
    async fn attempt(
        &self,
        host: &str,
        username: &str,
        password: &str,
        port: u16,
        timeout: Duration,
    ) -> AttemptOutcome;
}

/// Backend lookup for a protocol tag. Adding a protocol means adding an arm
/// here and an implementation module; the attempt loop stays untouched.
pub fn backend_for(protocol: Protocol, config: &Config) -> Box<dyn LoginAttempt> {
    match protocol {
        Protocol::Ssh => Box::new(ssh::SshLogin),
        Protocol::Ftp => Box::new(ftp::FtpLogin),
        Protocol::Telnet => Box::new(telnet::TelnetLogin::from_config(config)),
        Protocol::Mysql => Box::new(mysql::MysqlLogin),
        Protocol::Postgres => Box::new(postgres::PostgresLogin::new(&config.postgres_db)),
    }
}

/// Cap a server response for logs and `UnknownResponse` payloads.
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    flat.chars().take(max_chars).collect()
}
