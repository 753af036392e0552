use std::path::PathBuf;
use std::time::Duration;
use lazy_static::lazy_static;

use crate::brute::Protocol;

lazy_static! {
    /// Usernames tried when neither --user nor --user-file is given.
    static ref DEFAULT_USERNAMES: Vec<&'static str> = vec!["root", "admin", "postgres"];

    /// Substrings (lower-cased) that mark a telnet login as accepted.
    static ref TELNET_SUCCESS_INDICATORS: Vec<&'static str> = vec![
        "$",
        "#",
        ">",
        "last login",
        "welcome",
        "shell",
    ];

    /// Substrings (lower-cased) that mark a telnet login as rejected.
    static ref TELNET_FAILURE_INDICATORS: Vec<&'static str> = vec![
        "login incorrect",
        "incorrect",
        "authentication failed",
        "access denied",
        "invalid",
        "failed",
        "connection closed",
    ];
}

/// Per-protocol attempt tuning: where to connect and how hard to throttle.
#[derive(Debug, Clone)]
pub struct ProtocolParams {
    pub default_port: u16,
    pub timeout: Duration,
    pub attempt_delay: Duration,
}

/// Runtime configuration threaded into the detector and the engine.
///
/// Built once in `main` from CLI arguments and the defaults below; nothing
/// reads it through a global.
#[derive(Debug, Clone)]
pub struct Config {
    /// Probe table for auto detection, in probe order.
    pub ports_to_scan: Vec<(u16, Protocol)>,
    pub probe_timeout: Duration,
    pub probe_delay: Duration,

    pub ssh: ProtocolParams,
    pub ftp: ProtocolParams,
    pub telnet: ProtocolParams,
    pub mysql: ProtocolParams,
    pub postgres: ProtocolParams,

    /// Directory holding `.progress` and `.success` checkpoints.
    pub state_dir: PathBuf,
    /// Append-only run log receiving one line per cracked pair.
    pub run_log: PathBuf,

    pub postgres_db: String,
    pub default_usernames: Vec<String>,

    pub telnet_success_indicators: Vec<String>,
    pub telnet_failure_indicators: Vec<String>,
    /// Settle time between writing credentials and reading the verdict.
    pub telnet_settle: Duration,
}

impl Config {
    pub fn params(&self, protocol: Protocol) -> &ProtocolParams {
        match protocol {
            Protocol::Ssh => &self.ssh,
            Protocol::Ftp => &self.ftp,
            Protocol::Telnet => &self.telnet,
            Protocol::Mysql => &self.mysql,
            Protocol::Postgres => &self.postgres,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let short = Duration::from_secs(3);
        let pace = Duration::from_millis(300);

        Config {
            ports_to_scan: vec![
                (21, Protocol::Ftp),
                (22, Protocol::Ssh),
                (23, Protocol::Telnet),
                (3306, Protocol::Mysql),
                (5432, Protocol::Postgres),
            ],
            probe_timeout: Duration::from_secs(2),
            probe_delay: Duration::from_millis(500),

            ssh: ProtocolParams {
                default_port: 22,
                timeout: short,
                attempt_delay: pace,
            },
            ftp: ProtocolParams {
                default_port: 21,
                timeout: short,
                attempt_delay: pace,
            },
            // Line-oriented, needs settle time after each submission.
            telnet: ProtocolParams {
                default_port: 23,
                timeout: Duration::from_secs(5),
                attempt_delay: Duration::from_secs(1),
            },
            mysql: ProtocolParams {
                default_port: 3306,
                timeout: short,
                attempt_delay: pace,
            },
            postgres: ProtocolParams {
                default_port: 5432,
                timeout: short,
                attempt_delay: pace,
            },

            state_dir: PathBuf::from("state"),
            run_log: PathBuf::from("logs/bruteforce.log"),

            postgres_db: "postgres".to_string(),
            default_usernames: DEFAULT_USERNAMES.iter().map(|s| s.to_string()).collect(),

            telnet_success_indicators: TELNET_SUCCESS_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            telnet_failure_indicators: TELNET_FAILURE_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            telnet_settle: Duration::from_secs(1),
        }
    }
}
