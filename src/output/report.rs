use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use log::warn;
use serde::Serialize;

use crate::brute::Protocol;
use crate::output::file;

fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Terminal state of one (username, protocol) pair.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialResult {
    pub timestamp: String,
    pub host: String,
    pub protocol: Protocol,
    pub username: String,
    pub success: bool,
    pub password: Option<String>,
    /// True when a prior run already cracked this pair and no attempt was
    /// made this time.
    pub skipped: bool,
}

impl CredentialResult {
    pub fn cracked(host: &str, protocol: Protocol, username: &str, password: String) -> Self {
        CredentialResult {
            timestamp: now_stamp(),
            host: host.to_string(),
            protocol,
            username: username.to_string(),
            success: true,
            password: Some(password),
            skipped: false,
        }
    }

    pub fn skipped(
        host: &str,
        protocol: Protocol,
        username: &str,
        password: Option<String>,
    ) -> Self {
        CredentialResult {
            timestamp: now_stamp(),
            host: host.to_string(),
            protocol,
            username: username.to_string(),
            success: true,
            password,
            skipped: true,
        }
    }

    pub fn failed(host: &str, protocol: Protocol, username: &str) -> Self {
        CredentialResult {
            timestamp: now_stamp(),
            host: host.to_string(),
            protocol,
            username: username.to_string(),
            success: false,
            password: None,
            skipped: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    pairs: usize,
    cracked: usize,
    skipped: usize,
    failed: usize,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    timestamp: String,
    host: &'a str,
    interrupted: bool,
    summary: Summary,
    results: &'a [CredentialResult],
}

/// Persist the result list as a pretty-printed JSON document. An interrupted
/// run lands next to the normal output under a `.partial.json` name so a
/// complete document is never overwritten by a truncated one. Returns the
/// path actually written.
pub fn save(
    output_path: &Path,
    host: &str,
    results: &[CredentialResult],
    interrupted: bool,
) -> Result<PathBuf> {
    let path = if interrupted {
        partial_path(output_path)
    } else {
        output_path.to_path_buf()
    };

    let cracked = results.iter().filter(|r| r.success && !r.skipped).count();
    let skipped = results.iter().filter(|r| r.skipped).count();
    let report = RunReport {
        timestamp: now_stamp(),
        host,
        interrupted,
        summary: Summary {
            pairs: results.len(),
            cracked,
            skipped,
            failed: results.len() - cracked - skipped,
        },
        results,
    };

    let json = serde_json::to_string_pretty(&report)?;
    file::write_to_file(&path, &json)?;
    Ok(path)
}

fn partial_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    output_path.with_file_name(format!("{}.partial.json", stem))
}

/// Append a one-line record of a cracked pair to the run log. Best-effort:
/// a logging failure never disturbs the run.
pub fn log_success(log_path: &Path, result: &CredentialResult) {
    let line = format!(
        "[{}] HOST: {} USER: {} PROTO: {} SUCCESS: true PASSWORD: {}\n",
        result.timestamp,
        result.host,
        result.username,
        result.protocol,
        result.password.as_deref().unwrap_or("?"),
    );
    if let Err(e) = file::append_to_file(log_path, &line) {
        warn!("could not append to run log {}: {}", log_path.display(), e);
    }
}
