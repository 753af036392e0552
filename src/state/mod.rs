pub mod progress;
pub mod success;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::brute::Protocol;

/// Replace anything outside `[A-Za-z0-9-_.]` so a component is safe as part
/// of a file name.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Identity of one brute-force search: (protocol, host, username, wordlist).
///
/// The wordlist contributes only its base name, so two different lists that
/// share a file name share checkpoints. Known limitation, kept for
/// compatibility with existing state directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetKey {
    pub protocol: Protocol,
    pub host: String,
    pub username: String,
    pub wordlist_id: String,
}

impl TargetKey {
    pub fn new(protocol: Protocol, host: &str, username: &str, wordlist: &Path) -> Self {
        let wordlist_id = wordlist
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wordlist".to_string());

        TargetKey {
            protocol,
            host: host.to_string(),
            username: username.to_string(),
            wordlist_id,
        }
    }

    /// File-name stem shared by the progress and success records.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.protocol,
            sanitize(&self.host),
            sanitize(&self.username),
            sanitize(&self.wordlist_id),
        )
    }
}

/// Write `data` to `path` so that an observer sees either the old content or
/// the new content, never a partial record. The payload lands in a temporary
/// file in the same directory and is renamed over the destination; a failed
/// rename leaves the destination untouched and removes the temporary.
pub(crate) fn atomic_write(path: &Path, data: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("creating state directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(data.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    // A failed rename hands the temporary back inside the error; dropping it
    // here removes the file before the caller sees the failure.
    match tmp.persist(path) {
        Ok(_) => Ok(()),
        Err(e) => Err(e.error).with_context(|| format!("committing {}", path.display())),
    }
}

pub(crate) fn read_to_string_opt(path: &Path) -> Option<String> {
    match File::open(path) {
        Ok(mut file) => {
            use std::io::Read;
            let mut content = String::new();
            file.read_to_string(&mut content).ok()?;
            Some(content)
        }
        Err(_) => None,
    }
}
