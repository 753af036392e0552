use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Notify;

use crate::brute::{backend_for, AttemptOutcome, LoginAttempt, Protocol};
use crate::common::utils;
use crate::config::Config;
use crate::output::report::{self, CredentialResult};
use crate::state::progress::ProgressStore;
use crate::state::success::SuccessStore;
use crate::state::TargetKey;

/// Cooperative cancellation shared between the Ctrl-C handler, the detector
/// and the attempt loop. Observed at both suspension points: around the
/// network call and inside the inter-attempt sleep.
#[derive(Clone, Default)]
pub struct CancelFlag {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation is requested. Always raced against a
    /// bounded future, so a notification lost to the check/wait window only
    /// delays the wake-up until that bound.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.inner.notify.notified().await;
        }
    }

    /// Interruptible sleep; returns true when cancellation arrived during
    /// the wait.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_cancelled(),
            _ = self.cancelled() => true,
        }
    }
}

/// Terminal state of one (username, protocol) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// A success record from an earlier run short-circuited the pair; no
    /// attempt was made.
    Skipped { password: Option<String> },
    /// A password was accepted during this run.
    Cracked { password: String },
    /// The wordlist ran out without a hit.
    Exhausted,
    /// The wordlist could not be read; only this pair is abandoned.
    InputError(String),
    /// Global cancellation; the whole run stops.
    Interrupted,
}

/// Everything a finished (or interrupted) run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<CredentialResult>,
    pub interrupted: bool,
}

/// The attempt-loop scheduler: drives sequential password attempts for each
/// (username, protocol) pair through a login backend, checkpointing progress
/// after every attempt and short-circuiting pairs that are already cracked.
pub struct Engine<'a> {
    config: &'a Config,
    progress: ProgressStore,
    success: SuccessStore,
    cancel: CancelFlag,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a Config, cancel: CancelFlag) -> Self {
        Engine {
            config,
            progress: ProgressStore::new(&config.state_dir),
            success: SuccessStore::new(&config.state_dir),
            cancel,
        }
    }

    /// Run every (username × protocol) pair with the real backends.
    pub async fn run(
        &self,
        host: &str,
        usernames: &[String],
        wordlist: &Path,
        protocols: &[Protocol],
        port_override: Option<u16>,
    ) -> RunOutcome {
        self.run_with(
            host,
            usernames,
            wordlist,
            protocols,
            port_override,
            &|protocol: Protocol| backend_for(protocol, self.config),
        )
        .await
    }

    /// Same as [`Engine::run`] but with an injectable backend factory.
    pub async fn run_with(
        &self,
        host: &str,
        usernames: &[String],
        wordlist: &Path,
        protocols: &[Protocol],
        port_override: Option<u16>,
        factory: &dyn Fn(Protocol) -> Box<dyn LoginAttempt>,
    ) -> RunOutcome {
        let mut results = Vec::new();
        let mut interrupted = false;

        'outer: for username in usernames {
            for &protocol in protocols {
                if self.cancel.is_cancelled() {
                    interrupted = true;
                    break 'outer;
                }

                let backend = factory(protocol);
                let outcome = self
                    .run_pair(host, username, protocol, wordlist, port_override, &*backend)
                    .await;

                match outcome {
                    PairOutcome::Skipped { password } => {
                        info!("[{}] {}@{}: already cracked, skipping", protocol, username, host);
                        results.push(CredentialResult::skipped(host, protocol, username, password));
                    }
                    PairOutcome::Cracked { password } => {
                        let result =
                            CredentialResult::cracked(host, protocol, username, password);
                        report::log_success(&self.config.run_log, &result);
                        results.push(result);
                    }
                    PairOutcome::Exhausted => {
                        info!(
                            "[{}] {}@{}: wordlist exhausted, no valid password",
                            protocol, username, host
                        );
                        results.push(CredentialResult::failed(host, protocol, username));
                    }
                    PairOutcome::InputError(detail) => {
                        warn!("[{}] {}@{}: {}", protocol, username, host, detail);
                        results.push(CredentialResult::failed(host, protocol, username));
                    }
                    PairOutcome::Interrupted => {
                        interrupted = true;
                        break 'outer;
                    }
                }
            }
        }

        RunOutcome {
            results,
            interrupted,
        }
    }

    /// Drive one (username, protocol) pair to a terminal state.
    pub async fn run_pair(
        &self,
        host: &str,
        username: &str,
        protocol: Protocol,
        wordlist: &Path,
        port_override: Option<u16>,
        backend: &dyn LoginAttempt,
    ) -> PairOutcome {
        let params = self.config.params(protocol);
        let port = port_override.unwrap_or(params.default_port);
        let key = TargetKey::new(protocol, host, username, wordlist);

        // A success marker is authoritative: the backend is never invoked.
        if self.success.exists(&key) {
            return PairOutcome::Skipped {
                password: self.success.read(&key),
            };
        }

        let start = self.progress.read(&key);
        if start > 0 {
            info!(
                "[{}] {}@{}: resuming at wordlist line {}",
                protocol, username, host, start
            );
        }

        let file = match File::open(wordlist) {
            Ok(file) => file,
            Err(e) => {
                return PairOutcome::InputError(format!(
                    "cannot open wordlist {}: {}",
                    wordlist.display(),
                    e
                ))
            }
        };
        let mut reader = BufReader::new(file);

        let pb = utils::create_spinner(format!("[{}] {}@{}", protocol, username, host));
        let mut raw_line: Vec<u8> = Vec::new();
        let mut index: usize = 0;

        loop {
            raw_line.clear();
            let line_index = index;
            match reader.read_until(b'\n', &mut raw_line) {
                Ok(0) => break,
                Ok(_) => index += 1,
                Err(e) => {
                    pb.finish_and_clear();
                    return PairOutcome::InputError(format!(
                        "reading wordlist {}: {}",
                        wordlist.display(),
                        e
                    ));
                }
            }

            // Already covered by a previous run; no backend call, no write.
            if line_index < start {
                continue;
            }

            if self.cancel.is_cancelled() {
                pb.finish_and_clear();
                self.checkpoint(&key, line_index);
                return PairOutcome::Interrupted;
            }

            // Wordlists are tolerated with invalid UTF-8; bad sequences are
            // replaced rather than rejected.
            let password = String::from_utf8_lossy(&raw_line).trim().to_string();

            // Blank lines consume an index but never an attempt.
            if password.is_empty() {
                self.checkpoint(&key, line_index + 1);
                continue;
            }

            pb.set_message(format!(
                "[{}] {}@{} line {} trying {:?}",
                protocol, username, host, line_index, password
            ));
            debug!(
                "[{}] {}@{}: trying line {}",
                protocol, username, host, line_index
            );

            // Biased: an attempt that already has a verdict is recorded
            // before a simultaneous cancellation is honored.
            let outcome = tokio::select! {
                biased;
                outcome = backend.attempt(host, username, &password, port, params.timeout) => outcome,
                _ = self.cancel.cancelled() => {
                    pb.finish_and_clear();
                    self.checkpoint(&key, line_index);
                    return PairOutcome::Interrupted;
                }
            };

            // Checkpoint before inspecting the outcome: a crash right here
            // still resumes past the attempt that just finished.
            self.checkpoint(&key, line_index + 1);

            match outcome {
                AttemptOutcome::Success => {
                    pb.finish_and_clear();
                    if let Err(e) = self.success.write(&key, &password) {
                        warn!("success record for {} not written: {}", key.file_stem(), e);
                    }
                    self.progress.remove(&key);
                    info!(
                        "[+] [{}] {}@{}: valid password found",
                        protocol, username, host
                    );
                    return PairOutcome::Cracked { password };
                }
                AttemptOutcome::AuthFailure => {
                    debug!("[{}] {}@{}: rejected", protocol, username, host);
                }
                AttemptOutcome::ConnectionError(detail) => {
                    debug!(
                        "[{}] {}@{}: connection error: {}",
                        protocol, username, host, detail
                    );
                }
                AttemptOutcome::UnknownResponse(text) => {
                    warn!(
                        "[{}] {}@{}: unclassified response: {:?}",
                        protocol, username, host, text
                    );
                }
            }

            if self.cancel.sleep(params.attempt_delay).await {
                pb.finish_and_clear();
                return PairOutcome::Interrupted;
            }
        }

        pb.finish_and_clear();
        PairOutcome::Exhausted
    }

    /// Progress writes are best-effort: a store fault costs resumability for
    /// one attempt, never the run.
    fn checkpoint(&self, key: &TargetKey, index: usize) {
        if let Err(e) = self.progress.write(key, index) {
            warn!("progress for {} not persisted: {}", key.file_stem(), e);
        }
    }

    pub fn progress_store(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn success_store(&self) -> &SuccessStore {
        &self.success
    }
}
