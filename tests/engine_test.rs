use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use rbrute::brute::{AttemptOutcome, LoginAttempt, Protocol};
use rbrute::config::Config;
use rbrute::engine::{CancelFlag, Engine, PairOutcome};
use rbrute::state::TargetKey;

/// Backend with a scripted verdict per password, recording every call and
/// optionally the progress record visible at call time.
#[derive(Clone, Default)]
struct ScriptedBackend {
    /// Password that authenticates; everything else is rejected.
    accept: Option<String>,
    /// Fixed outcome overriding the accept/reject logic.
    fixed: Option<AttemptOutcome>,
    calls: Arc<Mutex<Vec<String>>>,
    call_count: Arc<AtomicUsize>,
    /// Fire this flag once the given 1-based call is reached.
    cancel_on_call: Option<(usize, CancelFlag)>,
    /// Progress record to sample at every call.
    watch_progress: Option<PathBuf>,
    seen_progress: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedBackend {
    fn accepting(password: &str) -> Self {
        ScriptedBackend {
            accept: Some(password.to_string()),
            ..Default::default()
        }
    }

    fn rejecting() -> Self {
        ScriptedBackend::default()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoginAttempt for ScriptedBackend {
    async fn attempt(
        &self,
        _host: &str,
        _username: &str,
        password: &str,
        _port: u16,
        _timeout: Duration,
    ) -> AttemptOutcome {
        if let Some(path) = &self.watch_progress {
            let index = fs::read_to_string(path)
                .ok()
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(0);
            self.seen_progress.lock().unwrap().push(index);
        }

        self.calls.lock().unwrap().push(password.to_string());
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, cancel)) = &self.cancel_on_call {
            if call == *at {
                cancel.cancel();
            }
        }

        if let Some(outcome) = &self.fixed {
            return outcome.clone();
        }
        match &self.accept {
            Some(accepted) if accepted == password => AttemptOutcome::Success,
            _ => AttemptOutcome::AuthFailure,
        }
    }
}

struct Fixture {
    config: Config,
    wordlist: PathBuf,
    _dir: tempfile::TempDir,
}

fn fixture(words: &[&str]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let wordlist = dir.path().join("wordlist.txt");
    fs::write(&wordlist, words.join("\n")).unwrap();

    let mut config = Config::default();
    config.state_dir = dir.path().join("state");
    config.run_log = dir.path().join("logs").join("bruteforce.log");
    // Keep the throttle out of the test wall clock.
    config.ssh.attempt_delay = Duration::from_millis(1);
    config.ftp.attempt_delay = Duration::from_millis(1);
    config.telnet.attempt_delay = Duration::from_millis(1);
    config.mysql.attempt_delay = Duration::from_millis(1);
    config.postgres.attempt_delay = Duration::from_millis(1);

    Fixture {
        config,
        wordlist,
        _dir: dir,
    }
}

fn key_for(fx: &Fixture, protocol: Protocol, username: &str) -> TargetKey {
    TargetKey::new(protocol, "10.0.0.5", username, &fx.wordlist)
}

#[tokio::test]
async fn planted_password_is_found_and_recorded() {
    let fx = fixture(&["bad1", "bad2", "secret"]);
    let cancel = CancelFlag::new();
    let engine = Engine::new(&fx.config, cancel);
    let backend = ScriptedBackend::accepting("secret");

    let outcome = engine
        .run_pair("10.0.0.5", "admin", Protocol::Ssh, &fx.wordlist, None, &backend)
        .await;

    assert_eq!(
        outcome,
        PairOutcome::Cracked {
            password: "secret".to_string()
        }
    );
    assert_eq!(backend.calls(), vec!["bad1", "bad2", "secret"]);

    let key = key_for(&fx, Protocol::Ssh, "admin");
    assert_eq!(
        engine.success_store().read(&key).as_deref(),
        Some("secret")
    );
    assert!(!engine.progress_store().path_for(&key).exists());
}

#[tokio::test]
async fn blank_lines_consume_an_index_but_never_an_attempt() {
    let fx = fixture(&["", "pw1", "", "pw2"]);
    let engine = Engine::new(&fx.config, CancelFlag::new());
    let backend = ScriptedBackend::accepting("pw2");

    let outcome = engine
        .run_pair("10.0.0.5", "root", Protocol::Ftp, &fx.wordlist, None, &backend)
        .await;

    assert_eq!(
        outcome,
        PairOutcome::Cracked {
            password: "pw2".to_string()
        }
    );
    assert_eq!(backend.calls(), vec!["pw1", "pw2"]);
}

#[tokio::test]
async fn resumption_never_retries_covered_lines() {
    let fx = fixture(&["a", "b", "c", "d"]);
    let engine = Engine::new(&fx.config, CancelFlag::new());
    let key = key_for(&fx, Protocol::Telnet, "root");
    engine.progress_store().write(&key, 2).unwrap();

    let backend = ScriptedBackend::rejecting();
    let outcome = engine
        .run_pair("10.0.0.5", "root", Protocol::Telnet, &fx.wordlist, None, &backend)
        .await;

    assert_eq!(outcome, PairOutcome::Exhausted);
    assert_eq!(backend.calls(), vec!["c", "d"]);
    assert_eq!(engine.progress_store().read(&key), 4);
}

#[tokio::test]
async fn success_marker_short_circuits_without_backend_calls() {
    let fx = fixture(&["a", "b"]);
    let engine = Engine::new(&fx.config, CancelFlag::new());
    let key = key_for(&fx, Protocol::Mysql, "admin");
    engine.success_store().write(&key, "known").unwrap();

    let backend = ScriptedBackend::accepting("a");
    let outcome = engine
        .run_pair("10.0.0.5", "admin", Protocol::Mysql, &fx.wordlist, None, &backend)
        .await;

    assert_eq!(
        outcome,
        PairOutcome::Skipped {
            password: Some("known".to_string())
        }
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn progress_is_exactly_the_attempt_index_at_every_call() {
    let fx = fixture(&["", "p0", "p1", "", "p2"]);
    let engine = Engine::new(&fx.config, CancelFlag::new());
    let key = key_for(&fx, Protocol::Ssh, "root");

    let backend = ScriptedBackend {
        watch_progress: Some(engine.progress_store().path_for(&key)),
        ..ScriptedBackend::rejecting()
    };
    let outcome = engine
        .run_pair("10.0.0.5", "root", Protocol::Ssh, &fx.wordlist, None, &backend)
        .await;

    assert_eq!(outcome, PairOutcome::Exhausted);
    // Non-blank lines sit at indexes 1, 2 and 4; every attempt sees the
    // store already advanced to its own line.
    assert_eq!(*backend.seen_progress.lock().unwrap(), vec![1, 2, 4]);
    assert_eq!(engine.progress_store().read(&key), 5);
}

#[tokio::test]
async fn interrupt_then_resume_reaches_the_same_final_state() {
    let fx = fixture(&["a", "b", "c"]);
    let key = key_for(&fx, Protocol::Ssh, "root");

    // First process: cancelled while the second attempt is in flight.
    {
        let cancel = CancelFlag::new();
        let engine = Engine::new(&fx.config, cancel.clone());
        let backend = ScriptedBackend {
            accept: Some("c".to_string()),
            cancel_on_call: Some((2, cancel)),
            ..Default::default()
        };

        let outcome = engine
            .run_pair("10.0.0.5", "root", Protocol::Ssh, &fx.wordlist, None, &backend)
            .await;

        assert_eq!(outcome, PairOutcome::Interrupted);
        assert_eq!(backend.calls(), vec!["a", "b"]);
        assert_eq!(engine.progress_store().read(&key), 2);
    }

    // Fresh process: resumes at line 2 and finds the password.
    {
        let engine = Engine::new(&fx.config, CancelFlag::new());
        let backend = ScriptedBackend::accepting("c");

        let outcome = engine
            .run_pair("10.0.0.5", "root", Protocol::Ssh, &fx.wordlist, None, &backend)
            .await;

        assert_eq!(
            outcome,
            PairOutcome::Cracked {
                password: "c".to_string()
            }
        );
        assert_eq!(backend.calls(), vec!["c"]);
        assert_eq!(
            engine.success_store().read(&key).as_deref(),
            Some("c")
        );
        assert!(!engine.progress_store().path_for(&key).exists());
    }
}

#[tokio::test]
async fn unknown_responses_count_as_failed_attempts() {
    let fx = fixture(&["x", "y"]);
    let engine = Engine::new(&fx.config, CancelFlag::new());
    let key = key_for(&fx, Protocol::Telnet, "root");

    let backend = ScriptedBackend {
        fixed: Some(AttemptOutcome::UnknownResponse("### MOTD ###".to_string())),
        ..Default::default()
    };
    let outcome = engine
        .run_pair("10.0.0.5", "root", Protocol::Telnet, &fx.wordlist, None, &backend)
        .await;

    assert_eq!(outcome, PairOutcome::Exhausted);
    assert_eq!(backend.calls().len(), 2);
    assert!(!engine.success_store().exists(&key));
    assert_eq!(engine.progress_store().read(&key), 2);
}

#[tokio::test]
async fn connection_errors_advance_progress_like_failures() {
    let fx = fixture(&["x", "y", "z"]);
    let engine = Engine::new(&fx.config, CancelFlag::new());
    let key = key_for(&fx, Protocol::Postgres, "postgres");

    let backend = ScriptedBackend {
        fixed: Some(AttemptOutcome::ConnectionError("refused".to_string())),
        ..Default::default()
    };
    let outcome = engine
        .run_pair(
            "10.0.0.5",
            "postgres",
            Protocol::Postgres,
            &fx.wordlist,
            None,
            &backend,
        )
        .await;

    assert_eq!(outcome, PairOutcome::Exhausted);
    assert_eq!(engine.progress_store().read(&key), 3);
}

#[tokio::test]
async fn run_emits_one_result_per_pair_and_skips_on_rerun() {
    let fx = fixture(&["wrong", "pw"]);
    let engine = Engine::new(&fx.config, CancelFlag::new());
    let users = vec!["root".to_string(), "admin".to_string()];
    let factory = |_: Protocol| {
        Box::new(ScriptedBackend::accepting("pw")) as Box<dyn LoginAttempt>
    };

    let first = engine
        .run_with(
            "10.0.0.5",
            &users,
            &fx.wordlist,
            &[Protocol::Ssh],
            None,
            &factory,
        )
        .await;

    assert!(!first.interrupted);
    assert_eq!(first.results.len(), 2);
    for result in &first.results {
        assert!(result.success);
        assert!(!result.skipped);
        assert_eq!(result.password.as_deref(), Some("pw"));
    }

    // Identical re-invocation: both pairs short-circuit on the markers.
    let second = engine
        .run_with(
            "10.0.0.5",
            &users,
            &fx.wordlist,
            &[Protocol::Ssh],
            None,
            &factory,
        )
        .await;

    assert_eq!(second.results.len(), 2);
    for result in &second.results {
        assert!(result.skipped);
        assert_eq!(result.password.as_deref(), Some("pw"));
    }
}

#[tokio::test]
async fn missing_wordlist_fails_the_pair_but_not_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.state_dir = dir.path().join("state");
    config.run_log = dir.path().join("bruteforce.log");

    let engine = Engine::new(&config, CancelFlag::new());
    let users = vec!["root".to_string(), "admin".to_string()];
    let factory =
        |_: Protocol| Box::new(ScriptedBackend::accepting("pw")) as Box<dyn LoginAttempt>;

    let outcome = engine
        .run_with(
            "10.0.0.5",
            &users,
            Path::new("/definitely/not/here.txt"),
            &[Protocol::Ftp],
            None,
            &factory,
        )
        .await;

    assert!(!outcome.interrupted);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.iter().all(|r| !r.success && !r.skipped));
}

#[tokio::test]
async fn cancellation_before_the_pair_starts_interrupts_the_run() {
    let fx = fixture(&["a"]);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let engine = Engine::new(&fx.config, cancel);

    let factory =
        |_: Protocol| Box::new(ScriptedBackend::accepting("a")) as Box<dyn LoginAttempt>;
    let outcome = engine
        .run_with(
            "10.0.0.5",
            &["root".to_string()],
            &fx.wordlist,
            &[Protocol::Ssh],
            None,
            &factory,
        )
        .await;

    assert!(outcome.interrupted);
    assert!(outcome.results.is_empty());
}
