use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

use crate::brute::{snippet, AttemptOutcome, LoginAttempt};
use crate::config::Config;

const PROMPT_WINDOW: Duration = Duration::from_secs(2);
const READ_GRACE: Duration = Duration::from_millis(150);
const SNIPPET_CHARS: usize = 200;

/// Telnet login with heuristic verdict classification.
///
/// Telnet has no structured accept/reject signal, so after submitting the
/// credentials the post-login output is matched (lower-cased, substring)
/// against two configurable indicator sets. Success indicators win over
/// failure indicators; text matching neither is reported as
/// [`AttemptOutcome::UnknownResponse`]. The classification is best-effort
/// and can misfire on unusual prompts.
pub struct TelnetLogin {
    success_indicators: Vec<String>,
    failure_indicators: Vec<String>,
    settle: Duration,
}

impl TelnetLogin {
    pub fn new(
        success_indicators: Vec<String>,
        failure_indicators: Vec<String>,
        settle: Duration,
    ) -> Self {
        TelnetLogin {
            success_indicators,
            failure_indicators,
            settle,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        TelnetLogin::new(
            config.telnet_success_indicators.clone(),
            config.telnet_failure_indicators.clone(),
            config.telnet_settle,
        )
    }
}

#[async_trait]
impl LoginAttempt for TelnetLogin {
    async fn attempt(
        &self,
        host: &str,
        username: &str,
        password: &str,
        port: u16,
        timeout_dur: Duration,
    ) -> AttemptOutcome {
        let addr = format!("{}:{}", host, port);
        let mut stream = match timeout(timeout_dur, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return AttemptOutcome::ConnectionError(e.to_string()),
            Err(_) => {
                return AttemptOutcome::ConnectionError(format!("connecting to {} timed out", addr))
            }
        };

        let prompt = read_available(&mut stream, PROMPT_WINDOW).await;
        let prompt_lower = prompt.to_lowercase();

        if prompt_lower.contains("login") || prompt_lower.contains("username") {
            if let Err(e) = send_line(&mut stream, username).await {
                return AttemptOutcome::ConnectionError(e.to_string());
            }
            // Wait for the password prompt before submitting.
            let _ = read_available(&mut stream, PROMPT_WINDOW).await;
        } else {
            // No recognizable prompt; write blind and give the server time.
            if let Err(e) = send_line(&mut stream, username).await {
                return AttemptOutcome::ConnectionError(e.to_string());
            }
            sleep(self.settle).await;
        }

        if let Err(e) = send_line(&mut stream, password).await {
            return AttemptOutcome::ConnectionError(e.to_string());
        }

        sleep(self.settle).await;
        let response = read_available(&mut stream, PROMPT_WINDOW).await;
        let text = response.to_lowercase();
        trace!("telnet response from {}: {:?}", addr, snippet(&text, 80));

        if self.success_indicators.iter().any(|ind| text.contains(ind)) {
            AttemptOutcome::Success
        } else if self.failure_indicators.iter().any(|ind| text.contains(ind)) {
            AttemptOutcome::AuthFailure
        } else {
            AttemptOutcome::UnknownResponse(snippet(&text, SNIPPET_CHARS))
        }
    }
}

async fn send_line(stream: &mut TcpStream, line: &str) -> std::io::Result<()> {
    stream.write_all(format!("{}\r\n", line).as_bytes()).await
}

/// Drain whatever the server has to say within `window`, switching to a
/// short grace period once the first bytes arrive.
async fn read_available(stream: &mut TcpStream, window: Duration) -> String {
    let deadline = Instant::now() + window;
    let mut collected: Vec<u8> = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        let wait = if collected.is_empty() {
            match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => break,
            }
        } else {
            READ_GRACE
        };

        match timeout(wait, stream.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                collected.extend_from_slice(&buf[..n]);
                if collected.len() > 8192 {
                    break;
                }
            }
            _ => break,
        }
    }

    String::from_utf8_lossy(&strip_iac(&collected)).into_owned()
}

/// Drop telnet IAC command sequences, keeping escaped 0xFF data bytes.
fn strip_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != 0xFF {
            out.push(data[i]);
            i += 1;
        } else if i + 1 < data.len() && data[i + 1] == 0xFF {
            out.push(0xFF);
            i += 2;
        } else if i + 1 < data.len() && (251..=254).contains(&data[i + 1]) {
            // WILL/WONT/DO/DONT carry an option byte.
            i += 3;
        } else {
            i += 2;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fast_backend() -> TelnetLogin {
        TelnetLogin::new(
            vec!["$".into(), "welcome".into()],
            vec!["login incorrect".into(), "access denied".into()],
            Duration::from_millis(50),
        )
    }

    /// Serve one scripted telnet session: prompt for login and password,
    /// then answer with `verdict`.
    async fn scripted_server(verdict: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"login: ").await.unwrap();

            let mut buf = [0u8; 512];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"Password: ").await.unwrap();

            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(verdict.as_bytes()).await.unwrap();

            // Hold the socket open long enough for the client to read.
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        port
    }

    #[tokio::test]
    async fn shell_prompt_counts_as_success() {
        let port = scripted_server("Welcome!\nhost:~$ ").await;
        let outcome = fast_backend()
            .attempt("127.0.0.1", "root", "pw", port, Duration::from_secs(5))
            .await;
        assert_eq!(outcome, AttemptOutcome::Success);
    }

    #[tokio::test]
    async fn rejection_text_counts_as_auth_failure() {
        let port = scripted_server("Login incorrect\n").await;
        let outcome = fast_backend()
            .attempt("127.0.0.1", "root", "pw", port, Duration::from_secs(5))
            .await;
        assert_eq!(outcome, AttemptOutcome::AuthFailure);
    }

    #[tokio::test]
    async fn unmatched_text_is_reported_with_a_snippet() {
        let port = scripted_server("zzz nothing recognizable zzz").await;
        let outcome = fast_backend()
            .attempt("127.0.0.1", "root", "pw", port, Duration::from_secs(5))
            .await;
        match outcome {
            AttemptOutcome::UnknownResponse(text) => {
                assert!(text.contains("nothing recognizable"))
            }
            other => panic!("expected UnknownResponse, got {:?}", other),
        }
    }

    #[test]
    fn iac_sequences_are_stripped() {
        // IAC DO ECHO, "ok", IAC IAC escape, IAC NOP
        let raw = [0xFF, 0xFD, 0x01, b'o', b'k', 0xFF, 0xFF, 0xFF, 0xF1];
        assert_eq!(strip_iac(&raw), vec![b'o', b'k', 0xFF]);
    }
}
