use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use ssh2::{ErrorCode, Session};
use tokio::time::timeout;

use crate::brute::{AttemptOutcome, LoginAttempt};

// libssh2: LIBSSH2_ERROR_AUTHENTICATION_FAILED
const AUTHENTICATION_FAILED: i32 = -18;

/// SSH password authentication through libssh2. The handshake is blocking,
/// so each attempt runs on the blocking pool with an outer async timeout.
pub struct SshLogin;

#[async_trait]
impl LoginAttempt for SshLogin {
    async fn attempt(
        &self,
        host: &str,
        username: &str,
        password: &str,
        port: u16,
        timeout_dur: Duration,
    ) -> AttemptOutcome {
        let host = host.to_string();
        let username = username.to_string();
        let password = password.to_string();

        let task = tokio::task::spawn_blocking(move || {
            try_login(&host, &username, &password, port, timeout_dur)
        });

        match timeout(timeout_dur, task).await {
            Ok(Ok(outcome)) => outcome,
            // A panicking client task counts as a failed attempt, not a crash.
            Ok(Err(join_err)) => {
                AttemptOutcome::ConnectionError(format!("ssh task failed: {}", join_err))
            }
            Err(_) => AttemptOutcome::ConnectionError("ssh attempt timed out".to_string()),
        }
    }
}

fn try_login(
    host: &str,
    username: &str,
    password: &str,
    port: u16,
    timeout_dur: Duration,
) -> AttemptOutcome {
    let addr = match (host, port).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                return AttemptOutcome::ConnectionError(format!("{} did not resolve", host))
            }
        },
        Err(e) => return AttemptOutcome::ConnectionError(format!("resolving {}: {}", host, e)),
    };

    let tcp = match TcpStream::connect_timeout(&addr, timeout_dur) {
        Ok(tcp) => tcp,
        Err(e) => return AttemptOutcome::ConnectionError(e.to_string()),
    };
    let _ = tcp.set_read_timeout(Some(timeout_dur));
    let _ = tcp.set_write_timeout(Some(timeout_dur));

    let mut session = match Session::new() {
        Ok(session) => session,
        Err(e) => return AttemptOutcome::ConnectionError(e.to_string()),
    };
    session.set_tcp_stream(tcp);

    if let Err(e) = session.handshake() {
        return AttemptOutcome::ConnectionError(format!("handshake: {}", e));
    }
    trace!("ssh handshake complete with {}:{}", host, port);

    match session.userauth_password(username, password) {
        Ok(()) => {
            // The session (and its TCP stream) is dropped on return; a polite
            // disconnect is attempted first.
            let _ = session.disconnect(None, "done", None);
            AttemptOutcome::Success
        }
        Err(e) => match e.code() {
            ErrorCode::Session(AUTHENTICATION_FAILED) => AttemptOutcome::AuthFailure,
            _ => AttemptOutcome::ConnectionError(e.to_string()),
        },
    }
}
