use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::brute::{AttemptOutcome, LoginAttempt};

// Server error codes that mean "the credentials were rejected":
// ER_ACCESS_DENIED_ERROR and ER_ACCESS_DENIED_NO_PASSWORD_ERROR.
const ACCESS_DENIED: u16 = 1045;
const ACCESS_DENIED_PLUGIN: u16 = 1698;

/// MySQL authentication through the blocking `mysql` client, driven on the
/// blocking pool with an outer async timeout.
pub struct MysqlLogin;

#[async_trait]
impl LoginAttempt for MysqlLogin {
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
            Ok(Err(join_err)) => {
                AttemptOutcome::ConnectionError(format!("mysql task failed: {}", join_err))
            }
            Err(_) => AttemptOutcome::ConnectionError("mysql attempt timed out".to_string()),
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
    let opts = mysql::OptsBuilder::new()
        .ip_or_hostname(Some(host))
        .tcp_port(port)
        .user(Some(username))
        .pass(Some(password))
        .tcp_connect_timeout(Some(timeout_dur))
        .read_timeout(Some(timeout_dur))
        .write_timeout(Some(timeout_dur));

    match mysql::Conn::new(opts) {
        // Authenticated; dropping the connection closes it.
        Ok(conn) => {
            drop(conn);
            AttemptOutcome::Success
        }
        Err(mysql::Error::MySqlError(server_err))
            if server_err.code == ACCESS_DENIED || server_err.code == ACCESS_DENIED_PLUGIN =>
        {
            AttemptOutcome::AuthFailure
        }
        Err(e) => AttemptOutcome::ConnectionError(e.to_string()),
    }
}
