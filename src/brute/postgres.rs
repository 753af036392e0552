use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;

use crate::brute::{AttemptOutcome, LoginAttempt};

/// PostgreSQL authentication through `tokio-postgres`. A connection attempt
/// against a fixed maintenance database is enough to test the credentials.
pub struct PostgresLogin {
    dbname: String,
}

impl PostgresLogin {
    pub fn new(dbname: &str) -> Self {
        PostgresLogin {
            dbname: dbname.to_string(),
        }
    }
}

#[async_trait]
impl LoginAttempt for PostgresLogin {
    async fn attempt(
        &self,
        host: &str,
        username: &str,
        password: &str,
        port: u16,
        timeout_dur: Duration,
    ) -> AttemptOutcome {
        let mut config = tokio_postgres::Config::new();
        config
            .host(host)
            .port(port)
            .user(username)
            .password(password)
            .dbname(&self.dbname)
            .connect_timeout(timeout_dur);

        match timeout(timeout_dur, config.connect(NoTls)).await {
            // Dropping client and connection future tears the session down.
            Ok(Ok((client, connection))) => {
                drop(client);
                drop(connection);
                AttemptOutcome::Success
            }
            Ok(Err(e)) => {
                if is_auth_rejection(&e) {
                    AttemptOutcome::AuthFailure
                } else {
                    AttemptOutcome::ConnectionError(e.to_string())
                }
            }
            Err(_) => AttemptOutcome::ConnectionError("postgres attempt timed out".to_string()),
        }
    }
}

fn is_auth_rejection(e: &tokio_postgres::Error) -> bool {
    matches!(
        e.code(),
        Some(code)
            if *code == SqlState::INVALID_PASSWORD
                || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION
    )
}
