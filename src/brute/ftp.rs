use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::brute::{snippet, AttemptOutcome, LoginAttempt};

/// FTP USER/PASS authentication over a raw control connection.
///
/// Reply codes give a structured verdict: 230 accepts, 530 rejects, anything
/// else is surfaced as an unknown response.
pub struct FtpLogin;

#[async_trait]
impl LoginAttempt for FtpLogin {
    async fn attempt(
        &self,
        host: &str,
        username: &str,
        password: &str,
        port: u16,
        timeout_dur: Duration,
    ) -> AttemptOutcome {
        match timeout(timeout_dur, try_login(host, username, password, port)).await {
            Ok(outcome) => outcome,
            Err(_) => AttemptOutcome::ConnectionError("ftp attempt timed out".to_string()),
        }
    }
}

async fn try_login(host: &str, username: &str, password: &str, port: u16) -> AttemptOutcome {
    let addr = format!("{}:{}", host, port);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => return AttemptOutcome::ConnectionError(e.to_string()),
    };

    let banner = match read_reply(&mut stream).await {
        Ok(banner) => banner,
        Err(e) => return AttemptOutcome::ConnectionError(format!("reading banner: {}", e)),
    };
    if !banner.starts_with("220") {
        return AttemptOutcome::UnknownResponse(snippet(&banner, 200));
    }

    if let Err(e) = send_command(&mut stream, &format!("USER {}", username)).await {
        return AttemptOutcome::ConnectionError(e.to_string());
    }
    let reply = match read_reply(&mut stream).await {
        Ok(reply) => reply,
        Err(e) => return AttemptOutcome::ConnectionError(format!("after USER: {}", e)),
    };

    // 230 straight after USER: account without a password.
    if reply.starts_with("230") {
        let _ = send_command(&mut stream, "QUIT").await;
        return AttemptOutcome::Success;
    }
    if reply.starts_with("530") {
        return AttemptOutcome::AuthFailure;
    }
    if !reply.starts_with("331") {
        return AttemptOutcome::UnknownResponse(snippet(&reply, 200));
    }

    if let Err(e) = send_command(&mut stream, &format!("PASS {}", password)).await {
        return AttemptOutcome::ConnectionError(e.to_string());
    }
    let verdict = match read_reply(&mut stream).await {
        Ok(verdict) => verdict,
        Err(e) => return AttemptOutcome::ConnectionError(format!("after PASS: {}", e)),
    };

    if verdict.starts_with("230") {
        // Log out before closing so the server does not hold the session.
        let _ = send_command(&mut stream, "QUIT").await;
        AttemptOutcome::Success
    } else if verdict.starts_with("530") {
        AttemptOutcome::AuthFailure
    } else {
        AttemptOutcome::UnknownResponse(snippet(&verdict, 200))
    }
}

async fn send_command(stream: &mut TcpStream, command: &str) -> std::io::Result<()> {
    stream.write_all(format!("{}\r\n", command).as_bytes()).await
}

async fn read_reply(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = vec![0u8; 1024];
    let n = stream.read(&mut buffer).await?;
    if n == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "server closed the connection",
        ));
    }
    Ok(String::from_utf8_lossy(&buffer[..n]).into_owned())
}
