//! SMTP reachability probe.
//!
//! Connects to port 25 of a mail exchanger, reads the greeting and asks for
//! the EHLO extension list to see whether STARTTLS is offered. Nothing is
//! ever sent beyond `EHLO` and `QUIT`.

use crate::error::ScanError;
use crate::result::{checks, CheckResult};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

pub const SMTP_PORT: u16 = 25;

const EHLO_NAME: &str = "starttls-check.invalid";

/// Probes mail exchangers over plain SMTP.
#[derive(Debug, Clone)]
pub struct SmtpProbe {
    timeout: Duration,
    port: u16,
}

impl SmtpProbe {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            port: SMTP_PORT,
        }
    }

    /// Probe a non-standard port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Run the connectivity check, and the STARTTLS check if the host is
    /// reachable. Returns the hostname's check tree.
    pub async fn check_hostname(&self, hostname: &str) -> CheckResult {
        let mut host = CheckResult::new(hostname);
        let mut connectivity = CheckResult::new(checks::CONNECTIVITY);

        let session = match self.connect(hostname).await {
            Ok(session) => {
                connectivity.success();
                Some(session)
            }
            Err(e) => {
                connectivity.error(format_args!("Could not connect to {}: {}", hostname, e));
                None
            }
        };
        host.add_check(connectivity);

        if let Some(mut session) = session {
            if host.subcheck_succeeded(checks::CONNECTIVITY) {
                let mut starttls = CheckResult::new(checks::STARTTLS);
                match session.ehlo(self.timeout).await {
                    Ok(extensions) if offers_starttls(&extensions) => {
                        starttls.success();
                    }
                    Ok(_) => {
                        starttls.failure("Server does not advertise STARTTLS");
                    }
                    Err(e) => {
                        starttls.error(format_args!("EHLO failed: {}", e));
                    }
                }
                host.add_check(starttls);
            }
            session.quit().await;
        }

        host
    }

    async fn connect(&self, hostname: &str) -> Result<SmtpSession, ScanError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect((hostname, self.port)))
            .await
            .map_err(|_| ScanError::timeout("SMTP connect", self.timeout))?
            .map_err(|e| ScanError::network_with_source("Connection failed", e.to_string()))?;

        let mut session = SmtpSession {
            stream: BufReader::new(stream),
        };
        let greeting = session.read_reply(self.timeout).await?;
        match greeting.first() {
            Some(line) if line.starts_with("220") => Ok(session),
            Some(line) => Err(ScanError::network(format!(
                "unexpected greeting: {}",
                line
            ))),
            None => Err(ScanError::network("empty greeting")),
        }
    }
}

struct SmtpSession {
    stream: BufReader<TcpStream>,
}

impl SmtpSession {
    /// Read a possibly multi-line reply (`250-...` continued, `250 ...` last).
    async fn read_reply(&mut self, timeout: Duration) -> Result<Vec<String>, ScanError> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let read = tokio::time::timeout(timeout, self.stream.read_line(&mut line))
                .await
                .map_err(|_| ScanError::timeout("SMTP reply", timeout))??;
            if read == 0 {
                return Err(ScanError::network("connection closed by server"));
            }
            let line = line.trim_end().to_string();
            let last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);
            if last {
                return Ok(lines);
            }
        }
    }

    async fn ehlo(&mut self, timeout: Duration) -> Result<Vec<String>, ScanError> {
        let command = format!("EHLO {}\r\n", EHLO_NAME);
        self.stream.get_mut().write_all(command.as_bytes()).await?;
        let reply = self.read_reply(timeout).await?;
        match reply.first() {
            Some(line) if line.starts_with("250") => Ok(reply),
            Some(line) => Err(ScanError::network(format!("EHLO rejected: {}", line))),
            None => Err(ScanError::network("empty EHLO reply")),
        }
    }

    async fn quit(&mut self) {
        let _ = self.stream.get_mut().write_all(b"QUIT\r\n").await;
    }
}

fn offers_starttls(extensions: &[String]) -> bool {
    extensions
        .iter()
        .filter_map(|line| line.get(4..))
        .any(|ext| ext.trim().eq_ignore_ascii_case("STARTTLS"))
}
