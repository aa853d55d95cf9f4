//! FTP-over-TLS adapter (suppaftp).
//!
//! Implements the `pzb-core` remote store ports. suppaftp's client is
//! synchronous, so every call runs on the blocking pool with socket read/write
//! timeouts set on both the control and the data connections; the publisher
//! additionally bounds each step on the async side.

use std::{
    fs::File,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    path::Path,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use rustls::ClientConfig;
use suppaftp::{types::FileType, FtpError, RustlsConnector, RustlsFtpStream};

use pzb_core::{
    credentials::CredentialRecord,
    errors::Error,
    publish::{RemoteConnector, RemoteSession},
    Result,
};

pub mod tls;

pub use tls::CertPolicy;

/// Opens explicit-TLS FTP sessions (AUTH TLS, then PBSZ/PROT P for data).
#[derive(Clone)]
pub struct FtpConnector {
    tls: Arc<ClientConfig>,
}

impl FtpConnector {
    pub fn new(policy: CertPolicy) -> Result<Self> {
        if policy == CertPolicy::AcceptAny {
            tracing::warn!("FTP server certificates will not be verified");
        }
        Ok(Self {
            tls: tls::client_config(policy)?,
        })
    }
}

#[async_trait]
impl RemoteConnector for FtpConnector {
    async fn connect(
        &self,
        creds: &CredentialRecord,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>> {
        let creds = creds.clone();
        let tls = self.tls.clone();
        let host = creds.host.clone();

        let (stream, control) =
            tokio::task::spawn_blocking(move || open_session(&creds, tls, timeout))
                .await
                .map_err(|e| Error::External(format!("ftp worker failed: {e}")))??;

        tracing::info!(host = %host, "ftp session established");
        Ok(Box::new(FtpSession {
            stream: Some(stream),
            control,
        }))
    }
}

/// Returns the logged-in stream and a handle on its control socket.
fn open_session(
    creds: &CredentialRecord,
    tls: Arc<ClientConfig>,
    timeout: Duration,
) -> Result<(RustlsFtpStream, TcpStream)> {
    let tcp = connect_tcp(&creds.host, creds.port, timeout)?;
    tcp.set_read_timeout(Some(timeout))?;
    tcp.set_write_timeout(Some(timeout))?;
    let control = tcp.try_clone()?;

    let plain = RustlsFtpStream::connect_with_stream(tcp)
        .map_err(|e| map_ftp_error("greeting", e))?
        .passive_stream_builder(move |addr| open_data_stream(addr, timeout));
    let mut ftp = plain
        .into_secure(RustlsConnector::from(tls), &creds.host)
        .map_err(|e| map_ftp_error("AUTH TLS", e))?;
    ftp.login(creds.user.as_str(), creds.password.as_str())
        .map_err(|e| map_ftp_error("login", e))?;
    Ok((ftp, control))
}

/// Passive-mode data connection, under the same limits as the control socket.
fn open_data_stream(
    addr: SocketAddr,
    timeout: Duration,
) -> std::result::Result<TcpStream, FtpError> {
    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(FtpError::ConnectionError)?;
    tcp.set_read_timeout(Some(timeout))
        .and_then(|_| tcp.set_write_timeout(Some(timeout)))
        .map_err(FtpError::ConnectionError)?;
    Ok(tcp)
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::Connection(format!("cannot resolve {host}: {e}")))?
        .collect();

    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(s) => return Ok(s),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(match last_err {
        Some(e) => classify_io(&format!("connect to {host}:{port}"), &e),
        None => Error::Connection(format!("{host} resolved to no addresses")),
    })
}

struct FtpSession {
    /// `None` once closed, or while an operation is in flight on the blocking pool.
    stream: Option<RustlsFtpStream>,
    /// Same socket as the stream's control connection. Shutting it down
    /// unblocks a worker that still holds `stream`.
    control: TcpStream,
}

impl FtpSession {
    async fn run<T, F>(&mut self, what: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RustlsFtpStream) -> std::result::Result<T, FtpError> + Send + 'static,
    {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| Error::Connection(format!("{what}: session is closed")))?;

        let (stream, res) = tokio::task::spawn_blocking(move || {
            let res = op(&mut stream);
            (stream, res)
        })
        .await
        .map_err(|e| Error::External(format!("ftp worker failed: {e}")))?;

        self.stream = Some(stream);
        res.map_err(|e| map_ftp_error(what, e))
    }
}

#[async_trait]
impl RemoteSession for FtpSession {
    async fn cwd(&mut self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.run("CWD", move |ftp| ftp.cwd(path.as_str())).await
    }

    async fn put(&mut self, name: &str, local: &Path) -> Result<u64> {
        let name = name.to_string();
        let mut file = File::open(local)?;
        self.run("STOR", move |ftp| {
            ftp.transfer_type(FileType::Binary)?;
            ftp.put_file(name.as_str(), &mut file)
        })
        .await
    }

    async fn list_names(&mut self) -> Result<Vec<String>> {
        self.run("NLST", |ftp| ftp.nlst(None)).await
    }

    async fn delete(&mut self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.run("DELE", move |ftp| ftp.rm(name.as_str())).await
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let from = from.to_string();
        let to = to.to_string();
        self.run("RNFR/RNTO", move |ftp| ftp.rename(from.as_str(), to.as_str()))
            .await
    }

    async fn quit(&mut self) -> Result<()> {
        self.run("QUIT", |ftp| ftp.quit()).await?;
        self.stream = None;
        Ok(())
    }

    fn abort(&mut self) {
        self.stream = None;
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            tracing::debug!(error = %e, "control socket already closed");
        }
    }
}

/// Map a client error to the core taxonomy.
///
/// Permanent (5xx) replies become `Permission`, timed-out socket I/O becomes
/// `Timeout`, everything else is a `Connection` failure.
pub fn map_ftp_error(what: &str, err: FtpError) -> Error {
    match err {
        FtpError::UnexpectedResponse(resp) => {
            let text = String::from_utf8_lossy(&resp.body);
            let code = leading_code(&text).unwrap_or_else(|| resp.status.code());
            classify_reply(what, code, &text)
        }
        FtpError::ConnectionError(io) => classify_io(what, &io),
        other => Error::Connection(format!("{what}: {other}")),
    }
}

/// Reply code as sent on the wire, e.g. `550` from `"550 No such file"`.
fn leading_code(text: &str) -> Option<u32> {
    let digits = text.trim_start().get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn classify_reply(what: &str, code: u32, text: &str) -> Error {
    let text = text.trim();
    let code_str = code.to_string();
    let reply = if text.starts_with(&code_str) {
        text.to_string()
    } else {
        format!("{code_str} {text}")
    };
    if (500..600).contains(&code) {
        Error::Permission(reply)
    } else {
        Error::Connection(format!("{what}: unexpected reply {reply}"))
    }
}

pub fn classify_io(what: &str, err: &std::io::Error) -> Error {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            Error::Timeout(format!("{what}: {err}"))
        }
        _ => Error::Connection(format!("{what}: {err}")),
    }
}
