//! Unix socket control plane for live rule updates.
//!
//! The wire protocol is plain text. A client connects, writes one
//! update in either accepted grammar, and shuts down its write half.
//! The server applies the update and answers with a single line,
//! `OK <active rule>` or `ERR <reason>`, then closes the connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

use crate::config::RuleStore;
use crate::error::{Error, Result};
use crate::telemetry::EngineMetrics;

/// Rule text is tiny; anything near this size is not a rule update.
const MAX_UPDATE_LEN: u64 = 4096;

/// Accepts rule updates over a Unix domain socket.
#[derive(Debug)]
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
    store: Arc<RuleStore>,
    metrics: Arc<EngineMetrics>,
}

impl ControlServer {
    /// Bind the control socket, clearing a stale file left behind by
    /// a previous run. Fails if another process is listening.
    pub async fn bind(
        path: impl AsRef<Path>,
        store: Arc<RuleStore>,
        metrics: Arc<EngineMetrics>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Self::clear_stale_socket(&path).await?;

        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "control socket listening");

        Ok(Self {
            listener,
            path,
            store,
            metrics,
        })
    }

    /// If a socket file already exists at `path`, probe it: a
    /// successful connect means another instance owns it, anything
    /// else means the file is stale and can be removed.
    async fn clear_stale_socket(path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        match UnixStream::connect(path).await {
            Ok(_) => Err(Error::Config(format!(
                "control socket {} is already in use by another process",
                path.display()
            ))),
            Err(_) => {
                info!(path = %path.display(), "removing stale control socket");
                tokio::fs::remove_file(path).await?;
                Ok(())
            }
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }

    /// Serve updates until the task is dropped. Connections are
    /// handled one at a time, so concurrent clients cannot interleave
    /// partial updates.
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    if let Err(e) = self.handle_client(stream).await {
                        warn!(error = %e, "control connection failed");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "control accept error");
                }
            }
        }
    }

    async fn handle_client(&self, mut stream: UnixStream) -> Result<()> {
        let mut text = String::new();
        (&mut stream)
            .take(MAX_UPDATE_LEN)
            .read_to_string(&mut text)
            .await?;

        let reply = if text.len() as u64 >= MAX_UPDATE_LEN {
            self.metrics.reloads_rejected.inc();
            warn!(len = text.len(), "rule update rejected: too large");
            "ERR update too large\n".to_string()
        } else {
            match self.store.reload(&text) {
                Ok(rule) => {
                    self.metrics.reloads_applied.inc();
                    info!(%rule, "rule updated");
                    format!("OK {rule}\n")
                }
                Err(e) => {
                    self.metrics.reloads_rejected.inc();
                    warn!(error = %e, "rule update rejected");
                    format!("ERR {e}\n")
                }
            }
        };

        stream.write_all(reply.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Send one update to a running instance and return its reply line.
pub async fn send_update(path: impl AsRef<Path>, update: &str) -> Result<String> {
    let mut stream = UnixStream::connect(path.as_ref()).await?;
    stream.write_all(update.as_bytes()).await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    Ok(reply.trim_end().to_string())
}
