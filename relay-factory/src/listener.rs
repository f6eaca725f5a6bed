//! Listening transports workers dial back into

use std::io;

use async_trait::async_trait;
use relay_config::ListenAddress;
use relay_ipc::RelayStream;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tracing::debug;

use crate::error::{FactoryError, FactoryResult};

/// Connection-oriented listener the acceptance loop pulls connections from
#[async_trait]
pub trait RelayListener: Send + Sync + 'static {
    type Stream: RelayStream + 'static;

    /// Accept the next connection together with a printable peer name
    async fn accept_stream(&self) -> io::Result<(Self::Stream, String)>;
}

#[async_trait]
impl RelayListener for TcpListener {
    type Stream = tokio::net::TcpStream;

    async fn accept_stream(&self) -> io::Result<(Self::Stream, String)> {
        let (stream, addr) = self.accept().await?;
        // Per-connection option; a failure here must not end the accept loop.
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %addr, error = %e, "failed to set TCP_NODELAY");
        }
        Ok((stream, addr.to_string()))
    }
}

#[cfg(unix)]
#[async_trait]
impl RelayListener for UnixListener {
    type Stream = tokio::net::UnixStream;

    async fn accept_stream(&self) -> io::Result<(Self::Stream, String)> {
        let (stream, addr) = self.accept().await?;
        let peer = addr
            .as_pathname()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unix:unnamed".to_string());
        Ok((stream, peer))
    }
}

/// Listener bound from a [`ListenAddress`]
#[derive(Debug)]
pub enum BoundListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl BoundListener {
    /// Bind the configured address.
    ///
    /// A stale Unix socket file left by a previous run is removed first; any
    /// other file at that path is left alone and binding fails.
    pub async fn bind(address: &ListenAddress) -> FactoryResult<Self> {
        match address {
            ListenAddress::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|e| FactoryError::BindError(format!("{}: {}", address, e)))?;
                Ok(BoundListener::Tcp(listener))
            }
            #[cfg(unix)]
            ListenAddress::Unix(path) => {
                use std::os::unix::fs::FileTypeExt;

                if let Ok(meta) = std::fs::symlink_metadata(path) {
                    if meta.file_type().is_socket() {
                        debug!(path = %path.display(), "removing stale socket file");
                        std::fs::remove_file(path)
                            .map_err(|e| FactoryError::BindError(format!("{}: {}", address, e)))?;
                    }
                }

                let listener = UnixListener::bind(path)
                    .map_err(|e| FactoryError::BindError(format!("{}: {}", address, e)))?;
                Ok(BoundListener::Unix(listener))
            }
            #[cfg(not(unix))]
            ListenAddress::Unix(_) => Err(FactoryError::BindError(format!(
                "{}: unix sockets are not supported on this platform",
                address
            ))),
        }
    }

    /// Address workers should dial, with the OS-assigned port filled in
    pub fn local_address(&self) -> FactoryResult<ListenAddress> {
        match self {
            BoundListener::Tcp(listener) => {
                let addr = listener
                    .local_addr()
                    .map_err(|e| FactoryError::BindError(e.to_string()))?;
                Ok(ListenAddress::Tcp(addr.to_string()))
            }
            #[cfg(unix)]
            BoundListener::Unix(listener) => {
                let addr = listener
                    .local_addr()
                    .map_err(|e| FactoryError::BindError(e.to_string()))?;
                addr.as_pathname()
                    .map(|p| ListenAddress::Unix(p.to_path_buf()))
                    .ok_or_else(|| FactoryError::BindError("unnamed unix socket".to_string()))
            }
        }
    }
}

#[async_trait]
impl RelayListener for BoundListener {
    type Stream = Box<dyn RelayStream>;

    async fn accept_stream(&self) -> io::Result<(Self::Stream, String)> {
        match self {
            BoundListener::Tcp(listener) => {
                let (stream, peer) = listener.accept_stream().await?;
                Ok((Box::new(stream) as Box<dyn RelayStream>, peer))
            }
            #[cfg(unix)]
            BoundListener::Unix(listener) => {
                let (stream, peer) = listener.accept_stream().await?;
                Ok((Box::new(stream) as Box<dyn RelayStream>, peer))
            }
        }
    }
}

/// Connect to a supervisor listening on `address` (worker side)
pub async fn connect(address: &ListenAddress) -> io::Result<Box<dyn RelayStream>> {
    match address {
        ListenAddress::Tcp(addr) => {
            let stream = tokio::net::TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        ListenAddress::Unix(path) => Ok(Box::new(tokio::net::UnixStream::connect(path).await?)),
        #[cfg(not(unix))]
        ListenAddress::Unix(_) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not supported on this platform",
        )),
    }
}
