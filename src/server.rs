//! TCP echo server.
//!
//! Accepts connections and writes back every chunk it reads, unchanged,
//! until the peer closes or an I/O error occurs. There is no framing.

use crate::config::ServerSettings;
use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace};

/// Largest chunk read from a connection in one go.
const BUFFER_SIZE: usize = 16 * 1024;

/// Echo server instance
pub struct EchoServer {
    listener: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl EchoServer {
    /// Bind the listening socket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(settings: &ServerSettings) -> io::Result<Self> {
        let listener = create_listener(settings.listen, settings.backlog)?;

        Ok(EchoServer {
            listener: TcpListener::from_std(listener)?,
            connection_limit: Arc::new(Semaphore::new(settings.max_connections)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and echo connections until the task is dropped.
    pub async fn run(self) -> io::Result<()> {
        info!(address = %self.local_addr()?, "Server listening");

        loop {
            // Wait for a connection slot
            let permit = match self.connection_limit.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Ok(()),
            };

            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream).await {
                            debug!(peer = %addr, error = %e, "Connection error");
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Echo one client connection until it closes.
async fn handle_connection(mut stream: TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

    loop {
        buffer.clear();
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            trace!("Connection closed by client");
            return Ok(());
        }
        stream.write_all(&buffer).await?;
    }
}

/// Create a TCP listener with SO_REUSEADDR and the given backlog.
fn create_listener(addr: SocketAddr, backlog: u32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;

    Ok(socket.into())
}
