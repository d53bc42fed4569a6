//! Push-style TCP transport.
//!
//! `connect` returns immediately: the actual TCP connect happens in a
//! background writer task which then drains queued frames in order. If the
//! connect or a write fails, the writer exits and the next `write` on the
//! channel reports `BrokenPipe`, which makes the owning peer drop the
//! channel and open a fresh one on its next send.
//!
//! The queue between `write` and the writer task holds at most
//! `max_queue_size` frames. A remote that accepts but never reads, or a
//! connect that hangs, fills it and `write` fails with `WouldBlock`.

use std::io;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::wire::serialize_frame;
use super::{Channel, Transport};
use crate::task::{TaskProvider, TokioTaskProvider};

/// Frames a channel queues before `write` pushes back.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// TCP transport backed by Tokio.
///
/// Channels spawn their writer with `spawn_local`, so they must be connected
/// from within a `tokio::task::LocalSet`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    task: TokioTaskProvider,
    max_queue_size: usize,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::with_max_queue_size(DEFAULT_MAX_QUEUE_SIZE)
    }
}

impl TcpTransport {
    /// Create a TCP transport with the default queue bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a TCP transport whose channels queue at most
    /// `max_queue_size` frames (at least one).
    pub fn with_max_queue_size(max_queue_size: usize) -> Self {
        Self {
            task: TokioTaskProvider,
            max_queue_size: max_queue_size.max(1),
        }
    }

    /// Queue bound applied to every channel.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }
}

impl Transport for TcpTransport {
    type Channel = TcpChannel;

    fn open(&self) -> TcpChannel {
        TcpChannel {
            task: self.task.clone(),
            max_queue_size: self.max_queue_size,
            sender: None,
            writer_handle: None,
        }
    }
}

/// Channel produced by [`TcpTransport`].
#[derive(Debug)]
pub struct TcpChannel {
    task: TokioTaskProvider,
    max_queue_size: usize,
    sender: Option<mpsc::Sender<Vec<u8>>>,
    writer_handle: Option<JoinHandle<()>>,
}

impl TcpChannel {
    /// Whether the background writer is still running.
    pub fn is_open(&self) -> bool {
        self.sender.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

fn check_address(address: &str) -> io::Result<()> {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid address {:?}, expected host:port", address),
        )),
    }
}

impl Channel for TcpChannel {
    fn connect(&mut self, address: &str) -> io::Result<()> {
        check_address(address)?;
        if self.sender.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "channel already connected",
            ));
        }

        let (tx, rx) = mpsc::channel(self.max_queue_size);
        let handle = self
            .task
            .spawn_task("tcp_writer", writer_task(address.to_string(), rx));
        self.sender = Some(tx);
        self.writer_handle = Some(handle);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let frame =
            serialize_frame(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("tcp writer queue full ({} frames)", self.max_queue_size),
            ),
            TrySendError::Closed(_) => {
                io::Error::new(io::ErrorKind::BrokenPipe, "tcp writer stopped")
            }
        })
    }

    fn close(&mut self) {
        // Dropping the sender lets the writer flush what is queued and exit.
        self.sender = None;
        self.writer_handle = None;
    }
}

async fn writer_task(address: String, mut rx: mpsc::Receiver<Vec<u8>>) {
    let mut stream = match TcpStream::connect(&address).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(%address, error = %e, "tcp_writer: connect failed");
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%address, error = %e, "tcp_writer: set_nodelay failed");
    }
    tracing::debug!(%address, "tcp_writer: connected");

    while let Some(frame) = rx.recv().await {
        if let Err(e) = stream.write_all(&frame).await {
            tracing::warn!(%address, error = %e, "tcp_writer: write failed");
            return;
        }
    }

    let _ = stream.shutdown().await;
    tracing::debug!(%address, "tcp_writer: closed");
}
