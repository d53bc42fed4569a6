//! In-memory transport for tests and simulations.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use super::{Channel, Transport};
use crate::codec::MessageCodec;
use crate::message::Message;

#[derive(Debug, Default)]
struct MemoryNetwork {
    /// Every successful write, in order: (address, bytes).
    sent: Vec<(String, Vec<u8>)>,
    fail_connect: bool,
    fail_write: bool,
    connects: usize,
    closes: usize,
}

/// Transport that records writes instead of sending them.
///
/// Clones share the same recorded traffic and fault switches, so a test can
/// keep one handle while the peer owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    network: Rc<RefCell<MemoryNetwork>>,
}

impl MemoryTransport {
    /// Create a transport with no recorded traffic and no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail.
    pub fn set_connect_failure(&self, fail: bool) {
        self.network.borrow_mut().fail_connect = fail;
    }

    /// Make subsequent `write` calls fail.
    pub fn set_write_failure(&self, fail: bool) {
        self.network.borrow_mut().fail_write = fail;
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> usize {
        self.network.borrow().connects
    }

    /// Number of channel closes (including closes after a failed connect).
    pub fn close_count(&self) -> usize {
        self.network.borrow().closes
    }

    /// Raw bytes written so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.network
            .borrow()
            .sent
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    /// Number of writes recorded so far.
    pub fn sent_count(&self) -> usize {
        self.network.borrow().sent.len()
    }

    /// Decode every recorded write as a [`Message`], skipping garbage.
    pub fn sent_messages<C: MessageCodec>(&self, codec: &C) -> Vec<Message> {
        self.network
            .borrow()
            .sent
            .iter()
            .filter_map(|(_, bytes)| codec.decode(bytes).ok())
            .collect()
    }

    /// Forget recorded writes.
    pub fn clear(&self) {
        self.network.borrow_mut().sent.clear();
    }
}

impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    fn open(&self) -> MemoryChannel {
        MemoryChannel {
            network: self.network.clone(),
            address: None,
            closed: false,
        }
    }
}

/// Channel produced by [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryChannel {
    network: Rc<RefCell<MemoryNetwork>>,
    address: Option<String>,
    closed: bool,
}

impl Channel for MemoryChannel {
    fn connect(&mut self, address: &str) -> io::Result<()> {
        let mut network = self.network.borrow_mut();
        if network.fail_connect {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("connection to {} refused", address),
            ));
        }
        network.connects += 1;
        self.address = Some(address.to_string());
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let address = match (&self.address, self.closed) {
            (Some(address), false) => address.clone(),
            _ => return Err(io::Error::from(io::ErrorKind::NotConnected)),
        };
        let mut network = self.network.borrow_mut();
        if network.fail_write {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        network.sent.push((address, bytes.to_vec()));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.network.borrow_mut().closes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;

    #[test]
    fn test_write_records_bytes() {
        let transport = MemoryTransport::new();
        let mut channel = transport.open();
        channel.connect("10.0.0.1:4000").unwrap();
        channel.write(b"abc").unwrap();

        assert_eq!(transport.connect_count(), 1);
        assert_eq!(transport.sent(), vec![b"abc".to_vec()]);
    }

    #[test]
    fn test_write_requires_connect() {
        let transport = MemoryTransport::new();
        let mut channel = transport.open();
        let err = channel.write(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_faults() {
        let transport = MemoryTransport::new();
        transport.set_connect_failure(true);
        let mut channel = transport.open();
        assert!(channel.connect("10.0.0.1:4000").is_err());

        transport.set_connect_failure(false);
        transport.set_write_failure(true);
        channel.connect("10.0.0.1:4000").unwrap();
        assert_eq!(
            channel.write(b"abc").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let transport = MemoryTransport::new();
        let mut channel = transport.open();
        channel.connect("10.0.0.1:4000").unwrap();
        channel.close();
        channel.close();

        assert_eq!(transport.close_count(), 1);
        assert!(channel.write(b"abc").is_err());
    }

    #[test]
    fn test_sent_messages_decodes() {
        let transport = MemoryTransport::new();
        let mut channel = transport.open();
        channel.connect("10.0.0.1:4000").unwrap();
        channel
            .write(&JsonCodec.encode(&Message::Heartbeat).unwrap())
            .unwrap();
        channel.write(b"garbage").unwrap();

        assert_eq!(
            transport.sent_messages(&JsonCodec),
            vec![Message::Heartbeat]
        );
        transport.clear();
        assert_eq!(transport.sent_count(), 0);
    }
}
