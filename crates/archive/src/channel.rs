//! Blocking `Write` end of a bounded byte channel.

use std::io::{self, Write};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::ARCHIVE_CHUNK_SIZE;

/// Collects written bytes into chunks and sends them to an async consumer.
///
/// Must be used from a blocking context (e.g. `spawn_blocking`). Once the
/// receiver is gone every write fails with `BrokenPipe`.
pub(crate) struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
}

impl ChannelWriter {
    pub(crate) fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(ARCHIVE_CHUNK_SIZE),
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(ARCHIVE_CHUNK_SIZE),
        ));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive consumer went away"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.tx.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive consumer went away",
            ));
        }
        self.buf.extend_from_slice(data);
        if self.buf.len() >= ARCHIVE_CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
