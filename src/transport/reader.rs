//! Background reader for PTY output.
//!
//! PTY reads block, so each process gets a reader thread that forwards
//! chunks through a channel. The shell drains the channel without blocking
//! when it is pumped.

use std::io::Read;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::Result;

/// Channel capacity, in chunks.
const CHANNEL_CAPACITY: usize = 64;

/// Default read buffer size.
const READ_BUFFER_SIZE: usize = 4096;

/// What a drain of the channel produced.
#[derive(Debug, Default)]
pub(crate) struct Drained {
    /// Bytes received, concatenated in order.
    pub data: Vec<u8>,
    /// The reader reached end of stream.
    pub eof: bool,
}

/// Receiving side of a PTY reader thread.
pub(crate) struct PtyReader {
    rx: mpsc::Receiver<Vec<u8>>,
    eof: bool,
}

impl PtyReader {
    /// Start a reader thread for `reader`.
    pub fn spawn<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || read_loop(reader, tx))?;

        Ok(Self { rx, eof: false })
    }

    /// Take everything currently buffered without blocking.
    pub fn drain(&mut self) -> Drained {
        let mut drained = Drained {
            data: Vec::new(),
            eof: self.eof,
        };

        loop {
            match self.rx.try_recv() {
                Ok(chunk) => drained.data.extend_from_slice(&chunk),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.eof = true;
                    drained.eof = true;
                    break;
                }
            }
        }

        drained
    }
}

fn read_loop<R: Read>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("PTY reader: EOF");
                break;
            }
            Ok(n) => {
                trace!("PTY reader: read {} bytes", n);
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    debug!("PTY reader: channel closed");
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // EIO on Unix means the slave side closed
                #[cfg(unix)]
                if e.raw_os_error() == Some(libc::EIO) {
                    debug!("PTY reader: PTY closed (EIO)");
                    break;
                }

                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    debug!("PTY reader: broken pipe");
                    break;
                }

                error!("PTY reader error: {}", e);
                break;
            }
        }
    }
}
