//! Writer adapter: streamed text in, one monitor update per line out.
//!
//! ```text
//! program stdout ──▶ MonitorWriter ──▶ LineSplitter ──▶ MonitorStore::write
//!                         │                                    │
//!                         └── tee (unchanged bytes)            └──▶ MonitorUpdate
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::WriterError;
use crate::lines::LineSplitter;
use crate::store::MonitorStore;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// A line committed to the store by a [`MonitorWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorUpdate {
    /// The monitor that was written.
    pub name: String,
    /// The line that became its text.
    pub text: String,
    /// The monitor's update count after this write.
    pub updates: u64,
}

/// Updates one monitor from a stream of text, one write per line.
///
/// Chunks are processed in the order they are given. The first failed
/// store write is returned to the caller and leaves the writer poisoned:
/// nothing is retried and every later call fails.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kwikemon::{MemoryBackend, MonitorStore};
///
/// # tokio_test::block_on(async {
/// let store = MonitorStore::new(Arc::new(MemoryBackend::new()));
/// let mut writer = store.writer("deploy", None);
///
/// writer.write(b"fetching\nbuil").await.unwrap();
/// writer.write(b"ding\n").await.unwrap();
///
/// let monitor = store.read("deploy").await.unwrap();
/// assert_eq!(monitor.text, "building");
/// assert_eq!(monitor.updates, 2);
/// # });
/// ```
#[derive(Debug)]
pub struct MonitorWriter {
    store: MonitorStore,
    name: String,
    ttl: Option<i64>,
    lines: LineSplitter,
    notifier: Option<mpsc::UnboundedSender<MonitorUpdate>>,
    poisoned: bool,
}

impl MonitorWriter {
    /// Create a writer for `name`. `ttl` is passed to every write.
    pub fn new(store: MonitorStore, name: &str, ttl: Option<i64>) -> Self {
        Self {
            store,
            name: name.to_string(),
            ttl,
            lines: LineSplitter::new(),
            notifier: None,
            poisoned: false,
        }
    }

    /// Also send every committed update on `sender`.
    ///
    /// A closed receiver is ignored.
    pub fn with_notifier(mut self, sender: mpsc::UnboundedSender<MonitorUpdate>) -> Self {
        self.notifier = Some(sender);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feed a chunk of output, writing each line it completes.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<Vec<MonitorUpdate>, WriterError> {
        self.check_poisoned()?;
        let mut updates = Vec::new();
        for line in self.lines.feed(chunk) {
            updates.push(self.commit(line).await?);
        }
        Ok(updates)
    }

    /// Write any unterminated trailing line, as at end of stream.
    pub async fn finish(&mut self) -> Result<Option<MonitorUpdate>, WriterError> {
        self.check_poisoned()?;
        match self.lines.finish() {
            Some(line) => Ok(Some(self.commit(line).await?)),
            None => Ok(None),
        }
    }

    /// Read `reader` to the end, updating the monitor per line.
    ///
    /// Returns the number of bytes read.
    pub async fn pump<R>(&mut self, reader: R) -> Result<u64, WriterError>
    where
        R: AsyncRead + Unpin,
    {
        self.tee(reader, tokio::io::sink()).await
    }

    /// Like [`pump`](Self::pump), also copying every byte read to
    /// `downstream` unchanged before it is split.
    pub async fn tee<R, W>(&mut self, mut reader: R, mut downstream: W) -> Result<u64, WriterError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
            downstream.write_all(&buf[..n]).await?;
            self.write(&buf[..n]).await?;
        }

        downstream.flush().await?;
        self.finish().await?;
        debug!("Monitor {} input closed after {} bytes", self.name, total);
        Ok(total)
    }

    async fn commit(&mut self, line: String) -> Result<MonitorUpdate, WriterError> {
        let monitor = match self.store.write(&self.name, &line, self.ttl).await {
            Ok(monitor) => monitor,
            Err(e) => {
                error!("Failed to update monitor {}: {}", self.name, e);
                self.poisoned = true;
                return Err(e.into());
            }
        };

        let update = MonitorUpdate {
            name: monitor.name,
            text: line,
            updates: monitor.updates,
        };
        if let Some(sender) = &self.notifier {
            let _ = sender.send(update.clone());
        }
        Ok(update)
    }

    fn check_poisoned(&self) -> Result<(), WriterError> {
        if self.poisoned {
            Err(WriterError::Poisoned(self.name.clone()))
        } else {
            Ok(())
        }
    }
}
