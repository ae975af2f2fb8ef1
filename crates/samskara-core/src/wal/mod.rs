//! Write-ahead log
//!
//! A single append-only file shared by every process mapping the same
//! storage root. It is both the durability story and the only channel of
//! cross-process synchronization: each process keeps a byte cursor and a
//! last-seen sequence, and replays peer records before reading or writing.
//!
//! Writers take an exclusive `fs2` file lock around sequence assignment
//! and the header+body write; the CRC is computed before anything hits
//! disk, so a torn write is detected on scan and the tail truncated by the
//! next locked writer.

mod record;

pub use record::{
    ConfidenceDelta, DecodedRecord, EdgeDelta, NodeF32, PayloadFmt, RecordHeader, RecordKind,
    TouchDelta, WalPayload, HEADER_LEN, WAL_MAGIC,
};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

/// WAL-local error type; the Mind facade maps these into `MindError`
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("wal i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal codec: {0}")]
    Codec(String),
    #[error("wal corrupt: {0}")]
    Corrupt(String),
    #[error("wal lock held by another writer beyond the configured wait")]
    LockTimeout,
}

pub type Result<T> = std::result::Result<T, WalError>;

/// Outcome of a tail scan
struct ScanOutcome {
    /// Byte offset just past the last intact record
    end: u64,
    /// Highest sequence observed (0 when none)
    last_seq: u64,
    /// Offset of the first corrupt byte, when the tail is torn
    corrupt_at: Option<u64>,
}

/// The append-only log with this process's replay cursor
pub struct Wal {
    path: PathBuf,
    file: File,
    /// Byte offset this process has replayed through
    read_pos: u64,
    /// Highest sequence this process has observed
    last_seq: u64,
    /// How long to wait on the file lock before surfacing a conflict
    lock_wait: Duration,
}

impl Wal {
    /// Open (or create) the log. The cursor starts at zero; callers replay
    /// from their snapshot sequence via [`Wal::replay_from`].
    pub fn open(path: &Path, lock_wait_ms: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            read_pos: 0,
            last_seq: 0,
            lock_wait: Duration::from_millis(lock_wait_ms),
        })
    }

    /// Highest sequence this process has observed
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Replay every record with `seq > from_seq`, in order, advancing the
    /// cursor to the end of the intact log. Replay is idempotent from the
    /// store's point of view; this function only guarantees order.
    pub fn replay_from(
        &mut self,
        from_seq: u64,
        mut apply: impl FnMut(DecodedRecord),
    ) -> Result<u64> {
        self.read_pos = 0;
        self.last_seq = 0;
        self.scan_unseen(false, &mut |rec: DecodedRecord| {
            if rec.header.seq > from_seq {
                apply(rec);
            }
        })?;
        Ok(self.last_seq)
    }

    /// Replay records appended by peers since this cursor last moved.
    /// Returns the new last-seen sequence.
    pub fn sync_from_shared_field(
        &mut self,
        mut apply: impl FnMut(DecodedRecord),
    ) -> Result<u64> {
        self.scan_unseen(false, &mut |rec| apply(rec))?;
        Ok(self.last_seq)
    }

    /// Append one record. Under the exclusive lock this first scans any
    /// peer records past the cursor (feeding them to `on_peer` so the
    /// caller applies them before its own mutation lands), assigns the
    /// next sequence, truncates a torn tail if one is found, writes
    /// header+body, and flushes before releasing the lock.
    pub fn append(
        &mut self,
        kind: RecordKind,
        payload: &WalPayload,
        now_ms: u64,
        mut on_peer: impl FnMut(DecodedRecord),
    ) -> Result<u64> {
        let body = payload.encode()?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&body);
        let crc32 = hasher.finalize();

        self.lock_exclusive()?;
        let result = (|| {
            self.scan_unseen(true, &mut |rec| on_peer(rec))?;

            let seq = self.last_seq + 1;
            let header = RecordHeader {
                seq,
                ts_ms: now_ms,
                kind,
                fmt: payload.fmt(),
                len: body.len() as u32,
                crc32,
            };

            self.file.seek(SeekFrom::Start(self.read_pos))?;
            self.file.write_all(&header.encode())?;
            self.file.write_all(&body)?;
            self.file.sync_data()?;

            self.read_pos += (HEADER_LEN + body.len()) as u64;
            self.last_seq = seq;
            debug!(seq, ?kind, len = body.len(), "wal append");
            Ok(seq)
        })();
        let _ = fs2::FileExt::unlock(&self.file);
        result
    }

    /// Flush file contents and metadata to disk
    pub fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn lock_exclusive(&self) -> Result<()> {
        let start = Instant::now();
        loop {
            match self.file.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(_) if start.elapsed() < self.lock_wait => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(_) => return Err(WalError::LockTimeout),
            }
        }
    }

    /// Scan records from the cursor to EOF, decoding each and advancing
    /// `read_pos`/`last_seq`. A corrupt or torn record stops the scan; with
    /// `truncate` (append path, lock held) the tail past it is cut off.
    fn scan_unseen(
        &mut self,
        truncate: bool,
        on_record: &mut dyn FnMut(DecodedRecord),
    ) -> Result<()> {
        let len = self.file.metadata()?.len();
        if self.read_pos >= len {
            return Ok(());
        }

        let outcome = self.scan_range(self.read_pos, len, on_record)?;
        self.read_pos = outcome.end;
        if outcome.last_seq > self.last_seq {
            self.last_seq = outcome.last_seq;
        }

        if let Some(at) = outcome.corrupt_at {
            warn!(offset = at, "wal tail corrupt; truncating at last intact record");
            if truncate {
                self.file.set_len(outcome.end)?;
            }
        }
        Ok(())
    }

    fn scan_range(
        &mut self,
        start: u64,
        end: u64,
        on_record: &mut dyn FnMut(DecodedRecord),
    ) -> Result<ScanOutcome> {
        let mut pos = start;
        let mut last_seq = self.last_seq;
        self.file.seek(SeekFrom::Start(pos))?;

        let mut header_buf = [0u8; HEADER_LEN];
        loop {
            if pos + HEADER_LEN as u64 > end {
                // A header fragment is a torn write, not corruption per se
                let corrupt = if pos < end { Some(pos) } else { None };
                return Ok(ScanOutcome {
                    end: pos,
                    last_seq,
                    corrupt_at: corrupt,
                });
            }
            self.file.read_exact(&mut header_buf)?;
            let header = match RecordHeader::decode(&header_buf) {
                Ok(h) => h,
                Err(e) => {
                    warn!(offset = pos, "wal header rejected: {}", e);
                    return Ok(ScanOutcome {
                        end: pos,
                        last_seq,
                        corrupt_at: Some(pos),
                    });
                }
            };

            let body_end = pos + HEADER_LEN as u64 + header.len as u64;
            if body_end > end {
                return Ok(ScanOutcome {
                    end: pos,
                    last_seq,
                    corrupt_at: Some(pos),
                });
            }

            let mut body = vec![0u8; header.len as usize];
            self.file.read_exact(&mut body)?;

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&body);
            if hasher.finalize() != header.crc32 {
                warn!(offset = pos, seq = header.seq, "wal crc mismatch");
                return Ok(ScanOutcome {
                    end: pos,
                    last_seq,
                    corrupt_at: Some(pos),
                });
            }

            match WalPayload::decode(header.fmt, &body) {
                Ok(payload) => {
                    last_seq = last_seq.max(header.seq);
                    on_record(DecodedRecord { header, payload });
                }
                Err(e) => {
                    // CRC passed but the payload will not decode: a version
                    // we do not speak. Skip it rather than truncate.
                    warn!(offset = pos, seq = header.seq, "wal payload skipped: {}", e);
                    last_seq = last_seq.max(header.seq);
                }
            }
            pos = body_end;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
