use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::model::Mutation;
use crate::observability;
use crate::store::Store;

/// Bytes preceding each payload: `[u32: payload length][u32: crc32 of payload]`.
const HEADER_LEN: usize = 8;

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Frame one mutation onto `buf`: the header, then the bincode payload.
fn frame(buf: &mut Vec<u8>, mutation: &Mutation) -> io::Result<()> {
    let payload =
        bincode::serialize(mutation).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(())
}

/// Decode every intact record in `bytes`, in order. Decoding stops at the
/// first incomplete or corrupt record: a crash mid-append leaves at most one,
/// and it is always the last.
fn decode_all(bytes: &[u8]) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    let mut rest = bytes;
    while rest.len() >= HEADER_LEN {
        let len = read_u32(rest) as usize;
        let crc = read_u32(&rest[4..]);
        let Some(payload) = rest.get(HEADER_LEN..HEADER_LEN + len) else {
            break; // truncated tail
        };
        if crc32fast::hash(payload) != crc {
            break;
        }
        let Ok(mutation) = bincode::deserialize(payload) else {
            break;
        };
        mutations.push(mutation);
        rest = &rest[HEADER_LEN + len..];
    }
    mutations
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

struct Writer {
    out: BufWriter<File>,
    appends_since_rewrite: u64,
}

/// `Store` backed by an append-only journal file. Every commit appends one
/// framed batch and fsyncs before returning; compaction rewrites the file to
/// a minimal snapshot through a temp file and an atomic rename.
pub struct JournalStore {
    writer: Mutex<Writer>,
    path: PathBuf,
}

impl JournalStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: Mutex::new(Writer {
                out: open_append(path)?,
                appends_since_rewrite: 0,
            }),
            path: path.to_path_buf(),
        })
    }

    /// Mutations appended since the last compaction. Embedders poll this to
    /// decide when a `compact` is worth the rewrite.
    pub async fn appends_since_compact(&self) -> u64 {
        self.writer.lock().await.appends_since_rewrite
    }
}

#[async_trait]
impl Store for JournalStore {
    async fn load(&self) -> io::Result<Vec<Mutation>> {
        // Hold the writer so a concurrent commit can't interleave with the read.
        let _guard = self.writer.lock().await;
        match fs::read(&self.path) {
            Ok(bytes) => Ok(decode_all(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn commit(&self, _resource_id: Ulid, mutations: &[Mutation]) -> io::Result<()> {
        let mut batch = Vec::new();
        for mutation in mutations {
            frame(&mut batch, mutation)?;
        }
        metrics::histogram!(observability::JOURNAL_COMMIT_BATCH_SIZE)
            .record(mutations.len() as f64);

        let mut writer = self.writer.lock().await;
        writer.out.write_all(&batch)?;
        writer.out.flush()?;
        let fsync_start = Instant::now();
        writer.out.get_ref().sync_all()?;
        metrics::histogram!(observability::JOURNAL_FSYNC_DURATION_SECONDS)
            .record(fsync_start.elapsed().as_secs_f64());
        writer.appends_since_rewrite += mutations.len() as u64;
        Ok(())
    }

    async fn compact(&self, snapshot: &[Mutation]) -> io::Result<()> {
        let mut bytes = Vec::new();
        for mutation in snapshot {
            frame(&mut bytes, mutation)?;
        }
        // Slow I/O happens before the writer is taken; only the rename and
        // reopen run under the lock.
        let tmp = self.path.with_extension("journal.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            out.write_all(&bytes)?;
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        let mut writer = self.writer.lock().await;
        fs::rename(&tmp, &self.path)?;
        writer.out = open_append(&self.path)?;
        writer.appends_since_rewrite = 0;
        Ok(())
    }
}
