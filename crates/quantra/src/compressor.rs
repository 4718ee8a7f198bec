//! Offline packing of named tensors into a blob file.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use quantra_core::{Error, Packed, Result};
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::array::CompressedArray;
use crate::compress::compress_scaled;
use crate::traits::CompressTraits;
use crate::work::{CompressConfig, CompressWorkingSet};

/// Magic bytes for blob files written by [`FileBlobWriter`].
const BLOB_MAGIC: &[u8; 4] = b"QBLB";

/// Sink for the serialized tensors of a [`Compressor`].
pub trait BlobWriter {
    /// Queue `data` under `key`.
    fn add(&mut self, key: String, data: Vec<u8>);

    /// Persist all queued blobs to `path`.
    fn write_all(&mut self, path: &Path) -> Result<()>;
}

/// Blob key for tensor `name` stored as `P`.
pub fn cache_key<P: Packed>(name: &str) -> String {
    format!("{}{}", P::KEY_PREFIX, name)
}

/// [`BlobWriter`] that writes a single file of length-prefixed entries.
///
/// Layout: magic, `u32` entry count, then per entry a `u32` key length, the
/// UTF-8 key, a `u64` data length and the data. All integers little-endian.
#[derive(Debug, Default)]
pub struct FileBlobWriter {
    entries: Vec<(String, Vec<u8>)>,
}

impl FileBlobWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued entries in insertion order.
    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    /// Reads every entry of a file written by [`BlobWriter::write_all`].
    ///
    /// Length fields are checked against the bytes left in the file before
    /// anything is allocated.
    pub fn read_all(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
        let file = File::open(path).map_err(|e| Error::io(format!("failed to open blob file: {}", e)))?;
        let mut remaining = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        read_bytes(&mut reader, &mut magic, &mut remaining)?;
        if &magic != BLOB_MAGIC {
            return Err(Error::io("invalid blob file magic"));
        }

        let count = u64::from(read_u32(&mut reader, &mut remaining)?);
        // Smallest entry: empty key and empty data.
        if count > remaining / ENTRY_HEADER_BYTES {
            return Err(Error::io(format!("blob entry count {} exceeds file size", count)));
        }
        let mut entries = Vec::with_capacity(checked_len(count, remaining)?);
        for _ in 0..count {
            let key_len = u64::from(read_u32(&mut reader, &mut remaining)?);
            let mut key = vec![0u8; checked_len(key_len, remaining)?];
            read_bytes(&mut reader, &mut key, &mut remaining)?;
            let key = String::from_utf8(key).map_err(|e| Error::io(format!("invalid blob key: {}", e)))?;

            let mut len = [0u8; 8];
            read_bytes(&mut reader, &mut len, &mut remaining)?;
            let mut data = vec![0u8; checked_len(u64::from_le_bytes(len), remaining)?];
            read_bytes(&mut reader, &mut data, &mut remaining)?;
            entries.push((key, data));
        }
        Ok(entries)
    }
}

/// Bytes of an entry besides its key and data.
const ENTRY_HEADER_BYTES: u64 = 4 + 8;

fn checked_len(len: u64, remaining: u64) -> Result<usize> {
    if len > remaining {
        return Err(Error::io(format!("blob length {} exceeds the {} bytes left", len, remaining)));
    }
    usize::try_from(len).map_err(|_| Error::io(format!("blob length {} does not fit in memory", len)))
}

fn read_bytes(reader: &mut impl Read, buf: &mut [u8], remaining: &mut u64) -> Result<()> {
    reader.read_exact(buf)?;
    *remaining = remaining.saturating_sub(buf.len() as u64);
    Ok(())
}

fn read_u32(reader: &mut impl Read, remaining: &mut u64) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_bytes(reader, &mut buf, remaining)?;
    Ok(u32::from_le_bytes(buf))
}

fn len_u32(len: usize, what: &str) -> Result<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| Error::io(format!("{} {} does not fit the blob header", what, len)))
}

impl BlobWriter for FileBlobWriter {
    fn add(&mut self, key: String, data: Vec<u8>) {
        self.entries.push((key, data));
    }

    fn write_all(&mut self, path: &Path) -> Result<()> {
        let count = len_u32(self.entries.len(), "entry count")?;
        let key_lens = self
            .entries
            .iter()
            .map(|(key, _)| len_u32(key.len(), "key length"))
            .collect::<Result<Vec<_>>>()?;

        let file = File::create(path).map_err(|e| Error::io(format!("failed to create blob file: {}", e)))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(BLOB_MAGIC)?;
        writer.write_all(&count)?;
        for ((key, data), key_len) in self.entries.iter().zip(&key_lens) {
            writer.write_all(key_len)?;
            writer.write_all(key.as_bytes())?;
            writer.write_all(&(data.len() as u64).to_le_bytes())?;
            writer.write_all(data)?;
        }
        writer.flush()?;
        debug!(entries = self.entries.len(), path = %path.display(), "wrote blobs");
        Ok(())
    }
}

/// Compresses named tensors and queues their bytes on a [`BlobWriter`].
pub struct Compressor<'p, B: BlobWriter> {
    work: CompressWorkingSet,
    pool: &'p ThreadPool,
    writer: B,
}

impl<'p, B: BlobWriter> Compressor<'p, B> {
    pub fn new(pool: &'p ThreadPool, writer: B) -> Self {
        Self::with_config(pool, writer, CompressConfig::default())
    }

    pub fn with_config(pool: &'p ThreadPool, writer: B, config: CompressConfig) -> Self {
        Self {
            work: CompressWorkingSet::new(config),
            pool,
            writer,
        }
    }

    /// Compresses `weights` into `compressed` and queues it under `name`.
    ///
    /// `weights` must already be scaled for the target representation.
    pub fn compress_array<P: CompressTraits, const CAPACITY: usize>(
        &mut self,
        name: &str,
        weights: &[f32],
        compressed: &mut CompressedArray<P, CAPACITY>,
    ) -> Result<()> {
        info!("Regenerating {} ({} elements, {})", name, weights.len(), P::NAME);
        compress_scaled(weights, &mut self.work, compressed, self.pool)?;
        self.insert(name, compressed);
        Ok(())
    }

    /// Queues an already compressed tensor under `name`.
    pub fn insert<P: Packed, const CAPACITY: usize>(&mut self, name: &str, compressed: &CompressedArray<P, CAPACITY>) {
        self.writer.add(cache_key::<P>(name), compressed.to_le_bytes());
    }

    /// Queues the per-tensor scales; nothing is queued if `scales` is empty.
    pub fn add_scales(&mut self, scales: &[f32]) {
        if scales.is_empty() {
            return;
        }
        let mut bytes = Vec::with_capacity(scales.len() * 4);
        f32::extend_le_bytes(scales, &mut bytes);
        self.writer.add(cache_key::<f32>("scales"), bytes);
    }

    /// Writes everything queued so far. Failures are logged, and `false` is
    /// returned.
    pub fn write_all(&mut self, path: &Path) -> bool {
        match self.writer.write_all(path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Working set of the most recent compression.
    pub fn work(&self) -> &CompressWorkingSet {
        &self.work
    }

    pub fn into_writer(self) -> B {
        self.writer
    }
}
