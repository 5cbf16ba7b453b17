//! The partition controller: the mutex-guarded state machine that ties
//! id generation, append, rotation, recovery and fetch orchestration
//! together behind the public contract described in the crate's module
//! docs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::catalog::{SegmentCatalog, SegmentDescriptor};
use crate::config::PartitionConfig;
use crate::error::{PartitionError, Result};
use crate::fetch::{FetchRequest, FetchedMessage};
use crate::format::{encode_message_frame, IndexRecord, HEADER_SIZE, INDEX_RECORD_SIZE, MAGIC, MESSAGE_FRAME_SIZE, VERSION};
use crate::id::IdGenerator;
use crate::index::{Direction, IndexEntry, SortedIndex};

/// State shared between the fetch planner (shared access) and rotation
/// (exclusive access): the sealed-segment catalog and the active
/// segment's fully loaded, sorted index.
///
/// The source this subsystem is modeled on reads its in-memory active
/// list without holding any lock from the fetch path, racing against
/// the writer. Bundling the list with the catalog's `RwLock` closes
/// that race while keeping the same two access patterns the spec
/// describes: readers (fetch planners) take it shared, the controller
/// takes it exclusive when it mutates either field.
struct CatalogState {
    catalog: SegmentCatalog,
    active_list: SortedIndex,
}

/// State touched only while holding the partition-wide write mutex.
struct WriteState {
    id_gen: IdGenerator,
    append_position: u64,
    active_entry_count: u32,
    max_message_id: u64,
    msg_file: Option<File>,
    idx_file: Option<File>,
}

/// A single durable, segmented, append-only message partition.
pub struct Partition {
    base_dir: PathBuf,
    name: String,
    config: PartitionConfig,
    write: Mutex<WriteState>,
    catalog: RwLock<CatalogState>,
}

impl Partition {
    /// Opens (and recovers) the partition backed by `<base_dir>/<name>-*`.
    ///
    /// Scans `base_dir` for `.idx` files in filename-sorted order: all
    /// but the highest-numbered are sealed segments, summarized into the
    /// catalog from their first/last records; the highest is the active
    /// segment and is fully loaded into the in-memory sorted index. The
    /// active `.msg`/`.idx` files are not opened for writing here — that
    /// happens lazily on the first `store`.
    pub async fn open(
        base_dir: impl Into<PathBuf>,
        name: impl Into<String>,
        config: PartitionConfig,
    ) -> Result<Partition> {
        let base_dir = base_dir.into();
        let name = name.into();
        info!(path = %base_dir.display(), %name, "opening partition");

        let segment_ids = scan_segment_ids(&base_dir, &name).await?;

        let mut catalog = SegmentCatalog::new();
        let mut active_list = SortedIndex::new();
        let mut active_entry_count = 0u32;
        let mut append_position = 0u64;

        if let Some((&active_segment_id, sealed_segment_ids)) = segment_ids.split_last() {
            for &segment_id in sealed_segment_ids {
                let path = idx_path(&base_dir, &name, segment_id);
                let descriptor = read_min_max(&path).await?;
                catalog.push(descriptor);
            }

            let active_idx_path = idx_path(&base_dir, &name, active_segment_id);
            active_list = load_idx_file_fully(&active_idx_path).await?;
            active_entry_count = active_list.len() as u32;

            let active_msg_path = msg_path(&base_dir, &name, active_segment_id);
            append_position = match fs::metadata(&active_msg_path).await {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            };

            debug!(
                sealed_segments = catalog.len(),
                active_segment_id,
                active_entry_count,
                "recovered partition from disk"
            );
        } else {
            debug!("no existing segments found, starting fresh partition");
        }

        let max_message_id = catalog
            .max_id()
            .into_iter()
            .chain(active_list.back().map(|e| e.message_id))
            .max()
            .unwrap_or(0);

        Ok(Partition {
            base_dir,
            name,
            config,
            write: Mutex::new(WriteState {
                id_gen: IdGenerator::new(),
                append_position,
                active_entry_count,
                max_message_id,
                msg_file: None,
                idx_file: None,
            }),
            catalog: RwLock::new(CatalogState {
                catalog,
                active_list,
            }),
        })
    }

    /// Generates the next Snowflake id for `node_id`, under the write
    /// mutex.
    pub async fn generate_next_id(&self, node_id: u8) -> Result<(u64, u64)> {
        let mut write = self.write.lock().await;
        write.id_gen.generate_next_id(node_id)
    }

    /// Returns the maximum message id ever stored, under the write
    /// mutex.
    pub async fn max_message_id(&self) -> u64 {
        let write = self.write.lock().await;
        write.max_message_id
    }

    /// Invokes `f` with the current maximum message id while holding the
    /// write mutex, giving the caller a critical section synchronized
    /// with appends.
    pub async fn do_in_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(u64) -> Result<T>,
    {
        let write = self.write.lock().await;
        f(write.max_message_id)
    }

    /// Appends `payload` under `id` to the active segment, rotating to a
    /// new segment first if the active one has reached quota.
    pub async fn store(&self, id: u64, payload: Bytes) -> Result<()> {
        let mut write = self.write.lock().await;

        let needs_new_segment = write.active_entry_count >= self.config.messages_per_file
            || write.msg_file.is_none()
            || write.idx_file.is_none();

        if needs_new_segment {
            write.msg_file = None;
            write.idx_file = None;

            let quota_reached = write.active_entry_count >= self.config.messages_per_file;
            if quota_reached {
                self.seal_active_segment(&mut write).await?;
            }

            self.open_active_segment_files(&mut write).await?;
        }

        let segment_id = {
            let catalog_guard = self.catalog.read().await;
            catalog_guard.catalog.len() as u32
        };
        let msg_path = self.msg_path(segment_id);
        let idx_path = self.idx_path(segment_id);

        let msg_file = write.msg_file.as_mut().expect("segment files just opened");
        let size = payload.len() as u32;
        let frame = encode_message_frame(id, size);

        msg_file
            .write_all(&frame)
            .await
            .map_err(|e| PartitionError::io("write message frame", msg_path.clone(), e))?;
        msg_file
            .write_all(&payload)
            .await
            .map_err(|e| PartitionError::io("write message payload", msg_path.clone(), e))?;

        let offset = write.append_position + MESSAGE_FRAME_SIZE;
        let record = IndexRecord { id, offset, size };
        let record_position = write.active_entry_count as u64 * INDEX_RECORD_SIZE;
        let idx_file = write.idx_file.as_mut().expect("segment files just opened");
        write_index_record(idx_file, record_position, &record)
            .await
            .map_err(|e| PartitionError::io("write index record", idx_path.clone(), e))?;
        {
            let mut catalog_guard = self.catalog.write().await;
            catalog_guard.active_list.insert(IndexEntry {
                message_id: id,
                offset,
                size,
                segment_id,
            });
        }

        write.append_position += MESSAGE_FRAME_SIZE + size as u64;
        write.active_entry_count += 1;
        if id > write.max_message_id {
            write.max_message_id = id;
        }

        debug!(id, size, segment_id, "stored message");
        Ok(())
    }

    /// Seals the current active segment: rewrites its `.idx` sorted by
    /// id, records its descriptor in the catalog, and clears the
    /// in-memory active list.
    async fn seal_active_segment(&self, write: &mut WriteState) -> Result<()> {
        let mut catalog_guard = self.catalog.write().await;
        let segment_id = catalog_guard.catalog.len() as u32;
        let path = self.idx_path(segment_id);

        rewrite_sorted_idx_file(&path, &catalog_guard.active_list).await?;

        let min_id = catalog_guard
            .active_list
            .front()
            .map(|e| e.message_id)
            .unwrap_or(0);
        let max_id = catalog_guard
            .active_list
            .back()
            .map(|e| e.message_id)
            .unwrap_or(0);
        catalog_guard.catalog.push(SegmentDescriptor { min_id, max_id });
        catalog_guard.active_list.clear();

        info!(segment_id, min_id, max_id, "sealed segment");

        write.active_entry_count = 0;
        write.append_position = 0;
        Ok(())
    }

    /// Opens (creating if necessary) the `.msg`/`.idx` files for the
    /// current active segment, writing the `MAGIC`+`VERSION` header if
    /// the `.msg` file is newly created.
    async fn open_active_segment_files(&self, write: &mut WriteState) -> Result<()> {
        let segment_id = {
            let catalog_guard = self.catalog.read().await;
            catalog_guard.catalog.len() as u32
        };
        let msg_path = self.msg_path(segment_id);
        let idx_path = self.idx_path(segment_id);

        let mut msg_file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&msg_path)
            .await
            .map_err(|e| PartitionError::io("open segment log", msg_path.clone(), e))?;
        let idx_file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .open(&idx_path)
            .await
            .map_err(|e| PartitionError::io("open segment index", idx_path.clone(), e))?;

        let existing_len = msg_file
            .metadata()
            .await
            .map_err(|e| PartitionError::io("stat segment log", msg_path.clone(), e))?
            .len();

        if existing_len == 0 {
            msg_file
                .write_all(&MAGIC)
                .await
                .map_err(|e| PartitionError::io("write segment header", msg_path.clone(), e))?;
            msg_file
                .write_all(&[VERSION])
                .await
                .map_err(|e| PartitionError::io("write segment header", msg_path.clone(), e))?;
            write.append_position = HEADER_SIZE;
        } else {
            write.append_position = existing_len;
        }

        write.msg_file = Some(msg_file);
        write.idx_file = Some(idx_file);
        Ok(())
    }

    /// Closes the active segment's open file handles. Idempotent.
    pub async fn close(&self) -> Result<()> {
        let mut write = self.write.lock().await;
        write.msg_file = None;
        write.idx_file = None;
        info!(name = %self.name, "closed partition");
        Ok(())
    }

    /// Resolves and streams the messages matching `request`. Returns
    /// immediately; the work happens on a spawned task that reports back
    /// through `request`'s channels.
    pub fn fetch(self: &Arc<Partition>, request: FetchRequest) {
        let partition = Arc::clone(self);
        tokio::spawn(async move {
            let direction = Direction::from_i8(request.direction);
            let plan = match partition
                .calculate_fetch_list(request.start_id, request.count, direction)
                .await
            {
                Ok(plan) => plan,
                Err(err) => {
                    error!(error = %err, "fetch planning failed");
                    let _ = request.error_tx.send(err);
                    return;
                }
            };

            debug!(count = plan.len(), "fetch plan resolved");
            if request.start_tx.send(plan.len()).is_err() {
                warn!("fetch consumer gone before plan was delivered");
                return;
            }

            if let Err(err) = partition
                .fetch_by_fetch_list(&plan, &request.message_tx)
                .await
            {
                match err {
                    PartitionError::Canceled => debug!("fetch canceled by consumer"),
                    ref other => error!(error = %other, "fetch streaming failed"),
                }
                let _ = request.error_tx.send(err);
            }
        });
    }

    /// Plans a fetch: prunes sealed segments via the catalog, extends
    /// into the active segment, and re-sorts the accumulated candidates
    /// into the final ordered answer.
    async fn calculate_fetch_list(
        &self,
        start_id: u64,
        count: usize,
        direction: Direction,
    ) -> Result<Vec<IndexEntry>> {
        let catalog_guard = self.catalog.read().await;
        let mut accumulator = Vec::new();
        let mut prev_included = false;

        for (segment_id, descriptor) in catalog_guard.catalog.iter() {
            let include = descriptor.has(start_id, direction) || (prev_included && accumulator.len() < count);
            if include {
                prev_included = true;
                let path = self.idx_path(segment_id as u32);
                let loaded = load_idx_file_fully(&path).await?;
                accumulator.extend(loaded.retrieve(start_id, count, direction));
            } else {
                prev_included = false;
            }
        }

        if let (Some(front), Some(back)) = (
            catalog_guard.active_list.front(),
            catalog_guard.active_list.back(),
        ) {
            let synthesized = SegmentDescriptor {
                min_id: front.message_id,
                max_id: back.message_id,
            };
            if synthesized.has(start_id, direction) || (prev_included && accumulator.len() < count) {
                accumulator.extend(catalog_guard.active_list.retrieve(start_id, count, direction));
            }
        }
        drop(catalog_guard);

        let mut resorted = SortedIndex::with_capacity(accumulator.len());
        for entry in accumulator {
            resorted.insert(entry);
        }
        Ok(resorted.retrieve(start_id, count, direction))
    }

    /// Streams the planned entries, opening each referenced `.msg` file
    /// on demand. A failed send (consumer dropped its receiver) is
    /// reported as [`PartitionError::Canceled`] so the caller can tell
    /// cancellation apart from having consumed the whole plan.
    async fn fetch_by_fetch_list(
        &self,
        plan: &[IndexEntry],
        message_tx: &tokio::sync::mpsc::Sender<FetchedMessage>,
    ) -> Result<()> {
        for entry in plan {
            let path = self.msg_path(entry.segment_id);
            let mut file = File::open(&path)
                .await
                .map_err(|e| PartitionError::io("open segment log for read", path.clone(), e))?;
            file.seek(SeekFrom::Start(entry.offset))
                .await
                .map_err(|e| PartitionError::io("seek segment log", path.clone(), e))?;
            let mut payload = vec![0u8; entry.size as usize];
            file.read_exact(&mut payload)
                .await
                .map_err(|e| PartitionError::io("read message payload", path.clone(), e))?;

            if message_tx
                .send((entry.message_id, Bytes::from(payload)))
                .await
                .is_err()
            {
                debug!("fetch consumer dropped receiver, stopping stream");
                return Err(PartitionError::Canceled);
            }
        }
        Ok(())
    }

    fn msg_path(&self, segment_id: u32) -> PathBuf {
        msg_path(&self.base_dir, &self.name, segment_id)
    }

    fn idx_path(&self, segment_id: u32) -> PathBuf {
        idx_path(&self.base_dir, &self.name, segment_id)
    }
}

fn msg_path(base_dir: &Path, name: &str, segment_id: u32) -> PathBuf {
    base_dir.join(format!("{name}-{segment_id:020}.msg"))
}

fn idx_path(base_dir: &Path, name: &str, segment_id: u32) -> PathBuf {
    base_dir.join(format!("{name}-{segment_id:020}.idx"))
}

/// Scans `base_dir` for `<name>-<segment:020d>.idx` files, returning the
/// segment ids in filename-sorted (hence numeric) order.
async fn scan_segment_ids(base_dir: &Path, name: &str) -> Result<Vec<u32>> {
    let mut entries = fs::read_dir(base_dir)
        .await
        .map_err(|e| PartitionError::io("read base directory", base_dir.to_path_buf(), e))?;

    let prefix = format!("{name}-");
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PartitionError::io("iterate base directory", base_dir.to_path_buf(), e))?
    {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(segment_part) = file_name.strip_prefix(&prefix).and_then(|s| s.strip_suffix(".idx")) {
            if let Ok(segment_id) = segment_part.parse::<u32>() {
                names.push((file_name.to_string(), segment_id));
            }
        }
    }
    names.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(names.into_iter().map(|(_, id)| id).collect())
}

/// Reads only the first and last records of a sealed `.idx` file to
/// build its descriptor, trusting (rather than re-verifying) that it
/// was written sorted by this crate's own rotation path.
async fn read_min_max(path: &Path) -> Result<SegmentDescriptor> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| PartitionError::io("stat sealed index", path.to_path_buf(), e))?;
    let segment_id = segment_id_from_path(path);
    if metadata.len() == 0 || metadata.len() % INDEX_RECORD_SIZE != 0 {
        return Err(PartitionError::CorruptSegment { segment_id });
    }
    let entry_count = metadata.len() / INDEX_RECORD_SIZE;

    let mut file = File::open(path)
        .await
        .map_err(|e| PartitionError::io("open sealed index", path.to_path_buf(), e))?;
    let min_id = read_index_record_at(&mut file, 0, path).await?.id;
    let max_id = read_index_record_at(&mut file, (entry_count - 1) * INDEX_RECORD_SIZE, path)
        .await?
        .id;

    Ok(SegmentDescriptor { min_id, max_id })
}

/// Fully loads a `.idx` file into a [`SortedIndex`]. A trailing partial
/// record (fewer than 20 bytes) is dropped rather than treated as fatal
/// — see DESIGN.md's decision on open question #2.
async fn load_idx_file_fully(path: &Path) -> Result<SortedIndex> {
    let segment_id = segment_id_from_path(path);
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(PartitionError::io("read index file", path.to_path_buf(), e)),
    };

    let complete_records = bytes.len() / INDEX_RECORD_SIZE as usize;
    let mut index = SortedIndex::with_capacity(complete_records);
    for i in 0..complete_records {
        let start = i * INDEX_RECORD_SIZE as usize;
        let end = start + INDEX_RECORD_SIZE as usize;
        let record = IndexRecord::decode(&bytes[start..end]);
        index.insert(IndexEntry {
            message_id: record.id,
            offset: record.offset,
            size: record.size,
            segment_id,
        });
    }
    Ok(index)
}

async fn read_index_record_at(file: &mut File, position: u64, path: &Path) -> Result<IndexRecord> {
    file.seek(SeekFrom::Start(position))
        .await
        .map_err(|e| PartitionError::io("seek index file", path.to_path_buf(), e))?;
    let mut buf = [0u8; INDEX_RECORD_SIZE as usize];
    file.read_exact(&mut buf)
        .await
        .map_err(|e| PartitionError::io("read index record", path.to_path_buf(), e))?;
    Ok(IndexRecord::decode(&buf))
}

async fn write_index_record(file: &mut File, position: u64, record: &IndexRecord) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(position)).await?;
    file.write_all(&record.encode()).await
}

/// Rewrites `path` with `list`'s entries laid out in ascending order,
/// record-by-record, in place (the entry count — and so the file size
/// — never changes across a rewrite).
async fn rewrite_sorted_idx_file(path: &Path, list: &SortedIndex) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .read(true)
        .open(path)
        .await
        .map_err(|e| PartitionError::io("open index for sort rewrite", path.to_path_buf(), e))?;

    for i in 0..list.len() {
        let entry = list.get(i).expect("index within bounds");
        let record = IndexRecord {
            id: entry.message_id,
            offset: entry.offset,
            size: entry.size,
        };
        write_index_record(&mut file, i as u64 * INDEX_RECORD_SIZE, &record)
            .await
            .map_err(|e| PartitionError::io("rewrite sorted index", path.to_path_buf(), e))?;
    }
    Ok(())
}

fn segment_id_from_path(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('-').next())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0)
}
