//! Content-addressed archive storage with refcounted extraction.
//!
//! Archives live under `<packs>/siq_archives/<hex-sha256>.zip`. When the
//! first room referencing a uid opens, the archive is extracted into
//! `<temp>/<hex>/` and its `pack.json` descriptor parsed; every open
//! holds a [`PackLease`], and dropping the last lease deletes the
//! extracted directory. The store never deletes archives.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::model::{parse_uid, uid_hex, Pack, PackUid};
use crate::PackError;

/// Subdirectory of the packs path holding uploaded archives.
const ARCHIVES_SUBDIR: &str = "siq_archives";
/// Uploaded archives are stored with this extension regardless of the
/// original filename.
const ARCHIVE_EXT: &str = "zip";
/// The descriptor file expected at the archive root.
const DESCRIPTOR_NAME: &str = "pack.json";

#[derive(Default)]
struct StoreState {
    /// Uids of every archive on disk, indexed at startup and kept in
    /// sync by `save_archive`.
    known: HashSet<PackUid>,
    /// Live leases per uid. Absent or zero means the temporary
    /// extraction can be (or has been) removed.
    leases: HashMap<PackUid, usize>,
}

struct StoreInner {
    archives_dir: PathBuf,
    temp_dir: PathBuf,
    state: Mutex<StoreState>,
}

/// The pack store shared by the upload endpoint and the room registry.
///
/// Cheap to clone: all clones share one index and one lease table.
#[derive(Clone)]
pub struct PackStore {
    inner: Arc<StoreInner>,
}

impl PackStore {
    /// Opens (and creates if needed) the store directories, then indexes
    /// the archives already on disk.
    pub fn new(
        packs_path: impl AsRef<Path>,
        temp_path: impl AsRef<Path>,
    ) -> Result<Self, PackError> {
        let archives_dir = packs_path.as_ref().join(ARCHIVES_SUBDIR);
        let temp_dir = temp_path.as_ref().to_path_buf();
        fs::create_dir_all(&archives_dir)?;
        fs::create_dir_all(&temp_dir)?;

        let mut known = HashSet::new();
        for entry in fs::read_dir(&archives_dir)? {
            let path = entry?.path();
            let stem = path.file_stem().and_then(|s| s.to_str());
            if let Some(uid) = stem.and_then(|s| parse_uid(s).ok()) {
                known.insert(uid);
            }
        }
        tracing::info!(
            packs = known.len(),
            dir = %archives_dir.display(),
            "pack store indexed"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                archives_dir,
                temp_dir,
                state: Mutex::new(StoreState {
                    known,
                    leases: HashMap::new(),
                }),
            }),
        })
    }

    /// Stores an uploaded archive under its content hash.
    ///
    /// Duplicate content is rejected — the uid is derived from the bytes,
    /// so a re-upload cannot change anything on disk.
    pub fn save_archive(&self, bytes: &[u8]) -> Result<PackUid, PackError> {
        let uid: PackUid = Sha256::digest(bytes).into();

        let mut state = self.inner.state.lock().expect("pack store lock");
        if state.known.contains(&uid) {
            return Err(PackError::AlreadyExists);
        }

        fs::write(self.archive_path(&uid), bytes)?;
        state.known.insert(uid);
        tracing::info!(uid = %uid_hex(&uid), size = bytes.len(), "pack archive stored");

        Ok(uid)
    }

    /// Whether an archive with this uid is stored.
    pub fn contains(&self, uid: &PackUid) -> bool {
        self.inner
            .state
            .lock()
            .expect("pack store lock")
            .known
            .contains(uid)
    }

    /// Opens a pack for play: extracts on the first lease, parses the
    /// descriptor, and returns the tree plus a lease pinning the
    /// temporary directory.
    ///
    /// Every caller gets its own `Pack` value — rooms mutate question
    /// prices in place, and those mutations must stay room-local.
    pub fn open(&self, uid: &PackUid) -> Result<(Pack, PackLease), PackError> {
        let mut state = self.inner.state.lock().expect("pack store lock");
        if !state.known.contains(uid) {
            return Err(PackError::NotFound(uid_hex(uid)));
        }

        let extracted = self.extracted_dir(uid);
        let first = state.leases.get(uid).copied().unwrap_or(0) == 0;
        if first {
            self.extract(uid, &extracted)?;
        }

        let pack = match self.parse_descriptor(uid, &extracted) {
            Ok(pack) => pack,
            Err(err) => {
                if first {
                    let _ = fs::remove_dir_all(&extracted);
                }
                return Err(err);
            }
        };

        *state.leases.entry(*uid).or_insert(0) += 1;
        tracing::debug!(
            uid = %uid_hex(uid),
            leases = state.leases[uid],
            "pack opened"
        );

        Ok((
            pack,
            PackLease {
                uid: *uid,
                inner: Arc::clone(&self.inner),
            },
        ))
    }

    fn archive_path(&self, uid: &PackUid) -> PathBuf {
        self.inner
            .archives_dir
            .join(format!("{}.{ARCHIVE_EXT}", uid_hex(uid)))
    }

    fn extracted_dir(&self, uid: &PackUid) -> PathBuf {
        self.inner.temp_dir.join(uid_hex(uid))
    }

    fn extract(&self, uid: &PackUid, dest: &Path) -> Result<(), PackError> {
        let file = fs::File::open(self.archive_path(uid))?;
        let mut archive = zip::ZipArchive::new(file)?;
        archive.extract(dest)?;
        tracing::info!(uid = %uid_hex(uid), dir = %dest.display(), "pack extracted");
        Ok(())
    }

    fn parse_descriptor(&self, uid: &PackUid, dir: &Path) -> Result<Pack, PackError> {
        let bytes = fs::read(dir.join(DESCRIPTOR_NAME))?;
        let mut pack = Pack::from_descriptor(&bytes)?;
        pack.uid = *uid;
        Ok(pack)
    }
}

/// Pins a pack's extracted directory while a room plays it.
///
/// Dropping the last lease for a uid deletes the temporary directory;
/// the stored archive stays untouched.
pub struct PackLease {
    uid: PackUid,
    inner: Arc<StoreInner>,
}

impl PackLease {
    /// The uid this lease pins.
    pub fn uid(&self) -> &PackUid {
        &self.uid
    }
}

impl Drop for PackLease {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().expect("pack store lock");
        let remaining = match state.leases.get_mut(&self.uid) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };

        if remaining == 0 {
            state.leases.remove(&self.uid);
            let dir = self.inner.temp_dir.join(uid_hex(&self.uid));
            if let Err(err) = fs::remove_dir_all(&dir) {
                tracing::warn!(
                    uid = %uid_hex(&self.uid),
                    error = %err,
                    "failed to remove extracted pack"
                );
            } else {
                tracing::info!(uid = %uid_hex(&self.uid), "extracted pack removed");
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
