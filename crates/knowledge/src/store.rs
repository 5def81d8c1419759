//! On-disk persistence for named indexes.
//!
//! Every name owns a directory of immutable generations plus a `CURRENT`
//! pointer:
//!
//! ```text
//! <root>/<name>/CURRENT
//! <root>/<name>/gen-000007/index.bin
//! <root>/<name>/gen-000007/row_map.json
//! <root>/<name>/gen-000007/meta_map.json
//! <root>/<name>/gen-000007/config.json
//! ```
//!
//! A save stages the four artifacts in a temporary directory, renames it to
//! the next generation and then swaps `CURRENT`. Readers follow `CURRENT`
//! and therefore only ever see whole generations.

use crate::index::NamedIndex;
use crate::types::{ChunkRecord, IndexConfig};
use crate::vector_index::{FlatIndex, VectorIndex};
use chrono::Utc;
use ragdex_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "index.bin";
pub const ROW_MAP_FILE: &str = "row_map.json";
pub const META_MAP_FILE: &str = "meta_map.json";
pub const CONFIG_FILE: &str = "config.json";
pub const CURRENT_FILE: &str = "CURRENT";

const INDEX_MAGIC: &[u8; 4] = b"RDXV";
const INDEX_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;
const GENERATION_PREFIX: &str = "gen-";
const STAGING_PREFIX: &str = ".staging-";

/// Stored vectors must be unit length within this tolerance.
const NORM_TOLERANCE: f32 = 1e-3;

/// Handle on a directory of named indexes.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `name` has a committed generation.
    pub fn exists(&self, name: &str) -> AppResult<bool> {
        validate_name(name)?;
        Ok(self.name_dir(name).join(CURRENT_FILE).is_file())
    }

    /// Committed index names, sorted.
    pub fn list(&self) -> AppResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_name(&name).is_ok() && entry.path().join(CURRENT_FILE).is_file() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Generation `CURRENT` points at, if anything is committed.
    pub fn generation(&self, name: &str) -> AppResult<Option<u64>> {
        validate_name(name)?;
        match self.read_current(name)? {
            Some(dir_name) => parse_generation(&dir_name)
                .map(Some)
                .ok_or_else(|| AppError::corrupt(name, format!("CURRENT names '{}'", dir_name))),
            None => Ok(None),
        }
    }

    /// Commit `index` as the next generation of its name.
    ///
    /// Returns the committed generation and stamps `index` with the config
    /// that was written. On any error the previous commit stays current and
    /// untouched.
    pub fn save(&self, index: &mut NamedIndex) -> AppResult<u64> {
        let name = index.name.as_str();
        validate_name(name)?;

        let name_dir = self.name_dir(name);
        fs::create_dir_all(&name_dir)
            .map_err(|e| storage(format!("creating {}", name_dir.display()), e))?;
        sweep_staging(&name_dir);

        // Serialize everything up front so a bad record fails before any I/O
        let index_bytes = encode_index(&index.index);
        let config = IndexConfig {
            dimension: index.index.dimension(),
            row_count: index.index.len(),
            format_version: INDEX_FORMAT_VERSION,
            index_sha256: Some(sha256_hex(&index_bytes)),
            built_at: Some(Utc::now()),
            ..index.config.clone()
        };
        let row_map: BTreeMap<usize, &String> = index.index.row_map().iter().enumerate().collect();
        let row_map_bytes = serde_json::to_vec(&row_map)?;
        let meta_map_bytes = serde_json::to_vec(&index.metadata)?;
        let config_bytes = serde_json::to_vec_pretty(&config)?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&name_dir)
            .map_err(|e| storage("creating staging directory", e))?;

        for (file_name, bytes) in [
            (INDEX_FILE, &index_bytes),
            (ROW_MAP_FILE, &row_map_bytes),
            (META_MAP_FILE, &meta_map_bytes),
            (CONFIG_FILE, &config_bytes),
        ] {
            write_synced(&staging.path().join(file_name), bytes)
                .map_err(|e| storage(format!("writing {}", file_name), e))?;
        }

        let generation = latest_generation(&name_dir)
            .map_err(|e| storage("scanning generations", e))?
            .map_or(1, |g| g + 1);
        let gen_name = generation_dir_name(generation);
        let gen_dir = name_dir.join(&gen_name);

        // The staging guard's own cleanup becomes a no-op once the path moves
        fs::rename(staging.path(), &gen_dir)
            .map_err(|e| storage(format!("publishing {}", gen_name), e))?;
        drop(staging);
        sync_dir(&name_dir).map_err(|e| storage("syncing index directory", e))?;

        let previous = self
            .read_current(name)?
            .and_then(|dir_name| parse_generation(&dir_name));

        // Commit point
        let mut pointer = tempfile::NamedTempFile::new_in(&name_dir)
            .map_err(|e| storage("creating CURRENT", e))?;
        pointer
            .write_all(format!("{}\n", gen_name).as_bytes())
            .and_then(|_| pointer.as_file().sync_all())
            .map_err(|e| storage("writing CURRENT", e))?;
        pointer
            .persist(name_dir.join(CURRENT_FILE))
            .map_err(|e| storage("replacing CURRENT", e.error))?;
        sync_dir(&name_dir).map_err(|e| storage("syncing index directory", e))?;

        tracing::info!(
            "Committed index '{}' generation {} ({} rows)",
            name,
            generation,
            config.row_count
        );

        prune_generations(&name_dir, generation, previous);

        index.config = config;
        index.generation = generation;
        Ok(generation)
    }

    /// Load the committed generation of `name`, checking every artifact.
    pub fn load(&self, name: &str) -> AppResult<NamedIndex> {
        validate_name(name)?;

        let dir_name = self
            .read_current(name)?
            .ok_or_else(|| AppError::IndexNotFound(name.to_string()))?;
        let generation = parse_generation(&dir_name)
            .ok_or_else(|| AppError::corrupt(name, format!("CURRENT names '{}'", dir_name)))?;

        let gen_dir = self.name_dir(name).join(&dir_name);
        if !gen_dir.is_dir() {
            return Err(AppError::corrupt(
                name,
                format!("CURRENT points at missing generation {}", dir_name),
            ));
        }

        let config: IndexConfig = read_json(name, &gen_dir, CONFIG_FILE)?;
        if config.format_version != INDEX_FORMAT_VERSION {
            return Err(AppError::corrupt(
                name,
                format!("unsupported format version {}", config.format_version),
            ));
        }

        let index_bytes = read_artifact(name, &gen_dir, INDEX_FILE)?;
        if let Some(expected) = &config.index_sha256 {
            let actual = sha256_hex(&index_bytes);
            if &actual != expected {
                return Err(AppError::corrupt(name, "index.bin checksum mismatch"));
            }
        }

        let (dimension, rows, data) =
            decode_index(&index_bytes).map_err(|reason| AppError::corrupt(name, reason))?;

        if dimension != config.dimension {
            return Err(AppError::corrupt(
                name,
                format!(
                    "index dimension {} but config says {}",
                    dimension, config.dimension
                ),
            ));
        }
        if rows != config.row_count {
            return Err(AppError::corrupt(
                name,
                format!("index has {} rows but config says {}", rows, config.row_count),
            ));
        }

        let row_map: BTreeMap<usize, String> = read_json(name, &gen_dir, ROW_MAP_FILE)?;
        if row_map.len() != rows {
            return Err(AppError::corrupt(
                name,
                format!("row map has {} entries for {} rows", row_map.len(), rows),
            ));
        }
        // Keys are sorted and there are exactly `rows` of them, so any gap
        // shows up as a key that differs from its position
        if let Some((position, key)) = row_map
            .keys()
            .enumerate()
            .find(|(position, key)| position != *key)
        {
            return Err(AppError::corrupt(
                name,
                format!("row map key {} found at position {}", key, position),
            ));
        }
        let row_ids: Vec<String> = row_map.into_values().collect();

        let mut seen = HashSet::with_capacity(row_ids.len());
        if let Some(dup) = row_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(AppError::corrupt(
                name,
                format!("row map lists chunk id '{}' twice", dup),
            ));
        }

        let metadata: BTreeMap<String, ChunkRecord> = read_json(name, &gen_dir, META_MAP_FILE)?;
        if let Some(missing) = row_ids.iter().find(|id| !metadata.contains_key(*id)) {
            return Err(AppError::corrupt(
                name,
                format!("no metadata for chunk id '{}'", missing),
            ));
        }
        let unreferenced = metadata.len() - row_ids.len();
        if unreferenced > 0 {
            tracing::warn!(
                "Index '{}' has {} metadata entries not referenced by any row",
                name,
                unreferenced
            );
        }

        if dimension > 0 {
            for (row, vector) in data.chunks_exact(dimension).enumerate() {
                if vector.iter().any(|v| !v.is_finite()) {
                    return Err(AppError::corrupt(
                        name,
                        format!("row {} holds non-finite values", row),
                    ));
                }
                let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                if (norm - 1.0).abs() > NORM_TOLERANCE {
                    return Err(AppError::corrupt(
                        name,
                        format!("row {} has norm {:.6}", row, norm),
                    ));
                }
            }
        }

        tracing::debug!(
            "Loaded index '{}' generation {} ({} rows, dimension {})",
            name,
            generation,
            rows,
            dimension
        );

        Ok(NamedIndex {
            name: name.to_string(),
            index: FlatIndex::from_parts(dimension, data, row_ids),
            metadata,
            config,
            generation,
        })
    }

    fn name_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn read_current(&self, name: &str) -> AppResult<Option<String>> {
        let path = self.name_dir(name).join(CURRENT_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage(format!("reading {}", path.display()), e)),
        }
    }
}

/// Names must match `[A-Za-z0-9_.-]+` and must not start with a dot.
pub fn validate_name(name: &str) -> AppResult<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if name.is_empty() || !valid_chars || name.starts_with('.') {
        return Err(AppError::InvalidConfiguration(format!(
            "Invalid index name '{}': use letters, digits, '_', '.' or '-', not starting with '.'",
            name
        )));
    }
    Ok(())
}

/// Serialize the index as header + row-major little-endian floats.
fn encode_index(index: &FlatIndex) -> Vec<u8> {
    let vectors = index.vectors();
    let mut bytes = Vec::with_capacity(HEADER_LEN + vectors.len() * 4);
    bytes.extend_from_slice(INDEX_MAGIC);
    bytes.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    bytes.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for &value in vectors {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Parse `index.bin` into `(dimension, rows, data)`.
fn decode_index(bytes: &[u8]) -> Result<(usize, usize, Vec<f32>), String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("index.bin is {} bytes, shorter than its header", bytes.len()));
    }

    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[0..4] != INDEX_MAGIC {
        return Err("index.bin has bad magic".to_string());
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != INDEX_FORMAT_VERSION {
        return Err(format!("index.bin version {} is not supported", version));
    }

    let dimension = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let mut row_bytes = [0u8; 8];
    row_bytes.copy_from_slice(&header[12..20]);
    let rows = usize::try_from(u64::from_le_bytes(row_bytes))
        .map_err(|_| "index.bin row count overflows".to_string())?;

    if dimension == 0 && rows > 0 {
        return Err(format!("index.bin holds {} rows of dimension 0", rows));
    }

    let expected = rows
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| "index.bin header overflows".to_string())?;
    if payload.len() != expected {
        return Err(format!(
            "index.bin payload is {} bytes, header implies {}",
            payload.len(),
            expected
        ));
    }

    let data = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok((dimension, rows, data))
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn read_artifact(name: &str, gen_dir: &Path, file_name: &str) -> AppResult<Vec<u8>> {
    fs::read(gen_dir.join(file_name)).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => AppError::corrupt(name, format!("{} is missing", file_name)),
        _ => storage(format!("reading {}", file_name), e),
    })
}

fn read_json<T: serde::de::DeserializeOwned>(
    name: &str,
    gen_dir: &Path,
    file_name: &str,
) -> AppResult<T> {
    let bytes = read_artifact(name, gen_dir, file_name)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::corrupt(name, format!("{} is unreadable: {}", file_name, e)))
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn generation_dir_name(generation: u64) -> String {
    format!("{}{:06}", GENERATION_PREFIX, generation)
}

fn parse_generation(dir_name: &str) -> Option<u64> {
    let digits = dir_name.strip_prefix(GENERATION_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn generations(name_dir: &Path) -> io::Result<Vec<u64>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(name_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(generation) = entry.file_name().to_str().and_then(parse_generation) {
            found.push(generation);
        }
    }
    Ok(found)
}

fn latest_generation(name_dir: &Path) -> io::Result<Option<u64>> {
    Ok(generations(name_dir)?.into_iter().max())
}

/// Remove every generation except `committed` and the one `CURRENT` named
/// before the swap.
///
/// The previous generation stays so readers that resolved `CURRENT` just
/// before the swap can still open it. Uncommitted leftovers of failed saves
/// go too.
fn prune_generations(name_dir: &Path, committed: u64, previous: Option<u64>) {
    let found = match generations(name_dir) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("Failed to scan {} for pruning: {}", name_dir.display(), e);
            return;
        }
    };

    for generation in found
        .into_iter()
        .filter(|g| *g != committed && Some(*g) != previous)
    {
        let path = name_dir.join(generation_dir_name(generation));
        match fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!("Pruned {}", path.display()),
            Err(e) => tracing::warn!("Failed to prune {}: {}", path.display(), e),
        }
    }
}

/// Remove staging directories left behind by an interrupted save.
fn sweep_staging(name_dir: &Path) {
    let Ok(entries) = fs::read_dir(name_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(STAGING_PREFIX));
        if is_staging {
            let path = entry.path();
            match fs::remove_dir_all(&path) {
                Ok(()) => tracing::debug!("Removed stale staging directory {}", path.display()),
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

fn storage(context: impl std::fmt::Display, err: io::Error) -> AppError {
    AppError::Storage(format!("{}: {}", context, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};
    use tempfile::TempDir;

    fn sample(name: &str, texts: &[&str]) -> NamedIndex {
        let mut named = NamedIndex::empty(name, IndexConfig::new(3).with_embedder("test", "v1"));
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                chunk_id: format!("doc::c{}", i * 10),
                text: text.to_string(),
                metadata: ChunkMetadata {
                    document_id: "doc".to_string(),
                    source_path: "doc.txt".to_string(),
                    char_start: i * 10,
                    char_end: i * 10 + text.len(),
                    window_size: 12,
                    overlap: 2,
                    extra: BTreeMap::new(),
                },
            })
            .collect();
        let vectors = (0..texts.len())
            .map(|i| vec![1.0 + i as f32, 2.0, 0.5])
            .collect();
        named.add_chunks(chunks, vectors).unwrap();
        named
    }

    fn gen_dir(temp: &TempDir, name: &str, generation: u64) -> PathBuf {
        temp.path().join(name).join(generation_dir_name(generation))
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        let mut named = sample("docs", &["alpha", "beta", "gamma"]);

        let generation = store.save(&mut named).unwrap();
        assert_eq!(generation, 1);
        assert_eq!(named.generation, 1);

        let loaded = store.load("docs").unwrap();
        assert_eq!(loaded.generation, 1);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.index.row_map(), named.index.row_map());
        assert_eq!(loaded.index.vectors(), named.index.vectors());
        assert_eq!(loaded.metadata, named.metadata);
        assert_eq!(loaded.config.row_count, 3);
        assert!(loaded.config.index_sha256.is_some());
        assert!(loaded.config.built_at.is_some());
        assert_eq!(loaded.config, named.config);
    }

    #[test]
    fn test_artifact_layout() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        store.save(&mut sample("docs", &["alpha", "beta"])).unwrap();

        let current = fs::read_to_string(temp.path().join("docs").join(CURRENT_FILE)).unwrap();
        assert_eq!(current.trim(), "gen-000001");

        let dir = gen_dir(&temp, "docs", 1);
        for file_name in [INDEX_FILE, ROW_MAP_FILE, META_MAP_FILE, CONFIG_FILE] {
            assert!(dir.join(file_name).is_file(), "{} missing", file_name);
        }

        let row_map: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.join(ROW_MAP_FILE)).unwrap()).unwrap();
        assert_eq!(row_map["0"], "doc::c0");
        assert_eq!(row_map["1"], "doc::c10");

        let bytes = fs::read(dir.join(INDEX_FILE)).unwrap();
        assert_eq!(&bytes[0..4], b"RDXV");
        assert_eq!(bytes.len(), HEADER_LEN + 2 * 3 * 4);

        // No staging leftovers after a clean save
        let leftovers = fs::read_dir(temp.path().join("docs"))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_load_missing_index() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());

        assert!(matches!(store.load("nothing"), Err(AppError::IndexNotFound(n)) if n == "nothing"));
        assert!(!store.exists("nothing").unwrap());
        assert_eq!(store.generation("nothing").unwrap(), None);
    }

    #[test]
    fn test_empty_index_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        let mut empty = NamedIndex::empty("blank", IndexConfig::new(384));

        store.save(&mut empty).unwrap();
        let loaded = store.load("blank").unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension(), 384);
    }

    #[test]
    fn test_generations_pruned() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());

        for round in 1..=4u64 {
            let generation = store.save(&mut sample("docs", &["alpha"])).unwrap();
            assert_eq!(generation, round);
        }

        assert_eq!(store.generation("docs").unwrap(), Some(4));
        assert!(gen_dir(&temp, "docs", 4).is_dir());
        assert!(gen_dir(&temp, "docs", 3).is_dir());
        assert!(!gen_dir(&temp, "docs", 2).exists());
        assert!(!gen_dir(&temp, "docs", 1).exists());
    }

    #[test]
    fn test_orphan_generation_does_not_evict_previous_commit() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        store.save(&mut sample("docs", &["alpha"])).unwrap();

        // A save that died between publishing its directory and the swap
        let orphan = gen_dir(&temp, "docs", 2);
        fs::create_dir_all(&orphan).unwrap();
        fs::write(orphan.join(INDEX_FILE), b"never committed").unwrap();

        let generation = store.save(&mut sample("docs", &["alpha", "beta"])).unwrap();
        assert_eq!(generation, 3);
        assert!(gen_dir(&temp, "docs", 3).is_dir());
        assert!(gen_dir(&temp, "docs", 1).is_dir());
        assert!(!orphan.exists());

        // The next commit makes generation 3 the one kept alongside it
        store.save(&mut sample("docs", &["gamma"])).unwrap();
        assert!(gen_dir(&temp, "docs", 4).is_dir());
        assert!(gen_dir(&temp, "docs", 3).is_dir());
        assert!(!gen_dir(&temp, "docs", 1).exists());
    }

    #[test]
    fn test_stale_staging_is_swept() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        store.save(&mut sample("docs", &["alpha"])).unwrap();

        let stale = temp.path().join("docs").join(".staging-crashed");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join(INDEX_FILE), b"partial").unwrap();

        // A crashed stage is never visible to readers
        assert_eq!(store.load("docs").unwrap().generation, 1);

        store.save(&mut sample("docs", &["alpha", "beta"])).unwrap();
        assert!(!stale.exists());
        assert_eq!(store.load("docs").unwrap().len(), 2);
    }

    #[test]
    fn test_list_and_names() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        assert!(store.list().unwrap().is_empty());

        store.save(&mut sample("zeta", &["a"])).unwrap();
        store.save(&mut sample("alpha", &["a"])).unwrap();
        fs::create_dir_all(temp.path().join("uncommitted")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "zeta"]);
        assert!(store.exists("alpha").unwrap());
    }

    #[test]
    fn test_validate_name() {
        for ok in ["default", "my-docs", "v1.2_final", "A"] {
            assert!(validate_name(ok).is_ok(), "{}", ok);
        }
        for bad in ["", ".hidden", "..", "a/b", "spaced name", "ünï"] {
            assert!(
                matches!(validate_name(bad), Err(AppError::InvalidConfiguration(_))),
                "{}",
                bad
            );
        }

        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        assert!(store.save(&mut sample("../escape", &["a"])).is_err());
    }

    fn assert_corrupt(store: &IndexStore, needle: &str) {
        match store.load("docs") {
            Err(AppError::CorruptIndex { name, reason }) => {
                assert_eq!(name, "docs");
                assert!(reason.contains(needle), "reason '{}' lacks '{}'", reason, needle);
            }
            other => panic!("expected CorruptIndex, got {:?}", other.map(|n| n.len())),
        }
    }

    fn saved(temp: &TempDir) -> (IndexStore, PathBuf) {
        let store = IndexStore::new(temp.path());
        store.save(&mut sample("docs", &["alpha", "beta", "gamma"])).unwrap();
        (store, gen_dir(temp, "docs", 1))
    }

    fn edit_config(dir: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = dir.join(CONFIG_FILE);
        let mut config: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        edit(&mut config);
        fs::write(&path, serde_json::to_vec(&config).unwrap()).unwrap();
    }

    #[test]
    fn test_corrupt_current_points_nowhere() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);
        fs::remove_dir_all(&dir).unwrap();
        assert_corrupt(&store, "missing generation");
    }

    #[test]
    fn test_corrupt_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);
        fs::remove_file(dir.join(META_MAP_FILE)).unwrap();
        assert_corrupt(&store, "meta_map.json is missing");
    }

    #[test]
    fn test_corrupt_checksum() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);

        let path = dir.join(INDEX_FILE);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert_corrupt(&store, "checksum");
    }

    #[test]
    fn test_corrupt_header() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);
        edit_config(&dir, |c| {
            c.as_object_mut().unwrap().remove("index_sha256");
        });

        let path = dir.join(INDEX_FILE);
        let good = fs::read(&path).unwrap();

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        fs::write(&path, &bad_magic).unwrap();
        assert_corrupt(&store, "bad magic");

        let mut bad_version = good.clone();
        bad_version[4] = 9;
        fs::write(&path, &bad_version).unwrap();
        assert_corrupt(&store, "version 9");

        fs::write(&path, &good[..good.len() - 4]).unwrap();
        assert_corrupt(&store, "payload");

        fs::write(&path, &good[..10]).unwrap();
        assert_corrupt(&store, "shorter than its header");
    }

    #[test]
    fn test_corrupt_dimension_and_rows() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);

        edit_config(&dir, |c| c["dimension"] = serde_json::json!(4));
        assert_corrupt(&store, "dimension");

        edit_config(&dir, |c| {
            c["dimension"] = serde_json::json!(3);
            c["row_count"] = serde_json::json!(2);
        });
        assert_corrupt(&store, "rows");
    }

    #[test]
    fn test_corrupt_zero_dimension_with_rows() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);
        edit_config(&dir, |c| {
            c["dimension"] = serde_json::json!(0);
            c.as_object_mut().unwrap().remove("index_sha256");
        });

        let path = dir.join(INDEX_FILE);
        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(HEADER_LEN);
        bytes[8..12].copy_from_slice(&0u32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        assert_corrupt(&store, "3 rows of dimension 0");
    }

    #[test]
    fn test_corrupt_row_map() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);
        let path = dir.join(ROW_MAP_FILE);

        fs::write(&path, r#"{"0": "doc::c0", "1": "doc::c10"}"#).unwrap();
        assert_corrupt(&store, "row map has 2 entries");

        fs::write(&path, r#"{"0": "doc::c0", "1": "doc::c10", "5": "doc::c20"}"#).unwrap();
        assert_corrupt(&store, "row map key 5");

        fs::write(&path, r#"{"0": "doc::c0", "1": "doc::c10", "2": "doc::c0"}"#).unwrap();
        assert_corrupt(&store, "twice");

        fs::write(&path, r#"{"0": "doc::c0", "1": "doc::c10", "2": "doc::c99"}"#).unwrap();
        assert_corrupt(&store, "no metadata");

        fs::write(&path, "not json").unwrap();
        assert_corrupt(&store, "row_map.json is unreadable");
    }

    #[test]
    fn test_corrupt_vector_norm() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);
        edit_config(&dir, |c| {
            c.as_object_mut().unwrap().remove("index_sha256");
        });

        let path = dir.join(INDEX_FILE);
        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&5.0f32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        assert_corrupt(&store, "norm");

        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&f32::NAN.to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        assert_corrupt(&store, "non-finite");
    }

    #[test]
    fn test_extra_metadata_is_tolerated() {
        let temp = TempDir::new().unwrap();
        let (store, dir) = saved(&temp);

        let path = dir.join(META_MAP_FILE);
        let mut meta: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let orphan = meta["doc::c0"].clone();
        meta["orphan::c0"] = orphan;
        fs::write(&path, serde_json::to_vec(&meta).unwrap()).unwrap();

        let loaded = store.load("docs").unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_failed_save_keeps_previous_commit() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path());
        store.save(&mut sample("docs", &["alpha"])).unwrap();

        // A file squatting on the next generation name makes the rename fail
        fs::write(gen_dir(&temp, "docs", 2), b"in the way").unwrap();
        let result = store.save(&mut sample("docs", &["alpha", "beta"]));
        assert!(matches!(result, Err(AppError::Storage(_))));

        let loaded = store.load("docs").unwrap();
        assert_eq!(loaded.generation, 1);
        assert_eq!(loaded.len(), 1);
    }
}
