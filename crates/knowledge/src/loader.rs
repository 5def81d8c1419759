//! Folder loader producing documents for indexing.

use crate::types::LoadedDocument;
use ragdex_core::{AppError, AppResult};
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Loads plain-text documents from a folder tree, filtered by extension.
#[derive(Debug, Clone)]
pub struct TextFolderLoader {
    extensions: Vec<String>,
}

impl Default for TextFolderLoader {
    fn default() -> Self {
        Self::new(["txt", "md"])
    }
}

impl TextFolderLoader {
    /// Create a loader accepting the given extensions (case-insensitive,
    /// with or without a leading dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Whether `path` has one of the accepted extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    /// Walk `root` recursively and read every accepted file.
    ///
    /// Output order is deterministic (sorted by file name at every level).
    /// Unreadable entries are skipped with a warning. Documents are keyed by
    /// their relative path without extension; files sharing that stem keep
    /// their extension in the id instead.
    pub fn load(&self, root: &Path) -> AppResult<Vec<LoadedDocument>> {
        if !root.is_dir() {
            return Err(AppError::InvalidConfiguration(format!(
                "Source folder does not exist or is not a directory: {}",
                root.display()
            )));
        }

        let mut documents = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.accepts(path) {
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };

            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let rel_path = posix_path(relative);
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase();

            let mut metadata = BTreeMap::new();
            metadata.insert("path".to_string(), rel_path.clone());
            metadata.insert("ext".to_string(), ext);
            metadata.insert("loader".to_string(), "text".to_string());

            tracing::debug!("Loaded {}", rel_path);

            documents.push(LoadedDocument {
                document_id: posix_path(&relative.with_extension("")),
                text: String::from_utf8_lossy(&bytes).into_owned(),
                metadata,
            });
        }

        disambiguate_ids(&mut documents)?;

        tracing::info!(
            "Loaded {} documents from {}",
            documents.len(),
            root.display()
        );

        Ok(documents)
    }
}

/// Give documents whose stems collide their full relative path as id.
fn disambiguate_ids(documents: &mut [LoadedDocument]) -> AppResult<()> {
    let mut stems: HashMap<String, usize> = HashMap::new();
    for doc in documents.iter() {
        *stems.entry(doc.document_id.clone()).or_default() += 1;
    }

    for doc in documents.iter_mut() {
        if stems[&doc.document_id] > 1 {
            tracing::debug!(
                "Document id {} is shared, using {}",
                doc.document_id,
                doc.source_path()
            );
            doc.document_id = doc.source_path().to_string();
        }
    }

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for doc in documents.iter() {
        if let Some(other) = seen.insert(&doc.document_id, doc.source_path()) {
            return Err(AppError::InvalidConfiguration(format!(
                "Files {} and {} map to the same document id {}",
                other,
                doc.source_path(),
                doc.document_id
            )));
        }
    }

    Ok(())
}

/// Relative path joined with `/` regardless of platform.
fn posix_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
