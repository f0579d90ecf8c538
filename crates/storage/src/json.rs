// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Generic kind/id JSON file storage

use pb_core::ports::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::PathBuf;

/// JSON file-based storage: one file per record under
/// `<base>/<kind>/<id>.json`
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_path: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at the given path
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Save a value, creating the kind directory as needed
    pub fn save<T: Serialize>(&self, kind: &str, id: &str, data: &T) -> Result<(), StorageError> {
        let path = self.path_for(kind, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// Load a value by kind and id
    pub fn load<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<T, StorageError> {
        let path = self.path_for(kind, id);
        if !path.exists() {
            return Err(StorageError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            });
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Whether a record exists
    pub fn exists(&self, kind: &str, id: &str) -> bool {
        self.path_for(kind, id).exists()
    }

    /// List all record ids of a kind; empty when the kind directory
    /// does not exist yet
    pub fn list(&self, kind: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.base_path.join(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        Ok(ids)
    }

    fn path_for(&self, kind: &str, id: &str) -> PathBuf {
        self.base_path.join(kind).join(format!("{id}.json"))
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
