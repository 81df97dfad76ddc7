//! Compressed artifact storage
//!
//! Raw HTML snapshots and extracted partitions are stored gzip-compressed.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed artifact name: {0}")]
    MalformedName(String),
}

/// Write `bytes` gzip-compressed to `path`, replacing any existing file.
///
/// The stream is written to [`partial_path`] and renamed into place, so
/// `path` only ever exists complete.
pub fn write_gz(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    let file = File::create(&partial)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()?.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    fs::rename(&partial, path)?;
    Ok(())
}

/// Where an in-progress write of `path` lives (`<name>.part`)
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Read and decompress a gzip file
pub fn read_gz(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Serialize `value` as JSON and store it gzip-compressed
pub fn write_json_gz<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_vec(value)?;
    write_gz(path, &json)
}

/// Load a gzip-compressed JSON document
pub fn read_json_gz<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = read_gz(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Recover the document id from an artifact file name (`<doc_id>.html.gz`)
pub fn doc_id_from_file_name(name: &str) -> Result<String, ArtifactError> {
    match name.strip_suffix(".html.gz") {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ArtifactError::MalformedName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_gz_blob_and_json() {
        let tmp = TempDir::new().unwrap();
        let blob = tmp.path().join("nested/dir/page.html.gz");
        write_gz(&blob, "<p>àè</p>".as_bytes()).unwrap();
        assert_eq!(read_gz(&blob).unwrap(), "<p>àè</p>".as_bytes());

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1u32);
        let json = tmp.path().join("data.json.gz");
        write_json_gz(&json, &map).unwrap();
        let loaded: BTreeMap<String, u32> = read_json_gz(&json).unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn test_write_gz_replaces_through_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CELEX-A.html.gz");
        assert_eq!(partial_path(&path), tmp.path().join("CELEX-A.html.gz.part"));

        // A write killed midway leaves only the partial file behind
        std::fs::write(partial_path(&path), b"\x1f\x8b\x08").unwrap();
        assert!(!path.exists());

        write_gz(&path, b"complete").unwrap();
        assert_eq!(read_gz(&path).unwrap(), b"complete");
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_read_gz_rejects_plain_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.html.gz");
        std::fs::write(&path, b"not gzip").unwrap();
        assert!(read_gz(&path).is_err());
    }

    #[test]
    fn test_doc_id_from_file_name() {
        assert_eq!(
            doc_id_from_file_name("CELEX-32019R0001.html.gz").unwrap(),
            "CELEX-32019R0001"
        );
        assert!(doc_id_from_file_name("notes.txt").is_err());
        assert!(doc_id_from_file_name(".html.gz").is_err());
    }
}
