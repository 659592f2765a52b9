//! JSONL I/O and atomic file operations

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Append a JSON record to a JSONL file
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write call per record keeps concurrent appenders line-atomic
    file.write_all(format!("{}\n", json).as_bytes())?;
    Ok(())
}

/// Read all records from a JSONL file. Torn or foreign lines are skipped.
pub fn read_jsonl<T: for<'de> Deserialize<'de>>(path: &Path) -> std::io::Result<Vec<T>> {
    read_jsonl_tail(path, usize::MAX)
}

/// The last `limit` parseable records, oldest first, holding at most
/// `limit` records in memory
pub fn read_jsonl_tail<T: for<'de> Deserialize<'de>>(
    path: &Path,
    limit: usize,
) -> std::io::Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut records: VecDeque<T> = VecDeque::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str(&line) {
            if records.len() == limit {
                records.pop_front();
            }
            records.push_back(record);
        }
    }

    Ok(records.into())
}

/// Write data atomically using temp file + rename
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-process temp name: hooks, the worker and `maintain` may race
    let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    std::fs::write(&temp_path, data)?;
    std::fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Entry {
        id: u32,
        label: String,
    }

    #[test]
    fn test_jsonl_append_and_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("log.jsonl");

        let entries = vec![
            Entry {
                id: 1,
                label: "capture".to_string(),
            },
            Entry {
                id: 2,
                label: "retrieve".to_string(),
            },
        ];
        for entry in &entries {
            append_jsonl(&path, entry).unwrap();
        }

        let read: Vec<Entry> = read_jsonl(&path).unwrap();
        assert_eq!(entries, read);
    }

    #[test]
    fn test_read_jsonl_skips_garbage_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log.jsonl");
        std::fs::write(&path, "{\"id\":1,\"label\":\"a\"}\nnot json\n\n{\"id\":2,\"label\":\"b\"}\n")
            .unwrap();

        let read: Vec<Entry> = read_jsonl(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].label, "b");
    }

    #[test]
    fn test_tail_keeps_newest_records_in_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log.jsonl");
        for id in 0..10 {
            append_jsonl(
                &path,
                &Entry {
                    id,
                    label: format!("e{id}"),
                },
            )
            .unwrap();
        }

        let tail: Vec<Entry> = read_jsonl_tail(&path, 3).unwrap();
        let ids: Vec<u32> = tail.iter().map(|e| e.id).collect();
        assert_eq!(ids, [7, 8, 9]);
        assert!(read_jsonl_tail::<Entry>(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let read: Vec<Entry> = read_jsonl(&temp.path().join("absent.jsonl")).unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("marker.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
