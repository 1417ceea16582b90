// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Read/merge/write of the key-value "touch" file with file-lock
//! serialization and atomic rewrite.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::Utc;
use fs2::FileExt;

/// Reads and writes the newline-delimited `key=value` touch file format,
/// serializing concurrent access (including across processes) with a file
/// lock on the touch file itself.
pub struct TrackingFileStore;

impl TrackingFileStore {
    /// Returns the current contents of `path`, or an empty map if the file
    /// does not exist or any I/O error occurs while reading it (callers
    /// tolerate a cold cache and fail open).
    pub fn read(path: &Path) -> BTreeMap<String, String> {
        match Self::try_read(path) {
            Ok(map) => map,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "touch file read failed, treating as empty");
                BTreeMap::new()
            }
        }
    }

    fn try_read(path: &Path) -> std::io::Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        file.lock_shared()?;
        let result = (|| {
            let mut file = &file;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            Ok(parse(&contents))
        })();
        FileExt::unlock(&file)?;
        result
    }

    /// Applies `updates` to the persisted map under an exclusive lock: a
    /// `None` value removes the key, a `Some` value sets it. Returns the
    /// resulting map. Creates the parent directory if necessary.
    ///
    /// On a write-path I/O error, the error is logged and swallowed: the
    /// cache becomes more conservative, never less, and the returned map
    /// reflects the updates applied in memory even if the persisted copy
    /// could not be written.
    pub fn update(
        path: &Path,
        updates: BTreeMap<String, Option<String>>,
    ) -> BTreeMap<String, String> {
        match Self::try_update(path, &updates) {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "touch file write failed, continuing without persistence");
                let mut map = Self::read(path);
                apply(&mut map, &updates);
                map
            }
        }
    }

    fn try_update(
        path: &Path,
        updates: &BTreeMap<String, Option<String>>,
    ) -> std::io::Result<BTreeMap<String, String>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        let result = (|| {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let mut map = parse(&contents);
            apply(&mut map, updates);

            let rendered = render(&map);
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_all(rendered.as_bytes())?;
            file.flush()?;
            Ok(map)
        })();
        FileExt::unlock(&file)?;
        result
    }

    /// Deletes the touch file if it exists. Used when a touch leaves no
    /// `.error` keys for an artifact whose file now exists.
    pub fn delete(path: &Path) {
        if let Err(err) = fs::remove_file(path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "failed to delete stale touch file");
            }
        }
    }
}

fn apply(map: &mut BTreeMap<String, String>, updates: &BTreeMap<String, Option<String>>) {
    for (key, value) in updates {
        match value {
            Some(v) => {
                map.insert(key.clone(), v.clone());
            }
            None => {
                map.remove(key);
            }
        }
    }
}

fn parse(contents: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in contents.lines() {
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.to_owned(), unescape(value));
        }
    }
    map
}

fn render(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push('#');
    out.push_str(&Utc::now().to_rfc3339());
    out.push('\n');
    for (key, value) in map {
        out.push_str(key);
        out.push('=');
        out.push_str(&escape(value));
        out.push('\n');
    }
    out
}

/// Percent-escapes `\n` and `=` only; every other byte, including a literal
/// `%`, passes through unchanged.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push_str("%0A"),
            '=' => out.push_str("%3D"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of `escape`. Any `%XX` sequence other than `%0A`/`%3D`
/// (case-insensitive) is left as literal text ("unknown escapes pass
/// through".
fn unescape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let code = &value[i + 1..i + 3];
            match code.to_ascii_uppercase().as_str() {
                "0A" => {
                    out.push('\n');
                    i += 3;
                    continue;
                }
                "3D" => {
                    out.push('=');
                    i += 3;
                    continue;
                }
                _ => {}
            }
        }
        // Safe: we only step one UTF-8 char at a time via chars() fallback.
        let ch = value[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}
