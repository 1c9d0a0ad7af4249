//! The `Cache.cake` persisted build state (spec §6): command CRCs and header-scan
//! CRCs that let the comptime build pipeline skip recompiling/relinking artifacts
//! whose inputs haven't changed since the last run.
//!
//! The file itself is a flat S-expression: one entry per artifact, each a
//! `(artifact "name" :command-crc N :header-crc N)` form. The core owns parsing and
//! serialization since the grammar is fully specified; the driver owns deciding
//! *when* to read/write it and where the file lives on disk.

use std::fmt::Write as _;

use crc32fast::Hasher;

use crate::error::{Diagnostic, EvalErrorKind};

/// One cached artifact's fingerprint: the CRC of the exact command line used to
/// produce it, and the CRC of its transitively-`#include`d headers (so a header
/// change invalidates every artifact that reached it, without re-hashing the
/// artifact's own source unnecessarily).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub artifact_name: String,
    pub command_crc: u32,
    pub header_crc: u32,
}

/// The whole cache file's contents, kept as an ordered list rather than a map: the
/// writer re-emits entries in the order they were looked up during the run that
/// wrote them, so repeated builds produce textually stable cache files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cache {
    entries: Vec<CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, artifact_name: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.artifact_name == artifact_name)
    }

    /// Inserts or overwrites the entry for `artifact_name`.
    pub fn update(&mut self, artifact_name: impl Into<String>, command_crc: u32, header_crc: u32) {
        let artifact_name = artifact_name.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.artifact_name == artifact_name) {
            existing.command_crc = command_crc;
            existing.header_crc = header_crc;
        } else {
            self.entries.push(CacheEntry { artifact_name, command_crc, header_crc });
        }
    }

    /// Drops an entry, used when a compile/link attempt fails: a failed build must
    /// not be remembered as cached-good (spec §4.G, "Fail semantics").
    pub fn invalidate(&mut self, artifact_name: &str) {
        self.entries.retain(|e| e.artifact_name != artifact_name);
    }

    pub fn is_up_to_date(&self, artifact_name: &str, command_crc: u32, header_crc: u32) -> bool {
        self.find(artifact_name).is_some_and(|e| e.command_crc == command_crc && e.header_crc == header_crc)
    }
}

/// IEEE-polynomial CRC32, matching the checksum algorithm the original build
/// manager uses for both command lines and header-scan contents.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

pub fn serialize(cache: &Cache) -> String {
    let mut out = String::new();
    for entry in &cache.entries {
        let _ = writeln!(out, "(artifact \"{}\" :command-crc {} :header-crc {})", entry.artifact_name, entry.command_crc, entry.header_crc);
    }
    out
}

/// Parses a `Cache.cake` file's text. This is a small, fixed grammar (not
/// general S-expressions), so it is hand-parsed line by line rather than routed
/// through the evaluator's tokenizer.
pub fn parse(text: &str) -> Result<Cache, Diagnostic> {
    let mut cache = Cache::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry = parse_entry_line(line).ok_or_else(|| Diagnostic {
            blame: crate::error::Blame { file: "Cache.cake".to_string(), line: (line_no + 1) as u32, column_start: 0 },
            kind: EvalErrorKind::LexicalError(format!("malformed cache entry: {line}")),
            note: None,
        })?;
        cache.entries.push(entry);
    }
    Ok(cache)
}

fn parse_entry_line(line: &str) -> Option<CacheEntry> {
    let rest = line.strip_prefix("(artifact \"")?;
    let (artifact_name, rest) = rest.split_once('"')?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(":command-crc ")?;
    let (command_crc_str, rest) = rest.split_once(' ')?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(":header-crc ")?;
    let header_crc_str = rest.strip_suffix(')')?.trim();
    Some(CacheEntry {
        artifact_name: artifact_name.to_string(),
        command_crc: command_crc_str.parse().ok()?,
        header_crc: header_crc_str.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        let mut cache = Cache::new();
        cache.update("comptime_add-greet", 0xDEAD_BEEF, 0x1234);
        cache.update("comptime_my-macro", 42, 7);
        let text = serialize(&cache);
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, cache);
    }

    #[test]
    fn update_overwrites_existing_entry_in_place() {
        let mut cache = Cache::new();
        cache.update("x", 1, 1);
        cache.update("x", 2, 2);
        assert_eq!(cache.entries.len(), 1);
        assert_eq!(cache.find("x").unwrap().command_crc, 2);
    }

    #[test]
    fn invalidate_removes_a_failed_build_entry() {
        let mut cache = Cache::new();
        cache.update("x", 1, 1);
        cache.invalidate("x");
        assert!(cache.find("x").is_none());
    }

    #[test]
    fn is_up_to_date_requires_both_crcs_to_match() {
        let mut cache = Cache::new();
        cache.update("x", 1, 2);
        assert!(cache.is_up_to_date("x", 1, 2));
        assert!(!cache.is_up_to_date("x", 1, 3));
        assert!(!cache.is_up_to_date("x", 9, 2));
    }

    #[test]
    fn crc32_is_the_standard_ieee_variant() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
