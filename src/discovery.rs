//! Candidate serial device enumeration for auto-connect.
//!
//! Two fixed strategies are combined:
//! 1. numbered device nodes such as `/dev/ttyUSB0..9` and `/dev/ttyACM0..9`
//! 2. stable aliases under `/dev/serial/by-id` and `/dev/serial/by-path`
//!
//! The result is sorted and de-duplicated so each device is tried once per scan.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortDiscovery {
    /// Device node prefixes; `<prefix><n>` is probed for `n` in `0..max_index`.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,
    #[serde(default = "default_max_index")]
    pub max_index: u32,
    /// Directories whose symlink / character-device entries are candidates.
    #[serde(default = "default_directories")]
    pub directories: Vec<PathBuf>,
}

fn default_prefixes() -> Vec<String> {
    vec!["/dev/ttyUSB".to_string(), "/dev/ttyACM".to_string()]
}

fn default_max_index() -> u32 {
    10
}

fn default_directories() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/dev/serial/by-id"),
        PathBuf::from("/dev/serial/by-path"),
    ]
}

impl Default for PortDiscovery {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            max_index: default_max_index(),
            directories: default_directories(),
        }
    }
}

impl PortDiscovery {
    /// A discovery that never finds anything (auto-connect always falls back).
    pub fn disabled() -> Self {
        Self {
            prefixes: Vec::new(),
            max_index: 0,
            directories: Vec::new(),
        }
    }

    pub fn scan(&self) -> Vec<String> {
        let mut ports = Vec::new();

        for prefix in &self.prefixes {
            for i in 0..self.max_index {
                let candidate = format!("{}{}", prefix, i);
                if Path::new(&candidate).exists() {
                    ports.push(candidate);
                }
            }
        }

        for dir in &self.directories {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                if is_device_entry(&entry) {
                    ports.push(entry.path().to_string_lossy().into_owned());
                }
            }
        }

        ports.sort();
        ports.dedup();

        let listing = if ports.is_empty() {
            "none".to_string()
        } else {
            ports.join(", ")
        };
        info!("Found {} serial ports: {}", ports.len(), listing);
        ports
    }
}

#[cfg(unix)]
fn is_device_entry(entry: &std::fs::DirEntry) -> bool {
    use std::os::unix::fs::FileTypeExt;
    match entry.file_type() {
        Ok(ft) => ft.is_symlink() || ft.is_char_device(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_device_entry(_entry: &std::fs::DirEntry) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_nodes_are_found_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("ttyFAKE").to_string_lossy().into_owned();
        std::fs::write(format!("{prefix}3"), b"").unwrap();
        std::fs::write(format!("{prefix}0"), b"").unwrap();
        // Outside 0..max_index
        std::fs::write(format!("{prefix}12"), b"").unwrap();

        let discovery = PortDiscovery {
            prefixes: vec![prefix.clone()],
            max_index: 10,
            directories: Vec::new(),
        };
        assert_eq!(
            discovery.scan(),
            vec![format!("{prefix}0"), format!("{prefix}3")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn alias_directory_symlinks_are_deduplicated() {
        let tmp = tempfile::tempdir().unwrap();
        let by_id = tmp.path().join("by-id");
        std::fs::create_dir(&by_id).unwrap();
        std::fs::write(tmp.path().join("target"), b"").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("target"), by_id.join("usb-Board_1234")).unwrap();
        // Regular files are not device aliases.
        std::fs::write(by_id.join("README"), b"").unwrap();

        let discovery = PortDiscovery {
            prefixes: Vec::new(),
            max_index: 0,
            // Same directory listed twice
            directories: vec![by_id.clone(), by_id.clone()],
        };
        let found = discovery.scan();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("usb-Board_1234"));
    }

    #[test]
    fn missing_directories_are_skipped() {
        let discovery = PortDiscovery {
            prefixes: Vec::new(),
            max_index: 0,
            directories: vec![PathBuf::from("/definitely/not/here")],
        };
        assert!(discovery.scan().is_empty());
        assert!(PortDiscovery::disabled().scan().is_empty());
    }
}
