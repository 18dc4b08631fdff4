//! Profile manifests
//!
//! A profile lists, per traced thread, the data file holding its windows and
//! the UUID that file's header must carry. Counter names are kept alongside
//! so presentation layers can label counter ids.
//!
//! # Example TOML
//! ```toml
//! [[counters]]
//! id = 0
//! name = "cycles"
//!
//! [[threads]]
//! tid = 4711
//! data_file = "trace.dat<4711>"
//! uuid = "0b0f6a3e-6a55-4d43-9a39-7e0c3f7f1c52"
//! ```

use crate::store::{self, WindowReader, WindowWriter};
use crate::window::CounterId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Named hardware counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterDef {
    pub id: CounterId,
    pub name: String,
}

/// Data file of one traced thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadProfile {
    pub tid: u32,
    pub data_file: PathBuf,
    pub uuid: Uuid,
}

impl ThreadProfile {
    /// Describe a new data file with a fresh UUID
    pub fn new(tid: u32, data_file: impl Into<PathBuf>) -> Self {
        Self {
            tid,
            data_file: data_file.into(),
            uuid: Uuid::new_v4(),
        }
    }

    /// Open the data file, checking its header UUID
    pub fn open_reader(&self) -> store::Result<WindowReader> {
        WindowReader::open(&self.data_file, Some(self.uuid))
    }

    /// Create the data file with this thread's UUID
    pub fn create_writer(&self) -> store::Result<WindowWriter> {
        WindowWriter::create(&self.data_file, self.uuid)
    }

    /// Sibling path with `suffix` appended to the file name
    pub fn refined_path(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.data_file.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Data file path for this thread under an output prefix: `<output><tid>`
    pub fn output_path(&self, output: &Path) -> PathBuf {
        let mut name = OsString::from(output.as_os_str());
        name.push(format!("<{}>", self.tid));
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub counters: Vec<CounterDef>,

    #[serde(default)]
    pub threads: Vec<ThreadProfile>,
}

impl Profile {
    /// Load a profile manifest from TOML
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid TOML, or lists
    /// the same thread id twice.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read profile manifest: {}", path.as_ref().display())
        })?;

        let profile: Self =
            toml::from_str(&content).with_context(|| "Failed to parse TOML profile manifest")?;

        for (i, thread) in profile.threads.iter().enumerate() {
            if profile.threads[..i].iter().any(|t| t.tid == thread.tid) {
                anyhow::bail!("Duplicate thread id {} in profile manifest", thread.tid);
            }
        }

        Ok(profile)
    }

    /// Write the manifest as TOML
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize profile")?;
        fs::write(path.as_ref(), content).with_context(|| {
            format!("Failed to write profile manifest: {}", path.as_ref().display())
        })
    }

    pub fn thread(&self, tid: u32) -> Option<&ThreadProfile> {
        self.threads.iter().find(|t| t.tid == tid)
    }

    /// Look up a counter id by name
    pub fn counter_id(&self, name: &str) -> Option<CounterId> {
        self.counters.iter().find(|c| c.name == name).map(|c| c.id)
    }

    pub fn counter_name(&self, id: CounterId) -> Option<&str> {
        self.counters
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::window::WindowRecord;
    use tempfile::TempDir;

    fn profile_in(dir: &TempDir) -> Profile {
        Profile {
            counters: vec![
                CounterDef {
                    id: 0,
                    name: "cycles".to_string(),
                },
                CounterDef {
                    id: 1,
                    name: "instructions".to_string(),
                },
            ],
            threads: vec![
                ThreadProfile::new(100, dir.path().join("trace.dat<100>")),
                ThreadProfile::new(101, dir.path().join("trace.dat<101>")),
            ],
        }
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir);
        let path = dir.path().join("profile.toml");

        profile.save_toml(&path).unwrap();
        let loaded = Profile::from_toml(&path).unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_counter_lookup() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir);

        assert_eq!(profile.counter_id("instructions"), Some(1));
        assert_eq!(profile.counter_name(0), Some("cycles"));
        assert_eq!(profile.counter_id("branches"), None);
    }

    #[test]
    fn test_duplicate_thread_rejected() {
        let dir = TempDir::new().unwrap();
        let mut profile = profile_in(&dir);
        profile.threads[1].tid = 100;
        let path = dir.path().join("profile.toml");
        profile.save_toml(&path).unwrap();

        let err = Profile::from_toml(&path).unwrap_err();
        assert!(err.to_string().contains("Duplicate thread id 100"));
    }

    #[test]
    fn test_open_reader_checks_uuid() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir);
        let thread = profile.thread(100).unwrap();

        let mut writer = thread.create_writer().unwrap();
        writer.write(&WindowRecord::new(2, 10)).unwrap();
        writer.flush().unwrap();

        let mut reader = thread.open_reader().unwrap();
        assert_eq!(reader.next_window().unwrap().unwrap().phase_id(), 2);

        let mut stale = thread.clone();
        stale.uuid = Uuid::new_v4();
        assert!(matches!(
            stale.open_reader(),
            Err(StoreError::UuidMismatch { .. })
        ));
    }

    #[test]
    fn test_refined_path() {
        let thread = ThreadProfile::new(1, "/tmp/trace.dat<1>");
        assert_eq!(thread.refined_path("_"), PathBuf::from("/tmp/trace.dat<1>_"));
    }

    #[test]
    fn test_output_path() {
        let thread = ThreadProfile::new(42, "/tmp/trace.dat<42>");
        assert_eq!(
            thread.output_path(Path::new("/out/refined.toml")),
            PathBuf::from("/out/refined.toml<42>")
        );
    }
}
