//! Model/data versioning for the persisted stores.
//!
//! A system table-info file ships next to the system model data and
//! declares the binary format version, the model data version and the
//! trained interpolation lambda. User stores record the versions they were
//! written under; a mismatch on load means the user files are stale and
//! they are wiped rather than misread.

use crate::DEFAULT_LAMBDA;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Version of the on-disk binary formats this build writes.
pub const BINARY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTableInfo {
    pub binary_format_version: u32,
    pub model_data_version: String,
    pub lambda: f32,
}

impl Default for SystemTableInfo {
    fn default() -> Self {
        SystemTableInfo {
            binary_format_version: BINARY_FORMAT_VERSION,
            model_data_version: String::new(),
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl SystemTableInfo {
    pub fn load_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("read table info {}", path.as_ref().display()))?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserTableInfo {
    pub binary_format_version: u32,
    pub model_data_version: String,
}

impl UserTableInfo {
    pub fn load_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("read user table info {}", path.as_ref().display()))?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Whether user stores written under this info can be read against
    /// `system`.
    pub fn is_conform(&self, system: &SystemTableInfo) -> bool {
        self.binary_format_version == system.binary_format_version
            && self.model_data_version == system.model_data_version
    }

    pub fn mark_conform(&mut self, system: &SystemTableInfo) {
        self.binary_format_version = system.binary_format_version;
        self.model_data_version = system.model_data_version.clone();
    }
}

/// Check the user info file against the system info; on mismatch (or a
/// missing/corrupt info file) delete the listed user store files and write
/// a fresh conforming info file. Returns the info in effect afterwards.
pub fn verify_user_stores<P: AsRef<Path>>(
    system: &SystemTableInfo,
    info_path: P,
    user_store_paths: &[&Path],
) -> anyhow::Result<UserTableInfo> {
    let info_path = info_path.as_ref();

    if let Ok(info) = UserTableInfo::load_toml(info_path) {
        if info.is_conform(system) {
            return Ok(info);
        }
        warn!(
            have = %info.model_data_version,
            want = %system.model_data_version,
            "user stores were written under a different model; wiping"
        );
    }

    for path in user_store_paths {
        let _ = std::fs::remove_file(path);
    }

    let mut info = UserTableInfo::default();
    info.mark_conform(system);
    info.save_toml(info_path)?;
    Ok(info)
}
