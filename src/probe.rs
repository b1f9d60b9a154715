//! Capability probing for forensic tools.
//!
//! Resolution is a pure function of environment state: an explicitly
//! configured path wins, then the search path, then `available: false`. The
//! probe never spawns a tool, only checks for its presence, and never fails.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::{CustodyConfig, ToolEntry};
use crate::models::{ToolDescriptor, ToolTier};

pub struct CapabilityProbe {
    tools: Vec<ToolEntry>,
    // Per-session memoization only; a new session re-probes because the
    // environment may change between runs.
    cache: RefCell<HashMap<String, ToolDescriptor>>,
}

impl CapabilityProbe {
    pub fn new(config: &CustodyConfig) -> Self {
        Self {
            tools: config.tools.clone(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve one tool to a descriptor. Unknown or unreachable tools come
    /// back with `available: false`; this never errors.
    pub fn resolve(&self, name: &str) -> ToolDescriptor {
        if let Some(cached) = self.cache.borrow().get(name) {
            return cached.clone();
        }

        let entry = self.tools.iter().find(|t| t.name == name);
        let tier = entry.map(|t| t.tier).unwrap_or(ToolTier::Core);

        let resolved_path = entry
            .and_then(|t| t.path.as_deref())
            .and_then(|p| configured_location(p))
            .or_else(|| search_path(name));

        let descriptor = ToolDescriptor {
            name: name.to_string(),
            tier,
            available: resolved_path.is_some(),
            resolved_path,
        };

        debug!(
            "Resolved tool {}: available={}",
            name, descriptor.available
        );
        self.cache
            .borrow_mut()
            .insert(name.to_string(), descriptor.clone());
        descriptor
    }

    /// Resolve every configured tool, for pre-flight reporting.
    pub fn known_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|entry| self.resolve(&entry.name))
            .collect()
    }
}

fn configured_location(path: &str) -> Option<PathBuf> {
    let candidate = PathBuf::from(path);
    if is_executable_file(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

/// Look a command up on the search path, the way `which` would.
pub fn search_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;

    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(name);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }

        #[cfg(windows)]
        {
            let with_exe = dir.join(format!("{}.exe", name));
            if with_exe.is_file() {
                return Some(with_exe);
            }
        }
    }

    None
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
