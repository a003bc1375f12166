//! JSON directory snapshot — an offline stand-in for a live directory.
//!
//! ```json
//! {
//!   "servers": {
//!     "dc01.example.com": {
//!       "accounts": ["svc-roster@example.com"],
//!       "objects": [
//!         { "id": "u-1", "dn": "CN=Ann,OU=Staff,DC=example,DC=com", "name": "Ann" },
//!         { "id": "g-1", "dn": "CN=Staff,DC=example,DC=com", "name": "Staff",
//!           "class": "group", "members": ["u-1"] }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Writes use the same atomic `.tmp` + rename pattern as the configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, DirectoryError};
use crate::memory::{MemoryDirectory, ServerDirectory};

/// On-disk snapshot payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerDirectory>,
}

/// Load a snapshot into a fresh [`MemoryDirectory`].
pub fn load_at(path: &Path) -> Result<MemoryDirectory, DirectoryError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let snapshot: Snapshot = serde_json::from_str(&contents)?;
    Ok(MemoryDirectory::from_servers(snapshot.servers))
}

/// Save the directory's current objects atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(path: &Path, directory: &MemoryDirectory) -> Result<(), DirectoryError> {
    let snapshot = Snapshot {
        servers: directory.servers().clone(),
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let json = serde_json::to_string_pretty(&snapshot)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp_name);
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
