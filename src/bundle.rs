//! Lookup of the executables vendored alongside redisapp.
use std::{
    env,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    constants::{BUNDLE_RESOURCES_DIR, VENDOR_BIN_DIR},
    error::BundleError,
};

/// Locates bundled executables relative to the running binary.
#[derive(Debug, Clone)]
pub struct Bundle {
    search_dirs: Vec<PathBuf>,
}

impl Bundle {
    /// Bundle rooted at the directory of the current executable.
    ///
    /// `vendor_dir` replaces the default `Vendor/redis/bin`; an absolute value is used as the
    /// only search location.
    pub fn current(vendor_dir: Option<&Path>) -> Self {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::rooted_at(&exe_dir, vendor_dir)
    }

    /// Bundle rooted at `exe_dir`. Searches the app-bundle resources first, then a vendor
    /// directory next to the binary.
    pub fn rooted_at(exe_dir: &Path, vendor_dir: Option<&Path>) -> Self {
        let vendor = vendor_dir.unwrap_or_else(|| Path::new(VENDOR_BIN_DIR));
        let search_dirs = if vendor.is_absolute() {
            vec![vendor.to_path_buf()]
        } else {
            vec![
                exe_dir.join(BUNDLE_RESOURCES_DIR).join(vendor),
                exe_dir.join(vendor),
            ]
        };
        Self { search_dirs }
    }

    /// Directories searched, in order.
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Resolves `name`, honouring an explicit override.
    pub fn resolve(
        &self,
        name: &str,
        override_path: Option<&Path>,
    ) -> Result<PathBuf, BundleError> {
        let candidates: Vec<PathBuf> = match override_path {
            Some(path) => vec![path.to_path_buf()],
            None => self.search_dirs.iter().map(|dir| dir.join(name)).collect(),
        };

        match candidates.iter().find(|candidate| candidate.is_file()) {
            Some(found) => {
                debug!("Resolved '{name}' to {:?}", found);
                Ok(found.clone())
            }
            None => Err(BundleError::NotFound {
                name: name.to_string(),
                searched: candidates,
            }),
        }
    }
}
