//! [ContentStore] backed by a directory on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::common::{Id, Listings};

use super::{ContentStore, StoreError};

const LISTINGS_FILE: &str = "listings";

#[derive(Debug, Clone)]
/// Stores each blob in a file named after the hex encoding of its hash,
/// and the bencoded listings in a `listings` file.
pub struct DirectoryContentStore {
    root: PathBuf,
}

impl DirectoryContentStore {
    /// Open (and create if missing) the store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a blob under its SHA1 hash and return that hash.
    pub fn put_blob(&self, blob: &[u8]) -> Result<Id, StoreError> {
        let hash = Id::hash(blob);
        write_atomic(&self.root.join(hash.to_string()), blob)?;

        Ok(hash)
    }

    /// Replace the published listings.
    pub fn set_listings(&self, listings: &Listings) -> Result<(), StoreError> {
        write_atomic(&self.root.join(LISTINGS_FILE), &listings.to_bytes()?)?;

        Ok(())
    }

    fn read(&self, name: &str) -> Result<Bytes, StoreError> {
        match fs::read(self.root.join(name)) {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(error) => {
                debug!(?error, name, "Failed to read from the content directory");
                Err(error.into())
            }
        }
    }
}

impl ContentStore for DirectoryContentStore {
    fn get_blob(&self, hash: &Id) -> Result<Bytes, StoreError> {
        let blob = self.read(&hash.to_string())?;

        if Id::hash(&blob) != *hash {
            return Err(StoreError::HashMismatch(*hash));
        }

        Ok(blob)
    }

    fn get_listings(&self) -> Result<Bytes, StoreError> {
        self.read(LISTINGS_FILE)
    }
}

/// Write to a uniquely named sibling temporary file then rename over `path`,
/// so readers never observe a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension(format!("{}.tmp", Id::random()));

    if let Err(error) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(error.into());
    }

    Ok(())
}
