//! G-code file store
//!
//! Files live flat under one root directory. A file's name is its logical
//! path (no leading slash) and its id is derived from that name, so a
//! front-end can reference a file across listings. The selected file is
//! remembered in a small marker file next to the G-code.

use chrono::{DateTime, Utc};
use printbridge_core::{file_id, JobFile, StorageError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

/// Stored name for uploads whose own name is too long
pub const FALLBACK_UPLOAD_NAME: &str = "received.gcode";

/// Slicers send tiny side files ("true", "false") that are not prints
const MIN_UPLOAD_SIZE: u64 = 5;

/// Uploads rotate through this many temporary files
const TEMP_FILES: usize = 4;

const GCODE_EXTENSIONS: [&str; 3] = [".gcode", ".gco", ".g"];

/// Whether a name carries a G-code extension (case-insensitive)
pub fn is_gcode_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    GCODE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Store tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Marker file inside the root remembering the selected file
    pub marker_file: String,
    /// Entries returned per listing page
    pub max_files_per_list: usize,
    /// Longest accepted upload name
    pub max_path_length: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            marker_file: "uploaded.txt".to_string(),
            max_files_per_list: 10,
            max_path_length: 31,
        }
    }
}

/// One listed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub id: String,
    /// Creation time, seconds since the Unix epoch
    pub date: i64,
}

impl From<JobFile> for FileEntry {
    fn from(file: JobFile) -> Self {
        Self {
            id: file.id(),
            name: file.name,
            size: file.size,
            date: file.created,
        }
    }
}

/// One page of a file listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub files: Vec<FileEntry>,
    /// Index to pass for the following page; equals `total` on the last page
    pub next: usize,
    /// G-code files in the store
    pub total: usize,
}

/// An upload in progress, writing into a temporary file
#[derive(Debug)]
pub struct Upload {
    name: String,
    temp_path: PathBuf,
    file: File,
    received: u64,
}

impl Upload {
    /// Name the file will be stored under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes written so far
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(data)?;
        self.received += data.len() as u64;
        Ok(())
    }
}

/// Flat directory of G-code files
#[derive(Debug)]
pub struct GcodeStore {
    root: PathBuf,
    options: StoreOptions,
    next_temp: usize,
}

fn logical_name(name: &str) -> Result<&str, StorageError> {
    let trimmed = name.trim_start_matches('/');
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

fn not_found(name: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(err)
    }
}

impl GcodeStore {
    /// Open a store, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>, options: StoreOptions) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!("G-code store at {}", root.display());
        Ok(Self {
            root,
            options,
            next_temp: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(logical_name(name)?))
    }

    /// G-code file names, sorted
    fn gcode_names(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_gcode_file(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Size and creation time of a stored file
    pub fn file_info(&self, name: &str) -> Result<JobFile, StorageError> {
        let name = logical_name(name)?;
        let metadata = fs::metadata(self.root.join(name)).map_err(|e| not_found(name, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(|time| DateTime::<Utc>::from(time).timestamp())
            .unwrap_or_default();

        Ok(JobFile::new(name, metadata.len(), created))
    }

    /// Open a stored file for streaming
    pub fn open_file(&self, name: &str) -> Result<BufReader<File>, StorageError> {
        let file = File::open(self.path(name)?).map_err(|e| not_found(name, e))?;
        Ok(BufReader::new(file))
    }

    /// One page of G-code files starting at `index`, optionally only the one with `id`
    pub fn list(&self, index: usize, id: Option<&str>) -> Result<FileListing, StorageError> {
        let names = self.gcode_names()?;
        let mut listing = FileListing {
            files: Vec::new(),
            next: names.len(),
            total: names.len(),
        };

        for (i, name) in names.iter().enumerate().skip(index) {
            if listing.files.len() >= self.options.max_files_per_list {
                listing.next = i;
                break;
            }
            if id.is_none_or(|id| file_id(name) == id) {
                listing.files.push(self.file_info(name)?.into());
            }
        }

        Ok(listing)
    }

    pub fn find_by_id(&self, id: &str) -> Result<JobFile, StorageError> {
        self.gcode_names()?
            .iter()
            .find(|name| file_id(name) == id)
            .map(|name| self.file_info(name))
            .unwrap_or_else(|| Err(StorageError::NotFound(id.to_string())))
    }

    /// Remove the file with this id
    pub fn delete_by_id(&self, id: &str) -> Result<JobFile, StorageError> {
        let file = self.find_by_id(id)?;
        fs::remove_file(self.path(&file.name)?)?;
        tracing::info!("Deleted {}", file.name);
        Ok(file)
    }

    /// Select the file with this id for printing
    pub fn choose_by_id(&self, id: &str) -> Result<JobFile, StorageError> {
        let file = self.find_by_id(id)?;
        self.select(&file.name)
    }

    /// Select a file by name and remember it across restarts
    pub fn select(&self, name: &str) -> Result<JobFile, StorageError> {
        let file = self.file_info(name)?;
        self.save_marker(&file.name)?;
        tracing::info!("Selected {} ({} bytes)", file.name, file.size);
        Ok(file)
    }

    /// Name recorded in the marker file
    pub fn load_marker(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.root.join(&self.options.marker_file)) {
            Ok(text) => {
                let name = text.trim().trim_start_matches('/');
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_marker(&self, name: &str) -> Result<(), StorageError> {
        fs::write(self.root.join(&self.options.marker_file), logical_name(name)?)?;
        Ok(())
    }

    /// Selection at start-up: the marker's file if it still exists, else the
    /// first G-code file in the store
    pub fn restore_selection(&self) -> Result<Option<JobFile>, StorageError> {
        if let Some(name) = self.load_marker()? {
            match self.file_info(&name) {
                Ok(file) => return Ok(Some(file)),
                Err(StorageError::NotFound(_)) => {
                    tracing::debug!("Marked file {} no longer exists", name);
                }
                Err(e) => return Err(e),
            }
        }

        match self.gcode_names()?.first() {
            Some(name) => self.select(name).map(Some),
            None => Ok(None),
        }
    }

    /// Start receiving a file
    pub fn begin_upload(&mut self, file_name: &str) -> Result<Upload, StorageError> {
        let base = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name);
        let name = if base.is_empty() || base.len() > self.options.max_path_length {
            FALLBACK_UPLOAD_NAME
        } else {
            logical_name(base)?
        };

        let temp_path = self.root.join(format!("tmp{}", self.next_temp));
        self.next_temp = (self.next_temp + 1) % TEMP_FILES;
        let file = File::create(&temp_path)?;
        tracing::info!("Receiving {} into {}", name, temp_path.display());

        Ok(Upload {
            name: name.to_string(),
            temp_path,
            file,
            received: 0,
        })
    }

    /// Store a completed upload and select it
    ///
    /// Returns `None` when the upload was too small to be a print.
    pub fn finish_upload(&self, upload: Upload) -> Result<Option<JobFile>, StorageError> {
        let Upload {
            name,
            temp_path,
            mut file,
            received,
        } = upload;
        file.flush()?;
        drop(file);

        if received <= MIN_UPLOAD_SIZE {
            tracing::debug!("Discarding {} byte upload {}", received, name);
            fs::remove_file(&temp_path)?;
            return Ok(None);
        }

        let target = self.path(&name)?;
        if target.exists() {
            fs::remove_file(&target)?;
        }
        fs::rename(&temp_path, &target)?;
        self.select(&name).map(Some)
    }

    /// Throw away an upload that failed midway
    pub fn abort_upload(&self, upload: Upload) {
        let Upload {
            name, temp_path, ..
        } = upload;
        if let Err(e) = fs::remove_file(&temp_path) {
            tracing::debug!("Could not remove {}: {}", temp_path.display(), e);
        }
        tracing::warn!("Upload of {} aborted", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcode_extensions() {
        assert!(is_gcode_file("benchy.gcode"));
        assert!(is_gcode_file("BENCHY.GCO"));
        assert!(is_gcode_file("part.g"));
        assert!(!is_gcode_file("uploaded.txt"));
        assert!(!is_gcode_file("tmp0"));
    }

    #[test]
    fn test_logical_name() {
        assert_eq!(logical_name("/cube.gcode").unwrap(), "cube.gcode");
        assert!(logical_name("").is_err());
        assert!(logical_name("..").is_err());
        assert!(logical_name("dir/cube.gcode").is_err());
    }
}
