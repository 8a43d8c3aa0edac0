use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::job::JobId;
use crate::sanitize;

/// Name of the stored upload inside a job's upload directory.
pub const INPUT_FILENAME: &str = "input.pdf";

/// On-disk areas for uploads and artifacts.
///
/// Every job gets its own directory under each area, named after the job
/// id, so concurrent jobs never share a path and purging a job is a pair of
/// directory removals.
pub struct FileStore {
    upload_directory: PathBuf,
    output_directory: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(upload_directory: P, output_directory: Q) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn job_upload_dir(&self, id: &JobId) -> PathBuf {
        self.upload_directory.join(id.as_str())
    }

    pub fn job_output_dir(&self, id: &JobId) -> PathBuf {
        self.output_directory.join(id.as_str())
    }

    /// Creates both storage roots.
    pub async fn ensure_directories(&self) -> Result<(), StorageError> {
        ensure_directory(&self.upload_directory).await?;
        ensure_directory(&self.output_directory).await
    }

    /// Stores the uploaded document and returns its path.
    ///
    /// The file is created with `create_new`, so a second upload under the
    /// same id fails instead of overwriting the first.
    pub async fn save_upload(&self, id: &JobId, content: &[u8]) -> Result<PathBuf, StorageError> {
        let dir = self.job_upload_dir(id);
        ensure_directory(&dir).await?;

        let path = dir.join(INPUT_FILENAME);
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(path));
            }
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        };

        file.write_all(content)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        file.flush().await.map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// Prepares the job's output directory and returns where the artifact
    /// named `filename` should be written. The file itself is not created.
    pub async fn reserve_output(&self, id: &JobId, filename: &str) -> Result<PathBuf, StorageError> {
        let dir = self.job_output_dir(id);
        ensure_directory(&dir).await?;
        Ok(dir.join(sanitize::sanitize_filename(filename)))
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).await.map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Whether `path` names an existing regular file.
    pub async fn is_file(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Removes everything stored for the job.
    ///
    /// Missing directories are fine: the job may never have produced output,
    /// or a previous purge may already have run.
    pub async fn purge(&self, id: &JobId) -> Result<(), StorageError> {
        remove_dir_if_present(&self.job_upload_dir(id)).await?;
        remove_dir_if_present(&self.job_output_dir(id)).await
    }
}

async fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
}

async fn remove_dir_if_present(path: &Path) -> Result<(), StorageError> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("Nothing to purge at {}", path.display());
            Ok(())
        }
        Err(e) => Err(StorageError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
