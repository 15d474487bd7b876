use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::body::Bytes;
use tokio::fs::{self, File, create_dir_all, read_dir, remove_file, rename};
use tokio::io::{self, AsyncWriteExt};

use crate::error::{AppError, Result};
use crate::storage::ContentStore;
use crate::utils::validation::sanitize_filename;

const STAGING_DIR: &str = ".staging";

/// Content store kept in a directory on durable storage.
///
/// The layout is flat:
///
///	<root>
///	├── .staging
///	│   └── <uuid>      (puts in progress)
///	└── <name>          (one file per content record)
pub struct FilesystemContentStore {
    root: PathBuf,
}

impl FilesystemContentStore {
    pub async fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        create_dir_all(root.join(STAGING_DIR)).await?;
        Ok(Self { root })
    }

    fn object_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(sanitize_filename(name)?))
    }
}

fn not_found_or_io(name: &str, err: io::Error) -> AppError {
    match err.kind() {
        io::ErrorKind::NotFound => AppError::NotFound(name.to_string()),
        _ => AppError::StorageIo(format!("{name}: {err}")),
    }
}

#[async_trait::async_trait]
impl ContentStore for FilesystemContentStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        let target = self.object_path(name)?;
        let staging = self
            .root
            .join(STAGING_DIR)
            .join(uuid::Uuid::new_v4().to_string());

        let result = async {
            let mut file = File::create(&staging).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            rename(&staging, &target).await
        }
        .await;

        if let Err(err) = result {
            let _ = remove_file(&staging).await;
            return Err(AppError::StorageIo(format!("put {name}: {err}")));
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        let path = self.object_path(name)?;
        fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|err| not_found_or_io(name, err))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries: Vec<(SystemTime, String)> = vec![];
        let mut dir = read_dir(&self.root)
            .await
            .map_err(|err| AppError::StorageIo(format!("list: {err}")))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| AppError::StorageIo(format!("list: {err}")))?
        {
            let Ok(meta) = entry.metadata().await else {
                // removed between readdir and stat
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            if let Some(file_name) = entry.file_name().to_str() {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                entries.push((modified, file_name.to_string()));
            }
        }
        entries.sort();
        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.object_path(name)?;
        remove_file(path).await.map_err(|err| not_found_or_io(name, err))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.object_path(name)?;
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(AppError::StorageIo(format!("{name}: {err}"))),
        }
    }
}
