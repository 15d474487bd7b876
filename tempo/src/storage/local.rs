use std::path::{Path, PathBuf};

use axum::body::Bytes;
use bytes::Buf;
use futures::{Stream, TryStreamExt};
use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

use crate::error::{AppError, Result};
use crate::utils::validation::sanitize_filename;

/// Uploads in progress live here until they are complete.
const STAGING_DIR: &str = ".incoming";

/// Ephemeral copies of relayed files, all directly under one root directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates the root (and staging) directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(sanitize_filename(name)?))
    }

    /// Streams `stream` into `name`, replacing any existing file.
    ///
    /// Data lands in a staging file first and is renamed into place only once
    /// fully written, so a failed upload never leaves a partial file behind.
    pub async fn write<S, B, E>(&self, name: &str, stream: S) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: Buf,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let target = self.path_of(name)?;
        let staging = self
            .root
            .join(STAGING_DIR)
            .join(format!("{}.part", uuid::Uuid::new_v4()));

        let written = async {
            let body_reader = StreamReader::new(stream.map_err(io::Error::other));
            futures::pin_mut!(body_reader);

            let file = File::create(&staging).await?;
            let mut file_writer = BufWriter::new(file);
            let written = tokio::io::copy(&mut body_reader, &mut file_writer).await?;
            file_writer.flush().await?;
            file_writer.into_inner().sync_all().await?;
            fs::rename(&staging, &target).await?;
            Ok::<_, io::Error>(written)
        }
        .await;

        match written {
            Ok(written) => Ok(written),
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&staging).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(
                            "failed to remove staging file {}: {cleanup}",
                            staging.display()
                        );
                    }
                }
                Err(AppError::Io(err))
            }
        }
    }

    pub async fn write_bytes(&self, name: &str, data: Bytes) -> Result<u64> {
        let chunk = futures::stream::once(async move { Ok::<_, io::Error>(data) });
        self.write(name, chunk).await
    }

    /// Opens `name` for streaming, [`AppError::NotFound`] if absent.
    pub async fn read(&self, name: &str) -> Result<File> {
        let path = self.path_of(name)?;
        File::open(&path).await.map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => AppError::NotFound(name.to_string()),
            _ => AppError::Io(err),
        })
    }

    pub async fn read_all(&self, name: &str) -> Result<Bytes> {
        let path = self.path_of(name)?;
        match fs::read(&path).await {
            Ok(buf) => Ok(Bytes::from(buf)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(AppError::NotFound(name.to_string()))
            }
            Err(err) => Err(AppError::Io(err)),
        }
    }

    /// Removes `name`. Returns `false` if it was already gone.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!("local file {name} already absent");
                Ok(false)
            }
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.path_of(name) {
            Ok(path) => fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Regular files under the root, sorted by name. Directories are skipped.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = vec![];
        let mut read_dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(file_name) = entry.file_name().to_str() {
                entries.push(file_name.to_string());
            }
        }
        entries.sort();
        Ok(entries)
    }
}
