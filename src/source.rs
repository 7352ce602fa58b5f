//! Record sources: named containers of CSV objects.

use crate::error::InsightsError;

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// A readable stream over one stored object.
///
/// Readers are consumed on a blocking task, so they must be `Send`. Dropping the reader releases
/// the underlying connection or file handle.
pub type ObjectReader = Box<dyn Read + Send>;

/// A store of CSV datasets, addressed by container and object name.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Open an object for reading.
    ///
    /// Fails with [InsightsError::ContainerNotFound] or [InsightsError::ObjectNotFound] when the
    /// dataset does not exist.
    async fn open(&self, container: &str, object: &str) -> Result<ObjectReader, InsightsError>;

    /// List the names of the objects in a container, sorted.
    async fn list(&self, container: &str) -> Result<Vec<String>, InsightsError>;
}

/// Check that a name addresses a single entry of its parent.
fn check_name(name: &str) -> Result<(), InsightsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(InsightsError::InvalidObjectName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Record source backed by a local directory.
///
/// Containers are subdirectories of the root and objects are the regular files within them.
pub struct FsRecordSource {
    root: PathBuf,
}

impl FsRecordSource {
    /// Return a new FsRecordSource rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the source.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the path of a container, failing if it does not exist.
    async fn container_path(&self, container: &str) -> Result<PathBuf, InsightsError> {
        check_name(container)?;
        let path = self.root.join(container);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => Ok(path),
            Ok(_) => Err(InsightsError::ContainerNotFound {
                container: container.to_string(),
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(InsightsError::ContainerNotFound {
                    container: container.to_string(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl RecordSource for FsRecordSource {
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn open(&self, container: &str, object: &str) -> Result<ObjectReader, InsightsError> {
        let path = self.container_path(container).await?;
        check_name(object)?;
        let path = path.join(object);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => Some(file),
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(error) => return Err(error.into()),
        };
        if let Some(file) = file {
            // Directories open successfully on some platforms.
            if file.metadata().await?.is_file() {
                return Ok(Box::new(file.into_std().await));
            }
        }
        Err(InsightsError::ObjectNotFound {
            container: container.to_string(),
            object: object.to_string(),
            available: self.list(container).await?,
        })
    }

    async fn list(&self, container: &str) -> Result<Vec<String>, InsightsError> {
        let path = self.container_path(container).await?;
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemorySource;

    use std::io::Read;

    use tempfile::tempdir;

    fn write(root: &Path, container: &str, object: &str, data: &str) {
        let dir = root.join(container);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(object), data).unwrap();
    }

    fn read_all(mut reader: ObjectReader) -> String {
        let mut data = String::new();
        reader.read_to_string(&mut data).unwrap();
        data
    }

    #[test]
    fn check_name_rejects_paths() {
        check_name("All_Diets.csv").unwrap();
        check_name("data set.csv").unwrap();
        for name in ["", ".", "..", "a/b", "../etc", "a\\b"] {
            assert!(
                matches!(check_name(name), Err(InsightsError::InvalidObjectName { .. })),
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn fs_open() {
        let dir = tempdir().unwrap();
        write(dir.path(), "datasets", "diets.csv", "a,b\n1,2\n");
        let source = FsRecordSource::new(dir.path());
        assert_eq!(dir.path(), source.root());
        let reader = source.open("datasets", "diets.csv").await.unwrap();
        assert_eq!("a,b\n1,2\n", read_all(reader));
    }

    #[tokio::test]
    async fn fs_list_only_files() {
        let dir = tempdir().unwrap();
        write(dir.path(), "datasets", "b.csv", "");
        write(dir.path(), "datasets", "a.csv", "");
        std::fs::create_dir_all(dir.path().join("datasets").join("nested")).unwrap();
        let source = FsRecordSource::new(dir.path());
        assert_eq!(
            vec!["a.csv".to_string(), "b.csv".to_string()],
            source.list("datasets").await.unwrap()
        );
    }

    #[tokio::test]
    async fn fs_open_missing_object() {
        let dir = tempdir().unwrap();
        write(dir.path(), "datasets", "diets.csv", "");
        let source = FsRecordSource::new(dir.path());
        match source.open("datasets", "missing.csv").await {
            Err(InsightsError::ObjectNotFound {
                container,
                object,
                available,
            }) => {
                assert_eq!("datasets", container);
                assert_eq!("missing.csv", object);
                assert_eq!(vec!["diets.csv".to_string()], available);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn fs_open_directory_is_not_an_object() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("datasets").join("nested")).unwrap();
        let source = FsRecordSource::new(dir.path());
        assert!(matches!(
            source.open("datasets", "nested").await,
            Err(InsightsError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn fs_open_missing_container() {
        let dir = tempdir().unwrap();
        let source = FsRecordSource::new(dir.path());
        assert!(matches!(
            source.open("missing", "diets.csv").await,
            Err(InsightsError::ContainerNotFound { .. })
        ));
        assert!(matches!(
            source.list("missing").await,
            Err(InsightsError::ContainerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn fs_open_rejects_traversal() {
        let dir = tempdir().unwrap();
        write(dir.path(), "datasets", "diets.csv", "");
        let source = FsRecordSource::new(dir.path().join("datasets"));
        assert!(matches!(
            source.open("..", "datasets").await,
            Err(InsightsError::InvalidObjectName { .. })
        ));
        assert!(matches!(
            source.open("datasets", "../datasets/diets.csv").await,
            Err(InsightsError::InvalidObjectName { .. })
        ));
    }

    #[tokio::test]
    async fn memory_source_as_trait_object() {
        let source: Box<dyn RecordSource> =
            Box::new(MemorySource::default().with_object("datasets", "a.csv", b"x\n1\n"));
        assert_eq!("x\n1\n", read_all(source.open("datasets", "a.csv").await.unwrap()));
        assert!(matches!(
            source.open("datasets", "b.csv").await,
            Err(InsightsError::ObjectNotFound { available, .. }) if available == vec!["a.csv"]
        ));
    }
}
