use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::model::credential::Credential;

/// Reads the allocation service credential from a fixed location.
///
/// The file is re-read on every call since the platform rotates it.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw read, an empty result is returned as is and must be rejected by the caller
    pub async fn read(&self) -> Result<Credential, Error> {
        let content = tokio::fs::read_to_string(&self.path).await
            .map_err(|source| Error::CredentialUnavailable { path: self.path.clone(), source })?;
        Ok(Credential::new(content.trim()))
    }

    /// Fails closed on both missing and empty credentials
    pub async fn credential(&self) -> Result<Credential, Error> {
        let credential = self.read().await?;
        if credential.is_empty() {
            return Err(Error::CredentialEmpty { path: self.path.clone() });
        }
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_reads_token() {
        let mut file = tempfile::NamedTempFile::new().expect("Cannot create token file");
        writeln!(file, "abc.def.ghi").expect("Cannot write token");

        let provider = FileCredentialProvider::new(file.path());
        let credential = provider.credential().await.expect("Cannot read credential");
        assert_eq!(credential.expose(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_rereads_rotated_token() {
        let file = tempfile::NamedTempFile::new().expect("Cannot create token file");
        let provider = FileCredentialProvider::new(file.path());

        std::fs::write(file.path(), "first").unwrap();
        assert_eq!(provider.credential().await.unwrap().expose(), "first");

        std::fs::write(file.path(), "second").unwrap();
        assert_eq!(provider.credential().await.unwrap().expose(), "second");
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("Cannot create temp dir");
        let provider = FileCredentialProvider::new(dir.path().join("token"));

        let err = provider.credential().await.expect_err("Missing token must fail");
        assert!(matches!(err, Error::CredentialUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().expect("Cannot create token file");
        let provider = FileCredentialProvider::new(file.path());

        assert!(provider.read().await.expect("Empty file is readable").is_empty());
        let err = provider.credential().await.expect_err("Empty token must fail");
        assert!(matches!(err, Error::CredentialEmpty { .. }));
    }
}
