//! Observations: screenshots captured between model calls.

use std::path::{Path, PathBuf};

use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// One PNG capture of the sandbox. Cheap to clone; the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    seq: u64,
    png: Bytes,
    captured_at: DateTime<Utc>,
}

impl Observation {
    /// Position in the session's observation chain, starting at 1.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// `data:` URL suitable for vision model image inputs.
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }

    /// Hex SHA-256 of the image bytes.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.png))
    }
}

/// Issues observations in a single linear sequence.
#[derive(Debug, Default)]
pub struct ObservationChain {
    latest: Option<Observation>,
}

impl ObservationChain {
    /// Record a fresh capture; it supersedes the previous observation.
    pub fn record(&mut self, png: Vec<u8>) -> Observation {
        let seq = self.latest.as_ref().map_or(1, |o| o.seq + 1);
        let observation = Observation {
            seq,
            png: Bytes::from(png),
            captured_at: Utc::now(),
        };
        self.latest = Some(observation.clone());
        observation
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.latest.as_ref()
    }
}

/// Writes each observation to `{dir}/step-NNNN.png`.
#[derive(Debug, Clone)]
pub struct ScreenshotArchive {
    dir: PathBuf,
}

impl ScreenshotArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn store(&self, observation: &Observation) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("step-{:04}.png", observation.seq));
        tokio::fs::write(&path, observation.png()).await?;
        tracing::debug!(
            seq = observation.seq,
            bytes = observation.png.len(),
            "Saved screenshot to {}",
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_chain_is_linear() {
        let mut chain = ObservationChain::default();
        let first = chain.record(b"one".to_vec());
        let second = chain.record(b"two".to_vec());
        assert_eq!(first.seq(), 1);
        assert_eq!(second.seq(), 2);
        assert_eq!(chain.latest(), Some(&second));
    }

    #[test]
    fn test_data_url_and_digest() {
        let mut chain = ObservationChain::default();
        let obs = chain.record(vec![0x89, b'P', b'N', b'G']);
        assert_eq!(obs.data_url(), "data:image/png;base64,iVBORw==");
        assert_eq!(obs.digest().len(), 64);

        let same = chain.record(vec![0x89, b'P', b'N', b'G']);
        assert_eq!(obs.digest(), same.digest());
    }

    #[tokio::test]
    async fn test_archive_writes_numbered_files() {
        let temp = tempdir().unwrap();
        let archive = ScreenshotArchive::new(temp.path().join("shots"));
        let mut chain = ObservationChain::default();
        chain.record(b"first".to_vec());
        let obs = chain.record(b"second".to_vec());

        let path = archive.store(&obs).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "step-0002.png");
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }
}
