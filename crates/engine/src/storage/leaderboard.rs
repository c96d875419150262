use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use super::atomic_io::write_bytes_atomic;

const MAGIC: &[u8; 4] = b"RSLB";
pub const LEADERBOARD_FORMAT_VERSION: u16 = 1;

/// One leaderboard record. Orders by points, then by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub points: u64,
    pub name: String,
}

impl Score {
    pub fn new(name: impl Into<String>, points: u64) -> Self {
        Self {
            points,
            name: name.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("failed to read/write leaderboard {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("leaderboard at {path} has invalid format: {message}")]
    InvalidFormat { path: PathBuf, message: String },
}

/// Score list kept in ascending order and persisted as a small binary file.
///
/// Layout (little-endian): magic `RSLB`, `u16` format version, `u32` record
/// count, `u32` payload length, 32-byte SHA-256 of the payload, then the
/// payload itself as `(u16 name length, name bytes, u64 points)` records.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    path: PathBuf,
    scores: Vec<Score>,
}

impl Leaderboard {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scores: Vec::new(),
        }
    }

    /// Reads the board at `path`; a missing file yields an empty board.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LeaderboardError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "leaderboard_missing_starting_empty");
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(LeaderboardError::Io { path, source }),
        };

        let mut scores = decode(&bytes, &path)?;
        scores.sort();
        info!(path = %path.display(), count = scores.len(), "leaderboard_loaded");
        Ok(Self { path, scores })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts `score`, keeping the list sorted ascending.
    pub fn add_score(&mut self, score: Score) {
        let index = self.scores.partition_point(|existing| existing <= &score);
        self.scores.insert(index, score);
    }

    pub fn all_scores(&self) -> &[Score] {
        &self.scores
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn save(&self) -> Result<(), LeaderboardError> {
        let bytes = encode(&self.scores, &self.path)?;
        write_bytes_atomic(&self.path, &bytes).map_err(|source| LeaderboardError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(
            path = %self.path.display(),
            count = self.scores.len(),
            "leaderboard_saved"
        );
        Ok(())
    }
}

fn encode(scores: &[Score], path: &Path) -> Result<Vec<u8>, LeaderboardError> {
    let mut payload = Vec::new();
    for score in scores {
        write_string(&mut payload, &score.name, path)?;
        payload.extend_from_slice(&score.points.to_le_bytes());
    }
    let record_count = u32::try_from(scores.len())
        .map_err(|_| invalid_format(path, "too many records for u32 count"))?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| invalid_format(path, "payload too large for u32 length"))?;

    let mut bytes = Vec::with_capacity(payload.len() + 46);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&LEADERBOARD_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&record_count.to_le_bytes());
    bytes.extend_from_slice(&payload_len.to_le_bytes());
    bytes.extend_from_slice(&sha256_bytes(&payload));
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode(bytes: &[u8], path: &Path) -> Result<Vec<Score>, LeaderboardError> {
    let mut cursor = 0usize;

    let magic = read_exact(bytes, &mut cursor, 4, path)?;
    if magic != MAGIC {
        return Err(invalid_format(path, "invalid magic"));
    }
    let version = read_u16(bytes, &mut cursor, path)?;
    if version != LEADERBOARD_FORMAT_VERSION {
        return Err(invalid_format(
            path,
            &format!("unsupported format version {version}"),
        ));
    }
    let record_count = read_u32(bytes, &mut cursor, path)? as usize;
    let payload_len = read_u32(bytes, &mut cursor, path)? as usize;
    let expected_hash = read_exact(bytes, &mut cursor, 32, path)?;
    let payload = read_exact(bytes, &mut cursor, payload_len, path)?;
    if cursor != bytes.len() {
        return Err(invalid_format(path, "unexpected trailing bytes"));
    }
    if expected_hash != sha256_bytes(payload) {
        return Err(invalid_format(path, "payload hash mismatch"));
    }

    let mut scores = Vec::with_capacity(record_count.min(payload.len()));
    let mut cursor = 0usize;
    for _ in 0..record_count {
        let name = read_string(payload, &mut cursor, path)?;
        let points = read_u64(payload, &mut cursor, path)?;
        scores.push(Score { points, name });
    }
    if cursor != payload.len() {
        return Err(invalid_format(path, "payload length mismatch"));
    }
    Ok(scores)
}

fn write_string(target: &mut Vec<u8>, value: &str, path: &Path) -> Result<(), LeaderboardError> {
    let bytes = value.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(invalid_format(path, "name too long for u16 length"));
    }
    target.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    target.extend_from_slice(bytes);
    Ok(())
}

fn read_string(bytes: &[u8], cursor: &mut usize, path: &Path) -> Result<String, LeaderboardError> {
    let len = read_u16(bytes, cursor, path)? as usize;
    let raw = read_exact(bytes, cursor, len, path)?;
    std::str::from_utf8(raw)
        .map(|value| value.to_string())
        .map_err(|_| invalid_format(path, "invalid UTF-8 name"))
}

fn read_u16(bytes: &[u8], cursor: &mut usize, path: &Path) -> Result<u16, LeaderboardError> {
    Ok(u16::from_le_bytes(
        read_exact(bytes, cursor, 2, path)?
            .try_into()
            .map_err(|_| invalid_format(path, "invalid u16 encoding"))?,
    ))
}

fn read_u32(bytes: &[u8], cursor: &mut usize, path: &Path) -> Result<u32, LeaderboardError> {
    Ok(u32::from_le_bytes(
        read_exact(bytes, cursor, 4, path)?
            .try_into()
            .map_err(|_| invalid_format(path, "invalid u32 encoding"))?,
    ))
}

fn read_u64(bytes: &[u8], cursor: &mut usize, path: &Path) -> Result<u64, LeaderboardError> {
    Ok(u64::from_le_bytes(
        read_exact(bytes, cursor, 8, path)?
            .try_into()
            .map_err(|_| invalid_format(path, "invalid u64 encoding"))?,
    ))
}

fn read_exact<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    len: usize,
    path: &Path,
) -> Result<&'a [u8], LeaderboardError> {
    let end = cursor.saturating_add(len);
    if end > bytes.len() {
        return Err(invalid_format(path, "unexpected end of file"));
    }
    let out = &bytes[*cursor..end];
    *cursor = end;
    Ok(out)
}

fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn invalid_format(path: &Path, message: &str) -> LeaderboardError {
    LeaderboardError::InvalidFormat {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
