use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

/// Chunk size used when measuring a source by exhaustive read
const MEASURE_CHUNK: usize = 256;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe source {path} not found")]
    NotFound { path: PathBuf },

    #[error("failed to read probe source {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("could not allocate {size} bytes for probe buffer")]
    Alloc { size: usize },
}

impl ProbeError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == ErrorKind::NotFound {
            ProbeError::NotFound { path: path.to_path_buf() }
        } else {
            ProbeError::Io { path: path.to_path_buf(), source: err }
        }
    }
}

/// Raw content of a pseudo-file, at most as long as the bound it was read with
/// Owned by whoever called `read_raw`; dropped once the fields have been extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeBuffer {
    bytes: Vec<u8>,
}

impl ProbeBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// See [`super::parser::extract_field`]
    pub fn field(&self, name: &str) -> Option<String> {
        super::parser::extract_field(&self.bytes, name)
    }
}

impl From<&str> for ProbeBuffer {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

/// Content length of `path`, measured by reading it to the end
///
/// A read failure before the first byte is an error; a later one ends the
/// measurement with the count so far.
///
/// Files under /proc report a size of 0 through metadata and can't be mapped,
/// so the only reliable length is the number of bytes a read actually yields.
pub fn measure_length<P: AsRef<Path>>(path: P) -> Result<usize, ProbeError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| ProbeError::from_io(path, e))?;
    let mut chunk = [0u8; MEASURE_CHUNK];
    let mut total = 0usize;

    loop {
        match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if total == 0 {
                    return Err(ProbeError::from_io(path, e));
                }
                // A short count is still a usable bound
                debug!("Stopped measuring {} after {} bytes: {}", path.display(), total, e);
                break;
            }
        }
    }

    Ok(total)
}

/// Read at most `max_bytes` from `path`
///
/// A failure after some bytes were read returns what was read so far; a failure
/// before the first byte is returned as an error.
pub fn read_raw<P: AsRef<Path>>(path: P, max_bytes: usize) -> Result<ProbeBuffer, ProbeError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| ProbeError::from_io(path, e))?;

    let mut bytes: Vec<u8> = Vec::new();
    bytes
        .try_reserve_exact(max_bytes)
        .map_err(|_| ProbeError::Alloc { size: max_bytes })?;
    bytes.resize(max_bytes, 0);

    let mut count = 0usize;
    while count < max_bytes {
        match file.read(&mut bytes[count..]) {
            Ok(0) => break,
            Ok(n) => count += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if count == 0 {
                    return Err(ProbeError::from_io(path, e));
                }
                debug!("Short read of {}: kept {} bytes ({})", path.display(), count, e);
                break;
            }
        }
    }

    bytes.truncate(count);
    Ok(ProbeBuffer::new(bytes))
}

/// Measure then read a whole source, bounded by its measured length
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<ProbeBuffer, ProbeError> {
    let path = path.as_ref();
    let len = measure_length(path)?;
    read_raw(path, len)
}
