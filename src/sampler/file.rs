use super::{Readings, parse_value, read, single};
use crate::SampleError;
use std::path::PathBuf;

/// Reads a single integer from a file.
#[derive(Debug, Clone)]
pub struct FileSampler {
    path: PathBuf,
}

impl FileSampler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn sample(&self) -> Result<Readings, SampleError> {
        parse_value(&read(&self.path).await?).map(single)
    }
}
