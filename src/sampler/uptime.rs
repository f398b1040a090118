use super::{Readings, read, single};
use crate::SampleError;
use std::path::{Path, PathBuf};

/// Kernel uptime.
pub const UPTIME_PATH: &str = "/proc/uptime";

/// Reports whole seconds since boot.
#[derive(Debug, Clone)]
pub struct UptimeSampler {
    path: PathBuf,
}

impl Default for UptimeSampler {
    fn default() -> Self {
        Self {
            path: PathBuf::from(UPTIME_PATH),
        }
    }
}

impl UptimeSampler {
    /// Read from `path` instead of `/proc/uptime`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn sample(&self) -> Result<Readings, SampleError> {
        let text = read(&self.path).await?;
        parse_uptime(&text, &self.path).map(single)
    }
}

fn parse_uptime(text: &str, path: &Path) -> Result<i64, SampleError> {
    let tokens: Vec<_> = text.split_whitespace().collect();
    let &[uptime, _idle] = tokens.as_slice() else {
        return Err(SampleError::Format {
            path: path.to_owned(),
            detail: format!("expected 2 values, found {}", tokens.len()),
        });
    };

    let seconds: f64 = uptime.parse().map_err(|_| SampleError::Parse {
        text: uptime.to_owned(),
    })?;
    Ok(seconds as i64)
}
