use super::{Readings, read};
use crate::SampleError;
use std::path::{Path, PathBuf};

/// Kernel aggregate statistics.
pub const STAT_PATH: &str = "/proc/stat";

/// Column names of a `cpu` line in `/proc/stat`, in order.
const FIELDS: [&str; 10] = [
    "user",
    "nice",
    "system",
    "idle",
    "iowait",
    "irq",
    "softirq",
    "steal",
    "guest",
    "guest_nice",
];

/// Reads the time counters of one `cpu` line of `/proc/stat`.
#[derive(Debug, Clone)]
pub struct CpuSampler {
    counter: String,
    path: PathBuf,
}

impl CpuSampler {
    /// Sample the line named `counter`, e.g. `cpu` for the aggregate or
    /// `cpu0` for the first core.
    pub fn new(counter: impl Into<String>) -> Self {
        Self {
            counter: counter.into(),
            path: PathBuf::from(STAT_PATH),
        }
    }

    /// Read from `path` instead of `/proc/stat`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn counter(&self) -> &str {
        &self.counter
    }

    pub async fn sample(&self) -> Result<Readings, SampleError> {
        let text = read(&self.path).await?;
        parse_stat(&text, &self.counter, &self.path)
    }
}

/// Find the line for `counter` and name its values positionally.
fn parse_stat(text: &str, counter: &str, path: &Path) -> Result<Readings, SampleError> {
    let values = text
        .lines()
        .map(str::split_whitespace)
        .find_map(|mut tokens| (tokens.next() == Some(counter)).then_some(tokens))
        .ok_or_else(|| SampleError::NotFound {
            name: counter.to_owned(),
            path: path.to_owned(),
        })?;

    let mut readings = Readings::new();
    for (i, token) in values.enumerate() {
        let Some(field) = FIELDS.get(i) else {
            return Err(SampleError::Format {
                path: path.to_owned(),
                detail: format!("'{counter}' has more than {} values", FIELDS.len()),
            });
        };
        let value = token.parse().map_err(|_| SampleError::Parse {
            text: token.to_owned(),
        })?;
        readings.insert((*field).to_owned(), value);
    }
    Ok(readings)
}
