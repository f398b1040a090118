use super::{Readings, read};
use crate::SampleError;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Kernel memory information.
pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// Fields that must all be present for `/proc/meminfo` to be trusted.
const REQUIRED: [&str; 45] = [
    "MemTotal",
    "MemFree",
    "MemAvailable",
    "Buffers",
    "Cached",
    "SwapCached",
    "Active",
    "Inactive",
    "Active(anon)",
    "Inactive(anon)",
    "Active(file)",
    "Inactive(file)",
    "Unevictable",
    "Mlocked",
    "SwapTotal",
    "SwapFree",
    "Dirty",
    "Writeback",
    "AnonPages",
    "Mapped",
    "Shmem",
    "Slab",
    "SReclaimable",
    "SUnreclaim",
    "KernelStack",
    "PageTables",
    "NFS_Unstable",
    "Bounce",
    "WritebackTmp",
    "CommitLimit",
    "Committed_AS",
    "VmallocTotal",
    "VmallocUsed",
    "VmallocChunk",
    "HardwareCorrupted",
    "AnonHugePages",
    "ShmemHugePages",
    "ShmemPmdMapped",
    "HugePages_Total",
    "HugePages_Free",
    "HugePages_Rsvd",
    "HugePages_Surp",
    "Hugepagesize",
    "DirectMap4k",
    "DirectMap2M",
];

/// Kernel field name to reported field name.
const REPORTED: [(&str, &str); 5] = [
    ("MemAvailable", "available"),
    ("MemFree", "free"),
    ("MemTotal", "total"),
    ("Buffers", "buffers"),
    ("Cached", "cached"),
];

/// Reports available, free, total, buffer and cache memory, in kB.
#[derive(Debug, Clone)]
pub struct MemorySampler {
    path: PathBuf,
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self {
            path: PathBuf::from(MEMINFO_PATH),
        }
    }
}

impl MemorySampler {
    /// Read from `path` instead of `/proc/meminfo`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn sample(&self) -> Result<Readings, SampleError> {
        let text = read(&self.path).await?;
        parse_meminfo(&text, &self.path)
    }
}

fn parse_meminfo(text: &str, path: &Path) -> Result<Readings, SampleError> {
    let mut info = HashMap::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let value: i64 = value.parse().map_err(|_| SampleError::Parse {
            text: value.to_owned(),
        })?;
        info.insert(key.trim_matches(':'), value);
    }

    if let Some(field) = REQUIRED.iter().find(|field| !info.contains_key(*field)) {
        return Err(SampleError::MissingField {
            field: *field,
            path: path.to_owned(),
        });
    }

    Ok(REPORTED
        .iter()
        .map(|(kernel, name)| ((*name).to_owned(), info[kernel]))
        .collect())
}
