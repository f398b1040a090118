//! Samplers: the sources a [`SampleTaker`] polls.
//!
//! Every sampler answers one question, "what are your readings right now?",
//! with a [`Readings`] map from field name to value. Single-valued sources
//! (files and shell commands) report one reading under the empty field name.
//! Multi-valued sources (CPU and memory counters) name each field.
//!
//! [`Sampler`] is a plain enum. The variant is picked once, when the taker
//! is built, from the item's [`SamplerKind`].
//!
//! [`SampleTaker`]: crate::SampleTaker

mod bash;
pub use bash::BashSampler;

mod cpu;
pub use cpu::CpuSampler;

mod file;
pub use file::FileSampler;

mod memory;
pub use memory::MemorySampler;

mod uptime;
pub use uptime::UptimeSampler;

use crate::{ItemSpec, SampleError, SamplerKind};
use std::{collections::BTreeMap, path::Path};

/// Field name to value. The empty field name is the sole reading of a
/// single-valued source.
pub type Readings = BTreeMap<String, i64>;

/// A source of readings for one configured item.
#[derive(Debug)]
pub enum Sampler {
    File(FileSampler),
    Bash(BashSampler),
    Cpu(CpuSampler),
    Memory(MemorySampler),
    Uptime(UptimeSampler),
}

impl Sampler {
    /// Build the sampler an item asks for.
    ///
    /// CPU items read the counter named by `path`, falling back to the item's
    /// own name, so an item called `cpu0` with no path samples `cpu0`.
    pub fn for_item(spec: &ItemSpec) -> Self {
        match spec.sampler {
            SamplerKind::File => Self::File(FileSampler::new(&spec.source)),
            SamplerKind::Bash => Self::Bash(BashSampler::new(&spec.source)),
            SamplerKind::Cpu => {
                let counter = if spec.source.is_empty() {
                    &spec.name
                } else {
                    &spec.source
                };
                Self::Cpu(CpuSampler::new(counter))
            }
            SamplerKind::Memory => Self::Memory(MemorySampler::default()),
            SamplerKind::Uptime => Self::Uptime(UptimeSampler::default()),
        }
    }

    /// Take one reading.
    pub async fn sample(&self) -> Result<Readings, SampleError> {
        match self {
            Self::File(s) => s.sample().await,
            Self::Bash(s) => s.sample().await,
            Self::Cpu(s) => s.sample().await,
            Self::Memory(s) => s.sample().await,
            Self::Uptime(s) => s.sample().await,
        }
    }
}

/// Read a whole source file. The read runs off the runtime's workers, so a
/// source that never answers (a FIFO, a hung mount) only stalls its own
/// taker, and dropping the future abandons it.
async fn read(path: &Path) -> Result<String, SampleError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SampleError::Io {
            path: path.to_owned(),
            source,
        })
}

/// Parse the output of a single-valued source: one base-10 integer, with
/// surrounding newlines ignored.
fn parse_value(text: &str) -> Result<i64, SampleError> {
    let trimmed = text.trim_matches('\n');
    trimmed.parse().map_err(|_| SampleError::Parse {
        text: trimmed.to_owned(),
    })
}

fn single(value: i64) -> Readings {
    Readings::from([(String::new(), value)])
}
