use crate::errors::{AtmError, AtmResult};
use serde::{Deserialize, Serialize};

/// Handle to the group of ranks a process runs on.
///
/// Processes only store the communicator; they never exchange messages
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CommSpec")]
pub struct Comm {
    rank: usize,
    size: usize,
}

#[derive(Deserialize)]
struct CommSpec {
    rank: usize,
    size: usize,
}

impl TryFrom<CommSpec> for Comm {
    type Error = AtmError;

    fn try_from(spec: CommSpec) -> AtmResult<Self> {
        Comm::new(spec.rank, spec.size)
    }
}

impl Comm {
    pub fn new(rank: usize, size: usize) -> AtmResult<Self> {
        if rank >= size {
            return Err(AtmError::InvalidConfiguration(format!(
                "rank {rank} out of range for a communicator of size {size}"
            )));
        }
        Ok(Self { rank, size })
    }

    /// Single rank communicator.
    pub fn serial() -> Self {
        Self { rank: 0, size: 1 }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn am_i_root(&self) -> bool {
        self.rank == 0
    }
}

impl Default for Comm {
    fn default() -> Self {
        Self::serial()
    }
}
