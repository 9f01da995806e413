use crate::errors::{AtmError, AtmResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag naming one dimension of a field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldTag {
    /// Horizontal columns owned by this rank
    Column,
    /// Vertical level mid-points
    LevelMidPoint,
    /// Vertical level interfaces (one more than mid-points)
    LevelInterface,
    /// Shortwave spectral band
    ShortwaveBand,
    /// Longwave spectral band
    LongwaveBand,
    /// Radiatively active gas species
    GasSpecies,
    /// Generic vector component
    Component,
}

impl FieldTag {
    pub fn short_name(&self) -> &'static str {
        match self {
            FieldTag::Column => "COL",
            FieldTag::LevelMidPoint => "LEV",
            FieldTag::LevelInterface => "ILEV",
            FieldTag::ShortwaveBand => "SWBND",
            FieldTag::LongwaveBand => "LWBND",
            FieldTag::GasSpecies => "NGAS",
            FieldTag::Component => "CMP",
        }
    }

    /// Dimension name used when reading and writing named-dimension files.
    pub fn io_name(&self) -> &'static str {
        match self {
            FieldTag::Column => "ncol",
            FieldTag::LevelMidPoint => "lev",
            FieldTag::LevelInterface => "ilev",
            FieldTag::ShortwaveBand => "swband",
            FieldTag::LongwaveBand => "lwband",
            FieldTag::GasSpecies => "ngas",
            FieldTag::Component => "dim",
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Short aliases for the field tags, for building layouts compactly.
pub mod tags {
    use super::FieldTag;

    pub const COL: FieldTag = FieldTag::Column;
    pub const LEV: FieldTag = FieldTag::LevelMidPoint;
    pub const ILEV: FieldTag = FieldTag::LevelInterface;
    pub const SWBND: FieldTag = FieldTag::ShortwaveBand;
    pub const LWBND: FieldTag = FieldTag::LongwaveBand;
    pub const NGAS: FieldTag = FieldTag::GasSpecies;
    pub const CMP: FieldTag = FieldTag::Component;
}

/// Ordered dimensions of a field, paired with their extents.
///
/// The last dimension is the fastest varying one in memory. Rank and extents
/// are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldLayout {
    tags: Vec<FieldTag>,
    extents: Vec<usize>,
}

impl FieldLayout {
    /// Create a layout from matching lists of tags and extents.
    ///
    /// Every extent must be strictly positive.
    pub fn new(tags: &[FieldTag], extents: &[usize]) -> AtmResult<Self> {
        if tags.len() != extents.len() {
            return Err(AtmError::InvalidLayout(format!(
                "{} tags were given for {} extents",
                tags.len(),
                extents.len()
            )));
        }
        if let Some(pos) = extents.iter().position(|&e| e == 0) {
            return Err(AtmError::InvalidLayout(format!(
                "extent of dimension {} must be positive",
                tags[pos]
            )));
        }
        Ok(Self {
            tags: tags.to_vec(),
            extents: extents.to_vec(),
        })
    }

    /// Create a layout from `(tag, extent)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (FieldTag, usize)>) -> AtmResult<Self> {
        let (tags, extents): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self::new(&tags, &extents)
    }

    /// Total number of logical elements.
    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn rank(&self) -> usize {
        self.tags.len()
    }

    pub fn tags(&self) -> &[FieldTag] {
        &self.tags
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Extent of the first dimension carrying `tag`.
    pub fn dim(&self, tag: FieldTag) -> Option<usize> {
        self.tags
            .iter()
            .position(|t| *t == tag)
            .map(|idx| self.extents[idx])
    }

    pub fn has_tag(&self, tag: FieldTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Extent of the fastest varying dimension (1 for rank-0 layouts).
    pub fn last_extent(&self) -> usize {
        self.extents.last().copied().unwrap_or(1)
    }
}

impl fmt::Display for FieldLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags.iter().map(|t| t.short_name()).collect();
        let extents: Vec<String> = self.extents.iter().map(|e| e.to_string()).collect();
        write!(f, "<{}>({})", tags.join(","), extents.join(","))
    }
}
