//! Transform extents.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// Largest supported transform rank.
pub const MAX_DIMS: usize = 3;

/// Axis lengths of a transform, row-major with the last axis contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Extent(Vec<usize>);

impl Extent {
    pub fn new(dims: &[usize]) -> Result<Self, BenchError> {
        if dims.is_empty() || dims.len() > MAX_DIMS {
            return Err(BenchError::InvalidExtent(format!(
                "expected 1 to {MAX_DIMS} axes, got {}",
                dims.len()
            )));
        }
        if dims.contains(&0) {
            return Err(BenchError::InvalidExtent(format!(
                "zero-length axis in {dims:?}"
            )));
        }
        dims.iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| BenchError::InvalidExtent(format!("{dims:?} overflows usize")))?;
        Ok(Self(dims.to_vec()))
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.0.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Length of the contiguous axis.
    pub fn last(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl FromStr for Extent {
    type Err = BenchError;

    /// Parse `1024`, `64x64` or `16x16x16`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dims = s
            .trim()
            .split(['x', 'X'])
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .map_err(|_| BenchError::InvalidExtent(format!("`{s}` is not AxBxC")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Extent::new(&dims)
    }
}

impl TryFrom<Vec<usize>> for Extent {
    type Error = BenchError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        Extent::new(&dims)
    }
}

impl From<Extent> for Vec<usize> {
    fn from(e: Extent) -> Self {
        e.0
    }
}
