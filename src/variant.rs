//! Variant descriptor: memory layout × numeric domain of one FFT configuration.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    InplaceReal,
    OutplaceReal,
    InplaceComplex,
    OutplaceComplex,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::InplaceReal,
        Variant::OutplaceReal,
        Variant::InplaceComplex,
        Variant::OutplaceComplex,
    ];

    pub const fn new(inplace: bool, complex: bool) -> Self {
        match (inplace, complex) {
            (true, false) => Variant::InplaceReal,
            (false, false) => Variant::OutplaceReal,
            (true, true) => Variant::InplaceComplex,
            (false, true) => Variant::OutplaceComplex,
        }
    }

    pub const fn is_inplace(self) -> bool {
        matches!(self, Variant::InplaceReal | Variant::InplaceComplex)
    }

    pub const fn is_complex(self) -> bool {
        matches!(self, Variant::InplaceComplex | Variant::OutplaceComplex)
    }

    /// Real in-place transforms of rank > 1 pad every row of the real buffer
    /// so it can hold the complex half spectrum.
    pub const fn requires_padding(self, ndim: usize) -> bool {
        self.is_inplace() && !self.is_complex() && ndim > 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Variant::InplaceReal => "Inplace_Real",
            Variant::OutplaceReal => "Outplace_Real",
            Variant::InplaceComplex => "Inplace_Complex",
            Variant::OutplaceComplex => "Outplace_Complex",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = BenchError;

    /// Accepts `Inplace_Real`, `inplace-real`, `inplacereal` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Variant::ALL
            .into_iter()
            .find(|v| v.name().replace('_', "").to_ascii_lowercase() == key)
            .ok_or_else(|| BenchError::Config(format!("unknown variant `{s}`")))
    }
}
