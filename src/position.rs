//! Source positions
//!
//! A [`RowCol`] fits the dimensions of the legacy line-state storage: 19 bits
//! of row (524k lines) and 12 bits of column (4k characters per line).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 1-based source position; `(0, 0)` means invalid/unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowCol {
    row: u32,
    col: u16,
}

impl RowCol {
    /// Number of bits available for the row
    pub const ROW_BITS: u32 = 19;
    /// Number of bits available for the column
    pub const COL_BITS: u32 = 32 - Self::ROW_BITS - 1;
    /// Largest representable row
    pub const MAX_ROW: u32 = (1 << Self::ROW_BITS) - 1;
    /// Largest representable column
    pub const MAX_COL: u32 = (1 << Self::COL_BITS) - 1;

    /// The invalid position
    pub const INVALID: RowCol = RowCol { row: 0, col: 0 };

    /// Creates a position, clamping out-of-range values.
    ///
    /// Clamping is logged as a warning; legacy sources are known to exceed
    /// the nominal limits by a little and must stay navigable.
    pub fn new(row: u32, col: u32) -> Self {
        match Self::checked(row, col) {
            Ok(rc) => rc,
            Err(_) => {
                tracing::warn!(row, col, "invalid row or column number");
                Self::clamped(row, col)
            }
        }
    }

    /// Creates a position, reporting out-of-range values as [`Error::RowColOverflow`]
    pub fn checked(row: u32, col: u32) -> Result<Self> {
        if row == 0 || col == 0 || row > Self::MAX_ROW || col > Self::MAX_COL {
            return Err(Error::RowColOverflow { row, col });
        }
        Ok(RowCol {
            row,
            col: col as u16,
        })
    }

    fn clamped(row: u32, col: u32) -> Self {
        RowCol {
            row: row.clamp(1, Self::MAX_ROW),
            col: col.clamp(1, Self::MAX_COL) as u16,
        }
    }

    /// 1-based line number
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 1-based column number
    pub fn col(&self) -> u32 {
        self.col as u32
    }

    /// Valid rows and columns start with 1
    pub fn is_valid(&self) -> bool {
        self.row > 0 && self.col > 0
    }

    /// `(row << COL_BITS) | col`, zero for the invalid position
    pub fn packed(&self) -> u32 {
        (self.row << Self::COL_BITS) | self.col as u32
    }

    /// Column part of a packed position
    pub fn unpack_col(packed: u32) -> u32 {
        packed & ((1 << Self::COL_BITS) - 1)
    }

    /// Row part of a packed position
    pub fn unpack_row(packed: u32) -> u32 {
        packed >> Self::COL_BITS
    }

    /// Inverse of [`RowCol::packed`]
    pub fn from_packed(packed: u32) -> Self {
        RowCol {
            row: Self::unpack_row(packed) & Self::MAX_ROW,
            col: Self::unpack_col(packed) as u16,
        }
    }
}

impl fmt::Display for RowCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}
