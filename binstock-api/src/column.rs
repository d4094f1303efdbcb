//! Grid coordinates - column codes (A..Z, AA..ZZ) and cell references.
//!
//! Columns use a bijective base-26 numbering: one-letter codes are 1..=26,
//! two-letter codes continue at 27 ("AA") up to 702 ("ZZ").

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest column index ("ZZ").
pub const MAX_COLUMN_INDEX: u16 = 702;

/// Highest row number a cabinet may have.
pub const MAX_ROWS: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("invalid column code {0:?} (expected A..Z or AA..ZZ)")]
    InvalidColumn(String),

    #[error("column index {0} out of range (1..=702)")]
    ColumnOutOfRange(u16),

    #[error("invalid row {0} (expected 1..=128)")]
    RowOutOfRange(u32),
}

/// Check that `code` is one or two uppercase ASCII letters.
pub fn column_code_valid(code: &str) -> bool {
    let bytes = code.as_bytes();
    (1..=2).contains(&bytes.len()) && bytes.iter().all(|b| b.is_ascii_uppercase())
}

/// Convert a column code to its 1-based index.
pub fn colcode_to_idx(code: &str) -> Result<u16, CoordinateError> {
    if !column_code_valid(code) {
        return Err(CoordinateError::InvalidColumn(code.to_string()));
    }
    let bytes = code.as_bytes();
    let idx = match bytes {
        [single] => u16::from(single - b'A') + 1,
        [first, second] => 26 + 26 * u16::from(first - b'A') + u16::from(second - b'A') + 1,
        _ => return Err(CoordinateError::InvalidColumn(code.to_string())),
    };
    Ok(idx)
}

/// Convert a 1-based column index back to its code.
pub fn idx_to_colcode(idx: u16) -> Result<String, CoordinateError> {
    if !(1..=MAX_COLUMN_INDEX).contains(&idx) {
        return Err(CoordinateError::ColumnOutOfRange(idx));
    }
    let letter = |n: u16| char::from(b'A' + n as u8);
    if idx <= 26 {
        return Ok(letter(idx - 1).to_string());
    }
    let rem = idx - 27;
    Ok(format!("{}{}", letter(rem / 26), letter(rem % 26)))
}

/// Every column from "A" up to `max` (inclusive), in index order.
pub fn iter_cols_upto(max: ColumnCode) -> impl Iterator<Item = ColumnCode> {
    (1..=max.index().min(MAX_COLUMN_INDEX)).map(ColumnCode)
}

/// A validated column code, stored as its index.
///
/// Ordering follows the index, so "Z" < "AA".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnCode(u16);

impl ColumnCode {
    /// "ZZ"
    pub const MAX: ColumnCode = ColumnCode(MAX_COLUMN_INDEX);

    /// Parse a strict column code (one or two uppercase letters).
    pub fn new(code: &str) -> Result<Self, CoordinateError> {
        colcode_to_idx(code).map(Self)
    }

    /// Build from a 1-based index.
    pub fn from_index(idx: u16) -> Result<Self, CoordinateError> {
        if (1..=MAX_COLUMN_INDEX).contains(&idx) {
            Ok(Self(idx))
        } else {
            Err(CoordinateError::ColumnOutOfRange(idx))
        }
    }

    /// The 1-based index.
    pub fn index(self) -> u16 {
        self.0
    }

    /// The textual code.
    pub fn code(self) -> String {
        // Index is range-checked on construction.
        idx_to_colcode(self.0).unwrap_or_default()
    }
}

impl fmt::Display for ColumnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for ColumnCode {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ColumnCode {
    type Error = CoordinateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ColumnCode> for String {
    fn from(value: ColumnCode) -> Self {
        value.code()
    }
}

/// One grid cell of a cabinet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub col: ColumnCode,
    pub row: u32,
}

impl CellRef {
    pub fn new(col: ColumnCode, row: u32) -> Result<Self, CoordinateError> {
        if !(1..=MAX_ROWS).contains(&row) {
            return Err(CoordinateError::RowOutOfRange(row));
        }
        Ok(Self { col, row })
    }

    /// Validate a raw column code and row number.
    pub fn parse(col: &str, row: u32) -> Result<Self, CoordinateError> {
        Self::new(ColumnCode::new(col)?, row)
    }
}

/// Default label: column code followed by row number, e.g. `"AB12"`.
impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.col, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters() {
        assert_eq!(colcode_to_idx("A").unwrap(), 1);
        assert_eq!(colcode_to_idx("Z").unwrap(), 26);
        assert_eq!(idx_to_colcode(1).unwrap(), "A");
        assert_eq!(idx_to_colcode(26).unwrap(), "Z");
    }

    #[test]
    fn test_double_letters() {
        assert_eq!(colcode_to_idx("AA").unwrap(), 27);
        assert_eq!(colcode_to_idx("AZ").unwrap(), 52);
        assert_eq!(colcode_to_idx("BA").unwrap(), 53);
        assert_eq!(colcode_to_idx("ZZ").unwrap(), 702);
        assert_eq!(idx_to_colcode(27).unwrap(), "AA");
        assert_eq!(idx_to_colcode(702).unwrap(), "ZZ");
    }

    #[test]
    fn test_round_trip_all_codes() {
        for idx in 1..=MAX_COLUMN_INDEX {
            let code = idx_to_colcode(idx).unwrap();
            assert_eq!(colcode_to_idx(&code).unwrap(), idx, "code {}", code);
        }
    }

    #[test]
    fn test_iter_cols_strictly_increasing() {
        let cols: Vec<ColumnCode> = iter_cols_upto(ColumnCode::new("ZZ").unwrap()).collect();
        assert_eq!(cols.len(), 702);
        assert!(cols.windows(2).all(|w| w[0].index() < w[1].index()));
        assert_eq!(cols[25].code(), "Z");
        assert_eq!(cols[26].code(), "AA");
    }

    #[test]
    fn test_iter_cols_short_range() {
        let cols: Vec<String> = iter_cols_upto(ColumnCode::new("C").unwrap())
            .map(|c| c.code())
            .collect();
        assert_eq!(cols, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_validation() {
        assert!(column_code_valid("A"));
        assert!(column_code_valid("QX"));
        assert!(!column_code_valid(""));
        assert!(!column_code_valid("a"));
        assert!(!column_code_valid("AAA"));
        assert!(!column_code_valid("A1"));
        assert!(matches!(colcode_to_idx("é"), Err(CoordinateError::InvalidColumn(_))));
        assert!(idx_to_colcode(0).is_err());
        assert!(idx_to_colcode(703).is_err());
    }

    #[test]
    fn test_cell_ref() {
        let cell = CellRef::parse("AB", 12).unwrap();
        assert_eq!(cell.to_string(), "AB12");
        assert_eq!(CellRef::parse("A", 0), Err(CoordinateError::RowOutOfRange(0)));
        assert_eq!(CellRef::parse("A", 129), Err(CoordinateError::RowOutOfRange(129)));
    }

    #[test]
    fn test_column_serde_as_string() {
        let col = ColumnCode::new("AC").unwrap();
        let json = serde_json::to_string(&col).unwrap();
        assert_eq!(json, "\"AC\"");
        let back: ColumnCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, col);
        assert!(serde_json::from_str::<ColumnCode>("\"a\"").is_err());
    }
}
