// 🔤 Spreadsheet columns - A..Z, AA, AB, ... and A1 cell references

use crate::error::{Result, TallyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A sheet column, ordered by position and serialized as its letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Column {
    index: usize,
}

impl Column {
    /// Column from a 0-based index (0 → A)
    pub fn from_index(index: usize) -> Self {
        Column { index }
    }

    /// Parse letters, case-insensitive, surrounding whitespace ignored
    pub fn parse(letters: &str) -> Result<Self> {
        let trimmed = letters.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TallyError::InvalidColumn(letters.to_string()));
        }

        let mut value: usize = 0;
        for c in trimmed.chars() {
            let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            value = value
                .checked_mul(26)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| TallyError::InvalidColumn(letters.to_string()))?;
        }

        Ok(Column { index: value - 1 })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn letters(&self) -> String {
        let mut n = self.index + 1;
        let mut out = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        out.iter().rev().collect()
    }

    /// Next column in sheet order (Z → AA)
    pub fn next(&self) -> Column {
        Column {
            index: self.index + 1,
        }
    }

    /// A1 reference for a 0-based row, e.g. row 4 in column K → "K5"
    pub fn cell(&self, row: usize) -> String {
        format!("{}{}", self.letters(), row + 1)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

impl FromStr for Column {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self> {
        Column::parse(s)
    }
}

impl TryFrom<String> for Column {
    type Error = TallyError;

    fn try_from(value: String) -> Result<Self> {
        Column::parse(&value)
    }
}

impl From<Column> for String {
    fn from(column: Column) -> Self {
        column.letters()
    }
}

/// Sheet-qualified A1 reference, quoting sheet names that need it
pub fn a1_reference(sheet: &str, row: usize, column: Column) -> String {
    let needs_quotes = sheet
        .chars()
        .any(|c| !(c.is_alphanumeric() || c == '_'));
    if needs_quotes {
        format!("'{}'!{}", sheet.replace('\'', "''"), column.cell(row))
    } else {
        format!("{}!{}", sheet, column.cell(row))
    }
}
