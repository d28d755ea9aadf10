//! A small column-oriented table: named, typed columns of equal length where
//! any cell may be missing.
//!
//! AEC and ABS downloads are read into this shape as-is (no renaming, no date
//! parsing) and every later stage hands back a fresh `Table`.

use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Cell contents read as missing.
pub const NA_TOKENS: [&str; 3] = ["", "NA", "N/A"];

/// The format dates are written out in.
pub const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Date(d) => write!(f, "{}", d.format(ISO_DATE)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Number,
    Date,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Number => write!(f, "numeric"),
            Self::Date => write!(f, "date"),
        }
    }
}

/// Parse a count or coordinate. Thousands separators are tolerated; anything
/// else that isn't a finite number (`-`, `n/a`, footnote letters) is `None`.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    pub fn missing(ty: ColumnType, len: usize) -> Self {
        match ty {
            ColumnType::Text => Self::Text(vec![None; len]),
            ColumnType::Number => Self::Number(vec![None; len]),
            ColumnType::Date => Self::Date(vec![None; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(v) => v.len(),
            Self::Number(v) => v.len(),
            Self::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Text(_) => ColumnType::Text,
            Self::Number(_) => ColumnType::Number,
            Self::Date(_) => ColumnType::Date,
        }
    }

    pub fn get(&self, i: usize) -> Value {
        match self {
            Self::Text(v) => v
                .get(i)
                .cloned()
                .flatten()
                .map_or(Value::Missing, Value::Text),
            Self::Number(v) => v
                .get(i)
                .copied()
                .flatten()
                .map_or(Value::Missing, Value::Number),
            Self::Date(v) => v
                .get(i)
                .copied()
                .flatten()
                .map_or(Value::Missing, Value::Date),
        }
    }

    pub fn is_missing(&self, i: usize) -> bool {
        match self {
            Self::Text(v) => v.get(i).map_or(true, Option::is_none),
            Self::Number(v) => v.get(i).map_or(true, Option::is_none),
            Self::Date(v) => v.get(i).map_or(true, Option::is_none),
        }
    }

    pub fn count_present(&self) -> usize {
        (0..self.len()).filter(|&i| !self.is_missing(i)).count()
    }

    pub fn all_missing(&self) -> bool {
        self.count_present() == 0
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match self {
            Self::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dates(&self) -> Option<&[Option<NaiveDate>]> {
        match self {
            Self::Date(v) => Some(v),
            _ => None,
        }
    }

    /// New column made of the rows at `idx`, in that order.
    pub fn take(&self, idx: &[usize]) -> Self {
        match self {
            Self::Text(v) => Self::Text(idx.iter().map(|&i| v[i].clone()).collect()),
            Self::Number(v) => Self::Number(idx.iter().map(|&i| v[i]).collect()),
            Self::Date(v) => Self::Date(idx.iter().map(|&i| v[i]).collect()),
        }
    }

    /// Append `other`, which must be of the same type.
    pub fn append(&mut self, other: Self) -> Result<()> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.extend(b),
            (Self::Number(a), Self::Number(b)) => a.extend(b),
            (Self::Date(a), Self::Date(b)) => a.extend(b),
            (a, b) => {
                return Err(Error::Combine(format!(
                    "cannot append a {} column to a {} column",
                    b.column_type(),
                    a.column_type()
                )))
            }
        }
        Ok(())
    }

    /// Numeric view of the column. Unparsable text becomes missing; dates have
    /// no numeric reading and become missing too.
    pub fn to_number(&self) -> Self {
        match self {
            Self::Number(_) => self.clone(),
            Self::Text(v) => Self::Number(
                v.iter()
                    .map(|x| x.as_deref().and_then(parse_number))
                    .collect(),
            ),
            Self::Date(v) => Self::Number(vec![None; v.len()]),
        }
    }

    pub fn to_text(&self) -> Self {
        match self {
            Self::Text(_) => self.clone(),
            Self::Number(v) => Self::Text(v.iter().map(|x| x.map(|n| n.to_string())).collect()),
            Self::Date(v) => Self::Text(
                v.iter()
                    .map(|x| x.map(|d| d.format(ISO_DATE).to_string()))
                    .collect(),
            ),
        }
    }

    /// An all-missing column of `ty` when converting between incompatible types
    /// would otherwise lose nothing.
    pub fn cast(&self, ty: ColumnType) -> Self {
        if self.column_type() == ty {
            return self.clone();
        }
        if self.all_missing() {
            return Self::missing(ty, self.len());
        }
        match ty {
            ColumnType::Text => self.to_text(),
            ColumnType::Number => self.to_number(),
            ColumnType::Date => match self {
                Self::Text(v) => Self::Date(
                    v.iter()
                        .map(|x| {
                            x.as_deref()
                                .and_then(|s| NaiveDate::parse_from_str(s.trim(), ISO_DATE).ok())
                        })
                        .collect(),
                ),
                _ => Self::missing(ColumnType::Date, self.len()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// A text column; NA tokens become missing.
    pub fn strs(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            name,
            ColumnData::Text(
                values
                    .iter()
                    .map(|s| (!NA_TOKENS.contains(s)).then(|| s.to_string()))
                    .collect(),
            ),
        )
    }

    pub fn numbers(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(
            name,
            ColumnData::Number(values.iter().copied().map(Some).collect()),
        )
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    nrows: usize,
}

impl Table {
    /// Build a table, checking names are unique and lengths agree.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let nrows = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(Error::DuplicateColumn(c.name.clone()));
            }
            if c.len() != nrows {
                return Err(Error::LengthMismatch {
                    name: c.name.clone(),
                    expected: nrows,
                    found: c.len(),
                });
            }
        }
        Ok(Self { columns, nrows })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Table::column`], but absence is an error.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// The cell at (`row`, `name`), if both exist.
    pub fn get(&self, row: usize, name: &str) -> Option<Value> {
        (row < self.nrows).then(|| self.column(name).map(|c| c.data.get(row)))?
    }

    /// Add `column`, replacing any existing column of the same name in place.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        if !self.columns.is_empty() && column.len() != self.nrows {
            let found = column.len();
            return Err(Error::LengthMismatch {
                name: column.name,
                expected: self.nrows,
                found,
            });
        }
        if self.columns.is_empty() {
            self.nrows = column.len();
        }
        match self.position(&column.name) {
            Some(i) => self.columns[i] = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    pub fn without_column(mut self, name: &str) -> Self {
        self.columns.retain(|c| c.name != name);
        self
    }

    /// Replace the data of column `name` with `f` applied to it.
    pub fn map_column<F>(mut self, name: &str, f: F) -> Result<Self>
    where
        F: FnOnce(&ColumnData) -> ColumnData,
    {
        let i = self
            .position(name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
        let data = f(&self.columns[i].data);
        if data.len() != self.nrows {
            return Err(Error::LengthMismatch {
                name: name.to_string(),
                expected: self.nrows,
                found: data.len(),
            });
        }
        self.columns[i].data = data;
        Ok(self)
    }

    /// Just the named columns, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let mut out = Vec::with_capacity(names.len());
        for n in names {
            out.push(self.require(n)?.clone());
        }
        Self::new(out)
    }

    pub fn take_rows(&self, idx: &[usize]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(idx)))
                .collect(),
            nrows: idx.len(),
        }
    }

    /// Keep the rows where `keep` is true.
    pub fn filter(&self, keep: &[bool]) -> Self {
        let idx: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, k)| k.then(|| i))
            .collect();
        self.take_rows(&idx)
    }

    /// Read a CSV stream with a header row.
    pub fn from_csv<R: Read>(rdr: R) -> Result<Self> {
        Self::from_csv_skipping(rdr, 0)
    }

    /// Read a CSV stream, discarding `skip` lines before the header row.
    /// Several AEC downloads carry a title line above the real header.
    ///
    /// A column is numeric when every present cell parses as a number;
    /// otherwise it is text. Nothing is read as a date here.
    pub fn from_csv_skipping<R: Read>(rdr: R, skip: usize) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr);
        let mut records = rdr.records().skip(skip);

        let header: Vec<String> = match records.next() {
            Some(h) => h?.iter().map(|s| s.trim().to_string()).collect(),
            None => return Ok(Self::default()),
        };

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
        for record in records {
            let row = record?;
            for (i, col) in cells.iter_mut().enumerate() {
                let cell = row.get(i).map(str::trim).unwrap_or_default();
                col.push((!NA_TOKENS.contains(&cell)).then(|| cell.to_string()));
            }
        }

        let columns = header
            .into_iter()
            .zip(cells)
            .map(|(name, col)| {
                let numeric = col
                    .iter()
                    .flatten()
                    .all(|s| parse_number(s).is_some())
                    && col.iter().any(Option::is_some);
                let data = if numeric {
                    ColumnData::Text(col).to_number()
                } else {
                    ColumnData::Text(col)
                };
                Column::new(name, data)
            })
            .collect();
        Self::new(columns)
    }

    pub fn write_csv<W: Write>(&self, wtr: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(wtr);
        wtr.write_record(self.column_names())?;
        for r in 0..self.nrows {
            wtr.write_record(self.columns.iter().map(|c| c.data.get(r).to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// `{"field_names": [...], "data": [[...], ...]}` with missing cells as null.
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<Vec<serde_json::Value>> = (0..self.nrows)
            .map(|r| {
                self.columns
                    .iter()
                    .map(|c| match c.data.get(r) {
                        Value::Missing => serde_json::Value::Null,
                        Value::Number(n) => json!(n),
                        v => json!(v.to_string()),
                    })
                    .collect()
            })
            .collect();
        json!({
            "field_names": self.column_names(),
            "data": rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_types_are_inferred() {
        let data = "Division,Votes,Note\nGriffith,\"1,204\",a\nBrisbane,NA,\n";
        let t = Table::from_csv(data.as_bytes()).unwrap();
        assert_eq!(2, t.nrows());
        assert_eq!(ColumnType::Text, t.require("Division").unwrap().column_type());
        assert_eq!(ColumnType::Number, t.require("Votes").unwrap().column_type());
        assert_eq!(Some(Value::Number(1204.0)), t.get(0, "Votes"));
        assert_eq!(Some(Value::Missing), t.get(1, "Votes"));
        assert_eq!(Some(Value::Missing), t.get(1, "Note"));
    }

    #[test]
    fn csv_preamble_is_skipped() {
        let data = "Polling places for the 2019 federal election\nState,DivisionNm\nQLD,Griffith\n";
        let t = Table::from_csv_skipping(data.as_bytes(), 1).unwrap();
        assert_eq!(vec!["State", "DivisionNm"], t.column_names());
        assert_eq!(1, t.nrows());
    }

    #[test]
    fn placeholder_dash_keeps_column_textual() {
        let t = Table::from_csv("Year\n2010\n-\n".as_bytes()).unwrap();
        assert_eq!(ColumnType::Text, t.require("Year").unwrap().column_type());
    }

    #[test]
    fn duplicate_and_ragged_columns_are_rejected() {
        let a = Column::strs("x", &["1"]);
        assert!(matches!(
            Table::new(vec![a.clone(), a.clone()]),
            Err(Error::DuplicateColumn(_))
        ));
        let b = Column::strs("y", &["1", "2"]);
        assert!(matches!(
            Table::new(vec![a, b]),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn with_column_checks_length() {
        let t = Table::new(vec![Column::strs("x", &["1", "2"])]).unwrap();
        match t.clone().with_column(Column::numbers("n", &[1.0])) {
            Err(Error::LengthMismatch {
                name,
                expected,
                found,
            }) => {
                assert_eq!("n", name);
                assert_eq!(2, expected);
                assert_eq!(1, found);
            }
            other => panic!("expected a length mismatch, got {:?}", other),
        }
        let t = t.with_column(Column::numbers("x", &[3.0, 4.0])).unwrap();
        assert_eq!(vec!["x"], t.column_names());
        assert_eq!(Some(Value::Number(4.0)), t.get(1, "x"));
    }

    #[test]
    fn csv_written_back_out() {
        let t = Table::new(vec![
            Column::strs("Division", &["Griffith", ""]),
            Column::numbers("Votes", &[100.0, 2.5]),
        ])
        .unwrap();
        let mut out = Vec::new();
        t.write_csv(&mut out).unwrap();
        assert_eq!(
            "Division,Votes\nGriffith,100\n,2.5\n",
            String::from_utf8(out).unwrap()
        );
    }

    #[test]
    fn casting_all_missing_is_lossless() {
        let c = ColumnData::missing(ColumnType::Text, 3);
        assert_eq!(ColumnData::missing(ColumnType::Number, 3), c.cast(ColumnType::Number));
    }
}
