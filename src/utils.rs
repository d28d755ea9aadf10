//! Assorted utility structs and functions: the column renamer, the long-format
//! pivoter, date parsing, state and division normalisation, and file helpers.

use chrono::NaiveDate;
use itertools::Itertools;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::table::{Column, ColumnData, ColumnType, Table};

/// Stands in for a missing state. The AEC leaves the state blank on
/// multi-state and national rows, which is not the same as "not parsed yet".
pub const NO_STATE: &str = "ZZZ";

// Date layouts the AEC has used for column labels over the years.
pub const YYYYMMDD: &str = "%Y%m%d";
pub const DD_MON_YY_DASHED: &str = "%d-%b-%y";
pub const DD_MON_YY: &str = "%d %b %y";
pub const DD_MM_YY: &str = "%d/%m/%y";
pub const DD_MM_YYYY: &str = "%d/%m/%Y";
pub const YYYY_MM_DD: &str = "%Y-%m-%d";

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone, PartialOrd, Ord)]
#[allow(clippy::upper_case_acronyms)] // It's usual for these to be capitalised and there aren't contiguity issues
pub enum StateAb {
    ACT,
    NSW,
    NT,
    QLD,
    SA,
    TAS,
    VIC,
    WA,
}

impl StateAb {
    pub const ALL: [Self; 8] = [
        Self::ACT,
        Self::NSW,
        Self::NT,
        Self::QLD,
        Self::SA,
        Self::TAS,
        Self::VIC,
        Self::WA,
    ];

    pub fn full_name(self) -> &'static str {
        match self {
            Self::ACT => "Australian Capital Territory",
            Self::NSW => "New South Wales",
            Self::NT => "Northern Territory",
            Self::QLD => "Queensland",
            Self::SA => "South Australia",
            Self::TAS => "Tasmania",
            Self::VIC => "Victoria",
            Self::WA => "Western Australia",
        }
    }

    /// ABS state codes, as used in ASGS files. 9 (Other Territories) has no
    /// AEC equivalent.
    pub fn from_abs_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::NSW),
            2 => Some(Self::VIC),
            3 => Some(Self::QLD),
            4 => Some(Self::SA),
            5 => Some(Self::WA),
            6 => Some(Self::TAS),
            7 => Some(Self::NT),
            8 => Some(Self::ACT),
            _ => None,
        }
    }
}

impl FromStr for StateAb {
    type Err = &'static str;
    fn from_str(item: &str) -> std::result::Result<Self, Self::Err> {
        let item = item.split_whitespace().join(" ").to_uppercase();
        if let Ok(code) = item.parse::<u8>() {
            return Self::from_abs_code(code).ok_or("Jurisdiction does not exist");
        }
        Self::ALL
            .into_iter()
            .find(|s| item == s.to_string() || item == s.full_name().to_uppercase())
            .ok_or("Jurisdiction does not exist")
    }
}

impl fmt::Display for StateAb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToAbbreviation,
    ToFullName,
}

/// Map a state token to its abbreviation or full name. Tokens that aren't a
/// state are handed back untouched.
pub fn normalise_state(token: &str, direction: Direction) -> String {
    match StateAb::from_str(token) {
        Ok(s) => match direction {
            Direction::ToAbbreviation => s.to_string(),
            Direction::ToFullName => s.full_name().to_string(),
        },
        Err(_) => token.to_string(),
    }
}

/// [`normalise_state`] over a whole column. Coded (numeric) columns come out as text.
pub fn normalise_states(data: &ColumnData, direction: Direction) -> ColumnData {
    match data.to_text() {
        ColumnData::Text(v) => ColumnData::Text(
            v.into_iter()
                .map(|x| x.map(|s| normalise_state(&s, direction)))
                .collect(),
        ),
        other => other,
    }
}

/// Replace missing states with [`NO_STATE`].
pub fn fill_missing_state(data: &ColumnData) -> ColumnData {
    match data.cast(ColumnType::Text) {
        ColumnData::Text(v) => ColumnData::Text(
            v.into_iter()
                .map(|x| x.or_else(|| Some(NO_STATE.to_string())))
                .collect(),
        ),
        other => other,
    }
}

/// Tidy a division name: collapse whitespace, drop trailing footnote marks.
pub fn normalise_division(name: &str) -> String {
    name.split_whitespace()
        .join(" ")
        .trim_end_matches(|c: char| c == '*' || c == '#')
        .trim_end()
        .to_string()
}

/// Rename columns according to `mapping`, given as `(new, old)` pairs.
///
/// Every absent `old` name is reported at once.
pub fn rename_columns(table: &Table, mapping: &[(&str, &str)]) -> Result<Table> {
    let missing: Vec<String> = mapping
        .iter()
        .map(|(_, old)| *old)
        .filter(|old| !table.has_column(old))
        .unique()
        .map(String::from)
        .collect();
    if !missing.is_empty() {
        return Err(Error::Schema { missing });
    }

    let columns = table
        .columns()
        .iter()
        .map(|c| {
            let name = mapping
                .iter()
                .find(|(_, old)| *old == c.name)
                .map_or(c.name.as_str(), |(new, _)| *new);
            Column::new(name, c.data.clone())
        })
        .collect();
    Table::new(columns)
}

/// Turn one-column-per-label data into rows of (`id_cols`, `long_cols`,
/// `names_to`, `values_to`).
///
/// Every column outside `id_cols` and `long_cols` is pivoted. Missing cells
/// produce no row. Rows come out in input row order, then pivot column order.
/// `long_cols` not present in the table are ignored.
pub fn pivot_longer(
    table: &Table,
    id_cols: &[&str],
    long_cols: &[&str],
    names_to: &str,
    values_to: &str,
) -> Result<Table> {
    let missing: Vec<String> = id_cols
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::Schema { missing });
    }

    let kept: Vec<&str> = id_cols
        .iter()
        .copied()
        .chain(
            long_cols
                .iter()
                .copied()
                .filter(|c| table.has_column(c) && !id_cols.contains(c)),
        )
        .collect();
    let sources: Vec<&Column> = table
        .columns()
        .iter()
        .filter(|c| !kept.contains(&c.name.as_str()))
        .collect();

    let value_type = match sources.iter().map(|c| c.column_type()).dedup().exactly_one() {
        Ok(ty) => ty,
        Err(mut many) => {
            if many.next().is_some() {
                ColumnType::Text
            } else {
                ColumnType::Number
            }
        }
    };
    let sources: Vec<(&str, ColumnData)> = sources
        .iter()
        .map(|c| (c.name.as_str(), c.data.cast(value_type)))
        .collect();

    let mut picks: Vec<(usize, usize)> = Vec::new();
    for r in 0..table.nrows() {
        for (s, (_, data)) in sources.iter().enumerate() {
            if !data.is_missing(r) {
                picks.push((r, s));
            }
        }
    }

    let rows: Vec<usize> = picks.iter().map(|&(r, _)| r).collect();
    let mut columns: Vec<Column> = Vec::with_capacity(kept.len() + 2);
    for name in &kept {
        let c = table.require(name)?;
        columns.push(Column::new(*name, c.data.take(&rows)));
    }
    columns.push(Column::new(
        names_to,
        ColumnData::Text(
            picks
                .iter()
                .map(|&(_, s)| Some(sources[s].0.to_string()))
                .collect(),
        ),
    ));
    let values = match value_type {
        ColumnType::Text => ColumnData::Text(
            picks
                .iter()
                .map(|&(r, s)| sources[s].1.as_text().and_then(|v| v[r].clone()))
                .collect(),
        ),
        ColumnType::Number => ColumnData::Number(
            picks
                .iter()
                .map(|&(r, s)| sources[s].1.as_numbers().and_then(|v| v[r]))
                .collect(),
        ),
        ColumnType::Date => ColumnData::Date(
            picks
                .iter()
                .map(|&(r, s)| sources[s].1.as_dates().and_then(|v| v[r]))
                .collect(),
        ),
    };
    columns.push(Column::new(values_to, values));
    Table::new(columns)
}

/// Try each of `formats` in turn. No match is `None`, not an error: an
/// unparsable date is a data-quality signal for the caller to handle.
pub fn parse_date(text: &str, formats: &[&str]) -> Option<NaiveDate> {
    let t = text.trim();
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(t, f).ok())
}

/// Opens a file, possibly zipped, for reading.
/// If the zipfile contains more than one file, the first will be returned.
/// Performance note: has to unzip and return the entire file.
pub fn open_csvz<T: 'static + Read + Seek>(mut infile: T) -> Result<Box<dyn Read>> {
    if is_zip(&mut infile)? {
        let mut zippah = zip::ZipArchive::new(infile)?;
        let mut zippy = zippah.by_index(0)?;
        // sigh. We're going to need to just go ahead and read the entire thing into memory here
        let mut bigbuf: Vec<u8> = Vec::with_capacity(zippy.size() as usize);
        zippy.read_to_end(&mut bigbuf)?;
        Ok(Box::new(Cursor::new(bigbuf)))
    } else {
        Ok(Box::new(infile))
    }
}

/// opens blah.csv OR blah.zip
pub fn open_csvz_from_path(inpath: &Path) -> Result<Box<dyn Read>> {
    if inpath.is_file() {
        return open_csvz(File::open(inpath)?);
    }
    for ext in ["zip", "csv"] {
        let alt = inpath.with_extension(ext);
        if alt.is_file() {
            return open_csvz(File::open(alt)?);
        }
    }
    Err(Error::Fetch {
        what: inpath.display().to_string(),
        reason: "no such file, whether compressed or not".into(),
    })
}

/// Peeks at the contents to check the magic number
/// slightly adapted from zip-extensions
/// to operate on a `Read+Seek` rather than a full `File`
pub fn is_zip<T>(infile: &mut T) -> Result<bool>
where
    T: Read + Seek,
{
    const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
    let pos = infile.seek(SeekFrom::Current(0))?;
    let mut buffer: [u8; 4] = [0; 4];
    let bytes_read = infile.read(&mut buffer)?;
    infile.seek(SeekFrom::Start(pos))?; // revert
    Ok(bytes_read == ZIP_SIGNATURE.len() && buffer == ZIP_SIGNATURE)
}

/// Fetch a URL in a blocking fashion despite async interface of `ehttp`.
/// Uses a `sync::mpsc::channel` under the hood.
pub fn fetch_blocking(url: &str) -> Result<ehttp::Response> {
    let (sender, receiver) = std::sync::mpsc::channel();
    let req = ehttp::Request::get(url);
    ehttp::fetch(req, move |r| {
        // the receiver only goes away if we've already given up
        let _ = sender.send(r);
    });
    let fail = |reason: String| Error::Fetch {
        what: url.to_string(),
        reason,
    };
    let response = receiver
        .recv()
        .map_err(|e| fail(e.to_string()))?
        .map_err(fail)?;
    if !response.ok {
        return Err(Error::Fetch {
            what: url.to_string(),
            reason: format!("HTTP {} {}", response.status, response.status_text),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    #[test]
    fn test_state_ab_conversions() {
        assert_eq!("ACT", StateAb::ACT.to_string());
        assert_eq!(Ok(StateAb::NSW), StateAb::from_str("nsw"));
        assert_eq!(Ok(StateAb::WA), StateAb::from_str(" western  australia"));
        assert_eq!(Ok(StateAb::QLD), StateAb::from_str("3"));
        assert!(StateAb::from_str("this is not a state").is_err());
    }

    #[test]
    fn unknown_states_pass_through() {
        assert_eq!("VIC", normalise_state("Victoria", Direction::ToAbbreviation));
        assert_eq!("Tasmania", normalise_state("tas", Direction::ToFullName));
        assert_eq!("Overseas", normalise_state("Overseas", Direction::ToAbbreviation));
    }

    #[test]
    fn missing_states_become_sentinel() {
        let c = ColumnData::Text(vec![Some("QLD".into()), None]);
        assert_eq!(
            ColumnData::Text(vec![Some("QLD".into()), Some(NO_STATE.into())]),
            fill_missing_state(&c)
        );
        let empty = ColumnData::missing(ColumnType::Number, 1);
        assert_eq!(
            ColumnData::Text(vec![Some(NO_STATE.into())]),
            fill_missing_state(&empty)
        );
    }

    #[test]
    fn division_names_tidied() {
        assert_eq!("Eden-Monaro", normalise_division("  Eden-Monaro* "));
        assert_eq!("La Trobe", normalise_division("La   Trobe#"));
    }

    #[test]
    fn rename_reports_all_missing() {
        let t = Table::new(vec![Column::strs("State", &["QLD"])]).unwrap();
        match rename_columns(&t, &[("StateAb", "State"), ("DivisionNm", "Division"), ("X", "Y")]) {
            Err(Error::Schema { missing }) => assert_eq!(vec!["Division", "Y"], missing),
            other => panic!("expected a schema error, got {:?}", other),
        }
        let renamed = rename_columns(&t, &[("StateAb", "State")]).unwrap();
        assert_eq!(vec!["StateAb"], renamed.column_names());
        assert_eq!(vec!["State"], t.column_names());
    }

    #[test]
    fn pivot_drops_missing_and_keeps_order() {
        let t = Table::new(vec![
            Column::strs("Division", &["Griffith", "Brisbane"]),
            Column::strs("Total", &["9", "8"]),
            Column::new("d1", ColumnData::Number(vec![Some(1.0), None])),
            Column::new("d2", ColumnData::Number(vec![Some(2.0), Some(3.0)])),
        ])
        .unwrap();
        let long = pivot_longer(&t, &["Division"], &["Total", "Absent"], "label", "n").unwrap();
        assert_eq!(vec!["Division", "Total", "label", "n"], long.column_names());
        assert_eq!(3, long.nrows());
        assert!(long.nrows() <= t.nrows() * 2);
        assert_eq!(Some(Value::from("d1")), long.get(0, "label"));
        assert_eq!(Some(Value::from("d2")), long.get(1, "label"));
        assert_eq!(Some(Value::from("Brisbane")), long.get(2, "Division"));
        assert_eq!(Some(Value::Number(3.0)), long.get(2, "n"));
        assert_eq!(Some(Value::from("8")), long.get(2, "Total"));
    }

    #[test]
    fn pivot_needs_its_id_columns() {
        let t = Table::new(vec![Column::strs("a", &["1"])]).unwrap();
        assert!(matches!(
            pivot_longer(&t, &["Division"], &[], "k", "v"),
            Err(Error::Schema { .. })
        ));
    }

    #[test]
    fn dates_in_every_layout() {
        let d = |y, m, dd| NaiveDate::from_ymd_opt(y, m, dd);
        assert_eq!(d(2016, 6, 14), parse_date("20160614", &[YYYYMMDD]));
        assert_eq!(d(2010, 8, 2), parse_date("02 Aug 10", &[DD_MON_YY]));
        assert_eq!(d(2013, 8, 20), parse_date("20-Aug-13", &[DD_MON_YY_DASHED]));
        assert_eq!(d(2022, 5, 9), parse_date("09/05/22", &[DD_MM_YY, DD_MM_YYYY]));
        assert_eq!(d(2022, 5, 9), parse_date("09/05/2022", &[DD_MM_YY, DD_MM_YYYY]));
        assert_eq!(None, parse_date("Total", &[YYYYMMDD, DD_MON_YY]));
    }

    #[test]
    fn zip_magic_number() {
        let mut not_zip = Cursor::new(b"State,Division\n".to_vec());
        assert!(!is_zip(&mut not_zip).unwrap());
        assert_eq!(0, not_zip.position());
    }
}
