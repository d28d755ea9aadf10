//! Year-keyed harmonisation.
//!
//! The AEC changed its own export layouts from one election to the next, so
//! every dataset family carries a table of [`Recipe`]s: an event pattern plus
//! the parameters for that layout. The algorithm in [`apply`] is shared by all
//! of them. Events no recipe matches are handed back unchanged.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::debug;

use crate::diag::Diagnostics;
use crate::error::{Error, Result};
use crate::table::{Column, ColumnData, ColumnType, Table};
use crate::utils::{
    fill_missing_state, normalise_division, normalise_states, parse_date, pivot_longer,
    rename_columns, Direction,
};
use crate::{candidates, coords, divisions, overseas, postal, prepoll, representation};

/// The columns every raw table carries, whatever the year.
pub const EVENT_COLUMNS: [&str; 2] = ["date", "event"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, clap::ArgEnum)]
pub enum Family {
    Coordinates,
    PvaByDate,
    PvaByParty,
    PrePoll,
    Overseas,
    Candidates,
    PartyRepresentation,
    DivisionCodes,
}

impl Family {
    pub const ALL: [Self; 8] = [
        Self::Coordinates,
        Self::PvaByDate,
        Self::PvaByParty,
        Self::PrePoll,
        Self::Overseas,
        Self::Candidates,
        Self::PartyRepresentation,
        Self::DivisionCodes,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Coordinates => "coordinates",
            Self::PvaByDate => "pva-by-date",
            Self::PvaByParty => "pva-by-party",
            Self::PrePoll => "pre-poll",
            Self::Overseas => "overseas",
            Self::Candidates => "candidates",
            Self::PartyRepresentation => "party-representation",
            Self::DivisionCodes => "division-codes",
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            Self::Coordinates => &coords::SCHEMA,
            Self::PvaByDate => &postal::BY_DATE,
            Self::PvaByParty => &postal::BY_PARTY,
            Self::PrePoll => &prepoll::SCHEMA,
            Self::Overseas => &overseas::SCHEMA,
            Self::Candidates => &candidates::SCHEMA,
            Self::PartyRepresentation => &representation::SCHEMA,
            Self::DivisionCodes => &divisions::SCHEMA,
        }
    }

    pub fn canonical_columns(self) -> &'static [&'static str] {
        self.schema().canonical
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// How to read the labels of pivoted columns.
#[derive(Debug, Clone, Copy)]
pub enum Labels {
    /// Keep them as they are (party abbreviations and the like).
    Plain,
    /// They are dates in one of these layouts.
    Dates(&'static [&'static str]),
    /// They are state names or abbreviations.
    States,
}

#[derive(Debug, Clone, Copy)]
pub struct Pivot {
    pub id_cols: &'static [&'static str],
    pub long_cols: &'static [&'static str],
    pub names_to: &'static str,
    pub values_to: &'static str,
    pub labels: Labels,
}

/// Several source columns adding up to one canonical column.
#[derive(Debug, Clone, Copy)]
pub struct Sum {
    pub into: &'static str,
    pub from: &'static [&'static str],
    pub keep_sources: bool,
}

/// The parameters for one source layout.
#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    /// Regex over the event name.
    pub events: &'static str,
    /// `(new, old)` pairs.
    pub rename: &'static [(&'static str, &'static str)],
    /// `(column, regex)`: rows whose value matches are footnotes or totals.
    pub exclude: &'static [(&'static str, &'static str)],
    pub sums: &'static [Sum],
    pub numeric: &'static [&'static str],
    pub pivot: Option<Pivot>,
}

impl Recipe {
    pub const BASE: Self = Self {
        events: "",
        rename: &[],
        exclude: &[],
        sums: &[],
        numeric: &[],
        pivot: None,
    };
}

/// Everything about one dataset family.
pub struct Schema {
    pub family: Family,
    pub canonical: &'static [&'static str],
    pub state_col: Option<&'static str>,
    /// Replace missing states with [`crate::utils::NO_STATE`].
    pub fill_state: bool,
    pub division_col: Option<&'static str>,
    pub recipes: &'static [Recipe],
    /// Family-specific clean-up, run just before the canonical selection.
    pub finish: Option<fn(Table) -> Result<Table>>,
}

impl Schema {
    /// The recipe for `event`, if any.
    pub fn recipe_for(&self, event: &str) -> Result<Option<&'static Recipe>> {
        for r in self.recipes {
            if event_pattern(r.events)?.is_match(event) {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }
}

/// A recipe's event pattern, compiled on first use and kept for the process.
fn event_pattern(pattern: &'static str) -> Result<Regex> {
    static COMPILED: OnceLock<Mutex<HashMap<&'static str, Regex>>> = OnceLock::new();
    let mut compiled = COMPILED
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = compiled.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    compiled.insert(pattern, re.clone());
    Ok(re)
}

/// Harmonise `table` for `event` into `family`'s canonical shape.
pub fn harmonise(
    family: Family,
    table: Table,
    event: &str,
    diag: &mut Diagnostics,
) -> Result<Table> {
    apply(family.schema(), table, event, diag)
}

/// Whether any recipe of `family` covers `event`.
pub fn recognises(family: Family, event: &str) -> Result<bool> {
    Ok(family.schema().recipe_for(event)?.is_some())
}

/// The shared algorithm behind every family.
pub fn apply(schema: &Schema, table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    let recipe = match schema.recipe_for(event)? {
        Some(r) => r,
        None => {
            diag.info(format!(
                "{}: no harmonisation rules for event `{}`; returning the table unchanged",
                schema.family, event
            ));
            return Ok(table);
        }
    };
    debug!("{}: harmonising `{}` with pattern {}", schema.family, event, recipe.events);

    let mut mapping: Vec<(&str, &str)> = EVENT_COLUMNS.iter().map(|c| (*c, *c)).collect();
    mapping.extend_from_slice(recipe.rename);
    let mut t = rename_columns(&table, &mapping)?;

    for (col, pattern) in recipe.exclude {
        t = exclude_rows(t, col, pattern)?;
    }
    for sum in recipe.sums {
        t = sum_columns(t, sum)?;
    }
    for col in recipe.numeric {
        if t.has_column(col) {
            t = t.map_column(col, ColumnData::to_number)?;
        }
    }

    if let Some(pivot) = &recipe.pivot {
        t = pivot_table(t, pivot, event, diag)?;
    }

    if let Some(state) = schema.state_col {
        t = ensure_column(t, state)?;
        t = t.map_column(state, |c| normalise_states(c, Direction::ToAbbreviation))?;
        if schema.fill_state {
            t = t.map_column(state, fill_missing_state)?;
        }
    }
    if let Some(division) = schema.division_col {
        if t.has_column(division) {
            t = t.map_column(division, |c| match c.to_text() {
                ColumnData::Text(v) => ColumnData::Text(
                    v.into_iter()
                        .map(|x| x.map(|s| normalise_division(&s)))
                        .collect(),
                ),
                other => other,
            })?;
        }
    }

    if let Some(finish) = schema.finish {
        t = finish(t)?;
    }

    for col in schema.canonical {
        if !t.has_column(col) {
            diag.info(format!(
                "{}: `{}` is not published for event `{}`; filled with missing values",
                schema.family, col, event
            ));
            t = ensure_column(t, col)?;
        }
    }
    t.select(schema.canonical)
}

/// Add `name` as an all-missing text column if it isn't there yet.
fn ensure_column(t: Table, name: &str) -> Result<Table> {
    if t.has_column(name) {
        return Ok(t);
    }
    let n = t.nrows();
    t.with_column(Column::new(name, ColumnData::missing(ColumnType::Text, n)))
}

/// Drop rows whose `col` matches `pattern`. Missing cells are kept.
fn exclude_rows(t: Table, col: &str, pattern: &str) -> Result<Table> {
    let re = Regex::new(pattern)?;
    let keep: Vec<bool> = match t.column(col) {
        Some(c) => match c.data.to_text() {
            ColumnData::Text(v) => v
                .iter()
                .map(|x| x.as_deref().map_or(true, |s| !re.is_match(s)))
                .collect(),
            _ => return Ok(t),
        },
        None => return Ok(t),
    };
    Ok(t.filter(&keep))
}

/// Add `sum.into` as the row-wise total of `sum.from`. A row where every part
/// is missing has a missing total.
fn sum_columns(t: Table, sum: &Sum) -> Result<Table> {
    let missing: Vec<String> = sum
        .from
        .iter()
        .filter(|c| !t.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::Schema { missing });
    }

    let parts: Vec<ColumnData> = sum
        .from
        .iter()
        .map(|c| t.require(c).map(|c| c.data.to_number()))
        .collect::<Result<_>>()?;
    let totals: Vec<Option<f64>> = (0..t.nrows())
        .map(|r| {
            parts
                .iter()
                .filter_map(|p| p.as_numbers().and_then(|v| v[r]))
                .fold(None, |acc, x| Some(acc.unwrap_or(0.0) + x))
        })
        .collect();

    let total = Column::new(sum.into, ColumnData::Number(totals));
    if sum.keep_sources || t.has_column(sum.into) {
        return t.with_column(total);
    }
    // the total takes the place of its first part
    let mut total = Some(total);
    let mut columns = Vec::with_capacity(t.ncols());
    for c in t.into_columns() {
        if sum.from.contains(&c.name.as_str()) {
            if let Some(tc) = total.take() {
                columns.push(tc);
            }
        } else {
            columns.push(c);
        }
    }
    Table::new(columns)
}

fn pivot_table(t: Table, pivot: &Pivot, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    let mut t = t;
    for col in pivot.id_cols {
        t = ensure_column(t, col)?;
    }
    // everything that gets pivoted is a count
    let sources: Vec<String> = t
        .column_names()
        .into_iter()
        .filter(|c| !pivot.id_cols.contains(c) && !pivot.long_cols.contains(c))
        .map(String::from)
        .collect();
    for s in &sources {
        t = t.map_column(s, ColumnData::to_number)?;
    }

    let long = pivot_longer(
        &t,
        pivot.id_cols,
        pivot.long_cols,
        pivot.names_to,
        pivot.values_to,
    )?;

    match pivot.labels {
        Labels::Plain => Ok(long),
        Labels::States => {
            long.map_column(pivot.names_to, |c| normalise_states(c, Direction::ToAbbreviation))
        }
        Labels::Dates(formats) => {
            let unparsed: Vec<String> = sources
                .iter()
                .filter(|s| parse_date(s, formats).is_none())
                .cloned()
                .collect();
            if !unparsed.is_empty() {
                diag.warn(format!(
                    "could not read column label(s) {} as dates for event `{}`",
                    unparsed.iter().map(|s| format!("`{}`", s)).collect::<Vec<_>>().join(", "),
                    event
                ));
            }
            long.map_column(pivot.names_to, |c| match c {
                ColumnData::Text(v) => ColumnData::Date(
                    v.iter()
                        .map(|x| x.as_deref().and_then(|s| parse_date(s, formats)))
                        .collect(),
                ),
                other => other.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    const TOY: Schema = Schema {
        family: Family::PvaByParty,
        canonical: &["date", "event", "StateAb", "DivisionNm", "PartyAb", "TotalPVAs"],
        state_col: Some("StateAb"),
        fill_state: true,
        division_col: Some("DivisionNm"),
        recipes: &[Recipe {
            events: r"^2019 Federal Election$",
            rename: &[("StateAb", "State"), ("DivisionNm", "Division")],
            exclude: &[("DivisionNm", r"(?i)^total")],
            sums: &[Sum {
                into: "AEC",
                from: &["AEC (Online)", "AEC (Paper)"],
                keep_sources: false,
            }],
            numeric: &[],
            pivot: Some(Pivot {
                id_cols: &["date", "event", "StateAb", "DivisionNm"],
                long_cols: &["Total"],
                names_to: "PartyAb",
                values_to: "TotalPVAs",
                labels: Labels::Plain,
            }),
        }],
        finish: None,
    };

    fn raw() -> Table {
        Table::new(vec![
            Column::strs("date", &["2019-05-18", "2019-05-18"]),
            Column::strs("event", &["2019 Federal Election", "2019 Federal Election"]),
            Column::strs("State", &["Queensland", "QLD"]),
            Column::strs("Division", &["Griffith*", "Total"]),
            Column::numbers("AEC (Online)", &[10.0, 99.0]),
            Column::new("AEC (Paper)", ColumnData::Number(vec![None, Some(1.0)])),
            Column::strs("ALP", &["5", "-"]),
            Column::numbers("Total", &[15.0, 100.0]),
        ])
        .unwrap()
    }

    #[test]
    fn recognised_event_gets_canonical_shape() {
        let mut diag = Diagnostics::new();
        let t = apply(&TOY, raw(), "2019 Federal Election", &mut diag).unwrap();
        assert_eq!(TOY.canonical.to_vec(), t.column_names());
        assert_eq!(2, t.nrows());
        assert_eq!(Some(Value::from("QLD")), t.get(0, "StateAb"));
        assert_eq!(Some(Value::from("Griffith")), t.get(0, "DivisionNm"));
        assert_eq!(Some(Value::from("AEC")), t.get(0, "PartyAb"));
        assert_eq!(Some(Value::Number(10.0)), t.get(0, "TotalPVAs"));
        assert_eq!(Some(Value::Number(5.0)), t.get(1, "TotalPVAs"));
        assert!(diag.is_empty());
    }

    #[test]
    fn unrecognised_event_is_untouched() {
        let mut diag = Diagnostics::new();
        let t = apply(&TOY, raw(), "2031 Federal Election", &mut diag).unwrap();
        assert_eq!(raw(), t);
        assert!(diag.contains("no harmonisation rules for event `2031 Federal Election`"));
    }

    #[test]
    fn malformed_recognised_input_is_a_schema_error() {
        let t = raw().without_column("Division").without_column("event");
        match apply(&TOY, t, "2019 Federal Election", &mut Diagnostics::new()) {
            Err(Error::Schema { missing }) => assert_eq!(vec!["event", "Division"], missing),
            other => panic!("expected a schema error, got {:?}", other),
        }
    }

    #[test]
    fn event_patterns_are_compiled_once() {
        let a = event_pattern(r"^2019 Federal Election$").unwrap();
        let b = event_pattern(r"^2019 Federal Election$").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert!(b.is_match("2019 Federal Election"));
        assert!(matches!(event_pattern(r"^(2019"), Err(Error::Pattern(_))));
        // a second lookup of the same event gives the same recipe
        let first = TOY.recipe_for("2019 Federal Election").unwrap().map(|r| r.events);
        let second = TOY.recipe_for("2019 Federal Election").unwrap().map(|r| r.events);
        assert_eq!(Some(r"^2019 Federal Election$"), first);
        assert_eq!(first, second);
    }

    #[test]
    fn every_family_has_a_schema() {
        for f in Family::ALL {
            assert_eq!(f, f.schema().family);
            assert_eq!(&["date", "event"], &f.canonical_columns()[..2]);
            for r in f.schema().recipes {
                assert!(Regex::new(r.events).is_ok(), "{} {}", f, r.events);
            }
        }
    }
}
