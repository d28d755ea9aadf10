//! Boundary correspondences: SA1 vintages and electoral division vintages.
//!
//! A concordance says "RATIO of old unit is in new unit". Chaining them gets
//! from the SA1s an election was run on to a later census or a later set of
//! division boundaries, and [`reaggregate`] moves counts along the result.

use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::data::ReferenceIndex;
use crate::diag::Diagnostics;
use crate::error::{Error, Result};
use crate::table::{Column, ColumnData, Table};
use crate::utils::open_csvz_from_path;

pub const RATIO: &str = "ratio";
pub const DEFAULT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Level {
    Sa1,
    Division,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct Geography {
    pub level: Level,
    pub vintage: u16,
}

impl Geography {
    pub fn sa1(vintage: u16) -> Self {
        Self {
            level: Level::Sa1,
            vintage,
        }
    }

    pub fn division(vintage: u16) -> Self {
        Self {
            level: Level::Division,
            vintage,
        }
    }

    /// Short identifier, used for column and file names: `sa1_2016`, `ced_2021`.
    pub fn code(&self) -> String {
        match self.level {
            Level::Sa1 => format!("sa1_{}", self.vintage),
            Level::Division => format!("ced_{}", self.vintage),
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Level::Sa1 => write!(f, "SA1 {}", self.vintage),
            Level::Division => write!(f, "divisions {}", self.vintage),
        }
    }
}

/// The validated route from an event's geography to a comparison geography.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub event: String,
    pub compare_to: String,
    pub from: Geography,
    pub to: Geography,
    pub hops: Vec<(Geography, Geography)>,
}

fn backwards(from: Geography, to: Geography) -> Error {
    Error::InvalidBoundaryCombination {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Work out which concordances take `event` onto `compare_to`.
///
/// `compare_to` is either another event (its division boundaries) or a census
/// such as `"2021 Census"` (its SA1s). Nothing is read here: a request that
/// would need a concordance running backwards in time fails straight away.
pub fn plan(index: &ReferenceIndex, event: &str, compare_to: &str) -> Result<Plan> {
    let source = index
        .event(event)
        .ok_or_else(|| Error::UnknownEvent(event.to_string()))?;
    let unsupported = || Error::UnsupportedBoundary {
        event: event.to_string(),
        compare_to: compare_to.to_string(),
    };
    let from = Geography::sa1(source.sa1.ok_or_else(unsupported)?);

    let census = Regex::new(r"^(\d{4}) Census$")?;
    let (sa1_target, to) = if let Some(year) = census
        .captures(compare_to)
        .and_then(|c| c[1].parse::<u16>().ok())
    {
        (Geography::sa1(year), Geography::sa1(year))
    } else if let Some(target) = index.event(compare_to) {
        let to = Geography::division(target.division);
        if target.division < source.division {
            return Err(backwards(Geography::division(source.division), to));
        }
        (Geography::sa1(target.sa1.ok_or_else(unsupported)?), to)
    } else {
        return Err(unsupported());
    };
    if sa1_target.vintage < from.vintage {
        return Err(backwards(from, sa1_target));
    }

    // SA1 vintage to SA1 vintage, one census at a time
    let mut hops = Vec::new();
    let mut at = from;
    while at != sa1_target {
        let next = index
            .concordances_from(at)
            .filter(|g| g.level == Level::Sa1 && g.vintage > at.vintage && g.vintage <= sa1_target.vintage)
            .min_by_key(|g| g.vintage)
            .ok_or_else(unsupported)?;
        hops.push((at, next));
        at = next;
    }
    if to.level == Level::Division {
        if !index.has_concordance(at, to) {
            return Err(unsupported());
        }
        hops.push((at, to));
    }

    debug!(
        "plan {} -> {}: {}",
        event,
        compare_to,
        hops.iter().map(|(a, b)| format!("{} to {}", a, b)).collect::<Vec<_>>().join(", ")
    );
    Ok(Plan {
        event: event.to_string(),
        compare_to: compare_to.to_string(),
        from,
        to,
        hops,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioSettings {
    pub tolerance: f64,
    /// Drop groups outside tolerance (`true`) or keep them with a warning.
    pub process: bool,
}

impl Default for RatioSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            process: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioReport {
    pub table: Table,
    pub groups: usize,
    pub out_of_tolerance: usize,
    pub removed: usize,
}

/// The column as text keys. Numeric codes print without a decimal part.
fn keys(t: &Table, col: &str) -> Result<Vec<Option<String>>> {
    match t.require(col)?.data.to_text() {
        ColumnData::Text(v) => Ok(v),
        _ => Ok(vec![None; t.nrows()]),
    }
}

fn ratios(t: &Table, col: &str) -> Result<Vec<Option<f64>>> {
    match t.require(col)?.data.to_number() {
        ColumnData::Number(v) => Ok(v),
        _ => Ok(vec![None; t.nrows()]),
    }
}

/// Per-group ratio sums, in order of first appearance. A missing ratio adds nothing.
fn group_sums(t: &Table, group_col: &str, ratio_col: &str) -> Result<IndexMap<Option<String>, f64>> {
    let mut sums: IndexMap<Option<String>, f64> = IndexMap::new();
    for (g, r) in keys(t, group_col)?.into_iter().zip(ratios(t, ratio_col)?) {
        *sums.entry(g).or_default() += r.unwrap_or(0.0);
    }
    Ok(sums)
}

/// Check that every group's ratios sum to 1 within `settings.tolerance`.
pub fn verify_ratios(
    table: Table,
    group_col: &str,
    ratio_col: &str,
    settings: RatioSettings,
    diag: &mut Diagnostics,
) -> Result<RatioReport> {
    let sums = group_sums(&table, group_col, ratio_col)?;
    let bad: Vec<&Option<String>> = sums
        .iter()
        .filter(|(_, s)| (**s - 1.0).abs() > settings.tolerance)
        .map(|(g, _)| g)
        .collect();
    let groups = sums.len();
    let out_of_tolerance = bad.len();

    if bad.is_empty() {
        debug!("all {} `{}` groups sum to 1", groups, group_col);
        return Ok(RatioReport {
            table,
            groups,
            out_of_tolerance,
            removed: 0,
        });
    }

    let shown = bad
        .iter()
        .take(5)
        .map(|g| format!("`{}`", g.as_deref().unwrap_or("NA")))
        .collect::<Vec<_>>()
        .join(", ");

    if !settings.process {
        diag.warn(format!(
            "{} `{}` group(s) have `{}` summing to something other than 1 (first: {}); kept as requested",
            out_of_tolerance, group_col, ratio_col, shown
        ));
        return Ok(RatioReport {
            table,
            groups,
            out_of_tolerance,
            removed: 0,
        });
    }

    let keep: Vec<bool> = keys(&table, group_col)?
        .iter()
        .map(|g| !bad.contains(&g))
        .collect();
    let kept = table.filter(&keep);
    diag.info(format!(
        "Removed {} group(s) of `{}` whose `{}` did not sum to 1 within {} (first: {})",
        out_of_tolerance, group_col, ratio_col, settings.tolerance, shown
    ));

    let after = group_sums(&kept, group_col, ratio_col)?;
    if after.values().all(|s| (s - 1.0).abs() <= settings.tolerance) {
        diag.info(format!(
            "all {} remaining `{}` group(s) now sum to 1",
            after.len(),
            group_col
        ));
    }

    Ok(RatioReport {
        table: kept,
        groups,
        out_of_tolerance,
        removed: out_of_tolerance,
    })
}

/// Inner join of two hops on their shared `key` column.
///
/// Rows come out in `first`'s order, then `second`'s. Rows where either of
/// `ratio_cols` is missing, zero or negative carry nothing and are discarded.
pub fn join_hops(
    first: &Table,
    second: &Table,
    key: &str,
    ratio_cols: (&str, &str),
    diag: &mut Diagnostics,
) -> Result<Table> {
    for c in second.column_names() {
        if c != key && first.has_column(c) {
            return Err(Error::DuplicateColumn(c.to_string()));
        }
    }
    let left = keys(first, key)?;
    let right = keys(second, key)?;
    let mut lookup: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (i, k) in right.iter().enumerate() {
        if let Some(k) = k {
            lookup.entry(k.as_str()).or_default().push(i);
        }
    }

    let mut li = Vec::new();
    let mut ri = Vec::new();
    for (i, k) in left.iter().enumerate() {
        if let Some(js) = k.as_deref().and_then(|k| lookup.get(k)) {
            for &j in js {
                li.push(i);
                ri.push(j);
            }
        }
    }

    let mut columns: Vec<Column> = first
        .columns()
        .iter()
        .map(|c| Column::new(c.name.clone(), c.data.take(&li)))
        .collect();
    columns.extend(
        second
            .columns()
            .iter()
            .filter(|c| c.name != key)
            .map(|c| Column::new(c.name.clone(), c.data.take(&ri))),
    );
    let joined = Table::new(columns)?;

    let a = ratios(&joined, ratio_cols.0)?;
    let b = ratios(&joined, ratio_cols.1)?;
    let keep: Vec<bool> = a
        .iter()
        .zip(&b)
        .map(|(x, y)| matches!((x, y), (Some(x), Some(y)) if *x > 0.0 && *y > 0.0))
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        diag.info(format!(
            "discarded {} joined row(s) on `{}` with a missing or non-positive ratio",
            dropped, key
        ));
        return Ok(joined.filter(&keep));
    }
    Ok(joined)
}

/// Compose two consecutive hops: `out = ratio_a * ratio_b`, summed within
/// each (`source`, `target`) pair. Pairs come out in order of first appearance.
pub fn combine_ratios(
    table: &Table,
    source: &str,
    target: &str,
    ratio_a: &str,
    ratio_b: &str,
    out: &str,
) -> Result<Table> {
    let s = keys(table, source)?;
    let t = keys(table, target)?;
    let a = ratios(table, ratio_a)?;
    let b = ratios(table, ratio_b)?;

    let mut pairs: IndexMap<(Option<String>, Option<String>), f64> = IndexMap::new();
    for (((s, t), a), b) in s.into_iter().zip(t).zip(a).zip(b) {
        *pairs.entry((s, t)).or_default() += a.unwrap_or(0.0) * b.unwrap_or(0.0);
    }

    let mut sources = Vec::with_capacity(pairs.len());
    let mut targets = Vec::with_capacity(pairs.len());
    let mut products = Vec::with_capacity(pairs.len());
    for ((s, t), p) in pairs {
        sources.push(s);
        targets.push(t);
        products.push(Some(p));
    }
    Table::new(vec![
        Column::new(source, ColumnData::Text(sources)),
        Column::new(target, ColumnData::Text(targets)),
        Column::new(out, ColumnData::Number(products)),
    ])
}

/// Somewhere concordance tables come from.
pub trait ConcordanceSource {
    /// A table whose first three columns are the `from` code, the `to` code
    /// and the ratio of the `from` unit that lies in the `to` unit.
    fn concordance(&self, from: Geography, to: Geography) -> Result<Table>;
}

/// Concordances stored as `<from>_<to>.csv` (or zipped) in a directory,
/// e.g. `sa1_2011_sa1_2016.csv`.
#[derive(Debug, Clone)]
pub struct CsvConcordances {
    pub dir: PathBuf,
}

impl ConcordanceSource for CsvConcordances {
    fn concordance(&self, from: Geography, to: Geography) -> Result<Table> {
        let stem = format!("{}_{}", from.code(), to.code());
        for ext in ["csv", "zip"] {
            let path = self.dir.join(format!("{}.{}", stem, ext));
            if path.is_file() {
                info!("reading concordance {}", path.display());
                return Table::from_csv(open_csvz_from_path(&path)?);
            }
        }
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no concordance file {}.csv in {}", stem, self.dir.display()),
        )))
    }
}

/// Label a raw concordance's first three columns positionally.
fn standardise(raw: Table, from: Geography, to: Geography) -> Result<Table> {
    let mut columns = raw.into_columns();
    if columns.len() < 3 {
        return Err(Error::Schema {
            missing: [from.code(), to.code(), RATIO.to_string()]
                .into_iter()
                .skip(columns.len())
                .collect(),
        });
    }
    columns.truncate(3);
    let names = [from.code(), to.code(), RATIO.to_string()];
    let columns = columns
        .into_iter()
        .zip(names)
        .map(|(c, n)| Column::new(n, c.data))
        .collect();
    Table::new(columns)
}

fn rename_ratio(t: Table, to: &str) -> Result<Table> {
    Table::new(
        t.into_columns()
            .into_iter()
            .map(|c| {
                if c.name == RATIO {
                    Column::new(to, c.data)
                } else {
                    c
                }
            })
            .collect(),
    )
}

/// Target column of an identity crosswalk, whose source and target are the
/// same geography: `sa1_2011` maps onto `sa1_2011_same`.
pub fn identity_target(code: &str) -> String {
    format!("{}_same", code)
}

/// Load, verify and chain every hop of `plan` into one `from -> to` table
/// with a `ratio` column.
pub fn build_crosswalk(
    plan: &Plan,
    source: &dyn ConcordanceSource,
    settings: RatioSettings,
    diag: &mut Diagnostics,
) -> Result<Table> {
    let from_code = plan.from.code();
    if plan.hops.is_empty() {
        diag.info(format!(
            "`{}` is already on {}; the crosswalk is the identity",
            plan.event, plan.to
        ));
        return Table::new(vec![
            Column::new(from_code.as_str(), ColumnData::Text(Vec::new())),
            Column::new(identity_target(&from_code), ColumnData::Text(Vec::new())),
            Column::numbers(RATIO, &[]),
        ]);
    }

    let mut chained: Option<Table> = None;
    for &(a, b) in &plan.hops {
        let hop = standardise(source.concordance(a, b)?, a, b)?;
        let hop = verify_ratios(hop, &a.code(), RATIO, settings, diag)?.table;
        chained = Some(match chained {
            None => hop,
            Some(acc) => {
                let left = rename_ratio(acc, "ratio_a")?;
                let right = rename_ratio(hop, "ratio_b")?;
                let joined = join_hops(&left, &right, &a.code(), ("ratio_a", "ratio_b"), diag)?;
                combine_ratios(&joined, &from_code, &b.code(), "ratio_a", "ratio_b", RATIO)?
            }
        });
    }

    match chained {
        Some(t) => Ok(verify_ratios(t, &from_code, RATIO, settings, diag)?.table),
        None => Err(Error::UnsupportedBoundary {
            event: plan.event.clone(),
            compare_to: plan.compare_to.clone(),
        }),
    }
}

/// Move `value_cols` of `values` (keyed by `key`) along `crosswalk`: each
/// value times the ratio, summed per target code.
///
/// The crosswalk's first three columns are read as source code, target code
/// and ratio. Rows whose key isn't in the crosswalk are dropped. An empty
/// identity crosswalk (see [`identity_target`]) maps every key onto itself.
pub fn reaggregate(
    values: &Table,
    crosswalk: &Table,
    key: &str,
    value_cols: &[&str],
) -> Result<Table> {
    let names = crosswalk.column_names();
    if names.len() < 3 {
        return Err(Error::Schema {
            missing: vec![RATIO.to_string()],
        });
    }
    let (src, dst, ratio) = (names[0], names[1], names[2]);
    let key_values = keys(values, key)?;

    // "RATIO of source is in target"
    let mut corrs: IndexMap<String, Vec<(String, f64)>> = IndexMap::new();
    if crosswalk.is_empty() && dst == identity_target(src) {
        for k in key_values.iter().flatten() {
            corrs.entry(k.clone()).or_insert_with(|| vec![(k.clone(), 1.0)]);
        }
    }
    for ((s, d), r) in keys(crosswalk, src)?
        .into_iter()
        .zip(keys(crosswalk, dst)?)
        .zip(ratios(crosswalk, ratio)?)
    {
        if let (Some(s), Some(d), Some(r)) = (s, d, r) {
            corrs.entry(s).or_default().push((d, r));
        }
    }

    let columns: Vec<Vec<Option<f64>>> = value_cols
        .iter()
        .map(|c| ratios(values, c))
        .collect::<Result<_>>()?;

    let mut converted: IndexMap<String, Vec<f64>> = IndexMap::new();
    for (row, k) in key_values.iter().enumerate() {
        let split = match k.as_ref().and_then(|k| corrs.get(k)) {
            Some(s) => s,
            None => continue,
        };
        for (target, r) in split {
            let e = converted
                .entry(target.clone())
                .or_insert_with(|| vec![0.0; value_cols.len()]);
            for (acc, col) in e.iter_mut().zip(&columns) {
                *acc += col[row].unwrap_or(0.0) * r;
            }
        }
    }

    let mut out = vec![Column::new(
        dst,
        ColumnData::Text(converted.keys().cloned().map(Some).collect()),
    )];
    for (i, c) in value_cols.iter().enumerate() {
        out.push(Column::new(
            *c,
            ColumnData::Number(converted.values().map(|v| Some(v[i])).collect()),
        ));
    }
    Table::new(out)
}

/// Read a crosswalk written by the `crosswalk` command.
pub fn read_crosswalk(path: &std::path::Path) -> Result<Table> {
    Table::from_csv(File::open(path)?)
}
