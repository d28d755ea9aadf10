//! Binding per-event tables of one family into a single table.

use itertools::Itertools;
use tracing::debug;

use crate::diag::Diagnostics;
use crate::error::{Error, Result};
use crate::table::{Column, ColumnType, Table};

/// What a column of two different types across inputs becomes.
///
/// `None` for a column whose present types already agree.
fn coercion_for(types: &[(ColumnType, bool)]) -> Option<ColumnType> {
    let present: Vec<ColumnType> = types
        .iter()
        .filter(|(_, all_missing)| !all_missing)
        .map(|(ty, _)| *ty)
        .unique()
        .collect();
    let all: Vec<ColumnType> = types.iter().map(|(ty, _)| *ty).unique().collect();
    if all.len() < 2 {
        return None;
    }
    Some(match present.as_slice() {
        // only empty columns disagree: they take on the type of the rest
        [] => all[0],
        [ty] => *ty,
        many if many.contains(&ColumnType::Date) => ColumnType::Text,
        _ => ColumnType::Number,
    })
}

/// Concatenate `tables` in the order given.
///
/// Every table must have the same set of column names; the first table's order
/// wins. Columns whose types differ between tables are coerced first (see
/// [`coercion_for`]), one column per pass, and each coercion is reported.
pub fn combine(tables: Vec<Table>, diag: &mut Diagnostics) -> Result<Table> {
    let mut tables = tables.into_iter();
    let first = match tables.next() {
        Some(t) => t,
        None => return Ok(Table::default()),
    };
    let names: Vec<String> = first.column_names().into_iter().map(String::from).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut aligned = vec![first.clone()];
    for (i, t) in tables.enumerate() {
        let theirs: Vec<&str> = t.column_names();
        if theirs.len() != names.len() || !theirs.iter().all(|n| first.has_column(n)) {
            let extra = theirs.iter().filter(|n| !first.has_column(n)).join("`, `");
            let absent = name_refs.iter().filter(|n| !t.has_column(n)).join("`, `");
            return Err(Error::Combine(format!(
                "table {} has different columns (extra: `{}`; absent: `{}`)",
                i + 2,
                extra,
                absent
            )));
        }
        aligned.push(t.select(&name_refs)?);
    }

    for _ in 0..=names.len() {
        let fix = names.iter().enumerate().find_map(|(c, name)| {
            let types: Vec<(ColumnType, bool)> = aligned
                .iter()
                .map(|t| {
                    let col = &t.columns()[c];
                    (col.column_type(), col.data.all_missing())
                })
                .collect();
            coercion_for(&types).map(|ty| (name.clone(), ty))
        });
        let (name, ty) = match fix {
            Some(f) => f,
            None => return bind(aligned),
        };
        diag.info(format!("combine: coerced column `{}` to {}", name, ty));
        aligned = aligned
            .into_iter()
            .map(|t| t.map_column(&name, |c| c.cast(ty)))
            .collect::<Result<_>>()?;
    }
    Err(Error::Combine(
        "column types did not settle after coercing every column".to_string(),
    ))
}

fn bind(tables: Vec<Table>) -> Result<Table> {
    let mut tables = tables.into_iter();
    let mut columns: Vec<Column> = match tables.next() {
        Some(t) => t.into_columns(),
        None => return Ok(Table::default()),
    };
    for t in tables {
        for (into, from) in columns.iter_mut().zip(t.into_columns()) {
            into.data.append(from.data)?;
        }
    }
    debug!("combine: bound {} columns", columns.len());
    Table::new(columns)
}
