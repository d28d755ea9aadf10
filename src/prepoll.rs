//! Pre-poll votes issued per voting centre per day.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::harmonise::{apply, Family, Labels, Pivot, Recipe, Schema};
use crate::postal::TOTAL_ROWS;
use crate::table::Table;
use crate::utils::{DD_MM_YY, DD_MM_YYYY, DD_MON_YY, YYYY_MM_DD};

const fn daily(formats: &'static [&'static str]) -> Option<Pivot> {
    Some(Pivot {
        id_cols: &["date", "event", "StateAb", "DivisionNm", "PollingPlaceNm"],
        long_cols: &["Total", "Total Votes"],
        names_to: "IssueDate",
        values_to: "TotalVotes",
        labels: Labels::Dates(formats),
    })
}

const EXCLUDE: &[(&str, &str)] = &[("DivisionNm", TOTAL_ROWS), ("PollingPlaceNm", TOTAL_ROWS)];

pub const SCHEMA: Schema = Schema {
    family: Family::PrePoll,
    canonical: &[
        "date",
        "event",
        "StateAb",
        "DivisionNm",
        "PollingPlaceNm",
        "IssueDate",
        "TotalVotes",
    ],
    state_col: Some("StateAb"),
    fill_state: false,
    division_col: Some("DivisionNm"),
    recipes: &[
        Recipe {
            events: r"^2010 Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionNm", "Division"),
                ("PollingPlaceNm", "Polling Place"),
            ],
            exclude: EXCLUDE,
            pivot: daily(&[DD_MON_YY]),
            ..Recipe::BASE
        },
        Recipe {
            events: r"^2013 Federal Election$",
            rename: &[
                ("StateAb", "m_state_ab"),
                ("DivisionNm", "m_div_nm"),
                ("PollingPlaceNm", "m_pp_nm"),
            ],
            exclude: EXCLUDE,
            pivot: daily(&[DD_MM_YYYY]),
            ..Recipe::BASE
        },
        Recipe {
            events: r"^2016 Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionNm", "Division"),
                ("PollingPlaceNm", "PPVC"),
            ],
            exclude: EXCLUDE,
            pivot: daily(&[YYYY_MM_DD]),
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2019|2022|2025) Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionNm", "Division"),
                ("PollingPlaceNm", "PPVC"),
            ],
            exclude: EXCLUDE,
            pivot: daily(&[DD_MM_YY, DD_MM_YYYY]),
            ..Recipe::BASE
        },
    ],
    finish: None,
};

pub fn harmonise(table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    apply(&SCHEMA, table, event, diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnData, Value};
    use chrono::NaiveDate;

    #[test]
    fn centre_by_day() {
        let raw = Table::new(vec![
            Column::strs("date", &["2013-09-07", "2013-09-07"]),
            Column::strs("event", &["2013 Federal Election", "2013 Federal Election"]),
            Column::strs("m_state_ab", &["SA", "SA"]),
            Column::strs("m_div_nm", &["Adelaide", "Adelaide"]),
            Column::strs("m_pp_nm", &["Adelaide PPVC", "Total"]),
            Column::new(
                "20/08/2013",
                ColumnData::Text(vec![Some("1,204".into()), Some("1,204".into())]),
            ),
            Column::new("21/08/2013", ColumnData::Text(vec![Some("-".into()), None])),
            Column::numbers("Total", &[1204.0, 1204.0]),
        ])
        .unwrap();

        let mut diag = Diagnostics::new();
        let t = harmonise(raw, "2013 Federal Election", &mut diag).unwrap();
        assert_eq!(SCHEMA.canonical.to_vec(), t.column_names());
        assert_eq!(1, t.nrows());
        assert_eq!(Some(Value::from("Adelaide PPVC")), t.get(0, "PollingPlaceNm"));
        assert_eq!(
            Some(Value::Date(NaiveDate::from_ymd_opt(2013, 8, 20).unwrap())),
            t.get(0, "IssueDate")
        );
        assert_eq!(Some(Value::Number(1204.0)), t.get(0, "TotalVotes"));
        assert!(diag.is_empty());
    }

    #[test]
    fn renamed_columns_must_be_there() {
        let raw = Table::new(vec![
            Column::strs("date", &["2016-07-02"]),
            Column::strs("event", &["2016 Federal Election"]),
            Column::strs("State", &["VIC"]),
            Column::strs("Division", &["Kooyong"]),
            Column::numbers("2016-06-20", &[50.0]),
        ])
        .unwrap();
        let err = harmonise(raw, "2016 Federal Election", &mut Diagnostics::new()).unwrap_err();
        assert_eq!("missing expected column(s): `PPVC`", err.to_string());
    }
}
