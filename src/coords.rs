//! Polling place locations.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::harmonise::{apply, Family, Recipe, Schema};
use crate::table::{ColumnData, Table};

const NUMERIC: &[&str] = &[
    "DivisionID",
    "PollingPlaceID",
    "PollingPlaceTypeID",
    "Latitude",
    "Longitude",
];

pub const SCHEMA: Schema = Schema {
    family: Family::Coordinates,
    canonical: &[
        "date",
        "event",
        "StateAb",
        "DivisionID",
        "DivisionNm",
        "PollingPlaceID",
        "PollingPlaceTypeID",
        "PollingPlaceNm",
        "PremisesNm",
        "PremisesSuburb",
        "PremisesPostCode",
        "Latitude",
        "Longitude",
    ],
    state_col: Some("StateAb"),
    fill_state: false,
    division_col: Some("DivisionNm"),
    recipes: &[
        // no type codes and no geocoding yet
        Recipe {
            events: r"^2007 Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionID", "DivisionId"),
                ("DivisionNm", "DivisionNm"),
                ("PollingPlaceID", "PollingPlaceId"),
                ("PollingPlaceNm", "PollingPlaceNm"),
                ("PremisesNm", "PremisesNm"),
                ("PremisesSuburb", "PremisesSuburb"),
                ("PremisesPostCode", "PremisesPostCode"),
            ],
            numeric: NUMERIC,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^2010 Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionID", "DivisionId"),
                ("DivisionNm", "DivisionNm"),
                ("PollingPlaceID", "PollingPlaceId"),
                ("PollingPlaceTypeID", "PollingPlaceTypeId"),
                ("PollingPlaceNm", "PollingPlaceNm"),
                ("PremisesNm", "PremisesNm"),
                ("PremisesSuburb", "PremisesSuburb"),
                ("PremisesPostCode", "PremisesPostCode"),
                ("Latitude", "Lat"),
                ("Longitude", "Long"),
            ],
            numeric: NUMERIC,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2013|2016|2019|2022|2025) Federal Election$|^\d{4} .+ By-Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionID", "DivisionID"),
                ("DivisionNm", "DivisionNm"),
                ("PollingPlaceID", "PollingPlaceID"),
                ("PollingPlaceTypeID", "PollingPlaceTypeID"),
                ("PollingPlaceNm", "PollingPlaceNm"),
                ("PremisesNm", "PremisesNm"),
                ("PremisesSuburb", "PremisesSuburb"),
                ("PremisesPostCode", "PremisesPostCode"),
                ("Latitude", "Latitude"),
                ("Longitude", "Longitude"),
            ],
            numeric: NUMERIC,
            ..Recipe::BASE
        },
    ],
    finish: Some(pad_postcodes),
};

/// Postcodes get read as numbers, which loses the leading zero of the NT's.
fn pad_postcodes(t: Table) -> Result<Table> {
    if !t.has_column("PremisesPostCode") {
        return Ok(t);
    }
    t.map_column("PremisesPostCode", |c| match c.to_text() {
        ColumnData::Text(v) => ColumnData::Text(
            v.into_iter()
                .map(|x| {
                    x.map(|s| {
                        if !s.is_empty() && s.len() < 4 && s.bytes().all(|b| b.is_ascii_digit()) {
                            format!("{:0>4}", s)
                        } else {
                            s
                        }
                    })
                })
                .collect(),
        ),
        other => other,
    })
}

pub fn harmonise(table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    apply(&SCHEMA, table, event, diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Value};

    fn recent() -> Table {
        Table::new(vec![
            Column::strs("date", &["2019-05-18", "2019-05-18"]),
            Column::strs("event", &["2019 Federal Election", "2019 Federal Election"]),
            Column::strs("State", &["NT", "ACT"]),
            Column::numbers("DivisionID", &[306.0, 101.0]),
            Column::strs("DivisionNm", &["Solomon", "Canberra"]),
            Column::numbers("PollingPlaceID", &[8176.0, 93.0]),
            Column::numbers("PollingPlaceTypeID", &[1.0, 1.0]),
            Column::strs("PollingPlaceNm", &["Darwin", "Ainslie"]),
            Column::strs("PremisesNm", &["Darwin High School", "Ainslie School"]),
            Column::strs("PremisesAddress1", &["Bullocky Point", "Donaldson St"]),
            Column::strs("PremisesSuburb", &["FANNIE BAY", "BRADDON"]),
            Column::numbers("PremisesPostCode", &[820.0, 2612.0]),
            Column::numbers("Latitude", &[-12.4287, -35.2745]),
            Column::numbers("Longitude", &[130.8347, 149.1406]),
        ])
        .unwrap()
    }

    #[test]
    fn recent_layout() {
        let mut diag = Diagnostics::new();
        let t = harmonise(recent(), "2019 Federal Election", &mut diag).unwrap();
        assert_eq!(SCHEMA.canonical.to_vec(), t.column_names());
        assert!(!t.has_column("PremisesAddress1"));
        assert_eq!(Some(Value::from("0820")), t.get(0, "PremisesPostCode"));
        assert_eq!(Some(Value::from("2612")), t.get(1, "PremisesPostCode"));
        assert_eq!(Some(Value::Number(-35.2745)), t.get(1, "Latitude"));
        assert!(diag.is_empty());
    }

    #[test]
    fn by_elections_use_the_recent_layout() {
        let t = harmonise(recent(), "2014 Griffith By-Election", &mut Diagnostics::new()).unwrap();
        assert_eq!(13, t.ncols());
    }

    #[test]
    fn older_layout_fills_what_was_not_published() {
        let raw = Table::new(vec![
            Column::strs("date", &["2007-11-24"]),
            Column::strs("event", &["2007 Federal Election"]),
            Column::strs("State", &["Western Australia"]),
            Column::numbers("DivisionId", &[238.0]),
            Column::strs("DivisionNm", &["Perth"]),
            Column::numbers("PollingPlaceId", &[1.0]),
            Column::strs("PollingPlaceNm", &["Perth"]),
            Column::strs("PremisesNm", &["Town Hall"]),
            Column::strs("PremisesSuburb", &["PERTH"]),
            Column::numbers("PremisesPostCode", &[6000.0]),
        ])
        .unwrap();
        let mut diag = Diagnostics::new();
        let t = harmonise(raw, "2007 Federal Election", &mut diag).unwrap();
        assert_eq!(SCHEMA.canonical.to_vec(), t.column_names());
        assert_eq!(Some(Value::from("WA")), t.get(0, "StateAb"));
        assert_eq!(Some(Value::Missing), t.get(0, "Latitude"));
        assert!(diag.contains("`PollingPlaceTypeID` is not published for event `2007 Federal Election`"));
        assert_eq!(3, diag.len());
    }
}
