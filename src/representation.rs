//! Seats won per party per state: one row per party, one column per state.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::harmonise::{apply, Family, Labels, Pivot, Recipe, Schema};
use crate::postal::TOTAL_ROWS;
use crate::table::Table;

const BY_STATE: Option<Pivot> = Some(Pivot {
    id_cols: &["date", "event", "PartyAb", "PartyNm"],
    long_cols: &["Total", "Last", "Change"],
    names_to: "StateAb",
    values_to: "Seats",
    labels: Labels::States,
});

const EXCLUDE: &[(&str, &str)] = &[("PartyNm", TOTAL_ROWS), ("PartyAb", TOTAL_ROWS)];

pub const SCHEMA: Schema = Schema {
    family: Family::PartyRepresentation,
    canonical: &["date", "event", "PartyAb", "PartyNm", "StateAb", "Seats"],
    state_col: Some("StateAb"),
    fill_state: false,
    division_col: None,
    recipes: &[
        // states are spelled out in these
        Recipe {
            events: r"^(2004|2007|2010) Federal Election$",
            rename: &[("PartyAb", "Party Ab"), ("PartyNm", "Party")],
            exclude: EXCLUDE,
            pivot: BY_STATE,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2013|2016|2019|2022|2025) Federal Election$",
            rename: &[("PartyAb", "PartyAb"), ("PartyNm", "PartyNm")],
            exclude: EXCLUDE,
            pivot: BY_STATE,
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
    use crate::table::{Column, Value};

    #[test]
    fn spelled_out_and_abbreviated_states_agree() {
        let old = Table::new(vec![
            Column::strs("date", &["2010-08-21", "2010-08-21"]),
            Column::strs("event", &["2010 Federal Election"; 2]),
            Column::strs("Party Ab", &["GRN", ""]),
            Column::strs("Party", &["The Greens", "Total"]),
            Column::numbers("New South Wales", &[0.0, 48.0]),
            Column::numbers("Victoria", &[1.0, 37.0]),
            Column::numbers("Total", &[1.0, 150.0]),
        ])
        .unwrap();
        let new = Table::new(vec![
            Column::strs("date", &["2013-09-07"]),
            Column::strs("event", &["2013 Federal Election"]),
            Column::strs("PartyAb", &["GRN"]),
            Column::strs("PartyNm", &["The Greens"]),
            Column::numbers("NSW", &[0.0]),
            Column::numbers("VIC", &[1.0]),
            Column::numbers("Total", &[1.0]),
        ])
        .unwrap();

        let mut diag = Diagnostics::new();
        let a = harmonise(old, "2010 Federal Election", &mut diag).unwrap();
        let b = harmonise(new, "2013 Federal Election", &mut diag).unwrap();
        assert_eq!(SCHEMA.canonical.to_vec(), a.column_names());
        assert_eq!(2, a.nrows());
        let same = ["PartyAb", "PartyNm", "StateAb", "Seats"];
        assert_eq!(a.select(&same).unwrap(), b.select(&same).unwrap());
        assert_eq!(Some(Value::from("VIC")), a.get(1, "StateAb"));
        assert_eq!(Some(Value::Number(0.0)), a.get(0, "Seats"));
    }
}
