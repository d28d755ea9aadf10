//! House of Representatives candidates and who was elected.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::harmonise::{apply, Family, Recipe, Schema};
use crate::table::{ColumnData, Table};

const FLAGS: [&str; 2] = ["Elected", "HistoricElected"];

pub const SCHEMA: Schema = Schema {
    family: Family::Candidates,
    canonical: &[
        "date",
        "event",
        "StateAb",
        "DivisionID",
        "DivisionNm",
        "PartyAb",
        "PartyNm",
        "CandidateID",
        "Surname",
        "GivenNm",
        "Elected",
        "HistoricElected",
    ],
    state_col: Some("StateAb"),
    fill_state: false,
    division_col: Some("DivisionNm"),
    recipes: &[
        Recipe {
            events: r"^(2004|2007) Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionID", "DivisionID"),
                ("DivisionNm", "DivisionNm"),
                ("PartyAb", "PartyAb"),
                ("PartyNm", "PartyNm"),
                ("CandidateID", "CandidateID"),
                ("Surname", "Surname"),
                ("GivenNm", "GivenNm"),
                ("Elected", "Elected"),
            ],
            numeric: &["DivisionID", "CandidateID"],
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2010|2013|2016|2019|2022|2025) Federal Election$|^\d{4} .+ By-Election$",
            rename: &[
                ("StateAb", "StateAb"),
                ("DivisionID", "DivisionID"),
                ("DivisionNm", "DivisionNm"),
                ("PartyAb", "PartyAb"),
                ("PartyNm", "PartyNm"),
                ("CandidateID", "CandidateID"),
                ("Surname", "Surname"),
                ("GivenNm", "GivenNm"),
                ("Elected", "Elected"),
                ("HistoricElected", "HistoricElected"),
            ],
            numeric: &["DivisionID", "CandidateID"],
            ..Recipe::BASE
        },
    ],
    finish: Some(normalise_flags),
};

/// `Y`/`N` whatever the year wrote. Anything unrecognised is left alone.
pub fn normalise_flag(token: &str) -> String {
    match token.trim().to_ascii_uppercase().as_str() {
        "Y" | "YES" | "TRUE" | "1" | "#" | "*" => "Y".to_string(),
        "N" | "NO" | "FALSE" | "0" => "N".to_string(),
        _ => token.to_string(),
    }
}

fn normalise_flags(t: Table) -> Result<Table> {
    let mut t = t;
    for flag in FLAGS {
        if t.has_column(flag) {
            t = t.map_column(flag, |c| match c.to_text() {
                ColumnData::Text(v) => ColumnData::Text(
                    v.into_iter()
                        .map(|x| x.map(|s| normalise_flag(&s)))
                        .collect(),
                ),
                other => other,
            })?;
        }
    }
    Ok(t)
}

pub fn harmonise(table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    apply(&SCHEMA, table, event, diag)
}
