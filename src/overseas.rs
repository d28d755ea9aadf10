//! Votes taken at overseas posts, by the division the voter is enrolled in.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::harmonise::{apply, Family, Recipe, Schema, Sum};
use crate::postal::TOTAL_ROWS;
use crate::table::Table;

const COUNTS: &[&str] = &["PrePollVotes", "PostalVotes", "TotalVotes"];
const EXCLUDE: &[(&str, &str)] = &[("DivisionNm", TOTAL_ROWS), ("OverseasPost", TOTAL_ROWS)];

pub const SCHEMA: Schema = Schema {
    family: Family::Overseas,
    canonical: &[
        "date",
        "event",
        "StateAb",
        "DivisionNm",
        "OverseasPost",
        "PrePollVotes",
        "PostalVotes",
        "TotalVotes",
    ],
    state_col: Some("StateAb"),
    fill_state: true,
    division_col: Some("DivisionNm"),
    recipes: &[
        // no total column: it is the sum of the two kinds of vote
        Recipe {
            events: r"^(2010|2013) Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionNm", "Division"),
                ("OverseasPost", "Overseas Post"),
                ("PrePollVotes", "Pre-Poll Votes"),
                ("PostalVotes", "Postal Votes"),
            ],
            exclude: EXCLUDE,
            sums: &[Sum {
                into: "TotalVotes",
                from: &["PrePollVotes", "PostalVotes"],
                keep_sources: true,
            }],
            numeric: COUNTS,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2016|2019|2022|2025) Federal Election$",
            rename: &[
                ("StateAb", "State"),
                ("DivisionNm", "Division"),
                ("OverseasPost", "Overseas Post"),
                ("PrePollVotes", "Pre-Poll Votes"),
                ("PostalVotes", "Postal Votes"),
                ("TotalVotes", "Total"),
            ],
            exclude: EXCLUDE,
            numeric: COUNTS,
            ..Recipe::BASE
        },
    ],
    finish: None,
};

pub fn harmonise(table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    apply(&SCHEMA, table, event, diag)
}
