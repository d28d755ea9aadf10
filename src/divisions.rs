//! ABS Commonwealth Electoral Division (CED) codes of the ASGS vintage each
//! election was run on.
//!
//! The ABS files carry no AEC `DivisionID`; it comes out missing and is
//! reported as unpublished.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::harmonise::{apply, Family, Recipe, Schema};
use crate::table::Table;

/// The ABS publishes rows for places that aren't divisions.
const NON_GEOGRAPHIC: &[(&str, &str)] = &[(
    "DivisionNm",
    r"(?i)^(no usual address|migratory\s*-\s*offshore\s*-\s*shipping)",
)];

pub const SCHEMA: Schema = Schema {
    family: Family::DivisionCodes,
    canonical: &["date", "event", "StateAb", "DivisionID", "DivisionNm", "CED_CODE"],
    state_col: Some("StateAb"),
    fill_state: false,
    division_col: Some("DivisionNm"),
    recipes: &[
        Recipe {
            events: r"^2016 Federal Election$",
            rename: &[
                ("StateAb", "STATE_NAME_2016"),
                ("DivisionNm", "CED_NAME_2016"),
                ("CED_CODE", "CED_CODE_2016"),
            ],
            exclude: NON_GEOGRAPHIC,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^2019 Federal Election$",
            rename: &[
                ("StateAb", "STATE_NAME_2016"),
                ("DivisionNm", "CED_NAME_2018"),
                ("CED_CODE", "CED_CODE_2018"),
            ],
            exclude: NON_GEOGRAPHIC,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^2022 Federal Election$",
            rename: &[
                ("StateAb", "STATE_NAME_2021"),
                ("DivisionNm", "CED_NAME_2021"),
                ("CED_CODE", "CED_CODE_2021"),
            ],
            exclude: NON_GEOGRAPHIC,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^2025 Federal Election$",
            rename: &[
                ("StateAb", "STATE_NAME_2021"),
                ("DivisionNm", "CED_NAME_2024"),
                ("CED_CODE", "CED_CODE_2024"),
            ],
            exclude: NON_GEOGRAPHIC,
            ..Recipe::BASE
        },
    ],
    finish: Some(codes_as_text),
};

/// CED codes are identifiers, not quantities.
fn codes_as_text(t: Table) -> Result<Table> {
    if !t.has_column("CED_CODE") {
        return Ok(t);
    }
    t.map_column("CED_CODE", |c| c.to_text())
}

pub fn harmonise(table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    apply(&SCHEMA, table, event, diag)
}
