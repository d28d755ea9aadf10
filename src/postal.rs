//! Postal vote applications, by date received and by the party that
//! distributed the form.
//!
//! Both come as one row per division with one column per day (or per party).

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::harmonise::{apply, Family, Labels, Pivot, Recipe, Schema, Sum};
use crate::table::Table;
use crate::utils::{DD_MM_YY, DD_MM_YYYY, DD_MON_YY, DD_MON_YY_DASHED, YYYYMMDD};

/// Division cells that are really a subtotal.
pub const TOTAL_ROWS: &str = r"(?i)^\s*(grand\s+)?totals?\b";

const ID_COLS: &[&str] = &["date", "event", "StateAb", "DivisionNm"];
const TOTALS: &[&str] = &["Total", "TOTAL", "Sum of AEC and Parties"];

const fn by_date(formats: &'static [&'static str]) -> Option<Pivot> {
    Some(Pivot {
        id_cols: ID_COLS,
        long_cols: TOTALS,
        names_to: "DateReceived",
        values_to: "TotalPVAs",
        labels: Labels::Dates(formats),
    })
}

const BY_PARTY_PIVOT: Option<Pivot> = Some(Pivot {
    id_cols: ID_COLS,
    long_cols: TOTALS,
    names_to: "PartyAb",
    values_to: "TotalPVAs",
    labels: Labels::Plain,
});

/// From 2016 the AEC split its own applications by channel.
const AEC_CHANNELS: &[Sum] = &[Sum {
    into: "AEC",
    from: &["AEC (Online)", "AEC (Paper)"],
    keep_sources: false,
}];

pub const BY_DATE: Schema = Schema {
    family: Family::PvaByDate,
    canonical: &["date", "event", "StateAb", "DivisionNm", "DateReceived", "TotalPVAs"],
    state_col: Some("StateAb"),
    fill_state: true,
    division_col: Some("DivisionNm"),
    recipes: &[
        Recipe {
            events: r"^2010 Federal Election$",
            rename: &[("StateAb", "State"), ("DivisionNm", "Division")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            pivot: by_date(&[DD_MON_YY]),
            ..Recipe::BASE
        },
        // no state column at all in these
        Recipe {
            events: r"^(2013 Federal Election|2014 .+ By-Election)$",
            rename: &[("DivisionNm", "Enrolment Division")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            pivot: by_date(&[DD_MON_YY_DASHED]),
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2016|2019) Federal Election$",
            rename: &[("StateAb", "State_Cd"), ("DivisionNm", "PVA_Web_1_Date_Div")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            pivot: by_date(&[YYYYMMDD]),
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2022|2025) Federal Election$",
            rename: &[("StateAb", "State"), ("DivisionNm", "Division")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            pivot: by_date(&[DD_MM_YY, DD_MM_YYYY]),
            ..Recipe::BASE
        },
    ],
    finish: None,
};

pub const BY_PARTY: Schema = Schema {
    family: Family::PvaByParty,
    canonical: &["date", "event", "StateAb", "DivisionNm", "PartyAb", "TotalPVAs"],
    state_col: Some("StateAb"),
    fill_state: true,
    division_col: Some("DivisionNm"),
    recipes: &[
        Recipe {
            events: r"^2010 Federal Election$",
            rename: &[("StateAb", "State"), ("DivisionNm", "Division")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            pivot: BY_PARTY_PIVOT,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^2013 Federal Election$",
            rename: &[("StateAb", "Enrolment State"), ("DivisionNm", "Enrolment Division")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            pivot: BY_PARTY_PIVOT,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2016|2019) Federal Election$",
            rename: &[("StateAb", "State_Cd"), ("DivisionNm", "Division_Nm")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            sums: AEC_CHANNELS,
            pivot: BY_PARTY_PIVOT,
            ..Recipe::BASE
        },
        Recipe {
            events: r"^(2022|2025) Federal Election$",
            rename: &[("StateAb", "State"), ("DivisionNm", "Division")],
            exclude: &[("DivisionNm", TOTAL_ROWS)],
            sums: AEC_CHANNELS,
            pivot: BY_PARTY_PIVOT,
            ..Recipe::BASE
        },
    ],
    finish: None,
};

/// The layouts the date labels of `event` are written in.
pub fn date_formats(event: &str) -> Result<Option<&'static [&'static str]>> {
    Ok(BY_DATE
        .recipe_for(event)?
        .and_then(|r| r.pivot)
        .and_then(|p| match p.labels {
            Labels::Dates(f) => Some(f),
            _ => None,
        }))
}

pub fn harmonise_by_date(table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    apply(&BY_DATE, table, event, diag)
}

pub fn harmonise_by_party(table: Table, event: &str, diag: &mut Diagnostics) -> Result<Table> {
    apply(&BY_PARTY, table, event, diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnData, Value};
    use crate::utils::parse_date;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn pva_by_date_2013() {
        let raw = Table::new(vec![
            Column::strs("date", &["2013-09-07"]),
            Column::strs("event", &["2013 Federal Election"]),
            Column::strs("Enrolment Division", &["Griffith"]),
            Column::numbers("20-Aug-13", &[100.0]),
            Column::numbers("21-Aug-13", &[150.0]),
        ])
        .unwrap();

        let mut diag = Diagnostics::new();
        let t = harmonise_by_date(raw, "2013 Federal Election", &mut diag).unwrap();

        assert_eq!(BY_DATE.canonical.to_vec(), t.column_names());
        assert_eq!(2, t.nrows());
        for r in 0..2 {
            assert_eq!(Some(Value::from("ZZZ")), t.get(r, "StateAb"));
            assert_eq!(Some(Value::from("Griffith")), t.get(r, "DivisionNm"));
        }
        assert_eq!(Some(ymd(2013, 8, 20)), t.get(0, "DateReceived"));
        assert_eq!(Some(ymd(2013, 8, 21)), t.get(1, "DateReceived"));
        assert_eq!(Some(Value::Number(100.0)), t.get(0, "TotalPVAs"));
        assert_eq!(Some(Value::Number(150.0)), t.get(1, "TotalPVAs"));
        assert!(diag.warnings().next().is_none());
    }

    #[test]
    fn pva_by_date_2014_by_election() {
        let raw = Table::new(vec![
            Column::strs("date", &["2014-02-08", "2014-02-08"]),
            Column::strs("event", &["2014 Griffith By-Election"; 2]),
            Column::strs("Enrolment Division", &["Griffith", "Total"]),
            Column::numbers("20-Jan-14", &[40.0, 40.0]),
            Column::new("21-Jan-14", ColumnData::Number(vec![None, None])),
            Column::numbers("22-Jan-14", &[25.0, 25.0]),
        ])
        .unwrap();

        let mut diag = Diagnostics::new();
        let t = harmonise_by_date(raw, "2014 Griffith By-Election", &mut diag).unwrap();

        assert_eq!(BY_DATE.canonical.to_vec(), t.column_names());
        assert_eq!(2, t.nrows());
        assert_eq!(Some(Value::from("ZZZ")), t.get(0, "StateAb"));
        assert_eq!(Some(Value::from("Griffith")), t.get(1, "DivisionNm"));
        assert_eq!(Some(ymd(2014, 1, 20)), t.get(0, "DateReceived"));
        assert_eq!(Some(ymd(2014, 1, 22)), t.get(1, "DateReceived"));
        assert_eq!(Some(Value::Number(25.0)), t.get(1, "TotalPVAs"));
        assert!(diag.warnings().next().is_none());
    }

    #[test]
    fn pva_by_date_drops_totals_and_empty_days() {
        let raw = Table::new(vec![
            Column::strs("date", &["2010-08-21", "2010-08-21", "2010-08-21"]),
            Column::strs("event", &["2010 Federal Election"; 3]),
            Column::strs("State", &["NSW", "Vic", "NSW"]),
            Column::strs("Division", &["Banks", "Melbourne", "Total"]),
            Column::new("02 Aug 10", ColumnData::Number(vec![Some(4.0), None, Some(4.0)])),
            Column::numbers("03 Aug 10", &[6.0, 7.0, 13.0]),
            Column::numbers("Total", &[10.0, 7.0, 17.0]),
        ])
        .unwrap();

        let t = harmonise_by_date(raw, "2010 Federal Election", &mut Diagnostics::new()).unwrap();
        assert_eq!(3, t.nrows());
        assert_eq!(Some(ymd(2010, 8, 2)), t.get(0, "DateReceived"));
        assert_eq!(Some(Value::from("VIC")), t.get(2, "StateAb"));
        assert_eq!(Some(ymd(2010, 8, 3)), t.get(2, "DateReceived"));
    }

    #[test]
    fn unreadable_date_label_is_flagged() {
        let raw = Table::new(vec![
            Column::strs("date", &["2016-07-02"]),
            Column::strs("event", &["2016 Federal Election"]),
            Column::strs("State_Cd", &["QLD"]),
            Column::strs("PVA_Web_1_Date_Div", &["Brisbane"]),
            Column::numbers("20160614", &[3.0]),
            Column::numbers("Late", &[1.0]),
        ])
        .unwrap();

        let mut diag = Diagnostics::new();
        let t = harmonise_by_date(raw, "2016 Federal Election", &mut diag).unwrap();
        assert_eq!(Some(ymd(2016, 6, 14)), t.get(0, "DateReceived"));
        assert_eq!(Some(Value::Missing), t.get(1, "DateReceived"));
        assert!(diag.contains("`Late`"));
        assert_eq!(1, diag.warnings().count());
    }

    #[test]
    fn date_formats_follow_the_year() {
        let f2016 = date_formats("2016 Federal Election").unwrap().unwrap();
        assert_eq!(
            Some(NaiveDate::from_ymd_opt(2016, 6, 14).unwrap()),
            parse_date("20160614", f2016)
        );
        let f2010 = date_formats("2010 Federal Election").unwrap().unwrap();
        assert_eq!(
            Some(NaiveDate::from_ymd_opt(2010, 8, 2).unwrap()),
            parse_date("02 Aug 10", f2010)
        );
        assert_eq!(None, parse_date("20160614", f2010));
        assert!(date_formats("1901 Federal Election").unwrap().is_none());
    }

    #[test]
    fn by_party_layouts_agree() {
        let single = Table::new(vec![
            Column::strs("date", &["2013-09-07"]),
            Column::strs("event", &["2013 Federal Election"]),
            Column::strs("Enrolment State", &["Tas"]),
            Column::strs("Enrolment Division", &["Denison"]),
            Column::numbers("AEC", &[30.0]),
            Column::numbers("LP", &[12.0]),
            Column::numbers("Sum of AEC and Parties", &[42.0]),
        ])
        .unwrap();
        let split = Table::new(vec![
            Column::strs("date", &["2019-05-18"]),
            Column::strs("event", &["2019 Federal Election"]),
            Column::strs("State_Cd", &["TAS"]),
            Column::strs("Division_Nm", &["Denison"]),
            Column::numbers("AEC (Online)", &[25.0]),
            Column::numbers("AEC (Paper)", &[5.0]),
            Column::numbers("LP", &[12.0]),
            Column::numbers("Sum of AEC and Parties", &[42.0]),
        ])
        .unwrap();

        let mut diag = Diagnostics::new();
        let a = harmonise_by_party(single, "2013 Federal Election", &mut diag).unwrap();
        let b = harmonise_by_party(split, "2019 Federal Election", &mut diag).unwrap();
        let same = ["StateAb", "DivisionNm", "PartyAb", "TotalPVAs"];
        assert_eq!(a.select(&same).unwrap(), b.select(&same).unwrap());
        assert_eq!(Some(Value::from("AEC")), a.get(0, "PartyAb"));
        assert_eq!(Some(Value::Number(30.0)), b.get(0, "TotalPVAs"));
    }
}
