//! The reference index: which datasets exist for which events, what
//! geography each event was run on, and which concordances are published.
//! Plus fetching, locally or over HTTP, and the retrieval pipeline.

use indexmap::IndexMap;
use inflector::cases::snakecase::to_snake_case;
use std::fs::{create_dir_all, write};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::boundaries::Geography;
use crate::cache::DatasetCache;
use crate::combine::combine;
use crate::diag::Diagnostics;
use crate::error::{Error, Result};
use crate::harmonise::{harmonise, Family};
use crate::table::{Column, Table};
use crate::utils::{fetch_blocking, open_csvz, open_csvz_from_path};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EventInfo {
    /// Polling day, ISO format.
    pub date: String,
    /// Vintage of the SA1s results were published against, if any.
    #[serde(default)]
    pub sa1: Option<u16>,
    /// Vintage of the division boundaries in force.
    pub division: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatasetEntry {
    pub family: Family,
    pub event: String,
    pub file: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Title lines above the real header.
    #[serde(default)]
    pub skip: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceIndex {
    pub events: IndexMap<String, EventInfo>,
    pub datasets: Vec<DatasetEntry>,
    pub concordances: Vec<(Geography, Geography)>,
}

impl ReferenceIndex {
    /// The index shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_ron(include_str!("data_files/index.ron"))
    }

    pub fn from_ron(text: &str) -> Result<Self> {
        ron::de::from_str(text).map_err(|e| Error::Index(e.to_string()))
    }

    pub fn event(&self, name: &str) -> Option<&EventInfo> {
        self.events.get(name)
    }

    pub fn dataset(&self, family: Family, event: &str) -> Result<&DatasetEntry> {
        if self.event(event).is_none() {
            return Err(Error::UnknownEvent(event.to_string()));
        }
        self.datasets
            .iter()
            .find(|d| d.family == family && d.event == event)
            .ok_or_else(|| Error::Index(format!("no {} dataset for `{}`", family, event)))
    }

    pub fn datasets_for(&self, family: Family) -> impl Iterator<Item = &DatasetEntry> + '_ {
        self.datasets.iter().filter(move |d| d.family == family)
    }

    pub fn concordances_from(&self, from: Geography) -> impl Iterator<Item = Geography> + '_ {
        self.concordances
            .iter()
            .filter(move |(a, _)| *a == from)
            .map(|(_, b)| *b)
    }

    pub fn has_concordance(&self, from: Geography, to: Geography) -> bool {
        self.concordances.contains(&(from, to))
    }
}

/// Somewhere raw tables come from.
pub trait Fetch {
    /// The raw table for `entry`, exactly as published.
    fn fetch(&self, entry: &DatasetEntry) -> Result<Table>;
}

/// Files already on disk, as laid out by [`download`] or flat in one directory.
#[derive(Debug, Clone)]
pub struct LocalFiles {
    pub dir: PathBuf,
}

impl LocalFiles {
    fn locate(&self, entry: &DatasetEntry) -> Result<PathBuf> {
        let flat = self.dir.join(&entry.file);
        if flat.is_file() {
            return Ok(flat);
        }
        let nested = self.dir.join(event_dir(&entry.event)).join(&entry.file);
        if nested.is_file() {
            return Ok(nested);
        }
        // anywhere further down
        let query = self.dir.join("**").join(&entry.file);
        let query = query.to_str().ok_or_else(|| Error::Fetch {
            what: entry.file.clone(),
            reason: "path is not valid UTF-8".to_string(),
        })?;
        glob::glob(query)
            .map_err(|e| Error::Fetch {
                what: entry.file.clone(),
                reason: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .next()
            .ok_or_else(|| Error::Fetch {
                what: entry.file.clone(),
                reason: format!("not found under {}", self.dir.display()),
            })
    }
}

impl Fetch for LocalFiles {
    fn fetch(&self, entry: &DatasetEntry) -> Result<Table> {
        let path = self.locate(entry)?;
        info!("reading {}", path.display());
        Table::from_csv_skipping(open_csvz_from_path(&path)?, entry.skip)
    }
}

/// Straight from the publisher.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetch;

fn fetch_bytes(link: &str, what: &str) -> Result<Vec<u8>> {
    url::Url::parse(link).map_err(|e| Error::Fetch {
        what: what.to_string(),
        reason: format!("bad URL {}: {}", link, e),
    })?;
    Ok(fetch_blocking(link)?.bytes)
}

impl Fetch for HttpFetch {
    fn fetch(&self, entry: &DatasetEntry) -> Result<Table> {
        let link = entry.url.as_deref().ok_or_else(|| Error::Fetch {
            what: entry.file.clone(),
            reason: "the reference index has no URL for it".to_string(),
        })?;
        info!("fetching {}", link);
        let bytes = fetch_bytes(link, &entry.file)?;
        Table::from_csv_skipping(open_csvz(Cursor::new(bytes))?, entry.skip)
    }
}

/// Put `date` and `event` in front of a raw table.
pub fn stamp(table: Table, date: &str, event: &str) -> Result<Table> {
    let n = table.nrows();
    let table = table.without_column("date").without_column("event");
    let mut columns = vec![
        Column::strs("date", &vec![date; n]),
        Column::strs("event", &vec![event; n]),
    ];
    columns.extend(table.into_columns());
    Table::new(columns)
}

/// Fetch, harmonise and combine `family` for each of `events`, in order.
///
/// The combined table is cached under the family and event list; a second
/// call with the same arguments doesn't fetch anything.
pub fn retrieve(
    index: &ReferenceIndex,
    family: Family,
    events: &[String],
    fetch: &dyn Fetch,
    cache: &mut DatasetCache,
    diag: &mut Diagnostics,
) -> Result<Table> {
    let key = DatasetCache::key(family, events);
    if let Some(t) = cache.get(&key) {
        debug!("cache hit for {}", key);
        return Ok(t.clone());
    }

    let mut tables = Vec::with_capacity(events.len());
    for event in events {
        let entry = index.dataset(family, event)?;
        let date = index
            .event(event)
            .map(|e| e.date.as_str())
            .ok_or_else(|| Error::UnknownEvent(event.clone()))?;
        let raw = stamp(fetch.fetch(entry)?, date, event)?;
        tables.push(harmonise(family, raw, event, diag)?);
    }
    let combined = combine(tables, diag)?;
    cache.set(key, combined.clone());
    Ok(combined)
}

/// Directory name for an event's downloads: `2019_federal_election`.
pub fn event_dir(event: &str) -> String {
    to_snake_case(event)
}

/// Download every dataset with a URL into `dldir`, one directory per event.
/// Files already present are skipped. Returns how many were skipped.
pub fn download(index: &ReferenceIndex, dldir: &Path) -> Result<usize> {
    let dldir = if dldir.is_file() {
        dldir.parent().unwrap_or_else(|| Path::new("."))
    } else {
        dldir
    };
    create_dir_all(dldir)?;

    let mut skips = 0;
    for entry in &index.datasets {
        let link = match &entry.url {
            Some(u) => u,
            None => continue,
        };
        let event_dir = dldir.join(event_dir(&entry.event));
        create_dir_all(&event_dir)?;
        let dlto = event_dir.join(&entry.file);
        if dlto.is_file() {
            skips += 1;
            continue;
        }
        info!("downloading {}", dlto.display());
        write(&dlto, fetch_bytes(link, &entry.file)?)?;
    }
    Ok(skips)
}

/// Tab-separated family, event, file and URL of everything in the index.
pub fn examine(index: &ReferenceIndex, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Family\tEvent\tFile\tURL")?;
    for d in &index.datasets {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            d.family,
            d.event,
            d.file,
            d.url.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use std::cell::Cell;

    #[test]
    fn builtin_index_is_consistent() {
        let index = ReferenceIndex::builtin().unwrap();
        for d in &index.datasets {
            assert!(index.event(&d.event).is_some(), "{}", d.event);
            if let Some(u) = &d.url {
                assert!(url::Url::parse(u).is_ok(), "{}", u);
            }
        }
        for info in index.events.values() {
            assert!(chrono::NaiveDate::parse_from_str(&info.date, "%Y-%m-%d").is_ok());
        }
        for (a, b) in &index.concordances {
            assert!(a.vintage <= b.vintage);
        }
    }

    #[test]
    fn unknown_events_and_missing_datasets() {
        let index = ReferenceIndex::builtin().unwrap();
        assert!(matches!(
            index.dataset(Family::Coordinates, "1901 Federal Election"),
            Err(Error::UnknownEvent(_))
        ));
        assert!(index
            .dataset(Family::Coordinates, "2019 Federal Election")
            .is_ok());
    }

    #[test]
    fn event_directories() {
        assert_eq!("2019_federal_election", event_dir("2019 Federal Election"));
    }

    struct Canned {
        calls: Cell<usize>,
    }

    impl Fetch for Canned {
        fn fetch(&self, entry: &DatasetEntry) -> Result<Table> {
            self.calls.set(self.calls.get() + 1);
            let csv = match entry.event.as_str() {
                "2013 Federal Election" => "title line\nEnrolment Division,20-Aug-13,21-Aug-13\nGriffith,100,150\n",
                _ => "title line\nState,Division,20/04/22\nQLD,Griffith,-\nQLD,Brisbane,7\n",
            };
            Table::from_csv_skipping(csv.as_bytes(), 1)
        }
    }

    fn index() -> ReferenceIndex {
        ReferenceIndex::from_ron(
            r#"(
                events: {
                    "2013 Federal Election": (date: "2013-09-07", sa1: Some(2011), division: 2013),
                    "2022 Federal Election": (date: "2022-05-21", sa1: Some(2021), division: 2021),
                },
                datasets: [
                    (family: PvaByDate, event: "2013 Federal Election", file: "a.csv", skip: 1),
                    (family: PvaByDate, event: "2022 Federal Election", file: "b.csv", skip: 1),
                ],
                concordances: [],
            )"#,
        )
        .unwrap()
    }

    #[test]
    fn retrieval_harmonises_combines_and_caches() {
        let fetch = Canned {
            calls: Cell::new(0),
        };
        let mut cache = DatasetCache::new();
        let mut diag = Diagnostics::new();
        let events = vec![
            "2013 Federal Election".to_string(),
            "2022 Federal Election".to_string(),
        ];

        let t = retrieve(&index(), Family::PvaByDate, &events, &fetch, &mut cache, &mut diag)
            .unwrap();
        assert_eq!(Family::PvaByDate.canonical_columns().to_vec(), t.column_names());
        assert_eq!(3, t.nrows());
        assert_eq!(Some(Value::from("2013-09-07")), t.get(0, "date"));
        assert_eq!(Some(Value::from("ZZZ")), t.get(1, "StateAb"));
        assert_eq!(Some(Value::from("Brisbane")), t.get(2, "DivisionNm"));
        assert_eq!(Some(Value::Number(7.0)), t.get(2, "TotalPVAs"));
        assert!(diag.warnings().next().is_none());
        assert_eq!(2, fetch.calls.get());

        let again =
            retrieve(&index(), Family::PvaByDate, &events, &fetch, &mut cache, &mut diag).unwrap();
        assert_eq!(t, again);
        assert_eq!(2, fetch.calls.get());
    }
}
