//! Tables already retrieved, keyed by family and query.
//!
//! Nothing is ever evicted; the operator clears it.

use indexmap::IndexMap;
use inflector::cases::snakecase::to_snake_case;
use tracing::debug;

use crate::harmonise::Family;
use crate::table::Table;

#[derive(Debug, Default, Clone)]
pub struct DatasetCache {
    entries: IndexMap<String, Table>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `family::param+param`, e.g. `pva-by-date::2013_federal_election+2016_federal_election`.
    pub fn key<S: AsRef<str>>(family: Family, params: &[S]) -> String {
        let params: Vec<String> = params.iter().map(|p| to_snake_case(p.as_ref())).collect();
        format!("{}::{}", family.id(), params.join("+"))
    }

    pub fn get(&self, key: &str) -> Option<&Table> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: String, table: Table) {
        debug!("caching {} ({} rows)", key, table.nrows());
        self.entries.insert(key, table);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Forget everything cached for `family`. Returns how many entries went.
    pub fn clear_family(&mut self, family: Family) -> usize {
        let prefix = format!("{}::", family.id());
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(&prefix));
        before - self.entries.len()
    }
}
