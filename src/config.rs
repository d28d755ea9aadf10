//! Loading of configuration files.
//!
//! The layout follows Python's ConfigParser: a special `[DEFAULT]` section,
//! then arbitrarily-named sections (profiles) after that. A key missing from a
//! profile is taken from `[DEFAULT]`, then from the built-in default if the
//! key has one. No interpolation.
use std::collections::{BTreeMap, HashMap};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use toml_edit::{Document, Item, Table};

use crate::boundaries::{RatioSettings, DEFAULT_TOLERANCE};
use crate::error::{Error, Result};

pub const DEFAULT_SECTION: &str = "DEFAULT";

/// An example configuration, for `ausvotes example`.
pub const EXAMPLE: &str = include_str!("../example_config.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    /// Where raw downloads live.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub concordance_dir: Option<PathBuf>,
    pub ratio_tolerance: f64,
    pub process_ratios: bool,
}

impl Profile {
    pub fn ratio_settings(&self) -> RatioSettings {
        RatioSettings {
            tolerance: self.ratio_tolerance,
            process: self.process_ratios,
        }
    }
}

pub fn get_cfg_doc_from_path(cfgpath: &Path) -> Result<Document> {
    read_to_string(cfgpath)?.parse::<Document>().map_err(|e| {
        Error::Config(format!("could not parse {}: {}", cfgpath.display(), e))
    })
}

/// Reads a key from a profile, or failing that from `[DEFAULT]`.
struct Lookup<'a> {
    profile: &'a str,
    section: &'a Table,
    defaults: &'a HashMap<&'a str, &'a Item>,
}

impl<'a> Lookup<'a> {
    fn item(&self, key: &str) -> Option<&'a Item> {
        self.section
            .get(key)
            .or_else(|| self.defaults.get(key).copied())
    }

    fn wrong_type(&self, key: &str, wanted: &str) -> Error {
        Error::Config(format!("[{}] {} should be {}", self.profile, key, wanted))
    }

    fn path(&self, key: &str) -> Result<Option<PathBuf>> {
        match self.item(key) {
            None => Ok(None),
            Some(i) => i
                .as_str()
                .map(|s| Some(PathBuf::from(s)))
                .ok_or_else(|| self.wrong_type(key, "a string")),
        }
    }

    fn required_path(&self, key: &str) -> Result<PathBuf> {
        self.path(key)?
            .ok_or_else(|| Error::Config(format!("[{}] is missing {}", self.profile, key)))
    }

    fn float(&self, key: &str, default: f64) -> Result<f64> {
        match self.item(key) {
            None => Ok(default),
            Some(i) => i
                .as_float()
                .or_else(|| i.as_integer().map(|n| n as f64))
                .ok_or_else(|| self.wrong_type(key, "a number")),
        }
    }

    fn boolean(&self, key: &str, default: bool) -> Result<bool> {
        match self.item(key) {
            None => Ok(default),
            Some(i) => i.as_bool().ok_or_else(|| self.wrong_type(key, "true or false")),
        }
    }
}

/// All the profiles, with defaults suitably propagated and paths ready to use.
pub fn get_profiles(cfg: &Document) -> Result<BTreeMap<String, Profile>> {
    let cfg = cfg.as_table();

    // [DEFAULT] goes into a HashMap to avoid existence failure
    let mut defaults: HashMap<&str, &Item> = HashMap::new();
    if let Some(d) = cfg.get(DEFAULT_SECTION) {
        let d = d
            .as_table()
            .ok_or_else(|| Error::Config("[DEFAULT] should be a table".to_string()))?;
        for (key, item) in d.iter() {
            defaults.insert(key, item);
        }
    }

    let mut out = BTreeMap::new();
    for (name, section) in cfg.iter() {
        if name == DEFAULT_SECTION {
            continue;
        }
        let section = match section.as_table() {
            Some(s) => s,
            None => return Err(Error::Config(format!("`{}` should be a [section]", name))),
        };
        let l = Lookup {
            profile: name,
            section,
            defaults: &defaults,
        };
        let profile = Profile {
            name: name.to_string(),
            data_dir: l.required_path("DATA_DIR")?,
            output_dir: l.required_path("OUTPUT_DIR")?,
            concordance_dir: l.path("CONCORDANCE_DIR")?,
            ratio_tolerance: l.float("RATIO_TOLERANCE", DEFAULT_TOLERANCE)?,
            process_ratios: l.boolean("PROCESS_RATIOS", true)?,
        };
        if profile.ratio_tolerance.is_nan() || profile.ratio_tolerance < 0.0 {
            return Err(l.wrong_type("RATIO_TOLERANCE", "zero or more"));
        }
        out.insert(name.to_string(), profile);
    }
    Ok(out)
}

/// The named profile, or the only one if there is just one.
pub fn get_profile(cfg: &Document, name: Option<&str>) -> Result<Profile> {
    let mut profiles = get_profiles(cfg)?;
    match name {
        Some(n) => profiles
            .remove(n)
            .ok_or_else(|| Error::Config(format!("no profile named `{}`", n))),
        None if profiles.len() == 1 => profiles
            .into_values()
            .next()
            .ok_or_else(|| Error::Config("no profiles".to_string())),
        None => Err(Error::Config(format!(
            "choose a profile with --profile: {}",
            profiles.keys().cloned().collect::<Vec<_>>().join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CFG: &str = r#"
[DEFAULT]
DATA_DIR = "data"
OUTPUT_DIR = "out"
RATIO_TOLERANCE = 0.02

[strict]
PROCESS_RATIOS = true
CONCORDANCE_DIR = "abs"

[lenient]
OUTPUT_DIR = "out/lenient"
PROCESS_RATIOS = false
RATIO_TOLERANCE = 0
"#;

    #[test]
    fn defaults_propagate() {
        let doc = CFG.parse::<Document>().unwrap();
        let profiles = get_profiles(&doc).unwrap();
        assert_eq!(vec!["lenient", "strict"], profiles.keys().collect::<Vec<_>>());

        let strict = &profiles["strict"];
        assert_eq!(PathBuf::from("data"), strict.data_dir);
        assert_eq!(Some(PathBuf::from("abs")), strict.concordance_dir);
        assert_eq!(0.02, strict.ratio_tolerance);

        let lenient = &profiles["lenient"];
        assert_eq!(PathBuf::from("out/lenient"), lenient.output_dir);
        assert_eq!(None, lenient.concordance_dir);
        assert_eq!(
            RatioSettings {
                tolerance: 0.0,
                process: false
            },
            lenient.ratio_settings()
        );
    }

    #[test]
    fn missing_and_mistyped_keys() {
        let doc = "[p]\nOUTPUT_DIR = \"o\"\n".parse::<Document>().unwrap();
        let e = get_profiles(&doc).unwrap_err();
        assert_eq!("configuration: [p] is missing DATA_DIR", e.to_string());

        let doc = "[p]\nDATA_DIR = 3\nOUTPUT_DIR = \"o\"\n"
            .parse::<Document>()
            .unwrap();
        assert!(get_profiles(&doc).is_err());
    }

    #[test]
    fn choosing_a_profile() {
        let doc = CFG.parse::<Document>().unwrap();
        assert_eq!("strict", get_profile(&doc, Some("strict")).unwrap().name);
        assert!(get_profile(&doc, None).is_err());
        assert!(get_profile(&doc, Some("nope")).is_err());
    }

    #[test]
    fn example_parses() {
        let doc = EXAMPLE.parse::<Document>().unwrap();
        let profiles = get_profiles(&doc).unwrap();
        assert!(!profiles.is_empty());
        for p in profiles.values() {
            assert_eq!(DEFAULT_TOLERANCE, p.ratio_tolerance);
        }
    }
}
