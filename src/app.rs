//! The main app logic: argument structs and the top-level functions behind each subcommand.

use std::fs::File;
use std::io::{stdout, Write};
use std::path::{Path, PathBuf};

use ausvotes::boundaries::{self, CsvConcordances, RatioSettings, DEFAULT_TOLERANCE};
use ausvotes::cache::DatasetCache;
use ausvotes::combine::combine;
use ausvotes::config::{self, Profile};
use ausvotes::data::{self, HttpFetch, LocalFiles, ReferenceIndex};
use ausvotes::diag::Diagnostics;
use ausvotes::harmonise::{harmonise, Family};
use ausvotes::table::Table;
use ausvotes::utils::open_csvz_from_path;
use clap::{AppSettings, Parser, Subcommand, ValueHint};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use color_eyre::eyre::{bail, Context, ContextCompat, Result};
use tabwriter::TabWriter;
use tracing::info;

/// Cease all formatting
const END: &str = "\u{1b}[0m";

/// Bold text
const BOLD: &str = "\u{1b}[1m";

#[derive(Parser, Debug)]
#[clap(version, about)]
#[clap(global_setting(AppSettings::PropagateVersion))]
#[clap(global_setting(AppSettings::UseLongFormatForHelpSubcommand))]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    // We have an enum inside the struct to allow for global options here...
    #[clap(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CliCommands {
    Harmonise(CliHarmonise),
    Retrieve(CliRetrieve),
    Combine(CliCombine),
    Crosswalk(CliCrosswalk),
    VerifyRatios(CliVerifyRatios),
    Reaggregate(CliReaggregate),
    #[clap(subcommand)]
    Data(CliData),
    List(CliList),
    Profiles(CliProfiles),
    /// Print an example configuration file (TOML format)
    Example,
}

/// Harmonise one raw file from a single event to its family's canonical columns.
#[derive(Parser, Debug, PartialEq)]
#[clap(
    after_help = "Events the family has no layout for are passed through unchanged, with a warning."
)]
pub struct CliHarmonise {
    /// Which kind of dataset this is
    #[clap(long, arg_enum)]
    pub family: Family,

    /// The event, as named in `ausvotes list` (e.g. "2019 Federal Election")
    #[clap(long)]
    pub event: String,

    /// Polling day (YYYY-MM-DD), if the event isn't in the reference index
    #[clap(long)]
    pub date: Option<String>,

    /// Title lines above the real header
    #[clap(long, default_value_t = 0)]
    pub skip: usize,

    /// Raw CSV (or zipped CSV) file
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output file: CSV, or JSON if it ends in .json
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

/// Fetch, harmonise and combine a family of datasets across several events.
#[derive(Parser, Debug, PartialEq)]
pub struct CliRetrieve {
    /// Which kind of dataset to retrieve
    #[clap(long, arg_enum)]
    pub family: Family,

    /// An event to include (can be given multiple times)
    #[clap(long, short, required = true)]
    pub event: Vec<String>,

    /// Download from the AEC instead of reading the data directory
    #[clap(long)]
    pub online: bool,

    /// Directory of downloaded files (overrides the profile's DATA_DIR)
    #[clap(long, parse(from_os_str), value_hint = ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file
    #[clap(long, short, parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Profile (section) of the configuration file to use
    #[clap(long, short)]
    pub profile: Option<String>,

    /// Output file: CSV, or JSON if it ends in .json. Defaults to the profile's OUTPUT_DIR.
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

/// Stack already-harmonised files into one table, reconciling column types.
#[derive(Parser, Debug, PartialEq)]
pub struct CliCombine {
    /// shell-style expression to filter input filenames from directory
    #[clap(long, default_value_t = String::from("*.csv"))]
    pub filter: String,

    /// input directory
    #[clap(parse(from_os_str), value_hint = ValueHint::DirPath)]
    pub input: PathBuf,

    /// Output file: CSV, or JSON if it ends in .json
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

/// Build the SA1 concordance that takes an event's results onto another event's divisions or a census's SA1s.
#[derive(Parser, Debug, PartialEq)]
#[clap(
    after_help = "Concordance files are read from CONCORDANCE_DIR, named like sa1_2011_sa1_2016.csv. Their first three columns should be: source code, target code, ratio."
)]
pub struct CliCrosswalk {
    /// The event whose results are to be moved
    #[clap(long)]
    pub event: String,

    /// Another event (its divisions), or a census like "2021 Census" (its SA1s)
    #[clap(long)]
    pub compare_to: String,

    /// Directory of concordance files (overrides the profile's CONCORDANCE_DIR)
    #[clap(long, parse(from_os_str), value_hint = ValueHint::DirPath)]
    pub concordance_dir: Option<PathBuf>,

    /// Configuration file
    #[clap(long, short, parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Profile (section) of the configuration file to use
    #[clap(long, short)]
    pub profile: Option<String>,

    /// Output file: CSV, or JSON if it ends in .json
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

/// Check that every group's ratios sum to 1.
#[derive(Parser, Debug, PartialEq)]
pub struct CliVerifyRatios {
    /// Column to group by
    #[clap(long)]
    pub group: String,

    /// Column holding the ratios
    #[clap(long, default_value_t = String::from("ratio"))]
    pub ratio: String,

    /// How far from 1 a group may be
    #[clap(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Keep groups outside tolerance (with a warning) rather than removing them
    #[clap(long)]
    pub keep: bool,

    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output file: CSV, or JSON if it ends in .json
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

/// Move values from one geography to another along a crosswalk.
#[derive(Parser, Debug, PartialEq)]
pub struct CliReaggregate {
    /// Crosswalk file, as written by `ausvotes crosswalk`
    #[clap(long, parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub crosswalk: PathBuf,

    /// Column of INPUT holding the source codes
    #[clap(long)]
    pub key: String,

    /// A column of INPUT to move (can be given multiple times)
    #[clap(long = "value", required = true)]
    pub values: Vec<String>,

    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output file: CSV, or JSON if it ends in .json
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

/// Either download all published AEC data directly, or examine the URLs to the relevant files.
#[derive(Parser, Debug, PartialEq)]
#[allow(non_snake_case)]
#[clap(
    after_help = "Only datasets the reference index has a URL for are downloaded. Boundary and concordance files come from the ABS and need fetching by hand."
)]
pub enum CliData {
    /// download everything to specified folder
    Download {
        #[clap(value_hint = ValueHint::DirPath)]
        #[clap(parse(from_os_str))]
        DL_FOLDER: PathBuf,
    },
    /// write the list of downloads to FILE as tab-separated text, or to stdout if no file is specified
    Examine {
        #[clap(value_hint = ValueHint::FilePath)]
        #[clap(parse(from_os_str))]
        FILE: Option<PathBuf>,
    },
}

/// List the datasets in the reference index.
#[derive(Parser, Debug, PartialEq)]
#[clap(
    after_help = "Tables are printed to standard output. If that's a terminal, they'll be pretty-printed with elastic tabstops. If that's a pipe or file, they'll be tab-separated to make further processing as straightforward as possible."
)]
pub struct CliList {
    /// Only list this family
    #[clap(long, arg_enum)]
    pub family: Option<Family>,
}

/// List profiles from the configuration file.
#[derive(Parser, Debug, PartialEq)]
pub struct CliProfiles {
    /// The configuration file to list profiles from
    #[clap(parse(from_os_str), value_hint = ValueHint::FilePath)]
    pub configfile: PathBuf,
}

/// Whether `path` asks for JSON output.
fn wants_json(path: &Path) -> bool {
    path.extension()
        .map_or(false, |e| e.eq_ignore_ascii_case("json"))
}

/// Writes `table` as CSV, or as JSON records if `path` ends in `.json`.
pub fn write_table(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let outfile = File::create(path)
        .with_context(|| format!("Couldn't create output file {}", path.display()))?;
    if wants_json(path) {
        serde_json::to_writer_pretty(outfile, &table.to_json())?;
    } else {
        table.write_csv(outfile)?;
    }
    info!("wrote {} rows to {}", table.nrows(), path.display());
    Ok(())
}

fn read_table(path: &Path) -> Result<Table> {
    let rdr = open_csvz_from_path(path)
        .with_context(|| format!("Couldn't open {}", path.display()))?;
    Table::from_csv(rdr).with_context(|| format!("Couldn't read {}", path.display()))
}

/// The requested profile, if a configuration file was given.
fn load_profile(cfgpath: Option<&Path>, name: Option<&str>) -> Result<Option<Profile>> {
    match cfgpath {
        None if name.is_some() => bail!("--profile needs a configuration file (--config)"),
        None => Ok(None),
        Some(p) => {
            let doc = config::get_cfg_doc_from_path(p)?;
            Ok(Some(config::get_profile(&doc, name)?))
        }
    }
}

/// Prints `rows` under `headers`, aligned and bold-headed on a terminal.
fn print_aligned(headers: &str, rows: &[String]) -> Result<()> {
    if atty::is(atty::Stream::Stdout) {
        let mut tw = TabWriter::new(vec![]);
        writeln!(&mut tw, "{}", headers)?;
        for i in rows {
            writeln!(&mut tw, "{}", i)?;
        }
        tw.flush()?;
        let output = String::from_utf8(tw.into_inner().ok().context("could not align output")?)?;
        let firstnewline = output.find('\n').context("no header line")?;
        let hline = &output[0..firstnewline];
        let rline = &output[firstnewline..];
        print!("{}{}{}{}", BOLD, hline, END, rline);
    } else {
        println!("{}", headers);
        for i in rows {
            println!("{}", i);
        }
    }
    Ok(())
}

/// Performs the `harmonise` subcommand.
pub fn do_harmonise(args: CliHarmonise) -> Result<()> {
    let index = ReferenceIndex::builtin()?;
    let date = match (args.date, index.event(&args.event)) {
        (Some(d), _) => d,
        (None, Some(info)) => info.date.clone(),
        (None, None) => bail!(
            "`{}` isn't in the reference index; give its polling day with --date",
            args.event
        ),
    };

    let rdr = open_csvz_from_path(&args.input)
        .with_context(|| format!("Couldn't open {}", args.input.display()))?;
    let raw = Table::from_csv_skipping(rdr, args.skip)?;
    let raw = data::stamp(raw, &date, &args.event)?;

    let mut diag = Diagnostics::new();
    let out = harmonise(args.family, raw, &args.event, &mut diag)
        .with_context(|| format!("Could not harmonise {}", args.input.display()))?;
    write_table(&out, &args.output)
}

/// Performs the `retrieve` subcommand.
pub fn do_retrieve(args: CliRetrieve) -> Result<()> {
    let profile = load_profile(args.config.as_deref(), args.profile.as_deref())?;
    let index = ReferenceIndex::builtin()?;

    let output = match (args.output, &profile) {
        (Some(o), _) => o,
        (None, Some(p)) => p.output_dir.join(format!("{}.csv", args.family.id())),
        (None, None) => bail!("Give an output file, or a configuration file with OUTPUT_DIR"),
    };

    let mut cache = DatasetCache::new();
    let mut diag = Diagnostics::new();
    let table = if args.online {
        data::retrieve(&index, args.family, &args.event, &HttpFetch, &mut cache, &mut diag)?
    } else {
        let dir = args
            .data_dir
            .or_else(|| profile.map(|p| p.data_dir))
            .context("Give a data directory with --data-dir, or a configuration file with DATA_DIR")?;
        let local = LocalFiles { dir };
        data::retrieve(&index, args.family, &args.event, &local, &mut cache, &mut diag)?
    };
    write_table(&table, &output)
}

/// Performs the `combine` subcommand.
pub fn do_combine(args: CliCombine) -> Result<()> {
    if !args.input.is_dir() {
        bail!("{} is not a directory", args.input.display());
    }
    let query = args.input.join(&args.filter);
    let query = query.to_str().context("Path conversion error")?;
    let mut paths: Vec<PathBuf> = glob::glob(query)?
        .filter_map(std::result::Result::ok)
        .collect();
    paths.sort();
    // don't read our own output back in
    paths.retain(|p| *p != args.output);
    if paths.is_empty() {
        bail!("Nothing in {} matches {}", args.input.display(), args.filter);
    }

    let tables = paths
        .iter()
        .map(|p| read_table(p))
        .collect::<Result<Vec<_>>>()?;
    let mut diag = Diagnostics::new();
    let out = combine(tables, &mut diag).context("Could not combine tables")?;
    write_table(&out, &args.output)
}

/// Performs the `crosswalk` subcommand.
pub fn do_crosswalk(args: CliCrosswalk) -> Result<()> {
    let profile = load_profile(args.config.as_deref(), args.profile.as_deref())?;
    let index = ReferenceIndex::builtin()?;

    // fails fast, before any file is touched
    let plan = boundaries::plan(&index, &args.event, &args.compare_to)?;

    let settings = profile
        .as_ref()
        .map_or_else(RatioSettings::default, Profile::ratio_settings);
    let dir = args
        .concordance_dir
        .or_else(|| profile.and_then(|p| p.concordance_dir))
        .context("Give a concordance directory with --concordance-dir, or a configuration file with CONCORDANCE_DIR")?;

    let mut diag = Diagnostics::new();
    let crosswalk = boundaries::build_crosswalk(&plan, &CsvConcordances { dir }, settings, &mut diag)?;
    write_table(&crosswalk, &args.output)
}

/// Performs the `verify-ratios` subcommand.
pub fn do_verify_ratios(args: CliVerifyRatios) -> Result<()> {
    if args.tolerance.is_nan() || args.tolerance < 0.0 {
        bail!("--tolerance should be zero or more");
    }
    let table = read_table(&args.input)?;
    let settings = RatioSettings {
        tolerance: args.tolerance,
        process: !args.keep,
    };
    let mut diag = Diagnostics::new();
    let report = boundaries::verify_ratios(table, &args.group, &args.ratio, settings, &mut diag)?;
    eprintln!(
        "{} groups; {} outside tolerance; {} removed",
        report.groups, report.out_of_tolerance, report.removed
    );
    write_table(&report.table, &args.output)
}

/// Performs the `reaggregate` subcommand.
pub fn do_reaggregate(args: CliReaggregate) -> Result<()> {
    let values = read_table(&args.input)?;
    let crosswalk = boundaries::read_crosswalk(&args.crosswalk)
        .with_context(|| format!("Couldn't read crosswalk {}", args.crosswalk.display()))?;
    let value_cols: Vec<&str> = args.values.iter().map(String::as_str).collect();
    let out = boundaries::reaggregate(&values, &crosswalk, &args.key, &value_cols)?;
    write_table(&out, &args.output)
}

/// this function handles `ausvotes list`
pub fn list_datasets(args: CliList) -> Result<()> {
    let index = ReferenceIndex::builtin()?;
    let headers = "Family\tEvent\tPolling Day\tFile\tOnline";
    let mut output = Vec::new();
    for d in &index.datasets {
        if args.family.map_or(false, |f| f != d.family) {
            continue;
        }
        let date = index.event(&d.event).map_or("?", |e| e.date.as_str());
        let online = if d.url.is_some() { "yes" } else { "no" };
        output.push(format!("{}\t{}\t{}\t{}\t{}", d.family, d.event, date, d.file, online));
    }
    print_aligned(headers, &output)
}

/// this function handles `ausvotes profiles`
pub fn list_profiles(args: CliProfiles) -> Result<()> {
    let doc = config::get_cfg_doc_from_path(&args.configfile)?;
    let headers = "Profile\tData\tOutput\tConcordances\tTolerance\tProcess Ratios";
    let output: Vec<String> = config::get_profiles(&doc)?
        .values()
        .map(|p| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                p.name,
                p.data_dir.display(),
                p.output_dir.display(),
                p.concordance_dir
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |d| d.display().to_string()),
                p.ratio_tolerance,
                p.process_ratios
            )
        })
        .collect();
    print_aligned(headers, &output)
}

/// Performs the `data` subcommands.
pub fn do_data(args: CliData) -> Result<()> {
    let index = ReferenceIndex::builtin()?;
    match args {
        CliData::Download { DL_FOLDER } => {
            let skips = data::download(&index, &DL_FOLDER)
                .context("Could not download everything; stopping.")?;
            if skips > 0 {
                eprintln!("{} files were already present and were skipped.", skips);
            }
        }
        CliData::Examine { FILE } => match FILE {
            Some(f) => {
                let mut outfile = File::create(&f)
                    .with_context(|| format!("Couldn't create {}", f.display()))?;
                data::examine(&index, &mut outfile)?;
            }
            None => data::examine(&index, &mut stdout().lock())?,
        },
    }
    Ok(())
}

/// Does the top-level command.
pub fn actual(m: Cli) -> Result<()> {
    use CliCommands::*;
    match m.command {
        Harmonise(sm) => do_harmonise(sm)?,
        Retrieve(sm) => do_retrieve(sm)?,
        Combine(sm) => do_combine(sm)?,
        Crosswalk(sm) => do_crosswalk(sm)?,
        VerifyRatios(sm) => do_verify_ratios(sm)?,
        Reaggregate(sm) => do_reaggregate(sm)?,
        Data(sm) => do_data(sm)?,
        List(sm) => list_datasets(sm)?,
        Profiles(sm) => list_profiles(sm)?,
        Example => print!("{}", config::EXAMPLE),
    }
    Ok(())
}
