// Per-mass table of a folder: means, 2 sigma uncertainties, ON - OFF and
// whether ON stays above OFF. Tab separated by default, json on request.

use std::path::PathBuf;

use clap::Parser;
use eyre::Result;

use qms_analysis::{
    comparison::{Comparison, Mode},
    folder::LoadedConditions,
    init_logging,
    report::SpectrumTable,
    workspace::SettingsArgs,
};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Arg {
    /// Folder with the plasma ON and OFF (and optionally isolated) csv files
    pub folder: PathBuf,
    /// Processing mode, 1 to 6
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(1..=6))]
    pub mode: u8,
    /// Write json instead of tab separated values
    #[arg(long)]
    pub json: bool,
    /// Use a decimal comma in the tab separated output
    #[arg(long, conflicts_with = "json")]
    pub decimal_comma: bool,
    /// Output file, stdout by default
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub settings: SettingsArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Arg::parse();
    let settings = args.settings.resolve()?;

    let loaded = LoadedConditions::discover_and_load(&args.folder, &settings)?;
    let comparison = Comparison::compute(
        loaded.require_on()?,
        loaded.require_off()?,
        loaded.isolated.as_ref(),
        Mode::from_number(args.mode)?,
        settings.normalization,
    )?;

    let table = SpectrumTable::from_comparison(&comparison)?;
    let text = if args.json {
        table.to_json()?
    } else {
        table.to_tsv(args.decimal_comma)
    };

    match &args.output {
        Some(filepath) => std::fs::write(filepath, text)?,
        None => print!("{text}"),
    }
    Ok(())
}
