// Plasma ON / OFF spectra of one folder with the isolated plasma measurement
// (instrument background) drawn over them. Raw intensities only.

use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use tracing::info;

use qms_analysis::{
    comparison::{Comparison, Mode},
    default_prefix,
    folder::LoadedConditions,
    init_logging,
    render::{draw_both, ChartStyle},
    stats::Scale,
    workspace::SettingsArgs,
};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Arg {
    /// Folder with the plasma ON, OFF and isolated csv files
    pub folder: PathBuf,
    /// Zero the points whose uncertainty exceeds their mean
    #[arg(long)]
    pub usable: bool,
    /// Prefix of the produced images, `<folder>/<folder name>` by default
    #[arg(long)]
    pub prefix: Option<String>,
    #[command(flatten)]
    pub settings: SettingsArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Arg::parse();
    let settings = args.settings.resolve()?;
    let prefix = args.prefix.clone().unwrap_or_else(|| default_prefix(&args.folder));

    let loaded = LoadedConditions::discover_and_load(&args.folder, &settings)?;
    let on = loaded.require_on()?;
    let off = loaded.require_off()?;
    let isolated = loaded.require_isolated()?;

    let mode = Mode { scale: Scale::Raw, usable_only: args.usable };
    let mut comparison = Comparison::compute(on, off, Some(isolated), mode, settings.normalization)?;
    comparison.clamp_uncertainties();

    let significant = comparison
        .masses()
        .iter()
        .zip(comparison.significance()?)
        .filter(|(_, significant)| *significant)
        .map(|(mass, _)| format!("{mass}"))
        .collect::<Vec<_>>();
    info!("masses significantly above OFF: [{}]", significant.join(", "));

    let images = draw_both(&prefix, &on.stem(), &comparison, "Mean mass spectrometry", &ChartStyle::from(&settings))?;
    for image in images {
        println!("{}", image.display());
    }
    Ok(())
}
