// Comparison of the plasma ON / OFF spectra of one folder.
// Every requested processing mode gives two images: the mean spectra with
// their 2 sigma error bars and the ON - OFF difference.

use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use tracing::info;

use qms_analysis::{
    comparison::Mode, default_prefix, folder::LoadedConditions, html_modes, init_logging, render_modes,
    workspace::SettingsArgs,
};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Arg {
    /// Folder with the plasma ON and OFF csv files
    pub folder: PathBuf,
    /// Processing mode, 1 to 6 (repeatable), every mode by default
    #[arg(long = "mode", value_parser = clap::value_parser!(u8).range(1..=6))]
    pub modes: Vec<u8>,
    /// Prefix of the produced images, `<folder>/<folder name>` by default
    #[arg(long)]
    pub prefix: Option<String>,
    /// Also write an interactive html chart per mode
    #[arg(long)]
    pub html: bool,
    #[command(flatten)]
    pub settings: SettingsArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Arg::parse();
    let settings = args.settings.resolve()?;

    let modes = if args.modes.is_empty() {
        Mode::ALL.to_vec()
    } else {
        args.modes.iter().map(|number| Mode::from_number(*number)).collect::<Result<Vec<_>>>()?
    };
    let prefix = args.prefix.clone().unwrap_or_else(|| default_prefix(&args.folder));

    let loaded = LoadedConditions::discover_and_load(&args.folder, &settings)?;
    let images = render_modes(&loaded, &prefix, &modes, &settings)?;
    info!("{} images written", images.len());

    if args.html {
        let pages = html_modes(&loaded, &prefix, &modes, &settings)?;
        info!("{} html charts written", pages.len());
    }
    Ok(())
}
