use std::path::{Path, PathBuf};

use eyre::{bail, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use comparison::{Comparison, Mode};
use folder::{find_csv_files, remove_non_png, LoadedConditions, SeriesFolder};
use render::ChartStyle;
use workspace::Settings;

pub mod comparison;
pub mod folder;
pub mod measurement;
pub mod render;
pub mod report;
pub mod stats;

pub mod workspace;

#[cfg(test)]
mod testing;

/// Logs to stderr, level taken from RUST_LOG (info by default)
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prefix of the images of a folder: `<folder>/<folder name>`
pub fn default_prefix(folder: &Path) -> String {
    let name = folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spectrum".to_owned());
    folder.join(name).to_string_lossy().into_owned()
}

/// Draws both charts of every mode. A failing mode is logged and skipped.
pub fn render_modes(
    loaded: &LoadedConditions,
    prefix: &str,
    modes: &[Mode],
    settings: &Settings,
) -> Result<Vec<PathBuf>> {
    let on = loaded.require_on()?;
    let off = loaded.require_off()?;
    let style = ChartStyle::from(settings);
    let stem = on.stem();

    let mut written = vec![];
    for mode in modes {
        let result = Comparison::compute(on, off, None, *mode, settings.normalization).and_then(|comparison| {
            render::draw_both(prefix, &stem, &comparison, "Mean mass spectrometry", &style)
        });
        match result {
            Ok(mut images) => written.append(&mut images),
            Err(err) => error!("mode {} ({}) failed for {prefix}: {err:#}", mode.number(), mode.label()),
        }
    }
    Ok(written)
}

/// Interactive html chart of every mode, a failing mode is logged and skipped
pub fn html_modes(
    loaded: &LoadedConditions,
    prefix: &str,
    modes: &[Mode],
    settings: &Settings,
) -> Result<Vec<PathBuf>> {
    let on = loaded.require_on()?;
    let off = loaded.require_off()?;
    let stem = on.stem();

    let mut written = vec![];
    for mode in modes {
        let filepath = PathBuf::from(format!("{prefix}{}{stem}.html", mode.suffix()));
        let result = Comparison::compute(on, off, None, *mode, settings.normalization).and_then(|comparison| {
            report::write_html(&comparison, &format!("Mean mass spectrometry, {}", mode.label()), &filepath)
        });
        match result {
            Ok(()) => written.push(filepath),
            Err(err) => error!("mode {} ({}) html failed for {prefix}: {err:#}", mode.number(), mode.label()),
        }
    }
    Ok(written)
}

/// Loads the ON / OFF files of a folder and draws the requested modes.
/// Fails unless every mode was drawn.
pub fn plot_folder(folder: &Path, prefix: &str, modes: &[Mode], settings: &Settings) -> Result<Vec<PathBuf>> {
    let loaded = LoadedConditions::discover_and_load(folder, settings)?;
    let written = render_modes(&loaded, prefix, modes, settings)?;
    info!("{}: {} images written", folder.display(), written.len());
    if written.len() != 2 * modes.len() {
        bail!(
            "{}: only {} of {} images written",
            folder.display(),
            written.len(),
            2 * modes.len()
        )
    }
    Ok(written)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesOutcome {
    /// No csv file in the folder
    Skipped,
    Plotted { images: usize, removed: usize },
}

/// One series of the data tree: every mode, then the sources are removed on request
pub fn process_series(series: &SeriesFolder, settings: &Settings, remove_sources: bool) -> Result<SeriesOutcome> {
    if find_csv_files(&series.path)?.is_empty() {
        return Ok(SeriesOutcome::Skipped);
    }
    let images = plot_folder(&series.path, &series.output_prefix(), &Mode::ALL, settings)?;
    let removed = if remove_sources {
        remove_non_png(&series.path)?
    } else {
        0
    };
    Ok(SeriesOutcome::Plotted {
        images: images.len(),
        removed,
    })
}
