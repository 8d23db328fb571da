// Batch version of onoff-spectrum: every `<root>/<group>/<series>` folder
// gets the images of all six modes, named after its group.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use eyre::Result;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use qms_analysis::{
    folder::measurement_folders, init_logging, process_series, workspace::SettingsArgs, SeriesOutcome,
};

#[cfg(target_family = "unix")]
use tikv_jemallocator::Jemalloc;
#[cfg(target_family = "unix")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Arg {
    /// Root of the data tree, `data_root` of the settings by default
    pub root: Option<PathBuf>,
    /// Delete everything but the png images of a series once it is plotted
    #[arg(long)]
    pub remove_sources: bool,
    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[tokio::main(worker_threads = 4)]
async fn main() -> Result<()> {
    init_logging();
    let args = Arg::parse();
    let settings = Arc::new(args.settings.resolve()?);
    let root = args.root.clone().unwrap_or_else(|| settings.data_root.clone());

    let folders = measurement_folders(&root)?;
    info!("{} series found in {}", folders.len(), root.display());

    let pb = indicatif::ProgressBar::new(folders.len() as u64);
    pb.set_style(
        indicatif::ProgressStyle::with_template("[{elapsed_precise}] {bar} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
    );
    let pb = Arc::new(Mutex::new(pb));

    let handles = folders
        .into_iter()
        .map(|series| {
            let settings = Arc::clone(&settings);
            let pb = Arc::clone(&pb);
            let remove_sources = args.remove_sources;

            tokio::spawn(async move {
                let path = series.path.clone();
                let group = series.group.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || process_series(&series, &settings, remove_sources)).await;
                match outcome {
                    Ok(Ok(SeriesOutcome::Skipped)) => warn!("{}: no csv file, skipped", path.display()),
                    Ok(Ok(SeriesOutcome::Plotted { images, removed })) => {
                        info!("{}: {images} images, {removed} source files removed", path.display())
                    }
                    Ok(Err(err)) => error!("{}: {err:#}", path.display()),
                    Err(err) => error!("{}: {err}", path.display()),
                }
                let pb = pb.lock().await;
                pb.set_message(group);
                pb.inc(1);
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.await?;
    }
    pb.lock().await.finish();
    Ok(())
}
