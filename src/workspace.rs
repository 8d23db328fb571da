// Settings shared by all binaries, in the spirit of django settings.py.
// Defaults describe the QMS csv export; a yaml file passed with --config
// overrides them and the cli flags of SettingsArgs override the file.

use std::path::{Path, PathBuf};

use clap::Args;
use eyre::{bail, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::stats::Normalization;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Free-form lines written by the spectrometer before the column header
    pub header_rows: usize,
    pub delimiter: char,
    /// Keep only the latest cycles of every acquisition, `None` keeps all
    pub last_cycles: Option<usize>,
    pub normalization: Normalization,
    /// Root of the `<group>/<series>` tree walked by multi-graph
    pub data_root: PathBuf,
    pub bar_width: f64,
    pub symlog_threshold: f64,
    pub image_size: (u32, u32),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_rows: 41,
            delimiter: ';',
            last_cycles: Some(5),
            normalization: Normalization::Total,
            data_root: PathBuf::from("DATA"),
            bar_width: 0.3,
            symlog_threshold: 1.0,
            // 18.5 x 10.5 inches at 300 dpi
            image_size: (5550, 3150),
        }
    }
}

impl Settings {
    pub fn load(filepath: &Path) -> Result<Self> {
        let file = std::fs::File::open(filepath)
            .wrap_err_with(|| format!("can't open settings {}", filepath.display()))?;
        let settings: Settings = serde_yaml::from_reader(file)
            .wrap_err_with(|| format!("invalid settings {}", filepath.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter {:?} is not an ascii character", self.delimiter)
        }
        if self.last_cycles == Some(0) {
            bail!("last_cycles must be positive")
        }
        if self.bar_width <= 0.0 || self.symlog_threshold <= 0.0 {
            bail!("bar_width and symlog_threshold must be positive")
        }
        Ok(())
    }
}

/// Command line overrides shared by the binaries
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Path to the settings file in yaml format
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Keep only the last N cycles of every file
    #[arg(long)]
    pub last_cycles: Option<usize>,
    /// Use every cycle of the files
    #[arg(long, conflicts_with = "last_cycles")]
    pub all_cycles: bool,
    /// Reference for normalization: a mass in amu, `total` (or 101) for the total intensity
    #[arg(long)]
    pub norm: Option<Normalization>,
}

impl SettingsArgs {
    pub fn resolve(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(filepath) => Settings::load(filepath)?,
            None => Settings::default(),
        };

        if self.all_cycles {
            settings.last_cycles = None;
        } else if let Some(last_cycles) = self.last_cycles {
            settings.last_cycles = Some(last_cycles);
        }
        if let Some(norm) = self.norm {
            settings.normalization = norm;
        }

        settings.validate()?;
        Ok(settings)
    }
}
