//! Finding the measurement files of a folder and the folders of a data tree.

use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};

use eyre::{eyre, Result, WrapErr};
use glob::{glob_with, MatchOptions, Pattern};
use tracing::{error, info, warn};

use crate::{measurement::Measurement, workspace::Settings};

/// Plasma condition of a measurement file, told by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Condition {
    Off,
    On,
    Isolated,
}

impl Condition {
    /// Case-insensitive, `on` is checked last as it is part of many words
    pub fn classify(file_name: &str) -> Option<Condition> {
        let name = file_name.to_lowercase();
        if name.contains("off") {
            Some(Condition::Off)
        } else if ["isolé", "isole", "isolated"].iter().any(|word| name.contains(word)) {
            Some(Condition::Isolated)
        } else if name.contains("on") {
            Some(Condition::On)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Condition::Off => "plasma OFF",
            Condition::On => "plasma ON",
            Condition::Isolated => "plasma isolated",
        }
    }
}

fn natural(a: &Path, b: &Path) -> Ordering {
    natord::compare(&a.to_string_lossy(), &b.to_string_lossy())
}

fn file_name(filepath: &Path) -> String {
    filepath
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `*.csv` files of a folder in natural order
pub fn find_csv_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let folder_str = folder
        .to_str()
        .ok_or_else(|| eyre!("{} is not a valid utf-8 path", folder.display()))?;
    let pattern = format!("{}/*.csv", Pattern::escape(folder_str));
    let options = MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };

    let mut files = glob_with(&pattern, options)?
        .filter_map(|entry| match entry {
            Ok(filepath) => Some(filepath),
            Err(err) => {
                warn!("{err}");
                None
            }
        })
        .filter(|filepath| filepath.is_file())
        .collect::<Vec<_>>();
    files.sort_by(|a, b| natural(a, b));
    Ok(files)
}

/// Sub-directories of a folder in natural order
pub fn subdirectories(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = std::fs::read_dir(folder)
        .wrap_err_with(|| format!("can't list {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    dirs.sort_by(|a, b| natural(a, b));
    Ok(dirs)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionFiles {
    pub off: Option<PathBuf>,
    pub on: Option<PathBuf>,
    pub isolated: Option<PathBuf>,
}

impl ConditionFiles {
    pub fn discover(folder: &Path) -> Result<Self> {
        let mut files = ConditionFiles::default();

        for filepath in find_csv_files(folder)? {
            let Some(condition) = Condition::classify(&file_name(&filepath)) else {
                continue;
            };
            let slot = match condition {
                Condition::Off => &mut files.off,
                Condition::On => &mut files.on,
                Condition::Isolated => &mut files.isolated,
            };
            if let Some(previous) = slot.replace(filepath.clone()) {
                warn!(
                    "several {} files in {}, {} replaces {}",
                    condition.label(),
                    folder.display(),
                    file_name(&filepath),
                    file_name(&previous)
                );
            }
        }
        Ok(files)
    }

    /// Loads every discovered file, a file that fails is logged and left out
    pub fn load(&self, settings: &Settings) -> LoadedConditions {
        let load = |filepath: &Option<PathBuf>| -> Option<Measurement> {
            let filepath = filepath.as_ref()?;
            match Measurement::load(filepath, settings) {
                Ok(measurement) => {
                    info!("{} loaded", filepath.display());
                    Some(match settings.last_cycles {
                        Some(cycles) => measurement.keep_last_cycles(cycles),
                        None => measurement,
                    })
                }
                Err(err) => {
                    error!("{err:#}");
                    None
                }
            }
        };

        LoadedConditions {
            off: load(&self.off),
            on: load(&self.on),
            isolated: load(&self.isolated),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConditions {
    pub off: Option<Measurement>,
    pub on: Option<Measurement>,
    pub isolated: Option<Measurement>,
}

impl LoadedConditions {
    pub fn discover_and_load(folder: &Path, settings: &Settings) -> Result<Self> {
        Ok(ConditionFiles::discover(folder)?.load(settings))
    }

    pub fn require_on(&self) -> Result<&Measurement> {
        self.on.as_ref().ok_or_else(|| eyre!("no file with 'on' found"))
    }

    pub fn require_off(&self) -> Result<&Measurement> {
        self.off.as_ref().ok_or_else(|| eyre!("no file with 'off' found"))
    }

    pub fn require_isolated(&self) -> Result<&Measurement> {
        self.isolated.as_ref().ok_or_else(|| eyre!("no file with 'isolé' found"))
    }
}

/// `<root>/<group>/<series>` folder of the data tree
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFolder {
    pub group: String,
    pub path: PathBuf,
}

impl SeriesFolder {
    /// Images of a series are named after its group and written next to the data
    pub fn output_prefix(&self) -> String {
        self.path.join(&self.group).to_string_lossy().into_owned()
    }
}

pub fn measurement_folders(root: &Path) -> Result<Vec<SeriesFolder>> {
    let mut folders = vec![];
    for group in subdirectories(root)? {
        let group_name = file_name(&group);
        for series in subdirectories(&group)? {
            folders.push(SeriesFolder {
                group: group_name.clone(),
                path: series,
            });
        }
    }
    Ok(folders)
}

/// Deletes every file of a folder that is not a png image, returns how many went
pub fn remove_non_png(folder: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(folder)? {
        let filepath = entry?.path();
        let is_png = filepath
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("png"));
        if !filepath.is_file() || is_png {
            continue;
        }
        match std::fs::remove_file(&filepath) {
            Ok(()) => removed += 1,
            Err(err) => error!("error deleting {}: {err}", filepath.display()),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture_dir, qms_csv, write_into};

    #[test]
    fn classifies_names() {
        assert_eq!(Condition::classify("14.03.25_Plasma_OFF.csv"), Some(Condition::Off));
        assert_eq!(Condition::classify("plasma oN 2.csv"), Some(Condition::On));
        assert_eq!(Condition::classify("Isolé.csv"), Some(Condition::Isolated));
        assert_eq!(Condition::classify("condition_isole.csv"), Some(Condition::Isolated));
        assert_eq!(Condition::classify("blank.csv"), None);
    }

    #[test]
    fn discovers_condition_files() {
        let tmp = fixture_dir();
        let dir = tmp.path();
        write_into(dir, "run_off.csv", "");
        write_into(dir, "run_on_1.csv", "");
        write_into(dir, "run_on_10.csv", "");
        write_into(dir, "run_on_2.csv", "");
        write_into(dir, "notes.txt", "");

        let csv = find_csv_files(dir).unwrap();
        assert_eq!(csv.len(), 4);
        assert!(csv[1].ends_with("run_on_1.csv"));
        assert!(csv[3].ends_with("run_on_10.csv"));

        let files = ConditionFiles::discover(dir).unwrap();
        assert!(files.off.unwrap().ends_with("run_off.csv"));
        assert!(files.on.unwrap().ends_with("run_on_10.csv"));
        assert_eq!(files.isolated, None);
    }

    #[test]
    fn broken_files_are_left_out() {
        let tmp = fixture_dir();
        let dir = tmp.path();
        let cycles = [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        write_into(dir, "a_on.csv", &qms_csv(&[1.0, 2.0], &cycles));
        write_into(dir, "a_off.csv", "too short");

        let settings = Settings {
            last_cycles: Some(2),
            ..Default::default()
        };
        let loaded = LoadedConditions::discover_and_load(dir, &settings).unwrap();
        assert_eq!(loaded.require_on().unwrap().samples.len(), 4);
        assert!(loaded.require_off().is_err());
        assert!(loaded.require_isolated().is_err());
    }

    #[test]
    fn walks_the_data_tree() {
        let tmp = fixture_dir();
        let root = tmp.path();
        write_into(root, "gas_b/day_1/x_on.csv", "");
        write_into(root, "gas_a/day_10/x_on.csv", "");
        write_into(root, "gas_a/day_2/x_on.csv", "");
        write_into(root, "gas_a/readme.txt", "");

        let folders = measurement_folders(root).unwrap();
        let names = folders
            .iter()
            .map(|folder| folder.path.strip_prefix(root).unwrap().to_path_buf())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                PathBuf::from("gas_a/day_2"),
                PathBuf::from("gas_a/day_10"),
                PathBuf::from("gas_b/day_1")
            ]
        );
        assert_eq!(
            folders[0].output_prefix(),
            root.join("gas_a/day_2/gas_a").to_string_lossy()
        );
    }

    #[test]
    fn removes_everything_but_images() {
        let tmp = fixture_dir();
        let dir = tmp.path();
        write_into(dir, "a_on.csv", "");
        write_into(dir, "a-raw.png", "");
        write_into(dir, "b.PNG", "");
        write_into(dir, "sub/keep.csv", "");

        assert_eq!(remove_non_png(dir).unwrap(), 1);
        assert!(dir.join("a-raw.png").exists());
        assert!(dir.join("b.PNG").exists());
        assert!(dir.join("sub/keep.csv").exists());
        assert!(!dir.join("a_on.csv").exists());
    }
}
