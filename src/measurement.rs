//! Reading of QMS csv exports.
//!
//! An export is a preamble of `header_rows` free-form lines, a header line and
//! one row per (cycle, mass) sample. Masses are scanned in the same order in
//! every cycle, so a cycle is recognised by the first repetition of the first
//! mass.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, Trim};
use eyre::{bail, eyre, Result, WrapErr};
use tracing::{debug, warn};

use crate::workspace::Settings;

const CYCLE_COLUMN: &str = "Cycle";
const MASS_COLUMN: &str = "mass amu";
const INTENSITY_COLUMN: &str = "SEM c/s";
// positions used by exports whose header is localized
const MASS_FALLBACK: usize = 3;
const INTENSITY_FALLBACK: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cycle: u32,
    pub mass: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone)]
pub struct Measurement {
    pub source: PathBuf,
    pub samples: Vec<Sample>,
}

impl Measurement {
    pub fn load(filepath: &Path, settings: &Settings) -> Result<Self> {
        let file = File::open(filepath)
            .wrap_err_with(|| format!("can't open {}", filepath.display()))?;
        Self::from_reader(BufReader::new(file), filepath, settings)
    }

    pub fn from_reader<R: BufRead>(mut reader: R, source: &Path, settings: &Settings) -> Result<Self> {
        // the preamble is not always valid utf-8, skip it as raw bytes
        let mut line = vec![];
        for _ in 0..settings.header_rows {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                bail!("{} ends inside the {} line preamble", source.display(), settings.header_rows)
            }
        }

        let mut csv_reader = ReaderBuilder::new()
            .delimiter(settings.delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .byte_headers()
            .wrap_err_with(|| format!("can't read the header of {}", source.display()))?
            .iter()
            .map(|header| String::from_utf8_lossy(header).into_owned())
            .collect::<Vec<_>>();

        let column = |name: &str| headers.iter().position(|header| header == name);
        let cycle_idx = column(CYCLE_COLUMN)
            .ok_or_else(|| eyre!("missing '{CYCLE_COLUMN}' column in {}", source.display()))?;
        let mass_idx = column(MASS_COLUMN).unwrap_or(MASS_FALLBACK);
        let intensity_idx = column(INTENSITY_COLUMN).unwrap_or(INTENSITY_FALLBACK);

        let mut samples = vec![];
        for record in csv_reader.byte_records() {
            let record = record.wrap_err_with(|| format!("malformed row in {}", source.display()))?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            let line = record.position().map_or(0, |pos| pos.line());
            let cell = |idx: usize| {
                record
                    .get(idx)
                    .map(String::from_utf8_lossy)
                    .ok_or_else(|| eyre!("{}:{line} has no column #{idx}", source.display()))
            };

            let cycle = cell(cycle_idx)?
                .parse::<u32>()
                .wrap_err_with(|| format!("{}:{line} has an invalid cycle", source.display()))?;
            let mass = parse_mass(&cell(mass_idx)?)
                .ok_or_else(|| eyre!("{}:{line} has an invalid mass", source.display()))?;
            let intensity = parse_intensity(&cell(intensity_idx)?);

            samples.push(Sample { cycle, mass, intensity });
        }

        if samples.is_empty() {
            bail!("{} has no data rows", source.display())
        }
        debug!("{} samples read from {}", samples.len(), source.display());

        Ok(Measurement {
            source: source.to_owned(),
            samples,
        })
    }

    /// File name without extension, used to name the produced images
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Number of samples in one cycle
    pub fn cycle_size(&self) -> Result<usize> {
        let first = self
            .samples
            .first()
            .ok_or_else(|| eyre!("{} is empty", self.source.display()))?
            .mass;

        self.samples
            .iter()
            .skip(1)
            .position(|sample| sample.mass == first)
            .map(|idx| idx + 1)
            .ok_or_else(|| eyre!("unable to detect the start of the second cycle in {}", self.source.display()))
    }

    /// Number of complete cycles
    pub fn cycles(&self) -> Result<usize> {
        Ok(self.samples.len() / self.cycle_size()?)
    }

    /// Keeps the samples of the last `n` cycles
    pub fn keep_last_cycles(&self, n: usize) -> Measurement {
        let max_cycle = self.samples.iter().map(|sample| sample.cycle).max().unwrap_or(0);
        let threshold = max_cycle as i64 - n as i64;
        Measurement {
            source: self.source.clone(),
            samples: self
                .samples
                .iter()
                .filter(|sample| sample.cycle as i64 > threshold)
                .copied()
                .collect(),
        }
    }

    /// Masses and intensities of the `num`-th cycle (counted from 0)
    pub fn cycle(&self, num: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        let size = self.cycle_size()?;
        let cycle = self
            .samples
            .get(num * size..(num + 1) * size)
            .ok_or_else(|| eyre!("{} has no cycle #{num}", self.source.display()))?;
        Ok(cycle.iter().map(|sample| (sample.mass, sample.intensity)).unzip())
    }

    pub fn masses(&self) -> Result<Vec<f64>> {
        Ok(self.cycle(0)?.0)
    }

    /// Row of an integer mass inside a cycle
    pub fn mass_index(&self, mass: u16) -> Result<usize> {
        self.masses()?
            .iter()
            .position(|value| value.round() == mass as f64)
            .ok_or_else(|| eyre!("mass {mass} not found in the cycle of {}", self.source.display()))
    }

    /// Intensities as `[mass][cycle]`, a trailing incomplete cycle is dropped
    pub fn intensity_matrix(&self) -> Result<Vec<Vec<f64>>> {
        let size = self.cycle_size()?;
        let cycles = self.samples.len() / size;
        if self.samples.len() % size != 0 {
            warn!(
                "{}: incomplete last cycle ({} of {size} masses) ignored",
                self.source.display(),
                self.samples.len() % size
            );
        }

        let mut matrix = vec![Vec::with_capacity(cycles); size];
        for (idx, sample) in self.samples[..cycles * size].iter().enumerate() {
            let row = idx % size;
            let expected = self.samples[row].mass;
            if sample.mass != expected {
                bail!(
                    "{}: cycle {} scans mass {} where {expected} was expected",
                    self.source.display(),
                    sample.cycle,
                    sample.mass
                )
            }
            matrix[row].push(sample.intensity);
        }
        Ok(matrix)
    }

    /// Sum of the intensities of the complete cycles, NaN cells skipped
    pub fn total_intensity(&self) -> Result<f64> {
        let size = self.cycle_size()?;
        let complete = self.samples.len() / size * size;
        Ok(self.samples[..complete]
            .iter()
            .map(|sample| sample.intensity)
            .filter(|value| !value.is_nan())
            .sum())
    }
}

/// Masses are written like `" 4,00"`
pub fn parse_mass(cell: &str) -> Option<f64> {
    cell.replace(' ', "").replace(',', ".").parse::<f64>().ok()
}

/// Unreadable intensities become NaN and are skipped by the reductions
pub fn parse_intensity(cell: &str) -> f64 {
    cell.trim().replace(',', ".").parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{qms_csv, write_fixture};
    use approx::assert_relative_eq;

    const MASSES: [f64; 3] = [2.0, 4.0, 18.0];

    fn measurement(cycles: &[[f64; 3]]) -> Measurement {
        let text = qms_csv(&MASSES, cycles);
        Measurement::from_reader(text.as_bytes(), Path::new("test_on.csv"), &Settings::default()).unwrap()
    }

    #[test]
    fn parses_localized_cells() {
        assert_eq!(parse_mass(" 4,00"), Some(4.0));
        assert_eq!(parse_mass("18"), Some(18.0));
        assert_eq!(parse_mass("n/a"), None);
        assert_eq!(parse_intensity("1.5E+02"), 150.0);
        assert_eq!(parse_intensity("2,5"), 2.5);
        assert!(parse_intensity("").is_nan());
    }

    #[test]
    fn detects_cycles() {
        let m = measurement(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(m.samples.len(), 9);
        assert_eq!(m.cycle_size().unwrap(), 3);
        assert_eq!(m.cycles().unwrap(), 3);
        assert_eq!(m.masses().unwrap(), MASSES.to_vec());
        assert_eq!(m.cycle(1).unwrap().1, vec![4.0, 5.0, 6.0]);
        assert!(m.cycle(3).is_err());
        assert_eq!(m.mass_index(18).unwrap(), 2);
        assert!(m.mass_index(40).is_err());
    }

    #[test]
    fn single_cycle_has_no_size() {
        let m = measurement(&[[1.0, 2.0, 3.0]]);
        assert!(m.cycle_size().is_err());
    }

    #[test]
    fn matrix_is_transposed_and_drops_partial_cycle() {
        let mut m = measurement(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        m.samples.push(Sample { cycle: 3, mass: 2.0, intensity: 100.0 });

        let matrix = m.intensity_matrix().unwrap();
        assert_eq!(matrix, vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]);
        assert_relative_eq!(m.total_intensity().unwrap(), 21.0);
    }

    #[test]
    fn inconsistent_scan_is_an_error() {
        let mut m = measurement(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        m.samples[4].mass = 5.0;
        assert!(m.intensity_matrix().is_err());
    }

    #[test]
    fn keeps_last_cycles() {
        let m = measurement(&[[1.0; 3], [2.0; 3], [3.0; 3], [4.0; 3]]);
        let last = m.keep_last_cycles(2);
        assert_eq!(last.samples.len(), 6);
        assert!(last.samples.iter().all(|sample| sample.cycle >= 3));
        assert_eq!(m.keep_last_cycles(10).samples.len(), 12);
    }

    #[test]
    fn missing_cycle_column_is_an_error() {
        let mut text = "preamble\n".repeat(41);
        text.push_str("Time;mass amu;SEM c/s\n10:00;1,00;5\n");
        let err = Measurement::from_reader(text.as_bytes(), Path::new("broken.csv"), &Settings::default())
            .unwrap_err();
        assert!(err.to_string().contains("Cycle"));
    }

    #[test]
    fn loads_from_disk() {
        let (_dir, filepath) = write_fixture("plasma_on.csv", &qms_csv(&MASSES, &[[1.0; 3], [2.0; 3]]));
        let m = Measurement::load(&filepath, &Settings::default()).unwrap();
        assert_eq!(m.stem(), "plasma_on");
        assert_eq!(m.cycles().unwrap(), 2);
    }
}
