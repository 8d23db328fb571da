//! Fixtures shared by the unit tests.

use std::path::{Path, PathBuf};

use tempfile::{tempdir, TempDir};

/// Builds a QMS export with the default 41 line preamble.
/// `cycles[c][m]` is the intensity of `masses[m]` in cycle `c + 1`.
pub fn qms_csv<const N: usize>(masses: &[f64; N], cycles: &[[f64; N]]) -> String {
    let mut text = String::new();
    text.push_str("Source File;C:\\Quadera\\plasma.qmp\n");
    for idx in 1..41 {
        text.push_str(&format!("Parameter {idx};°\n"));
    }
    text.push_str("Cycle;Date;Time;mass amu;SEM c/s\n");
    for (cycle, intensities) in cycles.iter().enumerate() {
        for (mass, intensity) in masses.iter().zip(intensities) {
            text.push_str(&format!(
                "{};01.04.2025;10:00:00; {};{intensity:E}\n",
                cycle + 1,
                format!("{mass:.2}").replace('.', ",")
            ));
        }
    }
    text
}

/// Fresh directory, removed when the returned guard is dropped
pub fn fixture_dir() -> TempDir {
    tempdir().unwrap()
}

/// Single file in a fresh directory, keep the guard alive while using the path
pub fn write_fixture(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = fixture_dir();
    let filepath = write_into(dir.path(), name, contents);
    (dir, filepath)
}

pub fn write_into(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let filepath = dir.join(name);
    if let Some(parent) = filepath.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&filepath, contents).unwrap();
    filepath
}
