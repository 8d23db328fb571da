//! Per-mass reductions over the cycles of a measurement.

use std::{fmt::Display, str::FromStr};

use eyre::{bail, eyre, Result};
use itertools::izip;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::measurement::Measurement;

/// Historical mass number meaning "normalize by the total intensity"
pub const TOTAL_SENTINEL: u16 = 101;

/// Uncertainties are reported as two standard deviations
pub const COVERAGE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NormalizationRepr", into = "String")]
pub enum Normalization {
    None,
    /// Every cycle is divided by its intensity at this mass
    Mass(u16),
    /// Every cycle is divided by the mean total intensity of a cycle
    Total,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NormalizationRepr {
    Mass(u16),
    Name(String),
}

impl TryFrom<NormalizationRepr> for Normalization {
    type Error = String;

    fn try_from(value: NormalizationRepr) -> Result<Self, Self::Error> {
        match value {
            NormalizationRepr::Mass(mass) => Ok(Normalization::from_mass(mass)),
            NormalizationRepr::Name(name) => name.parse(),
        }
    }
}

impl Normalization {
    pub fn from_mass(mass: u16) -> Self {
        if mass == TOTAL_SENTINEL {
            Normalization::Total
        } else {
            Normalization::Mass(mass)
        }
    }
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "raw" => Ok(Normalization::None),
            "total" | "sum" => Ok(Normalization::Total),
            other => other
                .parse::<u16>()
                .map(Normalization::from_mass)
                .map_err(|_| format!("expected a mass, 'total' or 'none', got '{s}'")),
        }
    }
}

impl Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Normalization::None => write!(f, "none"),
            Normalization::Mass(mass) => write!(f, "{mass}"),
            Normalization::Total => write!(f, "total"),
        }
    }
}

impl From<Normalization> for String {
    fn from(value: Normalization) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scale {
    Raw,
    Normalized,
    /// Normalized values multiplied by 100
    Percent,
}

impl Scale {
    pub const ALL: [Scale; 3] = [Scale::Raw, Scale::Normalized, Scale::Percent];

    pub fn factor(self) -> f64 {
        match self {
            Scale::Percent => 100.0,
            Scale::Raw | Scale::Normalized => 1.0,
        }
    }

    /// Normalization actually applied for a requested reference
    pub fn normalization(self, reference: Normalization) -> Normalization {
        match self {
            Scale::Raw => Normalization::None,
            Scale::Normalized | Scale::Percent => reference,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Scale::Raw => "raw",
            Scale::Normalized => "normalized",
            Scale::Percent => "normalized x100",
        }
    }
}

/// Intensities as `[mass][cycle]` after normalization and scaling
pub fn normalized_matrix(measurement: &Measurement, normalization: Normalization, factor: f64) -> Result<Vec<Vec<f64>>> {
    let mut matrix = measurement.intensity_matrix()?;

    match normalization {
        Normalization::None => {}
        Normalization::Mass(mass) => {
            let reference = matrix[measurement.mass_index(mass)?].clone();
            for row in &mut matrix {
                for (value, reference) in row.iter_mut().zip(&reference) {
                    *value /= reference;
                }
            }
        }
        Normalization::Total => {
            let cycles = matrix.first().map_or(0, Vec::len);
            let per_cycle = measurement.total_intensity()? / cycles as f64;
            if per_cycle == 0.0 || !per_cycle.is_finite() {
                bail!("{}: total intensity is {per_cycle}, can't normalize", measurement.source.display())
            }
            matrix.iter_mut().flatten().for_each(|value| *value /= per_cycle);
        }
    }

    if factor != 1.0 {
        matrix.iter_mut().flatten().for_each(|value| *value *= factor);
    }
    Ok(matrix)
}

fn finite(row: &[f64]) -> impl Iterator<Item = f64> + '_ {
    row.iter().copied().filter(|value| !value.is_nan())
}

/// Mean over cycles for every mass
pub fn means(measurement: &Measurement, normalization: Normalization, factor: f64) -> Result<Vec<f64>> {
    Ok(normalized_matrix(measurement, normalization, factor)?
        .iter()
        .map(|row| finite(row).mean())
        .collect())
}

/// Population standard deviation over cycles for every mass
pub fn std_devs(measurement: &Measurement, normalization: Normalization, factor: f64) -> Result<Vec<f64>> {
    Ok(normalized_matrix(measurement, normalization, factor)?
        .iter()
        .map(|row| finite(row).population_std_dev())
        .collect())
}

/// `true` where the uncertainty does not exceed the mean
pub fn usable_mask(uncertainty: &[f64], mean: &[f64]) -> Result<Vec<bool>> {
    if uncertainty.len() != mean.len() {
        bail!("lists are not the same length: {} vs {}", uncertainty.len(), mean.len())
    }
    Ok(uncertainty.iter().zip(mean).map(|(unc, mean)| unc <= mean).collect())
}

/// Zeroes the values of masked out points
pub fn apply_mask(values: &mut [f64], mask: &[bool]) {
    values.iter_mut().zip(mask).for_each(|(value, keep)| {
        if !keep {
            *value = 0.0;
        }
    });
}

/// `true` where ON stays above OFF once both uncertainties are accounted for
pub fn significant(unc_off: &[f64], unc_on: &[f64], mean_off: &[f64], mean_on: &[f64]) -> Result<Vec<bool>> {
    let len = mean_on.len();
    if [unc_off.len(), unc_on.len(), mean_off.len()].iter().any(|other| *other != len) {
        bail!("lists are not the same length")
    }
    Ok(izip!(unc_off, unc_on, mean_off, mean_on)
        .map(|(unc_off, unc_on, mean_off, mean_on)| (mean_on - unc_on) - (mean_off + unc_off) > 0.0)
        .collect())
}

/// Non-positive and NaN uncertainties are drawn as no error bar
pub fn clamp_non_negative(values: &mut [f64]) {
    values.iter_mut().for_each(|value| {
        if !(*value > 0.0) {
            *value = 0.0;
        }
    });
}

/// Mean spectrum of one plasma condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassSpectrum {
    pub masses: Vec<f64>,
    pub mean: Vec<f64>,
    pub uncertainty: Vec<f64>,
}

impl MassSpectrum {
    pub fn from_measurement(measurement: &Measurement, normalization: Normalization, factor: f64) -> Result<Self> {
        let masses = measurement.masses()?;
        let mean = means(measurement, normalization, factor)?;
        let uncertainty = std_devs(measurement, normalization, factor)?
            .into_iter()
            .map(|std| COVERAGE * std)
            .collect();
        Ok(MassSpectrum { masses, mean, uncertainty })
    }

    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// Zeroes unusable points and returns the usability mask
    pub fn mask_unusable(&mut self) -> Result<Vec<bool>> {
        let mask = usable_mask(&self.uncertainty, &self.mean)?;
        apply_mask(&mut self.mean, &mask);
        apply_mask(&mut self.uncertainty, &mask);
        Ok(mask)
    }

    pub fn same_masses(&self, other: &MassSpectrum) -> Result<()> {
        if self.masses != other.masses {
            return Err(eyre!(
                "mass channels differ: {:?} vs {:?}",
                self.masses,
                other.masses
            ));
        }
        Ok(())
    }
}
