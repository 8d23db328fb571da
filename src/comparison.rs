//! Plasma ON / OFF comparison in one of the six processing modes.

use eyre::{bail, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    measurement::Measurement,
    stats::{apply_mask, clamp_non_negative, significant, MassSpectrum, Normalization, Scale},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mode {
    pub scale: Scale,
    /// Zero the points whose uncertainty exceeds their mean
    pub usable_only: bool,
}

impl Mode {
    /// Modes in their historical numbering, 1 to 6
    pub const ALL: [Mode; 6] = [
        Mode { scale: Scale::Percent, usable_only: true },
        Mode { scale: Scale::Normalized, usable_only: true },
        Mode { scale: Scale::Raw, usable_only: true },
        Mode { scale: Scale::Percent, usable_only: false },
        Mode { scale: Scale::Normalized, usable_only: false },
        Mode { scale: Scale::Raw, usable_only: false },
    ];

    pub fn from_number(number: u8) -> Result<Mode> {
        match number {
            1..=6 => Ok(Mode::ALL[number as usize - 1]),
            _ => bail!("unknown processing mode {number}, expected 1 to 6"),
        }
    }

    pub fn number(&self) -> u8 {
        Mode::ALL
            .iter()
            .position(|mode| mode == self)
            .map_or(0, |idx| idx as u8 + 1)
    }

    /// Appended to the image prefix
    pub fn suffix(&self) -> &'static str {
        match (self.scale, self.usable_only) {
            (Scale::Percent, true) => "-normalized-percent-usable",
            (Scale::Normalized, true) => "-normalized-usable",
            (Scale::Raw, true) => "-raw-usable",
            (Scale::Percent, false) => "-normalized-percent",
            (Scale::Normalized, false) => "-normalized",
            (Scale::Raw, false) => "-raw",
        }
    }

    pub fn label(&self) -> String {
        if self.usable_only {
            format!("{} (usable only)", self.scale.label())
        } else {
            self.scale.label().to_owned()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub mode: Mode,
    pub normalization: Normalization,
    pub on: MassSpectrum,
    pub off: MassSpectrum,
    pub isolated: Option<MassSpectrum>,
    /// ON minus OFF, before masking
    pub diff: Vec<f64>,
}

impl Comparison {
    pub fn compute(
        on: &Measurement,
        off: &Measurement,
        isolated: Option<&Measurement>,
        mode: Mode,
        reference: Normalization,
    ) -> Result<Self> {
        let normalization = mode.scale.normalization(reference);
        let factor = mode.scale.factor();

        let mut on = MassSpectrum::from_measurement(on, normalization, factor)?;
        let mut off = MassSpectrum::from_measurement(off, normalization, factor)?;
        on.same_masses(&off)?;

        let isolated = match isolated {
            Some(isolated) => {
                let isolated = MassSpectrum::from_measurement(isolated, normalization, factor)?;
                isolated.same_masses(&on)?;
                Some(isolated)
            }
            None => None,
        };

        let mut diff = on
            .mean
            .iter()
            .zip_eq(&off.mean)
            .map(|(on, off)| on - off)
            .collect::<Vec<_>>();

        if mode.usable_only {
            let usable_on = on.mask_unusable()?;
            off.mask_unusable()?;
            apply_mask(&mut diff, &usable_on);
        }

        debug!("compared {} masses in mode {}", on.len(), mode.number());

        Ok(Comparison {
            mode,
            normalization,
            on,
            off,
            isolated,
            diff,
        })
    }

    pub fn masses(&self) -> &[f64] {
        &self.on.masses
    }

    pub fn significance(&self) -> Result<Vec<bool>> {
        significant(
            &self.off.uncertainty,
            &self.on.uncertainty,
            &self.off.mean,
            &self.on.mean,
        )
    }

    pub fn clamp_uncertainties(&mut self) {
        clamp_non_negative(&mut self.on.uncertainty);
        clamp_non_negative(&mut self.off.uncertainty);
        if let Some(isolated) = &mut self.isolated {
            clamp_non_negative(&mut isolated.uncertainty);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{testing::qms_csv, workspace::Settings};
    use approx::assert_relative_eq;

    const MASSES: [f64; 3] = [2.0, 4.0, 18.0];

    fn measurement(name: &str, cycles: &[[f64; 3]]) -> Measurement {
        Measurement::from_reader(qms_csv(&MASSES, cycles).as_bytes(), Path::new(name), &Settings::default()).unwrap()
    }

    #[test]
    fn modes_keep_their_numbers() {
        for number in 1..=6 {
            assert_eq!(Mode::from_number(number).unwrap().number(), number);
        }
        assert!(Mode::from_number(0).is_err());
        assert!(Mode::from_number(7).is_err());
        assert_eq!(Mode::from_number(1).unwrap().suffix(), "-normalized-percent-usable");
        assert_eq!(Mode::from_number(6).unwrap().suffix(), "-raw");
    }

    #[test]
    fn raw_difference() {
        let on = measurement("on.csv", &[[10.0, 4.0, 1.0], [20.0, 4.0, 1.0]]);
        let off = measurement("off.csv", &[[5.0, 4.0, 3.0], [5.0, 4.0, 3.0]]);

        let cmp = Comparison::compute(&on, &off, None, Mode::from_number(6).unwrap(), Normalization::Total).unwrap();
        assert_eq!(cmp.normalization, Normalization::None);
        assert_eq!(cmp.masses(), &MASSES);
        assert_eq!(cmp.diff, vec![10.0, 0.0, -2.0]);
        assert_eq!(cmp.on.uncertainty, vec![10.0, 0.0, 0.0]);
    }

    #[test]
    fn usable_mode_masks_on_and_off() {
        // mass 2 of ON varies a lot: mean 15, 2 sigma 10 -> usable
        // mass 18 of ON: mean 1, 2 sigma 2 -> unusable
        let on = measurement("on.csv", &[[10.0, 4.0, 0.0], [20.0, 4.0, 2.0]]);
        let off = measurement("off.csv", &[[5.0, 4.0, 3.0], [5.0, 4.0, 3.0]]);

        let cmp = Comparison::compute(&on, &off, None, Mode::from_number(3).unwrap(), Normalization::Total).unwrap();
        assert_eq!(cmp.on.mean, vec![15.0, 4.0, 0.0]);
        assert_eq!(cmp.on.uncertainty, vec![10.0, 0.0, 0.0]);
        assert_eq!(cmp.off.mean, vec![5.0, 4.0, 3.0]);
        assert_eq!(cmp.diff, vec![10.0, 0.0, 0.0]);
    }

    #[test]
    fn normalized_modes_use_reference() {
        let on = measurement("on.csv", &[[8.0, 4.0, 2.0], [8.0, 4.0, 2.0]]);
        let off = measurement("off.csv", &[[4.0, 4.0, 4.0], [4.0, 4.0, 4.0]]);

        let cmp = Comparison::compute(&on, &off, None, Mode::from_number(5).unwrap(), Normalization::Mass(4)).unwrap();
        assert_eq!(cmp.on.mean, vec![2.0, 1.0, 0.5]);
        assert_eq!(cmp.diff, vec![1.0, 0.0, -0.5]);

        let cmp = Comparison::compute(&on, &off, None, Mode::from_number(4).unwrap(), Normalization::Mass(4)).unwrap();
        assert_relative_eq!(cmp.on.mean[0], 200.0);
        assert_relative_eq!(cmp.diff[2], -50.0);
    }

    #[test]
    fn isolated_spectrum_follows_scale() {
        let on = measurement("on.csv", &[[8.0, 4.0, 2.0], [8.0, 4.0, 2.0]]);
        let off = measurement("off.csv", &[[4.0, 4.0, 4.0], [4.0, 4.0, 4.0]]);
        let iso = measurement("isole.csv", &[[1.0, 1.0, 1.0], [3.0, 1.0, 1.0]]);

        let mut cmp = Comparison::compute(&on, &off, Some(&iso), Mode::from_number(6).unwrap(), Normalization::Total).unwrap();
        let isolated = cmp.isolated.as_ref().unwrap();
        assert_eq!(isolated.mean, vec![2.0, 1.0, 1.0]);
        assert_eq!(cmp.significance().unwrap(), vec![true, false, false]);

        cmp.on.uncertainty[1] = f64::NAN;
        cmp.clamp_uncertainties();
        assert_eq!(cmp.on.uncertainty[1], 0.0);
    }

    #[test]
    fn different_mass_channels_are_rejected() {
        let on = measurement("on.csv", &[[1.0; 3], [1.0; 3]]);
        let text = qms_csv(&[2.0, 4.0, 20.0], &[[1.0; 3], [1.0; 3]]);
        let off = Measurement::from_reader(text.as_bytes(), Path::new("off.csv"), &Settings::default()).unwrap();
        assert!(Comparison::compute(&on, &off, None, Mode::ALL[5], Normalization::Total).is_err());
    }
}
