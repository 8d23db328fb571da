//! Per-mass tables and interactive html charts of a comparison.

use std::path::Path;

use eyre::{Result, WrapErr};
use plotly::{
    color::NamedColor,
    common::{ErrorData, ErrorType, Marker, Title},
    layout::{Axis, BarMode},
    Bar, Layout, Plot,
};
use serde::Serialize;
use tracing::info;

use crate::comparison::Comparison;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub mass: f64,
    pub mean_off: f64,
    pub unc_off: f64,
    pub mean_on: f64,
    pub unc_on: f64,
    pub diff: f64,
    pub significant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_isolated: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unc_isolated: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpectrumTable {
    pub mode: u8,
    pub normalization: String,
    pub rows: Vec<TableRow>,
}

impl SpectrumTable {
    pub fn from_comparison(comparison: &Comparison) -> Result<Self> {
        let significance = comparison.significance()?;
        let rows = (0..comparison.on.len())
            .map(|idx| TableRow {
                mass: comparison.on.masses[idx],
                mean_off: comparison.off.mean[idx],
                unc_off: comparison.off.uncertainty[idx],
                mean_on: comparison.on.mean[idx],
                unc_on: comparison.on.uncertainty[idx],
                diff: comparison.diff[idx],
                significant: significance[idx],
                mean_isolated: comparison.isolated.as_ref().map(|iso| iso.mean[idx]),
                unc_isolated: comparison.isolated.as_ref().map(|iso| iso.uncertainty[idx]),
            })
            .collect();

        Ok(SpectrumTable {
            mode: comparison.mode.number(),
            normalization: comparison.normalization.to_string(),
            rows,
        })
    }

    /// Tab separated, `decimal_comma` for spreadsheets in a french locale
    pub fn to_tsv(&self, decimal_comma: bool) -> String {
        let with_isolated = self.rows.iter().any(|row| row.mean_isolated.is_some());

        let mut table = "mass\tmean_off\tunc_off\tmean_on\tunc_on\tdiff\tsignificant".to_string();
        if with_isolated {
            table.push_str("\tmean_isolated\tunc_isolated");
        }
        table.push('\n');

        for row in &self.rows {
            let mut line = format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                row.mass,
                row.mean_off,
                row.unc_off,
                row.mean_on,
                row.unc_on,
                row.diff,
                u8::from(row.significant)
            );
            if with_isolated {
                line.push_str(&format!(
                    "\t{}\t{}",
                    row.mean_isolated.unwrap_or(f64::NAN),
                    row.unc_isolated.unwrap_or(f64::NAN)
                ));
            }
            if decimal_comma {
                line = line.replace('.', ",");
            }
            table.push_str(&line);
            table.push('\n');
        }
        table
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Grouped bar chart with error bars, viewable in a browser
pub fn comparison_plot(comparison: &Comparison, title: &str) -> Plot {
    let masses = comparison.masses().to_vec();

    let mut plot = Plot::new();
    plot.set_layout(
        Layout::new()
            .title(Title::new(title))
            .bar_mode(BarMode::Group)
            .x_axis(Axis::new().title(Title::new("mass amu")))
            .y_axis(Axis::new().title(Title::new("SEM c/s")))
            .height(1000),
    );

    plot.add_trace(
        Bar::new(masses.clone(), comparison.on.mean.clone())
            .name("plasma ON")
            .marker(Marker::new().color(NamedColor::Red))
            .error_y(ErrorData::new(ErrorType::Data).array(comparison.on.uncertainty.clone())),
    );
    plot.add_trace(
        Bar::new(masses.clone(), comparison.off.mean.clone())
            .name("plasma OFF")
            .marker(Marker::new().color(NamedColor::Blue))
            .error_y(ErrorData::new(ErrorType::Data).array(comparison.off.uncertainty.clone())),
    );
    if let Some(isolated) = &comparison.isolated {
        plot.add_trace(
            Bar::new(masses.clone(), isolated.mean.clone())
                .name("plasma isolated / error")
                .marker(Marker::new().color(NamedColor::Orange)),
        );
    }
    plot.add_trace(
        Bar::new(masses, comparison.diff.clone())
            .name("ON - OFF")
            .marker(Marker::new().color(NamedColor::Gray)),
    );
    plot
}

pub fn write_html(comparison: &Comparison, title: &str, filepath: &Path) -> Result<()> {
    if let Some(parent) = filepath.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(filepath, comparison_plot(comparison, title).to_html())
        .wrap_err_with(|| format!("can't write {}", filepath.display()))?;
    info!("saved {}", filepath.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        comparison::Mode,
        stats::{MassSpectrum, Normalization},
    };

    fn comparison() -> Comparison {
        Comparison {
            mode: Mode::from_number(6).unwrap(),
            normalization: Normalization::None,
            on: MassSpectrum {
                masses: vec![2.0, 4.0],
                mean: vec![10.5, 3.0],
                uncertainty: vec![1.0, 2.0],
            },
            off: MassSpectrum {
                masses: vec![2.0, 4.0],
                mean: vec![5.0, 3.0],
                uncertainty: vec![1.0, 1.0],
            },
            isolated: None,
            diff: vec![5.5, 0.0],
        }
    }

    #[test]
    fn table_rows() {
        let table = SpectrumTable::from_comparison(&comparison()).unwrap();
        assert_eq!(table.mode, 6);
        assert_eq!(table.normalization, "none");
        assert!(table.rows[0].significant);
        assert!(!table.rows[1].significant);
    }

    #[test]
    fn tsv_output() {
        let table = SpectrumTable::from_comparison(&comparison()).unwrap();
        let tsv = table.to_tsv(false);
        let lines = tsv.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "mass\tmean_off\tunc_off\tmean_on\tunc_on\tdiff\tsignificant");
        assert_eq!(lines[1], "2\t5\t1\t10.5\t1\t5.5\t1");

        let tsv = table.to_tsv(true);
        assert_eq!(tsv.lines().nth(1), Some("2\t5\t1\t10,5\t1\t5,5\t1"));
    }

    #[test]
    fn isolated_columns_only_when_present() {
        let mut cmp = comparison();
        cmp.isolated = Some(MassSpectrum {
            masses: vec![2.0, 4.0],
            mean: vec![0.5, 0.25],
            uncertainty: vec![0.0, 0.0],
        });
        let table = SpectrumTable::from_comparison(&cmp).unwrap();
        assert!(table.to_tsv(false).starts_with("mass\tmean_off\tunc_off\tmean_on\tunc_on\tdiff\tsignificant\tmean_isolated"));

        let json = table.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rows"][1]["mean_isolated"], 0.25);
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn html_is_written_to_disk() {
        let tmp = crate::testing::fixture_dir();
        let filepath = tmp.path().join("charts").join("run-raw.html");
        write_html(&comparison(), "test", &filepath).unwrap();
        assert!(std::fs::read_to_string(&filepath).unwrap().contains("plasma OFF"));
    }

    #[test]
    fn unwritable_html_is_an_error() {
        let tmp = crate::testing::fixture_dir();
        let blocker = crate::testing::write_into(tmp.path(), "file", "");
        assert!(write_html(&comparison(), "test", &blocker.join("run.html")).is_err());
    }

    #[test]
    fn html_chart_has_all_traces() {
        let html = comparison_plot(&comparison(), "test").to_html();
        assert!(html.contains("plasma ON"));
        assert!(html.contains("plasma OFF"));
        assert!(html.contains("ON - OFF"));
    }
}
