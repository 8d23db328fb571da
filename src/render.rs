//! PNG charts of a comparison: grouped ON / OFF bars with error bars and the
//! ON - OFF difference, both on a symmetric log axis.

use std::{
    error::Error,
    path::{Path, PathBuf},
};

use eyre::{eyre, Result};
use plotters::prelude::*;
use tracing::info;

use crate::{comparison::Comparison, stats::MassSpectrum, workspace::Settings};

const ON_COLOR: RGBColor = RED;
const OFF_COLOR: RGBColor = BLUE;
const ON_ERROR_COLOR: RGBColor = RGBColor(255, 192, 203);
const OFF_ERROR_COLOR: RGBColor = RGBColor(135, 206, 235);
const ISOLATED_COLOR: RGBColor = RGBColor(255, 165, 0);

/// Axis transform: linear inside `±linthresh`, logarithmic outside.
/// `forward(linthresh) == 1`, every further decade adds 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymLog {
    pub linthresh: f64,
}

impl SymLog {
    pub fn forward(&self, value: f64) -> f64 {
        let abs = value.abs();
        if abs <= self.linthresh {
            value / self.linthresh
        } else {
            value.signum() * (1.0 + (abs / self.linthresh).log10())
        }
    }

    pub fn inverse(&self, value: f64) -> f64 {
        let abs = value.abs();
        if abs <= 1.0 {
            value * self.linthresh
        } else {
            value.signum() * self.linthresh * 10f64.powf(abs - 1.0)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChartStyle {
    pub size: (u32, u32),
    pub bar_width: f64,
    pub symlog: SymLog,
}

impl From<&Settings> for ChartStyle {
    fn from(settings: &Settings) -> Self {
        ChartStyle {
            size: settings.image_size,
            bar_width: settings.bar_width,
            symlog: SymLog { linthresh: settings.symlog_threshold },
        }
    }
}

impl ChartStyle {
    /// Pixel size relative to the image height
    fn px(&self, ratio: f64) -> i32 {
        ((self.size.1 as f64 * ratio) as i32).max(10)
    }
}

/// `<prefix><mode suffix><stem>.png` and its `diff` companion
pub fn output_paths(prefix: &str, suffix: &str, stem: &str) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{prefix}{suffix}{stem}.png")),
        PathBuf::from(format!("{prefix}{suffix}{stem}diff.png")),
    )
}

pub fn format_tick(value: f64) -> String {
    let abs = value.abs();
    if abs < 1e-12 {
        "0".to_owned()
    } else if abs >= 1e4 || abs < 1e-2 {
        format!("{value:.0e}")
    } else if abs >= 1.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Label of a tick placed on the symlog axis
pub fn symlog_tick(symlog: SymLog, value: f64) -> String {
    format_tick(symlog.inverse(value))
}

/// Difference bars as `(mass, diff)`, split into `>= 0` and `< 0`, NaN left out
pub fn split_by_sign(masses: &[f64], diff: &[f64]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    masses
        .iter()
        .copied()
        .zip(diff.iter().copied())
        .filter(|(_, diff)| !diff.is_nan())
        .partition(|(_, diff)| *diff >= 0.0)
}

fn x_range(masses: &[f64]) -> (f64, f64) {
    let min = masses.iter().copied().fold(f64::INFINITY, f64::min);
    let max = masses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min.is_finite() && max.is_finite() {
        (min.floor() - 1.0, max.ceil() + 1.0)
    } else {
        (0.0, 1.0)
    }
}

/// Transformed y range covering every value, zero included
fn y_range(values: impl Iterator<Item = f64>, symlog: SymLog) -> (f64, f64) {
    let (min, max) = values
        .filter(|value| value.is_finite())
        .map(|value| symlog.forward(value))
        .fold((0.0f64, 0.0f64), |(min, max), value| (min.min(value), max.max(value)));
    let pad = ((max - min) * 0.05).max(0.1);
    (min - if min < 0.0 { pad } else { 0.0 }, max + pad)
}

fn spectrum_extent(spectrum: &MassSpectrum) -> impl Iterator<Item = f64> + '_ {
    spectrum
        .mean
        .iter()
        .zip(&spectrum.uncertainty)
        .flat_map(|(mean, unc)| [mean + unc, mean - unc])
}

fn draw_comparison_inner(
    filepath: &Path,
    comparison: &Comparison,
    title: &str,
    style: &ChartStyle,
) -> Result<(), Box<dyn Error>> {
    let symlog = style.symlog;
    let width = style.bar_width;
    let masses = comparison.masses();
    let (x_min, x_max) = x_range(masses);

    let extent = spectrum_extent(&comparison.on)
        .chain(spectrum_extent(&comparison.off))
        .chain(comparison.isolated.iter().flat_map(|iso| iso.mean.clone()))
        .collect::<Vec<_>>();
    let (y_min, y_max) = y_range(extent.into_iter(), symlog);

    let root = BitMapBackend::new(filepath, style.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", style.px(0.03)).into_font())
        .margin(style.px(0.02))
        .x_label_area_size(style.px(0.05))
        .y_label_area_size(style.px(0.07))
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("mass amu")
        .y_desc("SEM c/s")
        .x_labels(((x_max - x_min) / 2.0).ceil() as usize + 1)
        .x_label_formatter(&|x| format!("{}", x.round() as i64))
        .y_label_formatter(&|y| symlog_tick(symlog, *y))
        .label_style(("sans-serif", style.px(0.018)))
        .axis_desc_style(("sans-serif", style.px(0.022)))
        .draw()?;

    let bars = |spectrum: &MassSpectrum, offset: f64, bar_width: f64, color: RGBAColor| {
        spectrum
            .masses
            .iter()
            .zip(&spectrum.mean)
            .filter(|(_, mean)| mean.is_finite())
            .map(|(mass, mean)| {
                let left = mass + offset - bar_width / 2.0;
                Rectangle::new([(left, 0.0), (left + bar_width, symlog.forward(*mean))], color.filled())
            })
            .collect::<Vec<_>>()
    };

    let legend_size = style.px(0.012);
    let on_color = ON_COLOR.to_rgba();
    let off_color = OFF_COLOR.to_rgba();

    chart
        .draw_series(bars(&comparison.on, -width / 2.0, width, on_color))?
        .label("plasma ON")
        .legend(move |(x, y)| Rectangle::new([(x, y - legend_size), (x + 2 * legend_size, y + legend_size)], on_color.filled()));
    chart
        .draw_series(bars(&comparison.off, width / 2.0, width, off_color))?
        .label("plasma OFF")
        .legend(move |(x, y)| Rectangle::new([(x, y - legend_size), (x + 2 * legend_size, y + legend_size)], off_color.filled()));

    if let Some(isolated) = &comparison.isolated {
        let iso_color = ISOLATED_COLOR.mix(0.6);
        chart
            .draw_series(bars(isolated, 0.0, 2.0 * width, iso_color))?
            .label("plasma isolated / error")
            .legend(move |(x, y)| Rectangle::new([(x, y - legend_size), (x + 2 * legend_size, y + legend_size)], iso_color.filled()));
    }

    let cap = width / 4.0;
    let stroke = (style.size.1 / 800).max(1);
    for (spectrum, offset, color) in [
        (&comparison.on, -width / 2.0, ON_ERROR_COLOR),
        (&comparison.off, width / 2.0, OFF_ERROR_COLOR),
    ] {
        let error_bars = spectrum
            .masses
            .iter()
            .zip(spectrum.mean.iter().zip(&spectrum.uncertainty))
            .filter(|(_, (mean, unc))| mean.is_finite() && unc.is_finite() && **unc > 0.0)
            .flat_map(|(mass, (mean, unc))| {
                let x = mass + offset;
                let low = symlog.forward(mean - unc);
                let high = symlog.forward(mean + unc);
                [
                    PathElement::new(vec![(x, low), (x, high)], color.stroke_width(stroke)),
                    PathElement::new(vec![(x - cap, low), (x + cap, low)], color.stroke_width(stroke * 3)),
                    PathElement::new(vec![(x - cap, high), (x + cap, high)], color.stroke_width(stroke * 3)),
                ]
            })
            .collect::<Vec<_>>();
        chart.draw_series(error_bars)?;
    }

    chart
        .configure_series_labels()
        .label_font(("sans-serif", style.px(0.02)))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_difference_inner(
    filepath: &Path,
    comparison: &Comparison,
    title: &str,
    style: &ChartStyle,
) -> Result<(), Box<dyn Error>> {
    let symlog = style.symlog;
    let masses = comparison.masses();
    let (x_min, x_max) = x_range(masses);
    let (y_min, y_max) = y_range(comparison.diff.iter().copied(), symlog);

    let root = BitMapBackend::new(filepath, style.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", style.px(0.03)).into_font())
        .margin(style.px(0.02))
        .x_label_area_size(style.px(0.05))
        .y_label_area_size(style.px(0.07))
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("mass amu")
        .y_desc("SEM c/s")
        .x_labels(((x_max - x_min) / 2.0).ceil() as usize + 1)
        .x_label_formatter(&|x| format!("{}", x.round() as i64))
        .y_label_formatter(&|y| symlog_tick(symlog, *y))
        .label_style(("sans-serif", style.px(0.018)))
        .axis_desc_style(("sans-serif", style.px(0.022)))
        .draw()?;

    let half = 0.4;
    let (rises, drops) = split_by_sign(masses, &comparison.diff);
    for (bars, color) in [(rises, OFF_COLOR), (drops, ON_COLOR)] {
        chart.draw_series(bars.into_iter().map(|(mass, diff)| {
            Rectangle::new([(mass - half, 0.0), (mass + half, symlog.forward(diff))], color.filled())
        }))?;
    }

    chart.draw_series(LineSeries::new(
        vec![(x_min, 0.0), (x_max, 0.0)],
        BLACK.stroke_width((style.size.1 / 1000).max(1)),
    ))?;

    root.present()?;
    Ok(())
}

fn ensure_parent(filepath: &Path) -> Result<()> {
    if let Some(parent) = filepath.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn draw_comparison(filepath: &Path, comparison: &Comparison, title: &str, style: &ChartStyle) -> Result<()> {
    ensure_parent(filepath)?;
    draw_comparison_inner(filepath, comparison, title, style)
        .map_err(|err| eyre!("failed to draw {}: {err}", filepath.display()))?;
    info!("saved {}", filepath.display());
    Ok(())
}

pub fn draw_difference(filepath: &Path, comparison: &Comparison, title: &str, style: &ChartStyle) -> Result<()> {
    ensure_parent(filepath)?;
    draw_difference_inner(filepath, comparison, title, style)
        .map_err(|err| eyre!("failed to draw {}: {err}", filepath.display()))?;
    info!("saved {}", filepath.display());
    Ok(())
}

/// Both charts of a comparison, returns the written files
pub fn draw_both(prefix: &str, stem: &str, comparison: &Comparison, title: &str, style: &ChartStyle) -> Result<Vec<PathBuf>> {
    let (bars, diff) = output_paths(prefix, comparison.mode.suffix(), stem);
    draw_comparison(&bars, comparison, title, style)?;
    draw_difference(&diff, comparison, &format!("{title} ON - OFF"), style)?;
    Ok(vec![bars, diff])
}
