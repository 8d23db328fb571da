// Interactive viewer: pick a folder, a scale and a reference mass, then look
// at the ON / OFF spectra and their difference without writing any image.

use std::path::{Path, PathBuf};

use egui_plot::{Bar, BarChart, GridMark, HLine, Legend, Line, Plot, PlotPoints};
use eyre::{eyre, Result};
use tracing::warn;

use qms_analysis::{
    comparison::{Comparison, Mode},
    folder::{subdirectories, LoadedConditions},
    init_logging,
    render::{split_by_sign, symlog_tick, SymLog},
    stats::{Normalization, Scale},
    workspace::Settings,
};

const DEFAULT_REFERENCE: u16 = 4;
const DEFAULT_LAST_CYCLES: usize = 15;

fn main() -> Result<()> {
    init_logging();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1400.0, 900.0]),
        ..Default::default()
    };
    eframe::run_native(
        "QMS spectra",
        native_options,
        Box::new(|_| Box::new(SpectraViewer::new(Settings::default()))),
    )
    .map_err(|err| eyre!("{err}"))
}

struct SpectraViewer {
    settings: Settings,
    folder: String,
    browse: PathBuf,
    scale: Scale,
    reference: String,
    usable_only: bool,
    last_cycles: usize,
    symlog: bool,
    comparison: Option<Comparison>,
    error: Option<String>,
}

impl SpectraViewer {
    fn new(settings: Settings) -> Self {
        let browse = if settings.data_root.is_dir() {
            settings.data_root.clone()
        } else {
            PathBuf::from(".")
        };
        SpectraViewer {
            settings,
            folder: String::new(),
            browse,
            scale: Scale::Normalized,
            reference: DEFAULT_REFERENCE.to_string(),
            usable_only: false,
            last_cycles: DEFAULT_LAST_CYCLES,
            symlog: true,
            comparison: None,
            error: None,
        }
    }

    /// Invalid input falls back to mass 4
    fn reference(&self) -> Normalization {
        match self.reference.parse::<u16>() {
            Ok(mass) => Normalization::from_mass(mass),
            Err(_) => {
                warn!("invalid reference mass '{}', using {DEFAULT_REFERENCE}", self.reference);
                Normalization::Mass(DEFAULT_REFERENCE)
            }
        }
    }

    fn compute(&self) -> Result<Comparison> {
        let settings = Settings {
            last_cycles: Some(self.last_cycles),
            normalization: self.reference(),
            ..self.settings.clone()
        };
        let loaded = LoadedConditions::discover_and_load(Path::new(&self.folder), &settings)?;
        let mode = Mode {
            scale: self.scale,
            usable_only: self.usable_only,
        };
        Comparison::compute(loaded.require_on()?, loaded.require_off()?, None, mode, settings.normalization)
    }

    fn show(&mut self) {
        match self.compute() {
            Ok(comparison) => {
                self.comparison = Some(comparison);
                self.error = None;
            }
            Err(err) => {
                self.comparison = None;
                self.error = Some(format!("{err:#}"));
            }
        }
    }

    fn symlog_axis(&self) -> SymLog {
        SymLog { linthresh: self.settings.symlog_threshold }
    }

    fn transform(&self, value: f64) -> f64 {
        if self.symlog {
            self.symlog_axis().forward(value)
        } else {
            value
        }
    }

    /// Plot with the y labels in real units when the axis is symlog
    fn plot(&self, id: &str, height: f32) -> Plot {
        let plot = Plot::new(id).legend(Legend::default()).height(height);
        if self.symlog {
            let axis = self.symlog_axis();
            plot.y_axis_formatter(move |mark: GridMark, _, _| symlog_tick(axis, mark.value))
        } else {
            plot
        }
    }

    fn bars(&self, masses: &[f64], values: &[f64], offset: f64, width: f64) -> Vec<Bar> {
        masses
            .iter()
            .zip(values)
            .map(|(mass, value)| Bar::new(mass + offset, self.transform(*value)).width(width))
            .collect()
    }

    fn error_bars(&self, masses: &[f64], mean: &[f64], uncertainty: &[f64], offset: f64) -> Vec<Line> {
        masses
            .iter()
            .zip(mean.iter().zip(uncertainty))
            .filter(|(_, (_, unc))| **unc > 0.0)
            .map(|(mass, (mean, unc))| {
                let x = mass + offset;
                Line::new(PlotPoints::from(vec![
                    [x, self.transform(mean - unc)],
                    [x, self.transform(mean + unc)],
                ]))
            })
            .collect()
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Folder");
        ui.text_edit_singleline(&mut self.folder);

        ui.label(format!("browsing {}", self.browse.display()));
        ui.horizontal(|ui| {
            if ui.button("..").clicked() {
                if let Some(parent) = self.browse.parent() {
                    self.browse = if parent.as_os_str().is_empty() {
                        PathBuf::from("..")
                    } else {
                        parent.to_path_buf()
                    };
                }
            }
            if ui.button("select this folder").clicked() {
                self.folder = self.browse.to_string_lossy().into_owned();
            }
        });
        egui::ScrollArea::vertical().max_height(250.0).show(ui, |ui| match subdirectories(&self.browse) {
            Ok(children) => {
                for child in children {
                    let name = child
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    if ui.button(name).clicked() {
                        self.browse = child;
                    }
                }
            }
            Err(err) => {
                ui.colored_label(egui::Color32::RED, format!("{err}"));
            }
        });

        ui.separator();
        egui::ComboBox::from_label("scale")
            .selected_text(self.scale.label())
            .show_ui(ui, |ui| {
                for scale in Scale::ALL {
                    ui.selectable_value(&mut self.scale, scale, scale.label());
                }
            });
        ui.horizontal(|ui| {
            ui.label("reference mass");
            ui.text_edit_singleline(&mut self.reference);
        });
        ui.label(format!("{} for the total intensity", qms_analysis::stats::TOTAL_SENTINEL));
        ui.horizontal(|ui| {
            ui.label("last cycles");
            ui.add(egui::DragValue::new(&mut self.last_cycles).clamp_range(1..=10_000));
        });
        ui.checkbox(&mut self.usable_only, "usable points only");
        ui.checkbox(&mut self.symlog, "symlog scale");

        if ui.button("Show").clicked() {
            self.show();
        }
        if let Some(error) = &self.error {
            ui.colored_label(egui::Color32::RED, error);
        }
    }

    fn plots(&self, ui: &mut egui::Ui, comparison: &Comparison) {
        let width = self.settings.bar_width;
        let masses = comparison.masses();
        let height = ui.available_height() / 2.0 - 10.0;

        let on = BarChart::new(self.bars(masses, &comparison.on.mean, -width / 2.0, width))
            .name("plasma ON")
            .color(egui::Color32::RED);
        let off = BarChart::new(self.bars(masses, &comparison.off.mean, width / 2.0, width))
            .name("plasma OFF")
            .color(egui::Color32::BLUE);
        let on_errors = self.error_bars(masses, &comparison.on.mean, &comparison.on.uncertainty, -width / 2.0);
        let off_errors = self.error_bars(masses, &comparison.off.mean, &comparison.off.uncertainty, width / 2.0);

        self.plot("spectra", height).show(ui, |plot_ui| {
            plot_ui.bar_chart(on);
            plot_ui.bar_chart(off);
            for line in on_errors {
                plot_ui.line(line.color(egui::Color32::from_rgb(255, 192, 203)));
            }
            for line in off_errors {
                plot_ui.line(line.color(egui::Color32::from_rgb(135, 206, 235)));
            }
        });

        let (rises, drops) = split_by_sign(masses, &comparison.diff);
        let diff_chart = |bars: Vec<(f64, f64)>, name: &str, color: egui::Color32| {
            BarChart::new(
                bars.into_iter()
                    .map(|(mass, diff)| Bar::new(mass, self.transform(diff)).width(width))
                    .collect(),
            )
            .name(name)
            .color(color)
        };
        let rises = diff_chart(rises, "ON - OFF >= 0", egui::Color32::BLUE);
        let drops = diff_chart(drops, "ON - OFF < 0", egui::Color32::RED);

        self.plot("difference", height).show(ui, |plot_ui| {
            plot_ui.bar_chart(rises);
            plot_ui.bar_chart(drops);
            plot_ui.hline(HLine::new(0.0).color(egui::Color32::BLACK));
        });
    }
}

impl eframe::App for SpectraViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::SidePanel::left("controls").min_width(280.0).show(ctx, |ui| {
            self.controls(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| match &self.comparison {
            Some(comparison) => {
                ui.heading(format!("Mean mass spectrometry, {}", comparison.mode.label()));
                self.plots(ui, comparison);
            }
            None => {
                ui.label("Pick a folder with plasma ON and OFF files and press Show");
            }
        });
    }
}
