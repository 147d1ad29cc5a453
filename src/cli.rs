use clap::{Parser, Subcommand};
use std::path::PathBuf;

use egui_extras::{Column, TableBuilder};

use crate::charts;
use crate::dataset::{DatasetBundle, DatasetCache, DirSource, FieldBounds};
use crate::pivot::{pivot_counts, PivotTable};
use crate::stats::{column_mean, CorrelationMatrix, FiveNumber};
use crate::summary::clean_correlation;
use crate::types::{DEFAULT_PIVOT_MIN_TOTAL, POLLUTANT_FIELDS, WEATHER_FIELDS};

/// Interactive dashboard over precomputed air pollution and weather station datasets
#[derive(Parser, Debug)]
#[command(name = "airdash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clip outliers in a combined readings file and forward-fill wind direction
    Clean {
        /// Input combined readings CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path (stdout if not specified)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Export a JSON summary of a dashboard data directory
    Summarize {
        /// Directory holding the four dashboard CSV files
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Output JSON file path (stdout if not specified)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Minimum summed count for a pivot column to be kept
        #[arg(long, default_value_t = DEFAULT_PIVOT_MIN_TOTAL)]
        pivot_min_total: u64,

        /// Compute SHA-256 of each input file
        #[arg(long, default_value_t = true)]
        hash_files: bool,
    },

    /// Launch the dashboard
    Gui {
        /// Directory holding the four dashboard CSV files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

/// Rows shown in table previews
const HEAD_ROWS: usize = 10;

/// One-line reference for each field of the combined readings
const FIELD_NOTES: &[(&str, &str)] = &[
    ("PM2.5", "Fine particulate matter ≤ 2.5 µm"),
    ("PM10", "Coarse particulate matter ≤ 10 µm"),
    ("SO2", "Sulfur dioxide concentration"),
    ("NO2", "Nitrogen dioxide concentration"),
    ("CO", "Carbon monoxide concentration"),
    ("O3", "Ground-level ozone concentration"),
    ("TEMP", "Air temperature, °C"),
    ("PRES", "Atmospheric pressure, hPa"),
    ("DEWP", "Dew point temperature, °C"),
    ("RAIN", "Precipitation, mm"),
    ("wd", "Wind direction, compass points"),
    ("WSPM", "Wind speed, m/s"),
    ("station", "Monitoring station identifier"),
];

/// GUI Application state
#[derive(Debug, Clone, PartialEq)]
pub enum GuiState {
    Ready,
    Loaded,
    Error(String),
}

impl Default for GuiState {
    fn default() -> Self {
        GuiState::Ready
    }
}

/// The four dashboard views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Wrangling,
    Exploratory,
    PollutionHeatmap,
    WeatherHeatmap,
}

/// Everything the views render, computed once after load
struct Derived {
    stations: Vec<String>,
    combined_header: Vec<String>,
    combined_head: Vec<Vec<String>>,
    wrangled_head: Vec<Vec<String>>,
    missing_counts: Vec<(String, u64)>,
    field_bounds: Vec<FieldBounds>,
    pollution_header: Vec<String>,
    pollution_head: Vec<Vec<String>>,
    weather_header: Vec<String>,
    weather_head: Vec<Vec<String>>,
    correlation: CorrelationMatrix,
    pollution_pivot: PivotTable,
    weather_pivot: PivotTable,
    /// means[pollutant][station]
    pollutant_means: Vec<Vec<Option<f64>>>,
    /// spreads[weather field][station]
    weather_spreads: Vec<Vec<Option<FiveNumber>>>,
}

impl Derived {
    fn build(bundle: &DatasetBundle, pivot_min_total: u64) -> Self {
        let stations = bundle.clean.distinct_stations();
        let wrangled = bundle.combined.wrangled();

        let pollutant_means = POLLUTANT_FIELDS
            .iter()
            .map(|field| {
                stations
                    .iter()
                    .map(|station| {
                        bundle
                            .clean
                            .column_for_station(field, station)
                            .as_deref()
                            .and_then(column_mean)
                    })
                    .collect()
            })
            .collect();
        let weather_spreads = WEATHER_FIELDS
            .iter()
            .map(|field| {
                stations
                    .iter()
                    .map(|station| {
                        bundle
                            .clean
                            .column_for_station(field, station)
                            .as_deref()
                            .and_then(FiveNumber::from_column)
                    })
                    .collect()
            })
            .collect();

        Derived {
            combined_header: bundle.combined.header(),
            combined_head: bundle.combined.head(HEAD_ROWS),
            wrangled_head: wrangled.table.head(HEAD_ROWS),
            missing_counts: bundle.combined.missing_counts(),
            field_bounds: wrangled.field_bounds,
            pollution_header: bundle.pollution_groups.header(),
            pollution_head: bundle.pollution_groups.head(HEAD_ROWS),
            weather_header: bundle.weather_groups.header(),
            weather_head: bundle.weather_groups.head(HEAD_ROWS),
            correlation: clean_correlation(&bundle.clean),
            pollution_pivot: pivot_counts(&bundle.pollution_groups)
                .retain_frequent(pivot_min_total),
            weather_pivot: pivot_counts(&bundle.weather_groups).retain_frequent(pivot_min_total),
            pollutant_means,
            weather_spreads,
            stations,
        }
    }
}

/// GUI Application
pub struct GuiApp {
    data_dir: Option<PathBuf>,
    cache: DatasetCache,
    state: GuiState,
    view: View,
    selected_pollutant: usize,
    selected_weather: usize,
    derived: Option<Derived>,
}

impl GuiApp {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        let mut app = Self {
            data_dir,
            cache: DatasetCache::new(),
            state: GuiState::default(),
            view: View::Wrangling,
            selected_pollutant: 0,
            selected_weather: 0,
            derived: None,
        };
        if app.data_dir.is_some() {
            app.load();
        }
        app
    }

    fn load(&mut self) {
        let Some(dir) = self.data_dir.clone() else {
            return;
        };
        let source = DirSource::new(dir);
        match self.cache.get_or_load(&source) {
            Ok(bundle) => {
                self.derived = Some(Derived::build(bundle, DEFAULT_PIVOT_MIN_TOTAL));
                self.state = GuiState::Loaded;
            }
            Err(e) => {
                self.state = GuiState::Error(e.to_string());
            }
        }
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        match &self.state {
            GuiState::Ready => {
                self.show_picker(ctx);
            }
            GuiState::Error(msg) => {
                let msg = msg.clone();
                self.show_error(ctx, msg);
            }
            GuiState::Loaded => {
                self.show_dashboard(ctx);
            }
        }
    }
}

impl GuiApp {
    fn show_picker(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Air Pollution and Weather Conditions Dashboard");
            ui.add_space(10.0);
            ui.label("Choose the directory holding the four dashboard tables:");
            ui.monospace("CombinedData_better.csv");
            ui.monospace("CombinedData_clean.csv");
            ui.monospace("Pollution_Groups.csv");
            ui.monospace("Weather_Groups.csv");
            ui.add_space(10.0);
            if ui.button("Browse...").clicked() {
                if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                    self.data_dir = Some(dir);
                    self.load();
                }
            }
        });
    }

    fn show_error(&mut self, ctx: &egui::Context, msg: String) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.colored_label(egui::Color32::RED, format!("Failed to load data: {}", msg));
            ui.add_space(20.0);
            if ui.button("Try again").clicked() {
                self.data_dir = None;
                self.state = GuiState::Ready;
            }
        });
    }

    fn show_dashboard(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("sidebar")
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Choose an option:");
                ui.add_space(8.0);
                ui.radio_value(&mut self.view, View::Wrangling, "Data Wrangling");
                ui.radio_value(&mut self.view, View::Exploratory, "Exploratory Data Analysis");
                ui.radio_value(&mut self.view, View::PollutionHeatmap, "Pollution Heatmap");
                ui.radio_value(&mut self.view, View::WeatherHeatmap, "Weather Heatmap");
                ui.with_layout(egui::Layout::bottom_up(egui::Align::LEFT), |ui| {
                    ui.weak(format!("airdash v{}", env!("CARGO_PKG_VERSION")));
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().auto_shrink(false).show(ui, |ui| {
                match self.view {
                    View::Wrangling => self.show_wrangling(ui),
                    View::Exploratory => self.show_exploratory(ui),
                    View::PollutionHeatmap => self.show_pollution(ui),
                    View::WeatherHeatmap => self.show_weather(ui),
                }
            });
        });
    }

    fn show_wrangling(&mut self, ui: &mut egui::Ui) {
        let Some(derived) = &self.derived else {
            return;
        };

        ui.heading("Gathering Data");
        ui.add_space(6.0);
        preview_table(ui, "combined-head", &derived.combined_header, &derived.combined_head);

        ui.add_space(10.0);
        ui.collapsing("Field reference", |ui| {
            egui::Grid::new("field-notes").striped(true).show(ui, |ui| {
                for (field, note) in FIELD_NOTES {
                    ui.strong(*field);
                    ui.label(*note);
                    ui.end_row();
                }
            });
        });

        ui.add_space(10.0);
        ui.heading("Missing Values");
        ui.label(
            "Wind direction is forward-filled from the previous reading; \
             numeric gaps stay missing until the outlier pass.",
        );
        ui.add_space(4.0);
        egui::Grid::new("missing-counts").striped(true).show(ui, |ui| {
            ui.strong("column");
            ui.strong("missing");
            ui.end_row();
            for (field, count) in &derived.missing_counts {
                ui.label(field);
                ui.label(count.to_string());
                ui.end_row();
            }
        });

        ui.add_space(10.0);
        ui.heading("Outlier Handling");
        ui.label("Readings beyond 1.5 IQR from the quartiles are clipped to the bound.");
        ui.add_space(4.0);
        egui::Grid::new("clip-bounds").striped(true).show(ui, |ui| {
            ui.strong("column");
            ui.strong("Q1");
            ui.strong("Q3");
            ui.strong("IQR");
            ui.strong("lower");
            ui.strong("upper");
            ui.end_row();
            for fb in &derived.field_bounds {
                ui.label(&fb.field);
                match fb.bounds {
                    Some(bounds) => {
                        ui.label(format!("{:.2}", bounds.q1));
                        ui.label(format!("{:.2}", bounds.q3));
                        ui.label(format!("{:.2}", bounds.iqr()));
                        ui.label(format!("{:.2}", bounds.lower));
                        ui.label(format!("{:.2}", bounds.upper));
                    }
                    None => {
                        ui.label("insufficient data");
                        ui.label("-");
                        ui.label("-");
                        ui.label("-");
                        ui.label("-");
                    }
                }
                ui.end_row();
            }
        });

        ui.add_space(10.0);
        ui.heading("Clean Data");
        preview_table(ui, "wrangled-head", &derived.combined_header, &derived.wrangled_head);
    }

    fn show_exploratory(&mut self, ui: &mut egui::Ui) {
        let Some(derived) = &self.derived else {
            return;
        };

        ui.heading("Pollution and Weather Data");
        ui.add_space(6.0);
        ui.strong("Pollution groups");
        preview_table(ui, "pollution-head", &derived.pollution_header, &derived.pollution_head);
        ui.add_space(8.0);
        ui.strong("Weather groups");
        preview_table(ui, "weather-head", &derived.weather_header, &derived.weather_head);

        ui.add_space(12.0);
        ui.heading("Correlation of Weather and Pollution");
        ui.label("How strongly the weather drives the pollution level of each city.");
        ui.add_space(6.0);
        charts::correlation_heatmap(ui, "correlation", &derived.correlation);
    }

    fn show_pollution(&mut self, ui: &mut egui::Ui) {
        ui.heading("Pollution Conditions Across Cities");
        ui.add_space(6.0);

        let mut selected = self.selected_pollutant;
        egui::ComboBox::from_label("Select a pollutant")
            .selected_text(POLLUTANT_FIELDS[selected])
            .show_ui(ui, |ui| {
                for (i, field) in POLLUTANT_FIELDS.iter().enumerate() {
                    ui.selectable_value(&mut selected, i, *field);
                }
            });
        self.selected_pollutant = selected;

        let Some(derived) = &self.derived else {
            return;
        };

        ui.add_space(6.0);
        ui.label(format!(
            "Mean {} level per station",
            POLLUTANT_FIELDS[selected]
        ));
        charts::station_means_chart(
            ui,
            "pollution-means",
            &derived.stations,
            &derived.pollutant_means[selected],
            POLLUTANT_FIELDS[selected],
        );

        ui.add_space(12.0);
        ui.heading("Pollution Across Cities");
        charts::count_heatmap(ui, "pollution-pivot", &derived.pollution_pivot);
    }

    fn show_weather(&mut self, ui: &mut egui::Ui) {
        ui.heading("Weather Conditions Across Cities");
        ui.add_space(6.0);

        let mut selected = self.selected_weather;
        egui::ComboBox::from_label("Select a weather parameter")
            .selected_text(WEATHER_FIELDS[selected])
            .show_ui(ui, |ui| {
                for (i, field) in WEATHER_FIELDS.iter().enumerate() {
                    ui.selectable_value(&mut selected, i, *field);
                }
            });
        self.selected_weather = selected;

        let Some(derived) = &self.derived else {
            return;
        };

        ui.add_space(6.0);
        ui.label(format!(
            "{} distribution per station",
            WEATHER_FIELDS[selected]
        ));
        charts::station_box_chart(
            ui,
            "weather-spread",
            &derived.stations,
            &derived.weather_spreads[selected],
            WEATHER_FIELDS[selected],
        );

        ui.add_space(12.0);
        ui.heading("Weather Conditions Across Cities");
        charts::count_heatmap(ui, "weather-pivot", &derived.weather_pivot);
    }
}

/// Render the first rows of a table
fn preview_table(ui: &mut egui::Ui, id_salt: &str, header: &[String], rows: &[Vec<String>]) {
    ui.push_id(id_salt, |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .vscroll(false)
            .columns(Column::auto().at_least(48.0), header.len())
            .header(20.0, |mut header_row| {
                for name in header {
                    header_row.col(|ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|mut body| {
                for row in rows {
                    body.row(18.0, |mut table_row| {
                        for cell in row {
                            table_row.col(|ui| {
                                ui.label(cell);
                            });
                        }
                    });
                }
            });
    });
}
