mod charts;
mod cli;
mod dataset;
mod error;
mod output;
mod parse;
mod pivot;
mod stats;
mod summary;
mod types;

use std::path::PathBuf;

use clap::Parser;
use cli::{Cli, Commands};
use error::Error;
use types::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Clean { input, out }) => {
            let table = dataset::read_observations(&input)?;
            let wrangled = table.wrangled();

            for field_bounds in &wrangled.field_bounds {
                if field_bounds.bounds.is_none() {
                    eprintln!(
                        "Column '{}' has no complete values; left unmodified",
                        field_bounds.field
                    );
                }
            }

            if let Some(out_path) = out {
                output::write_observations_file(&wrangled.table, &out_path)?;
                eprintln!("Cleaned readings written to: {}", out_path.display());
            } else {
                output::write_observations_stdout(&wrangled.table)?;
            }
        }
        Some(Commands::Summarize {
            data_dir,
            out,
            pivot_min_total,
            hash_files,
        }) => {
            let options = types::SummaryOptions {
                pivot_min_total,
                hash_files,
            };
            let summary = summary::build_summary(&dataset::DirSource::new(data_dir), &options)?;

            if let Some(out_path) = out {
                output::write_json_file(&summary, &out_path)?;
                eprintln!("Summary written to: {}", out_path.display());
            } else {
                output::write_json_stdout(&summary)?;
            }
        }
        Some(Commands::Gui { data_dir }) => {
            run_gui(data_dir)?;
        }
        None => {
            run_gui(None)?;
        }
    }

    Ok(())
}

fn run_gui(data_dir: Option<PathBuf>) -> Result<()> {
    use crate::cli::GuiApp;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Air Pollution and Weather Conditions Dashboard",
        options,
        Box::new(|_cc| Box::new(GuiApp::new(data_dir))),
    )
    .map_err(|e| Error::InvalidInput(format!("GUI error: {}", e)))?;

    Ok(())
}
