//! Defines command-line interface options using `clap` for cds2nmme.

use clap::Parser;

/// Convert CDS forecast NetCDF files to NMME naming, units and grid
#[derive(Parser, Debug)]
#[command(
    version,
    name = "cds2nmme",
    about = "Convert CDS seasonal forecast files to match an NMME reference grid"
)]
pub struct Args {
    /// Folder holding the CDS NetCDF files (no trailing slash)
    #[arg(short, long)]
    pub cds_folder: String,

    /// NMME NetCDF file providing the X/Y reference grid
    #[arg(short, long)]
    pub nmme_file: String,

    /// Folder the converted files are written to (no trailing slash)
    #[arg(short, long)]
    pub save_path: String,

    /// Print the reference grid and enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
