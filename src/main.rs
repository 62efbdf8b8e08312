//! Entry point for the cds2nmme converter.
//! Parses arguments, sets up logging and runs the batch conversion.

use cds2nmme::cli::Args;
use cds2nmme::convert::Converter;
use cds2nmme::metadata::print_dataset_summary;
use clap::Parser;
use log::LevelFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    println!("=== CDS to NMME Converter ===");

    let converter = Converter::new(&args.nmme_file)?;
    if args.verbose {
        print_dataset_summary("Reference grid", converter.reference());
    }

    let written = converter.run(&args.cds_folder, &args.save_path)?;

    println!("\n✅ Converted {} file(s)", written.len());
    Ok(())
}
