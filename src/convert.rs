//! CDS to NMME convention conversion
//!
//! A CDS seasonal forecast file is brought in line with an NMME reference:
//!
//! 1. `prec = tprate * 86400000` (m/s to mm/day)
//! 2. coordinates renamed: `longitude→X`, `latitude→Y`, `forecastMonth→L`,
//!    `number→M`, `forecast_reference_time→S`
//! 3. `tprate` dropped
//! 4. `Y` then `X` resampled onto the reference grid by nearest neighbour
//! 5. written next to the other outputs as `<stem>_modified.nc`
//!
//! Files are handled one at a time in directory-listing order and the first
//! failure stops the batch.

use crate::dataset::Dataset;
use crate::errors::{ConvertError, Result};
use crate::netcdf_io::{read_dataset, read_variables, write_dataset};
use log::{debug, info};
use std::fs;

/// Metres per second to millimetres per day
pub const MPS_TO_MM_PER_DAY: f64 = 86_400_000.0;

/// Maximum coordinate distance for a nearest-neighbour match, in the
/// coordinate's own units (degrees for CDS grids). Edit here to experiment.
pub const REINDEX_TOLERANCE: f64 = 1.0;

pub const SOURCE_VARIABLE: &str = "tprate";
pub const TARGET_VARIABLE: &str = "prec";
pub const OUTPUT_SUFFIX: &str = "_modified.nc";

/// CDS label to NMME label, applied in this order.
///
/// `forecastMonth` is carried over as-is; NMME lead times sit at
/// half-month offsets but no shift is applied.
pub const RENAMES: [(&str, &str); 5] = [
    ("longitude", "X"),
    ("latitude", "Y"),
    ("forecastMonth", "L"),
    ("number", "M"),
    ("forecast_reference_time", "S"),
];

/// Reference grid axes, in reindexing order
pub const GRID_AXES: [&str; 2] = ["Y", "X"];

/// Output file name for an input file name: drop the last three characters
/// (the `.nc` extension) and append `_modified.nc`.
pub fn output_file_name(file_name: &str) -> String {
    let cut = file_name
        .char_indices()
        .rev()
        .nth(2)
        .map_or(0, |(idx, _)| idx);
    format!("{}{}", &file_name[..cut], OUTPUT_SUFFIX)
}

/// Convert one CDS dataset to NMME conventions on the reference grid.
///
/// # Errors
///
/// Returns an error if `tprate` or any renamed label is missing, or if
/// either dataset lacks a usable X/Y coordinate.
pub fn convert_dataset(mut dataset: Dataset, reference: &Dataset) -> Result<Dataset> {
    dataset.derive_scaled(SOURCE_VARIABLE, TARGET_VARIABLE, MPS_TO_MM_PER_DAY)?;

    for (from, to) in RENAMES {
        dataset.rename(from, to)?;
    }

    dataset.drop_variable(SOURCE_VARIABLE)?;

    for axis in GRID_AXES {
        let target = reference.coordinate(axis)?;
        let len = target.data.len();
        let matched = dataset.reindex_onto(axis, target, REINDEX_TOLERANCE)?;
        if matched < len {
            debug!(
                "{} of {} reference {} values have no source cell within {}",
                len - matched,
                len,
                axis,
                REINDEX_TOLERANCE
            );
        }
    }

    Ok(dataset)
}

/// Batch converter holding the reference grid for its lifetime
#[derive(Debug, Clone)]
pub struct Converter {
    reference: Dataset,
}

impl Converter {
    /// Load the `X` and `Y` coordinates of the NMME reference file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks either axis.
    pub fn new(nmme_file_path: &str) -> Result<Self> {
        let reference = read_variables(nmme_file_path, &GRID_AXES)?;
        info!("Loaded reference grid from {}", nmme_file_path);
        Ok(Self { reference })
    }

    /// Use an already loaded reference dataset
    pub fn with_reference(reference: Dataset) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &Dataset {
        &self.reference
    }

    /// Convert a single file, returning the path written
    ///
    /// # Errors
    ///
    /// Propagates any read, conversion or write failure.
    pub fn convert_file(&self, cds_folder_path: &str, file: &str, save_path: &str) -> Result<String> {
        println!("Currently Modifying: {}", file);

        let current_file = format!("{}/{}", cds_folder_path, file);
        let dataset = read_dataset(&current_file)?;
        let converted = convert_dataset(dataset, &self.reference)?;

        let output_path = format!("{}/{}", save_path, output_file_name(file));
        write_dataset(&converted, &output_path)?;

        println!("Successfully Modified: {}", file);
        println!("Saved in: {}", output_path);
        Ok(output_path)
    }

    /// Convert every entry of `cds_folder_path` into `save_path`
    ///
    /// Entries are visited in the order the directory listing returns them.
    /// Returns the output paths written, in that order.
    ///
    /// # Errors
    ///
    /// Stops at the first entry that fails; earlier outputs stay on disk.
    pub fn run(&self, cds_folder_path: &str, save_path: &str) -> Result<Vec<String>> {
        let mut written = Vec::new();

        for entry in fs::read_dir(cds_folder_path)? {
            let entry = entry?;
            let file = entry
                .file_name()
                .into_string()
                .map_err(|name| ConvertError::InvalidFileName {
                    path: name.to_string_lossy().into_owned(),
                })?;
            written.push(self.convert_file(cds_folder_path, &file, save_path)?);
        }

        info!("Converted {} file(s) into {}", written.len(), save_path);
        Ok(written)
    }
}

/// Convert every CDS file in a folder to NMME conventions.
///
/// Paths are joined with `/` and must not end in a slash. Each input
/// `<name>.nc` produces `<save_path>/<name>_modified.nc`.
///
/// # Errors
///
/// The first failure (unreadable reference, unreadable or non-NetCDF entry,
/// missing variable or label, unwritable output) aborts the batch.
pub fn convert_cds_to_nmme(cds_folder_path: &str, nmme_file_path: &str, save_path: &str) -> Result<()> {
    Converter::new(nmme_file_path)?.run(cds_folder_path, save_path)?;
    Ok(())
}
