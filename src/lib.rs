//! cds2nmme: convert CDS seasonal forecasts to NMME conventions
//!
//! Copernicus Climate Data Store (CDS) seasonal forecast files and North
//! American Multi-Model Ensemble (NMME) files describe the same kind of data
//! with different names, units and grids. This crate rewrites CDS files so
//! they can be used side by side with an NMME reference file.
//!
//! ## Module Organization
//!
//! - [`dataset`]: In-memory labelled datasets with rename, derive, drop and
//!   nearest-neighbour reindex operations
//! - [`netcdf_io`]: Reading NetCDF files into datasets and writing them back
//! - [`convert`]: The CDS to NMME rules and the batch converter
//! - [`metadata`]: Dataset summaries for the terminal
//! - [`errors`]: Centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cds2nmme::convert_cds_to_nmme;
//!
//! convert_cds_to_nmme(
//!     "/data/CDS",
//!     "/data/NMME/prec.CanESM5.1991.mon_Apr.nc",
//!     "/data/CDS_converted",
//! )
//! .unwrap();
//! ```
//!
//! Paths are joined with `/` and must not end with a slash.

pub mod cli;
pub mod convert;
pub mod dataset;
pub mod errors;
pub mod metadata;
pub mod netcdf_io;

pub use convert::{convert_cds_to_nmme, convert_dataset, output_file_name, Converter};
pub use dataset::{DataVariable, Dataset, Dimension, ElementType};
pub use errors::{ConvertError, Result};
pub use netcdf_io::{read_dataset, read_variables, write_dataset};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::convert::{convert_cds_to_nmme, convert_dataset, Converter};
    pub use crate::dataset::{DataVariable, Dataset, ElementType};
    pub use crate::errors::{ConvertError, Result};
    pub use crate::netcdf_io::{read_dataset, write_dataset};
}
