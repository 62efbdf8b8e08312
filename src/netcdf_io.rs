//! NetCDF I/O for in-memory datasets
//!
//! Reading decodes CF packing the way most NetCDF readers do: values equal
//! to `_FillValue` or `missing_value` become NaN, then `scale_factor` and
//! `add_offset` are applied. Writing reverses the masking (NaN becomes the
//! fill value) but stores decoded, unpacked values.

use crate::dataset::{DataVariable, Dataset, ElementType};
use crate::errors::{ConvertError, Result};
use chrono::Utc;
use log::{debug, warn};
use ndarray::{ArrayD, IxDyn};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::{AttributeValue, File, FileMut, Variable};
use std::{fs, path::Path};

const FILL_VALUE: &str = "_FillValue";
const MISSING_VALUE: &str = "missing_value";
const SCALE_FACTOR: &str = "scale_factor";
const ADD_OFFSET: &str = "add_offset";

/// Open a NetCDF file and load its root group into a [`Dataset`]
///
/// # Errors
///
/// Returns an error if the file cannot be opened as NetCDF. Variables of a
/// non-numeric type are skipped with a warning.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let file = netcdf::open(path)?;
    debug!("Opened {}", path.display());
    dataset_from_file(&file)
}

/// Load the root group of an already opened file
pub fn dataset_from_file(file: &File) -> Result<Dataset> {
    let mut dataset = Dataset::new();

    for dim in file.dimensions() {
        dataset.add_dimension(&dim.name(), dim.len())?;
    }

    for var in file.variables() {
        match read_variable(&var) {
            Ok(variable) => dataset.add_variable(variable)?,
            Err(ConvertError::UnsupportedType { var, vartype }) => {
                warn!("Skipping variable '{}' of unsupported type {}", var, vartype);
            }
            Err(e) => return Err(e),
        }
    }

    for attr in file.attributes() {
        dataset.set_attribute(attr.name(), attr.value()?);
    }

    Ok(dataset)
}

/// Load only the named variables (and the dimensions they span)
///
/// Global attributes and every other variable are left unread.
///
/// # Errors
///
/// Returns [`ConvertError::VariableNotFound`] if a name is absent, or any
/// error reading the requested variables.
pub fn read_variables<P: AsRef<Path>>(path: P, names: &[&str]) -> Result<Dataset> {
    let path = path.as_ref();
    let file = netcdf::open(path)?;
    debug!("Opened {} for {:?}", path.display(), names);

    let mut dataset = Dataset::new();
    for name in names {
        let var = file
            .variable(name)
            .ok_or_else(|| ConvertError::VariableNotFound {
                var: name.to_string(),
            })?;
        for dim in var.dimensions() {
            if dataset.dimension(&dim.name()).is_none() {
                dataset.add_dimension(&dim.name(), dim.len())?;
            }
        }
        dataset.add_variable(read_variable(&var)?)?;
    }

    Ok(dataset)
}

fn element_type_of(vartype: &NcVariableType) -> Option<ElementType> {
    match vartype {
        NcVariableType::Int(IntType::I8) => Some(ElementType::I8),
        NcVariableType::Int(IntType::U8) => Some(ElementType::U8),
        NcVariableType::Int(IntType::I16) => Some(ElementType::I16),
        NcVariableType::Int(IntType::U16) => Some(ElementType::U16),
        NcVariableType::Int(IntType::I32) => Some(ElementType::I32),
        NcVariableType::Int(IntType::U32) => Some(ElementType::U32),
        NcVariableType::Int(IntType::I64) => Some(ElementType::I64),
        NcVariableType::Int(IntType::U64) => Some(ElementType::U64),
        NcVariableType::Float(FloatType::F32) => Some(ElementType::F32),
        NcVariableType::Float(FloatType::F64) => Some(ElementType::F64),
        _ => None,
    }
}

fn read_variable(var: &Variable) -> Result<DataVariable> {
    let name = var.name();
    let vartype = var.vartype();
    let element_type =
        element_type_of(&vartype).ok_or_else(|| ConvertError::UnsupportedType {
            var: name.clone(),
            vartype: format!("{:?}", vartype),
        })?;

    let dimensions: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let values: Vec<f64> = var.get_values::<f64, _>(..)?;
    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;

    let attributes = var
        .attributes()
        .map(|attr| -> Result<(String, AttributeValue)> {
            Ok((attr.name().to_string(), attr.value()?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut variable = DataVariable {
        name,
        dimensions,
        data,
        element_type,
        attributes,
    };
    decode_mask_and_scale(&mut variable);
    Ok(variable)
}

/// First numeric element of an attribute, as f64
pub fn attribute_as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Double(v) => Some(*v),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Float(v) => Some(f64::from(*v)),
        AttributeValue::Floats(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Int(v) => Some(f64::from(*v)),
        AttributeValue::Ints(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Short(v) => Some(f64::from(*v)),
        AttributeValue::Shorts(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Uint(v) => Some(f64::from(*v)),
        AttributeValue::Uints(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Ushort(v) => Some(f64::from(*v)),
        AttributeValue::Ushorts(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Uchar(v) => Some(f64::from(*v)),
        AttributeValue::Uchars(v) => v.first().map(|x| f64::from(*x)),
        _ => None,
    }
}

fn decode_mask_and_scale(var: &mut DataVariable) {
    let sentinels: Vec<f64> = [FILL_VALUE, MISSING_VALUE]
        .iter()
        .filter_map(|name| var.attribute(name).and_then(attribute_as_f64))
        .filter(|v| !v.is_nan())
        .collect();

    let mut masked = 0usize;
    if !sentinels.is_empty() {
        var.data.mapv_inplace(|v| {
            if sentinels.contains(&v) {
                masked += 1;
                f64::NAN
            } else {
                v
            }
        });
    }

    let scale_attr = var.remove_attribute(SCALE_FACTOR);
    let offset_attr = var.remove_attribute(ADD_OFFSET);
    let scale = scale_attr.as_ref().and_then(attribute_as_f64);
    let offset = offset_attr.as_ref().and_then(attribute_as_f64);
    let packed = scale.is_some() || offset.is_some();

    if packed {
        let scale = scale.unwrap_or(1.0);
        let offset = offset.unwrap_or(0.0);
        var.data.mapv_inplace(|v| v * scale + offset);
    }

    if !var.element_type.is_float() && (packed || masked > 0) {
        // The on-disk integer sentinels no longer describe the decoded values
        var.remove_attribute(FILL_VALUE);
        var.remove_attribute(MISSING_VALUE);
        var.element_type = match scale_attr {
            Some(AttributeValue::Float(_)) if masked == 0 => ElementType::F32,
            _ => ElementType::F64,
        };
        debug!(
            "Decoded '{}' to {} ({} masked values, packed: {})",
            var.name,
            var.element_type.as_str(),
            masked,
            packed
        );
    }
}

/// Fill value used for NaN when writing a floating-point variable
fn fill_value_of(var: &DataVariable) -> Option<f64> {
    var.attribute(FILL_VALUE)
        .or_else(|| var.attribute(MISSING_VALUE))
        .and_then(attribute_as_f64)
}

/// Write a variable's data with a concrete element type.
///
/// `_FillValue` goes on first because NetCDF-4 rejects it once data exists.
macro_rules! put_as {
    ($file:expr, $var:expr, $dims:expr, $ty:ty, $fill:expr) => {{
        let mut nc_var = $file.add_variable::<$ty>(&$var.name, $dims)?;
        if let Some(fill) = $fill {
            nc_var.put_attribute(FILL_VALUE, fill as $ty)?;
        }
        let replacement = $fill.unwrap_or(f64::NAN);
        let array: ArrayD<$ty> = $var
            .data
            .mapv(|v| if v.is_nan() { replacement as $ty } else { v as $ty });
        if array.ndim() == 0 {
            nc_var.put(array.view(), &[] as &[usize])?;
        } else {
            nc_var.put(array.view(), ..)?;
        }
        for (name, value) in $var.attributes.iter().filter(|(n, _)| n != FILL_VALUE) {
            nc_var.put_attribute(name, value.clone())?;
        }
    }};
}

fn write_variable(file: &mut FileMut, var: &DataVariable) -> Result<()> {
    let dims: Vec<&str> = var.dimensions.iter().map(String::as_str).collect();

    let fill = if var.element_type.is_float() {
        match fill_value_of(var) {
            Some(fv) => Some(fv),
            // NaN itself marks missing data in float variables
            None if var.attribute(MISSING_VALUE).is_none() && var.has_missing() => Some(f64::NAN),
            None => None,
        }
    } else {
        if var.has_missing() {
            warn!(
                "Variable '{}' is {} but holds missing values; they will be written as 0",
                var.name,
                var.element_type.as_str()
            );
        }
        var.attribute(FILL_VALUE).and_then(attribute_as_f64)
    };

    match var.element_type {
        ElementType::I8 => put_as!(file, var, &dims, i8, fill),
        ElementType::U8 => put_as!(file, var, &dims, u8, fill),
        ElementType::I16 => put_as!(file, var, &dims, i16, fill),
        ElementType::U16 => put_as!(file, var, &dims, u16, fill),
        ElementType::I32 => put_as!(file, var, &dims, i32, fill),
        ElementType::U32 => put_as!(file, var, &dims, u32, fill),
        ElementType::I64 => put_as!(file, var, &dims, i64, fill),
        ElementType::U64 => put_as!(file, var, &dims, u64, fill),
        ElementType::F32 => put_as!(file, var, &dims, f32, fill),
        ElementType::F64 => put_as!(file, var, &dims, f64, fill),
    }
    Ok(())
}

/// Write a dataset to a new NetCDF file, replacing anything at `path`
///
/// Global attributes are copied and a timestamped line is prepended to
/// `history`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or any write fails.
pub fn write_dataset<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        fs::remove_file(path)?;
    }

    let mut file = netcdf::create(path)?;

    for dim in dataset.dimensions() {
        file.add_dimension(&dim.name, dim.len)?;
    }

    for var in dataset.variables() {
        write_variable(&mut file, var)?;
    }

    for (name, value) in dataset.attributes().iter().filter(|(n, _)| n != "history") {
        file.add_attribute(name, value.clone())?;
    }

    let stamp = format!("{}: written by cds2nmme", Utc::now().to_rfc3339());
    let history = match dataset.attribute("history") {
        Some(AttributeValue::Str(previous)) if !previous.is_empty() => {
            format!("{}\n{}", stamp, previous)
        }
        _ => stamp,
    };
    file.add_attribute("history", history)?;

    debug!("Wrote {}", path.display());
    Ok(())
}
