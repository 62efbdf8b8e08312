//! In-memory labelled datasets
//!
//! A [`Dataset`] holds named dimensions, variables whose axes refer to those
//! dimensions by name, and global attributes. Values are kept decoded as
//! `f64` with NaN marking missing data; each variable remembers the element
//! type it should be written back with.
//!
//! The operations here are the label-based primitives a convention
//! conversion needs: renaming, deriving a scaled variable, dropping a
//! variable and nearest-neighbour reindexing onto new coordinate values.

use crate::errors::{ConvertError, Result};
use log::debug;
use ndarray::{ArrayD, Axis, ErrorKind, IxDyn, ShapeError};
use netcdf::AttributeValue;

/// Element type a variable is stored with on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementType {
    /// Whether the type can hold NaN
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I8 => "byte",
            Self::U8 => "ubyte",
            Self::I16 => "short",
            Self::U16 => "ushort",
            Self::I32 => "int",
            Self::U32 => "uint",
            Self::I64 => "int64",
            Self::U64 => "uint64",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }
}

/// A named dimension and its length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

/// A variable: labelled axes, decoded values and attributes
#[derive(Debug, Clone)]
pub struct DataVariable {
    pub name: String,
    pub dimensions: Vec<String>,
    pub data: ArrayD<f64>,
    pub element_type: ElementType,
    pub attributes: Vec<(String, AttributeValue)>,
}

impl DataVariable {
    /// Create a variable without attributes
    pub fn new(
        name: &str,
        dimensions: &[&str],
        data: ArrayD<f64>,
        element_type: ElementType,
    ) -> Self {
        Self {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            data,
            element_type,
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with_attribute<T: Into<AttributeValue>>(mut self, name: &str, value: T) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Insert or replace an attribute, keeping the original position on replace
    pub fn set_attribute<T: Into<AttributeValue>>(&mut self, name: &str, value: T) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        let pos = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// True if any value is missing
    pub fn has_missing(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }

    /// Position of `dim` among this variable's axes
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d == dim)
    }

    fn is_coordinate(&self) -> bool {
        self.dimensions.len() == 1 && self.dimensions[0] == self.name
    }
}

/// A collection of dimensions, variables and global attributes
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    dimensions: Vec<Dimension>,
    variables: Vec<DataVariable>,
    attributes: Vec<(String, AttributeValue)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn variables(&self) -> &[DataVariable] {
        &self.variables
    }

    pub fn attributes(&self) -> &[(String, AttributeValue)] {
        &self.attributes
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut DataVariable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    /// Global attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Insert or replace a global attribute
    pub fn set_attribute<T: Into<AttributeValue>>(&mut self, name: &str, value: T) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Define a new dimension
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::LabelExists`] if the name is taken.
    pub fn add_dimension(&mut self, name: &str, len: usize) -> Result<()> {
        if self.dimension(name).is_some() {
            return Err(ConvertError::LabelExists {
                label: name.to_string(),
            });
        }
        self.dimensions.push(Dimension {
            name: name.to_string(),
            len,
        });
        Ok(())
    }

    /// Add a variable whose dimensions are already defined
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken, a dimension is unknown, or the
    /// data shape disagrees with the dimension lengths.
    pub fn add_variable(&mut self, variable: DataVariable) -> Result<()> {
        if self.variable(&variable.name).is_some() {
            return Err(ConvertError::LabelExists {
                label: variable.name,
            });
        }
        self.check_shape(&variable)?;
        self.variables.push(variable);
        Ok(())
    }

    fn check_shape(&self, variable: &DataVariable) -> Result<()> {
        let mut expected = Vec::with_capacity(variable.dimensions.len());
        for dim in &variable.dimensions {
            let len = self
                .dimension(dim)
                .ok_or_else(|| ConvertError::DimensionNotFound { dim: dim.clone() })?
                .len;
            expected.push(len);
        }
        if variable.data.shape() != expected.as_slice() {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        Ok(())
    }

    /// The 1-D coordinate variable labelling `dim`
    ///
    /// # Errors
    ///
    /// Returns an error if the dimension or its coordinate variable is missing.
    pub fn coordinate(&self, dim: &str) -> Result<&DataVariable> {
        if self.dimension(dim).is_none() {
            return Err(ConvertError::DimensionNotFound {
                dim: dim.to_string(),
            });
        }
        self.variables
            .iter()
            .find(|v| v.name == dim && v.is_coordinate())
            .ok_or_else(|| ConvertError::VariableNotFound {
                var: dim.to_string(),
            })
    }

    /// Rename a dimension and/or variable, updating every axis that refers to it
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::LabelNotFound`] if `old` is neither a
    /// dimension nor a variable, and [`ConvertError::LabelExists`] if `new`
    /// is already used by something else.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let has_dim = self.dimension(old).is_some();
        let has_var = self.variable(old).is_some();
        if !has_dim && !has_var {
            return Err(ConvertError::LabelNotFound {
                label: old.to_string(),
            });
        }
        if old == new {
            return Ok(());
        }
        if self.dimension(new).is_some() || self.variable(new).is_some() {
            return Err(ConvertError::LabelExists {
                label: new.to_string(),
            });
        }

        for dim in self.dimensions.iter_mut().filter(|d| d.name == old) {
            dim.name = new.to_string();
        }
        for var in &mut self.variables {
            if var.name == old {
                var.name = new.to_string();
            }
            for axis in var.dimensions.iter_mut().filter(|a| a.as_str() == old) {
                *axis = new.to_string();
            }
        }
        Ok(())
    }

    /// Store `source * factor` as `target`, replacing any existing `target`
    ///
    /// The derived variable keeps the source's axes but none of its
    /// attributes. Single precision sources stay single precision; anything
    /// else becomes double.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::VariableNotFound`] if `source` is missing.
    pub fn derive_scaled(&mut self, source: &str, target: &str, factor: f64) -> Result<()> {
        let src = self
            .variable(source)
            .ok_or_else(|| ConvertError::VariableNotFound {
                var: source.to_string(),
            })?;

        let element_type = if src.element_type == ElementType::F32 {
            ElementType::F32
        } else {
            ElementType::F64
        };
        let derived = DataVariable {
            name: target.to_string(),
            dimensions: src.dimensions.clone(),
            data: src.data.mapv(|v| v * factor),
            element_type,
            attributes: Vec::new(),
        };

        match self.variable_mut(target) {
            Some(existing) => *existing = derived,
            None => self.variables.push(derived),
        }
        Ok(())
    }

    /// Remove a variable, returning it
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::VariableNotFound`] if it does not exist.
    pub fn drop_variable(&mut self, name: &str) -> Result<DataVariable> {
        let pos = self
            .variables
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| ConvertError::VariableNotFound {
                var: name.to_string(),
            })?;
        Ok(self.variables.remove(pos))
    }

    /// Resample along `dim` onto the values of a reference coordinate
    ///
    /// Like [`Dataset::reindex_nearest`], but the coordinate of `dim` also
    /// takes the reference's element type so it is written back with the
    /// reference's exact values.
    ///
    /// # Errors
    ///
    /// Same as [`Dataset::reindex_nearest`].
    pub fn reindex_onto(
        &mut self,
        dim: &str,
        reference: &DataVariable,
        tolerance: f64,
    ) -> Result<usize> {
        let target: Vec<f64> = reference.data.iter().copied().collect();
        let matched = self.reindex_nearest(dim, &target, tolerance)?;
        if let Some(coord) = self
            .variables
            .iter_mut()
            .find(|v| v.name == dim && v.is_coordinate())
        {
            coord.element_type = reference.element_type;
        }
        Ok(matched)
    }

    /// Resample along `dim` onto `target` coordinate values
    ///
    /// Each target value takes the data at the nearest existing coordinate
    /// if it lies within `tolerance`, otherwise the slot is missing. After
    /// the call the coordinate of `dim` equals `target` exactly. Integer
    /// variables that end up with missing values are promoted to double.
    ///
    /// Returns the number of target positions that found a match.
    ///
    /// # Errors
    ///
    /// Returns an error if `dim` has no coordinate variable or the
    /// coordinate is not strictly monotonic.
    pub fn reindex_nearest(&mut self, dim: &str, target: &[f64], tolerance: f64) -> Result<usize> {
        let index: Vec<f64> = self.coordinate(dim)?.data.iter().copied().collect();
        let indexer = nearest_indexer(dim, &index, target, tolerance)?;
        let matched = indexer.iter().filter(|i| i.is_some()).count();

        debug!(
            "Reindexing '{}': {} -> {} positions, {} matched within tolerance {}",
            dim,
            index.len(),
            target.len(),
            matched,
            tolerance
        );

        for var in &mut self.variables {
            let Some(axis) = var.axis_of(dim) else {
                continue;
            };

            if var.is_coordinate() {
                var.data = ArrayD::from_shape_vec(IxDyn(&[target.len()]), target.to_vec())?;
                if !var.element_type.is_float() && target.iter().any(|v| v.fract() != 0.0) {
                    var.element_type = ElementType::F64;
                }
                continue;
            }

            var.data = take_along_axis(&var.data, axis, &indexer);
            if !var.element_type.is_float() && var.has_missing() {
                debug!(
                    "Promoting '{}' from {} to double to hold missing values",
                    var.name,
                    var.element_type.as_str()
                );
                var.element_type = ElementType::F64;
            }
        }

        for d in self.dimensions.iter_mut().filter(|d| d.name == dim) {
            d.len = target.len();
        }

        Ok(matched)
    }
}

/// Gather positions along `axis`; `None` positions become NaN
fn take_along_axis(data: &ArrayD<f64>, axis: usize, indexer: &[Option<usize>]) -> ArrayD<f64> {
    let mut shape = data.shape().to_vec();
    shape[axis] = indexer.len();
    let mut out = ArrayD::from_elem(IxDyn(&shape), f64::NAN);

    for (dst, src) in indexer.iter().enumerate() {
        if let Some(src) = *src {
            out.index_axis_mut(Axis(axis), dst)
                .assign(&data.index_axis(Axis(axis), src));
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Increasing,
    Decreasing,
}

fn direction(index: &[f64]) -> Option<Direction> {
    if index.iter().any(|v| v.is_nan()) {
        return None;
    }
    if index.windows(2).all(|w| w[0] < w[1]) {
        Some(Direction::Increasing)
    } else if index.windows(2).all(|w| w[0] > w[1]) {
        Some(Direction::Decreasing)
    } else {
        None
    }
}

/// Map each target value to the position of the nearest index value
///
/// A match requires `|index[i] - target| <= tolerance`. When a target sits
/// exactly between two index values the larger value wins, on increasing
/// and decreasing indexes alike. NaN targets never match.
///
/// # Errors
///
/// Returns [`ConvertError::NonMonotonicIndex`] if `index` is not strictly
/// increasing or strictly decreasing.
pub fn nearest_indexer(
    dim: &str,
    index: &[f64],
    target: &[f64],
    tolerance: f64,
) -> Result<Vec<Option<usize>>> {
    let direction = direction(index).ok_or_else(|| ConvertError::NonMonotonicIndex {
        dim: dim.to_string(),
    })?;
    let n = index.len();

    let indexer = target
        .iter()
        .map(|&t| {
            if t.is_nan() {
                return None;
            }

            // `below` holds the nearest value <= t, `above` the nearest value >= t
            let (below, above) = match direction {
                Direction::Increasing => {
                    let p = index.partition_point(|&v| v <= t);
                    let q = index.partition_point(|&v| v < t);
                    (p.checked_sub(1), (q < n).then_some(q))
                }
                Direction::Decreasing => {
                    let p = index.partition_point(|&v| v > t);
                    let q = index.partition_point(|&v| v >= t);
                    ((p < n).then_some(p), q.checked_sub(1))
                }
            };

            let best = match (below, above) {
                (Some(b), Some(a)) => {
                    let db = t - index[b];
                    let da = index[a] - t;
                    // Ties go to the larger value whichever way the index runs
                    if db < da {
                        b
                    } else {
                        a
                    }
                }
                (Some(b), None) => b,
                (None, Some(a)) => a,
                (None, None) => return None,
            };

            ((index[best] - t).abs() <= tolerance).then_some(best)
        })
        .collect();

    Ok(indexer)
}
