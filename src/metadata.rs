//! Dataset inspection
//!
//! Prints dimensions and variables of an in-memory [`Dataset`] in a compact,
//! sorted layout.

use crate::dataset::Dataset;
use netcdf::AttributeValue;

/// Lists dimensions and variables with their shapes and key attributes.
pub fn print_dataset_summary(title: &str, dataset: &Dataset) {
    println!("\n {}", title);
    println!("={}", "=".repeat(title.len() + 1));

    let mut dimensions: Vec<_> = dataset.dimensions().iter().collect();
    dimensions.sort_by(|a, b| a.name.cmp(&b.name));

    println!(" Dimensions:");
    if dimensions.is_empty() {
        println!("   (No dimensions found)");
    }
    for dim in dimensions {
        println!("    {} = {}", dim.name, dim.len);
    }

    let mut variables: Vec<_> = dataset.variables().iter().collect();
    variables.sort_by(|a, b| a.name.cmp(&b.name));

    println!(" Variables:");
    if variables.is_empty() {
        println!("   (No variables found)");
    }
    for var in variables {
        if var.dimensions.is_empty() {
            println!("    {} ({}): scalar", var.name, var.element_type.as_str());
        } else {
            let shape: Vec<String> = var.data.shape().iter().map(|s| s.to_string()).collect();
            println!(
                "    {} ({}): [{}] = ({})",
                var.name,
                var.element_type.as_str(),
                var.dimensions.join(", "),
                shape.join(" x ")
            );
        }

        if let Some(AttributeValue::Str(units)) = var.attribute("units") {
            println!("      units: {}", units);
        }

        // Coordinate extent helps eyeball grid compatibility
        if var.dimensions.len() == 1 && var.dimensions[0] == var.name && !var.data.is_empty() {
            let first = var.data.iter().next().copied().unwrap_or(f64::NAN);
            let last = var.data.iter().last().copied().unwrap_or(f64::NAN);
            println!("      range: {} .. {}", first, last);
        }
    }
}
