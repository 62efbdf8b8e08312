//! Creates a sample CDS forecast file and an NMME reference grid.
//!
//! Writes `sample_data/CDS/cds_sample.nc` and `sample_data/NMME/nmme_ref.nc`
//! and creates `sample_data/CDS_converted`, ready for:
//!
//! ```text
//! cargo run -- -c sample_data/CDS -n sample_data/NMME/nmme_ref.nc -s sample_data/CDS_converted
//! ```

use ndarray::{Array1, Array5};
use netcdf::create;
use std::fs;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = Path::new("sample_data");
    fs::create_dir_all(root.join("CDS"))?;
    fs::create_dir_all(root.join("NMME"))?;
    fs::create_dir_all(root.join("CDS_converted"))?;

    let cds_path = root.join("CDS").join("cds_sample.nc");
    println!("🔨 Creating CDS sample: {}", cds_path.display());
    if cds_path.exists() {
        fs::remove_file(&cds_path)?;
    }

    // 1-degree global grid, latitude north to south as CDS publishes it
    let lats: Vec<f32> = (0..181).map(|i| 90.0 - i as f32).collect();
    let lons: Vec<f32> = (0..360).map(|i| i as f32).collect();
    let months: Vec<i64> = vec![1, 2, 3];
    let members: Vec<i32> = (0..5).collect();

    {
        let mut file = create(&cds_path)?;
        file.add_attribute("Conventions", "CF-1.7")?;
        file.add_attribute("institution", "European Centre for Medium-Range Weather Forecasts")?;

        file.add_dimension("forecastMonth", months.len())?;
        file.add_dimension("number", members.len())?;
        file.add_dimension("forecast_reference_time", 1)?;
        file.add_dimension("latitude", lats.len())?;
        file.add_dimension("longitude", lons.len())?;

        {
            let mut var = file.add_variable::<i64>("forecastMonth", &["forecastMonth"])?;
            var.put_attribute("long_name", "months since forecast_reference_time")?;
            var.put(Array1::from(months.clone()).view(), ..)?;
        }
        {
            let mut var = file.add_variable::<i32>("number", &["number"])?;
            var.put_attribute("long_name", "ensemble member numerical id")?;
            var.put(Array1::from(members.clone()).view(), ..)?;
        }
        {
            let mut var = file.add_variable::<i64>(
                "forecast_reference_time",
                &["forecast_reference_time"],
            )?;
            var.put_attribute("units", "days since 1991-04-01")?;
            var.put_attribute("calendar", "proleptic_gregorian")?;
            var.put(Array1::from(vec![0i64]).view(), ..)?;
        }
        {
            let mut var = file.add_variable::<f32>("latitude", &["latitude"])?;
            var.put_attribute("units", "degrees_north")?;
            var.put(Array1::from(lats.clone()).view(), ..)?;
        }
        {
            let mut var = file.add_variable::<f32>("longitude", &["longitude"])?;
            var.put_attribute("units", "degrees_east")?;
            var.put(Array1::from(lons.clone()).view(), ..)?;
        }
        {
            let mut var = file.add_variable::<f32>(
                "tprate",
                &[
                    "forecastMonth",
                    "number",
                    "forecast_reference_time",
                    "latitude",
                    "longitude",
                ],
            )?;
            var.put_attribute("units", "m s**-1")?;
            var.put_attribute("long_name", "Mean total precipitation rate")?;

            // Wetter near the equator, a little spread across members
            let data = Array5::from_shape_fn(
                (months.len(), members.len(), 1, lats.len(), lons.len()),
                |(_, m, _, i, _)| {
                    let lat = lats[i].to_radians();
                    (2.0e-8 + 6.0e-8 * lat.cos().powi(4)) * (1.0 + 0.05 * m as f32)
                },
            );
            var.put(data.view(), ..)?;
        }
    }

    let nmme_path = root.join("NMME").join("nmme_ref.nc");
    println!("🔨 Creating NMME reference: {}", nmme_path.display());
    if nmme_path.exists() {
        fs::remove_file(&nmme_path)?;
    }

    {
        let mut file = create(&nmme_path)?;
        let xs: Vec<f32> = (0..360).map(|i| i as f32).collect();
        let ys: Vec<f32> = (0..181).map(|i| -90.0 + i as f32).collect();

        file.add_dimension("X", xs.len())?;
        file.add_dimension("Y", ys.len())?;
        {
            let mut var = file.add_variable::<f32>("X", &["X"])?;
            var.put_attribute("units", "degree_east")?;
            var.put(Array1::from(xs).view(), ..)?;
        }
        {
            let mut var = file.add_variable::<f32>("Y", &["Y"])?;
            var.put_attribute("units", "degree_north")?;
            var.put(Array1::from(ys).view(), ..)?;
        }
    }

    println!("✅ Sample inputs written under {}", root.display());
    Ok(())
}
