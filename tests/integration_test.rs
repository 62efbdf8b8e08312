use cds2nmme::{
    convert::{convert_cds_to_nmme, output_file_name, Converter},
    errors::ConvertError,
    read_dataset,
};
use ndarray::Array2;
use ndarray::{Array1, Array5};
use netcdf::{create, open};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const LATITUDES: [f32; 3] = [2.0, 1.0, 0.0];
const LONGITUDES: [f32; 3] = [0.0, 1.0, 2.0];
const MEMBERS: usize = 2;

/// tprate at (member, lat index, lon index)
fn tprate_at(member: usize, lat: usize, lon: usize) -> f32 {
    1e-6 * (1 + lat * 3 + lon) as f32 + 1e-7 * member as f32
}

/// Writes a small CDS-style file: tprate(number, forecast_reference_time,
/// forecastMonth, latitude, longitude) with latitude descending.
fn write_cds_file(path: &Path) {
    let mut file = create(path).expect("Failed to create CDS file");

    file.add_dimension("number", MEMBERS).unwrap();
    file.add_dimension("forecast_reference_time", 1).unwrap();
    file.add_dimension("forecastMonth", 1).unwrap();
    file.add_dimension("latitude", LATITUDES.len()).unwrap();
    file.add_dimension("longitude", LONGITUDES.len()).unwrap();
    file.add_attribute("Conventions", "CF-1.7").unwrap();

    {
        let mut var = file.add_variable::<i32>("number", &["number"]).unwrap();
        var.put(Array1::from(vec![0i32, 1]).view(), ..).unwrap();
    }
    {
        let mut var = file
            .add_variable::<i64>("forecast_reference_time", &["forecast_reference_time"])
            .unwrap();
        var.put_attribute("units", "days since 1993-04-01").unwrap();
        var.put_attribute("calendar", "proleptic_gregorian").unwrap();
        var.put(Array1::from(vec![0i64]).view(), ..).unwrap();
    }
    {
        let mut var = file
            .add_variable::<i64>("forecastMonth", &["forecastMonth"])
            .unwrap();
        var.put(Array1::from(vec![1i64]).view(), ..).unwrap();
    }
    {
        let mut var = file.add_variable::<f32>("latitude", &["latitude"]).unwrap();
        var.put_attribute("units", "degrees_north").unwrap();
        var.put(Array1::from(LATITUDES.to_vec()).view(), ..).unwrap();
    }
    {
        let mut var = file.add_variable::<f32>("longitude", &["longitude"]).unwrap();
        var.put_attribute("units", "degrees_east").unwrap();
        var.put(Array1::from(LONGITUDES.to_vec()).view(), ..).unwrap();
    }
    {
        let mut var = file
            .add_variable::<f32>(
                "tprate",
                &[
                    "number",
                    "forecast_reference_time",
                    "forecastMonth",
                    "latitude",
                    "longitude",
                ],
            )
            .unwrap();
        var.put_attribute("units", "m s**-1").unwrap();
        let data = Array5::from_shape_fn((MEMBERS, 1, 1, 3, 3), |(m, _, _, i, j)| {
            tprate_at(m, i, j)
        });
        var.put(data.view(), ..).unwrap();
    }
}

/// Writes an NMME-style reference with ascending Y and the given X/Y values.
fn write_reference_file(path: &Path, xs: &[f32], ys: &[f32]) {
    let mut file = create(path).expect("Failed to create reference file");

    file.add_dimension("X", xs.len()).unwrap();
    file.add_dimension("Y", ys.len()).unwrap();
    {
        let mut var = file.add_variable::<f32>("X", &["X"]).unwrap();
        var.put_attribute("units", "degree_east").unwrap();
        var.put(Array1::from(xs.to_vec()).view(), ..).unwrap();
    }
    {
        let mut var = file.add_variable::<f32>("Y", &["Y"]).unwrap();
        var.put_attribute("units", "degree_north").unwrap();
        var.put(Array1::from(ys.to_vec()).view(), ..).unwrap();
    }
}

/// Writes a double precision reference with an extra data variable and a
/// string variable next to the grid.
fn write_f64_reference_file(path: &Path, xs: &[f64], ys: &[f64]) {
    let mut file = create(path).expect("Failed to create reference file");

    file.add_dimension("X", xs.len()).unwrap();
    file.add_dimension("Y", ys.len()).unwrap();
    {
        let mut var = file.add_variable::<f64>("X", &["X"]).unwrap();
        var.put(Array1::from(xs.to_vec()).view(), ..).unwrap();
    }
    {
        let mut var = file.add_variable::<f64>("Y", &["Y"]).unwrap();
        var.put(Array1::from(ys.to_vec()).view(), ..).unwrap();
    }
    {
        let mut var = file.add_variable::<f32>("prec", &["Y", "X"]).unwrap();
        var.put(Array2::<f32>::zeros((ys.len(), xs.len())).view(), ..)
            .unwrap();
    }
    {
        let mut var = file.add_string_variable("source", &["X"]).unwrap();
        for i in 0..xs.len() {
            var.put_string("NMME", [i]).unwrap();
        }
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    cds: String,
    reference: String,
    save: String,
}

fn fixture(xs: &[f32], ys: &[f32]) -> Fixture {
    let dir = tempdir().expect("Failed to create temp dir");
    let cds = dir.path().join("CDS");
    let save = dir.path().join("CDS_converted");
    fs::create_dir(&cds).unwrap();
    fs::create_dir(&save).unwrap();

    write_cds_file(&cds.join("test1.nc"));
    let reference = dir.path().join("ref.nc");
    write_reference_file(&reference, xs, ys);

    Fixture {
        cds: cds.to_str().unwrap().to_string(),
        reference: reference.to_str().unwrap().to_string(),
        save: save.to_str().unwrap().to_string(),
        _dir: dir,
    }
}

#[test]
fn test_prec_equals_scaled_tprate_on_matching_grid() {
    let fx = fixture(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);

    convert_cds_to_nmme(&fx.cds, &fx.reference, &fx.save).expect("conversion failed");

    let output = format!("{}/test1_modified.nc", fx.save);
    assert!(Path::new(&output).exists());

    let ds = read_dataset(&output).unwrap();
    let prec = ds.variable("prec").expect("prec missing");
    assert_eq!(prec.dimensions, vec!["M", "S", "L", "Y", "X"]);
    assert_eq!(prec.data.shape(), &[MEMBERS, 1, 1, 3, 3]);

    // Reference Y is ascending, source latitude descending
    for m in 0..MEMBERS {
        for y in 0..3 {
            for x in 0..3 {
                let expected = f64::from(tprate_at(m, 2 - y, x)) * 86_400_000.0;
                let got = prec.data[[m, 0, 0, y, x]];
                assert!(
                    (got - expected).abs() < 1e-3 * expected,
                    "prec[{m},0,0,{y},{x}] = {got}, expected {expected}"
                );
            }
        }
    }

    // tprate = 1e-6 m/s at latitude 2, longitude 0 for member 0
    assert!((prec.data[[0, 0, 0, 2, 0]] - 86.4).abs() < 1e-3);
}

#[test]
fn test_output_names_and_grid_follow_reference() {
    let xs = [0.4f32, 1.4, 2.4];
    let ys = [0.0f32, 2.0];
    let fx = fixture(&xs, &ys);

    convert_cds_to_nmme(&fx.cds, &fx.reference, &fx.save).unwrap();

    let file = open(format!("{}/test1_modified.nc", fx.save)).unwrap();
    let mut names: Vec<String> = file.variables().map(|v| v.name()).collect();
    names.sort();
    assert_eq!(names, vec!["L", "M", "S", "X", "Y", "prec"]);

    let mut dims: Vec<String> = file.dimensions().map(|d| d.name()).collect();
    dims.sort();
    assert_eq!(dims, vec!["L", "M", "S", "X", "Y"]);

    assert!(file.variable("tprate").is_none());
    assert!(file.variable("longitude").is_none());
    assert!(file.attribute("history").is_some());

    let x: Vec<f32> = file.variable("X").unwrap().get_values::<f32, _>(..).unwrap();
    let y: Vec<f32> = file.variable("Y").unwrap().get_values::<f32, _>(..).unwrap();
    assert_eq!(x, xs.to_vec());
    assert_eq!(y, ys.to_vec());

    // Other coordinates keep their values
    let l: Vec<i64> = file.variable("L").unwrap().get_values::<i64, _>(..).unwrap();
    assert_eq!(l, vec![1]);
    let m: Vec<i32> = file.variable("M").unwrap().get_values::<i32, _>(..).unwrap();
    assert_eq!(m, vec![0, 1]);
}

#[test]
fn test_cells_beyond_tolerance_are_missing() {
    let fx = fixture(&[0.0, 1.0, 2.0, 10.0], &[-5.0, 0.0]);

    convert_cds_to_nmme(&fx.cds, &fx.reference, &fx.save).unwrap();

    let ds = read_dataset(format!("{}/test1_modified.nc", fx.save)).unwrap();
    let prec = ds.variable("prec").unwrap();
    assert_eq!(prec.data.shape(), &[MEMBERS, 1, 1, 2, 4]);

    for m in 0..MEMBERS {
        // Y = -5 has no latitude within 1 degree
        for x in 0..4 {
            assert!(prec.data[[m, 0, 0, 0, x]].is_nan());
        }
        // X = 10 has no longitude within 1 degree
        assert!(prec.data[[m, 0, 0, 1, 3]].is_nan());
        // Y = 0, X = 0 maps to latitude index 2, longitude index 0
        let expected = f64::from(tprate_at(m, 2, 0)) * 86_400_000.0;
        assert!((prec.data[[m, 0, 0, 1, 0]] - expected).abs() < 1e-3 * expected);
    }
}

#[test]
fn test_empty_source_folder_writes_nothing() {
    let dir = tempdir().unwrap();
    let cds = dir.path().join("empty");
    let save = dir.path().join("out");
    fs::create_dir(&cds).unwrap();
    fs::create_dir(&save).unwrap();
    let reference = dir.path().join("ref.nc");
    write_reference_file(&reference, &[0.0, 1.0], &[0.0, 1.0]);

    convert_cds_to_nmme(
        cds.to_str().unwrap(),
        reference.to_str().unwrap(),
        save.to_str().unwrap(),
    )
    .expect("empty folder should succeed");

    assert_eq!(fs::read_dir(&save).unwrap().count(), 0);
}

#[test]
fn test_converter_reports_written_paths() {
    let fx = fixture(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
    write_cds_file(&Path::new(&fx.cds).join("test2.nc"));

    let converter = Converter::new(&fx.reference).unwrap();
    let mut written = converter.run(&fx.cds, &fx.save).unwrap();
    written.sort();

    assert_eq!(
        written,
        vec![
            format!("{}/{}", fx.save, output_file_name("test1.nc")),
            format!("{}/{}", fx.save, output_file_name("test2.nc")),
        ]
    );
    for path in &written {
        assert!(Path::new(path).exists());
    }
}

#[test]
fn test_non_netcdf_entry_aborts_batch() {
    let fx = fixture(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
    fs::write(Path::new(&fx.cds).join("notes.txt"), "not a dataset").unwrap();

    let result = convert_cds_to_nmme(&fx.cds, &fx.reference, &fx.save);
    assert!(matches!(result, Err(ConvertError::NetCDFError(_))));
}

#[test]
fn test_missing_reference_file_fails() {
    let fx = fixture(&[0.0], &[0.0]);
    let missing = format!("{}/does_not_exist.nc", fx.save);

    assert!(convert_cds_to_nmme(&fx.cds, &missing, &fx.save).is_err());
    assert_eq!(fs::read_dir(&fx.save).unwrap().count(), 0);
}

#[test]
fn test_missing_label_aborts() {
    let fx = fixture(&[0.0, 1.0], &[0.0, 1.0]);
    let partial = Path::new(&fx.cds).join("partial.nc");
    fs::remove_file(Path::new(&fx.cds).join("test1.nc")).unwrap();

    {
        let mut file = create(&partial).unwrap();
        file.add_dimension("latitude", 2).unwrap();
        file.add_dimension("longitude", 2).unwrap();
        let mut lat = file.add_variable::<f32>("latitude", &["latitude"]).unwrap();
        lat.put(Array1::from(vec![1.0f32, 0.0]).view(), ..).unwrap();
        let mut lon = file.add_variable::<f32>("longitude", &["longitude"]).unwrap();
        lon.put(Array1::from(vec![0.0f32, 1.0]).view(), ..).unwrap();
        let mut tp = file
            .add_variable::<f32>("tprate", &["latitude", "longitude"])
            .unwrap();
        tp.put(
            ndarray::Array2::from_elem((2, 2), 1e-6f32).view(),
            ..,
        )
        .unwrap();
    }

    match convert_cds_to_nmme(&fx.cds, &fx.reference, &fx.save) {
        Err(ConvertError::LabelNotFound { label }) => assert_eq!(label, "forecastMonth"),
        other => panic!("Expected LabelNotFound, got {:?}", other),
    }
    assert!(!Path::new(&format!("{}/partial_modified.nc", fx.save)).exists());
}

#[test]
fn test_existing_output_is_replaced() {
    let fx = fixture(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
    let output = format!("{}/test1_modified.nc", fx.save);
    fs::write(&output, "stale").unwrap();

    convert_cds_to_nmme(&fx.cds, &fx.reference, &fx.save).unwrap();

    let ds = read_dataset(&output).unwrap();
    assert!(ds.variable("prec").is_some());
}

#[test]
fn test_output_grid_keeps_reference_precision() {
    let fx = fixture(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
    let reference = format!("{}/ref64.nc", Path::new(&fx.reference).parent().unwrap().display());
    write_f64_reference_file(Path::new(&reference), &[0.1, 1.1], &[0.1, 1.1]);

    convert_cds_to_nmme(&fx.cds, &reference, &fx.save).expect("conversion failed");

    let file = open(format!("{}/test1_modified.nc", fx.save)).unwrap();
    let x: Vec<f64> = file.variable("X").unwrap().get_values::<f64, _>(..).unwrap();
    let y: Vec<f64> = file.variable("Y").unwrap().get_values::<f64, _>(..).unwrap();
    assert_eq!(x, vec![0.1, 1.1]);
    assert_eq!(y, vec![0.1, 1.1]);
}

#[test]
fn test_reference_loads_only_grid_axes() {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("ref64.nc");
    write_f64_reference_file(&reference, &[0.0, 1.0], &[0.0]);

    // Only the grid axes are read, not prec or the string variable
    let converter = Converter::new(reference.to_str().unwrap()).unwrap();
    let mut names = converter.reference().variable_names();
    names.sort();
    assert_eq!(names, vec!["X", "Y"]);
    assert!(converter.reference().variable("prec").is_none());
}

#[test]
fn test_reference_without_grid_axis_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no_y.nc");
    {
        let mut file = create(&path).unwrap();
        file.add_dimension("X", 1).unwrap();
        let mut var = file.add_variable::<f32>("X", &["X"]).unwrap();
        var.put(Array1::from(vec![0.0f32]).view(), ..).unwrap();
    }

    match Converter::new(path.to_str().unwrap()) {
        Err(ConvertError::VariableNotFound { var }) => assert_eq!(var, "Y"),
        other => panic!("Expected VariableNotFound, got {:?}", other),
    }
}

#[test]
fn test_string_variables_in_source_are_skipped() {
    let fx = fixture(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
    {
        let mut file = netcdf::append(format!("{}/test1.nc", fx.cds)).unwrap();
        let mut var = file.add_string_variable("member_label", &["number"]).unwrap();
        var.put_string("control", [0]).unwrap();
        var.put_string("perturbed", [1]).unwrap();
    }

    convert_cds_to_nmme(&fx.cds, &fx.reference, &fx.save).expect("conversion failed");

    let ds = read_dataset(format!("{}/test1_modified.nc", fx.save)).unwrap();
    assert!(ds.variable("prec").is_some());
    assert!(ds.variable("member_label").is_none());
    assert!(ds.dimension("M").is_some());
}

#[test]
fn test_convert_file_with_preloaded_reference() {
    let fx = fixture(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
    let converter = Converter::with_reference(read_dataset(&fx.reference).unwrap());

    let written = converter.convert_file(&fx.cds, "test1.nc", &fx.save).unwrap();

    assert_eq!(written, format!("{}/test1_modified.nc", fx.save));
    let ds = read_dataset(&written).unwrap();
    assert!(ds.variable("tprate").is_none());
    assert_eq!(ds.coordinate("X").unwrap().data.len(), 3);
}
