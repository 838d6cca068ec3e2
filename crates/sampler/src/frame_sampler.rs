use dataframe::{role, Column, DataFrame, ElementType, Encoding, Value};
use rasterio::{RasterSource, Sample};

use crate::runner::FrameRunner;

/// One configured raster a `RasterSamplerRunner` consults for every frame,
/// keyed by the name used in the output column prefix (`{key}.value`, ...).
/// The `emit_*` flags control which of the optional column groups from spec
/// §4.5 step 3 are appended; they should mirror the `zonal_stats`/
/// `slope_aspect` settings the raster's `RasterSource` was opened with.
pub struct NamedRaster {
    pub key: String,
    pub source: RasterSource,
    pub force_single_sample: bool,
    pub emit_band_flags: bool,
    pub emit_zonal_stats: bool,
    pub emit_derivs: bool,
}

/// Builds point vectors from a frame's X/Y[/Z/TIME] columns and appends one
/// or more sample columns per configured raster (spec §4.5).
pub struct RasterSamplerRunner {
    rasters: Vec<NamedRaster>,
}

impl RasterSamplerRunner {
    pub fn new(rasters: Vec<NamedRaster>) -> Self {
        RasterSamplerRunner { rasters }
    }

    pub fn column_name(key: &str, suffix: &str) -> String {
        format!("{key}.{suffix}")
    }
}

fn build_points(frame: &DataFrame) -> Option<Vec<(f64, f64, f64, i64)>> {
    let (_, x_col) = frame.x_column()?;
    let (_, y_col) = frame.y_column()?;
    let x = x_col.scalar_f64_values()?;
    let y = y_col.scalar_f64_values()?;

    let z = frame.column_with_role(role::Z).and_then(|(_, c)| c.scalar_f64_values());
    let time = frame.column_with_role(role::TIME).and_then(|(_, c)| c.scalar_f64_values());

    Some(
        (0..x.len())
            .map(|i| {
                let zi = z.as_ref().map(|v| v[i]).unwrap_or(0.0);
                let ti = time.as_ref().map(|v| v[i] as i64).unwrap_or(0);
                (x[i], y[i], zi, ti)
            })
            .collect(),
    )
}

fn first_or_empty(samples: &[Sample]) -> Option<&Sample> {
    samples.first()
}

fn scalar_col(element: ElementType) -> Column {
    Column::scalar(Encoding::scalar(element))
}

fn list_col(element: ElementType) -> Column {
    Column::nested_list(Encoding::scalar(element).as_nested_list())
}

impl FrameRunner for RasterSamplerRunner {
    fn name(&self) -> &str {
        "raster_sampler"
    }

    fn run(&mut self, frame: &mut DataFrame) -> bool {
        let Some(points) = build_points(frame) else {
            return true;
        };

        for raster in &self.rasters {
            let samples = raster.source.get_samples(&points, frame.target_crs);

            if raster.force_single_sample {
                append_scalar_columns(frame, raster, &samples);
            } else {
                append_nested_list_columns(frame, raster, &samples);
            }
        }

        true
    }
}

const STATS_SUFFIXES: [&str; 7] = ["count", "min", "max", "mean", "median", "stdev", "mad"];
const DERIV_SUFFIXES: [&str; 3] = ["count", "slope", "aspect"];

fn append_scalar_columns(frame: &mut DataFrame, raster: &NamedRaster, samples: &[Vec<Sample>]) {
    let mut value_col = scalar_col(ElementType::F64);
    let mut time_col = scalar_col(ElementType::I64);
    let mut fileid_col = scalar_col(ElementType::U64);
    let mut band_col = scalar_col(ElementType::String);
    let mut flags_col = scalar_col(ElementType::I64);
    let mut stats_cols: Vec<Column> = STATS_SUFFIXES.iter().map(|_| scalar_col(ElementType::F64)).collect();
    let mut deriv_cols: Vec<Column> = DERIV_SUFFIXES.iter().map(|_| scalar_col(ElementType::F64)).collect();

    for point_samples in samples {
        match first_or_empty(point_samples) {
            Some(sample) => {
                value_col.push_scalar(sample.value);
                time_col.push_scalar(sample.time_ns);
                fileid_col.push_scalar(sample.file_id);
                band_col.push_scalar(sample.band.map(|b| b.to_string()).unwrap_or_else(|| "na".to_string()));
                flags_col.push_scalar(sample.flags.map(|f| f as i64).unwrap_or(0));
                push_stats(&mut stats_cols, sample.stats);
                push_derivs(&mut deriv_cols, sample.derivs);
            }
            None => {
                value_col.push_scalar(f64::NAN);
                time_col.push_scalar(0i64);
                fileid_col.push_scalar(0u64);
                band_col.push_scalar("na".to_string());
                flags_col.push_scalar(0i64);
                push_stats(&mut stats_cols, None);
                push_derivs(&mut deriv_cols, None);
            }
        }
    }

    frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "value"), value_col);
    frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "time_ns"), time_col);
    frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "fileid"), fileid_col);

    if raster.emit_band_flags {
        frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "band"), band_col);
        frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "flags"), flags_col);
    }
    if raster.emit_zonal_stats {
        for (suffix, col) in STATS_SUFFIXES.iter().zip(stats_cols) {
            frame.set_column(&RasterSamplerRunner::column_name(&raster.key, &format!("stats.{suffix}")), col);
        }
    }
    if raster.emit_derivs {
        for (suffix, col) in DERIV_SUFFIXES.iter().zip(deriv_cols) {
            frame.set_column(&RasterSamplerRunner::column_name(&raster.key, &format!("deriv.{suffix}")), col);
        }
    }
}

fn push_stats(cols: &mut [Column], stats: Option<rasterio::ZonalStats>) {
    let values: [f64; 7] = match stats {
        Some(s) => [s.count as f64, s.min, s.max, s.mean, s.median, s.stdev, s.mad],
        None => [0.0; 7],
    };
    for (col, value) in cols.iter_mut().zip(values) {
        col.push_scalar(value);
    }
}

fn push_derivs(cols: &mut [Column], derivs: Option<rasterio::Derivatives>) {
    let values: [f64; 3] = match derivs {
        Some(d) => [d.count as f64, d.slope_degrees, d.aspect_degrees],
        None => [0.0, f64::NAN, f64::NAN],
    };
    for (col, value) in cols.iter_mut().zip(values) {
        col.push_scalar(value);
    }
}

fn append_nested_list_columns(frame: &mut DataFrame, raster: &NamedRaster, samples: &[Vec<Sample>]) {
    let mut value_col = list_col(ElementType::F64);
    let mut time_col = list_col(ElementType::I64);
    let mut fileid_col = list_col(ElementType::U64);

    for point_samples in samples {
        value_col.push_list(point_samples.iter().map(|s| Value::Float(s.value)).collect());
        time_col.push_list(point_samples.iter().map(|s| Value::Int(s.time_ns)).collect());
        fileid_col.push_list(point_samples.iter().map(|s| Value::UInt(s.file_id)).collect());
    }

    frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "value"), value_col);
    frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "time_ns"), time_col);
    frame.set_column(&RasterSamplerRunner::column_name(&raster.key, "fileid"), fileid_col);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rasterio::{FileDictionary, GeoTransform, RasterBand, RasterSourceStrategy, SamplingAlgorithm};

    fn one_point_frame(x: f64, y: f64) -> DataFrame {
        let mut frame = DataFrame::new();
        let mut xc = Column::scalar(Encoding::scalar(ElementType::F64).with_roles(role::X));
        xc.push_scalar(x);
        let mut yc = Column::scalar(Encoding::scalar(ElementType::F64).with_roles(role::Y));
        yc.push_scalar(y);
        frame.add_column("lon", xc).unwrap();
        frame.add_column("lat", yc).unwrap();
        frame
    }

    fn flat_source(value: f64) -> RasterSource {
        let band = RasterBand {
            width: 5,
            height: 5,
            data: vec![value; 25],
            nodata: None,
            transform: GeoTransform::from_top_left_and_cell_size(0.0, 0.0, 1.0, -1.0),
            epsg: Some(4326),
        };
        let dictionary = FileDictionary::new(0);
        RasterSource::open(RasterSourceStrategy::InMemory(band), &dictionary, SamplingAlgorithm::NearestNeighbour).unwrap()
    }

    fn named(key: &str, source: RasterSource, force_single_sample: bool) -> NamedRaster {
        NamedRaster {
            key: key.to_string(),
            source,
            force_single_sample,
            emit_band_flags: false,
            emit_zonal_stats: false,
            emit_derivs: false,
        }
    }

    #[test]
    fn force_single_sample_appends_scalar_columns() {
        let mut frame = one_point_frame(2.0, -2.0);
        let mut runner = RasterSamplerRunner::new(vec![named("elevation", flat_source(42.0), true)]);

        assert!(runner.run(&mut frame));
        let value = frame.get_column("elevation.value").unwrap().scalar_values().unwrap();
        assert_eq!(value, &[Value::Float(42.0)]);
    }

    #[test]
    fn nested_list_output_holds_one_entry_per_sample() {
        let mut frame = one_point_frame(2.0, -2.0);
        let mut runner = RasterSamplerRunner::new(vec![named("elevation", flat_source(7.0), false)]);

        assert!(runner.run(&mut frame));
        match frame.get_column("elevation.value").unwrap() {
            Column::NestedList { rows, .. } => assert_eq!(rows[0], vec![Value::Float(7.0)]),
            Column::Scalar { .. } => panic!("expected nested list column"),
        }
    }

    #[test]
    fn band_and_flags_columns_only_appear_when_requested() {
        let mut frame = one_point_frame(2.0, -2.0);
        let mut raster = named("elevation", flat_source(1.0), true);
        raster.emit_band_flags = true;
        let mut runner = RasterSamplerRunner::new(vec![raster]);

        assert!(runner.run(&mut frame));
        assert!(frame.get_column("elevation.band").is_ok());
        assert!(frame.get_column("elevation.flags").is_ok());
    }

    #[test]
    fn stats_columns_only_appear_when_requested() {
        let mut frame = one_point_frame(2.0, -2.0);
        let mut raster = named("elevation", flat_source(1.0), true);
        raster.emit_zonal_stats = true;
        let mut runner = RasterSamplerRunner::new(vec![raster]);

        assert!(runner.run(&mut frame));
        assert!(frame.get_column("elevation.stats.mean").is_ok());
        assert!(frame.get_column("elevation.deriv.slope").is_err());
    }
}
