use crate::error::Result;
use crate::matrix::{self, Transformation};
use crate::model::bounds::Bounds;
use crate::model::point::Point;
use crate::model::reprojection::Reprojection;
use crate::model::schema::{BaseType, DimInfo};
use crate::{csv_reader, las_reader, pcd_reader};
use serde_json::Value;
use std::path::Path;

/// Lightweight per-file description pulled from a header without touching
/// the point stream.  `bounds: None` marks formats whose headers carry no
/// extent; those files are always scanned.
#[derive(Clone, Debug)]
pub struct Preview {
	pub num_points: u64,
	pub bounds: Option<Bounds>,
	pub srs: Option<String>,
	pub scale: Option<Point>,
	pub dim_names: Vec<String>,
	pub metadata: Option<Value>,
}

/// Whether the path names a format one of the drivers can read.
pub fn good(path: &str) -> bool {
	matches!(
		crate::storage::get_extension(path).to_ascii_lowercase().as_str(),
		"las" | "laz" | "csv" | "txt" | "pcd"
	)
}

/// Extract a header preview.  Returns `None` when the file is unreadable.
/// Reprojection is carried through to the build stage; drivers do not
/// resample coordinates here.
pub fn preview(path: &Path, reprojection: Option<&Reprojection>) -> Result<Option<Preview>> {
	let _ = reprojection;
	match extension_of(path).as_str() {
		"las" | "laz" => las_reader::preview(path),
		"csv" | "txt" => csv_reader::preview(path),
		"pcd" => pcd_reader::preview(path),
		_ => Ok(None),
	}
}

/// Stream every point into the sink, applying the transformation when one is
/// given.  Returns false when the file cannot be read at all.
pub fn run<F: FnMut(Point)>(
	path: &Path,
	mut sink: F,
	reprojection: Option<&Reprojection>,
	transformation: Option<&Transformation>,
) -> Result<bool> {
	let _ = reprojection;
	let mut wrapped = |p: Point| {
		let p = match transformation {
			Some(m) => matrix::transform_point(m, p),
			None => p,
		};
		sink(p);
	};

	match extension_of(path).as_str() {
		"las" | "laz" => las_reader::run(path, &mut wrapped),
		"csv" | "txt" => csv_reader::run(path, &mut wrapped),
		"pcd" => pcd_reader::run(path, &mut wrapped),
		_ => Ok(false),
	}
}

pub fn transform(bounds: &Bounds, transformation: &Transformation) -> Bounds {
	matrix::transform_bounds(bounds, transformation)
}

/// Canonical dimension type for a name; unknown names default to 64-bit
/// floats so no data is narrowed by accident.
pub fn dim_info(name: &str) -> DimInfo {
	match name {
		"X" | "Y" | "Z" | "GpsTime" => DimInfo::new(name, BaseType::Floating, 8),
		"ScanAngleRank" => DimInfo::new(name, BaseType::Floating, 4),
		"Intensity" | "PointSourceId" | "Red" | "Green" | "Blue" | "Infrared" => {
			DimInfo::new(name, BaseType::Unsigned, 2)
		}
		"ReturnNumber" | "NumberOfReturns" | "ScanDirectionFlag" | "EdgeOfFlightLine"
		| "Classification" | "UserData" => DimInfo::new(name, BaseType::Unsigned, 1),
		_ => DimInfo::new(name, BaseType::Floating, 8),
	}
}

fn extension_of(path: &Path) -> String {
	path.extension()
		.map(|e| e.to_string_lossy().to_ascii_lowercase())
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_good_by_extension() {
		assert!(good("a/b/cloud.las"));
		assert!(good("cloud.LAZ"));
		assert!(good("points.csv"));
		assert!(good("points.pcd"));
		assert!(!good("archive.zip"));
		assert!(!good("noext"));
	}

	#[test]
	fn test_registry_defaults_unknown_to_double() {
		assert_eq!(dim_info("X").size, 8);
		assert_eq!(dim_info("Intensity").size, 2);
		assert_eq!(dim_info("Classification").size, 1);

		let unknown = dim_info("Curvature");
		assert_eq!(unknown.base_type, BaseType::Floating);
		assert_eq!(unknown.size, 8);
	}
}
