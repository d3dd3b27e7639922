use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::point::Point;
use crate::reader::Preview;
use byteorder::{LittleEndian, ReadBytesExt};
use las::Reader;
use serde_json::json;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const WKT_USER_ID: &str = "LASF_Projection";
const WKT_RECORD_ID: u16 = 2112;

pub fn preview(path: &Path) -> Result<Option<Preview>> {
	if !header_intact(path)? {
		return Ok(None);
	}

	let reader = match Reader::from_path(path) {
		Ok(r) => r,
		Err(_) => return Ok(None),
	};
	let header = reader.header();

	let b = header.bounds();
	let bounds = Bounds::new(
		Point::new(b.min.x, b.min.y, b.min.z),
		Point::new(b.max.x, b.max.y, b.max.z),
	);

	let t = header.transforms();
	let scale = Point::new(t.x.scale, t.y.scale, t.z.scale);

	let srs = header
		.vlrs()
		.iter()
		.find(|v| v.user_id == WKT_USER_ID && v.record_id == WKT_RECORD_ID)
		.map(|v| {
			String::from_utf8_lossy(&v.data)
				.trim_end_matches('\0')
				.to_string()
		});

	let version = header.version();
	let metadata = json!({
		"systemIdentifier": header.system_identifier(),
		"generatingSoftware": header.generating_software(),
		"lasVersion": format!("{}.{}", version.major, version.minor),
	});

	Ok(Some(Preview {
		num_points: header.number_of_points(),
		bounds: Some(bounds),
		srs,
		scale: Some(scale),
		dim_names: dim_names(header),
		metadata: Some(metadata),
	}))
}

pub fn run<F: FnMut(Point)>(path: &Path, sink: &mut F) -> Result<bool> {
	let mut reader = match Reader::from_path(path) {
		Ok(r) => r,
		Err(_) => return Ok(false),
	};

	for point in reader.points() {
		let point = point.map_err(|e| Error::Reader(e.to_string()))?;
		sink(Point::new(point.x, point.y, point.z));
	}

	Ok(true)
}

/// Cheap truncation guard.  Remote files are probed from a 16 KiB staging
/// slice, which must at least cover the declared header block.
fn header_intact(path: &Path) -> Result<bool> {
	let mut file = match File::open(path) {
		Ok(f) => f,
		Err(_) => return Ok(false),
	};

	let mut magic = [0u8; 4];
	if file.read_exact(&mut magic).is_err() || &magic != b"LASF" {
		return Ok(false);
	}

	file.seek(SeekFrom::Start(94))?;
	let header_size = match file.read_u16::<LittleEndian>() {
		Ok(n) => n as u64,
		Err(_) => return Ok(false),
	};

	Ok(file.metadata()?.len() >= header_size)
}

fn dim_names(header: &las::Header) -> Vec<String> {
	let format = header.point_format();
	let mut names: Vec<String> = [
		"X",
		"Y",
		"Z",
		"Intensity",
		"ReturnNumber",
		"NumberOfReturns",
		"ScanDirectionFlag",
		"EdgeOfFlightLine",
		"Classification",
		"ScanAngleRank",
		"UserData",
		"PointSourceId",
	]
	.iter()
	.map(|s| s.to_string())
	.collect();

	if format.has_gps_time {
		names.push("GpsTime".to_string());
	}
	if format.has_color {
		names.push("Red".to_string());
		names.push("Green".to_string());
		names.push("Blue".to_string());
	}
	if format.has_nir {
		names.push("Infrared".to_string());
	}

	names
}

/// Test fixture shared with the inference and planner tests.
#[cfg(test)]
pub fn write_fixture(path: &Path, points: &[(f64, f64, f64)], scale: f64) {
	let mut builder = las::Builder::from((1, 2));
	builder.transforms = las::Vector {
		x: las::Transform { scale, offset: 0.0 },
		y: las::Transform { scale, offset: 0.0 },
		z: las::Transform { scale, offset: 0.0 },
	};
	let header = builder.into_header().unwrap();

	let mut writer = las::Writer::from_path(path, header).unwrap();
	for &(x, y, z) in points {
		let point = las::Point {
			x,
			y,
			z,
			..Default::default()
		};
		writer.write_point(point).unwrap();
	}
	writer.close().unwrap();
}
