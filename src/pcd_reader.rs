use crate::error::{Error, Result};
use crate::model::point::Point;
use crate::reader::Preview;
use pcd_rs::DynReader;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// The PCD header is plain text ahead of the payload, so the preview scans
/// its lines directly; the record parsing below stays with the pcd crate.
pub fn preview(path: &Path) -> Result<Option<Preview>> {
	let file = match File::open(path) {
		Ok(f) => f,
		Err(_) => return Ok(None),
	};

	let mut fields: Vec<String> = Vec::new();
	let mut num_points: u64 = 0;

	for line in BufReader::new(file).lines() {
		let line = match line {
			Ok(l) => l,
			Err(_) => return Ok(None),
		};

		if let Some(rest) = line.strip_prefix("FIELDS ") {
			fields = rest.split_whitespace().map(dim_name).collect();
		} else if let Some(rest) = line.strip_prefix("POINTS ") {
			num_points = rest.trim().parse().unwrap_or(0);
		} else if line.starts_with("DATA ") {
			break;
		}
	}

	if fields.is_empty() {
		return Ok(None);
	}

	Ok(Some(Preview {
		num_points,
		bounds: None,
		srs: None,
		scale: None,
		dim_names: fields,
		metadata: None,
	}))
}

pub fn run<F: FnMut(Point)>(path: &Path, sink: &mut F) -> Result<bool> {
	let buf = match fs::read(path) {
		Ok(b) => b,
		Err(_) => return Ok(false),
	};

	let reader = match DynReader::from_bytes(&buf) {
		Ok(r) => r,
		Err(_) => return Ok(false),
	};

	for record in reader {
		let record = record.map_err(|e| Error::Reader(e.to_string()))?;
		let [x, y, z] = record
			.to_xyz::<f64>()
			.ok_or_else(|| Error::Reader("record missing xyz fields".to_string()))?;
		sink(Point::new(x, y, z));
	}

	Ok(true)
}

fn dim_name(field: &str) -> String {
	match field {
		"x" => "X".to_string(),
		"y" => "Y".to_string(),
		"z" => "Z".to_string(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ASCII_PCD: &str = "\
# .PCD v0.7 - Point Cloud Data file format
VERSION 0.7
FIELDS x y z
SIZE 8 8 8
TYPE F F F
COUNT 1 1 1
WIDTH 2
HEIGHT 1
VIEWPOINT 0 0 0 1 0 0 0
POINTS 2
DATA ascii
1.0 2.0 3.0
4.0 5.0 6.0
";

	fn fixture() -> (tempfile::TempDir, std::path::PathBuf) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("points.pcd");
		fs::write(&path, ASCII_PCD).unwrap();
		(dir, path)
	}

	#[test]
	fn test_preview_reads_text_header() {
		let (_dir, path) = fixture();
		let preview = preview(&path).unwrap().unwrap();
		assert_eq!(preview.num_points, 2);
		assert_eq!(preview.dim_names, vec!["X", "Y", "Z"]);
		assert!(preview.bounds.is_none());
	}

	#[test]
	fn test_run_yields_xyz() {
		let (_dir, path) = fixture();
		let mut points = Vec::new();
		let mut sink = |p: Point| points.push(p);
		assert!(run(&path, &mut sink).unwrap());
		assert_eq!(points, vec![Point::new(1.0, 2.0, 3.0), Point::new(4.0, 5.0, 6.0)]);
	}
}
