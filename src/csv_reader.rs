use crate::error::{Error, Result};
use crate::model::point::Point;
use crate::reader::Preview;
use csv::Reader;
use serde::Deserialize;
use std::path::Path;

// Intensity columns show up both as integers and as normalized floats.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Intensity {
	Int(u64),
	Float(f64),
}

#[derive(Debug, Deserialize)]
struct Row {
	x: f64,
	y: f64,
	z: f64,
	#[serde(default)]
	intensity: Option<Intensity>,
}

/// CSV headers name the dimensions but carry no counts or extents, so the
/// preview leaves bounds unset and every file takes the scan path.
pub fn preview(path: &Path) -> Result<Option<Preview>> {
	let mut rdr = match Reader::from_path(path) {
		Ok(r) => r,
		Err(_) => return Ok(None),
	};
	let headers = match rdr.headers() {
		Ok(h) => h.clone(),
		Err(_) => return Ok(None),
	};

	let dim_names: Vec<String> = headers.iter().map(dim_name).collect();
	if dim_names.is_empty() {
		return Ok(None);
	}

	Ok(Some(Preview {
		num_points: 0,
		bounds: None,
		srs: None,
		scale: None,
		dim_names,
		metadata: None,
	}))
}

pub fn run<F: FnMut(Point)>(path: &Path, sink: &mut F) -> Result<bool> {
	let mut rdr = match Reader::from_path(path) {
		Ok(r) => r,
		Err(_) => return Ok(false),
	};

	for result in rdr.deserialize() {
		let row: Row = result.map_err(|e| Error::Reader(e.to_string()))?;
		let Row { x, y, z, intensity } = row;
		let _ = intensity;
		sink(Point::new(x, y, z));
	}

	Ok(true)
}

fn dim_name(header: &str) -> String {
	match header.to_ascii_lowercase().as_str() {
		"x" => "X".to_string(),
		"y" => "Y".to_string(),
		"z" => "Z".to_string(),
		"intensity" => "Intensity".to_string(),
		other => {
			let mut chars = other.chars();
			match chars.next() {
				Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
				None => String::new(),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn fixture(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("points.csv");
		fs::write(&path, contents).unwrap();
		(dir, path)
	}

	#[test]
	fn test_preview_names_dims_without_bounds() {
		let (_dir, path) = fixture("x,y,z,intensity\n1.0,2.0,3.0,10\n");
		let preview = preview(&path).unwrap().unwrap();
		assert_eq!(preview.dim_names, vec!["X", "Y", "Z", "Intensity"]);
		assert!(preview.bounds.is_none());
		assert_eq!(preview.num_points, 0);
	}

	#[test]
	fn test_run_integer_intensity() {
		let (_dir, path) = fixture("x,y,z,intensity\n1.0,2.0,3.0,10\n4.0,5.0,6.0,20\n");
		let mut points = Vec::new();
		let mut sink = |p: Point| points.push(p);
		assert!(run(&path, &mut sink).unwrap());
		assert_eq!(points.len(), 2);
		assert_eq!(points[1], Point::new(4.0, 5.0, 6.0));
	}

	#[test]
	fn test_run_float_intensity() {
		let (_dir, path) = fixture("x,y,z,intensity\n1.0,2.0,3.0,0.5\n");
		let mut count = 0;
		let mut sink = |_p: Point| count += 1;
		assert!(run(&path, &mut sink).unwrap());
		assert_eq!(count, 1);
	}
}
