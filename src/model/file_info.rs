use crate::model::bounds::Bounds;
use crate::model::stats::PointStats;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
	Outstanding,
	Inserted,
	Omitted,
	Error,
}

/// Per-input-file record.  Created with just a path, enriched during
/// inference, and owned by the manifest afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
	pub path: String,
	#[serde(default = "outstanding")]
	pub status: Status,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub num_points: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bounds: Option<Bounds>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub srs: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<Value>,
	#[serde(default, skip_serializing_if = "PointStats::is_empty")]
	pub point_stats: PointStats,
}

fn outstanding() -> Status {
	Status::Outstanding
}

impl FileInfo {
	pub fn new(path: &str) -> FileInfo {
		FileInfo {
			path: path.to_string(),
			status: Status::Outstanding,
			num_points: None,
			bounds: None,
			srs: None,
			metadata: None,
			point_stats: PointStats::default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_serde_skips_unknowns() {
		let f = FileInfo::new("a.las");
		let json = serde_json::to_value(&f).unwrap();
		assert_eq!(json["path"], "a.las");
		assert!(json.get("numPoints").is_none());
		assert!(json.get("bounds").is_none());
	}

	#[test]
	fn test_deserialize_path_only_object() {
		let f: FileInfo =
			serde_json::from_value(serde_json::json!({ "path": "b.laz" })).unwrap();
		assert_eq!(f.status, Status::Outstanding);
		assert_eq!(f.path, "b.laz");
	}
}
