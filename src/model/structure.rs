use crate::error::{Error, Result};
use crate::model::subset::Subset;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entries per hierarchy chunk, fixed independently of the point chunking.
const HIERARCHY_POINTS_PER_CHUNK: u64 = 4096;

/// Smallest power `r` with `base^r >= val`.
pub fn log_n(val: u64, base: u64) -> u64 {
	let mut r = 0;
	let mut v = 1;
	while v < val {
		v *= base;
		r += 1;
	}
	r
}

/// Tree-shape parameters controlling the output index.  Read from the
/// normalized configuration, after any subset accommodation has bumped the
/// depths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
	pub null_depth: u64,
	pub base_depth: u64,
	pub points_per_chunk: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bump_depth: Option<u64>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub prefix_ids: bool,
}

impl Structure {
	pub fn from_config(json: &Value) -> Result<Structure> {
		let null_depth = json["nullDepth"]
			.as_u64()
			.ok_or_else(|| Error::Config("nullDepth must be an unsigned integer".to_string()))?;
		let base_depth = json["baseDepth"]
			.as_u64()
			.ok_or_else(|| Error::Config("baseDepth must be an unsigned integer".to_string()))?;
		let points_per_chunk = json["pointsPerChunk"].as_u64().ok_or_else(|| {
			Error::Config("pointsPerChunk must be an unsigned integer".to_string())
		})?;

		if base_depth < null_depth {
			return Err(Error::Config("baseDepth may not be less than nullDepth".to_string()));
		}

		Ok(Structure {
			null_depth,
			base_depth,
			points_per_chunk,
			bump_depth: json["bumpDepth"].as_u64(),
			prefix_ids: json["prefixIds"].as_bool().unwrap_or(false),
		})
	}

	pub fn nominal_chunk_depth(&self) -> u64 {
		log_n(self.points_per_chunk, 4)
	}

	/// Shape of the hierarchy chunking derived from the tree shape.  The
	/// hierarchy always spans from the root, uses its own fixed chunk size,
	/// and respects the subset's minimum null depth so sibling builds agree
	/// on chunk boundaries.
	pub fn hierarchy(&self, subset: Option<&Subset>) -> Structure {
		Structure {
			null_depth: subset.map(|s| s.minimum_null_depth()).unwrap_or(0),
			base_depth: self.base_depth,
			points_per_chunk: HIERARCHY_POINTS_PER_CHUNK,
			bump_depth: None,
			prefix_ids: false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_log_n() {
		assert_eq!(log_n(1, 4), 0);
		assert_eq!(log_n(4, 4), 1);
		assert_eq!(log_n(5, 4), 2);
		assert_eq!(log_n(262144, 4), 9);
	}

	#[test]
	fn test_from_config() {
		let s = Structure::from_config(&json!({
			"nullDepth": 7,
			"baseDepth": 12,
			"pointsPerChunk": 262144,
			"bumpDepth": 10,
		}))
		.unwrap();
		assert_eq!(s.null_depth, 7);
		assert_eq!(s.bump_depth, Some(10));
		assert_eq!(s.nominal_chunk_depth(), 9);
	}

	#[test]
	fn test_depth_ordering_enforced() {
		let bad = json!({ "nullDepth": 9, "baseDepth": 8, "pointsPerChunk": 262144 });
		assert!(Structure::from_config(&bad).is_err());
	}
}
