use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requested coordinate system change.  `input`, when set, overrides any SRS
/// found in file headers; `hammer` forces the override even for files whose
/// headers carry their own SRS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reprojection {
	#[serde(rename = "in", skip_serializing_if = "Option::is_none")]
	pub input: Option<String>,
	pub out: String,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub hammer: bool,
}

impl Reprojection {
	pub fn maybe_from(value: &Value) -> Option<Reprojection> {
		if value.is_null() || value["out"].is_null() {
			return None;
		}
		serde_json::from_value(value.clone()).ok()
	}
}
