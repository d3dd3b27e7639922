use crate::error::Result;
use crate::model::bounds::Bounds;
use crate::model::delta::Delta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
	Floating,
	Signed,
	Unsigned,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimInfo {
	pub name: String,
	#[serde(rename = "type")]
	pub base_type: BaseType,
	pub size: u64,
}

impl DimInfo {
	pub fn new(name: &str, base_type: BaseType, size: u64) -> DimInfo {
		DimInfo {
			name: name.to_string(),
			base_type,
			size,
		}
	}
}

/// Ordered dimension list.  Equality is ordered-list equality; the stride is
/// the per-point byte width.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
	dims: Vec<DimInfo>,
}

impl Schema {
	pub fn new(dims: Vec<DimInfo>) -> Schema {
		Schema { dims }
	}

	pub fn dims(&self) -> &[DimInfo] {
		&self.dims
	}

	pub fn into_dims(self) -> Vec<DimInfo> {
		self.dims
	}

	pub fn stride(&self) -> u64 {
		self.dims.iter().map(|d| d.size).sum()
	}

	pub fn find(&self, name: &str) -> Option<&DimInfo> {
		self.dims.iter().find(|d| d.name == name)
	}

	/// Rewrite X/Y/Z as signed integers wide enough to hold the cube extent
	/// in delta units.  Other dimensions pass through; applying this twice is
	/// a no-op.
	pub fn deltify(&self, cube: &Bounds, delta: &Delta) -> Schema {
		let dims = self
			.dims
			.iter()
			.map(|d| match d.name.as_str() {
				"X" => DimInfo::new(
					"X",
					BaseType::Signed,
					int_size(cube.min.x, cube.max.x, delta.offset.x, delta.scale.x),
				),
				"Y" => DimInfo::new(
					"Y",
					BaseType::Signed,
					int_size(cube.min.y, cube.max.y, delta.offset.y, delta.scale.y),
				),
				"Z" => DimInfo::new(
					"Z",
					BaseType::Signed,
					int_size(cube.min.z, cube.max.z, delta.offset.z, delta.scale.z),
				),
				_ => d.clone(),
			})
			.collect();

		Schema::new(dims)
	}

	pub fn maybe_from(value: &Value) -> Result<Option<Schema>> {
		if value.is_null() {
			return Ok(None);
		}
		let schema: Schema = serde_json::from_value(value.clone())?;
		Ok(Some(schema))
	}
}

/// Byte width for an identifier dimension counting up to `count` values.
pub fn id_size(count: u64) -> u64 {
	if count <= u32::MAX as u64 {
		4
	} else {
		8
	}
}

fn int_size(lo: f64, hi: f64, offset: f64, scale: f64) -> u64 {
	let radius = ((lo - offset).abs().max((hi - offset).abs())) / scale;
	if radius <= i32::MAX as f64 {
		4
	} else {
		8
	}
}
