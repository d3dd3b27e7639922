use crate::error::{Error, Result};
use crate::model::point::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scale and offset quantizing floating point coordinates into integer
/// units.  No scale component may be zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delta {
	pub scale: Point,
	pub offset: Point,
}

impl Delta {
	pub fn new(scale: Point, offset: Point) -> Delta {
		Delta { scale, offset }
	}

	/// A configuration carries a predefined delta when it sets either key.
	pub fn exists_in(config: &Value) -> bool {
		!config["scale"].is_null() || !config["offset"].is_null()
	}

	/// Build from config keys.  `scale` may be a scalar applied to all axes
	/// or a 3-element array; `offset` must be a 3-element array.
	pub fn from_config(config: &Value) -> Result<Delta> {
		let scale = match &config["scale"] {
			Value::Null => Point::fill(1.0),
			v => point_from(v)?,
		};
		let offset = match &config["offset"] {
			Value::Null => Point::default(),
			v => point_from(v)?,
		};

		if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
			return Err(Error::Config("scale components must be non-zero".to_string()));
		}

		Ok(Delta::new(scale, offset))
	}
}

impl Default for Delta {
	fn default() -> Delta {
		Delta::new(Point::fill(1.0), Point::default())
	}
}

fn point_from(value: &Value) -> Result<Point> {
	if let Some(n) = value.as_f64() {
		return Ok(Point::fill(n));
	}
	let p: Point = serde_json::from_value(value.clone())?;
	Ok(p)
}
