use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::structure::log_n;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One spatial partition of the root cube, assigned to a single build of a
/// parallel multi-build.  IDs are 1-based; `of` must be a power of two
/// greater than one.  Splitting happens only in X-Y since data tends not to
/// be dense through the whole Z range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subset {
	id: u64,
	of: u64,
	#[serde(skip)]
	minimum_null_depth: u64,
	#[serde(skip)]
	boxes: Vec<Bounds>,
	#[serde(skip)]
	sub: Option<Bounds>,
}

impl Subset {
	pub fn new(bounds: &Bounds, id: u64, of: u64) -> Result<Subset> {
		if id == 0 {
			return Err(Error::Config("Subset IDs should be 1-based".to_string()));
		}
		if id > of {
			return Err(Error::Config("Invalid subset ID - too large".to_string()));
		}
		if of <= 1 {
			return Err(Error::Config("Invalid subset range".to_string()));
		}
		if !of.is_power_of_two() {
			return Err(Error::Config("Subset range must be a power of 2".to_string()));
		}

		let mut subset = Subset {
			id,
			of,
			minimum_null_depth: 1,
			boxes: Vec::new(),
			sub: None,
		};
		subset.split(bounds);
		Ok(subset)
	}

	pub fn from_config(bounds: &Bounds, json: &Value) -> Result<Subset> {
		let id = json["id"]
			.as_u64()
			.ok_or_else(|| Error::Config("subset.id must be an unsigned integer".to_string()))?;
		let of = json["of"]
			.as_u64()
			.ok_or_else(|| Error::Config("subset.of must be an unsigned integer".to_string()))?;
		Subset::new(bounds, id, of)
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn of(&self) -> u64 {
		self.of
	}

	/// Union of this partition's boxes.
	pub fn bounds(&self) -> Option<&Bounds> {
		self.sub.as_ref()
	}

	pub fn minimum_null_depth(&self) -> u64 {
		self.minimum_null_depth
	}

	/// The base depth must be deep enough that the split boxes land on whole
	/// chunks of the nominal chunk size.
	pub fn minimum_base_depth(&self, points_per_chunk: u64) -> u64 {
		let mut min = log_n(points_per_chunk, 4);
		let mut chunks_at_depth = 1;

		while chunks_at_depth < self.of {
			min += 1;
			chunks_at_depth *= 4;
		}

		min
	}

	fn split(&mut self, bounds: &Bounds) {
		let mut cap: u64 = 4;

		while cap < self.of {
			self.minimum_null_depth += 1;
			cap *= 4;
		}

		let boxes = cap / self.of;
		let start = (self.id - 1) * boxes;
		let iterations = log_n(cap, 4);

		for cur in start..start + boxes {
			let mut current = bounds.clone();

			for i in (0..iterations).rev() {
				let dir = ((cur >> (i * 2)) & 0x3) as u8;
				current.go(dir);
			}

			match &mut self.sub {
				Some(sub) => sub.grow_bounds(&current),
				None => self.sub = Some(current.clone()),
			}
			self.boxes.push(current);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::point::Point;

	fn cube() -> Bounds {
		Bounds::new(Point::fill(0.0), Point::fill(1000.0))
	}

	#[test]
	fn test_validation() {
		assert!(Subset::new(&cube(), 0, 4).is_err());
		assert!(Subset::new(&cube(), 5, 4).is_err());
		assert!(Subset::new(&cube(), 1, 1).is_err());
		assert!(Subset::new(&cube(), 1, 6).is_err());
		assert!(Subset::new(&cube(), 1, 4).is_ok());
	}

	#[test]
	fn test_minimum_depths_for_64() {
		let s = Subset::new(&cube(), 1, 64).unwrap();
		assert_eq!(s.minimum_null_depth(), 3);
		assert_eq!(s.minimum_base_depth(262144), 12);
	}

	#[test]
	fn test_quarter_split_covers_a_quadrant() {
		// With of = 4 each subset is exactly one X-Y quadrant.
		let s = Subset::new(&cube(), 1, 4).unwrap();
		let b = s.bounds().unwrap();
		assert_eq!(b.min, Point::new(0.0, 0.0, 0.0));
		assert_eq!(b.max, Point::new(500.0, 500.0, 1000.0));

		let last = Subset::new(&cube(), 4, 4).unwrap();
		let b = last.bounds().unwrap();
		assert_eq!(b.min, Point::new(500.0, 500.0, 0.0));
	}

	#[test]
	fn test_non_square_range_unions_boxes() {
		// of = 8 with a 16-cell grid gives two boxes per subset.
		let s = Subset::new(&cube(), 1, 8).unwrap();
		let b = s.bounds().unwrap();
		assert_eq!(b.spans().z, 1000.0);
		assert!(b.spans().x == 250.0 || b.spans().y == 250.0);
	}
}
