use crate::model::delta::Delta;
use crate::model::point::Point;
use ord_subset::OrdSubsetIterExt;
use serde::{Deserialize, Serialize};

/// Axis-aligned box over the full extent of a point set.  Aggregation code
/// uses `Option<Bounds>` for the empty state, so a constructed Bounds is
/// always well formed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct Bounds {
	pub min: Point,
	pub max: Point,
}

impl Bounds {
	pub fn new(min: Point, max: Point) -> Bounds {
		Bounds { min, max }
	}

	pub fn from_points(points: &[Point]) -> Option<Bounds> {
		let mut bounds: Option<Bounds> = None;
		for p in points {
			bounds = Some(match bounds {
				Some(mut b) => {
					b.grow(*p);
					b
				}
				None => Bounds::new(*p, *p),
			});
		}
		bounds
	}

	pub fn grow(&mut self, p: Point) {
		self.min = Point::min(self.min, p);
		self.max = Point::max(self.max, p);
	}

	pub fn grow_bounds(&mut self, other: &Bounds) {
		self.grow(other.min);
		self.grow(other.max);
	}

	pub fn mid(&self) -> Point {
		Point::new(
			(self.min.x + self.max.x) / 2.0,
			(self.min.y + self.max.y) / 2.0,
			(self.min.z + self.max.z) / 2.0,
		)
	}

	pub fn spans(&self) -> Point {
		self.max - self.min
	}

	/// Smallest cube centered on the midpoint that encloses these bounds,
	/// with the side rounded up to a whole unit.  With a delta, the radius is
	/// additionally rounded up to whole scale units on every axis so the cube
	/// quantizes cleanly.
	pub fn cubeify(&self, delta: Option<&Delta>) -> Bounds {
		let mid = self.mid();
		let spans = self.spans();
		let side = [spans.x, spans.y, spans.z]
			.iter()
			.copied()
			.ord_subset_max()
			.unwrap_or(0.0);

		let mut radius = (side / 2.0).ceil();

		if let Some(d) = delta {
			radius = [d.scale.x, d.scale.y, d.scale.z]
				.iter()
				.map(|s| (radius / s).ceil() * s)
				.ord_subset_max()
				.unwrap_or(radius);
		}

		Bounds::new(mid - Point::fill(radius), mid + Point::fill(radius))
	}

	/// Quantize into delta units: `(p - offset) / scale` on both corners.
	pub fn deltify(&self, delta: &Delta) -> Bounds {
		Bounds::new(
			(self.min - delta.offset) / delta.scale,
			(self.max - delta.offset) / delta.scale,
		)
	}

	pub fn undeltify(&self, delta: &Delta) -> Bounds {
		Bounds::new(
			self.min * delta.scale + delta.offset,
			self.max * delta.scale + delta.offset,
		)
	}

	/// Symmetric expansion by a ratio of each axis span.
	pub fn grow_by(&self, ratio: f64) -> Bounds {
		let d = self.spans() * ratio;
		Bounds::new(self.min - d, self.max + d)
	}

	/// Step into one X-Y quadrant, leaving the Z range whole.  Bit 0 selects
	/// east, bit 1 selects north.
	pub fn go(&mut self, dir: u8) {
		let mid = self.mid();
		if dir & 0b01 == 0 {
			self.max.x = mid.x;
		} else {
			self.min.x = mid.x;
		}
		if dir & 0b10 == 0 {
			self.max.y = mid.y;
		} else {
			self.min.y = mid.y;
		}
	}

	pub fn contains(&self, p: Point) -> bool {
		p.x >= self.min.x
			&& p.x <= self.max.x
			&& p.y >= self.min.y
			&& p.y <= self.max.y
			&& p.z >= self.min.z
			&& p.z <= self.max.z
	}

	pub fn maybe_from(value: &serde_json::Value) -> crate::error::Result<Option<Bounds>> {
		if value.is_null() {
			return Ok(None);
		}
		let bounds: Bounds = serde_json::from_value(value.clone())?;
		Ok(Some(bounds))
	}
}

impl From<[f64; 6]> for Bounds {
	fn from(a: [f64; 6]) -> Bounds {
		Bounds::new(Point::new(a[0], a[1], a[2]), Point::new(a[3], a[4], a[5]))
	}
}

impl From<Bounds> for [f64; 6] {
	fn from(b: Bounds) -> [f64; 6] {
		[b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z]
	}
}

impl std::fmt::Display for Bounds {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "[{}, {}]", self.min, self.max)
	}
}
