use serde::{Deserialize, Serialize};

/// Point-level counters aggregated as files are inserted into a build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointStats {
	pub inserts: u64,
	pub out_of_bounds: u64,
	pub overflows: u64,
}

impl PointStats {
	pub fn add(&mut self, other: &PointStats) {
		self.inserts += other.inserts;
		self.out_of_bounds += other.out_of_bounds;
		self.overflows += other.overflows;
	}

	pub fn add_insert(&mut self) {
		self.inserts += 1;
	}

	pub fn add_out_of_bounds(&mut self, n: u64) {
		self.out_of_bounds += n;
	}

	pub fn add_overflow(&mut self) {
		self.overflows += 1;
	}

	pub fn is_empty(&self) -> bool {
		*self == PointStats::default()
	}
}

/// File-level counters, bumped once per terminal file status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
	pub inserts: u64,
	pub omits: u64,
	pub errors: u64,
}

impl FileStats {
	pub fn add(&mut self, other: &FileStats) {
		self.inserts += other.inserts;
		self.omits += other.omits;
		self.errors += other.errors;
	}

	pub fn add_insert(&mut self) {
		self.inserts += 1;
	}

	pub fn add_omit(&mut self) {
		self.omits += 1;
	}

	pub fn add_error(&mut self) {
		self.errors += 1;
	}
}
