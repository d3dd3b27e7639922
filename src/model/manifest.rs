use crate::model::file_info::{FileInfo, Status};
use crate::model::stats::{FileStats, PointStats};
use serde::{Deserialize, Serialize};

/// The ordered list of input files backing a build.  Order is fixed at input
/// resolution time; a file's index is its OriginId.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
	file_info: Vec<FileInfo>,
	#[serde(default)]
	file_stats: FileStats,
	#[serde(default)]
	point_stats: PointStats,
}

impl Manifest {
	pub fn new(file_info: Vec<FileInfo>) -> Manifest {
		Manifest {
			file_info,
			file_stats: FileStats::default(),
			point_stats: PointStats::default(),
		}
	}

	pub fn size(&self) -> usize {
		self.file_info.len()
	}

	pub fn file_info(&self) -> &[FileInfo] {
		&self.file_info
	}

	pub fn get(&self, origin: usize) -> &FileInfo {
		&self.file_info[origin]
	}

	pub fn find(&self, path: &str) -> Option<usize> {
		self.file_info.iter().position(|f| f.path == path)
	}

	pub fn paths(&self) -> Vec<String> {
		self.file_info.iter().map(|f| f.path.clone()).collect()
	}

	pub fn append(&mut self, file_info: Vec<FileInfo>) {
		for f in file_info {
			if self.find(&f.path).is_none() {
				self.file_info.push(f);
			}
		}
	}

	pub fn set_status(&mut self, origin: usize, status: Status) {
		match status {
			Status::Inserted => self.file_stats.add_insert(),
			Status::Omitted => self.file_stats.add_omit(),
			Status::Error => self.file_stats.add_error(),
			Status::Outstanding => {}
		}
		self.file_info[origin].status = status;
	}

	pub fn add_point_stats(&mut self, origin: usize, stats: &PointStats) {
		self.file_info[origin].point_stats.add(stats);
		self.point_stats.add(stats);
	}

	pub fn file_stats(&self) -> FileStats {
		self.file_stats
	}

	pub fn point_stats(&self) -> PointStats {
		self.point_stats
	}

	pub fn merge(&mut self, other: &Manifest) {
		self.append(other.file_info.clone());
		self.file_stats.add(&other.file_stats);
		self.point_stats.add(&other.point_stats);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn manifest() -> Manifest {
		Manifest::new(vec![FileInfo::new("a.las"), FileInfo::new("b.las")])
	}

	#[test]
	fn test_status_counting() {
		let mut m = manifest();
		m.set_status(0, Status::Inserted);
		m.set_status(1, Status::Omitted);
		assert_eq!(m.file_stats().inserts, 1);
		assert_eq!(m.file_stats().omits, 1);
		assert_eq!(m.get(0).status, Status::Inserted);
	}

	#[test]
	fn test_append_skips_duplicates() {
		let mut m = manifest();
		m.append(vec![FileInfo::new("b.las"), FileInfo::new("c.las")]);
		assert_eq!(m.size(), 3);
		assert_eq!(m.find("c.las"), Some(2));
	}

	#[test]
	fn test_point_stats_roll_up() {
		let mut m = manifest();
		let stats = PointStats {
			inserts: 100,
			out_of_bounds: 3,
			overflows: 0,
		};
		m.add_point_stats(1, &stats);
		assert_eq!(m.point_stats().inserts, 100);
		assert_eq!(m.get(1).point_stats.out_of_bounds, 3);
	}
}
