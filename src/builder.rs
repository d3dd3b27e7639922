use crate::error::Result;
use crate::model::file_info::FileInfo;
use crate::model::metadata::Metadata;
use crate::storage::{Endpoint, Storage};
use log::info;
use std::sync::Arc;

const MARKER: &str = "entwine";

/// Name of the marker blob whose presence at the output root signals a
/// resumable build.
pub fn marker_name(subset_id: Option<u64>) -> String {
	match subset_id {
		Some(id) => format!("{}-{}", MARKER, id),
		None => MARKER.to_string(),
	}
}

/// Handle on a build in progress.  The indexing passes live elsewhere; this
/// owns the metadata, persists the marker, and accepts manifest additions
/// when a resumed config supplies more inputs.
#[derive(Debug)]
pub struct Builder {
	metadata: Metadata,
	out: Endpoint,
	tmp: Endpoint,
	threads: usize,
}

impl Builder {
	pub fn create(
		metadata: Metadata,
		out_path: &str,
		tmp_path: &str,
		threads: usize,
		storage: Arc<Storage>,
	) -> Builder {
		Builder {
			metadata,
			out: Endpoint::new(storage.clone(), out_path),
			tmp: Endpoint::new(storage, tmp_path),
			threads,
		}
	}

	/// Reopen a prior build from its marker blob.
	pub fn reopen(
		out_path: &str,
		tmp_path: &str,
		threads: usize,
		subset_id: Option<u64>,
		storage: Arc<Storage>,
	) -> Result<Builder> {
		let out = Endpoint::new(storage.clone(), out_path);
		let data = out.get(&marker_name(subset_id))?;
		let metadata: Metadata = serde_json::from_slice(&data)?;

		info!(
			"reopened build at {} with {} manifest entries",
			out_path,
			metadata.manifest().size()
		);

		Ok(Builder {
			metadata,
			out,
			tmp: Endpoint::new(storage, tmp_path),
			threads,
		})
	}

	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	pub fn tmp(&self) -> &Endpoint {
		&self.tmp
	}

	pub fn threads(&self) -> usize {
		self.threads
	}

	pub fn append(&mut self, file_info: Vec<FileInfo>) {
		self.metadata.append_manifest(file_info);
	}

	pub fn record_error(&mut self, error: String) {
		self.metadata.record_error(error);
	}

	pub fn set_srs(&mut self, srs: String) {
		self.metadata.set_srs(srs);
	}

	pub fn save(&self) -> Result<()> {
		let name = marker_name(self.metadata.subset().map(|s| s.id()));
		self.out
			.put(&name, &serde_json::to_vec_pretty(&self.metadata)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::bounds::Bounds;
	use crate::model::manifest::Manifest;
	use crate::model::metadata::HierarchyCompression;
	use crate::model::point::Point;
	use crate::model::schema::{BaseType, DimInfo, Schema};
	use crate::model::structure::Structure;
	use crate::model::subset::Subset;

	fn metadata(subset: Option<Subset>) -> Metadata {
		let structure = Structure {
			null_depth: 7,
			base_depth: 10,
			points_per_chunk: 262144,
			bump_depth: None,
			prefix_ids: false,
		};
		Metadata::new(
			Bounds::new(Point::fill(0.0), Point::fill(100.0)),
			Schema::new(vec![DimInfo::new("X", BaseType::Floating, 8)]),
			structure.clone(),
			structure.hierarchy(subset.as_ref()),
			Manifest::new(vec![FileInfo::new("a.las")]),
			true,
			false,
			HierarchyCompression::None,
			None,
			subset,
			None,
			None,
			None,
		)
	}

	#[test]
	fn test_marker_names() {
		assert_eq!(marker_name(None), "entwine");
		assert_eq!(marker_name(Some(3)), "entwine-3");
	}

	#[test]
	fn test_save_reopen_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		let storage = Arc::new(Storage::new());

		let builder = Builder::create(
			metadata(None),
			&out.to_string_lossy(),
			"tmp",
			4,
			storage.clone(),
		);
		builder.save().unwrap();

		let reopened =
			Builder::reopen(&out.to_string_lossy(), "tmp", 4, None, storage).unwrap();
		assert_eq!(reopened.metadata(), builder.metadata());
		assert_eq!(reopened.threads(), 4);
	}

	#[test]
	fn test_subset_markers_do_not_collide() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().to_string_lossy().to_string();
		let storage = Arc::new(Storage::new());

		let cube = Bounds::new(Point::fill(0.0), Point::fill(100.0));
		let subset = Subset::new(&cube, 2, 4).unwrap();
		let builder = Builder::create(metadata(Some(subset)), &out, "tmp", 1, storage.clone());
		builder.save().unwrap();

		let ep = Endpoint::new(storage, &out);
		assert!(ep.try_get_size("entwine-2").is_some());
		assert!(ep.try_get_size("entwine").is_none());
	}

	#[test]
	fn test_append_extends_manifest() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().to_string_lossy().to_string();
		let mut builder =
			Builder::create(metadata(None), &out, "tmp", 1, Arc::new(Storage::new()));

		builder.append(vec![FileInfo::new("b.las"), FileInfo::new("a.las")]);
		assert_eq!(builder.metadata().manifest().size(), 2);
	}
}
