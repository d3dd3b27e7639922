use crate::matrix::Transformation;
use crate::model::bounds::Bounds;
use crate::model::delta::Delta;
use crate::model::file_info::FileInfo;
use crate::model::manifest::Manifest;
use crate::model::reprojection::Reprojection;
use crate::model::schema::Schema;
use crate::model::structure::Structure;
use crate::model::subset::Subset;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ratio by which the cubic bounds are expanded to avoid aliasing points
/// that sit exactly on the boundary.
const EPSILON_RATIO: f64 = 0.005;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HierarchyCompression {
	None,
	Lzma,
}

/// Immutable descriptor seeding the downstream builder.  All bounds have the
/// delta applied already, if one exists.  Constructed once by the planner;
/// the only mutations allowed afterwards are the narrow crate-level
/// operations the builder needs while running.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
	bounds_conforming: Bounds,
	bounds: Bounds,
	bounds_epsilon: Bounds,
	schema: Schema,
	structure: Structure,
	hierarchy_structure: Structure,
	manifest: Manifest,
	trust_headers: bool,
	compress: bool,
	hierarchy_compression: HierarchyCompression,
	#[serde(skip_serializing_if = "Option::is_none")]
	reprojection: Option<Reprojection>,
	#[serde(skip_serializing_if = "Option::is_none")]
	subset: Option<Subset>,
	#[serde(skip_serializing_if = "Option::is_none")]
	delta: Option<Delta>,
	#[serde(skip_serializing_if = "Option::is_none")]
	transformation: Option<Transformation>,
	#[serde(skip_serializing_if = "Option::is_none")]
	cesium_settings: Option<Value>,
	version: String,
	srs: String,
	errors: Vec<String>,
}

impl Metadata {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		bounds_conforming: Bounds,
		schema: Schema,
		structure: Structure,
		hierarchy_structure: Structure,
		manifest: Manifest,
		trust_headers: bool,
		compress: bool,
		hierarchy_compression: HierarchyCompression,
		reprojection: Option<Reprojection>,
		subset: Option<Subset>,
		delta: Option<Delta>,
		transformation: Option<Transformation>,
		cesium_settings: Option<Value>,
	) -> Metadata {
		// Every stored bounds already has the delta applied; native bounds
		// are recovered through undeltify.
		let bounds_conforming = match &delta {
			Some(d) => bounds_conforming.deltify(d),
			None => bounds_conforming,
		};
		let bounds = bounds_conforming.cubeify(None);
		let bounds_epsilon = bounds.grow_by(EPSILON_RATIO);

		Metadata {
			bounds_conforming,
			bounds,
			bounds_epsilon,
			schema,
			structure,
			hierarchy_structure,
			manifest,
			trust_headers,
			compress,
			hierarchy_compression,
			reprojection,
			subset,
			delta,
			transformation,
			cesium_settings,
			version: env!("CARGO_PKG_VERSION").to_string(),
			srs: String::new(),
			errors: Vec::new(),
		}
	}

	pub fn bounds(&self) -> &Bounds {
		&self.bounds
	}

	pub fn bounds_conforming(&self) -> &Bounds {
		&self.bounds_conforming
	}

	pub fn bounds_epsilon(&self) -> &Bounds {
		&self.bounds_epsilon
	}

	pub fn bounds_native(&self) -> Bounds {
		match &self.delta {
			Some(d) => self.bounds.undeltify(d),
			None => self.bounds.clone(),
		}
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	pub fn structure(&self) -> &Structure {
		&self.structure
	}

	pub fn hierarchy_structure(&self) -> &Structure {
		&self.hierarchy_structure
	}

	pub fn manifest(&self) -> &Manifest {
		&self.manifest
	}

	pub fn trust_headers(&self) -> bool {
		self.trust_headers
	}

	pub fn compress(&self) -> bool {
		self.compress
	}

	pub fn hierarchy_compression(&self) -> HierarchyCompression {
		self.hierarchy_compression
	}

	pub fn reprojection(&self) -> Option<&Reprojection> {
		self.reprojection.as_ref()
	}

	pub fn subset(&self) -> Option<&Subset> {
		self.subset.as_ref()
	}

	pub fn delta(&self) -> Option<&Delta> {
		self.delta.as_ref()
	}

	pub fn transformation(&self) -> Option<&Transformation> {
		self.transformation.as_ref()
	}

	pub fn cesium_settings(&self) -> Option<&Value> {
		self.cesium_settings.as_ref()
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn srs(&self) -> &str {
		&self.srs
	}

	pub fn errors(&self) -> &[String] {
		&self.errors
	}

	/// Marker-name suffix distinguishing sibling subset builds.
	pub fn postfix(&self) -> String {
		match &self.subset {
			Some(s) => format!("-{}", s.id()),
			None => String::new(),
		}
	}

	// The builder appends manifest entries, errors, and the dataset SRS while
	// it runs; nothing else may change.

	pub(crate) fn append_manifest(&mut self, file_info: Vec<FileInfo>) {
		self.manifest.append(file_info);
	}

	pub(crate) fn record_error(&mut self, error: String) {
		self.errors.push(error);
	}

	pub(crate) fn set_srs(&mut self, srs: String) {
		if self.srs.is_empty() {
			self.srs = srs;
		}
	}
}
