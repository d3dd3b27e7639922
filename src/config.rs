use crate::builder::{self, Builder};
use crate::error::{Error, Result};
use crate::inference::{Inference, InferenceOptions};
use crate::matrix::Transformation;
use crate::model::bounds::Bounds;
use crate::model::delta::Delta;
use crate::model::file_info::FileInfo;
use crate::model::manifest::Manifest;
use crate::model::metadata::{HierarchyCompression, Metadata};
use crate::model::reprojection::Reprojection;
use crate::model::schema::{id_size, BaseType, DimInfo, Schema};
use crate::model::structure::Structure;
use crate::model::subset::Subset;
use crate::storage::{self, Endpoint, Storage};
use log::debug;
use serde_json::Value;
use std::sync::Arc;

const INFERENCE_EXTENSION: &str = "entwine-inference";

/// Every recognized key, with its default.  Keys the user already set are
/// left alone, explicit nulls included.
pub fn defaults() -> Value {
	serde_json::json!({
		"input": null,
		"output": null,
		"tmp": "tmp",
		"threads": 8,
		"trustHeaders": true,
		"prefixIds": false,
		"pointsPerChunk": 262144,
		"numPointsHint": null,
		"bounds": null,
		"schema": null,
		"compress": true,
		"nullDepth": 7,
		"baseDepth": 10,
	})
}

pub fn apply_defaults(json: &mut Value) {
	if !json.is_object() {
		*json = serde_json::json!({});
	}

	let d = defaults();
	for (key, value) in d.as_object().unwrap() {
		if json.get(key).is_none() {
			json[key] = value.clone();
		}
	}
}

/// Booleans arrive as true/false or as numbers; any non-zero number counts
/// as set.
pub fn truthy(value: &Value) -> bool {
	value
		.as_bool()
		.unwrap_or_else(|| value.as_u64().map(|n| n != 0).unwrap_or(false))
}

/// Normalize a raw input string toward a resolvable pattern: directories get
/// a trailing `*`, and a basename with no extension is treated as a
/// directory.  Patterns and concrete files pass through.
pub fn directorify(raw: &str) -> String {
	let mut s = raw.to_string();

	if !s.is_empty() && !s.ends_with('*') {
		if storage::is_directory(&s) {
			s.push('*');
		} else if !storage::get_basename(&s).contains('.') {
			s.push_str("/*");
		}
	}

	s
}

/// Resolve `input` in place: an `.entwine-inference` document is loaded and
/// its values adopted wherever the config is silent; anything else expands
/// into a flat array of concrete file paths, in input order.
pub fn normalize_input(json: &mut Value, storage: &Arc<Storage>) -> Result<()> {
	let verbose = truthy(&json["verbose"]);
	let input = json["input"].clone();

	let extension = input
		.as_str()
		.map(storage::get_extension)
		.unwrap_or_default();

	if extension == INFERENCE_EXTENSION {
		let path = input.as_str().unwrap();
		let inference: Value = serde_json::from_slice(&storage.get(path)?)?;

		json["input"] = inference["fileInfo"].clone();

		if json["schema"].is_null() {
			json["schema"] = inference["schema"].clone();
		}
		if json["bounds"].is_null() {
			json["bounds"] = inference["bounds"].clone();
		}
		if json["numPointsHint"].is_null() {
			json["numPointsHint"] = inference["numPoints"].clone();
		}
		if !inference["reprojection"].is_null() && json["reprojection"].is_null() {
			json["reprojection"] = inference["reprojection"].clone();
		}
		if Delta::exists_in(&inference) {
			if json["scale"].is_null() {
				json["scale"] = inference["scale"].clone();
			}
			if json["offset"].is_null() {
				json["offset"] = inference["offset"].clone();
			}
		}

		return Ok(());
	}

	let mut resolved: Vec<Value> = Vec::new();
	let insert = |s: &str, out: &mut Vec<Value>| -> Result<()> {
		for path in storage.resolve(&directorify(s), verbose)? {
			out.push(Value::String(path));
		}
		Ok(())
	};

	match &input {
		Value::String(s) => insert(s, &mut resolved)?,
		Value::Array(items) => {
			for item in items {
				match item {
					// Already-enriched entries pass through untouched.
					Value::String(s) => insert(s, &mut resolved)?,
					other => resolved.push(other.clone()),
				}
			}
		}
		// No input at all legitimately means a resume without additions.
		_ => return Ok(()),
	}

	json["input"] = Value::Array(resolved);
	Ok(())
}

fn extract_file_info(input: &Value) -> Vec<FileInfo> {
	match input {
		Value::Array(items) => items
			.iter()
			.filter_map(|item| match item {
				Value::String(s) => Some(FileInfo::new(s)),
				Value::Object(_) => serde_json::from_value(item.clone()).ok(),
				_ => None,
			})
			.collect(),
		_ => Vec::new(),
	}
}

fn try_get_existing(
	json: &Value,
	storage: &Arc<Storage>,
	out_path: &str,
	tmp_path: &str,
	threads: usize,
) -> Result<Option<Builder>> {
	let subset_id = json["subset"]["id"].as_u64();
	let out = Endpoint::new(storage.clone(), out_path);

	if out.try_get_size(&builder::marker_name(subset_id)).is_some() {
		let b = Builder::reopen(out_path, tmp_path, threads, subset_id, storage.clone())?;
		Ok(Some(b))
	} else {
		Ok(None)
	}
}

/// When this build covers a subset of a larger index, the tree must be deep
/// enough that the subset's boxes land on whole chunks; bump the configured
/// depths up to the subset minima and reflect the bumps back into the
/// config.
pub fn maybe_accommodate_subset(
	json: &mut Value,
	bounds_conforming: &Bounds,
	delta: Option<&Delta>,
) -> Result<Option<Subset>> {
	if json["subset"].is_null() {
		return Ok(None);
	}
	let verbose = truthy(&json["verbose"]);

	let cube = bounds_conforming.cubeify(delta);
	let subset = Subset::from_config(&cube, &json["subset"])?;

	let config_null_depth = json["nullDepth"].as_u64().unwrap_or(0);
	let minimum_null_depth = subset.minimum_null_depth();
	if config_null_depth < minimum_null_depth {
		if verbose {
			println!(
				"Bumping null depth to accommodate subset: {}",
				minimum_null_depth
			);
		}
		json["nullDepth"] = minimum_null_depth.into();
	}

	let config_base_depth = json["baseDepth"].as_u64().unwrap_or(0);
	let points_per_chunk = json["pointsPerChunk"].as_u64().unwrap_or(262144);
	let minimum_base_depth = subset.minimum_base_depth(points_per_chunk);
	if config_base_depth < minimum_base_depth {
		if verbose {
			println!(
				"Bumping base depth to accommodate subset: {}",
				minimum_base_depth
			);
		}
		json["baseDepth"] = minimum_base_depth.into();
		json["bumpDepth"] = config_base_depth.into();
	}

	Ok(Some(subset))
}

/// Resolve the configuration into a builder: reopen a prior build when its
/// marker exists, otherwise infer whatever is missing and assemble fresh
/// metadata.
pub fn get_builder(mut json: Value, storage: Arc<Storage>) -> Result<Builder> {
	apply_defaults(&mut json);
	let verbose = truthy(&json["verbose"]);

	let out_path = json["output"]
		.as_str()
		.filter(|s| !s.is_empty())
		.map(str::to_string)
		.ok_or_else(|| Error::Config("output path required".to_string()))?;
	let tmp_path = json["tmp"].as_str().unwrap_or("tmp").to_string();
	let threads = json["threads"].as_u64().unwrap_or(8) as usize;

	normalize_input(&mut json, &storage)?;
	let mut file_info = extract_file_info(&json["input"]);

	if !truthy(&json["force"]) {
		if let Some(mut existing) =
			try_get_existing(&json, &storage, &out_path, &tmp_path, threads)?
		{
			// More paths extend the manifest; an absent input continues the
			// partial build with whatever is already outstanding.
			if json["input"].is_array() {
				existing.append(file_info);
			}
			return Ok(existing);
		}
	}

	let compress = truthy(&json["compress"]);
	let trust_headers = truthy(&json["trustHeaders"]);

	let cesium_settings = match &json["formats"]["cesium"] {
		Value::Null => None,
		v => Some(v.clone()),
	};
	let mut absolute = truthy(&json["absolute"]);

	if cesium_settings.is_some() {
		absolute = true;
		json["reprojection"]["out"] = "EPSG:4978".into();
	}

	let reprojection = Reprojection::maybe_from(&json["reprojection"]);

	let mut delta = if !absolute && Delta::exists_in(&json) {
		Some(Delta::from_config(&json)?)
	} else {
		None
	};
	let mut transformation: Option<Transformation> = None;

	// Building from an inference document or a fully specified config
	// already provides these three; anything still missing must be inferred
	// from the files themselves.
	let mut num_points_hint = json["numPointsHint"].as_u64();
	let mut bounds_conforming = Bounds::maybe_from(&json["bounds"])?;
	let mut schema = Schema::maybe_from(&json["schema"])?;

	let needs_inference =
		bounds_conforming.is_none() || schema.is_none() || num_points_hint.is_none();

	if needs_inference {
		if verbose {
			println!("Performing dataset inference...");
		}

		let mut inference = Inference::new(
			file_info,
			InferenceOptions {
				reprojection: reprojection.clone(),
				trust_headers,
				allow_delta: !absolute,
				tmp_path: tmp_path.clone(),
				threads,
				verbose,
				cesiumify: cesium_settings.is_some(),
			},
			storage.clone(),
		);
		inference.go()?;

		// The inferred list carries details per file instead of bare paths.
		file_info = inference.file_info()?.to_vec();

		if !absolute {
			if let Some(inferred) = inference.delta()? {
				let d = delta.get_or_insert_with(Delta::default);
				if json["scale"].is_null() {
					d.scale = inferred.scale;
				}
				if json["offset"].is_null() {
					d.offset = inferred.offset;
				}
			}
		}

		if bounds_conforming.is_none() {
			let native = inference.native_bounds()?.clone();
			if verbose {
				println!("Inferred: {}", native);
			}
			bounds_conforming = Some(native);
		}

		if schema.is_none() {
			let bounds = bounds_conforming.as_ref().unwrap();
			let mut inferred = inference.schema()?.clone();

			if let Some(d) = &delta {
				let cube = bounds.cubeify(Some(d));
				inferred = inferred.deltify(&cube, d);
			}

			let mut dims = inferred.into_dims();

			let max_points = file_info
				.iter()
				.filter_map(|f| f.num_points)
				.max()
				.unwrap_or(0);
			dims.push(DimInfo::new(
				"PointId",
				BaseType::Unsigned,
				id_size(max_points),
			));
			dims.push(DimInfo::new(
				"OriginId",
				BaseType::Unsigned,
				id_size(file_info.len() as u64),
			));

			schema = Some(Schema::new(dims));
		}

		if num_points_hint.is_none() {
			num_points_hint = Some(inference.num_points()?);
		}

		if let Some(t) = inference.transformation()? {
			transformation = Some(*t);
		}
	}

	// All three are prerequisites for metadata; by now each is either
	// user-supplied or inferred.
	let bounds_conforming =
		bounds_conforming.ok_or_else(|| Error::Config("bounds unresolved".to_string()))?;
	let schema = schema.ok_or_else(|| Error::Config("schema unresolved".to_string()))?;
	let num_points_hint =
		num_points_hint.ok_or_else(|| Error::Config("numPointsHint unresolved".to_string()))?;

	let subset = maybe_accommodate_subset(&mut json, &bounds_conforming, delta.as_ref())?;

	json["numPointsHint"] = num_points_hint.into();
	debug!("normalized config: {}", json);

	let structure = Structure::from_config(&json)?;
	let hierarchy_structure = structure.hierarchy(subset.as_ref());
	let hierarchy_compression = if compress {
		HierarchyCompression::Lzma
	} else {
		HierarchyCompression::None
	};

	let srs = file_info.iter().find_map(|f| f.srs.clone());
	let manifest = Manifest::new(file_info);

	let mut metadata = Metadata::new(
		bounds_conforming,
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
	);
	if let Some(srs) = srs {
		metadata.set_srs(srs);
	}

	Ok(Builder::create(
		metadata,
		&out_path,
		&tmp_path,
		threads,
		storage,
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::las_reader::write_fixture;
	use crate::model::point::Point;
	use serde_json::json;

	#[test]
	fn test_defaults_complete_after_application() {
		let mut json = json!({ "threads": 2 });
		apply_defaults(&mut json);

		for key in defaults().as_object().unwrap().keys() {
			assert!(json.get(key).is_some(), "missing default for {}", key);
		}
		// User-set values win.
		assert_eq!(json["threads"], 2);
		assert_eq!(json["pointsPerChunk"], 262144);
		assert_eq!(json["trustHeaders"], true);
	}

	#[test]
	fn test_directorify() {
		let dir = tempfile::tempdir().unwrap();
		let dir_str = dir.path().to_string_lossy().to_string();

		assert_eq!(directorify(&dir_str), format!("{}*", dir_str));
		assert_eq!(directorify("foo"), "foo/*");
		assert_eq!(directorify("foo.las"), "foo.las");
		assert_eq!(directorify("foo*"), "foo*");
	}

	#[test]
	fn test_truthy() {
		assert!(truthy(&json!(true)));
		assert!(truthy(&json!(1)));
		assert!(!truthy(&json!(0)));
		assert!(!truthy(&json!(false)));
		assert!(!truthy(&json!(null)));
	}

	#[test]
	fn test_normalize_input_expands_directories_in_order() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("b.las"), b"x").unwrap();
		std::fs::write(dir.path().join("a.las"), b"x").unwrap();
		let single = dir.path().join("z.las");
		std::fs::write(&single, b"x").unwrap();

		let mut json = json!({
			"input": [single.to_string_lossy(), dir.path().to_string_lossy()],
		});
		apply_defaults(&mut json);
		normalize_input(&mut json, &Arc::new(Storage::new())).unwrap();

		let paths: Vec<String> = json["input"]
			.as_array()
			.unwrap()
			.iter()
			.map(|v| v.as_str().unwrap().to_string())
			.collect();

		// The single file stays first; the directory expands after it.
		assert_eq!(paths.len(), 4);
		assert!(paths[0].ends_with("z.las"));
		assert!(paths[1].ends_with("a.las"));
	}

	#[test]
	fn test_normalize_input_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("a.las"), b"x").unwrap();

		let mut json = json!({ "input": dir.path().to_string_lossy() });
		apply_defaults(&mut json);
		let storage = Arc::new(Storage::new());
		normalize_input(&mut json, &storage).unwrap();

		let mut again = json.clone();
		apply_defaults(&mut again);
		normalize_input(&mut again, &storage).unwrap();
		assert_eq!(again, json);
	}

	#[test]
	fn test_inference_document_input() {
		let dir = tempfile::tempdir().unwrap();
		let doc = json!({
			"fileInfo": [{ "path": "a.las", "numPoints": 500, "bounds": [0, 0, 0, 10, 10, 10] }],
			"schema": [
				{ "name": "X", "type": "floating", "size": 8 },
				{ "name": "Y", "type": "floating", "size": 8 },
				{ "name": "Z", "type": "floating", "size": 8 },
			],
			"bounds": [0, 0, 0, 10, 10, 10],
			"numPoints": 500,
			"scale": [0.01, 0.01, 0.01],
			"offset": [10, 10, 10],
		});
		let path = dir.path().join("prior.entwine-inference");
		std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

		let mut json = json!({
			"input": path.to_string_lossy(),
			"bounds": [0, 0, 0, 5, 5, 5],
		});
		apply_defaults(&mut json);
		normalize_input(&mut json, &Arc::new(Storage::new())).unwrap();

		// Cached values fill the gaps; user-specified bounds survive.
		assert_eq!(json["numPointsHint"], 500);
		assert_eq!(json["schema"].as_array().unwrap().len(), 3);
		assert_eq!(json["bounds"][3], 5);
		assert_eq!(json["scale"][0], 0.01);
		assert_eq!(json["input"][0]["path"], "a.las");
	}

	#[test]
	fn test_get_builder_from_inference_document() {
		// The listed file does not exist, so this only passes if no probing
		// happens: everything comes from the cached document.
		let dir = tempfile::tempdir().unwrap();
		let doc = json!({
			"fileInfo": [{ "path": "a.las", "numPoints": 500, "bounds": [0, 0, 0, 10, 10, 10] }],
			"schema": [
				{ "name": "X", "type": "floating", "size": 8 },
				{ "name": "Y", "type": "floating", "size": 8 },
				{ "name": "Z", "type": "floating", "size": 8 },
			],
			"bounds": [0, 0, 0, 10, 10, 10],
			"numPoints": 500,
		});
		let path = dir.path().join("prior.entwine-inference");
		std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

		let json = json!({
			"input": path.to_string_lossy(),
			"output": dir.path().join("out").to_string_lossy(),
		});

		let builder = get_builder(json, Arc::new(Storage::new())).unwrap();
		let metadata = builder.metadata();

		assert_eq!(metadata.manifest().size(), 1);
		assert_eq!(metadata.manifest().get(0).num_points, Some(500));
		assert_eq!(metadata.schema().dims().len(), 3);
		assert_eq!(
			metadata.bounds_conforming(),
			&Bounds::new(Point::fill(0.0), Point::fill(10.0))
		);
	}

	#[test]
	fn test_subset_accommodation_bumps_depths() {
		let mut json = json!({
			"subset": { "id": 1, "of": 64 },
			"nullDepth": 5,
			"baseDepth": 8,
			"pointsPerChunk": 262144,
		});
		let bounds = Bounds::new(Point::fill(0.0), Point::fill(1000.0));

		let subset = maybe_accommodate_subset(&mut json, &bounds, None)
			.unwrap()
			.unwrap();

		assert_eq!(subset.of(), 64);
		// Already deep enough for the null minimum of 3.
		assert_eq!(json["nullDepth"], 5);
		// Too shallow for 64 subsets at 262144 points per chunk.
		assert_eq!(json["baseDepth"], 12);
		assert_eq!(json["bumpDepth"], 8);
	}

	#[test]
	fn test_get_builder_fresh_build() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a.las");
		let b = dir.path().join("b.las");
		write_fixture(&a, &[(0.0, 0.0, 0.0), (10.0, 10.0, 10.0)], 0.01);
		write_fixture(&b, &[(1.0, 1.0, 1.0), (9.0, 9.0, 9.0)], 0.01);

		let out = dir.path().join("out");
		let json = json!({
			"input": [a.to_string_lossy(), b.to_string_lossy()],
			"output": out.to_string_lossy(),
			"tmp": dir.path().join("tmp").to_string_lossy(),
		});

		let builder = get_builder(json, Arc::new(Storage::new())).unwrap();
		let metadata = builder.metadata();

		assert_eq!(metadata.manifest().size(), 2);
		assert!(metadata.delta().is_some());

		// Trailing id dimensions are appended after the file dims.
		let dims = metadata.schema().dims();
		let n = dims.len();
		assert_eq!(dims[n - 2].name, "PointId");
		assert_eq!(dims[n - 2].size, 4);
		assert_eq!(dims[n - 1].name, "OriginId");
		assert_eq!(dims[n - 1].size, 4);

		// The cube encloses the conforming bounds.
		let spans = metadata.bounds().spans();
		assert_eq!(spans.x, spans.y);
		assert_eq!(spans.y, spans.z);
	}

	#[test]
	fn test_get_builder_resumes_from_marker() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a.las");
		write_fixture(&a, &[(0.0, 0.0, 0.0), (10.0, 10.0, 10.0)], 0.01);

		let out = dir.path().join("out");
		let storage = Arc::new(Storage::new());

		let first = get_builder(
			json!({
				"input": [a.to_string_lossy()],
				"output": out.to_string_lossy(),
				"tmp": dir.path().join("tmp").to_string_lossy(),
			}),
			storage.clone(),
		)
		.unwrap();
		first.save().unwrap();

		// Empty input resumes the prior build without touching any files.
		let resumed = get_builder(
			json!({
				"input": [],
				"output": out.to_string_lossy(),
				"force": false,
			}),
			storage.clone(),
		)
		.unwrap();
		assert_eq!(resumed.metadata(), first.metadata());

		// Force bypasses the marker; with nothing to read, inference fails.
		let err = get_builder(
			json!({
				"input": [],
				"output": out.to_string_lossy(),
				"force": true,
			}),
			storage,
		)
		.unwrap_err();
		assert!(matches!(err, Error::NoReadableInputs));
	}

	#[test]
	fn test_get_builder_cesium_forces_geocentric_output() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("earth.las");
		write_fixture(
			&a,
			&[(6378000.0, -500.0, -500.0), (6379000.0, 500.0, 500.0)],
			0.01,
		);

		let out = dir.path().join("out");
		let json = json!({
			"input": [a.to_string_lossy()],
			"output": out.to_string_lossy(),
			"tmp": dir.path().join("tmp").to_string_lossy(),
			"formats": { "cesium": {} },
		});

		let builder = get_builder(json, Arc::new(Storage::new())).unwrap();
		let metadata = builder.metadata();

		assert!(metadata.cesium_settings().is_some());
		assert_eq!(metadata.reprojection().unwrap().out, "EPSG:4978");
		// Absolute mode: no delta even though headers carry a scale.
		assert!(metadata.delta().is_none());

		// The transformation translates the data centroid to the origin.
		let t = metadata.transformation().unwrap();
		let mid = metadata.bounds_conforming().mid();
		assert!(mid.length() < 1.0, "expected centered bounds: {}", mid);
		assert!(t[3].abs() > 1000.0 || t[7].abs() > 1000.0 || t[11].abs() > 1000.0);
	}

	#[test]
	fn test_get_builder_requires_output() {
		let err = get_builder(json!({ "input": [] }), Arc::new(Storage::new())).unwrap_err();
		assert!(matches!(err, Error::Config(_)));
	}

	#[test]
	fn test_get_builder_no_readable_inputs() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("notes.txt.gz"), b"zzz").unwrap();

		let json = json!({
			"input": dir.path().to_string_lossy(),
			"output": dir.path().join("out").to_string_lossy(),
		});

		let err = get_builder(json, Arc::new(Storage::new())).unwrap_err();
		assert!(matches!(err, Error::NoReadableInputs));
	}
}
