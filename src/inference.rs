use crate::error::{Error, Result};
use crate::matrix::{self, Transformation};
use crate::model::bounds::Bounds;
use crate::model::delta::Delta;
use crate::model::file_info::{FileInfo, Status};
use crate::model::point::Point;
use crate::model::reprojection::Reprojection;
use crate::model::schema::{DimInfo, Schema};
use crate::reader;
use crate::storage::{self, Endpoint, Storage};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, RANGE};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct InferenceOptions {
	pub reprojection: Option<Reprojection>,
	pub trust_headers: bool,
	pub allow_delta: bool,
	pub tmp_path: String,
	pub threads: usize,
	pub verbose: bool,
	pub cesiumify: bool,
}

/// Everything the planner needs that wasn't supplied up front: global point
/// count, bounds, unified schema, and the optional delta and reorientation.
struct Inferred {
	num_points: u64,
	bounds: Bounds,
	schema: Schema,
	delta: Option<Delta>,
	transformation: Option<Transformation>,
	srs_list: Vec<String>,
}

/// State shared between probe tasks, held only while folding a preview into
/// the aggregate, never across I/O.
#[derive(Default)]
struct Shared {
	dim_set: HashSet<String>,
	dim_vec: Vec<String>,
	delta: Option<Delta>,
	errors: Vec<Error>,
}

/// Drives the file probes over a worker pool and aggregates the results.
/// `go` runs once; every accessor fails until it has succeeded.
pub struct Inference {
	file_info: Vec<FileInfo>,
	options: InferenceOptions,
	storage: Arc<Storage>,
	tmp: Endpoint,
	spent: bool,
	result: Option<Inferred>,
}

impl Inference {
	pub fn new(
		file_info: Vec<FileInfo>,
		options: InferenceOptions,
		storage: Arc<Storage>,
	) -> Inference {
		let tmp = Endpoint::new(storage.clone(), &options.tmp_path);
		Inference {
			file_info,
			options,
			storage,
			tmp,
			spent: false,
			result: None,
		}
	}

	pub fn go(&mut self) -> Result<()> {
		if self.spent {
			return Err(Error::InferenceExhausted);
		}
		self.spent = true;

		let size = self.file_info.len();
		let pool = rayon::ThreadPoolBuilder::new()
			.num_threads(self.options.threads.max(1))
			.build()
			.map_err(|e| Error::Config(format!("thread pool: {}", e)))?;

		let shared = Mutex::new(Shared::default());
		let mut valid = false;

		let pb = if self.options.verbose {
			ProgressBar::new(size as u64)
		} else {
			ProgressBar::hidden()
		};
		pb.set_style(
			ProgressStyle::default_bar()
				.template("[{bar:40.cyan/blue}] {pos}/{len} files {msg}")
				.unwrap()
				.progress_chars("=> "),
		);

		{
			let file_info = &mut self.file_info;
			let options = &self.options;
			let storage = &self.storage;
			let tmp = &self.tmp;
			let shared = &shared;
			let pb = &pb;

			pool.scope(|s| {
				for (i, f) in file_info.iter_mut().enumerate() {
					if options.verbose {
						pb.println(format!("{} / {}: {}", i + 1, size, f.path));
					}

					if !reader::good(&f.path) {
						f.status = Status::Omitted;
						pb.inc(1);
						continue;
					}
					valid = true;

					s.spawn(move |_| {
						if let Err(e) = probe(storage, tmp, options, shared, f) {
							shared.lock().unwrap().errors.push(e);
						}
						pb.inc(1);
					});
				}
			});
		}
		pb.finish_and_clear();

		let Shared {
			dim_vec,
			delta,
			mut errors,
			..
		} = shared.into_inner().unwrap();

		if !errors.is_empty() {
			return Err(errors.remove(0));
		}
		if !valid {
			return Err(Error::NoReadableInputs);
		}

		let (num_points, bounds, delta, srs_list) = self.aggregate(delta);
		let schema = make_schema(&dim_vec, bounds.as_ref(), delta.as_ref());

		if num_points == 0 {
			return Err(Error::EmptyData("Zero points found".to_string()));
		}
		if schema.stride() == 0 {
			return Err(Error::SchemaEmpty);
		}
		let mut bounds = bounds.ok_or_else(|| Error::EmptyData("No bounds found".to_string()))?;

		let mut transformation = None;
		if self.options.cesiumify {
			if self.options.verbose {
				println!("Transforming inference");
			}

			let t = calc_transformation(&bounds);
			let mut grown: Option<Bounds> = None;

			for f in &mut self.file_info {
				let fb = f.bounds.as_ref().ok_or(Error::MissingBounds)?;
				let tb = reader::transform(fb, &t);
				if let Some(g) = &mut grown {
					g.grow_bounds(&tb);
				} else {
					grown = Some(tb.clone());
				}
				f.bounds = Some(tb);
			}

			bounds = grown.ok_or(Error::MissingBounds)?;
			transformation = Some(t);
		}

		debug!(
			"inference complete: {} points across {} files",
			num_points, size
		);

		self.result = Some(Inferred {
			num_points,
			bounds,
			schema,
			delta,
			transformation,
			srs_list,
		});

		Ok(())
	}

	/// Walk files in origin order: sum counts, union bounds, dedup SRSes,
	/// and finalize the delta offset before rewriting file bounds into delta
	/// units.
	fn aggregate(
		&mut self,
		mut delta: Option<Delta>,
	) -> (u64, Option<Bounds>, Option<Delta>, Vec<String>) {
		let mut num_points = 0;
		let mut bounds: Option<Bounds> = None;
		let mut srs_list: Vec<String> = Vec::new();

		for f in &self.file_info {
			num_points += f.num_points.unwrap_or(0);

			if let Some(b) = &f.bounds {
				if let Some(g) = &mut bounds {
					g.grow_bounds(b);
				} else {
					bounds = Some(b.clone());
				}
			}

			if let Some(s) = &f.srs {
				if !srs_list.contains(s) {
					srs_list.push(s.clone());
				}
			}
		}

		if let (Some(d), Some(b)) = (&mut delta, &bounds) {
			// The delta bounds guarantee an extra buffer, so slop the offset
			// to multiples of 10 for prettier numbers.
			d.offset = Point::apply(slop_to_ten, b.mid());

			for f in &mut self.file_info {
				if let Some(fb) = &f.bounds {
					f.bounds = Some(fb.deltify(d));
				}
			}
		}

		(num_points, bounds, delta, srs_list)
	}

	fn inferred(&self) -> Result<&Inferred> {
		self.result.as_ref().ok_or(Error::InferenceIncomplete)
	}

	pub fn num_points(&self) -> Result<u64> {
		Ok(self.inferred()?.num_points)
	}

	pub fn native_bounds(&self) -> Result<&Bounds> {
		Ok(&self.inferred()?.bounds)
	}

	pub fn schema(&self) -> Result<&Schema> {
		Ok(&self.inferred()?.schema)
	}

	pub fn delta(&self) -> Result<Option<&Delta>> {
		Ok(self.inferred()?.delta.as_ref())
	}

	pub fn transformation(&self) -> Result<Option<&Transformation>> {
		Ok(self.inferred()?.transformation.as_ref())
	}

	pub fn srs_list(&self) -> Result<&[String]> {
		Ok(&self.inferred()?.srs_list)
	}

	pub fn file_info(&self) -> Result<&[FileInfo]> {
		self.inferred()?;
		Ok(&self.file_info)
	}

	/// The reusable inference document; feeding it back as `input` skips
	/// probing entirely.
	pub fn to_json(&self) -> Result<Value> {
		let inferred = self.inferred()?;

		let mut json = serde_json::json!({
			"fileInfo": self.file_info,
			"schema": inferred.schema,
			"bounds": inferred.bounds,
			"numPoints": inferred.num_points,
		});

		if let Some(r) = &self.options.reprojection {
			json["reprojection"] = serde_json::to_value(r)?;
		}
		if let Some(d) = &inferred.delta {
			json["scale"] = serde_json::to_value(d.scale)?;
			json["offset"] = serde_json::to_value(d.offset)?;
		}

		Ok(json)
	}
}

/// Stage the file locally and fold its probe into the aggregate.  Remote
/// sources only need their leading bytes, since container formats keep the
/// header at the start.
fn probe(
	storage: &Arc<Storage>,
	tmp: &Endpoint,
	options: &InferenceOptions,
	shared: &Mutex<Shared>,
	f: &mut FileInfo,
) -> Result<()> {
	if storage.is_http_derived(&f.path) {
		let data = storage.get_binary(&f.path, &range_headers())?;
		let name = storage::sanitize(&f.path);
		tmp.put(&name, &data)?;

		let local = PathBuf::from(tmp.full_path(&name));
		let result = add(&local, options, shared, f);
		let _ = std::fs::remove_file(&local);
		result
	} else {
		let handle = storage.local_handle(&f.path, tmp)?;
		add(handle.local_path(), options, shared, f)
	}
}

fn add(
	local: &Path,
	options: &InferenceOptions,
	shared: &Mutex<Shared>,
	f: &mut FileInfo,
) -> Result<()> {
	let preview = reader::preview(local, options.reprojection.as_ref())?;

	if let Some(p) = &preview {
		f.srs = p.srs.clone();

		{
			let mut sh = shared.lock().unwrap();

			if let Some(scale) = p.scale {
				if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
					return Err(Error::InvalidScale(f.path.clone()));
				}

				if let Some(d) = &mut sh.delta {
					d.scale = Point::min(d.scale, scale);
				} else if options.allow_delta {
					sh.delta = Some(Delta::new(scale, Point::default()));
				}
			}

			for name in &p.dim_names {
				if sh.dim_set.insert(name.clone()) {
					sh.dim_vec.push(name.clone());
				}
			}
		}

		if options.trust_headers && p.bounds.is_some() {
			f.num_points = Some(p.num_points);
			f.bounds = p.bounds.clone();
			f.metadata = p.metadata.clone();
			return Ok(());
		}
	}

	// Headers are untrusted or insufficient: take the authoritative numbers
	// from the point stream itself.
	let mut num_points = 0u64;
	let mut bounds: Option<Bounds> = None;

	let ok = reader::run(
		local,
		|pt| {
			num_points += 1;
			if let Some(b) = &mut bounds {
				b.grow(pt);
			} else {
				bounds = Some(Bounds::new(pt, pt));
			}
		},
		options.reprojection.as_ref(),
		None,
	)?;

	if ok {
		f.num_points = Some(num_points);
		f.bounds = bounds;
	}

	Ok(())
}

fn make_schema(dim_vec: &[String], bounds: Option<&Bounds>, delta: Option<&Delta>) -> Schema {
	let dims: Vec<DimInfo> = dim_vec.iter().map(|n| reader::dim_info(n)).collect();
	let mut schema = Schema::new(dims);

	if let (Some(d), Some(b)) = (delta, bounds) {
		let cube = b.cubeify(Some(d));
		schema = schema.deltify(&cube, d);
	}

	schema
}

/// Reorient geocentric data so "up" at the data centroid aligns with +Z,
/// then translate that centroid to the origin.
fn calc_transformation(native: &Bounds) -> Transformation {
	let p = native.mid();
	let up = Point::normalize(p);

	// Project the north pole vector onto the tangent plane at P to get
	// "north", then take its cross with "up" for "east".
	let north_pole = Point::new(0.0, 0.0, 1.0);
	let proj = up * Point::dot(up, north_pole);
	let north = Point::normalize(north_pole - proj);
	let east = Point::cross(north, up);

	let rotation = matrix::rotation(east, north, up);

	let tentative = matrix::transform_bounds(native, &rotation);
	let mid = tentative.mid();
	let translation = matrix::translation(-mid.x, -mid.y, -mid.z);

	matrix::multiply(&translation, &rotation)
}

/// Round away from the midpoint to a multiple of 10, keeping exact
/// multiples where they are.
fn slop_to_ten(d: f64) -> f64 {
	let v = d as i64;
	if (v / 10 * 10) as f64 == d {
		v as f64
	} else {
		((v + 10) / 10 * 10) as f64
	}
}

fn range_headers() -> HeaderMap {
	let mut headers = HeaderMap::new();
	headers.insert(RANGE, HeaderValue::from_static("bytes=0-16384"));
	headers
}
