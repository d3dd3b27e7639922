use crate::error::Result;
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Path-dispatching storage driver: plain filesystem paths and http(s) URLs
/// share one read interface.  Globbing and directory expansion only apply to
/// local paths; an http path resolves to itself.
#[derive(Debug)]
pub struct Storage {
	http: Client,
}

impl Default for Storage {
	fn default() -> Storage {
		Storage::new()
	}
}

impl Storage {
	pub fn new() -> Storage {
		Storage { http: Client::new() }
	}

	pub fn is_http_derived(&self, path: &str) -> bool {
		path.starts_with("http://") || path.starts_with("https://")
	}

	pub fn get(&self, path: &str) -> Result<Vec<u8>> {
		self.get_binary(path, &HeaderMap::new())
	}

	pub fn get_binary(&self, path: &str, headers: &HeaderMap) -> Result<Vec<u8>> {
		if self.is_http_derived(path) {
			let response = self
				.http
				.get(path)
				.headers(headers.clone())
				.send()?
				.error_for_status()?;
			Ok(response.bytes()?.to_vec())
		} else {
			Ok(fs::read(path)?)
		}
	}

	pub fn put(&self, path: &str, data: &[u8]) -> Result<()> {
		if self.is_http_derived(path) {
			self.http
				.put(path)
				.body(data.to_vec())
				.send()?
				.error_for_status()?;
			Ok(())
		} else {
			if let Some(parent) = Path::new(path).parent() {
				fs::create_dir_all(parent)?;
			}
			fs::write(path, data)?;
			Ok(())
		}
	}

	pub fn try_get_size(&self, path: &str) -> Option<u64> {
		if self.is_http_derived(path) {
			let response = self.http.head(path).send().ok()?;
			if !response.status().is_success() {
				return None;
			}
			response.content_length()
		} else {
			let meta = fs::metadata(path).ok()?;
			if meta.is_file() {
				Some(meta.len())
			} else {
				None
			}
		}
	}

	/// Expand a trailing-`*` pattern into the concrete files beneath it, in
	/// sorted order.  Anything else resolves to itself.
	pub fn resolve(&self, pattern: &str, verbose: bool) -> Result<Vec<String>> {
		if self.is_http_derived(pattern) {
			return Ok(vec![pattern.trim_end_matches('*').to_string()]);
		}

		if !pattern.ends_with('*') {
			return Ok(vec![pattern.to_string()]);
		}

		let prefix = &pattern[..pattern.len() - 1];
		let dir = if is_directory(prefix) || prefix.ends_with('/') || prefix.is_empty() {
			PathBuf::from(prefix)
		} else {
			Path::new(prefix)
				.parent()
				.map(Path::to_path_buf)
				.unwrap_or_else(|| PathBuf::from("."))
		};

		let mut paths = Vec::new();
		for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
			if !entry.file_type().is_file() {
				continue;
			}
			let path = entry.path().to_string_lossy().to_string();
			if path.starts_with(prefix) {
				paths.push(path);
			}
		}
		paths.sort();

		if verbose {
			println!("Resolved {} to {} files", pattern, paths.len());
		}
		debug!("resolved {} -> {} paths", pattern, paths.len());

		Ok(paths)
	}

	/// A handle on a local copy of the path: local files resolve in place,
	/// remote files are staged into the tmp endpoint and removed on drop.
	pub fn local_handle(&self, path: &str, tmp: &Endpoint) -> Result<LocalHandle> {
		if !self.is_http_derived(path) {
			return Ok(LocalHandle {
				path: PathBuf::from(path),
				temp: false,
			});
		}

		let data = self.get(path)?;
		let name = sanitize(path);
		tmp.put(&name, &data)?;
		Ok(LocalHandle {
			path: PathBuf::from(tmp.full_path(&name)),
			temp: true,
		})
	}
}

/// Storage rooted at a path, addressed by blob name.
#[derive(Clone, Debug)]
pub struct Endpoint {
	storage: Arc<Storage>,
	root: String,
}

impl Endpoint {
	pub fn new(storage: Arc<Storage>, root: &str) -> Endpoint {
		Endpoint {
			storage,
			root: root.trim_end_matches('/').to_string(),
		}
	}

	pub fn root(&self) -> &str {
		&self.root
	}

	pub fn full_path(&self, name: &str) -> String {
		format!("{}/{}", self.root, name)
	}

	pub fn get(&self, name: &str) -> Result<Vec<u8>> {
		self.storage.get(&self.full_path(name))
	}

	pub fn put(&self, name: &str, data: &[u8]) -> Result<()> {
		self.storage.put(&self.full_path(name), data)
	}

	pub fn try_get_size(&self, name: &str) -> Option<u64> {
		self.storage.try_get_size(&self.full_path(name))
	}

	pub fn sub(&self, name: &str) -> Endpoint {
		Endpoint::new(self.storage.clone(), &self.full_path(name))
	}
}

pub struct LocalHandle {
	path: PathBuf,
	temp: bool,
}

impl LocalHandle {
	pub fn local_path(&self) -> &Path {
		&self.path
	}
}

impl Drop for LocalHandle {
	fn drop(&mut self) {
		if self.temp {
			let _ = fs::remove_file(&self.path);
		}
	}
}

/// Path-safe staging name for a source path.
pub fn sanitize(path: &str) -> String {
	path.replace(['/', '\\'], "-")
}

pub fn get_extension(path: &str) -> String {
	let base = get_basename(path);
	match base.rfind('.') {
		Some(i) => base[i + 1..].to_string(),
		None => String::new(),
	}
}

pub fn get_basename(path: &str) -> String {
	let trimmed = path.trim_end_matches('/');
	match trimmed.rfind('/') {
		Some(i) => trimmed[i + 1..].to_string(),
		None => trimmed.to_string(),
	}
}

pub fn is_directory(path: &str) -> bool {
	fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
