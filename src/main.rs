use anyhow::{Context, Result};
use clap::Parser;
use rusty_ept_planner::config;
use rusty_ept_planner::storage::Storage;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ept-planner")]
#[command(about = "Prepare a point cloud indexing build from a JSON configuration")]
struct Args {
	/// Build configuration file, or '-' for stdin.
	config: PathBuf,
}

fn main() -> Result<()> {
	env_logger::init();
	let args = Args::parse();

	let raw = if args.config.as_os_str() == "-" {
		let mut buf = String::new();
		std::io::stdin().read_to_string(&mut buf)?;
		buf
	} else {
		fs::read_to_string(&args.config)
			.with_context(|| format!("reading {}", args.config.display()))?
	};

	let json: serde_json::Value = serde_json::from_str(&raw).context("parsing configuration")?;

	let storage = Arc::new(Storage::new());
	let builder = config::get_builder(json, storage).context("preparing build")?;

	let metadata = builder.metadata();
	println!("Input files:  {}", metadata.manifest().size());
	println!("Bounds:       {}", metadata.bounds());
	println!("Point stride: {}", metadata.schema().stride());
	if let Some(d) = metadata.delta() {
		println!("Scale:        {}", d.scale);
		println!("Offset:       {}", d.offset);
	}
	if let Some(s) = metadata.subset() {
		println!("Subset:       {} of {}", s.id(), s.of());
	}
	if !metadata.srs().is_empty() {
		println!("SRS:          {}", metadata.srs());
	}

	builder.save().context("saving build marker")?;
	Ok(())
}
