use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("{0}")]
	Config(String),

	#[error("Inference incomplete")]
	InferenceIncomplete,

	#[error("Cannot call go twice")]
	InferenceExhausted,

	#[error("No point cloud files found")]
	NoReadableInputs,

	#[error("{0}")]
	EmptyData(String),

	#[error("No schema dimensions found")]
	SchemaEmpty,

	#[error("Invalid scale at {0}")]
	InvalidScale(String),

	#[error("No bounds present")]
	MissingBounds,

	#[error("reader: {0}")]
	Reader(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("http: {0}")]
	Http(#[from] reqwest::Error),

	#[error("json: {0}")]
	Json(#[from] serde_json::Error),
}
