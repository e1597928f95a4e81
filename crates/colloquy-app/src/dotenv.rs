//! `.env` loading ahead of the credential lookup.
//!
//! Variables already present in the process environment win over the file.

use std::path::{Path, PathBuf};

/// Outcome of looking for a `.env` file.
#[derive(Debug)]
pub enum DotenvStatus {
    Loaded(PathBuf),
    NotFound,
    Failed(String),
}

/// Load `.env` from the working directory or its nearest ancestor.
pub fn load() -> DotenvStatus {
    status(dotenvy::dotenv())
}

/// Load a specific env file.
pub fn load_from(path: &Path) -> DotenvStatus {
    status(dotenvy::from_path(path).map(|_| path.to_path_buf()))
}

fn status(result: Result<PathBuf, dotenvy::Error>) -> DotenvStatus {
    match result {
        Ok(path) => DotenvStatus::Loaded(path),
        Err(e) if e.not_found() => DotenvStatus::NotFound,
        Err(e) => DotenvStatus::Failed(e.to_string()),
    }
}
