use thiserror::Error;

/// Errors inside one job's execution. All of these are caught at the
/// runner boundary and become a `failed` job status; only the terminal
/// status write itself can escape further.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] crate::analysis::AnalysisError),

    #[error("Asset staging failed: {0}")]
    Asset(#[from] crate::assets::AssetError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}
