use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("another scan is already in flight for target {target_id}")]
    TargetBusy { target_id: i64 },

    #[error("extraction produced no usable profiles for target {target_id}")]
    EmptyExtraction { target_id: i64 },

    #[error(transparent)]
    Extract(#[from] churnwatch_extract::ExtractError),

    #[error(transparent)]
    Db(#[from] churnwatch_db::DbError),
}
