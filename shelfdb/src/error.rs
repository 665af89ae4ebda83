use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfDbError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Malformed table file {file}: {message}")]
    Decode { file: String, message: String },

    #[error("No record has the field '{0}'")]
    FieldNotFound(String),

    #[error("No record matched the predicate")]
    RecordNotFound,

    #[error("Predicate has no conditions")]
    EmptyPredicate,

    #[error("Table '{0}' has no records")]
    EmptyTable(String),

    #[error("Cannot link: {0} failed validation")]
    LinkFailed(String),

    #[error("Path expression error: {0}")]
    PathExpr(#[from] serde_json_path::ParseError),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShelfDbError>;
