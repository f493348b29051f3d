use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Key conflict at '{path}': a leaf and a sub-tree share a prefix")]
    KeyConflict { path: String },
}
