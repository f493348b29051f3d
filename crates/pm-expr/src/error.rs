use thiserror::Error;

pub type ExprResult<T> = Result<T, ExprError>;

#[derive(Error, Debug)]
pub enum ExprError {
    #[error("Symbol '{name}' is already registered in this graph")]
    DuplicateSymbol { name: String },

    #[error("Symbol '{name}' is referenced by an output but not covered by the inputs")]
    MissingSymbol { name: String },

    #[error("Compile input #{index} is not a named symbol")]
    NotASymbol { index: usize },

    #[error("Shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}
