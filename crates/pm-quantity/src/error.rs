use thiserror::Error;

pub type QuantityResult<T> = Result<T, QuantityError>;

#[derive(Error, Debug)]
pub enum QuantityError {
    #[error("Dimension mismatch for {context}: expected [{expected}], got [{got}]")]
    DimensionMismatch {
        context: String,
        expected: String,
        got: String,
    },

    #[error("Unknown unit '{name}'")]
    UnknownUnit { name: String },

    #[error("Cannot parse quantity '{text}': {reason}")]
    ParseQuantity { text: String, reason: String },

    #[error("Missing argument at '{path}'")]
    MissingArgument { path: String },

    #[error("Unexpected argument at '{path}'")]
    UnexpectedArgument { path: String },

    #[error("Input at '{path}' is not a named symbol")]
    NotASymbol { path: String },

    #[error(transparent)]
    Expr(#[from] pm_expr::ExprError),
}
