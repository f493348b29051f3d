use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model '{path}': writing to undeclared property '{property}'")]
    UndeclaredProperty { path: String, property: String },

    #[error("Model '{path}': property '{property}' read before its define completed")]
    DataFlowError { path: String, property: String },

    #[error("Model '{path}': no {kind} named '{name}' declared")]
    UnknownDeclaration {
        path: String,
        kind: &'static str,
        name: String,
    },

    #[error("Model '{path}': {kind} '{name}' declared twice")]
    DuplicateDeclaration {
        path: String,
        kind: &'static str,
        name: String,
    },

    #[error("Model '{path}': material port '{port}' is never connected")]
    UnboundPort { path: String, port: String },

    #[error("Model '{path}': connection for child '{child}' routes unknown material '{material}' to port '{port}'")]
    UnknownConnection {
        path: String,
        child: String,
        port: String,
        material: String,
    },

    #[error("Residual '{name}': {reason}")]
    BadResidual { name: String, reason: String },

    #[error("State import: {reason}")]
    BadStateDocument { reason: String },

    #[error(transparent)]
    Thermo(#[from] pm_thermo::ThermoError),

    #[error(transparent)]
    Quantity(#[from] pm_quantity::QuantityError),

    #[error(transparent)]
    Expr(#[from] pm_expr::ExprError),

    #[error(transparent)]
    Core(#[from] pm_core::CoreError),
}
