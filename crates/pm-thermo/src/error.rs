use thiserror::Error;

pub type ThermoResult<T> = Result<T, ThermoError>;

#[derive(Error, Debug)]
pub enum ThermoError {
    #[error("Contribution '{contribution}' requires property '{property}' which no earlier contribution publishes")]
    MissingRequirement {
        contribution: String,
        property: String,
    },

    #[error("Property '{property}' is {actual}, expected {expected}")]
    PropertyKind {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Parameter '{path}' is declared twice within one frame")]
    DuplicateParameter { path: String },

    #[error("Contribution instance name '{name}' is used twice within one frame")]
    DuplicateContribution { name: String },

    #[error("Frame publishes no '{property}' property after assembly")]
    FrameIncomplete { property: String },

    #[error("No contribution registered under '{name}'")]
    UnknownContribution { name: String },

    #[error("No state definition registered under '{name}'")]
    UnknownState { name: String },

    #[error("Contribution '{contribution}': bad option '{option}': {reason}")]
    BadOption {
        contribution: String,
        option: String,
        reason: String,
    },

    #[error("Missing thermodynamic parameters: {}", paths.join(", "))]
    MissingParameter { paths: Vec<String> },

    #[error("Bad parameter document at '{path}': {reason}")]
    Document { path: String, reason: String },

    #[error("Cannot parse formula '{formula}': {reason}")]
    FormulaParse { formula: String, reason: String },

    #[error("Unknown element '{symbol}' in formula '{formula}'")]
    UnknownElement { symbol: String, formula: String },

    #[error("Species '{name}' is not part of this frame")]
    UnknownSpecies { name: String },

    #[error("Material '{material}' does not satisfy the port specification: {reason}")]
    SpecMismatch { material: String, reason: String },

    #[error("Initial state of '{material}' is missing an amount for species '{species}'")]
    IncompleteInitialState { material: String, species: String },

    #[error(transparent)]
    Quantity(#[from] pm_quantity::QuantityError),

    #[error(transparent)]
    Expr(#[from] pm_expr::ExprError),

    #[error(transparent)]
    Core(#[from] pm_core::CoreError),
}
