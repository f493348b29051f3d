//! pm-thermo: composable thermodynamic frames.
//!
//! A frame stacks [`contrib`] contributions over a [`state`] definition to
//! build a canonical state function `G(T,p,n)` or `A(T,V,n)` symbolically,
//! publishing the standardized property set (`T`, `p`, `n`, `S`, `mu`, `V`,
//! `_state`) plus whatever the stack derives. Materials bind frames to
//! initial states and parameter stores; the config module resolves frame
//! structures from documents through the process-wide registries.

pub mod config;
pub mod contrib;
pub mod error;
pub mod frame;
pub mod material;
pub mod species;
pub mod state;
pub mod store;

pub use config::{build_frame, build_frame_from_yaml, ContributionConfig, FrameConfig};
pub use contrib::{
    create_contribution, register_contribution, ContribFactory, ContribOptions,
    SharedContribution, ThermoContribution,
};
pub use error::{ThermoError, ThermoResult};
pub use frame::{
    FrameContext, FrameInstance, MaterialKind, PropKind, PropValue, PropertyStructure,
    ThermoFrame, GAS_CONSTANT,
};
pub use material::{Material, MaterialDefinition, MaterialSpec};
pub use species::Species;
pub use state::{
    lookup_state, register_state, GibbsState, HelmholtzState, InitialState, SharedState,
    StateDefinition,
};
pub use store::{NestedSource, ParamRequirement, ParameterSource, ThermoParameterStore};
