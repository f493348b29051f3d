//! Materials: frames bound to initial states and parameter stores.

use crate::error::{ThermoError, ThermoResult};
use crate::frame::{FrameInstance, MaterialKind, ThermoFrame};
use crate::state::InitialState;
use crate::store::{ParamRequirement, ThermoParameterStore};
use pm_expr::Graph;
use pm_quantity::{parse_quantity, NumQuantity};
use std::sync::Arc;

/// Glue record: a frame, the `{T, p, n}` seed, and the parameter store that
/// feeds the frame's parameter symbols. Definitions are shared between
/// materials, never copied.
pub struct MaterialDefinition {
    frame: Arc<ThermoFrame>,
    initial: InitialState,
    store: Arc<ThermoParameterStore>,
}

impl MaterialDefinition {
    pub fn new(
        frame: Arc<ThermoFrame>,
        initial: InitialState,
        store: Arc<ThermoParameterStore>,
    ) -> Arc<MaterialDefinition> {
        Arc::new(MaterialDefinition {
            frame,
            initial,
            store,
        })
    }

    pub fn frame(&self) -> &Arc<ThermoFrame> {
        &self.frame
    }

    pub fn initial(&self) -> &InitialState {
        &self.initial
    }

    pub fn store(&self) -> &Arc<ThermoParameterStore> {
        &self.store
    }

    /// Instantiate the frame in `graph` as a material named `name`.
    pub fn create_instance(
        self: &Arc<Self>,
        graph: &Graph,
        name: &str,
        kind: MaterialKind,
    ) -> ThermoResult<Material> {
        let instance = self.frame.instantiate(graph, name, kind)?;
        Ok(Material {
            name: name.to_string(),
            kind,
            definition: Arc::clone(self),
            instance,
        })
    }
}

/// One instantiated material: the attached property dictionary is the frame
/// evaluated over this material's state slice and parameters.
pub struct Material {
    name: String,
    kind: MaterialKind,
    definition: Arc<MaterialDefinition>,
    instance: FrameInstance,
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Material {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MaterialKind {
        self.kind
    }

    pub fn definition(&self) -> &Arc<MaterialDefinition> {
        &self.definition
    }

    pub fn instance(&self) -> &FrameInstance {
        &self.instance
    }

    pub fn species_names(&self) -> Vec<String> {
        self.definition.frame.species_names()
    }

    /// Default tolerance for material balance residuals: `1e-7 mol/s` for
    /// flows, `1e-7 mol` for states.
    pub fn balance_tolerance(&self) -> NumQuantity {
        let text = match self.kind {
            MaterialKind::Flow => "1e-7 mol/s",
            MaterialKind::State => "1e-7 mol",
        };
        parse_quantity(text).expect("registered units")
    }

    /// The seed state vector from the definition's `{T, p, n}`.
    pub fn initial_state_vector(&self) -> ThermoResult<Vec<f64>> {
        self.definition.frame.state_definition().initial_state(
            &self.name,
            self.definition.frame.species(),
            &self.definition.initial,
            self.kind,
        )
    }

    /// Seed a state vector from an explicit `{T, p, n}`.
    pub fn state_vector_from(&self, init: &InitialState) -> ThermoResult<Vec<f64>> {
        self.definition.frame.state_definition().initial_state(
            &self.name,
            self.definition.frame.species(),
            init,
            self.kind,
        )
    }

    /// Parameter requirements of the frame (store paths and dimensions).
    pub fn parameter_requirements(&self) -> Vec<ParamRequirement> {
        self.instance
            .params
            .iter()
            .map(|p| ParamRequirement {
                path: p.path.clone(),
                dim: p.dim,
            })
            .collect()
    }
}

/// Constraints a material port places on the materials it accepts.
#[derive(Debug, Clone, Default)]
pub struct MaterialSpec {
    species: Option<Vec<String>>,
    kind: Option<MaterialKind>,
}

impl MaterialSpec {
    /// Accept any material.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_species<I, S>(mut self, species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = species.into_iter().map(Into::into).collect();
        list.sort();
        self.species = Some(list);
        self
    }

    pub fn with_kind(mut self, kind: MaterialKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Check a candidate against the spec.
    pub fn accept(&self, material: &Material) -> ThermoResult<()> {
        if let Some(kind) = self.kind {
            if material.kind() != kind {
                return Err(ThermoError::SpecMismatch {
                    material: material.name().to_string(),
                    reason: format!("expected {kind:?} material, got {:?}", material.kind()),
                });
            }
        }
        if let Some(expected) = &self.species {
            let mut actual = material.species_names();
            actual.sort();
            if &actual != expected {
                return Err(ThermoError::SpecMismatch {
                    material: material.name().to_string(),
                    reason: format!("species {actual:?} do not match {expected:?}"),
                });
            }
        }
        Ok(())
    }
}
