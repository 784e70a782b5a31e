//! Generic capacitive storage: `f[t] = c * de/dt[t]`.

use lms_core::{
    Applies, LinExpr, Model, ModelResult, QuantityId, Relation, Sense, TimeRef, TimeSetId, UnitId,
    VarDomain,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageParams {
    /// Capacity `c` relating the stored effort to the absorbed flow.
    pub capacity: f64,
    pub initial: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Default for StorageParams {
    fn default() -> Self {
        Self {
            capacity: 1.0,
            initial: None,
            lower: None,
            upper: None,
        }
    }
}

/// Storage absorbing flow `f` (port `inlet`) and exposing its level `e`
/// as an effort (port `level`).
#[derive(Debug, Clone, Copy)]
pub struct Storage {
    pub unit: UnitId,
    pub f: QuantityId,
    pub e: QuantityId,
    pub dedt: QuantityId,
    pub capacity: QuantityId,
}

impl Storage {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &StorageParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "Storage", time)?;
        let capacity = unit.scalar_param("c", params.capacity)?;
        let f = unit.flow_var("f", VarDomain::real(), Sense::In)?;
        let e = unit.effort_var(
            "e",
            VarDomain {
                lower: params.lower,
                upper: params.upper,
                ..VarDomain::default()
            },
        )?;
        let dedt = unit.derivative("dedt", e)?;

        unit.constraint(
            "balance",
            Applies::All,
            LinExpr::of(f),
            Relation::Eq,
            LinExpr::new().with_param_product(1.0, capacity, dedt),
        )?;
        if let Some(e0) = params.initial {
            unit.constraint(
                "initial",
                Applies::First,
                LinExpr::new().with_at(1.0, e, TimeRef::First),
                Relation::Eq,
                LinExpr::constant(e0),
            )?;
        }
        unit.port("inlet", &[("f", f)])?;
        unit.port("level", &[("e", e)])?;
        Ok(Self {
            unit: unit.finish(),
            f,
            e,
            dedt,
            capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::{FiniteDifference, TimeSet};

    #[test]
    fn test_storage_integrates_flow() {
        let mut model = Model::new("s");
        let time = model
            .add_time_set(TimeSet::continuous("time", 0.0, 4.0).unwrap())
            .unwrap();
        let params = StorageParams {
            capacity: 2.0,
            initial: Some(1.0),
            ..StorageParams::default()
        };
        let s = Storage::build(&mut model, "s", time, &params).unwrap();
        model
            .discretize(time, &FiniteDifference::backward(4))
            .unwrap();

        // f = 2 * de/dt with de/dt = 0.5
        model.set_values(s.f, &[1.0; 5]).unwrap();
        model.set_values(s.dedt, &[0.5; 5]).unwrap();
        model.set_values(s.e, &[1.0, 1.5, 2.0, 2.5, 3.0]).unwrap();
        assert!(model.is_satisfied("s.balance", 1e-12).unwrap());
        assert!(model.is_satisfied("s.initial", 1e-12).unwrap());
        assert!(model.is_satisfied("_disc_eq_s_dedt", 1e-12).unwrap());
    }

    #[test]
    fn test_storage_without_initial_has_single_rule() {
        let mut model = Model::new("s");
        let time = model
            .add_time_set(TimeSet::discrete("time", vec![0.0, 1.0]).unwrap())
            .unwrap();
        let s = Storage::build(&mut model, "s", time, &StorageParams::default()).unwrap();
        assert_eq!(model.unit(s.unit).unwrap().constraints().len(), 1);
    }
}
