//! Electrical battery with charge/discharge efficiencies.
//!
//! Sign convention: `p > 0` charges the battery (the flow enters the unit).
//! Energies are in kWh, powers in kW and model time in seconds, so the
//! energy balance carries a `time_scale` of 3600 s/h:
//!
//! ```text
//! time_scale * de/dt = etac * pc - pd / etad
//! p = pc - pd
//! ```
//!
//! With efficiencies below one the optimiser could dissipate energy by
//! charging and discharging simultaneously; a binary `u` then makes the two
//! modes exclusive.

use lms_core::units::SECONDS_PER_HOUR;
use lms_core::{
    Applies, KilowattHours, Kilowatts, LinExpr, Model, ModelError, ModelResult, QuantityId,
    Relation, Sense, TimeSetId, UnitId, VarDomain,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryParams {
    pub emin: KilowattHours,
    pub emax: KilowattHours,
    /// Energy at the first point.
    pub e0: Option<KilowattHours>,
    /// Energy at the last point.
    pub ef: Option<KilowattHours>,
    /// State of charge bounds, in % of `emax`.
    pub socmin: f64,
    pub socmax: f64,
    /// Initial and final state of charge, in % of `emax`.
    pub soc0: Option<f64>,
    pub socf: Option<f64>,
    pub pcmax: Kilowatts,
    pub pdmax: Kilowatts,
    pub etac: f64,
    pub etad: f64,
    /// Ramp limits in kW/s.
    pub dpcmax: Option<f64>,
    pub dpdmax: Option<f64>,
    /// Force zero exchange at the first point.
    pub zero_initial_power: bool,
    /// Add the exclusivity binary even with ideal efficiencies.
    pub force_binary: bool,
    pub time_scale: f64,
}

impl Default for BatteryParams {
    fn default() -> Self {
        Self {
            emin: KilowattHours(0.0),
            emax: KilowattHours(10.0),
            e0: None,
            ef: None,
            socmin: 0.0,
            socmax: 100.0,
            soc0: None,
            socf: None,
            pcmax: Kilowatts(5.0),
            pdmax: Kilowatts(5.0),
            etac: 1.0,
            etad: 1.0,
            dpcmax: None,
            dpdmax: None,
            zero_initial_power: true,
            force_binary: false,
            time_scale: SECONDS_PER_HOUR,
        }
    }
}

impl BatteryParams {
    fn validate(&self, name: &str) -> ModelResult<()> {
        let invalid = |msg: String| Err(ModelError::Validation(format!("battery {name}: {msg}")));
        if self.emin > self.emax {
            return invalid(format!("emin {} above emax {}", self.emin, self.emax));
        }
        for (label, eta) in [("etac", self.etac), ("etad", self.etad)] {
            if !(eta > 0.0 && eta <= 1.0) {
                return invalid(format!("{label} must lie in (0, 1], got {eta}"));
            }
        }
        if !(0.0..=100.0).contains(&self.socmin)
            || !(0.0..=100.0).contains(&self.socmax)
            || self.socmin > self.socmax
        {
            return invalid(format!(
                "state of charge bounds [{}, {}] outside [0, 100]",
                self.socmin, self.socmax
            ));
        }
        if self.e0.is_some() && self.soc0.is_some() {
            return invalid("both e0 and soc0 given".into());
        }
        if self.ef.is_some() && self.socf.is_some() {
            return invalid("both ef and socf given".into());
        }
        if self.pcmax.value() < 0.0 || self.pdmax.value() < 0.0 {
            return invalid("negative power limit".into());
        }
        if self.time_scale <= 0.0 {
            return invalid(format!("time_scale must be positive, got {}", self.time_scale));
        }
        Ok(())
    }

    fn needs_binary(&self) -> bool {
        self.force_binary || self.etac < 1.0 || self.etad < 1.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Battery {
    pub unit: UnitId,
    /// Net power, positive when charging. Exposed on port `inlet`.
    pub p: QuantityId,
    pub pc: QuantityId,
    pub pd: QuantityId,
    pub e: QuantityId,
    pub de: QuantityId,
    pub emax: QuantityId,
    /// Charge/discharge mode, present when modes are exclusive.
    pub u: Option<QuantityId>,
    /// Derivative of `p`, present with ramp limits.
    pub dp: Option<QuantityId>,
}

impl Battery {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &BatteryParams,
    ) -> ModelResult<Self> {
        params.validate(name)?;
        let mut unit = model.add_unit(name, "Battery", time)?;
        unit.doc("Battery with charge/discharge efficiencies (p > 0 when charging)");

        let emin = unit.scalar_param("emin", params.emin.value())?;
        let emax = unit.scalar_param("emax", params.emax.value())?;
        let pcmax = unit.scalar_param("pcmax", params.pcmax.value())?;
        let pdmax = unit.scalar_param("pdmax", params.pdmax.value())?;

        let p = unit.flow_var("p", VarDomain::real(), Sense::In)?;
        let pc = unit.var("pc", VarDomain::bounded(0.0, params.pcmax.value()))?;
        let pd = unit.var("pd", VarDomain::bounded(0.0, params.pdmax.value()))?;
        let e = unit.var("e", VarDomain::real())?;
        let de = unit.derivative("de", e)?;

        unit.constraint(
            "p_balance",
            Applies::All,
            LinExpr::of(p),
            Relation::Eq,
            LinExpr::of(pc).with(-1.0, pd),
        )?;
        unit.constraint(
            "e_balance",
            Applies::All,
            LinExpr::new().with(params.time_scale, de),
            Relation::Eq,
            LinExpr::new()
                .with(params.etac, pc)
                .with(-1.0 / params.etad, pd),
        )?;
        unit.constraint(
            "e_min",
            Applies::All,
            LinExpr::of(e),
            Relation::Ge,
            LinExpr::of(emin),
        )?;
        unit.constraint(
            "e_max",
            Applies::All,
            LinExpr::of(e),
            Relation::Le,
            LinExpr::of(emax),
        )?;
        if params.socmin > 0.0 {
            unit.constraint(
                "soc_min",
                Applies::All,
                LinExpr::of(e),
                Relation::Ge,
                fraction_of(emax, params.socmin),
            )?;
        }
        if params.socmax < 100.0 {
            unit.constraint(
                "soc_max",
                Applies::All,
                LinExpr::of(e),
                Relation::Le,
                fraction_of(emax, params.socmax),
            )?;
        }

        if params.zero_initial_power {
            unit.constraint(
                "p_init",
                Applies::First,
                LinExpr::of(p),
                Relation::Eq,
                LinExpr::new(),
            )?;
        }
        let initial = params
            .e0
            .map(|e0| LinExpr::constant(e0.value()))
            .or_else(|| params.soc0.map(|soc| fraction_of(emax, soc)));
        if let Some(target) = initial {
            unit.constraint(
                "e_initial",
                Applies::First,
                LinExpr::of(e),
                Relation::Eq,
                target,
            )?;
        }
        let last = params
            .ef
            .map(|ef| LinExpr::constant(ef.value()))
            .or_else(|| params.socf.map(|soc| fraction_of(emax, soc)));
        if let Some(target) = last {
            unit.constraint(
                "e_final",
                Applies::Last,
                LinExpr::of(e),
                Relation::Eq,
                target,
            )?;
        }

        let dp = if params.dpcmax.is_some() || params.dpdmax.is_some() {
            let dp = unit.derivative("dp", p)?;
            if let Some(max) = params.dpcmax {
                unit.constraint(
                    "dp_charge_max",
                    Applies::All,
                    LinExpr::of(dp),
                    Relation::Le,
                    LinExpr::constant(max),
                )?;
            }
            if let Some(max) = params.dpdmax {
                unit.constraint(
                    "dp_discharge_max",
                    Applies::All,
                    LinExpr::of(dp),
                    Relation::Ge,
                    LinExpr::constant(-max),
                )?;
            }
            Some(dp)
        } else {
            None
        };

        let u = if params.needs_binary() {
            debug!(
                battery = name,
                etac = params.etac,
                etad = params.etad,
                "adding exclusive charge/discharge binary"
            );
            let u = unit.var("u", VarDomain::binary())?;
            // pc <= u * pcmax
            unit.constraint(
                "charge_mode",
                Applies::All,
                LinExpr::of(pc),
                Relation::Le,
                LinExpr::new().with_param_product(1.0, pcmax, u),
            )?;
            // pd <= (1 - u) * pdmax
            unit.constraint(
                "discharge_mode",
                Applies::All,
                LinExpr::of(pd).with_param_product(1.0, pdmax, u),
                Relation::Le,
                LinExpr::of(pdmax),
            )?;
            Some(u)
        } else {
            None
        };

        unit.port("inlet", &[("p", p)])?;
        Ok(Self {
            unit: unit.finish(),
            p,
            pc,
            pd,
            e,
            de,
            emax,
            u,
            dp,
        })
    }
}

/// `soc / 100 * emax`, as a parameter-only expression.
fn fraction_of(emax: QuantityId, soc: f64) -> LinExpr {
    LinExpr::new().with(soc / 100.0, emax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::{FiniteDifference, TimeSet};

    fn hourly(model: &mut Model, hours: usize) -> TimeSetId {
        model
            .add_time_set(TimeSet::continuous("time", 0.0, 3600.0 * hours as f64).unwrap())
            .unwrap()
    }

    #[test]
    fn test_ideal_battery_is_linear() {
        let mut model = Model::new("b");
        let time = hourly(&mut model, 2);
        let bat = Battery::build(&mut model, "bat", time, &BatteryParams::default()).unwrap();
        assert!(bat.u.is_none());
        assert!(bat.dp.is_none());
        let names = model.unit(bat.unit).unwrap().constraints().to_vec();
        assert_eq!(
            names,
            vec!["bat.p_balance", "bat.e_balance", "bat.e_min", "bat.e_max", "bat.p_init"]
        );
        // load convention: p is an In flow behind port `inlet`
        let unit = model.unit(bat.unit).unwrap();
        assert_eq!(unit.port("inlet").unwrap().member("p"), Some(bat.p));
        assert!(unit.port("outlet").is_none());
        assert_eq!(model.sense(bat.p).unwrap(), Some(Sense::In));
    }

    #[test]
    fn test_lossy_battery_gets_exclusive_modes() {
        let mut model = Model::new("b");
        let time = hourly(&mut model, 2);
        let params = BatteryParams {
            etac: 0.95,
            etad: 0.95,
            ..BatteryParams::default()
        };
        let bat = Battery::build(&mut model, "bat", time, &params).unwrap();
        let u = bat.u.expect("binary mode");
        assert!(model.quantity(u).unwrap().is_binary());

        // charging at full power in mode u = 1 leaves no room to discharge
        model.set_values(u, &[1.0, 1.0]).unwrap();
        model.set_values(bat.pc, &[5.0, 5.0]).unwrap();
        model.set_values(bat.pd, &[0.0, 0.0]).unwrap();
        assert!(model.is_satisfied("bat.charge_mode", 1e-12).unwrap());
        assert!(model.is_satisfied("bat.discharge_mode", 1e-12).unwrap());
        model.set_values(bat.pd, &[0.5, 0.0]).unwrap();
        assert!(!model.is_satisfied("bat.discharge_mode", 1e-12).unwrap());
    }

    #[test]
    fn test_energy_balance_with_efficiency() {
        let mut model = Model::new("b");
        let time = hourly(&mut model, 1);
        let params = BatteryParams {
            etac: 0.9,
            e0: Some(KilowattHours(2.0)),
            ..BatteryParams::default()
        };
        let bat = Battery::build(&mut model, "bat", time, &params).unwrap();
        model
            .discretize(time, &FiniteDifference::backward(1))
            .unwrap();

        // one hour charging at 2 kW stores 1.8 kWh
        model.set_values(bat.pc, &[0.0, 2.0]).unwrap();
        model.set_values(bat.pd, &[0.0, 0.0]).unwrap();
        model.set_values(bat.p, &[0.0, 2.0]).unwrap();
        model.set_values(bat.e, &[2.0, 3.8]).unwrap();
        model.set_values(bat.de, &[0.0, 1.8 / 3600.0]).unwrap();
        for rule in ["bat.p_balance", "bat.e_balance", "bat.e_initial", "_disc_eq_bat_de"] {
            assert!(model.is_satisfied(rule, 1e-9).unwrap(), "{rule}");
        }
    }

    #[test]
    fn test_state_of_charge_targets_follow_emax() {
        let mut model = Model::new("b");
        let time = hourly(&mut model, 1);
        let params = BatteryParams {
            socmin: 20.0,
            soc0: Some(50.0),
            socf: Some(50.0),
            ..BatteryParams::default()
        };
        let bat = Battery::build(&mut model, "bat", time, &params).unwrap();
        let rows = model.expand("bat.e_initial").unwrap();
        assert_eq!(rows[0].form.constant, -5.0);

        model.set_param(bat.emax, 20.0).unwrap();
        let rows = model.expand("bat.e_final").unwrap();
        assert_eq!(rows[0].form.constant, -10.0);
        assert_eq!(model.expand("bat.soc_min").unwrap().len(), 2);
    }

    #[test]
    fn test_ramp_limits_use_power_derivative() {
        let mut model = Model::new("b");
        let time = hourly(&mut model, 1);
        let params = BatteryParams {
            dpcmax: Some(0.01),
            dpdmax: Some(0.02),
            ..BatteryParams::default()
        };
        let bat = Battery::build(&mut model, "bat", time, &params).unwrap();
        assert!(bat.dp.is_some());
        let row = &model.expand("bat.dp_discharge_max").unwrap()[0];
        assert_eq!(row.relation, Relation::Ge);
        assert_eq!(row.form.constant, 0.02);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut model = Model::new("b");
        let time = hourly(&mut model, 1);
        for params in [
            BatteryParams {
                etac: 1.2,
                ..BatteryParams::default()
            },
            BatteryParams {
                e0: Some(KilowattHours(1.0)),
                soc0: Some(10.0),
                ..BatteryParams::default()
            },
            BatteryParams {
                socmin: 80.0,
                socmax: 20.0,
                ..BatteryParams::default()
            },
        ] {
            let err = Battery::build(&mut model, "bat", time, &params).unwrap_err();
            assert!(matches!(err, ModelError::Validation(_)));
        }
        assert_eq!(model.units().count(), 0);
    }

    #[test]
    fn test_params_from_toml() {
        let params: BatteryParams = toml::from_str(
            r#"
            emax = 13.5
            pcmax = 4.6
            etac = 0.95
            soc0 = 50.0
            "#,
        )
        .unwrap();
        assert_eq!(params.emax, KilowattHours(13.5));
        assert_eq!(params.pdmax, Kilowatts(5.0));
        assert!(params.needs_binary());
    }
}
