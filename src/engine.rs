//! IEC 60364-5-52 cable checks: derated ampacity, voltage drop and overload protection.

use crate::i18n::Language;
use crate::installation::{self, DEFAULT_TRIPPING_FACTOR, Installation, phase_factor};
use crate::tables::Tables;
use tracing::{debug, info, warn};

/// Largest I2 allowed relative to the cable ampacity (IEC 60364-4-43, 433.1).
pub const OVERLOAD_LIMIT: f64 = 1.45;
/// Reference insulation temperature for resistivity tables.
const RESISTIVITY_REFERENCE_TEMPERATURE: f64 = 20.0;
const MAX_RECOMMENDATIONS: usize = 4;
const MAX_CANDIDATES: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("installation parameters are invalid")]
    Installation(#[source] installation::Error),
    #[error("temperature {0} °C is outside the correction table for this insulation and medium")]
    TemperatureRange(f64),
    #[error("design current must be positive, got {0} A")]
    DesignCurrent(f64),
    #[error("the reference tables do not list any breaker ratings")]
    NoBreakerRatings,
}

#[derive(serde::Serialize, strum::Display, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    #[strum(serialize = "OK")]
    #[serde(rename = "OK")]
    Ok,
    #[strum(serialize = "NE")]
    #[serde(rename = "NE")]
    Fail,
    #[strum(serialize = "N/A")]
    #[serde(rename = "N/A")]
    NotApplicable,
    #[strum(serialize = "—")]
    #[serde(rename = "—")]
    Unknown,
}

#[derive(serde::Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Compliance {
    Ok,
    Fail,
    NotApplicable,
    NoData,
}

impl Compliance {
    pub fn label(self, language: Language) -> &'static str {
        language.text(match self {
            Compliance::Ok => "status.ok",
            Compliance::Fail => "status.fail",
            Compliance::NotApplicable => "status.na",
            Compliance::NoData => "status.no_data",
        })
    }
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// 230 V is a phase-to-neutral voltage and does not go with three loaded conductors.
    VoltagePhase,
    TemperatureRange { temperature: f64 },
}

impl Warning {
    pub fn describe(&self, language: Language) -> String {
        match self {
            Warning::VoltagePhase => language.text("warning.voltage_phase").to_string(),
            Warning::TemperatureRange { temperature } => language.message(
                "warning.temperature_range",
                &[&language.number(*temperature, 1)],
            ),
        }
    }
}

/// A cable that satisfies both the current and the voltage drop checks.
#[derive(serde::Serialize, Clone, Debug, PartialEq)]
pub struct Candidate {
    pub area: f64,
    pub method: String,
    pub ampacity_total: f64,
    pub drop: f64,
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    IncreaseSection(Candidate),
    ChangeMethod(Candidate),
    SwitchToXlpe(Candidate),
    SplitParallel { count: u32, cable: Candidate },
    ReduceGroupingOrRaiseVoltage,
}

impl Recommendation {
    pub fn describe(&self, language: Language) -> String {
        let candidate = |action: &str, c: &Candidate, count: Option<u32>| {
            let count = count.map(|n| format!("n∥={n}, ")).unwrap_or_default();
            format!(
                "{action} {} {} ({} {}) → {count}Iz_tot≈{} A, ΔU≈{}%",
                language.area(c.area),
                language.text("unit.mm2"),
                language.text("rec.method"),
                c.method,
                language.number(c.ampacity_total, 0),
                language.number(c.drop, 2),
            )
        };
        match self {
            Recommendation::IncreaseSection(c) => {
                candidate(language.text("rec.increase_section"), c, None)
            }
            Recommendation::ChangeMethod(c) => {
                candidate(language.text("rec.change_method"), c, None)
            }
            Recommendation::SwitchToXlpe(c) => candidate(language.text("rec.switch_xlpe"), c, None),
            Recommendation::SplitParallel { count, cable } => {
                let action = language.message("rec.split", &[count]);
                candidate(&action, cable, Some(*count))
            }
            Recommendation::ReduceGroupingOrRaiseVoltage => {
                language.text("rec.fallback").to_string()
            }
        }
    }
}

/// Everything computed for one cable segment.
#[derive(serde::Serialize, Clone, Debug)]
pub struct Evaluation {
    /// Pj = Pi·Kj in watts.
    pub demand_power: f64,
    pub grouping_factor: f64,
    pub temperature_factor: Option<f64>,
    /// Icalc for the whole circuit.
    pub design_current: f64,
    pub current_per_cable: f64,
    /// Resistance at the insulation's maximum operating temperature, Ω/km.
    pub resistance: f64,
    pub reactance: f64,
    /// σ = 1/ρ20.
    pub conductivity: Option<f64>,
    pub base_ampacity: Option<f64>,
    /// Iz of a single cable, after S and T.
    pub ampacity: Option<f64>,
    pub ampacity_total: Option<f64>,
    pub drop: f64,
    pub upstream_drop: f64,
    pub total_drop: f64,
    pub drop_limit: Option<f64>,
    pub tripping_current: Option<f64>,
    pub by_current: Status,
    pub by_drop: Status,
    pub total_drop_status: Status,
    pub protection: Status,
    pub compliance: Compliance,
    pub recommendations: Vec<Recommendation>,
    pub warnings: Vec<Warning>,
}

impl Evaluation {
    /// `Icalc – Iz_tot`, the window the breaker rating has to fall into.
    pub fn breaker_window(&self, language: Language) -> Option<String> {
        self.ampacity_total.map(|iz| {
            format!(
                "{} – {}",
                language.number(self.design_current, 2),
                language.number(iz, 2)
            )
        })
    }
}

/// Violations reported for the closest misses of an optimal selection.
#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    DropExceeded { excess: f64 },
    BreakerBelowDesignCurrent { shortfall: f64 },
    BreakerAboveAmpacity { excess: f64 },
    TrippingCurrent { limit: f64 },
}

impl Violation {
    pub fn describe(&self, language: Language) -> String {
        match self {
            Violation::DropExceeded { excess } => format!("ΔU +{}%", language.number(*excess, 2)),
            Violation::BreakerBelowDesignCurrent { shortfall } => {
                language.message("select.in_below_ib", &[&language.number(*shortfall, 2)])
            }
            Violation::BreakerAboveAmpacity { excess } => {
                language.message("select.in_above_iz", &[&language.number(*excess, 2)])
            }
            Violation::TrippingCurrent { limit } => {
                format!("I2>{} A", language.number(*limit, 2))
            }
        }
    }
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
pub struct NearMiss {
    pub metric: f64,
    pub area: f64,
    pub breaker: String,
    pub breaker_rating: f64,
    pub ampacity_total: f64,
    pub drop: f64,
    pub violations: Vec<Violation>,
}

impl NearMiss {
    pub fn describe(&self, language: Language) -> String {
        let issues = if self.violations.is_empty() {
            language.text("select.minor").to_string()
        } else {
            let issues = self.violations.iter().map(|v| v.describe(language));
            issues.collect::<Vec<_>>().join("; ")
        };
        format!(
            "{} {} / In={} A → Iz_tot≈{} A, ΔU≈{}% ({issues})",
            language.area(self.area),
            language.text("unit.mm2"),
            self.breaker,
            language.number(self.ampacity_total, 0),
            language.number(self.drop, 2),
        )
    }
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    Found {
        area: f64,
        breaker: String,
        ampacity_total: f64,
        drop: f64,
    },
    /// No pair passed every check; the closest ones, best first.
    NearMisses { candidates: Vec<NearMiss> },
    NoCombinations,
}

/// Fixed electrical quantities of a segment while its cable is varied.
struct Line<'a> {
    conductor: &'a str,
    loaded_cores: u8,
    voltage: f64,
    cos_phi: f64,
    length: f64,
    current: f64,
}

pub struct Engine<'t> {
    tables: &'t Tables,
}

impl<'t> Engine<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Self { tables }
    }

    /// Ampacity of one cable before grouping and temperature corrections.
    pub fn ampacity(
        &self,
        insulation_key: &str,
        conductor: &str,
        method: &str,
        area: f64,
        loaded_cores: u8,
    ) -> Option<f64> {
        let base = self.tables.ampacity_base.get(method)?;
        let insulation = self
            .tables
            .insulation_factors
            .get(insulation_key)?
            .get(conductor)?
            .get(method)?;
        let loaded = self.tables.loaded_factors.get(method)?.get(&loaded_cores)?;
        Some(base.interpolate_clamped(area)? * insulation * loaded)
    }

    /// Grouping factor S; counts missing from the table use the factor of the largest one.
    pub fn group_factor(&self, circuits: u32) -> f64 {
        if circuits <= 1 {
            return 1.0;
        }
        let factors = &self.tables.grouping_factors;
        factors
            .get(&circuits)
            .or_else(|| factors.last_key_value().map(|(_, f)| f))
            .copied()
            .unwrap_or(1.0)
    }

    /// Ambient temperature factor T; `None` outside the tabulated range.
    pub fn temperature_factor(
        &self,
        insulation_key: &str,
        medium: &str,
        temperature: f64,
    ) -> Option<f64> {
        let tables = if medium == "soil" { &self.tables.kt_soil } else { &self.tables.kt_air };
        tables.get(insulation_key)?.interpolate(temperature).filter(|t| *t > 0.0)
    }

    /// Resistance and reactance in Ω/km at conductor temperature `theta`.
    pub fn line_impedance(&self, conductor: &str, theta: f64, area: f64, method: &str) -> (f64, f64) {
        let x = self.tables.reactance.per_km(method, area);
        let (Some(rho_20), Some(alpha)) = (
            self.tables.resistivity_20.get(conductor),
            self.tables.temp_coeff.get(conductor),
        ) else {
            return (0.0, self.tables.reactance.default);
        };
        let rho = rho_20 * (1.0 + alpha * (theta - RESISTIVITY_REFERENCE_TEMPERATURE));
        let r = if area <= 0.0 { 0.0 } else { rho / area * 1000.0 };
        (r, x)
    }

    /// Voltage drop in percent of the nominal voltage.
    fn drop_pct(&self, line: &Line<'_>, theta: f64, area: f64, method: &str, parallel: u32) -> f64 {
        let (r_km, x_km) = self.line_impedance(line.conductor, theta, area, method);
        drop_percent(line, r_km, x_km, parallel)
    }

    /// Evaluate a segment. `upstream_drop` is the voltage drop accumulated by the segments
    /// feeding it.
    pub fn evaluate(&self, inst: &Installation, upstream_drop: f64) -> Result<Evaluation, Error> {
        let meta = inst.validate(self.tables).map_err(Error::Installation)?;
        let area = inst.require_area().map_err(Error::Installation)?;
        let mut warnings = Vec::new();

        let effective_circuits = if inst.parallel > 1 {
            (inst.circuits + inst.parallel - 1).max(1)
        } else {
            inst.circuits
        };
        let s = self.group_factor(effective_circuits);
        let t = match inst.temperature {
            Some(temperature) => {
                let t = self.temperature_factor(&meta.key, &inst.medium, temperature);
                if t.is_none() {
                    warn!(
                        insulation = %meta.key,
                        medium = %inst.medium,
                        temperature,
                        "temperature outside the correction table"
                    );
                    warnings.push(Warning::TemperatureRange { temperature });
                }
                t
            }
            None => None,
        };
        if inst.voltage == 230 && inst.loaded_cores == 3 {
            warn!(voltage = inst.voltage, "three loaded cores at a phase voltage");
            warnings.push(Warning::VoltagePhase);
        }

        let demand_power = inst.demand_power();
        let parallel = inst.parallel.max(1);
        let design_current =
            (demand_power / inst.efficiency) / (inst.phase_factor() * f64::from(inst.voltage) * inst.cos_phi);
        let current_per_cable = design_current / f64::from(parallel);
        let line = Line {
            conductor: &inst.conductor,
            loaded_cores: inst.loaded_cores,
            voltage: f64::from(inst.voltage),
            cos_phi: inst.cos_phi,
            length: inst.length,
            current: design_current,
        };

        let (resistance, reactance) =
            self.line_impedance(&inst.conductor, meta.theta, area, &inst.method);
        let base_ampacity =
            self.ampacity(&meta.key, &inst.conductor, &inst.method, area, inst.loaded_cores);
        let ampacity = base_ampacity.zip(t).map(|(base, t)| base * s * t);
        let ampacity_total = ampacity.map(|iz| iz * f64::from(parallel));

        let by_current = match (base_ampacity, ampacity) {
            (None, _) => Status::NotApplicable,
            (Some(_), None) => Status::Unknown,
            (Some(_), Some(iz)) if current_per_cable <= iz => Status::Ok,
            (Some(_), Some(_)) => Status::Fail,
        };

        let drop = drop_percent(&line, resistance, reactance, parallel);
        let drop_limit = self.tables.drop_limits.get(&inst.drop_key).copied();
        let total_drop = upstream_drop + drop;
        let within = |value: f64| match drop_limit {
            Some(limit) if value <= limit => Status::Ok,
            Some(_) => Status::Fail,
            None => Status::Unknown,
        };
        let by_drop = within(drop);
        let total_drop_status = within(total_drop);

        let tripping_current = inst.breaker.zip(inst.tripping_factor).map(|(i_n, k)| i_n * k);
        let protection = match (inst.breaker, tripping_current, ampacity_total) {
            (None, _, _) | (_, None, _) => Status::Unknown,
            (Some(_), Some(_), None) => Status::NotApplicable,
            (Some(i_n), Some(i2), Some(iz_total)) => {
                let within_nominal = design_current <= i_n && i_n <= iz_total;
                if within_nominal && i2 <= OVERLOAD_LIMIT * iz_total {
                    Status::Ok
                } else {
                    Status::Fail
                }
            }
        };

        let statuses = [by_current, by_drop, protection];
        let compliance = if base_ampacity.is_none() {
            Compliance::NoData
        } else if statuses.iter().all(|s| *s == Status::Ok) {
            Compliance::Ok
        } else if statuses.contains(&Status::Fail) {
            Compliance::Fail
        } else {
            Compliance::NotApplicable
        };

        let recommendations = if by_current == Status::Fail || by_drop == Status::Fail {
            self.recommend(inst, &meta.key, meta.theta, &line, s, t.unwrap_or(1.0), drop_limit, area)
        } else {
            Vec::new()
        };

        debug!(
            design_current,
            ?ampacity,
            drop,
            %by_current,
            %by_drop,
            %protection,
            "evaluated segment"
        );
        Ok(Evaluation {
            demand_power,
            grouping_factor: s,
            temperature_factor: t,
            design_current,
            current_per_cable,
            resistance,
            reactance,
            conductivity: self
                .tables
                .resistivity_20
                .get(&inst.conductor)
                .filter(|rho| **rho > 0.0)
                .map(|rho| 1.0 / rho),
            base_ampacity,
            ampacity,
            ampacity_total,
            drop,
            upstream_drop,
            total_drop,
            drop_limit,
            tripping_current,
            by_current,
            by_drop,
            total_drop_status,
            protection,
            compliance,
            recommendations,
            warnings,
        })
    }

    /// Smallest standard section at or above `min_section` that carries the current and stays
    /// within the drop limit.
    #[allow(clippy::too_many_arguments)]
    fn first_passing(
        &self,
        line: &Line<'_>,
        insulation_key: &str,
        theta: f64,
        method: &str,
        min_section: f64,
        derating: f64,
        parallel: u32,
        limit: Option<f64>,
    ) -> Option<Candidate> {
        let per_cable = line.current / f64::from(parallel);
        self.tables
            .standard_sections
            .iter()
            .filter(|area| **area >= min_section)
            .find_map(|&area| {
                let base = self
                    .ampacity(insulation_key, line.conductor, method, area, line.loaded_cores)
                    .filter(|b| *b > 0.0)?;
                let iz = base * derating;
                if iz < per_cable {
                    return None;
                }
                let drop = self.drop_pct(line, theta, area, method, parallel);
                if limit.is_some_and(|limit| drop > limit) {
                    return None;
                }
                Some(Candidate {
                    area,
                    method: method.to_string(),
                    ampacity_total: iz * f64::from(parallel),
                    drop,
                })
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn recommend(
        &self,
        inst: &Installation,
        insulation_key: &str,
        theta: f64,
        line: &Line<'_>,
        s: f64,
        t: f64,
        limit: Option<f64>,
        current_area: f64,
    ) -> Vec<Recommendation> {
        let mut recs = Vec::new();
        let Some(&smallest) = self.tables.standard_sections.first() else {
            return recs;
        };
        if line.current <= 0.0 || s <= 0.0 || t <= 0.0 {
            return recs;
        }
        let parallel = inst.parallel.max(1);
        let min_section = current_area.max(smallest);
        let derating = s * t;
        let method = inst.method.as_str();

        if let Some(c) =
            self.first_passing(line, insulation_key, theta, method, min_section, derating, parallel, limit)
        {
            recs.push(Recommendation::IncreaseSection(c));
        }

        let alternative = self
            .tables
            .method_preference
            .iter()
            .filter(|m| m.as_str() != method)
            .find_map(|m| {
                self.first_passing(line, insulation_key, theta, m, min_section, derating, parallel, limit)
            });
        if let Some(c) = alternative {
            recs.push(Recommendation::ChangeMethod(c));
        }

        if insulation_key == "PVC" {
            let xlpe_theta = self
                .tables
                .insulation_meta
                .values()
                .find(|meta| meta.key == "XLPE")
                .map_or(90.0, |meta| meta.theta);
            if let Some(c) = self.first_passing(
                line, "XLPE", xlpe_theta, method, min_section, derating, parallel, limit,
            ) {
                recs.push(Recommendation::SwitchToXlpe(c));
            }
        }

        if let Some(limit) = limit {
            let drop = self.drop_pct(line, theta, min_section, method, parallel);
            let base = self.ampacity(insulation_key, line.conductor, method, min_section, line.loaded_cores);
            if let Some(base) = base.filter(|b| *b > 0.0)
                && drop > limit
            {
                let iz = base * derating;
                let needed = (drop * f64::from(parallel) / limit.max(1e-9)).ceil() as u32;
                let count = needed.max(parallel + 1);
                if iz > 0.0 {
                    recs.push(Recommendation::SplitParallel {
                        count,
                        cable: Candidate {
                            area: min_section,
                            method: method.to_string(),
                            ampacity_total: iz * f64::from(count),
                            drop: self.drop_pct(line, theta, min_section, method, count),
                        },
                    });
                }
            }
        }

        if recs.is_empty() {
            recs.push(Recommendation::ReduceGroupingOrRaiseVoltage);
        }
        recs.truncate(MAX_RECOMMENDATIONS);
        recs
    }

    /// Find the smallest standard section and breaker rating that pass every check.
    ///
    /// The installation's own cross-section and breaker are ignored.
    pub fn select_optimal(&self, inst: &Installation) -> Result<Selection, Error> {
        let meta = inst.validate(self.tables).map_err(Error::Installation)?;
        let t = match inst.temperature {
            None => 1.0,
            Some(temperature) => self
                .temperature_factor(&meta.key, &inst.medium, temperature)
                .ok_or(Error::TemperatureRange(temperature))?,
        };
        let effective_circuits = if inst.parallel > 1 {
            (inst.circuits + inst.parallel - 1).max(1)
        } else {
            inst.circuits
        };
        let s = self.group_factor(effective_circuits);
        let design_current = (inst.demand_power() / inst.efficiency)
            / (phase_factor(inst.loaded_cores) * f64::from(inst.voltage) * inst.cos_phi);
        if !(design_current > 0.0) {
            return Err(Error::DesignCurrent(design_current));
        }
        let limit = self.tables.drop_limits.get(&inst.drop_key).copied();
        let k = inst.tripping_factor.filter(|k| *k > 0.0).unwrap_or(DEFAULT_TRIPPING_FACTOR);
        let breakers = self.tables.numeric_breaker_ratings();
        if breakers.is_empty() {
            return Err(Error::NoBreakerRatings);
        }
        let parallel = inst.parallel.max(1);
        let line = Line {
            conductor: &inst.conductor,
            loaded_cores: inst.loaded_cores,
            voltage: f64::from(inst.voltage),
            cos_phi: inst.cos_phi,
            length: inst.length,
            current: design_current,
        };

        let mut misses = Vec::new();
        for &area in self.tables.standard_sections.iter().filter(|a| **a > 0.0) {
            let Some(base) = self
                .ampacity(&meta.key, &inst.conductor, &inst.method, area, inst.loaded_cores)
                .filter(|b| *b > 0.0)
            else {
                continue;
            };
            let iz_total = base * s * t * f64::from(parallel);
            if iz_total <= 0.0 {
                continue;
            }
            let drop = self.drop_pct(&line, meta.theta, area, &inst.method, parallel);
            for &(label, rating) in breakers.iter().filter(|(_, r)| *r > 0.0) {
                let within_current = design_current <= rating && rating <= iz_total;
                let drop_ok = limit.is_none_or(|limit| drop <= limit);
                let i2 = rating * k;
                let i2_limit = OVERLOAD_LIMIT * iz_total;
                if within_current && drop_ok && i2 <= i2_limit {
                    info!(area, breaker = label, "found a passing cable and breaker");
                    return Ok(Selection::Found {
                        area,
                        breaker: label.to_string(),
                        ampacity_total: iz_total,
                        drop,
                    });
                }
                let drop_excess = limit.map_or(0.0, |limit| (drop - limit).max(0.0));
                let metric = (design_current - rating).max(0.0)
                    + (rating - iz_total).max(0.0)
                    + (design_current - iz_total).max(0.0)
                    + drop_excess
                    + (i2 - i2_limit).max(0.0);
                let mut violations = Vec::new();
                if drop_excess > 0.0 {
                    violations.push(Violation::DropExceeded { excess: drop_excess });
                }
                if rating < design_current {
                    violations.push(Violation::BreakerBelowDesignCurrent {
                        shortfall: design_current - rating,
                    });
                }
                if rating > iz_total {
                    violations.push(Violation::BreakerAboveAmpacity { excess: rating - iz_total });
                }
                if i2 > i2_limit {
                    violations.push(Violation::TrippingCurrent { limit: i2_limit });
                }
                misses.push(NearMiss {
                    metric,
                    area,
                    breaker: label.to_string(),
                    breaker_rating: rating,
                    ampacity_total: iz_total,
                    drop,
                    violations,
                });
            }
        }

        if misses.is_empty() {
            info!("no cable and breaker combinations to consider");
            return Ok(Selection::NoCombinations);
        }
        misses.sort_by(|a, b| {
            a.metric
                .total_cmp(&b.metric)
                .then(a.area.total_cmp(&b.area))
                .then(a.breaker_rating.total_cmp(&b.breaker_rating))
        });
        misses.truncate(MAX_CANDIDATES);
        info!(closest = misses[0].metric, "no combination passes every check");
        Ok(Selection::NearMisses { candidates: misses })
    }
}

fn drop_percent(line: &Line<'_>, r_km: f64, x_km: f64, parallel: u32) -> f64 {
    if line.voltage == 0.0 {
        return 0.0;
    }
    let divider = f64::from(parallel.max(1));
    let (r_m, x_m) = (r_km / 1000.0 / divider, x_km / 1000.0 / divider);
    let sin_phi = (1.0 - line.cos_phi.min(1.0).powi(2)).max(0.0).sqrt();
    phase_factor(line.loaded_cores) * line.current * (r_m * line.cos_phi + x_m * sin_phi) * line.length
        * 100.0
        / line.voltage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Curve;

    fn tables() -> Tables {
        Tables::embedded().unwrap()
    }

    /// 3-phase 400 V, 20 kW at cos φ 0.9: Icalc ≈ 32.08 A.
    fn feeder(tables: &Tables) -> Installation {
        Installation {
            power: 20_000.0,
            demand_factor: 1.0,
            cos_phi: 0.9,
            length: 30.0,
            area: Some(10.0),
            drop_key: "A: other 5%".into(),
            breaker: Some(40.0),
            ..Installation::with_table_defaults(tables)
        }
    }

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn ampacity_applies_factors_and_interpolates() {
        let tables = tables();
        let engine = Engine::new(&tables);
        assert_eq!(engine.ampacity("PVC", "Cu", "C", 2.5, 3), Some(24.0));
        assert!(close(engine.ampacity("PVC", "Cu", "C", 2.5, 2).unwrap(), 26.88, 1e-9));
        assert!(close(engine.ampacity("XLPE", "Cu", "C", 2.5, 3).unwrap(), 31.44, 1e-9));
        assert!(close(engine.ampacity("PVC", "Cu", "C", 3.25, 3).unwrap(), 28.0, 1e-9));
        assert_eq!(engine.ampacity("PVC", "Cu", "C", 1.0, 3), Some(17.5));
        assert_eq!(engine.ampacity("PVC", "Cu", "C", 400.0, 3), Some(464.0));
        assert_eq!(engine.ampacity("PVC", "Cu", "F", 2.5, 3), None);
        assert_eq!(engine.ampacity("PVC", "Ag", "C", 2.5, 3), None);
        assert_eq!(engine.ampacity("PVC", "Cu", "C", 2.5, 4), None);
    }

    #[test]
    fn group_factor_edges() {
        let tables = tables();
        let engine = Engine::new(&tables);
        assert_eq!(engine.group_factor(0), 1.0);
        assert_eq!(engine.group_factor(1), 1.0);
        assert_eq!(engine.group_factor(3), 0.7);
        assert_eq!(engine.group_factor(12), 0.45);
        assert_eq!(engine.group_factor(10), 0.38);
        assert_eq!(engine.group_factor(14), 0.38);
        assert_eq!(engine.group_factor(20), 0.38);
        assert_eq!(engine.group_factor(40), 0.38);
    }

    #[test]
    fn temperature_factor_by_medium() {
        let tables = tables();
        let engine = Engine::new(&tables);
        assert_eq!(engine.temperature_factor("PVC", "air", 30.0), Some(1.0));
        assert_eq!(engine.temperature_factor("PVC", "soil", 20.0), Some(1.0));
        assert!(close(engine.temperature_factor("PVC", "air", 32.5).unwrap(), 0.97, 1e-9));
        assert_eq!(engine.temperature_factor("PVC", "air", 65.0), None);
        assert_eq!(engine.temperature_factor("XLPE", "air", 65.0), Some(0.65));
        assert_eq!(engine.temperature_factor("PVC", "air", 5.0), None);
        assert_eq!(engine.temperature_factor("EPR", "air", 30.0), None);
    }

    #[test]
    fn impedance_follows_operating_temperature() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let (r, x) = engine.line_impedance("Cu", 70.0, 10.0, "C");
        assert!(close(r, 0.0178 * (1.0 + 0.00393 * 50.0) / 10.0 * 1000.0, 1e-9));
        assert_eq!(x, 0.08);
        assert_eq!(engine.line_impedance("Cu", 70.0, 0.0, "C").0, 0.0);
        assert_eq!(
            engine.line_impedance("Ag", 70.0, 10.0, "B1"),
            (0.0, tables.reactance.default)
        );
    }

    #[test]
    fn drop_formula_single_and_three_phase() {
        let line = Line {
            conductor: "Cu",
            loaded_cores: 2,
            voltage: 230.0,
            cos_phi: 1.0,
            length: 100.0,
            current: 10.0,
        };
        // 2 · 10 A · 1 Ω/km · 0.1 km / 230 V = 0.869 %
        assert!(close(drop_percent(&line, 1.0, 0.08, 1), 0.8696, 1e-4));
        assert!(close(drop_percent(&line, 1.0, 0.08, 2), 0.4348, 1e-4));
        let three_phase = Line { loaded_cores: 3, voltage: 400.0, ..line };
        assert!(close(drop_percent(&three_phase, 1.0, 0.0, 1), 0.4330, 1e-4));
        let dead = Line { voltage: 0.0, ..three_phase };
        assert_eq!(drop_percent(&dead, 1.0, 0.0, 1), 0.0);
    }

    #[test]
    fn passing_feeder() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let eval = engine.evaluate(&feeder(&tables), 0.0).unwrap();
        assert!(close(eval.design_current, 32.075, 1e-3));
        assert_eq!(eval.base_ampacity, Some(57.0));
        assert_eq!(eval.ampacity, Some(57.0));
        assert_eq!(eval.by_current, Status::Ok);
        assert_eq!(eval.by_drop, Status::Ok);
        assert_eq!(eval.protection, Status::Ok);
        assert_eq!(eval.compliance, Compliance::Ok);
        assert!(eval.recommendations.is_empty());
        assert!(eval.warnings.is_empty());
        assert!(close(eval.conductivity.unwrap(), 56.18, 1e-2));
    }

    #[test]
    fn overloaded_cable_fails_and_gets_recommendations() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { area: Some(2.5), breaker: None, ..feeder(&tables) };
        let eval = engine.evaluate(&inst, 0.0).unwrap();
        assert_eq!(eval.by_current, Status::Fail);
        assert_eq!(eval.protection, Status::Unknown);
        assert_eq!(eval.compliance, Compliance::Fail);
        let Recommendation::IncreaseSection(first) = &eval.recommendations[0] else {
            panic!("expected a section increase, got {:?}", eval.recommendations);
        };
        assert_eq!(first.area, 6.0);
        assert_eq!(first.method, "C");
        assert!(eval
            .recommendations
            .iter()
            .any(|r| matches!(r, Recommendation::SwitchToXlpe(c) if c.area == 4.0)));
    }

    #[test]
    fn untabulated_group_size_uses_the_largest_group() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { power: 14_000.0, circuits: 10, ..feeder(&tables) };
        let eval = engine.evaluate(&inst, 0.0).unwrap();
        assert_eq!(eval.grouping_factor, 0.38);
        assert!(close(eval.design_current, 22.45, 1e-2));
        assert!(close(eval.ampacity.unwrap(), 57.0 * 0.38, 1e-9));
        assert_eq!(eval.by_current, Status::Fail);
    }

    #[test]
    fn only_another_method_passes() {
        let mut tables = tables();
        tables
            .ampacity_base
            .insert("A1".into(), Curve::new(vec![(1.5, 13.5), (300.0, 20.0)]));
        let engine = Engine::new(&tables);
        let inst = Installation { method: "A1".into(), area: Some(2.5), ..feeder(&tables) };
        let eval = engine.evaluate(&inst, 0.0).unwrap();
        assert_eq!(eval.by_current, Status::Fail);
        assert!(
            !eval
                .recommendations
                .iter()
                .any(|r| matches!(r, Recommendation::IncreaseSection(_)))
        );
        let Recommendation::ChangeMethod(alternative) = &eval.recommendations[0] else {
            panic!("expected a method change, got {:?}", eval.recommendations);
        };
        // E is the first preferred method, 4 mm² carries 34 A there
        assert_eq!(alternative.method, "E");
        assert_eq!(alternative.area, 4.0);
        assert_eq!(alternative.ampacity_total, 34.0);
    }

    #[test]
    fn long_run_recommends_parallel_split() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation {
            area: Some(300.0),
            length: 3_000.0,
            drop_key: "A: lighting 3%".into(),
            breaker: None,
            ..feeder(&tables)
        };
        let eval = engine.evaluate(&inst, 0.0).unwrap();
        assert_eq!(eval.by_current, Status::Ok);
        assert_eq!(eval.by_drop, Status::Fail);
        let split = eval
            .recommendations
            .iter()
            .find_map(|r| match r {
                Recommendation::SplitParallel { count, cable } => Some((*count, cable.clone())),
                _ => None,
            })
            .expect("parallel split recommendation");
        assert!(split.0 >= 2);
        assert!(split.1.drop <= eval.drop / f64::from(split.0) + 1e-9);
    }

    #[test]
    fn protection_detects_oversized_breaker() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { breaker: Some(63.0), ..feeder(&tables) };
        let eval = engine.evaluate(&inst, 0.0).unwrap();
        assert_eq!(eval.protection, Status::Fail);
        assert_eq!(eval.compliance, Compliance::Fail);
        let inst = Installation { breaker: Some(25.0), ..feeder(&tables) };
        assert_eq!(engine.evaluate(&inst, 0.0).unwrap().protection, Status::Fail);
    }

    #[test]
    fn grouping_and_parallel_cables_derate() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { circuits: 2, parallel: 2, ..feeder(&tables) };
        let eval = engine.evaluate(&inst, 0.0).unwrap();
        assert_eq!(eval.grouping_factor, 0.7);
        assert!(close(eval.ampacity.unwrap(), 39.9, 1e-9));
        assert!(close(eval.ampacity_total.unwrap(), 79.8, 1e-9));
        assert!(close(eval.current_per_cable, eval.design_current / 2.0, 1e-12));
    }

    #[test]
    fn warnings_for_phase_voltage_and_temperature() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { voltage: 230, temperature: Some(70.0), ..feeder(&tables) };
        let eval = engine.evaluate(&inst, 0.0).unwrap();
        assert!(eval.warnings.contains(&Warning::VoltagePhase));
        assert!(eval.warnings.contains(&Warning::TemperatureRange { temperature: 70.0 }));
        assert_eq!(eval.temperature_factor, None);
        assert_eq!(eval.ampacity, None);
        assert_eq!(eval.by_current, Status::Unknown);
        assert_eq!(eval.protection, Status::NotApplicable);
    }

    #[test]
    fn upstream_drop_accumulates() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let eval = engine.evaluate(&feeder(&tables), 4.9).unwrap();
        assert!(close(eval.total_drop, 4.9 + eval.drop, 1e-12));
        assert_eq!(eval.total_drop_status, Status::Fail);
        assert_eq!(eval.by_drop, Status::Ok);
    }

    #[test]
    fn evaluate_requires_area() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { area: None, ..feeder(&tables) };
        assert!(matches!(
            engine.evaluate(&inst, 0.0),
            Err(Error::Installation(installation::Error::MissingArea))
        ));
    }

    #[test]
    fn selection_picks_smallest_passing_pair() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let selection = engine.select_optimal(&feeder(&tables)).unwrap();
        let Selection::Found { area, breaker, ampacity_total, .. } = selection else {
            panic!("expected a passing pair, got {selection:?}");
        };
        // 6 mm² carries 41 A, the smallest breaker ≥ 32.08 A is 40 A.
        assert_eq!(area, 6.0);
        assert_eq!(breaker, "40");
        assert_eq!(ampacity_total, 41.0);
    }

    #[test]
    fn selection_reports_near_misses() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { length: 5_000.0, ..feeder(&tables) };
        let Selection::NearMisses { candidates } = engine.select_optimal(&inst).unwrap() else {
            panic!("expected near misses");
        };
        assert_eq!(candidates.len(), 3);
        assert!(candidates.windows(2).all(|w| w[0].metric <= w[1].metric));
        assert!(candidates[0]
            .violations
            .iter()
            .any(|v| matches!(v, Violation::DropExceeded { .. })));
    }

    #[test]
    fn selection_rejects_temperature_outside_table() {
        let tables = tables();
        let engine = Engine::new(&tables);
        let inst = Installation { temperature: Some(90.0), ..feeder(&tables) };
        assert!(matches!(engine.select_optimal(&inst), Err(Error::TemperatureRange(t)) if t == 90.0));
        let inst = Installation { temperature: None, ..feeder(&tables) };
        assert!(matches!(engine.select_optimal(&inst), Ok(Selection::Found { .. })));
    }

    #[test]
    fn descriptions_are_localised() {
        let rec = Recommendation::IncreaseSection(Candidate {
            area: 6.0,
            method: "C".into(),
            ampacity_total: 41.0,
            drop: 1.234,
        });
        assert_eq!(
            rec.describe(Language::En),
            "Increase the section to 6 mm² (method C) → Iz_tot≈41 A, ΔU≈1.23%"
        );
        assert_eq!(
            rec.describe(Language::Ru),
            "Увеличить сечение до 6 мм² (метод C) → Iz_tot≈41 A, ΔU≈1,23%"
        );
        let v = Violation::BreakerAboveAmpacity { excess: 3.5 };
        assert_eq!(v.describe(Language::En), "In > Iz_tot by 3.50 A");
    }
}
