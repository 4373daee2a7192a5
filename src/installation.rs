use crate::tables::{InsulationMeta, Tables};

pub const DEFAULT_METHOD: &str = "C";
pub const DEFAULT_MEDIUM: &str = "air";
pub const DEFAULT_TEMPERATURE: f64 = 30.0;
/// Conventional tripping current ratio of typical circuit breakers.
pub const DEFAULT_TRIPPING_FACTOR: f64 = 1.45;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("efficiency η must be within (0, 1], got {0}")]
    Efficiency(f64),
    #[error("cos φ must be within (0, 1], got {0}")]
    CosPhi(f64),
    #[error("length must not be negative, got {0} m")]
    Length(f64),
    #[error("cross-section must be positive, got {0} mm²")]
    Area(f64),
    #[error("the cross-section is required for this calculation")]
    MissingArea,
    #[error("voltage must be a positive number of volts")]
    Voltage,
    #[error("unknown insulation `{0}`")]
    Insulation(String),
    #[error("unknown conductor `{0}`")]
    Conductor(String),
    #[error("unknown installation method `{0}`")]
    Method(String),
    #[error("unknown temperature medium `{0}`")]
    Medium(String),
    #[error("unknown voltage drop limit `{0}`")]
    DropKey(String),
    #[error("loaded cores must be 2 or 3, got {0}")]
    LoadedCores(u8),
    #[error("cables in the group must be at least 1")]
    Circuits,
    #[error("parallel cables must be at least 1")]
    Parallel,
    #[error("breaker rating In must be positive, got {0} A")]
    Breaker(f64),
    #[error("tripping factor k must be positive, got {0}")]
    TrippingFactor(f64),
    #[error("`{0}` is required unless the installation is loaded from a project")]
    MissingArgument(&'static str),
}

/// Parameters of one cable segment.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Installation {
    pub circuit: String,
    pub from: String,
    pub to: String,
    pub insulation: String,
    pub conductor: String,
    pub cable: String,
    /// Installed power Pi in watts.
    pub power: f64,
    /// Demand factor Kj.
    pub demand_factor: f64,
    pub efficiency: f64,
    pub voltage: u32,
    pub cos_phi: f64,
    /// Length in metres.
    pub length: f64,
    /// Cross-section in mm².
    pub area: Option<f64>,
    pub method: String,
    pub loaded_cores: u8,
    /// Circuits bunched in the same group, for the grouping factor.
    pub circuits: u32,
    pub parallel: u32,
    pub medium: String,
    pub temperature: Option<f64>,
    /// Rated current In of the protective device.
    pub breaker: Option<f64>,
    /// Ratio I2/In of the protective device.
    pub tripping_factor: Option<f64>,
    pub drop_key: String,
}

impl Default for Installation {
    fn default() -> Self {
        Self {
            circuit: String::new(),
            from: String::new(),
            to: String::new(),
            insulation: String::new(),
            conductor: String::new(),
            cable: String::new(),
            power: 0.0,
            demand_factor: 1.0,
            efficiency: 1.0,
            voltage: 400,
            cos_phi: 1.0,
            length: 0.0,
            area: None,
            method: DEFAULT_METHOD.to_string(),
            loaded_cores: 3,
            circuits: 1,
            parallel: 1,
            medium: DEFAULT_MEDIUM.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            breaker: None,
            tripping_factor: Some(DEFAULT_TRIPPING_FACTOR),
            drop_key: String::new(),
        }
    }
}

impl Installation {
    /// A default segment whose table-backed choices are the first ones the tables offer.
    pub fn with_table_defaults(tables: &Tables) -> Self {
        let first = |list: &[String]| list.first().cloned().unwrap_or_default();
        Self {
            insulation: first(&tables.insulation_options),
            conductor: first(&tables.conductor_types),
            voltage: tables
                .voltage_levels
                .iter()
                .find_map(|v| v.trim().parse().ok())
                .unwrap_or(400),
            method: if tables.installation_methods.iter().any(|m| m == DEFAULT_METHOD) {
                DEFAULT_METHOD.to_string()
            } else {
                first(&tables.installation_methods)
            },
            medium: if tables.temperature_media.contains_key(DEFAULT_MEDIUM) {
                DEFAULT_MEDIUM.to_string()
            } else {
                tables.temperature_media.keys().next().cloned().unwrap_or_default()
            },
            drop_key: tables.drop_limits.keys().next().cloned().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Check every field against its allowed range and the reference tables.
    ///
    /// The cross-section is optional here since optimal selection does not need one.
    pub fn validate<'t>(&self, tables: &'t Tables) -> Result<&'t InsulationMeta, Error> {
        if !(self.efficiency > 0.0 && self.efficiency <= 1.0) {
            return Err(Error::Efficiency(self.efficiency));
        }
        if !(self.cos_phi > 0.0 && self.cos_phi <= 1.0) {
            return Err(Error::CosPhi(self.cos_phi));
        }
        if !(self.length >= 0.0) {
            return Err(Error::Length(self.length));
        }
        if let Some(area) = self.area {
            if !(area > 0.0) {
                return Err(Error::Area(area));
            }
        }
        if self.voltage == 0 {
            return Err(Error::Voltage);
        }
        if !matches!(self.loaded_cores, 2 | 3) {
            return Err(Error::LoadedCores(self.loaded_cores));
        }
        if self.circuits < 1 {
            return Err(Error::Circuits);
        }
        if self.parallel < 1 {
            return Err(Error::Parallel);
        }
        if let Some(breaker) = self.breaker {
            if !(breaker > 0.0) {
                return Err(Error::Breaker(breaker));
            }
        }
        if let Some(k) = self.tripping_factor {
            if !(k > 0.0) {
                return Err(Error::TrippingFactor(k));
            }
        }
        if !tables.conductor_types.contains(&self.conductor) {
            return Err(Error::Conductor(self.conductor.clone()));
        }
        if !tables.installation_methods.contains(&self.method) {
            return Err(Error::Method(self.method.clone()));
        }
        if !tables.temperature_media.contains_key(&self.medium) {
            return Err(Error::Medium(self.medium.clone()));
        }
        if !tables.drop_limits.contains_key(&self.drop_key) {
            return Err(Error::DropKey(self.drop_key.clone()));
        }
        tables
            .insulation(&self.insulation)
            .ok_or_else(|| Error::Insulation(self.insulation.clone()))
    }

    pub fn require_area(&self) -> Result<f64, Error> {
        self.area.ok_or(Error::MissingArea)
    }

    /// Demand power Pj = Pi·Kj.
    pub fn demand_power(&self) -> f64 {
        self.power * self.demand_factor
    }

    /// Single-phase circuits use the 2× loop factor, three-phase ones √3.
    pub fn phase_factor(&self) -> f64 {
        phase_factor(self.loaded_cores)
    }
}

pub fn phase_factor(loaded_cores: u8) -> f64 {
    if loaded_cores == 2 { 2.0 } else { 3f64.sqrt() }
}

fn parse_decimal(value: &str) -> Result<f64, String> {
    crate::i18n::parse_number(value).ok_or_else(|| format!("`{value}` is not a number"))
}

/// Installation parameters of the segment being calculated.
///
/// Every flag left out keeps the value of the installation the arguments are applied to: a
/// segment loaded from a project, or the defaults of the reference tables.
#[derive(clap::Parser, Clone, Debug)]
#[group(id = "installation::Args")]
pub struct Args {
    /// Circuit name; segments of one circuit chain their voltage drops.
    #[arg(long)]
    circuit: Option<String>,
    /// Node the segment starts at.
    #[arg(long)]
    from: Option<String>,
    /// Node the segment ends at.
    #[arg(long)]
    to: Option<String>,
    /// Insulation label, see `tables insulation`. Defaults to the first one.
    #[arg(long)]
    insulation: Option<String>,
    /// Conductor material. Defaults to the first one in the tables.
    #[arg(long)]
    conductor: Option<String>,
    /// Cable designation, only carried into the results.
    #[arg(long)]
    cable: Option<String>,
    /// Installed power Pi in watts.
    #[arg(long, short = 'P', value_parser = parse_decimal)]
    power: Option<f64>,
    /// Demand factor Kj.
    #[arg(long, short = 'K', value_parser = parse_decimal)]
    demand_factor: Option<f64>,
    /// Efficiency η of the load [default: 1].
    #[arg(long, value_parser = parse_decimal)]
    efficiency: Option<f64>,
    /// Nominal voltage in volts. Defaults to the first level in the tables.
    #[arg(long, short = 'U')]
    voltage: Option<u32>,
    /// Power factor cos φ.
    #[arg(long, value_parser = parse_decimal)]
    cos_phi: Option<f64>,
    /// Segment length in metres.
    #[arg(long, short = 'L', value_parser = parse_decimal)]
    length: Option<f64>,
    /// Conductor cross-section in mm².
    #[arg(long, short = 'A', value_parser = parse_decimal)]
    area: Option<f64>,
    /// Installation method per IEC 60364-5-52 (A1, A2, B1, B2, C, D, E).
    #[arg(long, short = 'm')]
    method: Option<String>,
    /// Loaded conductors: 2 for single-phase, 3 for three-phase [default: 3].
    #[arg(long, value_parser = clap::value_parser!(u8).range(2..=3))]
    loaded_cores: Option<u8>,
    /// Circuits bunched together, used for the grouping factor S [default: 1].
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=20))]
    circuits: Option<u32>,
    /// Cables laid in parallel [default: 1].
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=6))]
    parallel: Option<u32>,
    /// Medium the ambient temperature refers to, by key or label.
    #[arg(long)]
    medium: Option<String>,
    /// Ambient temperature in °C [default: 30].
    #[arg(long, short = 't', value_parser = parse_decimal)]
    temperature: Option<f64>,
    /// Rated current In of the protective device in amperes.
    #[arg(long, value_parser = parse_decimal)]
    breaker: Option<f64>,
    /// Ratio I2/In of the protective device [default: 1.45].
    #[arg(long, short = 'k', value_parser = parse_decimal)]
    tripping_factor: Option<f64>,
    /// Voltage drop limit key. Defaults to the first key in the tables.
    #[arg(long)]
    drop_limit: Option<String>,
}

impl Args {
    /// Build the installation from the arguments alone. The load parameters must all be given.
    pub fn into_installation(self, tables: &Tables) -> Result<Installation, Error> {
        let required = [
            ("--power", self.power),
            ("--demand-factor", self.demand_factor),
            ("--cos-phi", self.cos_phi),
            ("--length", self.length),
        ];
        if let Some((flag, _)) = required.into_iter().find(|(_, value)| value.is_none()) {
            return Err(Error::MissingArgument(flag));
        }
        self.apply_to(Installation::with_table_defaults(tables), tables)
    }

    /// Override the fields of `base` with the arguments that were given.
    pub fn apply_to(self, base: Installation, tables: &Tables) -> Result<Installation, Error> {
        let text = |value: Option<String>, base: String| value.map_or(base, |v| v.trim().to_string());
        let medium = match self.medium {
            None => base.medium,
            Some(value) => tables
                .medium_key(&value)
                .map(str::to_string)
                .ok_or(Error::Medium(value))?,
        };
        let installation = Installation {
            circuit: text(self.circuit, base.circuit),
            from: text(self.from, base.from),
            to: text(self.to, base.to),
            insulation: self.insulation.unwrap_or(base.insulation),
            conductor: self.conductor.unwrap_or(base.conductor),
            cable: text(self.cable, base.cable),
            power: self.power.unwrap_or(base.power),
            demand_factor: self.demand_factor.unwrap_or(base.demand_factor),
            efficiency: self.efficiency.unwrap_or(base.efficiency),
            voltage: self.voltage.unwrap_or(base.voltage),
            cos_phi: self.cos_phi.unwrap_or(base.cos_phi),
            length: self.length.unwrap_or(base.length),
            area: self.area.or(base.area),
            method: text(self.method, base.method),
            loaded_cores: self.loaded_cores.unwrap_or(base.loaded_cores),
            circuits: self.circuits.unwrap_or(base.circuits),
            parallel: self.parallel.unwrap_or(base.parallel),
            medium,
            temperature: self.temperature.or(base.temperature),
            breaker: self.breaker.or(base.breaker),
            tripping_factor: self.tripping_factor.or(base.tripping_factor),
            drop_key: self.drop_limit.unwrap_or(base.drop_key),
        };
        installation.validate(tables)?;
        Ok(installation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(tables: &Tables) -> Installation {
        Installation {
            power: 10_000.0,
            demand_factor: 1.0,
            cos_phi: 0.9,
            length: 50.0,
            area: Some(4.0),
            ..Installation::with_table_defaults(tables)
        }
    }

    #[test]
    fn table_defaults_are_taken_from_the_tables() {
        let tables = Tables::embedded().unwrap();
        let inst = Installation::with_table_defaults(&tables);
        assert_eq!(inst.insulation, "PVC (70°C)");
        assert_eq!(inst.conductor, "Cu");
        assert_eq!(inst.voltage, 400);
        assert_eq!(inst.method, "C");
        assert_eq!(inst.medium, "air");
        assert_eq!(inst.drop_key, "A: lighting 3%");
        assert_eq!(inst.temperature, Some(30.0));
    }

    #[test]
    fn validation_rejects_out_of_range_inputs() {
        let tables = Tables::embedded().unwrap();
        assert!(segment(&tables).validate(&tables).is_ok());
        let cases = [
            (Installation { efficiency: 0.0, ..segment(&tables) }, Error::Efficiency(0.0)),
            (Installation { cos_phi: 1.2, ..segment(&tables) }, Error::CosPhi(1.2)),
            (Installation { length: -1.0, ..segment(&tables) }, Error::Length(-1.0)),
            (Installation { area: Some(0.0), ..segment(&tables) }, Error::Area(0.0)),
            (Installation { voltage: 0, ..segment(&tables) }, Error::Voltage),
            (Installation { loaded_cores: 4, ..segment(&tables) }, Error::LoadedCores(4)),
            (Installation { circuits: 0, ..segment(&tables) }, Error::Circuits),
            (Installation { parallel: 0, ..segment(&tables) }, Error::Parallel),
            (
                Installation { method: "Z".into(), ..segment(&tables) },
                Error::Method("Z".into()),
            ),
            (
                Installation { insulation: "Rubber".into(), ..segment(&tables) },
                Error::Insulation("Rubber".into()),
            ),
        ];
        for (inst, expected) in cases {
            assert_eq!(inst.validate(&tables).unwrap_err(), expected);
        }
    }

    #[test]
    fn phase_factor_depends_on_loaded_cores() {
        assert_eq!(phase_factor(2), 2.0);
        assert!((phase_factor(3) - 1.7320508).abs() < 1e-6);
    }

    #[test]
    fn arguments_require_the_load_unless_applied_to_a_base() {
        use clap::Parser as _;
        let tables = Tables::embedded().unwrap();
        let args = Args::try_parse_from(["calc", "-P", "1000", "-K", "1", "--cos-phi", "0,9"]);
        let err = args.unwrap().into_installation(&tables).unwrap_err();
        assert_eq!(err, Error::MissingArgument("--length"));

        let args = Args::try_parse_from(["calc", "--breaker", "25", "--medium", "Земля"]);
        let inst = args.unwrap().apply_to(segment(&tables), &tables).unwrap();
        assert_eq!(inst.breaker, Some(25.0));
        assert_eq!(inst.medium, "soil");
        assert_eq!(inst.power, 10_000.0);
        assert_eq!(inst.area, Some(4.0));
        assert_eq!(inst.temperature, Some(DEFAULT_TEMPERATURE));
    }

    #[test]
    fn deserializing_partial_form_fills_defaults() {
        let inst: Installation = serde_json::from_str(r#"{"power": 500.0}"#).unwrap();
        assert_eq!(inst.power, 500.0);
        assert_eq!(inst.loaded_cores, 3);
        assert_eq!(inst.tripping_factor, Some(DEFAULT_TRIPPING_FACTOR));
    }
}
