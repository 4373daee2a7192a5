use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Reference data compiled into the executable.
pub const EMBEDDED_TABLES: &str = include_str!("../data/tables.json");

/// Reactance used when neither the bucket nor the method has a value.
pub const DEFAULT_REACTANCE: f64 = 0.08;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read the reference tables at {1:?}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("reference tables from {1} are not valid JSON")]
    Parse(#[source] serde_json::Error, String),
    #[error("reference tables from {1} do not define any {0}")]
    Empty(&'static str, String),
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
pub struct InsulationMeta {
    pub key: String,
    pub theta: f64,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Reactance {
    #[serde(default = "default_reactance")]
    pub default: f64,
    #[serde(default)]
    pub method_defaults: BTreeMap<String, f64>,
    #[serde(default)]
    pub buckets: BTreeMap<String, BTreeMap<String, f64>>,
}

fn default_reactance() -> f64 {
    DEFAULT_REACTANCE
}

impl Default for Reactance {
    fn default() -> Self {
        Self {
            default: DEFAULT_REACTANCE,
            method_defaults: BTreeMap::new(),
            buckets: BTreeMap::new(),
        }
    }
}

impl Reactance {
    /// Reactance per kilometre for the given method and cross-section.
    pub fn per_km(&self, method: &str, area: f64) -> f64 {
        let bucket = if area > 240.0 {
            ">240"
        } else if area > 95.0 {
            "≤240"
        } else {
            "≤95"
        };
        self.buckets
            .get(method)
            .and_then(|b| b.get(bucket))
            .or_else(|| self.method_defaults.get(method))
            .copied()
            .unwrap_or(self.default)
    }
}

/// A tabulated function of one variable, sorted by abscissa.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Curve(Vec<(f64, f64)>);

impl Curve {
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self(points)
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.0
    }

    /// Linear interpolation inside the tabulated range; `None` outside of it.
    pub fn interpolate(&self, x: f64) -> Option<f64> {
        let (first, last) = (self.0.first()?, self.0.last()?);
        if x < first.0 || x > last.0 {
            return None;
        }
        if let Some(&(_, y)) = self.0.iter().find(|(px, _)| *px == x) {
            return Some(y);
        }
        self.0
            .windows(2)
            .find(|w| w[0].0 <= x && x <= w[1].0)
            .map(|w| lerp(w[0], w[1], x))
    }

    /// Like [`Self::interpolate`], but values beyond either end take the value of that end.
    ///
    /// Points within a small tolerance of a tabulated abscissa snap to it, so that
    /// cross-sections such as `2.5` read back exactly what the table says.
    pub fn interpolate_clamped(&self, x: f64) -> Option<f64> {
        let (first, last) = (self.0.first()?, self.0.last()?);
        if x <= first.0 {
            return Some(first.1);
        }
        if x >= last.0 {
            return Some(last.1);
        }
        for w in self.0.windows(2) {
            if is_close(x, w[0].0) {
                return Some(w[0].1);
            }
            if w[0].0 <= x && x <= w[1].0 {
                return Some(lerp(w[0], w[1], x));
            }
        }
        None
    }
}

fn lerp(lower: (f64, f64), upper: (f64, f64), x: f64) -> f64 {
    if is_close(upper.0, lower.0) {
        return lower.1;
    }
    let ratio = (x - lower.0) / (upper.0 - lower.0);
    lower.1 + ratio * (upper.1 - lower.1)
}

pub(crate) fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::max(1e-6 * f64::max(a.abs(), b.abs()), 1e-3)
}

#[derive(serde::Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
struct RawTables {
    insulation_options: Vec<String>,
    insulation_meta: BTreeMap<String, InsulationMeta>,
    conductor_types: Vec<String>,
    voltage_levels: Vec<String>,
    temperature_media: BTreeMap<String, BTreeMap<String, String>>,
    installation_methods: Vec<String>,
    method_preference: Vec<String>,
    standard_sections: Vec<f64>,
    standard_cross_sections: Vec<String>,
    standard_breaker_ratings: Vec<String>,
    drop_limit_keys: BTreeMap<String, f64>,
    #[serde(rename = "RESISTIVITY_20")]
    resistivity_20: BTreeMap<String, f64>,
    temp_coeff: BTreeMap<String, f64>,
    ampacity_base: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    ampacity_insulation_factors: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
    ampacity_loaded_factors: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    grouping_factors: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "KT_V_TABLE")]
    kt_v_table: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    #[serde(rename = "KT_Z_TABLE")]
    kt_z_table: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    reactance: Option<Reactance>,
}

/// IEC 60364-5-52 reference data used by the calculation engine.
#[derive(Clone, Debug)]
pub struct Tables {
    pub insulation_options: Vec<String>,
    pub insulation_meta: BTreeMap<String, InsulationMeta>,
    pub conductor_types: Vec<String>,
    pub voltage_levels: Vec<String>,
    /// Medium key (`air`, `soil`) to its label in each language.
    pub temperature_media: BTreeMap<String, BTreeMap<String, String>>,
    pub installation_methods: Vec<String>,
    pub method_preference: Vec<String>,
    /// Standard cross-sections in mm², ascending.
    pub standard_sections: Vec<f64>,
    pub standard_cross_sections: Vec<String>,
    pub breaker_ratings: Vec<String>,
    pub drop_limits: BTreeMap<String, f64>,
    pub resistivity_20: BTreeMap<String, f64>,
    pub temp_coeff: BTreeMap<String, f64>,
    /// Installation method to (cross-section → base ampacity) for Cu/PVC, three loaded cores.
    pub ampacity_base: BTreeMap<String, Curve>,
    /// Insulation key → conductor → method → multiplier.
    pub insulation_factors: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
    pub loaded_factors: BTreeMap<String, BTreeMap<u8, f64>>,
    pub grouping_factors: BTreeMap<u32, f64>,
    pub kt_air: BTreeMap<String, Curve>,
    pub kt_soil: BTreeMap<String, Curve>,
    pub reactance: Reactance,
}

impl Tables {
    pub fn embedded() -> Result<Self, Error> {
        Self::from_json(EMBEDDED_TABLES, "embedded data")
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text =
            std::fs::read_to_string(path).map_err(|e| Error::Read(e, path.to_path_buf()))?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// Load an override file when one is given, the embedded data otherwise.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::load(path),
            None => Self::embedded(),
        }
    }

    pub fn from_json(text: &str, origin: &str) -> Result<Self, Error> {
        let raw: RawTables =
            serde_json::from_str(text).map_err(|e| Error::Parse(e, origin.to_string()))?;
        let ampacity_base = numeric_tables("AMPACITY_BASE", raw.ampacity_base, |k| {
            k.parse::<f64>().ok()
        })
        .into_iter()
        .map(|(method, points)| (method, Curve::new(points)))
        .collect();
        let loaded_factors = numeric_tables("AMPACITY_LOADED_FACTORS", raw.ampacity_loaded_factors, |k| {
            k.parse::<u8>().ok()
        })
        .into_iter()
        .map(|(method, points)| (method, points.into_iter().collect()))
        .collect();
        let grouping_factors = match numeric_entries(raw.grouping_factors, |k| k.parse::<u32>().ok())
        {
            Ok(points) => points.into_iter().collect(),
            Err(entry) => {
                warn!(table = "GROUPING_FACTORS", entry = %entry, "ignoring the grouping table");
                BTreeMap::new()
            }
        };
        let kt = |name, table| -> BTreeMap<String, Curve> {
            numeric_tables(name, table, |k| k.parse::<f64>().ok())
                .into_iter()
                .map(|(insulation, points)| (insulation, Curve::new(points)))
                .collect()
        };
        let mut standard_sections = raw.standard_sections;
        standard_sections.sort_by(f64::total_cmp);
        let tables = Tables {
            insulation_options: raw.insulation_options,
            insulation_meta: raw.insulation_meta,
            conductor_types: raw.conductor_types,
            voltage_levels: raw.voltage_levels,
            temperature_media: raw.temperature_media,
            installation_methods: raw.installation_methods,
            method_preference: raw.method_preference,
            standard_sections,
            standard_cross_sections: raw.standard_cross_sections,
            breaker_ratings: raw.standard_breaker_ratings,
            drop_limits: raw.drop_limit_keys,
            resistivity_20: raw.resistivity_20,
            temp_coeff: raw.temp_coeff,
            ampacity_base,
            insulation_factors: raw.ampacity_insulation_factors,
            loaded_factors,
            grouping_factors,
            kt_air: kt("KT_V_TABLE", raw.kt_v_table),
            kt_soil: kt("KT_Z_TABLE", raw.kt_z_table),
            reactance: raw.reactance.unwrap_or_default(),
        };
        let required = [
            ("insulation options", tables.insulation_options.is_empty()),
            ("conductor types", tables.conductor_types.is_empty()),
            ("voltage levels", tables.voltage_levels.is_empty()),
            ("temperature media", tables.temperature_media.is_empty()),
            ("installation methods", tables.installation_methods.is_empty()),
            ("standard sections", tables.standard_sections.is_empty()),
            ("voltage drop limits", tables.drop_limits.is_empty()),
        ];
        if let Some((what, _)) = required.into_iter().find(|(_, empty)| *empty) {
            return Err(Error::Empty(what, origin.to_string()));
        }
        debug!(
            origin,
            methods = tables.ampacity_base.len(),
            sections = tables.standard_sections.len(),
            "loaded reference tables"
        );
        Ok(tables)
    }

    pub fn insulation(&self, label: &str) -> Option<&InsulationMeta> {
        self.insulation_meta.get(label)
    }

    /// Resolve a medium given either as its key or as a label in any language.
    pub fn medium_key(&self, value: &str) -> Option<&str> {
        let value = value.trim();
        self.temperature_media
            .iter()
            .find(|(key, labels)| *key == value || labels.values().any(|l| l == value))
            .map(|(key, _)| key.as_str())
    }

    /// Breaker ratings that parse as numbers, in table order.
    pub fn numeric_breaker_ratings(&self) -> Vec<(&str, f64)> {
        self.breaker_ratings
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.replace(',', ".").parse::<f64>().ok().map(|v| (s, v)))
            .collect()
    }

    /// Flatten every table into printable entries.
    pub fn entries(&self) -> Vec<TableEntry> {
        let mut out = Vec::new();
        let mut push = |table: &'static str, key: String, value: String| {
            out.push(TableEntry { table, key, value })
        };
        for label in &self.insulation_options {
            if let Some(meta) = self.insulation_meta.get(label) {
                push("insulation", label.clone(), format!("{} θ={}°C", meta.key, meta.theta));
            }
        }
        for conductor in &self.conductor_types {
            let rho = self.resistivity_20.get(conductor).map(|v| v.to_string());
            let alpha = self.temp_coeff.get(conductor).map(|v| v.to_string());
            push(
                "conductor",
                conductor.clone(),
                format!(
                    "ρ20={} α={}",
                    rho.unwrap_or_else(|| "—".into()),
                    alpha.unwrap_or_else(|| "—".into())
                ),
            );
        }
        for (key, labels) in &self.temperature_media {
            let labels = labels.values().cloned().collect::<Vec<_>>().join(" / ");
            push("medium", key.clone(), labels);
        }
        for (key, limit) in &self.drop_limits {
            push("drop-limit", key.clone(), format!("{limit}%"));
        }
        for (method, curve) in &self.ampacity_base {
            for (area, amps) in curve.points() {
                push("ampacity", format!("{method} {area} mm²"), format!("{amps} A"));
            }
        }
        for (insulation, per_conductor) in &self.insulation_factors {
            for (conductor, per_method) in per_conductor {
                for (method, factor) in per_method {
                    push(
                        "insulation-factor",
                        format!("{insulation} {conductor} {method}"),
                        factor.to_string(),
                    );
                }
            }
        }
        for (method, per_cores) in &self.loaded_factors {
            for (cores, factor) in per_cores {
                push("loaded-factor", format!("{method} nž={cores}"), factor.to_string());
            }
        }
        for (circuits, factor) in &self.grouping_factors {
            push("grouping", circuits.to_string(), factor.to_string());
        }
        for (name, tables) in [("kt-air", &self.kt_air), ("kt-soil", &self.kt_soil)] {
            for (insulation, curve) in tables {
                for (t, factor) in curve.points() {
                    push(name, format!("{insulation} {t}°C"), factor.to_string());
                }
            }
        }
        push("reactance", "default".into(), format!("{} Ω/km", self.reactance.default));
        for (method, x) in &self.reactance.method_defaults {
            push("reactance", method.clone(), format!("{x} Ω/km"));
        }
        for (method, buckets) in &self.reactance.buckets {
            for (bucket, x) in buckets {
                push("reactance", format!("{method} {bucket}"), format!("{x} Ω/km"));
            }
        }
        push("sections", "mm²".into(), self.standard_cross_sections.join(", "));
        push("voltages", "U".into(), self.voltage_levels.join(", "));
        push("breakers", "In".into(), self.breaker_ratings.join(", "));
        out
    }
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct TableEntry {
    pub table: &'static str,
    pub key: String,
    pub value: String,
}

impl TableEntry {
    pub fn is_match(&self, pattern: &str) -> bool {
        let pattern = pattern.to_uppercase();
        self.table.to_uppercase().contains(&pattern)
            || self.key.to_uppercase().contains(&pattern)
            || self.value.to_uppercase().contains(&pattern)
    }
}

/// Convert each inner map, dropping (with a warning) the ones that contain a malformed entry.
fn numeric_tables<K>(
    name: &'static str,
    raw: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    parse_key: impl Fn(&str) -> Option<K> + Copy,
) -> BTreeMap<String, Vec<(K, f64)>> {
    raw.into_iter()
        .filter_map(|(outer, inner)| match numeric_entries(inner, parse_key) {
            Ok(points) => Some((outer, points)),
            Err(entry) => {
                warn!(table = name, key = %outer, entry = %entry, "skipping malformed table");
                None
            }
        })
        .collect()
}

fn numeric_entries<K>(
    raw: BTreeMap<String, serde_json::Value>,
    parse_key: impl Fn(&str) -> Option<K>,
) -> Result<Vec<(K, f64)>, String> {
    raw.into_iter()
        .map(|(k, v)| {
            let value = match &v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match (parse_key(&k), value) {
                (Some(k), Some(v)) => Ok((k, v)),
                _ => Err(format!("{k}: {v}")),
            }
        })
        .collect()
}
