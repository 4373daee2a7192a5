//! The calculation table: one row per evaluated segment, persisted as JSON.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::engine::Evaluation;
use crate::i18n::{DASH, Language, parse_number};
use crate::installation::Installation;
use crate::tables::{Tables, is_close};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read the project file at {1:?}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("the project file at {1:?} is not valid JSON")]
    Parse(#[source] serde_json::Error, PathBuf),
    #[error("could not serialize the project")]
    Serialize(#[source] serde_json::Error),
    #[error("could not write the project file at {1:?}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("row {0} does not exist, the project has {1} rows")]
    NoSuchRow(usize, usize),
}

/// A column of the calculation table.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// Key of the cell in the project file.
    pub key: &'static str,
    /// Translation key of the header.
    pub header: &'static str,
    /// Translation key of the legend entry.
    pub description: &'static str,
}

impl Column {
    pub fn header(&self, language: Language) -> &'static str {
        language.text(self.header)
    }

    pub fn description(&self, language: Language) -> &'static str {
        language.text(self.description)
    }
}

macro_rules! columns {
    ($($field:ident: $key:literal => $label:literal;)*) => {
        /// A formatted row of the calculation table. Every cell is text, the way it was displayed
        /// when the segment was added.
        #[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
        pub struct Row {
            $(#[serde(rename = $key)] pub $field: String,)*
        }

        pub const COLUMNS: &[Column] = &[$(Column {
            key: $key,
            header: concat!("column.", $label),
            description: concat!("desc.", $label),
        }),*];

        impl Row {
            /// Cells in column order.
            pub fn cells(&self) -> Vec<&str> {
                vec![$(self.$field.as_str()),*]
            }

            /// Missing cells become empty, non-string ones are printed.
            fn from_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
                Self {
                    $($field: object.get($key).map(cell_text).unwrap_or_default(),)*
                }
            }
        }
    };
}

columns! {
    circuit: "Strujni krug" => "circuit";
    from: "OD" => "from";
    to: "DO" => "to";
    insulation: "E" => "insulation";
    conductor: "F" => "conductor";
    cable: "G" => "cable";
    loaded_cores: "nž" => "cores";
    parallel: "n∥" => "n_parallel";
    circuits: "Кабелей в группе (S)" => "group_for_s";
    power: "Pi" => "pi";
    demand_factor: "Kj" => "kj";
    efficiency: "η" => "eta";
    demand_power: "Pj" => "pj";
    voltage: "U" => "voltage";
    cos_phi: "cosφ" => "cos";
    length: "L" => "length";
    area: "Presek" => "area";
    method: "Način polaganja" => "installation";
    grouping_factor: "S" => "s";
    temperature_factor: "T" => "t";
    breaker: "In [A]" => "in";
    tripping_factor: "k" => "k";
    tripping_current: "I2 [A]" => "i2";
    design_current: "Icalc [A]" => "icalc";
    resistance: "R_base [Ω/km]" => "rbase";
    conductivity: "ϭ" => "sigma";
    ampacity: "Iz [A]" => "iz";
    drop: "ΔU %" => "drop";
    total_drop: "Ukupni ΔU %" => "total_drop";
    drop_limit: "Limit ΔU %" => "limit_drop";
    by_current: "По току" => "ampacity";
    by_drop: "По ΔU" => "drop_status";
    protection: "Защита" => "protection";
    drop_key: "Ключ" => "key";
    compliance: "Совместимость IEC" => "compatibility";
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Row {
    pub fn new(inst: &Installation, eval: &Evaluation, language: Language) -> Self {
        let n = |value: f64, digits| language.number(value, digits);
        let blank = |value: Option<f64>| value.map(|v| n(v, 2)).unwrap_or_default();
        Self {
            circuit: inst.circuit.clone(),
            from: inst.from.clone(),
            to: inst.to.clone(),
            insulation: inst.insulation.clone(),
            conductor: inst.conductor.clone(),
            cable: inst.cable.clone(),
            loaded_cores: inst.loaded_cores.to_string(),
            parallel: inst.parallel.to_string(),
            circuits: inst.circuits.to_string(),
            power: n(inst.power, 2),
            demand_factor: n(inst.demand_factor, 2),
            efficiency: n(inst.efficiency, 3),
            demand_power: n(eval.demand_power, 2),
            voltage: inst.voltage.to_string(),
            cos_phi: n(inst.cos_phi, 3),
            length: n(inst.length, 2),
            area: language.optional(inst.area, 2),
            method: inst.method.clone(),
            grouping_factor: n(eval.grouping_factor, 2),
            temperature_factor: n(eval.temperature_factor.unwrap_or(1.0), 2),
            breaker: blank(inst.breaker),
            tripping_factor: blank(inst.tripping_factor),
            tripping_current: blank(eval.tripping_current),
            design_current: n(eval.design_current, 3),
            resistance: n(eval.resistance, 3),
            conductivity: language.optional(eval.conductivity, 2),
            ampacity: language.optional(eval.ampacity, 2),
            drop: n(eval.drop, 2),
            total_drop: n(eval.total_drop, 2),
            drop_limit: n(eval.drop_limit.unwrap_or(0.0), 2),
            by_current: eval.by_current.to_string(),
            by_drop: eval.by_drop.to_string(),
            protection: eval.protection.to_string(),
            drop_key: inst.drop_key.clone(),
            compliance: eval.compliance.label(language).to_string(),
        }
    }

    /// Lay the inputs saved in this row over `base`. Empty or unreadable cells keep the value
    /// of `base`, and so does an insulation the tables do not list. Blank breaker and tripping
    /// factor cells mean the segment had none.
    pub fn restore(&self, base: Installation, tables: &Tables) -> Installation {
        let text = |cell: &str, base: String| match cell.trim() {
            "" => base,
            cell => cell.to_string(),
        };
        let number = |cell: &str, base: f64| numeric_cell(cell).unwrap_or(base);
        let count = |cell: &str, base: u32| cell.trim().parse().unwrap_or(base);
        let insulation = match tables.insulation(self.insulation.trim()) {
            Some(_) => self.insulation.trim().to_string(),
            None => base.insulation,
        };
        Installation {
            circuit: text(&self.circuit, base.circuit),
            from: text(&self.from, base.from),
            to: text(&self.to, base.to),
            insulation,
            conductor: text(&self.conductor, base.conductor),
            cable: text(&self.cable, base.cable),
            power: number(&self.power, base.power),
            demand_factor: number(&self.demand_factor, base.demand_factor),
            efficiency: number(&self.efficiency, base.efficiency),
            voltage: count(&self.voltage, base.voltage),
            cos_phi: number(&self.cos_phi, base.cos_phi),
            length: number(&self.length, base.length),
            area: numeric_cell(&self.area).or(base.area),
            method: text(&self.method, base.method),
            loaded_cores: self.loaded_cores.trim().parse().unwrap_or(base.loaded_cores),
            circuits: count(&self.circuits, base.circuits),
            parallel: count(&self.parallel, base.parallel),
            breaker: numeric_cell(&self.breaker),
            tripping_factor: numeric_cell(&self.tripping_factor),
            drop_key: text(&self.drop_key, base.drop_key),
            ..base
        }
    }

    /// Whether this row records the same segment as `inst`.
    fn is_segment(&self, inst: &Installation) -> bool {
        let same_number = |cell: &str, value: Option<f64>| match (parse_number(cell), value) {
            (Some(a), Some(b)) => is_close(a, b),
            (None, None) => true,
            _ => false,
        };
        self.from.trim() == inst.from
            && self.to.trim() == inst.to
            && same_number(&self.length, Some(inst.length))
            && same_number(&self.area, inst.area)
    }
}

#[derive(serde::Deserialize)]
struct RawProject {
    #[serde(default)]
    form: Option<serde_json::Value>,
    #[serde(default)]
    table: Vec<serde_json::Value>,
}

/// Saved calculation rows together with the last form that was calculated.
#[derive(serde::Serialize, Clone, Debug, Default)]
pub struct Project {
    pub form: Option<Installation>,
    pub table: Vec<Row>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text =
            std::fs::read_to_string(path).map_err(|e| Error::Read(e, path.to_path_buf()))?;
        let project = Self::from_json(&text).map_err(|e| Error::Parse(e, path.to_path_buf()))?;
        info!(path = %path.display(), rows = project.table.len(), "loaded project");
        Ok(project)
    }

    /// Like [`Self::load`], but a missing file is an empty project.
    pub fn open(path: &Path) -> Result<Self, Error> {
        match Self::load(path) {
            Err(Error::Read(e, _)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "project does not exist yet");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawProject = serde_json::from_str(text)?;
        let form = raw.form.and_then(|form| match serde_json::from_value(form) {
            Ok(form) => Some(form),
            Err(error) => {
                warn!(%error, "ignoring the saved form");
                None
            }
        });
        let table = raw
            .table
            .iter()
            .filter_map(|row| match row.as_object() {
                Some(object) => Some(Row::from_object(object)),
                None => {
                    warn!(%row, "skipping a table row that is not an object");
                    None
                }
            })
            .collect();
        Ok(Self { form, table })
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let mut text = serde_json::to_string_pretty(self).map_err(Error::Serialize)?;
        text.push('\n');
        std::fs::write(path, text).map_err(|e| Error::Write(e, path.to_path_buf()))?;
        info!(path = %path.display(), rows = self.table.len(), "saved project");
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn add(&mut self, row: Row) {
        self.table.push(row);
    }

    /// Remove rows by their zero-based position. Nothing is removed if any index is out of range.
    pub fn remove(&mut self, indices: &[usize]) -> Result<(), Error> {
        if let Some(&bad) = indices.iter().find(|i| **i >= self.table.len()) {
            return Err(Error::NoSuchRow(bad + 1, self.table.len()));
        }
        let doomed = indices.iter().copied().collect::<HashSet<_>>();
        let mut index = 0;
        self.table.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Voltage drop accumulated along the rows of the same circuit that lead into the start
    /// node of `inst`.
    ///
    /// Starting at `inst.from`, the row of the circuit ending at the current node is followed
    /// back to its own start until no row leads further. A row for `inst` itself is not counted,
    /// so recalculating an added segment does not double its drop. Branches that do not continue
    /// an existing run contribute nothing.
    pub fn upstream_drop(&self, inst: &Installation) -> f64 {
        let circuit = inst.circuit.trim();
        let mut current = inst.from.trim();
        if circuit.is_empty() || current.is_empty() {
            return 0.0;
        }
        let mut visited = HashSet::new();
        let mut total = 0.0;
        while !current.is_empty() && visited.insert(current) {
            let found = self.table.iter().find(|row| {
                row.circuit.trim() == circuit && row.to.trim() == current && !row.is_segment(inst)
            });
            let Some(row) = found else { break };
            total += parse_number(&row.drop).unwrap_or(0.0);
            current = row.from.trim();
        }
        total
    }

    /// The installation of the row at zero-based `index`, laid over the saved form.
    pub fn restore_row(&self, index: usize, tables: &Tables) -> Result<Installation, Error> {
        let row = self
            .table
            .get(index)
            .ok_or(Error::NoSuchRow(index + 1, self.table.len()))?;
        let base = self
            .form
            .clone()
            .unwrap_or_else(|| Installation::with_table_defaults(tables));
        debug!(row = index + 1, from_form = self.form.is_some(), "restoring a saved row");
        Ok(row.restore(base, tables))
    }

    pub fn rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.table.iter().enumerate()
    }

    /// Number of the last row, if the project has one. Shown to users counting from one.
    pub fn last_row_number(&self) -> Option<usize> {
        self.table.len().checked_sub(1).map(|i| i + 1)
    }
}

/// Cells that render as a dash or are empty carry no number.
pub fn numeric_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed == DASH {
        return None;
    }
    parse_number(trimmed)
}
