fn pair(language: crate::i18n::Language, key: &str, value: String) -> Vec<String> {
    vec![language.text(key).to_string(), value]
}

pub mod calc {
    use std::path::PathBuf;

    use super::pair;
    use crate::engine::{Engine, Evaluation};
    use crate::i18n::{DASH, Language};
    use crate::installation::Installation;
    use crate::project::{Project, Row};
    use crate::{config, engine, installation, output, project, tables};

    /// Check one cable segment: ampacity, voltage drop and overload protection.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        installation: installation::Args,
        /// Project file. Rows of the same circuit feeding this segment add to its total ΔU.
        #[arg(long)]
        project: Option<PathBuf>,
        /// Append the result to the project as a new row.
        #[arg(long, requires = "project")]
        add: bool,
        /// Recalculate the project row with this number, counting from 1. Installation flags
        /// that are given replace its values.
        #[arg(
            long,
            requires = "project",
            conflicts_with = "from_form",
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        from_row: Option<u32>,
        /// Start from the form saved in the project, e.g. a stored `select` result.
        #[arg(long, requires = "project")]
        from_form: bool,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not load the reference tables")]
        Tables(#[source] tables::Error),
        #[error("installation parameters are invalid")]
        Installation(#[source] installation::Error),
        #[error("could not evaluate the segment")]
        Engine(#[source] engine::Error),
        #[error("could not use the project")]
        Project(#[source] project::Error),
        #[error("the project at {0:?} has no saved form")]
        NoSavedForm(PathBuf),
        #[error("could not output the results")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    struct Record<'a> {
        installation: &'a Installation,
        evaluation: &'a Evaluation,
        #[serde(skip_serializing_if = "Option::is_none")]
        row: Option<usize>,
    }

    pub fn run(args: Args, config: config::Args) -> Result<(), Error> {
        let context = config.load().map_err(Error::Tables)?;
        let language = context.language;
        let mut project = match &args.project {
            Some(path) => Some(Project::open(path).map_err(Error::Project)?),
            None => None,
        };
        let base = match (&project, &args.project) {
            (Some(project), Some(path)) if args.from_form => {
                let form = project.form.clone();
                Some(form.ok_or_else(|| Error::NoSavedForm(path.clone()))?)
            }
            (Some(project), _) => args
                .from_row
                .map(|number| project.restore_row(number as usize - 1, &context.tables))
                .transpose()
                .map_err(Error::Project)?,
            _ => None,
        };
        let inst = match base {
            Some(base) => args.installation.apply_to(base, &context.tables),
            None => args.installation.into_installation(&context.tables),
        }
        .map_err(Error::Installation)?;
        let upstream = project.as_ref().map_or(0.0, |p| p.upstream_drop(&inst));
        let eval = Engine::new(&context.tables)
            .evaluate(&inst, upstream)
            .map_err(Error::Engine)?;

        let mut added = None;
        if let (true, Some(project), Some(path)) = (args.add, &mut project, &args.project) {
            project.add(Row::new(&inst, &eval, language));
            project.form = Some(inst.clone());
            project.save(path).map_err(Error::Project)?;
            added = project.last_row_number();
        }

        let mut output = args.output.to_output().map_err(Error::Output)?;
        output
            .table_headers(&[language.text("output.parameter"), language.text("output.value")])
            .map_err(Error::Output)?;
        output
            .results(
                || summary(&eval, language, added),
                || Record { installation: &inst, evaluation: &eval, row: added },
            )
            .map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }

    fn summary(eval: &Evaluation, language: Language, added: Option<usize>) -> Vec<Vec<String>> {
        let n = |value: f64, digits| language.number(value, digits);
        let o = |value: Option<f64>, digits| language.optional(value, digits);
        let mut rows = vec![
            pair(language, "column.pj", n(eval.demand_power, 2)),
            pair(language, "column.s", n(eval.grouping_factor, 2)),
            pair(language, "column.t", o(eval.temperature_factor, 2)),
            pair(language, "column.icalc", n(eval.design_current, 3)),
            pair(language, "output.per_cable", n(eval.current_per_cable, 3)),
            pair(language, "column.rbase", n(eval.resistance, 3)),
            pair(language, "output.reactance", n(eval.reactance, 3)),
            pair(language, "column.sigma", o(eval.conductivity, 2)),
            pair(language, "output.base_iz", o(eval.base_ampacity, 2)),
            pair(language, "column.iz", o(eval.ampacity, 2)),
            pair(language, "output.iz_total", o(eval.ampacity_total, 2)),
            pair(
                language,
                "output.breaker_window",
                eval.breaker_window(language).unwrap_or_else(|| DASH.to_string()),
            ),
            pair(language, "column.i2", o(eval.tripping_current, 2)),
            pair(language, "column.drop", n(eval.drop, 2)),
            pair(language, "column.total_drop", n(eval.total_drop, 2)),
            pair(language, "column.limit_drop", o(eval.drop_limit, 2)),
            pair(language, "column.ampacity", eval.by_current.to_string()),
            pair(language, "column.drop_status", eval.by_drop.to_string()),
            pair(language, "output.total_drop_status", eval.total_drop_status.to_string()),
            pair(language, "column.protection", eval.protection.to_string()),
            pair(language, "column.compatibility", eval.compliance.label(language).to_string()),
        ];
        for warning in &eval.warnings {
            rows.push(pair(language, "output.warning", warning.describe(language)));
        }
        for recommendation in &eval.recommendations {
            rows.push(pair(language, "output.recommendation", recommendation.describe(language)));
        }
        if let Some(row) = added {
            rows.push(pair(language, "output.added", row.to_string()));
        }
        rows
    }
}

pub mod select {
    use std::path::PathBuf;

    use tracing::info;

    use super::pair;
    use crate::engine::{Engine, Selection};
    use crate::i18n::Language;
    use crate::installation::Installation;
    use crate::project::Project;
    use crate::{config, engine, installation, output, project, tables};

    /// Find the smallest standard cross-section and breaker rating that pass every check.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        installation: installation::Args,
        /// Project file whose saved form receives the selected cross-section and breaker.
        #[arg(long)]
        project: Option<PathBuf>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not load the reference tables")]
        Tables(#[source] tables::Error),
        #[error("installation parameters are invalid")]
        Installation(#[source] installation::Error),
        #[error("could not select a cable and breaker")]
        Engine(#[source] engine::Error),
        #[error("no cable and breaker combinations could be evaluated")]
        NoCombinations,
        #[error("could not update the project")]
        Project(#[source] project::Error),
        #[error("could not output the results")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args, config: config::Args) -> Result<(), Error> {
        let context = config.load().map_err(Error::Tables)?;
        let language = context.language;
        let inst = args
            .installation
            .into_installation(&context.tables)
            .map_err(Error::Installation)?;
        let selection = Engine::new(&context.tables)
            .select_optimal(&inst)
            .map_err(Error::Engine)?;

        if let Selection::Found { area, breaker, .. } = &selection
            && let Some(path) = &args.project
        {
            let mut project = Project::open(path).map_err(Error::Project)?;
            project.form = Some(Installation {
                area: Some(*area),
                breaker: crate::i18n::parse_number(breaker),
                ..inst.clone()
            });
            project.save(path).map_err(Error::Project)?;
            info!(path = %path.display(), "stored the selection in the project form");
        }

        let rows = match &selection {
            Selection::NoCombinations => return Err(Error::NoCombinations),
            selection => rows(selection, language),
        };
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output
            .table_headers(&[language.text("output.parameter"), language.text("output.value")])
            .map_err(Error::Output)?;
        output.results(|| rows, || &selection).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }

    fn rows(selection: &Selection, language: Language) -> Vec<Vec<String>> {
        match selection {
            Selection::Found { area, breaker, ampacity_total, drop } => vec![
                pair(language, "column.area", language.area(*area)),
                pair(language, "column.in", breaker.clone()),
                pair(language, "output.iz_total", language.number(*ampacity_total, 2)),
                pair(language, "column.drop", language.number(*drop, 2)),
            ],
            Selection::NearMisses { candidates } => candidates
                .iter()
                .map(|c| pair(language, "output.candidate", c.describe(language)))
                .collect(),
            Selection::NoCombinations => Vec::new(),
        }
    }
}

pub mod tables {
    use crate::{config, output};

    /// Search and print the reference tables.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Only show entries whose table, key or value contains this text.
        filter: Option<String>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not load the reference tables")]
        Tables(#[source] crate::tables::Error),
        #[error("could not output the tables")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args, config: config::Args) -> Result<(), Error> {
        let context = config.load().map_err(Error::Tables)?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.table_headers(&["Table", "Key", "Value"]).map_err(Error::Output)?;
        for entry in context.tables.entries() {
            if args.filter.as_deref().is_some_and(|p| !entry.is_match(p)) {
                continue;
            }
            output
                .result(
                    || vec![entry.table.to_string(), entry.key.clone(), entry.value.clone()],
                    || &entry,
                )
                .map_err(Error::Output)?;
        }
        output.commit().map_err(Error::Output)
    }
}

pub mod project {
    use std::path::PathBuf;

    use tracing::info;

    use crate::project::{COLUMNS, Project};
    use crate::{config, export, output, tables};

    /// Inspect and maintain a project file.
    #[derive(clap::Subcommand)]
    pub enum Command {
        /// Print the rows of the project.
        Show(ShowArgs),
        /// Remove rows by their number, counting from 1.
        Remove(RemoveArgs),
        /// Remove every row.
        Clear(FileArgs),
        /// Write the rows to an Excel workbook.
        Export(ExportArgs),
    }

    #[derive(clap::Parser)]
    pub struct FileArgs {
        /// Project file.
        file: PathBuf,
    }

    #[derive(clap::Parser)]
    pub struct ShowArgs {
        #[clap(flatten)]
        project: FileArgs,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(clap::Parser)]
    pub struct RemoveArgs {
        #[clap(flatten)]
        project: FileArgs,
        /// Row numbers as printed by `project show`.
        #[arg(required = true, value_parser = clap::value_parser!(u32).range(1..))]
        rows: Vec<u32>,
    }

    #[derive(clap::Parser)]
    pub struct ExportArgs {
        #[clap(flatten)]
        project: FileArgs,
        /// Workbook to write.
        #[arg(long)]
        xlsx: PathBuf,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not load the reference tables")]
        Tables(#[source] tables::Error),
        #[error("project operation failed")]
        Project(#[source] crate::project::Error),
        #[error("could not export the project")]
        Export(#[source] export::Error),
        #[error("could not output the project")]
        Output(#[source] output::Error),
    }

    pub fn run(command: Command, config: config::Args) -> Result<(), Error> {
        let context = config.load().map_err(Error::Tables)?;
        let language = context.language;
        match command {
            Command::Show(args) => {
                let project = Project::load(&args.project.file).map_err(Error::Project)?;
                let mut output = args.output.to_output().map_err(Error::Output)?;
                let headers = std::iter::once("#")
                    .chain(COLUMNS.iter().map(|c| c.header(language)))
                    .collect::<Vec<_>>();
                output.table_headers(&headers).map_err(Error::Output)?;
                for (index, row) in project.rows() {
                    output
                        .result(
                            || {
                                std::iter::once((index + 1).to_string())
                                    .chain(row.cells().into_iter().map(str::to_string))
                                    .collect()
                            },
                            || row,
                        )
                        .map_err(Error::Output)?;
                }
                output.commit().map_err(Error::Output)
            }
            Command::Remove(args) => {
                let path = &args.project.file;
                let mut project = Project::load(path).map_err(Error::Project)?;
                let indices = args.rows.iter().map(|n| *n as usize - 1).collect::<Vec<_>>();
                project.remove(&indices).map_err(Error::Project)?;
                project.save(path).map_err(Error::Project)?;
                info!(removed = indices.len(), left = project.table.len(), "removed rows");
                Ok(())
            }
            Command::Clear(args) => {
                let mut project = Project::load(&args.file).map_err(Error::Project)?;
                project.clear();
                project.save(&args.file).map_err(Error::Project)
            }
            Command::Export(args) => {
                let project = Project::load(&args.project.file).map_err(Error::Project)?;
                let today = jiff::Zoned::now().date();
                export::write_workbook(&project, language, today, &args.xlsx)
                    .map_err(Error::Export)
            }
        }
    }
}
