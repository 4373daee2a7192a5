use std::path::PathBuf;

use crate::i18n::Language;
use crate::tables::{self, Tables};

/// Where the reference data comes from and how results are presented.
#[derive(clap::Parser, Clone, Debug)]
#[group(id = "config::Args")]
pub struct Args {
    /// Reference tables to use instead of the built-in IEC 60364-5-52 data.
    #[arg(long, global = true, env = "CABLE_CALC_TABLES")]
    tables: Option<PathBuf>,
    /// Language of headers, statuses and decimal separators.
    #[arg(long, short = 'l', global = true, env = "CABLE_CALC_LANG", value_enum, default_value_t)]
    language: Language,
}

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub tables: Tables,
    pub language: Language,
}

impl Args {
    pub fn load(self) -> Result<Context, tables::Error> {
        let tables = Tables::load_or_embedded(self.tables.as_deref())?;
        Ok(Context { tables, language: self.language })
    }
}
