//! Excel report of a project.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::i18n::Language;
use crate::project::{COLUMNS, Project, numeric_cell};

pub const SHEET_NAME: &str = "Proračuni";
const MIN_COLUMN_WIDTH: usize = 12;
const MAX_COLUMN_WIDTH: usize = 50;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the project has no rows to export")]
    NoRows,
    #[error("could not lay out the worksheet")]
    Layout(#[source] XlsxError),
    #[error("could not save the workbook to {1:?}")]
    Save(#[source] XlsxError, PathBuf),
}

struct Formats {
    title: Format,
    subtitle: Format,
    date: Format,
    note: Format,
    header: Format,
    cell: Format,
    legend_title: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            subtitle: Format::new().set_bold().set_font_size(11),
            date: Format::new().set_italic(),
            note: Format::new().set_text_wrap().set_font_size(9),
            header: Format::new()
                .set_bold()
                .set_background_color("E0E0E0")
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap(),
            cell: Format::new().set_border(FormatBorder::Thin),
            legend_title: Format::new().set_bold().set_font_size(11),
        }
    }
}

/// Write the project table to an `.xlsx` file: a titled header block, the rows with numbers
/// stored as numbers, and a legend explaining every column.
pub fn write_workbook(
    project: &Project,
    language: Language,
    date: jiff::civil::Date,
    path: &Path,
) -> Result<(), Error> {
    if project.is_empty() {
        return Err(Error::NoRows);
    }
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    fill_worksheet(worksheet, project, language, date).map_err(Error::Layout)?;
    workbook.save(path).map_err(|e| Error::Save(e, path.to_path_buf()))?;
    info!(path = %path.display(), rows = project.table.len(), "exported workbook");
    Ok(())
}

fn fill_worksheet(
    worksheet: &mut Worksheet,
    project: &Project,
    language: Language,
    date: jiff::civil::Date,
) -> Result<(), XlsxError> {
    let formats = Formats::new();
    let last_col = (COLUMNS.len() - 1) as u16;
    worksheet.set_name(SHEET_NAME)?;

    worksheet.merge_range(0, 0, 0, last_col, language.text("export.doc_title"), &formats.title)?;
    worksheet.merge_range(1, 0, 1, last_col, language.text("export.subtitle"), &formats.subtitle)?;
    worksheet.write_string_with_format(
        2,
        0,
        date.strftime("%d.%m.%Y").to_string(),
        &formats.date,
    )?;
    worksheet.merge_range(3, 0, 3, last_col, language.text("export.standard"), &formats.note)?;

    let header_row = 5;
    let mut widths = vec![MIN_COLUMN_WIDTH; COLUMNS.len()];
    let mut widen = |col: usize, text: &str| {
        let width = (text.chars().count() + 2).min(MAX_COLUMN_WIDTH);
        widths[col] = widths[col].max(width);
    };
    for (col, column) in COLUMNS.iter().enumerate() {
        let header = column.header(language);
        worksheet.write_string_with_format(header_row, col as u16, header, &formats.header)?;
        widen(col, header);
    }

    let mut row_num = header_row;
    for (_, row) in project.rows() {
        row_num += 1;
        for (col, cell) in row.cells().into_iter().enumerate() {
            let col_num = col as u16;
            match numeric_cell(cell) {
                Some(number) => {
                    worksheet.write_number_with_format(row_num, col_num, number, &formats.cell)?;
                    widen(col, &number.to_string());
                }
                None if cell.is_empty() => {
                    worksheet.write_blank(row_num, col_num, &formats.cell)?;
                }
                None => {
                    worksheet.write_string_with_format(row_num, col_num, cell, &formats.cell)?;
                    widen(col, cell);
                }
            }
        }
    }
    worksheet.autofilter(header_row, 0, row_num, last_col)?;
    worksheet.set_freeze_panes(header_row + 1, 0)?;

    row_num += 2;
    worksheet.write_string_with_format(
        row_num,
        0,
        language.text("export.legend_title"),
        &formats.legend_title,
    )?;
    for column in COLUMNS {
        let description = column.description(language);
        if description.is_empty() {
            continue;
        }
        row_num += 1;
        worksheet.write_string(row_num, 0, format!("{} — {description}", column.header(language)))?;
    }

    for (col, width) in widths.into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64)?;
    }
    Ok(())
}
