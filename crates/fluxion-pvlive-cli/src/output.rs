// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Terminal and CSV output for query results

use anyhow::{Context, Result};
use comfy_table::{Attribute, Cell, Table, presets::UTF8_FULL};
use fluxion_pvlive::Table as ResultTable;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

/// Decimal places for floats written to CSV
pub const CSV_FLOAT_PRECISION: usize = 3;

/// Format a result table for the terminal
pub fn format_table(result: &ResultTable) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        result
            .column_names()
            .into_iter()
            .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
    );

    for row in 0..result.num_rows() {
        table.add_row(result.row(row, None));
    }

    table.to_string()
}

pub fn write_csv(result: &ResultTable, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    result
        .write_csv(BufWriter::new(file), Some(CSV_FLOAT_PRECISION))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Ask before overwriting an existing output file. Returns false to abort.
pub fn confirm_overwrite(
    path: &Path,
    input: &mut impl BufRead,
    prompt: &mut impl Write,
) -> Result<bool> {
    write!(
        prompt,
        "The output file '{}' already exists and will be overwritten, are you sure you want to \
         continue? Press enter to continue or type 'n' to abort. ",
        path.display()
    )?;
    prompt.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    let answer = answer.trim().to_ascii_lowercase();
    Ok(!matches!(answer.as_str(), "n" | "no"))
}
