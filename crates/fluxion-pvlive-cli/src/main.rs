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

//! `pvlive` - print or save PV_Live generation estimates

mod args;
mod output;

use anyhow::{Context, Result};
use args::Cli;
use chrono::Utc;
use clap::Parser;
use fluxion_pvlive::validation::parse_extra_fields;
use fluxion_pvlive::{EntityRef, PvLive, Query};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    if let Some(path) = &cli.outfile
        && path.exists()
        && !cli.quiet
    {
        let stdin = std::io::stdin();
        if !output::confirm_overwrite(path, &mut stdin.lock(), &mut std::io::stdout())? {
            println!("Aborting...");
            return Ok(());
        }
    }

    let config = cli.to_config().context("Invalid configuration")?;
    let extra_fields = parse_extra_fields(&cli.extra_fields)?;
    let query = Query::new(EntityRef::new(cli.entity_type, cli.entity_id))
        .with_extra_fields(extra_fields)
        .with_period(cli.period)
        .as_table();
    debug!("Query: {:?}", query);

    let pv = PvLive::connect(&config).context("Failed to connect to the PV_Live API")?;
    let result = match cli.interval(Utc::now()) {
        None => pv.latest(&query)?,
        Some((start, end)) => {
            info!("Fetching {} from {} to {}", query.entity, start, end);
            pv.between(start, end, &query)?
        }
    };
    let table = result
        .into_table()
        .context("PV_Live query did not produce a table")?;

    if let Some(path) = &cli.outfile {
        output::write_csv(&table, path)?;
        info!("✅ Wrote {} rows to {}", table.num_rows(), path.display());
    }
    if !cli.quiet {
        println!("{}", output::format_table(&table));
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}
