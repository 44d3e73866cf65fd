//! Prints the configured spreadsheet's shape and first rows. No credentials
//! involved; handy for checking what the agent will see.

use anyhow::Result;
use clap::Parser;
use sheet_mind::config::Config;
use sheet_mind::table;
use std::path::Path;

#[derive(Parser)]
#[command(name = "sheetpeek")]
#[command(about = "Muestra la forma y las primeras filas de la hoja configurada")]
#[command(long_about = None)]
struct Cli {
    /// Spreadsheet path (defaults to the configured one)
    #[arg(long)]
    file: Option<String>,

    /// Worksheet name
    #[arg(long)]
    sheet: Option<String>,

    /// Rows to print
    #[arg(long, default_value_t = 10)]
    rows: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    sheet_mind::load_env();

    let config = Config::load()?;
    let path = cli.file.unwrap_or(config.table.path);
    let sheet = cli.sheet.or(config.table.sheet);

    let table = table::load(Path::new(&path), sheet.as_deref())?;
    println!("{}", table.caption());
    print!("{}", table.render_head(cli.rows));
    Ok(())
}
