use anyhow::Result;
use rust_xlsxwriter::Workbook;
use sheet_mind::table::{self, Cell, TableCache};
use std::path::Path;
use std::sync::Arc;

fn write_xlsx(path: &Path, rows: usize) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "nombre")?;
    sheet.write_string(0, 1, "peso")?;
    for r in 0..rows {
        sheet.write_string((r + 1) as u32, 0, format!("socio_{}", r))?;
        sheet.write_number((r + 1) as u32, 1, 60.0 + r as f64)?;
    }
    workbook.save(path)?;
    Ok(())
}

#[test]
fn xlsx_loads_with_header_and_typed_cells() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("datos.xlsx");
    write_xlsx(&path, 3)?;

    let table = table::load(&path, None)?;
    assert_eq!(table.columns, vec!["nombre", "peso"]);
    assert_eq!(table.shape(), (3, 2));
    assert_eq!(table.caption(), "Filas: 3 | Columnas: 2");
    assert_eq!(table.rows[0][0], Cell::Text("socio_0".into()));
    assert_eq!(table.rows[2][1], Cell::Float(62.0));
    Ok(())
}

#[test]
fn named_sheet_is_honored_and_unknown_sheet_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hojas.xlsx");
    let mut workbook = Workbook::new();
    let first = workbook.add_worksheet();
    first.set_name("Resumen")?;
    first.write_string(0, 0, "a")?;
    let second = workbook.add_worksheet();
    second.set_name("Datos")?;
    second.write_string(0, 0, "b")?;
    second.write_number(1, 0, 7.0)?;
    workbook.save(&path)?;

    let by_name = table::load(&path, Some("Datos"))?;
    assert_eq!(by_name.sheet.as_deref(), Some("Datos"));
    assert_eq!(by_name.columns, vec!["b"]);

    let first_by_default = table::load(&path, None)?;
    assert_eq!(first_by_default.sheet.as_deref(), Some("Resumen"));

    let err = table::load(&path, Some("NoExiste")).unwrap_err();
    assert!(err.to_string().contains("no existe la hoja 'NoExiste'"));
    Ok(())
}

#[test]
fn csv_loads_and_pads_ragged_rows() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("datos.csv");
    std::fs::write(&path, "nombre,edad,ciudad\nAna,31,Madrid\nLuis,28\n")?;

    let table = table::load(&path, None)?;
    assert_eq!(table.columns, vec!["nombre", "edad", "ciudad"]);
    assert_eq!(table.shape(), (2, 3));
    assert_eq!(table.rows[1][2], Cell::Empty);
    Ok(())
}

#[test]
fn missing_file_uses_the_original_notice() {
    let err = table::load(Path::new("/definitivamente/no/existe.xlsx"), None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Table error: No encuentro el archivo '/definitivamente/no/existe.xlsx'."
    );
}

#[test]
fn unreadable_workbook_surfaces_the_parse_notice() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("roto.xlsx");
    std::fs::write(&path, b"esto no es un xlsx")?;

    let err = table::load(&path, None).unwrap_err();
    assert!(err.to_string().contains("No se pudo leer el Excel:"));
    Ok(())
}

#[tokio::test]
async fn cache_serves_hits_until_the_bytes_change() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("datos.xlsx");
    write_xlsx(&path, 5)?;

    let cache = TableCache::new();
    let first = cache.fetch(&path, None).await?;
    let second = cache.fetch(&path, None).await?;

    // Same parse served twice
    assert!(Arc::ptr_eq(&first.table, &second.table));
    assert_eq!(first.fingerprint, second.fingerprint);
    let stats = cache.stats();
    assert_eq!(stats.parses, 1);
    assert_eq!(stats.hits, 1);

    // Any byte change forces a re-parse
    write_xlsx(&path, 6)?;
    let third = cache.fetch(&path, None).await?;
    assert!(!Arc::ptr_eq(&first.table, &third.table));
    assert_ne!(first.fingerprint, third.fingerprint);
    assert_eq!(third.table.shape(), (6, 2));
    assert_eq!(cache.stats().parses, 2);
    Ok(())
}

#[tokio::test]
async fn cache_misses_on_missing_files_without_counting_a_parse() {
    let cache = TableCache::new();
    let err = cache
        .fetch(Path::new("/definitivamente/no/existe.xlsx"), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No encuentro el archivo"));
    let stats = cache.stats();
    assert_eq!(stats.parses, 0);
    assert_eq!(stats.hits, 0);
}
