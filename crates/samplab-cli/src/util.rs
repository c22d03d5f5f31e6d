use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    num::NonZeroUsize,
    path::Path,
};

use anyhow::Context;
use serde::Serialize;

use crate::schema::star_catalog::StarCatalog;

/// Writes `report` as pretty JSON to `output`, or to stdout when no path is given.
pub fn write_report<T>(report: &T, output: Option<&Path>) -> anyhow::Result<()>
where
    T: Serialize,
{
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_json(BufWriter::new(file), report)
                .with_context(|| format!("Failed to write report to {}", path.display()))
        }
        None => write_json(io::stdout().lock(), report).context("Failed to write report to stdout"),
    }
}

fn write_json<W, T>(mut writer: W, value: &T) -> anyhow::Result<()>
where
    W: Write,
    T: Serialize,
{
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads a star catalog (`{ stars: [{x, y, mag}], population: {n, mean, std} }`) from a JSON file.
pub fn read_star_catalog_file(path: &Path) -> anyhow::Result<StarCatalog> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open star catalog file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse star catalog JSON file: {}", path.display()))
}

/// Number of worker threads to use when none is requested.
pub fn default_workers() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}
