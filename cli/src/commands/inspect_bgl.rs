//! `inspect-bgl`: prints a BGL's top-level record table, in the spirit
//! of a GR2-style section inspector — one line per record type, its
//! subrecord count, and its declared byte size.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use scenery_core::bgl::BgWalker;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    println!("=== BGL record table ===\n");
    println!("file: {}\n", path.display());

    let file = File::open(path)?;
    let mut walker = BgWalker::open(BufReader::new(file))?;
    let rows = walker.record_table_summary()?;

    println!("{} top-level records\n", rows.len());
    for row in &rows {
        println!(
            "type 0x{:04x}  subrecords {:>6}  size {:>10} bytes",
            row.record_type, row.subrecord_count, row.record_size
        );
    }

    Ok(())
}
