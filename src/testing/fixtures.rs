//! Pre-built schemas, records and filesystems for tests.

use crate::fragment::{BlockLocation, SourceFile};
use crate::fs::InMemoryFileSystem;
use crate::record::{FieldType, Record, Schema};

/// Schema of [`sample_sales_records`].
///
/// ```
/// use directio::testing::sample_sales_schema;
///
/// assert_eq!(sample_sales_schema().fields().len(), 5);
/// ```
#[must_use]
pub fn sample_sales_schema() -> Schema {
    Schema::new()
        .field("id", FieldType::Int)
        .field("region", FieldType::Text)
        .field("year", FieldType::Int)
        .field("amount", FieldType::Float)
        .field("payload", FieldType::Bytes)
}

/// Ten sales records over three regions and two years. Ids follow arrival
/// order, and several records tie on `(region, amount)`.
#[must_use]
pub fn sample_sales_records() -> Vec<Record> {
    let rows: [(i64, &str, i64, f64); 10] = [
        (1, "east", 2023, 120.0),
        (2, "west", 2024, 80.5),
        (3, "east", 2024, 120.0),
        (4, "north", 2023, 15.25),
        (5, "west", 2024, 80.5),
        (6, "east", 2023, 99.0),
        (7, "north", 2024, 300.0),
        (8, "east", 2024, 120.0),
        (9, "west", 2023, 7.0),
        (10, "north", 2023, 15.25),
    ];
    rows.into_iter()
        .map(|(id, region, year, amount)| {
            Record::new()
                .with("id", id)
                .with("region", region)
                .with("year", year)
                .with("amount", amount)
                .with("payload", vec![u8::try_from(id).unwrap_or(u8::MAX)])
        })
        .collect()
}

/// Files under `warehouse/` with a mix of text and columnar layouts.
///
/// - `warehouse/sales/2023.csv`: 300 bytes, two 150-byte blocks
/// - `warehouse/sales/2024.csv`: 0 bytes
/// - `warehouse/sales/archive/2022.csv`: 40 bytes
/// - `warehouse/stripes/part-0.orc`: 1000 bytes, stripes every 100 bytes
/// - `warehouse/other.txt`: 10 bytes
#[must_use]
pub fn sample_filesystem() -> InMemoryFileSystem {
    InMemoryFileSystem::new()
        .with_source(SourceFile::new("warehouse/sales/2023.csv", 300).with_blocks(vec![
            BlockLocation::new(0, 150, ["node-a", "node-b"]),
            BlockLocation::new(150, 300, ["node-b", "node-c"]),
        ]))
        .with_file("warehouse/sales/2024.csv", 0)
        .with_file("warehouse/sales/archive/2022.csv", 40)
        .with_source(
            SourceFile::new("warehouse/stripes/part-0.orc", 1000)
                .with_boundaries((1..10).map(|i| i * 100).collect()),
        )
        .with_file("warehouse/other.txt", 10)
}
