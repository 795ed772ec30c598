/// Data layer: core types, loading, filtering, paging and export.
///
/// Architecture:
/// ```text
///  MongoDB collection / .json / .csv / .parquet snapshot
///        │
///        ▼
///   ┌──────────┐      ┌───────┐
///   │  loader   │◄────│ cache │  TTL-bounded, replaced whole on refresh
///   └──────────┘      └───────┘
///        │  RawTable
///        ▼
///   ┌──────────┐
///   │  coerce   │  typed StreamerRecords, metrics default to 0
///   └──────────┘
///        │  StreamerDataset
///        ▼
///   ┌──────────┐
///   │  filter   │  search / status / verification / ranges → indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐      ┌───────────┐   ┌────────┐
///   │   view    │────►│ aggregate │   │ export │  CSV / XLSX / Parquet
///   └──────────┘      └───────────┘   └────────┘
/// ```

pub mod aggregate;
pub mod cache;
pub mod coerce;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod view;
