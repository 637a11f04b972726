/// Data layer: loading, typing, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .xlsx
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  LoadSpec → RawTable (fixed columns, valid rows)
///   └──────────┘
///        │            ┌──────────┐
///        ├───────────▶│  store    │  cached per LoadSpec, mtime checked
///        ▼            └──────────┘
///   ┌───────────┐
///   │ normalize  │  RawTable → Dataset (categorical domains, int year)
///   └───────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ filter/pivot  │  selection + filters → PivotTable → export (CSV)
///   └──────────────┘
/// ```
///
/// `summary`, `incidence` and `mortality` compute the chart inputs of the
/// individual dashboard pages.

pub mod export;
pub mod filter;
pub mod incidence;
pub mod loader;
pub mod model;
pub mod mortality;
pub mod normalize;
pub mod pivot;
pub mod store;
pub mod summary;
