/*!
# thematic - numeric classification core

A library for classifying large sets of numeric attribute values into a small
number of ordered categories ("breaks"), and for maintaining a per-record cache
of derived rendering state (category index, selection, chunk) that stays
consistent with a mutable, externally-owned record collection.

## Example

```rust
use thematic::{ClassificationMethod, Scheme};

# fn main() -> thematic::Result<()> {
let values = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 20.0, 21.0, 22.0];

let mut scheme = Scheme::new(ClassificationMethod::NaturalBreaks);
scheme.settings.num_breaks = 3;
let report = scheme.create_categories(&values, None)?;

assert_eq!(scheme.categories.len(), 3);
assert!(!report.sampled);
# Ok(())
# }
```

## Architecture

Classification flows bottom-up:
- [`stats`] - single-pass sample statistics (diagnostics)
- [`breaks`] - two variance-minimizing partition optimizers: a local-search
  heuristic and an exact dynamic-programming solver
- [`range`] - numeric intervals with optional, inclusive/exclusive bounds
- [`scheme`] - orchestrates sampling, method dispatch, and category building
- [`cache`] - per-record `{category, selected, visible, chunk}` state with batched
  invalidation and lazily recomputed counts

Rendering, query-language evaluation, geometry, and persistence are external
collaborators; this crate only computes partitions and tracks derived state.
*/

pub mod breaks;
pub mod cache;
pub mod range;
pub mod scheme;
pub mod stats;

// Re-export key types for convenience
pub use breaks::BreakStrategy;
pub use cache::{CountFilter, RecordState, RenderStateCache};
pub use range::Range;
pub use scheme::{
    BuildReport, Category, ClassificationMethod, Scheme, SchemeSettings, SnapMethod,
};
pub use stats::Statistics;

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum ThematicError {
    /// A break optimizer was asked for fewer than two classes, or for more
    /// classes than there are values.
    #[error("invalid class count: requested {requested} classes for {available} values")]
    InvalidClassCount { requested: usize, available: usize },

    /// A range expression contained no parseable numeric tokens.
    #[error("malformed range expression: '{0}'")]
    MalformedRangeExpression(String),

    /// The owning record collection contained two entries that compare equal
    /// as cache keys. Record identity must be unique.
    #[error("duplicate record key at position {position}")]
    DuplicateRecordKey { position: usize },

    /// A cooperative cancellation flag was raised mid-computation.
    #[error("classification cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ThematicError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
