pub(crate) mod batches;
pub(crate) mod bucket_batch;
pub(crate) mod cache;
pub(crate) mod common;
pub(crate) mod joins;
pub(crate) mod lookup;
pub(crate) mod shuffle;

// Only re-export public items; the rest are extension methods on `DataPipe`
pub use batches::{SortKey, sort_by_key};
pub use bucket_batch::BucketBatcher;
pub use joins::{JoinKey, KeyFn, KeyZipper, MergeFn, key_fn};
pub use lookup::{Lookup, MapZipper};
