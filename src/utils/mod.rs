pub mod collections;
pub mod error;

pub use collections::{
    SignalList, clean_identifier, normalize_full_name, re, sorted_unique, split_name,
    split_schema_and_base, unique_ordered,
};
pub use error::{ApiError, ApiResult};
