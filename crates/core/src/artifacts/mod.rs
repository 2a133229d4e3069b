mod parquet;

pub use parquet::*;
