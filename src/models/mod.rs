pub mod row_set;

pub use row_set::*;
