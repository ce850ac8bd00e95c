pub mod field_query;
pub mod label_queries;

pub use field_query::{bind_serial, select_column_names, zip_row, FieldQueryKind};
pub use label_queries::LabelTables;
