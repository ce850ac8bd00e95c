// Label domain models
pub mod field_value;
pub mod label_template;
pub mod model_id;
pub mod production_line;
pub mod serial_number;

pub use field_value::{FieldSet, FieldValue};
pub use label_template::LabelTemplate;
pub use model_id::ModelId;
pub use production_line::{LineCredentials, LineDbKey, ProductionLine};
pub use serial_number::SerialNumber;

use serde::Serialize;

/// Everything resolved for one serial number on one production line
#[derive(Debug, Clone, Serialize)]
pub struct FieldData {
    pub model_id: ModelId,
    /// Values shown to the operator
    pub display: FieldSet,
    /// Values written to the label template's CSV data source
    pub label: FieldSet,
}
