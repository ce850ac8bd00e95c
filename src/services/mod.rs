// Label lookup and printing services
pub mod label_data;
pub mod label_maker;
pub mod printer;

pub use label_data::{LabelDataService, LabelDataSettings};
pub use label_maker::{LabelMaker, PrintOutcome};
pub use printer::{printer_from_config, BarTenderPrinter, DryRunPrinter, LabelPrinter, PrintReceipt};
