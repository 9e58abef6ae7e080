//! Concrete adapters for the port traits.

pub mod csv_bar_adapter;
pub mod csv_event_adapter;
pub mod file_config_adapter;
pub mod snapshot;
pub mod text_report_adapter;
