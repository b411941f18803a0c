pub mod header;
pub mod stock_results;
pub mod task_status;
pub mod theme_toggle;
pub mod upload_section;
pub mod utils;
pub mod waste_results;
