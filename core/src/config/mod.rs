mod load;
mod types;

pub use load::{get_stackflow_data_dir, load_default};
pub use types::{AppConfig, LoggingConfig, RunConfig};
