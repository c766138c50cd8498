pub mod loader;
pub mod schema;

pub use loader::{get_boascontas_home, get_config_path, load_config, resolve_path, save_config};
pub use schema::{Config, GatewayConfig, InterpreterConfig, LedgerConfig};
