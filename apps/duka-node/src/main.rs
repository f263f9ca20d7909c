//! Duka node binary.
//!
//! ```text
//! duka-node [CONFIG_PATH]
//! ```

use std::path::PathBuf;

use tracing::error;

use duka_node::{init_tracing, run, NodeConfig};

#[tokio::main]
async fn main() {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match NodeConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = ?e, "Duka node failed");
        std::process::exit(1);
    }
}
