//! `devServer` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `devServer` section - development server settings.
///
/// # Example
/// ```json
/// "devServer": { "interface": "0.0.0.0", "port": 3000 }
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServeConfig {
    /// Bind address; use `0.0.0.0` to reach the server from other machines.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Watch sources and rebuild while serving.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,
}
