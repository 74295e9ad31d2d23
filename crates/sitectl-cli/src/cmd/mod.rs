pub mod audit;
pub mod config;
pub mod deploy;
pub mod history;
pub mod init;
pub mod plugin;
pub mod run;
pub mod shell;
pub mod status;
pub mod watch;

use anyhow::Context;
use sitectl_core::config::Config;
use std::path::Path;

pub(crate) fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config (run `sitectl init` first)")
}
