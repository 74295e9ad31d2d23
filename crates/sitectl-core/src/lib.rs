pub mod audit;
pub mod command;
pub mod config;
pub mod deploy;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod intent;
pub mod io;
pub mod paths;
pub mod plugins;
pub mod release;
pub mod theme;
pub mod transport;
pub mod watch;
pub mod wp;

pub use error::{Result, SiteError};
