pub mod config;
pub mod presenter;
pub mod types;

use anyhow::Result;

pub use presenter::Emitter;
pub use types::{Envelope, Meta};

use crate::telemetry::config::json_mode;

/// Writes one envelope to stdout using the configured presenter.
pub fn emit(env: &Envelope) -> Result<()> {
    let cfg = config::OutputConfig::from_env().with_json_flag(json_mode());
    Emitter::new(cfg).emit(env)?;
    Ok(())
}
