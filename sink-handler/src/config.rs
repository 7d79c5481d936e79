use sink_config::load_config;
use sink_config::shared::HandlerConfig;

use crate::error::{HandlerError, HandlerResult};

/// Loads and validates the handler configuration.
pub fn load_handler_config() -> HandlerResult<HandlerConfig> {
    let config = load_config::<HandlerConfig>().map_err(HandlerError::config)?;
    config.validate().map_err(HandlerError::config)?;

    Ok(config)
}
