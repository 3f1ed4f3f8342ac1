use std::fmt;

use log::{debug, info, warn};

/// Component-tagged front end to the `log` facade.
///
/// Every processor owns one; records carry the component name so a mixed
/// pipeline log can be filtered per block. Messages arrive as
/// `format_args!` and are only rendered when their level is enabled.
#[derive(Debug, Clone)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn record(&self, message: fmt::Arguments<'_>) {
        info!("[{}] {}", self.component, message);
    }

    pub fn trace_frame(&self, message: fmt::Arguments<'_>) {
        debug!("[{}] {}", self.component, message);
    }

    pub fn degraded(&self, message: fmt::Arguments<'_>) {
        warn!("[{}] {}", self.component, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("radarcore")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_component_tag() {
        let logger = LogManager::new("presence");
        assert_eq!(logger.component(), "presence");
        logger.record(format_args!("state change"));
        logger.trace_frame(format_args!("frame {}", 1));
        logger.degraded(format_args!("threshold clamped"));
        assert_eq!(LogManager::default().component(), "radarcore");
    }
}
