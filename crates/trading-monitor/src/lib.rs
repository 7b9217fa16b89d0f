//! Logging and operator alerting.

mod alerts;
mod logging;

pub use alerts::{Alert, AlertSink, LogAlertSink, WebhookAlertSink};
pub use logging::{setup_logging, LogFormat};
