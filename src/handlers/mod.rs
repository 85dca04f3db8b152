mod metrics;
mod throttle;

pub use metrics::metrics_handler;
pub use throttle::throttle_handler;
