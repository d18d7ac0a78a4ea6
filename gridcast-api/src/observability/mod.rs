// Module: observability
// Prometheus metrics and the middleware that feeds them

pub mod metrics;
