pub mod metrics_api;
