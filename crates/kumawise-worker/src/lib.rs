//! Queue worker for the kumawise bridge

pub mod metrics_server;
