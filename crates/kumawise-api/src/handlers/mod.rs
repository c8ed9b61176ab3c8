mod exporter;
mod health;
mod webhook;

pub use exporter::*;
pub use health::*;
pub use webhook::*;
