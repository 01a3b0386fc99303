//! Utility functions and helpers

pub mod periodic;

pub use periodic::PeriodicTask;

use uuid::Uuid;

/// Generate a new UUID v4 as a string
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
