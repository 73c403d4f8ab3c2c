pub use tubegrab_core::models::{media, settings};
