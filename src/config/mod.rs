//! Project settings loaded from `.kapsul.toml`.

pub mod settings;

pub use settings::Settings;
