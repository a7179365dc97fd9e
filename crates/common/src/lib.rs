// gateboot-common: config document model and the environment overlay.

pub mod document;
pub mod env;
pub mod overlay;
pub mod provider;
