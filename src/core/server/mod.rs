pub mod fabric;
pub mod forge;
pub mod installer;
pub mod scripts;

pub use installer::{InstallContext, Installer, ServerInstaller};
