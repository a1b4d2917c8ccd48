//! Process-wide loader slot.
//!
//! One capability, one loader, one poll loop per process. Consumers that do
//! not carry a loader handle around reach it through [`loader`].

use once_cell::sync::OnceCell;

use crate::loader::ResourceLoader;

static LOADER: OnceCell<ResourceLoader> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("a process-wide resource loader is already installed")]
pub struct AlreadyInstalled;

/// Installs `loader` as the process-wide instance.
///
/// Only the first call wins; the loader passed to any later call is dropped.
pub fn install(loader: ResourceLoader) -> Result<&'static ResourceLoader, AlreadyInstalled> {
    let mut installed = false;
    let current = LOADER.get_or_init(|| {
        installed = true;
        loader
    });
    if installed {
        Ok(current)
    } else {
        Err(AlreadyInstalled)
    }
}

pub fn loader() -> Option<&'static ResourceLoader> {
    LOADER.get()
}
