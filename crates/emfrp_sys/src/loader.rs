use std::fmt;
use std::path::{Path, PathBuf};

use libloading::Library;
use thiserror::Error;
use tracing::{debug, info};

use crate::abi::{EngineAbi, SYMBOL_NAMES};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load engine library {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("engine library {} does not export `{symbol}`", path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// An [`EngineAbi`] together with whatever keeps its code mapped.
pub struct EngineLibrary {
    abi: EngineAbi,
    origin: String,
    // Never read; dropping it would unmap every pointer in `abi`.
    _library: Option<Library>,
}

impl EngineLibrary {
    /// Opens a shared library and resolves every symbol of the ABI table.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        debug!(path = %path.display(), "opening engine library");
        // SAFETY: loading runs the library's initialisers; the engine library is
        // trusted to be a plain C library without load-time side effects.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let [
            create,
            repl,
            add_input_node,
            add_output_node,
            set_node_value,
            update,
            create_int_object,
            get_integer,
            format_object,
            print_object,
        ] = SYMBOL_NAMES;

        // SAFETY: each symbol is resolved with the signature declared in `emfrp.h`.
        let abi = unsafe {
            EngineAbi {
                create: resolve(&library, path, create)?,
                repl: resolve(&library, path, repl)?,
                add_input_node: resolve(&library, path, add_input_node)?,
                add_output_node: resolve(&library, path, add_output_node)?,
                set_node_value: resolve(&library, path, set_node_value)?,
                update: resolve(&library, path, update)?,
                create_int_object: resolve(&library, path, create_int_object)?,
                get_integer: resolve(&library, path, get_integer)?,
                format_object: resolve(&library, path, format_object)?,
                print_object: resolve(&library, path, print_object)?,
            }
        };

        info!(path = %path.display(), "engine library loaded");
        Ok(Self {
            abi,
            origin: path.display().to_string(),
            _library: Some(library),
        })
    }

    /// Wraps a table whose functions are linked into the current executable.
    pub fn from_static(abi: EngineAbi, origin: impl Into<String>) -> Self {
        Self {
            abi,
            origin: origin.into(),
            _library: None,
        }
    }

    pub const fn abi(&self) -> &EngineAbi {
        &self.abi
    }

    /// Where the table came from: a library path or a static label.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl fmt::Debug for EngineLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLibrary")
            .field("origin", &self.origin)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

unsafe fn resolve<T: Copy>(library: &Library, path: &Path, symbol: &'static str) -> Result<T, LoadError> {
    // SAFETY: forwarded from the caller, which names `T` after the C prototype.
    let resolved = unsafe { library.get::<T>(symbol.as_bytes()) };
    resolved
        .map(|symbol| *symbol)
        .map_err(|source| LoadError::MissingSymbol {
            path: path.to_path_buf(),
            symbol,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::{EngineLibrary, LoadError};
    use std::path::Path;

    #[test]
    fn missing_library_reports_path() {
        let err = EngineLibrary::load(Path::new("/nonexistent/libemfrp-repl.so"))
            .expect_err("library should not exist");
        match &err {
            LoadError::Open { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/libemfrp-repl.so"));
            }
            other => panic!("expected open failure, got {other:?}"),
        }
        assert!(err.to_string().contains("libemfrp-repl.so"));
    }
}
