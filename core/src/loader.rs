use std::path::{Path, PathBuf};
use std::time::Instant;

use derive_more::Display;
use libloading::{Library, Symbol};
use lijy_api::c::{CreateJavaVmFn, GetDefaultJavaVmInitArgsFn};
use thiserror::Error;
use tracing::debug;

use crate::runtime::variant::Resolution;

const LIBRARY_STEM: &str = "jvm";

/// The runtime library and the two exports needed to start it.
///
/// The library is leaked: it stays mapped until the process exits.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeHandle {
    _library: &'static Library,
    pub create_vm: CreateJavaVmFn,
    pub default_init_args: GetDefaultJavaVmInitArgsFn,
}

impl RuntimeHandle {
    /// Loads the runtime library for `resolution`, trying each candidate path in turn.
    pub fn load(runtime_home: &Path, arch: &str, resolution: &Resolution) -> Result<Self, LoaderError> {
        let candidates = library_candidates(runtime_home, arch, resolution);
        let path = candidates
            .iter()
            .find(|path| path.is_file())
            .ok_or_else(|| LoaderError::NotFound(candidates.first().cloned().unwrap_or_default()))?;
        unsafe { Self::load_library(path) }
    }

    /// # Safety
    /// `path` must name a JNI runtime library; its initializers run on load.
    pub unsafe fn load_library(path: &Path) -> Result<Self, LoaderError> {
        let start = Instant::now();
        let library = unsafe { Library::new(path) }.map_err(|err| LoaderError::Load(path.to_path_buf(), err))?;
        let create_vm = unsafe { resolve::<CreateJavaVmFn>(&library, b"JNI_CreateJavaVM\0", path)? };
        let default_init_args =
            unsafe { resolve::<GetDefaultJavaVmInitArgsFn>(&library, b"JNI_GetDefaultJavaVMInitArgs\0", path)? };
        debug!(path = %path.display(), elapsed_us = start.elapsed().as_micros(), "loaded runtime library");
        Ok(Self {
            _library: Box::leak(Box::new(library)),
            create_vm,
            default_init_args,
        })
    }
}

unsafe fn resolve<T: Copy>(library: &Library, symbol: &'static [u8], path: &Path) -> Result<T, LoaderError> {
    let export: Symbol<'_, T> = unsafe { library.get(symbol) }.map_err(|err| LoaderError::MissingEntryPoint {
        path: path.to_path_buf(),
        symbol: String::from_utf8_lossy(symbol.strip_suffix(b"\0").unwrap_or(symbol)).into_owned(),
        source: err,
    })?;
    Ok(*export)
}

/// Where the library for `resolution` may live, most specific first.
pub fn library_candidates(runtime_home: &Path, arch: &str, resolution: &Resolution) -> Vec<PathBuf> {
    let file = libloading::library_filename(LIBRARY_STEM);
    match resolution {
        Resolution::Alternate(name) if name.contains(['/', '\\']) => vec![Path::new(name).join(&file)],
        Resolution::Alternate(name) | Resolution::Variant(name) => {
            let lib = runtime_home.join("lib");
            vec![lib.join(arch).join(name).join(&file), lib.join(name).join(&file)]
        }
        Resolution::Error => Vec::new(),
    }
}

#[derive(Error, Debug, Display)]
pub enum LoaderError {
    #[display("missing JVM at `{}'", _0.display())]
    NotFound(PathBuf),
    #[display("could not load `{}': {_1}", _0.display())]
    Load(PathBuf, #[source] libloading::Error),
    #[display("`{}' does not export {symbol}", path.display())]
    MissingEntryPoint {
        path: PathBuf,
        symbol: String,
        source: libloading::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_prefer_arch_directory() {
        let resolution = Resolution::Variant("server".into());
        let candidates = library_candidates(Path::new("/jre"), "amd64", &resolution);
        let file = libloading::library_filename("jvm");
        assert_eq!(
            candidates,
            [
                Path::new("/jre/lib/amd64/server").join(&file),
                Path::new("/jre/lib/server").join(&file),
            ]
        );
    }

    #[test]
    fn alternate_path_is_used_directly() {
        let resolution = Resolution::Alternate("/opt/vm/custom".into());
        let candidates = library_candidates(Path::new("/jre"), "amd64", &resolution);
        assert_eq!(candidates, [Path::new("/opt/vm/custom").join(libloading::library_filename("jvm"))]);
    }

    #[test]
    fn missing_library_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeHandle::load(dir.path(), "amd64", &Resolution::Variant("server".into())).unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(path) if path.ends_with(libloading::library_filename("jvm"))));
    }

    #[test]
    fn unloadable_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("lib").join("server");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join(libloading::library_filename("jvm")), b"not a shared object").unwrap();
        let err = RuntimeHandle::load(dir.path(), "amd64", &Resolution::Variant("server".into())).unwrap_err();
        assert!(matches!(err, LoaderError::Load(..)));
    }
}
