//! Fetching resources.

pub mod manifest;

use std::io;
use std::path::{Path, PathBuf};

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::debug;

use crate::error::LoadError;
use crate::resolve::ModuleDescriptor;

pub use manifest::{parse_manifest, ModuleManifest};

pub type LoadFuture = LocalBoxFuture<'static, Result<Vec<ModuleDescriptor>, LoadError>>;

/// Asynchronous fetch capability supplied by the host.
///
/// A successful load yields the descriptors the resource declares, possibly
/// none. The manager calls nothing here directly; see [`crate::runtime::drive`].
pub trait ResourceLoader {
    fn load(&self, path: &Path) -> LoadFuture;
}

impl<F> ResourceLoader for F
where
    F: Fn(&Path) -> LoadFuture,
{
    fn load(&self, path: &Path) -> LoadFuture {
        self(path)
    }
}

/// Reads TOML manifests from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsLoader;

impl ResourceLoader for FsLoader {
    fn load(&self, path: &Path) -> LoadFuture {
        let path = path.to_path_buf();
        async move {
            let source = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| read_error(&path, e))?;
            let modules = parse_manifest(&source, &path).map_err(|diag| LoadError::Manifest {
                path: path.clone(),
                reason: diag.message,
            })?;
            debug!(path = %path.display(), modules = modules.len(), "parsed manifest");
            Ok(modules
                .into_iter()
                .map(ModuleManifest::into_descriptor)
                .collect())
        }
        .boxed_local()
    }
}

fn read_error(path: &Path, err: io::Error) -> LoadError {
    if err.kind() == io::ErrorKind::NotFound {
        LoadError::NotFound(PathBuf::from(path))
    } else {
        LoadError::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_fs_loader_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shapes.toml");
        fs::write(
            &path,
            "[[module]]\nname = \"demo.Shape\"\n[module.defaults]\nx = 1\n",
        )
        .unwrap();

        let descriptors = FsLoader.load(&path).await.unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "demo.Shape");
    }

    #[tokio::test]
    async fn test_fs_loader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = FsLoader.load(&path).await.unwrap_err();
        assert_eq!(err, LoadError::NotFound(path));
    }

    #[tokio::test]
    async fn test_fs_loader_bad_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[[module]]\nname = 3\n").unwrap();
        match FsLoader.load(&path).await {
            Err(LoadError::Manifest { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected {:?}", other.map(|d| d.len())),
        }
    }

    #[tokio::test]
    async fn test_closure_loader() {
        let loader = |path: &Path| -> LoadFuture {
            let name = path.file_stem().unwrap().to_string_lossy().into_owned();
            async move { Ok(vec![ModuleDescriptor::new(name)]) }.boxed_local()
        };
        let loaded = loader.load(Path::new("x/Thing.toml")).await.unwrap();
        assert_eq!(loaded[0].name, "Thing");
    }
}
