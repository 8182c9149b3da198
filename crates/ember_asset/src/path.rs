use std::path::PathBuf;

/// Well-known directories an asset location may reference.
#[derive(Clone, Debug)]
pub struct EnginePaths {
    pub app_root: PathBuf,
    pub cache_dir: PathBuf,
}

impl EnginePaths {
    pub fn new(app_root: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_root: app_root.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn asset_dir(&self) -> PathBuf {
        self.app_root.join("Assets")
    }
}

/// Resolves the location field of an asset url to a file path, substituting
/// the `%Cache%`, `%App%` and `%Assets%` root placeholders.
pub fn resolve_location(paths: &EnginePaths, location: &str) -> PathBuf {
    let resolved = location
        .replace("%Cache%", &paths.cache_dir.to_string_lossy())
        .replace("%Assets%", &paths.asset_dir().to_string_lossy())
        .replace("%App%", &paths.app_root.to_string_lossy());
    PathBuf::from(resolved)
}
