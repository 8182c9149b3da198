use std::any::{Any, TypeId};

use crate::Name;

/// Registered type string for `T`, the last segment of its full type path.
///
/// This is the `<type>` field of asset urls and what [`Asset::type_name`]
/// reports for a mounted asset.
pub fn asset_type_name<T: 'static>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// A mounted asset: immutable identity plus the builder-supplied payload.
///
/// The payload is opaque to the pipeline; it is only ever recovered through
/// [`Asset::downcast_ref`] with the exact type it was mounted with.
pub struct Asset {
    type_id: TypeId,
    type_name: &'static str,
    vpath: String,
    hash: Name,
    payload: Box<dyn Any + Send + Sync>,
}

impl Asset {
    pub fn new<T: Send + Sync + 'static>(vpath: impl Into<String>, payload: T) -> Self {
        let vpath = vpath.into();
        Self {
            type_id: TypeId::of::<T>(),
            type_name: asset_type_name::<T>(),
            hash: Name::new(&vpath),
            payload: Box::new(payload),
            vpath,
        }
    }

    pub fn virtual_path(&self) -> &str {
        &self.vpath
    }

    pub fn hash_code(&self) -> Name {
        self.hash
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Texture {
        width: u32,
    }

    #[test]
    fn identity_and_downcast() {
        let asset = Asset::new("Test/Checker", Texture { width: 64 });

        assert_eq!(asset.virtual_path(), "Test/Checker");
        assert_eq!(asset.hash_code(), Name::new("Test/Checker"));
        assert_eq!(asset.type_name(), "Texture");
        assert!(asset.is::<Texture>());
        assert!(!asset.is::<String>());
        assert_eq!(asset.downcast_ref::<Texture>().unwrap().width, 64);
        assert!(asset.downcast_ref::<String>().is_none());
    }
}
