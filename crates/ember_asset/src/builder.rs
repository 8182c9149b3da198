use crate::{Asset, AssetManager, Name};

/// Prepares one asset for mounting.
///
/// Builders are created by an [`AssetProvider`] and handed to the build
/// worker, which calls [`AssetBuilder::build`] off the owning thread.
pub trait AssetBuilder: Send + 'static {
    /// Builds this asset asynchronously.
    ///
    /// This may not run on the owning thread, so it is unsafe to call any
    /// rendering method or driver resource allocation here. Typical work is
    /// file IO and pre-calculation to prepare data for [`AssetBuilder::mount`].
    fn build(&mut self) -> anyhow::Result<()>;

    /// `(sub_path, sub_url)` pairs to load as a result of expanding this
    /// asset, in order. Used by packages/archives and similar asset kinds.
    fn expanded_assets(&self) -> &[(String, String)] {
        &[]
    }

    /// Virtual paths that must be mounted before this asset can be mounted.
    fn dependencies(&self) -> &[Name] {
        &[]
    }

    /// Callback after a successful build, on the owning thread.
    ///
    /// Driver resources may be allocated here; `assets` can be used to look
    /// up dependencies. Returning `None` means no asset needs to be mounted
    /// for this virtual path.
    fn mount(&mut self, assets: &mut AssetManager, vpath: &str) -> Option<Asset>;
}

/// Factory turning a location string into a builder.
///
/// Registered on the [`AssetManager`] under a `"<type>/<format>"` key.
/// `Ok(None)` signals that the provider could not produce a builder for this
/// location; `Err` is a provider error and is reported with its full chain.
pub trait AssetProvider: Send + Sync + 'static {
    fn create(&self, location: &str) -> anyhow::Result<Option<Box<dyn AssetBuilder>>>;
}
