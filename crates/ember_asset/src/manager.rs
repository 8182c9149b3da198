use std::{any::TypeId, collections::HashMap, collections::VecDeque};

use crate::{
    asset_type_name, Asset, AssetProvider, BuildWorker, Entry, Name, WorkerState,
};

type FxHashMap<K, V> = HashMap<K, V, fxhash::FxBuildHasher>;

/// Owns the asset pipeline: the provider registry, the mounted-asset table,
/// the per-type defaults and the background build worker.
///
/// Asset url = `<asset type>/<format>,(<root>/)<path/to/file.whatever>`
/// with root = `%App%`, `%Cache%` or `%Assets%` (see [`crate::resolve_location`]).
///
/// Loading is always asynchronous: [`AssetManager::add`] only enqueues a
/// build, and the owning application must call [`AssetManager::poll`]
/// regularly to mount newly built assets. All methods are owning-thread
/// only; the worker is the single other thread involved.
pub struct AssetManager {
    worker: BuildWorker,
    mounted: FxHashMap<Name, Asset>,
    providers: FxHashMap<String, Box<dyn AssetProvider>>,
    defaults: FxHashMap<TypeId, Name>,
    unresolved: VecDeque<Entry>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self {
            worker: BuildWorker::new(),
            mounted: Default::default(),
            providers: Default::default(),
            defaults: Default::default(),
            unresolved: VecDeque::new(),
        }
    }

    /// Registers a provider for assets of payload type `T` under `format`.
    /// The url field matching it is `"<type name of T>/<format>"`.
    pub fn set_provider<T: Send + Sync + 'static>(
        &mut self,
        format: &str,
        provider: impl AssetProvider,
    ) {
        let key = format!("{}/{}", asset_type_name::<T>(), format);
        self.providers.insert(key, Box::new(provider));
    }

    pub fn get_provider(&self, key: &str) -> Option<&dyn AssetProvider> {
        self.providers.get(key).map(|provider| provider.as_ref())
    }

    /// Enqueues an asynchronous load of `url` under `vpath`.
    ///
    /// Never returns an error: every failure is logged and aborts only this
    /// call. Nothing is mounted synchronously.
    pub fn add(&mut self, vpath: &str, url: &str) {
        log::info!(target: "AssetManager", "Loading asset '{}' with url '{}'...", vpath, url);
        let fields: Vec<&str> = url.split(',').collect();
        if fields.len() != 2 {
            log::error!(target: "AssetManager", "Could not load asset '{}': incorrect asset url format", vpath);
            return;
        }
        let (format, location) = (fields[0], fields[1]);
        let Some(provider) = self.providers.get(format) else {
            log::error!(
                target: "AssetManager",
                "Could not load asset '{}': no installed provider matches asset format ({})",
                vpath,
                format
            );
            return;
        };
        match provider.create(location) {
            Ok(Some(builder)) => {
                self.worker.submit(vpath, builder);
                if self.worker.state() != WorkerState::Running {
                    self.worker.join();
                    self.worker.start();
                }
            }
            Ok(None) => {
                log::error!(target: "AssetManager", "Could not load asset '{}': IAssetProvider failure", vpath);
            }
            Err(err) => {
                log::error!(
                    target: "AssetManager",
                    "Could not load asset '{}': an unhandled exception has occured",
                    vpath
                );
                log::error!(target: "AssetManager", "        > {:#}", err);
            }
        }
    }

    /// Injects an already mounted asset, keyed by its own virtual path.
    pub fn insert(&mut self, asset: Asset) {
        self.mounted.insert(asset.hash_code(), asset);
    }

    /// Unloads mounted assets synchronously.
    ///
    /// A trailing `*` requests mass unloading of every asset whose virtual
    /// path starts with the prefix; otherwise exactly the one matching asset
    /// is unloaded. The defaults table is not consulted: removing an asset
    /// that is currently a type default leaves a dangling default behind.
    pub fn remove(&mut self, vpath: &str) {
        if let Some(prefix) = vpath.strip_suffix('*') {
            self.mounted.retain(|_, asset| {
                if asset.virtual_path().starts_with(prefix) {
                    log::info!(target: "AssetManager", "Unloading asset '{}'...", asset.virtual_path());
                    false
                } else {
                    true
                }
            });
        } else if let Some(asset) = self.mounted.remove(&Name::new(vpath)) {
            log::info!(target: "AssetManager", "Unloading asset '{}'...", asset.virtual_path());
        }
    }

    /// Drains at most one worker result, then attempts one dependency
    /// resolution if the queue ran dry. Returns false when there is nothing
    /// left to do.
    pub fn poll(&mut self) -> bool {
        self.poll_entries(1)
    }

    /// Like [`AssetManager::poll`] with a larger per-call budget; bounded
    /// work so a render loop is never stalled.
    pub fn poll_entries(&mut self, max_mountable: usize) -> bool {
        for _ in 0..max_mountable {
            let Some(mut entry) = self.worker.poll_mountable() else {
                return self.attempt_solve_dependencies();
            };
            if let Some(error) = entry.error.take() {
                log::error!(
                    target: "AssetManager",
                    "Could not build asset '{}': an unhandled exception has occured",
                    entry.vpath
                );
                log::error!(target: "AssetManager", "        > {}", error);
                continue;
            }
            // Archive/package fan-out: every expanded child goes through the
            // full pipeline under a path nested below its parent.
            let expanded = std::mem::take(&mut entry.expanded);
            for (sub_path, sub_url) in &expanded {
                let vpath = format!("{}/{}", entry.vpath, sub_path);
                self.add(&vpath, sub_url);
            }
            if self.dependencies_satisfied(entry.builder.dependencies()) {
                self.mount_entry(entry);
            } else {
                self.unresolved.push_back(entry);
            }
        }
        true
    }

    /// Blocks until every pending asset has been built and mounted (or has
    /// failed). The worker is restarted as long as submissions remain
    /// pending, so entries enqueued mid-run cannot leak past the barrier.
    pub fn wait_for_all_objects(&mut self) {
        loop {
            self.worker.join();
            while self.poll() {}
            if self.worker.state() != WorkerState::Running {
                if self.worker.pending_len() > 0 {
                    self.worker.start();
                    continue;
                }
                break;
            }
        }
    }

    /// Makes the asset mounted under `vpath` the default for type `T`.
    /// Ignored unless `vpath` is mounted with a matching payload type.
    pub fn set_default<T: Send + Sync + 'static>(&mut self, vpath: &str) {
        let name = Name::new(vpath);
        match self.mounted.get(&name) {
            Some(asset) if asset.is::<T>() => {
                self.defaults.insert(TypeId::of::<T>(), name);
            }
            _ => {}
        }
    }

    pub fn get_default<T: Send + Sync + 'static>(&self) -> Option<&T> {
        let name = self.defaults.get(&TypeId::of::<T>())?;
        self.mounted.get(name)?.downcast_ref()
    }

    /// Typed lookup. A missing path or a stored asset of a different type
    /// falls back to the type default; a wrongly-typed borrow is never
    /// returned.
    pub fn get<T: Send + Sync + 'static>(&self, vpath: &str) -> Option<&T> {
        match self.mounted.get(&Name::new(vpath)) {
            Some(asset) if asset.is::<T>() => asset.downcast_ref(),
            _ => self.get_default(),
        }
    }

    pub fn asset(&self, vpath: &str) -> Option<&Asset> {
        self.mounted.get(&Name::new(vpath))
    }

    pub fn is_mounted(&self, vpath: &str) -> bool {
        self.mounted.contains_key(&Name::new(vpath))
    }

    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    fn dependencies_satisfied(&self, dependencies: &[Name]) -> bool {
        dependencies.iter().all(|dep| self.mounted.contains_key(dep))
    }

    fn mount_entry(&mut self, mut entry: Entry) {
        if let Some(asset) = entry.builder.mount(self, &entry.vpath) {
            self.mounted.insert(Name::new(&entry.vpath), asset);
        }
        log::info!(target: "AssetManager", "Successfully loaded asset '{}'", entry.vpath);
    }

    /// Re-checks the head of the unresolved list. An entry whose
    /// dependencies can no longer arrive (worker in a terminal state) is
    /// permanently failed. Returns false only when the list is empty.
    fn attempt_solve_dependencies(&mut self) -> bool {
        let solved = match self.unresolved.front() {
            None => return false,
            Some(entry) => self.dependencies_satisfied(entry.builder.dependencies()),
        };
        if solved {
            if let Some(entry) = self.unresolved.pop_front() {
                self.mount_entry(entry);
            }
        } else if self.worker.state().is_terminal() {
            if let Some(entry) = self.unresolved.pop_front() {
                log::error!(
                    target: "AssetManager",
                    "Could not build asset '{}': some dependencies were not satisfied",
                    entry.vpath
                );
            }
        }
        true
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}
