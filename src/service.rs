//! The shared service every surface controller loads through.

use crate::engine::{Bootstrap, Engine, Owned};
use crate::fetch::{AssetFetcher, Source, Transport};
use crate::runtime::{FrameStream, Runtime, RuntimeLoader};
use crate::{RiveConfig, RivResult};

/// A freshly decoded file together with the runtime that decoded it.
pub struct Loaded<E: Engine> {
    pub runtime: Runtime<E>,
    pub file: Owned<E::File>,
}

/// Runtime loader and asset fetcher shared by all surfaces.
///
/// Wrap it in an `Rc` and hand a clone to each [`crate::SurfaceController`].
pub struct RiveService<B: Bootstrap, T: Transport> {
    config: RiveConfig,
    loader: RuntimeLoader<B>,
    fetcher: AssetFetcher<T>,
}

impl<B: Bootstrap, T: Transport> RiveService<B, T> {
    pub fn new(config: RiveConfig, bootstrap: B, transport: T) -> Self {
        let loader = RuntimeLoader::new(bootstrap, config.wasm_url());
        let fetcher = AssetFetcher::new(transport, config.folder());
        Self { config, loader, fetcher }
    }

    #[inline]
    pub fn config(&self) -> &RiveConfig {
        &self.config
    }

    #[inline]
    pub fn loader(&self) -> &RuntimeLoader<B> {
        &self.loader
    }

    #[inline]
    pub fn fetcher(&self) -> &AssetFetcher<T> {
        &self.fetcher
    }

    /// The shared frame ticker, once the engine is bootstrapped.
    pub fn frames(&self) -> Option<FrameStream<B::Engine>> {
        self.loader.runtime().map(|runtime| runtime.frames().clone())
    }

    /// Bootstrap the engine and fetch `source` concurrently, then decode it.
    #[tracing::instrument(skip_all)]
    pub async fn load(&self, source: &Source) -> RivResult<Loaded<B::Engine>> {
        let (runtime, bytes) = futures::join!(self.loader.ensure(), self.fetcher.fetch(source));
        let runtime = runtime?;
        let bytes = bytes?;
        let file = runtime.engine().load(&bytes)?;
        tracing::debug!(len = bytes.len(), "bundle decoded");
        Ok(Loaded { runtime, file: Owned::new(file) })
    }
}
