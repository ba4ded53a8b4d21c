//! Animation file retrieval from identifiers or raw bytes.

use std::future::Future;
use std::rc::Rc;

use crate::{RivError, RivResult};

/// File extension of animation bundles.
pub const BUNDLE_EXTENSION: &str = "riv";

/// Where a surface's animation comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Name resolved to `{folder}/{name}.riv`.
    Identifier(String),
    /// Bundle bytes provided directly.
    Bytes(Rc<[u8]>),
}

impl From<&str> for Source {
    fn from(identifier: &str) -> Self {
        Source::Identifier(identifier.to_owned())
    }
}

impl From<String> for Source {
    fn from(identifier: String) -> Self {
        Source::Identifier(identifier)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes.into())
    }
}

/// Failure reported by a [`Transport`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
}

impl From<TransportError> for RivError {
    fn from(err: TransportError) -> Self {
        RivError::load(err.to_string())
    }
}

/// Byte-oriented transport (HTTP fetch, filesystem, ...).
///
/// No `Send` bounds: works in both native and WASM (single-threaded) contexts.
pub trait Transport {
    fn get_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TransportError>>;
}

/// Resolves sources to bundle bytes. Nothing is cached at this layer.
#[derive(Debug)]
pub struct AssetFetcher<T> {
    transport: T,
    folder: String,
}

impl<T: Transport> AssetFetcher<T> {
    pub fn new(transport: T, folder: impl Into<String>) -> Self {
        Self { transport, folder: folder.into() }
    }

    #[inline]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Address of the bundle named `identifier`.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use riv_core_view::fetch::{AssetFetcher, Transport, TransportError};
    ///
    /// struct Offline;
    /// impl Transport for Offline {
    ///     async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
    ///         Err(TransportError::Network { url: url.into(), message: "offline".into() })
    ///     }
    /// }
    ///
    /// let fetcher = AssetFetcher::new(Offline, "assets/rive/");
    /// assert_eq!(fetcher.resolve("knight").unwrap(), "assets/rive/knight.riv");
    /// ```
    pub fn resolve(&self, identifier: &str) -> RivResult<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(RivError::load("cannot resolve an empty identifier"));
        }
        let folder = self.folder.trim_end_matches('/');
        if folder.is_empty() {
            Ok(format!("{identifier}.{BUNDLE_EXTENSION}"))
        } else {
            Ok(format!("{folder}/{identifier}.{BUNDLE_EXTENSION}"))
        }
    }

    /// Get the bytes of `source`. Raw bytes are returned without a network call.
    pub async fn fetch(&self, source: &Source) -> RivResult<Rc<[u8]>> {
        match source {
            Source::Bytes(bytes) => Ok(Rc::clone(bytes)),
            Source::Identifier(identifier) => {
                let url = self.resolve(identifier)?;
                tracing::debug!(%url, "fetching bundle");
                let bytes = self.transport.get_bytes(&url).await?;
                Ok(bytes.into())
            }
        }
    }
}
