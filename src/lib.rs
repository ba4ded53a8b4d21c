//! # riv-core-view
//!
//! Core load and draw orchestration for Rive animation surfaces.
//!
//! This crate provides platform-agnostic logic for:
//! - Bootstrapping the animation engine once and sharing it between surfaces
//! - Fetching `.riv` bundles by identifier or taking them as raw bytes
//! - Deferring loads until a surface first becomes visible (lazy mode)
//! - Mapping a viewbox string onto the surface's device box (memoized)
//! - Selecting artboards and drawing frames with fit and alignment
//!
//! The engine itself stays opaque behind the traits in [`engine`].
//!
//! ## Features
//!
//! - `serde` - Enable serialization/deserialization for configuration types
//! - `toml` - Load configuration from TOML documents
//! - `web` - Enable browser bindings (fetch, IntersectionObserver, spawn_local)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use riv_core_view::{on_visible, RiveConfig, RiveService, Source, SurfaceController};
//! use riv_core_view::render::web::{DomVisibility, FetchTransport, WasmSpawner};
//!
//! let service = Rc::new(RiveService::new(RiveConfig::default(), bootstrap, FetchTransport));
//!
//! let controller = SurfaceController::new(
//!     Rc::clone(&service),
//!     canvas.clone(),
//!     on_visible(&DomVisibility, &canvas),
//!     WasmSpawner,
//! );
//! controller.set_lazy(true);
//! controller.set_source(Some(Source::from("knight")));
//! controller.ready().await?;
//!
//! let frames = controller.frames().expect("engine is bootstrapped");
//! let _subscription = frames.subscribe(move |tick| {
//!     let _ = controller.draw(Instance::StateMachine(&mut machine), tick.delta, None);
//! });
//! ```

mod config;
mod controller;
pub mod engine;
mod error;
pub mod fetch;
mod layout;
pub mod render;
mod runtime;
mod service;
pub mod viewbox;
mod visibility;

#[cfg(test)]
mod testing;

pub use config::{parse_dimension, parse_lazy, CanvasOptions, RiveConfig};
pub use controller::{ArtboardInfo, LoadStatus, SurfaceController};
pub use engine::{Bootstrap, Engine, Instance, Owned};
pub use error::{RivError, RivResult, StateError};
pub use fetch::{AssetFetcher, Source, Transport, TransportError};
pub use layout::{Aabb, Alignment, Fit};
pub use render::{compute_alignment, render_artboard, Mat2D};
pub use runtime::{FrameStream, FrameSubscription, FrameTick, Runtime, RuntimeLoader};
pub use service::{Loaded, RiveService};
pub use viewbox::{compute_box, parse_viewbox, BoxCache};
pub use visibility::{
    on_visible, IntersectionEntry, ObserverHandle, VisibilityHost, VisibilitySupport, WhenVisible,
};

#[cfg(feature = "web")]
pub use render::web::{DomVisibility, FetchTransport, WasmSpawner};
