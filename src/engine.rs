//! Contract expected from the animation engine.
//!
//! The engine itself (file decoding, artboard drawing, WASM execution) is
//! opaque. This module only names the operations the surface controller and
//! the runtime loader rely on, and the ownership discipline for the native
//! handles the engine hands out.
//!
//! No `Send` bounds: the engine lives on one cooperative, single-threaded
//! execution context (browser main thread or a `LocalPool`).

use std::future::Future;

use crate::{Aabb, Alignment, Fit, RivResult};

/// A handle to memory the engine manages outside of Rust ownership.
///
/// `delete` must be called exactly once. Use [`Owned`] rather than calling it
/// by hand.
pub trait NativeHandle {
    fn delete(&mut self);
}

/// Pixel surface a renderer can be bound to.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn set_width(&mut self, width: u32);
    fn set_height(&mut self, height: u32);
}

/// Native renderer bound to one surface.
pub trait Renderer: NativeHandle {
    fn clear(&mut self);
    fn save(&mut self);
    fn restore(&mut self);
    /// Transform so that `content` is placed inside `frame` per `fit` and `alignment`.
    fn align(&mut self, fit: Fit, alignment: Alignment, frame: &Aabb, content: &Aabb);
}

/// A sub-scene of a loaded file; the unit that is advanced and drawn.
pub trait Artboard: NativeHandle {
    type Renderer: Renderer;

    fn name(&self) -> String;
    /// Native bounds of the artboard.
    fn bounds(&self) -> Aabb;
    fn animation_count(&self) -> usize;
    fn advance(&mut self, seconds: f64);
    fn draw(&mut self, renderer: &mut Self::Renderer);
}

/// A decoded animation file.
pub trait BundleFile: NativeHandle {
    type Artboard;

    fn artboard_by_name(&self, name: &str) -> Option<Self::Artboard>;
    fn default_artboard(&self) -> Option<Self::Artboard>;
}

/// Instance of a state machine attached to an artboard.
pub trait StateMachineInstance {
    fn advance(&mut self, seconds: f64);
}

/// Instance of a linear (timeline) animation attached to an artboard.
pub trait LinearAnimationInstance {
    fn advance(&mut self, seconds: f64);
    /// Blend the animation's current pose onto its artboard.
    fn apply(&mut self, mix: f64);
}

/// The initialized engine. One per process, shared by every surface.
pub trait Engine: 'static {
    type Surface: Surface;
    type Renderer: Renderer;
    type Artboard: Artboard<Renderer = Self::Renderer>;
    type File: BundleFile<Artboard = Self::Artboard>;
    type StateMachine: StateMachineInstance;
    type LinearAnimation: LinearAnimationInstance;

    /// Decode file bytes into a native file handle.
    fn load(&self, bytes: &[u8]) -> RivResult<Self::File>;

    fn make_renderer(&self, surface: &Self::Surface) -> Self::Renderer;

    /// Run `callback` with a millisecond timestamp on the next display refresh.
    fn request_animation_frame(&self, callback: Box<dyn FnOnce(f64)>);
}

/// Locates and instantiates the engine binary.
pub trait Bootstrap: 'static {
    type Engine: Engine;

    /// Instantiate the engine from the binary payload at `binary_url`.
    fn instantiate(&self, binary_url: &str) -> impl Future<Output = RivResult<Self::Engine>>;
}

/// The per-frame instance passed to a draw call.
pub enum Instance<'a, E: Engine> {
    StateMachine(&'a mut E::StateMachine),
    Linear(&'a mut E::LinearAnimation),
}

impl<'a, E: Engine> Instance<'a, E> {
    /// Advance the instance; linear animations also apply their pose with `mix`.
    pub(crate) fn advance(self, seconds: f64, mix: f64) {
        match self {
            Instance::StateMachine(machine) => machine.advance(seconds),
            Instance::Linear(animation) => {
                animation.advance(seconds);
                animation.apply(mix);
            }
        }
    }
}

/// Single owner of a native handle.
///
/// Releasing is idempotent, replacing releases the previous handle first, and
/// dropping the owner releases whatever it still holds.
pub struct Owned<T: NativeHandle> {
    handle: Option<T>,
}

impl<T: NativeHandle> Owned<T> {
    pub fn new(handle: T) -> Self {
        Self { handle: Some(handle) }
    }

    pub fn empty() -> Self {
        Self { handle: None }
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.handle.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.handle.as_mut()
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Release the current handle (if any), then take ownership of `next`.
    pub fn replace(&mut self, next: Option<T>) {
        self.release();
        self.handle = next;
    }

    /// Delete the held handle. No-op when empty.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.delete();
        }
    }
}

impl<T: NativeHandle> Default for Owned<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: NativeHandle> Drop for Owned<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: NativeHandle> std::fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owned").field("live", &self.is_live()).finish()
    }
}
