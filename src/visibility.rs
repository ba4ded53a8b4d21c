//! One-shot visibility gate used to defer loading until a surface is on screen.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture, Shared};

/// What the host environment can tell us about element visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisibilitySupport {
    /// No window/document at all (e.g. server-side rendering).
    Unavailable,
    /// A window exists but intersection observation does not.
    NoObserver,
    /// Intersection observation is available.
    Observer,
}

/// One intersection report for the observed element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntersectionEntry {
    pub intersection_ratio: f64,
}

impl IntersectionEntry {
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.intersection_ratio != 0.0
    }
}

/// Live intersection observation that can be stopped.
pub trait ObserverHandle {
    fn disconnect(&mut self);
}

/// Push-based visibility observation provided by the host.
pub trait VisibilityHost {
    type Element;

    fn support(&self) -> VisibilitySupport;

    /// Start observing `element`, reporting batches of entries to `on_change`.
    fn observe(&self, element: &Self::Element, on_change: Box<dyn FnMut(&[IntersectionEntry])>) -> Box<dyn ObserverHandle>;
}

/// Resolves once with whether the element became visible.
///
/// Cloning shares the same resolution; it is never re-created once settled.
#[derive(Clone)]
pub struct WhenVisible {
    inner: Shared<LocalBoxFuture<'static, bool>>,
}

impl WhenVisible {
    /// An already settled gate.
    pub fn resolved(visible: bool) -> Self {
        Self { inner: futures::future::ready(visible).boxed_local().shared() }
    }

    /// Wrap a custom visibility source.
    pub fn from_future(future: impl std::future::Future<Output = bool> + 'static) -> Self {
        Self { inner: future.boxed_local().shared() }
    }

    /// The outcome, if already settled.
    pub fn peek(&self) -> Option<bool> {
        self.inner.peek().copied()
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> bool {
        self.inner.clone().await
    }
}

impl std::fmt::Debug for WhenVisible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhenVisible").field("settled", &self.peek()).finish()
    }
}

struct Gate {
    sender: Option<oneshot::Sender<bool>>,
    observer: Option<Box<dyn ObserverHandle>>,
}

impl Gate {
    fn settle(&mut self, visible: bool) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(visible);
        }
        if let Some(mut observer) = self.observer.take() {
            observer.disconnect();
        }
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        if let Some(mut observer) = self.observer.take() {
            observer.disconnect();
        }
    }
}

/// Build the visibility gate for `element`.
///
/// - no visibility concept: resolves `false` immediately, nothing is observed
/// - no intersection observer: resolves `true` immediately
/// - otherwise: resolves with the state after the first transition away from
///   "not visible", then stops observing
pub fn on_visible<H: VisibilityHost>(host: &H, element: &H::Element) -> WhenVisible {
    match host.support() {
        VisibilitySupport::Unavailable => return WhenVisible::resolved(false),
        VisibilitySupport::NoObserver => return WhenVisible::resolved(true),
        VisibilitySupport::Observer => {}
    }

    let (tx, rx) = oneshot::channel();
    let gate = Rc::new(RefCell::new(Gate { sender: Some(tx), observer: None }));

    let callback_gate = Rc::downgrade(&gate);
    let observer = host.observe(
        element,
        Box::new(move |entries| {
            let Some(shared) = callback_gate.upgrade() else { return };
            let mut gate = shared.borrow_mut();
            if gate.sender.is_none() {
                return;
            }
            // Observation starts from "not visible", so the first transition is to visible.
            if let Some(entry) = entries.iter().find(|e| e.is_visible()) {
                tracing::debug!(ratio = entry.intersection_ratio, "surface became visible");
                gate.settle(true);
            }
        }),
    );

    {
        let mut state = gate.borrow_mut();
        if state.sender.is_some() {
            state.observer = Some(observer);
        } else {
            // Settled while observe() was still running.
            let mut observer = observer;
            observer.disconnect();
        }
    }

    // The callback holds the gate weakly; the pending future owns it, so
    // dropping every clone of the result stops the observation.
    WhenVisible::from_future(async move {
        let visible = rx.await.unwrap_or(false);
        drop(gate);
        visible
    })
}
