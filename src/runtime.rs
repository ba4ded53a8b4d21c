//! Process-wide engine bootstrap and the shared per-frame ticker.
//!
//! The engine is instantiated at most once at a time: the first caller of
//! [`RuntimeLoader::ensure`] starts the bootstrap and stores the in-flight
//! attempt; every concurrent or later caller awaits that same attempt.
//!
//! A failed attempt is delivered to all of its waiters and then forgotten,
//! so the next call starts a fresh bootstrap.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::engine::{Bootstrap, Engine};
use crate::{RivError, RivResult};

/// The initialized engine plus its frame ticker.
pub struct Runtime<E: Engine> {
    engine: Rc<E>,
    frames: FrameStream<E>,
}

impl<E: Engine> Runtime<E> {
    #[inline]
    pub fn engine(&self) -> &Rc<E> {
        &self.engine
    }

    #[inline]
    pub fn frames(&self) -> &FrameStream<E> {
        &self.frames
    }

    /// Whether both handles point at the same engine instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.engine, &other.engine)
    }
}

impl<E: Engine> Clone for Runtime<E> {
    fn clone(&self) -> Self {
        Self { engine: Rc::clone(&self.engine), frames: self.frames.clone() }
    }
}

type Attempt<E> = Shared<LocalBoxFuture<'static, RivResult<Runtime<E>>>>;

/// Single-flight loader for the engine.
pub struct RuntimeLoader<B: Bootstrap> {
    bootstrap: Rc<B>,
    binary_url: String,
    attempt: RefCell<Option<Attempt<B::Engine>>>,
    bootstraps: Cell<usize>,
}

impl<B: Bootstrap> RuntimeLoader<B> {
    pub fn new(bootstrap: B, binary_url: impl Into<String>) -> Self {
        Self {
            bootstrap: Rc::new(bootstrap),
            binary_url: binary_url.into(),
            attempt: RefCell::new(None),
            bootstraps: Cell::new(0),
        }
    }

    #[inline]
    pub fn binary_url(&self) -> &str {
        &self.binary_url
    }

    /// Number of bootstraps started so far.
    #[inline]
    pub fn bootstraps(&self) -> usize {
        self.bootstraps.get()
    }

    /// The runtime, if a bootstrap has already succeeded.
    pub fn runtime(&self) -> Option<Runtime<B::Engine>> {
        let attempt = self.attempt.borrow();
        attempt.as_ref()?.peek()?.as_ref().ok().cloned()
    }

    /// Get the runtime, bootstrapping the engine if nobody has yet.
    pub async fn ensure(&self) -> RivResult<Runtime<B::Engine>> {
        let attempt = self.current_attempt();
        let result = attempt.clone().await;
        if let Err(err) = &result {
            let mut slot = self.attempt.borrow_mut();
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&attempt)) {
                tracing::warn!(error = %err, "engine bootstrap failed, next load will retry");
                *slot = None;
            }
        }
        result
    }

    fn current_attempt(&self) -> Attempt<B::Engine> {
        let mut slot = self.attempt.borrow_mut();
        if let Some(attempt) = slot.as_ref() {
            return attempt.clone();
        }

        self.bootstraps.set(self.bootstraps.get() + 1);
        let bootstrap = Rc::clone(&self.bootstrap);
        let url = self.binary_url.clone();
        let attempt = async move {
            tracing::info!(%url, "bootstrapping engine");
            let engine = bootstrap.instantiate(&url).await.map_err(|err| match err {
                RivError::Runtime(_) => err,
                other => RivError::runtime(other.to_string()),
            })?;
            let engine = Rc::new(engine);
            Ok(Runtime { frames: FrameStream::new(Rc::clone(&engine)), engine })
        }
        .boxed_local()
        .shared();

        *slot = Some(attempt.clone());
        attempt
    }
}

/// One display refresh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    /// Engine timestamp in milliseconds.
    pub time: f64,
    /// Seconds since the previous tick (0 on the first tick after a restart).
    pub delta: f64,
}

type FrameListener = Rc<RefCell<dyn FnMut(FrameTick)>>;

struct Driver<E> {
    engine: Rc<E>,
    listeners: Vec<(u64, FrameListener)>,
    next_id: u64,
    running: bool,
    last_time: Option<f64>,
}

/// Hot per-frame stream over the engine's animation frame primitive.
///
/// Every subscriber shares one driver. The driver requests frames while at
/// least one subscription is alive and stops once the last one is dropped;
/// a later subscription restarts it.
pub struct FrameStream<E: Engine> {
    driver: Rc<RefCell<Driver<E>>>,
}

impl<E: Engine> Clone for FrameStream<E> {
    fn clone(&self) -> Self {
        Self { driver: Rc::clone(&self.driver) }
    }
}

impl<E: Engine> FrameStream<E> {
    pub fn new(engine: Rc<E>) -> Self {
        Self {
            driver: Rc::new(RefCell::new(Driver {
                engine,
                listeners: Vec::new(),
                next_id: 0,
                running: false,
                last_time: None,
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.driver.borrow().listeners.len()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.driver.borrow().running
    }

    /// Call `listener` on every tick until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl FnMut(FrameTick) + 'static) -> FrameSubscription<E> {
        let listener: FrameListener = Rc::new(RefCell::new(listener));
        let (id, start) = {
            let mut driver = self.driver.borrow_mut();
            let id = driver.next_id;
            driver.next_id += 1;
            driver.listeners.push((id, listener));
            let start = !driver.running;
            if start {
                driver.running = true;
                driver.last_time = None;
            }
            (id, start)
        };
        if start {
            Self::request(&self.driver);
        }
        FrameSubscription { driver: Rc::downgrade(&self.driver), id }
    }

    fn request(driver: &Rc<RefCell<Driver<E>>>) {
        let engine = Rc::clone(&driver.borrow().engine);
        let weak = Rc::downgrade(driver);
        engine.request_animation_frame(Box::new(move |time| Self::tick(&weak, time)));
    }

    fn tick(driver: &Weak<RefCell<Driver<E>>>, time: f64) {
        let Some(driver) = driver.upgrade() else { return };

        let (tick, listeners) = {
            let mut state = driver.borrow_mut();
            if state.listeners.is_empty() {
                state.running = false;
                return;
            }
            let delta = state.last_time.map_or(0.0, |last| (time - last) / 1000.0);
            state.last_time = Some(time);
            let listeners: Vec<(u64, FrameListener)> =
                state.listeners.iter().map(|(id, l)| (*id, Rc::clone(l))).collect();
            (FrameTick { time, delta }, listeners)
        };

        for (id, listener) in listeners {
            // A listener may have unsubscribed another one during this tick.
            let live = driver.borrow().listeners.iter().any(|(other, _)| *other == id);
            if live {
                (&mut *listener.borrow_mut())(tick);
            }
        }

        let keep_running = {
            let mut state = driver.borrow_mut();
            state.running = !state.listeners.is_empty();
            state.running
        };
        if keep_running {
            Self::request(&driver);
        }
    }
}

/// Guard returned by [`FrameStream::subscribe`]; unsubscribes on drop.
pub struct FrameSubscription<E> {
    driver: Weak<RefCell<Driver<E>>>,
    id: u64,
}

impl<E> Drop for FrameSubscription<E> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.upgrade() {
            if let Ok(mut driver) = driver.try_borrow_mut() {
                driver.listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBootstrap, FakeEngine, Log};
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;

    #[test]
    fn test_concurrent_callers_share_one_bootstrap() {
        let bootstrap = FakeBootstrap::deferred();
        let loader = Rc::new(RuntimeLoader::new(bootstrap.clone(), "rive.wasm"));
        let results = Rc::new(RefCell::new(Vec::new()));

        let mut pool = LocalPool::new();
        for _ in 0..2 {
            let loader = Rc::clone(&loader);
            let results = Rc::clone(&results);
            pool.spawner()
                .spawn_local(async move {
                    let runtime = loader.ensure().await;
                    results.borrow_mut().push(runtime);
                })
                .unwrap();
        }
        pool.run_until_stalled();
        assert_eq!(bootstrap.calls(), 1);
        assert!(results.borrow().is_empty());

        bootstrap.finish(Ok(()));
        pool.run_until_stalled();

        let results = results.borrow();
        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        let second = results[1].as_ref().unwrap();
        assert!(first.ptr_eq(second));
        assert_eq!(loader.bootstraps(), 1);
        assert_eq!(bootstrap.urls(), vec!["rive.wasm".to_string()]);
    }

    #[test]
    fn test_later_callers_reuse_runtime() {
        let bootstrap = FakeBootstrap::default();
        let loader = RuntimeLoader::new(bootstrap.clone(), "rive.wasm");
        assert!(loader.runtime().is_none());

        let first = block_on(loader.ensure()).unwrap();
        let second = block_on(loader.ensure()).unwrap();
        assert!(first.ptr_eq(&second));
        assert!(loader.runtime().is_some_and(|r| r.ptr_eq(&first)));
        assert_eq!(bootstrap.calls(), 1);
    }

    #[test]
    fn test_failure_reaches_every_waiter_then_allows_retry() {
        let bootstrap = FakeBootstrap::deferred();
        bootstrap.set_failing(true);
        let loader = Rc::new(RuntimeLoader::new(bootstrap.clone(), "rive.wasm"));
        let results = Rc::new(RefCell::new(Vec::new()));

        let mut pool = LocalPool::new();
        for _ in 0..3 {
            let loader = Rc::clone(&loader);
            let results = Rc::clone(&results);
            pool.spawner()
                .spawn_local(async move {
                    let outcome = loader.ensure().await.map(|_| ());
                    results.borrow_mut().push(outcome);
                })
                .unwrap();
        }
        pool.run_until_stalled();
        bootstrap.finish(Ok(()));
        pool.run_until_stalled();

        assert_eq!(bootstrap.calls(), 1);
        assert_eq!(
            *results.borrow(),
            vec![Err(RivError::runtime("wasm instantiation failed")); 3]
        );
        assert!(loader.runtime().is_none());

        // The failure is not cached: the next call bootstraps again.
        bootstrap.set_failing(false);
        let spawner = pool.spawner();
        let retry = Rc::new(RefCell::new(None));
        {
            let loader = Rc::clone(&loader);
            let retry = Rc::clone(&retry);
            spawner
                .spawn_local(async move {
                    *retry.borrow_mut() = Some(loader.ensure().await.is_ok());
                })
                .unwrap();
        }
        pool.run_until_stalled();
        bootstrap.finish(Ok(()));
        pool.run_until_stalled();
        assert_eq!(*retry.borrow(), Some(true));
        assert_eq!(bootstrap.calls(), 2);
    }

    #[test]
    fn test_non_runtime_bootstrap_errors_become_runtime_errors() {
        let bootstrap = FakeBootstrap::deferred();
        let loader = Rc::new(RuntimeLoader::new(bootstrap.clone(), "rive.wasm"));
        let mut pool = LocalPool::new();
        let outcome = Rc::new(RefCell::new(None));
        {
            let loader = Rc::clone(&loader);
            let outcome = Rc::clone(&outcome);
            pool.spawner()
                .spawn_local(async move {
                    *outcome.borrow_mut() = Some(loader.ensure().await.map(|_| ()));
                })
                .unwrap();
        }
        pool.run_until_stalled();
        bootstrap.finish(Err(RivError::load("wasm not found")));
        pool.run_until_stalled();
        assert_eq!(
            *outcome.borrow(),
            Some(Err(RivError::runtime("load error: wasm not found")))
        );
    }

    #[test]
    fn test_frame_stream_shares_one_driver() {
        let engine = Rc::new(FakeEngine::new(Log::default()));
        let frames = FrameStream::new(Rc::clone(&engine));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = {
            let seen = Rc::clone(&seen);
            frames.subscribe(move |tick| seen.borrow_mut().push(("a", tick.delta)))
        };
        let b = {
            let seen = Rc::clone(&seen);
            frames.subscribe(move |tick| seen.borrow_mut().push(("b", tick.delta)))
        };
        assert_eq!(engine.frame_requests.get(), 1);
        assert_eq!(frames.subscriber_count(), 2);

        engine.fire_frame(1000.0);
        engine.fire_frame(1016.0);
        assert_eq!(engine.pending_frames(), 1);
        assert_eq!(
            *seen.borrow(),
            vec![("a", 0.0), ("b", 0.0), ("a", 0.016), ("b", 0.016)]
        );

        drop(a);
        drop(b);
        // The already requested frame finds no listener and stops the driver.
        engine.fire_frame(1032.0);
        assert!(!frames.is_running());
        assert_eq!(engine.pending_frames(), 0);
        assert_eq!(seen.borrow().len(), 4);
    }

    #[test]
    fn test_frame_stream_restarts_on_resubscribe() {
        let engine = Rc::new(FakeEngine::new(Log::default()));
        let frames = FrameStream::new(Rc::clone(&engine));
        let count = Rc::new(Cell::new(0));

        let first = {
            let count = Rc::clone(&count);
            frames.subscribe(move |_| count.set(count.get() + 1))
        };
        engine.fire_frame(0.0);
        drop(first);
        engine.fire_frame(16.0);
        assert!(!frames.is_running());

        let deltas = Rc::new(RefCell::new(Vec::new()));
        let _second = {
            let deltas = Rc::clone(&deltas);
            frames.subscribe(move |tick| deltas.borrow_mut().push(tick.delta))
        };
        assert!(frames.is_running());
        engine.fire_frame(5000.0);
        engine.fire_frame(5500.0);
        assert_eq!(count.get(), 1);
        assert_eq!(*deltas.borrow(), vec![0.0, 0.5]);
    }
}
