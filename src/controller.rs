//! Per-surface load, artboard selection and draw orchestration.
//!
//! A [`SurfaceController`] owns everything native that belongs to one
//! surface: the decoded file, the selected artboard and the renderer. Its
//! load pipeline runs as a task on a [`LocalSpawn`] executor:
//!
//! 1. wait for visibility (lazy mode only)
//! 2. bootstrap the shared engine and fetch the bundle
//! 3. decode it and bind a renderer to the surface
//! 4. select the artboard
//! 5. publish the ready state
//!
//! Every source change bumps a generation counter. A task only commits if
//! the generation it started with is still current, so a superseded load
//! can never overwrite the state of a newer one.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::engine::{Artboard, Bootstrap, BundleFile, Engine, Instance, Owned, Surface};
use crate::render::render_artboard;
use crate::fetch::{Source, Transport};
use crate::runtime::{FrameStream, Runtime};
use crate::service::{Loaded, RiveService};
use crate::viewbox::{BoxCache, DEFAULT_VIEWBOX};
use crate::visibility::WhenVisible;
use crate::{Aabb, Alignment, CanvasOptions, Fit, RivError, RivResult, StateError};

/// Where the load pipeline of a surface currently stands.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadStatus {
    /// No source yet, or waiting for the surface to become visible.
    Idle,
    Loading,
    Ready,
    Failed(RivError),
}

/// Latest pipeline status plus everyone waiting for it to settle.
struct ReadySignal {
    status: LoadStatus,
    waiters: Vec<oneshot::Sender<RivResult<()>>>,
}

impl ReadySignal {
    fn settled(&self) -> Option<RivResult<()>> {
        match &self.status {
            LoadStatus::Ready => Some(Ok(())),
            LoadStatus::Failed(err) => Some(Err(err.clone())),
            LoadStatus::Idle | LoadStatus::Loading => None,
        }
    }

    fn set(&mut self, status: LoadStatus) {
        self.status = status;
        if let Some(result) = self.settled() {
            for waiter in self.waiters.drain(..) {
                let _ = waiter.send(result.clone());
            }
        }
    }
}

/// What artboard-change listeners are told about the newly selected artboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtboardInfo {
    pub name: String,
    pub animation_count: usize,
}

impl ArtboardInfo {
    fn of<A: Artboard>(artboard: &A) -> Self {
        Self { name: artboard.name(), animation_count: artboard.animation_count() }
    }
}

type ArtboardListener = Box<dyn FnMut(Option<&ArtboardInfo>)>;

struct State<E: Engine> {
    source: Option<Source>,
    artboard_name: Option<String>,
    generation: u64,
    torn_down: bool,
    lazy: bool,
    viewbox: String,
    fit: Fit,
    alignment: Alignment,
    surface: E::Surface,
    runtime: Option<Runtime<E>>,
    renderer: Owned<E::Renderer>,
    artboard: Owned<E::Artboard>,
    file: Owned<E::File>,
    boxes: BoxCache,
    signal: ReadySignal,
}

impl<E: Engine> State<E> {
    /// Release the renderer, the artboard and the file, in that order.
    fn release_handles(&mut self) {
        self.renderer.release();
        self.artboard.release();
        self.file.release();
    }

    fn tear_down(&mut self) {
        self.torn_down = true;
        self.generation += 1;
        self.release_handles();
        self.runtime = None;
        // Pending waiters observe the dropped senders as `TornDown`.
        self.signal.waiters.clear();
    }
}

struct Inner<E: Engine> {
    state: RefCell<State<E>>,
    listeners: RefCell<Vec<ArtboardListener>>,
    /// Teardown requested while the state was borrowed.
    teardown_pending: Cell<bool>,
}

impl<E: Engine> Inner<E> {
    /// Notify listeners with no controller borrow held, so they may call back
    /// into the controller. Listeners added during the call are kept.
    fn emit_artboard_change(&self, info: Option<ArtboardInfo>) {
        let Ok(mut guard) = self.listeners.try_borrow_mut() else {
            tracing::warn!("artboard changed from inside a listener; nested notification skipped");
            return;
        };
        let mut listeners = std::mem::take(&mut *guard);
        drop(guard);

        for listener in listeners.iter_mut() {
            listener(info.as_ref());
        }

        let mut guard = self.listeners.borrow_mut();
        let added = std::mem::take(&mut *guard);
        listeners.extend(added);
        *guard = listeners;
    }

    /// Run a teardown that could not run earlier because the state was borrowed.
    fn apply_pending_teardown(&self) {
        if !self.teardown_pending.get() {
            return;
        }
        if let Ok(mut state) = self.state.try_borrow_mut() {
            self.teardown_pending.set(false);
            state.tear_down();
        }
    }

    fn is_torn_down(&self) -> bool {
        self.apply_pending_teardown();
        self.teardown_pending.get() || self.state.try_borrow().is_ok_and(|state| state.torn_down)
    }

    /// Replace the selected artboard from the loaded file, then publish ready.
    fn select_artboard(&self) {
        let info = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if matches!(state.signal.status, LoadStatus::Failed(_)) {
                return;
            }
            let Some(file) = state.file.get() else {
                // Selection happens once the pending load commits.
                return;
            };
            state.artboard.release();
            let selected = match state.artboard_name.as_deref() {
                Some(name) => file.artboard_by_name(name),
                None => file.default_artboard(),
            };
            match &selected {
                Some(artboard) => tracing::debug!(artboard = %artboard.name(), "artboard selected"),
                None => tracing::warn!(requested = ?state.artboard_name, "artboard not found in file"),
            }
            state.artboard.replace(selected);
            state.signal.set(LoadStatus::Ready);
            state.artboard.get().map(ArtboardInfo::of)
        };
        self.emit_artboard_change(info);
    }

    fn commit(&self, generation: u64, result: RivResult<Loaded<E>>) {
        if self.is_torn_down() {
            tracing::debug!(generation, "discarding load for a torn down surface");
            return;
        }
        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if state.generation != generation {
                tracing::debug!(generation, "discarding stale load");
                return;
            }
            let loaded = match result {
                Ok(loaded) => loaded,
                Err(err) => {
                    tracing::warn!(error = %err, "load failed");
                    // The previous source's bundle must not outlive the switch.
                    let had_artboard = state.artboard.is_live();
                    state.release_handles();
                    state.signal.set(LoadStatus::Failed(err));
                    drop(guard);
                    if had_artboard {
                        self.emit_artboard_change(None);
                    }
                    return;
                }
            };
            state.release_handles();
            state.file = loaded.file;
            let renderer = loaded.runtime.engine().make_renderer(&state.surface);
            state.renderer.replace(Some(renderer));
            state.runtime = Some(loaded.runtime);
        }
        self.select_artboard();
    }
}

/// Drives one drawing surface.
pub struct SurfaceController<B: Bootstrap, T: Transport> {
    service: Rc<RiveService<B, T>>,
    inner: Rc<Inner<B::Engine>>,
    when_visible: WhenVisible,
    spawner: Rc<dyn LocalSpawn>,
}

impl<B, T> SurfaceController<B, T>
where
    B: Bootstrap,
    T: Transport + 'static,
{
    /// Bind a controller to `surface`.
    ///
    /// `when_visible` gates loading in lazy mode; build it with
    /// [`crate::on_visible`] for the surface element.
    pub fn new(
        service: Rc<RiveService<B, T>>,
        surface: <B::Engine as Engine>::Surface,
        when_visible: WhenVisible,
        spawner: impl LocalSpawn + 'static,
    ) -> Self {
        let state = State {
            source: None,
            artboard_name: None,
            generation: 0,
            torn_down: false,
            lazy: false,
            viewbox: DEFAULT_VIEWBOX.to_string(),
            fit: Fit::default(),
            alignment: Alignment::default(),
            surface,
            runtime: None,
            renderer: Owned::empty(),
            artboard: Owned::empty(),
            file: Owned::empty(),
            boxes: BoxCache::new(),
            signal: ReadySignal { status: LoadStatus::Idle, waiters: Vec::new() },
        };
        Self {
            service,
            inner: Rc::new(Inner {
                state: RefCell::new(state),
                listeners: RefCell::new(Vec::new()),
                teardown_pending: Cell::new(false),
            }),
            when_visible,
            spawner: Rc::new(spawner),
        }
    }

    pub fn apply_options(&self, options: &CanvasOptions) {
        let mut state = self.inner.state.borrow_mut();
        state.viewbox = options.viewbox.clone();
        state.fit = options.fit;
        state.alignment = options.alignment;
        state.lazy = options.lazy;
    }

    /// Set the animation source. `None` clears the surface.
    ///
    /// Setting the same source again is a no-op.
    pub fn set_source(&self, source: Option<Source>) {
        if self.inner.is_torn_down() {
            return;
        }
        let mut state = self.inner.state.borrow_mut();
        if state.source == source {
            return;
        }
        state.generation += 1;
        let generation = state.generation;
        state.source = source.clone();

        let Some(source) = source else {
            tracing::debug!("source cleared");
            let had_artboard = state.artboard.is_live();
            state.release_handles();
            state.signal.set(LoadStatus::Idle);
            drop(state);
            if had_artboard {
                self.inner.emit_artboard_change(None);
            }
            return;
        };
        // The previous cycle's outcome must not be replayed for this one.
        let pending = if state.lazy { LoadStatus::Idle } else { LoadStatus::Loading };
        state.signal.set(pending);
        drop(state);
        self.spawn_load(generation, source);
    }

    /// Select an artboard by name, or the file's default with `None`.
    ///
    /// Only re-selects from the already loaded file; nothing is fetched again.
    pub fn set_artboard(&self, name: Option<String>) {
        if self.inner.is_torn_down() {
            return;
        }
        self.inner.state.borrow_mut().artboard_name = name;
        self.inner.select_artboard();
    }

    pub fn set_lazy(&self, lazy: bool) {
        self.inner.state.borrow_mut().lazy = lazy;
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.state.borrow().lazy
    }

    pub fn set_viewbox(&self, viewbox: impl Into<String>) {
        self.inner.state.borrow_mut().viewbox = viewbox.into();
    }

    pub fn set_fit(&self, fit: Fit) {
        self.inner.state.borrow_mut().fit = fit;
    }

    pub fn set_alignment(&self, alignment: Alignment) {
        self.inner.state.borrow_mut().alignment = alignment;
    }

    /// Resize the surface width; `None` keeps the current width.
    pub fn set_width(&self, width: Option<u32>) {
        if let Some(width) = width {
            self.inner.state.borrow_mut().surface.set_width(width);
        }
    }

    /// Resize the surface height; `None` keeps the current height.
    pub fn set_height(&self, height: Option<u32>) {
        if let Some(height) = height {
            self.inner.state.borrow_mut().surface.set_height(height);
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.state.borrow().surface.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.state.borrow().surface.height()
    }

    pub fn status(&self) -> LoadStatus {
        self.inner.state.borrow().signal.status.clone()
    }

    /// Name of the selected artboard.
    pub fn artboard_name(&self) -> Option<String> {
        self.inner.state.borrow().artboard.get().map(|a| a.name())
    }

    /// Number of animations in the selected artboard.
    pub fn animation_count(&self) -> Option<usize> {
        self.inner.state.borrow().artboard.get().map(|a| a.animation_count())
    }

    /// Device box for the current viewbox and surface size (memoized).
    pub fn device_box(&self) -> RivResult<Rc<Aabb>> {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        let (width, height) = (state.surface.width(), state.surface.height());
        state.boxes.get(&state.viewbox, width, height)
    }

    /// The engine's shared frame ticker, once bootstrapped.
    pub fn frames(&self) -> Option<FrameStream<B::Engine>> {
        self.service.frames()
    }

    /// Call `listener` each time an artboard is selected or cleared.
    ///
    /// Listeners run with no borrow of the controller held and may call any
    /// of its methods, `draw` included.
    pub fn on_artboard_change(&self, listener: impl FnMut(Option<&ArtboardInfo>) + 'static) {
        self.inner.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Resolves with the outcome of the latest load cycle.
    ///
    /// A settled cycle is replayed immediately; otherwise this waits for the
    /// pending (or next) one without starting any work itself.
    pub fn ready(&self) -> impl std::future::Future<Output = RivResult<()>> + 'static {
        let torn_down = self.inner.is_torn_down();
        let mut state = self.inner.state.borrow_mut();
        let settled = if torn_down {
            Some(Err(StateError::TornDown.into()))
        } else {
            state.signal.settled()
        };
        let waiter = match settled {
            Some(_) => None,
            None => {
                let (tx, rx) = oneshot::channel();
                state.signal.waiters.push(tx);
                Some(rx)
            }
        };
        async move {
            match (settled, waiter) {
                (Some(result), _) => result,
                (None, Some(rx)) => rx.await.unwrap_or_else(|_| Err(StateError::TornDown.into())),
                (None, None) => Err(StateError::TornDown.into()),
            }
        }
    }

    /// Advance `instance` and the artboard by `delta` seconds, then repaint.
    ///
    /// `mix` (default 1) blends a linear animation's pose; it is ignored for
    /// state machines. Fails without touching the surface when the runtime,
    /// the artboard or the renderer is missing.
    pub fn draw(&self, instance: Instance<'_, B::Engine>, delta: f64, mix: Option<f64>) -> RivResult<()> {
        if self.inner.is_torn_down() {
            return Err(StateError::TornDown.into());
        }
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        if state.runtime.is_none() {
            return Err(StateError::MissingRuntime.into());
        }
        let Some(artboard) = state.artboard.get_mut() else {
            return Err(StateError::MissingArtboard.into());
        };
        let Some(renderer) = state.renderer.get_mut() else {
            return Err(StateError::MissingRenderer.into());
        };
        let (width, height) = (state.surface.width(), state.surface.height());
        let device_box = state.boxes.get(&state.viewbox, width, height)?;

        instance.advance(delta, mix.unwrap_or(1.0));
        artboard.advance(delta);

        render_artboard(artboard, renderer, state.fit, state.alignment, &device_box);
        Ok(())
    }

    /// Release the renderer, the artboard and the file. Safe to call repeatedly.
    ///
    /// Called while the controller is borrowed (from inside an engine
    /// callback), the surface stops accepting work at once and the handles
    /// are released on the next call into the controller.
    pub fn teardown(&self) {
        let Ok(mut state) = self.inner.state.try_borrow_mut() else {
            tracing::debug!("controller busy, deferring teardown");
            self.inner.teardown_pending.set(true);
            return;
        };
        self.inner.teardown_pending.set(false);
        if !state.torn_down {
            tracing::debug!("tearing down surface controller");
        }
        state.tear_down();
    }

    fn spawn_load(&self, generation: u64, source: Source) {
        let inner = Rc::downgrade(&self.inner);
        let service = Rc::clone(&self.service);
        let when_visible = self.when_visible.clone();
        let task = load_cycle(inner, service, when_visible, generation, source);
        if let Err(err) = self.spawner.spawn_local(task) {
            tracing::error!(error = %err, "could not spawn load task");
            self.inner
                .state
                .borrow_mut()
                .signal
                .set(LoadStatus::Failed(RivError::runtime(format!("executor unavailable: {err}"))));
        }
    }
}

impl<B: Bootstrap, T: Transport> Drop for SurfaceController<B, T> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.state.try_borrow_mut() {
            state.tear_down();
        }
    }
}

/// One run of the load pipeline for `generation`.
async fn load_cycle<B, T>(
    inner: Weak<Inner<B::Engine>>,
    service: Rc<RiveService<B, T>>,
    when_visible: WhenVisible,
    generation: u64,
    source: Source,
) where
    B: Bootstrap,
    T: Transport,
{
    let lazy = match inner.upgrade() {
        Some(inner) => inner.state.borrow().lazy,
        None => return,
    };
    if lazy && !when_visible.wait().await {
        tracing::debug!("surface never became visible, not loading");
        return;
    }

    {
        let Some(inner) = inner.upgrade() else { return };
        let mut state = inner.state.borrow_mut();
        if state.torn_down || state.generation != generation {
            return;
        }
        state.signal.set(LoadStatus::Loading);
    }

    tracing::debug!(generation, "loading source");
    let result = service.load(&source).await;

    // A dropped controller or a newer source drops `result`, releasing its file.
    if let Some(inner) = inner.upgrade() {
        inner.commit(generation, result);
    }
}
