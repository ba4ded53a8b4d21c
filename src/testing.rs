//! In-memory engine, bootstrap and transport doubles for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use futures::channel::oneshot;

use crate::engine::{
    Artboard, Bootstrap, BundleFile, Engine, LinearAnimationInstance, NativeHandle, Renderer,
    StateMachineInstance, Surface,
};
use crate::fetch::{Transport, TransportError};
use crate::render::compute_alignment;
use crate::{Aabb, Alignment, Fit, RivError, RivResult};

/// Route `tracing` output to the test harness. Safe to call from every test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Shared record of native calls, in order.
#[derive(Clone, Default)]
pub(crate) struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }
}

pub(crate) struct FakeSurface {
    pub width: u32,
    pub height: u32,
}

impl Surface for FakeSurface {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn set_width(&mut self, width: u32) {
        self.width = width;
    }
    fn set_height(&mut self, height: u32) {
        self.height = height;
    }
}

pub(crate) struct FakeRenderer {
    log: Log,
}

impl NativeHandle for FakeRenderer {
    fn delete(&mut self) {
        self.log.push("delete renderer");
    }
}

impl Renderer for FakeRenderer {
    fn clear(&mut self) {
        self.log.push("clear");
    }
    fn save(&mut self) {
        self.log.push("save");
    }
    fn restore(&mut self) {
        self.log.push("restore");
    }
    /// Logs the placement transform as `[scale_x scale_y tx ty]`.
    fn align(&mut self, fit: Fit, alignment: Alignment, frame: &Aabb, content: &Aabb) {
        let m = compute_alignment(fit, alignment, frame, content);
        self.log.push(format!("align {fit} {alignment} [{} {} {} {}]", m.a, m.d, m.tx, m.ty));
    }
}

pub(crate) struct FakeArtboard {
    name: String,
    log: Log,
}

impl NativeHandle for FakeArtboard {
    fn delete(&mut self) {
        self.log.push(format!("delete artboard {}", self.name));
    }
}

impl Artboard for FakeArtboard {
    type Renderer = FakeRenderer;

    fn name(&self) -> String {
        self.name.clone()
    }
    fn bounds(&self) -> Aabb {
        Aabb::new(0.0, 0.0, 500.0, 500.0)
    }
    fn animation_count(&self) -> usize {
        2
    }
    fn advance(&mut self, seconds: f64) {
        self.log.push(format!("advance artboard {seconds}"));
    }
    fn draw(&mut self, _renderer: &mut FakeRenderer) {
        self.log.push(format!("draw {}", self.name));
    }
}

/// A decoded file. The bytes are the file name; artboards are `{name}` and `{name}-alt`.
pub(crate) struct FakeFile {
    name: String,
    log: Log,
}

impl NativeHandle for FakeFile {
    fn delete(&mut self) {
        self.log.push(format!("delete file {}", self.name));
    }
}

impl BundleFile for FakeFile {
    type Artboard = FakeArtboard;

    fn artboard_by_name(&self, name: &str) -> Option<FakeArtboard> {
        let known = name == self.name || name == format!("{}-alt", self.name);
        known.then(|| {
            self.log.push(format!("new artboard {name}"));
            FakeArtboard { name: name.to_owned(), log: self.log.clone() }
        })
    }

    fn default_artboard(&self) -> Option<FakeArtboard> {
        self.artboard_by_name(&self.name.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeStateMachine {
    pub advanced: f64,
}

impl StateMachineInstance for FakeStateMachine {
    fn advance(&mut self, seconds: f64) {
        self.advanced += seconds;
    }
}

#[derive(Default)]
pub(crate) struct FakeLinear {
    pub advanced: f64,
    pub mixes: Vec<f64>,
}

impl LinearAnimationInstance for FakeLinear {
    fn advance(&mut self, seconds: f64) {
        self.advanced += seconds;
    }
    fn apply(&mut self, mix: f64) {
        self.mixes.push(mix);
    }
}

pub(crate) struct FakeEngine {
    pub log: Log,
    frames: RefCell<Vec<Box<dyn FnOnce(f64)>>>,
    pub frame_requests: Cell<usize>,
}

impl FakeEngine {
    pub fn new(log: Log) -> Self {
        Self { log, frames: RefCell::new(Vec::new()), frame_requests: Cell::new(0) }
    }

    /// Run every pending animation frame callback with `time` (ms).
    pub fn fire_frame(&self, time: f64) {
        let pending = std::mem::take(&mut *self.frames.borrow_mut());
        for callback in pending {
            callback(time);
        }
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }
}

impl Engine for FakeEngine {
    type Surface = FakeSurface;
    type Renderer = FakeRenderer;
    type Artboard = FakeArtboard;
    type File = FakeFile;
    type StateMachine = FakeStateMachine;
    type LinearAnimation = FakeLinear;

    fn load(&self, bytes: &[u8]) -> RivResult<FakeFile> {
        if bytes.is_empty() {
            return Err(RivError::load("empty bundle"));
        }
        let name = String::from_utf8_lossy(bytes).into_owned();
        self.log.push(format!("load file {name}"));
        Ok(FakeFile { name, log: self.log.clone() })
    }

    fn make_renderer(&self, _surface: &FakeSurface) -> FakeRenderer {
        self.log.push("new renderer");
        FakeRenderer { log: self.log.clone() }
    }

    fn request_animation_frame(&self, callback: Box<dyn FnOnce(f64)>) {
        self.frame_requests.set(self.frame_requests.get() + 1);
        self.frames.borrow_mut().push(callback);
    }
}

#[derive(Default)]
struct BootstrapState {
    calls: Cell<usize>,
    urls: RefCell<Vec<String>>,
    deferred: Cell<bool>,
    pending: RefCell<VecDeque<oneshot::Sender<RivResult<()>>>>,
    fail: Cell<bool>,
}

/// Bootstrap double. Clones share call counters and pending attempts.
#[derive(Clone, Default)]
pub(crate) struct FakeBootstrap {
    state: Rc<BootstrapState>,
    pub log: Log,
}

impl FakeBootstrap {
    /// Attempts wait until [`FakeBootstrap::finish`] is called.
    pub fn deferred() -> Self {
        let bootstrap = Self::default();
        bootstrap.state.deferred.set(true);
        bootstrap
    }

    pub fn failing() -> Self {
        let bootstrap = Self::default();
        bootstrap.state.fail.set(true);
        bootstrap
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.fail.set(fail);
    }

    pub fn calls(&self) -> usize {
        self.state.calls.get()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.urls.borrow().clone()
    }

    /// Complete the oldest pending attempt.
    pub fn finish(&self, result: RivResult<()>) {
        if let Some(sender) = self.state.pending.borrow_mut().pop_front() {
            let _ = sender.send(result);
        }
    }
}

impl Bootstrap for FakeBootstrap {
    type Engine = FakeEngine;

    async fn instantiate(&self, binary_url: &str) -> RivResult<FakeEngine> {
        self.state.calls.set(self.state.calls.get() + 1);
        self.state.urls.borrow_mut().push(binary_url.to_owned());
        if self.state.deferred.get() {
            let (tx, rx) = oneshot::channel();
            self.state.pending.borrow_mut().push_back(tx);
            rx.await.map_err(|_| RivError::runtime("bootstrap abandoned"))??;
        }
        if self.state.fail.get() {
            return Err(RivError::runtime("wasm instantiation failed"));
        }
        Ok(FakeEngine::new(self.log.clone()))
    }
}

#[derive(Default)]
struct TransportState {
    files: RefCell<HashMap<String, Vec<u8>>>,
    requests: RefCell<Vec<String>>,
    deferred: Cell<bool>,
    pending: RefCell<Vec<(String, oneshot::Sender<()>)>>,
}

/// Transport double serving registered files, 404 otherwise.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    state: Rc<TransportState>,
}

impl FakeTransport {
    /// Requests wait until [`FakeTransport::complete`] is called for their url.
    pub fn deferred() -> Self {
        let transport = Self::default();
        transport.state.deferred.set(true);
        transport
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.state.files.borrow_mut().insert(url.to_owned(), bytes);
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.borrow().clone()
    }

    /// Let the oldest pending request for `url` proceed.
    pub fn complete(&self, url: &str) {
        let mut pending = self.state.pending.borrow_mut();
        if let Some(index) = pending.iter().position(|(u, _)| u == url) {
            let (_, sender) = pending.remove(index);
            let _ = sender.send(());
        }
    }
}

impl Transport for FakeTransport {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.state.requests.borrow_mut().push(url.to_owned());
        if self.state.deferred.get() {
            let (tx, rx) = oneshot::channel();
            self.state.pending.borrow_mut().push((url.to_owned(), tx));
            rx.await.map_err(|_| TransportError::Network {
                url: url.to_owned(),
                message: "aborted".into(),
            })?;
        }
        self.state
            .files
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status { url: url.to_owned(), status: 404 })
    }
}
