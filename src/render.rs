//! Frame rendering: placing an artboard inside the device box and drawing it.

use crate::engine::{Artboard, Renderer};
use crate::{Aabb, Alignment, Fit};

/// 2D affine transform `[a b c d tx ty]`, mapping `(x, y)` to
/// `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat2D {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Mat2D {
    pub const IDENTITY: Mat2D = Mat2D { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.tx, self.b * x + self.d * y + self.ty)
    }
}

impl Default for Mat2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Scale factors `fit` applies to `content` so it sits in `frame`.
pub fn fit_scale(fit: Fit, frame: &Aabb, content: &Aabb) -> (f64, f64) {
    let sx = frame.width() / content.width();
    let sy = frame.height() / content.height();
    match fit {
        Fit::Fill      => (sx, sy),
        Fit::Contain   => uniform(sx.min(sy)),
        Fit::Cover     => uniform(sx.max(sy)),
        Fit::FitWidth  => uniform(sx),
        Fit::FitHeight => uniform(sy),
        Fit::None      => uniform(1.0),
        Fit::ScaleDown => uniform(sx.min(sy).min(1.0)),
    }
}

#[inline]
fn uniform(scale: f64) -> (f64, f64) {
    (scale, scale)
}

/// Transform placing `content` inside `frame` per `fit` and `alignment`.
///
/// The content's anchor point (its center shifted by the alignment) is moved
/// onto the frame's matching anchor point after scaling.
///
/// ## Example
///
/// ```rust
/// use riv_core_view::{Aabb, Alignment, Fit};
/// use riv_core_view::render::compute_alignment;
///
/// let frame = Aabb::new(0.0, 0.0, 200.0, 100.0);
/// let content = Aabb::new(0.0, 0.0, 50.0, 50.0);
/// let m = compute_alignment(Fit::Contain, Alignment::Center, &frame, &content);
/// // Scaled 2x and centered horizontally.
/// assert_eq!(m.apply(0.0, 0.0), (50.0, 0.0));
/// assert_eq!(m.apply(50.0, 50.0), (150.0, 100.0));
/// ```
pub fn compute_alignment(fit: Fit, alignment: Alignment, frame: &Aabb, content: &Aabb) -> Mat2D {
    let (ax, ay) = alignment.anchor();
    let (sx, sy) = fit_scale(fit, frame, content);

    let content_x = -content.min_x - content.width() / 2.0 - ax * content.width() / 2.0;
    let content_y = -content.min_y - content.height() / 2.0 - ay * content.height() / 2.0;
    let frame_x = frame.min_x + frame.width() / 2.0 + ax * frame.width() / 2.0;
    let frame_y = frame.min_y + frame.height() / 2.0 + ay * frame.height() / 2.0;

    Mat2D {
        a: sx,
        b: 0.0,
        c: 0.0,
        d: sy,
        tx: frame_x + sx * content_x,
        ty: frame_y + sy * content_y,
    }
}

/// Repaint `artboard` into `frame`: clear, align, draw, restore.
pub fn render_artboard<A: Artboard>(
    artboard: &mut A,
    renderer: &mut A::Renderer,
    fit: Fit,
    alignment: Alignment,
    frame: &Aabb,
) {
    renderer.clear();
    renderer.save();
    renderer.align(fit, alignment, frame, &artboard.bounds());
    artboard.draw(renderer);
    renderer.restore();
}

/// Browser bindings.
#[cfg(feature = "web")]
pub mod web {
    use futures::future::LocalFutureObj;
    use futures::task::{LocalSpawn, SpawnError};
    use js_sys::Uint8Array;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{
        Blob, Element, HtmlCanvasElement, IntersectionObserver, IntersectionObserverEntry,
        IntersectionObserverInit, Response,
    };

    use crate::engine::Surface;
    use crate::fetch::{Source, Transport, TransportError};
    use crate::visibility::{IntersectionEntry, ObserverHandle, VisibilityHost, VisibilitySupport};
    use crate::{RivError, RivResult};

    fn js_message(value: &JsValue) -> String {
        value.as_string().unwrap_or_else(|| format!("{value:?}"))
    }

    impl Surface for HtmlCanvasElement {
        fn width(&self) -> u32 {
            HtmlCanvasElement::width(self)
        }
        fn height(&self) -> u32 {
            HtmlCanvasElement::height(self)
        }
        fn set_width(&mut self, width: u32) {
            HtmlCanvasElement::set_width(self, width);
        }
        fn set_height(&mut self, height: u32) {
            HtmlCanvasElement::set_height(self, height);
        }
    }

    /// Transport over `window.fetch`.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct FetchTransport;

    impl Transport for FetchTransport {
        async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
            let network = |message: String| TransportError::Network { url: url.to_owned(), message };

            let window = web_sys::window().ok_or_else(|| network("no window available".into()))?;
            let response = JsFuture::from(window.fetch_with_str(url))
                .await
                .map_err(|e| network(js_message(&e)))?
                .dyn_into::<Response>()
                .map_err(|_| network("fetch did not return a Response".into()))?;

            if !response.ok() {
                return Err(TransportError::Status { url: url.to_owned(), status: response.status() });
            }

            let buffer = response.array_buffer().map_err(|e| network(js_message(&e)))?;
            let buffer = JsFuture::from(buffer).await.map_err(|e| network(js_message(&e)))?;
            Ok(Uint8Array::new(&buffer).to_vec())
        }
    }

    /// Read a `Blob`/`File` into a bytes source, without any network call.
    pub async fn read_blob(blob: &Blob) -> RivResult<Source> {
        let buffer = JsFuture::from(blob.array_buffer())
            .await
            .map_err(|e| RivError::load(js_message(&e)))?;
        Ok(Source::from(Uint8Array::new(&buffer).to_vec()))
    }

    /// Visibility through `IntersectionObserver`.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct DomVisibility;

    struct DomObserver {
        observer: Option<IntersectionObserver>,
        callback: Option<Closure<dyn FnMut(js_sys::Array)>>,
    }

    impl ObserverHandle for DomObserver {
        fn disconnect(&mut self) {
            if let Some(observer) = self.observer.take() {
                observer.disconnect();
            }
            // May run inside the callback itself; drop it once that call returns.
            if let Some(callback) = self.callback.take() {
                wasm_bindgen_futures::spawn_local(async move { drop(callback) });
            }
        }
    }

    impl Drop for DomObserver {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    impl VisibilityHost for DomVisibility {
        type Element = Element;

        fn support(&self) -> VisibilitySupport {
            let Some(window) = web_sys::window() else {
                return VisibilitySupport::Unavailable;
            };
            match js_sys::Reflect::has(&window, &JsValue::from_str("IntersectionObserver")) {
                Ok(true) => VisibilitySupport::Observer,
                _ => VisibilitySupport::NoObserver,
            }
        }

        fn observe(
            &self,
            element: &Element,
            mut on_change: Box<dyn FnMut(&[IntersectionEntry])>,
        ) -> Box<dyn ObserverHandle> {
            let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
                let entries: Vec<IntersectionEntry> = entries
                    .iter()
                    .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
                    .map(|entry| IntersectionEntry { intersection_ratio: entry.intersection_ratio() })
                    .collect();
                on_change(&entries);
            });

            let options = IntersectionObserverInit::new();
            options.set_threshold(&JsValue::from_f64(0.0));
            let observer = match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options) {
                Ok(observer) => {
                    observer.observe(element);
                    Some(observer)
                }
                Err(err) => {
                    tracing::warn!(error = %js_message(&err), "could not create IntersectionObserver");
                    None
                }
            };
            Box::new(DomObserver { observer, callback: Some(callback) })
        }
    }

    /// Runs load tasks on the browser's microtask queue.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct WasmSpawner;

    impl LocalSpawn for WasmSpawner {
        fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
            wasm_bindgen_futures::spawn_local(future);
            Ok(())
        }
    }
}
