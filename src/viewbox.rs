//! Viewbox to device box computation and its memoization.

use std::collections::HashMap;
use std::rc::Rc;

use crate::{Aabb, RivError, RivResult};

/// Viewbox used when none is configured.
pub const DEFAULT_VIEWBOX: &str = "0 0 100% 100%";

/// One token of a viewbox string.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewboxToken {
    /// `<number>%`, a percentage of the axis size.
    Percent(f64),
    /// `<number>`, an absolute value divided by the axis size.
    Absolute(f64),
}

impl ViewboxToken {
    fn parse(token: &str) -> RivResult<Self> {
        let invalid = || RivError::config(format!("invalid viewbox token {token:?}"));
        match token.strip_suffix('%') {
            Some(number) => number.parse().map(ViewboxToken::Percent).map_err(|_| invalid()),
            None => token.parse().map(ViewboxToken::Absolute).map_err(|_| invalid()),
        }
    }

    /// Fraction of `size` this token stands for.
    #[inline]
    fn fraction(&self, size: f64) -> f64 {
        match *self {
            ViewboxToken::Percent(p) => p / 100.0,
            ViewboxToken::Absolute(v) => v / size,
        }
    }
}

/// Split a viewbox string into its four `minX minY maxX maxY` tokens.
///
/// ## Example
///
/// ```rust
/// use riv_core_view::viewbox::{parse_viewbox, ViewboxToken};
///
/// let tokens = parse_viewbox("0 0 100% 100%").unwrap();
/// assert_eq!(tokens[2], ViewboxToken::Percent(100.0));
/// assert!(parse_viewbox("0 0 100%").is_err());
/// ```
pub fn parse_viewbox(viewbox: &str) -> RivResult<[ViewboxToken; 4]> {
    let tokens: Vec<&str> = viewbox.split_whitespace().collect();
    let [min_x, min_y, max_x, max_y] = tokens.as_slice() else {
        return Err(RivError::config(format!(
            "viewbox should look like \"{DEFAULT_VIEWBOX}\", got {viewbox:?} ({} tokens)",
            tokens.len()
        )));
    };
    Ok([
        ViewboxToken::parse(min_x)?,
        ViewboxToken::parse(min_y)?,
        ViewboxToken::parse(max_x)?,
        ViewboxToken::parse(max_y)?,
    ])
}

/// Map a viewbox onto a surface of `width` x `height` pixels.
///
/// Even tokens use the width and odd tokens the height. Min-side tokens are
/// `-size * fraction`, max-side tokens are `size / fraction`.
pub fn compute_box(viewbox: &str, width: u32, height: u32) -> RivResult<Aabb> {
    let tokens = parse_viewbox(viewbox)?;
    let mut edges = [0.0; 4];
    for (i, token) in tokens.iter().enumerate() {
        let size = f64::from(if i % 2 == 0 { width } else { height });
        let fraction = token.fraction(size);
        edges[i] = if i < 2 { -size * fraction } else { size / fraction };
    }
    let [min_x, min_y, max_x, max_y] = edges;
    Ok(Aabb::new(min_x, min_y, max_x, max_y))
}

/// Memoizes [`compute_box`] by its exact `(viewbox, width, height)` inputs.
///
/// Entries are never evicted: each key fully determines its value, and the
/// number of distinct surface sizes seen by one surface stays small.
#[derive(Debug, Default)]
pub struct BoxCache {
    boxes: HashMap<(String, u32, u32), Rc<Aabb>>,
    computations: usize,
}

impl BoxCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the device box for these inputs, computing it on first use.
    ///
    /// Malformed viewboxes are not cached, so each call reports the error.
    pub fn get(&mut self, viewbox: &str, width: u32, height: u32) -> RivResult<Rc<Aabb>> {
        let key = (viewbox.to_owned(), width, height);
        if let Some(cached) = self.boxes.get(&key) {
            return Ok(Rc::clone(cached));
        }
        self.computations += 1;
        let computed = Rc::new(compute_box(viewbox, width, height)?);
        self.boxes.insert(key, Rc::clone(&computed));
        Ok(computed)
    }

    /// Number of times a box was actually computed.
    #[inline]
    pub fn computations(&self) -> usize {
        self.computations
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
