//! Fallback Module
//!
//! Computes values for missing keys through a configured loader, or hands back
//! a literal default when no loader applies.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

// == Loader ==
/// A fallback loader with a call signature fixed at configuration time.
///
/// Each variant carries a declared arity which drives dispatch in
/// [`FallbackResolver::resolve`].
pub enum Loader<K, V> {
    /// Called with no arguments (arity 0)
    ZeroArg(Arc<dyn Fn() -> V + Send + Sync>),
    /// Called with the missing key (arity 1)
    Key(Arc<dyn Fn(&K) -> V + Send + Sync>),
    /// Called with the missing key followed by `extra` configured arguments
    /// (arity `extra + 1`)
    KeyWithArgs {
        extra: usize,
        call: Arc<dyn Fn(&K, &[Value]) -> V + Send + Sync>,
    },
}

impl<K, V> Loader<K, V> {
    pub fn zero_arg(f: impl Fn() -> V + Send + Sync + 'static) -> Self {
        Loader::ZeroArg(Arc::new(f))
    }

    pub fn key(f: impl Fn(&K) -> V + Send + Sync + 'static) -> Self {
        Loader::Key(Arc::new(f))
    }

    /// Loader expecting the key plus exactly `extra` configured arguments.
    pub fn with_args(
        extra: usize,
        f: impl Fn(&K, &[Value]) -> V + Send + Sync + 'static,
    ) -> Self {
        Loader::KeyWithArgs {
            extra,
            call: Arc::new(f),
        }
    }

    /// Declared number of parameters, key included.
    pub fn arity(&self) -> usize {
        match self {
            Loader::ZeroArg(_) => 0,
            Loader::Key(_) => 1,
            Loader::KeyWithArgs { extra, .. } => extra + 1,
        }
    }
}

impl<K, V> Clone for Loader<K, V> {
    fn clone(&self) -> Self {
        match self {
            Loader::ZeroArg(f) => Loader::ZeroArg(Arc::clone(f)),
            Loader::Key(f) => Loader::Key(Arc::clone(f)),
            Loader::KeyWithArgs { extra, call } => Loader::KeyWithArgs {
                extra: *extra,
                call: Arc::clone(call),
            },
        }
    }
}

impl<K, V> fmt::Debug for Loader<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("arity", &self.arity())
            .finish_non_exhaustive()
    }
}

// == Fallback Outcome ==
/// Result of resolving a missing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome<V> {
    /// Freshly computed by a loader; the caller should write it back
    Loaded(V),
    /// A literal default; must not be persisted as a fresh load
    Cached(V),
}

impl<V> FallbackOutcome<V> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FallbackOutcome::Loaded(_))
    }

    /// Returns the carried value, whichever variant holds it.
    pub fn into_inner(self) -> V {
        match self {
            FallbackOutcome::Loaded(value) | FallbackOutcome::Cached(value) => value,
        }
    }
}

// == Fallback Resolver ==
/// Chooses a loader for a missing key and dispatches on its arity.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackResolver;

impl FallbackResolver {
    // == Resolve ==
    /// Resolves a value for `key`.
    ///
    /// Loader precedence: `explicit`, then `default_loader`, then the literal
    /// `default_value`. A selected loader is dispatched on its arity `a` and
    /// `n = extra_args.len()`:
    /// - `a == 0`: called with nothing
    /// - `a == 1`: called with `key`
    /// - `a == n + 1`: called with `key` and all of `extra_args`
    /// - otherwise: not called, `Cached(default_value)` is returned
    pub fn resolve<K, V>(
        key: &K,
        explicit: Option<&Loader<K, V>>,
        default_loader: Option<&Loader<K, V>>,
        default_value: V,
        extra_args: &[Value],
    ) -> FallbackOutcome<V> {
        let Some(loader) = explicit.or(default_loader) else {
            trace!("No fallback loader configured, using literal default");
            return FallbackOutcome::Cached(default_value);
        };

        let arity = loader.arity();
        match loader {
            Loader::ZeroArg(f) => FallbackOutcome::Loaded(f()),
            Loader::Key(f) => FallbackOutcome::Loaded(f(key)),
            Loader::KeyWithArgs { call, .. } if arity == 1 => {
                FallbackOutcome::Loaded(call(key, &[]))
            }
            Loader::KeyWithArgs { call, .. } if arity == extra_args.len() + 1 => {
                FallbackOutcome::Loaded(call(key, extra_args))
            }
            Loader::KeyWithArgs { .. } => {
                // Misconfiguration is absorbed here rather than surfaced.
                warn!(
                    "Fallback loader arity {} does not match {} configured arguments, using default",
                    arity,
                    extra_args.len()
                );
                FallbackOutcome::Cached(default_value)
            }
        }
    }
}
