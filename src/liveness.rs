//! Non-owning liveness probes
//!
//! A probe answers one question: is the observed object still alive? It must
//! never extend the object's lifetime.

use std::sync::{Arc, Weak};

/// Observe an object's lifetime without owning it
pub trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<T: ?Sized + Send + Sync> Liveness for Weak<T> {
    #[inline]
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}

/// Opt-in lifetime marker for objects that are not held in an `Arc`
///
/// Embed a token in the object; when the object is dropped the token goes
/// with it and every probe created from it reads dead.
///
/// ```
/// use leakwatch::{LifeToken, Observable};
///
/// struct Session {
///     token: LifeToken,
/// }
///
/// impl Observable for Session {
///     fn life_token(&self) -> &LifeToken {
///         &self.token
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct LifeToken {
    anchor: Arc<()>,
}

impl LifeToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe that reads dead once this token is dropped
    pub fn probe(&self) -> Weak<()> {
        Arc::downgrade(&self.anchor)
    }
}

/// Objects exposing an observable lifetime
pub trait Observable {
    fn life_token(&self) -> &LifeToken;
}
