use core::any::Any;
use std::sync::Arc;

/// Ordered collection of tokens, as produced by a firing and consumed by a
/// successor's input slots.
pub type TokenVec = Vec<Token>;

/// Type-erased value envelope transferred along one graph edge.
///
/// Tokens have reference semantics: cloning a token (as SPLIT fan-out does)
/// clones the handle, never the payload, so every consumer observes the same
/// underlying value. A MERGE node emits a single token whose payload is the
/// `Vec<Token>` of its inputs in slot order.
#[derive(Clone, derive_more::Debug)]
pub struct Token {
    #[debug(skip)]
    payload: Arc<dyn Any + Send + Sync>,
}

impl Token {
    /// Wraps a value into a token.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            payload: Arc::new(value),
        }
    }

    /// Typed view of the payload.
    ///
    /// # Panics
    /// When `T` is not the type the producer stored. Requesting the wrong
    /// type is a programming error in the graph definition, not a runtime
    /// condition the engine diagnoses.
    pub fn get<T: 'static>(&self) -> &T {
        self.downcast_ref()
            .expect("Token::get: payload type mismatch")
    }

    /// Typed view of the payload, `None` on type mismatch.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    /// Whether two tokens share one payload allocation.
    ///
    /// SPLIT replication guarantees `ptr_eq` between every fan-out copy and
    /// the original input token.
    pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
        Arc::ptr_eq(&lhs.payload, &rhs.payload)
    }
}
