use crate::token::{Token, TokenVec};

/// Error produced by a user callable.
pub type FunctionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A user computation attached to a STANDARD node.
///
/// `arity` is the number of input tokens the callable consumes and fixes the
/// node's input-slot count; `output_size` is the number of tokens it
/// produces and fixes the node's routing-map length. `execute` receives the
/// input tokens in slot order and must return exactly `output_size` tokens;
/// the engine verifies the length before delivery.
///
/// Implementations are expected to be deterministic with respect to their
/// inputs; the engine does not reason about side effects across nodes.
pub trait Function: Send + Sync {
    /// Number of input tokens consumed per firing.
    fn arity(&self) -> usize;

    /// Number of output tokens produced per firing.
    fn output_size(&self) -> usize;

    /// Runs the computation on one ordered input vector.
    fn execute(&self, inputs: &[Token]) -> Result<TokenVec, FunctionError>;
}

/// [`Function`] adapter binding a closure to declared input and output
/// arities.
pub struct FnFunction<F> {
    arity: usize,
    output_size: usize,
    callable: F,
}

impl<F> FnFunction<F>
where
    F: Fn(&[Token]) -> Result<TokenVec, FunctionError> + Send + Sync,
{
    /// Wraps `callable` as a function of `arity` inputs and `output_size`
    /// outputs.
    pub fn new(arity: usize, output_size: usize, callable: F) -> Self {
        Self {
            arity,
            output_size,
            callable,
        }
    }
}

impl<F> Function for FnFunction<F>
where
    F: Fn(&[Token]) -> Result<TokenVec, FunctionError> + Send + Sync,
{
    fn arity(&self) -> usize {
        self.arity
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn execute(&self, inputs: &[Token]) -> Result<TokenVec, FunctionError> {
        (self.callable)(inputs)
    }
}

/// Stand-in function carried by SPLIT and MERGE nodes.
///
/// Those nodes never invoke user code (replication and bundling are built
/// into the node), but every node holds a function reference so that
/// `clone_node` copies uniformly.
#[derive(Debug, Default, Clone, Copy)]
pub struct Placeholder;

impl Function for Placeholder {
    fn arity(&self) -> usize {
        0
    }

    fn output_size(&self) -> usize {
        0
    }

    fn execute(&self, _inputs: &[Token]) -> Result<TokenVec, FunctionError> {
        Ok(Vec::new())
    }
}
