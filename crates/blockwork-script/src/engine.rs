//! [`Engine`] implementation backed by the kernel-script interpreter.

use blockwork_core::{Engine, EngineError, ExecutionContext};

use crate::interp::Interpreter;

/// Declares the record every block is presented as.
const PRELUDE: &str = "record Block(data, inputs, index, min, max, dim, halo)";

/// Assembles `block` from the per-task bindings.
const BLOCK_STATEMENT: &str = "block = Block(_buf, _inputs, _index, _min, _max, _dim, _halo)";

/// The built-in engine. Every context is an independent [`Interpreter`].
///
/// All element kinds are supported: packed kinds are exposed as flat
/// arrays of their storage words.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptEngine;

impl ScriptEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl Engine for ScriptEngine {
    fn name(&self) -> &str {
        "kernel-script"
    }

    fn create_context(&self) -> Result<Box<dyn ExecutionContext>, EngineError> {
        Ok(Box::new(Interpreter::new()))
    }

    fn prelude(&self) -> &str {
        PRELUDE
    }

    fn block_statement(&self) -> &str {
        BLOCK_STATEMENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwork_core::Binding;

    #[test]
    fn prelude_defines_the_block_record() {
        let engine = ScriptEngine::new();
        let mut ctx = engine.create_context().unwrap();
        ctx.exec(engine.prelude()).unwrap();
        assert_eq!(ctx.names(), vec!["Block".to_string()]);
    }

    #[test]
    fn block_statement_consumes_the_task_bindings() {
        let engine = ScriptEngine::new();
        let mut ctx = engine.create_context().unwrap();
        ctx.exec(engine.prelude()).unwrap();
        for name in ["_buf", "_inputs", "_index", "_min", "_max", "_dim", "_halo"] {
            ctx.bind(name, Binding::Int(3)).unwrap();
        }
        ctx.exec(engine.block_statement()).unwrap();
        ctx.exec("k = block.index * 2").unwrap();
        assert_eq!(ctx.lookup("k").and_then(|b| b.as_f64()), Some(6.0));
    }
}
