//! Call frame for one method invocation
//!
//! Holds locals, the bounded operand stack, the local scope stack and the
//! closure's captured scope chain. Bound violations surface as
//! `VerifyError`.

use object_model::{ClassRef, Exception, ScopeChain, ScopeEntry, Value};

/// Per-invocation interpreter state
#[derive(Debug)]
pub struct CallFrame {
    /// Method id being executed
    pub method: u32,
    /// Locals; slot 0 is the receiver
    pub locals: Vec<Value>,
    stack: Vec<Value>,
    max_stack: usize,
    scope: Vec<ScopeEntry>,
    max_scope: usize,
    /// Scope chain captured when the function was created
    pub outer: ScopeChain,
    /// Offset of the instruction being executed
    pub pc: usize,
    /// Class that declared the method, for `super` lookups
    pub home: Option<ClassRef>,
}

impl CallFrame {
    /// Create a frame sized from the method's declared maxima
    pub fn new(
        method: u32,
        local_count: usize,
        max_stack: usize,
        max_scope: usize,
        outer: ScopeChain,
    ) -> Self {
        Self {
            method,
            locals: vec![Value::Undefined; local_count.max(1)],
            stack: Vec::with_capacity(max_stack.min(64)),
            max_stack,
            scope: Vec::with_capacity(max_scope.min(16)),
            max_scope,
            outer,
            pc: 0,
            home: None,
        }
    }

    /// Push onto the operand stack
    pub fn push(&mut self, value: Value) -> Result<(), Exception> {
        if self.stack.len() >= self.max_stack {
            return Err(Exception::verify_error(format!(
                "operand stack overflow at offset {}",
                self.pc
            )));
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop from the operand stack
    pub fn pop(&mut self) -> Result<Value, Exception> {
        self.stack.pop().ok_or_else(|| {
            Exception::verify_error(format!("operand stack underflow at offset {}", self.pc))
        })
    }

    /// Pop `n` values, returned in push order
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Exception> {
        if self.stack.len() < n {
            return Err(Exception::verify_error(format!(
                "operand stack underflow at offset {}",
                self.pc
            )));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    /// Top of the operand stack
    pub fn peek(&self) -> Result<&Value, Exception> {
        self.stack.last().ok_or_else(|| {
            Exception::verify_error(format!("operand stack underflow at offset {}", self.pc))
        })
    }

    /// Current operand stack depth
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Read a local
    pub fn local(&self, index: u32) -> Result<Value, Exception> {
        self.locals
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Exception::verify_error(format!("local {} out of range", index)))
    }

    /// Write a local
    pub fn set_local(&mut self, index: u32, value: Value) -> Result<(), Exception> {
        let slot = self
            .locals
            .get_mut(index as usize)
            .ok_or_else(|| Exception::verify_error(format!("local {} out of range", index)))?;
        *slot = value;
        Ok(())
    }

    /// Push a scope entry
    pub fn push_scope(&mut self, value: Value, with: bool) -> Result<(), Exception> {
        if value.is_nullish() {
            return Err(Exception::type_error("cannot push null or undefined onto the scope stack"));
        }
        if self.scope.len() >= self.max_scope {
            return Err(Exception::verify_error("scope stack overflow"));
        }
        self.scope.push(ScopeEntry { value, with });
        Ok(())
    }

    /// Pop a scope entry
    pub fn pop_scope(&mut self) -> Result<ScopeEntry, Exception> {
        self.scope
            .pop()
            .ok_or_else(|| Exception::verify_error("scope stack underflow"))
    }

    /// Local scope entry by depth, bottom first
    pub fn scope_at(&self, index: u32) -> Result<&ScopeEntry, Exception> {
        self.scope
            .get(index as usize)
            .ok_or_else(|| Exception::verify_error(format!("scope index {} out of range", index)))
    }

    /// Local scope entries, bottom first
    pub fn scope(&self) -> &[ScopeEntry] {
        &self.scope
    }

    /// Captured chain followed by the local scope stack, outermost first
    pub fn full_scope(&self) -> ScopeChain {
        self.outer.iter().chain(self.scope.iter()).cloned().collect()
    }

    /// Unwind for a handler: stack holds only `exception`, scopes emptied
    pub fn enter_handler(&mut self, exception: Value, target: usize) {
        self.stack.clear();
        self.stack.push(exception);
        self.scope.clear();
        self.pc = target;
    }
}
