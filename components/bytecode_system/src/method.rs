//! Method descriptors
//!
//! Immutable descriptions of a method's signature and body, produced by the
//! bytecode loader and referenced by integer id from inline operands.

use core_types::StringId;

use crate::value::ConstValue;

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    /// Multiname index of the declared type (`None` = untyped `*`)
    pub type_name: Option<u32>,
    /// Default value for an optional parameter
    pub default: Option<ConstValue>,
}

impl ParamInfo {
    /// Untyped required parameter
    pub fn untyped() -> Self {
        Self {
            type_name: None,
            default: None,
        }
    }

    /// Typed required parameter
    pub fn typed(type_name: u32) -> Self {
        Self {
            type_name: Some(type_name),
            default: None,
        }
    }

    /// Make this parameter optional
    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// Method flags relevant to frame setup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodFlags {
    /// Extra arguments are collected into a rest array
    pub need_rest: bool,
    /// All arguments are collected into an `arguments` array
    pub need_arguments: bool,
    /// The body may change the default XML namespace
    pub set_dxns: bool,
}

/// One exception-range table entry
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    /// First covered offset (inclusive)
    pub from: u32,
    /// Last covered offset (exclusive)
    pub to: u32,
    /// Handler entry offset
    pub target: u32,
    /// Multiname index of the caught type (`None` = catch everything)
    pub exc_type: Option<u32>,
}

impl ExceptionInfo {
    /// Handler catching everything thrown in `[from, to)`
    pub fn catch_all(from: u32, to: u32, target: u32) -> Self {
        Self {
            from,
            to,
            target,
            exc_type: None,
        }
    }

    /// Handler catching values of one type thrown in `[from, to)`
    pub fn typed(from: u32, to: u32, target: u32, exc_type: u32) -> Self {
        Self {
            from,
            to,
            target,
            exc_type: Some(exc_type),
        }
    }

    /// Whether `offset` lies in the covered range
    pub fn covers(&self, offset: usize) -> bool {
        offset >= self.from as usize && offset < self.to as usize
    }
}

/// Executable body of a method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Code buffer
    pub code: Vec<u8>,
    /// Operand stack bound
    pub max_stack: u32,
    /// Number of locals, receiver included
    pub local_count: u32,
    /// Scope stack bound
    pub max_scope_depth: u32,
    /// Exception-range table, innermost first
    pub exceptions: Vec<ExceptionInfo>,
}

impl MethodBody {
    /// Body with default frame bounds
    pub fn new(code: Vec<u8>) -> Self {
        Self {
            code,
            max_stack: 32,
            local_count: 8,
            max_scope_depth: 8,
            exceptions: Vec::new(),
        }
    }

    /// Set the operand stack bound
    pub fn with_max_stack(mut self, max_stack: u32) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Set the local count
    pub fn with_locals(mut self, local_count: u32) -> Self {
        self.local_count = local_count;
        self
    }

    /// Set the scope stack bound
    pub fn with_scope_depth(mut self, depth: u32) -> Self {
        self.max_scope_depth = depth;
        self
    }

    /// Append an exception handler
    pub fn with_handler(mut self, handler: ExceptionInfo) -> Self {
        self.exceptions.push(handler);
        self
    }
}

/// Method descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Debug name
    pub name: StringId,
    /// Declared parameters
    pub params: Vec<ParamInfo>,
    /// Multiname index of the declared return type (`None` = `*`)
    pub return_type: Option<u32>,
    /// Frame setup flags
    pub flags: MethodFlags,
    /// Body, absent for native and interface methods
    pub body: Option<MethodBody>,
}

impl MethodInfo {
    /// Method with no parameters and no body
    pub fn new(name: StringId) -> Self {
        Self {
            name,
            params: Vec::new(),
            return_type: None,
            flags: MethodFlags::default(),
            body: None,
        }
    }

    /// Append a parameter
    pub fn param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Set the declared return type
    pub fn returns(mut self, type_name: u32) -> Self {
        self.return_type = Some(type_name);
        self
    }

    /// Collect extra arguments into a rest array
    pub fn rest(mut self) -> Self {
        self.flags.need_rest = true;
        self
    }

    /// Collect all arguments into an `arguments` array
    pub fn arguments(mut self) -> Self {
        self.flags.need_arguments = true;
        self
    }

    /// Attach a body
    pub fn body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Number of leading parameters without a default
    pub fn required_params(&self) -> usize {
        self.params
            .iter()
            .rposition(|p| p.default.is_none())
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// True when no parameter declares a type
    pub fn is_untyped(&self) -> bool {
        self.params.iter().all(|p| p.type_name.is_none())
    }
}
