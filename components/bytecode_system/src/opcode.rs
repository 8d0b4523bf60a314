//! Bytecode opcodes for the AVM interpreter
//!
//! Every instruction is one opcode byte followed by a fixed-size inline
//! operand whose shape is given by [`OperandLayout`]. Integer operands are
//! little-endian `u32`, branch offsets are little-endian `i32` relative to
//! the end of the branch instruction, and `pushdouble` carries the 8 bytes
//! of an `f64` immediately after the opcode.

/// Shape of the inline operand following an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operand
    None,
    /// One `u32` (pool index, local index, argument count or immediate)
    U32,
    /// Two `u32` (multiname index + argument count, or two registers)
    U32Pair,
    /// One `i32` branch offset
    Branch,
    /// One `f64`
    F64,
}

impl OperandLayout {
    /// Number of operand bytes following the opcode byte
    pub fn width(self) -> usize {
        match self {
            OperandLayout::None => 0,
            OperandLayout::U32 | OperandLayout::Branch => 4,
            OperandLayout::U32Pair | OperandLayout::F64 => 8,
        }
    }
}

macro_rules! opcodes {
    ($($(#[$doc:meta])* $name:ident = $byte:literal, $layout:ident, $mnemonic:literal;)*) => {
        /// Bytecode opcodes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($(#[$doc])* $name = $byte,)*
        }

        impl Opcode {
            /// Decode an opcode byte
            pub fn from_byte(byte: u8) -> Option<Opcode> {
                match byte {
                    $($byte => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// Operand shape of this opcode
            pub fn layout(self) -> OperandLayout {
                match self {
                    $(Opcode::$name => OperandLayout::$layout,)*
                }
            }

            /// Assembly mnemonic
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    /// Do nothing
    Nop = 0x02, None, "nop";
    /// Pop a value and throw it
    Throw = 0x03, None, "throw";
    /// Read a property through the super class's traits
    GetSuper = 0x04, U32, "getsuper";
    /// Write a property through the super class's traits
    SetSuper = 0x05, U32, "setsuper";
    /// Set the frame's default XML namespace from a string
    Dxns = 0x06, U32, "dxns";
    /// Set the frame's default XML namespace from the stack
    DxnsLate = 0x07, None, "dxnslate";
    /// Reset a local to undefined
    Kill = 0x08, U32, "kill";
    /// Branch target marker
    Label = 0x09, None, "label";
    /// Unconditional branch
    Jump = 0x10, Branch, "jump";
    /// Branch if truthy
    IfTrue = 0x11, Branch, "iftrue";
    /// Branch if falsy
    IfFalse = 0x12, Branch, "iffalse";
    /// Branch if loosely equal
    IfEq = 0x13, Branch, "ifeq";
    /// Branch if not loosely equal
    IfNe = 0x14, Branch, "ifne";
    /// Branch if less than
    IfLt = 0x15, Branch, "iflt";
    /// Branch if less than or equal
    IfLe = 0x16, Branch, "ifle";
    /// Branch if greater than
    IfGt = 0x17, Branch, "ifgt";
    /// Branch if greater than or equal
    IfGe = 0x18, Branch, "ifge";
    /// Branch if strictly equal
    IfStrictEq = 0x19, Branch, "ifstricteq";
    /// Branch if not strictly equal
    IfStrictNe = 0x1a, Branch, "ifstrictne";
    /// Push an object onto the scope stack as a `with` scope
    PushWith = 0x1c, None, "pushwith";
    /// Pop the scope stack
    PopScope = 0x1d, None, "popscope";
    /// Enumeration: property name at index
    NextName = 0x1e, None, "nextname";
    /// Push null
    PushNull = 0x20, None, "pushnull";
    /// Push undefined
    PushUndefined = 0x21, None, "pushundefined";
    /// Enumeration: property value at index
    NextValue = 0x23, None, "nextvalue";
    /// Push true
    PushTrue = 0x26, None, "pushtrue";
    /// Push false
    PushFalse = 0x27, None, "pushfalse";
    /// Push NaN
    PushNaN = 0x28, None, "pushnan";
    /// Discard the top of stack
    Pop = 0x29, None, "pop";
    /// Duplicate the top of stack
    Dup = 0x2a, None, "dup";
    /// Swap the two topmost values
    Swap = 0x2b, None, "swap";
    /// Push an interned string
    PushString = 0x2c, U32, "pushstring";
    /// Push a signed 32-bit immediate
    PushInt = 0x2d, U32, "pushint";
    /// Push an unsigned 32-bit immediate
    PushUint = 0x2e, U32, "pushuint";
    /// Push a double immediate
    PushDouble = 0x2f, F64, "pushdouble";
    /// Push an object onto the scope stack
    PushScope = 0x30, None, "pushscope";
    /// Push a namespace from the pool
    PushNamespace = 0x31, U32, "pushnamespace";
    /// Advance an enumeration held in two locals
    HasNext2 = 0x32, U32Pair, "hasnext2";
    /// Create a closure over the current scope chain
    NewFunction = 0x40, U32, "newfunction";
    /// Call a function value
    Call = 0x41, U32, "call";
    /// Construct from a class or function value
    Construct = 0x42, U32, "construct";
    /// Call a method through the super class
    CallSuper = 0x45, U32Pair, "callsuper";
    /// Call a property of an object
    CallProperty = 0x46, U32Pair, "callproperty";
    /// Return undefined
    ReturnVoid = 0x47, None, "returnvoid";
    /// Return the top of stack
    ReturnValue = 0x48, None, "returnvalue";
    /// Run the super class constructor on the receiver
    ConstructSuper = 0x49, U32, "constructsuper";
    /// Construct a class found by property lookup
    ConstructProp = 0x4a, U32Pair, "constructprop";
    /// Call a method through the super class, discarding the result
    CallSuperVoid = 0x4e, U32Pair, "callsupervoid";
    /// Call a property, discarding the result
    CallPropVoid = 0x4f, U32Pair, "callpropvoid";
    /// Build an object from name/value pairs
    NewObject = 0x55, U32, "newobject";
    /// Build an array from stack values
    NewArray = 0x56, U32, "newarray";
    /// Link and initialize a class
    NewClass = 0x58, U32, "newclass";
    /// Find the object defining a property, raising on a miss
    FindPropStrict = 0x5d, U32, "findpropstrict";
    /// Find the object defining a property, global object on a miss
    FindProperty = 0x5e, U32, "findproperty";
    /// findpropstrict followed by getproperty
    GetLex = 0x60, U32, "getlex";
    /// Write a property
    SetProperty = 0x61, U32, "setproperty";
    /// Push a local
    GetLocal = 0x62, U32, "getlocal";
    /// Store into a local
    SetLocal = 0x63, U32, "setlocal";
    /// Push the global object
    GetGlobalScope = 0x64, None, "getglobalscope";
    /// Push a scope stack entry
    GetScopeObject = 0x65, U32, "getscopeobject";
    /// Read a property
    GetProperty = 0x66, U32, "getproperty";
    /// Initialize a property (may write constants)
    InitProperty = 0x68, U32, "initproperty";
    /// Delete a property
    DeleteProperty = 0x6a, U32, "deleteproperty";
    /// Read a slot by position
    GetSlot = 0x6c, U32, "getslot";
    /// Write a slot by position
    SetSlot = 0x6d, U32, "setslot";
    /// Convert to String
    ConvertS = 0x70, None, "convert_s";
    /// Convert to int
    ConvertI = 0x73, None, "convert_i";
    /// Convert to uint
    ConvertU = 0x74, None, "convert_u";
    /// Convert to Number
    ConvertD = 0x75, None, "convert_d";
    /// Convert to Boolean
    ConvertB = 0x76, None, "convert_b";
    /// Coerce to a named type
    Coerce = 0x80, U32, "coerce";
    /// Coerce to any (no-op)
    CoerceA = 0x82, None, "coerce_a";
    /// Coerce to String, keeping null
    CoerceS = 0x85, None, "coerce_s";
    /// Value if of named type, else null
    AsType = 0x86, U32, "astype";
    /// Value if of type on stack, else null
    AsTypeLate = 0x87, None, "astypelate";
    /// Numeric negation
    Negate = 0x90, None, "negate";
    /// Add one
    Increment = 0x91, None, "increment";
    /// Subtract one
    Decrement = 0x93, None, "decrement";
    /// Push the typeof string
    TypeOf = 0x95, None, "typeof";
    /// Logical not
    Not = 0x96, None, "not";
    /// Bitwise not
    BitNot = 0x97, None, "bitnot";
    /// Generic addition
    Add = 0xa0, None, "add";
    /// Generic subtraction
    Subtract = 0xa1, None, "subtract";
    /// Generic multiplication
    Multiply = 0xa2, None, "multiply";
    /// Division
    Divide = 0xa3, None, "divide";
    /// Remainder
    Modulo = 0xa4, None, "modulo";
    /// Left shift
    LShift = 0xa5, None, "lshift";
    /// Signed right shift
    RShift = 0xa6, None, "rshift";
    /// Unsigned right shift
    URShift = 0xa7, None, "urshift";
    /// Bitwise and
    BitAnd = 0xa8, None, "bitand";
    /// Bitwise or
    BitOr = 0xa9, None, "bitor";
    /// Bitwise xor
    BitXor = 0xaa, None, "bitxor";
    /// Loose equality
    Equals = 0xab, None, "equals";
    /// Strict equality
    StrictEquals = 0xac, None, "strictequals";
    /// Less than
    LessThan = 0xad, None, "lessthan";
    /// Less than or equal
    LessEquals = 0xae, None, "lessequals";
    /// Greater than
    GreaterThan = 0xaf, None, "greaterthan";
    /// Greater than or equal
    GreaterEquals = 0xb0, None, "greaterequals";
    /// Prototype-chain instance test
    InstanceOf = 0xb1, None, "instanceof";
    /// Type test against a named type
    IsType = 0xb2, U32, "istype";
    /// Type test against a type on the stack
    IsTypeLate = 0xb3, None, "istypelate";
    /// Property existence test
    In = 0xb4, None, "in";
    /// Integer add one
    IncrementI = 0xc0, None, "increment_i";
    /// Integer subtract one
    DecrementI = 0xc1, None, "decrement_i";
    /// Integer negation
    NegateI = 0xc4, None, "negate_i";
    /// Integer addition
    AddI = 0xc5, None, "add_i";
    /// Integer subtraction
    SubtractI = 0xc6, None, "subtract_i";
    /// Integer multiplication
    MultiplyI = 0xc7, None, "multiply_i";
}

impl Opcode {
    /// Encoded size of the whole instruction
    pub fn instruction_len(self) -> usize {
        1 + self.layout().width()
    }

    /// Check if this opcode is a terminator (ends basic block)
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::ReturnValue | Opcode::ReturnVoid | Opcode::Throw
        ) || self.is_branch()
    }

    /// Check if this opcode is an unconditional terminator
    pub fn is_unconditional_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::ReturnValue | Opcode::ReturnVoid | Opcode::Jump | Opcode::Throw
        )
    }

    /// Check if this opcode carries a branch offset
    pub fn is_branch(&self) -> bool {
        self.layout() == OperandLayout::Branch
    }

    /// Check if this opcode is a 32-bit integer arithmetic operation
    pub fn is_integer_arithmetic(&self) -> bool {
        matches!(
            self,
            Opcode::AddI
                | Opcode::SubtractI
                | Opcode::MultiplyI
                | Opcode::NegateI
                | Opcode::IncrementI
                | Opcode::DecrementI
        )
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::from_byte(byte).ok_or(byte)
    }
}
