//! Symbol table and temporary allocator.
//!
//! One arena of owned [`Symbol`] slots with stable ids. There is no garbage
//! collector: a symbol is created as an anonymous temporary or a named
//! binding, mutated by the assignment engine and the call binder, and
//! destroyed ("zapped") when its owning context ends, when proven unused, or
//! transitively with its owner.
//!
//! Freed temporaries below the current high-water mark are reused before the
//! table grows: [`SymbolTable::zap`] slides the lowest-free marker down so
//! the next [`SymbolTable::create_temp`] lands there (amortized O(1), not a
//! full compaction).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use rho_ir::{DataType, Name, NodeId, RoutineMeta, SymId};

use crate::errors::{ExecError, ExecErrorKind};

mod scalar;

pub use scalar::ScalarValue;

bitflags! {
    /// Per-symbol attribute bits.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct SymFlags: u8 {
        /// Named or system symbol; never eligible for take-over.
        const PERMANENT = 1 << 0;
        /// Assignment target is rejected.
        const CONSTANT = 1 << 1;
        /// Reserved system symbol (formatting pointers and friends).
        const SYSTEM = 1 << 2;
        /// Evaluation-produced temporary, eligible for take-over and
        /// post-call reclamation. Compiler-owned slots never carry this.
        const TEMPORARY = 1 << 3;
    }
}

/// Owning context of a symbol.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Context {
    /// Owned by the interactive top level.
    #[default]
    TopLevel,
    /// Owned by a routine invocation; zapped at routine teardown.
    Routine(SymId),
    /// Embedded child of an aggregate symbol (Range/List/Keyword/Struct);
    /// zapped with the aggregate, re-parented by `fix_context`.
    Embedded(SymId),
}

/// Numeric element data for arrays, tagged by width.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    Byte(Vec<u8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    ComplexFloat(Vec<(f32, f32)>),
    ComplexDouble(Vec<(f64, f64)>),
    Str(Vec<String>),
}

impl ArrayData {
    /// Element data type.
    pub fn dtype(&self) -> DataType {
        match self {
            ArrayData::Byte(_) => DataType::Byte,
            ArrayData::Int16(_) => DataType::Int16,
            ArrayData::Int32(_) => DataType::Int32,
            ArrayData::Int64(_) => DataType::Int64,
            ArrayData::Float(_) => DataType::Float,
            ArrayData::Double(_) => DataType::Double,
            ArrayData::ComplexFloat(_) => DataType::ComplexFloat,
            ArrayData::ComplexDouble(_) => DataType::ComplexDouble,
            ArrayData::Str(_) => DataType::Str,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Byte(v) => v.len(),
            ArrayData::Int16(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::ComplexFloat(v) => v.len(),
            ArrayData::ComplexDouble(v) => v.len(),
            ArrayData::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Array payload: dimensions plus element storage.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayPayload {
    pub dims: Vec<usize>,
    pub data: ArrayData,
}

/// Descriptor of a file-backed array; all I/O stays behind host builtins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMapDescriptor {
    pub path: String,
    pub dtype: DataType,
    pub dims: Vec<usize>,
}

/// Storage a scalar pointer writes through to.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerSlot {
    Num(ScalarValue),
    Str(String),
}

/// Shared pointed-to storage for `ScalarPointer` symbols.
///
/// Single-threaded by construction, so `Rc<RefCell<..>>` rather than a lock;
/// the host keeps a clone to observe stores made by scripts.
#[derive(Clone)]
#[repr(transparent)]
pub struct ScalarCell(Rc<RefCell<PointerSlot>>);

impl ScalarCell {
    pub fn new(slot: PointerSlot) -> Self {
        ScalarCell(Rc::new(RefCell::new(slot)))
    }

    /// Snapshot of the current contents.
    pub fn get(&self) -> PointerSlot {
        self.0.borrow().clone()
    }

    /// Overwrite the pointed-to storage in place.
    pub fn set(&self, slot: PointerSlot) {
        *self.0.borrow_mut() = slot;
    }

    /// True when the pointed-to storage holds a string.
    pub fn is_str(&self) -> bool {
        matches!(&*self.0.borrow(), PointerSlot::Str(_))
    }
}

impl fmt::Debug for ScalarCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScalarCell").field(&*self.0.borrow()).finish()
    }
}

impl PartialEq for ScalarCell {
    fn eq(&self, other: &Self) -> bool {
        *self.0.borrow() == *other.0.borrow()
    }
}

/// Class of a symbol, with its variant-specific payload.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum SymClass {
    /// Allocated but holding nothing yet.
    #[default]
    Undefined,
    /// Freed slot awaiting reuse.
    Unused,
    Scalar(ScalarValue),
    /// Writes through to shared storage instead of replacing the symbol.
    ScalarPointer(ScalarCell),
    Str(String),
    Array(ArrayPayload),
    ComplexArray(ArrayPayload),
    /// Associated variable over a mapped file.
    Assoc(FileMapDescriptor),
    FileMap(FileMapDescriptor),
    /// Subscript range; all three bounds are embedded child symbols.
    Range {
        start: SymId,
        end: SymId,
        stride: SymId,
    },
    CompressedList(Vec<SymId>),
    PlainList(Vec<SymId>),
    /// Alias into a list; never owns its target.
    ListPointer(SymId),
    Struct(Vec<(Name, SymId)>),
    /// Subscripted view into another symbol's storage.
    Extract {
        base: SymId,
        offset: usize,
        len: usize,
    },
    /// Non-owning alias; used for formal parameters and pass-by-reference.
    Transfer(SymId),
    FunctionPointer(SymId),
    /// Bound keyword argument; `value` is an embedded child.
    Keyword {
        name: Name,
        value: SymId,
    },
    /// Compiled statement node, consumed by the dispatcher.
    ExecutableNode(NodeId),
    Subroutine(RoutineMeta),
    Function(RoutineMeta),
    BlockRoutine(RoutineMeta),
    /// Known routine whose source has not been compiled yet.
    DeferredSubroutine,
    DeferredFunction,
    DeferredBlock,
}

impl SymClass {
    /// True when the payload owns no heap storage, so "moving" it is a plain
    /// copy.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            SymClass::Undefined
                | SymClass::Unused
                | SymClass::Scalar(_)
                | SymClass::Transfer(_)
                | SymClass::ListPointer(_)
                | SymClass::FunctionPointer(_)
                | SymClass::ExecutableNode(_)
                | SymClass::Extract { .. }
                | SymClass::DeferredSubroutine
                | SymClass::DeferredFunction
                | SymClass::DeferredBlock
        )
    }

    /// True for the three compiled routine classes.
    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            SymClass::Subroutine(_) | SymClass::Function(_) | SymClass::BlockRoutine(_)
        )
    }
}

/// One symbol-table slot.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub class: SymClass,
    pub dtype: DataType,
    pub context: Context,
    /// Source line the symbol was created at, for diagnostics.
    pub line: u32,
    /// `Some` for named bindings; temporaries stay anonymous.
    pub name: Option<Name>,
    pub flags: SymFlags,
}

impl Symbol {
    /// Fresh anonymous temporary.
    fn temp() -> Symbol {
        Symbol {
            class: SymClass::Undefined,
            dtype: DataType::Byte,
            context: Context::TopLevel,
            line: 0,
            name: None,
            flags: SymFlags::TEMPORARY,
        }
    }

    /// Freed slot awaiting reuse.
    fn unused() -> Symbol {
        Symbol {
            class: SymClass::Unused,
            ..Symbol::temp()
        }
    }

    #[inline]
    pub fn is_unused(&self) -> bool {
        matches!(self.class, SymClass::Unused)
    }
}

/// Cached copies of the well-known global formatting pointers.
///
/// A string store through one of the reserved scalar-pointer symbols
/// refreshes the matching field here, so formatting code never chases the
/// pointer chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatCache {
    pub prompt: String,
    pub float_format: String,
    pub double_format: String,
    pub complex_format: String,
}

impl Default for FormatCache {
    fn default() -> Self {
        FormatCache {
            prompt: "RHO> ".to_owned(),
            float_format: "G13.6".to_owned(),
            double_format: "G16.8".to_owned(),
            complex_format: "(G13.6,G13.6)".to_owned(),
        }
    }
}

/// Reserved id of the prompt-string pointer.
pub const PROMPT_SYM: SymId = SymId::new(0);
/// Reserved id of the float print-format pointer.
pub const FLOAT_FORMAT_SYM: SymId = SymId::new(1);
/// Reserved id of the double print-format pointer.
pub const DOUBLE_FORMAT_SYM: SymId = SymId::new(2);
/// Reserved id of the complex print-format pointer.
pub const COMPLEX_FORMAT_SYM: SymId = SymId::new(3);

/// Default growth cap of the slot arena.
const DEFAULT_MAX_SLOTS: usize = 1 << 20;

/// Arena of symbol slots plus the temporary allocator.
pub struct SymbolTable {
    slots: Vec<Symbol>,
    /// Reuse candidate: no `Unused` slot exists below this index.
    lowest_free: usize,
    /// Growth cap; exceeding it is an allocation error, not a panic.
    max_slots: usize,
    format: FormatCache,
}

impl SymbolTable {
    /// Create a table with the reserved system symbols installed.
    pub fn new() -> Self {
        Self::with_max_slots(DEFAULT_MAX_SLOTS)
    }

    /// Create a table with an explicit growth cap.
    pub fn with_max_slots(max_slots: usize) -> Self {
        let format = FormatCache::default();
        let mut table = SymbolTable {
            slots: Vec::with_capacity(64),
            lowest_free: 0,
            max_slots,
            format: format.clone(),
        };
        for text in [
            format.prompt,
            format.float_format,
            format.double_format,
            format.complex_format,
        ] {
            let cell = ScalarCell::new(PointerSlot::Str(text));
            table.slots.push(Symbol {
                class: SymClass::ScalarPointer(cell),
                dtype: DataType::Str,
                context: Context::TopLevel,
                line: 0,
                name: None,
                flags: SymFlags::PERMANENT | SymFlags::SYSTEM,
            });
        }
        table.lowest_free = table.slots.len();
        table
    }

    /// Cached formatting state.
    pub fn format(&self) -> &FormatCache {
        &self.format
    }

    pub(crate) fn format_mut(&mut self) -> &mut FormatCache {
        &mut self.format
    }

    /// Number of slots currently allocated (including unused ones).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Allocate an anonymous temporary with class `Undefined`.
    ///
    /// Reuses the lowest freed slot below the high-water mark before growing
    /// the arena; fails with an allocation error at the growth cap.
    pub fn create_temp(&mut self) -> Result<SymId, ExecError> {
        while self.lowest_free < self.slots.len() && !self.slots[self.lowest_free].is_unused() {
            self.lowest_free += 1;
        }
        if self.lowest_free < self.slots.len() {
            let idx = self.lowest_free;
            self.slots[idx] = Symbol::temp();
            self.lowest_free = idx + 1;
            return Ok(SymId::new(u32::try_from(idx).unwrap_or(u32::MAX)));
        }
        if self.slots.len() >= self.max_slots {
            return Err(ExecError::new(ExecErrorKind::TableExhausted));
        }
        let idx = self.slots.len();
        self.slots.push(Symbol::temp());
        self.lowest_free = self.slots.len();
        Ok(SymId::new(u32::try_from(idx).unwrap_or(u32::MAX)))
    }

    /// Create a named binding owned by `context`.
    pub fn define(&mut self, name: Name, context: Context) -> Result<SymId, ExecError> {
        let id = self.create_temp()?;
        let sym = self.get_mut(id);
        sym.name = Some(name);
        sym.context = context;
        sym.flags = SymFlags::PERMANENT;
        Ok(id)
    }

    /// Allocate a compiler-owned literal constant slot.
    ///
    /// Literal slots are shared by every execution of the statements that
    /// reference them: they are never taken over, never reclaimed with call
    /// temporaries, and rejected as assignment targets.
    pub fn create_literal(&mut self) -> Result<SymId, ExecError> {
        let id = self.create_temp()?;
        self.get_mut(id).flags = SymFlags::CONSTANT;
        Ok(id)
    }

    /// Borrow a symbol row.
    #[inline]
    pub fn get(&self, id: SymId) -> &Symbol {
        &self.slots[id.index()]
    }

    /// Mutably borrow a symbol row.
    #[inline]
    pub fn get_mut(&mut self, id: SymId) -> &mut Symbol {
        &mut self.slots[id.index()]
    }

    /// Follow a Transfer chain to the symbol that owns storage.
    ///
    /// A Transfer is never its own target; the hop count is still bounded by
    /// the table size to stay safe against corrupted chains.
    pub fn deref(&self, id: SymId) -> SymId {
        let mut cur = id;
        for _ in 0..self.slots.len() {
            match self.slots[cur.index()].class {
                SymClass::Transfer(target) if target.is_valid() && target != cur => cur = target,
                _ => return cur,
            }
        }
        cur
    }

    /// A free temporary: an anonymous evaluation product not embedded in an
    /// aggregate. Only these may have their storage taken over rather than
    /// copied or reclaimed after a call. Compiler-owned slots (literals and
    /// named variables) are never free; the statement tree addresses them
    /// on every execution.
    pub fn is_free_temp(&self, id: SymId) -> bool {
        if !id.is_valid() || id.index() >= self.slots.len() {
            return false;
        }
        let sym = &self.slots[id.index()];
        sym.flags.contains(SymFlags::TEMPORARY)
            && sym.name.is_none()
            && !sym
                .flags
                .intersects(SymFlags::PERMANENT | SymFlags::CONSTANT | SymFlags::SYSTEM)
            && !matches!(sym.context, Context::Embedded(_))
            && !sym.is_unused()
    }

    /// Embedded child ids of an aggregate symbol, in payload order.
    pub fn embedded_children(&self, id: SymId) -> Vec<SymId> {
        match &self.slots[id.index()].class {
            SymClass::Range { start, end, stride } => vec![*start, *end, *stride],
            SymClass::PlainList(children) | SymClass::CompressedList(children) => children.clone(),
            SymClass::Keyword { value, .. } => vec![*value],
            SymClass::Struct(fields) => fields.iter().map(|(_, id)| *id).collect(),
            _ => Vec::new(),
        }
    }

    /// Re-parent the embedded children of aggregate `id`: every child whose
    /// context is `Embedded(id)` is rewritten to `Embedded(new_owner)`.
    ///
    /// Ownership is reassigned, never duplicated; children embedded in some
    /// other aggregate are left alone.
    pub fn fix_context(&mut self, id: SymId, new_owner: SymId) {
        for child in self.embedded_children(id) {
            if !child.is_valid() || child.index() >= self.slots.len() {
                continue;
            }
            let sym = &mut self.slots[child.index()];
            if sym.context == Context::Embedded(id) {
                sym.context = Context::Embedded(new_owner);
            }
        }
    }

    /// Free a symbol: drop its payload (transitively zapping embedded
    /// children it owns), mark the slot `Unused`, and slide the lowest-free
    /// marker down so the slot is reused first.
    pub fn zap(&mut self, id: SymId) {
        if !id.is_valid() || id.index() >= self.slots.len() {
            return;
        }
        if self.slots[id.index()]
            .flags
            .contains(SymFlags::SYSTEM)
        {
            return;
        }
        for child in self.embedded_children(id) {
            if child.is_valid()
                && child.index() < self.slots.len()
                && self.slots[child.index()].context == Context::Embedded(id)
            {
                self.zap(child);
            }
        }
        self.slots[id.index()] = Symbol::unused();
        if id.index() < self.lowest_free {
            self.lowest_free = id.index();
        }
    }

    /// Drop a symbol's payload and reset it to `Undefined`, leaving the
    /// slot, name, flags, and context untouched. Embedded children the
    /// payload owned are zapped.
    pub fn free_payload(&mut self, id: SymId) {
        if !id.is_valid() || id.index() >= self.slots.len() {
            return;
        }
        for child in self.embedded_children(id) {
            if child.is_valid()
                && child.index() < self.slots.len()
                && self.slots[child.index()].context == Context::Embedded(id)
            {
                self.zap(child);
            }
        }
        let sym = &mut self.slots[id.index()];
        sym.class = SymClass::Undefined;
        sym.dtype = DataType::Byte;
    }

    /// Tear down a routine frame: every symbol owned by the routine context
    /// loses its payload. Temporaries give up their slot for reuse; named
    /// rows keep theirs, because the routine's compiled body still addresses
    /// them by id on the next invocation.
    pub fn zap_context(&mut self, routine: SymId) {
        for idx in 0..self.slots.len() {
            if self.slots[idx].context != Context::Routine(routine)
                || self.slots[idx].is_unused()
            {
                continue;
            }
            let id = SymId::new(u32::try_from(idx).unwrap_or(u32::MAX));
            if self.slots[idx].flags.contains(SymFlags::PERMANENT) {
                self.free_payload(id);
            } else {
                self.zap(id);
            }
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
