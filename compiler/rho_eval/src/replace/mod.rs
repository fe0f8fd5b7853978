//! Assignment engine: bind a value to a target symbol.
//!
//! The engine decides between moving and copying. Only a free temporary may
//! have its storage taken over; everything else is copied structurally, with
//! embedded children re-parented through `fix_context` so ownership is never
//! duplicated and no back-reference dangles.
//!
//! Scalar pointers are the exception to "the target row is replaced": the
//! store goes through the pointer into shared storage, and stores to the
//! well-known formatting pointers also refresh the table's cached copies.

use rho_ir::{DataType, SymId};

use crate::errors::{ExecError, ExecErrorKind};
use crate::symtab::{
    Context, PointerSlot, SymClass, SymbolTable, COMPLEX_FORMAT_SYM, DOUBLE_FORMAT_SYM,
    FLOAT_FORMAT_SYM, PROMPT_SYM,
};

/// Bind the value of `source` to `target`.
///
/// `target` is dereferenced through any Transfer chain first; a constant
/// target is rejected before anything is mutated.
pub fn replace(table: &mut SymbolTable, target: SymId, source: SymId) -> Result<(), ExecError> {
    let target = table.deref(target);
    if table
        .get(target)
        .flags
        .contains(crate::symtab::SymFlags::CONSTANT)
    {
        return Err(ExecError::new(ExecErrorKind::ProtectedTarget).with_sym(target));
    }

    let source = table.deref(source);
    if source == target {
        return Ok(());
    }
    if matches!(table.get(source).class, SymClass::Undefined) {
        return Err(ExecError::new(ExecErrorKind::UndefinedValue).with_sym(source));
    }

    if let SymClass::ScalarPointer(cell) = &table.get(target).class {
        let cell = cell.clone();
        store_through_pointer(table, target, &cell, source)?;
        if table.is_free_temp(source) {
            table.zap(source);
        }
        return Ok(());
    }

    if table.is_free_temp(source) {
        take_over(table, target, source);
        return Ok(());
    }
    if table.get(source).class.is_inline() {
        // No heap payload to speak of: moving and copying coincide.
        table.free_payload(target);
        let src = table.get(source);
        let (class, dtype) = (src.class.clone(), src.dtype);
        let dst = table.get_mut(target);
        dst.class = class;
        dst.dtype = dtype;
        return Ok(());
    }

    deep_copy_into(table, target, source)?;
    Ok(())
}

/// Store through a scalar pointer without replacing the pointer symbol.
fn store_through_pointer(
    table: &mut SymbolTable,
    target: SymId,
    cell: &crate::symtab::ScalarCell,
    source: SymId,
) -> Result<(), ExecError> {
    let src_class = table.get(source).class.clone();
    match (cell.get(), src_class) {
        (PointerSlot::Num(existing), SymClass::Scalar(v)) => {
            cell.set(PointerSlot::Num(v.convert_to(existing.dtype())));
            Ok(())
        }
        (PointerSlot::Str(_), SymClass::Str(text)) => {
            cell.set(PointerSlot::Str(text.clone()));
            refresh_format_cache(table, target, text);
            Ok(())
        }
        (slot, _) => {
            let to = match slot {
                PointerSlot::Num(v) => v.dtype(),
                PointerSlot::Str(_) => DataType::Str,
            };
            Err(ExecError::new(ExecErrorKind::IllegalConversion {
                from: table.get(source).dtype.to_string(),
                to: to.to_string(),
            })
            .with_sym(source))
        }
    }
}

/// Keep the cached formatting strings in step with the reserved pointers.
fn refresh_format_cache(table: &mut SymbolTable, target: SymId, text: String) {
    let format = table.format_mut();
    if target == PROMPT_SYM {
        format.prompt = text;
    } else if target == FLOAT_FORMAT_SYM {
        format.float_format = text;
    } else if target == DOUBLE_FORMAT_SYM {
        format.double_format = text;
    } else if target == COMPLEX_FORMAT_SYM {
        format.complex_format = text;
    }
}

/// Move a free temporary's storage into `target` and recycle the source
/// slot. O(1) regardless of payload size.
pub fn take_over(table: &mut SymbolTable, target: SymId, source: SymId) {
    // Children ride along: re-parent them to the target before the payload
    // moves, while the source row still holds it.
    table.fix_context(source, target);
    table.free_payload(target);

    let src = table.get_mut(source);
    let class = std::mem::take(&mut src.class);
    let dtype = src.dtype;
    let dst = table.get_mut(target);
    dst.class = class;
    dst.dtype = dtype;

    table.zap(source);
}

/// Structurally copy `source` into a fresh temporary owned by `context`.
///
/// Numeric buffers are block-copied; string arrays duplicate each element;
/// aggregates copy recursively, re-parenting every embedded child to the new
/// aggregate.
pub fn deep_copy(
    table: &mut SymbolTable,
    source: SymId,
    context: Context,
) -> Result<SymId, ExecError> {
    let id = table.create_temp()?;
    let copied = copy_payload(table, source, id)?;
    let src_dtype = table.get(source).dtype;
    let src_line = table.get(source).line;
    let dst = table.get_mut(id);
    dst.class = copied;
    dst.dtype = src_dtype;
    dst.line = src_line;
    dst.context = context;
    Ok(id)
}

/// Copy `source`'s payload over `target`'s, freeing the old payload first.
fn deep_copy_into(
    table: &mut SymbolTable,
    target: SymId,
    source: SymId,
) -> Result<(), ExecError> {
    let copied = copy_payload(table, source, target)?;
    let src_dtype = table.get(source).dtype;
    table.free_payload(target);
    let dst = table.get_mut(target);
    dst.class = copied;
    dst.dtype = src_dtype;
    Ok(())
}

/// Build a copy of `source`'s payload whose embedded children are owned by
/// `new_owner`.
fn copy_payload(
    table: &mut SymbolTable,
    source: SymId,
    new_owner: SymId,
) -> Result<SymClass, ExecError> {
    let class = table.get(source).class.clone();
    match class {
        SymClass::Range { start, end, stride } => {
            let start = deep_copy(table, start, Context::Embedded(new_owner))?;
            let end = deep_copy(table, end, Context::Embedded(new_owner))?;
            let stride = deep_copy(table, stride, Context::Embedded(new_owner))?;
            Ok(SymClass::Range { start, end, stride })
        }
        SymClass::PlainList(children) => {
            let copied = copy_children(table, &children, new_owner)?;
            Ok(SymClass::PlainList(copied))
        }
        SymClass::CompressedList(children) => {
            let copied = copy_children(table, &children, new_owner)?;
            Ok(SymClass::CompressedList(copied))
        }
        SymClass::Keyword { name, value } => {
            let value = deep_copy(table, value, Context::Embedded(new_owner))?;
            Ok(SymClass::Keyword { name, value })
        }
        SymClass::Struct(fields) => {
            let mut copied = Vec::with_capacity(fields.len());
            for (name, child) in fields {
                copied.push((name, deep_copy(table, child, Context::Embedded(new_owner))?));
            }
            Ok(SymClass::Struct(copied))
        }
        // Everything else owns flat storage (or none): a clone is the copy.
        other => Ok(other),
    }
}

fn copy_children(
    table: &mut SymbolTable,
    children: &[SymId],
    new_owner: SymId,
) -> Result<Vec<SymId>, ExecError> {
    let mut copied = Vec::with_capacity(children.len());
    for &child in children {
        copied.push(deep_copy(table, child, Context::Embedded(new_owner))?);
    }
    Ok(copied)
}
