//! Emission of declared functions, constructors, methods, and operator
//! overloads.
//!
//! Constructors and instance methods receive the object ID in RDI and save
//! it at the frame's −8 slot; their declared parameters follow in the
//! remaining argument registers. Static methods and declared functions
//! bind parameters from RDI onward. Every emitted body gets a frame sized
//! as `max(80, 8·params + 16·body_stmts + 64)` rounded up to 16.

use strand_parser::ast::*;
use strand_parser::Token;

use crate::emitter::{Emitter, Reg};
use crate::error::CompileError;
use crate::types::{self, DataType};

use super::{CodeGen, FieldMeta};

/// Frame-size estimate for one function body.
pub(crate) fn estimate_frame(params: usize, body_stmts: usize) -> i64 {
    let size = (params as i64) * 8 + (body_stmts as i64) * 16 + 64;
    let size = size.max(80);
    (size + 15) & !15
}

/// Mangled label for an operator overload; the parameter types form the
/// dispatch signature.
pub(crate) fn overload_label(class: &str, op: &Token, params: &[DataType]) -> String {
    let op_name = match op {
        Token::Plus => "add",
        Token::Minus => "sub",
        Token::Star => "mul",
        Token::Slash => "div",
        Token::Percent => "mod",
        Token::StarStar => "pow",
        Token::EqualEqual => "eq",
        Token::BangEqual => "ne",
        Token::Less => "lt",
        Token::Greater => "gt",
        Token::LessEqual => "le",
        Token::GreaterEqual => "ge",
        Token::LeftBracket => "index",
        _ => "op",
    };
    let sig: Vec<String> = params
        .iter()
        .map(|ty| {
            if *ty == DataType::Unknown {
                "any".to_string()
            } else {
                ty.type_code().to_string()
            }
        })
        .collect();
    format!("__op_{}_{}_{}", class, op_name, sig.join("_"))
}

/// Bind declared parameters to the fixed slots below the frame pointer:
/// the first six land at −8…−48 from the argument registers, the rest are
/// caller arguments above the saved frame (positive offsets).
pub(crate) fn bind_params_to_slots<E: Emitter>(cg: &mut CodeGen<E>, params: &[Param]) {
    for (i, param) in params.iter().enumerate().take(6) {
        let offset = -((i as i64 + 1) * 8);
        bind_param(cg, param, offset);
        cg.gen.store_local(offset, Reg::ARGS[i]);
    }
    for (i, param) in params.iter().enumerate().skip(6) {
        let offset = ((i - 6 + 2) * 8) as i64;
        bind_param(cg, param, offset);
    }
}

/// Like [`bind_params_to_slots`] but with the object ID occupying RDI and
/// the −8 slot; declared parameters start at −16 (at most five).
fn bind_params_after_this<E: Emitter>(cg: &mut CodeGen<E>, params: &[Param]) {
    for (i, param) in params.iter().enumerate().take(5) {
        let offset = -((i as i64 + 2) * 8);
        bind_param(cg, param, offset);
        cg.gen.store_local(offset, Reg::ARGS[i + 1]);
    }
}

fn bind_param<E: Emitter>(cg: &mut CodeGen<E>, param: &Param, offset: i64) {
    let (ty, class) = param
        .type_annotation
        .as_ref()
        .map(types::resolve_annotation)
        .unwrap_or((DataType::Unknown, None));
    cg.types.set_variable_type(&param.name, ty);
    cg.types.set_variable_offset(&param.name, offset);
    if let Some(class) = class {
        cg.types.set_variable_class_type(&param.name, &class);
    }
}

impl<E: Emitter> CodeGen<E> {
    /// Emit a top-level function declaration.
    pub fn emit_function_decl(
        &mut self,
        f: &FunctionDecl,
        arena: &FuncExprArena,
    ) -> Result<(), CompileError> {
        self.gen.label(&f.name);
        self.gen
            .set_function_stack_size(estimate_frame(f.params.len(), f.body.len()));
        self.gen.prologue();

        let saved = std::mem::take(&mut self.types);
        self.types.reset_for_function_with_params(f.params.len());
        bind_params_to_slots(self, &f.params);

        self.gen_stmts(&f.body, arena)?;
        if !matches!(f.body.last(), Some(Stmt::Return(_))) {
            self.gen.mov_reg_imm(Reg::Rax, 0);
            self.gen.function_return();
        }

        self.types = saved;
        Ok(())
    }

    /// Emit a class: constructor (declared or synthesized default),
    /// methods, and operator overloads.
    pub fn emit_class(&mut self, class: &ClassDecl, arena: &FuncExprArena) -> Result<(), CompileError> {
        self.set_current_class(Some(class.name.clone()));

        match &class.constructor {
            Some(ctor) => self.emit_constructor(&class.name, &ctor.params, &ctor.body, arena)?,
            // Synthesized default constructor: fields keep their declared
            // defaults (or zero if none).
            None => self.emit_constructor(&class.name, &[], &[], arena)?,
        }

        for method in &class.methods {
            self.emit_method(&class.name, method, arena)?;
        }
        for op in &class.operators {
            self.emit_operator(&class.name, op, arena)?;
        }

        self.set_current_class(None);
        Ok(())
    }

    fn emit_constructor(
        &mut self,
        class_name: &str,
        params: &[Param],
        body: &[Stmt],
        arena: &FuncExprArena,
    ) -> Result<(), CompileError> {
        self.gen.label(&format!("__constructor_{}", class_name));
        self.gen
            .set_function_stack_size(estimate_frame(params.len() + 1, body.len()));
        self.gen.prologue();

        let saved = std::mem::take(&mut self.types);
        self.types.reset_for_function_with_params(params.len() + 1);

        // 'this' (the object ID) occupies the first slot
        self.types.set_variable_class_type("this", class_name);
        self.types.set_variable_offset("this", -8);
        self.types.set_variable_offset("__this_object_id", -8);
        self.gen.store_local(-8, Reg::Rdi);

        bind_params_after_this(self, params);

        // Initialize declared field defaults before the body runs
        let own_fields: Vec<(usize, FieldMeta)> = {
            let parent_count = self
                .classes
                .get(class_name)
                .and_then(|meta| meta.parent.as_deref().map(|p| self.classes.total_field_count(p)))
                .unwrap_or(0);
            self.classes
                .get(class_name)
                .map(|meta| {
                    meta.fields
                        .iter()
                        .enumerate()
                        .filter(|(_, field)| field.default.is_some())
                        .map(|(i, field)| (parent_count + i, field.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        for (index, field) in own_fields {
            let default = field.default.expect("filtered on default");
            self.gen_expr(&default, arena)?;
            self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
            self.gen.load_local(Reg::Rdi, -8);
            self.gen.mov_reg_imm(Reg::Rsi, index as i64);
            self.call_fn("__object_set_property");
        }

        self.gen_stmts(body, arena)?;
        if !matches!(body.last(), Some(Stmt::Return(_))) {
            self.gen.epilogue();
        }

        self.types = saved;
        Ok(())
    }

    fn emit_method(
        &mut self,
        class_name: &str,
        method: &MethodDecl,
        arena: &FuncExprArena,
    ) -> Result<(), CompileError> {
        // Both the plain and class-qualified labels resolve to the same
        // entry; qualified names disambiguate duplicate method names and
        // serve super-method calls.
        let (plain, qualified) = if method.is_static {
            (
                format!("__static_{}", method.name),
                format!("__static_{}_{}", class_name, method.name),
            )
        } else {
            (
                format!("__method_{}", method.name),
                format!("__method_{}_{}", class_name, method.name),
            )
        };
        self.gen.label(&plain);
        self.gen.label(&qualified);

        let implicit_this = if method.is_static { 0 } else { 1 };
        self.gen.set_function_stack_size(estimate_frame(
            method.params.len() + implicit_this,
            method.body.len(),
        ));
        self.gen.prologue();

        let saved = std::mem::take(&mut self.types);
        self.types
            .reset_for_function_with_params(method.params.len() + implicit_this);

        if method.is_static {
            bind_params_to_slots(self, &method.params);
        } else {
            self.types.set_variable_class_type("this", class_name);
            self.types.set_variable_offset("this", -8);
            self.types.set_variable_offset("__this_object_id", -8);
            self.gen.store_local(-8, Reg::Rdi);
            bind_params_after_this(self, &method.params);
        }

        self.gen_stmts(&method.body, arena)?;
        if !matches!(method.body.last(), Some(Stmt::Return(_))) {
            self.gen.mov_reg_imm(Reg::Rax, 0);
            self.gen.function_return();
        }

        self.types = saved;
        Ok(())
    }

    fn emit_operator(
        &mut self,
        class_name: &str,
        op: &OperatorDecl,
        arena: &FuncExprArena,
    ) -> Result<(), CompileError> {
        let param_types: Vec<DataType> = op
            .params
            .iter()
            .map(|p| {
                p.type_annotation
                    .as_ref()
                    .map(|a| types::resolve_annotation(a).0)
                    .unwrap_or(DataType::Unknown)
            })
            .collect();
        let label = overload_label(class_name, &op.operator, &param_types);
        self.gen.label(&label);

        self.gen
            .set_function_stack_size(estimate_frame(op.params.len() + 1, op.body.len()));
        self.gen.prologue();

        let saved = std::mem::take(&mut self.types);
        self.types
            .reset_for_function_with_params(op.params.len() + 1);

        // The receiving object arrives in RDI; declared parameters are the
        // operands and follow in the remaining registers.
        self.types.set_variable_class_type("this", class_name);
        self.types.set_variable_offset("this", -8);
        self.types.set_variable_offset("__this_object_id", -8);
        self.gen.store_local(-8, Reg::Rdi);
        bind_params_after_this(self, &op.params);

        self.gen_stmts(&op.body, arena)?;
        if !matches!(op.body.last(), Some(Stmt::Return(_))) {
            self.gen.mov_reg_imm(Reg::Rax, 0);
            self.gen.function_return();
        }

        self.types = saved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_estimate_floor_and_alignment() {
        // Zero params, zero statements: floor of 80
        assert_eq!(estimate_frame(0, 0), 80);
        // Formula above the floor rounds up to 16
        let frame = estimate_frame(3, 10);
        assert_eq!(frame, (3 * 8 + 10 * 16 + 64 + 15) & !15);
        assert_eq!(frame % 16, 0);
        assert!(frame >= 80);
    }

    #[test]
    fn test_overload_label_shapes() {
        assert_eq!(
            overload_label("Vec", &Token::LeftBracket, &[crate::types::NUMBER]),
            "__op_Vec_index_11"
        );
        assert_eq!(
            overload_label("Vec", &Token::LeftBracket, &[DataType::Unknown]),
            "__op_Vec_index_any"
        );
        assert_eq!(
            overload_label("Vec", &Token::Plus, &[DataType::ClassInstance]),
            "__op_Vec_add_20"
        );
    }
}
