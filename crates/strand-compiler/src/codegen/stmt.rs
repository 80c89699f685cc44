//! Statement generators: control flow, loops, switch, return/break,
//! import/export.

use strand_parser::ast::*;

use crate::emitter::{Cond, Emitter, Reg};
use crate::error::CompileError;
use crate::types::{self, DataType};

use super::CodeGen;

impl<E: Emitter> CodeGen<E> {
    pub fn gen_stmt(&mut self, stmt: &Stmt, arena: &FuncExprArena) -> Result<(), CompileError> {
        match stmt {
            Stmt::Expression(s) => {
                self.gen_expr(&s.expr, arena)?;
                Ok(())
            }
            Stmt::FunctionDecl(f) => Err(CompileError::type_error(
                format!(
                    "function declaration '{}' is only allowed at top level; use a function expression",
                    f.name
                ),
                f.span,
            )),
            // Class declarations produce no code at statement position;
            // constructors and methods are emitted in the class phase.
            Stmt::ClassDecl(_) => Ok(()),
            Stmt::If(s) => self.gen_if(s, arena),
            Stmt::For(s) => self.gen_for(s, arena),
            Stmt::ForEach(s) => self.gen_for_each(s, arena),
            Stmt::Switch(s) => self.gen_switch(s, arena),
            Stmt::Return(s) => {
                if let Some(value) = &s.value {
                    self.gen_expr(value, arena)?;
                }
                self.gen.function_return();
                Ok(())
            }
            Stmt::Break(s) => match self.break_target().map(str::to_string) {
                Some(target) => {
                    self.gen.jump(&target);
                    Ok(())
                }
                None => Err(CompileError::type_error(
                    "'break' outside of a loop or switch",
                    s.span,
                )),
            },
            Stmt::Import(s) => self.gen_import(s),
            Stmt::Export(s) => {
                if let Some(declaration) = &s.declaration {
                    self.gen_stmt(declaration, arena)?;
                }
                Ok(())
            }
        }
    }

    fn gen_if(&mut self, s: &IfStmt, arena: &FuncExprArena) -> Result<(), CompileError> {
        let else_label = self.fresh_label("else");
        let end_label = self.fresh_label("end_if");

        self.gen_expr(&s.condition, arena)?;
        self.gen.mov_reg_imm(Reg::Rcx, 0);
        self.gen.cmp_reg_reg(Reg::Rax, Reg::Rcx);
        self.gen.jump_if_zero(&else_label);

        self.gen_stmts(&s.then_body, arena)?;
        self.gen.jump(&end_label);

        self.gen.label(&else_label);
        self.gen_stmts(&s.else_body, arena)?;
        self.gen.label(&end_label);
        Ok(())
    }

    /// C-style for; an empty condition is treated as true, so the loop
    /// runs until an explicit break.
    fn gen_for(&mut self, s: &ForStmt, arena: &FuncExprArena) -> Result<(), CompileError> {
        let loop_start = self.fresh_label("loop_start");
        let loop_end = self.fresh_label("loop_end");

        if let Some(init) = &s.init {
            self.gen_stmt(init, arena)?;
        }

        self.gen.label(&loop_start);
        if let Some(condition) = &s.condition {
            self.gen_expr(condition, arena)?;
            self.gen.mov_reg_imm(Reg::Rcx, 0);
            self.gen.cmp_reg_reg(Reg::Rax, Reg::Rcx);
            self.gen.jump_if_zero(&loop_end);
        }

        let previous = self.break_target.replace(loop_end.clone());
        let body_result = self.gen_stmts(&s.body, arena);
        self.break_target = previous;
        body_result?;

        if let Some(update) = &s.update {
            self.gen_expr(update, arena)?;
        }
        self.gen.jump(&loop_start);
        self.gen.label(&loop_end);
        Ok(())
    }

    /// For-each over arrays walks an index against the length helper and
    /// uses the element-typed getter when the element type is known; over
    /// objects it walks exactly the instance's registered property count,
    /// binding name and value.
    fn gen_for_each(&mut self, s: &ForEachStmt, arena: &FuncExprArena) -> Result<(), CompileError> {
        let loop_check = self.fresh_label("foreach_check");
        let loop_end = self.fresh_label("foreach_end");

        let iter_ty = self.gen_expr(&s.iterable, arena)?;
        let iter_slot = self.temp_slot("iterable", iter_ty);
        self.gen.store_local(iter_slot, Reg::Rax);

        let idx_slot = self.temp_slot("foreach_idx", DataType::Int64);
        self.gen.mov_reg_imm(Reg::Rax, 0);
        self.gen.store_local(idx_slot, Reg::Rax);

        let is_object = iter_ty == DataType::ClassInstance;
        let key_ty = if is_object {
            DataType::String
        } else {
            DataType::Int64
        };
        let value_ty = match iter_ty {
            DataType::TypedArray(scalar) => types::scalar_data_type(scalar),
            DataType::Array => types::NUMBER,
            _ => DataType::Unknown,
        };
        let user_idx = self.types.allocate_variable(&s.index_var, key_ty);
        let user_val = self.types.allocate_variable(&s.value_var, value_ty);

        let (length_helper, get_helper): (String, String) = match iter_ty {
            DataType::Array => (
                "__simple_array_length".to_string(),
                "__simple_array_get".to_string(),
            ),
            DataType::TypedArray(scalar) => (
                "__typed_array_size".to_string(),
                format!("__typed_array_get_{}", scalar.helper_suffix()),
            ),
            DataType::ClassInstance => (
                "__object_property_count".to_string(),
                "__object_get_property".to_string(),
            ),
            _ => ("__array_size".to_string(), "__array_get".to_string()),
        };

        self.gen.label(&loop_check);

        // idx >= length ? exit
        self.gen.load_local(Reg::Rdi, iter_slot);
        self.call_fn(&length_helper);
        self.gen.mov_reg_reg(Reg::Rbx, Reg::Rax);
        self.gen.load_local(Reg::Rax, idx_slot);
        self.gen.cmp_reg_reg(Reg::Rax, Reg::Rbx);
        self.gen.set_cc(Cond::GreaterEqual, Reg::Rcx);
        self.gen.and_reg_imm(Reg::Rcx, 0xFF);
        self.gen.mov_reg_imm(Reg::Rdx, 0);
        self.gen.cmp_reg_reg(Reg::Rcx, Reg::Rdx);
        self.gen.jump_if_not_zero(&loop_end);

        if is_object {
            // Key: the property name at the current index, interned
            self.gen.load_local(Reg::Rdi, iter_slot);
            self.gen.load_local(Reg::Rsi, idx_slot);
            self.call_fn("__object_get_property_name");
            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
            self.call_fn("__string_intern");
            self.gen.store_local(user_idx, Reg::Rax);
        } else {
            self.gen.load_local(Reg::Rax, idx_slot);
            self.gen.store_local(user_idx, Reg::Rax);
        }

        // Value at the current index
        self.gen.load_local(Reg::Rdi, iter_slot);
        self.gen.load_local(Reg::Rsi, idx_slot);
        self.call_fn(&get_helper);
        self.gen.store_local(user_val, Reg::Rax);

        let previous = self.break_target.replace(loop_end.clone());
        let body_result = self.gen_stmts(&s.body, arena);
        self.break_target = previous;
        body_result?;

        self.gen.load_local(Reg::Rax, idx_slot);
        self.gen.add_reg_imm(Reg::Rax, 1);
        self.gen.store_local(idx_slot, Reg::Rax);
        self.gen.jump(&loop_check);

        self.gen.label(&loop_end);
        Ok(())
    }

    /// Case comparisons pick one of three shapes: a direct compare when
    /// discriminant and case types are the same known type, a static skip
    /// when both are known but different, and a runtime `js_equal` call
    /// when either side is unknown. Fall-through between cases is allowed;
    /// `break` jumps to the switch-end label.
    fn gen_switch(&mut self, s: &SwitchStmt, arena: &FuncExprArena) -> Result<(), CompileError> {
        let switch_end = self.fresh_label("switch_end");

        let disc_ty = self.gen_expr(&s.discriminant, arena)?;
        let disc_slot = self.temp_slot("discriminant", disc_ty);
        let disc_ty_slot = self.temp_slot("discriminant_type", DataType::Int64);
        self.gen.store_local(disc_slot, Reg::Rax);
        self.gen.mov_reg_imm(Reg::Rax, disc_ty.type_code());
        self.gen.store_local(disc_ty_slot, Reg::Rax);

        // First pass: comparison jumps into the case table
        let mut case_labels = Vec::new();
        let mut default_label = None;
        for (i, case) in s.cases.iter().enumerate() {
            if case.is_default {
                default_label = Some(self.fresh_label("case_default"));
                continue;
            }
            let case_label = self.fresh_label(&format!("case_{}", i));
            let value = case.value.as_ref().expect("non-default case has a value");
            let case_ty = self.gen_expr(value, arena)?;

            let both_known = disc_ty != DataType::Unknown && case_ty != DataType::Unknown;
            if both_known && disc_ty == case_ty {
                // Direct compare
                self.gen.load_local(Reg::Rbx, disc_slot);
                self.gen.cmp_reg_reg(Reg::Rbx, Reg::Rax);
                self.gen.set_cc(Cond::Equal, Reg::Rcx);
                self.gen.and_reg_imm(Reg::Rcx, 0xFF);
                self.gen.mov_reg_imm(Reg::Rdx, 0);
                self.gen.cmp_reg_reg(Reg::Rcx, Reg::Rdx);
                self.gen.jump_if_not_zero(&case_label);
            } else if both_known {
                // Known but different types never match: skip entirely
            } else {
                self.gen.load_local(Reg::Rdi, disc_slot);
                self.gen.load_local(Reg::Rsi, disc_ty_slot);
                self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
                self.gen.mov_reg_imm(Reg::Rcx, case_ty.type_code());
                self.call_fn("__runtime_js_equal");
                self.gen.mov_reg_imm(Reg::Rbx, 0);
                self.gen.cmp_reg_reg(Reg::Rax, Reg::Rbx);
                self.gen.jump_if_not_zero(&case_label);
            }
            case_labels.push(case_label);
        }

        match &default_label {
            Some(label) => self.gen.jump(label),
            None => self.gen.jump(&switch_end),
        }

        // Second pass: case bodies, falling through between cases
        let previous = self.break_target.replace(switch_end.clone());
        let mut result = Ok(());
        let mut case_index = 0;
        for case in &s.cases {
            if case.is_default {
                let label = default_label.clone().expect("default label exists");
                self.gen.label(&label);
            } else {
                self.gen.label(&case_labels[case_index]);
                case_index += 1;
            }
            result = self.gen_stmts(&case.body, arena);
            if result.is_err() {
                break;
            }
        }
        self.break_target = previous;
        result?;

        self.gen.label(&switch_end);
        Ok(())
    }

    /// Imports bind their specifiers as dynamically-typed locals
    /// initialized to zero; module resolution is outside the core.
    fn gen_import(&mut self, s: &ImportStmt) -> Result<(), CompileError> {
        let names: Vec<String> = if s.is_namespace {
            s.namespace_name.iter().cloned().collect()
        } else {
            s.specifiers.iter().map(|spec| spec.local.clone()).collect()
        };
        for name in names {
            let offset = self.types.allocate_variable(&name, DataType::Unknown);
            self.gen.mov_reg_imm(Reg::Rax, 0);
            self.gen.store_local(offset, Reg::Rax);
        }
        Ok(())
    }
}
