//! Expression generators.
//!
//! Every generator leaves its result in the return register (RAX) and
//! returns the expression's type. Sub-expression operands travel through
//! RSP-relative slots: the left operand is pushed, the right evaluated
//! into RAX, then the left popped into a scratch register and combined.

use strand_parser::ast::*;
use strand_parser::Token;

use crate::emitter::{Cond, Emitter, Reg};
use crate::error::CompileError;
use crate::manager::FuncRef;
use crate::types::{self, cast_type, DataType, NUMBER};

use super::CodeGen;

impl<E: Emitter> CodeGen<E> {
    pub fn gen_expr(&mut self, expr: &Expr, arena: &FuncExprArena) -> Result<DataType, CompileError> {
        match expr {
            Expr::Number(n) => {
                self.gen.mov_reg_imm(Reg::Rax, n.value as i64);
                Ok(NUMBER)
            }
            Expr::StringLit(s) => {
                if s.value.is_empty() {
                    self.call_fn("__string_create_empty");
                } else {
                    let ptr = self.cstr(&s.value);
                    self.gen.mov_reg_imm(Reg::Rdi, ptr);
                    self.call_fn("__string_intern");
                }
                Ok(DataType::String)
            }
            Expr::Regex(r) => {
                let pattern = self.cstr(&r.pattern);
                let flags = self.cstr(&r.flags);
                self.gen.mov_reg_imm(Reg::Rdi, pattern);
                self.gen.mov_reg_imm(Reg::Rsi, flags);
                self.call_fn("__register_regex_pattern");
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__regex_create_by_id");
                Ok(DataType::Regex)
            }
            Expr::Identifier(id) => {
                let ty = self.types.variable_type(&id.name);
                let offset = self.types.variable_offset(&id.name);
                self.gen.load_local(Reg::Rax, offset);
                Ok(ty)
            }
            Expr::Binary(b) => self.gen_binary(b, arena),
            Expr::Ternary(t) => self.gen_ternary(t, arena),
            Expr::Call(c) => self.gen_call(c, arena),
            Expr::MethodCall(c) => self.gen_method_call(c, arena),
            Expr::ExprMethodCall(c) => self.gen_expr_method_call(c, arena),
            Expr::PropertyAccess(p) => self.gen_property_access(p),
            Expr::ExprPropertyAccess(p) => self.gen_expr_property_access(p, arena),
            Expr::Array(a) => self.gen_array_literal(a, arena),
            Expr::Object(o) => self.gen_object_literal(o, arena),
            Expr::TypedArray(t) => self.gen_typed_array_literal(t, arena),
            Expr::ArrayAccess(a) => self.gen_array_access(a, arena),
            Expr::Slice(s) => {
                let flags = (s.start_specified as i64)
                    | (s.end_specified as i64) << 1
                    | (s.step_specified as i64) << 2;
                self.gen
                    .mov_reg_imm(Reg::Rdi, if s.start_specified { s.start } else { 0 });
                self.gen
                    .mov_reg_imm(Reg::Rsi, if s.end_specified { s.end } else { -1 });
                self.gen
                    .mov_reg_imm(Reg::Rdx, if s.step_specified { s.step } else { 1 });
                self.gen.mov_reg_imm(Reg::Rcx, flags);
                self.call_fn("__slice_create");
                Ok(DataType::Slice)
            }
            Expr::Assignment(a) => self.gen_assignment(a, arena),
            Expr::PropertyAssignment(a) => self.gen_property_assignment(a, arena),
            Expr::PostfixIncrement(p) => {
                let ty = self.types.variable_type(&p.name);
                let offset = self.types.variable_offset(&p.name);
                self.gen.load_local(Reg::Rax, offset);
                self.gen.add_reg_imm(Reg::Rax, 1);
                self.gen.store_local(offset, Reg::Rax);
                Ok(ty)
            }
            Expr::PostfixDecrement(p) => {
                let ty = self.types.variable_type(&p.name);
                let offset = self.types.variable_offset(&p.name);
                self.gen.load_local(Reg::Rax, offset);
                self.gen.sub_reg_imm(Reg::Rax, 1);
                self.gen.store_local(offset, Reg::Rax);
                Ok(ty)
            }
            Expr::This(_) => {
                // The object ID saved by the constructor/method prologue
                self.gen.load_local(Reg::Rax, -8);
                Ok(DataType::ClassInstance)
            }
            Expr::New(n) => self.gen_new(n, arena),
            Expr::SuperCall(s) => self.gen_super_call(s, arena),
            Expr::SuperMethodCall(s) => self.gen_super_method_call(s, arena),
            Expr::Function(f) => self.gen_function_ref(f, arena),
        }
    }

    fn gen_binary(&mut self, b: &BinaryOp, arena: &FuncExprArena) -> Result<DataType, CompileError> {
        let left_ty = match &b.left {
            Some(left) => {
                let ty = self.gen_expr(left, arena)?;
                // Protect the left operand across right-operand evaluation
                self.push_rax();
                Some(ty)
            }
            None => None,
        };
        let right_ty = self.gen_expr(&b.right, arena)?;

        match (&b.op, left_ty) {
            (Token::Plus, Some(lt)) => {
                if lt == DataType::String || right_ty == DataType::String {
                    // Right operand (in RAX) becomes the second argument
                    self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                    self.pop_slot_into(Reg::Rdi);
                    let helper = match (lt == DataType::String, right_ty == DataType::String) {
                        (true, false) => "__string_concat_cstr",
                        (false, true) => "__string_concat_cstr_left",
                        _ => "__string_concat",
                    };
                    self.call_fn(helper);
                    Ok(DataType::String)
                } else {
                    self.pop_slot_into(Reg::Rbx);
                    self.gen.add_reg_reg(Reg::Rax, Reg::Rbx);
                    Ok(cast_type(lt, right_ty))
                }
            }
            (Token::Minus, Some(lt)) => {
                self.pop_slot_into(Reg::Rbx);
                self.gen.sub_reg_reg(Reg::Rbx, Reg::Rax);
                self.gen.mov_reg_reg(Reg::Rax, Reg::Rbx);
                Ok(cast_type(lt, right_ty))
            }
            (Token::Minus, None) => {
                // Unary negate: 0 - rax
                self.gen.mov_reg_imm(Reg::Rcx, 0);
                self.gen.sub_reg_reg(Reg::Rcx, Reg::Rax);
                self.gen.mov_reg_reg(Reg::Rax, Reg::Rcx);
                Ok(right_ty)
            }
            (Token::Star, Some(lt)) => {
                self.pop_slot_into(Reg::Rbx);
                self.gen.mul_reg_reg(Reg::Rbx, Reg::Rax);
                self.gen.mov_reg_reg(Reg::Rax, Reg::Rbx);
                Ok(cast_type(lt, right_ty))
            }
            (Token::StarStar, Some(_)) => {
                self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                self.pop_slot_into(Reg::Rdi);
                self.call_fn("__runtime_pow");
                Ok(DataType::Int64)
            }
            (Token::Slash, Some(lt)) => {
                self.pop_slot_into(Reg::Rcx);
                self.gen.div_reg_reg(Reg::Rcx, Reg::Rax);
                self.gen.mov_reg_reg(Reg::Rax, Reg::Rcx);
                Ok(cast_type(lt, right_ty))
            }
            (Token::Percent, Some(lt)) => {
                self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                self.pop_slot_into(Reg::Rdi);
                self.call_fn("__runtime_modulo");
                Ok(cast_type(lt, right_ty))
            }
            (
                Token::EqualEqual
                | Token::BangEqual
                | Token::EqualEqualEqual
                | Token::Less
                | Token::LessEqual
                | Token::Greater
                | Token::GreaterEqual,
                Some(lt),
            ) => self.gen_comparison(&b.op, lt, right_ty),
            (Token::AmpAmp | Token::PipePipe, Some(_)) => self.gen_short_circuit(&b.op),
            (Token::Bang, None) => {
                self.gen.mov_reg_imm(Reg::Rcx, 0);
                self.gen.cmp_reg_reg(Reg::Rax, Reg::Rcx);
                self.gen.set_cc(Cond::Equal, Reg::Rax);
                self.gen.and_reg_imm(Reg::Rax, 0xFF);
                Ok(DataType::Boolean)
            }
            (Token::Await, None) => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__promise_await");
                Ok(DataType::Unknown)
            }
            (op, _) => Err(CompileError::type_error(
                format!("unknown operator '{}'", op),
                b.span,
            )),
        }
    }

    fn gen_comparison(
        &mut self,
        op: &Token,
        left_ty: DataType,
        right_ty: DataType,
    ) -> Result<DataType, CompileError> {
        self.pop_slot_into(Reg::Rcx);

        if left_ty == DataType::String && right_ty == DataType::String {
            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rcx);
            self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
            match op {
                Token::EqualEqual | Token::EqualEqualEqual => {
                    self.call_fn("__string_equals");
                }
                Token::BangEqual => {
                    self.call_fn("__string_equals");
                    self.gen.mov_reg_imm(Reg::Rcx, 1);
                    self.gen.xor_reg_reg(Reg::Rax, Reg::Rcx);
                }
                _ => {
                    self.call_fn("__string_compare");
                    self.gen.mov_reg_imm(Reg::Rcx, 0);
                    self.gen.cmp_reg_reg(Reg::Rax, Reg::Rcx);
                    let cond = match op {
                        Token::Less => Cond::Less,
                        Token::Greater => Cond::Greater,
                        Token::LessEqual => Cond::LessEqual,
                        _ => Cond::GreaterEqual,
                    };
                    self.gen.set_cc(cond, Reg::Rax);
                    self.gen.and_reg_imm(Reg::Rax, 0xFF);
                }
            }
            return Ok(DataType::Boolean);
        }

        // Loose equality over dynamic operands goes through the runtime
        if matches!(op, Token::EqualEqual)
            && (left_ty == DataType::Unknown || right_ty == DataType::Unknown)
        {
            self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax); // right value
            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rcx); // left value
            self.gen.mov_reg_imm(Reg::Rsi, left_ty.type_code());
            self.gen.mov_reg_imm(Reg::Rcx, right_ty.type_code());
            self.call_fn("__runtime_js_equal");
            return Ok(DataType::Boolean);
        }

        self.gen.cmp_reg_reg(Reg::Rcx, Reg::Rax);
        let cond = match op {
            Token::EqualEqual | Token::EqualEqualEqual => Cond::Equal,
            Token::BangEqual => Cond::NotEqual,
            Token::Less => Cond::Less,
            Token::Greater => Cond::Greater,
            Token::LessEqual => Cond::LessEqual,
            _ => Cond::GreaterEqual,
        };
        self.gen.set_cc(cond, Reg::Rax);
        self.gen.and_reg_imm(Reg::Rax, 0xFF);
        Ok(DataType::Boolean)
    }

    fn gen_short_circuit(&mut self, op: &Token) -> Result<DataType, CompileError> {
        let short_label = self.fresh_label("logic_short");
        let end_label = self.fresh_label("logic_end");

        self.pop_slot_into(Reg::Rcx);
        self.gen.mov_reg_imm(Reg::Rdx, 0);
        self.gen.cmp_reg_reg(Reg::Rcx, Reg::Rdx);

        if matches!(op, Token::AmpAmp) {
            self.gen.jump_if_zero(&short_label);
            self.gen.cmp_reg_reg(Reg::Rax, Reg::Rdx);
            self.gen.set_cc(Cond::NotEqual, Reg::Rax);
            self.gen.and_reg_imm(Reg::Rax, 0xFF);
            self.gen.jump(&end_label);
            self.gen.label(&short_label);
            self.gen.mov_reg_imm(Reg::Rax, 0);
        } else {
            self.gen.jump_if_not_zero(&short_label);
            self.gen.cmp_reg_reg(Reg::Rax, Reg::Rdx);
            self.gen.set_cc(Cond::NotEqual, Reg::Rax);
            self.gen.and_reg_imm(Reg::Rax, 0xFF);
            self.gen.jump(&end_label);
            self.gen.label(&short_label);
            self.gen.mov_reg_imm(Reg::Rax, 1);
        }
        self.gen.label(&end_label);
        Ok(DataType::Boolean)
    }

    fn gen_ternary(&mut self, t: &Ternary, arena: &FuncExprArena) -> Result<DataType, CompileError> {
        let false_label = self.fresh_label("ternary_false");
        let end_label = self.fresh_label("ternary_end");

        self.gen_expr(&t.condition, arena)?;
        self.gen.mov_reg_imm(Reg::Rcx, 0);
        self.gen.cmp_reg_reg(Reg::Rax, Reg::Rcx);
        self.gen.jump_if_zero(&false_label);

        let then_ty = self.gen_expr(&t.then_expr, arena)?;
        self.gen.jump(&end_label);
        self.gen.label(&false_label);
        let else_ty = self.gen_expr(&t.else_expr, arena)?;
        self.gen.label(&end_label);

        Ok(cast_type(then_ty, else_ty))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn gen_call(&mut self, c: &Call, arena: &FuncExprArena) -> Result<DataType, CompileError> {
        if c.is_goroutine {
            return self.gen_goroutine_spawn(&c.name, &c.args, arena, c.is_awaited);
        }

        // Global timer functions map to their runtime equivalents
        let timer_helper = match c.name.as_str() {
            "setTimeout" => Some(("__set_timeout", DataType::Int64)),
            "setInterval" => Some(("__set_interval", DataType::Int64)),
            "clearTimeout" => Some(("__clear_timeout", DataType::Boolean)),
            "clearInterval" => Some(("__clear_interval", DataType::Boolean)),
            _ => None,
        };
        if let Some((helper, ret)) = timer_helper {
            for (i, arg) in c.args.iter().take(6).enumerate() {
                self.gen_expr(arg, arena)?;
                self.gen.mov_reg_reg(Reg::ARGS[i], Reg::Rax);
            }
            self.call_fn(helper);
            return Ok(ret);
        }

        // A variable of function type holds a function reference that must
        // be resolved before the indirect call.
        if self.types.variable_type(&c.name) == DataType::Function {
            let offset = self.types.variable_offset(&c.name);
            let n = c.args.len().min(6);
            for arg in c.args.iter().take(6) {
                self.gen_expr(arg, arena)?;
                self.push_rax();
            }
            self.gen.load_local(Reg::Rdi, offset);
            self.call_fn("__lookup_function_by_id");
            self.gen.mov_reg_reg(Reg::R10, Reg::Rax);
            for i in 0..n {
                self.gen.load_rsp(Reg::ARGS[i], 8 * (n - 1 - i) as i64);
            }
            self.drop_slots(n);
            self.call_fn_reg(Reg::R10);
        } else {
            // First six arguments in registers, leftmost first
            for (i, arg) in c.args.iter().take(6).enumerate() {
                self.gen_expr(arg, arena)?;
                self.gen.mov_reg_reg(Reg::ARGS[i], Reg::Rax);
            }
            // Additional arguments spill to the stack in reverse order
            let spilled = c.args.len().saturating_sub(6);
            for arg in c.args.iter().skip(6).rev() {
                self.gen_expr(arg, arena)?;
                self.push_rax();
            }
            self.call_fn(&c.name);
            self.drop_slots(spilled);
        }

        if c.is_awaited {
            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
            self.call_fn("__promise_await");
            return Ok(DataType::Unknown);
        }

        Ok(self
            .functions
            .get(&c.name)
            .map(|meta| meta.return_type)
            .unwrap_or(NUMBER))
    }

    /// `go f(args)`: arguments are pushed in reverse to form an on-stack
    /// array, then handed to a spawn helper with the callee name.
    fn gen_goroutine_spawn(
        &mut self,
        name: &str,
        args: &[Expr],
        arena: &FuncExprArena,
        is_awaited: bool,
    ) -> Result<DataType, CompileError> {
        let name_ptr = self.cstr(name);
        let n = args.len();
        for arg in args.iter().rev() {
            self.gen_expr(arg, arena)?;
            self.push_rax();
        }
        match n {
            0 => {
                self.gen.mov_reg_imm(Reg::Rdi, name_ptr);
                self.call_fn("__goroutine_spawn");
            }
            1 => {
                self.gen.mov_reg_imm(Reg::Rdi, name_ptr);
                self.gen.load_rsp(Reg::Rsi, 0);
                self.call_fn("__goroutine_spawn_with_arg1");
            }
            2 => {
                self.gen.mov_reg_imm(Reg::Rdi, name_ptr);
                self.gen.load_rsp(Reg::Rsi, 0);
                self.gen.load_rsp(Reg::Rdx, 8);
                self.call_fn("__goroutine_spawn_with_arg2");
            }
            _ => {
                self.gen.mov_reg_imm(Reg::Rdi, name_ptr);
                self.gen.mov_reg_reg(Reg::Rsi, Reg::Rsp);
                self.gen.mov_reg_imm(Reg::Rdx, n as i64);
                self.call_fn("__goroutine_spawn_with_args");
            }
        }
        self.drop_slots(n);
        if is_awaited {
            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
            self.call_fn("__promise_await");
            return Ok(DataType::Unknown);
        }
        Ok(DataType::Promise)
    }

    fn gen_method_call(
        &mut self,
        c: &MethodCall,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let result = match c.object.as_str() {
            "console" => self.gen_console_method(c, arena)?,
            "Promise" => {
                if c.method != "all" {
                    return Err(CompileError::type_error(
                        format!("unknown Promise method '{}'", c.method),
                        c.span,
                    ));
                }
                if let Some(arg) = c.args.first() {
                    self.gen_expr(arg, arena)?;
                    self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                } else {
                    self.gen.mov_reg_imm(Reg::Rdi, 0);
                }
                self.call_fn("__promise_all");
                DataType::Promise
            }
            "Array" => self.gen_array_static(c, arena)?,
            object if self.classes.is_defined(object) => {
                // Static method call on a class name
                let Some((owner, meta)) = self.classes.method(object, &c.method) else {
                    return Err(CompileError::type_error(
                        format!("unknown method '{}' on class '{}'", c.method, object),
                        c.span,
                    ));
                };
                if !meta.is_static {
                    return Err(CompileError::type_error(
                        format!("method '{}' on '{}' is not static", c.method, object),
                        c.span,
                    ));
                }
                let label = format!("__static_{}_{}", owner, c.method);
                let ret = meta.return_type;
                let mut slots = Vec::new();
                for arg in c.args.iter().take(6) {
                    let slot = self.temp_slot("arg", DataType::Unknown);
                    self.gen_expr(arg, arena)?;
                    self.gen.store_local(slot, Reg::Rax);
                    slots.push(slot);
                }
                for (i, slot) in slots.iter().enumerate() {
                    self.gen.load_local(Reg::ARGS[i], *slot);
                }
                self.call_fn(&label);
                ret
            }
            object => {
                if c.is_goroutine {
                    return self.gen_goroutine_method_spawn(c, arena);
                }
                let obj_ty = self.types.variable_type(object);
                let class = self.types.variable_class_name(object).map(str::to_string);
                let offset = self.types.variable_offset(object);
                let slot = self.temp_slot("recv", obj_ty);
                self.gen.load_local(Reg::Rax, offset);
                self.gen.store_local(slot, Reg::Rax);
                self.dispatch_method(obj_ty, class.as_deref(), slot, &c.method, &c.args, arena, c.span)?
            }
        };

        if c.is_awaited {
            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
            self.call_fn("__promise_await");
            return Ok(DataType::Unknown);
        }
        Ok(result)
    }

    /// `go obj.m(args)`: spawn the instance method with the object ID as
    /// the leading argument.
    fn gen_goroutine_method_spawn(
        &mut self,
        c: &MethodCall,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let class = self.types.variable_class_name(&c.object).map(str::to_string);
        let label = match class
            .as_deref()
            .and_then(|cl| self.classes.method(cl, &c.method))
        {
            Some((owner, _)) => format!("__method_{}_{}", owner, c.method),
            None => format!("__method_{}", c.method),
        };
        let name_ptr = self.cstr(&label);
        let offset = self.types.variable_offset(&c.object);

        // Argument array: object ID first, then the arguments
        for arg in c.args.iter().rev() {
            self.gen_expr(arg, arena)?;
            self.push_rax();
        }
        self.gen.load_local(Reg::Rax, offset);
        self.push_rax();

        self.gen.mov_reg_imm(Reg::Rdi, name_ptr);
        self.gen.mov_reg_reg(Reg::Rsi, Reg::Rsp);
        self.gen.mov_reg_imm(Reg::Rdx, (c.args.len() + 1) as i64);
        self.call_fn("__goroutine_spawn_with_args");
        self.drop_slots(c.args.len() + 1);
        Ok(DataType::Promise)
    }

    /// `console.log` emits one typed helper call per argument with space
    /// separators and a trailing newline; `console.time`/`timeEnd` take a
    /// label string.
    fn gen_console_method(
        &mut self,
        c: &MethodCall,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        match c.method.as_str() {
            "log" => {
                for (i, arg) in c.args.iter().enumerate() {
                    if i > 0 {
                        self.call_fn("__console_log_space");
                    }
                    let ty = self.gen_expr(arg, arena)?;
                    match ty {
                        DataType::String => {
                            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                            self.call_fn("__console_log_string");
                        }
                        DataType::Tensor => {
                            let arr = self.temp_slot("log_arr", DataType::Tensor);
                            let data = self.temp_slot("log_data", DataType::Unknown);
                            self.gen.store_local(arr, Reg::Rax);
                            self.gen.load_local(Reg::Rdi, arr);
                            self.call_fn("__array_data");
                            self.gen.store_local(data, Reg::Rax);
                            self.gen.load_local(Reg::Rdi, arr);
                            self.call_fn("__array_size");
                            self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                            self.gen.load_local(Reg::Rdi, data);
                            self.call_fn("__console_log_array");
                        }
                        DataType::Array => {
                            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                            self.call_fn("__simple_array_tostring");
                            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                            self.call_fn("__console_log_string");
                        }
                        DataType::ClassInstance => {
                            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                            self.call_fn("__console_log_object");
                        }
                        ty if ty.is_numeric() || ty == DataType::Boolean => {
                            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                            self.call_fn("__console_log_number");
                        }
                        _ => {
                            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                            self.call_fn("__console_log_auto");
                        }
                    }
                }
                self.call_fn("__console_log_newline");
                Ok(DataType::Void)
            }
            "time" | "timeEnd" => {
                if let Some(arg) = c.args.first() {
                    // The label travels as a C string
                    if let Expr::StringLit(s) = arg {
                        let ptr = self.cstr(&s.value);
                        self.gen.mov_reg_imm(Reg::Rdi, ptr);
                    } else {
                        self.gen_expr(arg, arena)?;
                        self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                        self.call_fn("__string_c_str");
                        self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                    }
                } else {
                    self.gen.mov_reg_imm(Reg::Rdi, 0);
                }
                self.call_fn(if c.method == "time" {
                    "__console_time"
                } else {
                    "__console_timeEnd"
                });
                Ok(DataType::Void)
            }
            other => Err(CompileError::type_error(
                format!("unknown console method '{}'", other),
                c.span,
            )),
        }
    }

    /// `Array.zeros/ones/arange/linspace` statics.
    fn gen_array_static(
        &mut self,
        c: &MethodCall,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        match c.method.as_str() {
            "zeros" | "ones" => {
                if let Some(arg) = c.args.first() {
                    self.gen_expr(arg, arena)?;
                    self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                } else {
                    self.gen.mov_reg_imm(Reg::Rdi, 0);
                }
                self.call_fn(if c.method == "zeros" {
                    "__simple_array_zeros"
                } else {
                    "__simple_array_ones"
                });
                Ok(DataType::Array)
            }
            "arange" => {
                // arange(stop) | arange(start, stop) | arange(start, stop, step)
                let mut slots = Vec::new();
                for arg in c.args.iter().take(3) {
                    let slot = self.temp_slot("arange", NUMBER);
                    self.gen_expr(arg, arena)?;
                    self.gen.store_local(slot, Reg::Rax);
                    slots.push(slot);
                }
                match slots.len() {
                    1 => {
                        self.gen.mov_reg_imm(Reg::Rdi, 0);
                        self.gen.load_local(Reg::Rsi, slots[0]);
                        self.gen.mov_reg_imm(Reg::Rdx, 1);
                    }
                    2 => {
                        self.gen.load_local(Reg::Rdi, slots[0]);
                        self.gen.load_local(Reg::Rsi, slots[1]);
                        self.gen.mov_reg_imm(Reg::Rdx, 1);
                    }
                    _ => {
                        self.gen
                            .load_local(Reg::Rdi, slots.first().copied().unwrap_or(-8));
                        self.gen
                            .load_local(Reg::Rsi, slots.get(1).copied().unwrap_or(-8));
                        self.gen
                            .load_local(Reg::Rdx, slots.get(2).copied().unwrap_or(-8));
                    }
                }
                self.call_fn("__simple_array_arange");
                Ok(DataType::Array)
            }
            "linspace" => {
                let mut slots = Vec::new();
                for arg in c.args.iter().take(3) {
                    let slot = self.temp_slot("linspace", NUMBER);
                    self.gen_expr(arg, arena)?;
                    self.gen.store_local(slot, Reg::Rax);
                    slots.push(slot);
                }
                self.gen
                    .load_local(Reg::Rdi, slots.first().copied().unwrap_or(-8));
                self.gen
                    .load_local(Reg::Rsi, slots.get(1).copied().unwrap_or(-8));
                if let Some(&count) = slots.get(2) {
                    self.gen.load_local(Reg::Rdx, count);
                } else {
                    self.gen.mov_reg_imm(Reg::Rdx, 10);
                }
                self.call_fn("__simple_array_linspace");
                Ok(DataType::Array)
            }
            other => Err(CompileError::type_error(
                format!("unknown Array static '{}'", other),
                c.span,
            )),
        }
    }

    fn gen_expr_method_call(
        &mut self,
        c: &ExprMethodCall,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        // Empty method name marks a dynamic invoke: calling the value the
        // object expression evaluates to.
        let result = if c.method.is_empty() {
            self.gen_dynamic_invoke(&c.object, &c.args, arena)?
        } else {
            let class = self.static_class_of(&c.object);
            let obj_ty = self.gen_expr(&c.object, arena)?;
            let slot = self.temp_slot("recv", obj_ty);
            self.gen.store_local(slot, Reg::Rax);
            self.dispatch_method(obj_ty, class.as_deref(), slot, &c.method, &c.args, arena, c.span)?
        };

        if c.is_awaited {
            self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
            self.call_fn("__promise_await");
            return Ok(DataType::Unknown);
        }
        Ok(result)
    }

    /// Call the function value an expression evaluates to. The reference
    /// is either an ID or an already-resolved address; the runtime lookup
    /// normalizes both to a pointer.
    fn gen_dynamic_invoke(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        self.gen_expr(callee, arena)?;
        self.push_rax();

        let n = args.len().min(6);
        for arg in args.iter().take(6) {
            self.gen_expr(arg, arena)?;
            self.push_rax();
        }

        self.gen.load_rsp(Reg::Rdi, 8 * n as i64);
        self.call_fn("__lookup_function_by_id");
        self.gen.mov_reg_reg(Reg::R10, Reg::Rax);
        for i in 0..n {
            self.gen.load_rsp(Reg::ARGS[i], 8 * (n - 1 - i) as i64);
        }
        self.drop_slots(n + 1);
        self.call_fn_reg(Reg::R10);
        Ok(DataType::Unknown)
    }

    /// Name-directed method dispatch on a receiver whose value sits in a
    /// stack slot.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_method(
        &mut self,
        obj_ty: DataType,
        class: Option<&str>,
        obj_slot: i64,
        method: &str,
        args: &[Expr],
        arena: &FuncExprArena,
        span: strand_parser::Span,
    ) -> Result<DataType, CompileError> {
        match obj_ty {
            DataType::String => match method {
                "match" | "search" | "split" => {
                    let arg = args.first().ok_or_else(|| {
                        CompileError::type_error(
                            format!("string.{}() requires an argument", method),
                            span,
                        )
                    })?;
                    self.gen_expr(arg, arena)?;
                    self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                    self.gen.load_local(Reg::Rdi, obj_slot);
                    match method {
                        "match" => {
                            self.call_fn("__string_match");
                            Ok(DataType::Tensor)
                        }
                        "search" => {
                            self.call_fn("__string_search");
                            Ok(NUMBER)
                        }
                        _ => {
                            self.call_fn("__string_split");
                            Ok(DataType::Tensor)
                        }
                    }
                }
                "replace" => {
                    if args.len() < 2 {
                        return Err(CompileError::type_error(
                            "string.replace() requires a pattern and a replacement",
                            span,
                        ));
                    }
                    let pat_slot = self.temp_slot("pattern", DataType::Unknown);
                    self.gen_expr(&args[0], arena)?;
                    self.gen.store_local(pat_slot, Reg::Rax);
                    self.gen_expr(&args[1], arena)?;
                    self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
                    self.gen.load_local(Reg::Rsi, pat_slot);
                    self.gen.load_local(Reg::Rdi, obj_slot);
                    self.call_fn("__string_replace");
                    Ok(DataType::String)
                }
                "charAt" => {
                    if let Some(arg) = args.first() {
                        self.gen_expr(arg, arena)?;
                        self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                    } else {
                        self.gen.mov_reg_imm(Reg::Rsi, 0);
                    }
                    self.gen.load_local(Reg::Rdi, obj_slot);
                    self.call_fn("__string_char_at");
                    Ok(NUMBER)
                }
                other => Err(CompileError::type_error(
                    format!("unknown string method '{}'", other),
                    span,
                )),
            },
            DataType::Regex => match method {
                // The regex receiver stays in its stack slot across the
                // argument evaluation, which may clobber argument registers.
                "test" | "exec" => {
                    let arg = args.first().ok_or_else(|| {
                        CompileError::type_error(
                            format!("regex.{}() requires a string argument", method),
                            span,
                        )
                    })?;
                    self.gen_expr(arg, arena)?;
                    self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                    self.gen.load_local(Reg::Rdi, obj_slot);
                    if method == "test" {
                        self.call_fn("__regex_test");
                        Ok(DataType::Boolean)
                    } else {
                        self.call_fn("__regex_exec");
                        Ok(DataType::Tensor)
                    }
                }
                other => Err(CompileError::type_error(
                    format!("unknown regex method '{}'", other),
                    span,
                )),
            },
            DataType::Tensor => match method {
                "push" => {
                    for arg in args {
                        self.gen_expr(arg, arena)?;
                        self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                        self.gen.load_local(Reg::Rdi, obj_slot);
                        self.call_fn("__array_push");
                    }
                    Ok(DataType::Void)
                }
                "pop" => {
                    self.gen.load_local(Reg::Rdi, obj_slot);
                    self.call_fn("__array_pop");
                    Ok(NUMBER)
                }
                other => Err(CompileError::type_error(
                    format!("unknown array method '{}'", other),
                    span,
                )),
            },
            DataType::Array => self.gen_simple_array_method(obj_slot, method, args, arena, span),
            DataType::TypedArray(scalar) => match method {
                "push" => {
                    let helper = format!("__typed_array_push_{}", scalar.helper_suffix());
                    for arg in args {
                        self.gen_expr(arg, arena)?;
                        self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                        self.gen.load_local(Reg::Rdi, obj_slot);
                        self.call_fn(&helper);
                    }
                    Ok(DataType::Void)
                }
                "pop" => {
                    self.gen.load_local(Reg::Rdi, obj_slot);
                    let helper = format!("__typed_array_pop_{}", scalar.helper_suffix());
                    self.call_fn(&helper);
                    Ok(types::scalar_data_type(scalar))
                }
                other => Err(CompileError::type_error(
                    format!("unknown typed-array method '{}'", other),
                    span,
                )),
            },
            _ => {
                // Instance method on a class object (or a dynamically typed
                // receiver): `__method_<name>` with the object ID in RDI.
                let (label, ret) = match class.and_then(|cl| {
                    self.classes
                        .method(cl, method)
                        .map(|(owner, meta)| (owner.to_string(), meta.return_type))
                }) {
                    Some((owner, ret)) => (format!("__method_{}_{}", owner, method), ret),
                    None => {
                        if let Some(cl) = class {
                            if self.classes.is_defined(cl) {
                                return Err(CompileError::type_error(
                                    format!("unknown method '{}' on class '{}'", method, cl),
                                    span,
                                ));
                            }
                        }
                        (format!("__method_{}", method), DataType::Unknown)
                    }
                };
                let mut slots = Vec::new();
                for arg in args.iter().take(5) {
                    let slot = self.temp_slot("arg", DataType::Unknown);
                    self.gen_expr(arg, arena)?;
                    self.gen.store_local(slot, Reg::Rax);
                    slots.push(slot);
                }
                self.gen.load_local(Reg::Rdi, obj_slot);
                for (i, slot) in slots.iter().enumerate() {
                    self.gen.load_local(Reg::ARGS[i + 1], *slot);
                }
                self.call_fn(&label);
                Ok(ret)
            }
        }
    }

    fn gen_simple_array_method(
        &mut self,
        obj_slot: i64,
        method: &str,
        args: &[Expr],
        arena: &FuncExprArena,
        span: strand_parser::Span,
    ) -> Result<DataType, CompileError> {
        match method {
            "push" => {
                for arg in args {
                    self.gen_expr(arg, arena)?;
                    self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                    self.gen.load_local(Reg::Rdi, obj_slot);
                    self.call_fn("__simple_array_push");
                }
                Ok(DataType::Void)
            }
            "pop" | "sum" | "mean" | "max" | "min" => {
                self.gen.load_local(Reg::Rdi, obj_slot);
                let helper = format!("__simple_array_{}", method);
                self.call_fn(&helper);
                Ok(NUMBER)
            }
            "slice" => {
                let mut slots = Vec::new();
                for arg in args.iter().take(3) {
                    let slot = self.temp_slot("slice_arg", NUMBER);
                    self.gen_expr(arg, arena)?;
                    self.gen.store_local(slot, Reg::Rax);
                    slots.push(slot);
                }
                if let Some(&s) = slots.first() {
                    self.gen.load_local(Reg::Rsi, s);
                } else {
                    self.gen.mov_reg_imm(Reg::Rsi, 0);
                }
                if let Some(&s) = slots.get(1) {
                    self.gen.load_local(Reg::Rdx, s);
                } else {
                    self.gen.mov_reg_imm(Reg::Rdx, -1);
                }
                if let Some(&s) = slots.get(2) {
                    self.gen.load_local(Reg::Rcx, s);
                } else {
                    self.gen.mov_reg_imm(Reg::Rcx, 1);
                }
                self.gen.load_local(Reg::Rdi, obj_slot);
                self.call_fn("__simple_array_slice");
                Ok(DataType::Array)
            }
            "slice_all" => {
                self.gen.load_local(Reg::Rdi, obj_slot);
                self.call_fn("__simple_array_slice_all");
                Ok(DataType::Array)
            }
            "toString" => {
                self.gen.load_local(Reg::Rdi, obj_slot);
                self.call_fn("__simple_array_tostring");
                Ok(DataType::String)
            }
            "get" => {
                if let Some(arg) = args.first() {
                    self.gen_expr(arg, arena)?;
                    self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                } else {
                    self.gen.mov_reg_imm(Reg::Rsi, 0);
                }
                self.gen.load_local(Reg::Rdi, obj_slot);
                self.call_fn("__simple_array_get");
                Ok(NUMBER)
            }
            other => Err(CompileError::type_error(
                format!("unknown Array method '{}'", other),
                span,
            )),
        }
    }

    // ========================================================================
    // Property access
    // ========================================================================

    fn gen_property_access(&mut self, p: &PropertyAccess) -> Result<DataType, CompileError> {
        if p.object == "this" {
            let this_offset = if self.types.variable_exists("__this_object_id") {
                self.types.variable_offset("__this_object_id")
            } else {
                -8
            };
            let (index, ty) = self
                .current_class()
                .map(str::to_string)
                .and_then(|cl| self.classes.field_index(&cl, &p.property))
                .unwrap_or((0, DataType::Unknown));
            self.gen.load_local(Reg::Rdi, this_offset);
            self.gen.mov_reg_imm(Reg::Rsi, index as i64);
            self.call_fn("__object_get_property");
            return Ok(ty);
        }

        if self.types.variable_exists(&p.object) {
            let obj_ty = self.types.variable_type(&p.object);
            let offset = self.types.variable_offset(&p.object);
            match (obj_ty, p.property.as_str()) {
                (DataType::String, "length") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__string_length");
                    return Ok(NUMBER);
                }
                (DataType::Tensor, "length") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__array_size");
                    return Ok(NUMBER);
                }
                (DataType::Array, "length") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__simple_array_length");
                    return Ok(NUMBER);
                }
                (DataType::Array, "shape") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__simple_array_shape");
                    return Ok(DataType::Array);
                }
                (DataType::TypedArray(_), "length") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__typed_array_size");
                    return Ok(NUMBER);
                }
                (DataType::Regex, "source") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__regex_get_source");
                    return Ok(DataType::String);
                }
                (DataType::Regex, "global") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__regex_get_global");
                    return Ok(DataType::Boolean);
                }
                (DataType::Regex, "ignoreCase") => {
                    self.gen.load_local(Reg::Rdi, offset);
                    self.call_fn("__regex_get_ignore_case");
                    return Ok(DataType::Boolean);
                }
                _ => {}
            }

            // Class instances resolve the property to a field index;
            // unregistered classes (object literals) fall back to a
            // name-directed lookup.
            let class = self.types.variable_class_name(&p.object).map(str::to_string);
            if let Some((index, ty)) = class
                .as_deref()
                .and_then(|cl| self.classes.field_index(cl, &p.property))
            {
                self.gen.load_local(Reg::Rdi, offset);
                self.gen.mov_reg_imm(Reg::Rsi, index as i64);
                self.call_fn("__object_get_property");
                return Ok(ty);
            }
            let name_ptr = self.cstr(&p.property);
            self.gen.load_local(Reg::Rdi, offset);
            self.gen.mov_reg_imm(Reg::Rsi, name_ptr);
            self.call_fn("__object_get_property_by_name");
            return Ok(DataType::Unknown);
        }

        // Unbound identifier: static property access on a class name
        let class_ptr = self.cstr(&p.object);
        let prop_ptr = self.cstr(&p.property);
        self.gen.mov_reg_imm(Reg::Rdi, class_ptr);
        self.gen.mov_reg_imm(Reg::Rsi, prop_ptr);
        self.call_fn("__static_get_property");
        Ok(DataType::Unknown)
    }

    fn gen_expr_property_access(
        &mut self,
        p: &ExprPropertyAccess,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let obj_ty = self.gen_expr(&p.object, arena)?;
        match (obj_ty, p.property.as_str()) {
            (DataType::String, "length") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__string_length");
                Ok(NUMBER)
            }
            (DataType::Tensor, "length") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__array_size");
                Ok(NUMBER)
            }
            (DataType::Array, "length") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__simple_array_length");
                Ok(NUMBER)
            }
            (DataType::Array, "shape") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__simple_array_shape");
                Ok(DataType::Array)
            }
            (DataType::TypedArray(_), "length") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__typed_array_size");
                Ok(NUMBER)
            }
            (DataType::Regex, "source") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__regex_get_source");
                Ok(DataType::String)
            }
            (DataType::Regex, "global") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__regex_get_global");
                Ok(DataType::Boolean)
            }
            (DataType::Regex, "ignoreCase") => {
                self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                self.call_fn("__regex_get_ignore_case");
                Ok(DataType::Boolean)
            }
            _ => {
                // Field-index access when the class is statically known,
                // otherwise a dynamic name-directed lookup.
                if let Some((index, ty)) = self
                    .static_class_of(&p.object)
                    .and_then(|cl| self.classes.field_index(&cl, &p.property))
                {
                    self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                    self.gen.mov_reg_imm(Reg::Rsi, index as i64);
                    self.call_fn("__object_get_property");
                    return Ok(ty);
                }
                let slot = self.temp_slot("prop_obj", obj_ty);
                self.gen.store_local(slot, Reg::Rax);
                let name_ptr = self.cstr(&p.property);
                self.gen.load_local(Reg::Rdi, slot);
                self.gen.mov_reg_imm(Reg::Rsi, name_ptr);
                self.call_fn("__object_get_property_by_name");
                Ok(DataType::Unknown)
            }
        }
    }

    fn gen_property_assignment(
        &mut self,
        a: &PropertyAssignment,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        self.gen_expr(&a.value, arena)?;

        if a.object == "this" {
            let index = self
                .current_class()
                .map(str::to_string)
                .and_then(|cl| self.classes.field_index(&cl, &a.property))
                .map(|(index, _)| index)
                .unwrap_or(0);
            self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
            self.gen.load_local(Reg::Rdi, -8);
            self.gen.mov_reg_imm(Reg::Rsi, index as i64);
            self.call_fn("__object_set_property");
            return Ok(DataType::Void);
        }

        if self.types.variable_type(&a.object) == DataType::ClassInstance {
            let offset = self.types.variable_offset(&a.object);
            let class = self.types.variable_class_name(&a.object).map(str::to_string);
            if let Some((index, _)) = class
                .as_deref()
                .and_then(|cl| self.classes.field_index(cl, &a.property))
            {
                self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
                self.gen.load_local(Reg::Rdi, offset);
                self.gen.mov_reg_imm(Reg::Rsi, index as i64);
                self.call_fn("__object_set_property");
            } else {
                let name_ptr = self.cstr(&a.property);
                self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
                self.gen.load_local(Reg::Rdi, offset);
                self.gen.mov_reg_imm(Reg::Rsi, name_ptr);
                self.call_fn("__object_set_property_by_name");
            }
            return Ok(DataType::Void);
        }

        // Static property assignment on a class name
        let class_ptr = self.cstr(&a.object);
        let prop_ptr = self.cstr(&a.property);
        self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
        self.gen.mov_reg_imm(Reg::Rdi, class_ptr);
        self.gen.mov_reg_imm(Reg::Rsi, prop_ptr);
        self.call_fn("__static_set_property");
        Ok(DataType::Void)
    }

    // ========================================================================
    // Literals and construction
    // ========================================================================

    fn gen_array_literal(
        &mut self,
        a: &ArrayLit,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        self.gen.mov_reg_imm(Reg::Rdi, 0);
        self.call_fn("__simple_array_zeros");
        self.push_rax();
        for element in &a.elements {
            self.gen_expr(element, arena)?;
            self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
            self.gen.load_rsp(Reg::Rdi, 0);
            self.call_fn("__simple_array_push");
        }
        self.gen.load_rsp(Reg::Rax, 0);
        self.drop_slots(1);
        Ok(DataType::Array)
    }

    fn gen_object_literal(
        &mut self,
        o: &ObjectLit,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let class_ptr = self.cstr("ObjectLiteral");
        self.gen.mov_reg_imm(Reg::Rdi, class_ptr);
        self.gen.mov_reg_imm(Reg::Rsi, o.properties.len() as i64);
        self.call_fn("__object_create");

        let slot = self.temp_slot("object", DataType::ClassInstance);
        self.gen.store_local(slot, Reg::Rax);

        for (i, (key, value)) in o.properties.iter().enumerate() {
            let name_ptr = self.cstr(key);
            self.gen.load_local(Reg::Rdi, slot);
            self.gen.mov_reg_imm(Reg::Rsi, i as i64);
            self.gen.mov_reg_imm(Reg::Rdx, name_ptr);
            self.call_fn("__object_set_property_name");

            self.gen_expr(value, arena)?;
            self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
            self.gen.load_local(Reg::Rdi, slot);
            self.gen.mov_reg_imm(Reg::Rsi, i as i64);
            self.call_fn("__object_set_property");
        }

        self.gen.load_local(Reg::Rax, slot);
        Ok(DataType::ClassInstance)
    }

    fn gen_typed_array_literal(
        &mut self,
        t: &TypedArrayLit,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let scalar = types::scalar_of(&t.element).ok_or_else(|| {
            CompileError::type_error("unsupported typed-array element type", t.span)
        })?;
        let capacity = if t.elements.is_empty() { 8 } else { t.elements.len() };
        self.gen.mov_reg_imm(Reg::Rdi, capacity as i64);
        let create = format!("__typed_array_create_{}", scalar.helper_suffix());
        self.call_fn(&create);

        let slot = self.temp_slot("typed_array", DataType::TypedArray(scalar));
        self.gen.store_local(slot, Reg::Rax);

        let push = format!("__typed_array_push_{}", scalar.helper_suffix());
        for element in &t.elements {
            self.gen_expr(element, arena)?;
            self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
            self.gen.load_local(Reg::Rdi, slot);
            self.call_fn(&push);
        }

        self.gen.load_local(Reg::Rax, slot);
        Ok(DataType::TypedArray(scalar))
    }

    fn gen_array_access(
        &mut self,
        a: &ArrayAccess,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        // Operator-overload dispatch on class instances
        if let Expr::Identifier(id) = a.object.as_ref() {
            let var_ty = self.types.variable_type(&id.name);
            if var_ty == DataType::ClassInstance {
                if let Some(class) = self.types.variable_class_name(&id.name).map(str::to_string) {
                    if self.classes.has_overload(&class, &Token::LeftBracket) {
                        return self.gen_index_overload(a, &class, arena);
                    }
                }
            }
            if var_ty == DataType::Array {
                let offset = self.types.variable_offset(&id.name);
                if a.is_slice {
                    if let Some(Expr::Slice(s)) = a.slices.first() {
                        self.gen.load_local(Reg::Rdi, offset);
                        self.gen
                            .mov_reg_imm(Reg::Rsi, if s.start_specified { s.start } else { 0 });
                        self.gen
                            .mov_reg_imm(Reg::Rdx, if s.end_specified { s.end } else { -1 });
                        self.gen
                            .mov_reg_imm(Reg::Rcx, if s.step_specified { s.step } else { 1 });
                        self.call_fn("__simple_array_slice");
                        return Ok(DataType::Array);
                    }
                }
                if let Some(index) = &a.index {
                    self.gen_expr(index, arena)?;
                    self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                } else {
                    self.gen.mov_reg_imm(Reg::Rsi, 0);
                }
                self.gen.load_local(Reg::Rdi, offset);
                self.call_fn("__simple_array_get");
                return Ok(NUMBER);
            }
            if let DataType::TypedArray(scalar) = var_ty {
                let offset = self.types.variable_offset(&id.name);
                if let Some(index) = &a.index {
                    self.gen_expr(index, arena)?;
                    self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
                } else {
                    self.gen.mov_reg_imm(Reg::Rsi, 0);
                }
                self.gen.load_local(Reg::Rdi, offset);
                let helper = format!("__typed_array_get_{}", scalar.helper_suffix());
                self.call_fn(&helper);
                return Ok(types::scalar_data_type(scalar));
            }
        }

        // Generic access: evaluate object, protect it, evaluate the index
        self.gen_expr(&a.object, arena)?;
        self.push_rax();
        if let Some(index) = &a.index {
            self.gen_expr(index, arena)?;
        } else if let Some(slice) = a.slices.first() {
            self.gen_expr(slice, arena)?;
        } else {
            self.gen.mov_reg_imm(Reg::Rax, 0);
        }
        self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
        self.pop_slot_into(Reg::Rdi);
        self.call_fn("__array_get");
        Ok(DataType::Unknown)
    }

    /// `instance[index]` where the class declares an `operator []`: pick
    /// the overload by the index expression's inferred type, falling back
    /// to an any-typed overload, then to the mangled default label.
    fn gen_index_overload(
        &mut self,
        a: &ArrayAccess,
        class: &str,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let index_ty = if a.is_slice {
            DataType::Slice
        } else {
            a.index
                .as_deref()
                .map(|e| self.static_type_of(e))
                .unwrap_or(DataType::Unknown)
        };

        self.gen_expr(&a.object, arena)?;
        self.push_rax();

        if let Some(index) = &a.index {
            self.gen_expr(index, arena)?;
        } else if let Some(slice) = a.slices.first() {
            self.gen_expr(slice, arena)?;
        } else {
            self.gen.mov_reg_imm(Reg::Rax, 0);
        }
        self.gen.mov_reg_reg(Reg::Rsi, Reg::Rax);
        self.pop_slot_into(Reg::Rdi);

        let (label, ret) = match self
            .classes
            .find_overload(class, &Token::LeftBracket, &[index_ty])
        {
            Some(overload) => (overload.label.clone(), overload.return_type),
            None => (
                super::class::overload_label(class, &Token::LeftBracket, &[DataType::Unknown]),
                DataType::ClassInstance,
            ),
        };
        self.call_fn(&label);
        Ok(ret)
    }

    // ========================================================================
    // Assignment and construction
    // ========================================================================

    fn gen_assignment(
        &mut self,
        a: &Assignment,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let value_ty = self.gen_expr(&a.value, arena)?;

        let (declared, declared_class) = match &a.declared_type {
            Some(annotation) => {
                let (ty, class) = types::resolve_annotation(annotation);
                (Some(ty), class)
            }
            None => (None, None),
        };

        // The declared type overrides inference; otherwise structured
        // values keep their type and everything else binds dynamically.
        let var_ty = match declared {
            Some(ty) => ty,
            None => {
                if value_ty.is_structured() {
                    value_ty
                } else {
                    DataType::Unknown
                }
            }
        };

        if var_ty == DataType::ClassInstance {
            if let Expr::New(new_expr) = a.value.as_ref() {
                self.types
                    .set_variable_class_type(&a.name, &new_expr.class_name);
            } else if let Some(class) = &declared_class {
                self.types.set_variable_class_type(&a.name, class);
            } else {
                self.types.set_variable_class_type(&a.name, "ObjectLiteral");
            }
        }

        let offset = self.types.allocate_variable(&a.name, var_ty);
        self.gen.store_local(offset, Reg::Rax);
        Ok(var_ty)
    }

    fn gen_new(&mut self, n: &NewExpr, arena: &FuncExprArena) -> Result<DataType, CompileError> {
        if !self.classes.is_defined(&n.class_name) {
            return Err(CompileError::type_error(
                format!("unknown class '{}'", n.class_name),
                n.span,
            ));
        }
        let field_count = self.classes.total_field_count(&n.class_name) as i64;
        let class_ptr = self.cstr(&n.class_name);

        self.gen.mov_reg_imm(Reg::Rdi, class_ptr);
        self.gen.mov_reg_imm(Reg::Rsi, field_count);
        self.call_fn("__object_create");

        let id_slot = self.temp_slot("new", DataType::ClassInstance);
        self.gen.store_local(id_slot, Reg::Rax);

        let ctor_label = format!("__constructor_{}", n.class_name);

        if !n.named_args.is_empty() {
            // new C{ k: v }: run the constructor with zeroed parameters so
            // field defaults apply, then set the named fields directly.
            self.gen.load_local(Reg::Rdi, id_slot);
            for reg in &Reg::ARGS[1..] {
                self.gen.mov_reg_imm(*reg, 0);
            }
            self.call_fn(&ctor_label);
            for (name, value) in &n.named_args {
                let (index, _) = self
                    .classes
                    .field_index(&n.class_name, name)
                    .ok_or_else(|| {
                        CompileError::type_error(
                            format!("unknown field '{}' on class '{}'", name, n.class_name),
                            n.span,
                        )
                    })?;
                self.gen_expr(value, arena)?;
                self.gen.mov_reg_reg(Reg::Rdx, Reg::Rax);
                self.gen.load_local(Reg::Rdi, id_slot);
                self.gen.mov_reg_imm(Reg::Rsi, index as i64);
                self.call_fn("__object_set_property");
            }
        } else {
            // Evaluate constructor arguments into slots, then hand the
            // saved object ID plus the arguments to the constructor.
            let mut slots = Vec::new();
            for arg in n.args.iter().take(5) {
                let slot = self.temp_slot("ctor_arg", DataType::Unknown);
                self.gen_expr(arg, arena)?;
                self.gen.store_local(slot, Reg::Rax);
                slots.push(slot);
            }
            self.gen.load_local(Reg::Rdi, id_slot);
            for (i, slot) in slots.iter().enumerate() {
                self.gen.load_local(Reg::ARGS[i + 1], *slot);
            }
            self.call_fn(&ctor_label);
        }

        // The expression's result is the object ID
        self.gen.load_local(Reg::Rax, id_slot);
        Ok(DataType::ClassInstance)
    }

    fn gen_super_call(
        &mut self,
        s: &SuperCall,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let mut slots = Vec::new();
        for arg in s.args.iter().take(5) {
            let slot = self.temp_slot("super_arg", DataType::Unknown);
            self.gen_expr(arg, arena)?;
            self.gen.store_local(slot, Reg::Rax);
            slots.push(slot);
        }

        self.gen.load_local(Reg::Rdi, -8);
        for i in 0..5 {
            match slots.get(i) {
                Some(&slot) => self.gen.load_local(Reg::ARGS[i + 1], slot),
                None => self.gen.mov_reg_imm(Reg::ARGS[i + 1], 0),
            }
        }
        self.call_fn("__super_constructor_call");
        Ok(DataType::Void)
    }

    fn gen_super_method_call(
        &mut self,
        s: &SuperMethodCall,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        let current = self.current_class().map(str::to_string).ok_or_else(|| {
            CompileError::type_error("'super' outside of a class body", s.span)
        })?;
        let parent = self
            .classes
            .get(&current)
            .and_then(|meta| meta.parent.clone())
            .ok_or_else(|| {
                CompileError::type_error(
                    format!("class '{}' has no parent for 'super'", current),
                    s.span,
                )
            })?;
        let (owner, ret) = self
            .classes
            .method(&parent, &s.method)
            .map(|(owner, meta)| (owner.to_string(), meta.return_type))
            .ok_or_else(|| {
                CompileError::type_error(
                    format!("unknown method '{}' on parent class '{}'", s.method, parent),
                    s.span,
                )
            })?;

        let mut slots = Vec::new();
        for arg in s.args.iter().take(5) {
            let slot = self.temp_slot("super_arg", DataType::Unknown);
            self.gen_expr(arg, arena)?;
            self.gen.store_local(slot, Reg::Rax);
            slots.push(slot);
        }

        self.gen.load_local(Reg::Rdi, -8);
        for (i, slot) in slots.iter().enumerate() {
            self.gen.load_local(Reg::ARGS[i + 1], *slot);
        }
        let label = format!("__method_{}_{}", owner, s.method);
        self.call_fn(&label);
        Ok(ret)
    }

    /// A function expression as a value (or goroutine spawn target). The
    /// reference shape is chosen in priority order: absolute address,
    /// base + offset through the executable-memory helper, ID lookup.
    /// Free variables are snapshotted into the function's scope cell at
    /// the reference site.
    fn gen_function_ref(
        &mut self,
        f: &FuncExprRef,
        arena: &FuncExprArena,
    ) -> Result<DataType, CompileError> {
        self.emit_capture_stores(f.id, arena)?;
        let func_ref = self.manager.func_ref(f.id)?;

        if f.is_goroutine {
            match func_ref {
                FuncRef::Address(addr) => {
                    self.gen.mov_reg_imm(Reg::Rdi, addr as i64);
                }
                FuncRef::BaseOffset(offset) => {
                    self.call_fn("__executable_memory_base");
                    self.gen.add_reg_imm(Reg::Rax, offset as i64);
                    self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                }
                FuncRef::IdLookup(id) => {
                    self.gen.mov_reg_imm(Reg::Rdi, id as i64);
                    self.call_fn("__lookup_function_fast");
                    self.gen.mov_reg_reg(Reg::Rdi, Reg::Rax);
                }
            }
            self.gen.mov_reg_imm(Reg::Rsi, 0);
            self.call_fn("__goroutine_spawn_func_ptr");
            return Ok(DataType::Promise);
        }

        match func_ref {
            FuncRef::Address(addr) => {
                self.gen.mov_reg_imm(Reg::Rax, addr as i64);
            }
            FuncRef::BaseOffset(offset) => {
                self.call_fn("__executable_memory_base");
                self.gen.add_reg_imm(Reg::Rax, offset as i64);
            }
            FuncRef::IdLookup(id) => {
                self.gen.mov_reg_imm(Reg::Rdi, id as i64);
                self.call_fn("__lookup_function_fast");
            }
        }
        Ok(DataType::Function)
    }

    /// Predict an expression's type without emitting code (operator
    /// overload dispatch needs the index type before generation).
    pub(crate) fn static_type_of(&self, expr: &Expr) -> DataType {
        match expr {
            Expr::Number(_) => NUMBER,
            Expr::StringLit(_) => DataType::String,
            Expr::Regex(_) => DataType::Regex,
            Expr::Slice(_) => DataType::Slice,
            Expr::Identifier(id) => self.types.variable_type(&id.name),
            Expr::This(_) => DataType::ClassInstance,
            Expr::New(_) => DataType::ClassInstance,
            Expr::Binary(b) => match b.op {
                Token::EqualEqual
                | Token::BangEqual
                | Token::EqualEqualEqual
                | Token::Less
                | Token::LessEqual
                | Token::Greater
                | Token::GreaterEqual
                | Token::AmpAmp
                | Token::PipePipe
                | Token::Bang => DataType::Boolean,
                _ => DataType::Unknown,
            },
            _ => DataType::Unknown,
        }
    }

    /// The class an expression statically constructs or carries, when the
    /// dispatcher can know it.
    pub(crate) fn static_class_of(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::New(n) => Some(n.class_name.clone()),
            Expr::Identifier(id) => self.types.variable_class_name(&id.name).map(str::to_string),
            Expr::This(_) => self.current_class().map(str::to_string),
            _ => None,
        }
    }
}
