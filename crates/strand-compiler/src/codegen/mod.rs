//! AST code generation.
//!
//! One generator per AST node, emitting through the [`Emitter`] and
//! returning the node's result type. The generator state carries the
//! per-function inference frame, the function compilation manager, the
//! class registry, and the current break target (compilation is
//! single-threaded; the target is saved and restored around each switch
//! and loop).

mod class;
mod expr;
mod stmt;

pub(crate) use class::overload_label;

use rustc_hash::{FxHashMap, FxHashSet};
use strand_parser::ast::{Expr, FuncExpr, FuncExprArena, FuncExprId, Stmt};
use strand_parser::Token;
use strand_runtime::string::intern_cstr;

use crate::emitter::{Emitter, Reg};
use crate::error::CompileError;
use crate::infer::TypeInference;
use crate::manager::FunctionCompilationManager;
use crate::types::DataType;

/// A class instance field: declaration-order position inside the class,
/// plus type and optional default-value expression.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: String,
    pub ty: DataType,
    pub class_name: Option<String>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct MethodMeta {
    pub name: String,
    pub is_static: bool,
    pub return_type: DataType,
}

/// One operator overload; `params` is the dispatch signature.
#[derive(Debug, Clone)]
pub struct OverloadMeta {
    pub op: Token,
    pub params: Vec<DataType>,
    pub return_type: DataType,
    pub label: String,
}

/// Registered class: parent, instance fields in declaration order, methods,
/// overloads. Property access lowers to a field index; inherited fields
/// come first in instance layout.
#[derive(Debug, Clone)]
pub struct ClassMeta {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<FieldMeta>,
    pub methods: Vec<MethodMeta>,
    pub overloads: Vec<OverloadMeta>,
    pub has_constructor: bool,
}

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: FxHashMap<String, ClassMeta>,
}

impl ClassRegistry {
    pub fn register(&mut self, meta: ClassMeta) {
        self.classes.insert(meta.name.clone(), meta);
    }

    pub fn get(&self, name: &str) -> Option<&ClassMeta> {
        self.classes.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Instance field count including inherited fields.
    pub fn total_field_count(&self, name: &str) -> usize {
        let mut count = 0;
        let mut current = self.classes.get(name);
        while let Some(meta) = current {
            count += meta.fields.len();
            current = meta.parent.as_deref().and_then(|p| self.classes.get(p));
        }
        count
    }

    /// Field index in instance layout (inherited fields first), plus type.
    pub fn field_index(&self, class: &str, field: &str) -> Option<(usize, DataType)> {
        let meta = self.classes.get(class)?;
        let parent_count = meta
            .parent
            .as_deref()
            .map(|p| self.total_field_count(p))
            .unwrap_or(0);
        if let Some(pos) = meta.fields.iter().position(|f| f.name == field) {
            return Some((parent_count + pos, meta.fields[pos].ty));
        }
        meta.parent
            .as_deref()
            .and_then(|p| self.field_index(p, field))
    }

    /// Method lookup walking the parent chain.
    pub fn method(&self, class: &str, name: &str) -> Option<(&str, &MethodMeta)> {
        let mut current = self.classes.get(class);
        while let Some(meta) = current {
            if let Some(m) = meta.methods.iter().find(|m| m.name == name) {
                return Some((meta.name.as_str(), m));
            }
            current = meta.parent.as_deref().and_then(|p| self.classes.get(p));
        }
        None
    }

    pub fn has_overload(&self, class: &str, op: &Token) -> bool {
        self.classes
            .get(class)
            .map(|meta| meta.overloads.iter().any(|o| &o.op == op))
            .unwrap_or(false)
    }

    /// Best overload: exact parameter-type match first, then an any-typed
    /// overload.
    pub fn find_overload(
        &self,
        class: &str,
        op: &Token,
        operand_types: &[DataType],
    ) -> Option<&OverloadMeta> {
        let meta = self.classes.get(class)?;
        meta.overloads
            .iter()
            .find(|o| &o.op == op && o.params == operand_types)
            .or_else(|| {
                meta.overloads.iter().find(|o| {
                    &o.op == op && o.params.iter().all(|p| *p == DataType::Unknown)
                })
            })
    }
}

/// Declared function metadata for return-type lookup at call sites.
#[derive(Debug, Clone)]
pub struct FunctionMeta {
    pub name: String,
    pub return_type: DataType,
    pub param_count: usize,
}

pub struct CodeGen<E: Emitter> {
    pub gen: E,
    pub types: TypeInference,
    pub manager: FunctionCompilationManager,
    pub classes: ClassRegistry,
    pub functions: FxHashMap<String, FunctionMeta>,
    label_counter: u32,
    temp_counter: u32,
    break_target: Option<String>,
    current_class: Option<String>,
    /// Live RSP operand slots. SysV wants RSP ≡ 0 (mod 16) at every call;
    /// after the prologue RSP ≡ 8, so calls at even depth get an 8-byte pad.
    rsp_depth: u32,
}

impl<E: Emitter> CodeGen<E> {
    pub fn new(gen: E) -> Self {
        Self {
            gen,
            types: TypeInference::new(),
            manager: FunctionCompilationManager::new(),
            classes: ClassRegistry::default(),
            functions: FxHashMap::default(),
            label_counter: 0,
            temp_counter: 0,
            break_target: None,
            current_class: None,
            rsp_depth: 0,
        }
    }

    // ========================================================================
    // Operand-slot and call plumbing
    // ========================================================================

    /// Push RAX onto an RSP operand slot.
    pub(crate) fn push_rax(&mut self) {
        self.gen.sub_reg_imm(Reg::Rsp, 8);
        self.gen.store_rsp(0, Reg::Rax);
        self.rsp_depth += 1;
    }

    /// Pop the top operand slot into `reg`.
    pub(crate) fn pop_slot_into(&mut self, reg: Reg) {
        self.gen.load_rsp(reg, 0);
        self.gen.add_reg_imm(Reg::Rsp, 8);
        self.rsp_depth -= 1;
    }

    /// Drop `n` operand slots without reading them.
    pub(crate) fn drop_slots(&mut self, n: usize) {
        if n > 0 {
            self.gen.add_reg_imm(Reg::Rsp, 8 * n as i64);
            self.rsp_depth -= n as u32;
        }
    }

    /// Call with stack-alignment padding when needed.
    pub(crate) fn call_fn(&mut self, label: &str) {
        if self.rsp_depth % 2 == 0 {
            self.gen.sub_reg_imm(Reg::Rsp, 8);
            self.gen.call(label);
            self.gen.add_reg_imm(Reg::Rsp, 8);
        } else {
            self.gen.call(label);
        }
    }

    /// Indirect call with the same alignment padding.
    pub(crate) fn call_fn_reg(&mut self, reg: Reg) {
        if self.rsp_depth % 2 == 0 {
            self.gen.sub_reg_imm(Reg::Rsp, 8);
            self.gen.call_reg(reg);
            self.gen.add_reg_imm(Reg::Rsp, 8);
        } else {
            self.gen.call_reg(reg);
        }
    }

    /// Unique forward label.
    pub(crate) fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("__{}_{}", prefix, self.label_counter);
        self.label_counter += 1;
        label
    }

    /// Allocate a scratch stack slot under a unique internal name.
    pub(crate) fn temp_slot(&mut self, prefix: &str, ty: DataType) -> i64 {
        let name = format!("__temp_{}_{}", prefix, self.temp_counter);
        self.temp_counter += 1;
        self.types.allocate_variable(&name, ty)
    }

    /// Interned NUL-terminated bytes with a process-lifetime address,
    /// embedded as an immediate in emitted code.
    pub(crate) fn cstr(&self, s: &str) -> i64 {
        intern_cstr(s) as i64
    }

    pub(crate) fn break_target(&self) -> Option<&str> {
        self.break_target.as_deref()
    }

    pub(crate) fn current_class(&self) -> Option<&str> {
        self.current_class.as_deref()
    }

    pub(crate) fn set_current_class(&mut self, class: Option<String>) {
        self.current_class = class;
    }

    /// Generate a statement sequence.
    pub fn gen_stmts(&mut self, stmts: &[Stmt], arena: &FuncExprArena) -> Result<(), CompileError> {
        for stmt in stmts {
            self.gen_stmt(stmt, arena)?;
        }
        Ok(())
    }

    /// Free variables of a function expression: identifiers its body reads
    /// that are bound neither by its parameters nor by its own
    /// assignments. These are captured by value through a per-function
    /// scope cell when the function reference is created.
    pub(crate) fn free_variables(&self, node: &FuncExpr, arena: &FuncExprArena) -> Vec<String> {
        let mut used = FxHashSet::default();
        let mut bound = FxHashSet::default();
        for param in &node.params {
            bound.insert(param.name.clone());
        }
        for stmt in &node.body {
            collect_stmt(stmt, arena, &mut used, &mut bound);
        }

        let mut free: Vec<String> = used
            .into_iter()
            .filter(|name| {
                !bound.contains(name)
                    && !self.functions.contains_key(name)
                    && !self.classes.is_defined(name)
                    && !matches!(name.as_str(), "console" | "Promise" | "Array" | "this")
            })
            .collect();
        free.sort();
        free
    }

    /// Emit the capture stores for a function reference: snapshot every
    /// free variable of the target into its scope cell.
    pub(crate) fn emit_capture_stores(
        &mut self,
        id: FuncExprId,
        arena: &FuncExprArena,
    ) -> Result<(), CompileError> {
        let node = arena.get(id);
        let free = self.free_variables(node, arena);
        if free.is_empty() {
            return Ok(());
        }
        let name = self
            .manager
            .assigned_name(id)
            .ok_or_else(|| {
                CompileError::Manager(
                    "function expression referenced without an assigned name".to_string(),
                )
            })?
            .to_string();
        let scope_ptr = self.cstr(&format!("__scope_{}", name));
        for var in free {
            let offset = self.types.variable_offset(&var);
            let var_ptr = self.cstr(&var);
            self.gen.load_local(Reg::Rdx, offset);
            self.gen.mov_reg_imm(Reg::Rdi, scope_ptr);
            self.gen.mov_reg_imm(Reg::Rsi, var_ptr);
            self.call_fn("__static_set_property");
        }
        Ok(())
    }

    /// Phase 2: compile one function expression body (innermost-first
    /// ordering guaranteed by the caller).
    pub fn compile_function_expr(
        &mut self,
        id: FuncExprId,
        arena: &FuncExprArena,
    ) -> Result<(), CompileError> {
        let name = self
            .manager
            .assigned_name(id)
            .ok_or_else(|| {
                CompileError::Manager(
                    "function expression reached compilation without an assigned name".to_string(),
                )
            })?
            .to_string();
        let node = arena.get(id);

        let start = self.gen.current_offset();
        self.gen.label(&name);
        self.rsp_depth = 0;

        let frame = class::estimate_frame(node.params.len(), node.body.len());
        self.gen.set_function_stack_size(frame);
        self.gen.prologue();

        // Fresh inference frame for the function body
        let saved_types = std::mem::take(&mut self.types);
        self.types.reset_for_function_with_params(node.params.len());
        class::bind_params_to_slots(self, &node.params);

        // Captured variables load from the function's scope cell
        let free = self.free_variables(node, arena);
        if !free.is_empty() {
            let scope_ptr = self.cstr(&format!("__scope_{}", name));
            for var in free {
                let slot = self.types.allocate_variable(&var, crate::types::DataType::Unknown);
                let var_ptr = self.cstr(&var);
                self.gen.mov_reg_imm(Reg::Rdi, scope_ptr);
                self.gen.mov_reg_imm(Reg::Rsi, var_ptr);
                self.call_fn("__static_get_property");
                self.gen.store_local(slot, Reg::Rax);
            }
        }

        self.gen_stmts(&node.body, arena)?;

        if !matches!(node.body.last(), Some(Stmt::Return(_))) {
            self.gen.mov_reg_imm(Reg::Rax, 0);
            self.gen.function_return();
        }

        self.types = saved_types;

        let size = self.gen.current_offset() - start;
        self.manager.mark_compiled(id, start, size);
        Ok(())
    }
}

/// Walk a statement collecting identifier uses and local bindings.
fn collect_stmt(
    stmt: &Stmt,
    arena: &FuncExprArena,
    used: &mut FxHashSet<String>,
    bound: &mut FxHashSet<String>,
) {
    match stmt {
        Stmt::Expression(s) => collect_expr(&s.expr, arena, used, bound),
        Stmt::FunctionDecl(f) => {
            bound.insert(f.name.clone());
        }
        Stmt::ClassDecl(_) => {}
        Stmt::If(s) => {
            collect_expr(&s.condition, arena, used, bound);
            for stmt in s.then_body.iter().chain(&s.else_body) {
                collect_stmt(stmt, arena, used, bound);
            }
        }
        Stmt::For(s) => {
            if let Some(init) = &s.init {
                collect_stmt(init, arena, used, bound);
            }
            if let Some(cond) = &s.condition {
                collect_expr(cond, arena, used, bound);
            }
            if let Some(update) = &s.update {
                collect_expr(update, arena, used, bound);
            }
            for stmt in &s.body {
                collect_stmt(stmt, arena, used, bound);
            }
        }
        Stmt::ForEach(s) => {
            collect_expr(&s.iterable, arena, used, bound);
            bound.insert(s.index_var.clone());
            bound.insert(s.value_var.clone());
            for stmt in &s.body {
                collect_stmt(stmt, arena, used, bound);
            }
        }
        Stmt::Switch(s) => {
            collect_expr(&s.discriminant, arena, used, bound);
            for case in &s.cases {
                if let Some(value) = &case.value {
                    collect_expr(value, arena, used, bound);
                }
                for stmt in &case.body {
                    collect_stmt(stmt, arena, used, bound);
                }
            }
        }
        Stmt::Return(s) => {
            if let Some(value) = &s.value {
                collect_expr(value, arena, used, bound);
            }
        }
        Stmt::Export(s) => {
            if let Some(decl) = &s.declaration {
                collect_stmt(decl, arena, used, bound);
            }
        }
        Stmt::Break(_) | Stmt::Import(_) => {}
    }
}

fn collect_expr(
    expr: &Expr,
    arena: &FuncExprArena,
    used: &mut FxHashSet<String>,
    bound: &mut FxHashSet<String>,
) {
    match expr {
        Expr::Identifier(id) => {
            used.insert(id.name.clone());
        }
        Expr::Binary(b) => {
            if let Some(left) = &b.left {
                collect_expr(left, arena, used, bound);
            }
            collect_expr(&b.right, arena, used, bound);
        }
        Expr::Ternary(t) => {
            collect_expr(&t.condition, arena, used, bound);
            collect_expr(&t.then_expr, arena, used, bound);
            collect_expr(&t.else_expr, arena, used, bound);
        }
        Expr::Call(c) => {
            used.insert(c.name.clone());
            for arg in &c.args {
                collect_expr(arg, arena, used, bound);
            }
        }
        Expr::MethodCall(c) => {
            used.insert(c.object.clone());
            for arg in &c.args {
                collect_expr(arg, arena, used, bound);
            }
        }
        Expr::ExprMethodCall(c) => {
            collect_expr(&c.object, arena, used, bound);
            for arg in &c.args {
                collect_expr(arg, arena, used, bound);
            }
        }
        Expr::PropertyAccess(p) => {
            used.insert(p.object.clone());
        }
        Expr::ExprPropertyAccess(p) => collect_expr(&p.object, arena, used, bound),
        Expr::Array(a) => {
            for element in &a.elements {
                collect_expr(element, arena, used, bound);
            }
        }
        Expr::Object(o) => {
            for (_, value) in &o.properties {
                collect_expr(value, arena, used, bound);
            }
        }
        Expr::TypedArray(t) => {
            for element in &t.elements {
                collect_expr(element, arena, used, bound);
            }
        }
        Expr::ArrayAccess(a) => {
            collect_expr(&a.object, arena, used, bound);
            if let Some(index) = &a.index {
                collect_expr(index, arena, used, bound);
            }
            for slice in &a.slices {
                collect_expr(slice, arena, used, bound);
            }
        }
        Expr::Assignment(a) => {
            collect_expr(&a.value, arena, used, bound);
            bound.insert(a.name.clone());
        }
        Expr::PropertyAssignment(a) => {
            used.insert(a.object.clone());
            collect_expr(&a.value, arena, used, bound);
        }
        Expr::PostfixIncrement(p) | Expr::PostfixDecrement(p) => {
            used.insert(p.name.clone());
        }
        Expr::New(n) => {
            for arg in &n.args {
                collect_expr(arg, arena, used, bound);
            }
            for (_, value) in &n.named_args {
                collect_expr(value, arena, used, bound);
            }
        }
        Expr::SuperCall(s) => {
            for arg in &s.args {
                collect_expr(arg, arena, used, bound);
            }
        }
        Expr::SuperMethodCall(s) => {
            for arg in &s.args {
                collect_expr(arg, arena, used, bound);
            }
        }
        // A nested function expression's free variables are free here too
        // (its captures are snapshotted while this body runs), minus the
        // names it binds itself.
        Expr::Function(f) => {
            let node = arena.get(f.id);
            let mut inner_used = FxHashSet::default();
            let mut inner_bound = FxHashSet::default();
            for param in &node.params {
                inner_bound.insert(param.name.clone());
            }
            for stmt in &node.body {
                collect_stmt(stmt, arena, &mut inner_used, &mut inner_bound);
            }
            for name in inner_used {
                if !inner_bound.contains(&name) {
                    used.insert(name);
                }
            }
        }
        Expr::Number(_) | Expr::StringLit(_) | Expr::Regex(_) | Expr::Slice(_) | Expr::This(_) => {}
    }
}
