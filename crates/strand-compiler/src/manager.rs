//! Three-phase compilation of function expressions.
//!
//! Phase 1 walks the AST in pre-order and registers every function
//! expression: a stable synthesized name (`__func_expr_N`), a 16-bit
//! function ID from the runtime's shared counter, and a discovery-order
//! slot. Phase 2 compiles bodies innermost-first (reverse discovery
//! order), recording code offsets and sizes. Phase 3 binds final addresses
//! (`base + offset`) into the ID-indexed registry once the code page is
//! installed.
//!
//! Call sites reference a function through the best shape available:
//! absolute address, base-plus-offset, or an ID lookup through the runtime
//! registry, in that priority order.

use rustc_hash::FxHashMap;
use strand_parser::ast::*;
use strand_runtime::registry;

use crate::error::CompileError;

/// State machine for one function expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncState {
    Discovered,
    Compiled,
    AddressBound,
}

/// Compilation record for one function expression.
#[derive(Debug)]
pub struct FunctionInfo {
    pub name: String,
    pub expr_id: FuncExprId,
    pub function_id: u16,
    pub code_offset: usize,
    pub code_size: usize,
    pub address: usize,
    pub state: FuncState,
}

/// The reference shape chosen for a call site, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncRef {
    /// Absolute address known at emit time.
    Address(usize),
    /// Compiled but not installed: compute `base + offset` at runtime.
    BaseOffset(usize),
    /// Not yet compiled: resolve through the ID registry at runtime.
    IdLookup(u16),
}

#[derive(Debug, Default)]
pub struct FunctionCompilationManager {
    functions: FxHashMap<FuncExprId, FunctionInfo>,
    names: FxHashMap<String, FuncExprId>,
    compilation_order: Vec<FuncExprId>,
    name_counter: u32,
}

impl FunctionCompilationManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Phase 1 — discovery
    // ========================================================================

    /// Pre-order walk over the whole compilation unit.
    pub fn discover(&mut self, statements: &[Stmt], arena: &FuncExprArena) {
        for stmt in statements {
            self.discover_stmt(stmt, arena);
        }
    }

    fn discover_stmt(&mut self, stmt: &Stmt, arena: &FuncExprArena) {
        match stmt {
            Stmt::Expression(s) => self.discover_expr(&s.expr, arena),
            Stmt::FunctionDecl(f) => self.discover(&f.body, arena),
            Stmt::ClassDecl(class) => {
                for field in &class.fields {
                    if let Some(default) = &field.default {
                        self.discover_expr(default, arena);
                    }
                }
                if let Some(ctor) = &class.constructor {
                    self.discover(&ctor.body, arena);
                }
                for method in &class.methods {
                    self.discover(&method.body, arena);
                }
                for op in &class.operators {
                    self.discover(&op.body, arena);
                }
            }
            Stmt::If(s) => {
                self.discover_expr(&s.condition, arena);
                self.discover(&s.then_body, arena);
                self.discover(&s.else_body, arena);
            }
            Stmt::For(s) => {
                if let Some(init) = &s.init {
                    self.discover_stmt(init, arena);
                }
                if let Some(cond) = &s.condition {
                    self.discover_expr(cond, arena);
                }
                if let Some(update) = &s.update {
                    self.discover_expr(update, arena);
                }
                self.discover(&s.body, arena);
            }
            Stmt::ForEach(s) => {
                self.discover_expr(&s.iterable, arena);
                self.discover(&s.body, arena);
            }
            Stmt::Switch(s) => {
                self.discover_expr(&s.discriminant, arena);
                for case in &s.cases {
                    if let Some(value) = &case.value {
                        self.discover_expr(value, arena);
                    }
                    self.discover(&case.body, arena);
                }
            }
            Stmt::Return(s) => {
                if let Some(value) = &s.value {
                    self.discover_expr(value, arena);
                }
            }
            Stmt::Export(s) => {
                if let Some(decl) = &s.declaration {
                    self.discover_stmt(decl, arena);
                }
            }
            Stmt::Break(_) | Stmt::Import(_) => {}
        }
    }

    fn discover_expr(&mut self, expr: &Expr, arena: &FuncExprArena) {
        match expr {
            Expr::Function(func_ref) => {
                self.register(func_ref.id, arena);
                // Nested function expressions inside the body must be
                // discovered too.
                for stmt in &arena.get(func_ref.id).body {
                    self.discover_stmt(stmt, arena);
                }
            }
            Expr::Binary(b) => {
                if let Some(left) = &b.left {
                    self.discover_expr(left, arena);
                }
                self.discover_expr(&b.right, arena);
            }
            Expr::Ternary(t) => {
                self.discover_expr(&t.condition, arena);
                self.discover_expr(&t.then_expr, arena);
                self.discover_expr(&t.else_expr, arena);
            }
            Expr::Call(c) => {
                for arg in &c.args {
                    self.discover_expr(arg, arena);
                }
            }
            Expr::MethodCall(c) => {
                for arg in &c.args {
                    self.discover_expr(arg, arena);
                }
            }
            Expr::ExprMethodCall(c) => {
                self.discover_expr(&c.object, arena);
                for arg in &c.args {
                    self.discover_expr(arg, arena);
                }
            }
            Expr::ExprPropertyAccess(p) => self.discover_expr(&p.object, arena),
            Expr::Array(a) => {
                for element in &a.elements {
                    self.discover_expr(element, arena);
                }
            }
            Expr::Object(o) => {
                for (_, value) in &o.properties {
                    self.discover_expr(value, arena);
                }
            }
            Expr::TypedArray(t) => {
                for element in &t.elements {
                    self.discover_expr(element, arena);
                }
            }
            Expr::ArrayAccess(a) => {
                self.discover_expr(&a.object, arena);
                if let Some(index) = &a.index {
                    self.discover_expr(index, arena);
                }
                for slice in &a.slices {
                    self.discover_expr(slice, arena);
                }
            }
            Expr::Assignment(a) => self.discover_expr(&a.value, arena),
            Expr::PropertyAssignment(a) => self.discover_expr(&a.value, arena),
            Expr::New(n) => {
                for arg in &n.args {
                    self.discover_expr(arg, arena);
                }
                for (_, value) in &n.named_args {
                    self.discover_expr(value, arena);
                }
            }
            Expr::SuperCall(s) => {
                for arg in &s.args {
                    self.discover_expr(arg, arena);
                }
            }
            Expr::SuperMethodCall(s) => {
                for arg in &s.args {
                    self.discover_expr(arg, arena);
                }
            }
            Expr::Number(_)
            | Expr::StringLit(_)
            | Expr::Regex(_)
            | Expr::Identifier(_)
            | Expr::PropertyAccess(_)
            | Expr::Slice(_)
            | Expr::PostfixIncrement(_)
            | Expr::PostfixDecrement(_)
            | Expr::This(_) => {}
        }
    }

    fn register(&mut self, expr_id: FuncExprId, arena: &FuncExprArena) {
        if self.functions.contains_key(&expr_id) {
            return;
        }
        let node = arena.get(expr_id);
        let mut name = match &node.name {
            Some(name) => name.clone(),
            None => self.synthesize_name(),
        };
        // Duplicate names are disambiguated by suffixing the counter.
        while self.names.contains_key(&name) {
            name = format!("{}_{}", name, self.name_counter);
            self.name_counter += 1;
        }

        let function_id =
            registry::register_function_fast(0, node.params.len() as u16, 0);

        self.names.insert(name.clone(), expr_id);
        self.functions.insert(
            expr_id,
            FunctionInfo {
                name,
                expr_id,
                function_id,
                code_offset: 0,
                code_size: 0,
                address: 0,
                state: FuncState::Discovered,
            },
        );
        self.compilation_order.push(expr_id);
    }

    fn synthesize_name(&mut self) -> String {
        let name = format!("__func_expr_{}", self.name_counter);
        self.name_counter += 1;
        name
    }

    // ========================================================================
    // Phase 2 — compilation bookkeeping
    // ========================================================================

    /// Discovery order reversed: innermost first.
    pub fn reverse_compilation_order(&self) -> Vec<FuncExprId> {
        self.compilation_order.iter().rev().copied().collect()
    }

    pub fn mark_compiled(&mut self, expr_id: FuncExprId, code_offset: usize, code_size: usize) {
        if let Some(info) = self.functions.get_mut(&expr_id) {
            info.code_offset = code_offset;
            info.code_size = code_size;
            info.state = FuncState::Compiled;
        }
    }

    // ========================================================================
    // Phase 3 — address binding
    // ========================================================================

    /// Bind `base + offset` for every compiled function, updating the
    /// ID-indexed registry and the name registry.
    pub fn bind_addresses(&mut self, base: usize) -> Result<(), CompileError> {
        for id in &self.compilation_order {
            let info = self
                .functions
                .get_mut(id)
                .ok_or_else(|| CompileError::Manager("missing function record".to_string()))?;
            if info.state != FuncState::Compiled {
                return Err(CompileError::Manager(format!(
                    "function '{}' reached address binding without being compiled",
                    info.name
                )));
            }
            info.address = base + info.code_offset;
            info.state = FuncState::AddressBound;
            registry::bind_fast_function(info.function_id, info.address);
            registry::register_named(&info.name, info.address);
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn info(&self, expr_id: FuncExprId) -> Option<&FunctionInfo> {
        self.functions.get(&expr_id)
    }

    pub fn assigned_name(&self, expr_id: FuncExprId) -> Option<&str> {
        self.functions.get(&expr_id).map(|info| info.name.as_str())
    }

    /// The best reference shape for a call site, in priority order:
    /// absolute address, base+offset, ID lookup.
    pub fn func_ref(&self, expr_id: FuncExprId) -> Result<FuncRef, CompileError> {
        let info = self.functions.get(&expr_id).ok_or_else(|| {
            CompileError::Manager(
                "function expression reached code generation without an assigned name".to_string(),
            )
        })?;
        Ok(match info.state {
            FuncState::AddressBound => FuncRef::Address(info.address),
            FuncState::Compiled => FuncRef::BaseOffset(info.code_offset),
            FuncState::Discovered => FuncRef::IdLookup(info.function_id),
        })
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_parser::Parser;

    fn discover(source: &str) -> (FunctionCompilationManager, FuncExprArena) {
        let program = Parser::new(source).unwrap().parse().unwrap();
        let mut manager = FunctionCompilationManager::new();
        manager.discover(&program.statements, &program.arena);
        (manager, program.arena)
    }

    #[test]
    fn test_discovery_assigns_names_to_all() {
        let (manager, arena) =
            discover("let f = function(n) { return function(m) { return n + m; }; };");
        assert_eq!(manager.function_count(), 2);
        for i in 0..arena.len() {
            let id = FuncExprId(i as u32);
            let name = manager.assigned_name(id).expect("name assigned");
            assert!(!name.is_empty());
            let info = manager.info(id).unwrap();
            assert_eq!(info.state, FuncState::Discovered);
            assert!(info.function_id > 0);
        }
    }

    #[test]
    fn test_reverse_order_is_innermost_first() {
        let (manager, _arena) =
            discover("let f = function(n) { return function(m) { return n + m; }; };");
        let order = manager.reverse_compilation_order();
        // The outer function was discovered first, so reverse order starts
        // with the inner one.
        assert_eq!(order.len(), 2);
        assert!(order[0].0 > order[1].0);
    }

    #[test]
    fn test_discovery_inside_goroutine_args_and_calls() {
        let (manager, _) = discover("go run(function() { return 1; });");
        assert_eq!(manager.function_count(), 1);
    }

    #[test]
    fn test_discovery_inside_binary_and_if() {
        let (manager, _) = discover(
            "if (x > 1) { let g = function() { return 1; }; } else { let h = 1 + (function() { return 2; })(); }",
        );
        assert_eq!(manager.function_count(), 2);
    }

    #[test]
    fn test_named_function_expressions_keep_names() {
        let (manager, arena) = discover("let f = function adder(n) { return n; };");
        let id = FuncExprId(0);
        assert_eq!(manager.assigned_name(id), Some("adder"));
        assert_eq!(arena.get(id).name.as_deref(), Some("adder"));
    }

    #[test]
    fn test_state_machine_transitions() {
        let (mut manager, _) = discover("let f = function() { return 1; };");
        let id = FuncExprId(0);
        assert_eq!(manager.func_ref(id).unwrap(), {
            let fid = manager.info(id).unwrap().function_id;
            FuncRef::IdLookup(fid)
        });

        manager.mark_compiled(id, 64, 32);
        assert_eq!(manager.func_ref(id).unwrap(), FuncRef::BaseOffset(64));
        let info = manager.info(id).unwrap();
        assert_eq!(info.state, FuncState::Compiled);
        assert!(info.code_size > 0);

        manager.bind_addresses(0x10_000).unwrap();
        assert_eq!(
            manager.func_ref(id).unwrap(),
            FuncRef::Address(0x10_000 + 64)
        );
        let info = manager.info(id).unwrap();
        assert_eq!(info.address, 0x10_000 + info.code_offset);
    }

    #[test]
    fn test_binding_uncompiled_function_is_manager_error() {
        let (mut manager, _) = discover("let f = function() { return 1; };");
        assert!(manager.bind_addresses(0x1000).is_err());
    }
}
