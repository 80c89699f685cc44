//! The compilation pipeline driver.
//!
//! source → tokens → AST → class registration (with default-constructor
//! synthesis) → Phase 1 discovery → Phase 2 innermost-first function
//! compilation → declared functions and class bodies → top-level code
//! behind a leading `jmp __main` → Phase 3 label fixup and address
//! binding → JIT page install → entry call.

use strand_parser::ast::*;
use strand_parser::{Parser, Program};
use strand_runtime::{object, registry};

use crate::codegen::{ClassMeta, CodeGen, FieldMeta, FunctionMeta, MethodMeta, OverloadMeta};
use crate::codegen::overload_label;
use crate::emitter::{Emitter, Reg};
use crate::error::CompileError;
use crate::jit::ExecutableRegion;
use crate::types::{self, DataType};
use crate::x86::X86Emitter;

pub struct Compiler {
    cg: CodeGen<X86Emitter>,
    program: Option<Program>,
    region: Option<ExecutableRegion>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            cg: CodeGen::new(X86Emitter::new()),
            program: None,
            region: None,
        }
    }

    /// Compile a source unit to machine code (not yet installed).
    pub fn compile(&mut self, source: &str) -> Result<(), CompileError> {
        let parser = Parser::new(source).map_err(CompileError::Lex)?;
        let program = parser.parse()?;
        self.compile_program(program)
    }

    fn compile_program(&mut self, program: Program) -> Result<(), CompileError> {
        self.register_classes(&program.statements)?;
        self.register_functions(&program.statements);

        // Phase 1: discover every function expression
        self.cg.manager.discover(&program.statements, &program.arena);

        // Top-level execution starts past every function body
        self.cg.gen.jump("__main");

        // Phase 2: compile function expressions innermost-first
        for id in self.cg.manager.reverse_compilation_order() {
            self.cg.compile_function_expr(id, &program.arena)?;
        }

        // Declared functions, then class constructors/methods/overloads
        for stmt in declared_items(&program.statements) {
            if let Stmt::FunctionDecl(f) = stmt {
                self.cg.emit_function_decl(f, &program.arena)?;
            }
        }
        for stmt in declared_items(&program.statements) {
            if let Stmt::ClassDecl(class) = stmt {
                self.cg.emit_class(class, &program.arena)?;
            }
        }

        // __main: every statement that is not a declaration
        self.cg.gen.label("__main");
        let top_level: Vec<&Stmt> = program
            .statements
            .iter()
            .filter(|stmt| !is_declaration(stmt))
            .collect();
        let frame = {
            let size = 80 + top_level.len() as i64 * 24 + 64;
            (size + 15) & !15
        };
        self.cg.gen.set_function_stack_size(frame);
        self.cg.gen.prologue();
        for stmt in top_level {
            self.cg.gen_stmt(stmt, &program.arena)?;
        }
        self.cg.gen.mov_reg_imm(Reg::Rax, 0);
        self.cg.gen.epilogue();

        // Seal: every fixup resolved, every label inside the code
        self.cg.gen.finalize()?;

        self.program = Some(program);
        Ok(())
    }

    /// Register class layouts, synthesize runtime inheritance links, and
    /// fold constant static-field defaults into the static-property table.
    fn register_classes(&mut self, statements: &[Stmt]) -> Result<(), CompileError> {
        for stmt in declared_items(statements) {
            let Stmt::ClassDecl(class) = stmt else {
                continue;
            };

            let mut fields = Vec::new();
            for field in &class.fields {
                if field.is_static {
                    let value = match &field.default {
                        Some(Expr::Number(n)) => n.value as i64,
                        Some(Expr::StringLit(s)) => {
                            strand_runtime::string::intern_str(&s.value) as i64
                        }
                        _ => 0,
                    };
                    // Safety: both names are interned NUL-terminated bytes
                    unsafe {
                        object::static_set_property(
                            strand_runtime::string::intern_cstr(&class.name) as *const _,
                            strand_runtime::string::intern_cstr(&field.name) as *const _,
                            value,
                        );
                    }
                    continue;
                }
                let (ty, class_name) = field
                    .type_annotation
                    .as_ref()
                    .map(types::resolve_annotation)
                    .unwrap_or((DataType::Unknown, None));
                fields.push(FieldMeta {
                    name: field.name.clone(),
                    ty,
                    class_name,
                    default: field.default.clone(),
                });
            }

            let methods = class
                .methods
                .iter()
                .map(|m| MethodMeta {
                    name: m.name.clone(),
                    is_static: m.is_static,
                    return_type: m
                        .return_type
                        .as_ref()
                        .map(|a| types::resolve_annotation(a).0)
                        .unwrap_or(DataType::Unknown),
                })
                .collect();

            let overloads = class
                .operators
                .iter()
                .map(|op| {
                    let params: Vec<DataType> = op
                        .params
                        .iter()
                        .map(|p| {
                            p.type_annotation
                                .as_ref()
                                .map(|a| types::resolve_annotation(a).0)
                                .unwrap_or(DataType::Unknown)
                        })
                        .collect();
                    OverloadMeta {
                        op: op.operator.clone(),
                        return_type: op
                            .return_type
                            .as_ref()
                            .map(|a| types::resolve_annotation(a).0)
                            .unwrap_or(DataType::ClassInstance),
                        label: overload_label(&class.name, &op.operator, &params),
                        params,
                    }
                })
                .collect();

            if let Some(parent) = &class.parent {
                // Safety: both names are interned NUL-terminated bytes
                unsafe {
                    object::register_class_inheritance(
                        strand_runtime::string::intern_cstr(&class.name) as *const _,
                        strand_runtime::string::intern_cstr(parent) as *const _,
                    );
                }
            }

            self.cg.classes.register(ClassMeta {
                name: class.name.clone(),
                parent: class.parent.clone(),
                fields,
                methods,
                overloads,
                has_constructor: class.constructor.is_some(),
            });
        }
        Ok(())
    }

    /// Pre-register declared function metadata so call sites know return
    /// types before the bodies are emitted.
    fn register_functions(&mut self, statements: &[Stmt]) {
        for stmt in declared_items(statements) {
            if let Stmt::FunctionDecl(f) = stmt {
                let return_type = f
                    .return_type
                    .as_ref()
                    .map(|a| types::resolve_annotation(a).0)
                    .unwrap_or(types::NUMBER);
                self.cg.functions.insert(
                    f.name.clone(),
                    FunctionMeta {
                        name: f.name.clone(),
                        return_type,
                        param_count: f.params.len(),
                    },
                );
            }
        }
    }

    pub fn machine_code(&self) -> &[u8] {
        self.cg.gen.code()
    }

    /// Install the code page, bind addresses (Phase 3), and invoke
    /// `base + offset(__main)` as a native zero-argument function.
    pub fn execute(&mut self) -> Result<i64, CompileError> {
        let region = ExecutableRegion::install(self.cg.gen.code())?;
        let base = region.base();
        registry::set_executable_memory(base, region.size());

        // Phase 3: bind every function expression's final address
        self.cg.manager.bind_addresses(base)?;

        // Register callable labels so name-directed runtime lookups
        // (goroutine spawns, super-constructor calls) can resolve them.
        let main_offset = {
            let mut main_offset = None;
            for (name, &offset) in self.cg.gen.label_offsets() {
                if name == "__main" {
                    main_offset = Some(offset);
                    continue;
                }
                let callable = !name.starts_with("__")
                    || name.starts_with("__method_")
                    || name.starts_with("__static_")
                    || name.starts_with("__constructor_")
                    || name.starts_with("__func_expr_");
                if callable {
                    registry::register_named(name, base + offset);
                }
            }
            main_offset.ok_or_else(|| CompileError::Link("__main".to_string()))?
        };

        // Safety: __main is a complete emitted function with the standard
        // prologue/epilogue, returning i64 in RAX.
        let entry = unsafe { region.entry(main_offset) };
        self.region = Some(region);
        let result = entry();
        Ok(result)
    }

    /// Compile and execute in one step (the CLI surface).
    pub fn compile_and_run(source: &str) -> Result<i64, CompileError> {
        let mut compiler = Compiler::new();
        compiler.compile(source)?;
        compiler.execute()
    }

    pub fn label_offset(&self, name: &str) -> Option<usize> {
        self.cg.gen.label_offsets().get(name).copied()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

fn is_declaration(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::FunctionDecl(_) | Stmt::ClassDecl(_) => true,
        Stmt::Export(e) => e
            .declaration
            .as_deref()
            .map(is_declaration)
            .unwrap_or(false),
        _ => false,
    }
}

/// Top-level declarations, looking through `export` wrappers.
fn declared_items(statements: &[Stmt]) -> impl Iterator<Item = &Stmt> {
    statements.iter().map(|stmt| match stmt {
        Stmt::Export(e) => e.declaration.as_deref().unwrap_or(stmt),
        other => other,
    })
}
