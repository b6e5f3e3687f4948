//! Load-and-instantiate check for optimized binary modules.
//!
//! Nothing exported is ever called. A module passes if the runtime parses it,
//! resolves every import against the mock host bindings and finishes its
//! instantiation-time initialization (start function, segment init) without
//! trapping.

use tracing::debug;
use wasmtime::{
    Engine, Extern, ExternType, Func, FuncType, Global, GlobalType, Linker, Module, Mutability,
    Store, Val, ValType,
};

use crate::diagnostics::InstantiateError;

/// One host-provided import.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMember {
    /// `abort(message, file, line, column)`; does nothing.
    AbortHook,
    /// A function that does nothing and returns zeroes.
    Function(&'static str),
    /// A numeric constant. Satisfies only an immutable `i32`, `f32` or `f64`
    /// global import; a plain number cannot back a mutable or `i64` global.
    Constant(&'static str, f64),
}

impl HostMember {
    pub fn name(&self) -> &'static str {
        match self {
            HostMember::AbortHook => "abort",
            HostMember::Function(name) | HostMember::Constant(name, _) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostNamespace {
    pub name: &'static str,
    pub members: Vec<HostMember>,
}

/// The import object a module is instantiated against.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBindings {
    pub namespaces: Vec<HostNamespace>,
}

impl HostBindings {
    /// The fixed mock environment compiler fixtures are written against.
    pub fn standard() -> Self {
        Self {
            namespaces: vec![
                HostNamespace {
                    name: "env",
                    members: vec![
                        HostMember::AbortHook,
                        HostMember::Function("externalFunction"),
                        HostMember::Constant("externalConstant", 1.0),
                    ],
                },
                HostNamespace {
                    name: "my",
                    members: vec![
                        HostMember::Function("externalFunction"),
                        HostMember::Constant("externalConstant", 2.0),
                    ],
                },
            ],
        }
    }

    pub fn lookup(&self, module: &str, name: &str) -> Option<&HostMember> {
        self.namespaces
            .iter()
            .filter(|ns| ns.name == module)
            .flat_map(|ns| &ns.members)
            .find(|member| member.name() == name)
    }
}

/// A successfully created instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instantiated {
    pub exports: Vec<String>,
}

/// A module runtime able to parse and instantiate binary modules.
pub trait ModuleRuntime {
    fn instantiate(
        &self,
        bytes: &[u8],
        bindings: &HostBindings,
    ) -> Result<Instantiated, InstantiateError>;
}

/// [`ModuleRuntime`] backed by wasmtime.
///
/// Host bindings are adapted to whatever type each import declares, the way a
/// dynamically typed host would accept them: any function signature is
/// satisfied by a no-op, and an immutable `i32`/`f32`/`f64` global by the
/// constant converted to its type. Mutable and `i64` globals are rejected.
pub struct WasmtimeRuntime {
    engine: Engine,
}

impl WasmtimeRuntime {
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
        }
    }
}

impl Default for WasmtimeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRuntime for WasmtimeRuntime {
    fn instantiate(
        &self,
        bytes: &[u8],
        bindings: &HostBindings,
    ) -> Result<Instantiated, InstantiateError> {
        let module = Module::from_binary(&self.engine, bytes).map_err(InstantiateError::Parse)?;
        let mut store = Store::new(&self.engine, ());
        let mut linker: Linker<()> = Linker::new(&self.engine);
        linker.allow_shadowing(true);

        for import in module.imports() {
            let ty = import.ty();
            let unresolved = || InstantiateError::UnresolvedImport {
                module: import.module().to_string(),
                name: import.name().to_string(),
                kind: extern_kind(&ty),
            };

            let member = bindings
                .lookup(import.module(), import.name())
                .ok_or_else(unresolved)?;
            let item: Extern = match (member, &ty) {
                (HostMember::AbortHook | HostMember::Function(_), ExternType::Func(func_ty)) => {
                    noop_func(&mut store, func_ty.clone()).into()
                }
                (HostMember::Constant(_, value), ExternType::Global(global_ty)) => {
                    constant_global(&mut store, global_ty.clone(), *value)
                        .ok_or_else(|| InstantiateError::IncompatibleImport {
                            module: import.module().to_string(),
                            name: import.name().to_string(),
                            expected: describe_global(global_ty),
                        })?
                        .into()
                }
                _ => return Err(unresolved()),
            };
            linker
                .define(&store, import.module(), import.name(), item)
                .map_err(InstantiateError::Instantiate)?;
        }

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(InstantiateError::Instantiate)?;
        let exports: Vec<String> = instance
            .exports(&mut store)
            .map(|export| export.name().to_string())
            .collect();

        debug!(?exports, "module instantiated");
        Ok(Instantiated { exports })
    }
}

/// Instantiates `bytes` against a freshly built [`HostBindings::standard`].
pub fn validate_instantiation(
    runtime: &dyn ModuleRuntime,
    bytes: &[u8],
) -> Result<Instantiated, InstantiateError> {
    let bindings = HostBindings::standard();
    runtime.instantiate(bytes, &bindings)
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn extern_kind(ty: &ExternType) -> &'static str {
    match ty {
        ExternType::Func(_) => "function",
        ExternType::Global(_) => "global",
        ExternType::Table(_) => "table",
        ExternType::Memory(_) => "memory",
        _ => "other",
    }
}

fn noop_func(store: &mut Store<()>, ty: FuncType) -> Func {
    let results: Vec<ValType> = ty.results().collect();
    Func::new(store, ty, move |_caller, _params, out| {
        for (slot, result_ty) in out.iter_mut().zip(&results) {
            *slot = zero_value(result_ty).ok_or_else(|| {
                wasmtime::Error::msg(format!("host stub cannot return a value of type {result_ty:?}"))
            })?;
        }
        Ok(())
    })
}

fn zero_value(ty: &ValType) -> Option<Val> {
    numeric_value(ty, 0.0)
}

fn numeric_value(ty: &ValType, value: f64) -> Option<Val> {
    match ty {
        ValType::I32 => Some(Val::I32(value as i32)),
        ValType::I64 => Some(Val::I64(value as i64)),
        ValType::F32 => Some(Val::F32((value as f32).to_bits())),
        ValType::F64 => Some(Val::F64(value.to_bits())),
        _ => None,
    }
}

fn constant_global(store: &mut Store<()>, ty: GlobalType, value: f64) -> Option<Global> {
    if matches!(ty.mutability(), Mutability::Var) {
        return None;
    }
    let val = match ty.content() {
        ValType::I64 => return None,
        content => numeric_value(content, value)?,
    };
    Global::new(store, ty, val).ok()
}

fn describe_global(ty: &GlobalType) -> String {
    match ty.mutability() {
        Mutability::Const => format!("global {:?}", ty.content()),
        Mutability::Var => format!("global (mut {:?})", ty.content()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instantiate_wat(source: &str) -> Result<Instantiated, InstantiateError> {
        let bytes = wat::parse_str(source).expect("valid WAT");
        validate_instantiation(&WasmtimeRuntime::new(), &bytes)
    }

    #[test]
    fn empty_module_instantiates() {
        let result = instantiate_wat("(module)").unwrap();
        assert!(result.exports.is_empty());
    }

    #[test]
    fn standard_imports_resolve_whatever_their_signature() {
        let result = instantiate_wat(
            r#"(module
                (import "env" "abort" (func $abort (param i32 i32 i32 i32)))
                (import "env" "externalFunction" (func $ef))
                (import "env" "externalConstant" (global $ec i32))
                (import "my" "externalFunction" (func $mf (param i32) (result i32)))
                (import "my" "externalConstant" (global $mc f64))
                (func (export "add") (param i32 i32) (result i32)
                  (i32.add (local.get 0) (local.get 1)))
                (export "ec" (global $ec)))"#,
        )
        .unwrap();
        assert_eq!(result.exports, ["add", "ec"]);
    }

    #[test]
    fn start_function_may_call_host_stubs() {
        instantiate_wat(
            r#"(module
                (import "my" "externalFunction" (func $f (param i32) (result i64)))
                (import "env" "abort" (func $abort (param i32 i32 i32 i32)))
                (func $start
                  (drop (call $f (i32.const 7)))
                  (call $abort (i32.const 0) (i32.const 0) (i32.const 1) (i32.const 1)))
                (start $start))"#,
        )
        .unwrap();
    }

    #[test]
    fn unknown_import_is_unresolved() {
        let err = instantiate_wat(r#"(module (import "env" "missing" (func)))"#).unwrap_err();
        assert!(matches!(err, InstantiateError::UnresolvedImport { .. }));
        assert_eq!(err.to_string(), "unresolved import env.missing (function)");
    }

    #[test]
    fn namespace_is_part_of_the_lookup() {
        let err = instantiate_wat(r#"(module (import "my" "abort" (func)))"#).unwrap_err();
        assert!(matches!(err, InstantiateError::UnresolvedImport { .. }));
    }

    #[test]
    fn kind_mismatch_is_unresolved() {
        let err =
            instantiate_wat(r#"(module (import "env" "externalConstant" (func)))"#).unwrap_err();
        assert!(matches!(err, InstantiateError::UnresolvedImport { .. }));
        let err = instantiate_wat(r#"(module (import "env" "memory" (memory 1)))"#).unwrap_err();
        assert_eq!(err.to_string(), "unresolved import env.memory (memory)");
    }

    #[test]
    fn constant_cannot_back_a_mutable_global() {
        let err = instantiate_wat(r#"(module (import "env" "externalConstant" (global (mut i32))))"#)
            .unwrap_err();
        assert!(matches!(err, InstantiateError::IncompatibleImport { .. }));
        assert!(err.to_string().starts_with("incompatible import env.externalConstant"));
    }

    #[test]
    fn constant_cannot_back_an_i64_global() {
        let err =
            instantiate_wat(r#"(module (import "my" "externalConstant" (global i64)))"#).unwrap_err();
        assert!(matches!(err, InstantiateError::IncompatibleImport { .. }));
    }

    #[test]
    fn constant_backs_every_immutable_float_or_i32_global() {
        instantiate_wat(
            r#"(module
                (import "env" "externalConstant" (global i32))
                (import "my" "externalConstant" (global f32)))"#,
        )
        .unwrap();
    }

    #[test]
    fn malformed_and_textual_input_is_rejected() {
        let runtime = WasmtimeRuntime::new();
        let err = validate_instantiation(&runtime, b"\0asm\x01\0\0\0garbage").unwrap_err();
        assert!(matches!(err, InstantiateError::Parse(_)));
        let err = validate_instantiation(&runtime, b"(module)").unwrap_err();
        assert!(matches!(err, InstantiateError::Parse(_)));
        let err = validate_instantiation(&runtime, b"").unwrap_err();
        assert!(matches!(err, InstantiateError::Parse(_)));
    }

    #[test]
    fn trap_during_start_fails_instantiation() {
        let err = instantiate_wat("(module (func $s unreachable) (start $s))").unwrap_err();
        assert!(matches!(err, InstantiateError::Instantiate(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn standard_bindings_expose_both_namespaces() {
        let bindings = HostBindings::standard();
        assert_eq!(bindings, HostBindings::standard());
        assert_eq!(bindings.lookup("env", "abort"), Some(&HostMember::AbortHook));
        assert_eq!(
            bindings.lookup("my", "externalConstant"),
            Some(&HostMember::Constant("externalConstant", 2.0))
        );
        assert_eq!(bindings.lookup("my", "abort"), None);
    }
}
