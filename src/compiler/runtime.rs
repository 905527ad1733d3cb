//! Runtime Contract
//!
//! Names of the C++ runtime entities that generated code is emitted against:
//! the `pycs::gc` reference-counting layer, the `py_*` helper functions and the
//! per-module shim headers.
//!
//! ## Purpose
//! - Keeps every emitted runtime spelling in one place
//! - Maps imported Python modules to their include directives and namespaces

/// Namespace of the reference-counting runtime.
pub const GC_NAMESPACE: &str = "pycs::gc";

/// Namespace holding the per-module shims (`pycs::cpp_module::math`, ...).
pub const MODULE_NAMESPACE: &str = "pycs::cpp_module";

/// Includes present in every translation unit.
pub const BASE_INCLUDES: &[&str] = &[
    "#include <algorithm>",
    "#include <any>",
    "#include <cstdint>",
    "#include <iostream>",
    "#include <sstream>",
    "#include <stdexcept>",
    "#include <string>",
    "#include <tuple>",
    "#include <type_traits>",
    "#include <unordered_map>",
    "#include <unordered_set>",
    "#include <vector>",
    "#include \"cpp_module/gc.h\"",
    "#include \"cpp_module/py_runtime.h\"",
];

/// Namespace directives emitted after the includes.
pub const USING_DIRECTIVES: &[&str] = &["using namespace std;", "using namespace pycs::gc;"];

/// Fallback type for values whose type cannot be determined.
pub const DYNAMIC_TYPE: &str = "std::any";

/// Include directive for an imported Python module, if it has a shim.
pub fn include_for_module(module: &str) -> Option<&'static str> {
    match module {
        "math" => Some("#include \"cpp_module/math.h\""),
        "ast" => Some("#include \"cpp_module/ast.h\""),
        "pathlib" => Some("#include \"cpp_module/pathlib.h\""),
        "dataclasses" => Some("#include \"cpp_module/dataclasses.h\""),
        "typing" => Some("#include <any>"),
        _ => None,
    }
}

/// Whether `module.attr` lowers to a namespace access.
pub fn has_namespace(module: &str) -> bool {
    matches!(module, "math" | "ast" | "pathlib")
}

/// `pycs::cpp_module::<module>::<attr>`
pub fn module_member(module: &str, attr: &str) -> String {
    format!("{}::{}::{}", MODULE_NAMESPACE, module, attr)
}

/// `pycs::cpp_module::ast::<node>`, the shim class for a Python `ast` node.
pub fn ast_node_class(node: &str) -> String {
    // `operator` is a C++ keyword
    let node = if node == "operator" { "operator_" } else { node };
    module_member("ast", node)
}

/// C++ type for an `ast.<node>` annotation. The three abstract roots have
/// dedicated pointer aliases; concrete nodes are shared pointers.
pub fn ast_node_type(node: &str) -> Option<String> {
    let alias = match node {
        "Module" => "ModulePtr",
        "stmt" => "StmtPtr",
        "expr" => "ExprPtr",
        "FunctionDef" | "ClassDef" | "Assign" | "AnnAssign" | "For" | "If" | "Try" | "Raise"
        | "Call" | "JoinedStr" | "boolop" | "cmpop" | "unaryop" | "operator" => {
            return Some(format!("std::shared_ptr<{}>", ast_node_class(node)));
        }
        _ => return None,
    };
    Some(module_member("ast", alias))
}

/// Owning handle type for a generated class.
pub fn handle_type(class: &str) -> String {
    format!("{}::RcHandle<{}>", GC_NAMESPACE, class)
}

/// The class behind a [`handle_type`] spelling.
pub fn handle_class(ty: &str) -> Option<&str> {
    ty.strip_prefix(GC_NAMESPACE)?
        .strip_prefix("::RcHandle<")?
        .strip_suffix('>')
}

/// Allocation of a fresh instance: the object starts at count 1 and the handle
/// adopts it without a further increment.
pub fn allocate(class: &str, args: &str) -> String {
    format!(
        "{ns}::RcHandle<{cls}>::adopt({ns}::rc_new<{cls}>({args}))",
        ns = GC_NAMESPACE,
        cls = class,
        args = args
    )
}

/// Base class of every generated class without an explicit base.
pub fn object_base() -> String {
    format!("{}::PyObj", GC_NAMESPACE)
}

/// Root type for thrown and caught errors.
pub const ROOT_EXCEPTION: &str = "std::exception";

/// Maps a supported method name and arity to its runtime spelling.
///
/// Returns `None` when the call should be emitted as a plain member call.
pub fn method_helper(method: &str, object: &str, args: &[String]) -> Option<String> {
    let call = match (method, args) {
        ("append", [item]) => format!("{}.push_back({})", object, item),
        ("extend", [items]) => format!("py_extend({}, {})", object, items),
        ("add", [item]) => format!("{}.insert({})", object, item),
        ("union", [other]) => format!("py_set_union({}, {})", object, other),
        ("splitlines", []) => format!("py_splitlines({})", object),
        ("join", [items]) => format!("py_join({}, {})", object, items),
        ("replace", [old, new]) => format!("py_replace({}, {}, {})", object, old, new),
        ("pop", []) => format!("py_pop({})", object),
        ("pop", [index]) => format!("py_pop({}, {})", object, index),
        ("isdigit", []) => format!("py_isdigit({})", object),
        ("isalpha", []) => format!("py_isalpha({})", object),
        _ => return None,
    };
    Some(call)
}
