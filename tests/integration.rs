use pretty_assertions::assert_eq;
use py2cpp::*;

fn transpile_source(source: &str) -> String {
    let module = parser::parse_module(source, "test.py").unwrap();
    codegen::generate(&module).unwrap()
}

const PRELUDE_TAIL: &str = r#"#include <algorithm>
#include <any>
#include <cstdint>
#include <iostream>
#include <sstream>
#include <stdexcept>
#include <string>
#include <tuple>
#include <type_traits>
#include <unordered_map>
#include <unordered_set>
#include <vector>

using namespace std;
using namespace pycs::gc;
"#;

/// Expected include block and using directives, with `headers` added to the
/// quoted runtime includes.
fn prelude(headers: &[&str]) -> String {
    let mut quoted = vec!["cpp_module/gc.h", "cpp_module/py_runtime.h"];
    quoted.extend_from_slice(headers);
    quoted.sort();
    let mut text = String::new();
    for header in quoted {
        text.push_str(&format!("#include \"{}\"\n", header));
    }
    text.push_str(PRELUDE_TAIL);
    text.push('\n');
    text
}

#[test]
fn test_function_and_entry_point() {
    let source = r#"
def square(x: int) -> int:
    return x * x

print(square(3))
"#;
    let expected = prelude(&[])
        + r#"long long square(long long x)
{
    return (x * x);
}

int main()
{
    py_print(square(3));
    return 0;
}
"#;
    assert_eq!(transpile_source(source), expected);
}

#[test]
fn test_static_field_counter() {
    let source = r#"
class Counter:
    total: int = 0

    def add(self, x: int) -> int:
        self.total = self.total + x
        return self.total
"#;
    let expected = prelude(&[])
        + r#"class Counter;

class Counter : public pycs::gc::PyObj
{
public:
    inline static long long total = 0;
    virtual long long add(long long x)
    {
        Counter::total = (Counter::total + x);
        return Counter::total;
    }
};

int main()
{
    return 0;
}
"#;
    assert_eq!(transpile_source(source), expected);
}

#[test]
fn test_dataclass_with_default() {
    let source = r#"
from dataclasses import dataclass

@dataclass
class Point:
    x: int
    y: int = 10

    def total(self) -> int:
        return self.x + self.y

print(Point(3).total())
"#;
    let expected = prelude(&["cpp_module/dataclasses.h"])
        + r#"class Point;

class Point : public pycs::gc::PyObj
{
public:
    long long x;
    long long y = 10;
    Point(long long x, long long y = 10)
    {
        this->x = x;
        this->y = y;
    }
    virtual long long total()
    {
        return (this->x + this->y);
    }
};

int main()
{
    py_print(pycs::gc::RcHandle<Point>::adopt(pycs::gc::rc_new<Point>(3))->total());
    return 0;
}
"#;
    assert_eq!(transpile_source(source), expected);
}

#[test]
fn test_tuple_unpacking_loop_over_const_reference() {
    let source = r#"
def sum_pairs(pairs: list[tuple[int, int]]) -> int:
    total = 0
    for a, b in pairs:
        total += a + b
    return total
"#;
    let output = transpile_source(source);
    let expected = r#"long long sum_pairs(const vector<tuple<long long, long long>>& pairs)
{
    long long total = 0;
    for (const auto& __pytra_item_1 : pairs)
    {
        auto a = std::get<0>(__pytra_item_1);
        auto b = std::get<1>(__pytra_item_1);
        total += (a + b);
    }
    return total;
}
"#;
    assert!(output.contains(expected), "unexpected output:\n{}", output);
}

#[test]
fn test_isinstance_narrowing() {
    let source = r#"
class Node:
    pass

class Leaf(Node):
    def __init__(self, value: int) -> None:
        self.value = value

def leaf_value(node: Node) -> int:
    if isinstance(node, Leaf):
        return node.value
    return 0
"#;
    let output = transpile_source(source);
    let expected = r#"class Node;
class Leaf;

class Node : public pycs::gc::PyObj
{
public:
};

class Leaf : public Node
{
public:
    long long value;
    Leaf(long long value)
    {
        this->value = value;
    }
};

long long leaf_value(pycs::gc::RcHandle<Node> node)
{
    if (auto __cast_node = py_cast<Leaf>(node))
    {
        auto node = __cast_node;
        return node->value;
    }
    return 0;
}
"#;
    assert!(output.contains(expected), "unexpected output:\n{}", output);
}

#[test]
fn test_raise_and_catch() {
    let source = r#"
def fail() -> None:
    try:
        raise ValueError("boom")
    except Exception as err:
        print(str(err))
        raise
"#;
    let output = transpile_source(source);
    let expected = r#"void fail()
{
    try
    {
        throw std::runtime_error(py_to_string("boom"));
    }
    catch (const std::exception& err)
    {
        py_print(py_to_string(err));
        throw;
    }
}
"#;
    assert!(output.contains(expected), "unexpected output:\n{}", output);
}

#[test]
fn test_branch_scopes_do_not_leak() {
    let source = r#"
x = 1
if x > 0:
    x = 2
    y = 3
else:
    y = 4
y = 5
"#;
    let output = transpile_source(source);
    let expected = r#"int main()
{
    long long x = 1;
    if (x > 0)
    {
        x = 2;
        long long y = 3;
    }
    else
    {
        long long y = 4;
    }
    long long y = 5;
    return 0;
}
"#;
    assert!(output.ends_with(expected), "unexpected output:\n{}", output);
}

#[test]
fn test_main_guard_and_rename() {
    let source = r#"
def main() -> None:
    print("hi")

if __name__ == "__main__":
    main()
"#;
    let output = transpile_source(source);
    let expected = r#"void py_main()
{
    py_print("hi");
}

int main()
{
    py_main();
    return 0;
}
"#;
    assert!(output.ends_with(expected), "unexpected output:\n{}", output);
}

#[test]
fn test_imports_and_docstrings_are_not_statements() {
    let source = r#"
"""Module docstring."""
import math

def root(x: float) -> float:
    """Square root."""
    return math.sqrt(x)
"#;
    let output = transpile_source(source);
    assert!(output.contains("#include \"cpp_module/math.h\"\n"));
    let expected = r#"double root(double x)
{
    return pycs::cpp_module::math::sqrt(x);
}

int main()
{
    return 0;
}
"#;
    assert!(output.ends_with(expected), "unexpected output:\n{}", output);
}

#[test]
fn test_generation_is_deterministic() {
    let source = r#"
class Box:
    def __init__(self, items: list[int]) -> None:
        self.items = items

def first(b: Box) -> int:
    a, c = 1, 2
    for i in range(3):
        a += i
    return b.items[0] + a + c
"#;
    let module = parser::parse_module(source, "test.py").unwrap();
    let once = generate(&module).unwrap();
    let twice = generate(&module).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_transpile_reports_both_stages() {
    let parse = transpile("x = 1\n    y = 2\n", "bad.py").unwrap_err();
    assert!(matches!(parse, TranspileError::Parse(_)));
    assert_eq!(parse.to_string(), "bad.py:2: unexpected indent");

    let generation = transpile("class C(A, B):\n    pass\n", "bad.py").unwrap_err();
    assert!(matches!(generation, TranspileError::Generation(_)));
    assert_eq!(
        generation.to_string(),
        "class 'C': multiple inheritance is not supported"
    );
}

#[test]
fn test_transpile_matches_generate() {
    let source = "print(1)\n";
    let module = parse_module(source, "one.py").unwrap();
    assert_eq!(transpile(source, "one.py").unwrap(), generate(&module).unwrap());
}

#[test]
fn test_instances_call_their_own_methods() {
    let source = r#"
class Counter:
    total: int = 0

    def add(self, x: int) -> int:
        self.total = self.total + x
        return self.total

a = Counter()
b = Counter()
a.add(1)
print(b.add(2))
"#;
    let output = transpile_source(source);
    let expected = r#"int main()
{
    pycs::gc::RcHandle<Counter> a = pycs::gc::RcHandle<Counter>::adopt(pycs::gc::rc_new<Counter>());
    pycs::gc::RcHandle<Counter> b = pycs::gc::RcHandle<Counter>::adopt(pycs::gc::rc_new<Counter>());
    a->add(1);
    py_print(b->add(2));
    return 0;
}
"#;
    assert!(output.ends_with(expected), "unexpected output:\n{}", output);
    assert!(!output.contains(".insert("), "unexpected output:\n{}", output);
}

#[test]
fn test_method_names_resolve_by_receiver() {
    let source = r#"
class Bag:
    def add(self, x: int) -> None:
        pass

    def add_twice(self, x: int) -> None:
        self.add(x)
        self.add(x)

def fill(bag: Bag, seen: set[int]) -> None:
    bag.add(1)
    seen.add(1)
    other: Bag = bag
    other.add(2)
    alias = other
    alias.add(3)
"#;
    let output = transpile_source(source);
    for fragment in [
        "        this->add(x);\n",
        "    bag->add(1);\n",
        "    seen.insert(1);\n",
        "    other->add(2);\n",
        "    alias->add(3);\n",
    ] {
        assert!(output.contains(fragment), "missing {:?} in:\n{}", fragment, output);
    }
}

#[test]
fn test_docstrings_with_quoted_assignments() {
    let source = r#"
class Config:
    """Holds "k=v" entries and "x: y" pairs."""
    size: int = 0

def pairs() -> int:
    """Returns "a=b" pairs.

    Each one reads 'key: value = 1'.
    """
    return 1
"#;
    let output = transpile_source(source);
    assert!(output.contains("    inline static long long size = 0;\n"), "unexpected output:\n{}", output);
    let expected = r#"long long pairs()
{
    return 1;
}
"#;
    assert!(output.contains(expected), "unexpected output:\n{}", output);
}

#[test]
fn test_ast_node_annotations_and_narrowing() {
    let source = r#"
import ast

def count_functions(module: ast.Module) -> int:
    n = 0
    for stmt in module.body:
        if isinstance(stmt, ast.FunctionDef):
            n += 1
    return n
"#;
    let output = transpile_source(source);
    assert!(output.contains("long long count_functions(pycs::cpp_module::ast::ModulePtr module)\n"));
    assert!(
        output.contains("        if (auto __cast_stmt = py_cast<pycs::cpp_module::ast::FunctionDef>(stmt))\n"),
        "unexpected output:\n{}",
        output
    );
}
