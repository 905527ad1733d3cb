use py2cpp::codegen::Generator;
use py2cpp::compiler::generators::expression::generate_expression;
use py2cpp::compiler::symbols::ModuleSymbols;
use py2cpp::parser::{parse_expression, parse_module};

fn lower(text: &str) -> String {
    let generator = Generator::new(ModuleSymbols::default());
    generate_expression(&generator, &parse_expression(text)).unwrap()
}

/// Lowers `text` with the symbols of `module` in scope.
fn lower_in(module: &str, text: &str) -> String {
    let module = parse_module(module, "test.py").unwrap();
    let generator = Generator::new(ModuleSymbols::collect(&module));
    generate_expression(&generator, &parse_expression(text)).unwrap()
}

#[test]
fn test_literals() {
    insta::assert_snapshot!(lower("None"), @"nullptr");
    insta::assert_snapshot!(lower("True"), @"true");
    insta::assert_snapshot!(lower("3.5"), @"3.5");
    insta::assert_snapshot!(lower("-7"), @"-7");
    insta::assert_snapshot!(lower("'it\"s'"), @r#""it\"s""#);
}

#[test]
fn test_collection_literals() {
    insta::assert_snapshot!(lower("[1, 2, 3]"), @"{1, 2, 3}");
    insta::assert_snapshot!(lower("(1, 'a')"), @r#"std::make_tuple(1, "a")"#);
    insta::assert_snapshot!(lower("{'a': 1, 'b': 2}"), @r#"{{"a", 1}, {"b", 2}}"#);
}

#[test]
fn test_operators() {
    insta::assert_snapshot!(lower("a + b * c"), @"(a + (b * c))");
    insta::assert_snapshot!(lower("-x"), @"(-x)");
    insta::assert_snapshot!(lower("not ok"), @"(!ok)");
    insta::assert_snapshot!(lower("a and b or c"), @"((a && b) || c)");
    insta::assert_snapshot!(lower("a % 2 == 0"), @"((a % 2) == 0)");
}

#[test]
fn test_membership_and_identity() {
    insta::assert_snapshot!(lower("x in xs"), @"py_in(x, xs)");
    insta::assert_snapshot!(lower("x not in xs"), @"(!py_in(x, xs))");
    insta::assert_snapshot!(lower("node is None"), @"(node == nullptr)");
    insta::assert_snapshot!(lower("node is not None"), @"(node != nullptr)");
}

#[test]
fn test_conditional_expression() {
    insta::assert_snapshot!(lower("a if flag else b"), @"(flag ? a : b)");
}

#[test]
fn test_interpolated_string() {
    insta::assert_snapshot!(lower("f'x={x}'"), @r#"(string("x=") + py_to_string(x))"#);
}

#[test]
fn test_slices() {
    insta::assert_snapshot!(lower("xs[1:3]"), @"py_slice(xs, true, 1, true, 3)");
    insta::assert_snapshot!(lower("xs[:n]"), @"py_slice(xs, false, 0, true, n)");
    insta::assert_snapshot!(lower("xs[i]"), @"xs[i]");
}

#[test]
fn test_builtin_calls() {
    insta::assert_snapshot!(lower("print(a, b)"), @"py_print(a, b)");
    insta::assert_snapshot!(lower("len(xs)"), @"py_len(xs)");
    insta::assert_snapshot!(lower("sorted(xs)"), @"py_sorted(xs)");
    insta::assert_snapshot!(lower("str(n)"), @"py_to_string(n)");
    insta::assert_snapshot!(lower("int(s)"), @"static_cast<long long>(s)");
    insta::assert_snapshot!(lower("pow(2, 8)"), @"py_pow(2, 8)");
    insta::assert_snapshot!(lower("set()"), @"unordered_set<string>{}");
}

#[test]
fn test_isinstance_checks() {
    insta::assert_snapshot!(lower("isinstance(x, int)"), @"py_isinstance<long long>(x)");
    insta::assert_snapshot!(
        lower("isinstance(x, (int, str))"),
        @"py_isinstance_any<decltype(x), long long, string>(x)"
    );
}

#[test]
fn test_method_helpers() {
    insta::assert_snapshot!(lower("xs.append(1)"), @"xs.push_back(1)");
    insta::assert_snapshot!(lower("', '.join(parts)"), @r#"py_join(", ", parts)"#);
    insta::assert_snapshot!(lower("seen.add(k)"), @"seen.insert(k)");
    insta::assert_snapshot!(lower("obj.describe()"), @"obj->describe()");
}

#[test]
fn test_keyword_arguments_follow_positionals() {
    insta::assert_snapshot!(lower("f(1, key=2)"), @"f(1, 2)");
}

#[test]
fn test_class_construction_and_static_access() {
    let module = "class Point:\n    origin: int = 0\n";
    insta::assert_snapshot!(
        lower_in(module, "Point()"),
        @"pycs::gc::RcHandle<Point>::adopt(pycs::gc::rc_new<Point>())"
    );
    insta::assert_snapshot!(lower_in(module, "Point.origin"), @"Point::origin");
    insta::assert_snapshot!(lower_in(module, "p.origin"), @"p->origin");
}

#[test]
fn test_exception_classes_are_not_reference_counted() {
    let module = "class AppError(Exception):\n    pass\n";
    insta::assert_snapshot!(lower_in(module, "AppError('bad')"), @r#"AppError("bad")"#);
}

#[test]
fn test_module_alias_access() {
    let module = "import math as m\n";
    insta::assert_snapshot!(lower_in(module, "m.sqrt(2.0)"), @"pycs::cpp_module::math::sqrt(2.0)");
    insta::assert_snapshot!(lower_in(module, "m.pi"), @"pycs::cpp_module::math::pi");
}

#[test]
fn test_main_is_renamed_at_call_sites() {
    let module = "def main() -> None:\n    pass\n";
    insta::assert_snapshot!(lower_in(module, "main()"), @"py_main()");
}

#[test]
fn test_placeholders_for_unlowered_forms() {
    insta::assert_snapshot!(lower("[x * 2 for x in xs]"), @"/* comprehension */ {}");
    insta::assert_snapshot!(lower("0 < x < 10"), @"/* chained-comparison */ false");
}
