use py2cpp::*;

fn parse_error(source: &str) -> ParseError {
    parser::parse_module(source, "test.py").expect_err("parsing should fail")
}

fn generation_error(source: &str) -> String {
    let module = parser::parse_module(source, "test.py").expect("parsing should succeed");
    codegen::generate(&module)
        .expect_err("generation should fail")
        .message
}

#[test]
fn test_unexpected_indent() {
    let err = parse_error("x = 1\n    y = 2\n");
    assert_eq!(err.line, 2);
    assert_eq!(err.message, "unexpected indent");
    assert_eq!(err.to_string(), "test.py:2: unexpected indent");
}

#[test]
fn test_missing_block() {
    let err = parse_error("if x:\ny = 1\n");
    assert_eq!(err.line, 1);
    assert_eq!(err.message, "expected an indented block");
}

#[test]
fn test_missing_return_annotation() {
    let err = parse_error("def f(x: int):\n    return x\n");
    assert_eq!(err.message, "function 'f' is missing a return type annotation");
}

#[test]
fn test_unsupported_statements() {
    let err = parse_error("with open('f') as fh:\n    pass\n");
    assert_eq!(err.message, "unsupported statement 'with'");
    let err = parse_error("def f() -> None:\n    global x\n");
    assert_eq!(err.line, 2);
    assert_eq!(err.message, "unsupported statement 'global'");
}

#[test]
fn test_chained_assignment() {
    let err = parse_error("a = b = 1\n");
    assert_eq!(err.message, "chained assignment is not supported");
}

#[test]
fn test_variadic_parameters() {
    let err = parse_error("def f(*args) -> None:\n    pass\n");
    assert_eq!(err.message, "variadic parameter '*args' is not supported");
}

#[test]
fn test_orphan_clauses() {
    let err = parse_error("else:\n    pass\n");
    assert_eq!(err.message, "'else' without a matching block");
}

#[test]
fn test_try_without_handlers() {
    let err = parse_error("try:\n    pass\n");
    assert_eq!(
        err.message,
        "'try' requires at least one 'except' or 'finally' clause"
    );
}

#[test]
fn test_tab_indentation() {
    let err = parse_error("if x:\n\ty = 1\n");
    assert_eq!(err.message, "tab indentation is not supported");
}

#[test]
fn test_unterminated_brackets() {
    let err = parse_error("x = [1,\n2,\n");
    assert_eq!(err.line, 1);
    assert_eq!(err.message, "unexpected end of file inside brackets");
}

#[test]
fn test_multiple_inheritance() {
    assert_eq!(
        generation_error("class C(A, B):\n    pass\n"),
        "class 'C': multiple inheritance is not supported"
    );
}

#[test]
fn test_nested_definitions() {
    assert_eq!(
        generation_error("def f() -> None:\n    def g() -> None:\n        pass\n"),
        "nested function 'g' is not supported"
    );
    assert_eq!(
        generation_error("def f() -> None:\n    class Inner:\n        pass\n"),
        "nested class 'Inner' is not supported"
    );
}

#[test]
fn test_init_must_return_none() {
    assert_eq!(
        generation_error("class C:\n    def __init__(self) -> int:\n        pass\n"),
        "__init__ return type must be None"
    );
}

#[test]
fn test_builtin_arity() {
    assert_eq!(generation_error("print(len(a, b))\n"), "len() expects one argument");
    assert_eq!(generation_error("x = zip(a)\n"), "zip() expects two arguments");
    assert_eq!(
        generation_error("x = isinstance(a)\n"),
        "isinstance() expects two arguments"
    );
}

#[test]
fn test_indirect_calls() {
    let message = generation_error("handlers[0](1)\n");
    assert!(
        message.starts_with("only direct function calls are supported"),
        "{}",
        message
    );
}

#[test]
fn test_slice_step() {
    let message = generation_error("y = xs[::2]\n");
    assert!(message.starts_with("slice step is not supported"), "{}", message);
}

#[test]
fn test_tuple_of_exception_types() {
    let message = generation_error(
        "try:\n    pass\nexcept (KeyError, ValueError) as e:\n    pass\n",
    );
    assert!(
        message.starts_with("catching a tuple of exception types is not supported"),
        "{}",
        message
    );
}

#[test]
fn test_super_outside_derived_class() {
    assert_eq!(
        generation_error("class C:\n    def f(self) -> None:\n        super().f()\n"),
        "super() requires a class with a base"
    );
}

#[test]
fn test_unsupported_class_member() {
    assert_eq!(
        generation_error("class C:\n    print(1)\n"),
        "unsupported class member in 'C'"
    );
}

#[test]
fn test_generation_failure_produces_no_output() {
    let result = transpile("def ok() -> int:\n    return 1\nhandlers[0](1)\n", "test.py");
    assert!(matches!(result, Err(TranspileError::Generation(_))));
}
