use py2cpp::{codegen::generate, parser::parse_module};

fn transpile_source(source: &str) -> String {
    let module = parse_module(source, "test.py").unwrap();
    generate(&module).unwrap()
}

fn assert_emits(source: &str, expected: &str) {
    let output = transpile_source(source);
    assert!(
        output.contains(expected),
        "expected fragment:\n{}\nin output:\n{}",
        expected,
        output
    );
}

#[test]
fn test_range_with_stop_only() {
    let source = r#"
for i in range(3):
    print(i)
"#;
    assert_emits(
        source,
        r#"    const long long __pytra_range_stop_1 = 3;
    for (long long i = 0; i < __pytra_range_stop_1; ++i)
    {
        py_print(i);
    }
"#,
    );
}

#[test]
fn test_range_with_start_and_stop() {
    let source = r#"
def count(lo: int, hi: int) -> int:
    n = 0
    for i in range(lo, hi):
        n += 1
    return n
"#;
    assert_emits(
        source,
        r#"    const long long __pytra_range_stop_1 = hi;
    for (long long i = lo; i < __pytra_range_stop_1; ++i)
    {
        n += 1;
    }
"#,
    );
}

#[test]
fn test_range_with_step_checks_for_zero() {
    let source = r#"
for i in range(10, 0, -2):
    print(i)
"#;
    assert_emits(
        source,
        r#"    const long long __pytra_range_stop_1 = 0;
    const long long __pytra_range_step_1 = -2;
    if (__pytra_range_step_1 == 0) throw std::runtime_error("range() arg 3 must not be zero");
    for (long long i = 10; (__pytra_range_step_1 > 0) ? (i < __pytra_range_stop_1) : (i > __pytra_range_stop_1); i += __pytra_range_step_1)
    {
        py_print(i);
    }
"#,
    );
}

#[test]
fn test_range_reuses_declared_loop_variable() {
    let source = r#"
i = 5
for i in range(2):
    pass
print(i)
"#;
    assert_emits(
        source,
        "    for (i = 0; i < __pytra_range_stop_1; ++i)\n",
    );
}

#[test]
fn test_generic_for_uses_const_reference() {
    let source = r#"
def total(xs: list[int]) -> int:
    s = 0
    for x in xs:
        s += x
    return s
"#;
    assert_emits(
        source,
        r#"long long total(const vector<long long>& xs)
{
    long long s = 0;
    for (const auto& x : xs)
    {
        s += x;
    }
    return s;
}
"#,
    );
}

#[test]
fn test_elif_chain() {
    let source = r#"
def sign(n: int) -> int:
    if n > 0:
        return 1
    elif n < 0:
        return -1
    else:
        return 0
"#;
    assert_emits(
        source,
        r#"    if (n > 0)
    {
        return 1;
    }
    else if (n < 0)
    {
        return -1;
    }
    else
    {
        return 0;
    }
"#,
    );
}

#[test]
fn test_while_with_break_and_continue() {
    let source = r#"
n = 0
while True:
    n += 1
    if n % 2 == 0:
        continue
    if n > 7:
        break
"#;
    assert_emits(
        source,
        r#"    while (true)
    {
        n += 1;
        if ((n % 2) == 0)
        {
            continue;
        }
        if (n > 7)
        {
            break;
        }
    }
"#,
    );
}

#[test]
fn test_loop_else_is_emitted_after_the_loop() {
    let source = r#"
for x in [1, 2]:
    print(x)
else:
    print("done")
"#;
    assert_emits(
        source,
        r#"    // for-else is not directly supported; else body emitted below
    {
        py_print("done");
    }
"#,
    );
}

#[test]
fn test_tuple_unpacking_assignment() {
    let source = r#"
a, b = 1, 2
a, b = b, a
"#;
    assert_emits(
        source,
        r#"    auto __pytra_tuple_1 = std::make_tuple(1, 2);
    auto a = std::get<0>(__pytra_tuple_1);
    auto b = std::get<1>(__pytra_tuple_1);
    auto __pytra_tuple_2 = std::make_tuple(b, a);
    a = std::get<0>(__pytra_tuple_2);
    b = std::get<1>(__pytra_tuple_2);
"#,
    );
}

#[test]
fn test_augmented_assignment_helpers() {
    let source = r#"
x = 2
x **= 3
x //= 2
x -= 1
"#;
    assert_emits(
        source,
        r#"    long long x = 2;
    x = py_pow(x, 3);
    x = py_floordiv(x, 2);
    x -= 1;
"#,
    );
}

#[test]
fn test_annotated_declarations() {
    let source = r#"
names: list[str] = []
count: int
count = 3
"#;
    assert_emits(
        source,
        r#"    vector<string> names = {};
    long long count;
    count = 3;
"#,
    );
}

#[test]
fn test_try_handlers_else_and_finally() {
    let source = r#"
try:
    risky()
except ValueError:
    print("value")
except:
    print("other")
else:
    print("ok")
finally:
    print("cleanup")
"#;
    assert_emits(
        source,
        r#"    try
    {
        risky();
    }
    catch (const std::runtime_error& ex)
    {
        py_print("value");
    }
    catch (...)
    {
        py_print("other");
    }
    // try-else is not directly supported; else body emitted below
    {
        py_print("ok");
    }
    // finally is not directly supported in C++; emitted as plain block
    {
        py_print("cleanup");
    }
"#,
    );
}

#[test]
fn test_catch_user_exception_class() {
    let source = r#"
class AppError(Exception):
    pass

try:
    raise AppError()
except AppError as e:
    print("caught")
"#;
    assert_emits(
        source,
        r#"    try
    {
        throw std::runtime_error(py_to_string(AppError()));
    }
    catch (const AppError& e)
    {
        py_print("caught");
    }
"#,
    );
}

#[test]
fn test_raise_of_plain_value() {
    let source = r#"
def fail(message: str) -> None:
    raise message
"#;
    assert_emits(source, "    throw std::runtime_error(py_to_string(message));\n");
}
