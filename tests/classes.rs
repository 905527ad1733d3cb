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
fn test_constructor_and_instance_fields() {
    let source = r#"
class Node:
    def __init__(self, value: int) -> None:
        self.value = value
        self.next: Node | None = None
        self.label = "node"
"#;
    assert_emits(
        source,
        r#"class Node : public pycs::gc::PyObj
{
public:
    long long value;
    pycs::gc::RcHandle<Node> next;
    string label;
    Node(long long value)
    {
        this->value = value;
        this->next = nullptr;
        this->label = "node";
    }
};
"#,
    );
}

#[test]
fn test_static_method() {
    let source = r#"
class MathUtil:
    @staticmethod
    def twice(x: int) -> int:
        return x * 2

print(MathUtil.twice(4))
"#;
    let output = transpile_source(source);
    assert!(output.contains("    static long long twice(long long x)\n"));
    assert!(output.contains("    py_print(MathUtil::twice(4));\n"));
}

#[test]
fn test_inheritance_and_super_call() {
    let source = r#"
class Animal:
    def speak(self) -> str:
        return "..."

class Dog(Animal):
    def speak(self) -> str:
        return super().speak() + "!"
"#;
    assert_emits(
        source,
        r#"class Dog : public Animal
{
public:
    virtual string speak()
    {
        return (Animal::speak() + "!");
    }
};
"#,
    );
}

#[test]
fn test_super_init_without_arguments_is_omitted() {
    let source = r#"
class Base:
    pass

class Child(Base):
    def __init__(self) -> None:
        super().__init__()
        self.ready = True
"#;
    assert_emits(
        source,
        r#"    Child()
    {
        /* super().__init__ omitted: base ctor is called implicitly */
        this->ready = true;
    }
"#,
    );
}

#[test]
fn test_exception_class_derives_from_std_exception() {
    let source = r#"
class AppError(Exception):
    pass

class ParseFailure(AppError):
    pass
"#;
    let output = transpile_source(source);
    assert!(output.contains("class AppError : public std::exception\n"));
    assert!(output.contains("class ParseFailure : public AppError\n"));
    assert!(output.contains("class AppError;\nclass ParseFailure;\n"));
}

#[test]
fn test_heavy_parameters_pass_by_const_reference_unless_mutated() {
    let source = r#"
class Registry:
    def __init__(self) -> None:
        self.count = 0

    def lookup(self, key: str, names: list[str]) -> int:
        return len(names)

    def add_all(self, names: list[str]) -> None:
        names.append("x")
"#;
    let output = transpile_source(source);
    assert!(output.contains(
        "    virtual long long lookup(const string& key, const vector<string>& names)\n"
    ));
    assert!(output.contains("    virtual void add_all(vector<string> names)\n"));
    assert!(output.contains("        names.push_back(\"x\");\n"));
}

#[test]
fn test_unannotated_parameter_disables_virtual() {
    let source = r#"
class Printer:
    def show(self, value) -> None:
        print(value)
"#;
    assert_emits(source, "    void show(auto value)\n");
}

#[test]
fn test_default_arguments_in_methods() {
    let source = r#"
class Greeter:
    def greet(self, name: str = "world") -> str:
        return f"hello {name}"
"#;
    assert_emits(
        source,
        r#"    virtual string greet(const string& name = "world")
    {
        return (string("hello ") + py_to_string(name));
    }
"#,
    );
}

#[test]
fn test_class_level_assignment_becomes_static_field() {
    let source = r#"
class Config:
    name = "cfg"
    limits: list[int] = [1, 2]

    def describe(self) -> str:
        return self.name
"#;
    assert_emits(
        source,
        r#"    inline static string name = "cfg";
    inline static vector<long long> limits = {1, 2};
    virtual string describe()
    {
        return Config::name;
    }
"#,
    );
}

#[test]
fn test_dataclass_with_explicit_init_keeps_it() {
    let source = r#"
@dataclass
class Pair:
    a: int
    b: int

    def __init__(self, a: int) -> None:
        self.a = a
        self.b = a
"#;
    let output = transpile_source(source);
    assert!(output.contains("    long long a;\n    long long b;\n    Pair(long long a)\n"));
    assert!(!output.contains("Pair(long long a, long long b)"));
}

#[test]
fn test_object_attributes_use_arrow() {
    let source = r#"
class Node:
    def __init__(self, value: int) -> None:
        self.value = value

def read(n: Node) -> int:
    n.value = n.value + 1
    return n.value
"#;
    assert_emits(
        source,
        r#"long long read(pycs::gc::RcHandle<Node> n)
{
    n->value = (n->value + 1);
    return n->value;
}
"#,
    );
}
