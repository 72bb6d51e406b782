use confpp_expr::{ExprError, Expression, Sequence, Value, Variables};
use rstest::rstest;

fn eval(source: &str) -> Result<Sequence, ExprError> {
    Expression::parse(source)?.evaluate(&Variables::new())
}

fn eval_str(source: &str) -> String {
    eval(source).unwrap().string_value()
}

#[rstest]
#[case("1 + 2 * 3", "7")]
#[case("(1 + 2) * 3", "9")]
#[case("7 div 2", "3.5")]
#[case("8 div 2", "4")]
#[case("7 mod 3", "1")]
#[case("-3 + 1", "-2")]
#[case("- -4", "4")]
#[case("1.5 + 1.5", "3")]
#[case("'10' + 5", "15")]
fn arithmetic(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval_str(source), expected);
}

#[rstest]
#[case("1 div 0")]
#[case("1 mod 0")]
fn division_by_zero(#[case] source: &str) {
    assert!(matches!(eval(source), Err(ExprError::DivisionByZero)));
}

#[rstest]
#[case("1 = 1", true)]
#[case("1 = '1'", true)]
#[case("'1.0' = 1", true)]
#[case("'a' != 'b'", true)]
#[case("'abc' < 'abd'", true)]
#[case("'10' > '9'", true)]
#[case("2 >= 3", false)]
#[case("(1, 2, 3) = 3", true)]
#[case("(1, 2) = (3, 4)", false)]
#[case("() = 1", false)]
#[case("true() = 'x'", true)]
#[case("false() = ''", true)]
fn comparisons(#[case] source: &str, #[case] expected: bool) {
    assert_eq!(Expression::parse(source).unwrap().evaluate_bool(&Variables::new()).unwrap(), expected);
}

#[rstest]
fn logical_operators_short_circuit() {
    // The right-hand side would fail on an undefined variable if evaluated.
    assert!(!Expression::parse("false() and $missing").unwrap().evaluate_bool(&Variables::new()).unwrap());
    assert!(Expression::parse("true() or $missing").unwrap().evaluate_bool(&Variables::new()).unwrap());
}

#[rstest]
fn if_expression_picks_branch() {
    let expr = Expression::parse("if ($debug = 'yes') then 'dbg' else 'rel'").unwrap();
    let vars = Variables::new().with("debug", Sequence::one("yes"));
    assert_eq!(expr.evaluate_string(&vars).unwrap(), "dbg");
    let vars = Variables::new().with("debug", Sequence::one("no"));
    assert_eq!(expr.evaluate_string(&vars).unwrap(), "rel");
}

#[rstest]
fn range_produces_integers() {
    let seq = eval("1 to 4").unwrap();
    assert_eq!(seq.iter().cloned().collect::<Vec<_>>(), (1..=4).map(Value::Integer).collect::<Vec<_>>());
    assert!(eval("5 to 1").unwrap().is_empty());
}

#[rstest]
fn variables_are_listed_once_in_first_use_order() {
    let expr = Expression::parse("$b + a * $b - c").unwrap();
    assert_eq!(expr.variables(), vec!["b", "a", "c"]);
}

#[rstest]
fn bare_true_and_false_need_no_variables() {
    assert_eq!(eval_str("true"), "true");
    assert_eq!(eval_str("not(false)"), "true");
    assert_eq!(eval_str("true and false"), "false");
    assert!(Expression::parse("true or false").unwrap().variables().is_empty());
    let mut vars = Variables::new();
    vars.insert("true".to_string(), Sequence::one("no"));
    assert_eq!(Expression::parse("$true").unwrap().evaluate(&vars).unwrap().string_value(), "no");
}

#[rstest]
fn undefined_variable_is_an_error() {
    assert!(matches!(eval("$nope"), Err(ExprError::UndefinedVariable(name)) if name == "nope"));
}

#[rstest]
#[case("concat('a', 1, true())", "a1true")]
#[case("upper-case('abc')", "ABC")]
#[case("normalize-space('  a   b ')", "a b")]
#[case("substring-before('key=value', '=')", "key")]
#[case("substring-after('key=value', '=')", "value")]
#[case("replace('a.b.c', '.', '/')", "a/b/c")]
#[case("string-join(tokenize('a,b,c', ','), '|')", "a|b|c")]
#[case("string-join(tokenize(' x  y '), '+')", "x+y")]
#[case("count((1, 2, 3))", "3")]
#[case("sum(1 to 10)", "55")]
#[case("string-length('héllo')", "5")]
#[case("round(2.5)", "3")]
#[case("floor(-1.5)", "-2")]
#[case("abs(-7)", "7")]
#[case("number('x')", "NaN")]
#[case("not(empty(()))", "false")]
fn builtin_functions(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval_str(source), expected);
}

#[rstest]
fn node_values_atomise_to_text() {
    let node = confpp_xml::elem("v").text("42").into_node();
    let vars = Variables::new().with("v", Sequence::one(node));
    let expr = Expression::parse("$v + 1").unwrap();
    assert_eq!(expr.evaluate_string(&vars).unwrap(), "43");
}

#[rstest]
fn non_numeric_arithmetic_is_a_type_error() {
    assert!(matches!(eval("'abc' + 1"), Err(ExprError::Type(_))));
}
