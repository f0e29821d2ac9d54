//! Tree-walking evaluation of AST nodes.
//!
//! Every node executes against a mutable scope and a context and produces a
//! [`StepResult`]. Nonlocal return is modelled as data: `Return` produces
//! `Returning`, composite statements propagate it unchanged, and
//! `MethodBody` converts it back into a plain value at the method boundary.

use crate::ast::Statement;
use crate::runtime::Scope;
use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;
use crate::runtime::object::{ADD_METHOD, Handle, INIT_METHOD};

/// Outcome of executing one node: a plain value, or a nonlocal return
/// unwinding toward the nearest enclosing `MethodBody`.
#[derive(Debug)]
pub enum StepResult {
    Value(Handle),
    Returning(Handle),
}

impl StepResult {
    /// The carried handle, whichever way it is travelling.
    pub fn into_handle(self) -> Handle {
        match self {
            StepResult::Value(handle) | StepResult::Returning(handle) => handle,
        }
    }
}

impl Statement {
    pub fn execute(
        &self,
        scope: &mut Scope,
        ctx: &mut dyn Context,
    ) -> Result<StepResult, RuntimeError> {
        match self {
            Statement::NumericConst(handle)
            | Statement::StringConst(handle)
            | Statement::BoolConst(handle) => Ok(StepResult::Value(handle.clone())),
            Statement::None => Ok(StepResult::Value(Handle::none())),
            Statement::VariableValue { dotted_ids } => {
                Ok(StepResult::Value(resolve_dotted(dotted_ids, scope)?))
            }
            Statement::Assignment { var, value } => {
                let handle = value.evaluate(scope, ctx)?;
                scope.insert(var.clone(), handle.clone());
                Ok(StepResult::Value(handle))
            }
            Statement::FieldAssignment {
                object,
                field,
                value,
            } => {
                let target = resolve_dotted(object, scope)?;
                let handle = value.evaluate(scope, ctx)?;
                target.set_field(field.clone(), handle.clone())?;
                Ok(StepResult::Value(handle))
            }
            Statement::Print { args } => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    parts.push(arg.evaluate(scope, ctx)?.render(ctx)?);
                }
                writeln!(ctx.output(), "{}", parts.join(" ")).map_err(|error| {
                    RuntimeError::OutputStream {
                        message: error.to_string(),
                    }
                })?;
                Ok(StepResult::Value(Handle::none()))
            }
            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let object = object.evaluate(scope, ctx)?;
                if !object.is_instance() {
                    return Ok(StepResult::Value(Handle::none()));
                }
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(arg.evaluate(scope, ctx)?);
                }
                Ok(StepResult::Value(object.call(method, &evaluated, ctx)?))
            }
            Statement::NewInstance { class, args } => {
                let instance = Handle::instance_object(class.clone());
                // Constructor arguments are only evaluated when a matching
                // __init__ exists.
                if class.has_method(INIT_METHOD, args.len()) {
                    let mut evaluated = Vec::with_capacity(args.len());
                    for arg in args {
                        evaluated.push(arg.evaluate(scope, ctx)?);
                    }
                    instance.call(INIT_METHOD, &evaluated, ctx)?;
                }
                Ok(StepResult::Value(instance))
            }
            Statement::Stringify(arg) => {
                let rendered = arg.evaluate(scope, ctx)?.render(ctx)?;
                Ok(StepResult::Value(Handle::string_object(rendered)))
            }
            Statement::Add { lhs, rhs } => {
                let lhs = lhs.evaluate(scope, ctx)?;
                let rhs = rhs.evaluate(scope, ctx)?;
                if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
                    return Ok(StepResult::Value(Handle::number_object(left + right)));
                }
                if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
                    return Ok(StepResult::Value(Handle::string_object(left + &right)));
                }
                if lhs.is_instance() {
                    return Ok(StepResult::Value(lhs.call(ADD_METHOD, &[rhs], ctx)?));
                }
                Err(RuntimeError::UnsupportedOperation { operator: '+' })
            }
            Statement::Sub { lhs, rhs } => {
                let lhs = lhs.evaluate(scope, ctx)?;
                let rhs = rhs.evaluate(scope, ctx)?;
                match (lhs.as_number(), rhs.as_number()) {
                    (Some(left), Some(right)) => {
                        Ok(StepResult::Value(Handle::number_object(left - right)))
                    }
                    _ => Err(RuntimeError::UnsupportedOperation { operator: '-' }),
                }
            }
            Statement::Mult { lhs, rhs } => {
                let lhs = lhs.evaluate(scope, ctx)?;
                let rhs = rhs.evaluate(scope, ctx)?;
                match (lhs.as_number(), rhs.as_number()) {
                    (Some(left), Some(right)) => {
                        Ok(StepResult::Value(Handle::number_object(left * right)))
                    }
                    _ => Err(RuntimeError::UnsupportedOperation { operator: '*' }),
                }
            }
            Statement::Div { lhs, rhs } => {
                let lhs = lhs.evaluate(scope, ctx)?;
                let rhs = rhs.evaluate(scope, ctx)?;
                match (lhs.as_number(), rhs.as_number()) {
                    (Some(_), Some(0)) => Err(RuntimeError::DivisionByZero),
                    (Some(left), Some(right)) => {
                        Ok(StepResult::Value(Handle::number_object(left / right)))
                    }
                    _ => Err(RuntimeError::UnsupportedOperation { operator: '/' }),
                }
            }
            Statement::Or { lhs, rhs } => {
                if lhs.evaluate(scope, ctx)?.is_true() {
                    return Ok(StepResult::Value(Handle::bool_object(true)));
                }
                let decided = rhs.evaluate(scope, ctx)?.is_true();
                Ok(StepResult::Value(Handle::bool_object(decided)))
            }
            Statement::And { lhs, rhs } => {
                if !lhs.evaluate(scope, ctx)?.is_true() {
                    return Ok(StepResult::Value(Handle::bool_object(false)));
                }
                let decided = rhs.evaluate(scope, ctx)?.is_true();
                Ok(StepResult::Value(Handle::bool_object(decided)))
            }
            Statement::Not(arg) => {
                let truth = arg.evaluate(scope, ctx)?.is_true();
                Ok(StepResult::Value(Handle::bool_object(!truth)))
            }
            Statement::Comparison { cmp, lhs, rhs } => {
                let lhs = lhs.evaluate(scope, ctx)?;
                let rhs = rhs.evaluate(scope, ctx)?;
                let verdict = cmp.apply(&lhs, &rhs, ctx)?;
                Ok(StepResult::Value(Handle::bool_object(verdict)))
            }
            Statement::Compound(statements) => {
                for statement in statements {
                    if let StepResult::Returning(handle) = statement.execute(scope, ctx)? {
                        return Ok(StepResult::Returning(handle));
                    }
                }
                Ok(StepResult::Value(Handle::none()))
            }
            Statement::IfElse {
                condition,
                if_body,
                else_body,
            } => {
                if condition.evaluate(scope, ctx)?.is_true() {
                    return if_body.execute(scope, ctx);
                }
                match else_body {
                    Some(body) => body.execute(scope, ctx),
                    None => Ok(StepResult::Value(Handle::none())),
                }
            }
            Statement::Return(value) => {
                Ok(StepResult::Returning(value.evaluate(scope, ctx)?))
            }
            Statement::MethodBody(body) => match body.execute(scope, ctx)? {
                StepResult::Returning(handle) => Ok(StepResult::Value(handle)),
                StepResult::Value(_) => Ok(StepResult::Value(Handle::none())),
            },
            Statement::ClassDefinition { name, class } => {
                scope.insert(name.clone(), class.clone());
                Ok(StepResult::Value(class.clone()))
            }
        }
    }

    /// Execute in value position. A nonlocal return cannot escape through an
    /// expression, so both outcomes collapse to the carried handle.
    pub fn evaluate(
        &self,
        scope: &mut Scope,
        ctx: &mut dyn Context,
    ) -> Result<Handle, RuntimeError> {
        Ok(self.execute(scope, ctx)?.into_handle())
    }
}

/// Walk a dotted identifier chain: the first segment resolves in `scope`,
/// every later one is a field of the instance reached so far.
fn resolve_dotted(dotted_ids: &[String], scope: &Scope) -> Result<Handle, RuntimeError> {
    let mut segments = dotted_ids.iter();
    let Some(first) = segments.next() else {
        return Err(RuntimeError::NotAnInstance);
    };
    let mut handle = scope
        .get(first)
        .cloned()
        .ok_or_else(|| RuntimeError::UndefinedName {
            name: first.clone(),
        })?;
    for name in segments {
        if !handle.is_instance() {
            return Err(RuntimeError::NotAnInstance);
        }
        handle = handle
            .field(name)
            .ok_or_else(|| RuntimeError::UndefinedName { name: name.clone() })?;
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::runtime::compare::Comparator;
    use crate::runtime::context::BufferedContext;
    use crate::runtime::object::{Class, Method, STR_METHOD};

    fn num(value: i64) -> Statement {
        Statement::numeric(value)
    }

    fn text(value: &str) -> Statement {
        Statement::string(value)
    }

    fn var(name: &str) -> Statement {
        Statement::variable(name)
    }

    fn assign(name: &str, value: Statement) -> Statement {
        Statement::Assignment {
            var: name.to_string(),
            value: Box::new(value),
        }
    }

    fn print(args: Vec<Statement>) -> Statement {
        Statement::Print { args }
    }

    fn add(lhs: Statement, rhs: Statement) -> Statement {
        Statement::Add {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn div(lhs: Statement, rhs: Statement) -> Statement {
        Statement::Div {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn ret(value: Statement) -> Statement {
        Statement::Return(Box::new(value))
    }

    fn method(name: &str, params: &[&str], body: Vec<Statement>) -> Method {
        Method {
            name: name.to_string(),
            formal_params: params.iter().map(|param| param.to_string()).collect(),
            body: Statement::MethodBody(Box::new(Statement::Compound(body))),
        }
    }

    fn class(name: &str, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Rc<Class> {
        Rc::new(Class::new(name.to_string(), methods, parent))
    }

    fn run(statements: Vec<Statement>) -> String {
        let mut scope = Scope::new();
        let mut ctx = BufferedContext::new();
        Statement::Compound(statements)
            .execute(&mut scope, &mut ctx)
            .expect("program failed");
        ctx.contents()
    }

    fn run_err(statements: Vec<Statement>) -> (RuntimeError, String) {
        let mut scope = Scope::new();
        let mut ctx = BufferedContext::new();
        let error = Statement::Compound(statements)
            .execute(&mut scope, &mut ctx)
            .expect_err("program should fail");
        (error, ctx.contents())
    }

    #[test]
    fn assigns_and_prints() {
        let output = run(vec![
            assign("n", add(num(1), num(2))),
            print(vec![var("n")]),
        ]);
        assert_eq!(output, "3\n");
    }

    #[test]
    fn assignment_yields_the_stored_handle() {
        let mut scope = Scope::new();
        let mut ctx = BufferedContext::new();
        let result = assign("x", num(5))
            .evaluate(&mut scope, &mut ctx)
            .expect("assignment failed");
        assert_eq!(result.as_number(), Some(5));
        assert_eq!(
            scope.get("x").expect("binding missing").as_number(),
            Some(5)
        );
    }

    #[test]
    fn prints_arguments_space_separated_with_trailing_newline() {
        let output = run(vec![print(vec![
            num(1),
            text("two"),
            Statement::boolean(false),
            Statement::None,
        ])]);
        assert_eq!(output, "1 two False None\n");
    }

    #[test]
    fn print_without_arguments_emits_a_bare_newline() {
        assert_eq!(run(vec![print(Vec::new())]), "\n");
    }

    #[test]
    fn adds_numbers_and_concatenates_strings() {
        let output = run(vec![
            print(vec![add(num(40), num(2))]),
            print(vec![add(text("ab"), text("cd"))]),
        ]);
        assert_eq!(output, "42\nabcd\n");
    }

    #[test]
    fn arithmetic_rejects_mixed_operands() {
        let (error, _) = run_err(vec![print(vec![add(num(1), Statement::boolean(true))])]);
        assert_eq!(error, RuntimeError::UnsupportedOperation { operator: '+' });
        let (error, _) = run_err(vec![print(vec![Statement::Mult {
            lhs: Box::new(text("a")),
            rhs: Box::new(num(3)),
        }])]);
        assert_eq!(error, RuntimeError::UnsupportedOperation { operator: '*' });
    }

    #[test]
    fn divides_integers_and_rejects_zero_denominators() {
        assert_eq!(run(vec![print(vec![div(num(7), num(2))])]), "3\n");

        let (error, output) = run_err(vec![print(vec![text("before"), div(num(1), num(0))])]);
        assert_eq!(error, RuntimeError::DivisionByZero);
        // The failing print never reaches the output stream.
        assert_eq!(output, "");
    }

    #[test]
    fn logical_operators_short_circuit_and_return_bools() {
        let output = run(vec![
            print(vec![Statement::Or {
                lhs: Box::new(num(1)),
                rhs: Box::new(div(num(1), num(0))),
            }]),
            print(vec![Statement::And {
                lhs: Box::new(num(0)),
                rhs: Box::new(div(num(1), num(0))),
            }]),
            print(vec![Statement::Or {
                lhs: Box::new(num(0)),
                rhs: Box::new(num(2)),
            }]),
            print(vec![Statement::And {
                lhs: Box::new(text("x")),
                rhs: Box::new(text(""))
            }]),
        ]);
        assert_eq!(output, "True\nFalse\nTrue\nFalse\n");
    }

    #[test]
    fn not_negates_truthiness() {
        let output = run(vec![print(vec![
            Statement::Not(Box::new(num(0))),
            Statement::Not(Box::new(text("x"))),
            Statement::Not(Box::new(Statement::None)),
        ])]);
        assert_eq!(output, "True False True\n");
    }

    #[test]
    fn comparisons_produce_bools() {
        let output = run(vec![print(vec![
            Statement::Comparison {
                cmp: Comparator::Less,
                lhs: Box::new(num(1)),
                rhs: Box::new(num(2)),
            },
            Statement::Comparison {
                cmp: Comparator::NotEqual,
                lhs: Box::new(text("a")),
                rhs: Box::new(text("a")),
            },
            Statement::Comparison {
                cmp: Comparator::Equal,
                lhs: Box::new(Statement::None),
                rhs: Box::new(Statement::None),
            },
        ])]);
        assert_eq!(output, "True False True\n");
    }

    #[test]
    fn if_else_picks_a_branch_by_truthiness() {
        let output = run(vec![
            Statement::IfElse {
                condition: Box::new(num(1)),
                if_body: Box::new(print(vec![text("then")])),
                else_body: Some(Box::new(print(vec![text("else")]))),
            },
            Statement::IfElse {
                condition: Box::new(text("")),
                if_body: Box::new(print(vec![text("then")])),
                else_body: Some(Box::new(print(vec![text("else")]))),
            },
            // No else branch and a false condition: nothing happens.
            Statement::IfElse {
                condition: Box::new(Statement::None),
                if_body: Box::new(print(vec![text("unreachable")])),
                else_body: None,
            },
        ]);
        assert_eq!(output, "then\nelse\n");
    }

    #[test]
    fn undefined_names_fail_resolution() {
        let (error, _) = run_err(vec![print(vec![var("missing")])]);
        assert_eq!(
            error,
            RuntimeError::UndefinedName {
                name: "missing".to_string()
            }
        );
        assert_eq!(error.to_string(), "Not field missing");
    }

    #[test]
    fn dotted_access_requires_instances_along_the_chain() {
        let (error, _) = run_err(vec![
            assign("x", num(1)),
            print(vec![Statement::VariableValue {
                dotted_ids: vec!["x".to_string(), "field".to_string()],
            }]),
        ]);
        assert_eq!(error, RuntimeError::NotAnInstance);
    }

    #[test]
    fn field_assignment_requires_an_instance() {
        let (error, _) = run_err(vec![
            assign("x", num(1)),
            Statement::FieldAssignment {
                object: vec!["x".to_string()],
                field: "y".to_string(),
                value: Box::new(num(2)),
            },
        ]);
        assert_eq!(error, RuntimeError::NotAnInstance);
    }

    #[test]
    fn new_instance_returns_a_fresh_instance() {
        let counter = class("Counter", Vec::new(), None);
        let mut scope = Scope::new();
        let mut ctx = BufferedContext::new();
        let handle = Statement::NewInstance {
            class: counter.clone(),
            args: Vec::new(),
        }
        .evaluate(&mut scope, &mut ctx)
        .expect("construction failed");
        assert!(handle.is_instance());
        assert!(handle.as_class().is_none());
        assert_eq!(
            handle.instance_class().expect("class missing").name(),
            "Counter"
        );
    }

    #[test]
    fn init_runs_with_matching_arity_and_sets_fields() {
        let boxed = class(
            "Box",
            vec![method(
                INIT_METHOD,
                &["value"],
                vec![Statement::FieldAssignment {
                    object: vec!["self".to_string()],
                    field: "value".to_string(),
                    value: Box::new(var("value")),
                }],
            )],
            None,
        );
        let output = run(vec![
            assign(
                "b",
                Statement::NewInstance {
                    class: boxed,
                    args: vec![num(7)],
                },
            ),
            print(vec![Statement::VariableValue {
                dotted_ids: vec!["b".to_string(), "value".to_string()],
            }]),
        ]);
        assert_eq!(output, "7\n");
    }

    #[test]
    fn init_with_wrong_arity_is_skipped_and_arguments_stay_unevaluated() {
        let plain = class("Plain", Vec::new(), None);
        // The argument would divide by zero if it were evaluated.
        let output = run(vec![
            assign(
                "p",
                Statement::NewInstance {
                    class: plain,
                    args: vec![div(num(1), num(0))],
                },
            ),
            print(vec![text("ok")]),
        ]);
        assert_eq!(output, "ok\n");
    }

    #[test]
    fn method_call_on_non_instance_yields_none() {
        let output = run(vec![
            assign("n", num(3)),
            print(vec![Statement::MethodCall {
                object: Box::new(var("n")),
                method: "anything".to_string(),
                args: Vec::new(),
            }]),
        ]);
        assert_eq!(output, "None\n");
    }

    #[test]
    fn missing_method_is_a_runtime_error() {
        let plain = class("Plain", Vec::new(), None);
        let (error, _) = run_err(vec![
            assign(
                "p",
                Statement::NewInstance {
                    class: plain,
                    args: Vec::new(),
                },
            ),
            Statement::MethodCall {
                object: Box::new(var("p")),
                method: "ghost".to_string(),
                args: Vec::new(),
            },
        ]);
        assert_eq!(
            error,
            RuntimeError::UnknownMethod {
                method: "ghost".to_string()
            }
        );
        assert_eq!(error.to_string(), "No method ghost");
    }

    #[test]
    fn return_unwinds_nested_statements_to_the_method_boundary() {
        let chooser = class(
            "Chooser",
            vec![method(
                "pick",
                &["flag"],
                vec![
                    Statement::IfElse {
                        condition: Box::new(var("flag")),
                        if_body: Box::new(Statement::Compound(vec![ret(num(1))])),
                        else_body: None,
                    },
                    print(vec![text("fallthrough")]),
                    ret(num(2)),
                ],
            )],
            None,
        );
        let output = run(vec![
            assign(
                "c",
                Statement::NewInstance {
                    class: chooser,
                    args: Vec::new(),
                },
            ),
            print(vec![Statement::MethodCall {
                object: Box::new(var("c")),
                method: "pick".to_string(),
                args: vec![Statement::boolean(true)],
            }]),
            print(vec![Statement::MethodCall {
                object: Box::new(var("c")),
                method: "pick".to_string(),
                args: vec![Statement::boolean(false)],
            }]),
        ]);
        assert_eq!(output, "1\nfallthrough\n2\n");
    }

    #[test]
    fn natural_method_completion_yields_none() {
        let quiet = class(
            "Quiet",
            vec![method("noop", &[], vec![assign("local", num(1))])],
            None,
        );
        let output = run(vec![
            assign(
                "q",
                Statement::NewInstance {
                    class: quiet,
                    args: Vec::new(),
                },
            ),
            print(vec![Statement::MethodCall {
                object: Box::new(var("q")),
                method: "noop".to_string(),
                args: Vec::new(),
            }]),
        ]);
        assert_eq!(output, "None\n");
    }

    #[test]
    fn method_locals_do_not_leak_into_the_caller() {
        let quiet = class(
            "Quiet",
            vec![method("noop", &[], vec![assign("local", num(1))])],
            None,
        );
        let (error, _) = run_err(vec![
            assign(
                "q",
                Statement::NewInstance {
                    class: quiet,
                    args: Vec::new(),
                },
            ),
            Statement::MethodCall {
                object: Box::new(var("q")),
                method: "noop".to_string(),
                args: Vec::new(),
            },
            print(vec![var("local")]),
        ]);
        assert_eq!(
            error,
            RuntimeError::UndefinedName {
                name: "local".to_string()
            }
        );
    }

    #[test]
    fn child_method_overrides_parent_method() {
        let base = class(
            "Base",
            vec![method("f", &[], vec![ret(num(1))])],
            None,
        );
        let derived = class(
            "Derived",
            vec![method("f", &[], vec![ret(num(2))])],
            Some(base.clone()),
        );
        let output = run(vec![print(vec![
            Statement::MethodCall {
                object: Box::new(Statement::NewInstance {
                    class: derived,
                    args: Vec::new(),
                }),
                method: "f".to_string(),
                args: Vec::new(),
            },
            Statement::MethodCall {
                object: Box::new(Statement::NewInstance {
                    class: base,
                    args: Vec::new(),
                }),
                method: "f".to_string(),
                args: Vec::new(),
            },
        ])]);
        assert_eq!(output, "2 1\n");
    }

    #[test]
    fn dunder_add_dispatches_on_the_left_operand() {
        let wrapper = class(
            "Wrapper",
            vec![method(ADD_METHOD, &["other"], vec![ret(add(num(100), var("other")))])],
            None,
        );
        let output = run(vec![
            assign(
                "w",
                Statement::NewInstance {
                    class: wrapper,
                    args: Vec::new(),
                },
            ),
            print(vec![add(var("w"), num(5))]),
        ]);
        assert_eq!(output, "105\n");
    }

    #[test]
    fn instance_prints_through_dunder_str() {
        let named = class(
            "Named",
            vec![method(STR_METHOD, &[], vec![ret(text("P"))])],
            None,
        );
        let output = run(vec![
            assign(
                "p",
                Statement::NewInstance {
                    class: named,
                    args: Vec::new(),
                },
            ),
            print(vec![var("p")]),
        ]);
        assert_eq!(output, "P\n");
    }

    #[test]
    fn stringify_renders_values_and_none() {
        let output = run(vec![
            print(vec![add(
                Statement::Stringify(Box::new(num(12))),
                text("!"),
            )]),
            print(vec![Statement::Stringify(Box::new(Statement::None))]),
        ]);
        assert_eq!(output, "12!\nNone\n");
    }

    #[test]
    fn class_definition_binds_the_class_by_name() {
        let empty = class("Empty", Vec::new(), None);
        let mut scope = Scope::new();
        let mut ctx = BufferedContext::new();
        let handle = Statement::class_definition(empty)
            .evaluate(&mut scope, &mut ctx)
            .expect("definition failed");
        assert_eq!(handle.as_class().expect("not a class").name(), "Empty");
        let bound = scope.get("Empty").expect("binding missing");
        assert_eq!(bound.as_class().expect("not a class").name(), "Empty");
        assert_eq!(bound.render(&mut ctx).expect("render"), "Class Empty");
    }

    #[test]
    fn compound_discards_intermediate_values_and_returns_none() {
        let mut scope = Scope::new();
        let mut ctx = BufferedContext::new();
        let result = Statement::Compound(vec![num(1), text("two")])
            .execute(&mut scope, &mut ctx)
            .expect("compound failed");
        match result {
            StepResult::Value(handle) => assert!(handle.is_none()),
            StepResult::Returning(_) => panic!("unexpected nonlocal return"),
        }
    }
}
