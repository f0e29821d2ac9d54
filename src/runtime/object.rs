use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Statement;
use crate::interpreter::StepResult;
use crate::runtime::Scope;
use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;

pub const INIT_METHOD: &str = "__init__";
pub const STR_METHOD: &str = "__str__";
pub const ADD_METHOD: &str = "__add__";
pub const EQ_METHOD: &str = "__eq__";
pub const LT_METHOD: &str = "__lt__";

/// A named executable attached to a class.
///
/// `formal_params` does not include `self`; the runtime binds `self` itself
/// when the method is called.
#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Statement,
}

/// A class: a name, an ordered method list, and an optional parent.
/// Immutable after construction.
#[derive(Debug)]
pub struct Class {
    name: String,
    methods: Vec<Method>,
    parent: Option<Rc<Class>>,
}

impl Class {
    pub fn new(name: String, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        Self {
            name,
            methods,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First method with a matching name, searching this class's list in
    /// declaration order and then the parent chain.
    pub fn method(&self, name: &str) -> Option<&Method> {
        for method in &self.methods {
            if method.name == name {
                return Some(method);
            }
        }
        self.parent.as_deref().and_then(|parent| parent.method(name))
    }

    /// Whether lookup of `name` lands on a method taking `argument_count`
    /// arguments. An arity mismatch on the found method counts as absent.
    pub fn has_method(&self, name: &str, argument_count: usize) -> bool {
        self.method(name)
            .is_some_and(|method| method.formal_params.len() == argument_count)
    }
}

/// A mutable instance of a class: a shared class reference plus a scope of
/// per-instance fields.
#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    fields: Scope,
}

/// One inhabitant of the interpreted program's value universe.
#[derive(Debug)]
pub enum Object {
    Number(i64),
    Str(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(Instance),
}

/// A shared, possibly-empty reference to an [`Object`].
///
/// Handles are the only way the evaluator refers to values; clones share
/// the referent's lifetime. The empty handle stands for `None`. Reference
/// cycles (an instance field holding its own instance) are never collected.
#[derive(Debug, Clone)]
pub struct Handle(Option<Rc<RefCell<Object>>>);

impl Handle {
    /// Wrap a freshly constructed object as its initial owner.
    pub fn own(object: Object) -> Self {
        Self(Some(Rc::new(RefCell::new(object))))
    }

    /// The empty handle.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn number_object(value: i64) -> Self {
        Self::own(Object::Number(value))
    }

    pub fn string_object(value: impl Into<String>) -> Self {
        Self::own(Object::Str(value.into()))
    }

    pub fn bool_object(value: bool) -> Self {
        Self::own(Object::Bool(value))
    }

    pub fn class_object(class: Rc<Class>) -> Self {
        Self::own(Object::Class(class))
    }

    /// A fresh instance of `class` with no fields set. Running `__init__`
    /// is the caller's business.
    pub fn instance_object(class: Rc<Class>) -> Self {
        Self::own(Object::Instance(Instance {
            class,
            fields: Scope::new(),
        }))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_number(&self) -> Option<i64> {
        match &*self.0.as_ref()?.borrow() {
            Object::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match &*self.0.as_ref()?.borrow() {
            Object::Str(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &*self.0.as_ref()?.borrow() {
            Object::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<Rc<Class>> {
        match &*self.0.as_ref()?.borrow() {
            Object::Class(class) => Some(class.clone()),
            _ => None,
        }
    }

    pub fn is_instance(&self) -> bool {
        self.instance_class().is_some()
    }

    /// The class of the referenced instance, if this is one.
    pub fn instance_class(&self) -> Option<Rc<Class>> {
        match &*self.0.as_ref()?.borrow() {
            Object::Instance(instance) => Some(instance.class.clone()),
            _ => None,
        }
    }

    /// Read an instance field. `None` when the referent is not an instance
    /// or has no such field.
    pub fn field(&self, name: &str) -> Option<Handle> {
        match &*self.0.as_ref()?.borrow() {
            Object::Instance(instance) => instance.fields.get(name).cloned(),
            _ => None,
        }
    }

    /// Write an instance field, creating it if absent.
    pub fn set_field(&self, name: impl Into<String>, value: Handle) -> Result<(), RuntimeError> {
        let Some(object) = &self.0 else {
            return Err(RuntimeError::NotAnInstance);
        };
        match &mut *object.borrow_mut() {
            Object::Instance(instance) => {
                instance.fields.insert(name.into(), value);
                Ok(())
            }
            _ => Err(RuntimeError::NotAnInstance),
        }
    }

    /// Truthiness: nonzero numbers, non-empty strings and `True` are truthy;
    /// the empty handle, classes and instances are not.
    pub fn is_true(&self) -> bool {
        let Some(object) = &self.0 else {
            return false;
        };
        match &*object.borrow() {
            Object::Number(value) => *value != 0,
            Object::Str(value) => !value.is_empty(),
            Object::Bool(value) => *value,
            Object::Class(_) | Object::Instance(_) => false,
        }
    }

    /// Whether calling `method` with `argument_count` arguments would
    /// dispatch. Always false for non-instances.
    pub fn has_method(&self, method: &str, argument_count: usize) -> bool {
        self.instance_class()
            .is_some_and(|class| class.has_method(method, argument_count))
    }

    /// Invoke a method on the referenced instance.
    ///
    /// Builds a fresh scope binding each formal parameter to its argument
    /// and `self` to this handle, then runs the body. A nonlocal return
    /// that reaches the call boundary yields the carried handle.
    pub fn call(
        &self,
        method: &str,
        args: &[Handle],
        ctx: &mut dyn Context,
    ) -> Result<Handle, RuntimeError> {
        let class = self
            .instance_class()
            .ok_or_else(|| RuntimeError::UnknownMethod {
                method: method.to_string(),
            })?;
        let found = class
            .method(method)
            .filter(|found| found.formal_params.len() == args.len())
            .ok_or_else(|| RuntimeError::UnknownMethod {
                method: method.to_string(),
            })?;

        let mut scope = Scope::new();
        for (param, argument) in found.formal_params.iter().zip(args) {
            scope.insert(param.clone(), argument.clone());
        }
        scope.insert("self".to_string(), self.clone());

        match found.body.execute(&mut scope, ctx)? {
            StepResult::Value(handle) | StepResult::Returning(handle) => Ok(handle),
        }
    }

    /// The printed form of the value.
    ///
    /// Instances with a zero-argument `__str__` render through it, possibly
    /// recursively; the recursion terminates at the primitive kinds. An
    /// instance without `__str__` renders as an opaque identifier derived
    /// from its handle.
    pub fn render(&self, ctx: &mut dyn Context) -> Result<String, RuntimeError> {
        if self.has_method(STR_METHOD, 0) {
            return self.call(STR_METHOD, &[], ctx)?.render(ctx);
        }
        let Some(object) = &self.0 else {
            return Ok("None".to_string());
        };
        let rendered = match &*object.borrow() {
            Object::Number(value) => value.to_string(),
            Object::Str(value) => value.clone(),
            Object::Bool(true) => "True".to_string(),
            Object::Bool(false) => "False".to_string(),
            Object::Class(class) => format!("Class {}", class.name()),
            Object::Instance(instance) => {
                format!(
                    "<{} object at {:p}>",
                    instance.class.name(),
                    Rc::as_ptr(object)
                )
            }
        };
        Ok(rendered)
    }
}
