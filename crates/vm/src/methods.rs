//! Action Methods (C5, §4.4): a flat, duplicate-rejecting table of named
//! handlers invoked via `CALL`.

use crate::error::VmError;
use crate::stack::StackValue;
use std::collections::HashMap;
use std::rc::Rc;

/// A method's verdict (§4.4): negative raises an exception with that code,
/// zero is a silent failure, positive is success carrying the return value.
pub enum MethodOutcome {
    Exception { code: i32, message: String },
    Silent,
    Success(StackValue),
}

/// A registered handler. Takes the method name (handlers may be shared
/// across names via a default handler) and the argument slice, returns a
/// verdict. `Rc`, not `Box`, since the same handler may be installed as
/// both a named entry and the default.
pub type Handler = Rc<dyn Fn(&str, &[StackValue]) -> MethodOutcome>;

#[derive(Clone)]
struct Method {
    handler: Handler,
}

/// The method table the interpreter calls out to for every `CALL` (C5).
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
    default: Option<Method>,
}

impl MethodTable {
    pub fn new() -> Self {
        MethodTable {
            methods: HashMap::new(),
            default: None,
        }
    }

    pub fn add_method(&mut self, name: &str, handler: Handler) -> Result<(), VmError> {
        if self.methods.contains_key(name) {
            return Err(VmError::DuplicateMethod {
                name: name.to_string(),
            });
        }
        self.methods.insert(name.to_string(), Method { handler });
        Ok(())
    }

    pub fn remove_method(&mut self, name: &str) {
        self.methods.remove(name);
    }

    pub fn set_default(&mut self, handler: Handler) {
        self.default = Some(Method { handler });
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn has_binding_for(&self, name: &str) -> bool {
        self.is_registered(name) || self.default.is_some()
    }

    pub fn call(&self, name: &str, args: &[StackValue]) -> Result<MethodOutcome, VmError> {
        let method = self
            .methods
            .get(name)
            .or(self.default.as_ref())
            .ok_or_else(|| VmError::UnknownMethod {
                name: name.to_string(),
            })?;
        Ok((method.handler)(name, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut t = MethodTable::new();
        t.add_method("log", Rc::new(|_, _| MethodOutcome::Silent)).unwrap();
        assert!(matches!(
            t.add_method("log", Rc::new(|_, _| MethodOutcome::Silent)),
            Err(VmError::DuplicateMethod { .. })
        ));
    }

    #[test]
    fn unregistered_name_falls_back_to_default() {
        let mut t = MethodTable::new();
        t.set_default(Rc::new(|_, _| MethodOutcome::Success(StackValue::Integer(1))));
        let outcome = t.call("anything", &[]).unwrap();
        assert!(matches!(outcome, MethodOutcome::Success(StackValue::Integer(1))));
    }

    #[test]
    fn unregistered_name_with_no_default_is_an_error() {
        let t = MethodTable::new();
        assert!(matches!(
            t.call("missing", &[]),
            Err(VmError::UnknownMethod { .. })
        ));
    }
}
