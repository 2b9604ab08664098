use crate::error::BytecodeError;
use crate::instruction::Instruction;
use crate::signature::{MethodDescriptor, MethodSignature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub max_locals: u16,
    /// `None` for abstract, native and library methods without a body.
    #[serde(default)]
    pub code: Option<Vec<Instruction>>,
}

impl Method {
    pub fn signature(&self, class: &str) -> MethodSignature {
        MethodSignature::new(class, &self.name, &self.descriptor)
    }

    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor, BytecodeError> {
        MethodDescriptor::parse(&self.descriptor)
    }

    /// Local variable slots occupied by the receiver and parameters on entry.
    pub fn parameter_slots(&self) -> Result<u16, BytecodeError> {
        let receiver = u16::from(!self.is_static);
        Ok(self.parsed_descriptor()?.argument_slots() + receiver)
    }

    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default)]
    pub super_class: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub methods: Vec<Method>,
}

impl Class {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            super_class: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn add_method(&mut self, method: Method) -> Result<(), BytecodeError> {
        if self.find_method(&method.name, &method.descriptor).is_some() {
            return Err(BytecodeError::DuplicateMethod(
                method.signature(&self.name).fqn(),
            ));
        }
        self.methods.push(method);
        Ok(())
    }
}

/// All classes of the analyzed program, keyed by internal name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPool {
    classes: BTreeMap<String, Class>,
}

impl ClassPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, class: Class) -> Result<(), BytecodeError> {
        if self.classes.contains_key(&class.name) {
            return Err(BytecodeError::DuplicateClass(class.name));
        }
        tracing::trace!(class = %class.name, methods = class.methods.len(), "adding class");
        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Looks up a method by its exact signature, without walking the hierarchy.
    pub fn method(&self, signature: &MethodSignature) -> Option<&Method> {
        self.class(signature.class_name())?
            .find_method(signature.method_name(), signature.descriptor_str())
    }

    /// All methods together with their signatures, in class name order.
    pub fn methods(&self) -> impl Iterator<Item = (MethodSignature, &Method)> {
        self.classes
            .values()
            .flat_map(|c| c.methods.iter().map(move |m| (m.signature(&c.name), m)))
    }

    /// Walks up the superclass chain starting at `class` and returns the
    /// first declaration of `name`/`descriptor`.
    pub fn resolve_method(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<MethodSignature> {
        let mut current = Some(class);
        while let Some(c) = current.and_then(|n| self.class(n)) {
            if c.find_method(name, descriptor).is_some() {
                return Some(MethodSignature::new(&c.name, name, descriptor));
            }
            current = c.super_class.as_deref();
        }
        None
    }

    /// Whether `class` is `ancestor` or transitively extends/implements it.
    pub fn is_subtype_of(&self, class: &str, ancestor: &str) -> bool {
        if class == ancestor {
            return true;
        }
        let Some(c) = self.class(class) else {
            return false;
        };
        c.super_class
            .iter()
            .chain(c.interfaces.iter())
            .any(|parent| self.is_subtype_of(parent, ancestor))
    }

    /// Every class in the pool that is a (non-strict) subtype of `ancestor`.
    pub fn subtypes_of<'a>(&'a self, ancestor: &'a str) -> impl Iterator<Item = &'a Class> + 'a {
        self.classes
            .values()
            .filter(move |c| self.is_subtype_of(&c.name, ancestor))
    }
}
