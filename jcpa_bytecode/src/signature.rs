use crate::error::BytecodeError;
use crate::instruction::ValueKind;
use internment::Intern;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// A parsed method descriptor, e.g. `(IJLjava/lang/String;)V`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub parameters: Vec<ValueKind>,
    /// `None` for `void`
    pub return_kind: Option<ValueKind>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, BytecodeError> {
        let err = || BytecodeError::InvalidDescriptor(descriptor.to_string());
        let rest = descriptor.strip_prefix('(').ok_or_else(err)?;
        let close = rest.find(')').ok_or_else(err)?;
        let (mut params, ret) = (&rest[..close], &rest[close + 1..]);
        let mut parameters = Vec::new();
        while !params.is_empty() {
            let (kind, len) = parse_field_type(params).ok_or_else(err)?;
            parameters.push(kind);
            params = &params[len..];
        }
        let return_kind = if ret == "V" {
            None
        } else {
            match parse_field_type(ret) {
                Some((kind, len)) if len == ret.len() => Some(kind),
                _ => return Err(err()),
            }
        };
        Ok(Self {
            parameters,
            return_kind,
        })
    }

    /// Number of declared parameters, not counting the receiver.
    pub fn argument_count(&self) -> usize {
        self.parameters.len()
    }

    /// Number of operand stack slots taken by the declared parameters.
    pub fn argument_slots(&self) -> u16 {
        self.parameters.iter().map(|k| k.slots()).sum()
    }

    pub fn return_slots(&self) -> u16 {
        self.return_kind.map(|k| k.slots()).unwrap_or(0)
    }
}

/// Parses one field type at the start of `s`, returning its kind and length.
pub fn parse_field_type(s: &str) -> Option<(ValueKind, usize)> {
    let first = s.chars().next()?;
    match first {
        'B' | 'C' | 'I' | 'S' | 'Z' => Some((ValueKind::Int, 1)),
        'F' => Some((ValueKind::Float, 1)),
        'J' => Some((ValueKind::Long, 1)),
        'D' => Some((ValueKind::Double, 1)),
        'L' => s.find(';').map(|end| (ValueKind::Reference, end + 1)),
        '[' => parse_field_type(&s[1..]).map(|(_, len)| (ValueKind::Reference, len + 1)),
        _ => None,
    }
}

/// Identifies a method by its declaring class, name and descriptor.
///
/// The textual form is the fully qualified name `Lpkg/Class;name(args)ret`.
/// Names are interned so signatures are `Copy` and compare by identity.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    class: Intern<String>,
    name: Intern<String>,
    descriptor: Intern<String>,
}

impl MethodSignature {
    pub fn new<A: AsRef<str>, B: AsRef<str>, C: AsRef<str>>(
        class: A,
        name: B,
        descriptor: C,
    ) -> Self {
        Self {
            class: Intern::new(class.as_ref().to_string()),
            name: Intern::new(name.as_ref().to_string()),
            descriptor: Intern::new(descriptor.as_ref().to_string()),
        }
    }

    pub fn class_name(&self) -> &str {
        self.class.as_str()
    }

    pub fn method_name(&self) -> &str {
        self.name.as_str()
    }

    pub fn descriptor_str(&self) -> &str {
        self.descriptor.as_str()
    }

    pub fn descriptor(&self) -> Result<MethodDescriptor, BytecodeError> {
        MethodDescriptor::parse(self.descriptor_str())
    }

    pub fn fqn(&self) -> String {
        self.to_string()
    }

    fn key(&self) -> (&str, &str, &str) {
        (self.class_name(), self.method_name(), self.descriptor_str())
    }
}

impl PartialOrd for MethodSignature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MethodSignature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "L{};{}{}",
            self.class_name(),
            self.method_name(),
            self.descriptor_str()
        )
    }
}

impl Debug for MethodSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for MethodSignature {
    type Err = BytecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || BytecodeError::InvalidSignature(s.to_string());
        let rest = s.strip_prefix('L').ok_or_else(err)?;
        let semi = rest.find(';').ok_or_else(err)?;
        let class = &rest[..semi];
        let rest = &rest[semi + 1..];
        let paren = rest.find('(').ok_or_else(err)?;
        let (name, descriptor) = rest.split_at(paren);
        if class.is_empty() || name.is_empty() {
            return Err(err());
        }
        MethodDescriptor::parse(descriptor)?;
        Ok(Self::new(class, name, descriptor))
    }
}

impl Serialize for MethodSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MethodSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A symbolic reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl FieldRef {
    pub fn new<A: Into<String>, B: Into<String>, C: Into<String>>(
        class: A,
        name: B,
        descriptor: C,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// The kind of value stored in this field. Unparseable descriptors are
    /// treated as references.
    pub fn kind(&self) -> ValueKind {
        parse_field_type(&self.descriptor)
            .map(|(k, _)| k)
            .unwrap_or(ValueKind::Reference)
    }

    /// The `Class.field` name used to identify static fields globally.
    pub fn global_name(&self) -> String {
        format!("{}.{}", self.class, self.name)
    }
}

impl Display for FieldRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_descriptor_slots() {
        let d = MethodDescriptor::parse("(IJLjava/lang/String;[D)D").unwrap();
        assert_eq!(
            d.parameters,
            vec![
                ValueKind::Int,
                ValueKind::Long,
                ValueKind::Reference,
                ValueKind::Reference
            ]
        );
        assert_eq!(d.argument_slots(), 5);
        assert_eq!(d.return_slots(), 2);
        assert_eq!(d.argument_count(), 4);

        let v = MethodDescriptor::parse("()V").unwrap();
        assert_eq!(v.return_kind, None);
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("()Q").is_err());
    }

    #[test]
    fn signature_round_trips_through_text() {
        let sig: MethodSignature = "LA;source1()Ljava/lang/String;".parse().unwrap();
        assert_eq!(sig.class_name(), "A");
        assert_eq!(sig.method_name(), "source1");
        assert_eq!(sig.descriptor_str(), "()Ljava/lang/String;");
        assert_eq!(sig, MethodSignature::new("A", "source1", "()Ljava/lang/String;"));
        assert_eq!(sig.to_string(), "LA;source1()Ljava/lang/String;");

        let json = serde_json::to_string(&sig).unwrap();
        let back: MethodSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!("A;foo()V".parse::<MethodSignature>().is_err());
        assert!("LA;foo".parse::<MethodSignature>().is_err());
        assert!("LA;()V".parse::<MethodSignature>().is_err());
    }

    #[test]
    fn field_kind_from_descriptor() {
        assert_eq!(FieldRef::new("A", "x", "J").kind(), ValueKind::Long);
        assert_eq!(FieldRef::new("A", "s", "Ljava/lang/String;").kind(), ValueKind::Reference);
        assert_eq!(FieldRef::new("A", "s", "I").global_name(), "A.s");
    }
}
