use std::ops::{Deref, DerefMut};

use markup5ever::{LocalName, QualName};

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct Attribute {
    /// The name of the attribute (e.g. the `class` in `<div class="test">`)
    pub name: QualName,
    /// The value of the attribute (e.g. the `"test"` in `<div class="test">`)
    pub value: String,
}

/// The attributes of an element node, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    inner: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    pub fn get(&self, name: &LocalName) -> Option<&str> {
        let attr = self.inner.iter().find(|attr| attr.name.local == *name)?;
        Some(&attr.value)
    }

    /// Set an attribute, replacing the value if the attribute already exists.
    pub fn set(&mut self, name: QualName, value: &str) {
        let existing_attr = self.inner.iter_mut().find(|a| a.name == name);
        if let Some(existing_attr) = existing_attr {
            existing_attr.value.clear();
            existing_attr.value.push_str(value);
        } else {
            self.inner.push(Attribute {
                name,
                value: value.to_string(),
            });
        }
    }

    pub fn remove(&mut self, name: &QualName) -> Option<Attribute> {
        let idx = self.inner.iter().position(|attr| attr.name == *name)?;
        Some(self.inner.remove(idx))
    }

    /// Whether both sets contain the same attributes, ignoring order.
    pub fn same_set(&self, other: &Attributes) -> bool {
        if self.inner.len() != other.inner.len() {
            return false;
        }
        let mut left: Vec<&Attribute> = self.inner.iter().collect();
        let mut right: Vec<&Attribute> = other.inner.iter().collect();
        left.sort();
        right.sort();
        left == right
    }
}

impl Deref for Attributes {
    type Target = Vec<Attribute>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Attributes {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever::{QualName, local_name, ns};

    fn name(local: LocalName) -> QualName {
        QualName::new(None, ns!(), local)
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut attrs = Attributes::new();
        attrs.set(name(local_name!("class")), "a");
        attrs.set(name(local_name!("class")), "b");
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get(&local_name!("class")), Some("b"));
    }

    #[test]
    fn same_set_ignores_order() {
        let mut left = Attributes::new();
        left.set(name(local_name!("class")), "x");
        left.set(name(local_name!("id")), "y");
        let mut right = Attributes::new();
        right.set(name(local_name!("id")), "y");
        right.set(name(local_name!("class")), "x");
        assert!(left.same_set(&right));

        right.set(name(local_name!("class")), "z");
        assert!(!left.same_set(&right));
    }
}
