use std::{fmt, rc::Rc};

use crate::{
    document::{Document, DocumentObject},
    interpreter::value::core::quote_string,
};

/// Names the object part of an identifier, either by internal name or by
/// label (`<<Label>>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    /// The internal name or label text.
    pub name:     String,
    /// `true` when written as `<<label>>`.
    pub is_label: bool,
}

impl ObjectName {
    /// An internal-name reference.
    pub fn internal(name: impl Into<String>) -> Self {
        Self { name:     name.into(),
               is_label: false, }
    }

    /// A label reference.
    pub fn label(name: impl Into<String>) -> Self {
        Self { name:     name.into(),
               is_label: true, }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_label {
            write!(f, "<<{}>>", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// One static step of an identifier path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathComponent {
    /// `.name`
    Name(String),
    /// `[3]`
    Index(i64),
    /// `['key']`
    Key(String),
    /// `[start:stop:step]`, any part optional.
    Range {
        /// Inclusive start.
        start: Option<i64>,
        /// Exclusive stop.
        stop:  Option<i64>,
        /// Stride.
        step:  Option<i64>,
    },
}

impl PathComponent {
    /// The name of a [`PathComponent::Name`].
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, leading: bool) -> fmt::Result {
        match self {
            Self::Name(n) if leading => f.write_str(n),
            Self::Name(n) => write!(f, ".{n}"),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Key(k) => write!(f, "[{}]", quote_string(k)),
            Self::Range { start, stop, step } => {
                f.write_str("[")?;
                if let Some(s) = start {
                    write!(f, "{s}")?;
                }
                f.write_str(":")?;
                if let Some(s) = stop {
                    write!(f, "{s}")?;
                }
                if let Some(s) = step {
                    write!(f, ":{s}")?;
                }
                f.write_str("]")
            },
        }
    }
}

/// A structured, persistable reference to a property.
///
/// Three shapes exist:
/// - qualified, `Doc#Obj.Prop` or `<<Label>>.Prop`, naming the object
///   explicitly;
/// - explicit local, `.Prop`, always resolved against the owner;
/// - unqualified, `a.b[0]`, where the first name is either a property of the
///   owner, an object of the owner's document, or a variable bound in a
///   call frame.
///
/// # Example
/// ```
/// use cadexpr::identifier::{ObjectIdentifier, ObjectName, PathComponent};
///
/// let id = ObjectIdentifier::qualified(Some("Doc"),
///                                      ObjectName::label("Plate"),
///                                      vec![PathComponent::Name("Width".into()),
///                                           PathComponent::Index(0)]);
/// assert_eq!(id.to_string(), "Doc#<<Plate>>.Width[0]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectIdentifier {
    /// Explicit document name.
    pub document:       Option<String>,
    /// Explicit object.
    pub object:         Option<ObjectName>,
    /// Property and sub-component path.
    pub components:     Vec<PathComponent>,
    /// `true` for the leading-dot `.Prop` form.
    pub local_property: bool,
}

/// The result of resolving an identifier against a document.
#[derive(Debug, Clone)]
pub struct ResolvedIdentifier {
    /// The object the identifier lands on.
    pub object:   Rc<DocumentObject>,
    /// The property, or `None` for a bare object reference.
    pub property: Option<String>,
    /// Index of the first component after the property.
    pub rest:     usize,
}

impl ObjectIdentifier {
    /// An unqualified path starting with `name`.
    pub fn simple(name: impl Into<String>) -> Self {
        Self { components: vec![PathComponent::Name(name.into())],
               ..Self::default() }
    }

    /// An explicit local property (`.name`).
    pub fn local(name: impl Into<String>) -> Self {
        Self { components: vec![PathComponent::Name(name.into())],
               local_property: true,
               ..Self::default() }
    }

    /// A path qualified by object and optional document.
    #[must_use]
    pub fn qualified(document: Option<&str>,
                     object: ObjectName,
                     components: Vec<PathComponent>)
                     -> Self {
        Self { document: document.map(str::to_string),
               object: Some(object),
               components,
               local_property: false }
    }

    /// Returns the name when the identifier is a single bare name, such as a
    /// variable reference `x`.
    #[must_use]
    pub fn as_simple_name(&self) -> Option<&str> {
        if self.document.is_none()
           && self.object.is_none()
           && !self.local_property
           && self.components.len() == 1
        {
            self.components[0].as_name()
        } else {
            None
        }
    }

    /// `true` when a document or object is named explicitly.
    #[must_use]
    pub const fn is_qualified(&self) -> bool {
        self.document.is_some() || self.object.is_some()
    }

    /// The first name component, if any.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.components.first().and_then(PathComponent::as_name)
    }

    /// Resolves the identifier against `owner`.
    ///
    /// Unqualified paths try the owner's own properties first, then objects
    /// of the owner's document by internal name and finally by label.
    /// Returns `None` when nothing matches; resolution never fails loudly.
    #[must_use]
    pub fn resolve(&self, owner: Option<&Rc<DocumentObject>>) -> Option<ResolvedIdentifier> {
        if self.local_property {
            let object = Rc::clone(owner?);
            return Some(ResolvedIdentifier { object,
                                             property: Some(self.first_name()?.to_string()),
                                             rest: 1 });
        }

        if let Some(object_name) = &self.object {
            let document = self.find_document(owner)?;
            let object = find_object(&document, object_name)?;
            return Some(match self.first_name() {
                            Some(property) => ResolvedIdentifier { object,
                                                                   property: Some(property.to_string()),
                                                                   rest: 1 },
                            None => ResolvedIdentifier { object,
                                                         property: None,
                                                         rest: 0 },
                        });
        }

        // `$A$1` names cell A1; the markers only pin the reference when
        // cells move.
        let first = self.first_name()?.replace('$', "");
        if let Some(owner) = owner
           && owner.has_property(&first)
        {
            return Some(ResolvedIdentifier { object:   Rc::clone(owner),
                                             property: Some(first),
                                             rest:     1, });
        }

        let document = self.find_document(owner)?;
        let object = document.object(&first)
                             .or_else(|| document.object_by_label(&first))?;
        Some(match self.components.get(1).and_then(PathComponent::as_name) {
                 Some(property) if object.has_property(property) => {
                     ResolvedIdentifier { object,
                                          property: Some(property.to_string()),
                                          rest: 2 }
                 },
                 _ => ResolvedIdentifier { object,
                                           property: None,
                                           rest: 1 },
             })
    }

    fn find_document(&self, owner: Option<&Rc<DocumentObject>>) -> Option<Rc<Document>> {
        let home = owner.and_then(|o| o.document());
        match &self.document {
            None => home,
            Some(name) => {
                if let Some(home) = &home
                   && home.name() == name
                {
                    return Some(Rc::clone(home));
                }
                home?.workspace()?.document(name)
            },
        }
    }

    /// The document-independent form used for dependency equality:
    /// `Doc#Name.Property...`, with labels replaced by internal names.
    ///
    /// Unresolvable identifiers are returned unchanged.
    #[must_use]
    pub fn canonical(&self, owner: Option<&Rc<DocumentObject>>) -> Self {
        let Some(resolved) = self.resolve(owner) else {
            return self.clone();
        };
        let mut components = Vec::with_capacity(self.components.len() + 1);
        if let Some(property) = resolved.property {
            components.push(PathComponent::Name(property));
        }
        components.extend(self.components.iter().skip(resolved.rest).cloned());
        Self { document: resolved.object.document().map(|d| d.name().to_string()),
               object: Some(ObjectName::internal(resolved.object.name())),
               components,
               local_property: false }
    }
}

/// Finds an object by internal name or, for label references, by label.
#[must_use]
pub fn find_object(document: &Rc<Document>, name: &ObjectName) -> Option<Rc<DocumentObject>> {
    if name.is_label {
        document.object_by_label(&name.name)
    } else {
        document.object(&name.name)
                .or_else(|| document.object_by_label(&name.name))
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(document) = &self.document {
            write!(f, "{document}#")?;
        }
        if let Some(object) = &self.object {
            write!(f, "{object}")?;
        }
        let mut leading = self.object.is_none() && !self.local_property;
        for component in &self.components {
            component.write(f, leading)?;
            leading = false;
        }
        Ok(())
    }
}
