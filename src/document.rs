//! In-memory host object model.
//!
//! Workspaces hold documents, documents hold objects, objects hold ordered
//! properties. Everything is reference counted with weak back-references,
//! so dropping the workspace frees the whole graph.

/// Spreadsheet cell addresses.
pub mod cell;

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::{Rc, Weak},
};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::Expression,
    error::RuntimeError,
    identifier::ObjectIdentifier,
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::{
            core::Value,
            geometry::Placement,
            host::{HostObject, next_object_id},
        },
    },
};

/// Maximum number of link hops followed by [`DocumentObject::linked_object`].
pub const MAX_LINK_DEPTH: usize = 64;

/// A set of named documents.
#[derive(Debug, Default)]
pub struct Workspace {
    documents: RefCell<IndexMap<String, Rc<Document>>>,
}

impl Workspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Creates a document, replacing any document with the same name.
    pub fn add_document(self: &Rc<Self>, name: &str) -> Rc<Document> {
        let document = Document::create(name, Rc::downgrade(self));
        self.documents
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&document));
        document
    }

    /// Looks up a document.
    #[must_use]
    pub fn document(&self, name: &str) -> Option<Rc<Document>> {
        self.documents.borrow().get(name).cloned()
    }
}

/// A property slot.
#[derive(Debug, Clone, Default)]
pub struct Property {
    /// Current value.
    pub value:   Value,
    /// Dirty flag, set on every write.
    pub touched: bool,
}

#[derive(Debug)]
struct Link {
    target:    Weak<DocumentObject>,
    placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindingKey {
    object:   String,
    property: String,
}

/// A named collection of objects plus their expression bindings.
#[derive(Debug)]
pub struct Document {
    name:        String,
    workspace:   Weak<Workspace>,
    self_ref:    Weak<Document>,
    objects:     RefCell<IndexMap<String, Rc<DocumentObject>>>,
    expressions: RefCell<IndexMap<BindingKey, Expression>>,
}

impl Document {
    /// Creates a document outside of any workspace.
    #[must_use]
    pub fn new(name: &str) -> Rc<Self> {
        Self::create(name, Weak::new())
    }

    fn create(name: &str, workspace: Weak<Workspace>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self { name: name.to_string(),
                                         workspace,
                                         self_ref: self_ref.clone(),
                                         objects: RefCell::new(IndexMap::new()),
                                         expressions: RefCell::new(IndexMap::new()) })
    }

    /// The document name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning workspace, if any.
    #[must_use]
    pub fn workspace(&self) -> Option<Rc<Workspace>> {
        self.workspace.upgrade()
    }

    /// Adds an object whose label starts out equal to its name.
    pub fn add_object(&self, name: &str) -> Rc<DocumentObject> {
        let object = Rc::new_cyclic(|self_ref| DocumentObject { id:         next_object_id(),
                                                                name:       name.to_string(),
                                                                label:      RefCell::new(name.to_string()),
                                                                document:   self.self_ref.clone(),
                                                                self_ref:   self_ref.clone(),
                                                                properties: RefCell::new(IndexMap::new()),
                                                                link:       RefCell::new(None),
                                                                aliases:    RefCell::new(IndexMap::new()), });
        self.objects
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&object));
        object
    }

    /// Looks up an object by internal name.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<Rc<DocumentObject>> {
        self.objects.borrow().get(name).cloned()
    }

    /// Looks up an object by label.
    #[must_use]
    pub fn object_by_label(&self, label: &str) -> Option<Rc<DocumentObject>> {
        self.objects
            .borrow()
            .values()
            .find(|o| *o.label.borrow() == label)
            .cloned()
    }

    /// All objects, in creation order.
    #[must_use]
    pub fn objects(&self) -> Vec<Rc<DocumentObject>> {
        self.objects.borrow().values().cloned().collect()
    }

    /// Clears every touched flag in the document.
    pub fn purge_touched(&self) {
        for object in self.objects.borrow().values() {
            object.purge_touched();
        }
    }

    /// Binds `expression` to `object.property`, replacing any previous
    /// binding.
    pub fn set_expression(&self, object: &str, property: &str, expression: Expression) {
        self.expressions
            .borrow_mut()
            .insert(BindingKey { object:   object.to_string(),
                                 property: property.to_string(), },
                    expression);
    }

    /// The expression bound to `object.property`.
    #[must_use]
    pub fn expression(&self, object: &str, property: &str) -> Option<Expression> {
        self.expressions
            .borrow()
            .get(&BindingKey { object:   object.to_string(),
                               property: property.to_string(), })
            .cloned()
    }

    /// Removes a binding.
    pub fn clear_expression(&self, object: &str, property: &str) {
        self.expressions
            .borrow_mut()
            .shift_remove(&BindingKey { object:   object.to_string(),
                                        property: property.to_string(), });
    }

    /// Visits every bound expression mutably, e.g. to rewrite references
    /// after a label change.
    pub fn for_each_expression_mut(&self, mut f: impl FnMut(&str, &str, &mut Expression)) {
        for (key, expression) in self.expressions.borrow_mut().iter_mut() {
            f(&key.object, &key.property, expression);
        }
    }

    /// Evaluates all bindings in dependency order and writes the results.
    ///
    /// Ordering follows the non-hidden dependencies of each binding; hidden
    /// references are trusted and do not constrain the order. A cycle of
    /// non-hidden references fails with "Cyclic dependency".
    ///
    /// # Returns
    /// The number of bindings evaluated.
    pub fn recompute(&self, ctx: &mut Context) -> EvalResult<usize> {
        let bindings: Vec<(BindingKey, Expression)> = self.expressions
                                                          .borrow()
                                                          .iter()
                                                          .map(|(k, e)| (k.clone(), e.clone()))
                                                          .collect();
        let index: HashMap<BindingKey, usize> = bindings.iter()
                                                        .enumerate()
                                                        .map(|(i, (k, _))| (k.clone(), i))
                                                        .collect();

        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); bindings.len()];
        for (i, (key, expression)) in bindings.iter().enumerate() {
            let owner = self.object(&key.object);
            for (identifier, hidden) in expression.dependencies() {
                if hidden {
                    continue;
                }
                if let Some(dep) = self.binding_of(&identifier.canonical(owner.as_ref()))
                   && let Some(&j) = index.get(&dep)
                {
                    edges[i].push(j);
                }
            }
        }

        let order = topological_order(&edges).ok_or_else(|| {
                                                  RuntimeError::runtime("Cyclic dependency", 0)
                                              })?;
        for &i in &order {
            let (key, expression) = &bindings[i];
            let value = ctx.evaluate_expression(expression)?;
            debug!(object = %key.object, property = %key.property, %value, "recomputed binding");
            if let Some(object) = self.object(&key.object) {
                object.set_property(&key.property, value);
            }
        }
        Ok(order.len())
    }

    fn binding_of(&self, canonical: &ObjectIdentifier) -> Option<BindingKey> {
        if canonical.document.as_deref().is_some_and(|d| d != self.name) {
            return None;
        }
        let object = canonical.object.as_ref()?;
        let property = canonical.first_name()?;
        Some(BindingKey { object:   object.name.clone(),
                          property: property.to_string(), })
    }
}

/// Depth-first topological sort; `None` on a cycle.
fn topological_order(edges: &[Vec<usize>]) -> Option<Vec<usize>> {
    fn visit(node: usize,
             edges: &[Vec<usize>],
             done: &mut HashSet<usize>,
             active: &mut HashSet<usize>,
             order: &mut Vec<usize>)
             -> bool {
        if done.contains(&node) {
            return true;
        }
        if !active.insert(node) {
            return false;
        }
        for &dep in &edges[node] {
            if !visit(dep, edges, done, active, order) {
                return false;
            }
        }
        active.remove(&node);
        done.insert(node);
        order.push(node);
        true
    }

    let mut done = HashSet::new();
    let mut active = HashSet::new();
    let mut order = Vec::with_capacity(edges.len());
    for node in 0..edges.len() {
        if !visit(node, edges, &mut done, &mut active, &mut order) {
            return None;
        }
    }
    Some(order)
}

/// An object inside a document.
#[derive(Debug)]
pub struct DocumentObject {
    id:         usize,
    name:       String,
    label:      RefCell<String>,
    document:   Weak<Document>,
    self_ref:   Weak<DocumentObject>,
    properties: RefCell<IndexMap<String, Property>>,
    link:       RefCell<Option<Link>>,
    aliases:    RefCell<IndexMap<String, String>>,
}

impl DocumentObject {
    /// The internal name, unique within the document.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The user-visible label.
    #[must_use]
    pub fn label(&self) -> String {
        self.label.borrow().clone()
    }

    /// Changes the label.
    pub fn set_label(&self, label: &str) {
        label.clone_into(&mut self.label.borrow_mut());
    }

    /// The owning document.
    #[must_use]
    pub fn document(&self) -> Option<Rc<Document>> {
        self.document.upgrade()
    }

    /// A strong handle to this object.
    #[must_use]
    pub fn handle(&self) -> Option<Rc<Self>> {
        self.self_ref.upgrade()
    }

    /// Returns `true` when the property exists here or on the linked object.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.get_property_by_name(name).is_some()
    }

    /// Reads a property.
    ///
    /// A link object that lacks the property defers to its linked object.
    #[must_use]
    pub fn get_property_by_name(&self, name: &str) -> Option<Value> {
        if let Some(property) = self.properties.borrow().get(name) {
            return Some(property.value.clone());
        }
        let (target, _) = self.linked_object(true)?;
        if target.id == self.id {
            return None;
        }
        target.properties
              .borrow()
              .get(name)
              .map(|p| p.value.clone())
    }

    /// Writes a property, creating it if needed, and marks it touched.
    pub fn set_property(&self, name: &str, value: Value) {
        let mut properties = self.properties.borrow_mut();
        let property = properties.entry(name.to_string()).or_default();
        property.value = value;
        property.touched = true;
    }

    /// Names of the object's own properties, in insertion order.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    /// Marks a property touched without changing it.
    pub fn touch(&self, name: &str) {
        if let Some(property) = self.properties.borrow_mut().get_mut(name) {
            property.touched = true;
        }
    }

    /// Whether the property was written since the last purge.
    #[must_use]
    pub fn is_touched(&self, name: &str) -> bool {
        self.properties
            .borrow()
            .get(name)
            .is_some_and(|p| p.touched)
    }

    /// Clears all touched flags.
    pub fn purge_touched(&self) {
        for property in self.properties.borrow_mut().values_mut() {
            property.touched = false;
        }
    }

    /// Makes this object a link to `target`, placed by `placement`.
    pub fn set_link(&self, target: &Rc<Self>, placement: Placement) {
        *self.link.borrow_mut() = Some(Link { target: Rc::downgrade(target),
                                              placement });
    }

    /// Follows link targets, composing their placements.
    ///
    /// Returns the object itself with the identity placement when it is not
    /// a link. With `recursive` unset only one hop is taken. `None` means a
    /// cycle, or a chain longer than [`MAX_LINK_DEPTH`].
    ///
    /// # Example
    /// ```
    /// use cadexpr::{
    ///     document::Document,
    ///     interpreter::value::geometry::{Placement, Rotation, Vector3},
    /// };
    ///
    /// let doc = Document::new("Doc");
    /// let part = doc.add_object("Part");
    /// let link = doc.add_object("Link");
    /// link.set_link(&part, Placement::new(Vector3::new(1.0, 0.0, 0.0), Rotation::IDENTITY));
    ///
    /// let (target, placement) = link.linked_object(true).unwrap();
    /// assert_eq!(target.name(), "Part");
    /// assert_eq!(placement.base, Vector3::new(1.0, 0.0, 0.0));
    /// ```
    #[must_use]
    pub fn linked_object(&self, recursive: bool) -> Option<(Rc<Self>, Placement)> {
        let mut current = self.handle()?;
        let mut placement = Placement::default();
        let mut seen = HashSet::from([current.id]);
        for _ in 0..MAX_LINK_DEPTH {
            let link = current.link
                              .borrow()
                              .as_ref()
                              .map(|l| (l.target.clone(), l.placement));
            let Some((target, link_placement)) = link else {
                return Some((current, placement));
            };
            placement = placement.multiply(&link_placement);
            current = target.upgrade()?;
            if !seen.insert(current.id) {
                return None;
            }
            if !recursive {
                return Some((current, placement));
            }
        }
        None
    }

    /// Gives cell `address` the alias `alias`.
    pub fn set_alias(&self, address: &str, alias: &str) {
        self.aliases
            .borrow_mut()
            .insert(alias.to_string(), address.to_string());
    }

    /// The cell address an alias stands for.
    #[must_use]
    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.aliases.borrow().get(alias).cloned()
    }
}

impl HostObject for DocumentObject {
    fn object_id(&self) -> usize {
        self.id
    }

    fn type_name(&self) -> &str {
        "App.DocumentObject"
    }

    fn module(&self) -> Option<&str> {
        Some("App")
    }

    fn repr(&self) -> String {
        format!("<DocumentObject {}>", self.name)
    }

    fn get_attr(&self, name: &str, _line: usize) -> EvalResult<Option<Value>> {
        Ok(match name {
            "Name" => Some(Value::from(self.name.as_str())),
            "Label" => Some(Value::from(self.label())),
            _ => self.get_property_by_name(name),
        })
    }

    fn set_attr(&self, name: &str, value: Value, line: usize) -> EvalResult<()> {
        match name {
            "Name" => Err(RuntimeError::type_error("Attribute 'Name' is read-only", line)),
            "Label" => {
                let label = value.as_str()
                                 .ok_or_else(|| RuntimeError::type_error("Label must be a string", line))?;
                self.set_label(label);
                Ok(())
            },
            _ => {
                self.set_property(name, value);
                Ok(())
            },
        }
    }

    fn as_document_object(&self) -> Option<Rc<DocumentObject>> {
        self.handle()
    }
}
