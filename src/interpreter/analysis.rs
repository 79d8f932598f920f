use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::{
    ast::{
        Expr, ExprKind, QuoteStyle,
        visit::{Visitor, VisitorMut},
    },
    document::{
        DocumentObject,
        cell::{CellAddress, expand_range},
    },
    identifier::{ObjectIdentifier, PathComponent},
};

/// Collects every identifier `expr` references.
///
/// The value is `true` for hidden references, those inside `href`,
/// `hiddenref` or `dbind`. An identifier referenced both ways is reported
/// as visible. Cell ranges contribute one identifier per cell. Names read
/// inside the body of a `def` or `lambda` are not collected.
///
/// The pass is read-only and never fails; a range whose ends are not cell
/// addresses is skipped.
///
/// # Example
/// ```
/// use cadexpr::{interpreter::analysis::dependencies, parse};
///
/// let deps = dependencies(&parse("hiddenref(Box.Length) + Box.Width").unwrap());
/// assert_eq!(deps.len(), 2);
/// assert_eq!(deps.values().copied().collect::<Vec<_>>(), [true, false]);
/// assert_eq!(deps.keys().next().map(ToString::to_string).as_deref(), Some("Box.Length"));
/// ```
#[must_use]
pub fn dependencies(expr: &Expr) -> IndexMap<ObjectIdentifier, bool> {
    let mut collector = DependencyCollector::default();
    expr.accept(&mut collector);
    collector.found
}

#[derive(Default)]
struct DependencyCollector {
    found:          IndexMap<ObjectIdentifier, bool>,
    function_depth: usize,
    hidden_depth:   usize,
}

impl DependencyCollector {
    fn add(&mut self, identifier: ObjectIdentifier) {
        let hidden = self.hidden_depth > 0;
        let entry = self.found.entry(identifier).or_insert(hidden);
        *entry &= hidden;
    }
}

impl Visitor for DependencyCollector {
    fn visit(&mut self, expr: &Expr) {
        if self.function_depth > 0 {
            return;
        }
        match &expr.kind {
            ExprKind::Variable(id) => self.add(id.clone()),
            ExprKind::Range { begin, end } => {
                let Some(cells) = expand_range(begin, end, |_| None) else {
                    trace!(%begin, %end, "range skipped");
                    return;
                };
                for cell in cells {
                    self.add(ObjectIdentifier::simple(cell.to_string()));
                }
            },
            _ => {},
        }
    }

    fn enter_function(&mut self) {
        self.function_depth += 1;
    }

    fn leave_function(&mut self) {
        self.function_depth -= 1;
    }

    fn enter_hidden(&mut self) {
        self.hidden_depth += 1;
    }

    fn leave_hidden(&mut self) {
        self.hidden_depth -= 1;
    }
}

/// Replaces identifiers whose canonical form is a key of `renames`.
///
/// Canonical forms are computed against `owner`, so `Length`, `.Length`
/// and `Doc#Box.Length` written inside `Box` all match the key
/// `Doc#Box.Length`.
///
/// # Returns
/// Whether anything changed.
pub fn rename_identifiers(expr: &mut Expr,
                          renames: &IndexMap<ObjectIdentifier, ObjectIdentifier>,
                          owner: Option<&Rc<DocumentObject>>)
                          -> bool {
    let mut renamer = Renamer { renames,
                                owner,
                                changed: false };
    expr.accept_mut(&mut renamer);
    renamer.changed
}

struct Renamer<'a> {
    renames: &'a IndexMap<ObjectIdentifier, ObjectIdentifier>,
    owner:   Option<&'a Rc<DocumentObject>>,
    changed: bool,
}

impl VisitorMut for Renamer<'_> {
    fn visit_mut(&mut self, expr: &mut Expr) {
        let ExprKind::Variable(id) = &mut expr.kind else {
            return;
        };
        if let Some(replacement) = self.renames.get(&id.canonical(self.owner)) {
            trace!(from = %id, to = %replacement, "identifier renamed");
            *id = replacement.clone();
            self.changed = true;
        }
    }
}

/// Rewrites `<<old>>` label references to `<<new>>`.
///
/// # Returns
/// Whether anything changed.
///
/// # Example
/// ```
/// use cadexpr::{interpreter::analysis::update_label_reference, parse};
///
/// let mut tree = parse("<<Plate>>.Width * 2").unwrap();
/// assert!(update_label_reference(&mut tree, "Plate", "Base"));
/// assert_eq!(tree.to_string(), "<<Base>>.Width * 2");
/// assert!(!update_label_reference(&mut tree, "Plate", "Other"));
/// ```
pub fn update_label_reference(expr: &mut Expr, old: &str, new: &str) -> bool {
    let mut updater = LabelUpdater { old,
                                     new,
                                     changed: false };
    expr.accept_mut(&mut updater);
    updater.changed
}

struct LabelUpdater<'a> {
    old:     &'a str,
    new:     &'a str,
    changed: bool,
}

impl VisitorMut for LabelUpdater<'_> {
    fn visit_mut(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Variable(id) => {
                if let Some(object) = &mut id.object
                   && object.is_label
                   && object.name == self.old
                {
                    object.name = self.new.to_string();
                    self.changed = true;
                }
            },
            ExprKind::String(literal) if literal.quote == QuoteStyle::Label && literal.text == self.old => {
                literal.text = self.new.to_string();
                literal.raw = self.new.to_string();
                self.changed = true;
            },
            _ => {},
        }
    }
}

/// Shifts cell references after rows or columns are inserted or removed.
///
/// A reference at or beyond `address`, in both row and column, moves by
/// `rows` and `cols`, absolute or not. References that would leave the
/// sheet are kept.
///
/// # Returns
/// Whether anything changed.
///
/// # Example
/// ```
/// use cadexpr::{document::cell::CellAddress, interpreter::analysis::move_cells, parse};
///
/// let mut tree = parse("A1 + A3 + sum(A2:B4)").unwrap();
/// let row2 = CellAddress::parse("A2").unwrap();
/// assert!(move_cells(&mut tree, &row2, 2, 0));
/// assert_eq!(tree.to_string(), "A1 + A5 + sum(A4:B6)");
/// ```
pub fn move_cells(expr: &mut Expr, address: &CellAddress, rows: i64, cols: i64) -> bool {
    rewrite_cells(expr, |cell| {
        if cell.row >= address.row && cell.col >= address.col {
            cell.offset(rows, cols)
        } else {
            None
        }
    })
}

/// Shifts relative cell references by `rows` and `cols`, as when a cell's
/// expression is copied elsewhere. `$`-pinned coordinates stay put.
///
/// # Returns
/// Whether anything changed.
///
/// # Example
/// ```
/// use cadexpr::{interpreter::analysis::offset_cells, parse};
///
/// let mut tree = parse("A1 + $B$2 + $C3").unwrap();
/// assert!(offset_cells(&mut tree, 1, 1));
/// assert_eq!(tree.to_string(), "B2 + $B$2 + $C4");
/// ```
pub fn offset_cells(expr: &mut Expr, rows: i64, cols: i64) -> bool {
    rewrite_cells(expr, |cell| {
        let rows = if cell.absolute_row { 0 } else { rows };
        let cols = if cell.absolute_col { 0 } else { cols };
        cell.offset(rows, cols)
    })
}

fn rewrite_cells(expr: &mut Expr, shift: impl Fn(&CellAddress) -> Option<CellAddress>) -> bool {
    let mut rewriter = CellRewriter { shift,
                                      changed: false };
    expr.accept_mut(&mut rewriter);
    rewriter.changed
}

struct CellRewriter<F> {
    shift:   F,
    changed: bool,
}

impl<F> CellRewriter<F> where F: Fn(&CellAddress) -> Option<CellAddress>
{
    /// Shifts `text` if it is an address, returning whether it changed.
    fn rewrite(&self, text: &mut String) -> bool {
        let Some(cell) = CellAddress::parse(text) else {
            return false;
        };
        match (self.shift)(&cell) {
            Some(moved) if moved != cell => {
                *text = moved.to_string();
                true
            },
            _ => false,
        }
    }
}

impl<F> VisitorMut for CellRewriter<F> where F: Fn(&CellAddress) -> Option<CellAddress>
{
    fn visit_mut(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Variable(id) if !id.is_qualified() && !id.local_property => {
                if let Some(PathComponent::Name(name)) = id.components.first_mut() {
                    let changed = self.rewrite(name);
                    self.changed |= changed;
                }
            },
            ExprKind::Range { begin, end } => {
                let changed_begin = self.rewrite(begin);
                let changed_end = self.rewrite(end);
                self.changed |= changed_begin || changed_end;
            },
            _ => {},
        }
    }
}
