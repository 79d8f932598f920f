use std::fmt::{self, Write};

use crate::{
    ast::{
        ATOM_PRIORITY, Argument, ArgumentKind, BinaryOperator, Component, ComprehensionClause,
        ComprehensionKind, DictEntry, ExceptHandler, Expr, ExprKind, IDictEntry, ImportItem, Item,
        Parameter, ParameterKind, QuoteStyle, StringLiteral,
    },
    interpreter::value::core::quote_string,
};

/// Width of one indentation level.
pub const INDENT_WIDTH: usize = 4;

impl Expr {
    /// Renders the node back to source text.
    ///
    /// # Parameters
    /// - `persistent`: Emit the document-independent spelling used when
    ///   saving instead of the display spelling.
    /// - `check_priority`: Parenthesize the node when it is not an atom.
    /// - `indent`: Column of the enclosing statement, used for nested
    ///   suites.
    ///
    /// # Returns
    /// The source text. Re-parsing the persistent form yields an equivalent
    /// tree.
    ///
    /// # Example
    /// ```
    /// use cadexpr::parse;
    ///
    /// let expr = parse("(1 + 2) * 3 - (4 - 5)").unwrap();
    /// assert_eq!(expr.render(true, false, 0), "(1 + 2) * 3 - (4 - 5)");
    /// assert_eq!(expr.render(true, true, 0), "((1 + 2) * 3 - (4 - 5))");
    /// ```
    #[must_use]
    pub fn render(&self, persistent: bool, check_priority: bool, indent: usize) -> String {
        let mut out = String::new();
        if let Some(comment) = &self.comment {
            let _ = write!(out, "#{comment}\n{}", " ".repeat(indent));
        }

        let body = self.render_kind(persistent, indent);
        let mut text = if self.components.is_empty() {
            body
        } else if self.is_indexable() && self.priority() >= ATOM_PRIORITY {
            body
        } else {
            format!("({body})")
        };
        for component in &self.components {
            component.write_to(&mut text, persistent);
        }

        if check_priority && self.components.is_empty() && self.priority() < ATOM_PRIORITY {
            let _ = write!(out, "({text})");
        } else {
            out.push_str(&text);
        }
        out
    }

    fn render_kind(&self, persistent: bool, indent: usize) -> String {
        let p = persistent;
        match &self.kind {
            ExprKind::Number(q) => q.to_source(),
            ExprKind::Integer(i) => i.to_string(),
            ExprKind::Unit { text, .. } => text.clone(),
            ExprKind::Constant(c) => c.name().to_string(),
            ExprKind::String(s) => render_string(s, p),
            ExprKind::Value(v) => {
                if p {
                    v.source_repr()
                } else {
                    v.repr()
                }
            },
            ExprKind::Variable(id) => id.to_string(),
            ExprKind::Range { begin, end } => format!("{begin}:{end}"),
            ExprKind::UnaryOp { op, operand } => {
                let inner = operand.render(p, false, indent);
                if operand.priority() < op.priority() {
                    format!("{}({inner})", op.spelling())
                } else {
                    format!("{}{inner}", op.spelling())
                }
            },
            ExprKind::BinaryOp { op, left, right } => render_binary(*op, left, right, p, indent),
            ExprKind::Conditional { condition,
                                    then_branch,
                                    else_branch,
                                    python_form, } => {
                let c = wrap_below(condition, 3, p, indent);
                let a = wrap_below(then_branch, 3, p, indent);
                let b = wrap_below(else_branch, 3, p, indent);
                if *python_form {
                    format!("{a} if {c} else {b}")
                } else {
                    format!("{c} ? {a} : {b}")
                }
            },
            ExprKind::Function { kind, args } => {
                format!("{}({})", kind.name(), render_arguments(args, p, indent))
            },
            ExprKind::Call { callee, args } => {
                let callee_text = if callee.is_indexable() {
                    callee.render(p, false, indent)
                } else {
                    format!("({})", callee.render(p, false, indent))
                };
                format!("{callee_text}({})", render_arguments(args, p, indent))
            },
            ExprKind::Assignment { targets,
                                   catch_all,
                                   op,
                                   values, } => {
                let lhs = render_targets(targets, *catch_all, p, indent);
                let rhs = join(values.iter().map(|v| v.render(p, false, indent)));
                match op {
                    Some(op) => format!("{lhs} {op}= {rhs}"),
                    None => format!("{lhs} = {rhs}"),
                }
            },
            ExprKind::Comprehension { kind,
                                      element,
                                      value,
                                      clauses, } => {
                let mut text = element.render(p, false, indent);
                if let Some(value) = value {
                    let _ = write!(text, ": {}", value.render(p, false, indent));
                }
                for clause in clauses {
                    match clause {
                        ComprehensionClause::For { targets,
                                                   catch_all,
                                                   iter, } => {
                            let _ = write!(text,
                                           " for {} in {}",
                                           render_targets(targets, *catch_all, p, indent),
                                           iter.render(p, false, indent));
                        },
                        ComprehensionClause::If(cond) => {
                            let _ = write!(text, " if {}", cond.render(p, false, indent));
                        },
                    }
                }
                match kind {
                    ComprehensionKind::List => format!("[{text}]"),
                    ComprehensionKind::Set | ComprehensionKind::Dict => format!("{{{text}}}"),
                }
            },
            ExprKind::List(items) => format!("[{}]", render_items(items, p, indent)),
            ExprKind::Tuple(items) => {
                if items.len() == 1 {
                    format!("({},)", render_items(items, p, indent))
                } else {
                    format!("({})", render_items(items, p, indent))
                }
            },
            ExprKind::Set(items) => format!("{{{}}}", render_items(items, p, indent)),
            ExprKind::Dict(entries) => format!("{{{}}}", render_dict(entries, p, indent)),
            ExprKind::IDict(entries) => format!("{{{}}}", render_idict(entries, p, indent)),
            ExprKind::Lambda { params, body } => {
                let body = body.render(p, false, indent);
                if params.is_empty() {
                    format!("lambda : {body}")
                } else {
                    format!("lambda {} : {body}", render_params(params, p, indent))
                }
            },
            ExprKind::FunctionDef { name, params, body } => {
                format!("def {name}({}):{}",
                        render_params(params, p, indent),
                        suite(body, p, indent))
            },
            ExprKind::Pass => "pass".to_string(),
            ExprKind::Jump { kind, value } => match value {
                Some(value) => format!("{} {}", kind.keyword(), value.render(p, false, indent)),
                None => kind.keyword().to_string(),
            },
            ExprKind::If { branches, else_body } => {
                let mut text = String::new();
                for (i, (condition, body)) in branches.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(text, "\n{}el", " ".repeat(indent));
                    }
                    let _ = write!(text,
                                   "if {}:{}",
                                   condition.render(p, false, indent),
                                   suite(body, p, indent));
                }
                push_clause(&mut text, "else", else_body.as_deref(), p, indent);
                text
            },
            ExprKind::While { condition,
                              body,
                              else_body, } => {
                let mut text = format!("while {}:{}",
                                       condition.render(p, false, indent),
                                       suite(body, p, indent));
                push_clause(&mut text, "else", else_body.as_deref(), p, indent);
                text
            },
            ExprKind::For { targets,
                            catch_all,
                            iter,
                            body,
                            else_body, } => {
                let mut text = format!("for {} in {}:{}",
                                       render_targets(targets, *catch_all, p, indent),
                                       iter.render(p, false, indent),
                                       suite(body, p, indent));
                push_clause(&mut text, "else", else_body.as_deref(), p, indent);
                text
            },
            ExprKind::Simple(statements) => {
                statements.iter()
                          .map(|s| s.render(p, false, indent))
                          .collect::<Vec<_>>()
                          .join("; ")
            },
            ExprKind::Block(statements) => {
                let pad = " ".repeat(indent);
                statements.iter()
                          .map(|s| format!("{pad}{}", s.render(p, false, indent)))
                          .collect::<Vec<_>>()
                          .join("\n")
            },
            ExprKind::Try { body,
                            handlers,
                            else_body,
                            finally_body, } => {
                let mut text = format!("try:{}", suite(body, p, indent));
                for handler in handlers {
                    render_handler(&mut text, handler, p, indent);
                }
                push_clause(&mut text, "else", else_body.as_deref(), p, indent);
                push_clause(&mut text, "finally", finally_body.as_deref(), p, indent);
                text
            },
            ExprKind::Del(targets) => {
                format!("del {}", join(targets.iter().map(|t| t.render(p, false, indent))))
            },
            ExprKind::Scope { global, names } => {
                format!("{} {}", if *global { "global" } else { "nonlocal" }, names.join(", "))
            },
            ExprKind::Import(items) => format!("import {}", render_imports(items)),
            ExprKind::From { module, names } => {
                format!("from {module} import {}", render_imports(names))
            },
        }
    }
}

fn render_string(s: &StringLiteral, persistent: bool) -> String {
    if s.quote == QuoteStyle::Label {
        return format!("<<{}>>", s.raw);
    }
    if persistent {
        return quote_string(&s.text);
    }
    let prefix = s.prefix.map(String::from).unwrap_or_default();
    format!("{prefix}{}{}{}", s.quote.open(), s.raw, s.quote.close())
}

fn render_binary(op: BinaryOperator, left: &Expr, right: &Expr, p: bool, indent: usize) -> String {
    let priority = op.priority();

    let left_text = left.render(p, false, indent);
    let left_text = if left.priority() < priority {
        format!("({left_text})")
    } else {
        left_text
    };

    let right_op = match &right.kind {
        ExprKind::BinaryOp { op, .. } if right.components.is_empty() => Some(*op),
        _ => None,
    };
    let needs_parens = right.priority() < priority
                       || right_op == Some(op)
                          && (!op.is_right_associative() || !op.is_commutative())
                       || right.priority() == priority && !op.is_right_associative()
                       || right_op == Some(BinaryOperator::Mod);
    let right_text = right.render(p, false, indent);
    let right_text = if needs_parens {
        format!("({right_text})")
    } else {
        right_text
    };

    format!("{left_text}{}{right_text}", op.spelling())
}

fn wrap_below(expr: &Expr, priority: u8, p: bool, indent: usize) -> String {
    let text = expr.render(p, false, indent);
    if expr.priority() < priority {
        format!("({text})")
    } else {
        text
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

fn render_arguments(args: &[Argument], p: bool, indent: usize) -> String {
    join(args.iter().map(|arg| {
                        let value = arg.value.render(p, false, indent);
                        match &arg.kind {
                            ArgumentKind::Positional => value,
                            ArgumentKind::Keyword(name) => format!("{name}={value}"),
                            ArgumentKind::Splat => format!("*{value}"),
                            ArgumentKind::KwSplat => format!("**{value}"),
                        }
                    }))
}

fn render_targets(targets: &[Expr], catch_all: Option<usize>, p: bool, indent: usize) -> String {
    join(targets.iter().enumerate().map(|(i, t)| {
                                       let text = t.render(p, false, indent);
                                       if catch_all == Some(i) {
                                           format!("*{text}")
                                       } else {
                                           text
                                       }
                                   }))
}

fn render_items(items: &[Item], p: bool, indent: usize) -> String {
    join(items.iter().map(|item| {
                         let text = item.expr.render(p, false, indent);
                         if item.splat { format!("*{text}") } else { text }
                     }))
}

fn render_dict(entries: &[DictEntry], p: bool, indent: usize) -> String {
    join(entries.iter().map(|entry| {
                           let value = entry.value.render(p, false, indent);
                           match &entry.key {
                               Some(key) => format!("{}: {value}", key.render(p, false, indent)),
                               None => format!("**{value}"),
                           }
                       }))
}

fn render_idict(entries: &[IDictEntry], p: bool, indent: usize) -> String {
    join(entries.iter().map(|entry| {
                           let value = entry.value.render(p, false, indent);
                           match &entry.name {
                               Some(name) => format!("{name}={value}"),
                               None => format!("**{value}"),
                           }
                       }))
}

fn render_params(params: &[Parameter], p: bool, indent: usize) -> String {
    join(params.iter().map(|param| {
                          let name = match param.kind {
                              ParameterKind::Plain => param.name.clone(),
                              ParameterKind::VarArgs => format!("*{}", param.name),
                              ParameterKind::KwArgs => format!("**{}", param.name),
                          };
                          match &param.default {
                              Some(default) => {
                                  format!("{name}={}", default.render(p, false, indent))
                              },
                              None => name,
                          }
                      }))
}

fn render_imports(items: &[ImportItem]) -> String {
    join(items.iter().map(|item| match &item.alias {
                      Some(alias) => format!("{} as {alias}", item.name),
                      None => item.name.clone(),
                  }))
}

/// Renders the body of a compound statement after its `:`.
///
/// Multi-line blocks go on their own lines one level deeper; anything else
/// stays on the header line.
fn suite(body: &Expr, p: bool, indent: usize) -> String {
    if matches!(body.kind, ExprKind::Block(_)) && body.comment.is_none() {
        format!("\n{}", body.render(p, false, indent + INDENT_WIDTH))
    } else {
        format!(" {}", body.render(p, false, indent))
    }
}

fn push_clause(text: &mut String, keyword: &str, body: Option<&Expr>, p: bool, indent: usize) {
    if let Some(body) = body {
        let _ = write!(text, "\n{}{keyword}:{}", " ".repeat(indent), suite(body, p, indent));
    }
}

fn render_handler(text: &mut String, handler: &ExceptHandler, p: bool, indent: usize) {
    let _ = write!(text, "\n{}except", " ".repeat(indent));
    if let Some(types) = &handler.types {
        let _ = write!(text, " {}", types.render(p, false, indent));
    }
    if let Some(name) = &handler.name {
        let _ = write!(text, " as {name}");
    }
    let _ = write!(text, ":{}", suite(&handler.body, p, indent));
}

impl Component {
    fn write_to(&self, out: &mut String, persistent: bool) {
        match self {
            Self::Attribute(name) => {
                let _ = write!(out, ".{name}");
            },
            Self::Index(index) => {
                let _ = write!(out, "[{}]", index.render(persistent, false, 0));
            },
            Self::Slice { start, stop, step } => {
                let part = |e: &Option<Box<Expr>>| {
                    e.as_ref()
                     .map(|e| e.render(persistent, false, 0))
                     .unwrap_or_default()
                };
                out.push('[');
                out.push_str(&part(start));
                out.push(':');
                out.push_str(&part(stop));
                if step.is_some() {
                    out.push(':');
                    out.push_str(&part(step));
                }
                out.push(']');
            },
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false, false, 0))
    }
}
