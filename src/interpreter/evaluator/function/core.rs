use crate::{
    ast::{Argument, ArgumentKind, ExprKind},
    error::RuntimeError,
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::core::Value,
    },
};

/// Specifies the allowed number of arguments for a catalog function.
///
/// - `Exact(n)` means the function must receive exactly `n` arguments.
/// - `OneOf(slice)` means the function accepts any count listed in `slice`.
/// - `AtLeast(n)` means `n` or more arguments.
/// - `Any` accepts every count, including none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many.
    Exact(usize),
    /// Any of the listed counts.
    OneOf(&'static [usize]),
    /// At least this many.
    AtLeast(usize),
    /// No restriction.
    Any,
}

impl Arity {
    /// Tests whether the given argument count satisfies this arity constraint.
    #[must_use]
    pub fn check(&self, n: usize) -> bool {
        match self {
            Self::Exact(m) => n == *m,
            Self::OneOf(counts) => counts.contains(&n),
            Self::AtLeast(m) => n >= *m,
            Self::Any => true,
        }
    }

    fn error(&self, name: &str, line: usize) -> RuntimeError {
        let details = match self {
            Self::AtLeast(1) => "Function requires at least one argument.".to_string(),
            Self::AtLeast(2) => "Function requires at least two arguments.".to_string(),
            Self::AtLeast(n) => format!("Function requires at least {n} arguments."),
            Self::OneOf(counts) => {
                let counts = counts.iter().map(ToString::to_string).collect::<Vec<_>>();
                format!("Function expects {} arguments.", counts.join(" or "))
            },
            Self::Exact(1) => format!("Function '{name}' expects 1 argument."),
            Self::Exact(n) => format!("Function '{name}' expects {n} arguments."),
            Self::Any => String::new(),
        };
        RuntimeError::runtime(details, line)
    }
}

/// One entry of the function catalog.
#[derive(Debug, Clone, Copy)]
pub struct FunctionInfo {
    /// The function.
    pub kind:        FunctionKind,
    /// The name it is called by.
    pub name:        &'static str,
    /// One-line description, shown by completion tooling.
    pub description: &'static str,
    /// Accepted argument counts.
    pub arity:       Arity,
}

/// Defines the built-in function catalog.
///
/// Each entry provides:
/// - the enum variant,
/// - the name the parser recognizes,
/// - an arity specification,
/// - a description.
///
/// The macro produces:
/// - `FunctionKind` (one variant per function),
/// - `FUNCTION_CATALOG` (the enumerable table, in declaration order),
/// - `FunctionKind::name`.
macro_rules! function_catalog {
    (
        $(
            $variant:ident => $name:literal {
                arity: $arity:expr,
                description: $description:literal $(,)?
            }
        ),* $(,)?
    ) => {
        /// Functions built into the expression language.
        ///
        /// A call of one of these names parses into
        /// [`crate::ast::ExprKind::Function`] rather than a generic call.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum FunctionKind {
            $(
                #[doc = $description]
                $variant,
            )*
        }

        /// Every built-in function, in catalog order.
        pub static FUNCTION_CATALOG: &[FunctionInfo] = &[
            $(
                FunctionInfo { kind:        FunctionKind::$variant,
                               name:        $name,
                               description: $description,
                               arity:       $arity, },
            )*
        ];

        impl FunctionKind {
            /// The name the function is called by.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

function_catalog! {
    Acos      => "acos"      { arity: Arity::Exact(1), description: "Arc cosine, in degrees." },
    Asin      => "asin"      { arity: Arity::Exact(1), description: "Arc sine, in degrees." },
    Atan      => "atan"      { arity: Arity::Exact(1), description: "Arc tangent, in degrees." },
    Abs       => "abs"       { arity: Arity::Exact(1), description: "Absolute value." },
    Exp       => "exp"       { arity: Arity::Exact(1), description: "Exponential function." },
    Log       => "log"       { arity: Arity::Exact(1), description: "Natural logarithm." },
    Log10     => "log10"     { arity: Arity::Exact(1), description: "Common logarithm." },
    Sin       => "sin"       { arity: Arity::Exact(1), description: "Sine of an angle." },
    Sinh      => "sinh"      { arity: Arity::Exact(1), description: "Hyperbolic sine." },
    Tan       => "tan"       { arity: Arity::Exact(1), description: "Tangent of an angle." },
    Tanh      => "tanh"      { arity: Arity::Exact(1), description: "Hyperbolic tangent." },
    Sqrt      => "sqrt"      { arity: Arity::Exact(1), description: "Square root." },
    Cos       => "cos"       { arity: Arity::Exact(1), description: "Cosine of an angle." },
    Cosh      => "cosh"      { arity: Arity::Exact(1), description: "Hyperbolic cosine." },
    Atan2     => "atan2"     { arity: Arity::Exact(2), description: "Arc tangent of y/x, in degrees." },
    Mod       => "mod"       { arity: Arity::Exact(2), description: "Floating remainder." },
    Pow       => "pow"       { arity: Arity::Exact(2), description: "Power." },
    Round     => "round"     { arity: Arity::Exact(1), description: "Round to the nearest integer." },
    Trunc     => "trunc"     { arity: Arity::Exact(1), description: "Truncate toward zero." },
    Ceil      => "ceil"      { arity: Arity::Exact(1), description: "Round up." },
    Floor     => "floor"     { arity: Arity::Exact(1), description: "Round down." },
    Hypot     => "hypot"     { arity: Arity::OneOf(&[2, 3]), description: "Length of the hypotenuse." },
    Cath      => "cath"      { arity: Arity::OneOf(&[2, 3]), description: "Length of a cathetus." },
    List      => "list"      { arity: Arity::Any, description: "Build a list from the arguments or a range." },
    Tuple     => "tuple"     { arity: Arity::Any, description: "Build a tuple from the arguments or a range." },
    Eval      => "eval"      { arity: Arity::AtLeast(1), description: "Evaluate statements given as text." },
    Func      => "func"      { arity: Arity::AtLeast(1), description: "Build a function from text." },
    FuncD     => "func_d"    { arity: Arity::AtLeast(1), description: "Build a function from text, deferring its defaults." },
    ImportPy  => "import_py" { arity: Arity::Exact(1), description: "Import a registered module." },
    Pragma    => "pragma"    { arity: Arity::OneOf(&[1, 2]), description: "Adjust evaluation settings of the current call." },
    Mscale    => "mscale"    { arity: Arity::AtLeast(2), description: "Scale a matrix." },
    Minvert   => "minvert"   { arity: Arity::Exact(1), description: "Invert a matrix, placement or rotation." },
    Create    => "create"    { arity: Arity::AtLeast(1), description: "Create a vector, matrix, rotation or placement." },
    Str       => "str"       { arity: Arity::Exact(1), description: "Convert to text." },
    Href      => "href"      { arity: Arity::Exact(1), description: "Hidden reference, excluded from dependency ordering." },
    HiddenRef => "hiddenref" { arity: Arity::Exact(1), description: "Hidden reference, excluded from dependency ordering." },
    DBind     => "dbind"     { arity: Arity::Exact(1), description: "Double binding marker." },
    Sum       => "sum"       { arity: Arity::AtLeast(1), description: "Sum of all entries." },
    Count     => "count"     { arity: Arity::AtLeast(1), description: "Number of numeric entries." },
    Average   => "average"   { arity: Arity::AtLeast(1), description: "Arithmetic mean." },
    Stddev    => "stddev"    { arity: Arity::AtLeast(1), description: "Sample standard deviation." },
    Min       => "min"       { arity: Arity::AtLeast(1), description: "Smallest entry." },
    Max       => "max"       { arity: Arity::AtLeast(1), description: "Largest entry." },
}

impl FunctionKind {
    /// Looks a function up by name.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::evaluator::function::core::FunctionKind;
    ///
    /// assert_eq!(FunctionKind::from_name("stddev"), Some(FunctionKind::Stddev));
    /// assert_eq!(FunctionKind::from_name("func_d").map(FunctionKind::name), Some("func_d"));
    /// assert_eq!(FunctionKind::from_name("print"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        FUNCTION_CATALOG.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    /// The catalog entry of the function.
    #[must_use]
    pub fn info(self) -> &'static FunctionInfo {
        // Every variant is generated together with its catalog entry.
        FUNCTION_CATALOG.iter()
                        .find(|f| f.kind == self)
                        .unwrap_or(&FUNCTION_CATALOG[0])
    }

    /// `true` for the range and argument reducers.
    #[must_use]
    pub const fn is_aggregate(self) -> bool {
        matches!(self,
                 Self::Sum | Self::Count | Self::Average | Self::Stddev | Self::Min | Self::Max)
    }

    /// `true` for functions whose result depends only on their arguments.
    ///
    /// These are the functions the simplifier may fold.
    #[must_use]
    pub const fn is_pure_math(self) -> bool {
        matches!(self,
                 Self::Acos
                 | Self::Asin
                 | Self::Atan
                 | Self::Abs
                 | Self::Exp
                 | Self::Log
                 | Self::Log10
                 | Self::Sin
                 | Self::Sinh
                 | Self::Tan
                 | Self::Tanh
                 | Self::Sqrt
                 | Self::Cos
                 | Self::Cosh
                 | Self::Atan2
                 | Self::Mod
                 | Self::Pow
                 | Self::Round
                 | Self::Trunc
                 | Self::Ceil
                 | Self::Floor
                 | Self::Hypot
                 | Self::Cath)
    }
}

impl Context {
    /// Evaluates a call of a catalog function.
    ///
    /// The engine functions (`eval`, `func`, `func_d`) receive their argument
    /// expressions unevaluated; every other function gets evaluated,
    /// splat-expanded positional values after the arity check.
    ///
    /// # Parameters
    /// - `kind`: Which function.
    /// - `args`: Argument expressions.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// The function result.
    pub(crate) fn eval_function(&mut self,
                                kind: FunctionKind,
                                args: &[Argument],
                                line: usize)
                                -> EvalResult<Value> {
        let info = kind.info();
        if !info.arity.check(args.len()) {
            if kind == FunctionKind::DBind {
                return Err(RuntimeError::runtime("dbind() only accepts one identifier expression",
                                                 line));
            }
            return Err(info.arity.error(info.name, line));
        }

        match kind {
            FunctionKind::Eval => return self.eval_source_function(args, line),
            FunctionKind::Func => return self.build_function(args, false, line),
            FunctionKind::FuncD => return self.build_function(args, true, line),
            FunctionKind::List | FunctionKind::Tuple => {
                let items = self.builder_items(kind, args, line)?;
                return Ok(if kind == FunctionKind::List {
                              Value::list(items)
                          } else {
                              Value::tuple(items)
                          });
            },
            _ => {},
        }

        let values = self.positional_values(kind, args, line)?;
        if !info.arity.check(values.len()) {
            return Err(info.arity.error(info.name, line));
        }
        match kind {
            FunctionKind::ImportPy => self.import_module_value(&values[0], line),
            FunctionKind::Pragma => self.pragma(&values, line),
            FunctionKind::Mscale => Self::mscale(&values, line),
            FunctionKind::Minvert => Self::minvert(&values[0], line),
            FunctionKind::Create => Self::create(&values, line),
            FunctionKind::Str => Ok(Value::string(values[0].to_string())),
            FunctionKind::Href | FunctionKind::HiddenRef | FunctionKind::DBind => {
                Ok(values.into_iter().next().unwrap_or_default())
            },
            k if k.is_aggregate() => Self::aggregate(k, &values, line),
            k => Self::eval_math(k, &values, line),
        }
    }

    /// Evaluates arguments of a function that takes positional values only.
    fn positional_values(&mut self,
                         kind: FunctionKind,
                         args: &[Argument],
                         line: usize)
                         -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match &arg.kind {
                ArgumentKind::Positional => values.push(self.eval(&arg.value)?),
                ArgumentKind::Splat => {
                    let seq = self.eval(&arg.value)?;
                    values.extend(seq.iterate(line)?);
                },
                ArgumentKind::Keyword(_) | ArgumentKind::KwSplat => {
                    return Err(RuntimeError::runtime(format!("Function '{}' does not support named argument.",
                                                             kind.name()),
                                                     line));
                },
            }
        }
        Ok(values)
    }

    /// Items of `list(...)`/`tuple(...)`; a lone range argument expands
    /// to its cells.
    fn builder_items(&mut self,
                     kind: FunctionKind,
                     args: &[Argument],
                     line: usize)
                     -> EvalResult<Vec<Value>> {
        if let [arg] = args
           && arg.kind == ArgumentKind::Positional
           && arg.value.components.is_empty()
           && matches!(arg.value.kind, ExprKind::Range { .. })
        {
            return self.eval(&arg.value)?.iterate(line);
        }
        self.positional_values(kind, args, line)
    }
}
