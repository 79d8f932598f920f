use std::fmt;

/// Binary operators of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// `or`
    Or,
    /// `and`
    And,
    /// `is`
    Is,
    /// `is not`
    IsNot,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `%`
    Mod,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// Quantity addition by juxtaposition, `1 ft 2 inch`.
    UnitAdd,
    /// Number-unit juxtaposition, `10 mm`.
    Unit,
    /// `**`
    Pow,
    /// `^`, the same operation as `**`.
    PowCaret,
}

impl BinaryOperator {
    /// Binding strength, from `or` (1) to power (10).
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Is | Self::IsNot | Self::In | Self::NotIn | Self::Eq | Self::Neq => 3,
            Self::Lt | Self::Gt | Self::Lte | Self::Gte => 4,
            Self::Add | Self::Sub => 5,
            Self::Mod | Self::Mul | Self::Div | Self::FloorDiv => 6,
            Self::UnitAdd => 8,
            Self::Unit => 9,
            Self::Pow | Self::PowCaret => 10,
        }
    }

    /// The operator spelled with its surrounding spaces.
    #[must_use]
    pub const fn spelling(self) -> &'static str {
        match self {
            Self::Or => " or ",
            Self::And => " and ",
            Self::Is => " is ",
            Self::IsNot => " is not ",
            Self::In => " in ",
            Self::NotIn => " not in ",
            Self::Eq => " == ",
            Self::Neq => " != ",
            Self::Lt => " < ",
            Self::Gt => " > ",
            Self::Lte => " <= ",
            Self::Gte => " >= ",
            Self::Add => " + ",
            Self::Sub => " - ",
            Self::Mod => " % ",
            Self::Mul => " * ",
            Self::Div => " / ",
            Self::FloorDiv => " // ",
            Self::UnitAdd | Self::Unit => " ",
            Self::Pow => " ** ",
            Self::PowCaret => " ^ ",
        }
    }

    /// Whether `a op b == b op a`, used to drop redundant right parentheses.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self,
                 Self::Is | Self::IsNot | Self::Eq | Self::Neq | Self::Add | Self::Mul)
    }

    /// Whether `a op (b op c)` may print without parentheses.
    #[must_use]
    pub const fn is_right_associative(self) -> bool {
        matches!(self, Self::Add | Self::Mul)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling().trim())
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// `-`
    Neg,
    /// `+`
    Pos,
    /// `not`
    Not,
}

impl UnaryOperator {
    /// Unary operators all bind at priority 7.
    #[must_use]
    pub const fn priority(self) -> u8 {
        7
    }

    /// The printed prefix.
    #[must_use]
    pub const fn spelling(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Pos => "+",
            Self::Not => "not ",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling().trim())
    }
}
