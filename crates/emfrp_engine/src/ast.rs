use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::BitAnd => "&",
            Self::BitXor => "^",
            Self::BitOr => "|",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i32),
    Bool(bool),
    /// Current value of a node.
    Identifier(String),
    /// Value the node held before the update in progress.
    Last(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Names read through a plain identifier, in first-use order.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect(&mut out, false);
        out
    }

    /// Names read through `@last`, in first-use order.
    pub fn last_references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect(&mut out, true);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a str>, last: bool) {
        match self {
            Self::Int(_) | Self::Bool(_) => {}
            Self::Identifier(name) if !last => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Last(name) if last => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Identifier(_) | Self::Last(_) => {}
            Self::Negate(inner) => inner.collect(out, last),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect(out, last);
                rhs.collect(out, last);
            }
            Self::If {
                cond,
                then,
                otherwise,
            } => {
                cond.collect(out, last);
                then.collect(out, last);
                otherwise.collect(out, last);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Identifier(name) => write!(f, "{name}"),
            Self::Last(name) => write!(f, "{name}@last"),
            Self::Negate(inner) => write!(f, "-{inner}"),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Self::If {
                cond,
                then,
                otherwise,
            } => write!(f, "(if {cond} then {then} else {otherwise})"),
        }
    }
}

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toplevel {
    Expression(Expr),
    Node { name: String, expr: Expr },
}
