//! Canonical text rendering.
//!
//! The rendering is used for lookup keys, traces and error diagnostics. A
//! junction nested directly in another junction is parenthesized so the text
//! always reads back with the same structure.

use std::fmt::{self, Display, Formatter, Write};

use crate::node::{Function, FunctionArg, FutureNode, Junction, Leaf, Literal, Node};

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => {
                f.write_char('\'')?;
                for c in s.chars() {
                    if c == '\'' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('\'')
            }
            Self::Integer(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl Display for Leaf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.symbol(), self.literal)
    }
}

impl Display for FunctionArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Literal(lit) => lit.fmt(f),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}(", self.namespace, self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            arg.fmt(f)?;
        }
        f.write_char(')')
    }
}

impl Display for Junction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() {
            return f.write_str("()");
        }
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.kind)?;
            }
            if matches!(child, Node::Junction(_)) {
                write!(f, "({child})")?;
            } else {
                child.fmt(f)?;
            }
        }
        Ok(())
    }
}

impl Display for FutureNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.resolved {
            Some(resolved) => resolved.fmt(f),
            None => write!(f, "future#{}[{}]", self.id, self.original),
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(leaf) => leaf.fmt(f),
            Self::Function(func) => func.fmt(f),
            Self::Junction(junction) => junction.fmt(f),
            Self::Not(child) => match child.as_ref() {
                Self::Group(_) => write!(f, "!{child}"),
                _ => write!(f, "!({child})"),
            },
            Self::Group(child) => write!(f, "({child})"),
            Self::Future(future) => future.fmt(f),
            Self::Empty => f.write_str("false"),
        }
    }
}
