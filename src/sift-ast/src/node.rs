//! Query tree nodes.
//!
//! A query is an owned tree of [`Node`] values. Every child is owned by exactly
//! one parent, so rewriting passes either consume a tree and return a new one
//! or mutate it through `&mut Node` slots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Field name standing in for "any field" in an unfielded term.
pub const ANY_FIELD: &str = "_ANYFIELD_";

/// Field name given to an unfielded term that the index could not resolve.
pub const NO_FIELD: &str = "_NOFIELD_";

/// A node in a query tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    /// A field comparison, or the sentinel assignment of a marker.
    Leaf(Leaf),

    /// A namespaced function call.
    Function(Function),

    /// An AND or OR over an ordered list of children.
    Junction(Junction),

    /// Logical negation of the child.
    Not(Box<Self>),

    /// Parenthesization. Carries no semantics of its own.
    Group(Box<Self>),

    /// Placeholder for a pending index lookup. Only exists while the
    /// expansion engine is running.
    Future(FutureNode),

    /// The query that matches nothing.
    #[default]
    Empty,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `=~` regex match
    Er,
    /// `!~` regex non-match
    Nr,
    /// `=` assignment, only used by marker sentinels
    Assign,
}

impl CompareOp {
    /// The operator's textual symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Er => "=~",
            Self::Nr => "!~",
            Self::Assign => "=",
        }
    }

    /// The positive form of a negative operator (`!=` to `==`, `!~` to `=~`).
    pub const fn positive(self) -> Option<Self> {
        match self {
            Self::Ne => Some(Self::Eq),
            Self::Nr => Some(Self::Er),
            _ => None,
        }
    }

    /// The negative form of a positive operator.
    pub const fn negative(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Ne),
            Self::Er => Some(Self::Nr),
            _ => None,
        }
    }

    /// Whether this operator is `!=` or `!~`.
    pub const fn is_negative(self) -> bool {
        matches!(self, Self::Ne | Self::Nr)
    }

    /// Whether this operator is a lower bound (`>`, `>=`).
    pub const fn is_lower_bound(self) -> bool {
        matches!(self, Self::Gt | Self::Ge)
    }

    /// Whether this operator is an upper bound (`<`, `<=`).
    pub const fn is_upper_bound(self) -> bool {
        matches!(self, Self::Lt | Self::Le)
    }

    /// Whether this operator matches by pattern.
    pub const fn is_regex(self) -> bool {
        matches!(self, Self::Er | Self::Nr)
    }
}

/// A literal value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Literal {
    /// A string value.
    String(String),
    /// An integer value.
    Integer(i64),
    /// A boolean value.
    Bool(bool),
    /// The null literal.
    Null,
}

impl Literal {
    /// The literal as index text, or `None` for null.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null => None,
        }
    }

    /// Whether this is the null literal.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Leaf {
    /// Field name, possibly [`ANY_FIELD`] or [`NO_FIELD`].
    pub field: String,
    /// Comparison operator.
    pub op: CompareOp,
    /// Right-hand side.
    pub literal: Literal,
}

impl Leaf {
    /// Create a new leaf.
    pub fn new(field: impl Into<String>, op: CompareOp, literal: impl Into<Literal>) -> Self {
        Self {
            field: field.into(),
            op,
            literal: literal.into(),
        }
    }

    /// Whether this leaf targets any field.
    pub fn is_unfielded(&self) -> bool {
        self.field == ANY_FIELD
    }

    /// Whether this leaf is an unresolved unfielded term.
    pub fn is_no_field(&self) -> bool {
        self.field == NO_FIELD
    }

    /// Whether this leaf is a marker-style assignment.
    pub fn is_assignment(&self) -> bool {
        self.op == CompareOp::Assign
    }

    /// A copy of this leaf targeting another field.
    #[must_use]
    pub fn with_field(&self, field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: self.op,
            literal: self.literal.clone(),
        }
    }
}

/// An argument passed to a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionArg {
    /// A field reference.
    Field(String),
    /// A literal value.
    Literal(Literal),
}

/// A namespaced function call such as `filter:includeRegex(F, '.*')`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Function {
    /// Function namespace.
    pub namespace: String,
    /// Function name.
    pub name: String,
    /// Arguments in call order.
    pub args: Vec<FunctionArg>,
}

impl Function {
    /// Create a new function call.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        args: Vec<FunctionArg>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            args,
        }
    }

    /// Fields referenced by this function's arguments.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            FunctionArg::Field(f) => Some(f.as_str()),
            FunctionArg::Literal(_) => None,
        })
    }
}

/// Junction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JunctionKind {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}

impl JunctionKind {
    /// The opposite junction kind.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }

    /// The junction operator symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

impl fmt::Display for JunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An AND or OR node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Junction {
    /// Junction kind.
    pub kind: JunctionKind,
    /// Children, in rendering order.
    pub children: Vec<Node>,
}

impl Junction {
    /// Create a junction.
    pub fn new(kind: JunctionKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }
}

/// A pending index lookup standing in for its original node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FutureNode {
    /// Submission sequence number within one expansion call.
    pub id: usize,
    /// Display form of the lookup this placeholder waits on.
    pub key: String,
    /// The node being expanded.
    pub original: Box<Node>,
    /// Whether the node sits under an odd number of negations.
    pub negated: bool,
    /// Drop composite fields from the replacement.
    pub ignore_composites: bool,
    /// Include the original node in the replacement.
    pub keep_original: bool,
    /// The replacement, once resolved.
    pub resolved: Option<Box<Node>>,
}

impl Node {
    // ========== Constructors ==========

    /// Create a comparison leaf.
    pub fn leaf(field: impl Into<String>, op: CompareOp, literal: impl Into<Literal>) -> Self {
        Self::Leaf(Leaf::new(field, op, literal))
    }

    /// `field == literal`
    pub fn eq(field: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::leaf(field, CompareOp::Eq, literal)
    }

    /// `field != literal`
    pub fn ne(field: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::leaf(field, CompareOp::Ne, literal)
    }

    /// `field < literal`
    pub fn lt(field: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::leaf(field, CompareOp::Lt, literal)
    }

    /// `field <= literal`
    pub fn le(field: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::leaf(field, CompareOp::Le, literal)
    }

    /// `field > literal`
    pub fn gt(field: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::leaf(field, CompareOp::Gt, literal)
    }

    /// `field >= literal`
    pub fn ge(field: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::leaf(field, CompareOp::Ge, literal)
    }

    /// `field =~ pattern`
    pub fn er(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::Er, Literal::String(pattern.into()))
    }

    /// `field !~ pattern`
    pub fn nr(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::Nr, Literal::String(pattern.into()))
    }

    /// `name = true`, the sentinel of a marker.
    pub fn assignment(name: impl Into<String>) -> Self {
        Self::leaf(name, CompareOp::Assign, true)
    }

    /// A function call.
    pub fn function(
        namespace: impl Into<String>,
        name: impl Into<String>,
        args: Vec<FunctionArg>,
    ) -> Self {
        Self::Function(Function::new(namespace, name, args))
    }

    /// A conjunction of `children`.
    pub fn and(children: Vec<Self>) -> Self {
        Self::Junction(Junction::new(JunctionKind::And, children))
    }

    /// A disjunction of `children`.
    pub fn or(children: Vec<Self>) -> Self {
        Self::Junction(Junction::new(JunctionKind::Or, children))
    }

    /// A junction of the given kind.
    pub fn junction(kind: JunctionKind, children: Vec<Self>) -> Self {
        Self::Junction(Junction::new(kind, children))
    }

    /// The negation of `child`.
    pub fn not(child: Self) -> Self {
        Self::Not(Box::new(child))
    }

    /// `child` in parentheses.
    pub fn group(child: Self) -> Self {
        Self::Group(Box::new(child))
    }

    // ========== Convenience builders ==========

    /// `self && other`
    #[must_use]
    pub fn and_with(self, other: Self) -> Self {
        Self::and(vec![self, other])
    }

    /// `self || other`
    #[must_use]
    pub fn or_with(self, other: Self) -> Self {
        Self::or(vec![self, other])
    }

    /// `!(self)`
    #[must_use]
    pub fn negate(self) -> Self {
        Self::not(self)
    }

    /// `(self)`
    #[must_use]
    pub fn grouped(self) -> Self {
        Self::group(self)
    }

    // ========== Inspection ==========

    /// Strip any number of enclosing groupings.
    pub fn peel(&self) -> &Self {
        let mut node = self;
        while let Self::Group(inner) = node {
            node = inner;
        }
        node
    }

    /// Strip any number of enclosing groupings, taking ownership.
    pub fn into_peeled(self) -> Self {
        let mut node = self;
        while let Self::Group(inner) = node {
            node = *inner;
        }
        node
    }

    /// The junction under any groupings, if there is one.
    pub fn as_junction(&self) -> Option<&Junction> {
        match self.peel() {
            Self::Junction(j) => Some(j),
            _ => None,
        }
    }

    /// The leaf under any groupings, if there is one.
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self.peel() {
            Self::Leaf(l) => Some(l),
            _ => None,
        }
    }

    /// Whether this node, ignoring groupings, is a junction of `kind`.
    pub fn is_junction_of(&self, kind: JunctionKind) -> bool {
        self.as_junction().is_some_and(|j| j.kind == kind)
    }

    /// Whether this node, ignoring groupings, is a marker assignment.
    pub fn is_assignment(&self) -> bool {
        self.as_leaf().is_some_and(Leaf::is_assignment)
    }

    /// Direct children of this node.
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Junction(j) => &j.children,
            Self::Not(child) | Self::Group(child) => std::slice::from_ref(child.as_ref()),
            Self::Future(f) => std::slice::from_ref(f.original.as_ref()),
            Self::Leaf(_) | Self::Function(_) | Self::Empty => &[],
        }
    }

    /// Collect every field referenced in this subtree, in visit order.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        collect_fields(self, &mut fields);
        fields
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Self::size).sum::<usize>()
    }

    /// Whether any `Future` placeholder remains in this subtree.
    pub fn contains_future(&self) -> bool {
        matches!(self, Self::Future(_)) || self.children().iter().any(Self::contains_future)
    }
}

/// Recursively collect field names.
fn collect_fields<'a>(node: &'a Node, out: &mut Vec<&'a str>) {
    match node {
        Node::Leaf(leaf) if !leaf.is_assignment() => out.push(&leaf.field),
        Node::Function(func) => out.extend(func.fields()),
        _ => {
            for child in node.children() {
                collect_fields(child, out);
            }
        }
    }
}
