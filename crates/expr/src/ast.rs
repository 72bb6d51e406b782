#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Variable(String),
    /// Comma operator; an empty list is the empty sequence `()`.
    Sequence(Vec<Expr>),
    If { condition: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Comparison { op: ComparisonOp, left: Box<Expr>, right: Box<Expr> },
    Range { from: Box<Expr>, to: Box<Expr> },
    Arithmetic { op: ArithmeticOp, left: Box<Expr>, right: Box<Expr> },
    Negate(Box<Expr>),
    FunctionCall { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Visits every variable reference in evaluation order.
    pub fn visit_variables<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Literal(_) => {}
            Expr::Variable(name) => visit(name),
            Expr::Sequence(items) => items.iter().for_each(|e| e.visit_variables(visit)),
            Expr::FunctionCall { args, .. } => args.iter().for_each(|e| e.visit_variables(visit)),
            Expr::If { condition, then_branch, else_branch } => {
                condition.visit_variables(visit);
                then_branch.visit_variables(visit);
                else_branch.visit_variables(visit);
            }
            Expr::Logical { left, right, .. }
            | Expr::Comparison { left, right, .. }
            | Expr::Arithmetic { left, right, .. } => {
                left.visit_variables(visit);
                right.visit_variables(visit);
            }
            Expr::Range { from, to } => {
                from.visit_variables(visit);
                to.visit_variables(visit);
            }
            Expr::Negate(inner) => inner.visit_variables(visit),
        }
    }
}
