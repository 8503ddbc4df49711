/// Binary operators of the generator language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
}

impl BinOp {
    pub fn symbol(&self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
        }
    }
}

/// Parsed generator expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Str(String),
    List(Vec<Expr>),
    Name(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Attr {
        target: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Direct subexpressions
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Int(_) | Expr::Str(_) | Expr::Name(_) => Vec::new(),
            Expr::List(items) => items.iter().collect(),
            Expr::Neg(inner) => vec![&**inner],
            Expr::Binary { left, right, .. } => vec![&**left, &**right],
            Expr::Index { target, index } => vec![&**target, &**index],
            Expr::Slice {
                target,
                start,
                stop,
                step,
            } => std::iter::once(target)
                .chain(start)
                .chain(stop)
                .chain(step)
                .map(|child| &**child)
                .collect(),
            Expr::Attr { target, .. } => vec![&**target],
            Expr::Call { callee, args } => std::iter::once(&**callee).chain(args).collect(),
        }
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn height(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.children().into_iter().map(|child| (child, level + 1)));
        }
        deepest
    }
}
