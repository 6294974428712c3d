//! Constant folding over [`BitVector`](super::bits::BitVector)s: resolves
//! parameter references through [`Resolve`](super::resolve::Resolve)'s
//! cache and folds the arithmetic, bitwise, comparison, reduction, and
//! concatenation operators an HDL expression can be built from.

use thiserror::Error;

use crate::ast::node::IdentifierNode;
use crate::ast::ops::{BinaryOp, UnaryOp};
use crate::ast::{Arena, Bits, NodeId, NodeKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("`{0}` is not a constant expression")]
    NotConstant(String),
    #[error("identifier `{0}` has not been resolved")]
    Unresolved(String),
    #[error("division by zero")]
    DivByZero,
    #[error("concatenation width exceeds {0} bits")]
    WidthOverflow(u32),
}

/// Stateless constant-expression evaluator.
pub struct Evaluate;

impl Evaluate {
    pub fn eval(arena: &Arena, id: NodeId) -> Result<Bits, EvalError> {
        match arena.kind(id) {
            NodeKind::Number(n) => Ok(n.value),
            NodeKind::Identifier(n) => Self::eval_identifier(arena, n),
            NodeKind::BinaryExpr(b) => {
                let lhs = Self::eval(arena, b.lhs)?;
                let rhs = Self::eval(arena, b.rhs)?;
                Self::eval_binary(b.op, &lhs, &rhs)
            }
            NodeKind::UnaryExpr(u) => {
                let v = Self::eval(arena, u.operand)?;
                Ok(Self::eval_unary(u.op, &v))
            }
            NodeKind::ConcatExpr(c) => {
                let parts = c
                    .exprs
                    .iter()
                    .map(|&e| Self::eval(arena, e))
                    .collect::<Result<Vec<_>, _>>()?;
                Bits::concat(&parts).ok_or(EvalError::WidthOverflow(Bits::MAX_WIDTH))
            }
            NodeKind::ConditionalExpr(c) => {
                let cond = Self::eval(arena, c.cond)?;
                if cond.as_bool() {
                    Self::eval(arena, c.then_branch)
                } else {
                    Self::eval(arena, c.else_branch)
                }
            }
            _ => Err(EvalError::NotConstant(format!("{id}"))),
        }
    }

    fn eval_identifier(arena: &Arena, n: &IdentifierNode) -> Result<Bits, EvalError> {
        let decl = n
            .resolution
            .get()
            .ok_or_else(|| EvalError::Unresolved(n.name.clone()))?;
        match arena.kind(decl) {
            NodeKind::ParamDeclaration(p) => Self::eval(arena, p.value),
            NodeKind::GenvarDeclaration(g) => Err(EvalError::NotConstant(g.name.clone())),
            _ => Err(EvalError::NotConstant(n.name.clone())),
        }
    }

    fn eval_binary(op: BinaryOp, lhs: &Bits, rhs: &Bits) -> Result<Bits, EvalError> {
        use BinaryOp::*;
        Ok(match op {
            Add => lhs.add(rhs),
            Sub => lhs.sub(rhs),
            Mul => lhs.mul(rhs),
            Div => lhs.div(rhs).ok_or(EvalError::DivByZero)?,
            Mod => lhs.rem(rhs).ok_or(EvalError::DivByZero)?,
            BitAnd => lhs.bitand(rhs),
            BitOr => lhs.bitor(rhs),
            BitXor => lhs.bitxor(rhs),
            LogAnd => Bits::truthy(1, lhs.as_bool() && rhs.as_bool()),
            LogOr => Bits::truthy(1, lhs.as_bool() || rhs.as_bool()),
            Eq => Bits::truthy(1, lhs.eq_value(rhs)),
            Neq => Bits::truthy(1, !lhs.eq_value(rhs)),
            Lt => Bits::truthy(1, lhs.compare(rhs) == std::cmp::Ordering::Less),
            Leq => Bits::truthy(1, lhs.compare(rhs) != std::cmp::Ordering::Greater),
            Gt => Bits::truthy(1, lhs.compare(rhs) == std::cmp::Ordering::Greater),
            Geq => Bits::truthy(1, lhs.compare(rhs) != std::cmp::Ordering::Less),
            Shl => lhs.shl(rhs.to_u64() as u32),
            Shr => lhs.shr(rhs.to_u64() as u32),
        })
    }

    fn eval_unary(op: UnaryOp, v: &Bits) -> Bits {
        use UnaryOp::*;
        match op {
            Neg => v.negate(),
            LogNot => Bits::truthy(1, !v.as_bool()),
            BitNot => v.bitnot(),
            ReduceAnd => Bits::truthy(1, v.reduce_and()),
            ReduceOr => Bits::truthy(1, v.reduce_or()),
            ReduceXor => Bits::truthy(1, v.reduce_xor()),
            ReduceNand => Bits::truthy(1, v.reduce_nand()),
            ReduceNor => Bits::truthy(1, v.reduce_nor()),
            ReduceXnor => Bits::truthy(1, v.reduce_xnor()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;
    use crate::ast::ops::BinaryOp;

    #[test]
    fn folds_arithmetic() {
        let mut arena = Arena::new();
        let a = builders::number(&mut arena, 8, 3);
        let b = builders::number(&mut arena, 8, 4);
        let sum = builders::binary(&mut arena, BinaryOp::Add, a, b);
        let result = Evaluate::eval(&arena, sum).unwrap();
        assert_eq!(result.to_u64(), 7);
    }

    #[test]
    fn folds_through_resolved_parameter() {
        let mut arena = Arena::new();
        let width_lit = builders::number(&mut arena, 32, 8);
        let param = builders::param_decl(&mut arena, "WIDTH", width_lit);
        let reference = builders::identifier(&mut arena, "WIDTH");
        if let NodeKind::Identifier(n) = &arena.kind(reference) {
            n.resolution.set(Some(param));
        }
        let result = Evaluate::eval(&arena, reference).unwrap();
        assert_eq!(result.to_u64(), 8);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut arena = Arena::new();
        let a = builders::number(&mut arena, 8, 10);
        let z = builders::number(&mut arena, 8, 0);
        let expr = builders::binary(&mut arena, BinaryOp::Div, a, z);
        assert_eq!(Evaluate::eval(&arena, expr), Err(EvalError::DivByZero));
    }
}
