//! Operator enums shared by expression and statement nodes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            LogAnd => "&&",
            LogOr => "||",
            Eq => "==",
            Neq => "!=",
            Lt => "<",
            Leq => "<=",
            Gt => ">",
            Geq => ">=",
            Shl => "<<",
            Shr => ">>",
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            BinaryOp::LogAnd
                | BinaryOp::LogOr
                | BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Leq
                | BinaryOp::Gt
                | BinaryOp::Geq
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    LogNot,
    BitNot,
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    ReduceNand,
    ReduceNor,
    ReduceXnor,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        use UnaryOp::*;
        match self {
            Neg => "-",
            LogNot => "!",
            BitNot => "~",
            ReduceAnd => "&",
            ReduceOr => "|",
            ReduceXor => "^",
            ReduceNand => "~&",
            ReduceNor => "~|",
            ReduceXnor => "~^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Posedge,
    Negedge,
    /// Level-sensitive `@(*)`/`@(signal)` with no explicit edge; always
    /// constructs using these are combinational and are never machinified.
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseKind {
    Case,
    Casex,
    Casez,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}
