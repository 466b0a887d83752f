use chumsky::prelude::*;
use chumsky::{BoxedParser, Stream};

use crate::ast::{BinaryOp, Expr, Toplevel};
use crate::lexer::{Span, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    pub message: String,
    pub span: Span,
}

impl From<Simple<TokenKind>> for ParserError {
    fn from(value: Simple<TokenKind>) -> Self {
        let span_range = value.span();
        let span = Span::new(span_range.start, span_range.end);
        let message = value.found().map_or_else(
            || "unexpected end of input".to_string(),
            |found| format!("unexpected token {found}"),
        );
        Self { message, span }
    }
}

pub fn parse(tokens: &[Token]) -> Result<Toplevel, Vec<ParserError>> {
    let end = tokens.last().map_or(0, |token| token.span.end());
    let stream = Stream::from_iter(
        end..end + 1,
        tokens
            .iter()
            .cloned()
            .map(|token| (token.kind, token.span.into())),
    );

    toplevel_parser()
        .parse(stream)
        .map_err(|errors| errors.into_iter().map(ParserError::from).collect())
}

fn toplevel_parser() -> impl Parser<TokenKind, Toplevel, Error = Simple<TokenKind>> {
    let definition = just(TokenKind::Node)
        .ignore_then(identifier_parser())
        .then_ignore(just(TokenKind::Equals))
        .then(expr_parser())
        .map(|(name, expr)| Toplevel::Node { name, expr });

    definition
        .or(expr_parser().map(Toplevel::Expression))
        .then_ignore(end())
}

fn identifier_parser() -> impl Parser<TokenKind, String, Error = Simple<TokenKind>> + Clone {
    select! { TokenKind::Identifier(name) => name }
}

fn expr_parser() -> impl Parser<TokenKind, Expr, Error = Simple<TokenKind>> + Clone {
    recursive(|expr| {
        let literal = select! {
            TokenKind::Integer(value) => Expr::Int(value),
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
        };

        let reference = identifier_parser()
            .then(just(TokenKind::AtLast).or_not())
            .map(|(name, last)| {
                if last.is_some() {
                    Expr::Last(name)
                } else {
                    Expr::Identifier(name)
                }
            });

        let conditional = just(TokenKind::If)
            .ignore_then(expr.clone())
            .then_ignore(just(TokenKind::Then))
            .then(expr.clone())
            .then_ignore(just(TokenKind::Else))
            .then(expr.clone())
            .map(|((cond, then), otherwise)| Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });

        let atom = literal
            .or(reference)
            .or(conditional)
            .or(expr.delimited_by(just(TokenKind::LParen), just(TokenKind::RParen)));

        let unary = just(TokenKind::Minus)
            .repeated()
            .then(atom)
            .foldr(|_, operand| Expr::Negate(Box::new(operand)))
            .boxed();

        let product = unary
            .clone()
            .then(
                select! {
                    TokenKind::Star => BinaryOp::Mul,
                    TokenKind::Slash => BinaryOp::Div,
                    TokenKind::Percent => BinaryOp::Mod,
                }
                .then(unary)
                .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs));

        let sum = product
            .clone()
            .then(
                select! {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Sub,
                }
                .then(product)
                .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs));

        let shift = sum
            .clone()
            .then(
                select! {
                    TokenKind::Shl => BinaryOp::Shl,
                    TokenKind::Shr => BinaryOp::Shr,
                }
                .then(sum)
                .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
            .boxed();

        let comparison = shift
            .clone()
            .then(
                select! {
                    TokenKind::Lt => BinaryOp::Lt,
                    TokenKind::LtEq => BinaryOp::LtEq,
                    TokenKind::Gt => BinaryOp::Gt,
                    TokenKind::GtEq => BinaryOp::GtEq,
                }
                .then(shift)
                .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs));

        let equality = comparison
            .clone()
            .then(
                select! {
                    TokenKind::EqEq => BinaryOp::Eq,
                    TokenKind::NotEq => BinaryOp::NotEq,
                }
                .then(comparison)
                .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
            .boxed();

        let bit_and = left_assoc(equality, TokenKind::Amp, BinaryOp::BitAnd);
        let bit_xor = left_assoc(bit_and, TokenKind::Caret, BinaryOp::BitXor);
        let bit_or = left_assoc(bit_xor, TokenKind::Pipe, BinaryOp::BitOr);
        let and = left_assoc(bit_or, TokenKind::AmpAmp, BinaryOp::And);
        left_assoc(and, TokenKind::PipePipe, BinaryOp::Or)
    })
}

type BoxedExpr<'a> = BoxedParser<'a, TokenKind, Expr, Simple<TokenKind>>;

fn left_assoc<'a>(operand: BoxedExpr<'a>, token: TokenKind, op: BinaryOp) -> BoxedExpr<'a> {
    operand
        .clone()
        .then(just(token).to(op).then(operand).repeated())
        .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::ast::{BinaryOp, Expr, Toplevel};
    use crate::lexer::tokenize;

    fn parse_line(source: &str) -> Toplevel {
        let tokens = tokenize(source).expect("tokenization should succeed");
        parse(&tokens).expect("parsing should succeed")
    }

    #[test]
    fn parse_node_definition() {
        match parse_line("node out0 = in0 + 1") {
            Toplevel::Node { name, expr } => {
                assert_eq!(name, "out0");
                assert_eq!(
                    expr,
                    Expr::binary(
                        BinaryOp::Add,
                        Expr::Identifier("in0".to_string()),
                        Expr::Int(1)
                    )
                );
            }
            other => panic!("expected node definition, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        match parse_line("1 + 2 * 3") {
            Toplevel::Expression(expr) => assert_eq!(expr.to_string(), "(1 + (2 * 3))"),
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn comparison_and_logic_precedence() {
        match parse_line("a < 1 || b@last == 2 && c") {
            Toplevel::Expression(expr) => {
                assert_eq!(expr.to_string(), "((a < 1) || ((b@last == 2) && c))");
                assert_eq!(expr.dependencies(), vec!["a", "c"]);
                assert_eq!(expr.last_references(), vec!["b"]);
            }
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn conditional_and_negation() {
        match parse_line("if x > 0 then -x else (x - 1)") {
            Toplevel::Expression(expr) => {
                assert_eq!(expr.to_string(), "(if (x > 0) then -x else (x - 1))");
            }
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let tokens = tokenize("1 2").expect("tokenization should succeed");
        let errors = parse(&tokens).expect_err("should not parse");
        assert!(!errors.is_empty());
    }

    #[test]
    fn empty_line_is_rejected() {
        let errors = parse(&[]).expect_err("should not parse");
        assert!(errors[0].message.contains("end of input"));
    }
}
