//! Template parser
//!
//! The literal layer (escapes and raw text) is walked with [`Scanner`]. Each
//! placeholder body is tokenized up to its closing brace and then parsed
//! with chumsky.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::{lex, Token};
use crate::parser::scanner::Scanner;
use crate::registry::QualifiedRef;

/// Parse template text into an AST
pub fn parse(input: &str) -> Result<Template, ParseError> {
    let mut scanner = Scanner::new(input);
    let mut elements: Vec<Spanned<Element>> = Vec::new();

    while !scanner.eof() {
        let start = scanner.pos();

        if scanner.eat("{{") {
            push_text(&mut elements, "{", start..scanner.pos());
            continue;
        }
        if scanner.eat("}}") {
            push_text(&mut elements, "}", start..scanner.pos());
            continue;
        }
        if scanner.peek(1) == Some("}") {
            return Err(ParseError::syntax(
                start..start + 1,
                "unmatched close brace; a literal `}` should be escaped as `}}`",
            ));
        }
        if scanner.peek(1) == Some("{") {
            let expr = parse_placeholder(&mut scanner)?;
            elements.push(Spanned::new(Element::Expr(expr), start..scanner.pos()));
            continue;
        }

        let text = match scanner.read_until(&['{', '}']) {
            Some(text) => text,
            None => scanner.read_rest(),
        };
        push_text(&mut elements, text, start..scanner.pos());
    }

    Ok(Template { elements })
}

/// Append literal text, merging with a directly preceding literal
fn push_text(elements: &mut Vec<Spanned<Element>>, text: &str, span: std::ops::Range<usize>) {
    if let Some(last) = elements.last_mut() {
        if let Element::RawText(existing) = &mut last.node {
            existing.push_str(text);
            last.span.end = span.end;
            return;
        }
    }
    elements.push(Spanned::new(Element::RawText(text.to_string()), span));
}

/// Parse one `{...}` placeholder, leaving the scanner after its closing brace
fn parse_placeholder(scanner: &mut Scanner<'_>) -> Result<Expr, ParseError> {
    let open = scanner.checkpoint();
    let start = scanner.pos();
    scanner.eat("{");
    let body_start = scanner.pos();

    // Locate the closing brace before parsing anything; a missing brace
    // takes precedence over bad characters in the body
    let mut tokens = Vec::new();
    let mut close = None;
    let mut invalid = None;
    for (token, span) in lex(scanner.rest()) {
        let span = (span.start + body_start)..(span.end + body_start);
        match token {
            Ok(Token::BraceClose) => {
                close = Some(span);
                break;
            }
            Ok(Token::BraceOpen) => {
                return Err(invalid.unwrap_or_else(|| {
                    ParseError::syntax(span, "unexpected `{` inside a placeholder")
                }));
            }
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                invalid.get_or_insert_with(|| {
                    ParseError::syntax(span, "invalid character in placeholder")
                });
            }
        }
    }

    let Some(close) = close else {
        scanner.rewind(open);
        return Err(ParseError::syntax(
            start..scanner.source().len(),
            "unclosed `{`; a literal `{` should be escaped as `{{`",
        ));
    };
    if let Some(err) = invalid {
        return Err(err);
    }

    if tokens.is_empty() {
        return Err(ParseError::syntax(start..close.end, "empty placeholder"));
    }

    let eoi = close.start;
    let token_iter = tokens
        .into_iter()
        .map(|(tok, span)| (tok, SimpleSpan::from(span)));
    let token_stream =
        Stream::from_iter(token_iter).map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    let expr = placeholder_parser(scanner.source())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| {
            errs.into_iter()
                .next()
                .map(ParseError::from)
                .unwrap_or_else(|| ParseError::syntax(start..close.end, "invalid placeholder"))
        })?;

    scanner.advance_to(close.end);
    Ok(expr)
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn placeholder_parser<'a, I>(
    source: &'a str,
) -> impl Parser<'a, I, Expr, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let name_token = select! {
            Token::Ident(s) => s,
        };

        // a:b:c
        let name = name_token
            .clone()
            .separated_by(just(Token::Colon))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(QualifiedRef::new);

        let literal = select! {
            Token::True => LiteralValue::Bool(true),
            Token::False => LiteralValue::Bool(false),
            Token::Number(n) => LiteralValue::Number(n),
            Token::String(s) => LiteralValue::String(s),
        }
        .map_with(move |value, e| {
            let span = span_range(&e.span());
            Literal {
                value,
                raw: source.get(span).unwrap_or_default().to_string(),
            }
        });

        // Anything that is not a literal is a nested expression
        let value = choice((
            literal.map(ArgValue::Literal),
            expr.map(ArgValue::Expr),
        ));

        // `name = value` or `value`
        let arg = name_token
            .then_ignore(just(Token::Equals))
            .or_not()
            .then(value)
            .map_with(|(name, value), e| Spanned::new(Arg { name, value }, span_range(&e.span())));

        let args = arg
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let call = name
            .then(args.or_not())
            .map_with(|(name, args), e| {
                Spanned::new(MappingCall { name, args }, span_range(&e.span()))
            });

        let chain = call
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .try_map(|calls, span| {
                CallChain::from_calls(calls)
                    .ok_or_else(|| Rich::custom(span, "expected mapping name"))
            });

        chain
            .separated_by(just(Token::Pipe))
            .at_least(1)
            .collect::<Vec<_>>()
            .try_map(|arms, span| {
                Expr::from_arms(arms).ok_or_else(|| Rich::custom(span, "expected expression"))
            })
    })
    .then_ignore(end())
}
