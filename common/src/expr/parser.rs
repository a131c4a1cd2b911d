use crate::expr::ast::{
    AggFunc, CmpOp, Expr, Literal, Mask, NumberFormat, Segment, Step, Template, TextMethod,
};
use std::fmt;

/// Parse failure. Drives the extractor's fallback path; never shown to the
/// asker directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

type PResult<T> = Result<T, ParseError>;

fn err<T>(msg: impl Into<String>) -> PResult<T> {
    Err(ParseError(msg.into()))
}

// ---------------------------------------------------------------------------
// lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    FStr(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Dot,
    Comma,
    Amp,
    Pipe,
    Minus,
    Assign,
    Cmp(CmpOp),
}

fn lex(input: &str) -> PResult<Vec<Tok>> {
    let mut toks = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '&' => {
                toks.push(Tok::Amp);
                i += 1;
            }
            '|' => {
                toks.push(Tok::Pipe);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Cmp(CmpOp::Eq));
                    i += 2;
                } else {
                    toks.push(Tok::Assign);
                    i += 1;
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Cmp(CmpOp::Ne));
                    i += 2;
                } else {
                    return err("unexpected '!'");
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Cmp(CmpOp::Le));
                    i += 2;
                } else {
                    toks.push(Tok::Cmp(CmpOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Cmp(CmpOp::Ge));
                    i += 2;
                } else {
                    toks.push(Tok::Cmp(CmpOp::Gt));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let (text, next) = lex_string(&chars, i, c)?;
                toks.push(Tok::Str(text));
                i = next;
            }
            'f' if matches!(chars.get(i + 1), Some('\'') | Some('"')) => {
                let quote = chars[i + 1];
                let (text, next) = lex_string(&chars, i + 1, quote)?;
                toks.push(Tok::FStr(text));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    if chars[i] == '.' {
                        if is_float {
                            break;
                        }
                        is_float = true;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    match text.parse::<f64>() {
                        Ok(f) => toks.push(Tok::Float(f)),
                        Err(_) => return err(format!("bad number '{}'", text)),
                    }
                } else {
                    match text.parse::<i64>() {
                        Ok(n) => toks.push(Tok::Int(n)),
                        Err(_) => return err(format!("bad number '{}'", text)),
                    }
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => return err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(toks)
}

/// Reads a quoted string starting at `start` (the opening quote). Returns the
/// unescaped text and the index just past the closing quote.
fn lex_string(chars: &[char], start: usize, quote: char) -> PResult<(String, usize)> {
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = match chars.get(i + 1) {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('\\') => '\\',
                    Some('\'') => '\'',
                    Some('"') => '"',
                    _ => return err("bad escape in string literal"),
                };
                text.push(escaped);
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }

    err("unterminated string literal")
}

// ---------------------------------------------------------------------------
// parser
// ---------------------------------------------------------------------------

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Tok, what: &str) -> PResult<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            err(format!("expected {}", what))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.next() {
            Some(Tok::Ident(name)) => Ok(name),
            _ => err("expected identifier"),
        }
    }

    fn expect_str(&mut self, what: &str) -> PResult<String> {
        match self.next() {
            Some(Tok::Str(s)) => Ok(s),
            _ => err(format!("expected string literal for {}", what)),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }
}

/// Parse one candidate expression. The whole input must be consumed; trailing
/// prose is a parse error so the extractor falls back to pattern recovery.
pub fn parse_expression(input: &str) -> PResult<Expr> {
    let toks = lex(input)?;
    if toks.is_empty() {
        return err("empty expression");
    }

    let mut parser = Parser { toks, pos: 0 };

    let expr = match parser.peek() {
        Some(Tok::Str(_)) => {
            let Some(Tok::Str(text)) = parser.next() else {
                unreachable!()
            };
            Expr::Literal(Template::plain(text))
        }
        Some(Tok::FStr(_)) => {
            let Some(Tok::FStr(inner)) = parser.next() else {
                unreachable!()
            };
            Expr::Literal(parse_template(&inner)?)
        }
        Some(Tok::Ident(name)) if name == "len" => {
            parser.pos += 1;
            parser.expect(Tok::LParen, "'(' after len")?;
            let steps = parse_chain(&mut parser)?;
            parser.expect(Tok::RParen, "')' after len(...)")?;
            Expr::Len(steps)
        }
        Some(Tok::Ident(name)) if name == "df" => Expr::Chain(parse_chain(&mut parser)?),
        _ => return err("expression must start with df, len(df), or a string literal"),
    };

    if !parser.at_end() {
        return err("trailing input after expression");
    }

    Ok(expr)
}

/// `df` followed by any number of index/method steps.
fn parse_chain(parser: &mut Parser) -> PResult<Vec<Step>> {
    match parser.next() {
        Some(Tok::Ident(name)) if name == "df" => {}
        _ => return err("chain must start with df"),
    }

    let mut steps = Vec::new();
    loop {
        match parser.peek() {
            Some(Tok::Dot) => {
                parser.pos += 1;
                steps.push(parse_method(parser)?);
            }
            Some(Tok::LBracket) => {
                parser.pos += 1;
                if matches!(parser.peek(), Some(Tok::Str(_))) {
                    let column = parser.expect_str("column name")?;
                    parser.expect(Tok::RBracket, "']' after column name")?;
                    steps.push(Step::Select(column));
                } else {
                    let mask = parse_mask(parser)?;
                    parser.expect(Tok::RBracket, "']' after filter")?;
                    steps.push(Step::Filter(mask));
                }
            }
            _ => break,
        }
    }

    Ok(steps)
}

fn parse_method(parser: &mut Parser) -> PResult<Step> {
    let name = parser.expect_ident()?;
    match name.as_str() {
        "query" => {
            parser.expect(Tok::LParen, "'(' after query")?;
            let condition = parser.expect_str("query condition")?;
            parser.expect(Tok::RParen, "')' after query condition")?;
            Ok(Step::Filter(parse_condition(&condition)?))
        }
        "head" => {
            parser.expect(Tok::LParen, "'(' after head")?;
            let n = match parser.peek() {
                Some(Tok::Int(n)) => {
                    let n = *n;
                    parser.pos += 1;
                    if n < 0 {
                        return err("head() takes a non-negative count");
                    }
                    n as usize
                }
                _ => 5,
            };
            parser.expect(Tok::RParen, "')' after head")?;
            Ok(Step::Head(n))
        }
        "value_counts" => {
            empty_call(parser, "value_counts")?;
            Ok(Step::ValueCounts)
        }
        "reset_index" => {
            empty_call(parser, "reset_index")?;
            Ok(Step::ResetIndex)
        }
        "tolist" | "to_list" => {
            empty_call(parser, "tolist")?;
            Ok(Step::ToList)
        }
        "max" => {
            empty_call(parser, "max")?;
            Ok(Step::Agg(AggFunc::Max))
        }
        "min" => {
            empty_call(parser, "min")?;
            Ok(Step::Agg(AggFunc::Min))
        }
        "mean" => {
            empty_call(parser, "mean")?;
            Ok(Step::Agg(AggFunc::Mean))
        }
        "sum" => {
            empty_call(parser, "sum")?;
            Ok(Step::Agg(AggFunc::Sum))
        }
        "count" => {
            empty_call(parser, "count")?;
            Ok(Step::Agg(AggFunc::Count))
        }
        "nunique" => {
            empty_call(parser, "nunique")?;
            Ok(Step::Agg(AggFunc::Nunique))
        }
        other => err(format!("unsupported method '.{}()'", other)),
    }
}

fn empty_call(parser: &mut Parser, name: &str) -> PResult<()> {
    parser.expect(Tok::LParen, &format!("'(' after {}", name))?;
    parser.expect(Tok::RParen, &format!("')' after {}(", name))?;
    Ok(())
}

/// Bracket-style masks: `df['col'].str.contains('x', na=False)`,
/// `df['col'] > 10`, combinable with `&`/`|` and parentheses.
fn parse_mask(parser: &mut Parser) -> PResult<Mask> {
    let mut left = parse_mask_and(parser)?;
    while parser.eat(&Tok::Pipe) {
        let right = parse_mask_and(parser)?;
        left = Mask::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_mask_and(parser: &mut Parser) -> PResult<Mask> {
    let mut left = parse_mask_atom(parser)?;
    while parser.eat(&Tok::Amp) {
        let right = parse_mask_atom(parser)?;
        left = Mask::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_mask_atom(parser: &mut Parser) -> PResult<Mask> {
    if parser.eat(&Tok::LParen) {
        let mask = parse_mask(parser)?;
        parser.expect(Tok::RParen, "')' in filter")?;
        return Ok(mask);
    }

    match parser.next() {
        Some(Tok::Ident(name)) if name == "df" => {}
        _ => return err("filter predicate must start with df['column']"),
    }
    parser.expect(Tok::LBracket, "'[' after df")?;
    let column = parser.expect_str("column name")?;
    parser.expect(Tok::RBracket, "']' after column name")?;

    if parser.eat(&Tok::Dot) {
        let str_ns = parser.expect_ident()?;
        if str_ns != "str" {
            return err(format!("unsupported accessor '.{}'", str_ns));
        }
        parser.expect(Tok::Dot, "'.' after str")?;
        let method = match parser.expect_ident()?.as_str() {
            "contains" => TextMethod::Contains,
            "startswith" => TextMethod::StartsWith,
            "endswith" => TextMethod::EndsWith,
            other => return err(format!("unsupported str method '{}'", other)),
        };
        parser.expect(Tok::LParen, "'(' after str method")?;
        let needle = parser.expect_str("search text")?;
        // optional `, na=False`, accepted and implied either way
        if parser.eat(&Tok::Comma) {
            let kw = parser.expect_ident()?;
            if kw != "na" {
                return err(format!("unsupported keyword argument '{}'", kw));
            }
            parser.expect(Tok::Assign, "'=' after na")?;
            let value = parser.expect_ident()?;
            if value != "False" && value != "True" {
                return err("na expects True or False");
            }
        }
        parser.expect(Tok::RParen, "')' after str method")?;
        return Ok(Mask::Text {
            column,
            method,
            needle,
        });
    }

    let op = match parser.next() {
        Some(Tok::Cmp(op)) => op,
        _ => return err("expected comparison after df['column']"),
    };
    let value = parse_literal(parser)?;
    Ok(Mask::Compare { column, op, value })
}

fn parse_literal(parser: &mut Parser) -> PResult<Literal> {
    let negative = parser.eat(&Tok::Minus);
    match parser.next() {
        Some(Tok::Int(n)) => Ok(Literal::Int(if negative { -n } else { n })),
        Some(Tok::Float(f)) => Ok(Literal::Float(if negative { -f } else { f })),
        Some(Tok::Str(s)) if !negative => Ok(Literal::Str(s)),
        Some(Tok::Ident(name)) if !negative && (name == "True" || name == "true") => {
            Ok(Literal::Bool(true))
        }
        Some(Tok::Ident(name)) if !negative && (name == "False" || name == "false") => {
            Ok(Literal::Bool(false))
        }
        _ => err("expected a number, string, or boolean literal"),
    }
}

// ---------------------------------------------------------------------------
// query('...') conditions
// ---------------------------------------------------------------------------

/// Conditions inside `df.query('...')`: comparisons joined by `and`/`or`,
/// python precedence (and binds tighter).
fn parse_condition(condition: &str) -> PResult<Mask> {
    let toks = lex(condition)?;
    if toks.is_empty() {
        return err("empty query condition");
    }
    let mut parser = Parser { toks, pos: 0 };
    let mask = parse_cond_or(&mut parser)?;
    if !parser.at_end() {
        return err("trailing input in query condition");
    }
    Ok(mask)
}

fn parse_cond_or(parser: &mut Parser) -> PResult<Mask> {
    let mut left = parse_cond_and(parser)?;
    while matches!(parser.peek(), Some(Tok::Ident(w)) if w == "or") {
        parser.pos += 1;
        let right = parse_cond_and(parser)?;
        left = Mask::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_cond_and(parser: &mut Parser) -> PResult<Mask> {
    let mut left = parse_cond_atom(parser)?;
    while matches!(parser.peek(), Some(Tok::Ident(w)) if w == "and") {
        parser.pos += 1;
        let right = parse_cond_atom(parser)?;
        left = Mask::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_cond_atom(parser: &mut Parser) -> PResult<Mask> {
    if parser.eat(&Tok::LParen) {
        let mask = parse_cond_or(parser)?;
        parser.expect(Tok::RParen, "')' in query condition")?;
        return Ok(mask);
    }

    // column names may contain spaces after header normalization, so accept
    // a run of identifiers up to the comparison operator
    let mut column = parser.expect_ident()?;
    if column == "and" || column == "or" {
        return err("query condition cannot start with a keyword");
    }
    while let Some(Tok::Ident(word)) = parser.peek() {
        if word == "and" || word == "or" {
            break;
        }
        column.push(' ');
        column.push_str(word);
        parser.pos += 1;
    }

    let op = match parser.next() {
        Some(Tok::Cmp(op)) => op,
        _ => return err("expected comparison in query condition"),
    };
    let value = parse_literal(parser)?;
    Ok(Mask::Compare { column, op, value })
}

// ---------------------------------------------------------------------------
// f-string templates
// ---------------------------------------------------------------------------

fn parse_template(inner: &str) -> PResult<Template> {
    let chars: Vec<char> = inner.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                text.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                text.push('}');
                i += 2;
            }
            '}' => return err("unmatched '}' in f-string"),
            '{' => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                let (placeholder, next) = read_placeholder(&chars, i + 1)?;
                segments.push(parse_placeholder(&placeholder)?);
                i = next;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    if segments.is_empty() {
        segments.push(Segment::Text(String::new()));
    }

    Ok(Template { segments })
}

/// Scans to the matching `}`; quote-aware so needles containing braces do not
/// end the placeholder early.
fn read_placeholder(chars: &[char], start: usize) -> PResult<(String, usize)> {
    let mut text = String::new();
    let mut quote: Option<char> = None;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                text.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    text.push(c);
                }
                '}' => return Ok((text, i + 1)),
                c => text.push(c),
            },
        }
        i += 1;
    }

    err("unterminated placeholder in f-string")
}

fn parse_placeholder(placeholder: &str) -> PResult<Segment> {
    let (expr_text, format) = split_format_spec(placeholder);
    let format = match format {
        Some(spec) => Some(parse_number_format(spec)?),
        None => None,
    };
    let expr = parse_expression(expr_text)?;
    Ok(Segment::Placeholder {
        expr: Box::new(expr),
        format,
    })
}

/// Splits `expr:spec` at the first `:` outside quotes and brackets.
fn split_format_spec(placeholder: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (idx, c) in placeholder.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                ':' if depth == 0 => {
                    return (&placeholder[..idx], Some(&placeholder[idx + 1..]));
                }
                _ => {}
            },
        }
    }

    (placeholder, None)
}

fn parse_number_format(spec: &str) -> PResult<NumberFormat> {
    let mut rest = spec;
    let thousands = if let Some(stripped) = rest.strip_prefix(',') {
        rest = stripped;
        true
    } else {
        false
    };

    let precision = if let Some(stripped) = rest.strip_prefix('.') {
        let digits: String = stripped.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return err(format!("bad format spec '{}'", spec));
        }
        rest = &stripped[digits.len()..];
        Some(digits.parse::<usize>().map_err(|_| {
            ParseError(format!("bad format spec '{}'", spec))
        })?)
    } else {
        None
    };

    if let Some(stripped) = rest.strip_prefix('f') {
        rest = stripped;
    }
    if !rest.is_empty() {
        return err(format!("unsupported format spec '{}'", spec));
    }

    Ok(NumberFormat {
        thousands,
        precision,
    })
}
