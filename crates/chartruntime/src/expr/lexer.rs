use chartcore::EvalError;
use logos::Logos;

/// Token set for the expression grammar
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""[^"]*""#, |lex| strip_quotes(lex.slice()))]
    #[regex(r#"'[^']*'"#, |lex| strip_quotes(lex.slice()))]
    Str(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token("<")]
    Lt,
    #[token(">=")]
    Ge,
    #[token(">")]
    Gt,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

fn strip_quotes(slice: &str) -> String {
    slice[1..slice.len() - 1].to_string()
}

/// Tokenize an expression, mapping lexer failures to `EvalError::Parse`.
pub fn tokenize(text: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(text).spanned() {
        match result {
            Ok(token) => tokens.push(token),
            Err(_) => {
                return Err(EvalError::Parse {
                    text: text.to_string(),
                    reason: format!("unexpected character at position {}", span.start),
                });
            }
        }
    }
    Ok(tokens)
}
