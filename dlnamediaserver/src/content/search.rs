//! `SearchCriteria` du ContentDirectory.
//!
//! ```text
//! searchCrit  ::= '*' | searchExp
//! searchExp   ::= relExp | searchExp ('and' | 'or') searchExp | '(' searchExp ')'
//! relExp      ::= property binOp "value" | property 'exists' ('true' | 'false')
//! binOp       ::= '=' | '!=' | '<' | '<=' | '>' | '>=' | 'contains'
//!               | 'doesNotContain' | 'derivedfrom'
//! ```
//!
//! `and` lie plus fort que `or`. Les comparaisons de chaînes ignorent la casse ;
//! deux valeurs entières sont comparées numériquement.

use std::cmp::Ordering;

use dlnaupnp::actions::ActionError;

use super::MediaItem;

pub(crate) const SEARCH_CAPABILITIES: &str =
    "dc:title,dc:creator,dc:date,upnp:class,upnp:genre,upnp:album,upnp:artist,upnp:originalTrackNumber,res";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    DoesNotContain,
    DerivedFrom,
    Exists,
}

/// Critère de recherche analysé.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// `*` : tous les objets
    All,
    Relation {
        property: String,
        op: Operator,
        value: String,
    },
    And(Box<SearchCriteria>, Box<SearchCriteria>),
    Or(Box<SearchCriteria>, Box<SearchCriteria>),
}

impl SearchCriteria {
    /// Analyse un `SearchCriteria` ; une chaîne vide vaut `*`.
    pub fn parse(input: &str) -> Result<Self, ActionError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() || tokens == [Token::Word("*".to_string())] {
            return Ok(SearchCriteria::All);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let criteria = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(invalid(input));
        }
        Ok(criteria)
    }

    pub fn matches(&self, item: &MediaItem) -> bool {
        match self {
            SearchCriteria::All => true,
            SearchCriteria::And(a, b) => a.matches(item) && b.matches(item),
            SearchCriteria::Or(a, b) => a.matches(item) || b.matches(item),
            SearchCriteria::Relation { property, op, value } => {
                let actual = item.property(property);
                if *op == Operator::Exists {
                    return actual.is_some() == value.eq_ignore_ascii_case("true");
                }
                let Some(actual) = actual else {
                    return false;
                };
                let actual = actual.to_lowercase();
                let expected = value.to_lowercase();
                match op {
                    Operator::Contains => actual.contains(&expected),
                    Operator::DoesNotContain => !actual.contains(&expected),
                    Operator::DerivedFrom => actual.starts_with(&expected),
                    Operator::Eq => compare(&actual, &expected) == Ordering::Equal,
                    Operator::Ne => compare(&actual, &expected) != Ordering::Equal,
                    Operator::Lt => compare(&actual, &expected) == Ordering::Less,
                    Operator::Le => compare(&actual, &expected) != Ordering::Greater,
                    Operator::Gt => compare(&actual, &expected) == Ordering::Greater,
                    Operator::Ge => compare(&actual, &expected) != Ordering::Less,
                    Operator::Exists => false,
                }
            }
        }
    }
}

fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn invalid(input: &str) -> ActionError {
    ActionError::InvalidSearchCriteria(input.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Quoted(String),
    Word(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ActionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => return Err(invalid(input)),
                        },
                        Some('"') => break,
                        Some(c) => value.push(c),
                        None => return Err(invalid(input)),
                    }
                }
                tokens.push(Token::Quoted(value));
            }
            '=' | '!' | '<' | '>' => {
                let mut op = String::new();
                while let Some(&c) = chars.peek() {
                    if matches!(c, '=' | '!' | '<' | '>') {
                        op.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(op));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '=' | '!' | '<' | '>') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w.eq_ignore_ascii_case(word))
    }

    fn error(&self) -> ActionError {
        ActionError::InvalidSearchCriteria(format!("unexpected token at {}", self.pos))
    }

    fn or_expr(&mut self) -> Result<SearchCriteria, ActionError> {
        let mut left = self.and_expr()?;
        while self.peek_word("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = SearchCriteria::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<SearchCriteria, ActionError> {
        let mut left = self.primary()?;
        while self.peek_word("and") {
            self.pos += 1;
            let right = self.primary()?;
            left = SearchCriteria::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<SearchCriteria, ActionError> {
        match self.next() {
            Some(Token::Open) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.error()),
                }
            }
            Some(Token::Word(property)) => self.relation(property),
            _ => Err(self.error()),
        }
    }

    fn relation(&mut self, property: String) -> Result<SearchCriteria, ActionError> {
        let Some(Token::Word(op)) = self.next() else {
            return Err(self.error());
        };
        let op = match op.as_str() {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "contains" => Operator::Contains,
            "doesNotContain" => Operator::DoesNotContain,
            "derivedfrom" => Operator::DerivedFrom,
            "exists" => Operator::Exists,
            _ => return Err(self.error()),
        };
        let value = match (op, self.next()) {
            (Operator::Exists, Some(Token::Word(flag)))
                if flag.eq_ignore_ascii_case("true") || flag.eq_ignore_ascii_case("false") =>
            {
                flag
            }
            (Operator::Exists, _) => return Err(self.error()),
            (_, Some(Token::Quoted(value))) => value,
            _ => return Err(self.error()),
        };
        Ok(SearchCriteria::Relation {
            property,
            op,
            value,
        })
    }
}
