//! Table reference extraction.
//!
//! Walks the token stream of a statement and collects the base names of
//! every relation that appears as a `FROM` item or a `JOIN` target:
//!
//! ```text
//! SELECT * FROM sales.orders o, customers c JOIN regions r ON ...
//!               └────┬─────┘    └───┬───┘        └──┬──┘
//!                 orders        customers        regions
//! ```
//!
//! This is a token walk, not a parse: text that tokenizes but would not
//! parse still yields whatever references it contains. Rejecting bad SQL
//! is the validator's job.

use std::collections::BTreeSet;

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use tracing::debug;

/// Extract the distinct base table names referenced by `sql`.
///
/// Qualified names resolve to their last part and aliases are dropped.
/// Unquoted identifiers are folded to lower case the way PostgreSQL folds
/// them; quoted identifiers keep their case. Names defined by a `WITH`
/// clause are not tables and are excluded. Text that cannot be tokenized
/// yields an empty set.
pub fn extract_table_names(sql: &str) -> BTreeSet<String> {
    let dialect = PostgreSqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            debug!(error = %err, "query does not tokenize, no references extracted");
            return BTreeSet::new();
        }
    };

    let significant: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect();

    let tables = ReferenceWalker::new(&significant).walk();
    debug!(?tables, "extracted table names");
    tables
}

/// Keywords that end a FROM list or introduce the next clause, and so can
/// never be a table name or alias in that position.
fn is_clause_keyword(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::SELECT
            | Keyword::FROM
            | Keyword::WHERE
            | Keyword::GROUP
            | Keyword::ORDER
            | Keyword::HAVING
            | Keyword::LIMIT
            | Keyword::OFFSET
            | Keyword::FETCH
            | Keyword::FOR
            | Keyword::WINDOW
            | Keyword::UNION
            | Keyword::EXCEPT
            | Keyword::INTERSECT
            | Keyword::JOIN
            | Keyword::INNER
            | Keyword::LEFT
            | Keyword::RIGHT
            | Keyword::FULL
            | Keyword::OUTER
            | Keyword::CROSS
            | Keyword::NATURAL
            | Keyword::ON
            | Keyword::USING
            | Keyword::AS
            | Keyword::WITH
            | Keyword::SET
            | Keyword::VALUES
            | Keyword::RETURNING
            | Keyword::LATERAL
            | Keyword::ONLY
            | Keyword::TABLESAMPLE
    )
}

/// Built-in functions whose argument syntax contains a bare `FROM`.
fn has_from_argument(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::EXTRACT | Keyword::SUBSTRING | Keyword::TRIM | Keyword::OVERLAY
    )
}

fn base_name(word: &Word) -> String {
    match word.quote_style {
        Some(_) => word.value.clone(),
        None => word.value.to_lowercase(),
    }
}

struct ReferenceWalker<'a> {
    tokens: &'a [Token],
    pos: usize,
    tables: BTreeSet<String>,
    ctes: BTreeSet<String>,
    /// One entry per open parenthesis: whether it opened a function call.
    parens: Vec<bool>,
}

impl<'a> ReferenceWalker<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            tables: BTreeSet::new(),
            ctes: BTreeSet::new(),
            parens: Vec::new(),
        }
    }

    fn walk(mut self) -> BTreeSet<String> {
        self.scan();
        self.tables
            .into_iter()
            .filter(|name| !self.ctes.contains(name))
            .collect()
    }

    fn scan(&mut self) {
        while let Some(token) = self.peek() {
            match token {
                Token::LParen => {
                    let is_call = self.opens_call();
                    self.parens.push(is_call);
                    self.pos += 1;
                }
                Token::RParen => {
                    self.parens.pop();
                    self.pos += 1;
                }
                Token::Word(w) if w.keyword == Keyword::FROM => {
                    let is_clause = !self.in_call() && !self.follows_is_distinct();
                    self.pos += 1;
                    if is_clause {
                        self.from_list();
                    }
                }
                Token::Word(w) if w.keyword == Keyword::JOIN => {
                    self.pos += 1;
                    self.join_target();
                }
                Token::Word(w) => {
                    if self.defines_cte() {
                        self.ctes.insert(base_name(w));
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, pos: usize) -> Option<&'a Token> {
        self.tokens.get(pos)
    }

    fn peek_word(&self) -> Option<&'a Word> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w),
            _ => None,
        }
    }

    fn in_call(&self) -> bool {
        self.parens.last().copied().unwrap_or(false)
    }

    /// Whether the `(` at the cursor opens a function argument list.
    fn opens_call(&self) -> bool {
        let Some(Token::Word(prev)) = self.pos.checked_sub(1).and_then(|p| self.peek_at(p)) else {
            return false;
        };
        prev.quote_style.is_some()
            || prev.keyword == Keyword::NoKeyword
            || has_from_argument(prev.keyword)
    }

    /// `a IS [NOT] DISTINCT FROM b` uses FROM as an operator.
    fn follows_is_distinct(&self) -> bool {
        let word_at = |back: usize| match self.pos.checked_sub(back).and_then(|p| self.peek_at(p)) {
            Some(Token::Word(w)) => Some(w.keyword),
            _ => None,
        };
        word_at(1) == Some(Keyword::DISTINCT)
            && matches!(word_at(2), Some(Keyword::IS) | Some(Keyword::NOT))
    }

    /// Whether the word at the cursor names a CTE: `name [(cols)] AS [[NOT] MATERIALIZED] (`.
    fn defines_cte(&self) -> bool {
        let mut pos = self.pos + 1;
        if matches!(self.peek_at(pos), Some(Token::LParen)) {
            pos = self.skip_group_from(pos);
        }
        match self.peek_at(pos) {
            Some(Token::Word(w)) if w.keyword == Keyword::AS => pos += 1,
            _ => return false,
        }
        while let Some(Token::Word(w)) = self.peek_at(pos) {
            if matches!(w.keyword, Keyword::NOT | Keyword::MATERIALIZED) {
                pos += 1;
            } else {
                break;
            }
        }
        matches!(self.peek_at(pos), Some(Token::LParen))
    }

    /// Position just past the balanced group opening at `pos`.
    fn skip_group_from(&self, mut pos: usize) -> usize {
        let mut depth = 0usize;
        while let Some(token) = self.peek_at(pos) {
            pos += 1;
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        pos
    }

    fn skip_keywords(&mut self, keywords: &[Keyword]) {
        while let Some(w) = self.peek_word() {
            if w.quote_style.is_none() && keywords.contains(&w.keyword) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Consume `part(.part)*` and return the last part.
    fn qualified_name(&mut self, first: &Word) -> String {
        let mut name = base_name(first);
        self.pos += 1;
        while let (Some(Token::Period), Some(Token::Word(part))) =
            (self.peek(), self.peek_at(self.pos + 1))
        {
            name = base_name(part);
            self.pos += 2;
        }
        name
    }

    /// Consume one FROM item at the cursor and its alias.
    ///
    /// Derived tables and table function arguments are walked on their own
    /// so the tables they reference are still collected. Returns `false`
    /// when the cursor is not on a FROM item.
    fn from_item(&mut self) -> bool {
        self.skip_keywords(&[Keyword::ONLY, Keyword::LATERAL]);
        match self.peek() {
            Some(Token::LParen) => self.descend(false),
            Some(Token::Word(word)) => {
                if word.quote_style.is_none() && is_clause_keyword(word.keyword) {
                    return false;
                }
                let name = self.qualified_name(word);
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.descend(true);
                    self.skip_with_ordinality();
                } else {
                    self.tables.insert(name);
                }
            }
            _ => return false,
        }
        self.skip_alias();
        true
    }

    /// Walk the balanced group at the cursor with a fresh walker and step
    /// past it. `call` marks a function argument list.
    fn descend(&mut self, call: bool) {
        let start = self.pos + 1;
        let end = self.skip_group_from(self.pos);
        let inner_end = match self.peek_at(end.saturating_sub(1)) {
            Some(Token::RParen) if end > start => end - 1,
            _ => end,
        };

        let tokens = self.tokens;
        let mut inner = ReferenceWalker::new(&tokens[start..inner_end]);
        if call {
            inner.parens.push(true);
        } else {
            // `(a JOIN b ON ...)` starts with a FROM item.
            inner.from_list();
        }
        inner.scan();

        self.tables.extend(inner.tables);
        self.ctes.extend(inner.ctes);
        self.pos = end;
    }

    fn skip_with_ordinality(&mut self) {
        let is_with = matches!(self.peek_word(), Some(w) if w.keyword == Keyword::WITH);
        let is_ordinality = matches!(
            self.peek_at(self.pos + 1),
            Some(Token::Word(w)) if w.value.eq_ignore_ascii_case("ordinality")
        );
        if is_with && is_ordinality {
            self.pos += 2;
        }
    }

    fn skip_alias(&mut self) {
        match self.peek_word() {
            Some(w) if w.quote_style.is_none() && w.keyword == Keyword::AS => {
                self.pos += 1;
                if self.peek_word().is_some() {
                    self.pos += 1;
                }
            }
            Some(w) if w.quote_style.is_some() || !is_clause_keyword(w.keyword) => {
                self.pos += 1;
            }
            _ => return,
        }
        // Column alias list: `AS t (a, b)`
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos = self.skip_group_from(self.pos);
        }
    }

    fn from_list(&mut self) {
        while self.from_item() {
            if matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn join_target(&mut self) {
        self.from_item();
    }
}
