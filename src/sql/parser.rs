//! Statement state machine.
//!
//! Dispatches on the leading keyword (anything else at `Init` is a
//! `SyntaxError`), then walks token classes until the terminating `;`.
//! The SELECT machine is an explicit state loop; the remaining statements
//! consume their fixed shapes with the same cursor primitives. Output is a
//! tagged [`ParserResult`]; no name resolution or literal typing happens
//! here.

use crate::error::Error;
use crate::sql::ast::{
    ColumnRef, ColumnSpec, CreateBranchStatement, CreateTableStatement, DeleteStatement,
    InsertStatement, ParserResult, SelectStatement, TableRef, UpdateStatement,
};
use crate::sql::lexer::Lexer;
use crate::sql::token::{Keyword, Token, TokenKind};

pub fn parse_statement(input: &str) -> Result<ParserResult, Error> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut cursor = Cursor { tokens: &tokens, index: 0 };

    let first = cursor.advance();
    let result = match first.kind {
        TokenKind::Keyword(Keyword::Select) => parse_select(&mut cursor)?,
        TokenKind::Keyword(Keyword::Insert) => parse_insert(&mut cursor)?,
        TokenKind::Keyword(Keyword::Update) => parse_update(&mut cursor)?,
        TokenKind::Keyword(Keyword::Delete) => parse_delete(&mut cursor)?,
        TokenKind::Keyword(Keyword::Create) => parse_create(&mut cursor)?,
        _ => return Err(syntax_error(&first, "a statement keyword")),
    };

    let trailing = cursor.advance();
    if trailing.kind != TokenKind::Eof {
        return Err(syntax_error(&trailing, "end of statement"));
    }
    Ok(result)
}

struct Cursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    index: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn peek(&self) -> Token<'a> {
        self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn expect_identifier(&mut self, what: &str) -> Result<&'a str, Error> {
        let token = self.advance();
        if token.is_identifier() {
            Ok(token.text)
        } else {
            Err(syntax_error(&token, what))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, what: &str) -> Result<(), Error> {
        let token = self.advance();
        if token.is_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax_error(&token, what))
        }
    }

    fn expect_separator(&mut self, separator: char) -> Result<(), Error> {
        let token = self.advance();
        if token.kind == TokenKind::Separator(separator) {
            Ok(())
        } else {
            Err(syntax_error(&token, &format!("'{separator}'")))
        }
    }

    fn expect_delimiter(&mut self) -> Result<(), Error> {
        let token = self.advance();
        if token.kind == TokenKind::Delimiter {
            Ok(())
        } else {
            Err(syntax_error(&token, "';'"))
        }
    }

    fn consume_if(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }
}

fn syntax_error(token: &Token<'_>, expected: &str) -> Error {
    let found = match token.kind {
        TokenKind::Eof => "end of input".to_string(),
        _ => format!("'{}'", token.text),
    };
    Error::Syntax {
        position: token.pos,
        message: format!("expected {expected}, found {found}"),
    }
}

// ----------------------------------------------------------------------
// SELECT

#[derive(Clone, Copy, PartialEq)]
enum SelectState {
    Projection,
    ProjectionNext,
    StarNext,
    From,
    RelationPost,
    VersionName,
    RelationEnd,
    WhereLhs,
    WhereOp,
    WhereRhs,
    WhereNext,
    Done,
}

fn parse_select(cursor: &mut Cursor<'_, '_>) -> Result<ParserResult, Error> {
    let mut stmt = SelectStatement::default();
    let mut state = SelectState::Projection;
    let mut where_lhs = ColumnRef::parse("");

    while state != SelectState::Done {
        let token = cursor.advance();
        state = match state {
            SelectState::Projection => match token.kind {
                TokenKind::Star => {
                    stmt.star = true;
                    SelectState::StarNext
                }
                TokenKind::Identifier => {
                    stmt.projections.push(ColumnRef::parse(token.text));
                    SelectState::ProjectionNext
                }
                _ => return Err(syntax_error(&token, "a projection attribute or '*'")),
            },
            SelectState::ProjectionNext => match token.kind {
                TokenKind::Separator(',') => SelectState::Projection,
                TokenKind::Keyword(Keyword::From) => SelectState::From,
                _ => return Err(syntax_error(&token, "',' or FROM")),
            },
            SelectState::StarNext => match token.kind {
                TokenKind::Keyword(Keyword::From) => SelectState::From,
                _ => return Err(syntax_error(&token, "FROM after '*'")),
            },
            SelectState::From => match token.kind {
                TokenKind::Identifier => {
                    stmt.relations.push(TableRef::named(token.text));
                    SelectState::RelationPost
                }
                _ => return Err(syntax_error(&token, "a relation name")),
            },
            SelectState::RelationPost => match token.kind {
                TokenKind::Keyword(Keyword::Version) => SelectState::VersionName,
                TokenKind::Identifier => {
                    stmt.relations.last_mut().unwrap().alias = Some(token.text.to_string());
                    SelectState::RelationEnd
                }
                TokenKind::Separator(',') => SelectState::From,
                TokenKind::Keyword(Keyword::Where) => SelectState::WhereLhs,
                TokenKind::Delimiter => SelectState::Done,
                _ => return Err(syntax_error(&token, "VERSION, an alias, ',', WHERE or ';'")),
            },
            SelectState::VersionName => match token.kind {
                TokenKind::Identifier => {
                    stmt.relations.last_mut().unwrap().version = Some(token.text.to_string());
                    SelectState::RelationPost
                }
                _ => return Err(syntax_error(&token, "a branch name after VERSION")),
            },
            SelectState::RelationEnd => match token.kind {
                TokenKind::Separator(',') => SelectState::From,
                TokenKind::Keyword(Keyword::Where) => SelectState::WhereLhs,
                TokenKind::Delimiter => SelectState::Done,
                _ => return Err(syntax_error(&token, "',', WHERE or ';'")),
            },
            SelectState::WhereLhs => match token.kind {
                TokenKind::Identifier => {
                    where_lhs = ColumnRef::parse(token.text);
                    SelectState::WhereOp
                }
                _ => return Err(syntax_error(&token, "an attribute")),
            },
            SelectState::WhereOp => match token.kind {
                TokenKind::Op('=') => SelectState::WhereRhs,
                _ => return Err(syntax_error(&token, "'='")),
            },
            SelectState::WhereRhs => match token.kind {
                TokenKind::Identifier => {
                    stmt.join_conditions
                        .push((where_lhs.clone(), ColumnRef::parse(token.text)));
                    SelectState::WhereNext
                }
                TokenKind::Literal => {
                    stmt.selections
                        .push((where_lhs.clone(), token.text.to_string()));
                    SelectState::WhereNext
                }
                _ => return Err(syntax_error(&token, "an attribute or literal")),
            },
            SelectState::WhereNext => match token.kind {
                TokenKind::Keyword(Keyword::And) => SelectState::WhereLhs,
                TokenKind::Delimiter => SelectState::Done,
                _ => return Err(syntax_error(&token, "AND or ';'")),
            },
            SelectState::Done => unreachable!(),
        };
    }
    Ok(ParserResult::Select(stmt))
}

// ----------------------------------------------------------------------
// Relation reference and WHERE tail, shared by the DML verbs

fn parse_table_ref(cursor: &mut Cursor<'_, '_>) -> Result<TableRef, Error> {
    let mut rel = TableRef::named(cursor.expect_identifier("a relation name")?);
    if cursor.consume_if(TokenKind::Keyword(Keyword::Version)) {
        rel.version = Some(
            cursor
                .expect_identifier("a branch name after VERSION")?
                .to_string(),
        );
    }
    Ok(rel)
}

type WhereClauses = (Vec<(ColumnRef, ColumnRef)>, Vec<(ColumnRef, String)>);

/// Parses `cond (AND cond)* ;` after WHERE was consumed.
fn parse_where_tail(cursor: &mut Cursor<'_, '_>) -> Result<WhereClauses, Error> {
    let mut join_conditions = Vec::new();
    let mut selections = Vec::new();
    loop {
        let lhs = ColumnRef::parse(cursor.expect_identifier("an attribute")?);
        let eq = cursor.advance();
        if eq.kind != TokenKind::Op('=') {
            return Err(syntax_error(&eq, "'='"));
        }
        let rhs = cursor.advance();
        match rhs.kind {
            TokenKind::Identifier => join_conditions.push((lhs, ColumnRef::parse(rhs.text))),
            TokenKind::Literal => selections.push((lhs, rhs.text.to_string())),
            _ => return Err(syntax_error(&rhs, "an attribute or literal")),
        }
        let next = cursor.advance();
        match next.kind {
            TokenKind::Keyword(Keyword::And) => continue,
            TokenKind::Delimiter => return Ok((join_conditions, selections)),
            _ => return Err(syntax_error(&next, "AND or ';'")),
        }
    }
}

/// Optional WHERE tail: either `;` immediately or a full clause list.
fn parse_optional_where(cursor: &mut Cursor<'_, '_>) -> Result<WhereClauses, Error> {
    let token = cursor.advance();
    match token.kind {
        TokenKind::Delimiter => Ok((Vec::new(), Vec::new())),
        TokenKind::Keyword(Keyword::Where) => parse_where_tail(cursor),
        _ => Err(syntax_error(&token, "WHERE or ';'")),
    }
}

// ----------------------------------------------------------------------
// INSERT / UPDATE / DELETE

fn parse_insert(cursor: &mut Cursor<'_, '_>) -> Result<ParserResult, Error> {
    cursor.expect_keyword(Keyword::Into, "INTO after INSERT")?;
    let relation = parse_table_ref(cursor)?;

    cursor.expect_separator('(')?;
    let mut columns = vec![cursor.expect_identifier("a column name")?.to_string()];
    while cursor.consume_if(TokenKind::Separator(',')) {
        columns.push(cursor.expect_identifier("a column name")?.to_string());
    }
    cursor.expect_separator(')')?;

    cursor.expect_keyword(Keyword::Values, "VALUES")?;
    cursor.expect_separator('(')?;
    let mut values = Vec::new();
    loop {
        let token = cursor.advance();
        if token.kind != TokenKind::Literal {
            return Err(syntax_error(&token, "a literal"));
        }
        values.push(token.text.to_string());
        if !cursor.consume_if(TokenKind::Separator(',')) {
            break;
        }
    }
    cursor.expect_separator(')')?;
    cursor.expect_delimiter()?;

    Ok(ParserResult::Insert(InsertStatement {
        relation,
        columns,
        values,
    }))
}

fn parse_update(cursor: &mut Cursor<'_, '_>) -> Result<ParserResult, Error> {
    let relation = parse_table_ref(cursor)?;
    cursor.expect_keyword(Keyword::Set, "SET")?;

    let mut assignments = Vec::new();
    loop {
        let column = cursor.expect_identifier("a column name")?.to_string();
        let eq = cursor.advance();
        if eq.kind != TokenKind::Op('=') {
            return Err(syntax_error(&eq, "'='"));
        }
        let value = cursor.advance();
        if value.kind != TokenKind::Literal {
            return Err(syntax_error(&value, "a literal"));
        }
        assignments.push((column, value.text.to_string()));
        if !cursor.consume_if(TokenKind::Separator(',')) {
            break;
        }
    }

    let (join_conditions, selections) = parse_optional_where(cursor)?;
    Ok(ParserResult::Update(UpdateStatement {
        relation,
        assignments,
        selections,
        join_conditions,
    }))
}

fn parse_delete(cursor: &mut Cursor<'_, '_>) -> Result<ParserResult, Error> {
    cursor.expect_keyword(Keyword::From, "FROM after DELETE")?;
    let relation = parse_table_ref(cursor)?;
    let (join_conditions, selections) = parse_optional_where(cursor)?;
    Ok(ParserResult::Delete(DeleteStatement {
        relation,
        selections,
        join_conditions,
    }))
}

// ----------------------------------------------------------------------
// CREATE TABLE / CREATE BRANCH

fn parse_create(cursor: &mut Cursor<'_, '_>) -> Result<ParserResult, Error> {
    let token = cursor.advance();
    match token.kind {
        TokenKind::Keyword(Keyword::Table) => parse_create_table(cursor),
        TokenKind::Keyword(Keyword::Branch) => parse_create_branch(cursor),
        _ => Err(syntax_error(&token, "TABLE or BRANCH after CREATE")),
    }
}

fn parse_create_table(cursor: &mut Cursor<'_, '_>) -> Result<ParserResult, Error> {
    let table = cursor.expect_identifier("a table name")?.to_string();
    cursor.expect_separator('(')?;

    let mut columns = Vec::new();
    loop {
        let name = cursor.expect_identifier("a column name")?.to_string();
        let type_name = cursor
            .expect_identifier("a type name")?
            .to_ascii_lowercase();

        let (mut length, mut precision) = (None, None);
        if cursor.consume_if(TokenKind::Separator('(')) {
            length = Some(parse_u32(cursor)?);
            if cursor.consume_if(TokenKind::Separator(',')) {
                precision = Some(parse_u32(cursor)?);
            }
            cursor.expect_separator(')')?;
        }

        let mut not_null = false;
        if cursor.consume_if(TokenKind::Keyword(Keyword::Not)) {
            cursor.expect_keyword(Keyword::Null, "NULL after NOT")?;
            not_null = true;
        }

        columns.push(ColumnSpec {
            name,
            type_name,
            length,
            precision,
            not_null,
        });
        if !cursor.consume_if(TokenKind::Separator(',')) {
            break;
        }
    }
    cursor.expect_separator(')')?;
    cursor.expect_delimiter()?;

    Ok(ParserResult::CreateTable(CreateTableStatement {
        table,
        columns,
    }))
}

fn parse_create_branch(cursor: &mut Cursor<'_, '_>) -> Result<ParserResult, Error> {
    let branch = cursor.expect_identifier("a branch name")?.to_string();
    cursor.expect_keyword(Keyword::From, "FROM")?;
    let parent = cursor.expect_identifier("a parent branch name")?.to_string();
    cursor.expect_delimiter()?;
    Ok(ParserResult::CreateBranch(CreateBranchStatement {
        branch,
        parent,
    }))
}

fn parse_u32(cursor: &mut Cursor<'_, '_>) -> Result<u32, Error> {
    let token = cursor.advance();
    if token.kind != TokenKind::Literal {
        return Err(syntax_error(&token, "a number"));
    }
    token.text.parse().map_err(|_| Error::Syntax {
        position: token.pos,
        message: format!("'{}' is not a valid length", token.text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> ParserResult {
        parse_statement(sql).unwrap()
    }

    #[test]
    fn select_with_alias_and_conditions() {
        let ParserResult::Select(stmt) =
            parse("SELECT b, c FROM t x, u y WHERE x.a = y.a AND x.b = 2;")
        else {
            panic!("wrong variant")
        };
        assert_eq!(stmt.projections.len(), 2);
        assert_eq!(stmt.relations.len(), 2);
        assert_eq!(stmt.relations[0].binding(), "x");
        assert_eq!(stmt.join_conditions.len(), 1);
        assert_eq!(stmt.selections.len(), 1);
        assert_eq!(stmt.selections[0].1, "2");
    }

    #[test]
    fn select_version_clause() {
        let ParserResult::Select(stmt) = parse("SELECT a FROM t VERSION b1 x;") else {
            panic!("wrong variant")
        };
        assert_eq!(stmt.relations[0].version.as_deref(), Some("b1"));
        assert_eq!(stmt.relations[0].alias.as_deref(), Some("x"));
    }

    #[test]
    fn select_star() {
        let ParserResult::Select(stmt) = parse("SELECT * FROM t;") else {
            panic!("wrong variant")
        };
        assert!(stmt.star);
        assert!(stmt.projections.is_empty());
    }

    #[test]
    fn insert_with_version() {
        let ParserResult::Insert(stmt) =
            parse("INSERT INTO t VERSION b1 (a, b) VALUES (1, 'two');")
        else {
            panic!("wrong variant")
        };
        assert_eq!(stmt.relation.version.as_deref(), Some("b1"));
        assert_eq!(stmt.columns, vec!["a", "b"]);
        assert_eq!(stmt.values, vec!["1", "two"]);
    }

    #[test]
    fn update_set_and_where() {
        let ParserResult::Update(stmt) = parse("UPDATE t VERSION b1 SET b = 3 WHERE a = 1;")
        else {
            panic!("wrong variant")
        };
        assert_eq!(stmt.assignments, vec![("b".to_string(), "3".to_string())]);
        assert_eq!(stmt.selections.len(), 1);
    }

    #[test]
    fn delete_without_where() {
        let ParserResult::Delete(stmt) = parse("DELETE FROM t;") else {
            panic!("wrong variant")
        };
        assert!(stmt.selections.is_empty());
        assert_eq!(stmt.relation.table, "t");
    }

    #[test]
    fn create_table_types_and_nullability() {
        let ParserResult::CreateTable(stmt) = parse(
            "CREATE TABLE t (a INTEGER NOT NULL, b NUMERIC(10, 2), c VARCHAR(20) NOT NULL);",
        ) else {
            panic!("wrong variant")
        };
        assert_eq!(stmt.columns.len(), 3);
        assert!(stmt.columns[0].not_null);
        assert_eq!(stmt.columns[1].length, Some(10));
        assert_eq!(stmt.columns[1].precision, Some(2));
        assert!(!stmt.columns[1].not_null);
        assert_eq!(stmt.columns[2].length, Some(20));
    }

    #[test]
    fn create_branch() {
        let ParserResult::CreateBranch(stmt) = parse("CREATE BRANCH b1 FROM master;") else {
            panic!("wrong variant")
        };
        assert_eq!(stmt.branch, "b1");
        assert_eq!(stmt.parent, "master");
    }

    #[test]
    fn unknown_leading_token_is_a_syntax_error() {
        assert!(matches!(
            parse_statement("EXPLAIN SELECT 1;"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn trailing_tokens_rejected() {
        assert!(matches!(
            parse_statement("CREATE BRANCH b FROM master; extra"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn canonical_print_round_trips() {
        for sql in [
            "SELECT b, c FROM t x, u y WHERE x.a = y.a AND x.b = 2;",
            "SELECT * FROM t VERSION b1;",
            "SELECT a FROM t VERSION b1 x;",
            "INSERT INTO t (a, b) VALUES (1, 'two words');",
            "INSERT INTO t VERSION dev (a) VALUES (-5);",
            "UPDATE t SET a = 1, b = 'x' WHERE c = 3;",
            "DELETE FROM t VERSION dev WHERE a = 1;",
            "CREATE TABLE t (a INTEGER NOT NULL, b NUMERIC(10, 2), c TEXT);",
            "CREATE BRANCH b1 FROM master;",
        ] {
            let first = parse_statement(sql).unwrap();
            let printed = first.to_string();
            let second = parse_statement(&printed).unwrap();
            assert_eq!(first, second, "round trip failed for {sql} -> {printed}");
        }
    }
}
