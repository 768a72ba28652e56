//! Best-effort structural parse of T-SQL via sqlparser's MsSqlDialect.
//!
//! Procedural T-SQL bodies frequently fall outside what the dialect can
//! parse; every caller must produce a complete result from regex evidence
//! alone when this adapter reports a parse error. Parse error strings carry
//! only the error kind, never source tokens.

use core::ops::ControlFlow;

use sqlparser::ast::{
    Expr, FromTable, ObjectName, Query, SetExpr, Statement, TableFactor, Visit, Visitor,
};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::{Parser, ParserError};

/// Write statement kinds the AST scan can attribute to a target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstWriteKind {
    Insert,
    Update,
    Delete,
    Merge,
    Truncate,
    SelectInto,
}

/// Everything the analyzers consume from one AST walk.
#[derive(Debug, Default)]
pub struct AstScan {
    /// Table references outside CREATE statements, upper-cased dotted names.
    pub relations: Vec<String>,
    /// Function call base names, upper-cased.
    pub functions: Vec<String>,
    /// Write statements with their resolved target, in source order.
    pub writes: Vec<(AstWriteKind, Option<String>)>,
    pub update_missing_where: bool,
    pub delete_missing_where: bool,
}

pub fn parse_statements(sql: &str, dialect: &str) -> Result<Vec<Statement>, String> {
    // Only the tsql dialect is wired up today; the tag is accepted so the
    // request surface matches the contract.
    let _ = dialect;
    Parser::parse_sql(&MsSqlDialect {}, sql).map_err(|err| {
        let kind = match err {
            ParserError::TokenizerError(_) => "tokenizer",
            ParserError::ParserError(_) => "syntax",
            ParserError::RecursionLimitExceeded => "recursion_limit",
        };
        format!("parse_error: {kind}")
    })
}

pub fn scan(statements: &[Statement]) -> AstScan {
    let mut scanner = AstScanner::default();
    for statement in statements {
        let _ = statement.visit(&mut scanner);
    }
    scanner.scan
}

#[derive(Default)]
struct AstScanner {
    scan: AstScan,
    create_stack: Vec<bool>,
}

impl AstScanner {
    fn in_create(&self) -> bool {
        self.create_stack.iter().any(|flag| *flag)
    }
}

impl Visitor for AstScanner {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<()> {
        let rendered = statement.to_string();
        let is_create = rendered
            .trim_start()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("CREATE"));
        self.create_stack.push(is_create);

        match statement {
            Statement::Insert { table_name, .. } => {
                self.scan
                    .writes
                    .push((AstWriteKind::Insert, Some(object_name_string(table_name))));
            }
            Statement::Update { table, selection, .. } => {
                self.scan
                    .writes
                    .push((AstWriteKind::Update, table_factor_name(&table.relation)));
                if selection.is_none() {
                    self.scan.update_missing_where = true;
                }
            }
            Statement::Delete { from, selection, .. } => {
                let target = match from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                        tables.first().and_then(|table| table_factor_name(&table.relation))
                    }
                };
                self.scan.writes.push((AstWriteKind::Delete, target));
                if selection.is_none() {
                    self.scan.delete_missing_where = true;
                }
            }
            Statement::Merge { table, .. } => {
                self.scan.writes.push((AstWriteKind::Merge, table_factor_name(table)));
            }
            Statement::Truncate { table_name, .. } => {
                self.scan
                    .writes
                    .push((AstWriteKind::Truncate, Some(object_name_string(table_name))));
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn post_visit_statement(&mut self, _statement: &Statement) -> ControlFlow<()> {
        self.create_stack.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<()> {
        if !self.in_create() {
            self.scan
                .relations
                .push(object_name_string(relation).to_ascii_uppercase());
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if let SetExpr::Select(select) = query.body.as_ref()
            && let Some(into) = &select.into
        {
            self.scan
                .writes
                .push((AstWriteKind::SelectInto, Some(object_name_string(&into.name))));
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        if let Expr::Function(function) = expr
            && let Some(base) = function.name.0.last()
        {
            self.scan.functions.push(base.value.to_ascii_uppercase());
        }
        ControlFlow::Continue(())
    }
}

/// Dotted rendering of an object name with quoting stripped.
pub fn object_name_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

fn table_factor_name(factor: &TableFactor) -> Option<String> {
    match factor {
        TableFactor::Table { name, .. } => Some(object_name_string(name)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_select() {
        let statements = parse_statements("SELECT 1", "tsql").expect("parses");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_parse_error_reports_kind_without_tokens() {
        let err = parse_statements("SELECT 'SENTINEL_TOKEN' FROM", "tsql").unwrap_err();
        assert!(err.starts_with("parse_error: "));
        assert!(!err.contains("SENTINEL_TOKEN"));
    }

    #[test]
    fn test_scan_collects_relations_and_functions() {
        let statements =
            parse_statements("SELECT UPPER(name) FROM dbo.Users u JOIN dbo.Orders o ON u.id = o.uid", "tsql")
                .expect("parses");
        let scan = scan(&statements);
        assert!(scan.relations.contains(&"DBO.USERS".to_string()));
        assert!(scan.relations.contains(&"DBO.ORDERS".to_string()));
        assert!(scan.functions.contains(&"UPPER".to_string()));
    }

    #[test]
    fn test_scan_update_without_where() {
        let statements =
            parse_statements("UPDATE dbo.Users SET name = 'x'", "tsql").expect("parses");
        let scan = scan(&statements);
        assert!(scan.update_missing_where);
        assert_eq!(scan.writes.len(), 1);
        assert_eq!(scan.writes[0].0, AstWriteKind::Update);
        assert_eq!(scan.writes[0].1.as_deref(), Some("dbo.Users"));
    }

    #[test]
    fn test_scan_update_with_where_has_target() {
        let statements =
            parse_statements("UPDATE dbo.Users SET name = 'x' WHERE id = 1", "tsql")
                .expect("parses");
        let scan = scan(&statements);
        assert!(!scan.update_missing_where);
    }

    #[test]
    fn test_scan_delete_and_insert_targets() {
        let statements = parse_statements(
            "DELETE FROM dbo.Logs WHERE id = 1; INSERT INTO dbo.Audit (id) VALUES (1)",
            "tsql",
        )
        .expect("parses");
        let scan = scan(&statements);
        let kinds: Vec<_> = scan.writes.iter().map(|(kind, _)| *kind).collect();
        assert!(kinds.contains(&AstWriteKind::Delete));
        assert!(kinds.contains(&AstWriteKind::Insert));
    }

    #[test]
    fn test_bracketed_identifiers_unquoted() {
        let statements =
            parse_statements("SELECT * FROM [dbo].[Order Details]", "tsql").expect("parses");
        let scan = scan(&statements);
        assert!(scan.relations.contains(&"DBO.ORDER DETAILS".to_string()));
    }
}
