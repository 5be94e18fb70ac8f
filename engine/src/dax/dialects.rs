//! FILENAME: engine/src/dax/dialects.rs
//! PURPOSE: Converters for the dialect-specific constructs of Tableau formulas.
//! CONTEXT: Each construct is rewritten in place: the recognized span is
//! replaced by one verbatim lexeme holding its DAX, so the text around it
//! survives and still goes through the shared rules of `rewrite`.
//!
//! LOD:        {FIXED [d] : e}   -> CALCULATE(e, ALLEXCEPT(T, T[d]))
//!             {INCLUDE [d] : e} -> CALCULATE(e, VALUES(T[d]))
//!             {EXCLUDE [d] : e} -> CALCULATE(e, ALL(T[d]))
//! TABLE CALC: RANK(e)           -> RANKX(ALL(T), e)
//!             RUNNING_SUM(e)    -> CALCULATE(e, FILTER(ALL(T), T[o] <= EARLIER(T[o])))
//!             LOOKUP(e, n)      -> CALCULATE(e, OFFSET(n, ALLSELECTED(T[o]), ORDERBY(T[o])))
//! CONDITIONAL: IF c THEN a ELSEIF c2 THEN b ELSE d END -> IF(c, a, IF(c2, b, d))
//!             CASE f WHEN w THEN t ELSE e END        -> SWITCH(f, w, t, e)

use super::rewrite::Rewriter;
use crate::error::MigrationError;
use parser::{
    Call, Conditional, Lexeme, LodBlock, LodKeyword, Parser, Span, TableCalcFunction, Token,
};

impl<'a> Rewriter<'a> {
    // ========================================================================
    // LEVEL OF DETAIL
    // ========================================================================

    /// LOD blocks first; conditionals and table calculations around or
    /// inside them are converted too.
    pub(crate) fn lod_formula(&mut self, lexemes: &[Lexeme]) -> Result<String, MigrationError> {
        let spliced = self.splice_lod_context(lexemes)?;
        Ok(self.standard(&spliced))
    }

    fn splice_lod_context(&mut self, lexemes: &[Lexeme]) -> Result<Vec<Lexeme>, MigrationError> {
        let spliced = self.splice_lods(lexemes)?;
        let spliced = self.splice_conditionals(&spliced)?;
        self.splice_table_calcs(&spliced)
    }

    fn splice_lods(&mut self, lexemes: &[Lexeme]) -> Result<Vec<Lexeme>, MigrationError> {
        self.enter(lexemes)?;
        let parser = Parser::new(lexemes);
        let mut out = Vec::with_capacity(lexemes.len());
        let mut cursor = 0;

        for block in parser.lod_blocks() {
            out.extend_from_slice(&lexemes[cursor..block.span.start]);
            let dax = self.convert_lod(&parser, &block)?;
            out.push(Lexeme::verbatim(dax, lexemes[block.span.start].leading.clone()));
            cursor = block.span.end;
        }
        out.extend_from_slice(&lexemes[cursor..]);

        self.leave();
        Ok(out)
    }

    fn convert_lod(&mut self, parser: &Parser, block: &LodBlock) -> Result<String, MigrationError> {
        let lexemes = parser.lexemes();
        let inner_lexemes = self.splice_lod_context(&lexemes[block.inner.clone()])?;
        let inner = self.standard(&inner_lexemes);
        let table = self.table();
        let dimensions: Vec<String> = block
            .dimensions
            .iter()
            .map(|span| self.column(&parser.dimension_name(span)))
            .collect();

        let wrap = |filter: &str| -> String {
            dimensions
                .iter()
                .map(|d| format!("{}({})", filter, d))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let dax = match &block.keyword {
            LodKeyword::Fixed if dimensions.is_empty() => {
                format!("CALCULATE({}, ALL({}))", inner, table)
            }
            LodKeyword::Fixed => format!(
                "CALCULATE({}, ALLEXCEPT({}, {}))",
                inner,
                table,
                dimensions.join(", ")
            ),
            LodKeyword::Include | LodKeyword::Exclude if dimensions.is_empty() => {
                self.note(format!(
                    "{} expression without dimensions keeps the view's filter context",
                    block.keyword
                ));
                inner
            }
            LodKeyword::Include => format!("CALCULATE({}, {})", inner, wrap("VALUES")),
            LodKeyword::Exclude => format!("CALCULATE({}, {})", inner, wrap("ALL")),
            LodKeyword::Other(keyword) => {
                self.note(format!(
                    "Unknown LOD keyword '{}': inner expression converted without context",
                    keyword
                ));
                inner
            }
        };
        Ok(dax)
    }

    // ========================================================================
    // TABLE CALCULATIONS
    // ========================================================================

    pub(crate) fn table_calc_formula(
        &mut self,
        lexemes: &[Lexeme],
    ) -> Result<String, MigrationError> {
        let spliced = self.splice_table_calcs(lexemes)?;
        Ok(self.standard(&spliced))
    }

    fn splice_table_calcs(&mut self, lexemes: &[Lexeme]) -> Result<Vec<Lexeme>, MigrationError> {
        self.enter(lexemes)?;
        let parser = Parser::new(lexemes);
        let mut out = Vec::with_capacity(lexemes.len());
        let mut cursor = 0;

        for call in parser.calls(|name| TableCalcFunction::from_name(name).is_some()) {
            out.extend_from_slice(&lexemes[cursor..call.span.start]);
            match self.convert_table_calc(lexemes, &call)? {
                Some(dax) => {
                    out.push(Lexeme::verbatim(dax, lexemes[call.span.start].leading.clone()));
                }
                None => {
                    // Kept as a call; table calculations nested in its arguments still convert
                    let open = parser
                        .next_significant(call.span.start + 1)
                        .unwrap_or(call.span.start + 1);
                    let close = call.span.end - 1;
                    out.extend_from_slice(&lexemes[call.span.start..=open]);
                    out.extend(self.splice_table_calcs(&lexemes[open + 1..close])?);
                    out.push(lexemes[close].clone());
                }
            }
            cursor = call.span.end;
        }
        out.extend_from_slice(&lexemes[cursor..]);

        self.leave();
        Ok(out)
    }

    fn table_calc_argument(
        &mut self,
        lexemes: &[Lexeme],
        span: &Span,
    ) -> Result<String, MigrationError> {
        let spliced = self.splice_table_calcs(&lexemes[span.clone()])?;
        Ok(self.standard(&spliced))
    }

    /// `None` leaves the call to the standard rules.
    fn convert_table_calc(
        &mut self,
        lexemes: &[Lexeme],
        call: &Call,
    ) -> Result<Option<String>, MigrationError> {
        let Some(function) = TableCalcFunction::from_name(&call.name) else {
            return Ok(None);
        };

        let expected = match function {
            TableCalcFunction::Rank => 1..=2,
            TableCalcFunction::RunningSum => 1..=1,
            TableCalcFunction::Lookup => 2..=2,
            other => {
                self.note(format!(
                    "Table calculation {} has no direct DAX equivalent; converted with the standard rules",
                    other.name()
                ));
                return Ok(None);
            }
        };
        if !expected.contains(&call.args.len()) {
            self.note(format!(
                "{} called with {} argument(s); converted with the standard rules",
                function.name(),
                call.args.len()
            ));
            return Ok(None);
        }

        let expression = self.table_calc_argument(lexemes, &call.args[0])?;
        let table = self.table();
        let order = self.order_column();

        let dax = match function {
            TableCalcFunction::Rank => {
                let ascending = call.args.get(1).is_some_and(|span| {
                    lexemes[span.clone()].iter().any(|l| {
                        matches!(&l.token, Token::SingleQuoted(s) | Token::String(s)
                            if s.eq_ignore_ascii_case("asc"))
                    })
                });
                if ascending {
                    format!("RANKX(ALL({}), {}, , ASC)", table, expression)
                } else {
                    format!("RANKX(ALL({}), {})", table, expression)
                }
            }
            TableCalcFunction::RunningSum => {
                self.note(format!("Running total ordered by {}", order));
                format!(
                    "CALCULATE({}, FILTER(ALL({}), {} <= EARLIER({})))",
                    expression, table, order, order
                )
            }
            _ => {
                let offset = self.table_calc_argument(lexemes, &call.args[1])?;
                self.note(format!("LOOKUP offset evaluated along {}", order));
                format!(
                    "CALCULATE({}, OFFSET({}, ALLSELECTED({}), ORDERBY({})))",
                    expression, offset, order, order
                )
            }
        };
        Ok(Some(dax))
    }

    // ========================================================================
    // CONDITIONALS
    // ========================================================================

    pub(crate) fn conditional_formula(
        &mut self,
        lexemes: &[Lexeme],
    ) -> Result<String, MigrationError> {
        let spliced = self.splice_conditionals(lexemes)?;
        Ok(self.qualified(&spliced))
    }

    fn splice_conditionals(&mut self, lexemes: &[Lexeme]) -> Result<Vec<Lexeme>, MigrationError> {
        self.enter(lexemes)?;
        let parser = Parser::new(lexemes);
        let mut out = Vec::with_capacity(lexemes.len());
        let mut cursor = 0;

        for block in parser.conditionals() {
            let span = block.span().clone();
            out.extend_from_slice(&lexemes[cursor..span.start]);
            let dax = self.convert_conditional(lexemes, &block)?;
            out.push(Lexeme::verbatim(dax, lexemes[span.start].leading.clone()));
            cursor = span.end;
        }
        out.extend_from_slice(&lexemes[cursor..]);

        self.leave();
        Ok(out)
    }

    fn branch(&mut self, lexemes: &[Lexeme], span: &Span) -> Result<String, MigrationError> {
        let spliced = self.splice_conditionals(&lexemes[span.clone()])?;
        Ok(self.qualified(&spliced))
    }

    fn convert_conditional(
        &mut self,
        lexemes: &[Lexeme],
        block: &Conditional,
    ) -> Result<String, MigrationError> {
        match block {
            Conditional::If(block) => {
                let mut acc = match &block.otherwise {
                    Some(span) => Some(self.branch(lexemes, span)?),
                    None => None,
                };
                for branch in block.branches.iter().rev() {
                    let condition = self.branch(lexemes, &branch.condition)?;
                    let value = self.branch(lexemes, &branch.value)?;
                    acc = Some(match acc {
                        Some(otherwise) => format!("IF({}, {}, {})", condition, value, otherwise),
                        None => format!("IF({}, {})", condition, value),
                    });
                }
                if block.branches.len() > 1 {
                    self.note(format!(
                        "IF with {} branches converted to nested IF calls",
                        block.branches.len()
                    ));
                }
                acc.ok_or_else(|| {
                    MigrationError::formula(
                        "IF block has no branches",
                        parser::render(&lexemes[block.span.clone()]),
                    )
                })
            }
            Conditional::Case(block) => {
                let mut parts = vec![self.branch(lexemes, &block.subject)?];
                for arm in &block.arms {
                    parts.push(self.branch(lexemes, &arm.condition)?);
                    parts.push(self.branch(lexemes, &arm.value)?);
                }
                if let Some(span) = &block.otherwise {
                    parts.push(self.branch(lexemes, span)?);
                }
                if block.arms.len() > 1 {
                    self.note(format!(
                        "CASE with {} WHEN arms converted to one SWITCH",
                        block.arms.len()
                    ));
                }
                Ok(format!("SWITCH({})", parts.join(", ")))
            }
        }
    }
}
