//! Journal entry validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. structural (line count, one non-zero side per line, rates, tags)
//! 2. referential (accounts resolvable and postable, period open)
//! 3. arithmetic (document totals balance; base totals recomputed and balance)
//! 4. semantic (intercompany counter-party, subledger references)
//!
//! The validator is pure: collaborator lookups arrive as closures over
//! data the caller prefetched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{AccountId, CurrencyCode, JournalLineId};

use super::error::JournalValidationError;
use super::types::{
    AccountRef, JournalEntryDraft, JournalLine, JournalLineInput, JournalTotals, SubledgerLink,
};
use crate::currency::{BalanceTolerance, CurrencyService};

/// Account facts needed to accept a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// The account ID.
    pub id: AccountId,
    /// Chart of accounts code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// Whether the account allows direct posting (false for summary accounts).
    pub allow_direct_posting: bool,
}

/// Lines and totals computed by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    /// Resolved lines with base-currency equivalents.
    pub lines: Vec<JournalLine>,
    /// Denormalized totals.
    pub totals: JournalTotals,
}

/// Validates journal entry drafts against one shared tolerance policy.
#[derive(Debug, Clone, Copy)]
pub struct JournalValidator {
    tolerance: BalanceTolerance,
    max_lines: usize,
}

impl Default for JournalValidator {
    fn default() -> Self {
        Self::new(BalanceTolerance::DEFAULT, Self::DEFAULT_MAX_LINES)
    }
}

fn line_no(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

impl JournalValidator {
    /// Double-entry minimum.
    pub const MIN_LINES: usize = 2;
    /// Default upper bound on lines per entry.
    pub const DEFAULT_MAX_LINES: usize = 100;
    /// Free-form dimension tags allowed per line.
    pub const MAX_DIMENSIONS: usize = 4;
    /// Decimal places an amount may carry.
    pub const MAX_AMOUNT_SCALE: u32 = 4;
    /// Amounts must stay strictly below this magnitude (10^15).
    pub const AMOUNT_LIMIT: i64 = 1_000_000_000_000_000;

    /// Creates a validator.
    #[must_use]
    pub const fn new(tolerance: BalanceTolerance, max_lines: usize) -> Self {
        Self {
            tolerance,
            max_lines,
        }
    }

    /// The tolerance this validator balances against.
    #[must_use]
    pub const fn tolerance(&self) -> BalanceTolerance {
        self.tolerance
    }

    /// The configured maximum number of lines.
    #[must_use]
    pub const fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Validates a draft and computes its lines and totals.
    ///
    /// # Arguments
    ///
    /// * `draft` - The candidate entry
    /// * `base_currency` - The tenant's functional currency
    /// * `period_open` - Whether the draft's period accepts postings on its date
    /// * `resolve_account` - Account directory lookup
    /// * `subledger_exists` - Subledger reference lookup
    ///
    /// # Errors
    ///
    /// Returns the first `JournalValidationError` found, in check order.
    pub fn validate<A, S>(
        &self,
        draft: &JournalEntryDraft,
        base_currency: CurrencyCode,
        period_open: bool,
        resolve_account: A,
        subledger_exists: S,
    ) -> Result<ValidatedEntry, JournalValidationError>
    where
        A: Fn(&AccountRef) -> Option<AccountInfo>,
        S: Fn(&SubledgerLink) -> bool,
    {
        self.check_structure(draft, base_currency)?;

        let accounts = Self::resolve_accounts(draft, &resolve_account)?;
        if !period_open {
            return Err(JournalValidationError::ClosedPeriod {
                period: draft.fiscal_period_id,
                date: draft.entry_date,
            });
        }

        let validated = self.compute_balances(draft, base_currency, &accounts)?;

        Self::check_semantics(draft, &subledger_exists)?;

        Ok(validated)
    }

    fn check_structure(
        &self,
        draft: &JournalEntryDraft,
        base_currency: CurrencyCode,
    ) -> Result<(), JournalValidationError> {
        let count = draft.lines.len();
        if count < Self::MIN_LINES {
            return Err(JournalValidationError::TooFewLines {
                count,
                min: Self::MIN_LINES,
            });
        }
        if count > self.max_lines {
            return Err(JournalValidationError::TooManyLines {
                count,
                max: self.max_lines,
            });
        }

        let same_currency = draft.currency == base_currency;
        if !Self::rate_acceptable(draft.exchange_rate, same_currency) {
            return Err(JournalValidationError::InvalidExchangeRate {
                line: None,
                rate: draft.exchange_rate,
            });
        }

        for (index, line) in draft.lines.iter().enumerate() {
            Self::check_line(line_no(index), line, same_currency)?;
        }

        Ok(())
    }

    /// Whether an amount fits the stored precision and magnitude.
    #[must_use]
    pub fn amount_in_range(amount: Decimal) -> bool {
        amount.scale() <= Self::MAX_AMOUNT_SCALE && amount.abs() < Decimal::from(Self::AMOUNT_LIMIT)
    }

    fn rate_acceptable(rate: Decimal, same_currency: bool) -> bool {
        if same_currency {
            rate == Decimal::ONE
        } else {
            rate > Decimal::ZERO
        }
    }

    fn check_line(
        line_number: u32,
        line: &JournalLineInput,
        same_currency: bool,
    ) -> Result<(), JournalValidationError> {
        let negative_base = line.base_debit.is_some_and(|v| v < Decimal::ZERO)
            || line.base_credit.is_some_and(|v| v < Decimal::ZERO);
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO || negative_base {
            return Err(JournalValidationError::NegativeAmount { line: line_number });
        }

        let supplied = [Some(line.debit), Some(line.credit), line.base_debit, line.base_credit];
        if !supplied.into_iter().flatten().all(Self::amount_in_range) {
            return Err(JournalValidationError::AmountOutOfRange {
                line: Some(line_number),
            });
        }

        match (line.debit > Decimal::ZERO, line.credit > Decimal::ZERO) {
            (true, true) => {
                return Err(JournalValidationError::BothSidesNonZero { line: line_number });
            }
            (false, false) => return Err(JournalValidationError::NoAmount { line: line_number }),
            _ => {}
        }

        if line.dimensions.len() > Self::MAX_DIMENSIONS {
            return Err(JournalValidationError::TooManyDimensions {
                line: line_number,
                count: line.dimensions.len(),
                max: Self::MAX_DIMENSIONS,
            });
        }

        if let Some(rate) = line.exchange_rate
            && !Self::rate_acceptable(rate, same_currency)
        {
            return Err(JournalValidationError::InvalidExchangeRate {
                line: Some(line_number),
                rate,
            });
        }

        Ok(())
    }

    fn resolve_accounts<A>(
        draft: &JournalEntryDraft,
        resolve_account: &A,
    ) -> Result<Vec<AccountInfo>, JournalValidationError>
    where
        A: Fn(&AccountRef) -> Option<AccountInfo>,
    {
        draft
            .lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let account = resolve_account(&line.account).ok_or_else(|| {
                    JournalValidationError::UnknownAccount {
                        line: line_no(index),
                        account: line.account.to_string(),
                    }
                })?;
                if !account.is_active || !account.allow_direct_posting {
                    return Err(JournalValidationError::InactiveAccount {
                        line: line_no(index),
                        account: account.code,
                    });
                }
                Ok(account)
            })
            .collect()
    }

    fn compute_balances(
        &self,
        draft: &JournalEntryDraft,
        base_currency: CurrencyCode,
        accounts: &[AccountInfo],
    ) -> Result<ValidatedEntry, JournalValidationError> {
        let same_currency = draft.currency == base_currency;

        let lines = draft
            .lines
            .iter()
            .zip(accounts)
            .enumerate()
            .map(|(index, (input, account))| {
                let out_of_range = || JournalValidationError::AmountOutOfRange {
                    line: Some(line_no(index)),
                };
                let (base_debit, base_credit) = if same_currency {
                    (input.debit, input.credit)
                } else if input.base_debit.is_some() || input.base_credit.is_some() {
                    (
                        input.base_debit.unwrap_or(Decimal::ZERO),
                        input.base_credit.unwrap_or(Decimal::ZERO),
                    )
                } else {
                    let rate = input.exchange_rate.unwrap_or(draft.exchange_rate);
                    let debit = CurrencyService::checked_convert(input.debit, rate)
                        .filter(|v| v.abs() < Decimal::from(Self::AMOUNT_LIMIT))
                        .ok_or_else(out_of_range)?;
                    let credit = CurrencyService::checked_convert(input.credit, rate)
                        .filter(|v| v.abs() < Decimal::from(Self::AMOUNT_LIMIT))
                        .ok_or_else(out_of_range)?;
                    (debit, credit)
                };

                Ok(JournalLine {
                    id: JournalLineId::new(),
                    line_number: line_no(index),
                    account_id: account.id,
                    description: input.description.clone(),
                    debit: input.debit,
                    credit: input.credit,
                    base_debit,
                    base_credit,
                    exchange_rate: input.exchange_rate,
                    subledger: input.subledger.clone(),
                    dimensions: input.dimensions.clone(),
                    tax: input.tax.clone(),
                    intercompany: input.intercompany,
                    counterparty_scope_id: input.counterparty_scope_id,
                })
            })
            .collect::<Result<Vec<JournalLine>, JournalValidationError>>()?;

        let totals = JournalTotals::checked_of(&lines)
            .ok_or(JournalValidationError::AmountOutOfRange { line: None })?;

        if !self.tolerance.is_balanced(totals.debit, totals.credit) {
            return Err(JournalValidationError::Unbalanced {
                debit: totals.debit,
                credit: totals.credit,
                currency: draft.currency,
            });
        }

        if !self
            .tolerance
            .is_balanced(totals.base_debit, totals.base_credit)
        {
            return Err(JournalValidationError::UnbalancedBase {
                debit: totals.base_debit,
                credit: totals.base_credit,
                currency: base_currency,
            });
        }

        Ok(ValidatedEntry { lines, totals })
    }

    fn check_semantics<S>(
        draft: &JournalEntryDraft,
        subledger_exists: &S,
    ) -> Result<(), JournalValidationError>
    where
        S: Fn(&SubledgerLink) -> bool,
    {
        for (index, line) in draft.lines.iter().enumerate() {
            if line.intercompany && line.counterparty_scope_id.is_none() {
                return Err(JournalValidationError::MissingCounterparty {
                    line: line_no(index),
                });
            }
            if let Some(link) = &line.subledger
                && !subledger_exists(link)
            {
                return Err(JournalValidationError::UnknownSubledgerReference {
                    line: line_no(index),
                    reference: link.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::types::{EntryKind, SubledgerKind};
    use chrono::NaiveDate;
    use ledgerline_shared::types::{Actor, FiscalPeriodId, SubScopeId, TenantId, UserId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn account(code: &str) -> AccountInfo {
        AccountInfo {
            id: AccountId::new(),
            code: code.to_string(),
            name: format!("Account {code}"),
            is_active: true,
            allow_direct_posting: true,
        }
    }

    fn chart() -> Vec<AccountInfo> {
        vec![account("1000"), account("4000"), account("1200")]
    }

    fn lookup(chart: &[AccountInfo]) -> impl Fn(&AccountRef) -> Option<AccountInfo> + '_ {
        move |reference| match reference {
            AccountRef::Id(id) => chart.iter().find(|a| a.id == *id).cloned(),
            AccountRef::Code(code) => chart.iter().find(|a| &a.code == code).cloned(),
        }
    }

    fn code(c: &str) -> AccountRef {
        AccountRef::Code(c.to_string())
    }

    fn draft(currency: CurrencyCode, rate: Decimal, lines: Vec<JournalLineInput>) -> JournalEntryDraft {
        JournalEntryDraft {
            tenant_id: TenantId::new(),
            sub_scope_id: None,
            fiscal_period_id: FiscalPeriodId::new(),
            entry_date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            kind: EntryKind::Normal,
            source_module: "gl".to_string(),
            source_document: None,
            description: "Test entry".to_string(),
            notes: None,
            currency,
            exchange_rate: rate,
            lines,
            created_by: Actor::User(UserId::new()),
        }
    }

    fn usd(lines: Vec<JournalLineInput>) -> JournalEntryDraft {
        draft(CurrencyCode::USD, Decimal::ONE, lines)
    }

    fn validate(draft: &JournalEntryDraft, chart: &[AccountInfo]) -> Result<ValidatedEntry, JournalValidationError> {
        JournalValidator::default().validate(draft, CurrencyCode::USD, true, lookup(chart), |_| true)
    }

    #[test]
    fn test_balanced_entry_computes_totals() {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(500)),
            JournalLineInput::credit(code("4000"), dec!(500)),
        ]);

        let validated = validate(&entry, &chart).unwrap();
        assert_eq!(validated.totals.debit, dec!(500));
        assert_eq!(validated.totals.credit, dec!(500));
        assert_eq!(validated.totals.base_debit, dec!(500));
        assert_eq!(validated.lines[0].line_number, 1);
        assert_eq!(validated.lines[1].account_id, chart[1].id);
    }

    #[test]
    fn test_unbalanced_entry_rejected() {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(700)),
            JournalLineInput::credit(code("4000"), dec!(650)),
        ]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err.error_code(), "UNBALANCED");
        assert_eq!(
            err.to_string(),
            "Total debits (700.00) must equal total credits (650.00)"
        );
    }

    #[test]
    fn test_sub_tolerance_difference_accepted() {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(100.005)),
            JournalLineInput::credit(code("4000"), dec!(100)),
        ]);
        assert!(validate(&entry, &chart).is_ok());
    }

    #[test]
    fn test_structural_checked_before_referential() {
        let chart = chart();
        let entry = usd(vec![JournalLineInput::debit(code("9999"), dec!(10))]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err.error_code(), "TOO_FEW_LINES");
    }

    #[test]
    fn test_too_many_lines() {
        let chart = chart();
        let validator = JournalValidator::new(BalanceTolerance::DEFAULT, 3);
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(1)),
            JournalLineInput::debit(code("1000"), dec!(1)),
            JournalLineInput::debit(code("1000"), dec!(1)),
            JournalLineInput::credit(code("4000"), dec!(3)),
        ]);

        let err = validator
            .validate(&entry, CurrencyCode::USD, true, lookup(&chart), |_| true)
            .unwrap_err();
        assert_eq!(
            err,
            JournalValidationError::TooManyLines { count: 4, max: 3 }
        );
    }

    #[test]
    fn test_both_sides_nonzero() {
        let chart = chart();
        let mut line = JournalLineInput::debit(code("1000"), dec!(10));
        line.credit = dec!(10);
        let entry = usd(vec![line, JournalLineInput::credit(code("4000"), dec!(0.01))]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err, JournalValidationError::BothSidesNonZero { line: 1 });
    }

    #[test]
    fn test_neither_side_set() {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(10)),
            JournalLineInput::credit(code("4000"), Decimal::ZERO),
        ]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err, JournalValidationError::NoAmount { line: 2 });
    }

    #[test]
    fn test_negative_amount() {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(-10)),
            JournalLineInput::credit(code("4000"), dec!(10)),
        ]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err.error_code(), "NEGATIVE_AMOUNT");
    }

    #[test]
    fn test_too_many_dimensions() {
        let chart = chart();
        let mut line = JournalLineInput::debit(code("1000"), dec!(10));
        line.dimensions = vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()];
        let entry = usd(vec![line, JournalLineInput::credit(code("4000"), dec!(10))]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err.error_code(), "TOO_MANY_DIMENSIONS");
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_base_currency_document_requires_unit_rate() {
        let chart = chart();
        let entry = draft(
            CurrencyCode::USD,
            dec!(1.1),
            vec![
                JournalLineInput::debit(code("1000"), dec!(10)),
                JournalLineInput::credit(code("4000"), dec!(10)),
            ],
        );

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_EXCHANGE_RATE");
    }

    #[test]
    fn test_unknown_account() {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(10)),
            JournalLineInput::credit(code("9999"), dec!(10)),
        ]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(
            err,
            JournalValidationError::UnknownAccount {
                line: 2,
                account: "9999".to_string()
            }
        );
    }

    #[test]
    fn test_inactive_account() {
        let mut chart = chart();
        chart[1].is_active = false;
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(10)),
            JournalLineInput::credit(code("4000"), dec!(10)),
        ]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err.error_code(), "INACTIVE_ACCOUNT");
    }

    #[test]
    fn test_closed_period_checked_before_balance() {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), dec!(700)),
            JournalLineInput::credit(code("4000"), dec!(650)),
        ]);

        let err = JournalValidator::default()
            .validate(&entry, CurrencyCode::USD, false, lookup(&chart), |_| true)
            .unwrap_err();
        assert_eq!(err.error_code(), "CLOSED_PERIOD");
    }

    #[test]
    fn test_foreign_currency_base_amounts_from_header_rate() {
        let chart = chart();
        let entry = draft(
            CurrencyCode::EUR,
            dec!(1.05),
            vec![
                JournalLineInput::debit(code("1200"), dec!(1000)),
                JournalLineInput::credit(code("4000"), dec!(1000)),
            ],
        );

        let validated = validate(&entry, &chart).unwrap();
        assert_eq!(validated.lines[0].base_debit, dec!(1050));
        assert_eq!(validated.totals.base_credit, dec!(1050));
    }

    #[test]
    fn test_line_rate_override_can_unbalance_base() {
        let chart = chart();
        let mut debit = JournalLineInput::debit(code("1200"), dec!(1000));
        debit.exchange_rate = Some(dec!(1.10));
        let entry = draft(
            CurrencyCode::EUR,
            dec!(1.05),
            vec![debit, JournalLineInput::credit(code("4000"), dec!(1000))],
        );

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err.error_code(), "UNBALANCED_BASE");
        assert_eq!(
            err.to_string(),
            "Base currency total debits (1100.00) must equal total credits (1050.00)"
        );
    }

    #[test]
    fn test_imported_base_amounts_are_kept() {
        let chart = chart();
        let mut debit = JournalLineInput::debit(code("1200"), dec!(1000));
        debit.base_debit = Some(dec!(1077.77));
        let mut credit = JournalLineInput::credit(code("4000"), dec!(1000));
        credit.base_credit = Some(dec!(1077.77));
        let entry = draft(CurrencyCode::EUR, dec!(1.05), vec![debit, credit]);

        let validated = validate(&entry, &chart).unwrap();
        assert_eq!(validated.totals.base_debit, dec!(1077.77));
    }

    #[rstest]
    #[case::largest_allowed(dec!(999999999999999.9999), true)]
    #[case::at_limit(dec!(1000000000000000), false)]
    #[case::five_places(dec!(12.00001), false)]
    #[case::near_decimal_max(Decimal::MAX - Decimal::ONE, false)]
    fn test_amount_range(#[case] amount: Decimal, #[case] accepted: bool) {
        let chart = chart();
        let entry = usd(vec![
            JournalLineInput::debit(code("1000"), amount),
            JournalLineInput::credit(code("4000"), amount),
        ]);

        match validate(&entry, &chart) {
            Ok(validated) => {
                assert!(accepted);
                assert_eq!(validated.totals.debit, amount);
            }
            Err(err) => {
                assert!(!accepted);
                assert_eq!(err, JournalValidationError::AmountOutOfRange { line: Some(1) });
                assert_eq!(err.error_code(), "AMOUNT_OUT_OF_RANGE");
            }
        }
    }

    #[test]
    fn test_converted_base_amount_out_of_range() {
        let chart = chart();
        let entry = draft(
            CurrencyCode::EUR,
            dec!(10),
            vec![
                JournalLineInput::debit(code("1200"), dec!(999999999999999)),
                JournalLineInput::credit(code("4000"), dec!(999999999999999)),
            ],
        );

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err, JournalValidationError::AmountOutOfRange { line: Some(1) });
    }

    #[test]
    fn test_intercompany_requires_counterparty() {
        let chart = chart();
        let mut line = JournalLineInput::debit(code("1000"), dec!(10));
        line.intercompany = true;
        let entry = usd(vec![line.clone(), JournalLineInput::credit(code("4000"), dec!(10))]);

        let err = validate(&entry, &chart).unwrap_err();
        assert_eq!(err, JournalValidationError::MissingCounterparty { line: 1 });

        line.counterparty_scope_id = Some(SubScopeId::new());
        let entry = usd(vec![line, JournalLineInput::credit(code("4000"), dec!(10))]);
        assert!(validate(&entry, &chart).is_ok());
    }

    #[test]
    fn test_subledger_reference_must_resolve() {
        let chart = chart();
        let mut line = JournalLineInput::debit(code("1200"), dec!(10));
        line.subledger = Some(SubledgerLink {
            kind: SubledgerKind::Receivable,
            reference: "INV-404".to_string(),
        });
        let entry = usd(vec![line, JournalLineInput::credit(code("4000"), dec!(10))]);

        let err = JournalValidator::default()
            .validate(&entry, CurrencyCode::USD, true, lookup(&chart), |link| {
                link.reference != "INV-404"
            })
            .unwrap_err();
        assert_eq!(
            err,
            JournalValidationError::UnknownSubledgerReference {
                line: 1,
                reference: "receivable:INV-404".to_string()
            }
        );
    }
}
