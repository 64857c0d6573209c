use std::sync::Arc;

use crate::execution::order::OrderExecutor;
use crate::models::{AccountContext, LotFilter, PositionRecord, Side, Signal};
use crate::notify::Notifier;
use crate::risk::{align_to_step, pnl_and_price_pct};

/// Take-profit thresholds as account-equity percentages
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub full_take_profit_pct: f64,
    pub partial_take_profit_pct: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            full_take_profit_pct: 15.0,
            partial_take_profit_pct: 10.0,
        }
    }
}

/// Per-symbol position state machine: open, two-tier take-profit,
/// close-then-reverse
///
/// Each call takes the reconciled record and returns the updated one; order
/// failures leave the record untouched except for the deliberate
/// close-succeeded-but-reopen-failed case, which leaves the record flat.
pub struct PositionLifecycle {
    executor: OrderExecutor,
    notifier: Arc<dyn Notifier>,
    config: LifecycleConfig,
}

impl PositionLifecycle {
    pub fn new(
        executor: OrderExecutor,
        notifier: Arc<dyn Notifier>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            executor,
            notifier,
            config,
        }
    }

    /// Decide and sequence the action for one symbol this cycle
    #[allow(clippy::too_many_arguments)]
    pub async fn apply(
        &self,
        symbol: &str,
        effective: Signal,
        record: PositionRecord,
        ctx: &AccountContext,
        sized_qty: f64,
        lot: &LotFilter,
        now_ts: i64,
        current_price: f64,
    ) -> PositionRecord {
        let side = ctx.position.side;

        if side == Side::None {
            return self
                .open_from_flat(symbol, effective, record, ctx, sized_qty, now_ts)
                .await;
        }

        self.manage_open_position(
            symbol,
            effective,
            record,
            ctx,
            sized_qty,
            lot,
            now_ts,
            current_price,
        )
        .await
    }

    async fn open_from_flat(
        &self,
        symbol: &str,
        effective: Signal,
        mut record: PositionRecord,
        ctx: &AccountContext,
        sized_qty: f64,
        now_ts: i64,
    ) -> PositionRecord {
        record.entry_time = None;
        record.partial_take_profit_done = false;

        let Some(order_side) = effective.opening_order_side() else {
            return record;
        };

        if sized_qty <= 0.0 {
            tracing::info!("[{}] Sized quantity is 0, skipping open", symbol);
            return record;
        }

        let outcome = self
            .executor
            .submit_market_order(symbol, order_side, sized_qty)
            .await;

        if !outcome.is_success() {
            let reason = outcome.failure_reason();
            tracing::error!("[{}] Open {} failed: {}", symbol, effective, reason);
            self.notifier
                .notify_error(symbol, &format!("open {} failed: {}", effective, reason))
                .await;
            return record;
        }

        self.notifier
            .notify_open(
                symbol,
                order_side,
                outcome.executed_qty,
                outcome.avg_price,
                ctx.balance,
            )
            .await;
        tracing::info!(
            "[{}] Opened {} qty={} entry={:.2} balance={:.2}",
            symbol,
            effective,
            outcome.executed_qty,
            outcome.avg_price,
            ctx.balance
        );

        record.side = effective.position_side();
        record.qty = outcome.executed_qty;
        record.entry_price = outcome.avg_price;
        record.entry_time = Some(now_ts);
        record.partial_take_profit_done = false;
        record
    }

    #[allow(clippy::too_many_arguments)]
    async fn manage_open_position(
        &self,
        symbol: &str,
        effective: Signal,
        mut record: PositionRecord,
        ctx: &AccountContext,
        sized_qty: f64,
        lot: &LotFilter,
        now_ts: i64,
        current_price: f64,
    ) -> PositionRecord {
        let side = ctx.position.side;
        let qty = ctx.position.qty;
        let entry_price = ctx.position.entry_price;

        if entry_price > 0.0 && qty > 0.0 {
            let unrealized_pnl = ctx.position.unrealized_pnl;
            let (_, price_pct) = pnl_and_price_pct(side, entry_price, current_price, qty);
            let account_base = ctx.balance - unrealized_pnl;
            let pnl_pct_account = if account_base > 0.0 {
                unrealized_pnl / account_base * 100.0
            } else {
                price_pct
            };

            if pnl_pct_account >= self.config.full_take_profit_pct {
                return self
                    .full_take_profit(
                        symbol,
                        record,
                        ctx,
                        qty,
                        entry_price,
                        account_base,
                        pnl_pct_account,
                        price_pct,
                    )
                    .await;
            }

            if pnl_pct_account >= self.config.partial_take_profit_pct
                && !record.partial_take_profit_done
            {
                let (updated, done) = self
                    .partial_take_profit(
                        symbol,
                        record,
                        qty,
                        entry_price,
                        account_base,
                        pnl_pct_account,
                        price_pct,
                        lot,
                    )
                    .await;
                record = updated;
                if !done {
                    // failed partial close: no further action this cycle,
                    // eligible for retry next cycle
                    return record;
                }
            }
        }

        // Reversal check runs against the post-take-profit remaining quantity
        if !effective.opposes(side) {
            return record;
        }

        self.reverse(
            symbol,
            effective,
            record,
            ctx,
            sized_qty,
            now_ts,
            entry_price,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn full_take_profit(
        &self,
        symbol: &str,
        mut record: PositionRecord,
        ctx: &AccountContext,
        qty: f64,
        entry_price: f64,
        account_base: f64,
        pnl_pct_account: f64,
        price_pct: f64,
    ) -> PositionRecord {
        let side = ctx.position.side;
        let Some(close_side) = side.closing_order_side() else {
            return record;
        };

        tracing::info!(
            "[{}] Take-profit: account gain {:.2}% >= {:.0}% (price move {:.2}%), closing all",
            symbol,
            pnl_pct_account,
            self.config.full_take_profit_pct,
            price_pct
        );

        let outcome = self
            .executor
            .submit_market_order(symbol, close_side, qty)
            .await;

        if !outcome.is_success() {
            tracing::error!(
                "[{}] Take-profit close failed: {}",
                symbol,
                outcome.failure_reason()
            );
            return record;
        }

        let (pnl, close_price_pct) =
            pnl_and_price_pct(side, entry_price, outcome.avg_price, outcome.executed_qty);
        let close_account_pct = if account_base > 0.0 {
            pnl / account_base * 100.0
        } else {
            close_price_pct
        };

        self.notifier
            .notify_close(
                symbol,
                side,
                outcome.executed_qty,
                entry_price,
                outcome.avg_price,
                pnl,
                close_account_pct,
                "take-profit full close",
                ctx.balance,
            )
            .await;
        tracing::info!(
            "[{}] Take-profit close: {} qty={} entry={:.2} exit={:.2} pnl={:.4} (account {:.2}%, price {:.2}%)",
            symbol,
            side,
            outcome.executed_qty,
            entry_price,
            outcome.avg_price,
            pnl,
            close_account_pct,
            close_price_pct
        );

        record.flatten();
        record
    }

    #[allow(clippy::too_many_arguments)]
    async fn partial_take_profit(
        &self,
        symbol: &str,
        mut record: PositionRecord,
        qty: f64,
        entry_price: f64,
        account_base: f64,
        pnl_pct_account: f64,
        price_pct: f64,
        lot: &LotFilter,
    ) -> (PositionRecord, bool) {
        let side = record.side;
        let Some(close_side) = side.closing_order_side() else {
            return (record, false);
        };

        tracing::info!(
            "[{}] Partial take-profit: account gain {:.2}% >= {:.0}% (price move {:.2}%), closing 50%",
            symbol,
            pnl_pct_account,
            self.config.partial_take_profit_pct,
            price_pct
        );

        let mut close_qty = align_to_step(qty * 0.5, lot.step_size);
        if close_qty < lot.min_qty {
            close_qty = lot.min_qty;
        }
        close_qty = close_qty.min(qty);

        let outcome = self
            .executor
            .submit_market_order(symbol, close_side, close_qty)
            .await;

        if !outcome.is_success() {
            tracing::error!(
                "[{}] Partial take-profit failed: {}",
                symbol,
                outcome.failure_reason()
            );
            return (record, false);
        }

        let (pnl, partial_price_pct) =
            pnl_and_price_pct(side, entry_price, outcome.avg_price, outcome.executed_qty);
        let partial_account_pct = if account_base > 0.0 {
            pnl / account_base * 100.0
        } else {
            partial_price_pct
        };
        let remaining = (qty - outcome.executed_qty).max(0.0);

        tracing::info!(
            "[{}] Partial take-profit: closed {} remaining {:.4} pnl={:.4} (account {:.2}%, price {:.2}%)",
            symbol,
            outcome.executed_qty,
            remaining,
            pnl,
            partial_account_pct,
            partial_price_pct
        );

        record.qty = remaining;
        record.partial_take_profit_done = true;
        (record, true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn reverse(
        &self,
        symbol: &str,
        effective: Signal,
        mut record: PositionRecord,
        ctx: &AccountContext,
        sized_qty: f64,
        now_ts: i64,
        entry_price: f64,
    ) -> PositionRecord {
        let side = ctx.position.side;
        let remaining = record.qty;
        if remaining <= 0.0 {
            return record;
        }
        let (Some(close_side), Some(open_side)) =
            (side.closing_order_side(), effective.opening_order_side())
        else {
            return record;
        };

        let close = self
            .executor
            .submit_market_order(symbol, close_side, remaining)
            .await;

        if !close.is_success() {
            tracing::error!(
                "[{}] Reversal close failed, aborting: {}",
                symbol,
                close.failure_reason()
            );
            self.notifier
                .notify_error(
                    symbol,
                    &format!("reversal close failed: {}", close.failure_reason()),
                )
                .await;
            return record;
        }

        let (pnl, price_pct) =
            pnl_and_price_pct(side, entry_price, close.avg_price, close.executed_qty);
        self.notifier
            .notify_close(
                symbol,
                side,
                close.executed_qty,
                entry_price,
                close.avg_price,
                pnl,
                price_pct,
                "signal reversal",
                ctx.balance,
            )
            .await;
        tracing::info!(
            "[{}] Reversal close: {} qty={} entry={:.2} exit={:.2} pnl={:.4} ({:.2}%)",
            symbol,
            side,
            close.executed_qty,
            entry_price,
            close.avg_price,
            pnl,
            price_pct
        );

        let reopen = if sized_qty > 0.0 {
            self.executor
                .submit_market_order(symbol, open_side, sized_qty)
                .await
        } else {
            crate::models::OrderOutcome::failed(
                symbol,
                open_side,
                None,
                "sized quantity is 0".to_string(),
            )
        };

        if !reopen.is_success() {
            // Deliberate partial-success state: flat instead of reversed
            let reason = reopen.failure_reason();
            tracing::error!(
                "[{}] Close succeeded but re-open failed, position left flat: {}",
                symbol,
                reason
            );
            self.notifier.notify_reversal_left_flat(symbol, &reason).await;
            record.flatten();
            return record;
        }

        self.notifier
            .notify_reverse_open(symbol, open_side, reopen.executed_qty, reopen.avg_price)
            .await;
        tracing::info!(
            "[{}] Reversal open: {} qty={} entry={:.2} balance={:.2}",
            symbol,
            effective,
            reopen.executed_qty,
            reopen.avg_price,
            ctx.balance
        );

        record.side = effective.position_side();
        record.qty = reopen.executed_qty;
        record.entry_price = reopen.avg_price;
        record.entry_time = Some(now_ts);
        record.partial_take_profit_done = false;
        record
    }
}
