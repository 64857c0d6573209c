use serde::{Deserialize, Serialize};

/// Position direction for a futures symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    None,
    Long,
    Short,
}

impl Side {
    /// Order side that closes a position in this direction
    pub fn closing_order_side(&self) -> Option<OrderSide> {
        match self {
            Side::Long => Some(OrderSide::Sell),
            Side::Short => Some(OrderSide::Buy),
            Side::None => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::None => write!(f, "NONE"),
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Directional trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Hold,
    Long,
    Short,
}

impl Signal {
    pub fn is_directional(&self) -> bool {
        matches!(self, Signal::Long | Signal::Short)
    }

    /// True if this signal points against an open position
    pub fn opposes(&self, side: Side) -> bool {
        matches!(
            (side, self),
            (Side::Long, Signal::Short) | (Side::Short, Signal::Long)
        )
    }

    /// Order side that opens a position in this direction
    pub fn opening_order_side(&self) -> Option<OrderSide> {
        match self {
            Signal::Long => Some(OrderSide::Buy),
            Signal::Short => Some(OrderSide::Sell),
            Signal::Hold => None,
        }
    }

    /// Position side resulting from acting on this signal
    pub fn position_side(&self) -> Side {
        match self {
            Signal::Long => Side::Long,
            Signal::Short => Side::Short,
            Signal::Hold => Side::None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Hold => write!(f, "HOLD"),
            Signal::Long => write!(f, "LONG"),
            Signal::Short => write!(f, "SHORT"),
        }
    }
}

/// Order side as submitted to the exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exchange-reported order status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    Unknown,
}

impl OrderStatus {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "NEW" => OrderStatus::New,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
            _ => OrderStatus::Unknown,
        }
    }

    /// Terminal with no possibility of further fills
    pub fn is_dead(&self) -> bool {
        matches!(
            self,
            OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Per-symbol position record, persisted across evaluation cycles
///
/// Invariant: `side == Side::None` implies `qty == 0.0` and `entry_price == 0.0`.
/// The reconciler overwrites side/qty/entry_price from the exchange every cycle
/// before any decision logic runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionRecord {
    pub side: Side,
    pub qty: f64,
    pub entry_price: f64,
    /// Unix seconds; None when flat or unrecoverable
    pub entry_time: Option<i64>,
    /// Last signal observed, for debouncing (independent of `side`)
    pub last_signal: Signal,
    /// True once the 10% tier has fired for the current open position
    pub partial_take_profit_done: bool,
}

impl Default for PositionRecord {
    fn default() -> Self {
        Self {
            side: Side::None,
            qty: 0.0,
            entry_price: 0.0,
            entry_time: None,
            last_signal: Signal::Hold,
            partial_take_profit_done: false,
        }
    }
}

impl PositionRecord {
    /// Reset to the flat state, clearing entry bookkeeping
    pub fn flatten(&mut self) {
        self.side = Side::None;
        self.qty = 0.0;
        self.entry_price = 0.0;
        self.entry_time = None;
        self.partial_take_profit_done = false;
    }
}

/// Final fill state of one market order submission
///
/// Ephemeral: consumed immediately by the caller, never persisted. All failure
/// modes of submission and polling are captured here instead of propagating.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub success: bool,
    pub symbol: String,
    pub side: OrderSide,
    pub executed_qty: f64,
    pub avg_price: f64,
    pub order_id: Option<i64>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl OrderOutcome {
    pub fn filled(symbol: &str, side: OrderSide, qty: f64, avg_price: f64, order_id: i64) -> Self {
        Self {
            success: true,
            symbol: symbol.to_string(),
            side,
            executed_qty: qty,
            avg_price,
            order_id: Some(order_id),
            error: None,
            warning: None,
        }
    }

    pub fn partial(
        symbol: &str,
        side: OrderSide,
        qty: f64,
        avg_price: f64,
        order_id: i64,
        warning: String,
    ) -> Self {
        Self {
            success: true,
            symbol: symbol.to_string(),
            side,
            executed_qty: qty,
            avg_price,
            order_id: Some(order_id),
            error: None,
            warning: Some(warning),
        }
    }

    pub fn failed(symbol: &str, side: OrderSide, order_id: Option<i64>, error: String) -> Self {
        Self {
            success: false,
            symbol: symbol.to_string(),
            side,
            executed_qty: 0.0,
            avg_price: 0.0,
            order_id,
            error: Some(error),
            warning: None,
        }
    }

    /// True iff any non-zero quantity actually executed
    pub fn is_success(&self) -> bool {
        self.success && self.executed_qty > 0.0
    }

    /// Human-readable failure cause for logs and notifications
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.warning.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Exchange-reported position for one symbol, treated as ground truth
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangePosition {
    pub side: Side,
    pub qty: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
}

impl ExchangePosition {
    pub fn flat() -> Self {
        Self {
            side: Side::None,
            qty: 0.0,
            entry_price: 0.0,
            mark_price: 0.0,
            unrealized_pnl: 0.0,
        }
    }
}

/// Account snapshot read at the start of each per-symbol cycle
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub balance: f64,
    pub position: ExchangePosition,
}

/// Exchange lot constraints for a symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LotFilter {
    pub min_qty: f64,
    pub step_size: f64,
}

impl Default for LotFilter {
    fn default() -> Self {
        // Fallback when the exchange-info lookup yields nothing
        Self {
            min_qty: 0.01,
            step_size: 0.01,
        }
    }
}

/// Order state as returned by submission or a status query
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: i64,
    pub status: OrderStatus,
    pub executed_qty: f64,
    pub avg_price: f64,
}

/// Historical order, used only for entry-time recovery
#[derive(Debug, Clone)]
pub struct PastOrder {
    pub order_id: i64,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub avg_price: f64,
    pub update_time_ms: i64,
}

/// OHLCV bar from the exchange
#[derive(Debug, Clone)]
pub struct Kline {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
