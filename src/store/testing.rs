//! In-memory [`Gateway`] for store tests.
//!
//! Data is kept per trading mode so a test can tell which side of a mode
//! switch a value came from.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::oneshot;

use crate::api::{Gateway, MutationAck};
use crate::error::{DecodeError, StoreError, StoreResult};
use crate::models::{
    AccountSummary, Candle, CandleBatch, Holding, InstrumentSummary, OrderReceipt, OrderRequest,
    Quote, SettingsPatch, TOTAL_EVALUATION_KEY,
};

pub(crate) struct ModeData {
    pub total: String,
    pub watchlist: BTreeSet<String>,
    pub directory: Vec<InstrumentSummary>,
    pub holdings: Vec<Holding>,
}

struct MockState {
    settings: SettingsPatch,
    paper: ModeData,
    live: ModeData,
    names: HashMap<String, String>,
    candles: Vec<Candle>,
    quote_price: Option<Decimal>,
    failing: HashSet<&'static str>,
    malformed: HashSet<&'static str>,
    rejecting: HashSet<&'static str>,
    stalled_names: HashSet<String>,
    orders: Vec<OrderRequest>,
}

impl MockState {
    fn mode_data(&mut self) -> &mut ModeData {
        if self.settings.is_paper_trading.unwrap_or(true) {
            &mut self.paper
        } else {
            &mut self.live
        }
    }
}

pub(crate) struct MockGateway {
    state: Mutex<MockState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    summary_gates: Mutex<VecDeque<oneshot::Receiver<String>>>,
}

pub(crate) fn row(code: &str, name: &str, ratio: Decimal) -> InstrumentSummary {
    InstrumentSummary {
        code: code.to_string(),
        name: name.to_string(),
        current_price: dec!(10000),
        high_52_week: dec!(11000),
        ratio,
    }
}

pub(crate) fn candle(date: &str, high: Decimal, low: Decimal, close: Decimal) -> Candle {
    Candle {
        date: date.to_string(),
        open: close,
        high,
        low,
        close,
        volume: dec!(1000),
    }
}

fn codes(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|c| c.to_string()).collect()
}

impl MockGateway {
    /// Backend in live mode with a 14-candle ATR period and a 2% loss limit.
    pub fn new() -> Self {
        let names = [
            ("005930", "삼성전자"),
            ("000660", "SK하이닉스"),
            ("035720", "카카오"),
            ("123450", "하나스팩12호"),
        ]
        .into_iter()
        .map(|(c, n)| (c.to_string(), n.to_string()))
        .collect();

        let state = MockState {
            settings: SettingsPatch {
                atr_period: Some(14),
                max_loss_ratio: Some(dec!(-0.02)),
                is_paper_trading: Some(false),
            },
            live: ModeData {
                total: "3,000,000".to_string(),
                watchlist: codes(&["005930"]),
                directory: vec![row("005930", "삼성전자", dec!(0.97))],
                holdings: vec![Holding {
                    code: "005930".to_string(),
                    name: "삼성전자".to_string(),
                    quantity: 10,
                    available_quantity: Some(10),
                    avg_price: Some(dec!(68000)),
                    current_price: Some(dec!(70000)),
                    evaluation_amount: Some(700_000),
                    profit_loss: Some(20_000),
                    profit_loss_rate: Some(dec!(2.94)),
                }],
            },
            paper: ModeData {
                total: "10,000,000".to_string(),
                watchlist: codes(&["000660", "035720"]),
                directory: vec![
                    row("035720", "카카오", dec!(0.90)),
                    row("123450", "하나스팩12호", dec!(0.99)),
                    row("000660", "SK하이닉스", dec!(0.98)),
                ],
                holdings: Vec::new(),
            },
            names,
            candles: vec![
                candle("2024-01-02", dec!(10), dec!(8), dec!(9)),
                candle("2024-01-03", dec!(11), dec!(9), dec!(10)),
                candle("2024-01-04", dec!(12), dec!(10), dec!(11)),
            ],
            quote_price: Some(dec!(11)),
            failing: HashSet::new(),
            malformed: HashSet::new(),
            rejecting: HashSet::new(),
            stalled_names: HashSet::new(),
            orders: Vec::new(),
        };

        Self {
            state: Mutex::new(state),
            calls: Mutex::new(HashMap::new()),
            summary_gates: Mutex::new(VecDeque::new()),
        }
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    /// Make `endpoint` fail with a transport error until cleared.
    pub fn set_failing(&self, endpoint: &'static str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing.insert(endpoint);
        } else {
            state.failing.remove(endpoint);
        }
    }

    /// Make `endpoint` answer with a body that does not decode.
    pub fn set_malformed(&self, endpoint: &'static str) {
        self.state.lock().unwrap().malformed.insert(endpoint);
    }

    /// Never answer name lookups for `code`.
    pub fn stall_name(&self, code: &str) {
        self.state.lock().unwrap().stalled_names.insert(code.to_string());
    }

    /// Make the mutation `endpoint` answer without a confirmation.
    pub fn set_rejecting(&self, endpoint: &'static str) {
        self.state.lock().unwrap().rejecting.insert(endpoint);
    }

    /// Replace what `GET /settings` returns, bypassing the store.
    pub fn set_server_settings(&self, settings: SettingsPatch) {
        self.state.lock().unwrap().settings = settings;
    }

    pub fn set_total(&self, paper: bool, total: &str) {
        let mut state = self.state.lock().unwrap();
        let data = if paper { &mut state.paper } else { &mut state.live };
        data.total = total.to_string();
    }

    pub fn set_quote_price(&self, price: Option<Decimal>) {
        self.state.lock().unwrap().quote_price = price;
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().orders.clone()
    }

    /// Hold the next account summary response until the returned sender
    /// supplies its total.
    pub fn gate_account_summary(&self) -> oneshot::Sender<String> {
        let (tx, rx) = oneshot::channel();
        self.summary_gates.lock().unwrap().push_back(rx);
        tx
    }

    fn current_total(&self) -> String {
        self.state.lock().unwrap().mode_data().total.clone()
    }

    fn enter(&self, endpoint: &'static str) -> StoreResult<()> {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;
        let state = self.state.lock().unwrap();
        if state.failing.contains(endpoint) {
            return Err(StoreError::transport(endpoint, "connection refused"));
        }
        if state.malformed.contains(endpoint) {
            return Err(StoreError::decode(endpoint, DecodeError::invalid("현재가", "N/A")));
        }
        Ok(())
    }

    fn confirm(&self, endpoint: &'static str) -> StoreResult<MutationAck> {
        if self.state.lock().unwrap().rejecting.contains(endpoint) {
            return Err(StoreError::rejected(endpoint, 200, "not confirmed"));
        }
        Ok(MutationAck {
            message: "ok".to_string(),
        })
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn fetch_settings(&self) -> StoreResult<SettingsPatch> {
        self.enter("settings")?;
        Ok(self.state.lock().unwrap().settings.clone())
    }

    async fn update_settings(&self, patch: &SettingsPatch) -> StoreResult<MutationAck> {
        self.enter("update_settings")?;
        let ack = self.confirm("update_settings")?;
        let mut state = self.state.lock().unwrap();
        if patch.atr_period.is_some() {
            state.settings.atr_period = patch.atr_period;
        }
        if patch.max_loss_ratio.is_some() {
            state.settings.max_loss_ratio = patch.max_loss_ratio;
        }
        if patch.is_paper_trading.is_some() {
            state.settings.is_paper_trading = patch.is_paper_trading;
        }
        Ok(ack)
    }

    async fn fetch_watchlist(&self) -> StoreResult<Vec<String>> {
        self.enter("watchlist")?;
        let mut state = self.state.lock().unwrap();
        Ok(state.mode_data().watchlist.iter().cloned().collect())
    }

    async fn add_to_watchlist(&self, code: &str) -> StoreResult<MutationAck> {
        self.enter("watch")?;
        let ack = self.confirm("watch")?;
        self.state
            .lock()
            .unwrap()
            .mode_data()
            .watchlist
            .insert(code.to_string());
        Ok(ack)
    }

    async fn remove_from_watchlist(&self, code: &str) -> StoreResult<MutationAck> {
        self.enter("unwatch")?;
        let ack = self.confirm("unwatch")?;
        self.state.lock().unwrap().mode_data().watchlist.remove(code);
        Ok(ack)
    }

    async fn fetch_directory(&self) -> StoreResult<Vec<InstrumentSummary>> {
        self.enter("directory")?;
        let mut state = self.state.lock().unwrap();
        Ok(state.mode_data().directory.clone())
    }

    async fn fetch_name(&self, code: &str) -> StoreResult<String> {
        self.enter("name")?;
        let stalled = self.state.lock().unwrap().stalled_names.contains(code);
        if stalled {
            futures::future::pending::<()>().await;
        }
        // Let concurrent callers run before this lookup settles.
        tokio::task::yield_now().await;
        self.state
            .lock()
            .unwrap()
            .names
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::rejected("name", 404, format!("unknown code {}", code)))
    }

    async fn fetch_account_summary(&self) -> StoreResult<AccountSummary> {
        self.enter("account_summary")?;
        let gate = self.summary_gates.lock().unwrap().pop_front();
        let total = match gate {
            Some(rx) => rx
                .await
                .map_err(|_| StoreError::transport("account_summary", "gate dropped"))?,
            None => self.current_total(),
        };

        let mut summary = AccountSummary::new();
        summary.insert(TOTAL_EVALUATION_KEY.to_string(), total);
        summary.insert("예수금".to_string(), "1,000,000".to_string());
        Ok(summary)
    }

    async fn fetch_candles(&self, _code: &str) -> StoreResult<CandleBatch> {
        self.enter("candles")?;
        Ok(CandleBatch {
            candles: self.state.lock().unwrap().candles.clone(),
            discarded: 0,
        })
    }

    async fn fetch_quote(&self, code: &str) -> StoreResult<Quote> {
        self.enter("quote")?;
        let state = self.state.lock().unwrap();
        Ok(Quote {
            code: code.to_string(),
            name: state.names.get(code).cloned().unwrap_or_default(),
            current_price: state.quote_price,
            ..Default::default()
        })
    }

    async fn fetch_holdings(&self) -> StoreResult<Vec<Holding>> {
        self.enter("holdings")?;
        let mut state = self.state.lock().unwrap();
        Ok(state.mode_data().holdings.clone())
    }

    async fn submit_order(&self, order: &OrderRequest) -> StoreResult<OrderReceipt> {
        self.enter("order")?;
        self.state.lock().unwrap().orders.push(order.clone());
        Ok(OrderReceipt {
            accepted: true,
            message: format!("{} {}주 주문 완료", order.code, order.quantity),
        })
    }
}
