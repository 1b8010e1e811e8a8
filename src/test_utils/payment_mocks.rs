//! In-memory mock implementations for the payment repository ports.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::payment::{
        OrderProfile, OrderRepo, SettleOutcome, Settlement, SettlementRepo, StudyPackProfile,
        StudyPackRepo, TransactionProfile, TransactionRecord, TransactionRepo,
    },
    domain::entities::order_status::OrderStatus,
};

/// In-memory implementation of OrderRepo for testing.
#[derive(Default)]
pub struct InMemoryOrderRepo {
    pub orders: Mutex<HashMap<i64, OrderProfile>>,
}

impl InMemoryOrderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repo with initial orders for testing.
    pub fn with_orders(orders: Vec<OrderProfile>) -> Self {
        let map: HashMap<i64, OrderProfile> = orders.into_iter().map(|o| (o.id, o)).collect();
        Self {
            orders: Mutex::new(map),
        }
    }
}

#[async_trait]
impl OrderRepo for InMemoryOrderRepo {
    async fn create(&self, user_id: i64, pack: &StudyPackProfile) -> AppResult<OrderProfile> {
        let mut orders = self.orders.lock().unwrap();
        let id = orders.keys().max().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        let order = OrderProfile {
            id,
            user_id,
            pack_id: pack.id,
            pack_name: Some(pack.name.clone()),
            price_vnd: pack.price_vnd,
            status: OrderStatus::Pending,
            started_at: now,
            expires_at: None,
            created_at: now,
        };
        orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_by_id(&self, order_id: i64) -> AppResult<Option<OrderProfile>> {
        Ok(self.orders.lock().unwrap().get(&order_id).cloned())
    }

    async fn list_by_user(&self, user_id: i64) -> AppResult<Vec<OrderProfile>> {
        let mut orders: Vec<OrderProfile> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }
}

/// In-memory implementation of StudyPackRepo for testing.
#[derive(Default)]
pub struct InMemoryStudyPackRepo {
    pub packs: Mutex<HashMap<i64, StudyPackProfile>>,
}

impl InMemoryStudyPackRepo {
    pub fn with_packs(packs: Vec<StudyPackProfile>) -> Self {
        Self {
            packs: Mutex::new(packs.into_iter().map(|p| (p.id, p)).collect()),
        }
    }
}

#[async_trait]
impl StudyPackRepo for InMemoryStudyPackRepo {
    async fn get_active(&self, pack_id: i64) -> AppResult<Option<StudyPackProfile>> {
        Ok(self.packs.lock().unwrap().get(&pack_id).cloned())
    }
}

/// In-memory implementation of TransactionRepo, one row per order.
#[derive(Default)]
pub struct InMemoryTransactionRepo {
    pub transactions: Mutex<HashMap<i64, TransactionProfile>>,
}

impl InMemoryTransactionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepo for InMemoryTransactionRepo {
    async fn find_by_order(&self, order_id: i64) -> AppResult<Option<TransactionProfile>> {
        Ok(self.transactions.lock().unwrap().get(&order_id).cloned())
    }

    async fn upsert(&self, record: TransactionRecord) -> AppResult<TransactionProfile> {
        Ok(upsert_into(&mut self.transactions.lock().unwrap(), record))
    }
}

fn upsert_into(
    transactions: &mut HashMap<i64, TransactionProfile>,
    record: TransactionRecord,
) -> TransactionProfile {
    let id = match transactions.get(&record.order_id) {
        Some(existing) => existing.id,
        None => transactions.len() as i64 + 1,
    };
    let profile = TransactionProfile {
        id,
        order_id: record.order_id,
        provider: record.provider,
        provider_txn_id: record.provider_txn_id,
        method: record.method,
        amount_vnd: record.amount_vnd,
        status: record.status,
        message: record.message,
        raw_payload: record.raw_payload,
    };
    transactions.insert(profile.order_id, profile.clone());
    profile
}

/// Settles against the shared order and transaction maps, holding both
/// locks for the whole call. Can be told to fail the premium upgrade once.
pub struct InMemorySettlementRepo {
    orders: Arc<InMemoryOrderRepo>,
    transactions: Arc<InMemoryTransactionRepo>,
    pub premium_users: Mutex<HashSet<i64>>,
    fail_premium: AtomicBool,
}

impl InMemorySettlementRepo {
    pub fn new(orders: Arc<InMemoryOrderRepo>, transactions: Arc<InMemoryTransactionRepo>) -> Self {
        Self {
            orders,
            transactions,
            premium_users: Mutex::new(HashSet::new()),
            fail_premium: AtomicBool::new(false),
        }
    }

    /// The next settlement that grants premium fails before writing anything.
    pub fn fail_premium_once(&self) {
        self.fail_premium.store(true, Ordering::SeqCst);
    }

    pub fn is_premium(&self, user_id: i64) -> bool {
        self.premium_users.lock().unwrap().contains(&user_id)
    }
}

#[async_trait]
impl SettlementRepo for InMemorySettlementRepo {
    async fn settle(&self, settlement: Settlement) -> AppResult<SettleOutcome> {
        let mut orders = self.orders.orders.lock().unwrap();
        let mut transactions = self.transactions.transactions.lock().unwrap();

        let order = orders
            .get_mut(&settlement.order_id)
            .ok_or(AppError::NotFound)?;
        if transactions
            .get(&settlement.order_id)
            .is_some_and(|t| t.status.is_confirmed())
        {
            return Ok(SettleOutcome::AlreadyConfirmed);
        }
        if settlement.grant_premium && self.fail_premium.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database("premium upgrade failed".to_string()));
        }

        order.status = settlement.order_status;
        if settlement.expires_at.is_some() {
            order.expires_at = settlement.expires_at;
        }
        upsert_into(&mut transactions, settlement.transaction);
        if settlement.grant_premium {
            self.premium_users.lock().unwrap().insert(settlement.user_id);
        }
        Ok(SettleOutcome::Applied)
    }
}
