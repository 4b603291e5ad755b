//! EscrowService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;

    use escrow_repo::security::sign_payload;
    use escrow_types::domain::{
        DisputeStatusCount, PaymentId, PayoutStatus, SettlementId, SettlementType,
    };
    use escrow_types::ports::{
        DisputeResolution, GatewayError, ImageStore, ImageUpload, NewDispute, NewPayment,
        NewSettlement, NewShop, NewTransaction, NewUser, OtpProvider, PartyBinding,
        PayoutProvider, PayoutRequest, ShopChanges, SmsSender, TransactionChanges, UserChanges,
    };
    use escrow_types::{
        AppError, ConfirmPaymentRequest, CreateShopRequest, CreateTransactionRequest, Currency,
        Dispute, DisputeId, DisputeStatus, DomainError, EscrowRepository, LoginRequest,
        OpenDisputeRequest, PageRequest, PartyRole, Payment, PaymentStatus, RegisterRequest,
        RepoError, ResetPasswordRequest, Settlement, SettleDisputeRequest, Shop, ShopId,
        Transaction, TransactionFilter, TransactionId, TransactionStats, TransactionStatus, User,
        UserId,
    };

    use crate::outbound::NotConfigured;
    use crate::{EscrowService, Gateways, JwtManager};

    // ─────────────────────────────────────────────────────────────────────────
    // In-memory repository
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct Store {
        users: Vec<User>,
        transactions: Vec<Transaction>,
        payments: Vec<Payment>,
        disputes: Vec<Dispute>,
        settlements: Vec<Settlement>,
        shops: Vec<Shop>,
        sequence: u32,
    }

    impl Store {
        fn next_code(&mut self, prefix: &str) -> String {
            self.sequence += 1;
            format!("{}{:06}", prefix, self.sequence)
        }

        fn transaction_mut(&mut self, id: TransactionId) -> Result<&mut Transaction, RepoError> {
            self.transactions
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(RepoError::NotFound)
        }
    }

    fn expect_status(tx: &Transaction, expected: TransactionStatus) -> Result<(), RepoError> {
        if tx.status == expected {
            Ok(())
        } else {
            Err(RepoError::Domain(DomainError::InvalidState {
                expected,
                actual: tx.status,
            }))
        }
    }

    /// Simple in-memory repository for testing the service layer.
    pub struct MockRepo {
        store: Mutex<Store>,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                store: Mutex::new(Store::default()),
            }
        }
    }

    #[async_trait]
    impl EscrowRepository for MockRepo {
        async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
            let mut store = self.store.lock().unwrap();
            if store.users.iter().any(|u| u.phone == user.phone) {
                return Err(RepoError::Conflict("Duplicate field: phone".into()));
            }
            let now = Utc::now();
            let user = User {
                id: UserId::new(),
                name: user.name,
                email: user.email,
                phone: user.phone,
                user_code: store.next_code("U"),
                password_hash: user.password_hash,
                is_admin: user.is_admin,
                is_blocked: false,
                push_token: None,
                created_at: now,
                updated_at: now,
            };
            store.users.push(user.clone());
            Ok(user)
        }

        async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.users.iter().find(|u| u.id == id).cloned())
        }

        async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.users.iter().find(|u| u.phone == phone).cloned())
        }

        async fn find_user_by_code(&self, code: &str) -> Result<Option<User>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.users.iter().find(|u| u.user_code == code).cloned())
        }

        async fn list_users(&self) -> Result<Vec<User>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.users.iter().rev().cloned().collect())
        }

        async fn update_user(
            &self,
            id: UserId,
            changes: UserChanges,
        ) -> Result<Option<User>, RepoError> {
            let mut store = self.store.lock().unwrap();
            let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
                return Ok(None);
            };
            if let Some(name) = changes.name {
                user.name = name;
            }
            if let Some(email) = changes.email {
                user.email = Some(email);
            }
            if let Some(phone) = changes.phone {
                user.phone = phone;
            }
            Ok(Some(user.clone()))
        }

        async fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool, RepoError> {
            let mut store = self.store.lock().unwrap();
            match store.users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    user.password_hash = password_hash.to_string();
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn set_user_blocked(
            &self,
            id: UserId,
            blocked: bool,
        ) -> Result<Option<User>, RepoError> {
            let mut store = self.store.lock().unwrap();
            Ok(store.users.iter_mut().find(|u| u.id == id).map(|u| {
                u.is_blocked = blocked;
                u.clone()
            }))
        }

        async fn set_push_token(&self, id: UserId, token: Option<&str>) -> Result<bool, RepoError> {
            let mut store = self.store.lock().unwrap();
            match store.users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    user.push_token = token.map(str::to_string);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete_user(&self, id: UserId) -> Result<bool, RepoError> {
            let mut store = self.store.lock().unwrap();
            if store.transactions.iter().any(|t| t.is_party(id)) {
                return Err(RepoError::Conflict("User has transactions".into()));
            }
            let before = store.users.len();
            store.users.retain(|u| u.id != id);
            store.shops.retain(|s| s.owner_id != id);
            Ok(store.users.len() < before)
        }

        async fn create_transaction(&self, tx: NewTransaction) -> Result<Transaction, RepoError> {
            let mut store = self.store.lock().unwrap();
            let now = Utc::now();
            let tx = Transaction {
                id: TransactionId::new(),
                trans_code: store.next_code("ESGH-"),
                title: tx.title,
                description: tx.description,
                amount: tx.amount,
                currency: tx.currency,
                commission_fee: tx.commission_fee,
                buyer_id: tx.buyer_id,
                seller_id: tx.seller_id,
                initiated_by: tx.initiated_by,
                initiator_accepted: true,
                counterparty_accepted: false,
                counterparty_phone: tx.counterparty_phone,
                seller_momo_number: tx.seller_momo_number,
                delivery_number: tx.delivery_number,
                item_image: tx.item_image,
                status: TransactionStatus::Pending,
                is_funded: false,
                release_date: None,
                created_at: now,
                updated_at: now,
            };
            store.transactions.push(tx.clone());
            Ok(tx)
        }

        async fn get_transaction(
            &self,
            id: TransactionId,
        ) -> Result<Option<Transaction>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.transactions.iter().find(|t| t.id == id).cloned())
        }

        async fn find_transaction_by_code(
            &self,
            code: &str,
        ) -> Result<Option<Transaction>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .transactions
                .iter()
                .find(|t| t.trans_code == code)
                .cloned())
        }

        async fn list_transactions(
            &self,
            filter: &TransactionFilter,
            page: PageRequest,
        ) -> Result<(Vec<Transaction>, i64), RepoError> {
            let store = self.store.lock().unwrap();
            let matching: Vec<Transaction> = store
                .transactions
                .iter()
                .rev()
                .filter(|t| filter.status.is_none_or(|s| t.status == s))
                .filter(|t| filter.buyer_id.is_none_or(|b| t.buyer_id == Some(b)))
                .filter(|t| filter.seller_id.is_none_or(|s| t.seller_id == Some(s)))
                .filter(|t| filter.initiated_by.is_none_or(|r| t.initiated_by == r))
                .filter(|t| {
                    filter
                        .trans_code
                        .as_deref()
                        .is_none_or(|c| t.trans_code == c)
                })
                .cloned()
                .collect();
            let total = matching.len() as i64;
            let rows = matching
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .collect();
            Ok((rows, total))
        }

        async fn list_transactions_for_user(
            &self,
            user: UserId,
            limit: Option<i64>,
        ) -> Result<Vec<Transaction>, RepoError> {
            let store = self.store.lock().unwrap();
            let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
            Ok(store
                .transactions
                .iter()
                .rev()
                .filter(|t| t.is_party(user))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn transaction_stats(&self) -> Result<TransactionStats, RepoError> {
            let store = self.store.lock().unwrap();
            let count = |status| {
                store
                    .transactions
                    .iter()
                    .filter(|t| t.status == status)
                    .count() as i64
            };
            Ok(TransactionStats {
                total_transactions: store.transactions.len() as i64,
                total_value: store.transactions.iter().map(|t| t.amount).sum(),
                in_escrow: count(TransactionStatus::InEscrow),
                completed: count(TransactionStatus::Completed),
                disputed: count(TransactionStatus::Disputed),
            })
        }

        async fn update_transaction(
            &self,
            id: TransactionId,
            changes: TransactionChanges,
        ) -> Result<Option<Transaction>, RepoError> {
            let mut store = self.store.lock().unwrap();
            let Ok(tx) = store.transaction_mut(id) else {
                return Ok(None);
            };
            if let Some(title) = changes.title {
                tx.title = title;
            }
            if let Some(description) = changes.description {
                tx.description = Some(description);
            }
            if let Some(amount) = changes.amount {
                tx.amount = amount;
            }
            if let Some(fee) = changes.commission_fee {
                tx.commission_fee = fee;
            }
            if let Some(number) = changes.seller_momo_number {
                tx.seller_momo_number = Some(number);
            }
            if let Some(number) = changes.delivery_number {
                tx.delivery_number = Some(number);
            }
            Ok(Some(tx.clone()))
        }

        async fn set_transaction_status(
            &self,
            id: TransactionId,
            status: TransactionStatus,
        ) -> Result<Option<Transaction>, RepoError> {
            let mut store = self.store.lock().unwrap();
            Ok(store.transaction_mut(id).ok().map(|tx| {
                tx.status = status;
                tx.clone()
            }))
        }

        async fn accept_transaction(
            &self,
            id: TransactionId,
            binding: Option<PartyBinding>,
        ) -> Result<Transaction, RepoError> {
            let mut store = self.store.lock().unwrap();
            let tx = store.transaction_mut(id)?;
            if tx.counterparty_accepted || tx.status != TransactionStatus::Pending {
                return Err(RepoError::Conflict(
                    "Transaction was accepted concurrently".into(),
                ));
            }
            if let Some(binding) = binding {
                match binding.role {
                    PartyRole::Buyer => tx.buyer_id = Some(binding.user_id),
                    PartyRole::Seller => tx.seller_id = Some(binding.user_id),
                }
            }
            tx.counterparty_accepted = true;
            tx.status = TransactionStatus::Accepted;
            Ok(tx.clone())
        }

        async fn record_payment(
            &self,
            id: TransactionId,
            payment: NewPayment,
        ) -> Result<(Transaction, Payment), RepoError> {
            let mut store = self.store.lock().unwrap();
            let tx = store.transaction_mut(id)?;
            if payment.status == PaymentStatus::Success {
                expect_status(tx, TransactionStatus::Accepted)?;
                tx.status = TransactionStatus::InEscrow;
                tx.is_funded = true;
            }
            let tx = tx.clone();
            let payment = Payment {
                id: PaymentId::new(),
                transaction_id: id,
                user_id: payment.user_id,
                amount: payment.amount,
                currency: payment.currency,
                payment_method: payment.payment_method,
                reference: payment.reference,
                status: payment.status,
                created_at: Utc::now(),
            };
            store.payments.push(payment.clone());
            Ok((tx, payment))
        }

        async fn release_funds(
            &self,
            id: TransactionId,
            settlement: NewSettlement,
        ) -> Result<Settlement, RepoError> {
            let mut store = self.store.lock().unwrap();
            let tx = store.transaction_mut(id)?;
            expect_status(tx, TransactionStatus::InEscrow)?;
            tx.status = TransactionStatus::Completed;
            tx.release_date = Some(Utc::now());
            let settlement = new_settlement(id, settlement);
            store.settlements.push(settlement.clone());
            Ok(settlement)
        }

        async fn delete_transaction(&self, id: TransactionId) -> Result<bool, RepoError> {
            let mut store = self.store.lock().unwrap();
            let before = store.transactions.len();
            store.transactions.retain(|t| t.id != id);
            Ok(store.transactions.len() < before)
        }

        async fn get_payment_for_transaction(
            &self,
            id: TransactionId,
        ) -> Result<Option<Payment>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .payments
                .iter()
                .rev()
                .find(|p| p.transaction_id == id)
                .cloned())
        }

        async fn open_dispute(&self, dispute: NewDispute) -> Result<Dispute, RepoError> {
            let mut store = self.store.lock().unwrap();
            let tx = store.transaction_mut(dispute.transaction_id)?;
            expect_status(tx, TransactionStatus::InEscrow)?;
            tx.status = TransactionStatus::Disputed;
            let dispute = Dispute {
                id: DisputeId::new(),
                transaction_id: dispute.transaction_id,
                raised_by: dispute.raised_by,
                reason: dispute.reason,
                evidence_url: dispute.evidence_url,
                status: DisputeStatus::Open,
                resolution: None,
                resolved_by: None,
                resolved_at: None,
                created_at: Utc::now(),
            };
            store.disputes.push(dispute.clone());
            Ok(dispute)
        }

        async fn get_dispute(&self, id: DisputeId) -> Result<Option<Dispute>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.disputes.iter().find(|d| d.id == id).cloned())
        }

        async fn list_disputes(
            &self,
            status: Option<DisputeStatus>,
        ) -> Result<Vec<Dispute>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .disputes
                .iter()
                .rev()
                .filter(|d| status.is_none_or(|s| d.status == s))
                .cloned()
                .collect())
        }

        async fn list_disputes_for_transaction(
            &self,
            id: TransactionId,
        ) -> Result<Vec<Dispute>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .disputes
                .iter()
                .filter(|d| d.transaction_id == id)
                .cloned()
                .collect())
        }

        async fn list_disputes_for_user(&self, user: UserId) -> Result<Vec<Dispute>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .disputes
                .iter()
                .filter(|d| d.raised_by == user)
                .cloned()
                .collect())
        }

        async fn count_disputes_by_status(
            &self,
            user: UserId,
        ) -> Result<DisputeStatusCount, RepoError> {
            let store = self.store.lock().unwrap();
            let mut count = DisputeStatusCount::default();
            for dispute in store.disputes.iter().filter(|d| d.raised_by == user) {
                count.add(dispute.status, 1);
            }
            Ok(count)
        }

        async fn update_dispute_status(
            &self,
            id: DisputeId,
            status: DisputeStatus,
        ) -> Result<Option<Dispute>, RepoError> {
            let mut store = self.store.lock().unwrap();
            Ok(store.disputes.iter_mut().find(|d| d.id == id).map(|d| {
                d.status = status;
                d.clone()
            }))
        }

        async fn settle_dispute(
            &self,
            id: TransactionId,
            settlement: NewSettlement,
            resolution: DisputeResolution,
        ) -> Result<Settlement, RepoError> {
            let mut store = self.store.lock().unwrap();
            let tx = store.transaction_mut(id)?;
            expect_status(tx, TransactionStatus::Disputed)?;
            tx.status = TransactionStatus::Completed;
            let settlement = new_settlement(id, settlement);
            store.settlements.push(settlement.clone());
            for dispute in store
                .disputes
                .iter_mut()
                .filter(|d| d.transaction_id == id && d.status.is_active())
            {
                dispute.status = DisputeStatus::Resolved;
                dispute.resolution = Some(resolution.resolution.clone());
                dispute.resolved_by = Some(resolution.resolved_by);
                dispute.resolved_at = Some(Utc::now());
            }
            Ok(settlement)
        }

        async fn list_settlements(&self) -> Result<Vec<Settlement>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.settlements.iter().rev().cloned().collect())
        }

        async fn update_payout(
            &self,
            id: SettlementId,
            status: PayoutStatus,
            reference: Option<String>,
        ) -> Result<Option<Settlement>, RepoError> {
            let mut store = self.store.lock().unwrap();
            Ok(store.settlements.iter_mut().find(|s| s.id == id).map(|s| {
                s.payout_status = status;
                s.payout_reference = reference;
                s.clone()
            }))
        }

        async fn create_shop(&self, shop: NewShop) -> Result<Shop, RepoError> {
            let mut store = self.store.lock().unwrap();
            if store
                .shops
                .iter()
                .any(|s| s.shop_name.eq_ignore_ascii_case(&shop.shop_name))
            {
                return Err(RepoError::Conflict("Duplicate field: shop_name".into()));
            }
            let now = Utc::now();
            let shop = Shop {
                id: ShopId::new(),
                shop_code: store.next_code("SHOP-"),
                shop_name: shop.shop_name,
                description: shop.description,
                momo_number: shop.momo_number,
                email: shop.email,
                address: shop.address,
                location: shop.location,
                icon: shop.icon,
                owner_id: shop.owner_id,
                created_at: now,
                updated_at: now,
            };
            store.shops.push(shop.clone());
            Ok(shop)
        }

        async fn get_shop(&self, id: ShopId) -> Result<Option<Shop>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.shops.iter().find(|s| s.id == id).cloned())
        }

        async fn find_shop_by_name(&self, name: &str) -> Result<Option<Shop>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .shops
                .iter()
                .find(|s| s.shop_name.eq_ignore_ascii_case(name))
                .cloned())
        }

        async fn list_shops(&self) -> Result<Vec<Shop>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store.shops.iter().rev().cloned().collect())
        }

        async fn search_shops(&self, identifier: &str) -> Result<Vec<Shop>, RepoError> {
            let store = self.store.lock().unwrap();
            let needle = identifier.to_lowercase();
            Ok(store
                .shops
                .iter()
                .filter(|s| {
                    s.shop_code == identifier
                        || s.momo_number == identifier
                        || s.shop_name.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect())
        }

        async fn list_shops_for_owner(&self, owner: UserId) -> Result<Vec<Shop>, RepoError> {
            let store = self.store.lock().unwrap();
            Ok(store
                .shops
                .iter()
                .filter(|s| s.owner_id == owner)
                .cloned()
                .collect())
        }

        async fn update_shop(
            &self,
            id: ShopId,
            changes: ShopChanges,
        ) -> Result<Option<Shop>, RepoError> {
            let mut store = self.store.lock().unwrap();
            Ok(store.shops.iter_mut().find(|s| s.id == id).map(|s| {
                if let Some(name) = changes.shop_name {
                    s.shop_name = name;
                }
                if let Some(description) = changes.description {
                    s.description = description;
                }
                if let Some(number) = changes.momo_number {
                    s.momo_number = number;
                }
                if let Some(icon) = changes.icon {
                    s.icon = Some(icon);
                }
                s.clone()
            }))
        }

        async fn delete_shop(&self, id: ShopId) -> Result<bool, RepoError> {
            let mut store = self.store.lock().unwrap();
            let before = store.shops.len();
            store.shops.retain(|s| s.id != id);
            Ok(store.shops.len() < before)
        }
    }

    fn new_settlement(id: TransactionId, settlement: NewSettlement) -> Settlement {
        Settlement {
            id: SettlementId::new(),
            transaction_id: id,
            user_id: settlement.user_id,
            amount: settlement.amount,
            currency: settlement.currency,
            released_to: settlement.released_to,
            settlement_type: settlement.settlement_type,
            payout_status: PayoutStatus::Pending,
            payout_reference: None,
            created_at: Utc::now(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gateway doubles
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send_sms(&self, to: &str, message: &str) -> Result<(), GatewayError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), message.to_string()));
            Ok(())
        }
    }

    /// Accepts exactly one code.
    struct StaticOtp(&'static str);

    #[async_trait]
    impl OtpProvider for StaticOtp {
        async fn send_otp(&self, _phone: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn verify_otp(&self, _phone: &str, code: &str) -> Result<bool, GatewayError> {
            Ok(code == self.0)
        }
    }

    #[derive(Default)]
    struct RecordingPayouts {
        requests: Mutex<Vec<PayoutRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl PayoutProvider for RecordingPayouts {
        async fn payout(&self, request: PayoutRequest) -> Result<String, GatewayError> {
            self.requests.lock().unwrap().push(request);
            if self.fail {
                return Err(GatewayError::Rejected {
                    status: 400,
                    body: "insufficient float".into(),
                });
            }
            Ok("PAYOUT-1".into())
        }
    }

    struct FakeImages;

    #[async_trait]
    impl ImageStore for FakeImages {
        async fn upload(&self, image: ImageUpload) -> Result<String, GatewayError> {
            Ok(format!("https://images.test/{}", image.file_name))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fixtures
    // ─────────────────────────────────────────────────────────────────────────

    const ADMIN_PHONE: &str = "0200000001";
    const BUYER_PHONE: &str = "0241111111";
    const SELLER_PHONE: &str = "0552222222";
    const PASSWORD: &str = "Secret1!";
    const CALLBACK_SECRET: &str = "callback-secret";

    struct Harness {
        service: EscrowService<MockRepo>,
        sms: Arc<RecordingSms>,
        payouts: Arc<RecordingPayouts>,
    }

    fn harness_with(payouts: RecordingPayouts) -> Harness {
        let sms = Arc::new(RecordingSms::default());
        let payouts = Arc::new(payouts);
        let gateways = Gateways {
            images: Arc::new(FakeImages),
            sms: sms.clone(),
            otp: Arc::new(StaticOtp("123456")),
            push: Arc::new(NotConfigured("Push notifications")),
            payouts: payouts.clone(),
        };
        let service = EscrowService::new(MockRepo::new(), JwtManager::new("test-secret", 3600))
            .with_gateways(gateways)
            .with_admin_phones(vec![ADMIN_PHONE.to_string()])
            .with_callback_secret(Some(CALLBACK_SECRET.to_string()));
        Harness {
            service,
            sms,
            payouts,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingPayouts::default())
    }

    async fn register(service: &EscrowService<MockRepo>, name: &str, phone: &str) -> User {
        let auth = service
            .register(RegisterRequest {
                name: name.into(),
                email: None,
                phone: phone.into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap();
        service.authenticate(&auth.access_token).await.unwrap()
    }

    fn purchase(counterparty_phone: &str) -> CreateTransactionRequest {
        CreateTransactionRequest {
            title: "Used laptop".into(),
            description: None,
            amount: 50_000,
            currency: Currency::GHS,
            initiate_by: PartyRole::Buyer,
            counterparty_code: None,
            counterparty_phone: Some(counterparty_phone.into()),
            seller_momo_number: None,
            delivery_number: None,
            commission_fee: None,
        }
    }

    fn paid(reference: &str) -> ConfirmPaymentRequest {
        ConfirmPaymentRequest {
            reference: reference.into(),
            status: PaymentStatus::Success,
            payment_method: escrow_types::domain::PaymentMethod::Momo,
        }
    }

    /// Buyer and seller registered, transaction accepted and funded.
    async fn funded(h: &Harness) -> (User, User, TransactionId) {
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let seller = register(&h.service, "Adwoa", SELLER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();
        h.service.accept_transaction(&seller, ack.id).await.unwrap();
        h.service
            .confirm_payment(&buyer, ack.id, paid("MOMO-REF-1"))
            .await
            .unwrap();
        (buyer, seller, ack.id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_register_then_login() {
        let h = harness();
        let user = register(&h.service, "Kofi", "024 111 1111").await;
        assert_eq!(user.phone, BUYER_PHONE);
        assert!(!user.is_admin);

        let auth = h
            .service
            .login(LoginRequest {
                phone: BUYER_PHONE.into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap();
        assert_eq!(auth.user.id, user.id);

        let result = h
            .service
            .login(LoginRequest {
                phone: BUYER_PHONE.into(),
                password: "Wrong1!x".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_and_duplicate_phone() {
        let h = harness();
        let weak = h
            .service
            .register(RegisterRequest {
                name: "Kofi".into(),
                email: None,
                phone: BUYER_PHONE.into(),
                password: "secret".into(),
            })
            .await;
        assert!(matches!(weak, Err(AppError::BadRequest(_))));

        register(&h.service, "Kofi", BUYER_PHONE).await;
        let duplicate = h
            .service
            .register(RegisterRequest {
                name: "Other".into(),
                email: None,
                phone: BUYER_PHONE.into(),
                password: PASSWORD.into(),
            })
            .await;
        assert!(matches!(duplicate, Err(AppError::BadRequest(msg)) if msg.contains("phone")));
    }

    #[tokio::test]
    async fn test_admin_phone_registers_admin() {
        let h = harness();
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        assert!(admin.is_admin);

        let user = register(&h.service, "Kofi", BUYER_PHONE).await;
        assert!(matches!(
            h.service.list_users(&user).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(h.service.list_users(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_user_lookup_by_code() {
        let h = harness();
        let kofi = register(&h.service, "Kofi", BUYER_PHONE).await;

        let summary = h
            .service
            .get_user_by_code(&format!(" {} ", kofi.user_code))
            .await
            .unwrap();
        assert_eq!(summary.id, kofi.id);
        assert_eq!(summary.name, "Kofi");
        assert_eq!(summary.phone, BUYER_PHONE);

        let result = h.service.get_user_by_code("ZZZZZZ").await;
        assert!(matches!(result, Err(AppError::NotFound(msg)) if msg == "User not found"));
    }

    #[tokio::test]
    async fn test_blocked_user_cannot_authenticate() {
        let h = harness();
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        let auth = h
            .service
            .register(RegisterRequest {
                name: "Kofi".into(),
                email: None,
                phone: BUYER_PHONE.into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap();

        h.service
            .set_blocked(&admin, auth.user.id, true)
            .await
            .unwrap();

        let result = h.service.authenticate(&auth.access_token).await;
        assert!(matches!(result, Err(AppError::Forbidden(msg)) if msg.contains("blocked")));
    }

    #[tokio::test]
    async fn test_reset_password_requires_valid_otp() {
        let h = harness();
        register(&h.service, "Kofi", BUYER_PHONE).await;

        let wrong = h
            .service
            .reset_password(ResetPasswordRequest {
                phone: BUYER_PHONE.into(),
                code: "000000".into(),
                password: "Another2@".into(),
            })
            .await;
        assert!(matches!(wrong, Err(AppError::BadRequest(msg)) if msg == "Invalid or expired OTP"));

        h.service
            .reset_password(ResetPasswordRequest {
                phone: BUYER_PHONE.into(),
                code: "123456".into(),
                password: "Another2@".into(),
            })
            .await
            .unwrap();

        let auth = h
            .service
            .login(LoginRequest {
                phone: BUYER_PHONE.into(),
                password: "Another2@".into(),
            })
            .await;
        assert!(auth.is_ok());
    }

    #[tokio::test]
    async fn test_delete_user_with_transactions_conflicts() {
        let h = harness();
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        h.service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();

        let result = h.service.delete_user(&admin, buyer.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_transaction_computes_commission_and_notifies() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();
        assert_eq!(ack.message, "Transaction created successfully");

        let details = h.service.get_transaction(&buyer, ack.id).await.unwrap();
        let tx = details.transaction;
        assert_eq!(tx.status, TransactionStatus::Pending);
        // 3.5% of GHS 500
        assert_eq!(tx.commission_fee, 1_750);
        assert_eq!(tx.buyer_id, Some(buyer.id));
        assert_eq!(tx.seller_id, None);
        assert_eq!(tx.seller_momo_number.as_deref(), Some(SELLER_PHONE));
        assert!(tx.initiator_accepted);
        assert!(!tx.counterparty_accepted);

        let sent = h.sms.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, SELLER_PHONE);
        assert!(sent[0].1.contains(&tx.trans_code));
    }

    #[tokio::test]
    async fn test_create_transaction_uploads_image() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let image = ImageUpload {
            file_name: "laptop.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![1, 2, 3],
        };
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), Some(image))
            .await
            .unwrap();

        let tx = h.service.get_transaction(&buyer, ack.id).await.unwrap();
        assert_eq!(
            tx.transaction.item_image.as_deref(),
            Some("https://images.test/laptop.png")
        );
    }

    #[tokio::test]
    async fn test_create_transaction_requires_counterparty() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let mut req = purchase(SELLER_PHONE);
        req.counterparty_phone = None;

        let result = h.service.create_transaction(&buyer, req, None).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let mut req = purchase(BUYER_PHONE);
        req.counterparty_phone = Some(BUYER_PHONE.into());
        let result = h.service.create_transaction(&buyer, req, None).await;
        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "Invalid counterparty"));
    }

    #[tokio::test]
    async fn test_accept_claims_unregistered_side_by_phone() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();

        // Seller registers after being invited.
        let seller = register(&h.service, "Adwoa", SELLER_PHONE).await;
        let stranger = register(&h.service, "Yaw", "0273333333").await;

        let result = h.service.accept_transaction(&stranger, ack.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        let result = h.service.accept_transaction(&buyer, ack.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        h.service.accept_transaction(&seller, ack.id).await.unwrap();
        let tx = h.service.get_transaction(&seller, ack.id).await.unwrap();
        assert_eq!(tx.transaction.status, TransactionStatus::Accepted);
        assert_eq!(tx.transaction.seller_id, Some(seller.id));

        let again = h.service.accept_transaction(&seller, ack.id).await;
        assert!(
            matches!(again, Err(AppError::Forbidden(msg)) if msg == "Counterpart accepted already")
        );
    }

    #[tokio::test]
    async fn test_update_only_while_pending() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let seller = register(&h.service, "Adwoa", SELLER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();

        let updated = h
            .service
            .update_transaction(
                &buyer,
                ack.id,
                escrow_types::UpdateTransactionRequest {
                    amount: Some(10_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.amount, 10_000);
        // 5% of GHS 100
        assert_eq!(updated.commission_fee, 500);

        h.service.accept_transaction(&seller, ack.id).await.unwrap();
        let result = h
            .service
            .update_transaction(&buyer, ack.id, Default::default())
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_payment_requires_acceptance() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();

        let result = h
            .service
            .confirm_payment(&buyer, ack.id, paid("REF"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::BadRequest(msg)) if msg == "Your counterpart has not accepted this transaction yet."
        ));
    }

    #[tokio::test]
    async fn test_successful_payment_moves_funds_into_escrow() {
        let h = harness();
        let (buyer, _seller, id) = funded(&h).await;

        let details = h.service.get_transaction(&buyer, id).await.unwrap();
        assert_eq!(details.transaction.status, TransactionStatus::InEscrow);
        assert!(details.transaction.is_funded);

        let payment = details.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.amount, 50_000 + 1_750);

        let sent = h.sms.sent.lock().unwrap();
        assert!(sent.iter().any(|(to, msg)| to == SELLER_PHONE && msg.contains("Kofi")));
    }

    #[tokio::test]
    async fn test_failed_payment_keeps_transaction_accepted() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let seller = register(&h.service, "Adwoa", SELLER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();
        h.service.accept_transaction(&seller, ack.id).await.unwrap();

        let mut req = paid("REF-FAIL");
        req.status = PaymentStatus::Failed;
        let confirmation = h.service.confirm_payment(&buyer, ack.id, req).await.unwrap();
        assert_eq!(confirmation.status, "failed");

        let status = h
            .service
            .get_transaction_status(&buyer, ack.id)
            .await
            .unwrap();
        assert_eq!(status.status, TransactionStatus::Accepted);
    }

    #[tokio::test]
    async fn test_only_buyer_confirms_payment() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let seller = register(&h.service, "Adwoa", SELLER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();
        h.service.accept_transaction(&seller, ack.id).await.unwrap();

        let result = h.service.confirm_payment(&seller, ack.id, paid("REF")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_payment_callback_checks_signature() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let seller = register(&h.service, "Adwoa", SELLER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();
        h.service.accept_transaction(&seller, ack.id).await.unwrap();
        let tx = h.service.get_transaction(&buyer, ack.id).await.unwrap();

        let body = serde_json::to_vec(&serde_json::json!({
            "trans_code": tx.transaction.trans_code,
            "reference": "PROC-77",
            "status": "SUCCESS"
        }))
        .unwrap();

        let missing = h.service.payment_callback(&body, None).await;
        assert!(matches!(missing, Err(AppError::Unauthorized(_))));
        let forged = h
            .service
            .payment_callback(&body, Some(&sign_payload(&body, "wrong")))
            .await;
        assert!(matches!(forged, Err(AppError::Unauthorized(msg)) if msg == "Invalid signature"));

        let signature = sign_payload(&body, CALLBACK_SECRET);
        let confirmation = h
            .service
            .payment_callback(&body, Some(&signature))
            .await
            .unwrap();
        assert_eq!(confirmation.status, "success");

        let status = h
            .service
            .get_transaction_status(&buyer, ack.id)
            .await
            .unwrap();
        assert_eq!(status.status, TransactionStatus::InEscrow);
    }

    #[tokio::test]
    async fn test_payment_callback_unavailable_without_secret() {
        let service = EscrowService::new(MockRepo::new(), JwtManager::new("s", 60));
        let result = service.payment_callback(b"{}", Some("00")).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_release_funds_pays_out_seller() {
        let h = harness();
        let (buyer, seller, id) = funded(&h).await;

        let result = h.service.release_funds(&seller, id).await;
        assert!(matches!(
            result,
            Err(AppError::BadRequest(msg)) if msg == "Transaction not found or unauthorized."
        ));

        let ack = h.service.release_funds(&buyer, id).await.unwrap();
        assert_eq!(ack.message, "Funds released to seller.");

        let status = h.service.get_transaction_status(&buyer, id).await.unwrap();
        assert_eq!(status.status, TransactionStatus::Completed);

        let requests = h.payouts.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].msisdn, SELLER_PHONE);
        assert_eq!(requests[0].amount, 50_000);
        drop(requests);

        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        let settlements = h.service.list_settlements(&admin).await.unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(settlements[0].settlement_type, SettlementType::ReleaseToSeller);
        assert_eq!(settlements[0].released_to, seller.id.to_string());
        assert_eq!(settlements[0].payout_status, PayoutStatus::Sent);
        assert_eq!(settlements[0].payout_reference.as_deref(), Some("PAYOUT-1"));

        let again = h.service.release_funds(&buyer, id).await;
        assert!(matches!(
            again,
            Err(AppError::BadRequest(msg)) if msg == "Funds cannot be released at this stage."
        ));
    }

    #[tokio::test]
    async fn test_failed_payout_keeps_settlement() {
        let h = harness_with(RecordingPayouts {
            fail: true,
            ..Default::default()
        });
        let (buyer, _seller, id) = funded(&h).await;

        h.service.release_funds(&buyer, id).await.unwrap();

        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        let settlements = h.service.list_settlements(&admin).await.unwrap();
        assert_eq!(settlements[0].payout_status, PayoutStatus::Failed);
        let status = h.service.get_transaction_status(&buyer, id).await.unwrap();
        assert_eq!(status.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_transaction_visibility_and_stats() {
        let h = harness();
        let (buyer, _seller, id) = funded(&h).await;
        let stranger = register(&h.service, "Yaw", "0273333333").await;
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;

        let result = h.service.get_transaction(&stranger, id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(h.service.get_transaction(&admin, id).await.is_ok());

        let stats = h.service.transaction_stats(&admin).await.unwrap();
        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.in_escrow, 1);
        assert!(matches!(
            h.service.transaction_stats(&buyer).await,
            Err(AppError::Forbidden(_))
        ));

        let page = h
            .service
            .list_transactions(&admin, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.last_page, 1);
        assert!(page.data[0].buyer.is_some());

        assert_eq!(h.service.my_transactions(&buyer).await.unwrap().len(), 1);
        assert!(h.service.my_transactions(&stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_transactions_newest_first_and_capped() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let stranger = register(&h.service, "Yaw", "0273333333").await;

        let mut ids = Vec::new();
        for i in 0..7 {
            let mut req = purchase(SELLER_PHONE);
            req.title = format!("Item {}", i);
            let ack = h
                .service
                .create_transaction(&buyer, req, None)
                .await
                .unwrap();
            ids.push(ack.id);
        }

        let recent = h.service.recent_transactions(&buyer).await.unwrap();
        assert_eq!(recent.len(), 5);
        let expected: Vec<TransactionId> = ids.iter().rev().take(5).copied().collect();
        let got: Vec<TransactionId> = recent.iter().map(|t| t.id).collect();
        assert_eq!(got, expected);
        assert_eq!(recent[0].title, "Item 6");

        assert!(h.service.recent_transactions(&stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_by_code_open_to_any_signed_in_user() {
        let h = harness();
        let (buyer, seller, id) = funded(&h).await;
        let stranger = register(&h.service, "Yaw", "0273333333").await;

        let code = h
            .service
            .get_transaction(&buyer, id)
            .await
            .unwrap()
            .transaction
            .trans_code;

        // Visibility by id is party-only, by code it is not.
        assert!(matches!(
            h.service.get_transaction(&stranger, id).await,
            Err(AppError::Forbidden(_))
        ));
        let details = h
            .service
            .get_transaction_by_code(&format!("  {}  ", code))
            .await
            .unwrap();
        assert_eq!(details.transaction.id, id);
        assert_eq!(details.buyer.map(|u| u.id), Some(buyer.id));
        assert_eq!(details.seller.map(|u| u.id), Some(seller.id));
        assert!(details.payment.is_some());

        let result = h.service.get_transaction_by_code("ESGH-NOPE").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_admin_status_override() {
        let h = harness();
        let (buyer, seller, id) = funded(&h).await;
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;

        for caller in [&buyer, &seller] {
            let result = h
                .service
                .update_status(caller, id, TransactionStatus::Completed)
                .await;
            assert!(matches!(result, Err(AppError::Forbidden(_))));
        }
        let status = h.service.get_transaction_status(&buyer, id).await.unwrap();
        assert_eq!(status.status, TransactionStatus::InEscrow);

        // No transition rules: straight back to PENDING is allowed.
        let tx = h
            .service
            .update_status(&admin, id, TransactionStatus::Pending)
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);

        let result = h
            .service
            .update_status(&admin, TransactionId::new(), TransactionStatus::Completed)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Disputes
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_dispute_only_for_funded_transaction() {
        let h = harness();
        let buyer = register(&h.service, "Kofi", BUYER_PHONE).await;
        let ack = h
            .service
            .create_transaction(&buyer, purchase(SELLER_PHONE), None)
            .await
            .unwrap();

        let result = h
            .service
            .open_dispute(
                &buyer,
                ack.id,
                OpenDisputeRequest {
                    reason: "Never arrived".into(),
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_user_disputes_visible_to_self_or_admin() {
        let h = harness();
        let (buyer, seller, id) = funded(&h).await;
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        h.service
            .open_dispute(
                &buyer,
                id,
                OpenDisputeRequest {
                    reason: "Wrong colour".into(),
                },
                None,
            )
            .await
            .unwrap();

        let own = h.service.user_disputes(&buyer, buyer.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].reason, "Wrong colour");

        let as_admin = h.service.user_disputes(&admin, buyer.id).await.unwrap();
        assert_eq!(as_admin.len(), 1);

        let result = h.service.user_disputes(&seller, buyer.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        // The seller raised nothing.
        assert!(h.service.user_disputes(&seller, seller.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispute_then_refund_buyer() {
        let h = harness();
        let (buyer, _seller, id) = funded(&h).await;
        let stranger = register(&h.service, "Yaw", "0273333333").await;
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;

        let result = h
            .service
            .open_dispute(
                &stranger,
                id,
                OpenDisputeRequest {
                    reason: "Hmm".into(),
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "Unauthorized to raise dispute."));

        let ack = h
            .service
            .open_dispute(
                &buyer,
                id,
                OpenDisputeRequest {
                    reason: "Screen is cracked".into(),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(ack.message, "Dispute created successfully");

        let counts = h.service.dispute_counts(&buyer, buyer.id).await.unwrap();
        assert_eq!(counts.open, 1);
        let stats = h.service.user_statistics(&buyer).await.unwrap();
        assert_eq!(stats.disputes_count, 1);
        assert_eq!(stats.success_rate, 0.0);

        // Funds are frozen while disputed.
        let release = h.service.release_funds(&buyer, id).await;
        assert!(matches!(release, Err(AppError::BadRequest(_))));

        let listed = h
            .service
            .list_disputes(&admin, Some("open"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            h.service.list_disputes(&admin, Some("bogus")).await,
            Err(AppError::BadRequest(_))
        ));

        h.service
            .settle_dispute(
                &admin,
                id,
                SettleDisputeRequest {
                    settle_to_buyer: true,
                    resolution: None,
                },
            )
            .await
            .unwrap();

        let tx = h.service.get_transaction(&buyer, id).await.unwrap();
        assert_eq!(tx.transaction.status, TransactionStatus::Completed);

        let disputes = h.service.transaction_disputes(&buyer, id).await.unwrap();
        assert_eq!(disputes[0].status, DisputeStatus::Resolved);
        assert_eq!(
            disputes[0].resolution.as_deref(),
            Some("Funds refunded to buyer")
        );
        assert_eq!(disputes[0].resolved_by, Some(admin.id));

        let settlements = h.service.list_settlements(&admin).await.unwrap();
        assert_eq!(settlements[0].settlement_type, SettlementType::RefundToBuyer);
        assert_eq!(settlements[0].user_id, Some(buyer.id));
        let requests = h.payouts.requests.lock().unwrap();
        assert_eq!(requests[0].msisdn, BUYER_PHONE);
    }

    #[tokio::test]
    async fn test_settle_requires_disputed_transaction() {
        let h = harness();
        let (buyer, _seller, id) = funded(&h).await;
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        let req = SettleDisputeRequest {
            settle_to_buyer: false,
            resolution: None,
        };

        let result = h.service.settle_dispute(&buyer, id, req.clone()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = h.service.settle_dispute(&admin, id, req).await;
        assert!(matches!(
            result,
            Err(AppError::BadRequest(msg)) if msg == "Transaction not eligible for settlement."
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shops & misc
    // ─────────────────────────────────────────────────────────────────────────

    fn shop(name: &str) -> CreateShopRequest {
        CreateShopRequest {
            shop_name: name.into(),
            description: "Phones and accessories".into(),
            momo_number: SELLER_PHONE.into(),
            email: None,
            address: None,
            location: Some("Accra".into()),
        }
    }

    #[tokio::test]
    async fn test_shop_lifecycle() {
        let h = harness();
        let owner = register(&h.service, "Adwoa", SELLER_PHONE).await;
        let other = register(&h.service, "Kofi", BUYER_PHONE).await;

        let created = h
            .service
            .create_shop(&owner, shop("Adwoa Gadgets"), None)
            .await
            .unwrap();
        let duplicate = h
            .service
            .create_shop(&other, shop("adwoa gadgets"), None)
            .await;
        assert!(matches!(duplicate, Err(AppError::BadRequest(msg)) if msg == "Shop name already exists"));

        let found = h.service.search_shops("gadget").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner.as_ref().map(|o| o.id), Some(owner.id));
        assert_eq!(h.service.search_shops("all").await.unwrap().len(), 1);
        assert!(matches!(
            h.service.search_shops("bakery").await,
            Err(AppError::NotFound(_))
        ));

        let result = h.service.delete_shop(&other, created.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        h.service.delete_shop(&owner, created.id).await.unwrap();
        assert!(h.service.user_shops(owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_user_cannot_create_shop() {
        let h = harness();
        let mut owner = register(&h.service, "Adwoa", SELLER_PHONE).await;
        owner.is_blocked = true;

        let result = h.service.create_shop(&owner, shop("Blocked"), None).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_notifications_need_admin_and_configured_push() {
        let h = harness();
        let admin = register(&h.service, "Ops", ADMIN_PHONE).await;
        let user = register(&h.service, "Kofi", BUYER_PHONE).await;
        let req = escrow_types::SendNotificationRequest {
            token: "ExponentPushToken[abc]".into(),
            title: "Hello".into(),
            message: "World".into(),
        };

        let result = h.service.send_notification(&user, req.clone()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = h.service.send_notification(&admin, req).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
    }

    #[test]
    fn test_commission_quote_validates_amount() {
        let service = EscrowService::new(MockRepo::new(), JwtManager::new("s", 60));
        let quote = service.commission_quote(12_000).unwrap();
        assert_eq!(quote.commission_fee, 600);
        assert!(matches!(
            service.commission_quote(0),
            Err(AppError::BadRequest(_))
        ));
    }
}
