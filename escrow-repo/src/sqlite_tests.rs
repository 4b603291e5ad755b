//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use escrow_types::domain::{
        Currency, DisputeStatus, PartyRole, PaymentMethod, PaymentStatus, PayoutStatus,
        SettlementType, TransactionStatus, User, UserId,
    };
    use escrow_types::ports::{
        DisputeResolution, EscrowRepository, NewDispute, NewPayment, NewSettlement, NewShop,
        NewTransaction, NewUser, PartyBinding, TransactionChanges, UserChanges,
    };
    use escrow_types::{
        DomainError, PageRequest, RepoError, Transaction, TransactionFilter, TransactionId,
    };

    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::SqliteRepo;
    use crate::types::{CODE_ATTEMPTS, with_fresh_code};

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    async fn user(repo: &SqliteRepo, name: &str, phone: &str) -> User {
        repo.create_user(NewUser {
            name: name.to_string(),
            email: None,
            phone: phone.to_string(),
            password_hash: "hash".to_string(),
            is_admin: false,
        })
        .await
        .unwrap()
    }

    fn new_transaction(buyer: Option<UserId>, seller: Option<UserId>) -> NewTransaction {
        NewTransaction {
            title: "Laptop".to_string(),
            description: Some("Used, good condition".to_string()),
            amount: 150_000,
            currency: Currency::GHS,
            commission_fee: 5_250,
            buyer_id: buyer,
            seller_id: seller,
            initiated_by: PartyRole::Buyer,
            counterparty_phone: Some("0201111111".to_string()),
            seller_momo_number: Some("0241111111".to_string()),
            delivery_number: None,
            item_image: None,
        }
    }

    fn payment(user: UserId, status: PaymentStatus) -> NewPayment {
        NewPayment {
            user_id: user,
            amount: 150_000,
            currency: Currency::GHS,
            payment_method: PaymentMethod::Momo,
            reference: "MOMO-REF-1".to_string(),
            status,
        }
    }

    fn release_to(seller: UserId) -> NewSettlement {
        NewSettlement {
            user_id: Some(seller),
            amount: 150_000,
            currency: Currency::GHS,
            released_to: seller.to_string(),
            settlement_type: SettlementType::ReleaseToSeller,
        }
    }

    /// Creates a buyer, a seller and a transaction moved to IN_ESCROW.
    async fn funded(repo: &SqliteRepo) -> (User, User, Transaction) {
        let buyer = user(repo, "Buyer", "0201111111").await;
        let seller = user(repo, "Seller", "0241111111").await;
        let tx = repo
            .create_transaction(new_transaction(Some(buyer.id), Some(seller.id)))
            .await
            .unwrap();
        repo.accept_transaction(tx.id, None).await.unwrap();
        let (tx, _) = repo
            .record_payment(tx.id, payment(buyer.id, PaymentStatus::Success))
            .await
            .unwrap();
        (buyer, seller, tx)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = setup_repo().await;

        let created = user(&repo, "Ama", "0241234567").await;
        assert_eq!(created.user_code.len(), 6);
        assert!(!created.is_blocked);

        let by_phone = repo.find_user_by_phone("0241234567").await.unwrap().unwrap();
        assert_eq!(by_phone.id, created.id);

        let by_code = repo
            .find_user_by_code(&created.user_code.to_lowercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, created.id);

        assert!(repo.get_user(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_conflict() {
        let repo = setup_repo().await;
        user(&repo, "Ama", "0241234567").await;

        let result = repo
            .create_user(NewUser {
                name: "Other".to_string(),
                email: None,
                phone: "0241234567".to_string(),
                password_hash: "hash".to_string(),
                is_admin: false,
            })
            .await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_block_and_push_token() {
        let repo = setup_repo().await;
        let ama = user(&repo, "Ama", "0241234567").await;

        let updated = repo
            .update_user(
                ama.id,
                UserChanges {
                    name: Some("Ama Mensah".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Ama Mensah");
        assert_eq!(updated.phone, "0241234567");

        let blocked = repo.set_user_blocked(ama.id, true).await.unwrap().unwrap();
        assert!(blocked.is_blocked);

        assert!(repo.set_push_token(ama.id, Some("ExponentPushToken[abc]")).await.unwrap());
        let fetched = repo.get_user(ama.id).await.unwrap().unwrap();
        assert_eq!(fetched.push_token.as_deref(), Some("ExponentPushToken[abc]"));

        assert!(repo.update_password(ama.id, "new-hash").await.unwrap());
        assert!(!repo.update_password(UserId::new(), "new-hash").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user_with_transactions_is_conflict() {
        let repo = setup_repo().await;
        let buyer = user(&repo, "Buyer", "0201111111").await;
        repo.create_transaction(new_transaction(Some(buyer.id), None))
            .await
            .unwrap();

        let result = repo.delete_user(buyer.id).await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));

        let loner = user(&repo, "Loner", "0209999999").await;
        assert!(repo.delete_user(loner.id).await.unwrap());
        assert!(!repo.delete_user(loner.id).await.unwrap());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_transaction_starts_pending() {
        let repo = setup_repo().await;
        let buyer = user(&repo, "Buyer", "0201111111").await;

        let tx = repo
            .create_transaction(new_transaction(Some(buyer.id), None))
            .await
            .unwrap();

        assert!(tx.trans_code.starts_with("ESGH-"));
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.initiator_accepted);
        assert!(!tx.counterparty_accepted);
        assert!(!tx.is_funded);

        let by_code = repo
            .find_transaction_by_code(&tx.trans_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, tx.id);
    }

    #[tokio::test]
    async fn test_accept_binds_unregistered_counterparty_once() {
        let repo = setup_repo().await;
        let buyer = user(&repo, "Buyer", "0201111111").await;
        let seller = user(&repo, "Seller", "0241111111").await;
        let tx = repo
            .create_transaction(new_transaction(Some(buyer.id), None))
            .await
            .unwrap();

        let accepted = repo
            .accept_transaction(
                tx.id,
                Some(PartyBinding {
                    role: PartyRole::Seller,
                    user_id: seller.id,
                }),
            )
            .await
            .unwrap();

        assert_eq!(accepted.status, TransactionStatus::Accepted);
        assert!(accepted.counterparty_accepted);
        assert_eq!(accepted.seller_id, Some(seller.id));

        let again = repo.accept_transaction(tx.id, None).await;
        assert!(matches!(again, Err(RepoError::Conflict(_))));

        let missing = repo.accept_transaction(TransactionId::new(), None).await;
        assert!(matches!(missing, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_successful_payment_funds_once() {
        let repo = setup_repo().await;
        let (buyer, _, tx) = funded(&repo).await;

        assert_eq!(tx.status, TransactionStatus::InEscrow);
        assert!(tx.is_funded);

        let payment = repo.get_payment_for_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.reference, "MOMO-REF-1");

        let second = repo
            .record_payment(tx.id, self::payment(buyer.id, PaymentStatus::Success))
            .await;
        assert!(matches!(
            second,
            Err(RepoError::Domain(DomainError::InvalidState {
                actual: TransactionStatus::InEscrow,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_failed_payment_does_not_fund() {
        let repo = setup_repo().await;
        let buyer = user(&repo, "Buyer", "0201111111").await;
        let seller = user(&repo, "Seller", "0241111111").await;
        let tx = repo
            .create_transaction(new_transaction(Some(buyer.id), Some(seller.id)))
            .await
            .unwrap();
        repo.accept_transaction(tx.id, None).await.unwrap();

        let (tx, payment) = repo
            .record_payment(tx.id, payment(buyer.id, PaymentStatus::Failed))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Accepted);
        assert!(!tx.is_funded);
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_release_funds_completes_and_settles() {
        let repo = setup_repo().await;
        let (_, seller, tx) = funded(&repo).await;

        let settlement = repo.release_funds(tx.id, release_to(seller.id)).await.unwrap();
        assert_eq!(settlement.settlement_type, SettlementType::ReleaseToSeller);
        assert_eq!(settlement.payout_status, PayoutStatus::Pending);
        assert_eq!(settlement.user_id, Some(seller.id));

        let tx = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.release_date.is_some());

        let again = repo.release_funds(tx.id, release_to(seller.id)).await;
        assert!(matches!(again, Err(RepoError::Domain(_))));
        assert_eq!(repo.list_settlements().await.unwrap().len(), 1);

        let sent = repo
            .update_payout(settlement.id, PayoutStatus::Sent, Some("PAY-1".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.payout_status, PayoutStatus::Sent);
        assert_eq!(sent.payout_reference.as_deref(), Some("PAY-1"));
    }

    #[tokio::test]
    async fn test_update_only_while_pending() {
        let repo = setup_repo().await;
        let buyer = user(&repo, "Buyer", "0201111111").await;
        let tx = repo
            .create_transaction(new_transaction(Some(buyer.id), None))
            .await
            .unwrap();

        let changes = TransactionChanges {
            title: Some("Gaming laptop".to_string()),
            ..Default::default()
        };
        let updated = repo
            .update_transaction(tx.id, changes.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Gaming laptop");
        assert_eq!(updated.amount, 150_000);

        repo.set_transaction_status(tx.id, TransactionStatus::Cancelled)
            .await
            .unwrap();
        let locked = repo.update_transaction(tx.id, changes.clone()).await;
        assert!(matches!(locked, Err(RepoError::Domain(_))));

        let missing = repo
            .update_transaction(TransactionId::new(), changes)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_filter_and_stats() {
        let repo = setup_repo().await;
        let (buyer, _, _) = funded(&repo).await;
        for _ in 0..2 {
            repo.create_transaction(new_transaction(Some(buyer.id), None))
                .await
                .unwrap();
        }

        let (page, total) = repo
            .list_transactions(&TransactionFilter::default(), PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);

        let filter = TransactionFilter {
            status: Some(TransactionStatus::Pending),
            buyer_id: Some(buyer.id),
            ..Default::default()
        };
        let (pending, total) = repo
            .list_transactions(&filter, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(pending.iter().all(|t| t.status == TransactionStatus::Pending));

        let stats = repo.transaction_stats().await.unwrap();
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.total_value, 450_000);
        assert_eq!(stats.in_escrow, 1);
        assert_eq!(stats.completed, 0);

        let recent = repo
            .list_transactions_for_user(buyer.id, Some(2))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        let all = repo.list_transactions_for_user(buyer.id, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Disputes
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_dispute_requires_escrow() {
        let repo = setup_repo().await;
        let buyer = user(&repo, "Buyer", "0201111111").await;
        let tx = repo
            .create_transaction(new_transaction(Some(buyer.id), None))
            .await
            .unwrap();

        let result = repo
            .open_dispute(NewDispute {
                transaction_id: tx.id,
                raised_by: buyer.id,
                reason: "Never delivered".to_string(),
                evidence_url: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::InvalidState {
                expected: TransactionStatus::InEscrow,
                actual: TransactionStatus::Pending,
            }))
        ));
    }

    #[tokio::test]
    async fn test_settle_dispute_resolves_all_active() {
        let repo = setup_repo().await;
        let (buyer, _, tx) = funded(&repo).await;
        let admin = user(&repo, "Admin", "0500000000").await;

        let dispute = repo
            .open_dispute(NewDispute {
                transaction_id: tx.id,
                raised_by: buyer.id,
                reason: "Never delivered".to_string(),
                evidence_url: Some("https://img.example/evidence.jpg".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(dispute.status, DisputeStatus::Open);

        let tx = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Disputed);

        let counts = repo.count_disputes_by_status(buyer.id).await.unwrap();
        assert_eq!(counts.open, 1);

        let settlement = repo
            .settle_dispute(
                tx.id,
                NewSettlement {
                    user_id: Some(buyer.id),
                    amount: tx.amount,
                    currency: tx.currency,
                    released_to: buyer.id.to_string(),
                    settlement_type: SettlementType::RefundToBuyer,
                },
                DisputeResolution {
                    resolution: "Funds refunded to buyer".to_string(),
                    resolved_by: admin.id,
                },
            )
            .await
            .unwrap();
        assert_eq!(settlement.settlement_type, SettlementType::RefundToBuyer);

        let resolved = repo.get_dispute(dispute.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(resolved.resolved_by, Some(admin.id));
        assert!(resolved.resolved_at.is_some());

        let tx = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);

        let open = repo.list_disputes(Some(DisputeStatus::Open)).await.unwrap();
        assert!(open.is_empty());
        assert_eq!(repo.list_disputes_for_transaction(tx.id).await.unwrap().len(), 1);
        assert_eq!(repo.list_disputes_for_user(buyer.id).await.unwrap().len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shops
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_shop_search_and_cascade() {
        let repo = setup_repo().await;
        let owner = user(&repo, "Owner", "0241111111").await;

        let shop = repo
            .create_shop(NewShop {
                shop_name: "Adwoa Gadgets".to_string(),
                description: "Phones and laptops".to_string(),
                momo_number: "0241111111".to_string(),
                email: None,
                address: None,
                location: Some("Accra".to_string()),
                icon: None,
                owner_id: owner.id,
            })
            .await
            .unwrap();
        assert!(shop.shop_code.starts_with("SHOP-"));

        assert_eq!(repo.search_shops(&shop.shop_code).await.unwrap().len(), 1);
        assert_eq!(repo.search_shops("gadg").await.unwrap().len(), 1);
        assert_eq!(repo.search_shops("0241111111").await.unwrap().len(), 1);
        assert!(repo.search_shops("bakery").await.unwrap().is_empty());

        let by_name = repo.find_shop_by_name("adwoa gadgets").await.unwrap();
        assert!(by_name.is_some());

        assert!(repo.delete_user(owner.id).await.unwrap());
        assert!(repo.get_shop(shop.id).await.unwrap().is_none());
    }

    fn new_shop(owner: UserId, name: &str) -> NewShop {
        NewShop {
            shop_name: name.to_string(),
            description: "Shop".to_string(),
            momo_number: "0551234567".to_string(),
            email: None,
            address: None,
            location: None,
            icon: None,
            owner_id: owner,
        }
    }

    #[tokio::test]
    async fn test_shop_search_treats_wildcards_literally() {
        let repo = setup_repo().await;
        let owner = user(&repo, "Owner", "0241111111").await;
        repo.create_shop(new_shop(owner.id, "Adwoa Gadgets")).await.unwrap();
        repo.create_shop(new_shop(owner.id, "100% Cotton")).await.unwrap();
        repo.create_shop(new_shop(owner.id, "Kofi_Phones")).await.unwrap();

        let found = repo.search_shops("%").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].shop_name, "100% Cotton");

        let found = repo.search_shops("_").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].shop_name, "Kofi_Phones");

        assert!(repo.search_shops("Adwoa%Gadgets").await.unwrap().is_empty());
        assert_eq!(repo.search_shops("cotton").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let repo = setup_repo().await;
        let buyer = user(&repo, "Buyer", "0241111111").await;
        repo.create_transaction(new_transaction(Some(buyer.id), None))
            .await
            .unwrap();

        let page = PageRequest::new(i64::MAX, 10);
        let (rows, total) = repo
            .list_transactions(&TransactionFilter::default(), page)
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 1);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Generated codes
    // ─────────────────────────────────────────────────────────────────────────

    async fn ticket_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE tickets (label TEXT NOT NULL UNIQUE, ticket_code TEXT NOT NULL UNIQUE)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO tickets (label, ticket_code) VALUES ('first', 'AAA111')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn insert_ticket(
        pool: &SqlitePool,
        label: &str,
        code: String,
    ) -> Result<String, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO tickets (label, ticket_code) VALUES (?1, ?2) RETURNING ticket_code",
        )
        .bind(label)
        .bind(code)
        .fetch_one(pool)
        .await
    }

    #[tokio::test]
    async fn test_code_collision_is_retried_with_fresh_code() {
        let pool = ticket_pool().await;
        let mut codes = vec!["BBB222", "AAA111"];

        let code = with_fresh_code(
            "ticket_code",
            || codes.pop().unwrap().to_string(),
            |code| insert_ticket(&pool, "second", code),
        )
        .await
        .unwrap();
        assert_eq!(code, "BBB222");
        assert!(codes.is_empty());
    }

    #[tokio::test]
    async fn test_code_collision_gives_up_after_attempts() {
        let pool = ticket_pool().await;
        let mut generated = 0;

        let result = with_fresh_code(
            "ticket_code",
            || {
                generated += 1;
                "AAA111".to_string()
            },
            |code| insert_ticket(&pool, "second", code),
        )
        .await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));
        assert_eq!(generated, CODE_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_other_unique_violations_are_not_retried() {
        let pool = ticket_pool().await;
        let mut generated = 0;

        let result = with_fresh_code(
            "ticket_code",
            || {
                generated += 1;
                format!("NEW{:03}", generated)
            },
            |code| insert_ticket(&pool, "first", code),
        )
        .await;
        assert!(matches!(result, Err(RepoError::Conflict(msg)) if msg.contains("tickets.label")));
        assert_eq!(generated, 1);
    }
}
