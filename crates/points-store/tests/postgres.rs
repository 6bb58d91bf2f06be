//! PostgreSQL store tests.
//!
//! These run only when `DATABASE_URL` points at a scratch database. Every test
//! works with freshly generated users, so tests can share one database.

use points_core::{generate_referral_code, User, UserId};
use points_store::schema::{all_tables, constraint};
use points_store::{
    AccountStore, PgStore, ReferralStore, Store, StoreError, TransactionLog, UnitOfWork,
    UserStore,
};

async fn connect() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };
    let store = PgStore::connect(&url, 5).await.expect("connect");
    store.migrate().await.expect("migrate");
    Some(store)
}

async fn seed_user(store: &PgStore, points: i64) -> UserId {
    let mut uow = store.begin().await.unwrap();
    let user = User::new("Test", "test@example.com", generate_referral_code());
    uow.create_user(&user).await.unwrap();
    uow.create_account(&user.id).await.unwrap();
    if points > 0 {
        uow.credit(&user.id, points).await.unwrap();
    }
    uow.commit().await.unwrap();
    user.id
}

#[tokio::test]
async fn migrations_create_schema() {
    let Some(store) = connect().await else { return };

    for table in all_tables() {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert!(exists, "missing table {table}");
    }

    for name in [
        constraint::USERS_REFERRAL_CODE,
        constraint::USER_REFERRALS_REFEREE,
        constraint::TRANSACTION_BONUSES_PAIR,
    ] {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = $1)")
                .bind(name)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert!(exists, "missing constraint {name}");
    }
}

#[tokio::test]
async fn committed_writes_are_visible() {
    let Some(store) = connect().await else { return };
    let alice = seed_user(&store, 500).await;
    let bob = seed_user(&store, 0).await;

    let mut uow = store.begin().await.unwrap();
    uow.debit(&alice, 200).await.unwrap();
    uow.credit(&bob, 200).await.unwrap();
    let tx = uow.append(&alice, &bob, 200).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    assert_eq!(uow.get_balance(&alice).await.unwrap(), 300);
    assert_eq!(uow.get_balance(&bob).await.unwrap(), 200);
    assert_eq!(uow.sum_sent(&alice).await.unwrap(), 200);

    let listed = uow.list_for_user(&bob, 10, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, tx.id);
}

#[tokio::test]
async fn dropped_unit_of_work_rolls_back() {
    let Some(store) = connect().await else { return };
    let alice = seed_user(&store, 100).await;

    {
        let mut uow = store.begin().await.unwrap();
        uow.debit(&alice, 100).await.unwrap();
    }

    let mut uow = store.begin().await.unwrap();
    assert_eq!(uow.get_balance(&alice).await.unwrap(), 100);
}

#[tokio::test]
async fn duplicate_bonus_leaves_transaction_usable() {
    let Some(store) = connect().await else { return };
    let referrer = seed_user(&store, 0).await;
    let referee = seed_user(&store, 0).await;

    let mut uow = store.begin().await.unwrap();
    uow.record_transaction_bonus(&referrer, &referee).await.unwrap();
    let duplicate = uow.record_transaction_bonus(&referrer, &referee).await;
    assert!(matches!(duplicate, Err(StoreError::DuplicateBonus { .. })));

    uow.credit(&referrer, 50).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    assert_eq!(uow.get_balance(&referrer).await.unwrap(), 50);
    let unpaid = uow.list_unpaid_transaction_bonuses(&referrer, 3).await.unwrap();
    assert_eq!(unpaid.len(), 1);
}

#[tokio::test]
async fn referral_links_and_payouts() {
    let Some(store) = connect().await else { return };
    let referrer = seed_user(&store, 0).await;
    let first = seed_user(&store, 0).await;
    let second = seed_user(&store, 0).await;

    let mut uow = store.begin().await.unwrap();
    uow.link_referral(&referrer, &first).await.unwrap();
    uow.link_referral(&referrer, &second).await.unwrap();
    assert!(matches!(
        uow.link_referral(&referrer, &first).await,
        Err(StoreError::DuplicateReferral { .. })
    ));

    assert_eq!(uow.count_unpaid_referrals(&referrer).await.unwrap(), 2);
    assert_eq!(uow.find_referrer_of(&first).await.unwrap(), Some(referrer));
    assert_eq!(uow.mark_referrals_paid(&referrer).await.unwrap(), 2);
    assert_eq!(uow.count_unpaid_referrals(&referrer).await.unwrap(), 0);
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn duplicate_referral_code_is_reported() {
    let Some(store) = connect().await else { return };
    let code = generate_referral_code();

    let mut uow = store.begin().await.unwrap();
    uow.create_user(&User::new("A", "a@example.com", code.clone()))
        .await
        .unwrap();
    let second = uow
        .create_user(&User::new("B", "b@example.com", code.clone()))
        .await;
    assert!(matches!(second, Err(StoreError::DuplicateReferralCode { .. })));
    uow.rollback().await.unwrap();
}
