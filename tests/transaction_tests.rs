use std::time::Duration;

use ledgerdb::{Account, ConnectionConfig, DbError, Ledger, TxStatus};

fn ledger() -> Ledger {
    Ledger::open(ConnectionConfig::new("admin", "adminpass")).unwrap()
}

#[test]
fn begin_yields_an_active_unit_of_work() {
    let ledger = ledger();
    let mut uow = ledger.transaction_manager().begin().unwrap();
    assert!(uow.status().is_active());
    uow.commit().unwrap();
    assert_eq!(uow.status(), TxStatus::Committed);
}

#[test]
fn terminal_states_reject_further_transitions() {
    let ledger = ledger();
    let tm = ledger.transaction_manager();

    let mut committed = tm.begin().unwrap();
    committed.commit().unwrap();
    assert!(matches!(committed.commit(), Err(DbError::Transaction(_))));
    assert!(matches!(committed.rollback(), Err(DbError::Transaction(_))));

    let mut rolled_back = tm.begin().unwrap();
    rolled_back.rollback().unwrap();
    assert_eq!(rolled_back.status(), TxStatus::RolledBack);
    assert!(matches!(rolled_back.commit(), Err(DbError::Transaction(_))));
}

#[test]
fn uncommitted_writes_are_invisible_to_other_sessions() {
    let ledger = ledger();
    let repository = ledger.repository();
    let tm = ledger.transaction_manager();

    let mut uow = tm.begin().unwrap();
    {
        let mut session = uow.session();
        repository
            .save(&mut session, &Account::new("staged", 500))
            .unwrap();
        // visible inside the unit of work
        assert_eq!(
            repository.find_by_id(&mut session, "staged").unwrap().balance(),
            500
        );
    }

    let mut outside = ledger.session();
    assert!(matches!(
        repository.find_by_id(&mut outside, "staged"),
        Err(DbError::NotFound(_))
    ));

    uow.commit().unwrap();
    assert_eq!(
        repository.find_by_id(&mut outside, "staged").unwrap().balance(),
        500
    );
}

#[test]
fn rollback_discards_staged_writes() {
    let ledger = ledger();
    let repository = ledger.repository();

    {
        let mut session = ledger.session();
        repository
            .save(&mut session, &Account::new("keep", 100))
            .unwrap();
    }

    let mut uow = ledger.transaction_manager().begin().unwrap();
    {
        let mut session = uow.session();
        repository.update(&mut session, "keep", 999).unwrap();
        repository
            .save(&mut session, &Account::new("discard", 1))
            .unwrap();
    }
    uow.rollback().unwrap();

    let mut session = ledger.session();
    assert_eq!(repository.find_by_id(&mut session, "keep").unwrap().balance(), 100);
    assert!(matches!(
        repository.find_by_id(&mut session, "discard"),
        Err(DbError::NotFound(_))
    ));
}

#[test]
fn dropping_an_active_unit_of_work_rolls_back() {
    let ledger = ledger();
    let repository = ledger.repository();

    {
        let mut uow = ledger.transaction_manager().begin().unwrap();
        let mut session = uow.session();
        repository
            .save(&mut session, &Account::new("abandoned", 42))
            .unwrap();
        // uow dropped here while still active
    }

    let mut session = ledger.session();
    assert!(matches!(
        repository.find_by_id(&mut session, "abandoned"),
        Err(DbError::NotFound(_))
    ));
}

#[test]
fn commit_releases_the_connection_before_the_unit_of_work_drops() {
    let ledger = Ledger::open(
        ConnectionConfig::new("admin", "adminpass")
            .min_connections(1)
            .max_connections(1)
            .connect_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    let repository = ledger.repository();

    let mut uow = ledger.transaction_manager().begin().unwrap();
    {
        let mut session = uow.session();
        repository
            .save(&mut session, &Account::new("released", 9))
            .unwrap();
    }
    uow.commit().unwrap();

    // the single pooled connection is usable again while `uow` is alive
    let mut session = ledger.session();
    assert_eq!(
        repository.find_by_id(&mut session, "released").unwrap().balance(),
        9
    );
    assert_eq!(uow.status(), TxStatus::Committed);
}

#[test]
fn run_commits_on_success() {
    let ledger = ledger();
    let repository = ledger.repository();

    let balance = ledger
        .transaction_manager()
        .run(|session| {
            repository.save(session, &Account::new("runner", 7))?;
            Ok(repository.find_by_id(session, "runner")?.balance())
        })
        .unwrap();
    assert_eq!(balance, 7);

    let mut session = ledger.session();
    assert!(repository.find_by_id(&mut session, "runner").is_ok());
}

#[test]
fn run_wraps_the_failing_error_and_rolls_back() {
    let ledger = ledger();
    let repository = ledger.repository();

    let err = ledger
        .transaction_manager()
        .run(|session| {
            repository.save(session, &Account::new("doomed", 1))?;
            repository.find_by_id(session, "missing").map(|_| ())
        })
        .unwrap_err();

    assert!(matches!(err, DbError::TransactionAborted(_)));
    assert!(matches!(err.root_cause(), DbError::NotFound(_)));

    let mut session = ledger.session();
    assert!(matches!(
        repository.find_by_id(&mut session, "doomed"),
        Err(DbError::NotFound(_))
    ));
}
